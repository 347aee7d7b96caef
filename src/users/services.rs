use tracing::info;
use uuid::Uuid;

use crate::auth::dto::{check_email, normalize, require_fields, ALL_FIELDS_REQUIRED};
use crate::error::{ApiError, ApiResult};
use crate::media::services::{self as media, MediaKind, UploadItem};
use crate::state::AppState;
use crate::users::dto::UpdateAccountRequest;
use crate::users::repo::StoreError;
use crate::users::repo_types::PublicUser;

fn gone() -> ApiError {
    ApiError::unauthorized("Invalid access token.")
}

pub async fn update_account_details(
    st: &AppState,
    user_id: Uuid,
    req: UpdateAccountRequest,
) -> ApiResult<PublicUser> {
    require_fields(&[
        ("fullName", req.full_name.as_deref()),
        ("email", req.email.as_deref()),
    ])?;
    let (Some(full_name), Some(email)) = (req.full_name, req.email) else {
        return Err(ApiError::bad_request(ALL_FIELDS_REQUIRED));
    };
    let email = normalize(&email);
    check_email(&email)?;

    let user = st
        .users
        .update_details(user_id, full_name.trim(), &email)
        .await
        .map_err(|e| match e {
            StoreError::Duplicate => ApiError::conflict("Email is already in use."),
            StoreError::Other(e) => ApiError::Unexpected(e),
        })?
        .ok_or_else(gone)?;

    info!(%user_id, "account details updated");
    Ok(user.into())
}

/// Upload a new avatar or cover image, point the user at it and drop the
/// object it replaces.
pub async fn replace_media(
    st: &AppState,
    user_id: Uuid,
    kind: MediaKind,
    file: Option<UploadItem>,
) -> ApiResult<PublicUser> {
    let (missing, failed) = match kind {
        MediaKind::Avatar => ("Avatar file is missing.", "Error while uploading avatar."),
        MediaKind::CoverImage => (
            "Cover image file is missing.",
            "Error while uploading cover image.",
        ),
    };
    let file = file
        .filter(|f| !f.body.is_empty())
        .ok_or_else(|| ApiError::bad_request(missing))?;

    let previous = st.users.find_by_id(user_id).await?.ok_or_else(gone)?;
    let uploaded = media::upload(st, kind, file)
        .await
        .ok_or_else(|| ApiError::bad_request(failed))?;

    let (updated, old_url) = match kind {
        MediaKind::Avatar => (
            st.users.update_avatar(user_id, &uploaded.url).await,
            Some(previous.avatar),
        ),
        MediaKind::CoverImage => (
            st.users.update_cover_image(user_id, &uploaded.url).await,
            previous.cover_image,
        ),
    };
    let updated = match updated {
        Ok(Some(user)) => user,
        Ok(None) => {
            media::discard(st, &uploaded.url).await;
            return Err(gone());
        }
        Err(e) => {
            media::discard(st, &uploaded.url).await;
            return Err(e.into());
        }
    };

    if let Some(old) = old_url.filter(|u| !u.is_empty() && *u != uploaded.url) {
        media::discard(st, &old).await;
    }

    info!(%user_id, ?kind, "media updated");
    Ok(updated.into())
}

#[cfg(test)]
mod profile_tests {
    use super::*;
    use crate::state::fake::{FakeStorage, FAKE_MEDIA_URL};
    use crate::users::memory::InMemoryUserStore;
    use crate::users::repo_types::NewUser;
    use bytes::Bytes;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    async fn seed(st: &AppState, username: &str, email: &str) -> Uuid {
        st.users
            .create(NewUser {
                username: username.into(),
                email: email.into(),
                full_name: "Someone".into(),
                password_hash: "hash".into(),
                avatar: format!("{FAKE_MEDIA_URL}/avatars/old.png"),
                cover_image: None,
            })
            .await
            .unwrap()
            .id
    }

    fn file() -> Option<UploadItem> {
        Some(UploadItem {
            body: Bytes::from_static(b"img"),
            content_type: "image/webp".into(),
        })
    }

    #[tokio::test]
    async fn details_require_both_fields() {
        let st = AppState::fake();
        let id = seed(&st, "alice", "a@x.com").await;
        let req = UpdateAccountRequest {
            full_name: Some("Alice B".into()),
            email: None,
        };
        assert!(matches!(
            update_account_details(&st, id, req).await,
            Err(ApiError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn details_are_updated() {
        let st = AppState::fake();
        let id = seed(&st, "alice", "a@x.com").await;
        let req = UpdateAccountRequest {
            full_name: Some(" Alice B ".into()),
            email: Some("New@X.com".into()),
        };
        let user = update_account_details(&st, id, req).await.unwrap();
        assert_eq!(user.full_name, "Alice B");
        assert_eq!(user.email, "new@x.com");
    }

    #[tokio::test]
    async fn details_email_taken_conflicts() {
        let st = AppState::fake();
        let id = seed(&st, "alice", "a@x.com").await;
        seed(&st, "bob", "b@x.com").await;
        let req = UpdateAccountRequest {
            full_name: Some("Alice".into()),
            email: Some("b@x.com".into()),
        };
        assert!(matches!(
            update_account_details(&st, id, req).await,
            Err(ApiError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn avatar_is_replaced_and_old_object_deleted() {
        let storage = Arc::new(FakeStorage::default());
        let st = AppState::fake_with_storage(storage.clone());
        let id = seed(&st, "alice", "a@x.com").await;

        let user = replace_media(&st, id, MediaKind::Avatar, file()).await.unwrap();
        assert!(user.avatar.starts_with(&format!("{FAKE_MEDIA_URL}/avatars/")));
        assert!(user.avatar.ends_with(".webp"));
        assert_eq!(storage.deleted.lock().unwrap().as_slice(), &["avatars/old.png".to_string()]);
    }

    #[tokio::test]
    async fn first_cover_image_deletes_nothing() {
        let storage = Arc::new(FakeStorage::default());
        let st = AppState::fake_with_storage(storage.clone());
        let id = seed(&st, "alice", "a@x.com").await;

        let user = replace_media(&st, id, MediaKind::CoverImage, file()).await.unwrap();
        assert!(user.cover_image.is_some());
        assert!(storage.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_file_or_failed_upload_is_bad_request() {
        let st = AppState::fake_with_storage(Arc::new(FakeStorage::failing()));
        let id = seed(&st, "alice", "a@x.com").await;

        assert!(matches!(
            replace_media(&st, id, MediaKind::Avatar, None).await,
            Err(ApiError::BadRequest(ref m)) if m == "Avatar file is missing."
        ));
        assert!(matches!(
            replace_media(&st, id, MediaKind::CoverImage, file()).await,
            Err(ApiError::BadRequest(ref m)) if m == "Error while uploading cover image."
        ));
    }

    #[tokio::test]
    async fn failed_update_discards_new_object_and_keeps_old() {
        let users = Arc::new(InMemoryUserStore::default());
        let storage = Arc::new(FakeStorage::default());
        let st = AppState::fake_with(users.clone(), storage.clone());
        let id = seed(&st, "alice", "a@x.com").await;
        users.fail_writes.store(true, Ordering::SeqCst);

        let err = replace_media(&st, id, MediaKind::Avatar, file()).await.unwrap_err();
        assert!(matches!(err, ApiError::Unexpected(_)));

        let stored = storage.stored.lock().unwrap().clone();
        assert_eq!(stored.len(), 1);
        assert_eq!(storage.deleted.lock().unwrap().as_slice(), stored.as_slice());

        users.fail_writes.store(false, Ordering::SeqCst);
        let user = st.users.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.avatar, format!("{FAKE_MEDIA_URL}/avatars/old.png"));
    }
}
