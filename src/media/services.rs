use bytes::Bytes;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::state::AppState;

/// A file received from the client, ready to be stored.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Avatar,
    CoverImage,
}

impl MediaKind {
    fn folder(self) -> &'static str {
        match self {
            MediaKind::Avatar => "avatars",
            MediaKind::CoverImage => "covers",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedMedia {
    pub key: String,
    pub url: String,
}

/// Store one file. `None` means the upload produced nothing usable: the
/// body was empty or the storage backend refused it.
pub async fn upload(st: &AppState, kind: MediaKind, item: UploadItem) -> Option<UploadedMedia> {
    if item.body.is_empty() {
        warn!(?kind, "refusing to upload empty file");
        return None;
    }
    let ext = ext_from_mime(&item.content_type).unwrap_or("bin");
    let key = format!("{}/{}.{}", kind.folder(), Uuid::new_v4(), ext);
    match st
        .storage
        .put_object(&key, item.body, &item.content_type)
        .await
    {
        Ok(()) => {
            debug!(%key, "media uploaded");
            Some(UploadedMedia {
                url: st.storage.public_url(&key),
                key,
            })
        }
        Err(e) => {
            warn!(error = %e, %key, "media upload failed");
            None
        }
    }
}

/// Best-effort removal of media that is no longer referenced.
pub async fn discard(st: &AppState, url: &str) {
    let Some(key) = st.storage.key_for_url(url) else {
        debug!(%url, "not a managed media url; skipping delete");
        return;
    };
    if let Err(e) = st.storage.delete_object(&key).await {
        warn!(error = %e, %key, "failed to delete unreferenced media");
    }
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}
