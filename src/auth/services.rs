use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::dto::{
    check_password_strength, normalize, require_fields, ChangePasswordRequest, LoginRequest,
    LoginResponse, ValidRegistration,
};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::tokens::{self, TokenPair};
use crate::error::{ApiError, ApiResult};
use crate::media::services::{self as media, MediaKind};
use crate::state::AppState;
use crate::users::repo::StoreError;
use crate::users::repo_types::{NewUser, PublicUser};

const USER_EXISTS: &str = "User with email or username already exists.";
pub const INVALID_CREDENTIALS: &str = "Invalid user credentials.";
const REGISTER_FAILED: &str = "Something went wrong while registering the user.";

pub async fn register(st: &AppState, input: ValidRegistration) -> ApiResult<PublicUser> {
    let existing = st
        .users
        .find_by_username_or_email(Some(&input.username), Some(&input.email))
        .await?;
    if existing.is_some() {
        warn!(username = %input.username, "registration with taken username or email");
        return Err(ApiError::conflict(USER_EXISTS));
    }

    let password_hash = hash_password(&input.password)?;
    let avatar = media::upload(st, MediaKind::Avatar, input.avatar)
        .await
        .ok_or_else(|| ApiError::bad_request("Avatar file is required."))?;
    let cover_image = match input.cover_image {
        Some(item) => media::upload(st, MediaKind::CoverImage, item).await,
        None => None,
    };

    let created = st
        .users
        .create(NewUser {
            username: input.username,
            email: input.email,
            full_name: input.full_name,
            password_hash,
            avatar: avatar.url.clone(),
            cover_image: cover_image.as_ref().map(|c| c.url.clone()),
        })
        .await;
    let created = match created {
        Ok(user) => user,
        Err(e) => {
            media::discard(st, &avatar.url).await;
            if let Some(cover) = &cover_image {
                media::discard(st, &cover.url).await;
            }
            return Err(match e {
                StoreError::Duplicate => ApiError::conflict(USER_EXISTS),
                StoreError::Other(e) => ApiError::Unexpected(e),
            });
        }
    };

    let user = st
        .users
        .find_by_id(created.id)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %created.id, "reading back registered user failed");
            ApiError::internal(REGISTER_FAILED)
        })?
        .ok_or_else(|| ApiError::internal(REGISTER_FAILED))?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user.into())
}

pub async fn login(st: &AppState, req: LoginRequest) -> ApiResult<LoginResponse> {
    let username = req
        .username
        .as_deref()
        .map(normalize)
        .filter(|s| !s.is_empty());
    let email = req.email.as_deref().map(normalize).filter(|s| !s.is_empty());
    if username.is_none() && email.is_none() {
        return Err(ApiError::bad_request("Username or email is required."));
    }

    let user = st
        .users
        .find_by_username_or_email(username.as_deref(), email.as_deref())
        .await?
        .ok_or_else(|| ApiError::not_found("User does not exist."))?;

    if !verify_password(&req.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::not_found(INVALID_CREDENTIALS));
    }

    let TokenPair {
        access_token,
        refresh_token,
    } = tokens::issue(st, user.id).await?;

    info!(user_id = %user.id, "user logged in");
    Ok(LoginResponse {
        user: user.into(),
        access_token,
        refresh_token,
    })
}

/// Revoke the stored refresh token. Safe to repeat.
pub async fn logout(st: &AppState, user_id: Uuid) -> ApiResult<()> {
    st.users.set_refresh_token(user_id, None).await?;
    info!(%user_id, "user logged out");
    Ok(())
}

pub async fn refresh(st: &AppState, incoming: Option<String>) -> ApiResult<TokenPair> {
    let incoming = incoming
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::unauthorized("Unauthorized request."))?;

    let user = tokens::verify_refresh(st, &incoming).await?;
    let pair = tokens::rotate(st, &user, &incoming).await?;
    info!(user_id = %user.id, "access token refreshed");
    Ok(pair)
}

pub async fn change_password(
    st: &AppState,
    user_id: Uuid,
    req: ChangePasswordRequest,
) -> ApiResult<()> {
    require_fields(&[
        ("oldPassword", req.old_password.as_deref()),
        ("newPassword", req.new_password.as_deref()),
    ])?;
    let (Some(old_password), Some(new_password)) = (req.old_password, req.new_password) else {
        return Err(ApiError::bad_request("All fields are required."));
    };

    let user = st
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid access token."))?;

    if !verify_password(&old_password, &user.password_hash)? {
        warn!(%user_id, "change password with wrong old password");
        return Err(ApiError::bad_request("Invalid old password."));
    }
    check_password_strength(&new_password)?;

    let hash = hash_password(&new_password)?;
    st.users.set_password_hash(user_id, &hash).await?;
    info!(%user_id, "password changed");
    Ok(())
}
