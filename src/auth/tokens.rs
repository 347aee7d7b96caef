//! Token issuance, verification and refresh-token rotation.
//!
//! Access tokens are verified statelessly (plus a lookup to resolve the
//! subject). Refresh tokens are additionally compared with the single value
//! stored on the user row, which makes them revocable: logout clears it and
//! every issuance overwrites it.

use axum::extract::FromRef;
use serde::Serialize;
use tracing::{error, warn};
use uuid::Uuid;

use crate::auth::jwt::{JwtKeys, Subject};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::users::repo_types::User;

pub const ISSUE_FAILED: &str = "Something went wrong while generating access and refresh token.";
pub const REFRESH_STALE: &str = "Refresh token is expired or used.";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

fn sign_pair(keys: &JwtKeys, user: &User) -> anyhow::Result<TokenPair> {
    let subject = Subject {
        id: user.id,
        username: &user.username,
        email: &user.email,
    };
    Ok(TokenPair {
        access_token: keys.sign_access(&subject)?,
        refresh_token: keys.sign_refresh(&subject)?,
    })
}

async fn issue_inner(st: &AppState, user_id: Uuid) -> anyhow::Result<TokenPair> {
    let user = st
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("user {user_id} not found"))?;
    let pair = sign_pair(&JwtKeys::from_ref(st), &user)?;
    st.users
        .set_refresh_token(user.id, Some(&pair.refresh_token))
        .await?;
    Ok(pair)
}

/// Mint a fresh pair for `user_id` and make its refresh token the only one
/// accepted. Failures are reported without their cause.
pub async fn issue(st: &AppState, user_id: Uuid) -> ApiResult<TokenPair> {
    issue_inner(st, user_id).await.map_err(|e| {
        error!(error = %e, %user_id, "token issuance failed");
        ApiError::internal(ISSUE_FAILED)
    })
}

/// Resolve an access token to its (still existing) user.
pub async fn verify_access(st: &AppState, token: &str) -> ApiResult<User> {
    let claims = JwtKeys::from_ref(st)
        .verify_access(token)
        .map_err(|e| ApiError::unauthorized(e.to_string()))?;
    st.users
        .find_by_id(claims.sub)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %claims.sub, "user lookup failed");
            ApiError::unauthorized("Invalid access token.")
        })?
        .ok_or_else(|| ApiError::unauthorized("Invalid access token."))
}

/// Resolve a refresh token to its user, requiring it to be the stored one.
pub async fn verify_refresh(st: &AppState, token: &str) -> ApiResult<User> {
    let claims = JwtKeys::from_ref(st)
        .verify_refresh(token)
        .map_err(|e| ApiError::unauthorized(e.to_string()))?;
    let user = st
        .users
        .find_by_id(claims.sub)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %claims.sub, "user lookup failed");
            ApiError::unauthorized("Invalid refresh token.")
        })?
        .ok_or_else(|| ApiError::unauthorized("Invalid refresh token."))?;

    if user.refresh_token.as_deref() != Some(token) {
        warn!(user_id = %user.id, "stale or reused refresh token");
        return Err(ApiError::unauthorized(REFRESH_STALE));
    }
    Ok(user)
}

/// Replace `presented` with a new pair. The store update is conditional on
/// `presented` still being current, so of two concurrent rotations only one
/// succeeds.
pub async fn rotate(st: &AppState, user: &User, presented: &str) -> ApiResult<TokenPair> {
    let pair = sign_pair(&JwtKeys::from_ref(st), user).map_err(|e| {
        error!(error = %e, user_id = %user.id, "token signing failed");
        ApiError::internal(ISSUE_FAILED)
    })?;
    let swapped = st
        .users
        .swap_refresh_token(user.id, presented, &pair.refresh_token)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %user.id, "refresh token swap failed");
            ApiError::internal(ISSUE_FAILED)
        })?;
    if !swapped {
        warn!(user_id = %user.id, "refresh token rotated concurrently");
        return Err(ApiError::unauthorized(REFRESH_STALE));
    }
    Ok(pair)
}
