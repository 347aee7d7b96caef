use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;

use super::cookies::ACCESS_COOKIE;
use super::tokens;
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::repo_types::PublicUser;

/// The authenticated caller, resolved from the access token.
pub struct AuthUser(pub PublicUser);

/// Cookie first, then `Authorization: Bearer <token>`.
pub(crate) fn bearer_token(parts: &Parts) -> Option<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    if let Some(c) = jar.get(ACCESS_COOKIE).filter(|c| !c.value().is_empty()) {
        return Some(c.value().to_string());
    }

    let auth = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;
    let (scheme, token) = auth.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::unauthorized("Unauthorized request."))?;

        let user = tokens::verify_access(state, &token).await.map_err(|e| {
            warn!(error = %e, "access token rejected");
            match e {
                ApiError::Unauthorized(_) => e,
                _ => ApiError::unauthorized("Invalid access token."),
            }
        })?;

        Ok(AuthUser(user.into()))
    }
}
