use axum::{
    extract::{DefaultBodyLimit, FromRef, Multipart, State},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::{cookie::CookieJar, WithRejection};
use serde_json::{json, Value};
use tracing::instrument;

use crate::{
    auth::{
        cookies::{self, REFRESH_COOKIE},
        dto::{ChangePasswordRequest, LoginRequest, LoginResponse, RefreshRequest, RegisterForm},
        extractors::AuthUser,
        jwt::JwtKeys,
        services,
        tokens::TokenPair,
    },
    error::{ApiError, ApiResult},
    media::form::read_form,
    response::ApiResponse,
    state::AppState,
    users::repo_types::PublicUser,
};

pub const UPLOAD_LIMIT: usize = 10 * 1024 * 1024;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/users/register",
            post(register).layer(DefaultBodyLimit::max(UPLOAD_LIMIT)),
        )
        .route("/users/login", post(login))
        .route("/users/refresh-token", post(refresh))
}

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/users/logout", post(logout))
        .route("/users/change-password", post(change_password))
        .route("/users/current-user", get(current_user))
}

#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    WithRejection(mp, _): WithRejection<Multipart, ApiError>,
) -> ApiResult<ApiResponse<PublicUser>> {
    let mut form = read_form(mp).await?;
    let input = RegisterForm {
        username: form.text("username"),
        full_name: form.text("fullName"),
        email: form.text("email"),
        password: form.text("password"),
        avatar: form.file(&["avatar"]),
        cover_image: form.file(&["coverImage"]),
    }
    .validate()?;

    let user = services::register(&state, input).await?;
    Ok(ApiResponse::created(user, "User registered successfully."))
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(payload), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> ApiResult<(CookieJar, ApiResponse<LoginResponse>)> {
    let res = services::login(&state, payload).await?;
    let pair = TokenPair {
        access_token: res.access_token.clone(),
        refresh_token: res.refresh_token.clone(),
    };
    let jar = cookies::with_tokens(jar, &JwtKeys::from_ref(&state), &pair);
    Ok((jar, ApiResponse::ok(res, "User logged in successfully.")))
}

#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    jar: CookieJar,
) -> ApiResult<(CookieJar, ApiResponse<Value>)> {
    services::logout(&state, user.id).await?;
    Ok((
        cookies::without_tokens(jar),
        ApiResponse::ok(json!({}), "User logged out."),
    ))
}

#[instrument(skip_all)]
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> ApiResult<(CookieJar, ApiResponse<TokenPair>)> {
    let incoming = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| body.and_then(|Json(b)| b.refresh_token));

    let pair = services::refresh(&state, incoming).await?;
    let jar = cookies::with_tokens(jar, &JwtKeys::from_ref(&state), &pair);
    Ok((jar, ApiResponse::ok(pair, "Access token refreshed.")))
}

#[instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    WithRejection(Json(payload), _): WithRejection<Json<ChangePasswordRequest>, ApiError>,
) -> ApiResult<ApiResponse<Value>> {
    services::change_password(&state, user.id, payload).await?;
    Ok(ApiResponse::ok(json!({}), "Password changed successfully."))
}

#[instrument(skip_all)]
pub async fn current_user(AuthUser(user): AuthUser) -> ApiResponse<PublicUser> {
    ApiResponse::ok(user, "Current user fetched successfully.")
}
