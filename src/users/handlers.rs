use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::patch,
    Json, Router,
};
use axum_extra::extract::WithRejection;
use tracing::instrument;

use crate::{
    auth::{extractors::AuthUser, handlers::UPLOAD_LIMIT},
    error::{ApiError, ApiResult},
    media::{form::read_form, services::MediaKind},
    response::ApiResponse,
    state::AppState,
    users::{dto::UpdateAccountRequest, repo_types::PublicUser, services},
};

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/users/update-account", patch(update_account))
        .route(
            "/users/avatar",
            patch(update_avatar).layer(DefaultBodyLimit::max(UPLOAD_LIMIT)),
        )
        .route(
            "/users/cover-image",
            patch(update_cover_image).layer(DefaultBodyLimit::max(UPLOAD_LIMIT)),
        )
}

#[instrument(skip_all)]
pub async fn update_account(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    WithRejection(Json(payload), _): WithRejection<Json<UpdateAccountRequest>, ApiError>,
) -> ApiResult<ApiResponse<PublicUser>> {
    let user = services::update_account_details(&state, user.id, payload).await?;
    Ok(ApiResponse::ok(user, "Account details updated successfully."))
}

#[instrument(skip_all)]
pub async fn update_avatar(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    WithRejection(mp, _): WithRejection<Multipart, ApiError>,
) -> ApiResult<ApiResponse<PublicUser>> {
    let file = read_form(mp).await?.file(&["file", "avatar"]);
    let user = services::replace_media(&state, user.id, MediaKind::Avatar, file).await?;
    Ok(ApiResponse::ok(user, "Avatar updated successfully."))
}

#[instrument(skip_all)]
pub async fn update_cover_image(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    WithRejection(mp, _): WithRejection<Multipart, ApiError>,
) -> ApiResult<ApiResponse<PublicUser>> {
    let file = read_form(mp).await?.file(&["file", "coverImage"]);
    let user = services::replace_media(&state, user.id, MediaKind::CoverImage, file).await?;
    Ok(ApiResponse::ok(user, "Cover image updated successfully."))
}
