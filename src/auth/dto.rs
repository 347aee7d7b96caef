use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::auth::password::MIN_PASSWORD_LEN;
use crate::error::{ApiError, ApiResult};
use crate::media::services::UploadItem;
use crate::users::repo_types::PublicUser;

pub const ALL_FIELDS_REQUIRED: &str = "All fields are required.";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Reject when any of `fields` is absent or blank, naming every offender.
pub(crate) fn require_fields(fields: &[(&str, Option<&str>)]) -> ApiResult<()> {
    let missing: Vec<String> = fields
        .iter()
        .filter(|(_, v)| v.map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| name.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation {
            message: ALL_FIELDS_REQUIRED.into(),
            errors: missing,
        })
    }
}

pub(crate) fn check_email(email: &str) -> ApiResult<()> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(ApiError::bad_request("Invalid email"))
    }
}

pub(crate) fn check_password_strength(password: &str) -> ApiResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request("Password too short"));
    }
    Ok(())
}

/// Registration input, collected from a multipart form.
#[derive(Debug, Default)]
pub struct RegisterForm {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub avatar: Option<UploadItem>,
    pub cover_image: Option<UploadItem>,
}

/// Registration input after validation and normalization.
#[derive(Debug)]
pub struct ValidRegistration {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub avatar: UploadItem,
    pub cover_image: Option<UploadItem>,
}

impl RegisterForm {
    pub fn validate(self) -> ApiResult<ValidRegistration> {
        require_fields(&[
            ("username", self.username.as_deref()),
            ("fullName", self.full_name.as_deref()),
            ("email", self.email.as_deref()),
            ("password", self.password.as_deref()),
        ])?;
        // require_fields guarantees presence
        let (Some(username), Some(full_name), Some(email), Some(password)) =
            (self.username, self.full_name, self.email, self.password)
        else {
            return Err(ApiError::bad_request(ALL_FIELDS_REQUIRED));
        };

        let email = normalize(&email);
        check_email(&email)?;
        check_password_strength(&password)?;

        let avatar = self
            .avatar
            .filter(|f| !f.body.is_empty())
            .ok_or_else(|| ApiError::bad_request("Avatar file is required."))?;

        Ok(ValidRegistration {
            username: normalize(&username),
            full_name: full_name.trim().to_string(),
            email,
            password,
            avatar,
            cover_image: self.cover_image.filter(|f| !f.body.is_empty()),
        })
    }
}

/// Request body for login. One of `username` / `email` is required.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub password: String,
}

/// Request body for token refresh; the cookie takes precedence.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

/// Response returned after login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: PublicUser,
    pub access_token: String,
    pub refresh_token: String,
}
