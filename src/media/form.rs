use std::collections::HashMap;

use axum::extract::Multipart;
use tracing::warn;

use crate::error::{ApiError, ApiResult};
use crate::media::services::UploadItem;

/// A parsed multipart body: text fields and file fields by name.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub files: HashMap<String, UploadItem>,
}

impl MultipartForm {
    pub fn text(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }

    /// First file present under any of `names`.
    pub fn file(&mut self, names: &[&str]) -> Option<UploadItem> {
        names.iter().find_map(|n| self.files.remove(*n))
    }
}

pub async fn read_form(mut mp: Multipart) -> ApiResult<MultipartForm> {
    let mut form = MultipartForm::default();
    loop {
        let field = match mp.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "malformed multipart body");
                return Err(ApiError::bad_request("Malformed multipart body."));
            }
        };
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if field.file_name().is_some() {
            let content_type = field
                .content_type()
                .map(str::to_string)
                .unwrap_or_else(|| "application/octet-stream".into());
            let body = field
                .bytes()
                .await
                .map_err(|_| ApiError::bad_request("Could not read uploaded file."))?;
            // keep the first file per field, like a single-file upload
            form.files
                .entry(name)
                .or_insert(UploadItem { body, content_type });
        } else {
            let value = field
                .text()
                .await
                .map_err(|_| ApiError::bad_request("Could not read form field."))?;
            form.fields.insert(name, value);
        }
    }
    Ok(form)
}
