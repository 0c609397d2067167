use serde::Deserialize;
use validator::Validate;

/// Image sent inline as base64 alongside a JSON payload.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ImageUpload {
    #[validate(length(min = 1, message = "file name is required"))]
    pub filename: String,
    #[validate(length(min = 1, message = "image content is required"))]
    pub content_base64: String,
}
