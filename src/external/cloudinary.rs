use crate::config::CloudinaryConfig;
use crate::error::{AppError, AppResult};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const ALLOWED_IMAGE_TYPES: [&str; 2] = ["image/png", "image/jpeg"];

#[derive(Debug, Deserialize)]
pub struct UploadResult {
    pub secure_url: String,
    pub public_id: String,
}

#[derive(Debug, Deserialize)]
struct CloudinaryErrorBody {
    error: CloudinaryErrorMessage,
}

#[derive(Debug, Deserialize)]
struct CloudinaryErrorMessage {
    message: String,
}

/// 图片上传前的校验: 类型与大小
pub fn validate_image(bytes: &[u8], content_type: &str) -> AppResult<()> {
    if !ALLOWED_IMAGE_TYPES.contains(&content_type) {
        return Err(AppError::ValidationError(
            "Only PNG and JPEG images are allowed".to_string(),
        ));
    }
    if bytes.is_empty() {
        return Err(AppError::ValidationError("No image uploaded".to_string()));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(AppError::ValidationError(
            "Image must not exceed 5MB".to_string(),
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct CloudinaryService {
    client: Client,
    config: CloudinaryConfig,
}

impl CloudinaryService {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.config.cloud_name.is_empty() && !self.config.upload_preset.is_empty()
    }

    /// 无签名上传 (upload preset)
    pub async fn upload_image(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        folder: &str,
    ) -> AppResult<UploadResult> {
        validate_image(&bytes, content_type)?;

        if !self.is_configured() {
            return Err(AppError::ConfigError(
                "Image upload is not configured".to_string(),
            ));
        }

        let url = format!(
            "{}/{}/image/upload",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.cloud_name
        );

        let extension = if content_type == "image/png" { "png" } else { "jpg" };
        let part = Part::bytes(bytes)
            .file_name(format!("upload.{extension}"))
            .mime_str(content_type)?;
        let form = Form::new()
            .text("upload_preset", self.config.upload_preset.clone())
            .text("folder", folder.to_string())
            .part("file", part);

        let response = self.client.post(&url).multipart(form).send().await?;

        if response.status().is_success() {
            let result: UploadResult = response.json().await?;
            log::info!("Image uploaded to {folder}: {}", result.public_id);
            Ok(result)
        } else {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<CloudinaryErrorBody>(&error_text)
                .map(|body| body.error.message)
                .unwrap_or(error_text);
            log::error!("Image upload failed: {status}, Error: {message}");
            Err(AppError::ExternalApiError(format!(
                "Image upload failed: {message}"
            )))
        }
    }
}
