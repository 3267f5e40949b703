use actix_multipart::{Multipart, MultipartError};
use futures_util::TryStreamExt;

use crate::error::{AppError, AppResult};
use crate::external::MAX_IMAGE_BYTES;

/// multipart 表单里的一个文件字段
pub(crate) struct ImagePart {
    pub bytes: Vec<u8>,
    /// 该字段自己的 Content-Type, 小写且不含参数
    pub content_type: String,
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::ValidationError(format!("Invalid multipart body: {err}"))
}

/// 读取名为 `field_name` 的文件字段, 其余字段丢弃
pub(crate) async fn read_image_part(
    mut payload: Multipart,
    field_name: &str,
) -> AppResult<ImagePart> {
    while let Some(mut field) = payload.try_next().await.map_err(multipart_error)? {
        if field.name() != Some(field_name) {
            while field.try_next().await.map_err(multipart_error)?.is_some() {}
            continue;
        }

        let content_type = field
            .content_type()
            .map(|mime| mime.essence_str().to_ascii_lowercase())
            .unwrap_or_default();

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
            if bytes.len() + chunk.len() > MAX_IMAGE_BYTES {
                return Err(AppError::ValidationError(
                    "Image must not exceed 5MB".to_string(),
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        return Ok(ImagePart {
            bytes,
            content_type,
        });
    }

    Err(AppError::ValidationError("No image uploaded".to_string()))
}
