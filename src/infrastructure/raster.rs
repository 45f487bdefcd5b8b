//! 图片直通栅格化
//!
//! 扫描件本身就是图片时直接使用原始字节；PDF 等版式文档需要接入外部栅格化服务。

use async_trait::async_trait;

use crate::error::{AppError, AppResult, ExternalServiceError};
use crate::infrastructure::RasterConverter;
use crate::models::Document;

#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughRasterizer;

#[async_trait]
impl RasterConverter for PassthroughRasterizer {
    async fn rasterize(&self, document: &Document) -> AppResult<Vec<u8>> {
        let failed = |reason: &str| {
            AppError::ExternalService(ExternalServiceError::RasterFailed {
                file_name: document.file_name.clone(),
                reason: reason.to_string(),
            })
        };

        if document.bytes.starts_with(b"%PDF") {
            return Err(failed("PDF 需要外部栅格化服务"));
        }

        match image::guess_format(&document.bytes) {
            Ok(format) => {
                tracing::debug!("{} 识别为 {:?}，直接使用", document.file_name, format);
                Ok(document.bytes.clone())
            }
            Err(_) => Err(failed("无法识别的文件格式")),
        }
    }
}
