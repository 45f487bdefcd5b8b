//! 外部协作方接口
//!
//! 只约定调用契约与失败语义，具体传输格式由实现决定。

use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::models::{CanvasSize, Document, Point};

/// 文档栅格化：只需要第一页
///
/// 失败只影响当前文档。
#[async_trait]
pub trait RasterConverter: Send + Sync {
    async fn rasterize(&self, document: &Document) -> AppResult<Vec<u8>>;
}

/// 定位标记检测结果
///
/// `success = false` 是正常结果，不是错误。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerDetection {
    pub success: bool,
    /// 左上、右上、右下、左下
    pub corners: Option<[Point; 4]>,
}

impl MarkerDetection {
    pub fn missing() -> Self {
        Self {
            success: false,
            corners: None,
        }
    }

    pub fn found(corners: [Point; 4]) -> Self {
        Self {
            success: true,
            corners: Some(corners),
        }
    }

    /// 只有同时报告成功且给出四个角点才可用于透视校正
    pub fn usable_corners(&self) -> Option<[Point; 4]> {
        if self.success {
            self.corners
        } else {
            None
        }
    }
}

#[async_trait]
pub trait MarkerDetector: Send + Sync {
    async fn detect(&self, raster: &[u8]) -> AppResult<MarkerDetection>;
}

/// 四点透视变换
///
/// 可能失败，调用方必须捕获并走模板兜底。在阻塞线程池中调用。
pub trait PerspectiveWarper: Send + Sync {
    fn warp(
        &self,
        image: &DynamicImage,
        src: [Point; 4],
        dst: [Point; 4],
        canvas: CanvasSize,
    ) -> AppResult<DynamicImage>;
}

/// 发往视觉推理服务的一次请求
#[derive(Debug, Clone)]
pub struct VisionRequest {
    /// PNG 编码的图像
    pub image_png: Vec<u8>,
    pub prompt: String,
    /// 审计用标签，例如 `20211001_q03`
    pub label: String,
}

/// 视觉推理服务：图像 + 提示 → 自由文本回复
#[async_trait]
pub trait VisionClient: Send + Sync {
    async fn ask(&self, request: VisionRequest) -> AppResult<String>;
}

/// 整页 OCR，用于文件名中没有学号的情况
#[async_trait]
pub trait PageOcr: Send + Sync {
    async fn read_student_number(&self, raster: &[u8]) -> AppResult<Option<String>>;
}
