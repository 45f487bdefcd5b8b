//! 几何归一化 - 业务能力层
//!
//! ```text
//! Start ─┬─ MarkersFound ── AttemptWarp ─┬─ WarpOK ─────────────▶ WarpedCanonical
//!        │                               └─ WarpFailed ─┐
//!        └─ MarkersMissing ─────────────────────────────┴──────▶ TemplateFallback
//! ```
//!
//! 模板兜底不是对透视变换的重试：直接使用未校正的原图和百分比区域。
//! 只有原图本身不可用（尺寸为 0）时才是 `Unrecoverable`。

use image::DynamicImage;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::infrastructure::{MarkerDetection, PerspectiveWarper};
use crate::models::{CanvasSize, Point, RegionBox, SheetLayout};

/// 归一化后的页面：图像 + 区域框 + 绝对坐标框所基于的参考尺寸
#[derive(Debug, Clone)]
pub struct NormalizedPage {
    pub image: DynamicImage,
    pub boxes: Vec<RegionBox>,
    pub reference: CanvasSize,
}

impl NormalizedPage {
    pub fn size(&self) -> CanvasSize {
        CanvasSize::new(self.image.width(), self.image.height())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    MarkersMissing,
    WarpFailed(String),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::MarkersMissing => write!(f, "未检测到定位标记"),
            FallbackReason::WarpFailed(reason) => write!(f, "透视变换失败: {}", reason),
        }
    }
}

#[derive(Debug)]
pub enum NormalizationResult {
    WarpedCanonical(NormalizedPage),
    TemplateFallback {
        page: NormalizedPage,
        reason: FallbackReason,
    },
    Unrecoverable {
        reason: String,
    },
}

impl NormalizationResult {
    pub fn is_fallback(&self) -> bool {
        matches!(self, NormalizationResult::TemplateFallback { .. })
    }
}

pub struct Normalizer {
    warper: Arc<dyn PerspectiveWarper>,
    canonical: CanvasSize,
    legacy_reference: CanvasSize,
}

impl Normalizer {
    pub fn new(
        warper: Arc<dyn PerspectiveWarper>,
        canonical: CanvasSize,
        legacy_reference: CanvasSize,
    ) -> Self {
        Self {
            warper,
            canonical,
            legacy_reference,
        }
    }

    pub fn canonical_size(&self) -> CanvasSize {
        self.canonical
    }

    fn canonical_corners(&self) -> [Point; 4] {
        let w = self.canonical.width.saturating_sub(1) as f64;
        let h = self.canonical.height.saturating_sub(1) as f64;
        [
            Point::new(0.0, 0.0),
            Point::new(w, 0.0),
            Point::new(w, h),
            Point::new(0.0, h),
        ]
    }

    pub fn normalize(
        &self,
        raw: DynamicImage,
        detection: &MarkerDetection,
        layout: &SheetLayout,
    ) -> NormalizationResult {
        if raw.width() == 0 || raw.height() == 0 {
            return NormalizationResult::Unrecoverable {
                reason: "原始图像尺寸为 0".to_string(),
            };
        }

        let reason = match detection.usable_corners() {
            Some(corners) => {
                match self
                    .warper
                    .warp(&raw, corners, self.canonical_corners(), self.canonical)
                {
                    Ok(warped) => {
                        debug!(
                            "透视校正成功: {}x{} → {}x{}",
                            raw.width(),
                            raw.height(),
                            warped.width(),
                            warped.height()
                        );
                        return NormalizationResult::WarpedCanonical(NormalizedPage {
                            image: warped,
                            boxes: layout.canonical_boxes.clone(),
                            reference: self.canonical,
                        });
                    }
                    Err(e) => {
                        warn!("透视变换失败，改用模板区域: {}", e);
                        FallbackReason::WarpFailed(e.to_string())
                    }
                }
            }
            None => FallbackReason::MarkersMissing,
        };

        NormalizationResult::TemplateFallback {
            page: NormalizedPage {
                image: raw,
                boxes: layout.template_boxes.clone(),
                reference: self.legacy_reference,
            },
            reason,
        }
    }
}
