//! 区域裁剪 - 业务能力层
//!
//! 裁剪永远不会中断流程：越界的区域退化为同尺寸的空白占位图。

use image::{imageops, DynamicImage, Rgb, RgbImage};
use tracing::warn;

use crate::error::{AppError, AppResult, ImageError};
use crate::models::{CanvasSize, PixelRect, RegionBox};
use crate::services::normalizer::NormalizedPage;

/// 拼图单边最大像素
const MAX_GRID_SIDE: u64 = 16_384;
const GRID_GAP: u32 = 4;

#[derive(Debug, Clone)]
pub enum ExtractionResult {
    Cropped {
        image: DynamicImage,
        rect: PixelRect,
    },
    BlankPlaceholder {
        image: DynamicImage,
        reason: String,
    },
}

impl ExtractionResult {
    pub fn image(&self) -> &DynamicImage {
        match self {
            ExtractionResult::Cropped { image, .. } | ExtractionResult::BlankPlaceholder { image, .. } => image,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, ExtractionResult::BlankPlaceholder { .. })
    }
}

/// 一道题的裁剪结果
#[derive(Debug, Clone)]
pub struct ExtractedRegion {
    pub question_number: u32,
    /// 例如 `20211001_q03`
    pub label: String,
    pub result: ExtractionResult,
}

/// 区域命名：同一文档同一题号总是得到相同的名字
pub fn region_label(document_stem: &str, question_number: u32) -> String {
    format!("{}_q{:02}", document_stem, question_number)
}

fn blank(size: CanvasSize) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(size.width, size.height, Rgb([255, 255, 255])))
}

/// 裁剪单个区域
pub fn extract(image: &DynamicImage, region: &RegionBox, reference: CanvasSize) -> ExtractionResult {
    let size = CanvasSize::new(image.width(), image.height());
    let intended = region.resolve(size, reference);

    match intended.clamp_to(size) {
        Some(rect) => ExtractionResult::Cropped {
            image: image.crop_imm(rect.x, rect.y, rect.width, rect.height),
            rect,
        },
        None => {
            let error = ImageError::RegionOutOfBounds {
                x: intended.x,
                y: intended.y,
                width: intended.width,
                height: intended.height,
                image_width: size.width,
                image_height: size.height,
            };
            warn!("{}，使用空白占位图", error);
            ExtractionResult::BlankPlaceholder {
                image: blank(intended.placeholder_size(size)),
                reason: error.to_string(),
            }
        }
    }
}

/// 按题号顺序裁剪页面上的所有区域
///
/// 第 i 道题使用第 i 个区域框；布局中缺少的区域同样得到占位图。
pub fn extract_page(page: &NormalizedPage, document_stem: &str, question_numbers: &[u32]) -> Vec<ExtractedRegion> {
    question_numbers
        .iter()
        .enumerate()
        .map(|(index, &question_number)| {
            let label = region_label(document_stem, question_number);
            let result = match page.boxes.get(index) {
                Some(region) => extract(&page.image, region, page.reference),
                None => ExtractionResult::BlankPlaceholder {
                    image: blank(CanvasSize::new(1, 1)),
                    reason: format!("布局中没有第 {} 个区域", index + 1),
                },
            };
            ExtractedRegion {
                question_number,
                label,
                result,
            }
        })
        .collect()
}

/// 把多个裁剪结果拼成一张网格图，供人工核对
pub fn compose_grid(crops: &[&DynamicImage], columns: u32) -> AppResult<RgbImage> {
    let compose_failed = |reason: String| AppError::Image(ImageError::ComposeFailed { reason });

    if crops.is_empty() {
        return Err(compose_failed("没有可拼接的区域".to_string()));
    }
    let columns = columns.max(1).min(crops.len() as u32);
    let rows = (crops.len() as u32).div_ceil(columns);

    let cell_w = crops.iter().map(|c| c.width()).max().unwrap_or(1);
    let cell_h = crops.iter().map(|c| c.height()).max().unwrap_or(1);

    let total_w = columns as u64 * (cell_w as u64 + GRID_GAP as u64);
    let total_h = rows as u64 * (cell_h as u64 + GRID_GAP as u64);
    if total_w > MAX_GRID_SIDE || total_h > MAX_GRID_SIDE {
        return Err(compose_failed(format!("拼图尺寸 {}x{} 过大", total_w, total_h)));
    }

    let mut canvas = RgbImage::from_pixel(total_w as u32, total_h as u32, Rgb([200, 200, 200]));
    for (i, crop) in crops.iter().enumerate() {
        let i = i as u32;
        let x = (i % columns) * (cell_w + GRID_GAP);
        let y = (i / columns) * (cell_h + GRID_GAP);
        imageops::replace(&mut canvas, &crop.to_rgb8(), x as i64, y as i64);
    }

    Ok(canvas)
}
