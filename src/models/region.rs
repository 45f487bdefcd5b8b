//! 区域几何：画布尺寸、区域框、像素矩形、答题卡布局

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult, ValidationError};

/// 画布尺寸（像素）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// 图像上的一个点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// 区域框
///
/// 百分比形式按实际图像尺寸换算；绝对形式是基于某个参考画布的像素坐标，
/// 使用前按 实际尺寸 / 参考尺寸 缩放。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegionBox {
    Percent {
        x_percent: f64,
        y_percent: f64,
        w_percent: f64,
        h_percent: f64,
    },
    Absolute { x: f64, y: f64, w: f64, h: f64 },
}

/// 未裁剪的目标矩形，可能越界或为负
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntendedRect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

/// 已限制在图像范围内的像素矩形
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl RegionBox {
    pub fn percent(x_percent: f64, y_percent: f64, w_percent: f64, h_percent: f64) -> Self {
        RegionBox::Percent {
            x_percent,
            y_percent,
            w_percent,
            h_percent,
        }
    }

    pub fn absolute(x: f64, y: f64, w: f64, h: f64) -> Self {
        RegionBox::Absolute { x, y, w, h }
    }

    /// 百分比框换算为给定画布上的绝对坐标；绝对框原样返回
    pub fn to_canvas(&self, canvas: CanvasSize) -> RegionBox {
        match *self {
            RegionBox::Percent {
                x_percent,
                y_percent,
                w_percent,
                h_percent,
            } => RegionBox::absolute(
                x_percent / 100.0 * canvas.width as f64,
                y_percent / 100.0 * canvas.height as f64,
                w_percent / 100.0 * canvas.width as f64,
                h_percent / 100.0 * canvas.height as f64,
            ),
            absolute => absolute,
        }
    }

    /// 基于给定画布的绝对框换算为百分比；百分比框原样返回
    pub fn to_percent(&self, canvas: CanvasSize) -> RegionBox {
        match *self {
            RegionBox::Absolute { x, y, w, h } if !canvas.is_empty() => {
                let cw = canvas.width as f64;
                let ch = canvas.height as f64;
                RegionBox::percent(x / cw * 100.0, y / ch * 100.0, w / cw * 100.0, h / ch * 100.0)
            }
            other => other,
        }
    }

    /// 换算为实际图像上的像素矩形（尚未裁剪）
    pub fn resolve(&self, image: CanvasSize, reference: CanvasSize) -> IntendedRect {
        let (x, y, w, h) = match *self {
            RegionBox::Percent {
                x_percent,
                y_percent,
                w_percent,
                h_percent,
            } => {
                let iw = image.width as f64;
                let ih = image.height as f64;
                (
                    x_percent / 100.0 * iw,
                    y_percent / 100.0 * ih,
                    w_percent / 100.0 * iw,
                    h_percent / 100.0 * ih,
                )
            }
            RegionBox::Absolute { x, y, w, h } => {
                let sx = if reference.width == 0 {
                    1.0
                } else {
                    image.width as f64 / reference.width as f64
                };
                let sy = if reference.height == 0 {
                    1.0
                } else {
                    image.height as f64 / reference.height as f64
                };
                (x * sx, y * sy, w * sx, h * sy)
            }
        };

        IntendedRect {
            x: x.round() as i64,
            y: y.round() as i64,
            width: w.round() as i64,
            height: h.round() as i64,
        }
    }
}

impl IntendedRect {
    /// 限制在图像范围内；结果宽或高 ≤ 0 时返回 None
    pub fn clamp_to(&self, image: CanvasSize) -> Option<PixelRect> {
        let left = self.x.max(0);
        let top = self.y.max(0);
        let right = self.x.saturating_add(self.width).min(image.width as i64);
        let bottom = self.y.saturating_add(self.height).min(image.height as i64);

        if right <= left || bottom <= top {
            return None;
        }

        Some(PixelRect {
            x: left as u32,
            y: top as u32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        })
    }

    /// 占位图尺寸：原定尺寸，至少 1x1，不超过图像本身
    pub fn placeholder_size(&self, image: CanvasSize) -> CanvasSize {
        let side = |intended: i64, limit: u32| intended.clamp(1, limit.max(1) as i64) as u32;
        CanvasSize::new(side(self.width, image.width), side(self.height, image.height))
    }
}

/// 答题卡区域布局：每道题一个得分框
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SheetLayout {
    /// 透视校正成功后使用，坐标基于标准画布
    #[serde(default)]
    pub canonical_boxes: Vec<RegionBox>,
    /// 模板兜底使用，百分比（或旧版绝对像素）
    #[serde(default)]
    pub template_boxes: Vec<RegionBox>,
}

// 默认得分表的位置（百分比）
const TABLE_LEFT: f64 = 10.0;
const TABLE_WIDTH: f64 = 80.0;
const TABLE_TOP: f64 = 12.0;
const TABLE_HEIGHT: f64 = 5.0;
const CELL_INSET: f64 = 0.1;

impl SheetLayout {
    /// 按题目数量生成一行得分表
    pub fn score_table(question_count: usize, canonical: CanvasSize) -> Self {
        if question_count == 0 {
            return Self::default();
        }

        let cell = TABLE_WIDTH / question_count as f64;
        let template_boxes: Vec<RegionBox> = (0..question_count)
            .map(|i| {
                RegionBox::percent(
                    TABLE_LEFT + i as f64 * cell + cell * CELL_INSET,
                    TABLE_TOP,
                    cell * (1.0 - 2.0 * CELL_INSET),
                    TABLE_HEIGHT,
                )
            })
            .collect();

        let canonical_boxes = template_boxes.iter().map(|b| b.to_canvas(canonical)).collect();

        Self {
            canonical_boxes,
            template_boxes,
        }
    }

    /// 补全缺失的一侧：只有模板框时按标准画布换算出校正框，反之亦然
    pub fn complete(mut self, canonical: CanvasSize) -> Self {
        if self.canonical_boxes.is_empty() {
            self.canonical_boxes = self.template_boxes.iter().map(|b| b.to_canvas(canonical)).collect();
        } else if self.template_boxes.is_empty() {
            self.template_boxes = self.canonical_boxes.iter().map(|b| b.to_percent(canonical)).collect();
        }
        self
    }

    /// 两组区域框都必须与考试题目一一对应
    pub fn validate(&self, exam_id: &str, question_count: usize) -> AppResult<()> {
        let invalid = |reason: String| {
            AppError::Validation(ValidationError::InvalidLayout {
                exam_id: exam_id.to_string(),
                reason,
            })
        };

        if self.canonical_boxes.len() != question_count {
            return Err(invalid(format!(
                "校正区域 {} 个，题目 {} 道",
                self.canonical_boxes.len(),
                question_count
            )));
        }
        if self.template_boxes.len() != question_count {
            return Err(invalid(format!(
                "模板区域 {} 个，题目 {} 道",
                self.template_boxes.len(),
                question_count
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE: CanvasSize = CanvasSize::new(1654, 2339);

    #[test]
    fn test_percent_box_uses_actual_image_size() {
        let rect = RegionBox::percent(10.0, 20.0, 50.0, 25.0).resolve(CanvasSize::new(200, 400), REFERENCE);
        assert_eq!(
            rect,
            IntendedRect {
                x: 20,
                y: 80,
                width: 100,
                height: 100
            }
        );
    }

    #[test]
    fn test_legacy_absolute_box_scaled_by_reference() {
        // 半尺寸扫描件：坐标按 0.5 缩放
        let rect = RegionBox::absolute(100.0, 200.0, 60.0, 40.0).resolve(CanvasSize::new(827, 1169), REFERENCE);
        assert_eq!(rect.x, 50);
        assert_eq!(rect.width, 30);
        assert_eq!(rect.y, 100);
        assert_eq!(rect.height, 20);
    }

    #[test]
    fn test_clamp_trims_overhang() {
        let image = CanvasSize::new(100, 100);
        let rect = IntendedRect {
            x: -10,
            y: 90,
            width: 40,
            height: 30,
        };
        let clamped = rect.clamp_to(image).unwrap();
        assert_eq!(
            clamped,
            PixelRect {
                x: 0,
                y: 90,
                width: 30,
                height: 10
            }
        );
    }

    #[test]
    fn test_clamp_outside_image_is_none() {
        let image = CanvasSize::new(100, 100);
        let rect = IntendedRect {
            x: 150,
            y: 10,
            width: 20,
            height: 20,
        };
        assert!(rect.clamp_to(image).is_none());
        assert_eq!(rect.placeholder_size(image), CanvasSize::new(20, 20));
    }

    #[test]
    fn test_huge_box_does_not_overflow() {
        let image = CanvasSize::new(100, 100);
        let rect = RegionBox::percent(1e300, 0.0, 1e300, 10.0).resolve(image, REFERENCE);
        assert_eq!(rect.x, i64::MAX);
        assert!(rect.clamp_to(image).is_none());
        assert_eq!(rect.placeholder_size(image), CanvasSize::new(100, 10));

        let wide = IntendedRect {
            x: 5,
            y: 5,
            width: i64::MAX,
            height: i64::MAX,
        };
        assert_eq!(
            wide.clamp_to(image),
            Some(PixelRect {
                x: 5,
                y: 5,
                width: 95,
                height: 95
            })
        );
    }

    #[test]
    fn test_clamped_rect_never_exceeds_remaining_bounds() {
        let image = CanvasSize::new(64, 48);
        for x in (-80..80).step_by(7) {
            for y in (-60..60).step_by(5) {
                let rect = IntendedRect {
                    x,
                    y,
                    width: 33,
                    height: 21,
                };
                if let Some(r) = rect.clamp_to(image) {
                    assert!(r.x + r.width <= image.width);
                    assert!(r.y + r.height <= image.height);
                    assert!(r.width > 0 && r.height > 0);
                }
            }
        }
    }

    #[test]
    fn test_score_table_layout() {
        let layout = SheetLayout::score_table(4, REFERENCE);
        assert_eq!(layout.template_boxes.len(), 4);
        assert_eq!(layout.canonical_boxes.len(), 4);
        assert!(matches!(layout.canonical_boxes[0], RegionBox::Absolute { .. }));
        assert!(SheetLayout::score_table(0, REFERENCE).template_boxes.is_empty());
    }

    #[test]
    fn test_complete_derives_missing_side() {
        let canvas = CanvasSize::new(200, 400);
        let template_only = SheetLayout {
            canonical_boxes: vec![],
            template_boxes: vec![RegionBox::percent(25.0, 25.0, 50.0, 12.5)],
        }
        .complete(canvas);
        assert_eq!(template_only.canonical_boxes, vec![RegionBox::absolute(50.0, 100.0, 100.0, 50.0)]);

        let canonical_only = SheetLayout {
            canonical_boxes: vec![RegionBox::absolute(50.0, 100.0, 100.0, 50.0)],
            template_boxes: vec![],
        }
        .complete(canvas);
        assert_eq!(canonical_only.template_boxes, vec![RegionBox::percent(25.0, 25.0, 50.0, 12.5)]);
    }

    #[test]
    fn test_layout_must_match_question_count() {
        let layout = SheetLayout::score_table(3, REFERENCE);
        assert!(layout.validate("E1", 3).is_ok());
        assert!(matches!(
            layout.validate("E1", 2),
            Err(AppError::Validation(ValidationError::InvalidLayout { .. }))
        ));

        let lopsided = SheetLayout {
            canonical_boxes: layout.canonical_boxes[..2].to_vec(),
            template_boxes: layout.template_boxes.clone(),
        };
        assert!(lopsided.validate("E1", 3).is_err());
        assert!(SheetLayout::default().complete(REFERENCE).validate("E1", 1).is_err());
    }

    #[test]
    fn test_layout_toml_accepts_both_box_forms() {
        let layout: SheetLayout = toml::from_str(
            r#"
            [[canonical_boxes]]
            x = 100.0
            y = 200.0
            w = 50.0
            h = 40.0

            [[template_boxes]]
            x_percent = 10.0
            y_percent = 12.0
            w_percent = 8.0
            h_percent = 5.0
            "#,
        )
        .unwrap();
        assert!(matches!(layout.canonical_boxes[0], RegionBox::Absolute { .. }));
        assert!(matches!(layout.template_boxes[0], RegionBox::Percent { .. }));
    }
}
