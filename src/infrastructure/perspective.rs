//! 四点透视变换（单应性矩阵 + 双线性采样）

use image::{DynamicImage, Rgb, RgbImage};

use crate::error::{AppError, AppResult, ImageError};
use crate::infrastructure::PerspectiveWarper;
use crate::models::{CanvasSize, Point};

const SINGULAR_EPSILON: f64 = 1e-10;
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// 3x3 单应性矩阵，h[8] 固定为 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography([f64; 9]);

impl Homography {
    /// 求解把 `from` 四点映射到 `to` 四点的矩阵
    pub fn from_points(from: &[Point; 4], to: &[Point; 4]) -> AppResult<Self> {
        let mut a = [[0.0f64; 9]; 8];
        for i in 0..4 {
            let (u, v) = (from[i].x, from[i].y);
            let (x, y) = (to[i].x, to[i].y);
            a[2 * i] = [u, v, 1.0, 0.0, 0.0, 0.0, -u * x, -v * x, x];
            a[2 * i + 1] = [0.0, 0.0, 0.0, u, v, 1.0, -u * y, -v * y, y];
        }

        let h = solve_8x8(a).ok_or_else(|| warp_failed("标记点退化，无法求解单应性矩阵"))?;
        Ok(Self([h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0]))
    }

    pub fn apply(&self, p: Point) -> Option<Point> {
        let m = &self.0;
        let w = m[6] * p.x + m[7] * p.y + m[8];
        if w.abs() < SINGULAR_EPSILON {
            return None;
        }
        Some(Point::new(
            (m[0] * p.x + m[1] * p.y + m[2]) / w,
            (m[3] * p.x + m[4] * p.y + m[5]) / w,
        ))
    }
}

fn warp_failed(reason: impl Into<String>) -> AppError {
    AppError::Image(ImageError::WarpFailed {
        reason: reason.into(),
    })
}

/// 高斯消元（部分主元）。矩阵奇异时返回 None
fn solve_8x8(mut a: [[f64; 9]; 8]) -> Option<[f64; 8]> {
    for col in 0..8 {
        let pivot = (col..8).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < SINGULAR_EPSILON {
            return None;
        }
        a.swap(col, pivot);

        for row in 0..8 {
            if row == col {
                continue;
            }
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..9 {
                a[row][k] -= factor * a[col][k];
            }
        }
    }

    let mut x = [0.0f64; 8];
    for (i, value) in x.iter_mut().enumerate() {
        *value = a[i][8] / a[i][i];
        if !value.is_finite() {
            return None;
        }
    }
    Some(x)
}

fn bilinear(image: &RgbImage, p: Point) -> Rgb<u8> {
    let (w, h) = image.dimensions();
    if p.x < 0.0 || p.y < 0.0 || p.x > (w - 1) as f64 || p.y > (h - 1) as f64 {
        return BACKGROUND;
    }

    let x0 = p.x.floor() as u32;
    let y0 = p.y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = p.x - x0 as f64;
    let fy = p.y - y0 as f64;

    let (a, b, c, d) = (
        image.get_pixel(x0, y0),
        image.get_pixel(x1, y0),
        image.get_pixel(x0, y1),
        image.get_pixel(x1, y1),
    );

    let mut out = [0u8; 3];
    for (ch, slot) in out.iter_mut().enumerate() {
        let top = a[ch] as f64 * (1.0 - fx) + b[ch] as f64 * fx;
        let bottom = c[ch] as f64 * (1.0 - fx) + d[ch] as f64 * fx;
        *slot = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}

/// 默认透视变换实现
#[derive(Debug, Clone, Copy, Default)]
pub struct HomographyWarper;

impl PerspectiveWarper for HomographyWarper {
    fn warp(
        &self,
        image: &DynamicImage,
        src: [Point; 4],
        dst: [Point; 4],
        canvas: CanvasSize,
    ) -> AppResult<DynamicImage> {
        if canvas.is_empty() {
            return Err(warp_failed("目标画布尺寸为 0"));
        }
        if image.width() == 0 || image.height() == 0 {
            return Err(warp_failed("源图像尺寸为 0"));
        }
        if src.iter().chain(dst.iter()).any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(warp_failed("标记坐标不是有限数"));
        }

        // 反向映射：对目标画布每个像素求源图坐标
        let inverse = Homography::from_points(&dst, &src)?;
        let source = image.to_rgb8();

        let mut out = RgbImage::from_pixel(canvas.width, canvas.height, BACKGROUND);
        for (x, y, pixel) in out.enumerate_pixels_mut() {
            if let Some(p) = inverse.apply(Point::new(x as f64, y as f64)) {
                *pixel = bilinear(&source, p);
            }
        }

        Ok(DynamicImage::ImageRgb8(out))
    }
}
