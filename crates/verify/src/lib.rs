//! Post-processing verification checks.

use image::{Rgb, RgbImage};
use pii_render::PixelRect;
use serde::{Deserialize, Serialize};

/// 每个通道允许的偏差（JPEG 压缩会让纯色略有漂移）
pub const DEFAULT_TOLERANCE: u8 = 24;

/// 校验时向内收缩的像素，避开抗锯齿边缘
pub const EDGE_MARGIN: i32 = 2;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerifyResult {
    pub ok: bool,
    pub warnings: Vec<String>,
}

impl VerifyResult {
    pub fn passed() -> Self {
        Self {
            ok: true,
            warnings: Vec::new(),
        }
    }

    /// 合并另一页/另一区域的结果
    pub fn merge(&mut self, other: VerifyResult) {
        self.ok &= other.ok;
        self.warnings.extend(other.warnings);
    }
}

/// 检查每个矩形内部是否完全被 `fill` 覆盖
///
/// `context` 会出现在警告信息中（如 "page 2"）。
pub fn verify_filled(
    img: &RgbImage,
    rects: &[PixelRect],
    fill: Rgb<u8>,
    tolerance: u8,
    context: &str,
) -> VerifyResult {
    let mut result = VerifyResult::passed();
    let (width, height) = img.dimensions();

    for (idx, rect) in rects.iter().enumerate() {
        let inner = rect.inset(EDGE_MARGIN);
        let Some((x, y, w, h)) = inner.clamp_to(width, height) else {
            continue;
        };

        let mut leaked = 0usize;
        for py in y..y + h {
            for px in x..x + w {
                if !close_to(img.get_pixel(px, py), &fill, tolerance) {
                    leaked += 1;
                }
            }
        }

        if leaked > 0 {
            result.ok = false;
            result.warnings.push(format!(
                "{}: region {} ({}, {}, {}, {}) has {} of {} pixels not covered",
                context,
                idx,
                rect.x0,
                rect.y0,
                rect.x1,
                rect.y1,
                leaked,
                w as usize * h as usize
            ));
        }
    }

    result
}

fn close_to(pixel: &Rgb<u8>, fill: &Rgb<u8>, tolerance: u8) -> bool {
    pixel
        .0
        .iter()
        .zip(fill.0.iter())
        .all(|(a, b)| a.abs_diff(*b) <= tolerance)
}
