//! Raster rendering helpers: redaction fill/blur and QR/barcode localisation.

mod barcode;
mod qr;
mod redact;

pub use barcode::{RxingLocator, SymbolLocator};
pub use qr::{QrLocator, RqrrLocator};
pub use redact::{fill_rects, redact_image, BLUR_SIGMA};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("unknown redaction style: {0} (expected black or blur)")]
    UnknownStyle(String),
}

/// 像素矩形（左闭右开）
///
/// 坐标可能越界或为空，应用时再裁剪到图片范围内。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl PixelRect {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> i32 {
        (self.x1 - self.x0).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.y1 - self.y0).max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// 向内收缩 `margin` 像素（用于校验时避开抗锯齿边缘）
    pub fn inset(&self, margin: i32) -> Self {
        Self::new(
            self.x0 + margin,
            self.y0 + margin,
            self.x1 - margin,
            self.y1 - margin,
        )
    }

    /// 裁剪到 `width x height` 的图片内，返回 (x, y, w, h)；完全在图片外时返回 None
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = self.x0.clamp(0, width as i32);
        let y0 = self.y0.clamp(0, height as i32);
        let x1 = self.x1.clamp(0, width as i32);
        let y1 = self.y1.clamp(0, height as i32);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
    }
}

/// 图片脱敏样式
///
/// 只适用于栅格图片；PDF 页面始终为不透明填充。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedactionStyle {
    #[default]
    Black,
    Blur,
}

impl fmt::Display for RedactionStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedactionStyle::Black => write!(f, "black"),
            RedactionStyle::Blur => write!(f, "blur"),
        }
    }
}

impl FromStr for RedactionStyle {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "black" => Ok(RedactionStyle::Black),
            "blur" => Ok(RedactionStyle::Blur),
            _ => Err(RenderError::UnknownStyle(s.to_string())),
        }
    }
}
