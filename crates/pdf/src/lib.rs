//! PDF rasterization and destructive redaction.
//!
//! 坐标约定：[`PointRect`] 使用 PDF 原生点坐标（1/72 英寸），原点在页面左上角，
//! 与栅格化图片的像素坐标方向一致，两者只差一个缩放系数。

mod metadata;
mod pdfium;

pub use metadata::{stamp_redaction_metadata, BRAND};
pub use pdfium::{PdfiumEngine, PdfiumSession, DEFAULT_FLATTEN_DPI};

use image::{Rgb, RgbImage};
use pii_render::PixelRect;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// PDF 原生分辨率
pub const PDF_NATIVE_DPI: f32 = 72.0;

pub type Result<T> = std::result::Result<T, PdfError>;

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("PDFium library unavailable: {reason}")]
    Bind { reason: String },

    #[error("failed to load PDF {path}: {reason}")]
    Load { path: String, reason: String },

    #[error("page {page} out of bounds (total: {total})")]
    PageOutOfBounds { page: usize, total: usize },

    #[error("failed to render page {page}: {reason}")]
    Render { page: usize, reason: String },

    #[error("failed to write PDF: {reason}")]
    Save { reason: String },

    #[error("failed to update PDF metadata: {0}")]
    Metadata(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// PDF 点坐标矩形
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointRect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl PointRect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// 像素坐标 -> 点坐标（除以缩放系数）
    pub fn from_pixels(rect: &PixelRect, scale_x: f32, scale_y: f32) -> Self {
        Self {
            x0: rect.x0 as f32 / scale_x,
            y0: rect.y0 as f32 / scale_y,
            x1: rect.x1 as f32 / scale_x,
            y1: rect.y1 as f32 / scale_y,
        }
    }

    /// 点坐标 -> 像素坐标，向外取整以保证完全覆盖
    pub fn to_pixels(&self, scale_x: f32, scale_y: f32) -> PixelRect {
        PixelRect::new(
            (self.x0 * scale_x).floor() as i32,
            (self.y0 * scale_y).floor() as i32,
            (self.x1 * scale_x).ceil() as i32,
            (self.y1 * scale_y).ceil() as i32,
        )
    }
}

/// 栅格化后的页面
#[derive(Debug, Clone)]
pub struct RasterPage {
    pub image: RgbImage,
    /// 像素 / 点
    pub scale_x: f32,
    pub scale_y: f32,
}

/// 指定 DPI 对应的缩放系数
pub fn zoom_for_dpi(dpi: u32) -> f32 {
    dpi as f32 / PDF_NATIVE_DPI
}

/// 打开的 PDF 文档
///
/// 脱敏是破坏性的：被脱敏区域下的原始内容不会出现在输出文件中。
/// 不支持模糊样式，矢量内容只能填充。
pub trait PdfSession {
    fn page_count(&self) -> usize;

    /// 以 `dpi` 栅格化页面（`page_index` 从 0 开始）
    fn rasterize(&self, page_index: usize, dpi: u32) -> Result<RasterPage>;

    /// 登记页面的脱敏区域（点坐标）
    fn apply_redactions(
        &mut self,
        page_index: usize,
        rects: &[PointRect],
        fill: Rgb<u8>,
    ) -> Result<()>;

    /// 按原页序写出文档
    fn save(&mut self, output: &Path) -> Result<()>;
}

/// PDF 引擎
pub trait PdfEngine {
    fn open<'a>(&'a self, path: &Path) -> Result<Box<dyn PdfSession + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_for_dpi() {
        assert!((zoom_for_dpi(200) - 2.777_778).abs() < 1e-4);
        assert_eq!(zoom_for_dpi(72), 1.0);
        assert_eq!(zoom_for_dpi(144), 2.0);
    }

    #[test]
    fn test_pixels_to_points() {
        let rect = PointRect::from_pixels(&PixelRect::new(10, 20, 110, 60), 2.0, 2.0);
        assert_eq!(rect, PointRect::new(5.0, 10.0, 55.0, 30.0));
    }

    #[test]
    fn test_round_trip_covers_original() {
        let zoom = zoom_for_dpi(200);
        let original = PixelRect::new(13, 27, 131, 55);
        let back = PointRect::from_pixels(&original, zoom, zoom).to_pixels(zoom, zoom);
        assert!(back.x0 <= original.x0 && back.y0 <= original.y0);
        assert!(back.x1 >= original.x1 && back.y1 >= original.y1);
        assert!(original.x0 - back.x0 <= 1 && back.x1 - original.x1 <= 1);
    }
}
