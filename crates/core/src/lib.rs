//! Detection and redaction pipeline.
//!
//! 单词级与行级规则匹配、区域合并、按文档类型驱动 OCR / 二维码 / PDF 引擎，
//! 最后写出脱敏文件和审计记录。

pub mod audit;
pub mod detect;
pub mod pipeline;
pub mod region;

pub use audit::{write_audit, Audit, AuditBody, AuditCounts, PageAudit};
pub use detect::{aggregate_lines, match_tokens, resolve_regions, LINE_BAND};
pub use pipeline::{DocumentKind, DocumentReport, PageScan, Pipeline, PipelineOptions};
pub use region::{DetectionRecord, Region, QR_LABEL};

use pii_ocr::OcrError;
use pii_pdf::PdfError;

/// 支持的栅格图片扩展名（小写，不含点）
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp"];

pub const DEFAULT_LANG: &str = "eng+hin";
pub const DEFAULT_MIN_CONFIDENCE: f32 = 60.0;
pub const DEFAULT_DPI: u32 = 200;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("unsupported file type: {path}")]
    Unsupported { path: String },

    #[error("failed to load image {path}: {reason}")]
    ImageLoad { path: String, reason: String },

    #[error("failed to save image {path}: {reason}")]
    ImageSave { path: String, reason: String },

    #[error("PDF engine unavailable")]
    PdfUnavailable,

    #[error("invalid raster scale on page {page}: ({scale_x}, {scale_y})")]
    InvalidScale { page: usize, scale_x: f32, scale_y: f32 },

    #[error("OCR failed: {0}")]
    Ocr(#[from] OcrError),

    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
