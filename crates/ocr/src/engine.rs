//! OCR 引擎 trait 定义

use image::RgbImage;

use crate::error::OcrError;
use crate::types::{OcrAuditInfo, Token};

/// OCR 引擎统一 trait
pub trait OcrEngine: Send + Sync {
    /// 识别图片中的单词
    ///
    /// 只返回非空文本；引擎本身执行失败时返回错误，由调用方决定是否放弃该文档。
    fn recognize(&self, img: &RgbImage, lang: &str) -> Result<Vec<Token>, OcrError>;

    /// 获取审计信息
    fn audit_info(&self) -> OcrAuditInfo;
}
