//! OCR 引擎集成
//!
//! 对外只暴露单词级识别结果：文本、置信度与像素边界框。
//! 当前实现为 Tesseract CLI 包装。

mod engine;
mod error;
mod tesseract;
mod types;

pub use engine::OcrEngine;
pub use error::OcrError;
pub use tesseract::{
    get_tesseract_langs, get_tesseract_version, parse_tesseract_tsv, TesseractEngine,
};
pub use types::{OcrAuditInfo, TesseractConfig, Token};
