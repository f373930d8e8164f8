//! OCR 共享类型定义

use serde::{Deserialize, Serialize};

/// OCR 识别出的单词
///
/// 坐标为识别图片上的像素偏移，只在同一页面/图片内有意义。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub confidence: f32,
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl Token {
    /// 置信度无法解析时使用的哨兵值，低于任何实际阈值
    pub const UNKNOWN_CONFIDENCE: f32 = -1.0;

    pub fn new(
        text: impl Into<String>,
        confidence: f32,
        left: i32,
        top: i32,
        width: i32,
        height: i32,
    ) -> Self {
        Self {
            text: text.into(),
            confidence,
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.top + self.height
    }
}

/// Tesseract 配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct TesseractConfig {
    /// Tesseract 可执行文件路径
    pub binary_path: Option<String>,
    /// tessdata 目录路径
    pub tessdata_path: Option<String>,
    /// 页面分割模式 (0-13)
    pub psm: Option<u8>,
    /// OCR 引擎模式 (0-3)
    pub oem: Option<u8>,
    /// 单次识别超时（秒）
    pub timeout_secs: Option<u64>,
}

impl TesseractConfig {
    pub fn binary_or_default(&self) -> &str {
        self.binary_path.as_deref().unwrap_or("tesseract")
    }

    pub fn psm_or_default(&self) -> u8 {
        self.psm.unwrap_or(3)
    }

    pub fn oem_or_default(&self) -> u8 {
        self.oem.unwrap_or(3)
    }

    pub fn timeout_or_default(&self) -> u64 {
        self.timeout_secs.unwrap_or(120)
    }
}

/// OCR 审计信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrAuditInfo {
    /// 引擎名称
    pub engine: String,
    /// 引擎版本
    pub version: Option<String>,
    /// 引擎参数（JSON）
    pub params: Option<serde_json::Value>,
}
