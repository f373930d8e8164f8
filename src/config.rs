use pii_ocr::TesseractConfig;
use pii_render::RedactionStyle;
use pii_rules::RuleSpec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 配置文件（JSON）
///
/// 所有字段可选；命令行参数优先于配置文件，配置文件优先于内置默认值。
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RedactConfig {
    // ============ 外部引擎 ============
    /// Tesseract 配置
    pub tesseract: TesseractConfig,
    /// PDFium 配置
    pub pdfium: PdfiumConfig,

    // ============ 脱敏 ============
    /// PDF 脱敏填充色 [r, g, b]
    pub fill_color: Option<[u8; 3]>,
    /// 自定义规则：替换同名内置规则或追加
    pub rules: Vec<RuleSpec>,

    // ============ 命令行默认值 ============
    pub style: Option<RedactionStyle>,
    pub lang: Option<String>,
    pub min_confidence: Option<f32>,
    pub fields: Option<Vec<String>>,
    pub extensions: Option<Vec<String>>,
    pub dpi: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PdfiumConfig {
    /// pdfium 动态库所在目录
    pub library_path: Option<String>,
    /// 重建脱敏页面时的渲染分辨率
    pub flatten_dpi: Option<u32>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub fn load_config(path: &Path) -> Result<RedactConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
        path: path.display().to_string(),
        source,
    })
}
