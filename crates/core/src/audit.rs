//! 审计记录
//!
//! 每个输入文档对应一份 JSON 审计文件；PDF 的逐页检测嵌套在同一份文件中。

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use pii_ocr::OcrAuditInfo;
use pii_render::RedactionStyle;
use pii_verify::VerifyResult;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::region::DetectionRecord;
use crate::Result;

/// PDF 单页审计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageAudit {
    /// 页码，从 1 开始
    pub page: usize,
    pub detections: Vec<DetectionRecord>,
    pub qr_redacted: usize,
}

/// 文档类型相关的部分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuditBody {
    Image {
        detections: Vec<DetectionRecord>,
        qr_redacted: usize,
    },
    Pdf {
        pages: Vec<PageAudit>,
    },
}

impl AuditBody {
    pub fn detection_count(&self) -> usize {
        match self {
            AuditBody::Image { detections, .. } => detections.len(),
            AuditBody::Pdf { pages } => pages.iter().map(|p| p.detections.len()).sum(),
        }
    }

    pub fn qr_count(&self) -> usize {
        match self {
            AuditBody::Image { qr_redacted, .. } => *qr_redacted,
            AuditBody::Pdf { pages } => pages.iter().map(|p| p.qr_redacted).sum(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditCounts {
    pub detections: usize,
    pub qr_redacted: usize,
    /// 实际应用的区域数（单词 + 行 + 二维码，不合并）
    pub regions: usize,
}

/// 文档审计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Audit {
    pub input: String,
    pub output: String,
    #[serde(flatten)]
    pub body: AuditBody,
    pub fields_redacted: Vec<String>,
    pub counts: AuditCounts,
    pub style: RedactionStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dpi: Option<u32>,
    pub ocr: OcrAuditInfo,
    pub input_sha256: String,
    pub output_sha256: String,
    pub generated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerifyResult>,
}

/// 审计文件路径：`{stem}_audit.json`
pub fn audit_path(input: &Path, out_dir: &Path) -> PathBuf {
    out_dir.join(format!("{}_audit.json", file_stem(input)))
}

/// 脱敏输出路径：`{stem}_redacted{.ext}`，保留原扩展名的大小写
pub fn redacted_path(input: &Path, out_dir: &Path) -> PathBuf {
    let name = match input.extension() {
        Some(ext) => format!("{}_redacted.{}", file_stem(input), ext.to_string_lossy()),
        None => format!("{}_redacted", file_stem(input)),
    };
    out_dir.join(name)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string())
}

/// 计算文件的 SHA-256（十六进制小写）
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// 写出审计文件（缩进格式），必要时创建目录
pub fn write_audit(audit: &Audit, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(audit)?;
    fs::write(path, content)?;
    log::info!("[Audit] 已写出: {}", path.display());
    Ok(())
}
