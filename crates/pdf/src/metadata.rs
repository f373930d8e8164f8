//! 输出文件的元信息

use lopdf::{Dictionary, Document, Object, StringFormat};
use std::path::Path;

use crate::{PdfError, Result};

/// 工具标识
pub struct BrandInfo {
    pub name: &'static str,
    pub version: &'static str,
}

pub const BRAND: BrandInfo = BrandInfo {
    name: "pii-redact",
    version: env!("CARGO_PKG_VERSION"),
};

/// 在已写出的 PDF 上标记脱敏信息并原地保存
pub fn stamp_redaction_metadata(path: &Path) -> Result<()> {
    let mut doc = Document::load(path).map_err(|e| PdfError::Metadata(e.to_string()))?;
    set_redaction_metadata(&mut doc);
    doc.save(path)
        .map_err(|e| PdfError::Metadata(e.to_string()))?;
    Ok(())
}

fn literal(value: &str) -> Object {
    Object::String(value.as_bytes().to_vec(), StringFormat::Literal)
}

/// 在 Info 字典中写入 Producer、ModDate 与脱敏标记
fn set_redaction_metadata(doc: &mut Document) {
    let info_id = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => *id,
        _ => {
            let new_id = doc.add_object(Object::Dictionary(Dictionary::new()));
            doc.trailer.set("Info", Object::Reference(new_id));
            new_id
        }
    };

    // PDF 日期格式 D:YYYYMMDDHHmmSS
    let pdf_date = format!("D:{}", chrono::Utc::now().format("%Y%m%d%H%M%SZ"));
    let producer = format!("{} v{}", BRAND.name, BRAND.version);

    if let Ok(Object::Dictionary(ref mut info)) = doc.get_object_mut(info_id) {
        info.set("Producer", literal(&producer));
        info.set("ModDate", literal(&pdf_date));
        info.set("Redacted", literal("true"));
        info.set("RedactedBy", literal(&producer));
        info.set("RedactedAt", literal(&pdf_date));
    }

    log::info!("[PDF] 已写入脱敏元信息: Producer={}, ModDate={}", producer, pdf_date);
}
