//! 脱敏区域与审计记录

use pii_render::PixelRect;
use serde::{Deserialize, Serialize};

/// 二维码区域的标签
pub const QR_LABEL: &str = "QR";

/// 待脱敏区域
///
/// 坐标位于产生 token 的图片的像素空间；PDF 页面在应用前再换算为点坐标。
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
    pub label: String,
    pub source_text: String,
    pub confidence: f32,
}

impl Region {
    /// 坐标顺序会被规整为 x0 <= x1、y0 <= y1
    pub fn new(
        bounds: (i32, i32, i32, i32),
        label: impl Into<String>,
        source_text: impl Into<String>,
        confidence: f32,
    ) -> Self {
        let (ax, ay, bx, by) = bounds;
        Self {
            x0: ax.min(bx),
            y0: ay.min(by),
            x1: ax.max(bx),
            y1: ay.max(by),
            label: label.into(),
            source_text: source_text.into(),
            confidence,
        }
    }

    /// 二维码区域：不携带文本，只计数
    pub fn qr(rect: &PixelRect) -> Self {
        Self::new((rect.x0, rect.y0, rect.x1, rect.y1), QR_LABEL, "", 0.0)
    }

    pub fn bounds(&self) -> PixelRect {
        PixelRect::new(self.x0, self.y0, self.x1, self.y1)
    }

    /// 审计用投影
    pub fn record(&self) -> DetectionRecord {
        DetectionRecord {
            label: self.label.clone(),
            text: self.source_text.clone(),
            conf: self.confidence,
            bbox: [self.x0, self.y0, self.x1, self.y1],
        }
    }
}

/// 审计文件中的一条检测记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub label: String,
    pub text: String,
    pub conf: f32,
    pub bbox: [i32; 4],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_are_normalised() {
        let region = Region::new((50, 40, 10, 20), "PAN", "ABCDE1234F", 88.0);
        assert_eq!((region.x0, region.y0, region.x1, region.y1), (10, 20, 50, 40));
    }

    #[test]
    fn test_record_projection() {
        let region = Region::new((10, 10, 120, 30), "EMAIL", "user@example.com", 90.0);
        let record = region.record();
        assert_eq!(record.label, "EMAIL");
        assert_eq!(record.text, "user@example.com");
        assert_eq!(record.bbox, [10, 10, 120, 30]);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["conf"], 90.0);
    }

    #[test]
    fn test_qr_region_has_no_text() {
        let region = Region::qr(&PixelRect::new(0, 0, 30, 30));
        assert_eq!(region.label, QR_LABEL);
        assert!(region.source_text.is_empty());
        assert_eq!(region.bounds(), PixelRect::new(0, 0, 30, 30));
    }
}
