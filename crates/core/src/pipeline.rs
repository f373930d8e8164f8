//! 文档处理流程
//!
//! 图片：二维码检测 -> OCR -> 区域合并 -> 脱敏 -> 保存图片与审计。
//! PDF：逐页栅格化 -> 二维码检测 -> OCR -> 区域合并 -> 像素换算为点坐标
//! -> 登记脱敏，最后一次性写出文档与审计。

use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use pii_ocr::OcrEngine;
use pii_pdf::{stamp_redaction_metadata, PdfEngine, PointRect};
use pii_render::{fill_rects, redact_image, PixelRect, QrLocator, RedactionStyle};
use pii_rules::RuleSet;
use pii_verify::{verify_filled, VerifyResult, DEFAULT_TOLERANCE};

use crate::audit::{
    audit_path, redacted_path, sha256_file, write_audit, Audit, AuditBody, AuditCounts, PageAudit,
};
use crate::detect::{aggregate_lines, match_tokens, resolve_regions};
use crate::region::{DetectionRecord, Region};
use crate::{CoreError, Result, DEFAULT_DPI, DEFAULT_LANG, DEFAULT_MIN_CONFIDENCE, IMAGE_EXTENSIONS};

const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// 文档类型，按扩展名判断
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Image,
    Pdf,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        if ext == "pdf" {
            Some(DocumentKind::Pdf)
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(DocumentKind::Image)
        } else {
            None
        }
    }
}

/// 处理参数
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub style: RedactionStyle,
    /// OCR 语言提示
    pub lang: String,
    /// 单词级匹配的最低置信度
    pub min_confidence: f32,
    /// PDF 栅格化分辨率
    pub dpi: u32,
    /// PDF 脱敏填充色
    pub fill: Rgb<u8>,
    /// 处理完成后检查脱敏区域是否完全不透明
    pub verify: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            style: RedactionStyle::Black,
            lang: DEFAULT_LANG.to_string(),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            dpi: DEFAULT_DPI,
            fill: BLACK,
            verify: false,
        }
    }
}

/// 单页（或单张图片）的检测结果
#[derive(Debug, Clone)]
pub struct PageScan {
    /// 已涂黑二维码的工作图
    pub working: RgbImage,
    pub regions: Vec<Region>,
    pub records: Vec<DetectionRecord>,
    pub qr_redacted: usize,
}

/// 单个文档的处理结果
#[derive(Debug, Clone)]
pub struct DocumentReport {
    pub output: PathBuf,
    pub audit_path: PathBuf,
    pub audit: Audit,
}

/// 文档处理器
///
/// 规则集与各引擎均以引用注入，处理器本身不持有可变状态。
pub struct Pipeline<'a> {
    rules: &'a RuleSet,
    fields: Vec<String>,
    ocr: &'a dyn OcrEngine,
    qr: &'a dyn QrLocator,
    pdf: Option<&'a dyn PdfEngine>,
    options: PipelineOptions,
}

impl<'a> Pipeline<'a> {
    /// `fields` 为用户请求的字段列表，原样写入审计
    pub fn new(
        rules: &'a RuleSet,
        fields: Vec<String>,
        ocr: &'a dyn OcrEngine,
        qr: &'a dyn QrLocator,
        options: PipelineOptions,
    ) -> Self {
        Self {
            rules,
            fields,
            ocr,
            qr,
            pdf: None,
            options,
        }
    }

    /// 启用 PDF 处理
    pub fn with_pdf_engine(mut self, engine: &'a dyn PdfEngine) -> Self {
        self.pdf = Some(engine);
        self
    }

    /// 按扩展名分派
    pub fn process(&self, input: &Path, out_dir: &Path) -> Result<DocumentReport> {
        match DocumentKind::from_path(input) {
            Some(DocumentKind::Pdf) => self.process_pdf(input, out_dir),
            Some(DocumentKind::Image) => self.process_image(input, out_dir),
            None => Err(CoreError::Unsupported {
                path: input.display().to_string(),
            }),
        }
    }

    /// 检测一张图片上的全部脱敏区域
    ///
    /// 二维码先在工作图上涂黑，再交给 OCR，避免二维码图案被识别为文字。
    pub fn scan_page(&self, img: &RgbImage) -> Result<PageScan> {
        let qr_rects = self.qr.locate(img);
        let mut working = img.clone();
        fill_rects(&mut working, &qr_rects, BLACK);

        let tokens = self.ocr.recognize(&working, &self.options.lang)?;
        log::debug!("[Pipeline] OCR 返回 {} 个单词", tokens.len());

        let (token_regions, mut records) =
            match_tokens(&tokens, self.rules, self.options.min_confidence);
        let (line_regions, line_records) = aggregate_lines(&tokens, self.rules);
        records.extend(line_records);

        let qr_regions = qr_rects.iter().map(Region::qr).collect();
        let regions = resolve_regions(token_regions, line_regions, qr_regions);

        Ok(PageScan {
            working,
            regions,
            records,
            qr_redacted: qr_rects.len(),
        })
    }

    /// 处理栅格图片
    pub fn process_image(&self, input: &Path, out_dir: &Path) -> Result<DocumentReport> {
        log::info!("[Pipeline] 处理图片: {}", input.display());

        let img = image::open(input)
            .map_err(|e| CoreError::ImageLoad {
                path: input.display().to_string(),
                reason: e.to_string(),
            })?
            .to_rgb8();

        let scan = self.scan_page(&img)?;
        let rects: Vec<PixelRect> = scan.regions.iter().map(Region::bounds).collect();
        let redacted = redact_image(&scan.working, &rects, self.options.style);

        fs::create_dir_all(out_dir)?;
        let output = redacted_path(input, out_dir);
        redacted.save(&output).map_err(|e| CoreError::ImageSave {
            path: output.display().to_string(),
            reason: e.to_string(),
        })?;

        let verification = if self.options.verify {
            self.verify_image(&output, &rects)
        } else {
            None
        };

        log::info!(
            "[Pipeline] 图片完成: {} 条检测, {} 个二维码, {} 个区域",
            scan.records.len(),
            scan.qr_redacted,
            scan.regions.len()
        );

        let body = AuditBody::Image {
            detections: scan.records,
            qr_redacted: scan.qr_redacted,
        };
        self.finish(input, output, body, scan.regions.len(), None, verification)
    }

    /// 处理 PDF
    pub fn process_pdf(&self, input: &Path, out_dir: &Path) -> Result<DocumentReport> {
        let engine = self.pdf.ok_or(CoreError::PdfUnavailable)?;
        log::info!("[Pipeline] 处理 PDF: {}", input.display());

        let mut session = engine.open(input)?;
        let total = session.page_count();
        let mut pages = Vec::with_capacity(total);
        let mut applied: Vec<(usize, Vec<PointRect>)> = Vec::new();
        let mut region_count = 0;

        for index in 0..total {
            let raster = session.rasterize(index, self.options.dpi)?;
            if !(raster.scale_x > 0.0 && raster.scale_y > 0.0) {
                return Err(CoreError::InvalidScale {
                    page: index + 1,
                    scale_x: raster.scale_x,
                    scale_y: raster.scale_y,
                });
            }

            let scan = self.scan_page(&raster.image)?;
            let rects: Vec<PointRect> = scan
                .regions
                .iter()
                .map(|r| PointRect::from_pixels(&r.bounds(), raster.scale_x, raster.scale_y))
                .collect();

            if !rects.is_empty() {
                session.apply_redactions(index, &rects, self.options.fill)?;
                applied.push((index, rects));
            }

            log::info!(
                "[Pipeline] 第 {}/{} 页: {} 条检测, {} 个二维码",
                index + 1,
                total,
                scan.records.len(),
                scan.qr_redacted
            );

            region_count += scan.regions.len();
            pages.push(PageAudit {
                page: index + 1,
                detections: scan.records,
                qr_redacted: scan.qr_redacted,
            });
        }

        fs::create_dir_all(out_dir)?;
        let output = redacted_pdf_path(input, out_dir);
        session.save(&output)?;
        drop(session);

        if let Err(e) = stamp_redaction_metadata(&output) {
            log::warn!("[Pipeline] 写入 PDF 元信息失败: {}", e);
        }

        let verification = if self.options.verify {
            Some(self.verify_pdf(engine, &output, &applied))
        } else {
            None
        };

        let body = AuditBody::Pdf { pages };
        self.finish(
            input,
            output,
            body,
            region_count,
            Some(self.options.dpi),
            verification,
        )
    }

    /// 重新读取输出图片检查填充；模糊样式无法校验
    fn verify_image(&self, output: &Path, rects: &[PixelRect]) -> Option<VerifyResult> {
        if self.options.style != RedactionStyle::Black {
            log::debug!("[Verify] 模糊样式不做不透明度校验");
            return None;
        }

        let result = match image::open(output) {
            Ok(img) => verify_filled(&img.to_rgb8(), rects, BLACK, DEFAULT_TOLERANCE, "image"),
            Err(e) => VerifyResult {
                ok: false,
                warnings: vec![format!("cannot reopen output: {}", e)],
            },
        };
        report_verification(output, &result);
        Some(result)
    }

    /// 重新打开输出 PDF，按 OCR 分辨率渲染已脱敏页面并检查填充
    fn verify_pdf(
        &self,
        engine: &dyn PdfEngine,
        output: &Path,
        applied: &[(usize, Vec<PointRect>)],
    ) -> VerifyResult {
        let mut result = VerifyResult::passed();

        let session = match engine.open(output) {
            Ok(session) => session,
            Err(e) => {
                result.ok = false;
                result.warnings.push(format!("cannot reopen output: {}", e));
                report_verification(output, &result);
                return result;
            }
        };

        for (index, rects) in applied {
            let context = format!("page {}", index + 1);
            match session.rasterize(*index, self.options.dpi) {
                Ok(raster) => {
                    let pixels: Vec<PixelRect> = rects
                        .iter()
                        .map(|r| r.to_pixels(raster.scale_x, raster.scale_y))
                        .collect();
                    result.merge(verify_filled(
                        &raster.image,
                        &pixels,
                        self.options.fill,
                        DEFAULT_TOLERANCE,
                        &context,
                    ));
                }
                Err(e) => {
                    result.ok = false;
                    result.warnings.push(format!("{}: {}", context, e));
                }
            }
        }

        report_verification(output, &result);
        result
    }

    /// 计算哈希、汇总计数并写出审计
    fn finish(
        &self,
        input: &Path,
        output: PathBuf,
        body: AuditBody,
        regions: usize,
        dpi: Option<u32>,
        verification: Option<VerifyResult>,
    ) -> Result<DocumentReport> {
        let counts = AuditCounts {
            detections: body.detection_count(),
            qr_redacted: body.qr_count(),
            regions,
        };

        let audit = Audit {
            input: input.display().to_string(),
            output: output.display().to_string(),
            body,
            fields_redacted: self.fields.clone(),
            counts,
            style: self.options.style,
            dpi,
            ocr: self.ocr.audit_info(),
            input_sha256: sha256_file(input)?,
            output_sha256: sha256_file(&output)?,
            generated_at: chrono::Utc::now().to_rfc3339(),
            verification,
        };

        let out_dir = output.parent().unwrap_or_else(|| Path::new("."));
        let audit_path = audit_path(input, out_dir);
        write_audit(&audit, &audit_path)?;

        Ok(DocumentReport {
            output,
            audit_path,
            audit,
        })
    }
}

/// PDF 输出统一使用小写 `.pdf`
fn redacted_pdf_path(input: &Path, out_dir: &Path) -> PathBuf {
    redacted_path(input, out_dir).with_extension("pdf")
}

fn report_verification(output: &Path, result: &VerifyResult) {
    if result.ok {
        log::info!("[Verify] {} 校验通过", output.display());
    } else {
        for warning in &result.warnings {
            log::warn!("[Verify] {}: {}", output.display(), warning);
        }
    }
}
