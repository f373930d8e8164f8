//! Command-line driver: option resolution, file discovery, batch processing.

pub mod config;

pub use config::{load_config, ConfigError, PdfiumConfig, RedactConfig};

use anyhow::Context;
use clap::Parser;
use image::Rgb;
use pii_core::{CoreError, DocumentKind, Pipeline, PipelineOptions};
use pii_core::{DEFAULT_DPI, DEFAULT_LANG, DEFAULT_MIN_CONFIDENCE};
use pii_ocr::{OcrEngine, TesseractConfig, TesseractEngine};
use pii_pdf::{PdfiumEngine, DEFAULT_FLATTEN_DPI};
use pii_render::{RedactionStyle, SymbolLocator};
use pii_rules::{parse_field_list, Registry, RuleSpec, DEFAULT_FIELDS};
use std::path::{Path, PathBuf};

/// 默认处理的扩展名
pub const DEFAULT_EXTENSIONS: &[&str] = &[".pdf", ".png", ".jpg", ".jpeg", ".tif", ".tiff", ".bmp"];

/// Redact PII from scanned images and PDFs using OCR and pattern rules.
#[derive(Parser, Debug, Clone)]
#[command(name = "pii-redact", version, about)]
pub struct Cli {
    /// Input file or directory (directories are searched recursively)
    pub input: PathBuf,

    /// Output directory for redacted files and audits
    #[arg(long = "out", default_value = "out")]
    pub out_dir: PathBuf,

    /// Redaction style for images: black or blur (PDFs are always filled)
    #[arg(long)]
    pub style: Option<RedactionStyle>,

    /// OCR language hint, e.g. eng+hin
    #[arg(long)]
    pub lang: Option<String>,

    /// Minimum OCR confidence for word-level matches
    #[arg(long = "min-conf")]
    pub min_conf: Option<f32>,

    /// Comma-separated fields to redact (unknown fields are ignored)
    #[arg(long)]
    pub fields: Option<String>,

    /// Comma-separated file extensions to process
    #[arg(long)]
    pub extensions: Option<String>,

    /// Rasterization DPI for PDF pages
    #[arg(long)]
    pub dpi: Option<u32>,

    /// JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Check that every redacted area is fully opaque in the output
    #[arg(long)]
    pub verify: bool,

    /// Exit with status 2 if any document failed
    #[arg(long)]
    pub fail_on_error: bool,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// 合并命令行、配置文件与默认值后的运行参数
#[derive(Debug, Clone)]
pub struct Settings {
    pub input: PathBuf,
    pub out_dir: PathBuf,
    /// 用户请求的字段（大写），原样写入审计
    pub fields: Vec<String>,
    /// 小写、带点的扩展名
    pub extensions: Vec<String>,
    pub options: PipelineOptions,
    pub tesseract: TesseractConfig,
    pub pdfium_dir: Option<PathBuf>,
    pub flatten_dpi: u32,
    pub rules: Vec<RuleSpec>,
}

impl Settings {
    pub fn resolve(cli: &Cli, config: RedactConfig) -> Self {
        let fields = match (&cli.fields, &config.fields) {
            (Some(raw), _) => parse_field_list(raw),
            (None, Some(list)) => parse_field_list(&list.join(",")),
            (None, None) => DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect(),
        };

        let extensions = match (&cli.extensions, &config.extensions) {
            (Some(raw), _) => normalize_extensions(raw.split(',')),
            (None, Some(list)) => normalize_extensions(list.iter().map(String::as_str)),
            (None, None) => normalize_extensions(DEFAULT_EXTENSIONS.iter().copied()),
        };

        let options = PipelineOptions {
            style: cli.style.or(config.style).unwrap_or_default(),
            lang: cli
                .lang
                .clone()
                .or(config.lang)
                .unwrap_or_else(|| DEFAULT_LANG.to_string()),
            min_confidence: cli
                .min_conf
                .or(config.min_confidence)
                .unwrap_or(DEFAULT_MIN_CONFIDENCE),
            dpi: cli.dpi.or(config.dpi).unwrap_or(DEFAULT_DPI).max(1),
            fill: Rgb(config.fill_color.unwrap_or([0, 0, 0])),
            verify: cli.verify,
        };

        Self {
            input: cli.input.clone(),
            out_dir: cli.out_dir.clone(),
            fields,
            extensions,
            options,
            tesseract: config.tesseract,
            pdfium_dir: config.pdfium.library_path.map(PathBuf::from),
            flatten_dpi: config.pdfium.flatten_dpi.unwrap_or(DEFAULT_FLATTEN_DPI),
            rules: config.rules,
        }
    }
}

/// 统一为小写并补齐前导点，忽略空项
fn normalize_extensions<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    raw.map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty() && e != ".")
        .map(|e| if e.starts_with('.') { e } else { format!(".{}", e) })
        .collect()
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .is_some_and(|ext| extensions.contains(&ext))
}

/// 收集待处理文件
///
/// 文件路径原样返回；目录递归遍历，只保留扩展名在列表中的文件，结果排序。
pub fn collect_inputs(path: &Path, extensions: &[String]) -> std::io::Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("input not found: {}", path.display()),
        ));
    }

    let mut files = Vec::new();
    walk_dir(path, extensions, &mut files)?;
    files.sort();
    Ok(files)
}

fn walk_dir(dir: &Path, extensions: &[String], files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let Ok(entry) = entry else {
            continue;
        };
        let path = entry.path();
        // file_type 不跟随符号链接：链接到目录的项不再进入，避免重复与循环
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            if let Err(e) = walk_dir(&path, extensions, files) {
                log::warn!("[Batch] 无法读取目录 {}: {}", path.display(), e);
            }
        } else if file_type.is_symlink() && path.is_dir() {
            log::debug!("[Batch] 跳过目录链接: {}", path.display());
        } else if path.is_file() && has_extension(&path, extensions) {
            files.push(path);
        }
    }
    Ok(())
}

/// 批处理统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// 逐个处理文件；单个文件失败不会中断批处理
pub fn run_batch(pipeline: &Pipeline<'_>, inputs: &[PathBuf], out_dir: &Path) -> BatchSummary {
    let mut summary = BatchSummary::default();

    for (idx, input) in inputs.iter().enumerate() {
        log::info!("[Batch] ({}/{}) {}", idx + 1, inputs.len(), input.display());
        match pipeline.process(input, out_dir) {
            Ok(report) => {
                summary.processed += 1;
                log::info!(
                    "[Batch] 完成 {} -> {}（{} 个区域）",
                    input.display(),
                    report.output.display(),
                    report.audit.counts.regions
                );
            }
            Err(CoreError::Unsupported { path }) => {
                summary.skipped += 1;
                log::warn!("[Batch] 跳过不支持的文件: {}", path);
            }
            Err(e) => {
                summary.failed += 1;
                log::error!("[Batch] 处理失败 {}: {}", input.display(), e);
            }
        }
    }

    log::info!(
        "[Batch] 结束: 成功 {}，跳过 {}，失败 {}",
        summary.processed,
        summary.skipped,
        summary.failed
    );
    summary
}

/// 解析参数、创建引擎并运行批处理
pub fn run(cli: &Cli) -> anyhow::Result<BatchSummary> {
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RedactConfig::default(),
    };
    let settings = Settings::resolve(cli, config);

    let registry = Registry::builtin()?
        .with_overrides(&settings.rules)
        .context("invalid rule in configuration")?;
    let rules = registry.resolve(&settings.fields[..]);
    if rules.is_empty() {
        log::warn!("[Batch] 没有可用的字段规则，只会脱敏二维码");
    } else {
        log::info!("[Batch] 启用规则: {}", rules.labels().join(", "));
    }

    let inputs = collect_inputs(&settings.input, &settings.extensions)
        .with_context(|| format!("cannot read input {}", settings.input.display()))?;
    log::info!("[Batch] 共 {} 个文件", inputs.len());

    let ocr = TesseractEngine::new(settings.tesseract.clone())
        .context("tesseract is not available")?;
    match ocr.missing_languages(&settings.options.lang) {
        Ok(missing) if !missing.is_empty() => {
            log::warn!("[OCR] 缺少语言包: {}", missing.join(", "));
        }
        Err(e) => log::debug!("[OCR] 无法列出语言包: {}", e),
        _ => {}
    }
    log::info!("[OCR] 引擎: {:?}", ocr.audit_info().version);

    let needs_pdf = inputs
        .iter()
        .any(|p| DocumentKind::from_path(p) == Some(DocumentKind::Pdf));
    let pdfium = if needs_pdf {
        match PdfiumEngine::bind(settings.pdfium_dir.as_deref(), settings.flatten_dpi) {
            Ok(engine) => Some(engine),
            Err(e) => {
                log::error!("[PDF] {}；PDF 文件将处理失败", e);
                None
            }
        }
    } else {
        None
    };

    let qr = SymbolLocator::default();
    let mut pipeline = Pipeline::new(
        &rules,
        settings.fields.clone(),
        &ocr,
        &qr,
        settings.options.clone(),
    );
    if let Some(engine) = pdfium.as_ref() {
        pipeline = pipeline.with_pdf_engine(engine);
    }

    Ok(run_batch(&pipeline, &inputs, &settings.out_dir))
}
