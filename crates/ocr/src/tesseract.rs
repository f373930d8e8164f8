//! Tesseract OCR 引擎实现（CLI 包装）

use image::{ImageFormat, RgbImage};
use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::engine::OcrEngine;
use crate::error::OcrError;
use crate::types::{OcrAuditInfo, TesseractConfig, Token};

/// 轮询子进程状态的间隔
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Tesseract OCR 引擎
pub struct TesseractEngine {
    config: TesseractConfig,
    version: Option<String>,
}

impl TesseractEngine {
    /// 创建 Tesseract 引擎（会验证可执行文件是否可用）
    pub fn new(config: TesseractConfig) -> Result<Self, OcrError> {
        let version = get_tesseract_version(config.binary_or_default())?;

        log::info!("[Tesseract] 初始化成功，版本: {}", version);

        Ok(Self {
            config,
            version: Some(version),
        })
    }

    /// 可用语言列表
    pub fn languages(&self) -> Result<Vec<String>, OcrError> {
        get_tesseract_langs(
            self.config.binary_or_default(),
            self.config.tessdata_path.as_deref(),
        )
    }

    /// 返回语言提示中未安装的语言（如 "eng+hin" 中缺少的 "hin"）
    pub fn missing_languages(&self, lang: &str) -> Result<Vec<String>, OcrError> {
        let installed = self.languages()?;
        Ok(lang
            .split('+')
            .map(str::trim)
            .filter(|l| !l.is_empty() && !installed.iter().any(|i| i == l))
            .map(str::to_string)
            .collect())
    }

    fn run(&self, image_path: &str, lang: &str) -> Result<String, OcrError> {
        let binary = self.config.binary_or_default();
        let mut cmd = Command::new(binary);

        cmd.arg(image_path)
            .arg("stdout")
            .arg("-l")
            .arg(lang)
            .arg("--psm")
            .arg(self.config.psm_or_default().to_string())
            .arg("--oem")
            .arg(self.config.oem_or_default().to_string())
            .arg("tsv");

        // 设置 tessdata 路径
        if let Some(tessdata_path) = &self.config.tessdata_path {
            cmd.env("TESSDATA_PREFIX", tessdata_path);
        }

        log::debug!(
            "[Tesseract] 执行: {} {} -l {} --psm {} --oem {} tsv",
            binary,
            image_path,
            lang,
            self.config.psm_or_default(),
            self.config.oem_or_default()
        );

        let timeout = Duration::from_secs(self.config.timeout_or_default());
        let (status, stdout, stderr) = run_with_timeout(cmd, binary, timeout)?;

        if !status.success() {
            return Err(OcrError::Failed(format!(
                "Tesseract 执行失败 ({}): {}",
                status,
                String::from_utf8_lossy(&stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, img: &RgbImage, lang: &str) -> Result<Vec<Token>, OcrError> {
        let start = Instant::now();

        // 写入临时文件，离开作用域时自动删除
        let temp_input = tempfile::Builder::new()
            .prefix("pii_ocr_")
            .suffix(".png")
            .tempfile()?;

        img.save_with_format(temp_input.path(), ImageFormat::Png)
            .map_err(|e| OcrError::ImageProcess(format!("保存临时图片失败: {}", e)))?;

        let tsv = self.run(temp_input.path().to_string_lossy().as_ref(), lang)?;
        let tokens = parse_tesseract_tsv(&tsv);

        log::info!(
            "[Tesseract] 识别完成，耗时: {} ms，单词数: {}",
            start.elapsed().as_millis(),
            tokens.len()
        );

        Ok(tokens)
    }

    fn audit_info(&self) -> OcrAuditInfo {
        let params = serde_json::json!({
            "psm": self.config.psm_or_default(),
            "oem": self.config.oem_or_default(),
        });

        OcrAuditInfo {
            engine: "tesseract".to_string(),
            version: self.version.clone(),
            params: Some(params),
        }
    }
}

/// 运行子进程，超时后强制结束
fn run_with_timeout(
    mut cmd: Command,
    binary: &str,
    timeout: Duration,
) -> Result<(ExitStatus, Vec<u8>, Vec<u8>), OcrError> {
    let mut child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| OcrError::Spawn {
            binary: binary.to_string(),
            source,
        })?;

    // 输出需要在等待期间持续读取，否则管道写满后子进程会阻塞
    let stdout_reader = child.stdout.take().map(|mut out| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = out.read_to_end(&mut buf);
            buf
        })
    });
    let stderr_reader = child.stderr.take().map(|mut err| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = err.read_to_end(&mut buf);
            buf
        })
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            log::warn!("[Tesseract] 超过 {} 秒未完成，终止进程", timeout.as_secs());
            let _ = child.kill();
            let _ = child.wait();
            return Err(OcrError::Timeout(timeout.as_secs()));
        }
        thread::sleep(POLL_INTERVAL);
    };

    let stdout = stdout_reader
        .map(|h| h.join().unwrap_or_default())
        .unwrap_or_default();
    let stderr = stderr_reader
        .map(|h| h.join().unwrap_or_default())
        .unwrap_or_default();

    Ok((status, stdout, stderr))
}

/// 解析 Tesseract TSV 输出
///
/// TSV 格式：
/// level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
///
/// 只保留 word 级别 (level=5) 且文本非空的行。坐标保持像素值；
/// 置信度沿用 Tesseract 的 0-100 刻度，无法解析时记为 [`Token::UNKNOWN_CONFIDENCE`]。
pub fn parse_tesseract_tsv(tsv: &str) -> Vec<Token> {
    let mut tokens = Vec::new();

    for line in tsv.lines().skip(1) {
        // 跳过表头
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }

        let level: i32 = cols[0].trim().parse().unwrap_or(-1);
        let text = cols[11].trim();
        if level != 5 || text.is_empty() {
            continue;
        }

        let geometry: Option<Vec<i32>> = cols[6..10]
            .iter()
            .map(|c| c.trim().parse().ok())
            .collect();
        let Some(geometry) = geometry else {
            log::debug!("[Tesseract] 跳过坐标无效的行: {:?}", line);
            continue;
        };

        let confidence = cols[10]
            .trim()
            .parse::<f32>()
            .unwrap_or(Token::UNKNOWN_CONFIDENCE);

        tokens.push(Token::new(
            text,
            confidence,
            geometry[0],
            geometry[1],
            geometry[2],
            geometry[3],
        ));
    }

    tokens
}

/// 获取 Tesseract 版本
pub fn get_tesseract_version(binary_path: &str) -> Result<String, OcrError> {
    let output = Command::new(binary_path)
        .arg("--version")
        .output()
        .map_err(|source| OcrError::Spawn {
            binary: binary_path.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(OcrError::Failed("tesseract --version 执行失败".to_string()));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    Ok(parse_version(&format!("{}{}", stdout, stderr)))
}

/// 解析版本号（通常在第一行，格式为 "tesseract 5.3.0" 或 "tesseract v5.3.0"）
fn parse_version(output: &str) -> String {
    for line in output.lines() {
        if line.contains("tesseract") {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 2 {
                return parts[1].trim_start_matches('v').to_string();
            }
        }
    }
    "unknown".to_string()
}

/// 获取 Tesseract 可用语言列表
pub fn get_tesseract_langs(
    binary_path: &str,
    tessdata_path: Option<&str>,
) -> Result<Vec<String>, OcrError> {
    let mut cmd = Command::new(binary_path);
    cmd.arg("--list-langs");

    if let Some(path) = tessdata_path {
        cmd.env("TESSDATA_PREFIX", path);
    }

    let output = cmd.output().map_err(|source| OcrError::Spawn {
        binary: binary_path.to_string(),
        source,
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    Ok(parse_langs(&format!("{}{}", stdout, stderr)))
}

fn parse_langs(output: &str) -> Vec<String> {
    let mut langs = Vec::new();
    let mut found_list = false;

    for line in output.lines() {
        let line = line.trim();
        if line.contains("List of available languages") {
            found_list = true;
            continue;
        }
        if found_list && !line.is_empty() && !line.contains(':') {
            langs.push(line.to_string());
        }
    }

    langs
}
