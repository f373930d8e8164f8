//! 条形码定位
//!
//! rxing 识别一维码（EAN、UPC、Code128 等）以及 PDF417、DataMatrix、Aztec。
//! 二维码交给 rqrr，这里跳过 QR 结果，避免同一个码被计两次。

use image::{imageops, GrayImage, RgbImage};
use rxing::{BarcodeFormat, Point};

use crate::qr::{QrLocator, RqrrLocator};
use crate::PixelRect;

/// 低于此灰度视为条
const DARK_THRESHOLD: u8 = 128;

/// 外接矩形四周额外留出的像素
const SYMBOL_PADDING: i32 = 4;

/// 高度不足此值的结果视为一维码的扫描线，需要向上下延伸
const MIN_SYMBOL_HEIGHT: i32 = 4;

/// 基于 rxing 的条形码定位
#[derive(Debug, Clone, Copy, Default)]
pub struct RxingLocator;

impl QrLocator for RxingLocator {
    fn locate(&self, img: &RgbImage) -> Vec<PixelRect> {
        let gray = imageops::grayscale(img);
        let (width, height) = gray.dimensions();

        let results =
            match rxing::helpers::detect_multiple_in_luma(gray.as_raw().clone(), width, height) {
                Ok(results) => results,
                Err(e) => {
                    log::debug!("[Barcode] 未检测到条形码: {}", e);
                    return Vec::new();
                }
            };

        let rects: Vec<PixelRect> = results
            .iter()
            .filter(|r| *r.getBarcodeFormat() != BarcodeFormat::QR_CODE)
            .filter_map(|r| symbol_rect(&gray, r.getPoints()))
            .collect();

        if !rects.is_empty() {
            log::info!("[Barcode] 检测到 {} 个条形码", rects.len());
        }
        rects
    }
}

/// 二维码 + 条形码
#[derive(Debug, Clone, Copy, Default)]
pub struct SymbolLocator {
    qr: RqrrLocator,
    barcode: RxingLocator,
}

impl QrLocator for SymbolLocator {
    fn locate(&self, img: &RgbImage) -> Vec<PixelRect> {
        let mut rects = self.qr.locate(img);
        rects.extend(self.barcode.locate(img));
        rects
    }
}

/// 由识别结果的特征点求外接矩形
///
/// 一维码只返回扫描线两端的点，矩形高度为零；这时沿条的方向补齐整个码，
/// 并把两端的起止符包含进来。
fn symbol_rect(gray: &GrayImage, points: &[Point]) -> Option<PixelRect> {
    if points.is_empty() || gray.width() == 0 || gray.height() == 0 {
        return None;
    }

    let min_x = points.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
    let max_x = points.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
    let min_y = points.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
    let max_y = points.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);

    let mut rect = PixelRect::new(
        min_x.floor() as i32,
        min_y.floor() as i32,
        max_x.ceil() as i32,
        max_y.ceil() as i32,
    );

    if rect.y1 - rect.y0 < MIN_SYMBOL_HEIGHT {
        let row = ((rect.y0 + rect.y1) / 2).clamp(0, gray.height() as i32 - 1) as u32;
        rect = bar_extent(gray, rect.x0, rect.x1, row);
    }

    let padded = PixelRect::new(
        rect.x0 - SYMBOL_PADDING,
        rect.y0 - SYMBOL_PADDING,
        rect.x1 + SYMBOL_PADDING,
        rect.y1 + SYMBOL_PADDING,
    );
    (!padded.is_empty()).then_some(padded)
}

fn is_dark(gray: &GrayImage, x: u32, y: u32) -> bool {
    gray.get_pixel(x, y)[0] < DARK_THRESHOLD
}

/// 行内 [x0, x1) 的明暗交替次数
fn transitions(gray: &GrayImage, x0: u32, x1: u32, y: u32) -> usize {
    let mut count = 0;
    let mut prev = None;
    for x in x0..x1 {
        let dark = is_dark(gray, x, y);
        if prev.is_some_and(|p| p != dark) {
            count += 1;
        }
        prev = Some(dark);
    }
    count
}

/// 从扫描线出发求一维码的完整范围
///
/// 水平方向：只要相邻空白不超过几个条宽就继续向外扩展，静区会让扩展停下。
/// 垂直方向：上下逐行检查，明暗交替次数不少于扫描线一半的行仍属于条码。
fn bar_extent(gray: &GrayImage, x0: i32, x1: i32, row: u32) -> PixelRect {
    let width = gray.width() as i32;
    let height = gray.height();
    let mut left = x0.clamp(0, width) as u32;
    let mut right = x1.clamp(0, width) as u32;

    let reference = transitions(gray, left, right, row);
    if reference == 0 {
        return PixelRect::new(left as i32, row as i32, right as i32, row as i32 + 1);
    }

    let gap = 3 * (right - left) / reference as u32 + 1;

    // 左侧：在 gap 范围内还能找到暗像素就继续
    while let Some(x) = (left.saturating_sub(gap)..left)
        .rev()
        .find(|&x| is_dark(gray, x, row))
    {
        left = x;
    }
    // 右侧
    while let Some(x) = (right..(right + gap).min(width as u32)).find(|&x| is_dark(gray, x, row))
    {
        right = x + 1;
    }

    let min_transitions = (reference / 2).max(1);
    let mut top = row;
    while top > 0 && transitions(gray, left, right, top - 1) >= min_transitions {
        top -= 1;
    }
    let mut bottom = row;
    while bottom + 1 < height && transitions(gray, left, right, bottom + 1) >= min_transitions {
        bottom += 1;
    }

    PixelRect::new(left as i32, top as i32, right as i32, bottom as i32 + 1)
}
