//! 栅格图片脱敏

use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use crate::{PixelRect, RedactionStyle};

/// 模糊半径（高斯 sigma），固定值
pub const BLUR_SIGMA: f32 = 6.0;

const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// 在图片副本上应用脱敏，原图不变
pub fn redact_image(img: &RgbImage, rects: &[PixelRect], style: RedactionStyle) -> RgbImage {
    let mut out = img.clone();
    match style {
        RedactionStyle::Black => fill_rects(&mut out, rects, BLACK),
        RedactionStyle::Blur => {
            for rect in rects {
                blur_rect(&mut out, rect);
            }
        }
    }
    out
}

/// 用纯色填充矩形区域
pub fn fill_rects(img: &mut RgbImage, rects: &[PixelRect], color: Rgb<u8>) {
    let (width, height) = img.dimensions();
    for rect in rects {
        if let Some((x, y, w, h)) = rect.clamp_to(width, height) {
            draw_filled_rect_mut(img, Rect::at(x as i32, y as i32).of_size(w, h), color);
            log::debug!("[Render] 填充: ({}, {}, {}, {})", x, y, w, h);
        }
    }
}

/// 裁剪区域、高斯模糊后贴回原位
fn blur_rect(img: &mut RgbImage, rect: &PixelRect) {
    let (width, height) = img.dimensions();
    let Some((x, y, w, h)) = rect.clamp_to(width, height) else {
        return;
    };
    let region = imageops::crop_imm(img, x, y, w, h).to_image();
    let blurred = imageops::blur(&region, BLUR_SIGMA);
    imageops::replace(img, &blurred, x as i64, y as i64);
    log::debug!("[Render] 模糊: ({}, {}, {}, {})", x, y, w, h);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))
    }

    fn checkerboard(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            if (x + y) % 2 == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        })
    }

    #[test]
    fn test_black_fills_exact_rect() {
        let img = white(100, 60);
        let out = redact_image(&img, &[PixelRect::new(10, 10, 120, 30)], RedactionStyle::Black);

        assert_eq!(*out.get_pixel(10, 10), BLACK);
        assert_eq!(*out.get_pixel(99, 29), BLACK);
        assert_eq!(*out.get_pixel(9, 10), Rgb([255, 255, 255]));
        assert_eq!(*out.get_pixel(50, 30), Rgb([255, 255, 255]));
        // 原图不变
        assert_eq!(*img.get_pixel(10, 10), Rgb([255, 255, 255]));
    }

    #[test]
    fn test_black_is_idempotent() {
        let img = checkerboard(64, 64);
        let rects = [PixelRect::new(5, 5, 30, 20), PixelRect::new(20, 10, 50, 40)];
        let once = redact_image(&img, &rects, RedactionStyle::Black);
        let twice = redact_image(&once, &rects, RedactionStyle::Black);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_out_of_bounds_and_empty_rects_ignored() {
        let img = white(20, 20);
        let out = redact_image(
            &img,
            &[PixelRect::new(30, 30, 40, 40), PixelRect::new(5, 5, 5, 15)],
            RedactionStyle::Black,
        );
        assert_eq!(out, img);
    }

    #[test]
    fn test_blur_only_touches_region() {
        let img = checkerboard(40, 40);
        let out = redact_image(&img, &[PixelRect::new(10, 10, 30, 30)], RedactionStyle::Blur);

        // 区域外保持不变
        assert_eq!(out.get_pixel(5, 5), img.get_pixel(5, 5));
        assert_eq!(out.get_pixel(35, 35), img.get_pixel(35, 35));
        // 区域内的棋盘格被抹平为灰色
        let center = out.get_pixel(20, 20)[0];
        assert!(center > 60 && center < 200, "center = {}", center);
    }

    #[test]
    fn test_fill_rects_custom_color() {
        let mut img = white(10, 10);
        fill_rects(&mut img, &[PixelRect::new(0, 0, 5, 5)], Rgb([200, 0, 0]));
        assert_eq!(*img.get_pixel(4, 4), Rgb([200, 0, 0]));
        assert_eq!(*img.get_pixel(5, 5), Rgb([255, 255, 255]));
    }
}
