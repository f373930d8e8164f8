//! 二维码定位
//!
//! 只关心二维码在图片上的位置，不解码内容。

use image::{imageops, RgbImage};

use crate::PixelRect;

/// 二维码/条形码定位器
pub trait QrLocator: Send + Sync {
    /// 返回每个码的外接矩形；未找到时返回空列表
    fn locate(&self, img: &RgbImage) -> Vec<PixelRect>;
}

/// 基于 rqrr 的二维码定位
#[derive(Debug, Clone, Copy, Default)]
pub struct RqrrLocator;

impl QrLocator for RqrrLocator {
    fn locate(&self, img: &RgbImage) -> Vec<PixelRect> {
        let gray = imageops::grayscale(img);
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            gray.width() as usize,
            gray.height() as usize,
            |x, y| gray.get_pixel(x as u32, y as u32)[0],
        );

        let rects: Vec<PixelRect> = prepared
            .detect_grids()
            .iter()
            .map(|grid| bounding_rect(&grid.bounds))
            .filter(|rect| !rect.is_empty())
            .collect();

        if !rects.is_empty() {
            log::info!("[QR] 检测到 {} 个二维码", rects.len());
        }
        rects
    }
}

/// 四个角点的轴对齐外接矩形
fn bounding_rect(points: &[rqrr::Point; 4]) -> PixelRect {
    let x0 = points.iter().map(|p| p.x).min().unwrap_or(0);
    let x1 = points.iter().map(|p| p.x).max().unwrap_or(0);
    let y0 = points.iter().map(|p| p.y).min().unwrap_or(0);
    let y1 = points.iter().map(|p| p.y).max().unwrap_or(0);
    PixelRect::new(x0, y0, x1, y1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_bounding_rect_of_rotated_grid() {
        let points = [
            rqrr::Point { x: 40, y: 10 },
            rqrr::Point { x: 70, y: 40 },
            rqrr::Point { x: 40, y: 70 },
            rqrr::Point { x: 10, y: 40 },
        ];
        assert_eq!(bounding_rect(&points), PixelRect::new(10, 10, 70, 70));
    }

    #[test]
    fn test_blank_image_has_no_qr() {
        let img = RgbImage::from_pixel(120, 80, Rgb([255, 255, 255]));
        assert!(RqrrLocator.locate(&img).is_empty());
    }
}
