//! 基于 pdfium-render 的 PDF 引擎
//!
//! 栅格化供 OCR 使用；脱敏时将含脱敏区域的页面渲染为图片，在图片上填充矩形，
//! 再用这张图片重建页面。原页面的文字、矢量与图片对象都不会写入输出文件，
//! 因此被覆盖的内容无法复制或恢复。

use image::{ImageFormat, Rgb, RgbImage};
use pdfium_render::prelude::*;
use pii_render::{fill_rects, PixelRect};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::{zoom_for_dpi, PdfEngine, PdfError, PdfSession, PointRect, RasterPage, Result};

/// 重建脱敏页面时的渲染分辨率
pub const DEFAULT_FLATTEN_DPI: u32 = 200;

/// 获取 pdfium 库的搜索路径
fn get_pdfium_search_paths(configured: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. 配置文件指定的目录
    if let Some(dir) = configured {
        paths.push(dir.to_path_buf());
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            // 2. 可执行文件同级的 libs 目录
            paths.push(exe_dir.join("libs"));

            // 3. 可执行文件同级目录
            paths.push(exe_dir.to_path_buf());
        }
    }

    // 4. 当前目录
    paths.push(PathBuf::from("libs"));
    paths.push(PathBuf::from("./"));

    paths
}

/// 尝试绑定 pdfium 库
fn bind_pdfium(configured: Option<&Path>) -> Result<Pdfium> {
    for path in &get_pdfium_search_paths(configured) {
        let lib_path = Pdfium::pdfium_platform_library_name_at_path(path);
        log::debug!("[PDF] 尝试加载 pdfium: {:?}", lib_path);

        if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
            log::info!("[PDF] 成功从 {:?} 加载 pdfium", path);
            return Ok(Pdfium::new(bindings));
        }
    }

    // 最后尝试系统库
    log::debug!("[PDF] 尝试加载系统 pdfium 库");
    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| PdfError::Bind {
            reason: e.to_string(),
        })
}

/// PDFium 引擎
pub struct PdfiumEngine {
    pdfium: Pdfium,
    flatten_dpi: u32,
}

impl PdfiumEngine {
    /// 绑定 pdfium 库；`library_dir` 为空时按默认路径搜索
    pub fn bind(library_dir: Option<&Path>, flatten_dpi: u32) -> Result<Self> {
        Ok(Self {
            pdfium: bind_pdfium(library_dir)?,
            flatten_dpi: flatten_dpi.max(1),
        })
    }
}

impl PdfEngine for PdfiumEngine {
    fn open<'a>(&'a self, path: &Path) -> Result<Box<dyn PdfSession + 'a>> {
        let document = self
            .pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| PdfError::Load {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        log::info!(
            "[PDF] 已打开 {}，共 {} 页",
            path.display(),
            document.pages().len()
        );

        Ok(Box::new(PdfiumSession {
            pdfium: &self.pdfium,
            document,
            pending: BTreeMap::new(),
            flatten_dpi: self.flatten_dpi,
        }))
    }
}

/// 待应用的页面脱敏
struct PendingRedaction {
    rects: Vec<PointRect>,
    fill: Rgb<u8>,
}

/// 打开的 PDFium 文档
///
/// 脱敏区域先按页登记，`save` 时一次性生成新文档。
pub struct PdfiumSession<'a> {
    pdfium: &'a Pdfium,
    document: PdfDocument<'a>,
    pending: BTreeMap<usize, PendingRedaction>,
    flatten_dpi: u32,
}

impl<'a> PdfiumSession<'a> {
    fn page(&self, page_index: usize) -> Result<PdfPage<'a>> {
        let total = self.page_count();
        if page_index >= total {
            return Err(PdfError::PageOutOfBounds {
                page: page_index,
                total,
            });
        }
        self.document
            .pages()
            .get(page_index as PdfPageIndex)
            .map_err(|e| PdfError::Render {
                page: page_index,
                reason: e.to_string(),
            })
    }

    /// 按缩放系数渲染页面
    fn render_page(&self, page_index: usize, zoom: f32) -> Result<RgbImage> {
        let page = self.page(page_index)?;

        let page_width = page.width().value;
        let page_height = page.height().value;
        let target_width = (page_width * zoom).round() as i32;
        let target_height = (page_height * zoom).round() as i32;

        log::debug!(
            "[PDF] 页面 {}: {}x{} pt -> {}x{} px",
            page_index,
            page_width,
            page_height,
            target_width,
            target_height
        );

        let render_config = PdfRenderConfig::new()
            .set_target_width(target_width)
            .set_target_height(target_height);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| PdfError::Render {
                page: page_index,
                reason: e.to_string(),
            })?;

        Ok(bitmap.as_image().to_rgb8())
    }

    /// 将页面渲染为图片、填充脱敏区域，并以图片页追加到 `dest`
    fn flatten_page(
        &self,
        dest: &mut PdfDocument<'a>,
        page_index: usize,
        redaction: &PendingRedaction,
    ) -> Result<()> {
        let source_page = self.page(page_index)?;
        let page_width = source_page.width();
        let page_height = source_page.height();

        let zoom = zoom_for_dpi(self.flatten_dpi);
        let mut image = self.render_page(page_index, zoom)?;
        let pixel_rects: Vec<PixelRect> = redaction
            .rects
            .iter()
            .map(|r| r.to_pixels(zoom, zoom))
            .collect();
        fill_rects(&mut image, &pixel_rects, redaction.fill);

        let save_err = |e: String| PdfError::Save { reason: e };

        let mut new_page = dest
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::Custom(page_width, page_height))
            .map_err(|e| save_err(format!("创建页面失败: {}", e)))?;

        // 写入临时 JPEG，离开作用域时自动删除
        let temp = tempfile::Builder::new()
            .prefix("pii_page_")
            .suffix(".jpg")
            .tempfile()?;
        let temp_path = temp.path().to_string_lossy().to_string();
        image
            .save_with_format(&temp_path, ImageFormat::Jpeg)
            .map_err(|e| save_err(format!("保存临时图片失败: {}", e)))?;

        let mut image_obj = PdfPageImageObject::new_from_jpeg_file(dest, &temp_path)
            .map_err(|e| save_err(format!("创建图片对象失败: {}", e)))?;

        // 图片覆盖整个页面
        image_obj
            .scale(page_width.value, page_height.value)
            .map_err(|e| save_err(format!("缩放图片失败: {}", e)))?;

        new_page
            .objects_mut()
            .add_image_object(image_obj)
            .map_err(|e| save_err(format!("添加图片到页面失败: {}", e)))?;

        log::info!(
            "[PDF] 页面 {} 已重建，脱敏区域 {} 个",
            page_index + 1,
            redaction.rects.len()
        );
        Ok(())
    }

    /// 原样复制页面
    fn copy_page(&self, dest: &mut PdfDocument<'a>, page_index: usize) -> Result<()> {
        let dest_index = dest.pages().len();
        dest.pages_mut()
            .copy_page_from_document(&self.document, page_index as PdfPageIndex, dest_index)
            .map_err(|e| PdfError::Save {
                reason: format!("复制页面 {} 失败: {}", page_index + 1, e),
            })
    }
}

impl<'a> PdfSession for PdfiumSession<'a> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn rasterize(&self, page_index: usize, dpi: u32) -> Result<RasterPage> {
        let zoom = zoom_for_dpi(dpi);
        let image = self.render_page(page_index, zoom)?;
        Ok(RasterPage {
            image,
            scale_x: zoom,
            scale_y: zoom,
        })
    }

    fn apply_redactions(
        &mut self,
        page_index: usize,
        rects: &[PointRect],
        fill: Rgb<u8>,
    ) -> Result<()> {
        let total = self.page_count();
        if page_index >= total {
            return Err(PdfError::PageOutOfBounds {
                page: page_index,
                total,
            });
        }

        let entry = self
            .pending
            .entry(page_index)
            .or_insert_with(|| PendingRedaction {
                rects: Vec::new(),
                fill,
            });
        entry.rects.extend_from_slice(rects);
        entry.fill = fill;
        Ok(())
    }

    fn save(&mut self, output: &Path) -> Result<()> {
        let mut new_doc = self.pdfium.create_new_pdf().map_err(|e| PdfError::Save {
            reason: format!("创建新 PDF 失败: {}", e),
        })?;

        for page_index in 0..self.page_count() {
            match self.pending.get(&page_index) {
                Some(redaction) if !redaction.rects.is_empty() => {
                    self.flatten_page(&mut new_doc, page_index, redaction)?
                }
                _ => self.copy_page(&mut new_doc, page_index)?,
            }
        }

        new_doc.save_to_file(output).map_err(|e| PdfError::Save {
            reason: e.to_string(),
        })?;

        log::info!("[PDF] 已保存到: {}", output.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_paths_prefer_configured_dir() {
        let paths = get_pdfium_search_paths(Some(Path::new("/opt/pdfium/lib")));
        assert_eq!(paths[0], PathBuf::from("/opt/pdfium/lib"));
        assert_eq!(paths.last(), Some(&PathBuf::from("./")));
    }

    #[test]
    fn test_search_paths_without_config() {
        let paths = get_pdfium_search_paths(None);
        assert!(paths.contains(&PathBuf::from("libs")));
        assert!(!paths.contains(&PathBuf::from("/opt/pdfium/lib")));
    }

    fn object_types(page: &PdfPage) -> Vec<PdfPageObjectType> {
        let objects = page.objects();
        objects
            .as_range()
            .filter_map(|i| objects.get(i).ok())
            .map(|object| object.object_type())
            .collect()
    }

    fn write_two_page_pdf(engine: &PdfiumEngine, path: &Path) {
        let mut doc = engine.pdfium.create_new_pdf().unwrap();
        let font = doc.fonts_mut().helvetica();
        for text in ["Aadhaar 1234 5678 9012", "PAN ABCDE1234F"] {
            let mut page = doc
                .pages_mut()
                .create_page_at_end(PdfPagePaperSize::a4())
                .unwrap();
            page.objects_mut()
                .create_text_object(
                    PdfPoints::new(72.0),
                    PdfPoints::new(720.0),
                    text,
                    font,
                    PdfPoints::new(14.0),
                )
                .unwrap();
        }
        doc.save_to_file(path).unwrap();
    }

    #[test]
    fn test_save_rebuilds_only_redacted_pages() {
        // 没有 pdfium 动态库的环境跳过
        let Ok(engine) = PdfiumEngine::bind(None, 72) else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("two_pages.pdf");
        let output = dir.path().join("two_pages_redacted.pdf");
        write_two_page_pdf(&engine, &input);

        {
            let mut session = engine.open(&input).unwrap();
            assert_eq!(session.page_count(), 2);
            session
                .apply_redactions(0, &[PointRect::new(60.0, 90.0, 400.0, 130.0)], Rgb([0, 0, 0]))
                .unwrap();
            session.save(&output).unwrap();
        }

        let doc = engine.pdfium.load_pdf_from_file(&output, None).unwrap();
        let pages = doc.pages();
        assert_eq!(pages.len(), 2);

        // 第 1 页只剩一张整页图片，原文字不可再提取
        let first = pages.get(0).unwrap();
        assert_eq!(object_types(&first), vec![PdfPageObjectType::Image]);
        assert!(first.text().unwrap().all().trim().is_empty());

        // 第 2 页原样保留，且顺序不变
        let second = pages.get(1).unwrap();
        assert_eq!(object_types(&second), vec![PdfPageObjectType::Text]);
        assert!(second.text().unwrap().all().contains("ABCDE1234F"));
    }

    #[test]
    fn test_redaction_on_missing_page_is_rejected() {
        let Ok(engine) = PdfiumEngine::bind(None, 72) else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("two_pages.pdf");
        write_two_page_pdf(&engine, &input);

        let mut session = engine.open(&input).unwrap();
        let err = session
            .apply_redactions(5, &[PointRect::new(0.0, 0.0, 10.0, 10.0)], Rgb([0, 0, 0]))
            .unwrap_err();
        assert!(matches!(err, PdfError::PageOutOfBounds { page: 5, total: 2 }));
    }
}
