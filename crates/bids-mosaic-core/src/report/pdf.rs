//! Minimal page writer over `lopdf`.
//!
//! Pages share one resource dictionary holding the two base-14 fonts and
//! every image XObject; the page tree object id is reserved up front so
//! pages can point at their parent as they are emitted.

use std::io::Write;
use std::path::Path;

use image::{DynamicImage, GenericImageView};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tempfile::NamedTempFile;
use tracing::debug;

use super::ReportError;

const PRODUCER: &str = concat!("bidsmosaic ", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Font {
    Regular,
    Bold,
}

impl Font {
    const fn resource_name(self) -> &'static str {
        match self {
            Self::Regular => "F1",
            Self::Bold => "F2",
        }
    }
}

pub(crate) struct PdfWriter {
    doc: Document,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
    xobjects: Dictionary,
    width: f32,
    height: f32,
    operations: Option<Vec<Operation>>,
}

impl PdfWriter {
    pub(crate) fn new(width: f32, height: f32) -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            page_ids: Vec::new(),
            xobjects: Dictionary::new(),
            width,
            height,
            operations: None,
        }
    }

    pub(crate) fn page_count(&self) -> usize {
        self.page_ids.len() + usize::from(self.operations.is_some())
    }

    /// Close the current page (if any) and open a blank one.
    pub(crate) fn new_page(&mut self) -> Result<(), ReportError> {
        self.flush_page()?;
        self.operations = Some(Vec::new());
        Ok(())
    }

    fn flush_page(&mut self) -> Result<(), ReportError> {
        let Some(operations) = self.operations.take() else {
            return Ok(());
        };
        let content = Content { operations }.encode()?;
        let content_id = self.doc.add_object(Stream::new(Dictionary::new(), content));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), Object::Real(self.width), Object::Real(self.height)],
            "Contents" => content_id,
        });
        self.page_ids.push(page_id);
        Ok(())
    }

    fn ops(&mut self) -> &mut Vec<Operation> {
        self.operations.get_or_insert_with(Vec::new)
    }

    /// Register `image` as an XObject and return its resource name.
    ///
    /// Gray images stay single-channel; an alpha channel becomes a soft mask.
    pub(crate) fn add_image(&mut self, image: &DynamicImage) -> String {
        let (width, height) = image.dimensions();
        let grayscale = matches!(
            image,
            DynamicImage::ImageLuma8(_)
                | DynamicImage::ImageLumaA8(_)
                | DynamicImage::ImageLuma16(_)
                | DynamicImage::ImageLumaA16(_)
        );
        let (color_space, pixels) = if grayscale {
            ("DeviceGray", image.to_luma8().into_raw())
        } else {
            ("DeviceRGB", image.to_rgb8().into_raw())
        };

        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width),
            "Height" => i64::from(height),
            "ColorSpace" => color_space,
            "BitsPerComponent" => 8,
        };

        if image.color().has_alpha() {
            let alpha: Vec<u8> = image.to_rgba8().pixels().map(|p| p.0[3]).collect();
            let mask_id = self.doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => i64::from(width),
                    "Height" => i64::from(height),
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                },
                alpha,
            ));
            dict.set("SMask", mask_id);
        }

        let image_id = self.doc.add_object(Stream::new(dict, pixels));
        let name = format!("Im{}", self.xobjects.len() + 1);
        self.xobjects.set(name.clone(), image_id);
        name
    }

    /// Draw a registered image with its lower-left corner at `(x, y)`.
    pub(crate) fn draw_image(&mut self, name: &str, x: f32, y: f32, width: f32, height: f32) {
        let ops = self.ops();
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new(
            "cm",
            vec![
                Object::Real(width),
                0.into(),
                0.into(),
                Object::Real(height),
                Object::Real(x),
                Object::Real(y),
            ],
        ));
        ops.push(Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]));
        ops.push(Operation::new("Q", vec![]));
    }

    /// Draw one line of text with its baseline starting at `(x, y)`.
    pub(crate) fn text(&mut self, font: Font, size: f32, x: f32, y: f32, text: &str) {
        let ops = self.ops();
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Tf",
            vec![
                Object::Name(font.resource_name().as_bytes().to_vec()),
                Object::Real(size),
            ],
        ));
        ops.push(Operation::new("Td", vec![Object::Real(x), Object::Real(y)]));
        ops.push(Operation::new("Tj", vec![pdf_string(text)]));
        ops.push(Operation::new("ET", vec![]));
    }

    /// Stroke a rectangle outline.
    pub(crate) fn rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let ops = self.ops();
        ops.push(Operation::new("w", vec![Object::Real(0.5)]));
        ops.push(Operation::new(
            "re",
            vec![
                Object::Real(x),
                Object::Real(y),
                Object::Real(width),
                Object::Real(height),
            ],
        ));
        ops.push(Operation::new("S", vec![]));
    }

    /// Close the page tree and return the finished document.
    pub(crate) fn finish(mut self, title: &str) -> Result<Document, ReportError> {
        if self.page_count() == 0 {
            self.new_page()?;
        }
        self.flush_page()?;

        let font = |base: &str| {
            dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => base.to_string(),
                "Encoding" => "WinAnsiEncoding",
            }
        };
        let regular_id = self.doc.add_object(font("Helvetica"));
        let bold_id = self.doc.add_object(font("Helvetica-Bold"));
        let resources_id = self.doc.add_object(dictionary! {
            "Font" => dictionary! {
                Font::Regular.resource_name() => regular_id,
                Font::Bold.resource_name() => bold_id,
            },
            "XObject" => self.xobjects,
        });

        for page_id in &self.page_ids {
            if let Ok(Object::Dictionary(page)) = self.doc.get_object_mut(*page_id) {
                page.set("Resources", resources_id);
            }
        }

        let kids: Vec<Object> = self.page_ids.iter().map(|id| (*id).into()).collect();
        let count = kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        let info_id = self.doc.add_object(dictionary! {
            "Title" => pdf_string(title),
            "Producer" => pdf_string(PRODUCER),
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.trailer.set("Info", info_id);
        self.doc.compress();

        debug!("Finished PDF with {} pages", count);
        Ok(self.doc)
    }
}

/// Serialize `doc` next to `path` and rename it into place, so a failed
/// run never leaves a partial file at `path`.
pub(crate) fn save_atomic(doc: &mut Document, path: &Path) -> Result<(), ReportError> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;

    let mut staged = NamedTempFile::new_in(parent)?;
    staged.write_all(&bytes)?;
    staged.flush()?;
    staged.persist(path)?;
    Ok(())
}

/// WinAnsi literal string; characters outside Latin-1 become `?`.
fn pdf_string(text: &str) -> Object {
    let bytes = text
        .chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect();
    Object::String(bytes, StringFormat::Literal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayAlphaImage, LumaA, RgbImage};
    use tempfile::TempDir;

    #[test]
    fn test_pdf_string_replaces_wide_chars() {
        let Object::String(bytes, StringFormat::Literal) = pdf_string("µ→x") else {
            panic!("expected a literal string");
        };
        assert_eq!(bytes, vec![0xB5, b'?', b'x']);
    }

    #[test]
    fn test_empty_writer_still_has_a_page() {
        let writer = PdfWriter::new(200.0, 100.0);
        let doc = writer.finish("empty").unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_alpha_image_gets_soft_mask() {
        let mut writer = PdfWriter::new(200.0, 100.0);
        let image = DynamicImage::ImageLumaA8(GrayAlphaImage::from_pixel(3, 2, LumaA([90, 255])));
        let name = writer.add_image(&image);
        assert_eq!(name, "Im1");

        let image_id = writer.xobjects.get(b"Im1").unwrap().as_reference().unwrap();
        let stream = writer.doc.get_object(image_id).unwrap().as_stream().unwrap();
        assert_eq!(stream.content.len(), 6);
        assert!(stream.dict.get(b"SMask").is_ok());
    }

    #[test]
    fn test_rgb_image_has_no_mask() {
        let mut writer = PdfWriter::new(200.0, 100.0);
        writer.add_image(&DynamicImage::ImageRgb8(RgbImage::new(2, 2)));
        let image_id = writer.xobjects.get(b"Im1").unwrap().as_reference().unwrap();
        let stream = writer.doc.get_object(image_id).unwrap().as_stream().unwrap();
        assert_eq!(stream.content.len(), 12);
        assert!(stream.dict.get(b"SMask").is_err());
    }

    #[test]
    fn test_save_atomic_writes_loadable_file() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("report.pdf");

        let mut writer = PdfWriter::new(200.0, 100.0);
        writer.new_page().unwrap();
        writer.text(Font::Bold, 12.0, 10.0, 80.0, "Hello");
        writer.new_page().unwrap();
        writer.rect(10.0, 10.0, 50.0, 20.0);
        let mut doc = writer.finish("report").unwrap();
        save_atomic(&mut doc, &out).unwrap();

        let loaded = Document::load(&out).unwrap();
        assert_eq!(loaded.get_pages().len(), 2);
        let page_one = loaded.get_pages()[&1];
        let content = loaded.get_page_content(page_one).unwrap();
        assert!(String::from_utf8_lossy(&content).contains("(Hello)"));
        // Only the report itself is left in the directory
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
