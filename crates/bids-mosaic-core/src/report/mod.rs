//! Report assembly: category directories of thumbnails in, one PDF out.
//!
//! Each category sub-directory becomes a titled section holding a grid of
//! captioned thumbnails. Sections start on a fresh page; an optional
//! key/value table follows the last one.

mod metrics;
mod pdf;

use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::LayoutConfig;
use crate::metadata::MetadataTable;
use crate::naming;

pub use metrics::{text_width, wrap_chars, wrap_words};
use pdf::{Font, PdfWriter};

/// Text shown under the title of a category without thumbnails
pub const EMPTY_SECTION_TEXT: &str = "No images";
/// Title of the trailing key/value section
pub const METADATA_TITLE: &str = "Metadata";

/// Raster extensions accepted as thumbnails
const THUMBNAIL_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];
/// Line height as a multiple of the font size
const LEADING: f32 = 1.2;
/// Share of the frame width given to the metadata key column
const KEY_COLUMN_SHARE: f32 = 0.35;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Could not move report into place: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What ended up in one section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionStats {
    pub title: String,
    /// Thumbnails placed in the grid
    pub images: usize,
    /// Files in the directory that were not usable images
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportStats {
    pub pages: usize,
    pub sections: Vec<SectionStats>,
    pub metadata_rows: usize,
}

impl ReportStats {
    /// Thumbnails placed across all sections
    #[must_use]
    pub fn images(&self) -> usize {
        self.sections.iter().map(|s| s.images).sum()
    }
}

/// Title stored in the PDF Info dictionary: the file name without `.pdf`,
/// underscores shown as spaces.
#[must_use]
pub fn document_title(output: &Path) -> String {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.strip_suffix(".pdf").unwrap_or(&name);
    stem.replace('_', " ")
}

/// One category directory and its thumbnails, sorted by file name
#[derive(Debug, Clone)]
struct Section {
    title: String,
    images: Vec<PathBuf>,
    skipped: usize,
}

/// Lays out rendered thumbnails as a paginated PDF
#[derive(Debug, Clone, Default)]
pub struct ReportAssembler {
    layout: LayoutConfig,
}

impl ReportAssembler {
    #[must_use]
    pub fn new(layout: LayoutConfig) -> Self {
        Self { layout }
    }

    /// Build the report for `image_dir` and write it to `output`.
    ///
    /// Every sub-directory of `image_dir` is one section, in name order. A
    /// directory holding thumbnails directly and no sub-directories is a
    /// single section named after itself.
    ///
    /// # Errors
    /// Returns [`ReportError`] if `image_dir` cannot be read or the PDF cannot
    /// be written. Unreadable thumbnails are skipped with a warning.
    pub fn assemble(
        &self,
        image_dir: &Path,
        metadata: Option<&MetadataTable>,
        output: &Path,
    ) -> Result<ReportStats, ReportError> {
        let sections = collect_sections(image_dir)?;
        let mut page = PageCursor::new(&self.layout);
        let mut stats = ReportStats::default();

        for section in &sections {
            let images = self.draw_section(&mut page, section)?;
            stats.sections.push(SectionStats {
                title: section.title.clone(),
                images,
                skipped: section.skipped + section.images.len() - images,
            });
        }

        if let Some(table) = metadata {
            self.draw_metadata(&mut page, table)?;
            stats.metadata_rows = table.len();
        }

        stats.pages = page.writer.page_count().max(1);
        let mut doc = page.writer.finish(&document_title(output))?;
        pdf::save_atomic(&mut doc, output)?;

        info!(
            "Wrote {} ({} pages, {} thumbnails)",
            output.display(),
            stats.pages,
            stats.images()
        );
        Ok(stats)
    }

    /// Draw one section from the top of a fresh page; returns the number of
    /// thumbnails placed.
    fn draw_section(&self, page: &mut PageCursor, section: &Section) -> Result<usize, ReportError> {
        let layout = &self.layout;
        page.fresh_page()?;
        page.title(&section.title);

        let thumbnails: Vec<(DynamicImage, String)> = section
            .images
            .iter()
            .filter_map(|path| load_thumbnail(path))
            .collect();

        if thumbnails.is_empty() {
            page.line(Font::Regular, layout.body_font_size, EMPTY_SECTION_TEXT)?;
            return Ok(0);
        }

        let columns = layout.column_count();
        let caption_width = (layout.cell_width - 2.0 * layout.cell_padding).max(1.0);
        let caption_leading = layout.caption_font_size * LEADING;

        for row in thumbnails.chunks(columns) {
            let captions: Vec<Vec<String>> = row
                .iter()
                .map(|(_, caption)| wrap_chars(caption, caption_width, layout.caption_font_size))
                .collect();
            let caption_lines = captions.iter().map(Vec::len).max().unwrap_or(1);
            let row_height = layout.thumbnail_height
                + caption_lines as f32 * caption_leading
                + 3.0 * layout.cell_padding;

            page.reserve(row_height)?;
            let top = page.y;

            for (column, ((image, _), lines)) in row.iter().zip(&captions).enumerate() {
                let cell_x = layout.margin + column as f32 * layout.cell_width;
                let (w, h) = fit_thumbnail(image, layout.thumbnail_height, caption_width);
                let name = page.writer.add_image(image);
                let box_bottom = top - layout.cell_padding - layout.thumbnail_height;
                page.writer.draw_image(
                    &name,
                    cell_x + (layout.cell_width - w) / 2.0,
                    box_bottom + (layout.thumbnail_height - h) / 2.0,
                    w,
                    h,
                );

                let mut baseline = box_bottom - layout.cell_padding - layout.caption_font_size;
                for line in lines {
                    let line_width = text_width(line, layout.caption_font_size);
                    page.writer.text(
                        Font::Regular,
                        layout.caption_font_size,
                        cell_x + (layout.cell_width - line_width).max(0.0) / 2.0,
                        baseline,
                        line,
                    );
                    baseline -= caption_leading;
                }
            }
            page.y -= row_height;
        }

        debug!("Section {}: {} thumbnails", section.title, thumbnails.len());
        Ok(thumbnails.len())
    }

    /// Two-column bordered key/value table. No page break follows it.
    fn draw_metadata(&self, page: &mut PageCursor, table: &MetadataTable) -> Result<(), ReportError> {
        let layout = &self.layout;
        page.fresh_page()?;
        page.title(METADATA_TITLE);

        let pad = layout.cell_padding;
        let size = layout.body_font_size;
        let leading = size * LEADING;
        let key_width = layout.frame_width() * KEY_COLUMN_SHARE;
        let value_width = layout.frame_width() - key_width;

        for (key, value) in table.rows() {
            let key_lines = wrap_words(key, (key_width - 2.0 * pad).max(1.0), size);
            let value_lines = wrap_words(value, (value_width - 2.0 * pad).max(1.0), size);
            let lines = key_lines.len().max(value_lines.len());
            let row_height = lines as f32 * leading + 2.0 * pad;

            page.reserve(row_height)?;
            let top = page.y;
            let bottom = top - row_height;
            page.writer.rect(layout.margin, bottom, key_width, row_height);
            page.writer.rect(layout.margin + key_width, bottom, value_width, row_height);

            for (x, cell_lines) in [
                (layout.margin + pad, &key_lines),
                (layout.margin + key_width + pad, &value_lines),
            ] {
                let mut baseline = top - pad - size;
                for line in cell_lines {
                    page.writer.text(Font::Regular, size, x, baseline, line);
                    baseline -= leading;
                }
            }
            page.y = bottom;
        }
        Ok(())
    }
}

/// Vertical position on the current page, flowing onto new pages as needed
struct PageCursor<'a> {
    layout: &'a LayoutConfig,
    writer: PdfWriter,
    y: f32,
    /// Nothing has been drawn on the current page yet
    blank: bool,
}

impl<'a> PageCursor<'a> {
    fn new(layout: &'a LayoutConfig) -> Self {
        Self {
            layout,
            writer: PdfWriter::new(layout.page_width, layout.page_height),
            y: layout.page_height - layout.margin,
            blank: true,
        }
    }

    fn top(&self) -> f32 {
        self.layout.page_height - self.layout.margin
    }

    /// Move to a new page unless the current one is still untouched.
    fn fresh_page(&mut self) -> Result<(), ReportError> {
        if self.blank && self.writer.page_count() > 0 {
            return Ok(());
        }
        self.writer.new_page()?;
        self.y = self.top();
        self.blank = true;
        Ok(())
    }

    /// Make room for `height` points, breaking the page if it does not fit.
    /// A block taller than a whole page is placed at the top regardless.
    fn reserve(&mut self, height: f32) -> Result<(), ReportError> {
        if self.y - height < self.layout.margin && self.y < self.top() {
            self.writer.new_page()?;
            self.y = self.top();
        }
        self.blank = false;
        Ok(())
    }

    fn title(&mut self, text: &str) {
        let size = self.layout.title_font_size;
        self.y -= size;
        self.writer
            .text(Font::Bold, size, self.layout.margin, self.y, text);
        self.y -= size * (LEADING - 1.0) + self.layout.cell_padding * 2.0;
        self.blank = false;
    }

    fn line(&mut self, font: Font, size: f32, text: &str) -> Result<(), ReportError> {
        self.reserve(size * LEADING)?;
        self.y -= size;
        self.writer.text(font, size, self.layout.margin, self.y, text);
        self.y -= size * (LEADING - 1.0);
        Ok(())
    }
}

/// Display size: fixed height, width from the aspect ratio, capped at
/// `max_width` (shrinking the height to match).
fn fit_thumbnail(image: &DynamicImage, height: f32, max_width: f32) -> (f32, f32) {
    let (w, h) = image.dimensions();
    let aspect = w as f32 / h.max(1) as f32;
    let width = height * aspect;
    if width > max_width {
        (max_width, max_width / aspect)
    } else {
        (width, height)
    }
}

fn load_thumbnail(path: &Path) -> Option<(DynamicImage, String)> {
    match image::open(path) {
        Ok(image) => {
            let file_name = path.file_name()?.to_string_lossy();
            Some((image, naming::caption_for(&file_name)))
        }
        Err(e) => {
            warn!("Skipping unreadable image {}: {}", path.display(), e);
            None
        }
    }
}

fn is_thumbnail(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| THUMBNAIL_EXTENSIONS.contains(&ext.as_str()))
}

fn collect_sections(image_dir: &Path) -> Result<Vec<Section>, ReportError> {
    if !image_dir.is_dir() {
        return Err(ReportError::NotADirectory(image_dir.to_path_buf()));
    }

    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in fs::read_dir(image_dir)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        } else {
            files.push(path);
        }
    }
    dirs.sort();

    if dirs.is_empty() {
        if files.is_empty() {
            return Ok(Vec::new());
        }
        let title = dir_title(image_dir);
        return Ok(vec![section_from_files(title, files)]);
    }

    for file in &files {
        warn!("Ignoring {} outside any category directory", file.display());
    }

    dirs.into_iter()
        .map(|dir| -> Result<Section, ReportError> {
            let mut files = Vec::new();
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.is_file() {
                    files.push(path);
                }
            }
            Ok(section_from_files(dir_title(&dir), files))
        })
        .collect()
}

fn section_from_files(title: String, files: Vec<PathBuf>) -> Section {
    let (mut images, others): (Vec<_>, Vec<_>) = files.into_iter().partition(|p| is_thumbnail(p));
    for other in &others {
        warn!("Skipping non-image file {}", other.display());
    }
    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Section {
        title,
        images,
        skipped: others.len(),
    }
}

fn dir_title(dir: &Path) -> String {
    dir.canonicalize()
        .ok()
        .as_deref()
        .unwrap_or(dir)
        .file_name()
        .map_or_else(|| dir.display().to_string(), |n| n.to_string_lossy().into_owned())
}
