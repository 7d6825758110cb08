//! Orchestrator: scan, render, assemble.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::MosaicConfig;
use crate::error::{MosaicError, Result};
use crate::layout::{find_freesurfer_volumes, DatasetLayout};
use crate::metadata::MetadataTable;
use crate::render::SliceRenderer;
use crate::report::{ReportAssembler, ReportStats};
use crate::scratch::{Category, ScratchArea};

/// Suffix appended to the dataset name for the default output file
pub const DEFAULT_OUTPUT_SUFFIX: &str = "_mosaic.pdf";

/// What to build and where to put it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MosaicOptions {
    /// BIDS dataset root
    pub dataset: Option<PathBuf>,
    /// Output PDF; defaults to `<dataset name>_mosaic.pdf` in the working directory
    pub out_file: Option<PathBuf>,
    /// Pre-rendered thumbnails; skips scanning and rendering entirely
    pub png_dir: Option<PathBuf>,
    /// Keep rendered thumbnails here instead of a temporary directory
    pub png_out_dir: Option<PathBuf>,
    /// JSON object appended as a key/value table
    pub metadata: Option<String>,
    /// Render anatomical scans
    pub anat: bool,
    /// FreeSurfer subjects directory to render `sub-*/mri/orig/*` from
    pub freesurfer: Option<PathBuf>,
    pub downsample: Option<u32>,
}

impl Default for MosaicOptions {
    fn default() -> Self {
        Self {
            dataset: None,
            out_file: None,
            png_dir: None,
            png_out_dir: None,
            metadata: None,
            anat: true,
            freesurfer: None,
            downsample: None,
        }
    }
}

impl MosaicOptions {
    /// Anatomical mosaic of `dataset` with every other option at its default
    #[must_use]
    pub fn for_dataset(dataset: impl Into<PathBuf>) -> Self {
        Self {
            dataset: Some(dataset.into()),
            ..Self::default()
        }
    }
}

/// Render outcome for one category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRun {
    pub category: Category,
    pub rendered: usize,
    pub failed: usize,
}

/// Result of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MosaicSummary {
    pub output: PathBuf,
    pub page_count: usize,
    /// Empty in bypass mode
    pub categories: Vec<CategoryRun>,
    pub report: ReportStats,
}

impl MosaicSummary {
    #[must_use]
    pub fn rendered(&self) -> usize {
        self.categories.iter().map(|c| c.rendered).sum()
    }

    #[must_use]
    pub fn render_failures(&self) -> usize {
        self.categories.iter().map(|c| c.failed).sum()
    }
}

/// Where the PDF goes when `out_file` is not given: the base name of the
/// dataset (or of the pre-rendered directory) plus `_mosaic.pdf`, relative
/// to the working directory.
///
/// # Errors
/// Returns [`MosaicError::NoInput`] if there is nothing to name it after.
pub fn default_output_path(options: &MosaicOptions) -> Result<PathBuf> {
    if let Some(out) = &options.out_file {
        return Ok(out.clone());
    }
    let source = options
        .dataset
        .as_deref()
        .or(options.png_dir.as_deref())
        .ok_or(MosaicError::NoInput)?;

    let absolute = source
        .canonicalize()
        .or_else(|_| std::path::absolute(source))
        .unwrap_or_else(|_| source.to_path_buf());
    let name = absolute
        .file_name()
        .map_or_else(|| "dataset".into(), |n| n.to_string_lossy().into_owned());
    Ok(PathBuf::from(format!("{name}{DEFAULT_OUTPUT_SUFFIX}")))
}

/// Build the mosaic PDF described by `options`.
///
/// Metadata is parsed and options are checked before anything is rendered
/// or written. Volumes that fail to load are logged and left out of the
/// report. The scratch directory, when temporary, is removed before this
/// returns, whether it succeeds or not.
///
/// # Errors
/// Returns [`MosaicError`] for malformed metadata, a zero downsample factor,
/// missing input directories, or a PDF that cannot be written.
pub fn create_mosaic_pdf(options: &MosaicOptions, config: &MosaicConfig) -> Result<MosaicSummary> {
    if options.downsample == Some(0) {
        return Err(MosaicError::InvalidDownsample(0));
    }
    let metadata = options
        .metadata
        .as_deref()
        .map(MetadataTable::parse)
        .transpose()?;
    let output = default_output_path(options)?;
    let assembler = ReportAssembler::new(config.layout.clone());

    if let Some(png_dir) = &options.png_dir {
        if !png_dir.is_dir() {
            return Err(MosaicError::ImageDirNotFound(png_dir.clone()));
        }
        info!("Assembling pre-rendered images from {}", png_dir.display());
        let report = assembler.assemble(png_dir, metadata.as_ref(), &output)?;
        return Ok(MosaicSummary {
            output,
            page_count: report.pages,
            categories: Vec::new(),
            report,
        });
    }

    let dataset = options.dataset.as_deref().ok_or(MosaicError::NoInput)?;
    if !dataset.is_dir() {
        return Err(MosaicError::DatasetNotFound(dataset.to_path_buf()));
    }
    let renderer = SliceRenderer::new(config.render.clone(), options.downsample)?;

    let scratch = match &options.png_out_dir {
        Some(dir) => ScratchArea::persistent(dir)?,
        None => ScratchArea::temporary()?,
    };
    info!("Rendering slices into {}", scratch.path().display());

    let mut categories = Vec::new();
    if options.anat {
        let layout = DatasetLayout::index(dataset)?;
        let files: Vec<&Path> = layout
            .anatomical()
            .into_iter()
            .map(|file| file.path.as_path())
            .collect();
        info!("Found {} anatomical scans in {}", files.len(), dataset.display());
        categories.push(render_category(
            &renderer,
            &scratch,
            Category::Anatomical,
            &files,
            layout.root(),
        )?);
    }

    if let Some(fs_root) = &options.freesurfer {
        let volumes = find_freesurfer_volumes(fs_root)?;
        let files: Vec<&Path> = volumes.iter().map(PathBuf::as_path).collect();
        info!("Found {} FreeSurfer volumes in {}", files.len(), fs_root.display());
        categories.push(render_category(
            &renderer,
            &scratch,
            Category::Freesurfer,
            &files,
            fs_root,
        )?);
    }

    if categories.is_empty() {
        warn!("Neither anatomical nor FreeSurfer rendering is enabled");
    }

    let report = assembler.assemble(scratch.path(), metadata.as_ref(), &output)?;
    Ok(MosaicSummary {
        output,
        page_count: report.pages,
        categories,
        report,
    })
}

fn render_category(
    renderer: &SliceRenderer,
    scratch: &ScratchArea,
    category: Category,
    files: &[&Path],
    root: &Path,
) -> Result<CategoryRun> {
    let out_dir = scratch.category_dir(category)?;
    let mut run = CategoryRun {
        category,
        rendered: 0,
        failed: 0,
    };

    for file in files {
        match renderer.create_slice_img(file, &out_dir, root)? {
            Some(_) => run.rendered += 1,
            None => run.failed += 1,
        }
    }

    if run.failed > 0 {
        warn!(
            "{}: {} of {} volumes could not be rendered",
            category,
            run.failed,
            files.len()
        );
    }
    Ok(run)
}
