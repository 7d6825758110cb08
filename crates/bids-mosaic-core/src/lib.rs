//! Slice thumbnails and PDF mosaics for BIDS neuroimaging datasets
//!
//! This crate turns a dataset laid out per the Brain Imaging Data Structure
//! (BIDS) into a single PDF report. Every scan gets one 2D slice thumbnail,
//! thumbnails are grouped into one grid section per category, and an optional
//! key/value metadata table closes the document.
//!
//! # Pipeline
//! 1. **Scan** ([`layout`]): index the dataset and select anatomical
//!    volumes, optionally glob FreeSurfer `sub-*/mri/orig/*` volumes.
//! 2. **Render** ([`render`]): load each volume, cut one plane, trim
//!    transparent borders, optionally downsample, write a PNG.
//! 3. **Assemble** ([`report`]): lay the PNGs of each category out as a
//!    captioned grid and write the PDF atomically.
//!
//! [`mosaic::create_mosaic_pdf`] runs all three stages.
//!
//! # Example
//! ```no_run
//! use bids_mosaic_core::{create_mosaic_pdf, MosaicConfig, MosaicOptions};
//!
//! # fn main() -> Result<(), bids_mosaic_core::MosaicError> {
//! let options = MosaicOptions {
//!     downsample: Some(2),
//!     metadata: Some(r#"{"Dataset ID": "ds000001"}"#.to_string()),
//!     ..MosaicOptions::for_dataset("/data/ds000001")
//! };
//!
//! let summary = create_mosaic_pdf(&options, &MosaicConfig::default())?;
//! println!("Wrote {} ({} pages)", summary.output.display(), summary.page_count);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod layout;
pub mod metadata;
pub mod mosaic;
pub mod naming;
pub mod render;
pub mod report;
pub mod scratch;
pub mod volume;

pub use config::{LayoutConfig, MosaicConfig, RenderConfig, SliceAxis};
pub use error::{MosaicError, Result};
pub use layout::{find_freesurfer_volumes, BidsFile, DatasetLayout, Query};
pub use metadata::{MetadataError, MetadataTable};
pub use mosaic::{create_mosaic_pdf, default_output_path, CategoryRun, MosaicOptions, MosaicSummary};
pub use render::SliceRenderer;
pub use report::{ReportAssembler, ReportError, ReportStats, SectionStats};
pub use scratch::{Category, ScratchArea};
pub use volume::{Volume, VolumeError};
