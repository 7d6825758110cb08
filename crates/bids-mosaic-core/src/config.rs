//! Rendering and page layout parameters.
//!
//! Every struct here deserializes with `#[serde(default)]`, so a config file
//! only needs to name the values it changes.

use serde::{Deserialize, Serialize};

/// A4 width in PDF points
pub const A4_WIDTH_PT: f32 = 595.28;
/// A4 height in PDF points
pub const A4_HEIGHT_PT: f32 = 841.89;
/// One inch in PDF points
pub const INCH_PT: f32 = 72.0;

/// Full configuration for one mosaic run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MosaicConfig {
    pub render: RenderConfig,
    pub layout: LayoutConfig,
}

/// Anatomical plane a thumbnail is cut along
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SliceAxis {
    /// Plane of constant world x (left-right); the default midline view
    #[default]
    Sagittal,
    /// Plane of constant world y (posterior-anterior)
    Coronal,
    /// Plane of constant world z (inferior-superior)
    Axial,
}

impl SliceAxis {
    /// World axis held constant by the plane (0 = x, 1 = y, 2 = z)
    #[must_use]
    pub const fn normal(self) -> usize {
        match self {
            Self::Sagittal => 0,
            Self::Coronal => 1,
            Self::Axial => 2,
        }
    }

    /// World axes shown horizontally and vertically in the thumbnail
    #[must_use]
    pub const fn display_axes(self) -> (usize, usize) {
        match self {
            Self::Sagittal => (1, 2),
            Self::Coronal => (0, 2),
            Self::Axial => (0, 1),
        }
    }
}

/// How one volume becomes one raster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Plane to cut
    pub axis: SliceAxis,
    /// World coordinate of the cut in millimetres
    pub cut_coord: f64,
    /// Voxels at or below this value are drawn transparent
    pub background_threshold: f32,
    /// Upper percentile mapped to white; the mirrored lower percentile maps to black
    pub intensity_percentile: f32,
    /// Raster resolution before downsampling
    pub pixels_per_mm: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            axis: SliceAxis::Sagittal,
            cut_coord: 0.0,
            background_threshold: 0.0,
            intensity_percentile: 99.5,
            pixels_per_mm: 2.0,
        }
    }
}

/// Page geometry of the report, all lengths in PDF points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub page_width: f32,
    pub page_height: f32,
    pub margin: f32,
    /// Width of one grid cell; the column count is derived from it
    pub cell_width: f32,
    /// Display height of every thumbnail
    pub thumbnail_height: f32,
    pub cell_padding: f32,
    pub caption_font_size: f32,
    pub body_font_size: f32,
    pub title_font_size: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            page_width: A4_WIDTH_PT,
            page_height: A4_HEIGHT_PT,
            margin: INCH_PT,
            cell_width: 1.5 * INCH_PT,
            thumbnail_height: 1.2 * INCH_PT,
            cell_padding: 4.0,
            caption_font_size: 7.0,
            body_font_size: 10.0,
            title_font_size: 18.0,
        }
    }
}

impl LayoutConfig {
    /// Width between the left and right margins
    #[must_use]
    pub fn frame_width(&self) -> f32 {
        (self.page_width - 2.0 * self.margin).max(0.0)
    }

    /// Number of thumbnail columns that fit the frame, never less than one
    #[must_use]
    pub fn column_count(&self) -> usize {
        if self.cell_width <= 0.0 {
            return 1;
        }
        ((self.frame_width() / self.cell_width).floor() as usize).max(1)
    }
}
