//! Slice renderer: one volume in, one cropped PNG out.
//!
//! The plane is chosen in world space (default: sagittal, x = 0 mm), mapped to
//! the closest voxel plane, and drawn with anterior/right to the right and
//! superior up. Background voxels are transparent so the thumbnail can be
//! trimmed to its content.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayAlphaImage, ImageFormat, LumaA};
use tracing::{debug, error, warn};

use crate::config::RenderConfig;
use crate::error::{MosaicError, Result};
use crate::naming;
use crate::volume::Volume;

/// Upper bound on voxels sampled for the intensity window
const MAX_WINDOW_SAMPLES: usize = 1 << 20;

/// Renders volumes into slice thumbnails
#[derive(Debug, Clone)]
pub struct SliceRenderer {
    config: RenderConfig,
    downsample: Option<u32>,
}

impl SliceRenderer {
    /// Create a renderer.
    ///
    /// # Errors
    /// Returns [`MosaicError::InvalidDownsample`] for a factor of zero.
    pub fn new(config: RenderConfig, downsample: Option<u32>) -> Result<Self> {
        if downsample == Some(0) {
            return Err(MosaicError::InvalidDownsample(0));
        }
        Ok(Self { config, downsample })
    }

    /// Render `image_path` into `out_dir`, naming the PNG after its path
    /// relative to `root`.
    ///
    /// A volume that cannot be opened or decoded is logged and skipped:
    /// `Ok(None)` is returned and nothing is written.
    ///
    /// # Errors
    /// Returns an error only if the rendered PNG cannot be written.
    pub fn create_slice_img(
        &self,
        image_path: &Path,
        out_dir: &Path,
        root: &Path,
    ) -> Result<Option<PathBuf>> {
        let volume = match Volume::open(image_path) {
            Ok(volume) => volume,
            Err(e) => {
                error!("Could not open {}: {}", image_path.display(), e);
                return Ok(None);
            }
        };

        let slice = self.render(&volume);
        let relative = image_path.strip_prefix(root).unwrap_or(image_path);
        let out_path = out_dir.join(naming::slice_file_name(relative));

        slice.save_with_format(&out_path, ImageFormat::Png)?;
        debug!(
            "{} -> {} ({}x{})",
            image_path.display(),
            out_path.display(),
            slice.width(),
            slice.height()
        );
        Ok(Some(out_path))
    }

    /// Slice, crop and (optionally) downsample an in-memory volume.
    #[must_use]
    pub fn render(&self, volume: &Volume) -> DynamicImage {
        let raw = self.draw_plane(volume);
        let cropped = crop_to_content(&raw);
        match self.downsample {
            Some(factor) => downsample(&cropped, factor),
            None => cropped,
        }
    }

    /// Draw the configured plane at physical aspect ratio.
    fn draw_plane(&self, volume: &Volume) -> DynamicImage {
        let dims = volume.dims();
        let affine = volume.affine();
        let normal = self.config.axis.normal();
        let (world_h, world_v) = self.config.axis.display_axes();

        let cut_axis = affine.closest_voxel_axis(normal, &[]);
        let h_axis = affine.closest_voxel_axis(world_h, &[cut_axis]);
        let v_axis = affine.closest_voxel_axis(world_v, &[cut_axis, h_axis]);

        let cut_index = self.cut_index(volume, cut_axis);
        let (low, high) = intensity_window(volume.data(), &self.config);
        let threshold = self.config.background_threshold;

        let width = dims[h_axis];
        let height = dims[v_axis];
        let flip_h = affine.direction(world_h, h_axis) < 0.0;
        let flip_v = affine.direction(world_v, v_axis) > 0.0;

        let mut plane = GrayAlphaImage::new(width as u32, height as u32);
        for (x, y, pixel) in plane.enumerate_pixels_mut() {
            let (x, y) = (x as usize, y as usize);
            let mut voxel = [0usize; 3];
            voxel[cut_axis] = cut_index;
            voxel[h_axis] = if flip_h { width - 1 - x } else { x };
            voxel[v_axis] = if flip_v { height - 1 - y } else { y };

            let value = volume.get(voxel);
            *pixel = if !value.is_finite() || value <= threshold {
                LumaA([0, 0])
            } else {
                let level = ((value - low) / (high - low)).clamp(0.0, 1.0);
                LumaA([(level * 255.0).round() as u8, 255])
            };
        }

        let scale = f64::from(self.config.pixels_per_mm.max(f32::EPSILON));
        let target_w = physical_extent(width, affine.spacing(h_axis), scale);
        let target_h = physical_extent(height, affine.spacing(v_axis), scale);
        let plane = DynamicImage::ImageLumaA8(plane);
        if (target_w, target_h) == plane.dimensions() {
            plane
        } else {
            plane.resize_exact(target_w, target_h, FilterType::Triangle)
        }
    }

    /// Voxel index of the cut plane, clamped into the volume
    fn cut_index(&self, volume: &Volume, cut_axis: usize) -> usize {
        let dims = volume.dims();
        let last = dims[cut_axis] - 1;
        let centre = last / 2;
        let Some(index) = volume.affine().index_for_world(
            self.config.axis.normal(),
            cut_axis,
            self.config.cut_coord,
            dims,
        ) else {
            return centre;
        };

        let rounded = index.round();
        if rounded < 0.0 || rounded > last as f64 {
            warn!(
                "Cut at {} mm falls outside the volume (index {:.1}); using nearest edge",
                self.config.cut_coord, index
            );
        }
        rounded.clamp(0.0, last as f64) as usize
    }
}

fn physical_extent(voxels: usize, spacing: f64, pixels_per_mm: f64) -> u32 {
    let spacing = if spacing > 0.0 { spacing } else { 1.0 };
    ((voxels as f64 * spacing * pixels_per_mm).round() as u32).max(1)
}

/// Robust `(low, high)` grey window over foreground voxels.
///
/// Percentiles are taken on a strided sample to bound the cost on large
/// volumes. The window is never empty.
#[must_use]
pub fn intensity_window(data: &[f32], config: &RenderConfig) -> (f32, f32) {
    let stride = (data.len() / MAX_WINDOW_SAMPLES).max(1);
    let mut samples: Vec<f32> = data
        .iter()
        .step_by(stride)
        .copied()
        .filter(|v| v.is_finite() && *v > config.background_threshold)
        .collect();

    if samples.is_empty() {
        return (config.background_threshold, config.background_threshold + 1.0);
    }

    let upper = f64::from(config.intensity_percentile.clamp(50.0, 100.0)) / 100.0;
    let low = percentile(&mut samples, 1.0 - upper);
    let high = percentile(&mut samples, upper);
    if high > low {
        (low, high)
    } else {
        (low, low + 1.0)
    }
}

fn percentile(samples: &mut [f32], fraction: f64) -> f32 {
    let rank = ((samples.len() - 1) as f64 * fraction).round() as usize;
    let (_, value, _) = samples.select_nth_unstable_by(rank, f32::total_cmp);
    *value
}

/// Crop to the bounding box of pixels with non-zero alpha.
///
/// A fully transparent image has no content to frame and is returned as is.
#[must_use]
pub fn crop_to_content(image: &DynamicImage) -> DynamicImage {
    match content_bounds(image) {
        Some((x, y, w, h)) => image.crop_imm(x, y, w, h),
        None => image.clone(),
    }
}

/// `(x, y, width, height)` of the non-transparent content, if any
#[must_use]
pub fn content_bounds(image: &DynamicImage) -> Option<(u32, u32, u32, u32)> {
    if !image.color().has_alpha() {
        let (w, h) = image.dimensions();
        return (w > 0 && h > 0).then_some((0, 0, w, h));
    }

    let rgba = image.to_rgba8();
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in rgba.enumerate_pixels() {
        if pixel.0[3] == 0 {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    bounds.map(|(x0, y0, x1, y1)| (x0, y0, x1 - x0 + 1, y1 - y0 + 1))
}

/// Target size after dividing both sides by `factor`, rounded, at least 1
#[must_use]
pub fn downsampled_size(width: u32, height: u32, factor: u32) -> (u32, u32) {
    let factor = f64::from(factor.max(1));
    let scale = |side: u32| ((f64::from(side) / factor).round() as u32).max(1);
    (scale(width), scale(height))
}

/// Shrink both sides by `factor` (see [`downsampled_size`]).
#[must_use]
pub fn downsample(image: &DynamicImage, factor: u32) -> DynamicImage {
    if factor <= 1 {
        return image.clone();
    }
    let (w, h) = downsampled_size(image.width(), image.height(), factor);
    image.resize_exact(w, h, FilterType::Lanczos3)
}
