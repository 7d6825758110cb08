//! In-memory scalar volumes decoded from NIfTI-1 and FreeSurfer MGH files.

mod affine;
mod mgh;
mod nifti_io;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use affine::Affine;

/// Volume decoding errors
#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("Unsupported volume format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("NIfTI error: {0}")]
    Nifti(#[from] nifti::NiftiError),

    #[error("Unsupported MGH data type code: {0}")]
    UnsupportedDataType(i32),

    #[error("Invalid volume dimensions: {0:?}")]
    InvalidDimensions(Vec<usize>),

    #[error("Volume data is truncated: expected {expected} voxels, found {found}")]
    Truncated { expected: usize, found: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// On-disk volume formats the renderer understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeFormat {
    /// `.nii`, `.nii.gz`, `.hdr`/`.img` pairs
    Nifti,
    /// FreeSurfer `.mgh` / `.mgz`
    Mgh,
}

impl VolumeFormat {
    /// Guess the format from the file name
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_ascii_lowercase();
        if name.ends_with(".nii") || name.ends_with(".nii.gz") || name.ends_with(".hdr") {
            Some(Self::Nifti)
        } else if name.ends_with(".mgz") || name.ends_with(".mgh") {
            Some(Self::Mgh)
        } else {
            None
        }
    }
}

/// Product of `dims`, or `None` if it overflows `usize`
pub(crate) fn voxel_count(dims: &[usize]) -> Option<usize> {
    dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

/// First 3D frame of a volume, stored x-fastest, plus its voxel-to-world affine
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    dims: [usize; 3],
    data: Vec<f32>,
    affine: Affine,
}

impl Volume {
    /// Build a volume from x-fastest voxel data.
    ///
    /// # Errors
    /// Returns [`VolumeError::Truncated`] when `data` is shorter than the
    /// voxel count; extra trailing values (later frames) are dropped.
    pub fn new(dims: [usize; 3], mut data: Vec<f32>, affine: Affine) -> Result<Self, VolumeError> {
        let expected = voxel_count(&dims)
            .filter(|&n| n > 0)
            .ok_or_else(|| VolumeError::InvalidDimensions(dims.to_vec()))?;
        if data.len() < expected {
            return Err(VolumeError::Truncated {
                expected,
                found: data.len(),
            });
        }
        data.truncate(expected);
        Ok(Self { dims, data, affine })
    }

    /// Load the first frame of the volume at `path`.
    ///
    /// # Errors
    /// Returns [`VolumeError`] if the file is missing, has an unknown
    /// extension, or cannot be decoded.
    pub fn open(path: &Path) -> Result<Self, VolumeError> {
        match VolumeFormat::from_path(path) {
            Some(VolumeFormat::Nifti) => nifti_io::read_nifti(path),
            Some(VolumeFormat::Mgh) => mgh::read_mgh(path),
            None => Err(VolumeError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    #[must_use]
    pub const fn dims(&self) -> [usize; 3] {
        self.dims
    }

    #[must_use]
    pub const fn affine(&self) -> &Affine {
        &self.affine
    }

    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Voxel value at `(i, j, k)`
    ///
    /// # Panics
    /// Panics if the index is out of bounds.
    #[must_use]
    pub fn get(&self, index: [usize; 3]) -> f32 {
        let [i, j, k] = index;
        self.data[i + self.dims[0] * (j + self.dims[1] * k)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(
            VolumeFormat::from_path(Path::new("a/sub-01_T1w.nii.gz")),
            Some(VolumeFormat::Nifti)
        );
        assert_eq!(
            VolumeFormat::from_path(Path::new("orig/001.MGZ")),
            Some(VolumeFormat::Mgh)
        );
        assert_eq!(VolumeFormat::from_path(Path::new("notes.txt")), None);
    }

    #[test]
    fn test_indexing_is_x_fastest() {
        let data: Vec<f32> = (0..24).map(|v| v as f32).collect();
        let vol = Volume::new([2, 3, 4], data, Affine::identity()).unwrap();
        assert_eq!(vol.get([1, 0, 0]), 1.0);
        assert_eq!(vol.get([0, 1, 0]), 2.0);
        assert_eq!(vol.get([0, 0, 1]), 6.0);
        assert_eq!(vol.get([1, 2, 3]), 23.0);
    }

    #[test]
    fn test_extra_frames_are_dropped() {
        let vol = Volume::new([2, 2, 1], vec![1.0; 8], Affine::identity()).unwrap();
        assert_eq!(vol.data().len(), 4);
    }

    #[test]
    fn test_truncated_data_is_rejected() {
        let err = Volume::new([2, 2, 2], vec![0.0; 3], Affine::identity()).unwrap_err();
        assert!(matches!(err, VolumeError::Truncated { expected: 8, found: 3 }));
    }

    #[test]
    fn test_overflowing_dimensions_are_rejected() {
        let err = Volume::new([usize::MAX, 2, 2], vec![0.0; 4], Affine::identity()).unwrap_err();
        assert!(matches!(err, VolumeError::InvalidDimensions(_)));
        let err = Volume::new([0, 2, 2], Vec::new(), Affine::identity()).unwrap_err();
        assert!(matches!(err, VolumeError::InvalidDimensions(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = Volume::open(Path::new("scan.dcm")).unwrap_err();
        assert!(matches!(err, VolumeError::UnsupportedFormat(_)));
    }
}
