use std::path::Path;

use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use tracing::debug;

use super::{Affine, Volume, VolumeError};

/// Read the first 3D frame of a NIfTI-1 file, scaled by `scl_slope`/`scl_inter`.
pub(super) fn read_nifti(path: &Path) -> Result<Volume, VolumeError> {
    let object = ReaderOptions::new().read_file(path)?;
    let header = object.header().clone();
    let array = object.into_volume().into_ndarray::<f32>()?;

    let shape = array.shape().to_vec();
    if shape.is_empty() || shape.iter().any(|&d| d == 0) {
        return Err(VolumeError::InvalidDimensions(shape));
    }
    let dims = [
        shape[0],
        shape.get(1).copied().unwrap_or(1),
        shape.get(2).copied().unwrap_or(1),
    ];
    debug!("{}: NIfTI shape {:?}", path.display(), shape);

    // Reversed axes iterate x fastest, so the first frame comes first
    let voxels = dims.iter().product::<usize>();
    let data: Vec<f32> = array.t().iter().take(voxels).copied().collect();

    Volume::new(dims, data, header_affine(&header, dims))
}

/// Voxel-to-world affine: sform if set, then qform, then a centred scale.
fn header_affine(header: &NiftiHeader, dims: [usize; 3]) -> Affine {
    let spacing = [
        voxel_size(header.pixdim[1]),
        voxel_size(header.pixdim[2]),
        voxel_size(header.pixdim[3]),
    ];

    if header.sform_code > 0 {
        let row = |r: [f32; 4]| r.map(f64::from);
        return Affine([row(header.srow_x), row(header.srow_y), row(header.srow_z)]);
    }

    if header.qform_code > 0 {
        return Affine::from_quaternion(
            [
                f64::from(header.quatern_b),
                f64::from(header.quatern_c),
                f64::from(header.quatern_d),
            ],
            spacing,
            f64::from(header.pixdim[0]),
            [
                f64::from(header.quatern_x),
                f64::from(header.quatern_y),
                f64::from(header.quatern_z),
            ],
        );
    }

    Affine::centered(dims, spacing)
}

fn voxel_size(pixdim: f32) -> f64 {
    if pixdim.is_finite() && pixdim > 0.0 {
        f64::from(pixdim)
    } else {
        1.0
    }
}
