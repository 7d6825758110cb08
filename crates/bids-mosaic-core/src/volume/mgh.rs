//! FreeSurfer MGH/MGZ reader.
//!
//! Layout: a 284-byte big-endian header followed by voxel data in
//! x-fastest order. MGZ is the same stream gzip-compressed.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use flate2::read::GzDecoder;
use tracing::debug;

use super::{voxel_count, Affine, Volume, VolumeError};

/// Offset of the first voxel
const DATA_OFFSET: usize = 284;
/// Bytes used by the fixed fields read below
const FIELDS_LEN: usize = 7 * 4 + 2 + 15 * 4;

const MRI_UCHAR: i32 = 0;
const MRI_INT: i32 = 1;
const MRI_FLOAT: i32 = 3;
const MRI_SHORT: i32 = 4;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Clone, PartialEq)]
struct MghHeader {
    dims: [usize; 3],
    frames: usize,
    dtype: i32,
    ras_good: bool,
    delta: [f32; 3],
    /// Direction cosines: x_r x_a x_s y_r y_a y_s z_r z_a z_s
    mdc: [f32; 9],
    c_ras: [f32; 3],
}

impl MghHeader {
    fn read<R: Read>(input: &mut R) -> Result<Self, VolumeError> {
        let _version = input.read_i32::<BigEndian>()?;
        let mut raw_dims = [0i32; 4];
        for dim in &mut raw_dims {
            *dim = input.read_i32::<BigEndian>()?;
        }
        let dtype = input.read_i32::<BigEndian>()?;
        let _dof = input.read_i32::<BigEndian>()?;
        let ras_good = input.read_i16::<BigEndian>()? == 1;

        let mut delta = [0f32; 3];
        input.read_f32_into::<BigEndian>(&mut delta)?;
        let mut mdc = [0f32; 9];
        input.read_f32_into::<BigEndian>(&mut mdc)?;
        let mut c_ras = [0f32; 3];
        input.read_f32_into::<BigEndian>(&mut c_ras)?;

        let dims = [raw_dims[0], raw_dims[1], raw_dims[2]].map(|d| d.max(0) as usize);
        if raw_dims.iter().any(|&d| d <= 0) || voxel_count(&dims).is_none() {
            return Err(VolumeError::InvalidDimensions(
                raw_dims.iter().map(|&d| d.max(0) as usize).collect(),
            ));
        }

        Ok(Self {
            dims,
            frames: raw_dims[3] as usize,
            dtype,
            ras_good,
            delta,
            mdc,
            c_ras,
        })
    }

    /// FreeSurfer vox2ras: `Mdc * diag(delta)`, centred on `c_ras`
    fn affine(&self) -> Affine {
        let (delta, mdc, c_ras) = if self.ras_good {
            (self.delta, self.mdc, self.c_ras)
        } else {
            // Coronal conformed orientation FreeSurfer assumes without a RAS block
            (
                [1.0; 3],
                [-1.0, 0.0, 0.0, 0.0, 0.0, -1.0, 0.0, 1.0, 0.0],
                [0.0; 3],
            )
        };

        let mut rows = [[0.0f64; 4]; 3];
        for (world, row) in rows.iter_mut().enumerate() {
            for voxel in 0..3 {
                row[voxel] = f64::from(mdc[voxel * 3 + world]) * f64::from(delta[voxel]);
            }
        }
        for (world, row) in rows.iter_mut().enumerate() {
            let centre: f64 = (0..3)
                .map(|voxel| row[voxel] * self.dims[voxel] as f64 / 2.0)
                .sum();
            row[3] = f64::from(c_ras[world]) - centre;
        }
        Affine(rows)
    }
}

pub(super) fn read_mgh(path: &Path) -> Result<Volume, VolumeError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut magic = [0u8; 2];
    reader.read_exact(&mut magic)?;

    let prefix = std::io::Cursor::new(magic);
    let chained = prefix.chain(reader);
    if magic == GZIP_MAGIC {
        read_mgh_stream(path, GzDecoder::new(chained))
    } else {
        read_mgh_stream(path, chained)
    }
}

fn read_mgh_stream<R: Read>(path: &Path, mut input: R) -> Result<Volume, VolumeError> {
    let header = MghHeader::read(&mut input)?;
    debug!(
        "{}: MGH {:?} x {} frames, dtype {}",
        path.display(),
        header.dims,
        header.frames,
        header.dtype
    );

    let mut padding = vec![0u8; DATA_OFFSET - FIELDS_LEN];
    input.read_exact(&mut padding)?;

    let voxels = voxel_count(&header.dims)
        .ok_or_else(|| VolumeError::InvalidDimensions(header.dims.to_vec()))?;
    let data = read_voxels(&mut input, header.dtype, voxels)?;
    Volume::new(header.dims, data, header.affine())
}

fn read_voxels<R: Read>(input: &mut R, dtype: i32, voxels: usize) -> Result<Vec<f32>, VolumeError> {
    let width = match dtype {
        MRI_UCHAR => 1,
        MRI_SHORT => 2,
        MRI_INT | MRI_FLOAT => 4,
        other => return Err(VolumeError::UnsupportedDataType(other)),
    };
    let invalid = || VolumeError::InvalidDimensions(vec![voxels]);
    let expected = voxels.checked_mul(width).ok_or_else(invalid)?;
    let limit = u64::try_from(expected).map_err(|_| invalid())?;

    // Grows with the stream, so a header claiming more voxels than the file
    // holds cannot force a huge allocation
    let mut raw = Vec::new();
    input.take(limit).read_to_end(&mut raw)?;
    if raw.len() < expected {
        return Err(VolumeError::Truncated {
            expected: voxels,
            found: raw.len() / width,
        });
    }

    let data = match dtype {
        MRI_UCHAR => raw.into_iter().map(f32::from).collect(),
        MRI_SHORT => raw
            .chunks_exact(2)
            .map(|c| f32::from(BigEndian::read_i16(c)))
            .collect(),
        MRI_INT => raw
            .chunks_exact(4)
            .map(|c| BigEndian::read_i32(c) as f32)
            .collect(),
        _ => raw.chunks_exact(4).map(BigEndian::read_f32).collect(),
    };
    Ok(data)
}
