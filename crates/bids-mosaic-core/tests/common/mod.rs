//! Synthetic datasets for integration tests.

#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::write::GzEncoder;
use flate2::Compression;

pub const DIMS: [usize; 3] = [16, 20, 16];

/// Single-file NIfTI-1 with float32 voxels and no qform/sform, so the
/// volume is centred on world zero with 1 mm voxels.
pub fn nifti_bytes(dims: [usize; 3], data: &[f32]) -> Vec<u8> {
    let mut header = vec![0u8; 348];
    let mut w = &mut header[..];
    w.write_i32::<LittleEndian>(348).unwrap();
    w = &mut header[40..];
    for dim in [3, dims[0], dims[1], dims[2], 1, 1, 1, 1] {
        w.write_i16::<LittleEndian>(dim as i16).unwrap();
    }
    w = &mut header[70..];
    w.write_i16::<LittleEndian>(16).unwrap(); // FLOAT32
    w.write_i16::<LittleEndian>(32).unwrap();
    w = &mut header[76..];
    for pixdim in [1.0f32; 8] {
        w.write_f32::<LittleEndian>(pixdim).unwrap();
    }
    w.write_f32::<LittleEndian>(352.0).unwrap(); // vox_offset
    w.write_f32::<LittleEndian>(1.0).unwrap(); // scl_slope
    header[344..348].copy_from_slice(b"n+1\0");

    let mut bytes = header;
    bytes.extend_from_slice(&[0u8; 4]);
    for value in data {
        bytes.write_f32::<LittleEndian>(*value).unwrap();
    }
    bytes
}

/// Ellipsoid of bright voxels in an otherwise empty volume
pub fn blob_volume(dims: [usize; 3]) -> Vec<f32> {
    let centre = dims.map(|d| (d as f32 - 1.0) / 2.0);
    let radii = dims.map(|d| d as f32 / 3.0);
    let mut data = Vec::with_capacity(dims.iter().product());
    for k in 0..dims[2] {
        for j in 0..dims[1] {
            for i in 0..dims[0] {
                let r = [i, j, k]
                    .iter()
                    .enumerate()
                    .map(|(axis, &v)| ((v as f32 - centre[axis]) / radii[axis]).powi(2))
                    .sum::<f32>();
                data.push(if r <= 1.0 { 50.0 + 10.0 * k as f32 } else { 0.0 });
            }
        }
    }
    data
}

/// Write a blob volume to `path`, gzip-compressed when it ends in `.gz`.
pub fn write_volume(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let bytes = nifti_bytes(DIMS, &blob_volume(DIMS));
    if path.extension().is_some_and(|ext| ext == "gz") {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&bytes).unwrap();
        fs::write(path, encoder.finish().unwrap()).unwrap();
    } else {
        fs::write(path, bytes).unwrap();
    }
}

/// `<root>/<name>` with `dataset_description.json` and the given scans
pub fn dataset(root: &Path, name: &str, scans: &[&str]) -> PathBuf {
    let dataset = root.join(name);
    fs::create_dir_all(&dataset).unwrap();
    fs::write(
        dataset.join("dataset_description.json"),
        r#"{"Name": "synthetic", "BIDSVersion": "1.8.0"}"#,
    )
    .unwrap();
    for scan in scans {
        write_volume(&dataset.join(scan));
    }
    dataset
}

/// Content streams of every page, decoded to text
pub fn page_texts(pdf: &Path) -> Vec<String> {
    let doc = lopdf::Document::load(pdf).unwrap();
    doc.get_pages()
        .values()
        .map(|id| String::from_utf8_lossy(&doc.get_page_content(*id).unwrap()).into_owned())
        .collect()
}

/// Number of image draws on each page
pub fn image_draws(pdf: &Path) -> Vec<usize> {
    let doc = lopdf::Document::load(pdf).unwrap();
    doc.get_pages()
        .values()
        .map(|id| {
            let content = lopdf::content::Content::decode(&doc.get_page_content(*id).unwrap()).unwrap();
            content.operations.iter().filter(|op| op.operator == "Do").count()
        })
        .collect()
}
