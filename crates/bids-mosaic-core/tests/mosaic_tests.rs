//! End-to-end runs over synthetic BIDS datasets.

mod common;

use std::fs;

use bids_mosaic_core::{
    create_mosaic_pdf, DatasetLayout, MosaicConfig, MosaicError, MosaicOptions, SliceRenderer,
};
use tempfile::TempDir;

const T1W: &str = "sub-01/anat/sub-01_T1w.nii.gz";

#[test]
fn test_single_scan_gives_one_page_one_thumbnail() {
    let dir = TempDir::new().unwrap();
    let dataset = common::dataset(dir.path(), "ds000001", &[T1W]);
    let out = dir.path().join("ds000001_mosaic.pdf");

    let options = MosaicOptions {
        out_file: Some(out.clone()),
        ..MosaicOptions::for_dataset(&dataset)
    };
    let summary = create_mosaic_pdf(&options, &MosaicConfig::default()).unwrap();

    assert_eq!(summary.page_count, 1);
    assert_eq!(summary.rendered(), 1);
    assert_eq!(summary.render_failures(), 0);
    assert_eq!(common::image_draws(&out), vec![1]);
    let pages = common::page_texts(&out);
    assert!(pages[0].contains("(Anatomical)"));
    assert!(pages[0].contains("(sub-01/anat/sub-01_T1w)"));
}

#[test]
fn test_metadata_adds_table_section() {
    let dir = TempDir::new().unwrap();
    let dataset = common::dataset(dir.path(), "ds", &[T1W]);
    let out = dir.path().join("with_meta.pdf");

    let options = MosaicOptions {
        out_file: Some(out.clone()),
        metadata: Some(r#"{"k":"v"}"#.to_string()),
        ..MosaicOptions::for_dataset(&dataset)
    };
    let summary = create_mosaic_pdf(&options, &MosaicConfig::default()).unwrap();

    assert_eq!(summary.page_count, 2);
    assert_eq!(summary.report.metadata_rows, 1);
    let pages = common::page_texts(&out);
    assert!(pages[0].contains("(sub-01/anat/sub-01_T1w)"));
    assert!(pages[1].contains("(Metadata)"));
    assert!(pages[1].contains("(k)"));
    assert!(pages[1].contains("(v)"));
}

#[test]
fn test_malformed_metadata_fails_before_writing() {
    let dir = TempDir::new().unwrap();
    let dataset = common::dataset(dir.path(), "ds", &[T1W]);
    let out = dir.path().join("never.pdf");
    let pngs = dir.path().join("pngs");

    for bad in ["{not json", "[1, 2]", "\"text\""] {
        let options = MosaicOptions {
            out_file: Some(out.clone()),
            png_out_dir: Some(pngs.clone()),
            metadata: Some(bad.to_string()),
            ..MosaicOptions::for_dataset(&dataset)
        };
        let err = create_mosaic_pdf(&options, &MosaicConfig::default()).unwrap_err();
        assert!(matches!(err, MosaicError::Metadata(_)), "{bad}: {err}");
    }
    assert!(!out.exists());
    assert!(!pngs.exists());
}

#[test]
fn test_empty_dataset_completes_with_placeholder() {
    let dir = TempDir::new().unwrap();
    let dataset = common::dataset(dir.path(), "empty", &[]);
    let out = dir.path().join("empty.pdf");

    let options = MosaicOptions {
        out_file: Some(out.clone()),
        ..MosaicOptions::for_dataset(&dataset)
    };
    let summary = create_mosaic_pdf(&options, &MosaicConfig::default()).unwrap();

    assert_eq!(summary.page_count, 1);
    assert_eq!(summary.rendered(), 0);
    assert_eq!(common::image_draws(&out), vec![0]);
    assert!(common::page_texts(&out)[0].contains("(No images)"));
}

#[test]
fn test_corrupt_volume_is_skipped() {
    let dir = TempDir::new().unwrap();
    let dataset = common::dataset(dir.path(), "ds", &[T1W]);
    let broken = dataset.join("sub-02/anat/sub-02_T1w.nii");
    fs::create_dir_all(broken.parent().unwrap()).unwrap();
    fs::write(&broken, b"not a nifti file").unwrap();
    let out = dir.path().join("partial.pdf");

    let options = MosaicOptions {
        out_file: Some(out.clone()),
        ..MosaicOptions::for_dataset(&dataset)
    };
    let summary = create_mosaic_pdf(&options, &MosaicConfig::default()).unwrap();

    assert_eq!(summary.rendered(), 1);
    assert_eq!(summary.render_failures(), 1);
    assert_eq!(common::image_draws(&out), vec![1]);
}

#[test]
fn test_sessions_are_captioned_with_full_path() {
    let dir = TempDir::new().unwrap();
    let dataset = common::dataset(
        dir.path(),
        "ds",
        &["sub-01/ses-pre/anat/sub-01_ses-pre_T1w.nii", T1W],
    );
    let out = dir.path().join("sessions.pdf");

    let options = MosaicOptions {
        out_file: Some(out.clone()),
        ..MosaicOptions::for_dataset(&dataset)
    };
    // Wide cells keep the longer session caption on one line
    let mut config = MosaicConfig::default();
    config.layout.cell_width = 200.0;
    create_mosaic_pdf(&options, &config).unwrap();

    let page = &common::page_texts(&out)[0];
    assert!(page.contains("(sub-01/ses-pre/anat/sub-01_ses-pre_T1w)"));
    assert!(page.contains("(sub-01/anat/sub-01_T1w)"));
}

#[test]
fn test_persistent_png_out_dir_keeps_thumbnails() {
    let dir = TempDir::new().unwrap();
    let dataset = common::dataset(dir.path(), "ds", &[T1W]);
    let pngs = dir.path().join("rendered");

    let options = MosaicOptions {
        out_file: Some(dir.path().join("out.pdf")),
        png_out_dir: Some(pngs.clone()),
        downsample: Some(2),
        ..MosaicOptions::for_dataset(&dataset)
    };
    create_mosaic_pdf(&options, &MosaicConfig::default()).unwrap();

    let png = pngs.join("Anatomical/sub-01%2Fanat%2Fsub-01_T1w.nii.gz.png");
    assert!(png.is_file());
    // Sagittal blob: 20 x 16 voxels at 2 px/mm, cropped to content, then halved
    let (w, h) = image::image_dimensions(&png).unwrap();
    assert!(w > 0 && w <= 20);
    assert!(h > 0 && h <= 16);
}

#[test]
fn test_bypass_mode_uses_existing_pngs() {
    let dir = TempDir::new().unwrap();
    let dataset = common::dataset(dir.path(), "ds", &[T1W]);
    let pngs = dir.path().join("rendered");
    let renderer = SliceRenderer::new(MosaicConfig::default().render, None).unwrap();
    let category = pngs.join("Custom");
    fs::create_dir_all(&category).unwrap();
    renderer
        .create_slice_img(&dataset.join(T1W), &category, &dataset)
        .unwrap()
        .unwrap();

    let out = dir.path().join("bypass.pdf");
    let options = MosaicOptions {
        png_dir: Some(pngs),
        out_file: Some(out.clone()),
        ..MosaicOptions::default()
    };
    let summary = create_mosaic_pdf(&options, &MosaicConfig::default()).unwrap();

    assert!(summary.categories.is_empty());
    assert_eq!(summary.report.sections[0].title, "Custom");
    assert!(common::page_texts(&out)[0].contains("(sub-01/anat/sub-01_T1w)"));
}

#[test]
fn test_missing_png_dir() {
    let dir = TempDir::new().unwrap();
    let options = MosaicOptions {
        png_dir: Some(dir.path().join("nope")),
        out_file: Some(dir.path().join("x.pdf")),
        ..MosaicOptions::default()
    };
    let err = create_mosaic_pdf(&options, &MosaicConfig::default()).unwrap_err();
    assert!(matches!(err, MosaicError::ImageDirNotFound(_)));
}

#[test]
fn test_freesurfer_only() {
    let dir = TempDir::new().unwrap();
    let dataset = common::dataset(dir.path(), "ds", &[T1W]);
    let fs_root = dir.path().join("freesurfer");
    common::write_volume(&fs_root.join("sub-01/mri/orig/001.nii.gz"));
    let out = dir.path().join("fs.pdf");

    let options = MosaicOptions {
        out_file: Some(out.clone()),
        anat: false,
        freesurfer: Some(fs_root),
        ..MosaicOptions::for_dataset(&dataset)
    };
    let summary = create_mosaic_pdf(&options, &MosaicConfig::default()).unwrap();

    assert_eq!(summary.categories.len(), 1);
    assert_eq!(summary.report.sections[0].title, "Freesurfer");
    let page = &common::page_texts(&out)[0];
    assert!(page.contains("(sub-01/mri/orig/001)"));
    assert!(!page.contains("(Anatomical)"));
}

#[test]
fn test_layout_indexes_generated_dataset() {
    let dir = TempDir::new().unwrap();
    let dataset = common::dataset(
        dir.path(),
        "ds",
        &[T1W, "sub-02/anat/sub-02_run-1_T2w.nii.gz", "sub-02/func/sub-02_task-rest_bold.nii.gz"],
    );
    let layout = DatasetLayout::index(&dataset).unwrap();

    let subjects: Vec<&str> = layout.files().iter().map(|f| f.subject.as_str()).collect();
    assert_eq!(subjects, ["01", "02", "02"]);
    assert_eq!(layout.anatomical().len(), 2);
    assert_eq!(layout.files().len(), 3);
}
