//! Flat, reversible file names for rendered slices.
//!
//! A slice of `sub-01/anat/sub-01_T1w.nii.gz` is stored as
//! `sub-01%2Fanat%2Fsub-01_T1w.nii.gz.png`. Separators become the sentinel
//! sequence `%2F` and a literal `%` becomes `%25`, so subjects and sessions
//! never collide and the caption can be recovered exactly.

use std::path::{Component, Path};

/// Replaces a path separator in an encoded name
pub const SEPARATOR_SENTINEL: &str = "%2F";
/// Replaces a literal `%` in an encoded name
pub const PERCENT_ESCAPE: &str = "%25";
/// Extension of every rendered slice
pub const SLICE_EXTENSION: &str = "png";

/// Volume extensions stripped from captions, longest first
const VOLUME_EXTENSIONS: [&str; 5] = [".nii.gz", ".nii", ".mgz", ".mgh", ".img"];

/// Encode a `/`-separated relative path into a single file name component.
#[must_use]
pub fn encode(relative: &str) -> String {
    let mut encoded = String::with_capacity(relative.len() + 8);
    for ch in relative.chars() {
        match ch {
            '%' => encoded.push_str(PERCENT_ESCAPE),
            '/' => encoded.push_str(SEPARATOR_SENTINEL),
            other => encoded.push(other),
        }
    }
    encoded
}

/// Inverse of [`encode`].
///
/// A `%` that does not start a known escape is kept as is, so hand-made
/// file names in a pre-rendered directory still decode to something readable.
#[must_use]
pub fn decode(encoded: &str) -> String {
    let mut decoded = String::with_capacity(encoded.len());
    let mut rest = encoded;
    while let Some(pos) = rest.find('%') {
        decoded.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if tail
            .get(..3)
            .is_some_and(|head| head.eq_ignore_ascii_case(SEPARATOR_SENTINEL))
        {
            decoded.push('/');
            rest = &tail[3..];
        } else if tail.starts_with(PERCENT_ESCAPE) {
            decoded.push('%');
            rest = &tail[3..];
        } else {
            decoded.push('%');
            rest = &tail[1..];
        }
    }
    decoded.push_str(rest);
    decoded
}

/// Join the normal components of a relative path with `/`.
///
/// Platform separators never leak into encoded names this way.
#[must_use]
pub fn portable_relative(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// File name of the slice rendered from `relative`.
#[must_use]
pub fn slice_file_name(relative: &Path) -> String {
    format!("{}.{SLICE_EXTENSION}", encode(&portable_relative(relative)))
}

/// Caption shown under a thumbnail stored as `file_name`.
///
/// The raster extension is dropped, the sentinel restored, and a trailing
/// volume extension stripped: `sub-01%2Fanat%2Fsub-01_T1w.nii.gz.png`
/// becomes `sub-01/anat/sub-01_T1w`.
#[must_use]
pub fn caption_for(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map_or_else(|| file_name.to_string(), |s| s.to_string_lossy().into_owned());
    strip_volume_extension(&decode(&stem)).to_string()
}

/// Remove a known neuroimaging extension from the end of `name`.
#[must_use]
pub fn strip_volume_extension(name: &str) -> &str {
    let lower = name.to_ascii_lowercase();
    VOLUME_EXTENSIONS
        .iter()
        .find(|ext| lower.ends_with(*ext) && lower.len() > ext.len())
        .map_or(name, |ext| &name[..name.len() - ext.len()])
}
