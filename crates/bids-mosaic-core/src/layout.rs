//! Dataset scanner: a small index over a BIDS directory tree.
//!
//! Only the `sub-<label>/[ses-<label>/]<datatype>/<file>` levels are
//! indexed. File names are split into BIDS entities without any schema
//! validation, so non-compliant datasets still index whatever parses.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use tracing::{debug, warn};

use crate::error::{MosaicError, Result};

/// Datatype directory holding structural scans
pub const ANATOMICAL_DATATYPE: &str = "anat";
/// Extensions of anatomical volumes picked up by [`Query::anatomical`]
pub const ANATOMICAL_EXTENSIONS: [&str; 2] = ["nii", "nii.gz"];
/// FreeSurfer volumes relative to a subjects directory
pub const FREESURFER_ORIG_PATTERN: &str = "sub-*/mri/orig/*";

const SUBJECT_LEVEL_PATTERNS: [&str; 2] = ["sub-*/*/*", "sub-*/ses-*/*/*"];

/// One file of the dataset with its parsed BIDS entities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidsFile {
    /// Absolute (or root-joined) path
    pub path: PathBuf,
    /// Path relative to the dataset root
    pub relative: PathBuf,
    pub subject: String,
    pub session: Option<String>,
    /// Name of the datatype directory (`anat`, `func`, `dwi`, ...)
    pub datatype: String,
    /// Remaining `key-value` entities of the file name (`run`, `acq`, ...)
    pub entities: BTreeMap<String, String>,
    /// Trailing suffix such as `T1w`, if present
    pub suffix: Option<String>,
    /// Everything after the first dot, without it (`nii.gz`)
    pub extension: String,
}

impl BidsFile {
    fn from_path(root: &Path, path: PathBuf) -> Option<Self> {
        let relative = path.strip_prefix(root).ok()?.to_path_buf();
        let levels: Vec<String> = relative
            .iter()
            .map(|part| part.to_string_lossy().into_owned())
            .collect();

        let (subject_dir, session_dir, datatype, file_name) = match levels.as_slice() {
            [sub, datatype, file] => (sub, None, datatype, file),
            [sub, ses, datatype, file] => (sub, Some(ses), datatype, file),
            _ => return None,
        };

        // `sub-01/ses-1/sub-01_ses-1_scans.tsv` matches the shallow pattern
        if datatype.starts_with("ses-") {
            return None;
        }

        let subject = subject_dir.strip_prefix("sub-")?.to_string();
        let session = match session_dir {
            Some(dir) => Some(dir.strip_prefix("ses-")?.to_string()),
            None => None,
        };

        let (stem, extension) = file_name
            .split_once('.')
            .map_or((file_name.as_str(), ""), |(stem, ext)| (stem, ext));

        let mut entities = BTreeMap::new();
        let mut suffix = None;
        for part in stem.split('_') {
            match part.split_once('-') {
                Some((key, value)) if !key.is_empty() => {
                    entities.insert(key.to_string(), value.to_string());
                }
                _ => suffix = Some(part.to_string()),
            }
        }
        entities.remove("sub");
        entities.remove("ses");

        Some(Self {
            path,
            relative,
            subject,
            session,
            datatype: datatype.clone(),
            entities,
            suffix,
            extension: extension.to_string(),
        })
    }
}

/// Filter over indexed files; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub datatype: Option<String>,
    pub extensions: Vec<String>,
}

impl Query {
    /// Anatomical NIfTI volumes (`datatype=anat`, `extension in {nii, nii.gz}`)
    #[must_use]
    pub fn anatomical() -> Self {
        Self::default()
            .datatype(ANATOMICAL_DATATYPE)
            .extensions(ANATOMICAL_EXTENSIONS)
    }

    #[must_use]
    pub fn datatype(mut self, datatype: impl Into<String>) -> Self {
        self.datatype = Some(datatype.into());
        self
    }

    #[must_use]
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    fn matches(&self, file: &BidsFile) -> bool {
        self.datatype.as_ref().map_or(true, |d| *d == file.datatype)
            && (self.extensions.is_empty()
                || self
                    .extensions
                    .iter()
                    .any(|ext| ext.eq_ignore_ascii_case(&file.extension)))
    }
}

/// Index of one BIDS dataset
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    root: PathBuf,
    files: Vec<BidsFile>,
}

impl DatasetLayout {
    /// Index every file under the subject (and session) levels of `root`.
    ///
    /// # Errors
    /// Returns [`MosaicError::DatasetNotFound`] if `root` is not a directory.
    pub fn index(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(MosaicError::DatasetNotFound(root));
        }

        let mut files = Vec::new();
        for pattern in SUBJECT_LEVEL_PATTERNS {
            for path in glob_files(&root, pattern)? {
                if let Some(file) = BidsFile::from_path(&root, path) {
                    files.push(file);
                }
            }
        }
        files.sort_by(|a, b| a.relative.cmp(&b.relative));

        debug!("Indexed {} files under {}", files.len(), root.display());
        Ok(Self { root, files })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn files(&self) -> &[BidsFile] {
        &self.files
    }

    /// Files matching `query`, in path order
    #[must_use]
    pub fn get(&self, query: &Query) -> Vec<&BidsFile> {
        self.files.iter().filter(|f| query.matches(f)).collect()
    }

    /// Shortcut for `get(&Query::anatomical())`
    #[must_use]
    pub fn anatomical(&self) -> Vec<&BidsFile> {
        self.get(&Query::anatomical())
    }
}

/// Every file matching `sub-*/mri/orig/*` under a FreeSurfer subjects directory.
///
/// # Errors
/// Returns [`MosaicError::DatasetNotFound`] if `root` is not a directory.
pub fn find_freesurfer_volumes(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(MosaicError::DatasetNotFound(root.to_path_buf()));
    }
    let mut volumes = glob_files(root, FREESURFER_ORIG_PATTERN)?;
    volumes.sort();
    debug!(
        "Found {} FreeSurfer volumes under {}",
        volumes.len(),
        root.display()
    );
    Ok(volumes)
}

/// Regular, non-hidden files matching `pattern` relative to `root`.
fn glob_files(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = format!(
        "{}/{pattern}",
        Pattern::escape(&root.to_string_lossy()).trim_end_matches('/')
    );
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };

    let mut files = Vec::new();
    for entry in glob::glob_with(&full, options)? {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable entry {}: {}", e.path().display(), e),
        }
    }
    Ok(files)
}
