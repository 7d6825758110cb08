//! Working directory for rendered slices.
//!
//! Slices land in one sub-directory per report section. The area is either a
//! temporary directory removed on drop, or a caller-chosen directory that is
//! kept.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::Result;

/// Report sections produced from a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Anatomical,
    Freesurfer,
}

impl Category {
    /// Sub-directory name, also used as the section title
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Anatomical => "Anatomical",
            Self::Freesurfer => "Freesurfer",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

#[derive(Debug)]
pub enum ScratchArea {
    /// Deleted when dropped
    Temporary(TempDir),
    /// Left in place for inspection
    Persistent(PathBuf),
}

impl ScratchArea {
    /// Fresh temporary directory under the system temp location.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn temporary() -> Result<Self> {
        Ok(Self::Temporary(
            tempfile::Builder::new().prefix("bidsmosaic-").tempdir()?,
        ))
    }

    /// Use (and create if needed) `path`.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn persistent(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        fs::create_dir_all(&path)?;
        Ok(Self::Persistent(path))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Temporary(dir) => dir.path(),
            Self::Persistent(path) => path,
        }
    }

    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }

    /// Directory for `category`, created on first use.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn category_dir(&self, category: Category) -> Result<PathBuf> {
        let dir = self.path().join(category.dir_name());
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporary_area_is_removed_on_drop() {
        let area = ScratchArea::temporary().unwrap();
        let root = area.path().to_path_buf();
        let anat = area.category_dir(Category::Anatomical).unwrap();
        assert!(anat.is_dir());
        assert!(area.is_temporary());
        drop(area);
        assert!(!root.exists());
    }

    #[test]
    fn test_persistent_area_survives_drop() {
        let parent = TempDir::new().unwrap();
        let target = parent.path().join("nested/pngs");
        let area = ScratchArea::persistent(&target).unwrap();
        let fs_dir = area.category_dir(Category::Freesurfer).unwrap();
        drop(area);
        assert!(fs_dir.is_dir());
        assert_eq!(fs_dir, target.join("Freesurfer"));
    }

    #[test]
    fn test_category_names() {
        assert_eq!(Category::Anatomical.to_string(), "Anatomical");
        assert_eq!(Category::Freesurfer.dir_name(), "Freesurfer");
    }
}
