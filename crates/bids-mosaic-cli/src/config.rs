//! `.bidsmosaic.toml` discovery and merging.
//!
//! Configuration files can be placed in:
//! - User home directory: `~/.bidsmosaic.toml` (user defaults)
//! - Project directory: `./.bidsmosaic.toml` (project defaults)
//! - Custom location via `--config`
//!
//! Precedence (highest to lowest): command-line flags, `--config` file,
//! project config, user config, built-in defaults. Every key is optional and
//! merged individually, so a project file can change one value of a section
//! without repeating the rest.

use std::fs;
use std::path::{Path, PathBuf};

use bids_mosaic_core::{LayoutConfig, MosaicConfig, RenderConfig, SliceAxis};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// File name looked up in the home and working directories
pub const CONFIG_FILE_NAME: &str = ".bidsmosaic.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Contents of one config file
///
/// ```toml
/// downsample = 2
///
/// [render]
/// axis = "axial"
/// cut_coord = 10.0
///
/// [layout]
/// cell_width = 144.0
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downsample: Option<u32>,
    pub render: RenderSection,
    pub layout: LayoutSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderSection {
    pub axis: Option<SliceAxis>,
    pub cut_coord: Option<f64>,
    pub background_threshold: Option<f32>,
    pub intensity_percentile: Option<f32>,
    pub pixels_per_mm: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutSection {
    pub page_width: Option<f32>,
    pub page_height: Option<f32>,
    pub margin: Option<f32>,
    pub cell_width: Option<f32>,
    pub thumbnail_height: Option<f32>,
    pub cell_padding: Option<f32>,
    pub caption_font_size: Option<f32>,
    pub body_font_size: Option<f32>,
    pub title_font_size: Option<f32>,
}

impl RenderSection {
    fn overlay(self, over: Self) -> Self {
        Self {
            axis: over.axis.or(self.axis),
            cut_coord: over.cut_coord.or(self.cut_coord),
            background_threshold: over.background_threshold.or(self.background_threshold),
            intensity_percentile: over.intensity_percentile.or(self.intensity_percentile),
            pixels_per_mm: over.pixels_per_mm.or(self.pixels_per_mm),
        }
    }

    fn apply(&self, config: &mut RenderConfig) {
        if let Some(axis) = self.axis {
            config.axis = axis;
        }
        if let Some(cut) = self.cut_coord {
            config.cut_coord = cut;
        }
        if let Some(threshold) = self.background_threshold {
            config.background_threshold = threshold;
        }
        if let Some(percentile) = self.intensity_percentile {
            config.intensity_percentile = percentile;
        }
        if let Some(scale) = self.pixels_per_mm {
            config.pixels_per_mm = scale;
        }
    }
}

impl LayoutSection {
    fn overlay(self, over: Self) -> Self {
        Self {
            page_width: over.page_width.or(self.page_width),
            page_height: over.page_height.or(self.page_height),
            margin: over.margin.or(self.margin),
            cell_width: over.cell_width.or(self.cell_width),
            thumbnail_height: over.thumbnail_height.or(self.thumbnail_height),
            cell_padding: over.cell_padding.or(self.cell_padding),
            caption_font_size: over.caption_font_size.or(self.caption_font_size),
            body_font_size: over.body_font_size.or(self.body_font_size),
            title_font_size: over.title_font_size.or(self.title_font_size),
        }
    }

    fn apply(&self, config: &mut LayoutConfig) {
        let fields = [
            (self.page_width, &mut config.page_width),
            (self.page_height, &mut config.page_height),
            (self.margin, &mut config.margin),
            (self.cell_width, &mut config.cell_width),
            (self.thumbnail_height, &mut config.thumbnail_height),
            (self.cell_padding, &mut config.cell_padding),
            (self.caption_font_size, &mut config.caption_font_size),
            (self.body_font_size, &mut config.body_font_size),
            (self.title_font_size, &mut config.title_font_size),
        ];
        for (value, slot) in fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

impl CliConfig {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file cannot be read or is not valid TOML
    /// for this schema.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `over` wins wherever it sets a value.
    #[must_use]
    pub fn overlay(self, over: Self) -> Self {
        Self {
            downsample: over.downsample.or(self.downsample),
            render: self.render.overlay(over.render),
            layout: self.layout.overlay(over.layout),
        }
    }

    /// Built-in defaults with this file's values applied
    #[must_use]
    pub fn mosaic_config(&self) -> MosaicConfig {
        let mut config = MosaicConfig::default();
        self.render.apply(&mut config.render);
        self.layout.apply(&mut config.layout);
        config
    }

    /// Merge user, project and explicit config files.
    ///
    /// `home` and `project_dir` are where the discovered files are looked up.
    /// A broken discovered file is reported and skipped; a broken explicit
    /// file is an error.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if `explicit` cannot be loaded.
    pub fn discover(
        explicit: Option<&Path>,
        project_dir: &Path,
        home: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let user = home.and_then(|home| load_optional(&home.join(CONFIG_FILE_NAME), "user"));
        let project = load_optional(&project_dir.join(CONFIG_FILE_NAME), "project");

        let mut merged = Self::default();
        for layer in [user, project].into_iter().flatten() {
            merged = merged.overlay(layer);
        }
        if let Some(path) = explicit {
            merged = merged.overlay(Self::load_from_file(path)?);
            debug!("Loaded config from {}", path.display());
        }
        Ok(merged)
    }

    /// [`CliConfig::discover`] with the real home and working directories
    ///
    /// # Errors
    /// Returns [`ConfigError`] if `explicit` cannot be loaded.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let home = dirs::home_dir();
        Self::discover(explicit, Path::new("."), home.as_deref())
    }
}

fn load_optional(path: &Path, kind: &str) -> Option<CliConfig> {
    if !path.exists() {
        return None;
    }
    match CliConfig::load_from_file(path) {
        Ok(config) => {
            debug!("Loaded {} config from {}", kind, path.display());
            Some(config)
        }
        Err(e) => {
            warn!("Ignoring {} config: {}", kind, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join(CONFIG_FILE_NAME);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_empty_config_is_default() {
        let config: CliConfig = toml::from_str("").unwrap();
        assert_eq!(config, CliConfig::default());
        assert_eq!(config.mosaic_config(), MosaicConfig::default());
    }

    #[test]
    fn test_sections_parse() {
        let config: CliConfig = toml::from_str(
            r#"
            downsample = 3
            [render]
            axis = "coronal"
            cut_coord = -12.5
            [layout]
            cell_width = 144.0
            "#,
        )
        .unwrap();
        assert_eq!(config.downsample, Some(3));
        let mosaic = config.mosaic_config();
        assert_eq!(mosaic.render.axis, SliceAxis::Coronal);
        assert_eq!(mosaic.render.cut_coord, -12.5);
        assert_eq!(mosaic.layout.cell_width, 144.0);
        assert_eq!(mosaic.layout.margin, LayoutConfig::default().margin);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(toml::from_str::<CliConfig>("[render]\ncolour = 1").is_err());
    }

    #[test]
    fn test_precedence_project_over_user_explicit_over_project() {
        let home = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let extra = TempDir::new().unwrap();
        write(home.path(), "downsample = 2\n[render]\naxis = \"axial\"\npixels_per_mm = 1.0");
        write(project.path(), "downsample = 4\n[render]\naxis = \"coronal\"");
        let explicit = write(extra.path(), "[render]\naxis = \"sagittal\"");

        let merged = CliConfig::discover(None, project.path(), Some(home.path())).unwrap();
        assert_eq!(merged.downsample, Some(4));
        assert_eq!(merged.render.axis, Some(SliceAxis::Coronal));
        // Keys the project file leaves out fall through to the user file
        assert_eq!(merged.render.pixels_per_mm, Some(1.0));

        let merged =
            CliConfig::discover(Some(&explicit), project.path(), Some(home.path())).unwrap();
        assert_eq!(merged.render.axis, Some(SliceAxis::Sagittal));
        assert_eq!(merged.downsample, Some(4));
    }

    #[test]
    fn test_broken_discovered_file_is_ignored() {
        let home = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        write(home.path(), "downsample = 2");
        write(project.path(), "downsample = [not toml");

        let merged = CliConfig::discover(None, project.path(), Some(home.path())).unwrap();
        assert_eq!(merged.downsample, Some(2));
    }

    #[test]
    fn test_broken_explicit_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let explicit = write(dir.path(), "downsample = \"two\"");
        let err = CliConfig::discover(Some(&explicit), dir.path(), None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));

        let missing = dir.path().join("missing.toml");
        let err = CliConfig::discover(Some(&missing), dir.path(), None).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
