//! bidsmosaic - PDF of slice thumbnails for a BIDS dataset

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;
use tracing::{info, warn};

use bids_mosaic_cli::{logging, CliConfig, Verbosity};
use bids_mosaic_core::{create_mosaic_pdf, MosaicOptions};

#[derive(Parser, Debug)]
#[command(
    name = "bidsmosaic",
    version,
    about = "Render one slice per scan of a BIDS dataset into a PDF mosaic",
    long_about = "Render one slice per scan of a BIDS dataset into a PDF mosaic.\n\n\
                  Anatomical scans (anat/*.nii, anat/*.nii.gz) are cut along the sagittal\n\
                  midline, trimmed, and laid out as a captioned grid, one section per\n\
                  category. Defaults can be set via .bidsmosaic.toml configuration file.",
    after_help = "EXAMPLES:\n  \
                  # Anatomical mosaic, written to ds000001_mosaic.pdf\n  \
                  bidsmosaic /data/ds000001\n\n  \
                  # Add FreeSurfer volumes and a metadata table\n  \
                  bidsmosaic /data/ds000001 --freesurfer /data/ds000001/derivatives/freesurfer \\\n    \
                  --metadata '{\"Dataset\": \"ds000001\"}'\n\n  \
                  # Re-assemble previously rendered thumbnails\n  \
                  bidsmosaic --png-dir ./pngs -o report.pdf\n\n\
                  CONFIG FILES (lowest to highest precedence):\n  \
                  ~/.bidsmosaic.toml, ./.bidsmosaic.toml, --config <FILE>, command-line flags"
)]
struct Cli {
    /// BIDS dataset root
    #[arg(required_unless_present = "png_dir")]
    dataset: Option<PathBuf>,

    /// Output PDF [default: <dataset name>_mosaic.pdf]
    #[arg(short, long, value_name = "FILE")]
    out_file: Option<PathBuf>,

    /// Assemble existing thumbnails from this directory instead of rendering
    #[arg(long, value_name = "DIR")]
    png_dir: Option<PathBuf>,

    /// Keep rendered thumbnails in this directory
    #[arg(long, value_name = "DIR")]
    png_out_dir: Option<PathBuf>,

    /// JSON object appended as a key/value table
    #[arg(long, value_name = "JSON")]
    metadata: Option<String>,

    /// Include anatomical scans (default)
    #[arg(long, overrides_with = "no_anat")]
    anat: bool,

    /// Skip anatomical scans
    #[arg(long, overrides_with = "anat")]
    no_anat: bool,

    /// FreeSurfer subjects directory; renders sub-*/mri/orig/*
    #[arg(long, value_name = "DIR")]
    freesurfer: Option<PathBuf>,

    /// Shrink every thumbnail by this factor
    #[arg(long, value_name = "N")]
    downsample: Option<u32>,

    /// Config file, applied over ~/.bidsmosaic.toml and ./.bidsmosaic.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Per-file progress
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Warnings and errors only
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn options(&self, file_config: &CliConfig) -> MosaicOptions {
        MosaicOptions {
            dataset: self.dataset.clone(),
            out_file: self.out_file.clone(),
            png_dir: self.png_dir.clone(),
            png_out_dir: self.png_out_dir.clone(),
            metadata: self.metadata.clone(),
            anat: self.anat || !self.no_anat,
            freesurfer: self.freesurfer.clone(),
            downsample: self.downsample.or(file_config.downsample),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(Verbosity::from_flags(cli.quiet, cli.verbose))
        .context("Failed to set tracing subscriber")?;

    let file_config = CliConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let options = cli.options(&file_config);
    let config = file_config.mosaic_config();

    let summary = create_mosaic_pdf(&options, &config).context("Failed to create mosaic")?;

    for run in &summary.categories {
        info!("{}: {} rendered, {} failed", run.category, run.rendered, run.failed);
    }
    if summary.render_failures() > 0 {
        warn!(
            "{} volumes could not be rendered; see errors above",
            summary.render_failures()
        );
    }
    info!(
        "Mosaic written to {} ({} pages)",
        summary.output.display(),
        summary.page_count
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_anat_flags_last_wins() {
        let cli = Cli::parse_from(["bidsmosaic", "ds", "--no-anat"]);
        assert!(!cli.options(&CliConfig::default()).anat);
        let cli = Cli::parse_from(["bidsmosaic", "ds", "--no-anat", "--anat"]);
        assert!(cli.options(&CliConfig::default()).anat);
        let cli = Cli::parse_from(["bidsmosaic", "ds"]);
        assert!(cli.options(&CliConfig::default()).anat);
    }

    #[test]
    fn test_dataset_optional_with_png_dir() {
        assert!(Cli::try_parse_from(["bidsmosaic"]).is_err());
        let cli = Cli::parse_from(["bidsmosaic", "--png-dir", "pngs"]);
        assert!(cli.dataset.is_none());
    }

    #[test]
    fn test_flag_downsample_beats_config() {
        let file = CliConfig {
            downsample: Some(4),
            ..CliConfig::default()
        };
        let cli = Cli::parse_from(["bidsmosaic", "ds", "--downsample", "2"]);
        assert_eq!(cli.options(&file).downsample, Some(2));
        let cli = Cli::parse_from(["bidsmosaic", "ds"]);
        assert_eq!(cli.options(&file).downsample, Some(4));
    }
}
