use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// A threshold written either as a number or as the string `"auto"`.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum FileThreshold {
    Value(f64),
    Keyword(String),
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileAlignConfig {
    pub reorder: Option<bool>,
    pub strategy: Option<String>,
    /// Code 1-6 or a metric name.
    pub cost_metric: Option<String>,
    pub center: Option<String>,
    pub max_cycles: Option<usize>,
    pub shelf_capacity: Option<usize>,
    pub max_hbond_difference: Option<usize>,
    /// Selection applied to both structures unless a side has its own.
    pub fragment: Option<Vec<usize>>,
    pub reference_fragment: Option<Vec<usize>>,
    pub target_fragment: Option<Vec<usize>>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FilePrefilterConfig {
    /// Bit mask: 1 rotational, 2 barcode, 4 energy.
    pub loose_mask: Option<u8>,
    pub tight_mask: Option<u8>,
    /// One entry per reorder pass, for every channel without its own list.
    pub loose_multipliers: Option<Vec<f64>>,
    pub loose_energy_multipliers: Option<Vec<f64>>,
    pub loose_rotational_multipliers: Option<Vec<f64>>,
    pub loose_barcode_multipliers: Option<Vec<f64>>,
    pub tight_multiplier: Option<f64>,
    pub tight_energy_multiplier: Option<f64>,
    pub tight_rotational_multiplier: Option<f64>,
    pub tight_barcode_multiplier: Option<f64>,
    pub loose_mode: Option<String>,
    pub ignore_rotation: Option<bool>,
    pub ignore_barcode: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileEarlyBreakConfig {
    pub reuse: Option<bool>,
    pub reorder: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FilePassesConfig {
    pub skip_initial: Option<bool>,
    pub skip_reorder: Option<bool>,
    pub skip_reuse: Option<bool>,
    pub skip_new_rules: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub rmsd_threshold: Option<FileThreshold>,
    pub threads: Option<usize>,
    pub max_energy: Option<f64>,
    pub max_rank: Option<usize>,
    pub align: Option<FileAlignConfig>,
    pub prefilter: Option<FilePrefilterConfig>,
    pub early_break: Option<FileEarlyBreakConfig>,
    pub passes: Option<FilePassesConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Reading configuration file {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_full_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scan.toml");
        std::fs::write(
            &path,
            r#"
            rmsd-threshold = 0.125
            threads = 4
            max-energy = 15.0

            [align]
            strategy = "anchor:N,O"
            cost-metric = "3"
            center = "center-of-mass"
            max-hbond-difference = 0

            [prefilter]
            loose-mask = 5
            loose-multipliers = [1.0, 1.5, 3.0]
            loose-energy-multipliers = [1.0, 1.0, 2.0]
            tight-barcode-multiplier = 0.05
            loose-mode = "scaled"

            [early-break]
            reuse = false

            [passes]
            skip-reuse = true
            "#,
        )
        .unwrap();

        let config = FileConfig::from_file(&path).unwrap();
        assert_eq!(config.rmsd_threshold, Some(FileThreshold::Value(0.125)));
        assert_eq!(config.threads, Some(4));
        let align = config.align.unwrap();
        assert_eq!(align.strategy.as_deref(), Some("anchor:N,O"));
        assert_eq!(align.max_hbond_difference, Some(0));
        let prefilter = config.prefilter.unwrap();
        assert_eq!(prefilter.loose_mask, Some(5));
        assert_eq!(prefilter.loose_multipliers, Some(vec![1.0, 1.5, 3.0]));
        assert_eq!(prefilter.loose_energy_multipliers, Some(vec![1.0, 1.0, 2.0]));
        assert_eq!(prefilter.tight_barcode_multiplier, Some(0.05));
        assert_eq!(prefilter.tight_multiplier, None);
        assert_eq!(config.early_break.unwrap().reuse, Some(false));
        assert_eq!(config.passes.unwrap().skip_reuse, Some(true));
    }

    #[test]
    fn threshold_keyword_is_accepted() {
        let config: FileConfig = toml::from_str(r#"rmsd-threshold = "auto""#).unwrap();
        assert_eq!(
            config.rmsd_threshold,
            Some(FileThreshold::Keyword("auto".to_string()))
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "rmsd-treshold = 0.1\n").unwrap();
        assert!(matches!(
            FileConfig::from_file(&path),
            Err(CliError::FileParsing { .. })
        ));
    }
}
