use crate::core::align::engine::AlignOptions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_LOOSE_MULTIPLIERS: [f64; 2] = [1.0, 2.0];
pub const DEFAULT_TIGHT_MULTIPLIER: f64 = 0.1;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("An automatically discovered RMSD threshold requires the initial pass")]
    AutoThresholdWithoutInitialPass,
}

/// A descriptor used to prefilter candidate pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
    Rotational,
    Barcode,
    Energy,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Rotational, Channel::Barcode, Channel::Energy];

    pub fn bit(self) -> u8 {
        match self {
            Channel::Rotational => 1,
            Channel::Barcode => 2,
            Channel::Energy => 4,
        }
    }
}

/// Set of [`Channel`]s, encoded as rotational = 1, barcode = 2, energy = 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelMask(u8);

impl ChannelMask {
    pub const NONE: ChannelMask = ChannelMask(0);
    pub const ALL: ChannelMask = ChannelMask(7);

    pub fn from_bits(bits: u8) -> Option<Self> {
        (bits <= 7).then_some(Self(bits))
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, channel: Channel) -> bool {
        self.0 & channel.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn channels(self) -> impl Iterator<Item = Channel> {
        Channel::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl FromIterator<Channel> for ChannelMask {
    fn from_iter<I: IntoIterator<Item = Channel>>(iter: I) -> Self {
        Self(iter.into_iter().fold(0, |bits, c| bits | c.bit()))
    }
}

/// Multipliers of the RMSD threshold, one per descriptor channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelMultipliers {
    pub rotational: f64,
    pub barcode: f64,
    pub energy: f64,
}

impl ChannelMultipliers {
    pub const fn uniform(value: f64) -> Self {
        Self {
            rotational: value,
            barcode: value,
            energy: value,
        }
    }

    pub fn get(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Rotational => self.rotational,
            Channel::Barcode => self.barcode,
            Channel::Energy => self.energy,
        }
    }

    pub fn set(&mut self, channel: Channel, value: f64) {
        match channel {
            Channel::Rotational => self.rotational = value,
            Channel::Barcode => self.barcode = value,
            Channel::Energy => self.energy = value,
        }
    }

    fn find(&self, bad: impl Fn(f64) -> bool) -> Option<f64> {
        Channel::ALL.iter().map(|&c| self.get(c)).find(|&m| bad(m))
    }
}

/// How loose cutoffs grow with the pass multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LooseMode {
    /// Largest delta among samples within `multiplier × threshold`.
    #[default]
    Mapped,
    /// Base cutoff times the multiplier.
    Scaled,
}

impl FromStr for LooseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mapped" => Ok(LooseMode::Mapped),
            "scaled" => Ok(LooseMode::Scaled),
            other => Err(format!("unknown loose mode '{other}'")),
        }
    }
}

impl fmt::Display for LooseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LooseMode::Mapped => "mapped",
            LooseMode::Scaled => "scaled",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Threshold {
    Fixed(f64),
    /// Discovered during the initial pass as the smallest observed RMSD.
    Auto,
}

/// Accepts `auto` or a non-negative RMSD in Å.
impl FromStr for Threshold {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("auto") {
            return Ok(Threshold::Auto);
        }
        trimmed
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(Threshold::Fixed)
            .ok_or_else(|| format!("'{trimmed}' is neither 'auto' nor a non-negative number"))
    }
}

/// Whether a successful comparison stops the remaining workers of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EarlyBreak {
    pub reuse: bool,
    pub reorder: bool,
}

impl Default for EarlyBreak {
    fn default() -> Self {
        Self {
            reuse: true,
            reorder: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrefilterConfig {
    pub loose_mask: ChannelMask,
    pub tight_mask: ChannelMask,
    /// One reorder pass per entry.
    pub loose_multipliers: Vec<ChannelMultipliers>,
    pub tight_multipliers: ChannelMultipliers,
    pub loose_mode: LooseMode,
    pub ignore_rotation: bool,
    pub ignore_barcode: bool,
}

impl Default for PrefilterConfig {
    fn default() -> Self {
        Self {
            loose_mask: ChannelMask::ALL,
            tight_mask: [Channel::Rotational, Channel::Barcode].into_iter().collect(),
            loose_multipliers: DEFAULT_LOOSE_MULTIPLIERS
                .into_iter()
                .map(ChannelMultipliers::uniform)
                .collect(),
            tight_multipliers: ChannelMultipliers::uniform(DEFAULT_TIGHT_MULTIPLIER),
            loose_mode: LooseMode::default(),
            ignore_rotation: false,
            ignore_barcode: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    pub threshold: Threshold,
    pub align: AlignOptions,
    pub prefilter: PrefilterConfig,
    pub early_break: EarlyBreak,
    pub threads: usize,
    /// Energy window above the lowest structure, in kJ/mol.
    pub max_energy: Option<f64>,
    /// Upper bound on the number of accepted structures.
    pub max_rank: Option<usize>,
    pub skip_initial: bool,
    pub skip_reorder: bool,
    pub skip_reuse: bool,
    /// Keep using cached rules but stop learning new ones.
    pub skip_new_rules: bool,
}

#[derive(Default)]
pub struct ScanConfigBuilder {
    threshold: Option<Threshold>,
    align: Option<AlignOptions>,
    prefilter: Option<PrefilterConfig>,
    early_break: Option<EarlyBreak>,
    threads: Option<usize>,
    max_energy: Option<f64>,
    max_rank: Option<usize>,
    skip_initial: bool,
    skip_reorder: bool,
    skip_reuse: bool,
    skip_new_rules: bool,
}

impl ScanConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn threshold(mut self, threshold: Threshold) -> Self {
        self.threshold = Some(threshold);
        self
    }
    pub fn align(mut self, options: AlignOptions) -> Self {
        self.align = Some(options);
        self
    }
    pub fn prefilter(mut self, prefilter: PrefilterConfig) -> Self {
        self.prefilter = Some(prefilter);
        self
    }
    pub fn early_break(mut self, early_break: EarlyBreak) -> Self {
        self.early_break = Some(early_break);
        self
    }
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }
    pub fn max_energy(mut self, kj_per_mol: Option<f64>) -> Self {
        self.max_energy = kj_per_mol;
        self
    }
    pub fn max_rank(mut self, rank: Option<usize>) -> Self {
        self.max_rank = rank;
        self
    }
    pub fn skip_initial(mut self, skip: bool) -> Self {
        self.skip_initial = skip;
        self
    }
    pub fn skip_reorder(mut self, skip: bool) -> Self {
        self.skip_reorder = skip;
        self
    }
    pub fn skip_reuse(mut self, skip: bool) -> Self {
        self.skip_reuse = skip;
        self
    }
    pub fn skip_new_rules(mut self, skip: bool) -> Self {
        self.skip_new_rules = skip;
        self
    }

    pub fn build(self) -> Result<ScanConfig, ConfigError> {
        let threshold = self
            .threshold
            .ok_or(ConfigError::MissingParameter("rmsd_threshold"))?;
        if let Threshold::Fixed(value) = threshold {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid("rmsd_threshold", format!("{value} is not a non-negative number")));
            }
        }
        if threshold == Threshold::Auto && self.skip_initial {
            return Err(ConfigError::AutoThresholdWithoutInitialPass);
        }

        let threads = self.threads.unwrap_or(1);
        if threads == 0 {
            return Err(invalid("threads", "must be at least 1".to_string()));
        }

        let align = self.align.unwrap_or_default();
        if align.max_cycles == 0 {
            return Err(invalid("max_cycles", "must be at least 1".to_string()));
        }

        let prefilter = self.prefilter.unwrap_or_default();
        if let Some(bad) = prefilter
            .loose_multipliers
            .iter()
            .find_map(|m| m.find(|v| !v.is_finite() || v <= 0.0))
        {
            return Err(invalid("loose_multipliers", format!("{bad} is not a positive number")));
        }
        if let Some(bad) = prefilter
            .tight_multipliers
            .find(|v| !v.is_finite() || v < 0.0)
        {
            return Err(invalid(
                "tight_multipliers",
                format!("{bad} is not a non-negative number"),
            ));
        }
        if let Some(window) = self.max_energy {
            if !window.is_finite() || window < 0.0 {
                return Err(invalid("max_energy", format!("{window} is not a non-negative number")));
            }
        }

        Ok(ScanConfig {
            threshold,
            align,
            prefilter,
            early_break: self.early_break.unwrap_or_default(),
            threads,
            max_energy: self.max_energy,
            max_rank: self.max_rank,
            skip_initial: self.skip_initial,
            skip_reorder: self.skip_reorder,
            skip_reuse: self.skip_reuse,
            skip_new_rules: self.skip_new_rules,
        })
    }
}

fn invalid(name: &'static str, reason: String) -> ConfigError {
    ConfigError::InvalidParameter { name, reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_applies_defaults() {
        let config = ScanConfigBuilder::new()
            .threshold(Threshold::Fixed(0.5))
            .build()
            .unwrap();
        assert_eq!(config.threads, 1);
        assert_eq!(
            config.prefilter.loose_multipliers,
            vec![ChannelMultipliers::uniform(1.0), ChannelMultipliers::uniform(2.0)]
        );
        assert_eq!(config.prefilter.tight_multipliers, ChannelMultipliers::uniform(0.1));
        assert_eq!(config.prefilter.loose_mask.bits(), 7);
        assert_eq!(config.prefilter.tight_mask.bits(), 3);
        assert_eq!(config.early_break, EarlyBreak::default());
        assert!(config.align.reorder);
    }

    #[test]
    fn threshold_parses_auto_and_values() {
        assert_eq!("auto".parse::<Threshold>(), Ok(Threshold::Auto));
        assert_eq!(" 0.25 ".parse::<Threshold>(), Ok(Threshold::Fixed(0.25)));
        assert!("-1".parse::<Threshold>().is_err());
        assert!("loose".parse::<Threshold>().is_err());
    }

    #[test]
    fn builder_requires_threshold() {
        assert_eq!(
            ScanConfigBuilder::new().build(),
            Err(ConfigError::MissingParameter("rmsd_threshold"))
        );
    }

    #[test]
    fn auto_threshold_needs_initial_pass() {
        let result = ScanConfigBuilder::new()
            .threshold(Threshold::Auto)
            .skip_initial(true)
            .build();
        assert_eq!(result, Err(ConfigError::AutoThresholdWithoutInitialPass));
    }

    #[test]
    fn builder_rejects_invalid_values() {
        let base = || ScanConfigBuilder::new().threshold(Threshold::Fixed(0.5));
        assert!(matches!(
            base().threads(0).build(),
            Err(ConfigError::InvalidParameter { name: "threads", .. })
        ));
        assert!(matches!(
            ScanConfigBuilder::new().threshold(Threshold::Fixed(-1.0)).build(),
            Err(ConfigError::InvalidParameter { name: "rmsd_threshold", .. })
        ));
        let mut second = ChannelMultipliers::uniform(2.0);
        second.barcode = 0.0;
        let prefilter = PrefilterConfig {
            loose_multipliers: vec![ChannelMultipliers::uniform(1.0), second],
            ..Default::default()
        };
        assert!(matches!(
            base().prefilter(prefilter).build(),
            Err(ConfigError::InvalidParameter { name: "loose_multipliers", .. })
        ));
        let prefilter = PrefilterConfig {
            tight_multipliers: ChannelMultipliers {
                energy: -0.1,
                ..ChannelMultipliers::uniform(0.1)
            },
            ..Default::default()
        };
        assert!(matches!(
            base().prefilter(prefilter).build(),
            Err(ConfigError::InvalidParameter { name: "tight_multipliers", .. })
        ));
        assert!(matches!(
            base().max_energy(Some(f64::NAN)).build(),
            Err(ConfigError::InvalidParameter { name: "max_energy", .. })
        ));
    }

    #[test]
    fn channel_masks_decode_bits() {
        let mask = ChannelMask::from_bits(5).unwrap();
        assert!(mask.contains(Channel::Rotational));
        assert!(!mask.contains(Channel::Barcode));
        assert!(mask.contains(Channel::Energy));
        assert_eq!(
            mask.channels().collect::<Vec<_>>(),
            vec![Channel::Rotational, Channel::Energy]
        );
        assert!(ChannelMask::from_bits(8).is_none());
        assert!(ChannelMask::NONE.is_empty());
    }

    #[test]
    fn loose_mode_parses() {
        assert_eq!("Scaled".parse::<LooseMode>(), Ok(LooseMode::Scaled));
        assert_eq!(LooseMode::Mapped.to_string(), "mapped");
        assert!("other".parse::<LooseMode>().is_err());
    }
}
