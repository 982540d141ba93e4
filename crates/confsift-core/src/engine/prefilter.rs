use super::config::{Channel, ChannelMask, ChannelMultipliers, PrefilterConfig};
use super::descriptors::DescriptorDelta;
use serde::{Deserialize, Serialize};

const NEGLIGIBLE_CUTOFF: f64 = 1e-8;

/// One cutoff per descriptor channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelCutoffs {
    pub rotational: f64,
    pub barcode: f64,
    pub energy: f64,
}

impl ChannelCutoffs {
    pub const ZERO: ChannelCutoffs = ChannelCutoffs {
        rotational: 0.0,
        barcode: 0.0,
        energy: 0.0,
    };

    pub const UNBOUNDED: ChannelCutoffs = ChannelCutoffs {
        rotational: f64::INFINITY,
        barcode: f64::INFINITY,
        energy: f64::INFINITY,
    };

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

    /// Channel-wise maximum.
    pub fn max(self, other: ChannelCutoffs) -> ChannelCutoffs {
        ChannelCutoffs {
            rotational: self.rotational.max(other.rotational),
            barcode: self.barcode.max(other.barcode),
            energy: self.energy.max(other.energy),
        }
    }

    pub fn scaled(self, factors: &ChannelMultipliers) -> ChannelCutoffs {
        ChannelCutoffs {
            rotational: self.rotational * factors.rotational,
            barcode: self.barcode * factors.barcode,
            energy: self.energy * factors.energy,
        }
    }

    pub fn is_negligible(&self) -> bool {
        Channel::ALL
            .iter()
            .all(|&c| self.get(c) <= NEGLIGIBLE_CUTOFF)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefilterDecision {
    /// Clearly dissimilar; no geometric comparison.
    Skip,
    /// Similar enough to warrant a full comparison.
    Compare,
    /// So similar that the candidate is a duplicate without any geometry.
    RejectDirectly,
}

/// Loose/tight descriptor gate in front of the geometric comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Prefilter {
    loose: ChannelCutoffs,
    tight: ChannelCutoffs,
    loose_mask: ChannelMask,
    tight_mask: ChannelMask,
}

impl Prefilter {
    /// Ignored channels always pass the loose check and never pass the tight one.
    pub fn new(loose: ChannelCutoffs, tight: ChannelCutoffs, config: &PrefilterConfig) -> Self {
        let mut loose = loose;
        let mut tight = tight;
        for (ignored, channel) in [
            (config.ignore_rotation, Channel::Rotational),
            (config.ignore_barcode, Channel::Barcode),
        ] {
            if ignored {
                loose.set(channel, f64::INFINITY);
                tight.set(channel, -1.0);
            }
        }
        Self {
            loose,
            tight,
            loose_mask: config.loose_mask,
            tight_mask: config.tight_mask,
        }
    }

    pub fn loose(&self) -> &ChannelCutoffs {
        &self.loose
    }

    pub fn tight(&self) -> &ChannelCutoffs {
        &self.tight
    }

    pub fn classify(&self, delta: &DescriptorDelta) -> PrefilterDecision {
        if !self.within_loose(delta) {
            return PrefilterDecision::Skip;
        }
        if self.below_tight(delta) {
            PrefilterDecision::RejectDirectly
        } else {
            PrefilterDecision::Compare
        }
    }

    /// Every masked channel strictly below its loose cutoff, or all cutoffs negligible.
    /// A channel without data passes.
    pub fn within_loose(&self, delta: &DescriptorDelta) -> bool {
        self.loose.is_negligible()
            || self
                .loose_mask
                .channels()
                .all(|c| delta.get(c).is_none_or(|d| d < self.loose.get(c)))
    }

    /// Every masked channel strictly below its tight cutoff. A channel without data fails, and
    /// an empty mask never rejects.
    pub fn below_tight(&self, delta: &DescriptorDelta) -> bool {
        !self.tight_mask.is_empty()
            && self
                .tight_mask
                .channels()
                .all(|c| delta.get(c).is_some_and(|d| d < self.tight.get(c)))
    }
}
