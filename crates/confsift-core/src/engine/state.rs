use super::cache::RuleCache;
use super::config::{Channel, ChannelMultipliers, LooseMode};
use super::descriptors::DescriptorDelta;
use super::prefilter::ChannelCutoffs;
use crate::core::models::permutation::Permutation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One harvested (RMSD, descriptor delta) pair from the initial pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub rmsd: f64,
    #[serde(flatten)]
    pub delta: DescriptorDelta,
}

/// RMSD threshold and prefilter cutoffs learned from the population.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdState {
    /// Duplicate threshold in Å; unset until given or discovered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rmsd: Option<f64>,
    #[serde(default)]
    pub loose: ChannelCutoffs,
    #[serde(default)]
    pub tight: ChannelCutoffs,
    #[serde(default)]
    pub samples: Vec<Sample>,
}

impl ThresholdState {
    pub fn record(&mut self, rmsd: f64, delta: DescriptorDelta) {
        if rmsd.is_finite() {
            self.samples.push(Sample { rmsd, delta });
        }
    }

    pub fn min_rmsd(&self) -> Option<f64> {
        self.samples.iter().map(|s| s.rmsd).reduce(f64::min)
    }

    /// Largest delta per channel among samples with RMSD at most that channel's
    /// `multiplier × threshold`.
    pub fn max_delta_within(&self, threshold: f64, multipliers: &ChannelMultipliers) -> ChannelCutoffs {
        let mut cutoffs = ChannelCutoffs::ZERO;
        for channel in Channel::ALL {
            let limit = multipliers.get(channel) * threshold;
            for sample in self.samples.iter().filter(|s| s.rmsd <= limit) {
                if let Some(value) = sample.delta.get(channel) {
                    cutoffs.set(channel, cutoffs.get(channel).max(value));
                }
            }
        }
        cutoffs
    }

    /// Fixes the threshold and derives the tight and base loose cutoffs from the samples.
    pub fn calibrate(&mut self, threshold: f64, tight: &ChannelMultipliers) {
        self.rmsd = Some(threshold);
        self.tight = self.max_delta_within(threshold, tight);
        self.loose = self
            .loose
            .max(self.max_delta_within(threshold, &ChannelMultipliers::uniform(1.0)));
    }

    /// Loose cutoffs for a reorder pass with the given multipliers.
    pub fn loose_for(&self, multipliers: &ChannelMultipliers, mode: LooseMode) -> ChannelCutoffs {
        match mode {
            LooseMode::Scaled => self.loose.scaled(multipliers),
            LooseMode::Mapped => {
                let threshold = self.rmsd.unwrap_or(0.0);
                self.loose.max(self.max_delta_within(threshold, multipliers))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    #[default]
    Initial,
    Reorder,
    Reuse,
    Finished,
}

impl Stage {
    /// Label used in records and output names, e.g. `reorder.2`.
    pub fn label(self, pass_index: usize) -> String {
        match self {
            Stage::Initial => "initial".to_string(),
            Stage::Reorder => format!("reorder.{}", pass_index + 1),
            Stage::Reuse => "reuse".to_string(),
            Stage::Finished => "finished".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    /// Within the RMSD threshold of a representative.
    Duplicate,
    /// Below the tight descriptor cutoffs of a representative.
    Prefilter,
    EnergyWindow,
    RankLimit,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RejectReason::Duplicate => "duplicate",
            RejectReason::Prefilter => "prefilter",
            RejectReason::EnergyWindow => "energy-window",
            RejectReason::RankLimit => "rank-limit",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedEntry {
    pub id: usize,
    pub stage: Stage,
    #[serde(default)]
    pub pass_index: usize,
    pub reason: RejectReason,
    /// The matching representative; an index into the prior set when `prior` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<usize>,
    #[serde(default)]
    pub prior: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rmsd: Option<f64>,
    /// Reordering applied to the rejected structure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<Permutation>,
}

impl RejectedEntry {
    pub fn new(id: usize, stage: Stage, pass_index: usize, reason: RejectReason) -> Self {
        Self {
            id,
            stage,
            pass_index,
            reason,
            reference: None,
            prior: false,
            rmsd: None,
            rule: None,
        }
    }

    pub fn matched(mut self, reference: usize, prior: bool) -> Self {
        self.reference = Some(reference);
        self.prior = prior;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanCounters {
    /// Accepted in the current pass.
    pub accepted: usize,
    pub rejected: usize,
    /// Full comparisons performed.
    pub reordered: usize,
    /// Duplicates found by a fresh reordering search.
    pub successful: usize,
    /// Duplicates found through a cached rule.
    pub reused: usize,
    /// Duplicates found in the native atom order.
    pub native: usize,
    /// Pairs the loose prefilter ruled out.
    pub skipped: usize,
    /// Pairs already compared in an earlier pass.
    pub duplicated: usize,
    pub rejected_directly: usize,
}

/// Everything needed to resume a scan.
///
/// Structure references are input indices, so a restart must use the same input file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanState {
    pub stage: Stage,
    #[serde(default)]
    pub pass_index: usize,
    /// Candidates of the current pass already processed.
    #[serde(default)]
    pub cursor: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_energy: Option<f64>,
    /// Input ordering of the current pass.
    #[serde(default)]
    pub pass_input: Vec<usize>,
    /// Representatives accepted so far in the current pass, in registration order.
    #[serde(default)]
    pub accepted: Vec<usize>,
    /// `(candidate, representative)` pairs fully compared in a reorder pass.
    #[serde(default)]
    pub compared: BTreeSet<(usize, usize)>,
    #[serde(default)]
    pub rules: RuleCache,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_delta: Option<DescriptorDelta>,
    #[serde(default)]
    pub counters: ScanCounters,
    #[serde(default)]
    pub thresholds: ThresholdState,
    #[serde(default)]
    pub rejected: Vec<RejectedEntry>,
}

impl ScanState {
    pub fn new(order: Vec<usize>) -> Self {
        Self {
            pass_input: order,
            ..Default::default()
        }
    }

    pub fn current_candidate(&self) -> Option<usize> {
        self.pass_input.get(self.cursor).copied()
    }

    pub fn remaining(&self) -> usize {
        self.pass_input.len().saturating_sub(self.cursor)
    }

    pub fn accept(&mut self, id: usize) {
        self.accepted.push(id);
        self.counters.accepted = self.accepted.len();
        self.cursor += 1;
    }

    pub fn reject(&mut self, entry: RejectedEntry) {
        self.rejected.push(entry);
        self.counters.rejected += 1;
        self.cursor += 1;
    }

    /// Moves to the next stage; the accepted set of the finished pass becomes its input.
    pub fn finish_pass(&mut self, next: Stage, pass_index: usize) {
        self.pass_input = std::mem::take(&mut self.accepted);
        self.cursor = 0;
        self.counters.accepted = 0;
        self.stage = next;
        self.pass_index = pass_index;
        if next != Stage::Reorder {
            self.compared.clear();
        }
    }

    /// Moves to the next stage without running the current one.
    pub fn skip_to(&mut self, next: Stage, pass_index: usize) {
        self.stage = next;
        self.pass_index = pass_index;
    }

    /// Accepted structures of a finished scan, in energy order.
    pub fn result(&self) -> &[usize] {
        &self.pass_input
    }

    /// Checks that every index refers to a population of `len` structures and `prior_len`
    /// prior structures.
    pub fn validate(&self, len: usize, prior_len: usize) -> Result<(), String> {
        let out_of_range = |i: &usize| *i >= len;
        if let Some(i) = self.pass_input.iter().chain(&self.accepted).find(|i| out_of_range(i)) {
            return Err(format!("structure index {i} exceeds the {len} input structures"));
        }
        if self.cursor > self.pass_input.len() {
            return Err(format!(
                "cursor {} is past the {} candidates of the pass",
                self.cursor,
                self.pass_input.len()
            ));
        }
        for entry in &self.rejected {
            let reference_len = if entry.prior { prior_len } else { len };
            if entry.id >= len || entry.reference.is_some_and(|r| r >= reference_len) {
                return Err(format!("rejected entry for structure {} is out of range", entry.id));
            }
        }
        Ok(())
    }
}

/// Outcome of one candidate/representative pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    Duplicate,
    Distinct,
    Skipped,
    AlreadyCompared,
    RejectedDirectly,
    /// Halted by an earlier representative before it ran.
    NotEvaluated,
    Failed,
}

/// How a duplicate was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    Native,
    Cached,
    Search,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRecord {
    pub pass: String,
    pub candidate: usize,
    pub reference: usize,
    pub prior: bool,
    pub rmsd: Option<f64>,
    pub delta: DescriptorDelta,
    pub method: Option<Method>,
    pub verdict: Verdict,
}
