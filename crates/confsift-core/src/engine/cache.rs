use crate::core::align::engine::AlignmentEngine;
use crate::core::models::permutation::Permutation;
use crate::core::models::structure::Structure;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// A cached rule that made two structures duplicates.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    pub permutation: Permutation,
    pub rmsd: f64,
    pub hbond_difference: Option<usize>,
}

/// Reorder rules discovered earlier in the scan, tried before any fresh search.
///
/// The cache only grows; identical rules are stored once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleCache {
    rules: Vec<Permutation>,
    #[serde(skip)]
    skip_new_rules: bool,
}

impl RuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_skip_new_rules(&mut self, skip: bool) {
        self.skip_new_rules = skip;
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permutation> {
        self.rules.iter()
    }

    /// Returns `false` for empty rules, rules already cached, or when growth is suppressed.
    pub fn add(&mut self, rule: Permutation) -> bool {
        if self.skip_new_rules {
            return false;
        }
        self.insert(rule)
    }

    /// Adds restored rules regardless of the growth switch; returns how many were new.
    pub fn merge<I: IntoIterator<Item = Permutation>>(&mut self, rules: I) -> usize {
        rules.into_iter().filter(|r| self.insert(r.clone())).count()
    }

    fn insert(&mut self, rule: Permutation) -> bool {
        if rule.is_empty() || self.rules.contains(&rule) {
            return false;
        }
        self.rules.push(rule);
        true
    }

    /// Evaluates every applicable rule without searching.
    ///
    /// A rule succeeds when its RMSD is within `threshold` and, if the engine limits it, the
    /// hydrogen-bond topology difference is small enough. With `early_break` the first success is
    /// returned, otherwise the best success over all rules.
    pub fn try_all(
        &self,
        engine: &AlignmentEngine,
        reference: &Structure,
        target: &Structure,
        threshold: f64,
        early_break: bool,
    ) -> Option<RuleMatch> {
        if reference.len() != target.len() {
            return None;
        }
        let max_difference = engine.options().max_hbond_difference;
        let reference_elements = reference.elements();
        let target_elements = target.elements();
        let mut best: Option<RuleMatch> = None;

        for rule in &self.rules {
            if rule.len() != reference.len()
                || !rule.preserves_elements(&reference_elements, &target_elements)
            {
                continue;
            }
            let Ok(result) = engine.rmsd_for_permutation(reference, target, rule) else {
                continue;
            };
            let topology_ok = match (max_difference, result.hbond_difference) {
                (Some(max), Some(difference)) => difference <= max,
                _ => true,
            };
            trace!(rule = %rule, rmsd = result.rmsd, topology_ok, "Tried cached rule.");
            if result.rmsd > threshold || !topology_ok {
                continue;
            }
            let found = RuleMatch {
                permutation: rule.clone(),
                rmsd: result.rmsd,
                hbond_difference: result.hbond_difference,
            };
            if early_break {
                return Some(found);
            }
            if best.as_ref().is_none_or(|b| found.rmsd < b.rmsd) {
                best = Some(found);
            }
        }
        best
    }
}
