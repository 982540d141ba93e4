use crate::core::align::engine::{AlignOptions, AlignmentEngine, AlignmentResult};
use crate::core::align::error::AlignError;
use crate::core::models::permutation::Permutation;
use crate::core::models::structure::Structure;
use crate::engine::cache::RuleCache;
use crate::engine::config::EarlyBreak;
use crate::engine::state::{Method, Verdict};
use tracing::{debug, trace};

/// Result of comparing one candidate against one representative.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Outcome {
    /// Best RMSD observed; infinite when no alignment succeeded.
    pub rmsd: f64,
    pub duplicate: bool,
    pub method: Option<Method>,
    /// Reordering that made the candidate match, if any.
    pub rule: Option<Permutation>,
    pub failed: bool,
}

impl Outcome {
    fn distinct(rmsd: f64) -> Self {
        Self {
            rmsd,
            duplicate: false,
            method: None,
            rule: None,
            failed: !rmsd.is_finite(),
        }
    }

    fn duplicate(rmsd: f64, method: Method, rule: Option<Permutation>) -> Self {
        Self {
            rmsd,
            duplicate: true,
            method: Some(method),
            rule,
            failed: false,
        }
    }

    pub fn verdict(&self) -> Verdict {
        if self.duplicate {
            Verdict::Duplicate
        } else if self.failed {
            Verdict::Failed
        } else {
            Verdict::Distinct
        }
    }

    pub fn finite_rmsd(&self) -> Option<f64> {
        self.rmsd.is_finite().then_some(self.rmsd)
    }
}

fn topology_ok(result: &AlignmentResult, max_difference: Option<usize>) -> bool {
    match (max_difference, result.hbond_difference) {
        (Some(max), Some(difference)) => difference <= max,
        _ => true,
    }
}

fn native_engine(options: &AlignOptions) -> AlignmentEngine {
    AlignmentEngine::new(AlignOptions {
        reorder: false,
        threads: 1,
        ..options.clone()
    })
}

/// RMSD in the native atom order, or `None` when the orders are incompatible or the alignment
/// fails.
fn native_rmsd(
    engine: &AlignmentEngine,
    reference: &Structure,
    candidate: &Structure,
) -> Option<AlignmentResult> {
    if !reference.same_element_order(candidate) {
        return None;
    }
    match engine.superpose(reference, candidate) {
        Ok(result) => Some(result),
        Err(e) => {
            debug!("Native alignment failed: {}", e);
            None
        }
    }
}

/// Compares in the native atom order only.
///
/// Without a threshold the pair is never reported as a duplicate; the RMSD is still returned so
/// the caller can harvest it.
pub(crate) fn native(
    options: &AlignOptions,
    reference: &Structure,
    candidate: &Structure,
    threshold: Option<f64>,
) -> Outcome {
    let engine = native_engine(options);
    let Some(result) = native_rmsd(&engine, reference, candidate) else {
        return Outcome::distinct(f64::INFINITY);
    };
    let matched = threshold.is_some_and(|t| result.rmsd <= t)
        && topology_ok(&result, options.max_hbond_difference);
    if matched {
        Outcome::duplicate(result.rmsd, Method::Native, None)
    } else {
        Outcome::distinct(result.rmsd)
    }
}

/// Full comparison used by the reorder and reuse passes: native order first, then the cached
/// rules, then a fresh reordering search.
pub(crate) struct FullComparison<'a> {
    pub options: &'a AlignOptions,
    pub rules: &'a RuleCache,
    pub threshold: f64,
    pub early_break: EarlyBreak,
    /// Stop after the cached rules.
    pub reuse_only: bool,
    /// Threads the search may use.
    pub budget: usize,
}

impl FullComparison<'_> {
    /// Runs the comparison and reports whether a success should halt the round.
    pub fn run(&self, reference: &Structure, candidate: &Structure) -> (Outcome, bool) {
        let engine = native_engine(self.options);
        let mut best = f64::INFINITY;

        if let Some(result) = native_rmsd(&engine, reference, candidate) {
            if result.rmsd <= self.threshold
                && topology_ok(&result, self.options.max_hbond_difference)
            {
                trace!(rmsd = result.rmsd, "Native order matches.");
                return (Outcome::duplicate(result.rmsd, Method::Native, None), true);
            }
            best = result.rmsd;
        }

        if let Some(found) = self.rules.try_all(
            &engine,
            reference,
            candidate,
            self.threshold,
            self.early_break.reuse,
        ) {
            trace!(rule = %found.permutation, rmsd = found.rmsd, "Cached rule matches.");
            return (
                Outcome::duplicate(found.rmsd, Method::Cached, Some(found.permutation)),
                self.early_break.reuse,
            );
        }

        if self.reuse_only {
            return (Outcome::distinct(best), false);
        }

        let search = AlignmentEngine::new(AlignOptions {
            reorder: true,
            threads: self.budget.max(1),
            ..self.options.clone()
        });
        match search.align(reference, candidate) {
            Ok(result) if result.rmsd <= self.threshold => {
                let rule = result.permutation.filter(|p| !p.is_identity());
                (
                    Outcome::duplicate(result.rmsd, Method::Search, rule),
                    self.early_break.reorder,
                )
            }
            Ok(result) => (Outcome::distinct(best.min(result.rmsd)), false),
            Err(AlignError::TopologyMismatch { max }) => {
                trace!(max, "Every ordering breaks the hydrogen-bond topology.");
                (Outcome::distinct(best), false)
            }
            Err(e) => {
                debug!("Reordering search failed: {}", e);
                (Outcome::distinct(best), false)
            }
        }
    }
}
