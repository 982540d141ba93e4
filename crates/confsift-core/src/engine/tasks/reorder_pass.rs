use super::PassStatus;
use super::compare::{FullComparison, Outcome};
use crate::core::models::structure::Structure;
use crate::engine::context::ScanContext;
use crate::engine::descriptors::DescriptorDelta;
use crate::engine::error::EngineError;
use crate::engine::prefilter::{Prefilter, PrefilterDecision};
use crate::engine::progress::Progress;
use crate::engine::state::{
    ComparisonRecord, Method, RejectReason, RejectedEntry, ScanState, Stage, Verdict,
};
use tracing::{debug, info, instrument, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Reorder pass `index` against the representatives of this scan.
    Reorder { index: usize },
    /// Cached rules only, against the representatives of an earlier scan.
    Reuse,
}

impl PassKind {
    fn stage(self) -> Stage {
        match self {
            PassKind::Reorder { .. } => Stage::Reorder,
            PassKind::Reuse => Stage::Reuse,
        }
    }

    fn index(self) -> usize {
        match self {
            PassKind::Reorder { index } => index,
            PassKind::Reuse => 0,
        }
    }
}

/// Runs a reorder or reuse pass over the current pass input.
#[instrument(skip_all, name = "reorder_pass", fields(pass = ?kind))]
pub fn run(
    context: &ScanContext,
    state: &mut ScanState,
    records: &mut Vec<ComparisonRecord>,
    kind: PassKind,
) -> Result<PassStatus, EngineError> {
    let threshold = state
        .thresholds
        .rmsd
        .ok_or_else(|| EngineError::Internal("RMSD threshold is not set".to_string()))?;
    let prefilter = match kind {
        PassKind::Reorder { index } => {
            let multipliers = context
                .config
                .prefilter
                .loose_multipliers
                .get(index)
                .ok_or_else(|| EngineError::Internal(format!("no loose multipliers for pass {index}")))?;
            let loose = state
                .thresholds
                .loose_for(multipliers, context.config.prefilter.loose_mode);
            let prefilter = Prefilter::new(loose, state.thresholds.tight, &context.config.prefilter);
            info!(
                multipliers = ?multipliers,
                loose = ?prefilter.loose(),
                tight = ?prefilter.tight(),
                "Prefilter cutoffs for this pass."
            );
            Some(prefilter)
        }
        PassKind::Reuse => None,
    };
    let prior = kind == PassKind::Reuse;
    let label = kind.stage().label(kind.index());
    state.rules.set_skip_new_rules(context.config.skip_new_rules);

    info!(
        candidates = state.remaining(),
        threshold,
        rules = state.rules.len(),
        "Starting {} pass.",
        label
    );
    context.reporter.report(Progress::PhaseStart {
        name: if prior { "Reuse Pass" } else { "Reorder Pass" },
    });
    context.reporter.report(Progress::StatusUpdate {
        text: label.clone(),
    });
    context.reporter.report(Progress::TaskStart {
        total: state.pass_input.len() as u64,
    });
    if state.cursor > 0 {
        context.reporter.report(Progress::TaskIncrement {
            amount: state.cursor as u64,
        });
    }

    while let Some(id) = state.current_candidate() {
        if context.stop.is_requested() {
            info!(cursor = state.cursor, "Stop requested; interrupting the {} pass.", label);
            context.reporter.report(Progress::TaskFinish);
            context.reporter.report(Progress::PhaseFinish);
            return Ok(PassStatus::Interrupted);
        }
        if let Some(reason) = context.admission(state, id) {
            debug!(id, %reason, "Candidate not admitted.");
            state.reject(RejectedEntry::new(id, kind.stage(), kind.index(), reason));
            context.reporter.report(Progress::TaskIncrement { amount: 1 });
            continue;
        }

        process_candidate(context, state, records, kind, prefilter.as_ref(), threshold, &label, id);
        state.last_energy = context.population[id].energy;

        context.reporter.report(Progress::TaskIncrement { amount: 1 });
        context.reporter.report(Progress::StatusUpdate {
            text: format!(
                "{} kept, {} rejected, {} rules",
                state.accepted.len(),
                state.counters.rejected,
                state.rules.len()
            ),
        });
    }
    context.reporter.report(Progress::TaskFinish);

    let counters = &state.counters;
    info!(
        accepted = state.accepted.len(),
        rejected = counters.rejected,
        reordered = counters.reordered,
        successful = counters.successful,
        reused = counters.reused,
        native = counters.native,
        skipped = counters.skipped,
        duplicated = counters.duplicated,
        rejected_directly = counters.rejected_directly,
        rules = state.rules.len(),
        "Pass {} finished.",
        label
    );
    context.reporter.report(Progress::PhaseFinish);
    Ok(PassStatus::Completed)
}

#[allow(clippy::too_many_arguments)]
fn process_candidate(
    context: &ScanContext,
    state: &mut ScanState,
    records: &mut Vec<ComparisonRecord>,
    kind: PassKind,
    prefilter: Option<&Prefilter>,
    threshold: f64,
    label: &str,
    id: usize,
) {
    let prior = kind == PassKind::Reuse;
    let candidate = &context.population[id];
    let representatives: Vec<(usize, &Structure)> = match kind {
        PassKind::Reorder { .. } => state
            .accepted
            .iter()
            .map(|&r| (r, &context.population[r]))
            .collect(),
        PassKind::Reuse => context.prior.iter().enumerate().collect(),
    };
    let deltas: Vec<DescriptorDelta> = representatives
        .iter()
        .map(|(_, reference)| DescriptorDelta::between(candidate, reference))
        .collect();
    let record = |slot: usize, rmsd: Option<f64>, method: Option<Method>, verdict: Verdict| {
        ComparisonRecord {
            pass: label.to_string(),
            candidate: id,
            reference: representatives[slot].0,
            prior,
            rmsd,
            delta: deltas[slot],
            method,
            verdict,
        }
    };

    let reject_directly = |state: &mut ScanState, records: &mut Vec<ComparisonRecord>, slot: usize| {
        let reference = representatives[slot].0;
        debug!(id, reference, "Rejected directly by the tight prefilter.");
        state.counters.rejected_directly += 1;
        records.push(record(slot, None, None, Verdict::RejectedDirectly));
        state.last_delta = Some(deltas[slot]);
        state.reject(
            RejectedEntry::new(id, kind.stage(), kind.index(), RejectReason::Prefilter)
                .matched(reference, prior),
        );
    };

    // Slots after the first direct reject are never looked at.
    let mut enabled = Vec::new();
    let mut direct = None;
    for (slot, &(reference, _)) in representatives.iter().enumerate() {
        let decision = prefilter.map_or(PrefilterDecision::Compare, |p| p.classify(&deltas[slot]));
        let verdict = match decision {
            PrefilterDecision::Skip => {
                state.counters.skipped += 1;
                Verdict::Skipped
            }
            PrefilterDecision::Compare if !prior && state.compared.contains(&(id, reference)) => {
                state.counters.duplicated += 1;
                Verdict::AlreadyCompared
            }
            PrefilterDecision::Compare => {
                enabled.push(slot);
                continue;
            }
            PrefilterDecision::RejectDirectly => {
                direct = Some(slot);
                break;
            }
        };
        records.push(record(slot, None, None, verdict));
    }

    if enabled.is_empty() {
        match direct {
            Some(slot) => reject_directly(state, records, slot),
            None => {
                trace!(id, "No representative passed the loose prefilter.");
                state.accept(id);
            }
        }
        return;
    }

    if !prior {
        for &slot in &enabled {
            state.compared.insert((id, representatives[slot].0));
        }
    }
    let comparison = FullComparison {
        options: &context.config.align,
        rules: &state.rules,
        threshold,
        early_break: context.config.early_break,
        reuse_only: prior,
        budget: context.pool.inner_budget(enabled.len()),
    };
    let round = context
        .pool
        .run_round(&enabled, |slot| comparison.run(representatives[slot].1, candidate));

    let mut winner: Option<(usize, Outcome)> = None;
    let mut learned = Vec::new();
    for (slot, outcome) in round.outcomes {
        state.counters.reordered += 1;
        state.last_delta = Some(deltas[slot]);
        records.push(record(slot, outcome.finite_rmsd(), outcome.method, outcome.verdict()));
        if !outcome.duplicate {
            continue;
        }
        match outcome.method {
            Some(Method::Native) => state.counters.native += 1,
            Some(Method::Cached) => state.counters.reused += 1,
            Some(Method::Search) => {
                state.counters.successful += 1;
                learned.extend(outcome.rule.clone());
            }
            None => {}
        }
        if winner.is_none() {
            winner = Some((slot, outcome));
        }
    }
    if let Some(halt) = round.halted_at {
        for &slot in enabled.iter().filter(|&&slot| slot > halt) {
            records.push(record(slot, None, None, Verdict::NotEvaluated));
        }
    }
    for rule in learned {
        if state.rules.add(rule) {
            debug!(rules = state.rules.len(), "Learned a new reordering rule.");
        }
    }

    // Representatives registered before the directly rejecting one take precedence.
    match winner {
        Some((slot, outcome)) => {
            let reference = representatives[slot].0;
            debug!(id, reference, rmsd = outcome.rmsd, method = ?outcome.method, "Duplicate found.");
            let mut entry =
                RejectedEntry::new(id, kind.stage(), kind.index(), RejectReason::Duplicate)
                    .matched(reference, prior);
            entry.rmsd = Some(outcome.rmsd);
            entry.rule = outcome.rule;
            state.reject(entry);
        }
        None => match direct {
            Some(slot) => reject_directly(state, records, slot),
            None => state.accept(id),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::models::element::Element;
    use crate::core::models::structure::Descriptors;
    use crate::engine::config::{
        ChannelMultipliers, LooseMode, PrefilterConfig, ScanConfig, ScanConfigBuilder, Threshold,
    };
    use crate::engine::pool::WorkerPool;
    use crate::engine::prefilter::ChannelCutoffs;
    use crate::engine::progress::ProgressReporter;
    use crate::engine::stop::StopSignal;
    use nalgebra::Point3;

    fn triatomic(bend: f64, rotational: f64, barcode: f64) -> Structure {
        Structure::new(vec![
            Atom::new(Element::OXYGEN, Point3::new(0.0, 0.0, 0.0)),
            Atom::new(Element::HYDROGEN, Point3::new(0.96, 0.0, 0.0)),
            Atom::new(Element::HYDROGEN, Point3::new(-0.24, bend, 0.0)),
        ])
        .with_energy(-76.0)
        .with_descriptors(Descriptors {
            rotational_constants: Some([rotational; 3]),
            barcode: Some(vec![barcode]),
        })
    }

    fn config() -> ScanConfig {
        ScanConfigBuilder::new()
            .threshold(Threshold::Fixed(0.1))
            .prefilter(PrefilterConfig {
                loose_multipliers: vec![ChannelMultipliers::uniform(1.0)],
                loose_mode: LooseMode::Scaled,
                ..Default::default()
            })
            .build()
            .unwrap()
    }

    /// Representatives 0 and 1 are accepted; candidate 2 is processed in the first reorder pass.
    fn run_pass(population: &[Structure]) -> (ScanState, Vec<ComparisonRecord>) {
        let config = config();
        let reporter = ProgressReporter::new();
        let stop = StopSignal::new();
        let pool = WorkerPool::new(1).unwrap();
        let context = ScanContext {
            config: &config,
            population,
            prior: &[],
            lowest_energy: Some(-76.0),
            reporter: &reporter,
            stop: &stop,
            pool: &pool,
        };
        let mut state = ScanState::new(vec![2]);
        state.stage = Stage::Reorder;
        state.accepted = vec![0, 1];
        state.thresholds.rmsd = Some(0.1);
        state.thresholds.loose = ChannelCutoffs {
            rotational: 100.0,
            barcode: 100.0,
            energy: 100.0,
        };
        state.thresholds.tight = ChannelCutoffs {
            rotational: 1.0,
            barcode: 1.0,
            energy: 1.0,
        };
        let mut records = Vec::new();
        let status = run(&context, &mut state, &mut records, PassKind::Reorder { index: 0 }).unwrap();
        assert_eq!(status, PassStatus::Completed);
        (state, records)
    }

    #[test]
    fn earlier_duplicate_wins_over_later_direct_reject() {
        // Candidate 2 is geometrically identical to 0 but descriptor-identical to 1.
        let population = vec![
            triatomic(0.93, 10.0, 0.0),
            triatomic(0.5, 20.0, 5.0),
            triatomic(0.93, 20.0, 5.0),
        ];
        let (state, records) = run_pass(&population);

        let entry = state.rejected.last().unwrap();
        assert_eq!(entry.id, 2);
        assert_eq!(entry.reason, RejectReason::Duplicate);
        assert_eq!(entry.reference, Some(0));
        assert!(entry.rmsd.unwrap() < 1e-6);
        assert_eq!(state.counters.rejected_directly, 0);
        assert!(records.iter().all(|r| r.verdict != Verdict::RejectedDirectly));
    }

    #[test]
    fn direct_reject_applies_when_earlier_slots_differ() {
        let population = vec![
            triatomic(0.3, 10.0, 0.0),
            triatomic(0.5, 20.0, 5.0),
            triatomic(0.93, 20.0, 5.0),
        ];
        let (state, records) = run_pass(&population);

        let entry = state.rejected.last().unwrap();
        assert_eq!(entry.reason, RejectReason::Prefilter);
        assert_eq!(entry.reference, Some(1));
        assert_eq!(state.counters.rejected_directly, 1);
        assert_eq!(state.counters.reordered, 1);
        assert_eq!(records.last().unwrap().verdict, Verdict::RejectedDirectly);
    }
}
