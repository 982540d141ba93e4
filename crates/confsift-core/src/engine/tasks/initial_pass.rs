use super::PassStatus;
use super::compare;
use crate::engine::config::Threshold;
use crate::engine::context::ScanContext;
use crate::engine::descriptors::DescriptorDelta;
use crate::engine::error::EngineError;
use crate::engine::progress::Progress;
use crate::engine::state::{ComparisonRecord, RejectReason, RejectedEntry, ScanState, Stage};
use tracing::{debug, info, instrument};

/// Compares every candidate against every representative in the native atom order.
///
/// All comparisons of a candidate run to completion so the harvested RMSD and descriptor samples
/// do not depend on scheduling. With a fixed threshold, duplicates are rejected here already;
/// with an automatic one every admitted candidate is accepted and the threshold is taken from
/// the samples once the pass completes.
#[instrument(skip_all, name = "initial_pass")]
pub fn run(
    context: &ScanContext,
    state: &mut ScanState,
    records: &mut Vec<ComparisonRecord>,
) -> Result<PassStatus, EngineError> {
    let threshold = match context.config.threshold {
        Threshold::Fixed(value) => Some(value),
        Threshold::Auto => None,
    };
    let label = Stage::Initial.label(0);
    info!(
        candidates = state.remaining(),
        ?threshold,
        "Starting initial pass in native atom order."
    );
    context.reporter.report(Progress::PhaseStart {
        name: "Initial Pass",
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
            info!(cursor = state.cursor, "Stop requested; interrupting the initial pass.");
            context.reporter.report(Progress::TaskFinish);
            context.reporter.report(Progress::PhaseFinish);
            return Ok(PassStatus::Interrupted);
        }

        if let Some(reason) = context.admission(state, id) {
            debug!(id, %reason, "Candidate not admitted.");
            state.reject(RejectedEntry::new(id, Stage::Initial, 0, reason));
            context.reporter.report(Progress::TaskIncrement { amount: 1 });
            continue;
        }

        let candidate = &context.population[id];
        let representatives = state.accepted.clone();
        let slots: Vec<usize> = (0..representatives.len()).collect();
        let round = context.pool.run_round(&slots, |slot| {
            let reference = &context.population[representatives[slot]];
            (
                compare::native(&context.config.align, reference, candidate, threshold),
                false,
            )
        });

        let mut duplicate_of: Option<(usize, f64)> = None;
        for (slot, outcome) in round.outcomes {
            let reference = representatives[slot];
            let delta = DescriptorDelta::between(candidate, &context.population[reference]);
            state.thresholds.record(outcome.rmsd, delta);
            state.last_delta = Some(delta);
            if outcome.duplicate && duplicate_of.is_none() {
                duplicate_of = Some((reference, outcome.rmsd));
            }
            records.push(ComparisonRecord {
                pass: label.clone(),
                candidate: id,
                reference,
                prior: false,
                rmsd: outcome.finite_rmsd(),
                delta,
                method: outcome.method,
                verdict: outcome.verdict(),
            });
        }
        state.last_energy = candidate.energy;

        match duplicate_of {
            Some((reference, rmsd)) => {
                debug!(id, reference, rmsd, "Duplicate in native order.");
                let mut entry = RejectedEntry::new(id, Stage::Initial, 0, RejectReason::Duplicate)
                    .matched(reference, false);
                entry.rmsd = Some(rmsd);
                state.reject(entry);
            }
            None => state.accept(id),
        }
        context.reporter.report(Progress::TaskIncrement { amount: 1 });
    }
    context.reporter.report(Progress::TaskFinish);

    let threshold = threshold.unwrap_or_else(|| state.thresholds.min_rmsd().unwrap_or(0.0));
    state
        .thresholds
        .calibrate(threshold, &context.config.prefilter.tight_multipliers);
    info!(
        accepted = state.accepted.len(),
        rejected = state.counters.rejected,
        samples = state.thresholds.samples.len(),
        threshold,
        "Initial pass finished."
    );
    context.reporter.report(Progress::PhaseFinish);
    Ok(PassStatus::Completed)
}
