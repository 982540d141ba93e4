use crate::core::io::traits::StructureFile;
use crate::core::io::xyz::XyzFile;
use crate::core::models::structure::Structure;
use crate::engine::checkpoint::{self, RestartData};
use crate::engine::config::{ScanConfig, Threshold};
use crate::engine::context::ScanContext;
use crate::engine::descriptors::{
    DescriptorProvider, EnergyEvaluator, InertiaDescriptors, RecordedEnergy,
};
use crate::engine::error::EngineError;
use crate::engine::pool::WorkerPool;
use crate::engine::prefilter::ChannelCutoffs;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::{
    ComparisonRecord, Method, RejectedEntry, ScanState, Stage, Verdict,
};
use crate::engine::stop::StopSignal;
use crate::engine::tasks::{self, PassStatus, reorder_pass::PassKind};
use serde::Serialize;
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Everything a scan reads.
pub struct ScanInput {
    pub structures: Vec<Structure>,
    /// Representatives of an earlier scan; enables the reuse pass.
    pub previously_accepted: Vec<Structure>,
    pub restart: RestartData,
    energy: Box<dyn EnergyEvaluator>,
    descriptors: Box<dyn DescriptorProvider>,
}

impl ScanInput {
    pub fn new(structures: Vec<Structure>) -> Self {
        Self {
            structures,
            previously_accepted: Vec::new(),
            restart: RestartData::default(),
            energy: Box::new(RecordedEnergy),
            descriptors: Box::new(InertiaDescriptors),
        }
    }

    pub fn with_previously_accepted(mut self, structures: Vec<Structure>) -> Self {
        self.previously_accepted = structures;
        self
    }

    pub fn with_restart(mut self, restart: RestartData) -> Self {
        self.restart = restart;
        self
    }

    pub fn with_energy_evaluator(mut self, evaluator: Box<dyn EnergyEvaluator>) -> Self {
        self.energy = evaluator;
        self
    }

    pub fn with_descriptor_provider(mut self, provider: Box<dyn DescriptorProvider>) -> Self {
        self.descriptors = provider;
        self
    }
}

/// File names derived from a common base, e.g. `out` gives `out.accepted.xyz`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    base: PathBuf,
}

impl OutputPaths {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn with_suffix(&self, suffix: &str) -> PathBuf {
        let mut name = OsString::from(self.base.as_os_str());
        name.push(suffix);
        PathBuf::from(name)
    }

    pub fn accepted(&self) -> PathBuf {
        self.with_suffix(".accepted.xyz")
    }

    pub fn rejected(&self) -> PathBuf {
        self.with_suffix(".rejected.xyz")
    }

    pub fn joined(&self) -> PathBuf {
        self.with_suffix(".joined.xyz")
    }

    /// Structures kept by one pass, e.g. `out.reorder.2.xyz`.
    pub fn pass(&self, stage: Stage, pass_index: usize) -> PathBuf {
        self.with_suffix(&format!(".{}.xyz", stage.label(pass_index)))
    }

    pub fn statistics(&self) -> PathBuf {
        self.with_suffix(".statistic.csv")
    }

    pub fn checkpoint(&self) -> PathBuf {
        self.with_suffix(".restart.toml")
    }
}

/// A rejected structure, rewritten with the reordering that matched it.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedStructure {
    pub structure: Structure,
    pub entry: RejectedEntry,
}

#[derive(Debug, Clone)]
pub struct ScanReport {
    /// Representatives in energy order. For an interrupted scan, those accepted so far in the
    /// current pass.
    pub accepted: Vec<Structure>,
    pub rejected: Vec<RejectedStructure>,
    /// Accepted followed by the prior representatives; empty without a prior set.
    pub joined: Vec<Structure>,
    /// Comparison records of this run.
    pub records: Vec<ComparisonRecord>,
    pub state: ScanState,
    pub interrupted: bool,
    pub threshold: Option<f64>,
}

#[derive(Serialize)]
struct StatisticRow<'a> {
    pass: &'a str,
    candidate: usize,
    candidate_name: &'a str,
    reference: usize,
    prior: bool,
    rmsd: Option<f64>,
    delta_energy: Option<f64>,
    delta_rotational: Option<f64>,
    delta_barcode: Option<f64>,
    method: Option<Method>,
    verdict: Verdict,
}

#[instrument(skip_all, name = "scan_workflow")]
pub fn run(
    input: ScanInput,
    config: &ScanConfig,
    outputs: Option<&OutputPaths>,
    reporter: &ProgressReporter,
    stop: &StopSignal,
) -> Result<ScanReport, EngineError> {
    // === Phase 0: Preparation ===
    reporter.report(Progress::PhaseStart {
        name: "Preparation",
    });
    info!(
        structures = input.structures.len(),
        prior = input.previously_accepted.len(),
        "Preparing scan: evaluating energies and descriptors."
    );
    let ScanInput {
        structures,
        previously_accepted,
        restart,
        energy,
        descriptors,
    } = input;
    let population = prepare(structures, energy.as_ref(), descriptors.as_ref());
    let prior = prepare(previously_accepted, energy.as_ref(), descriptors.as_ref());
    let lowest_energy = population
        .iter()
        .filter_map(|s| s.energy)
        .reduce(f64::min);

    let resumed = restart.state.is_some();
    let mut state = initial_state(restart, &population, prior.len())?;
    let pool = WorkerPool::new(config.threads)?;
    reporter.report(Progress::PhaseFinish);

    let context = ScanContext {
        config,
        population: &population,
        prior: &prior,
        lowest_energy,
        reporter,
        stop,
        pool: &pool,
    };

    // === Phase 1: Passes ===
    let mut records = Vec::new();
    let status = run_stages(&context, &mut state, &mut records, outputs)?;
    let interrupted = status == PassStatus::Interrupted;

    // === Phase 2: Results ===
    if let Some(paths) = outputs {
        write_checkpoint(paths, &state)?;
        write_statistics(&paths.statistics(), &records, &population, resumed)?;
    }
    let report = assemble(state, records, &population, &prior, interrupted);
    if !interrupted {
        if let Some(paths) = outputs {
            write_results(paths, &report)?;
        }
    }
    info!(
        accepted = report.accepted.len(),
        rejected = report.rejected.len(),
        rules = report.state.rules.len(),
        interrupted,
        "Scan workflow complete."
    );
    Ok(report)
}

fn prepare(
    structures: Vec<Structure>,
    energy: &dyn EnergyEvaluator,
    descriptors: &dyn DescriptorProvider,
) -> Vec<Structure> {
    let describe = |(id, mut structure): (usize, Structure)| {
        structure.id = id;
        structure.energy = energy.energy(&structure);
        structure.descriptors = descriptors.describe(&structure);
        structure
    };

    #[cfg(feature = "parallel")]
    let prepared = structures.into_par_iter().enumerate().map(describe).collect();

    #[cfg(not(feature = "parallel"))]
    let prepared = structures.into_iter().enumerate().map(describe).collect();

    prepared
}

/// Candidate order of the initial pass: ascending energy, structures without one last.
fn energy_order(population: &[Structure]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..population.len()).collect();
    order.sort_by(|&a, &b| match (population[a].energy, population[b].energy) {
        (Some(ea), Some(eb)) => ea.total_cmp(&eb),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    order
}

fn initial_state(
    restart: RestartData,
    population: &[Structure],
    prior_len: usize,
) -> Result<ScanState, EngineError> {
    let RestartData {
        rules,
        loose,
        state,
    } = restart;
    let mut state = match state {
        Some(state) => {
            state
                .validate(population.len(), prior_len)
                .map_err(EngineError::InvalidRestart)?;
            info!(
                stage = %state.stage.label(state.pass_index),
                cursor = state.cursor,
                "Resuming scan from checkpoint."
            );
            state
        }
        None => ScanState::new(energy_order(population)),
    };
    let added = state.rules.merge(rules);
    if added > 0 {
        info!(added, total = state.rules.len(), "Loaded reordering rules from restart data.");
    }
    if let Some(loose) = loose {
        state.thresholds.loose = state.thresholds.loose.max(loose);
    }
    Ok(state)
}

fn run_stages(
    context: &ScanContext,
    state: &mut ScanState,
    records: &mut Vec<ComparisonRecord>,
    outputs: Option<&OutputPaths>,
) -> Result<PassStatus, EngineError> {
    let config = context.config;
    let passes = config.prefilter.loose_multipliers.len();
    loop {
        let (stage, index) = (state.stage, state.pass_index);
        let (next, next_index) = match stage {
            Stage::Initial => (Stage::Reorder, 0),
            Stage::Reorder if index + 1 < passes => (Stage::Reorder, index + 1),
            Stage::Reorder => (Stage::Reuse, 0),
            Stage::Reuse => (Stage::Finished, 0),
            Stage::Finished => return Ok(PassStatus::Completed),
        };

        let skipped = match stage {
            Stage::Initial => config.skip_initial,
            Stage::Reorder => config.skip_reorder || index >= passes,
            Stage::Reuse => config.skip_reuse || context.prior.is_empty(),
            Stage::Finished => false,
        };
        if skipped {
            info!(stage = %stage.label(index), "Skipping pass.");
            if stage == Stage::Initial {
                seed_thresholds_without_initial_pass(config, state);
            }
            state.skip_to(next, next_index);
            continue;
        }

        let status = match stage {
            Stage::Initial => tasks::initial_pass::run(context, state, records)?,
            Stage::Reorder => {
                tasks::reorder_pass::run(context, state, records, PassKind::Reorder { index })?
            }
            Stage::Reuse => tasks::reorder_pass::run(context, state, records, PassKind::Reuse)?,
            Stage::Finished => PassStatus::Completed,
        };
        if status == PassStatus::Interrupted {
            warn!(
                stage = %stage.label(index),
                cursor = state.cursor,
                "Scan interrupted; the checkpoint can be used to resume."
            );
            return Ok(PassStatus::Interrupted);
        }

        if let Some(paths) = outputs {
            let kept: Vec<Structure> = state
                .accepted
                .iter()
                .map(|&id| context.population[id].clone())
                .collect();
            write_structures(&paths.pass(stage, index), &kept)?;
        }
        state.finish_pass(next, next_index);
        if let Some(paths) = outputs {
            write_checkpoint(paths, state)?;
        }
    }
}

/// A fixed threshold with no samples: every pair passes the loose check unless a restart
/// supplied cutoffs, and nothing is rejected directly.
fn seed_thresholds_without_initial_pass(config: &ScanConfig, state: &mut ScanState) {
    if let (None, Threshold::Fixed(value)) = (state.thresholds.rmsd, config.threshold) {
        state.thresholds.rmsd = Some(value);
    }
    if state.thresholds.loose == ChannelCutoffs::ZERO {
        state.thresholds.loose = ChannelCutoffs::UNBOUNDED;
    }
    state.thresholds.tight = ChannelCutoffs::ZERO;
}

fn assemble(
    state: ScanState,
    records: Vec<ComparisonRecord>,
    population: &[Structure],
    prior: &[Structure],
    interrupted: bool,
) -> ScanReport {
    let accepted_ids = if interrupted {
        &state.accepted
    } else {
        state.result()
    };
    let accepted: Vec<Structure> = accepted_ids
        .iter()
        .map(|&id| population[id].clone())
        .collect();
    let rejected = state
        .rejected
        .iter()
        .map(|entry| {
            let original = &population[entry.id];
            let structure = entry
                .rule
                .as_ref()
                .and_then(|rule| match original.apply_permutation(rule) {
                    Ok(reordered) => Some(reordered),
                    Err(e) => {
                        warn!(id = entry.id, "Could not apply the matching rule: {}", e);
                        None
                    }
                })
                .unwrap_or_else(|| original.clone());
            RejectedStructure {
                structure,
                entry: entry.clone(),
            }
        })
        .collect();
    let joined = if prior.is_empty() || interrupted {
        Vec::new()
    } else {
        accepted.iter().chain(prior).cloned().collect()
    };
    ScanReport {
        accepted,
        rejected,
        joined,
        records,
        threshold: state.thresholds.rmsd,
        state,
        interrupted,
    }
}

fn write_structures(path: &Path, structures: &[Structure]) -> Result<(), EngineError> {
    XyzFile::write_to_path(structures, path).map_err(|source| EngineError::Output {
        path: path.to_path_buf(),
        source,
    })
}

fn write_checkpoint(paths: &OutputPaths, state: &ScanState) -> Result<(), EngineError> {
    checkpoint::write(&paths.checkpoint(), state)?;
    Ok(())
}

fn write_results(paths: &OutputPaths, report: &ScanReport) -> Result<(), EngineError> {
    write_structures(&paths.accepted(), &report.accepted)?;
    let rejected: Vec<Structure> = report
        .rejected
        .iter()
        .map(|r| r.structure.clone())
        .collect();
    write_structures(&paths.rejected(), &rejected)?;
    if !report.joined.is_empty() {
        write_structures(&paths.joined(), &report.joined)?;
    }
    info!(
        accepted = %paths.accepted().display(),
        rejected = %paths.rejected().display(),
        "Wrote scan results."
    );
    Ok(())
}

/// Writes the comparison records; a resumed scan appends to the existing log.
fn write_statistics(
    path: &Path,
    records: &[ComparisonRecord],
    population: &[Structure],
    append: bool,
) -> Result<(), EngineError> {
    let wrap = |source: csv::Error| EngineError::Statistics {
        path: path.to_path_buf(),
        source,
    };
    let append = append && path.exists();
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)
        .map_err(|e| wrap(e.into()))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(!append)
        .from_writer(file);
    for record in records {
        writer
            .serialize(StatisticRow {
                pass: &record.pass,
                candidate: record.candidate,
                candidate_name: &population[record.candidate].name,
                reference: record.reference,
                prior: record.prior,
                rmsd: record.rmsd,
                delta_energy: record.delta.energy,
                delta_rotational: record.delta.rotational,
                delta_barcode: record.delta.barcode,
                method: record.method,
                verdict: record.verdict,
            })
            .map_err(wrap)?;
    }
    writer.flush().map_err(|e| wrap(e.into()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::models::element::Element;
    use crate::core::models::structure::HARTREE_TO_KJ_PER_MOL;
    use crate::engine::config::{ChannelMask, PrefilterConfig, ScanConfigBuilder};
    use crate::engine::state::RejectReason;
    use nalgebra::{Point3, Rotation3, Vector3};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::tempdir;

    const BASE: [[f64; 3]; 5] = [
        [0.0, 0.0, 0.0],
        [1.4, 0.0, 0.0],
        [-0.5, 0.9, 0.0],
        [-0.5, -0.5, 0.8],
        [2.0, 0.8, 0.3],
    ];

    /// A five-atom conformer: the base geometry scaled, optionally with two hydrogens exchanged
    /// and rigidly moved.
    fn conformer(scale: f64, swap: Option<(usize, usize)>, moved: bool) -> Structure {
        let elements = [
            Element::CARBON,
            Element::OXYGEN,
            Element::HYDROGEN,
            Element::HYDROGEN,
            Element::HYDROGEN,
        ];
        let rotation = Rotation3::from_euler_angles(0.3, -1.1, 2.0);
        let shift = Vector3::new(4.0, -2.5, 1.0);
        let mut positions: Vec<Point3<f64>> = BASE
            .iter()
            .map(|p| Point3::new(p[0], p[1], p[2]) * scale)
            .map(|p| if moved { rotation * p + shift } else { p })
            .collect();
        if let Some((i, j)) = swap {
            positions.swap(i, j);
        }
        let atoms = elements
            .iter()
            .zip(positions)
            .map(|(&e, p)| Atom::new(e, p))
            .collect();
        Structure::new(atoms)
    }

    fn with_energies(structures: Vec<Structure>, kj_per_mol: &[f64]) -> Vec<Structure> {
        structures
            .into_iter()
            .zip(kj_per_mol)
            .map(|(s, e)| s.with_energy(-100.0 + e / HARTREE_TO_KJ_PER_MOL))
            .collect()
    }

    fn fixed(threshold: f64) -> ScanConfigBuilder {
        ScanConfigBuilder::new().threshold(Threshold::Fixed(threshold))
    }

    fn scan(structures: Vec<Structure>, config: &ScanConfig) -> ScanReport {
        run(
            ScanInput::new(structures),
            config,
            None,
            &ProgressReporter::new(),
            &StopSignal::new(),
        )
        .unwrap()
    }

    fn ids(structures: &[Structure]) -> Vec<usize> {
        structures.iter().map(|s| s.id).collect()
    }

    fn rejected_ids(report: &ScanReport) -> Vec<usize> {
        let mut ids: Vec<usize> = report.rejected.iter().map(|r| r.entry.id).collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn identical_structures_are_duplicates_with_zero_rmsd() {
        let config = fixed(0.5).build().unwrap();
        let report = scan(vec![conformer(1.0, None, false); 2], &config);

        assert_eq!(ids(&report.accepted), vec![0]);
        let entry = &report.rejected[0].entry;
        assert_eq!(entry.id, 1);
        assert_eq!(entry.stage, Stage::Initial);
        assert_eq!(entry.reason, RejectReason::Duplicate);
        assert_eq!(entry.reference, Some(0));
        assert!(entry.rmsd.unwrap() < 1e-6);
        assert!(!report.interrupted);
        assert_eq!(report.state.stage, Stage::Finished);
    }

    #[test]
    fn swapped_atoms_need_a_reordering() {
        let structures = vec![
            conformer(1.0, None, false),
            conformer(1.0, Some((2, 3)), true),
        ];
        let config = fixed(0.5).build().unwrap();
        let report = scan(structures, &config);

        let initial = report
            .records
            .iter()
            .find(|r| r.pass == "initial")
            .unwrap();
        assert!(initial.rmsd.unwrap() > 0.5);
        assert_eq!(initial.verdict, Verdict::Distinct);

        assert_eq!(ids(&report.accepted), vec![0]);
        let rejected = &report.rejected[0];
        assert_eq!(rejected.entry.stage, Stage::Reorder);
        assert!(rejected.entry.rmsd.unwrap() < 1e-6);
        let rule = rejected.entry.rule.as_ref().unwrap();
        assert_eq!(rule.moved_indices(), vec![2, 3]);
        assert_eq!(report.state.counters.successful, 1);
        assert_eq!(report.state.rules.len(), 1);

        // The rewritten structure lines up atom by atom with its representative.
        let reordered = &rejected.structure;
        assert!(reordered.same_element_order(&report.accepted[0]));
    }

    #[test]
    fn energy_ordered_population_keeps_distinct_conformers() {
        let structures = with_energies(
            vec![
                conformer(1.0, None, false),
                conformer(2.0, None, false),
                conformer(1.0, None, true),
                conformer(3.0, None, false),
                conformer(1.0, Some((2, 4)), true),
            ],
            &[0.0, 1.0, 2.0, 3.0, 4.0],
        );
        let config = fixed(0.5)
            .prefilter(PrefilterConfig {
                loose_mask: ChannelMask::NONE,
                ..Default::default()
            })
            .build()
            .unwrap();
        let report = scan(structures, &config);

        assert_eq!(ids(&report.accepted), vec![0, 1, 3]);
        assert_eq!(rejected_ids(&report), vec![2, 4]);
        for rejected in &report.rejected {
            assert_eq!(rejected.entry.reference, Some(0));
        }
        let late = report.rejected.iter().find(|r| r.entry.id == 4).unwrap();
        assert_eq!(late.entry.stage, Stage::Reorder);
        assert_eq!(late.entry.pass_index, 0);
        assert!(report.state.counters.duplicated > 0);
    }

    #[test]
    fn energy_window_and_rank_limit_reject_without_comparison() {
        let structures = with_energies(
            vec![
                conformer(1.0, None, false),
                conformer(2.0, None, false),
                conformer(3.0, None, false),
                conformer(4.0, None, false),
            ],
            &[0.0, 5.0, 50.0, 6.0],
        );
        let config = fixed(0.5)
            .max_energy(Some(10.0))
            .max_rank(Some(2))
            .build()
            .unwrap();
        let report = scan(structures, &config);

        assert_eq!(ids(&report.accepted), vec![0, 1]);
        let reasons: Vec<(usize, RejectReason)> = report
            .rejected
            .iter()
            .map(|r| (r.entry.id, r.entry.reason))
            .collect();
        assert_eq!(
            reasons,
            vec![(3, RejectReason::RankLimit), (2, RejectReason::EnergyWindow)]
        );
    }

    #[test]
    fn automatic_threshold_is_the_smallest_observed_rmsd() {
        let structures = vec![
            conformer(1.0, None, false),
            conformer(2.0, None, false),
            conformer(3.5, None, false),
        ];
        let config = ScanConfigBuilder::new()
            .threshold(Threshold::Auto)
            .build()
            .unwrap();
        let report = scan(structures, &config);
        let threshold = report.threshold.unwrap();
        let smallest = report
            .records
            .iter()
            .filter(|r| r.pass == "initial")
            .filter_map(|r| r.rmsd)
            .fold(f64::INFINITY, f64::min);
        assert!((threshold - smallest).abs() < 1e-12);
        assert!(
            report
                .records
                .iter()
                .filter(|r| r.pass == "initial")
                .all(|r| r.verdict == Verdict::Distinct)
        );
    }

    #[test]
    fn reuse_pass_matches_prior_representatives_by_cached_rules() {
        let first = scan(
            vec![
                conformer(1.0, None, false),
                conformer(1.0, Some((2, 3)), true),
            ],
            &fixed(0.5).build().unwrap(),
        );
        let restart = RestartData::merge(vec![first.state.clone()]);
        let restart = RestartData {
            state: None,
            ..restart
        };

        let input = ScanInput::new(vec![
            conformer(2.0, None, false),
            conformer(1.0, Some((2, 3)), false),
        ])
        .with_previously_accepted(first.accepted.clone())
        .with_restart(restart);
        let config = fixed(0.5).skip_reorder(true).build().unwrap();
        let report = run(
            input,
            &config,
            None,
            &ProgressReporter::new(),
            &StopSignal::new(),
        )
        .unwrap();

        assert_eq!(ids(&report.accepted), vec![0]);
        let entry = &report.rejected[0].entry;
        assert_eq!((entry.id, entry.stage, entry.prior), (1, Stage::Reuse, true));
        assert_eq!(report.state.counters.reused, 1);
        assert_eq!(report.joined.len(), 2);
    }

    fn interruptible_population() -> Vec<Structure> {
        with_energies(
            vec![
                conformer(1.0, None, false),
                conformer(2.0, None, false),
                conformer(1.0, Some((2, 4)), true),
                conformer(3.0, None, false),
                conformer(2.0, Some((3, 4)), false),
                conformer(4.0, None, true),
                conformer(1.0, Some((3, 4)), false),
            ],
            &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        )
    }

    #[test]
    fn interrupted_scan_resumes_to_the_same_result() {
        let config = fixed(0.5).threads(2).build().unwrap();
        let uninterrupted = scan(interruptible_population(), &config);
        assert_eq!(ids(&uninterrupted.accepted), vec![0, 1, 3, 5]);

        let stop = StopSignal::new();
        let in_reorder = AtomicBool::new(false);
        let processed = AtomicUsize::new(0);
        let reporter = ProgressReporter::with_callback(Box::new(|event| match event {
            Progress::PhaseStart { name } => {
                in_reorder.store(name == "Reorder Pass", Ordering::SeqCst);
            }
            Progress::TaskIncrement { .. } if in_reorder.load(Ordering::SeqCst) => {
                if processed.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                    stop.request();
                }
            }
            _ => {}
        }));
        let dir = tempdir().unwrap();
        let paths = OutputPaths::new(dir.path().join("scan"));
        let partial = run(
            ScanInput::new(interruptible_population()),
            &config,
            Some(&paths),
            &reporter,
            &stop,
        )
        .unwrap();
        assert!(partial.interrupted);
        assert_eq!(partial.state.stage, Stage::Reorder);
        assert_eq!(partial.state.cursor, 3);
        assert!(!paths.accepted().exists());

        let restart = checkpoint::load_restart(&[paths.checkpoint()]);
        assert_eq!(restart.state.as_ref(), Some(&partial.state));
        let resumed = run(
            ScanInput::new(interruptible_population()).with_restart(restart),
            &config,
            Some(&paths),
            &ProgressReporter::new(),
            &StopSignal::new(),
        )
        .unwrap();

        assert_eq!(ids(&resumed.accepted), ids(&uninterrupted.accepted));
        assert_eq!(rejected_ids(&resumed), rejected_ids(&uninterrupted));
        assert!(paths.accepted().exists());
        assert!(paths.pass(Stage::Initial, 0).exists());
        assert!(paths.pass(Stage::Reorder, 1).exists());
    }

    #[test]
    fn results_are_independent_of_the_thread_count() {
        let sequential = scan(interruptible_population(), &fixed(0.5).build().unwrap());
        let parallel = scan(
            interruptible_population(),
            &fixed(0.5).threads(4).build().unwrap(),
        );
        assert_eq!(ids(&sequential.accepted), ids(&parallel.accepted));
        let entries = |r: &ScanReport| -> Vec<RejectedEntry> {
            r.rejected.iter().map(|x| x.entry.clone()).collect()
        };
        assert_eq!(entries(&sequential), entries(&parallel));
    }

    #[test]
    fn outputs_are_written_next_to_the_base_name() {
        let dir = tempdir().unwrap();
        let paths = OutputPaths::new(dir.path().join("run"));
        let structures = with_energies(
            vec![conformer(1.0, None, false), conformer(1.0, None, true)],
            &[0.0, 0.5],
        );
        run(
            ScanInput::new(structures),
            &fixed(0.5).build().unwrap(),
            Some(&paths),
            &ProgressReporter::new(),
            &StopSignal::new(),
        )
        .unwrap();

        let accepted = XyzFile::read_from_path(paths.accepted()).unwrap();
        assert_eq!(accepted.len(), 1);
        assert_eq!(XyzFile::read_from_path(paths.rejected()).unwrap().len(), 1);
        let statistics = std::fs::read_to_string(paths.statistics()).unwrap();
        assert!(statistics.starts_with("pass,candidate,candidate_name,reference"));
        assert!(statistics.contains("initial,1,"));
        assert!(checkpoint::read(&paths.checkpoint()).unwrap().stage == Stage::Finished);
        assert!(!paths.joined().exists());
    }

    #[test]
    fn restart_for_another_population_is_rejected() {
        let mut state = ScanState::new(vec![0, 1, 9]);
        state.stage = Stage::Reorder;
        let input = ScanInput::new(vec![conformer(1.0, None, false)])
            .with_restart(RestartData::merge(vec![state]));
        let result = run(
            input,
            &fixed(0.5).build().unwrap(),
            None,
            &ProgressReporter::new(),
            &StopSignal::new(),
        );
        assert!(matches!(result, Err(EngineError::InvalidRestart(_))));
    }

    #[test]
    fn output_names_follow_the_base() {
        let paths = OutputPaths::new("out/mol");
        assert_eq!(paths.accepted(), PathBuf::from("out/mol.accepted.xyz"));
        assert_eq!(paths.pass(Stage::Reorder, 1), PathBuf::from("out/mol.reorder.2.xyz"));
        assert_eq!(paths.pass(Stage::Reuse, 0), PathBuf::from("out/mol.reuse.xyz"));
        assert_eq!(paths.checkpoint(), PathBuf::from("out/mol.restart.toml"));
        assert_eq!(paths.statistics(), PathBuf::from("out/mol.statistic.csv"));
    }
}
