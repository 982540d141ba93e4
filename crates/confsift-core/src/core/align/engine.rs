use super::assignment::{AssignmentSolver, HungarianSolver};
use super::cost::{CostMatrixBuilder, CostMetric, ElementBlocks};
use super::error::AlignError;
use super::rotation::fit_rotation_or_identity;
use super::shelf::PermutationShelf;
use super::template::{
    SeedContext, SeedPlan, TemplateSeeder, TemplateStrategy, free_seeds, free_seeds_for,
};
use crate::core::models::element::Element;
use crate::core::models::permutation::Permutation;
use crate::core::models::structure::Structure;
use crate::core::utils::geometry;
use itertools::Itertools;
use nalgebra::{Matrix3, Point3};
use tracing::{debug, trace, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

pub const DEFAULT_MAX_CYCLES: usize = 5;
pub const DEFAULT_SHELF_CAPACITY: usize = 10;

const IMPROVEMENT_TOLERANCE: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CenterMode {
    #[default]
    Centroid,
    CenterOfMass,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlignOptions {
    /// Search for an atom permutation instead of trusting the native order.
    pub reorder: bool,
    pub strategy: TemplateStrategy,
    pub cost_metric: CostMetric,
    pub center: CenterMode,
    /// Cap on refit/reassign cycles per seed.
    pub max_cycles: usize,
    /// Number of distinct permutations kept on the shelf.
    pub shelf_capacity: usize,
    /// Reject orderings whose hydrogen-bond topology differs by more than this.
    pub max_hbond_difference: Option<usize>,
    /// Reference atoms used for fitting, assignment and RMSD. Mirrors
    /// [`Self::target_fragment`] when unset, and selects every atom when both are unset.
    pub reference_fragment: Option<Vec<usize>>,
    /// Target atoms paired, in order, with the reference selection.
    pub target_fragment: Option<Vec<usize>>,
    /// Thread budget; seeds are evaluated concurrently when greater than one.
    pub threads: usize,
}

impl Default for AlignOptions {
    fn default() -> Self {
        Self {
            reorder: true,
            strategy: TemplateStrategy::default(),
            cost_metric: CostMetric::default(),
            center: CenterMode::default(),
            max_cycles: DEFAULT_MAX_CYCLES,
            shelf_capacity: DEFAULT_SHELF_CAPACITY,
            max_hbond_difference: None,
            reference_fragment: None,
            target_fragment: None,
            threads: 1,
        }
    }
}

impl AlignOptions {
    /// Uses the same atom selection on both structures.
    pub fn with_fragment(mut self, fragment: Vec<usize>) -> Self {
        self.reference_fragment = Some(fragment.clone());
        self.target_fragment = Some(fragment);
        self
    }
}

/// Outcome of aligning a target onto a reference.
#[derive(Debug, Clone)]
pub struct AlignmentResult {
    /// Proper rotation applied to the centered target.
    pub rotation: Matrix3<f64>,
    /// RMSD of the input coordinates in the final ordering, without any fit.
    pub raw_rmsd: f64,
    /// Best-fit RMSD over the working atoms.
    pub rmsd: f64,
    /// The reference translated to its center.
    pub reference: Structure,
    /// The (reordered) target superimposed onto [`Self::reference`].
    pub target: Structure,
    /// Reordering rule that was applied to the target, if reordering was requested.
    pub permutation: Option<Permutation>,
    pub shelf: PermutationShelf,
    /// Best RMSD found so far after each refit/reassign cycle.
    pub cycle_history: Vec<f64>,
    pub hbond_difference: Option<usize>,
}

struct Frame {
    reference: Vec<Point3<f64>>,
    target: Vec<Point3<f64>>,
    reference_elements: Vec<Element>,
    target_elements: Vec<Element>,
    reference_working: Vec<usize>,
    target_working: Vec<usize>,
}

impl Frame {
    fn new(
        reference: &Structure,
        target: &Structure,
        reference_working: Vec<usize>,
        target_working: Vec<usize>,
        mode: CenterMode,
    ) -> Self {
        let centered = |s: &Structure, working: &[usize]| {
            let positions = s.positions();
            let selected: Vec<Point3<f64>> = working.iter().map(|&i| positions[i]).collect();
            let center = match mode {
                CenterMode::Centroid => geometry::centroid(&selected),
                CenterMode::CenterOfMass => {
                    let masses = s.masses();
                    let selected_masses: Vec<f64> = working.iter().map(|&i| masses[i]).collect();
                    geometry::center_of_mass(&selected, &selected_masses)
                }
            };
            geometry::translate(&positions, &-center.coords)
        };
        Self {
            reference: centered(reference, &reference_working),
            target: centered(target, &target_working),
            reference_elements: reference.elements(),
            target_elements: target.elements(),
            reference_working,
            target_working,
        }
    }

    fn native_pairs(&self) -> Vec<(usize, usize)> {
        self.reference_working
            .iter()
            .copied()
            .zip(self.target_working.iter().copied())
            .collect()
    }

    /// Same-element groups of the atoms outside both working sets.
    fn rest_blocks(&self) -> Result<ElementBlocks, AlignError> {
        let outside = |len: usize, working: &[usize]| {
            let mut selected = vec![false; len];
            for &i in working {
                selected[i] = true;
            }
            (0..len).filter(|&i| !selected[i]).collect::<Vec<_>>()
        };
        ElementBlocks::new(
            &self.reference_elements,
            &self.target_elements,
            &outside(self.reference.len(), &self.reference_working),
            &outside(self.target.len(), &self.target_working),
        )
    }

    fn seed_context<'a>(&'a self) -> SeedContext<'a> {
        SeedContext {
            reference: &self.reference,
            target: &self.target,
            reference_elements: &self.reference_elements,
            target_elements: &self.target_elements,
            reference_indices: &self.reference_working,
            target_indices: &self.target_working,
        }
    }

    fn gather(&self, pairs: &[(usize, usize)]) -> (Vec<Point3<f64>>, Vec<Point3<f64>>) {
        pairs
            .iter()
            .map(|&(r, t)| (self.reference[r], self.target[t]))
            .unzip()
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    rmsd: f64,
    rotation: Matrix3<f64>,
    pairs: Vec<(usize, usize)>,
}

#[derive(Debug, Default)]
struct SeedOutcome {
    visited: Vec<Candidate>,
    history: Vec<f64>,
}

fn paired_rmsd(reference: &[Point3<f64>], target: &[Point3<f64>], rotation: &Matrix3<f64>) -> f64 {
    let rotated = geometry::rotate(target, rotation);
    geometry::calculate_rmsd(reference, &rotated).unwrap_or(f64::INFINITY)
}

/// Rigid alignment with optional atom reordering.
///
/// Strategy, cost metric and solver are resolved once at construction, so a single engine can be
/// shared by many comparisons.
pub struct AlignmentEngine {
    options: AlignOptions,
    builder: CostMatrixBuilder,
    seeder: Box<dyn TemplateSeeder>,
    solver: Box<dyn AssignmentSolver>,
}

impl AlignmentEngine {
    pub fn new(options: AlignOptions) -> Self {
        Self::with_solver(options, Box::new(HungarianSolver))
    }

    pub fn with_solver(options: AlignOptions, solver: Box<dyn AssignmentSolver>) -> Self {
        Self {
            builder: CostMatrixBuilder::new(options.cost_metric),
            seeder: options.strategy.seeder(),
            solver,
            options,
        }
    }

    pub fn options(&self) -> &AlignOptions {
        &self.options
    }

    /// Aligns `target` onto `reference`, reordering target atoms if the options ask for it.
    ///
    /// # Errors
    ///
    /// * [`AlignError::SizeMismatch`] if the atom counts differ.
    /// * [`AlignError::NoValidPermutation`] if reordering is requested but the element
    ///   compositions differ.
    /// * [`AlignError::TopologyMismatch`] if every ordering found violates the hydrogen-bond
    ///   topology limit.
    /// * [`AlignError::InvalidFragment`] or [`AlignError::FragmentSizeMismatch`] for an unusable
    ///   atom selection.
    ///
    /// Atoms outside the selections are paired per element under the final rotation, so the
    /// returned rule always maps atoms onto atoms of the same element.
    pub fn align(&self, reference: &Structure, target: &Structure) -> Result<AlignmentResult, AlignError> {
        if !self.options.reorder {
            return self.superpose(reference, target);
        }
        let frame = self.frame(reference, target)?;
        let blocks = ElementBlocks::new(
            &frame.reference_elements,
            &frame.target_elements,
            &frame.reference_working,
            &frame.target_working,
        )?;
        let rest = frame.rest_blocks()?;

        let seeds = self.seeds(&frame);
        debug!(
            strategy = self.seeder.name(),
            seeds = seeds.len(),
            atoms = frame.reference_working.len(),
            "Starting reordering search."
        );
        let outcomes = self.run_seeds(&frame, &blocks, &seeds);

        let reference_topology = self
            .options
            .max_hbond_difference
            .map(|_| reference.hbond_topology());

        let mut shelf = PermutationShelf::new(self.options.shelf_capacity);
        let mut best: Option<(f64, Matrix3<f64>, Permutation, Option<usize>)> = None;
        let mut history = Vec::new();
        let mut running = f64::INFINITY;

        for outcome in outcomes {
            for &rmsd in &outcome.history {
                running = running.min(rmsd);
                history.push(running);
            }
            for candidate in outcome.visited {
                let permutation = self.to_permutation(&frame, &rest, &candidate)?;
                let difference = match (&reference_topology, self.options.max_hbond_difference) {
                    (Some(topology), Some(max)) => {
                        let reordered = target.apply_permutation(&permutation).map_err(|_| {
                            AlignError::SizeMismatch {
                                reference: reference.len(),
                                target: target.len(),
                            }
                        })?;
                        let difference = topology.difference(&reordered.hbond_topology());
                        if difference > max {
                            trace!(difference, max, "Candidate ordering rejected by topology.");
                            continue;
                        }
                        Some(difference)
                    }
                    _ => None,
                };
                shelf.insert(candidate.rmsd, permutation.clone());
                if best.as_ref().is_none_or(|b| candidate.rmsd < b.0) {
                    best = Some((candidate.rmsd, candidate.rotation, permutation, difference));
                }
            }
        }

        let Some((rmsd, rotation, permutation, difference)) = best else {
            return Err(AlignError::TopologyMismatch {
                max: self.options.max_hbond_difference.unwrap_or(0),
            });
        };
        let reordered = target
            .apply_permutation(&permutation)
            .map_err(|_| AlignError::NoValidPermutation)?;
        // The reordered target carries its selected atoms at the reference positions.
        let pairs: Vec<(usize, usize)> = frame.reference_working.iter().map(|&i| (i, i)).collect();
        Ok(self.assemble(
            reference,
            &reordered,
            &pairs,
            rotation,
            rmsd,
            Some(permutation),
            shelf,
            history,
            difference,
        ))
    }

    /// Best-fit superposition in the native atom order.
    ///
    /// # Errors
    ///
    /// Returns [`AlignError::SizeMismatch`], [`AlignError::InvalidFragment`] or
    /// [`AlignError::FragmentSizeMismatch`].
    pub fn superpose(&self, reference: &Structure, target: &Structure) -> Result<AlignmentResult, AlignError> {
        let frame = self.frame(reference, target)?;
        let pairs = frame.native_pairs();
        let (r, t) = frame.gather(&pairs);
        let rotation = fit_rotation_or_identity(&r, &t);
        let rmsd = paired_rmsd(&r, &t, &rotation);
        let difference = self
            .options
            .max_hbond_difference
            .map(|_| reference.hbond_topology().difference(&target.hbond_topology()));
        Ok(self.assemble(
            reference,
            target,
            &pairs,
            rotation,
            rmsd,
            None,
            PermutationShelf::new(self.options.shelf_capacity),
            vec![rmsd],
            difference,
        ))
    }

    /// Evaluates a known reordering rule without searching.
    ///
    /// # Errors
    ///
    /// Returns [`AlignError::SizeMismatch`] if the rule or the structures differ in length and
    /// [`AlignError::NoValidPermutation`] if the rule pairs atoms of different elements.
    pub fn rmsd_for_permutation(
        &self,
        reference: &Structure,
        target: &Structure,
        permutation: &Permutation,
    ) -> Result<AlignmentResult, AlignError> {
        if reference.len() != target.len() || permutation.len() != target.len() {
            return Err(AlignError::SizeMismatch {
                reference: reference.len(),
                target: permutation.len().min(target.len()),
            });
        }
        if !permutation.preserves_elements(&reference.elements(), &target.elements()) {
            return Err(AlignError::NoValidPermutation);
        }
        let reordered = target
            .apply_permutation(permutation)
            .map_err(|_| AlignError::NoValidPermutation)?;
        let mut result = self.superpose(reference, &reordered)?;
        result.permutation = Some(permutation.clone());
        result.shelf.insert(result.rmsd, permutation.clone());
        Ok(result)
    }

    fn frame(&self, reference: &Structure, target: &Structure) -> Result<Frame, AlignError> {
        if reference.len() != target.len() {
            return Err(AlignError::SizeMismatch {
                reference: reference.len(),
                target: target.len(),
            });
        }
        let len = reference.len();
        let reference_selection = self
            .options
            .reference_fragment
            .as_ref()
            .or(self.options.target_fragment.as_ref());
        let target_selection = self
            .options
            .target_fragment
            .as_ref()
            .or(self.options.reference_fragment.as_ref());
        let reference_working = Self::selection(reference_selection, len)?;
        let target_working = Self::selection(target_selection, len)?;
        if reference_working.len() != target_working.len() {
            return Err(AlignError::FragmentSizeMismatch {
                reference: reference_working.len(),
                target: target_working.len(),
            });
        }
        Ok(Frame::new(
            reference,
            target,
            reference_working,
            target_working,
            self.options.center,
        ))
    }

    /// Validated working set in selection order, duplicates dropped.
    fn selection(fragment: Option<&Vec<usize>>, len: usize) -> Result<Vec<usize>, AlignError> {
        let Some(fragment) = fragment else {
            return Ok((0..len).collect());
        };
        if let Some(&index) = fragment.iter().find(|&&i| i >= len) {
            return Err(AlignError::InvalidFragment { index, len });
        }
        Ok(fragment.iter().copied().unique().collect())
    }

    fn seeds(&self, frame: &Frame) -> Vec<Matrix3<f64>> {
        let ctx = frame.seed_context();
        match self.seeder.plan(&ctx) {
            SeedPlan::Rotations(rotations) => rotations,
            SeedPlan::Subset { reference, target } => {
                let Ok(blocks) = ElementBlocks::new(
                    &frame.reference_elements,
                    &frame.target_elements,
                    &reference,
                    &target,
                ) else {
                    warn!("Template selections differ in composition, using free search.");
                    return free_seeds(&ctx);
                };
                let template_seeds = free_seeds_for(&ctx, &reference, &target);
                self.run_seeds(frame, &blocks, &template_seeds)
                    .into_iter()
                    .flat_map(|o| o.visited)
                    .reduce(|best, c| if c.rmsd < best.rmsd { c } else { best })
                    .map(|c| vec![c.rotation])
                    .unwrap_or_else(|| free_seeds(&ctx))
            }
        }
    }

    fn run_seeds(&self, frame: &Frame, blocks: &ElementBlocks, seeds: &[Matrix3<f64>]) -> Vec<SeedOutcome> {
        #[cfg(feature = "parallel")]
        if self.options.threads > 1 {
            return seeds
                .par_iter()
                .map(|seed| self.refine(frame, blocks, *seed))
                .collect();
        }
        seeds
            .iter()
            .map(|seed| self.refine(frame, blocks, *seed))
            .collect()
    }

    fn refine(&self, frame: &Frame, blocks: &ElementBlocks, seed: Matrix3<f64>) -> SeedOutcome {
        let mut outcome = SeedOutcome::default();
        let mut rotation = seed;
        let mut best = f64::INFINITY;

        for cycle in 0..self.options.max_cycles.max(1) {
            let pairs = self.assign(frame, blocks, &rotation);
            let (r, t) = frame.gather(&pairs);
            let fitted = fit_rotation_or_identity(&r, &t);
            let rmsd = paired_rmsd(&r, &t, &fitted);
            trace!(cycle, rmsd, "Refit/reassign cycle.");

            let improved = rmsd < best - IMPROVEMENT_TOLERANCE;
            outcome.visited.push(Candidate {
                rmsd,
                rotation: fitted,
                pairs,
            });
            if !improved {
                outcome.history.push(best);
                break;
            }
            best = rmsd;
            outcome.history.push(best);
            rotation = fitted;
        }
        outcome
    }

    fn assign(&self, frame: &Frame, blocks: &ElementBlocks, rotation: &Matrix3<f64>) -> Vec<(usize, usize)> {
        let rotated = geometry::rotate(&frame.target, rotation);
        let mut pairs = Vec::with_capacity(blocks.iter().map(|b| b.reference.len()).sum());
        for block in blocks.iter() {
            let cost = self.builder.build(&frame.reference, &rotated, block);
            match self.solver.solve(&cost) {
                Ok(assignment) => pairs.extend(
                    assignment
                        .columns
                        .iter()
                        .enumerate()
                        .map(|(row, &col)| (block.reference[row], block.target[col])),
                ),
                Err(e) => {
                    warn!(element = %block.element, error = %e, "Assignment failed, keeping block order.");
                    pairs.extend(block.reference.iter().copied().zip(block.target.iter().copied()));
                }
            }
        }
        pairs
    }

    fn to_permutation(
        &self,
        frame: &Frame,
        rest: &ElementBlocks,
        candidate: &Candidate,
    ) -> Result<Permutation, AlignError> {
        let mut indices = vec![usize::MAX; frame.reference.len()];
        let outside = self.assign(frame, rest, &candidate.rotation);
        for &(r, t) in candidate.pairs.iter().chain(&outside) {
            indices[r] = t;
        }
        let permutation = Permutation::new(indices).map_err(|_| AlignError::NoValidPermutation)?;
        if !permutation.preserves_elements(&frame.reference_elements, &frame.target_elements) {
            return Err(AlignError::NoValidPermutation);
        }
        Ok(permutation)
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        &self,
        reference: &Structure,
        target: &Structure,
        pairs: &[(usize, usize)],
        rotation: Matrix3<f64>,
        rmsd: f64,
        permutation: Option<Permutation>,
        shelf: PermutationShelf,
        cycle_history: Vec<f64>,
        hbond_difference: Option<usize>,
    ) -> AlignmentResult {
        let (reference_working, target_working): (Vec<usize>, Vec<usize>) = pairs.iter().copied().unzip();
        let frame = Frame::new(
            reference,
            target,
            reference_working,
            target_working,
            self.options.center,
        );
        let raw_rmsd = geometry::calculate_paired_rmsd(&reference.positions(), &target.positions(), pairs)
            .unwrap_or(f64::INFINITY);
        let aligned = geometry::rotate(&frame.target, &rotation);
        AlignmentResult {
            rotation,
            raw_rmsd,
            rmsd,
            reference: reference
                .with_positions(&frame.reference)
                .unwrap_or_else(|| reference.clone()),
            target: target.with_positions(&aligned).unwrap_or_else(|| target.clone()),
            permutation,
            shelf,
            cycle_history,
            hbond_difference,
        }
    }
}
