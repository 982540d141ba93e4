use super::config::ScanConfig;
use super::pool::WorkerPool;
use super::progress::ProgressReporter;
use super::state::{RejectReason, ScanState};
use super::stop::StopSignal;
use crate::core::models::structure::{HARTREE_TO_KJ_PER_MOL, Structure};

/// Read-only view shared by the scan passes.
#[derive(Clone, Copy)]
pub struct ScanContext<'a> {
    pub config: &'a ScanConfig,
    /// The input structures, indexed by id.
    pub population: &'a [Structure],
    /// Representatives of an earlier scan, used by the reuse pass.
    pub prior: &'a [Structure],
    /// Lowest energy of the population, in Hartree.
    pub lowest_energy: Option<f64>,
    pub reporter: &'a ProgressReporter<'a>,
    pub stop: &'a StopSignal,
    pub pool: &'a WorkerPool,
}

impl<'a> ScanContext<'a> {
    /// Energy of a structure relative to the lowest one, in kJ/mol.
    pub fn relative_energy(&self, id: usize) -> Option<f64> {
        let energy = self.population.get(id)?.energy?;
        Some((energy - self.lowest_energy?) * HARTREE_TO_KJ_PER_MOL)
    }

    /// Reason to reject a candidate before any comparison, if the energy window or rank limit
    /// rules it out.
    pub fn admission(&self, state: &ScanState, id: usize) -> Option<RejectReason> {
        if let (Some(window), Some(relative)) = (self.config.max_energy, self.relative_energy(id)) {
            if relative > window {
                return Some(RejectReason::EnergyWindow);
            }
        }
        if self
            .config
            .max_rank
            .is_some_and(|rank| state.accepted.len() >= rank)
        {
            return Some(RejectReason::RankLimit);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::{ScanConfigBuilder, Threshold};

    fn population() -> Vec<Structure> {
        [-1.0, -0.999, -0.99]
            .iter()
            .map(|&e| Structure::default().with_energy(e))
            .collect()
    }

    #[test]
    fn admission_applies_window_and_rank() {
        let config = ScanConfigBuilder::new()
            .threshold(Threshold::Fixed(0.5))
            .max_energy(Some(10.0))
            .max_rank(Some(1))
            .build()
            .unwrap();
        let population = population();
        let reporter = ProgressReporter::new();
        let stop = StopSignal::new();
        let pool = WorkerPool::new(1).unwrap();
        let ctx = ScanContext {
            config: &config,
            population: &population,
            prior: &[],
            lowest_energy: Some(-1.0),
            reporter: &reporter,
            stop: &stop,
            pool: &pool,
        };

        let mut state = ScanState::new(vec![0, 1, 2]);
        assert!((ctx.relative_energy(1).unwrap() - 2.6255).abs() < 1e-9);
        assert_eq!(ctx.admission(&state, 0), None);
        assert_eq!(ctx.admission(&state, 2), Some(RejectReason::EnergyWindow));
        state.accept(0);
        assert_eq!(ctx.admission(&state, 1), Some(RejectReason::RankLimit));
    }
}
