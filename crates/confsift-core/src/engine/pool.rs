use super::error::EngineError;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Results of one round, sorted by slot.
#[derive(Debug)]
pub struct Round<T> {
    pub outcomes: Vec<(usize, T)>,
    /// Lowest slot that asked to stop the round.
    pub halted_at: Option<usize>,
}

/// Bounded pool running one comparison per representative slot.
///
/// A job that returns `true` alongside its outcome halts the round: jobs with a larger slot that
/// have not started are skipped, and outcomes with a larger slot are discarded. The surviving
/// outcomes are therefore the same whatever order the jobs complete in.
pub struct WorkerPool {
    threads: usize,
    #[cfg(feature = "parallel")]
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Result<Self, EngineError> {
        let threads = threads.max(1);
        #[cfg(feature = "parallel")]
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("confsift-worker-{i}"))
            .build()
            .map_err(|e| EngineError::ThreadPool {
                threads,
                reason: e.to_string(),
            })?;
        debug!(threads, "Worker pool ready.");
        Ok(Self {
            threads,
            #[cfg(feature = "parallel")]
            pool,
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Thread budget of each job when `active` jobs share the pool.
    pub fn inner_budget(&self, active: usize) -> usize {
        (self.threads / active.max(1)).max(1)
    }

    pub fn run_round<T, F>(&self, slots: &[usize], job: F) -> Round<T>
    where
        T: Send,
        F: Fn(usize) -> (T, bool) + Sync,
    {
        let halt = AtomicUsize::new(usize::MAX);
        let run = |slot: usize| -> Option<(usize, T)> {
            if slot > halt.load(Ordering::Acquire) {
                return None;
            }
            let (outcome, halts) = job(slot);
            if halts {
                halt.fetch_min(slot, Ordering::AcqRel);
            }
            Some((slot, outcome))
        };

        #[cfg(feature = "parallel")]
        let mut outcomes: Vec<(usize, T)> = if self.threads > 1 && slots.len() > 1 {
            self.pool
                .install(|| slots.par_iter().filter_map(|&slot| run(slot)).collect())
        } else {
            slots.iter().filter_map(|&slot| run(slot)).collect()
        };

        #[cfg(not(feature = "parallel"))]
        let mut outcomes: Vec<(usize, T)> = slots.iter().filter_map(|&slot| run(slot)).collect();

        let first_halt = halt.into_inner();
        outcomes.retain(|(slot, _)| *slot <= first_halt);
        outcomes.sort_by_key(|(slot, _)| *slot);
        Round {
            outcomes,
            halted_at: (first_halt != usize::MAX).then_some(first_halt),
        }
    }
}
