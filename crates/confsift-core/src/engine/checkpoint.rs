//! TOML checkpoints of the scan state.

use super::prefilter::ChannelCutoffs;
use super::state::ScanState;
use crate::core::models::permutation::Permutation;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("I/O error on checkpoint '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse checkpoint '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize checkpoint: {0}")]
    Serialize(#[from] toml::ser::Error),
}

pub fn write(path: &Path, state: &ScanState) -> Result<(), CheckpointError> {
    let text = toml::to_string(state)?;
    fs::write(path, text).map_err(|source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read(path: &Path) -> Result<ScanState, CheckpointError> {
    let text = fs::read_to_string(path).map_err(|source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| CheckpointError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Restart information merged from one or more checkpoints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestartData {
    /// Union of all cached rules, first occurrence first.
    pub rules: Vec<Permutation>,
    /// Channel-wise maximum of the loose cutoffs.
    pub loose: Option<ChannelCutoffs>,
    /// Resumable progress; only kept when exactly one checkpoint was valid.
    pub state: Option<ScanState>,
}

impl RestartData {
    pub fn merge(states: Vec<ScanState>) -> Self {
        let mut rules: Vec<Permutation> = Vec::new();
        let mut loose: Option<ChannelCutoffs> = None;
        for state in &states {
            for rule in state.rules.iter() {
                if !rules.contains(rule) {
                    rules.push(rule.clone());
                }
            }
            let cutoffs = state.thresholds.loose;
            loose = Some(loose.map_or(cutoffs, |l| l.max(cutoffs)));
        }
        let state = match <[ScanState; 1]>::try_from(states) {
            Ok([state]) => Some(state),
            Err(_) => None,
        };
        Self {
            rules,
            loose,
            state,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.loose.is_none() && self.state.is_none()
    }
}

/// Reads every checkpoint, skipping unreadable ones with a warning, and merges the rest.
pub fn load_restart(paths: &[PathBuf]) -> RestartData {
    let states: Vec<ScanState> = paths
        .iter()
        .filter_map(|path| match read(path) {
            Ok(state) => {
                info!(path = %path.display(), rules = state.rules.len(), "Read checkpoint.");
                Some(state)
            }
            Err(e) => {
                warn!("Ignoring checkpoint: {}", e);
                None
            }
        })
        .collect();
    if states.len() > 1 {
        info!(
            files = states.len(),
            "Merging rules from several checkpoints; progress will not be resumed."
        );
    }
    RestartData::merge(states)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::ChannelMultipliers;
    use crate::engine::descriptors::DescriptorDelta;
    use crate::engine::state::{RejectReason, RejectedEntry, Stage};
    use tempfile::tempdir;

    fn perm(v: &[usize]) -> Permutation {
        Permutation::new(v.to_vec()).unwrap()
    }

    fn busy_state() -> ScanState {
        let mut state = ScanState::new(vec![3, 0, 2, 1]);
        state.stage = Stage::Reorder;
        state.pass_index = 1;
        state.accept(3);
        state.reject(RejectedEntry {
            id: 0,
            stage: Stage::Reorder,
            pass_index: 1,
            reason: RejectReason::Duplicate,
            reference: Some(3),
            prior: false,
            rmsd: Some(0.12),
            rule: Some(perm(&[1, 0, 2])),
        });
        state.compared.insert((0, 3));
        state.rules.merge([perm(&[1, 0, 2])]);
        state.thresholds.record(
            0.3,
            DescriptorDelta {
                energy: Some(1.0),
                rotational: None,
                barcode: Some(0.5),
            },
        );
        state
            .thresholds
            .calibrate(0.5, &ChannelMultipliers::uniform(0.1));
        state.thresholds.loose.rotational = f64::INFINITY;
        state.last_energy = Some(-76.4);
        state
    }

    #[test]
    fn checkpoint_survives_the_file_system() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scan.restart.toml");
        let state = busy_state();
        write(&path, &state).unwrap();
        assert_eq!(read(&path).unwrap(), state);
    }

    #[test]
    fn single_valid_file_restores_progress() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.toml");
        let bad = dir.path().join("bad.toml");
        write(&good, &busy_state()).unwrap();
        fs::write(&bad, "stage = [not toml").unwrap();

        let restart = load_restart(&[good, bad, dir.path().join("missing.toml")]);
        assert_eq!(restart.state, Some(busy_state()));
        assert_eq!(restart.rules, vec![perm(&[1, 0, 2])]);
    }

    #[test]
    fn several_files_merge_rules_and_cutoffs_only() {
        let mut other = ScanState::default();
        other.rules.merge([perm(&[1, 0, 2]), perm(&[0, 2, 1])]);
        other.thresholds.loose = ChannelCutoffs {
            rotational: 1.0,
            barcode: 7.0,
            energy: 0.5,
        };
        let restart = RestartData::merge(vec![busy_state(), other]);
        assert!(restart.state.is_none());
        assert_eq!(restart.rules, vec![perm(&[1, 0, 2]), perm(&[0, 2, 1])]);
        let loose = restart.loose.unwrap();
        assert_eq!(loose.barcode, 7.0);
        assert_eq!(loose.energy, 1.0);
        assert!(loose.rotational.is_infinite());
    }

    #[test]
    fn no_files_means_no_restart() {
        assert!(load_restart(&[]).is_empty());
    }
}
