//! Passes of a conformer scan.
//!
//! Each pass walks the current pass input in energy order, compares every candidate against the
//! representatives accepted so far and either registers it as a new representative or rejects it.
//! Passes only mutate the [`ScanState`](crate::engine::state::ScanState) they are handed, so they
//! can be interrupted between candidates and resumed from a checkpoint.

pub(crate) mod compare;
pub(crate) mod initial_pass;
pub(crate) mod reorder_pass;

/// How a pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStatus {
    Completed,
    /// A stop was requested; the state holds the position to resume from.
    Interrupted,
}
