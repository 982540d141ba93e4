//! Rigid alignment of labeled point sets with optional atom reordering.
//!
//! [`engine::AlignmentEngine`] composes the pieces in this module: per-element cost matrices
//! ([`cost`]), a linear assignment solver ([`assignment`]), Kabsch rotation fitting
//! ([`rotation`]), seed rotations from a template strategy ([`template`]) and a bounded shelf of
//! the best permutations seen ([`shelf`]).

pub mod assignment;
pub mod cost;
pub mod engine;
pub mod error;
pub mod rotation;
pub mod shelf;
pub mod template;
