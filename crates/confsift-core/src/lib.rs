//! # confsift Core Library
//!
//! Geometric deduplication of conformer populations. Two structures are duplicates when they
//! superimpose within an RMSD threshold after rigid motion and, if needed, a relabeling of
//! same-element atoms.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Structure`, `Permutation`), XYZ I/O
//!   and the `AlignmentEngine` that fits rotations and recovers atom orderings.
//!
//! - **[`engine`]: The Logic Core.** The stateful scan machinery: configuration, descriptor
//!   prefilters, the reorder-rule cache, the per-representative worker pool, the individual
//!   passes and checkpointing.
//!
//! - **[`workflows`]: The Public API.** Entry points that tie `engine` and `core` together into
//!   complete procedures, such as scanning a population or aligning a pair of structures.

pub mod core;
pub mod engine;
pub mod workflows;
