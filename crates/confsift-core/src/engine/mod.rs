//! # Engine Module
//!
//! This module implements the conformer scan: the machinery that turns a population of
//! structures into a set of unique representatives.
//!
//! ## Overview
//!
//! A scan runs as a sequence of passes over the population in energy order. An initial pass
//! compares atoms in their native order and harvests RMSD and descriptor statistics; the reorder
//! passes allow atom reordering and use cheap descriptors to decide which pairs deserve a full
//! comparison; an optional reuse pass applies learned reordering rules against the
//! representatives of an earlier scan.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Thresholds, prefilter settings and pass selection
//! - **Descriptors** ([`descriptors`]) - Energy and descriptor providers and pairwise deltas
//! - **Prefilter** ([`prefilter`]) - Loose and tight descriptor cutoffs
//! - **Rule Cache** ([`cache`]) - Reordering rules learned during the scan
//! - **State Tracking** ([`state`]) - Resumable scan state and comparison records
//! - **Checkpoints** ([`checkpoint`]) - TOML persistence and restart merging
//! - **Worker Pool** ([`pool`]) - Deterministic parallel comparison rounds
//! - **Progress Monitoring** ([`progress`]) and cooperative stopping ([`stop`])
//! - **Error Handling** ([`error`]) - Engine-specific error types

pub mod cache;
pub mod checkpoint;
pub mod config;
pub(crate) mod context;
pub mod descriptors;
pub mod error;
pub mod pool;
pub mod prefilter;
pub mod progress;
pub mod state;
pub mod stop;
pub(crate) mod tasks;
