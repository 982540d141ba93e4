//! # Workflows Module
//!
//! High-level entry points of confsift. A workflow takes loaded structures and a configuration,
//! drives the engine with progress reporting, and returns a report the caller can inspect or
//! write out.
//!
//! - **Scan Workflow** ([`scan`]) - Reduces an energy-ordered population to unique
//!   representatives, with checkpointing and per-pass outputs.
//! - **Align Workflow** ([`align`]) - Aligns a single pair of structures, with or without atom
//!   reordering.

pub mod align;
pub mod scan;
