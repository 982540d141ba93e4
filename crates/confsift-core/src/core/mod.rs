//! # Core Module
//!
//! Stateless building blocks of confsift: the structure data model, multi-structure file I/O,
//! the alignment and reordering engine, and shared numeric helpers.
//!
//! ## Architecture
//!
//! - **Structure Representation** ([`models`]) - Elements, atoms, structures, permutations and
//!   bonding topology
//! - **File I/O** ([`io`]) - Reading and writing concatenated XYZ records
//! - **Alignment** ([`align`]) - Kabsch fitting, assignment-based atom reordering and template
//!   seeding strategies
//! - **Utilities** ([`utils`]) - Geometry routines and static element tables
//!
//! Nothing in this module keeps state between calls; the population scan built on top of it
//! lives in [`crate::engine`].

pub mod align;
pub mod io;
pub mod models;
pub mod utils;
