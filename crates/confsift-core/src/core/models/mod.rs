//! # Core Models Module
//!
//! Data structures describing conformers: labeled atoms, whole structures with their energies
//! and descriptors, atom reordering rules, and the bonding information derived from geometry.
//!
//! ## Key Components
//!
//! - [`element`] - Chemical elements with mass and covalent radius tables
//! - [`atom`] - A single labeled point
//! - [`structure`] - An ordered list of atoms plus energy and descriptors
//! - [`permutation`] - Validated atom reordering rules
//! - [`topology`] - Covalent bonds, fragments and hydrogen-bond topology

pub mod atom;
pub mod element;
pub mod permutation;
pub mod structure;
pub mod topology;
