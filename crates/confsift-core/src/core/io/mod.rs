//! Provides input/output for multi-structure files.
//!
//! The [`traits::StructureFile`] trait is the common reading/writing interface; [`xyz`]
//! implements it for concatenated XYZ records whose comment line carries the energy.

pub mod traits;
pub mod xyz;
