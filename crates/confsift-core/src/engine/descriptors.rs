//! External descriptor collaborators and the pairwise deltas the prefilters work on.

use super::config::Channel;
use crate::core::models::structure::{Descriptors, HARTREE_TO_KJ_PER_MOL, Structure};
use serde::{Deserialize, Serialize};

/// Supplies the energy of a structure, in Hartree.
pub trait EnergyEvaluator: Send + Sync {
    fn energy(&self, structure: &Structure) -> Option<f64>;
}

/// Uses the energy recorded in the input file.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordedEnergy;

impl EnergyEvaluator for RecordedEnergy {
    fn energy(&self, structure: &Structure) -> Option<f64> {
        structure.energy
    }
}

/// Supplies rotational constants and an optional topological barcode.
pub trait DescriptorProvider: Send + Sync {
    fn describe(&self, structure: &Structure) -> Descriptors;
}

/// Rotational constants from the inertia tensor; a supplied barcode is passed through.
#[derive(Debug, Clone, Copy, Default)]
pub struct InertiaDescriptors;

impl DescriptorProvider for InertiaDescriptors {
    fn describe(&self, structure: &Structure) -> Descriptors {
        Descriptors {
            rotational_constants: structure
                .descriptors
                .rotational_constants
                .or_else(|| structure.rotational_constants()),
            barcode: structure.descriptors.barcode.clone(),
        }
    }
}

/// Per-channel differences between two structures. A channel is `None` when either side lacks
/// the descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DescriptorDelta {
    /// kJ/mol
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
    /// MHz, averaged over the three constants.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotational: Option<f64>,
    /// L1 norm of the barcode difference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode: Option<f64>,
}

impl DescriptorDelta {
    pub fn between(a: &Structure, b: &Structure) -> Self {
        let energy = a
            .energy
            .zip(b.energy)
            .map(|(ea, eb)| (ea - eb).abs() * HARTREE_TO_KJ_PER_MOL);
        let rotational = a
            .descriptors
            .rotational_constants
            .zip(b.descriptors.rotational_constants)
            .map(|(ra, rb)| ra.iter().zip(&rb).map(|(x, y)| (x - y).abs()).sum::<f64>() / 3.0);
        let barcode = match (&a.descriptors.barcode, &b.descriptors.barcode) {
            (Some(ba), Some(bb)) if ba.len() == bb.len() => {
                Some(ba.iter().zip(bb).map(|(x, y)| (x - y).abs()).sum())
            }
            _ => None,
        };
        Self {
            energy,
            rotational,
            barcode,
        }
    }

    pub fn get(&self, channel: Channel) -> Option<f64> {
        match channel {
            Channel::Rotational => self.rotational,
            Channel::Barcode => self.barcode,
            Channel::Energy => self.energy,
        }
    }
}
