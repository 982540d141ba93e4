use super::atom::Atom;
use super::element::Element;
use super::permutation::{Permutation, PermutationError};
use super::topology::{self, HBondTopology};
use crate::core::utils::geometry;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Conversion factor from Hartree to kJ/mol.
pub const HARTREE_TO_KJ_PER_MOL: f64 = 2625.5;

/// Externally supplied scalar descriptors used as cheap dissimilarity proxies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Descriptors {
    /// Rotational constants in MHz.
    pub rotational_constants: Option<[f64; 3]>,
    /// Fixed-length topological barcode vector.
    pub barcode: Option<Vec<f64>>,
}

/// An ordered set of labeled atoms with its energy and descriptors.
///
/// Apart from replacing the geometry with an aligned copy or rewriting the atom order through a
/// [`Permutation`], a structure is treated as immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Structure {
    /// Stable position of the structure in its input population.
    pub id: usize,
    /// Free-form label, usually the comment line of the source file.
    pub name: String,
    /// Energy in Hartree, if known.
    pub energy: Option<f64>,
    pub descriptors: Descriptors,
    atoms: Vec<Atom>,
}

impl Structure {
    /// Creates a structure from a list of atoms.
    ///
    /// # Arguments
    ///
    /// * `atoms` - The atoms in their native order.
    ///
    /// # Return
    ///
    /// Returns a structure with id `0`, an empty name and no energy or descriptors.
    pub fn new(atoms: Vec<Atom>) -> Self {
        Self {
            atoms,
            ..Default::default()
        }
    }

    /// Creates a structure from parallel element and position lists.
    ///
    /// # Return
    ///
    /// Returns `None` if the two lists differ in length.
    pub fn from_parts(elements: &[Element], positions: &[Point3<f64>]) -> Option<Self> {
        (elements.len() == positions.len()).then(|| {
            Self::new(
                elements
                    .iter()
                    .zip(positions)
                    .map(|(&e, &p)| Atom::new(e, p))
                    .collect(),
            )
        })
    }

    pub fn with_id(mut self, id: usize) -> Self {
        self.id = id;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_energy(mut self, energy: f64) -> Self {
        self.energy = Some(energy);
        self
    }

    pub fn with_descriptors(mut self, descriptors: Descriptors) -> Self {
        self.descriptors = descriptors;
        self
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn elements(&self) -> Vec<Element> {
        self.atoms.iter().map(|a| a.element).collect()
    }

    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.atoms.iter().map(|a| a.position).collect()
    }

    pub fn masses(&self) -> Vec<f64> {
        self.atoms.iter().map(|a| a.element.mass()).collect()
    }

    /// Energy converted to kJ/mol.
    pub fn energy_kj_per_mol(&self) -> Option<f64> {
        self.energy.map(|e| e * HARTREE_TO_KJ_PER_MOL)
    }

    pub fn element_counts(&self) -> BTreeMap<Element, usize> {
        let mut counts = BTreeMap::new();
        for atom in &self.atoms {
            *counts.entry(atom.element).or_insert(0) += 1;
        }
        counts
    }

    /// True if both structures contain the same multiset of elements.
    pub fn same_composition(&self, other: &Structure) -> bool {
        self.len() == other.len() && self.element_counts() == other.element_counts()
    }

    /// True if both structures list the same element at every position.
    pub fn same_element_order(&self, other: &Structure) -> bool {
        self.len() == other.len()
            && self
                .atoms
                .iter()
                .zip(&other.atoms)
                .all(|(a, b)| a.element == b.element)
    }

    pub fn heavy_atom_indices(&self) -> Vec<usize> {
        self.atoms
            .iter()
            .enumerate()
            .filter(|(_, a)| a.is_heavy())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn centroid(&self) -> Point3<f64> {
        geometry::centroid(&self.positions())
    }

    pub fn center_of_mass(&self) -> Point3<f64> {
        geometry::center_of_mass(&self.positions(), &self.masses())
    }

    /// Rewrites the atom order: position `i` receives atom `permutation[i]`.
    ///
    /// # Errors
    ///
    /// Returns [`PermutationError::LengthMismatch`] if the rule does not fit the structure.
    pub fn apply_permutation(
        &self,
        permutation: &Permutation,
    ) -> Result<Structure, PermutationError> {
        Ok(Structure {
            atoms: permutation.apply(&self.atoms)?,
            ..self.clone()
        })
    }

    /// Returns a copy carrying the given geometry, or `None` if the atom count differs.
    pub fn with_positions(&self, positions: &[Point3<f64>]) -> Option<Structure> {
        if positions.len() != self.atoms.len() {
            return None;
        }
        let atoms = self
            .atoms
            .iter()
            .zip(positions)
            .map(|(a, &p)| Atom::new(a.element, p))
            .collect();
        Some(Structure {
            atoms,
            ..self.clone()
        })
    }

    /// Covalently connected fragments, each a sorted list of atom indices.
    pub fn fragments(&self) -> Vec<Vec<usize>> {
        topology::fragments(&self.elements(), &self.positions())
    }

    pub fn hbond_topology(&self) -> HBondTopology {
        HBondTopology::detect(&self.elements(), &self.positions())
    }

    pub fn rotational_constants(&self) -> Option<[f64; 3]> {
        geometry::rotational_constants(&self.positions(), &self.masses())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn co2() -> Structure {
        Structure::from_parts(
            &[Element::OXYGEN, Element::CARBON, Element::OXYGEN],
            &[
                Point3::new(-1.16, 0.0, 0.0),
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.16, 0.0, 0.0),
            ],
        )
        .unwrap()
        .with_name("co2")
        .with_energy(-188.5)
    }

    #[test]
    fn from_parts_requires_matching_lengths() {
        assert!(Structure::from_parts(&[Element::CARBON], &[]).is_none());
    }

    #[test]
    fn composition_and_order_checks() {
        let s = co2();
        let reordered = s
            .apply_permutation(&Permutation::new(vec![1, 0, 2]).unwrap())
            .unwrap();
        assert!(s.same_composition(&reordered));
        assert!(!s.same_element_order(&reordered));
        assert_eq!(reordered.atoms()[0].element, Element::CARBON);
        assert_eq!(reordered.name, "co2");
    }

    #[test]
    fn energy_is_converted_to_kj_per_mol() {
        let s = co2();
        assert!((s.energy_kj_per_mol().unwrap() - (-188.5 * 2625.5)).abs() < 1e-6);
    }

    #[test]
    fn with_positions_keeps_elements() {
        let s = co2();
        let shifted: Vec<_> = s.positions().iter().map(|p| p + nalgebra::Vector3::x()).collect();
        let moved = s.with_positions(&shifted).unwrap();
        assert_eq!(moved.elements(), s.elements());
        assert!((moved.centroid().x - 1.0).abs() < 1e-12);
        assert!(s.with_positions(&shifted[..1]).is_none());
    }

    #[test]
    fn heavy_atoms_and_fragments() {
        let s = co2();
        assert_eq!(s.heavy_atom_indices(), vec![0, 1, 2]);
        assert_eq!(s.fragments(), vec![vec![0, 1, 2]]);
    }
}
