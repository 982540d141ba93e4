use super::element::Element;
use nalgebra::Point3;

/// A single labeled point of a structure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Atom {
    /// The chemical element of the atom.
    pub element: Element,
    /// The 3D coordinates of the atom in Angstroms.
    pub position: Point3<f64>,
}

impl Atom {
    pub fn new(element: Element, position: Point3<f64>) -> Self {
        Self { element, position }
    }

    pub fn is_heavy(&self) -> bool {
        !self.element.is_hydrogen()
    }

    pub fn distance_to(&self, other: &Atom) -> f64 {
        (self.position - other.position).norm()
    }
}
