use super::element::Element;
use itertools::Itertools;
use nalgebra::Point3;
use std::collections::BTreeSet;

/// Additive tolerance (Angstroms) on top of the summed covalent radii.
pub const BOND_TOLERANCE: f64 = 0.45;
/// Upper hydrogen...acceptor distance for a hydrogen bond, in Angstroms.
pub const HBOND_MAX_DISTANCE: f64 = 2.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bond {
    pub atom1: usize,
    pub atom2: usize,
}

impl Bond {
    pub fn new(a: usize, b: usize) -> Self {
        Self {
            atom1: a.min(b),
            atom2: a.max(b),
        }
    }

    pub fn contains(&self, atom: usize) -> bool {
        self.atom1 == atom || self.atom2 == atom
    }

    pub fn partner(&self, atom: usize) -> Option<usize> {
        if self.atom1 == atom {
            Some(self.atom2)
        } else if self.atom2 == atom {
            Some(self.atom1)
        } else {
            None
        }
    }
}

pub fn covalent_bonds(elements: &[Element], positions: &[Point3<f64>]) -> Vec<Bond> {
    (0..elements.len().min(positions.len()))
        .tuple_combinations()
        .filter(|&(i, j)| {
            let cutoff =
                elements[i].covalent_radius() + elements[j].covalent_radius() + BOND_TOLERANCE;
            (positions[i] - positions[j]).norm() <= cutoff
        })
        .map(|(i, j)| Bond::new(i, j))
        .collect()
}

pub fn adjacency(atom_count: usize, bonds: &[Bond]) -> Vec<Vec<usize>> {
    let mut neighbors = vec![Vec::new(); atom_count];
    for bond in bonds {
        neighbors[bond.atom1].push(bond.atom2);
        neighbors[bond.atom2].push(bond.atom1);
    }
    neighbors
}

/// Connected components of the covalent bond graph, each sorted, ordered by lowest index.
pub fn fragments(elements: &[Element], positions: &[Point3<f64>]) -> Vec<Vec<usize>> {
    let count = elements.len().min(positions.len());
    let neighbors = adjacency(count, &covalent_bonds(elements, positions));
    let mut visited = vec![false; count];
    let mut components = Vec::new();

    for start in 0..count {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        let mut stack = vec![start];
        let mut component = Vec::new();
        while let Some(atom) = stack.pop() {
            component.push(atom);
            for &next in &neighbors[atom] {
                if !visited[next] {
                    visited[next] = true;
                    stack.push(next);
                }
            }
        }
        component.sort_unstable();
        components.push(component);
    }
    components
}

/// Donor-hydrogen / acceptor pairs of a structure in its current atom order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HBondTopology {
    pairs: BTreeSet<(usize, usize)>,
}

impl HBondTopology {
    pub fn detect(elements: &[Element], positions: &[Point3<f64>]) -> Self {
        let count = elements.len().min(positions.len());
        let bonds = covalent_bonds(elements, positions);
        let neighbors = adjacency(count, &bonds);

        let mut pairs = BTreeSet::new();
        for h in (0..count).filter(|&i| elements[i].is_hydrogen()) {
            let has_donor = neighbors[h].iter().any(|&d| elements[d].is_hbond_participant());
            if !has_donor {
                continue;
            }
            for acceptor in (0..count).filter(|&a| elements[a].is_hbond_participant()) {
                if neighbors[h].contains(&acceptor) {
                    continue;
                }
                if (positions[h] - positions[acceptor]).norm() <= HBOND_MAX_DISTANCE {
                    pairs.insert((h, acceptor));
                }
            }
        }
        Self { pairs }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn contains(&self, hydrogen: usize, acceptor: usize) -> bool {
        self.pairs.contains(&(hydrogen, acceptor))
    }

    /// Number of hydrogen bonds present in exactly one of the two topologies.
    pub fn difference(&self, other: &HBondTopology) -> usize {
        self.pairs.symmetric_difference(&other.pairs).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn water_dimer() -> (Vec<Element>, Vec<Point3<f64>>) {
        let elements = vec![
            Element::OXYGEN,
            Element::HYDROGEN,
            Element::HYDROGEN,
            Element::OXYGEN,
            Element::HYDROGEN,
            Element::HYDROGEN,
        ];
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.96, 0.0, 0.0),
            Point3::new(-0.24, 0.93, 0.0),
            Point3::new(2.9, 0.0, 0.0),
            Point3::new(3.2, 0.9, 0.0),
            Point3::new(3.2, -0.9, 0.0),
        ];
        (elements, positions)
    }

    #[test]
    fn bond_is_order_independent() {
        let bond = Bond::new(4, 1);
        assert_eq!(bond, Bond::new(1, 4));
        assert!(bond.contains(4));
        assert_eq!(bond.partner(1), Some(4));
        assert_eq!(bond.partner(2), None);
    }

    #[test]
    fn detects_covalent_bonds_of_water() {
        let (elements, positions) = water_dimer();
        let bonds = covalent_bonds(&elements, &positions);
        assert_eq!(bonds.len(), 4);
        assert!(bonds.contains(&Bond::new(0, 1)));
        assert!(!bonds.contains(&Bond::new(1, 3)));
    }

    #[test]
    fn fragments_split_disconnected_molecules() {
        let (elements, positions) = water_dimer();
        assert_eq!(
            fragments(&elements, &positions),
            vec![vec![0, 1, 2], vec![3, 4, 5]]
        );
    }

    #[test]
    fn hbond_topology_finds_donor_acceptor_pair() {
        let (elements, positions) = water_dimer();
        let topology = HBondTopology::detect(&elements, &positions);
        assert!(topology.contains(1, 3));
        assert_eq!(topology.len(), 1);
    }

    #[test]
    fn hbond_difference_counts_symmetric_changes() {
        let (elements, positions) = water_dimer();
        let bonded = HBondTopology::detect(&elements, &positions);
        let mut far = positions.clone();
        for p in far.iter_mut().skip(3) {
            p.x += 5.0;
        }
        let separated = HBondTopology::detect(&elements, &far);
        assert_eq!(bonded.difference(&separated), 1);
        assert_eq!(bonded.difference(&bonded), 0);
    }
}
