use super::element::Element;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum PermutationError {
    #[error("Index {index} is out of range for a permutation of length {len}")]
    OutOfRange { index: usize, len: usize },
    #[error("Index {0} appears more than once")]
    Duplicate(usize),
    #[error("Permutation of length {permutation} cannot be applied to {items} items")]
    LengthMismatch { permutation: usize, items: usize },
}

/// An atom reordering rule.
///
/// Position `i` of the reordered target is taken from target index `self[i]`, so applying the
/// rule to a target yields `target'[i] = target[p[i]]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct Permutation(Vec<usize>);

impl Permutation {
    pub fn identity(len: usize) -> Self {
        Self((0..len).collect())
    }

    pub fn new(indices: Vec<usize>) -> Result<Self, PermutationError> {
        let len = indices.len();
        let mut seen = vec![false; len];
        for &index in &indices {
            if index >= len {
                return Err(PermutationError::OutOfRange { index, len });
            }
            if std::mem::replace(&mut seen[index], true) {
                return Err(PermutationError::Duplicate(index));
            }
        }
        Ok(Self(indices))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn is_identity(&self) -> bool {
        self.0.iter().enumerate().all(|(i, &p)| i == p)
    }

    pub fn apply<T: Clone>(&self, items: &[T]) -> Result<Vec<T>, PermutationError> {
        if items.len() != self.0.len() {
            return Err(PermutationError::LengthMismatch {
                permutation: self.0.len(),
                items: items.len(),
            });
        }
        Ok(self.0.iter().map(|&p| items[p].clone()).collect())
    }

    /// Composes two rules: the result applied once equals applying `self`, then `next`.
    pub fn then(&self, next: &Permutation) -> Result<Permutation, PermutationError> {
        Ok(Permutation(next.apply(&self.0)?))
    }

    pub fn inverse(&self) -> Permutation {
        let mut inverse = vec![0; self.0.len()];
        for (i, &p) in self.0.iter().enumerate() {
            inverse[p] = i;
        }
        Permutation(inverse)
    }

    /// True if every reference position receives a target atom of the same element.
    pub fn preserves_elements(&self, reference: &[Element], target: &[Element]) -> bool {
        self.0.len() == reference.len()
            && reference.len() == target.len()
            && self
                .0
                .iter()
                .enumerate()
                .all(|(i, &p)| reference[i] == target[p])
    }

    /// Indices that the rule moves, in ascending order.
    pub fn moved_indices(&self) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter(|(i, p)| i != *p)
            .map(|(i, _)| i)
            .collect()
    }
}

impl TryFrom<Vec<usize>> for Permutation {
    type Error = PermutationError;

    fn try_from(value: Vec<usize>) -> Result<Self, Self::Error> {
        Permutation::new(value)
    }
}

impl From<Permutation> for Vec<usize> {
    fn from(value: Permutation) -> Self {
        value.0
    }
}

impl fmt::Display for Permutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.0.iter().map(|i| i.to_string()).collect();
        write!(f, "[{}]", joined.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_sequences() {
        assert_eq!(
            Permutation::new(vec![0, 2]),
            Err(PermutationError::OutOfRange { index: 2, len: 2 })
        );
        assert_eq!(
            Permutation::new(vec![1, 1, 0]),
            Err(PermutationError::Duplicate(1))
        );
    }

    #[test]
    fn apply_takes_items_from_target_indices() {
        let p = Permutation::new(vec![2, 0, 1]).unwrap();
        assert_eq!(p.apply(&['a', 'b', 'c']).unwrap(), vec!['c', 'a', 'b']);
        assert!(p.apply(&['a']).is_err());
    }

    #[test]
    fn inverse_undoes_apply() {
        let p = Permutation::new(vec![3, 0, 2, 1]).unwrap();
        let items = [10, 11, 12, 13];
        let forward = p.apply(&items).unwrap();
        assert_eq!(p.inverse().apply(&forward).unwrap(), items.to_vec());
    }

    #[test]
    fn composition_matches_sequential_application() {
        let first = Permutation::new(vec![1, 2, 0]).unwrap();
        let second = Permutation::new(vec![0, 2, 1]).unwrap();
        let items = ['x', 'y', 'z'];
        let sequential = second.apply(&first.apply(&items).unwrap()).unwrap();
        let composed = first.then(&second).unwrap().apply(&items).unwrap();
        assert_eq!(sequential, composed);
    }

    #[test]
    fn element_preservation_check() {
        let reference = [Element::CARBON, Element::HYDROGEN, Element::HYDROGEN];
        let target = [Element::HYDROGEN, Element::CARBON, Element::HYDROGEN];
        assert!(Permutation::new(vec![1, 0, 2]).unwrap().preserves_elements(&reference, &target));
        assert!(!Permutation::identity(3).preserves_elements(&reference, &target));
    }

    #[test]
    fn moved_indices_lists_swaps() {
        let p = Permutation::new(vec![0, 3, 2, 1]).unwrap();
        assert_eq!(p.moved_indices(), vec![1, 3]);
        assert!(Permutation::identity(4).is_identity());
    }

    #[test]
    fn serde_rejects_non_bijections() {
        #[derive(Deserialize)]
        struct Holder {
            rule: Permutation,
        }
        assert!(toml::from_str::<Holder>("rule = [1, 0, 2]").is_ok());
        assert!(toml::from_str::<Holder>("rule = [1, 1, 2]").is_err());
    }
}
