use crate::core::models::permutation::Permutation;

#[derive(Debug, Clone, PartialEq)]
pub struct ShelfEntry {
    pub rmsd: f64,
    pub permutation: Permutation,
}

/// Bounded, RMSD-sorted collection of the best distinct permutations seen during a search.
#[derive(Debug, Clone, PartialEq)]
pub struct PermutationShelf {
    capacity: usize,
    entries: Vec<ShelfEntry>,
}

impl PermutationShelf {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Offers a permutation; returns `true` if the shelf changed.
    ///
    /// A permutation already on the shelf only keeps its lowest RMSD. When full, the worst entry
    /// is evicted if the newcomer is strictly better.
    pub fn insert(&mut self, rmsd: f64, permutation: Permutation) -> bool {
        if self.capacity == 0 || !rmsd.is_finite() {
            return false;
        }
        if let Some(pos) = self
            .entries
            .iter()
            .position(|e| e.permutation == permutation)
        {
            if rmsd >= self.entries[pos].rmsd {
                return false;
            }
            self.entries.remove(pos);
        } else if self.entries.len() == self.capacity {
            match self.entries.last() {
                Some(worst) if rmsd < worst.rmsd => {
                    self.entries.pop();
                }
                _ => return false,
            }
        }
        // Equal RMSDs keep insertion order.
        let at = self.entries.partition_point(|e| e.rmsd <= rmsd);
        self.entries.insert(at, ShelfEntry { rmsd, permutation });
        true
    }

    pub fn best(&self) -> Option<&ShelfEntry> {
        self.entries.first()
    }

    /// The `k`-th best entry, counting from `0`.
    pub fn nth_best(&self, k: usize) -> Option<&ShelfEntry> {
        self.entries.get(k)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ShelfEntry> {
        self.entries.iter()
    }

    pub fn merge(&mut self, other: PermutationShelf) {
        for entry in other.entries {
            self.insert(entry.rmsd, entry.permutation);
        }
    }
}
