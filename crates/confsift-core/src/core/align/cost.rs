use super::error::AlignError;
use crate::core::models::element::Element;
use nalgebra::{DMatrix, Point3};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Cost of pairing two atoms from their distance `d` and center-distance difference `n`.
pub type CostFn = fn(f64, f64) -> f64;

/// The six pairing cost functions, numbered 1-6 in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CostMetric {
    /// `d²`
    #[default]
    SquaredDistance,
    /// `d`
    Distance,
    /// `d + n`
    DistancePlusNorm,
    /// `d² + n²`
    SquaredSum,
    /// `d · n`
    Product,
    /// `d² · n²`
    SquaredProduct,
}

impl CostMetric {
    pub const ALL: [CostMetric; 6] = [
        CostMetric::SquaredDistance,
        CostMetric::Distance,
        CostMetric::DistancePlusNorm,
        CostMetric::SquaredSum,
        CostMetric::Product,
        CostMetric::SquaredProduct,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code).checked_sub(1)?).copied()
    }

    pub fn code(self) -> u8 {
        match self {
            CostMetric::SquaredDistance => 1,
            CostMetric::Distance => 2,
            CostMetric::DistancePlusNorm => 3,
            CostMetric::SquaredSum => 4,
            CostMetric::Product => 5,
            CostMetric::SquaredProduct => 6,
        }
    }

    pub fn resolve(self) -> CostFn {
        match self {
            CostMetric::SquaredDistance => |d: f64, _: f64| d * d,
            CostMetric::Distance => |d: f64, _: f64| d,
            CostMetric::DistancePlusNorm => |d: f64, n: f64| d + n,
            CostMetric::SquaredSum => |d: f64, n: f64| d * d + n * n,
            CostMetric::Product => |d: f64, n: f64| d * n,
            CostMetric::SquaredProduct => |d: f64, n: f64| d * d * n * n,
        }
    }
}

impl FromStr for CostMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<u8>() {
            return Self::from_code(code)
                .ok_or_else(|| format!("cost metric code {code} is not in 1-6"));
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "squared-distance" => Ok(Self::SquaredDistance),
            "distance" => Ok(Self::Distance),
            "distance-plus-norm" => Ok(Self::DistancePlusNorm),
            "squared-sum" => Ok(Self::SquaredSum),
            "product" => Ok(Self::Product),
            "squared-product" => Ok(Self::SquaredProduct),
            other => Err(format!("unknown cost metric '{other}'")),
        }
    }
}

impl fmt::Display for CostMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CostMetric::SquaredDistance => "squared-distance",
            CostMetric::Distance => "distance",
            CostMetric::DistancePlusNorm => "distance-plus-norm",
            CostMetric::SquaredSum => "squared-sum",
            CostMetric::Product => "product",
            CostMetric::SquaredProduct => "squared-product",
        };
        f.write_str(name)
    }
}

/// Same-element index groups of a reference and a target restricted to a working set.
///
/// Cross-element pairs never appear in any block, which is how forbidden entries are realized.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementBlocks {
    blocks: Vec<ElementBlock>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementBlock {
    pub element: Element,
    pub reference: Vec<usize>,
    pub target: Vec<usize>,
}

impl ElementBlocks {
    /// Groups the selected atoms of both structures by element.
    ///
    /// # Errors
    ///
    /// Returns [`AlignError::NoValidPermutation`] if the element counts of the two selections
    /// differ.
    pub fn new(
        reference: &[Element],
        target: &[Element],
        reference_indices: &[usize],
        target_indices: &[usize],
    ) -> Result<Self, AlignError> {
        let mut groups: BTreeMap<Element, (Vec<usize>, Vec<usize>)> = BTreeMap::new();
        for &i in reference_indices {
            groups.entry(reference[i]).or_default().0.push(i);
        }
        for &i in target_indices {
            groups.entry(target[i]).or_default().1.push(i);
        }
        let blocks = groups
            .into_iter()
            .map(|(element, (reference, target))| {
                if reference.len() == target.len() {
                    Ok(ElementBlock {
                        element,
                        reference,
                        target,
                    })
                } else {
                    Err(AlignError::NoValidPermutation)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { blocks })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ElementBlock> {
        self.blocks.iter()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Builds per-element assignment cost matrices with a metric resolved once at construction.
#[derive(Debug, Clone, Copy)]
pub struct CostMatrixBuilder {
    metric: CostMetric,
    cost: CostFn,
}

impl CostMatrixBuilder {
    pub fn new(metric: CostMetric) -> Self {
        Self {
            metric,
            cost: metric.resolve(),
        }
    }

    pub fn metric(&self) -> CostMetric {
        self.metric
    }

    /// Cost of pairing a centered reference point with a centered, rotated target point.
    #[inline]
    pub fn pair_cost(&self, reference: &Point3<f64>, target: &Point3<f64>) -> f64 {
        let distance = (reference - target).norm();
        let norm = (reference.coords.norm() - target.coords.norm()).abs();
        (self.cost)(distance, norm)
    }

    /// Cost matrix for one element block; rows follow `block.reference`, columns `block.target`.
    pub fn build(
        &self,
        reference: &[Point3<f64>],
        target: &[Point3<f64>],
        block: &ElementBlock,
    ) -> DMatrix<f64> {
        DMatrix::from_fn(block.reference.len(), block.target.len(), |r, c| {
            self.pair_cost(&reference[block.reference[r]], &target[block.target[c]])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_codes_round_trip() {
        for metric in CostMetric::ALL {
            assert_eq!(CostMetric::from_code(metric.code()), Some(metric));
            assert_eq!(metric.to_string().parse::<CostMetric>(), Ok(metric));
        }
        assert_eq!(CostMetric::from_code(0), None);
        assert_eq!(CostMetric::from_code(7), None);
        assert_eq!("4".parse::<CostMetric>(), Ok(CostMetric::SquaredSum));
        assert!("cubic".parse::<CostMetric>().is_err());
    }

    #[test]
    fn resolved_functions_match_their_formulas() {
        let (d, n) = (2.0, 0.5);
        let expected = [4.0, 2.0, 2.5, 4.25, 1.0, 1.0];
        for (metric, want) in CostMetric::ALL.iter().zip(expected) {
            assert!(((metric.resolve())(d, n) - want).abs() < 1e-12, "{metric}");
        }
    }

    #[test]
    fn blocks_group_by_element_and_reject_mismatched_counts() {
        let reference = [Element::CARBON, Element::HYDROGEN, Element::HYDROGEN];
        let target = [Element::HYDROGEN, Element::CARBON, Element::HYDROGEN];
        let blocks = ElementBlocks::new(&reference, &target, &[0, 1, 2], &[0, 1, 2]).unwrap();
        assert_eq!(blocks.len(), 2);
        let hydrogen = blocks
            .iter()
            .find(|b| b.element == Element::HYDROGEN)
            .unwrap();
        assert_eq!(hydrogen.reference, vec![1, 2]);
        assert_eq!(hydrogen.target, vec![0, 2]);

        let wrong = [Element::CARBON, Element::CARBON, Element::HYDROGEN];
        assert_eq!(
            ElementBlocks::new(&reference, &wrong, &[0, 1, 2], &[0, 1, 2]),
            Err(AlignError::NoValidPermutation)
        );
    }

    #[test]
    fn matrix_uses_block_indices() {
        let builder = CostMatrixBuilder::new(CostMetric::SquaredDistance);
        let reference = [Point3::new(1.0, 0.0, 0.0), Point3::new(-1.0, 0.0, 0.0)];
        let target = [Point3::new(-1.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let block = ElementBlock {
            element: Element::CARBON,
            reference: vec![0, 1],
            target: vec![0, 1],
        };
        let m = builder.build(&reference, &target, &block);
        assert_eq!(m[(0, 0)], 4.0);
        assert_eq!(m[(0, 1)], 0.0);
        assert_eq!(m[(1, 0)], 0.0);
    }
}
