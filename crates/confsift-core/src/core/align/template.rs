use super::rotation::fit_rotation_or_identity;
use crate::core::models::element::Element;
use crate::core::utils::geometry::principal_frame;
use nalgebra::{Matrix3, Point3, Vector3};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Templates with fewer atoms than this fall back to the free search.
pub const MIN_TEMPLATE_ATOMS: usize = 3;

pub const DEFAULT_ANCHOR_ELEMENTS: [Element; 2] = [Element::NITROGEN, Element::OXYGEN];

// Proper sign combinations of the principal axes.
const AXIS_SIGNS: [[f64; 3]; 4] = [
    [1.0, 1.0, 1.0],
    [1.0, -1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, 1.0],
];

/// How the initial correspondence between reference and target is seeded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TemplateStrategy {
    /// Native order (when element sequences agree) plus the principal-axis frames.
    #[default]
    Free,
    /// Free search on heavy atoms only; hydrogens follow the resulting rotation.
    Heavy,
    /// Free search on the listed anchor elements only.
    Anchor(Vec<Element>),
    /// Same-element atoms paired by rank of their distance from the center.
    Distance,
}

impl TemplateStrategy {
    pub fn anchor_default() -> Self {
        TemplateStrategy::Anchor(DEFAULT_ANCHOR_ELEMENTS.to_vec())
    }

    /// Resolves the strategy into the seeding object used by the alignment engine.
    pub fn seeder(&self) -> Box<dyn TemplateSeeder> {
        match self {
            TemplateStrategy::Free => Box::new(FreeSeeder),
            TemplateStrategy::Heavy => Box::new(HeavySeeder),
            TemplateStrategy::Anchor(elements) => Box::new(AnchorSeeder {
                elements: elements.clone(),
            }),
            TemplateStrategy::Distance => Box::new(DistanceSeeder),
        }
    }
}

/// Accepts `free`, `heavy`, `distance`, `anchor` (N and O) or `anchor:N,O,S`.
impl FromStr for TemplateStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let (kind, args) = match lowered.split_once(':') {
            Some((kind, args)) => (kind, Some(args)),
            None => (lowered.as_str(), None),
        };
        match (kind, args) {
            ("free", None) => Ok(Self::Free),
            ("heavy", None) => Ok(Self::Heavy),
            ("distance", None) => Ok(Self::Distance),
            ("anchor", None) => Ok(Self::anchor_default()),
            ("anchor", Some(list)) => {
                let elements = list
                    .split(',')
                    .filter(|t| !t.trim().is_empty())
                    .map(|t| t.parse::<Element>().map_err(|e| e.to_string()))
                    .collect::<Result<Vec<_>, _>>()?;
                if elements.is_empty() {
                    Err("anchor template needs at least one element".to_string())
                } else {
                    Ok(Self::Anchor(elements))
                }
            }
            _ => Err(format!("unknown template strategy '{}'", s.trim())),
        }
    }
}

impl fmt::Display for TemplateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateStrategy::Free => f.write_str("free"),
            TemplateStrategy::Heavy => f.write_str("heavy"),
            TemplateStrategy::Distance => f.write_str("distance"),
            TemplateStrategy::Anchor(elements) => {
                let symbols: Vec<&str> = elements.iter().map(|e| e.symbol()).collect();
                write!(f, "anchor:{}", symbols.join(","))
            }
        }
    }
}

/// Centered coordinates and the atom selections a seeder works on.
pub struct SeedContext<'a> {
    pub reference: &'a [Point3<f64>],
    pub target: &'a [Point3<f64>],
    pub reference_elements: &'a [Element],
    pub target_elements: &'a [Element],
    pub reference_indices: &'a [usize],
    pub target_indices: &'a [usize],
}

impl SeedContext<'_> {
    fn restricted<'b>(&'b self, reference: &'b [usize], target: &'b [usize]) -> SeedContext<'b> {
        SeedContext {
            reference: self.reference,
            target: self.target,
            reference_elements: self.reference_elements,
            target_elements: self.target_elements,
            reference_indices: reference,
            target_indices: target,
        }
    }
}

/// What the engine should do to obtain its starting rotations.
#[derive(Debug, Clone, PartialEq)]
pub enum SeedPlan {
    /// Start directly from these rotations.
    Rotations(Vec<Matrix3<f64>>),
    /// Run a free search on the given selections first and start from its best rotation.
    Subset {
        reference: Vec<usize>,
        target: Vec<usize>,
    },
}

pub trait TemplateSeeder: Send + Sync {
    fn name(&self) -> &'static str;
    fn plan(&self, ctx: &SeedContext) -> SeedPlan;
}

/// Rotations tried by the free search: native order and the four principal-axis alignments.
pub fn free_seeds(ctx: &SeedContext) -> Vec<Matrix3<f64>> {
    let mut seeds = Vec::new();

    let same_order = ctx.reference_indices.len() == ctx.target_indices.len()
        && ctx
            .reference_indices
            .iter()
            .zip(ctx.target_indices)
            .all(|(&r, &t)| ctx.reference_elements[r] == ctx.target_elements[t]);
    if same_order {
        let (reference, target) = gather_pairs(
            ctx,
            ctx.reference_indices.iter().copied().zip(ctx.target_indices.iter().copied()),
        );
        seeds.push(fit_rotation_or_identity(&reference, &target));
    }

    let frame = |points: &[Point3<f64>], elements: &[Element], indices: &[usize]| {
        let selected: Vec<Point3<f64>> = indices.iter().map(|&i| points[i]).collect();
        let masses: Vec<f64> = indices.iter().map(|&i| elements[i].mass()).collect();
        principal_frame(&selected, &masses)
    };
    let reference_frame = frame(ctx.reference, ctx.reference_elements, ctx.reference_indices);
    let target_frame = frame(ctx.target, ctx.target_elements, ctx.target_indices);
    if let (Some((_, reference_axes)), Some((_, target_axes))) = (reference_frame, target_frame) {
        for signs in AXIS_SIGNS {
            let flip = Matrix3::from_diagonal(&Vector3::from(signs));
            seeds.push(reference_axes * flip * target_axes.transpose());
        }
    }

    if seeds.is_empty() {
        seeds.push(Matrix3::identity());
    }
    seeds
}

fn gather_pairs(
    ctx: &SeedContext,
    pairs: impl Iterator<Item = (usize, usize)>,
) -> (Vec<Point3<f64>>, Vec<Point3<f64>>) {
    pairs.map(|(r, t)| (ctx.reference[r], ctx.target[t])).unzip()
}

fn subset_or_free(ctx: &SeedContext, keep: impl Fn(Element) -> bool) -> SeedPlan {
    let reference: Vec<usize> = ctx
        .reference_indices
        .iter()
        .copied()
        .filter(|&i| keep(ctx.reference_elements[i]))
        .collect();
    let target: Vec<usize> = ctx
        .target_indices
        .iter()
        .copied()
        .filter(|&i| keep(ctx.target_elements[i]))
        .collect();

    if reference.len() < MIN_TEMPLATE_ATOMS || target.len() < MIN_TEMPLATE_ATOMS {
        return SeedPlan::Rotations(free_seeds(ctx));
    }
    SeedPlan::Subset { reference, target }
}

struct FreeSeeder;

impl TemplateSeeder for FreeSeeder {
    fn name(&self) -> &'static str {
        "free"
    }

    fn plan(&self, ctx: &SeedContext) -> SeedPlan {
        SeedPlan::Rotations(free_seeds(ctx))
    }
}

struct HeavySeeder;

impl TemplateSeeder for HeavySeeder {
    fn name(&self) -> &'static str {
        "heavy"
    }

    fn plan(&self, ctx: &SeedContext) -> SeedPlan {
        subset_or_free(ctx, |e| !e.is_hydrogen())
    }
}

struct AnchorSeeder {
    elements: Vec<Element>,
}

impl TemplateSeeder for AnchorSeeder {
    fn name(&self) -> &'static str {
        "anchor"
    }

    fn plan(&self, ctx: &SeedContext) -> SeedPlan {
        subset_or_free(ctx, |e| self.elements.contains(&e))
    }
}

struct DistanceSeeder;

impl DistanceSeeder {
    fn ranked(
        points: &[Point3<f64>],
        elements: &[Element],
        indices: &[usize],
    ) -> BTreeMap<Element, Vec<usize>> {
        let mut groups: BTreeMap<Element, Vec<usize>> = BTreeMap::new();
        for &i in indices {
            groups.entry(elements[i]).or_default().push(i);
        }
        for members in groups.values_mut() {
            members.sort_by(|&a, &b| {
                points[a]
                    .coords
                    .norm()
                    .partial_cmp(&points[b].coords.norm())
                    .unwrap_or(Ordering::Equal)
                    .then(a.cmp(&b))
            });
        }
        groups
    }
}

impl TemplateSeeder for DistanceSeeder {
    fn name(&self) -> &'static str {
        "distance"
    }

    fn plan(&self, ctx: &SeedContext) -> SeedPlan {
        let reference = Self::ranked(ctx.reference, ctx.reference_elements, ctx.reference_indices);
        let target = Self::ranked(ctx.target, ctx.target_elements, ctx.target_indices);

        let pairs: Vec<(usize, usize)> = reference
            .iter()
            .filter_map(|(element, r)| target.get(element).map(|t| (r, t)))
            .flat_map(|(r, t)| r.iter().copied().zip(t.iter().copied()))
            .collect();
        if pairs.len() < MIN_TEMPLATE_ATOMS {
            return SeedPlan::Rotations(free_seeds(ctx));
        }

        let (reference_points, target_points) = gather_pairs(ctx, pairs.into_iter());
        SeedPlan::Rotations(vec![fit_rotation_or_identity(&reference_points, &target_points)])
    }
}

/// Seeds for a nested search restricted to a template selection.
pub(crate) fn free_seeds_for(
    ctx: &SeedContext,
    reference: &[usize],
    target: &[usize],
) -> Vec<Matrix3<f64>> {
    free_seeds(&ctx.restricted(reference, target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::utils::geometry::rotate;
    use nalgebra::Rotation3;

    fn points() -> Vec<Point3<f64>> {
        vec![
            Point3::new(1.2, 0.1, 0.0),
            Point3::new(-0.9, 0.8, 0.1),
            Point3::new(-0.4, -1.3, 0.3),
            Point3::new(0.1, 0.4, -0.4),
        ]
    }

    fn elements() -> Vec<Element> {
        vec![Element::CARBON, Element::OXYGEN, Element::NITROGEN, Element::HYDROGEN]
    }

    #[test]
    fn parses_and_displays_strategies() {
        assert_eq!("free".parse::<TemplateStrategy>(), Ok(TemplateStrategy::Free));
        assert_eq!("HEAVY".parse::<TemplateStrategy>(), Ok(TemplateStrategy::Heavy));
        assert_eq!(
            "anchor".parse::<TemplateStrategy>(),
            Ok(TemplateStrategy::anchor_default())
        );
        let custom: TemplateStrategy = "anchor:S,cl".parse().unwrap();
        assert_eq!(custom.to_string(), "anchor:S,Cl");
        assert!("anchor:".parse::<TemplateStrategy>().is_err());
        assert!("random".parse::<TemplateStrategy>().is_err());
    }

    #[test]
    fn free_seeds_contain_native_fit_and_axis_frames() {
        let reference = points();
        let truth = Rotation3::from_euler_angles(0.4, 0.2, -0.7);
        let target = rotate(&reference, truth.matrix());
        let elements = elements();
        let all = [0, 1, 2, 3];
        let ctx = SeedContext {
            reference: &reference,
            target: &target,
            reference_elements: &elements,
            target_elements: &elements,
            reference_indices: &all,
            target_indices: &all,
        };
        let seeds = free_seeds(&ctx);
        assert_eq!(seeds.len(), 5);
        let recovered = rotate(&target, &seeds[0]);
        for (a, b) in reference.iter().zip(&recovered) {
            assert!((a - b).norm() < 1e-9);
        }
        for seed in &seeds {
            assert!((seed.determinant() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn small_templates_fall_back_to_free_search() {
        let reference = points();
        let elements = elements();
        let all = [0, 1, 2, 3];
        let ctx = SeedContext {
            reference: &reference,
            target: &reference,
            reference_elements: &elements,
            target_elements: &elements,
            reference_indices: &all,
            target_indices: &all,
        };
        assert!(matches!(
            TemplateStrategy::anchor_default().seeder().plan(&ctx),
            SeedPlan::Rotations(_)
        ));
        assert_eq!(
            TemplateStrategy::Heavy.seeder().plan(&ctx),
            SeedPlan::Subset {
                reference: vec![0, 1, 2],
                target: vec![0, 1, 2]
            }
        );
    }

    #[test]
    fn distance_seed_pairs_atoms_by_radial_rank() {
        let reference = points();
        let elements = elements();
        let all = [0, 1, 2, 3];
        let ctx = SeedContext {
            reference: &reference,
            target: &reference,
            reference_elements: &elements,
            target_elements: &elements,
            reference_indices: &all,
            target_indices: &all,
        };
        let SeedPlan::Rotations(seeds) = TemplateStrategy::Distance.seeder().plan(&ctx) else {
            panic!("distance template must produce rotations");
        };
        assert_eq!(seeds.len(), 1);
        assert!((seeds[0] - Matrix3::identity()).norm() < 1e-9);
    }
}
