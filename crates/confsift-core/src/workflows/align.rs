use crate::core::align::engine::{AlignOptions, AlignmentEngine, AlignmentResult};
use crate::core::models::structure::Structure;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct AlignReport {
    /// Best fit in the native atom order.
    pub native: AlignmentResult,
    /// Best fit after reordering; `None` when reordering is disabled.
    pub reordered: Option<AlignmentResult>,
}

impl AlignReport {
    /// The better of the two fits.
    pub fn best(&self) -> &AlignmentResult {
        match &self.reordered {
            Some(reordered) if reordered.rmsd < self.native.rmsd => reordered,
            _ => &self.native,
        }
    }
}

/// Aligns one pair of structures, first in the native order and then, if enabled, with atom
/// reordering.
#[instrument(skip_all, name = "align_workflow")]
pub fn run(
    reference: &Structure,
    target: &Structure,
    options: &AlignOptions,
    reporter: &ProgressReporter,
) -> Result<AlignReport, EngineError> {
    reporter.report(Progress::PhaseStart { name: "Alignment" });
    info!(
        atoms = reference.len(),
        reorder = options.reorder,
        strategy = %options.strategy,
        "Aligning structure pair."
    );

    let native_engine = AlignmentEngine::new(AlignOptions {
        reorder: false,
        ..options.clone()
    });
    let native = native_engine.superpose(reference, target)?;
    info!(rmsd = native.rmsd, "Native-order fit finished.");

    let reordered = if options.reorder {
        let result = AlignmentEngine::new(options.clone()).align(reference, target)?;
        info!(
            rmsd = result.rmsd,
            moved = result
                .permutation
                .as_ref()
                .map_or(0, |p| p.moved_indices().len()),
            cycles = result.cycle_history.len(),
            "Reordering search finished."
        );
        Some(result)
    } else {
        None
    };

    reporter.report(Progress::PhaseFinish);
    Ok(AlignReport { native, reordered })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::models::element::Element;
    use nalgebra::Point3;

    fn methanol(swap: bool) -> Structure {
        let mut atoms = vec![
            Atom::new(Element::CARBON, Point3::new(0.0, 0.0, 0.0)),
            Atom::new(Element::OXYGEN, Point3::new(1.4, 0.0, 0.0)),
            Atom::new(Element::HYDROGEN, Point3::new(-0.5, 0.9, 0.0)),
            Atom::new(Element::HYDROGEN, Point3::new(-0.5, -0.5, 0.8)),
            Atom::new(Element::HYDROGEN, Point3::new(2.0, 0.8, 0.3)),
        ];
        if swap {
            atoms.swap(2, 3);
        }
        Structure::new(atoms)
    }

    #[test]
    fn reordering_improves_on_the_native_fit() {
        let report = run(
            &methanol(false),
            &methanol(true),
            &AlignOptions::default(),
            &ProgressReporter::new(),
        )
        .unwrap();
        assert!(report.native.rmsd > 0.5);
        let best = report.best();
        assert!(best.rmsd < 1e-6);
        assert_eq!(best.permutation.as_ref().unwrap().moved_indices(), vec![2, 3]);
    }

    #[test]
    fn native_only_when_reordering_is_off() {
        let options = AlignOptions {
            reorder: false,
            ..Default::default()
        };
        let report = run(&methanol(false), &methanol(false), &options, &ProgressReporter::new())
            .unwrap();
        assert!(report.reordered.is_none());
        assert!(report.best().rmsd < 1e-8);
    }

    #[test]
    fn size_mismatch_is_an_error() {
        let small = Structure::new(methanol(false).atoms()[..3].to_vec());
        let result = run(
            &methanol(false),
            &small,
            &AlignOptions::default(),
            &ProgressReporter::new(),
        );
        assert!(matches!(result, Err(EngineError::Align { .. })));
    }
}
