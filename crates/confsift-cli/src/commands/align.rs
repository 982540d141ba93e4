use super::{read_structures, write_structures};
use crate::cli::AlignArgs;
use crate::config::builder;
use crate::error::Result;
use crate::ui::{CliProgressHandler, UiEvent};
use confsift::{core::models::structure::Structure, engine::progress::ProgressReporter, workflows};
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub async fn run(args: AlignArgs, threads: Option<usize>, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    let mut options = builder::align_options(
        args.strategy.as_deref(),
        args.cost_metric.as_deref(),
        !args.no_reorder,
        args.center_of_mass,
        args.max_cycles,
        args.max_hbond_difference,
    )?;
    options.threads = threads.unwrap_or(1).max(1);

    let reference = first_structure(&args.reference)?;
    let target = first_structure(&args.target)?;

    let progress_handler = CliProgressHandler::new(ui_sender);
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    info!("Invoking the core align workflow...");
    let report = tokio::task::block_in_place(|| {
        workflows::align::run(&reference, &target, &options, &reporter)
    })?;

    println!("Native-order RMSD: {:.6} Å", report.native.rmsd);
    if let Some(reordered) = &report.reordered {
        println!("Reordered RMSD:    {:.6} Å", reordered.rmsd);
        match &reordered.permutation {
            Some(rule) if !rule.is_identity() => {
                println!("Reordering rule:   {}", rule);
                println!("Moved atoms:       {:?}", rule.moved_indices());
            }
            _ => println!("Reordering rule:   identity"),
        }
        if let Some(difference) = reordered.hbond_difference {
            println!("H-bond difference: {}", difference);
        }
    }

    if let Some(output) = &args.output {
        let best = report.best();
        info!("Writing aligned target to {:?}", output);
        write_structures(output, &[best.reference.clone(), best.target.clone()])?;
        println!("Aligned pair written to: {}", output.display());
    }

    Ok(())
}

/// Reads a file that must hold at least one structure and keeps the first.
fn first_structure(path: &Path) -> Result<Structure> {
    let mut structures = read_structures(path)?;
    if structures.len() > 1 {
        warn!(
            "{:?} holds {} structures; only the first is aligned.",
            path,
            structures.len()
        );
    }
    Ok(structures.swap_remove(0))
}
