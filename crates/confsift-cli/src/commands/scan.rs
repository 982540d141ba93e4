use super::read_structures;
use crate::cli::ScanArgs;
use crate::config::builder;
use crate::error::Result;
use crate::ui::{CliProgressHandler, UiEvent};
use confsift::{
    engine::{checkpoint, progress::ProgressReporter, stop::StopSignal},
    workflows::{
        self,
        scan::{OutputPaths, ScanInput, ScanReport},
    },
};
use tokio::sync::mpsc;
use tracing::{info, warn};

pub async fn run(args: ScanArgs, threads: Option<usize>, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    info!("Building scan configuration...");
    let config = builder::build_config(&args, threads)?;

    let structures = read_structures(&config.input_path)?;
    info!("Read {} structures.", structures.len());
    let mut input = ScanInput::new(structures);

    if let Some(prior_path) = &config.prior_path {
        let prior = read_structures(prior_path)?;
        info!("Read {} previously accepted structures.", prior.len());
        input = input.with_previously_accepted(prior);
    }

    if !config.restart_paths.is_empty() {
        let restart = checkpoint::load_restart(&config.restart_paths);
        if restart.is_empty() {
            warn!("None of the restart files could be used; starting from scratch.");
        }
        input = input.with_restart(restart);
    }

    let mut stop = StopSignal::new();
    if let Some(stop_file) = &config.stop_file {
        if stop_file.exists() {
            warn!(
                "Stop file {:?} already exists; the scan will stop before the first candidate.",
                stop_file
            );
        }
        stop = stop.with_stop_file(stop_file);
    }
    let ctrl_c_stop = stop.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing the current candidate and writing a checkpoint.");
            ctrl_c_stop.request();
        }
    });

    let outputs = OutputPaths::new(&config.output_base);
    let progress_handler = CliProgressHandler::new(ui_sender);
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Scanning conformer ensemble...");
    info!("Invoking the core scan workflow...");

    let result = tokio::task::block_in_place(|| {
        workflows::scan::run(input, &config.core_config, Some(&outputs), &reporter, &stop)
    });
    ctrl_c.abort();
    let report = result?;

    print_summary(&report, &outputs);
    Ok(())
}

fn print_summary(report: &ScanReport, outputs: &OutputPaths) {
    let counters = &report.state.counters;
    if let Some(threshold) = report.threshold {
        println!("RMSD threshold: {:.4} Å", threshold);
    }

    if report.interrupted {
        println!(
            "Scan interrupted during the {} pass after {} candidate(s).",
            report.state.stage.label(report.state.pass_index),
            report.state.cursor
        );
        println!(
            "Restart with: --restart {}",
            outputs.checkpoint().display()
        );
        return;
    }

    println!(
        "✓ Kept {} unique structure(s), rejected {}.",
        report.accepted.len(),
        report.rejected.len()
    );
    println!(
        "  Comparisons: {} reordered ({} successful), {} native, {} reused rules",
        counters.reordered, counters.successful, counters.native, counters.reused
    );
    println!(
        "  Prefilter: {} skipped, {} already compared, {} rejected directly",
        counters.skipped, counters.duplicated, counters.rejected_directly
    );
    println!(
        "  Learned {} reordering rule(s).",
        report.state.rules.len()
    );
    println!("  Representatives written to: {}", outputs.accepted().display());
    println!("  Duplicates written to: {}", outputs.rejected().display());
    if !report.joined.is_empty() {
        println!("  Joined set written to: {}", outputs.joined().display());
    }
}
