use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "confsift - Rigid alignment, atom reordering and RMSD-based deduplication of conformer ensembles.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of worker threads.
    /// Overrides `threads` from the config file.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reduce a conformer ensemble to its unique representatives.
    Scan(ScanArgs),
    /// Align two structures, optionally searching for the best atom reordering.
    Align(AlignArgs),
}

/// Arguments for the `scan` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    // --- Core Arguments ---
    /// Multi-structure XYZ file with the ensemble; energies are read from the comment lines.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Base name of the output files (e.g., 'out' writes 'out.accepted.xyz').
    #[arg(short, long, required = true, value_name = "BASE")]
    pub output: PathBuf,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// RMSD duplicate threshold in Å, or 'auto' to take the smallest RMSD of the initial pass.
    #[arg(short = 't', long, value_name = "RMSD|auto")]
    pub threshold: Option<String>,

    // --- Restart and Reuse ---
    /// Representatives of an earlier scan to compare against in the reuse pass.
    #[arg(long, value_name = "PATH")]
    pub prior: Option<PathBuf>,

    /// Checkpoint file(s) to restart from. Rules of several files are merged.
    #[arg(short, long, value_name = "PATH", num_args(1..))]
    pub restart: Vec<PathBuf>,

    /// Stop cleanly, writing a checkpoint, as soon as this file exists.
    #[arg(long, value_name = "PATH")]
    pub stop_file: Option<PathBuf>,

    // --- Alignment Overrides ---
    /// Template strategy: free, heavy, distance, anchor or anchor:N,O,...
    #[arg(long, value_name = "NAME")]
    pub strategy: Option<String>,

    /// Pairing cost metric, by code (1-6) or name.
    #[arg(long, value_name = "CODE|NAME")]
    pub cost_metric: Option<String>,

    /// Reject reorderings that change the hydrogen-bond topology by more than this.
    #[arg(long, value_name = "INT")]
    pub max_hbond_difference: Option<usize>,

    // --- Scan Overrides ---
    /// Energy window above the lowest structure, in kJ/mol.
    #[arg(long, value_name = "KJ_PER_MOL")]
    pub max_energy: Option<f64>,

    /// Keep at most this many structures.
    #[arg(long, value_name = "INT")]
    pub max_rank: Option<usize>,

    /// Skip the initial native-order pass (requires a numeric threshold).
    #[arg(long)]
    pub skip_initial: bool,

    /// Skip the reorder passes.
    #[arg(long)]
    pub skip_reorder: bool,

    /// Skip the reuse pass even when a prior set is given.
    #[arg(long)]
    pub skip_reuse: bool,

    /// Use cached reordering rules without learning new ones.
    #[arg(long)]
    pub skip_new_rules: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S prefilter.tight-multiplier=0.2
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `align` subcommand.
#[derive(Args, Debug, Clone)]
pub struct AlignArgs {
    /// XYZ file holding the reference structure.
    #[arg(required = true, value_name = "REFERENCE")]
    pub reference: PathBuf,

    /// XYZ file holding the structure to align.
    #[arg(required = true, value_name = "TARGET")]
    pub target: PathBuf,

    /// Write the aligned (and reordered) target to this XYZ file.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Only fit the native atom order.
    #[arg(long)]
    pub no_reorder: bool,

    /// Template strategy: free, heavy, distance, anchor or anchor:N,O,...
    #[arg(long, value_name = "NAME")]
    pub strategy: Option<String>,

    /// Pairing cost metric, by code (1-6) or name.
    #[arg(long, value_name = "CODE|NAME")]
    pub cost_metric: Option<String>,

    /// Center on the center of mass instead of the centroid.
    #[arg(long)]
    pub center_of_mass: bool,

    /// Cap on refit/reassign cycles per seed.
    #[arg(long, value_name = "INT")]
    pub max_cycles: Option<usize>,

    /// Reject reorderings that change the hydrogen-bond topology by more than this.
    #[arg(long, value_name = "INT")]
    pub max_hbond_difference: Option<usize>,
}
