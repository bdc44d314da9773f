//! dendrotrack CLI: inspect, analyze and align time-lapse arbor projects.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use dendrotrack::pipeline::{columns, per_branch, per_puncta, per_tree};
use dendrotrack::{
    align_stacks, apply_remap, load_project, save_project, AlignConfig, FullState, RemapFile,
    TipFilopodium,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "dendrotrack")]
#[command(about = "Morphometry and alignment of time-lapse dendritic arbor tracings")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a summary of a project file.
    Info {
        /// Project file (.dyn.gz or plain JSON).
        project: PathBuf,
    },

    /// Run every analysis and write per-tree, per-branch and per-puncta CSV tables.
    Analyze(CliAnalyzeArgs),

    /// Align one stack onto another and report the point-ID remap.
    Align(CliAlignArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TipFilopodiumArg {
    TerminalOfParent,
    ContinuesBranch,
}

impl From<TipFilopodiumArg> for TipFilopodium {
    fn from(v: TipFilopodiumArg) -> Self {
        match v {
            TipFilopodiumArg::TerminalOfParent => TipFilopodium::TerminalOfParent,
            TipFilopodiumArg::ContinuesBranch => TipFilopodium::ContinuesBranch,
        }
    }
}

#[derive(Debug, Clone, Args)]
struct CliAnalyzeArgs {
    /// Project file.
    project: PathBuf,

    /// Directory for the CSV tables (created if missing).
    #[arg(long)]
    out_dir: PathBuf,

    /// Override the filopodium length threshold (µm).
    #[arg(long)]
    filo_dist: Option<f64>,

    /// Override the terminal-filopodium distance (µm).
    #[arg(long)]
    terminal_dist: Option<f64>,

    /// Count added/subtracted filopodia in raw motility.
    #[arg(long)]
    include_as: bool,

    /// Classification of a lone filopodium on a branch tip.
    #[arg(long, value_enum)]
    tip_filopodium: Option<TipFilopodiumArg>,
}

#[derive(Debug, Clone, Args)]
struct CliAlignArgs {
    /// Project file.
    project: PathBuf,

    /// Stack to rename (1-based).
    #[arg(long)]
    stack: usize,

    /// Reference stack (1-based). Defaults to the stack before `--stack`.
    #[arg(long)]
    reference: Option<usize>,

    /// Maximum consecutive points skipped on one side.
    #[arg(long, default_value = "3")]
    max_skip: u8,

    /// Cost per unmatched point.
    #[arg(long, default_value = "10.0")]
    penalty: f64,

    /// Give up after this many seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// TSV remap log to merge the result into.
    #[arg(long)]
    remap_file: Option<PathBuf>,

    /// Apply the remap and save the project here.
    #[arg(long)]
    write: Option<PathBuf>,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info { project } => run_info(&project),
        Commands::Analyze(args) => run_analyze(&args),
        Commands::Align(args) => run_align(&args),
    }
}

// ── info ───────────────────────────────────────────────────────────────

fn run_info(path: &Path) -> CliResult<()> {
    let state = load_project(path)?;

    println!("dendrotrack project {}", path.display());
    println!("  stacks:        {}", state.n_stacks());
    println!("  pixel sizes:   {:?} µm", state.pixel_sizes());
    for (i, tree) in state.trees.iter().enumerate() {
        let connected = tree.connected_branches().len();
        println!(
            "  stack {:>3}:     {} points, {} branches ({} disconnected), {} puncta  [{}]",
            i + 1,
            tree.flatten_points(false).len(),
            connected,
            tree.branches().len() - connected,
            state.puncta_for(i).len(),
            state.file_paths.get(i).map_or("-", String::as_str),
        );
    }
    println!(
        "  options:       {}",
        serde_json::to_string(&state.project_options)?
    );

    Ok(())
}

// ── analyze ────────────────────────────────────────────────────────────

fn run_analyze(args: &CliAnalyzeArgs) -> CliResult<()> {
    let mut state = load_project(&args.project)?;
    apply_overrides(&mut state, args);
    state.project_options.validate()?;

    std::fs::create_dir_all(&args.out_dir)?;

    let tables = [
        ("per_tree.csv", per_tree(&state, &columns::tree_columns())?),
        ("per_branch.csv", per_branch(&state, &columns::branch_columns())?),
        ("per_puncta.csv", per_puncta(&state, &columns::puncta_columns())?),
    ];
    for (name, table) in &tables {
        let path = args.out_dir.join(name);
        table.write_csv(&path)?;
        tracing::info!(
            "{} written: {} rows, {} columns",
            path.display(),
            table.n_rows(),
            table.columns.len()
        );
    }

    Ok(())
}

fn apply_overrides(state: &mut FullState, args: &CliAnalyzeArgs) {
    let opts = &mut state.project_options.motility_options;
    if let Some(d) = args.filo_dist {
        opts.filo_dist = d;
    }
    if let Some(d) = args.terminal_dist {
        opts.terminal_dist = d;
    }
    if args.include_as {
        opts.include_as = true;
    }
    if let Some(policy) = args.tip_filopodium {
        opts.tip_filopodium = policy.into();
    }
}

// ── align ──────────────────────────────────────────────────────────────

fn run_align(args: &CliAlignArgs) -> CliResult<()> {
    let mut state = load_project(&args.project)?;

    let target = to_index(args.stack, "--stack")?;
    let reference = match args.reference {
        Some(r) => to_index(r, "--reference")?,
        None => target
            .checked_sub(1)
            .ok_or_else(|| -> CliError { "--stack 1 has no previous stack; pass --reference".into() })?,
    };
    let config = AlignConfig {
        max_skip: args.max_skip,
        unmatched_penalty: args.penalty,
    };

    let started = Instant::now();
    let deadline = args.timeout_secs.map(Duration::from_secs);
    let alignment = align_stacks(&state, reference, target, &config, || {
        deadline.is_some_and(|d| started.elapsed() > d)
    })?;
    tracing::info!(
        "Aligned stack {} onto stack {}: {} pairs, {} renamed, cost {:.3} ({:.2?})",
        target + 1,
        reference + 1,
        alignment.n_matched,
        alignment.remap.len(),
        alignment.cost,
        started.elapsed()
    );
    println!("{}", serde_json::to_string_pretty(&alignment.remap)?);

    if let Some(path) = &args.remap_file {
        let mut log = RemapFile::read(path)?;
        log.merge(&alignment.remap);
        log.write(path)?;
        tracing::info!("Remap log {} now has {} rows", path.display(), log.rows.len());
    }

    if let Some(out) = &args.write {
        let FullState { trees, ids, .. } = &mut state;
        let renamed = apply_remap(&mut trees[target], &alignment.remap, ids);
        save_project(&state, out)?;
        tracing::info!("{} points renamed; project written to {}", renamed, out.display());
    }

    Ok(())
}

fn to_index(stack: usize, flag: &str) -> CliResult<usize> {
    stack
        .checked_sub(1)
        .ok_or_else(|| format!("{} is 1-based, got 0", flag).into())
}
