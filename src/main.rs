use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use depwatch::core::summary::DEFAULT_TOP_N;
use depwatch::incremental::{GitChangeDetector, IncrementalAnalyzer, SnapshotCache};
use depwatch::{Config, DependencySummary, ExtractionPipeline};

#[derive(Debug, Parser)]
#[command(
    name = "depwatch",
    version,
    about = "Incremental import dependency graphs for Python projects"
)]
struct Cli {
    /// Configuration file (defaults to depwatch.toml in the project root)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build the full dependency graph of a project
    Extract(ExtractArgs),
    /// Update cached snapshots from the changes since the last analyzed revision
    Incremental(IncrementalArgs),
}

#[derive(Debug, Args)]
struct ExtractArgs {
    /// Project root to analyze
    #[arg(short, long, value_name = "PATH", default_value = ".")]
    root: PathBuf,

    /// Graph document output file
    #[arg(short, long, value_name = "FILE", default_value = "dependency_graph.json")]
    output: PathBuf,

    /// Also write a dependency summary to this file
    #[arg(short, long, value_name = "FILE")]
    summary: Option<PathBuf>,

    /// Include glob, repeatable (replaces the configured list)
    #[arg(long, value_name = "GLOB")]
    include: Vec<String>,

    /// Exclude glob, repeatable (replaces the configured list)
    #[arg(long, value_name = "GLOB")]
    exclude: Vec<String>,

    /// Additional root for absolute imports, repeatable
    #[arg(long = "search-root", value_name = "PATH")]
    search_roots: Vec<PathBuf>,

    /// Number of entries in the summary rankings
    #[arg(long, value_name = "N", default_value_t = DEFAULT_TOP_N)]
    top: usize,
}

#[derive(Debug, Args)]
struct IncrementalArgs {
    /// Project root, also the repository used for change detection
    #[arg(short, long, value_name = "PATH", default_value = ".")]
    root: PathBuf,

    /// Ignore cached snapshots and rebuild
    #[arg(long)]
    force_full: bool,

    /// Also update the file metrics snapshot
    #[arg(long)]
    metrics: bool,

    /// Write the dependency snapshot as JSON to this file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run(cli)
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("depwatch=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("depwatch=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr).compact())
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let Cli {
        config, command, ..
    } = cli;

    match command {
        Command::Extract(args) => {
            let config = load_config(config.as_deref(), &args.root)?;
            extract(config, args)
        }
        Command::Incremental(args) => {
            let config = load_config(config.as_deref(), &args.root)?;
            incremental(config, args)
        }
    }
}

fn load_config(path: Option<&Path>, root: &Path) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Config::discover(root).context("failed to load depwatch.toml"),
    }
}

fn extract(mut config: Config, args: ExtractArgs) -> Result<()> {
    let ExtractArgs {
        root,
        output,
        summary,
        include,
        exclude,
        search_roots,
        top,
    } = args;

    if !include.is_empty() {
        config.extraction.include = include;
    }
    if !exclude.is_empty() {
        config.extraction.exclude = exclude;
    }
    config.extraction.search_roots.extend(search_roots);

    let start_time = Instant::now();
    let mut pipeline = ExtractionPipeline::python(config.extraction);
    let graph = pipeline
        .extract(&root)
        .with_context(|| format!("failed to analyze {}", root.display()))?;

    fs::write(&output, graph.to_json()?)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!(
        "Wrote {} modules and {} dependencies to {}",
        graph.node_count(),
        graph.edge_count(),
        output.display()
    );

    if let Some(summary_path) = summary {
        let report = DependencySummary::from_graph(&graph, top);
        fs::write(&summary_path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("failed to write {}", summary_path.display()))?;
        println!("Summary: {}", summary_path.display());
        if report.has_cycles {
            println!("Found {} import cycles", report.cycles.len());
        }
    }

    if !pipeline.errors().is_empty() {
        println!("{} files had errors, see the log for details", pipeline.errors().len());
    }
    println!("Analysis completed in {:.2}s", start_time.elapsed().as_secs_f64());
    Ok(())
}

fn incremental(config: Config, args: IncrementalArgs) -> Result<()> {
    let start_time = Instant::now();
    let cache_dir = config.incremental.cache_dir_in(&args.root);
    let cache = SnapshotCache::new(&cache_dir)
        .with_context(|| format!("failed to open cache at {}", cache_dir.display()))?
        .with_max_entries(config.incremental.max_snapshots);
    let detector = GitChangeDetector::new(&args.root);
    let analyzer = IncrementalAnalyzer::new(&args.root, config.extraction, detector, cache);

    let dependencies = analyzer
        .analyze_dependencies(args.force_full)
        .with_context(|| format!("failed to analyze {}", args.root.display()))?;
    println!(
        "Dependencies ({}): {} modules, {} dependencies",
        dependencies.mode,
        dependencies.snapshot.metrics.module_count,
        dependencies.snapshot.metrics.total_dependencies
    );

    if args.metrics {
        let metrics = analyzer
            .analyze_metrics(args.force_full)
            .context("failed to collect file metrics")?;
        println!(
            "Metrics ({}): {} files, {} lines",
            metrics.mode, metrics.snapshot.aggregated.total_files, metrics.snapshot.aggregated.total_lines
        );
    }

    if let Some(output) = args.output {
        fs::write(&output, serde_json::to_string_pretty(&dependencies)?)
            .with_context(|| format!("failed to write {}", output.display()))?;
        println!("Snapshot: {}", output.display());
    }

    println!("Analysis completed in {:.2}s", start_time.elapsed().as_secs_f64());
    Ok(())
}
