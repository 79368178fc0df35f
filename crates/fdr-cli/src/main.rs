//! fdratio CLI

mod bundle;
mod config;
mod generate;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fdr_core::{Correlator, EventTable, Observable};
use fdr_inference::{BootstrapCiMethod, run_for_all_bins};
use fdr_viz::{BootstrapArtifact, DiffArtifact, RatioArtifact};
use std::path::{Path, PathBuf};

use config::AnalysisConfig;

#[derive(Parser)]
#[command(name = "fdratio")]
#[command(about = "fdratio - feed-down ratios of weighted correlators with bootstrap errors")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bootstrap the feed-down/primary ratio per centrality bin
    Bootstrap {
        /// Input event table (.parquet, .csv or .tsv)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write CSV tables and graphs into this directory.
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Replicates per centrality bin
        #[arg(long)]
        n_bootstrap: Option<usize>,

        /// Highest centrality bin analysed (0..=9)
        #[arg(long)]
        max_centrality: Option<u8>,

        /// Base RNG seed
        #[arg(long)]
        seed: Option<u64>,

        /// Correlator family (delta or gamma)
        #[arg(long)]
        correlator: Option<Correlator>,

        /// Confidence level of the reported interval
        #[arg(long)]
        conf_level: Option<f64>,

        /// Interval construction (percentile or bca)
        #[arg(long)]
        ci: Option<BootstrapCiMethod>,

        /// Bins with fewer qualifying events are skipped
        #[arg(long)]
        min_events: Option<usize>,

        /// Ratio reported when a denominator mean is exactly zero
        #[arg(long, allow_negative_numbers = true)]
        degenerate_value: Option<f64>,

        /// Threads (0 = auto).
        #[arg(long)]
        threads: Option<usize>,

        /// Analysis config (YAML, or JSON by extension)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write a reproducible bundle (input copy, result, manifest) here
        #[arg(long)]
        bundle: Option<PathBuf>,

        /// Leave replicate histograms out of the result
        #[arg(long)]
        no_histograms: bool,
    },

    /// Naive ratio of correlator profiles with constant fits
    Ratio {
        /// Input event table (.parquet, .csv or .tsv)
        #[arg(short, long)]
        input: PathBuf,

        /// Correlator family (delta or gamma)
        #[arg(long)]
        correlator: Option<Correlator>,

        /// Points above this centrality (percent) are dropped
        #[arg(long)]
        max_centrality_percent: Option<f64>,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write one CSV per ratio into this directory.
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Analysis config (YAML, or JSON by extension)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Difference of two observable profiles
    Diff {
        /// Input event table (.parquet, .csv or .tsv)
        #[arg(short, long)]
        input: PathBuf,

        #[arg(long, default_value = "delta_pFromLambda")]
        minuend: Observable,

        #[arg(long, default_value = "delta_piFromLambda")]
        subtrahend: Observable,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the difference graph as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Write a synthetic event table
    Generate {
        /// Output table (.parquet, .csv or .tsv)
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, default_value = "5000")]
        events: usize,

        #[arg(long, default_value = "7")]
        seed: u64,
    },

    /// Analysis config helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Print version
    Version,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write the default analysis config
    Init {
        #[arg(long, default_value = "fdratio.yaml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Bootstrap {
            input,
            output,
            out_dir,
            n_bootstrap,
            max_centrality,
            seed,
            correlator,
            conf_level,
            ci,
            min_events,
            degenerate_value,
            threads,
            config,
            bundle,
            no_histograms,
        } => {
            let overrides = AnalysisConfig {
                n_bootstrap,
                seed,
                max_centrality_bin: max_centrality,
                min_events_per_bin: min_events,
                degenerate_value,
                correlator,
                conf_level,
                ci_method: ci,
                threads,
                ..Default::default()
            };
            let cfg = AnalysisConfig::resolve(config.as_deref(), overrides)?;
            cmd_bootstrap(
                &input,
                output.as_ref(),
                out_dir.as_deref(),
                &cfg,
                bundle.as_deref(),
                !no_histograms,
            )
        }
        Commands::Ratio { input, correlator, max_centrality_percent, output, out_dir, config } => {
            let overrides =
                AnalysisConfig { correlator, max_centrality_percent, ..Default::default() };
            let cfg = AnalysisConfig::resolve(config.as_deref(), overrides)?;
            cmd_ratio(&input, output.as_ref(), out_dir.as_deref(), &cfg)
        }
        Commands::Diff { input, minuend, subtrahend, output, csv } => {
            cmd_diff(&input, minuend, subtrahend, output.as_ref(), csv.as_deref())
        }
        Commands::Generate { output, events, seed } => cmd_generate(&output, events, seed),
        Commands::Config { command: ConfigCommands::Init { path, force } } => {
            cmd_config_init(&path, force)
        }
        Commands::Version => {
            println!("fdratio {}", fdr_core::VERSION);
            Ok(())
        }
    }
}

fn cmd_bootstrap(
    input: &Path,
    output: Option<&PathBuf>,
    out_dir: Option<&Path>,
    cfg: &AnalysisConfig,
    bundle_dir: Option<&Path>,
    with_histograms: bool,
) -> Result<()> {
    let plan = cfg.plan()?;
    let options = cfg.bootstrap_options();
    let intervals = cfg.intervals()?;
    set_threads(cfg.threads.unwrap_or(0));

    let mut wanted = plan.numerator_observables();
    wanted.push(plan.denominator_observable());
    let table = load_table(input, Some(wanted.as_slice()))?;

    let outcomes = run_for_all_bins(&table, &plan, &options)?;
    let mut artifact =
        BootstrapArtifact::build(&table, &outcomes, &plan, &options, intervals, with_histograms)?;
    artifact.meta.input = Some(input.display().to_string());
    tracing::info!(
        bins = artifact.bins.len(),
        skipped = artifact.bins.iter().filter(|b| b.skipped).count(),
        n_bootstrap = options.n_bootstrap,
        "bootstrap complete"
    );

    print_summary(&artifact);

    if let Some(dir) = out_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        fdr_viz::export::write_bootstrap_csv(&artifact, &dir.join("bootstrap.csv"))?;
        for g in &artifact.graphs {
            fdr_viz::export::write_graph_csv(g, &dir.join(format!("{}.csv", g.name)))?;
        }
        if !artifact.histograms.is_empty() {
            std::fs::write(
                dir.join("histograms.json"),
                serde_json::to_string_pretty(&artifact.histograms)?,
            )?;
        }
        tracing::info!(dir = %dir.display(), "tables written");
    }

    let value = serde_json::to_value(&artifact)?;
    if let Some(dir) = bundle_dir {
        bundle::write_bundle(dir, "bootstrap", serde_json::to_value(cfg)?, input, &value)?;
    }
    write_json(output, value)
}

fn cmd_ratio(
    input: &Path,
    output: Option<&PathBuf>,
    out_dir: Option<&Path>,
    cfg: &AnalysisConfig,
) -> Result<()> {
    let plan = cfg.plan()?;
    let max_pct =
        cfg.max_centrality_percent.unwrap_or(fdr_viz::graph::DEFAULT_MAX_CENTRALITY_PERCENT);
    let table = load_table(input, Some(Observable::all_for(plan.correlator).as_slice()))?;

    let artifact = RatioArtifact::build(&table, plan.correlator, max_pct)?;
    for r in &artifact.ratios {
        match &r.fit {
            Some(f) => tracing::info!(
                ratio = %r.graph.name,
                value = f.value,
                error = f.error,
                chi2 = f.chi2,
                ndf = f.ndf,
                "constant fit"
            ),
            None => tracing::warn!(ratio = %r.graph.name, "no points to fit"),
        }
    }

    if let Some(dir) = out_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        for r in &artifact.ratios {
            fdr_viz::export::write_ratio_csv(
                &r.graph,
                r.fit.as_ref(),
                &dir.join(format!("{}.csv", r.graph.name)),
            )?;
        }
    }

    write_json(output, serde_json::to_value(&artifact)?)
}

fn cmd_diff(
    input: &Path,
    minuend: Observable,
    subtrahend: Observable,
    output: Option<&PathBuf>,
    csv: Option<&Path>,
) -> Result<()> {
    let table = load_table(input, Some(&[minuend, subtrahend][..]))?;
    let artifact = DiffArtifact::build(&table, minuend, subtrahend)?;
    tracing::info!(points = artifact.difference.len(), "difference computed");
    if let Some(path) = csv {
        fdr_viz::export::write_graph_csv(&artifact.difference, path)?;
    }
    write_json(output, serde_json::to_value(&artifact)?)
}

fn cmd_generate(output: &Path, events: usize, seed: u64) -> Result<()> {
    let table = generate::synthetic_table(events, seed)?;
    fdr_io::write_event_table(&table, output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    tracing::info!(events, seed, path = %output.display(), "synthetic table written");
    Ok(())
}

fn cmd_config_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    std::fs::write(path, config::render_default_config(path)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    eprintln!("wrote {}", path.display());
    Ok(())
}

fn load_table(input: &Path, observables: Option<&[Observable]>) -> Result<EventTable> {
    let table = fdr_io::read_event_table(input, observables)
        .with_context(|| format!("failed to load {}", input.display()))?;
    tracing::info!(events = table.n_events(), path = %input.display(), "event table loaded");
    Ok(table)
}

fn set_threads(threads: usize) {
    if threads > 0 {
        // Best-effort; if a global pool already exists, keep going.
        let _ = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global();
    }
}

/// Human-readable per-bin table on stderr; stdout stays machine-readable.
fn print_summary(artifact: &BootstrapArtifact) {
    eprintln!(
        "{:<10} {:>8} {:<24} {:>12} {:>12} {:>12} {:>12}",
        "centrality", "events", "ratio", "value", "error", "ci_low", "ci_high"
    );
    for b in &artifact.bins {
        if b.skipped {
            eprintln!("{:<10} {:>8} {:<24}", b.centrality, b.n_events, "(skipped)");
            continue;
        }
        for r in &b.ratios {
            eprintln!(
                "{:<10} {:>8} {:<24} {:>12.6} {:>12.6} {:>12.6} {:>12.6}",
                b.centrality, b.n_events, r.label, r.ratio, r.error, r.ci_low, r.ci_high
            );
        }
    }
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
