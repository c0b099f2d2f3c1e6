// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use classload_core::config::{yaml_to_json, DATA_ROOT_ENV};
use classload_core::{DataLoader, DatasetGenerator, DatasetKind, DatasetSplits, Metrics, RunConfig};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// classload – dataset loaders and augmentation pipelines for image classification
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Iterate the train, train_val and val loaders and report throughput
    Run {
        /// Path to a YAML (or JSON) run config
        #[arg(short, long)]
        config: PathBuf,

        /// Number of passes over the training loader
        #[arg(long, default_value_t = 1)]
        epochs: u64,

        /// Stop each loader after this many batches
        #[arg(long)]
        max_batches: Option<usize>,

        /// Override reader.num_workers ("auto" = one per core)
        #[arg(long)]
        workers: Option<String>,

        /// Skip the two evaluation loaders
        #[arg(long)]
        train_only: bool,
    },
    /// Validate a run config without opening any data
    Validate {
        #[arg(short, long)]
        config: PathBuf,

        /// Convert YAML to JSON and print it
        #[arg(long)]
        to_json: bool,
    },
    /// Open the splits and print their sizes, pipelines and steps per epoch
    Inspect {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List the supported datasets
    List,
    /// Write a small synthetic dataset in the layout the loaders read
    Generate {
        /// Run config naming the dataset and root
        #[arg(short, long, conflicts_with_all = ["dataset", "root"])]
        config: Option<PathBuf>,

        /// Dataset name, when no config is given
        #[arg(long, requires = "root")]
        dataset: Option<String>,

        /// Data root, when no config is given
        #[arg(long)]
        root: Option<PathBuf>,

        /// Training samples (per training folder for folder datasets)
        #[arg(long, default_value_t = 64)]
        train: usize,

        /// Evaluation samples
        #[arg(long, default_value_t = 16)]
        eval: usize,

        /// Distinct classes to emit (capped by the dataset)
        #[arg(long)]
        classes: Option<usize>,

        /// Skip generation if the dataset directory already exists
        #[arg(long)]
        skip_existing: bool,
    },
    /// Write one batch of a split to an .npz archive
    Export {
        #[arg(short, long)]
        config: PathBuf,

        #[arg(long, value_enum, default_value_t = SplitArg::Train)]
        split: SplitArg,

        /// Batch number within the epoch
        #[arg(long, default_value_t = 0)]
        batch: usize,

        #[arg(long, default_value_t = 0)]
        epoch: u64,

        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SplitArg {
    Train,
    TrainVal,
    Val,
}

fn main() -> Result<()> {
    // Load .env early so CLASSLOAD_DATA_ROOT can come from it
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let log_level = if args.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("classload={}", log_level))
        .init();

    info!("classload v{} starting", env!("CARGO_PKG_VERSION"));

    match args.command {
        Commands::Run { config, epochs, max_batches, workers, train_only } => {
            run(&config, epochs, max_batches, workers.as_deref(), train_only)
        }
        Commands::Validate { config, to_json } => validate(&config, to_json),
        Commands::Inspect { config } => inspect(&config),
        Commands::List => {
            list();
            Ok(())
        }
        Commands::Generate { config, dataset, root, train, eval, classes, skip_existing } => {
            generate(config.as_deref(), dataset.as_deref(), root, train, eval, classes, skip_existing)
        }
        Commands::Export { config, split, batch, epoch, output } => export(&config, split, batch, epoch, &output),
    }
}

/// Parse a config file and apply the environment's data root override.
fn load_config(path: &Path) -> Result<RunConfig> {
    info!("Loading run config from: {:?}", path);
    let config = RunConfig::from_yaml_file(path)?;
    let config = match std::env::var(DATA_ROOT_ENV) {
        Ok(root) if !root.is_empty() => {
            info!("{} overrides dataset.root with {}", DATA_ROOT_ENV, root);
            config.with_data_root(root)
        }
        _ => config,
    };
    config.validate().with_context(|| format!("Invalid config {:?}", path))?;
    Ok(config)
}

fn parse_workers(value: &str) -> Result<usize> {
    if value.eq_ignore_ascii_case("auto") {
        return Ok(num_cpus::get());
    }
    value.parse().with_context(|| format!("--workers expects a number or \"auto\", got {:?}", value))
}

/// Drain up to `max_batches` batches of one loader epoch into `metrics`.
fn drain(loader: &DataLoader, epoch: u64, max_batches: Option<usize>, metrics: &mut Metrics) -> Result<()> {
    let start = Instant::now();
    let mut last = Instant::now();
    for batch in loader.iter(epoch).take(max_batches.unwrap_or(usize::MAX)) {
        let batch = batch?;
        metrics.record_batch(batch.len(), last.elapsed());
        last = Instant::now();
    }
    metrics.record_total_time(start.elapsed());
    Ok(())
}

fn run(path: &Path, epochs: u64, max_batches: Option<usize>, workers: Option<&str>, train_only: bool) -> Result<()> {
    let mut config = load_config(path)?;
    if let Some(workers) = workers {
        config.reader.num_workers = parse_workers(workers)?;
    }
    let splits = DatasetSplits::build(&config)?;
    println!(
        "{}: {} classes, {} steps per epoch",
        splits.spec.kind, splits.num_classes, splits.num_steps_per_epoch
    );

    let mut train = Metrics::new();
    for epoch in 0..epochs {
        let mut metrics = Metrics::new();
        drain(&splits.train, epoch, max_batches, &mut metrics)
            .with_context(|| format!("train loader failed in epoch {}", epoch))?;
        info!(epoch, batches = metrics.batches, "epoch finished");
        train.merge(&metrics);
    }
    train.print_summary("train");

    if !train_only {
        for (name, loader) in [("train_val", &splits.train_val), ("val", &splits.val)] {
            let mut metrics = Metrics::new();
            drain(loader, 0, max_batches, &mut metrics).with_context(|| format!("{} loader failed", name))?;
            metrics.print_summary(name);
        }
    }
    Ok(())
}

fn validate(path: &Path, to_json: bool) -> Result<()> {
    if to_json {
        let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read config file {:?}", path))?;
        println!("{}", yaml_to_json(&text)?);
    }
    let config = load_config(path)?;
    let spec = config.kind()?.spec();
    println!("✅ {:?} is valid", path);
    println!("  Dataset: {} ({} classes, {}x{}x{})", spec.kind, spec.num_classes, spec.num_channels, spec.img_size, spec.img_size);
    println!("  Data dir: {:?}", spec.locate(config.data_root()));
    println!("  Batch size: {} (eval {})", config.reader.batch_size, config.val_batch_size());
    if let Some(size) = config.train_size() {
        println!("  Training subset: {} samples", size);
    }
    Ok(())
}

fn inspect(path: &Path) -> Result<()> {
    let config = load_config(path)?;
    let splits = DatasetSplits::build(&config)?;
    let spec = &splits.spec;
    println!("Dataset:      {}", spec.kind);
    println!("Classes:      {}", splits.num_classes);
    println!("Image:        {}x{}x{}", spec.num_channels, spec.img_size, spec.img_size);
    println!("Steps/epoch:  {}", splits.num_steps_per_epoch);
    for (name, loader) in [("train", &splits.train), ("train_val", &splits.train_val), ("val", &splits.val)] {
        println!(
            "{:<10} {:>8} samples  {:>6} batches of {:<4} shuffle={} pipeline={}",
            name,
            loader.num_samples(),
            loader.len(),
            loader.batch_size(),
            loader.shuffle(),
            loader.dataset().pipeline()
        );
    }
    Ok(())
}

fn list() {
    println!("{:<14} {:>7} {:>5} {:>8}  {}", "dataset", "classes", "size", "channels", "source");
    for kind in DatasetKind::all() {
        let spec = kind.spec();
        println!(
            "{:<14} {:>7} {:>5} {:>8}  {:?}",
            spec.kind, spec.num_classes, spec.img_size, spec.num_channels, spec.source
        );
    }
}

fn generate(
    config: Option<&Path>,
    dataset: Option<&str>,
    root: Option<PathBuf>,
    train: usize,
    eval: usize,
    classes: Option<usize>,
    skip_existing: bool,
) -> Result<()> {
    let generator = match (config, dataset, root) {
        (Some(path), _, _) => DatasetGenerator::from_config(&load_config(path)?)?,
        (None, Some(name), Some(root)) => DatasetGenerator::new(name.parse::<DatasetKind>()?, root),
        _ => anyhow::bail!("generate needs either --config or both --dataset and --root"),
    };
    let mut generator = generator.with_counts(train, eval);
    if let Some(classes) = classes {
        generator = generator.with_classes(classes);
    }

    if skip_existing && generator.exists() {
        warn!("{:?} already holds the dataset, skipping generation", generator.target_dir());
        return Ok(());
    }

    let mut metrics = Metrics::new();
    generator.generate(&mut metrics)?;
    metrics.print_summary("generate");
    Ok(())
}

fn export(path: &Path, split: SplitArg, batch: usize, epoch: u64, output: &Path) -> Result<()> {
    let config = load_config(path)?;
    let splits = DatasetSplits::build(&config)?;
    let loader = match split {
        SplitArg::Train => &splits.train,
        SplitArg::TrainVal => &splits.train_val,
        SplitArg::Val => &splits.val,
    };
    if batch >= loader.len() {
        anyhow::bail!("{:?} has only {} batches", split, loader.len());
    }
    let order = loader.order(epoch);
    let start = batch * loader.batch_size();
    let end = (start + loader.batch_size()).min(order.len());
    let found = loader.load_batch(epoch, &order[start..end])?;
    classload_formats::write_batch(output, &found.images, &found.labels)?;
    println!("✅ wrote {} samples of shape {:?} to {:?}", found.len(), found.images.shape(), output);
    Ok(())
}
