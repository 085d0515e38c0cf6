//! histoxai CLI for splitting patch collections, training, evaluation and attribution.

mod config;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use burn::module::AutodiffModule;
use burn::prelude::*;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use histoxai_core::backend::{Autodiff, NdArray};
use histoxai_core::{BinaryClassifier, RunContext, Seed, Split};
use histoxai_data::{read_patches, stratified_split, PatchLoader, PatchLoaders, PatchSplits, SplitSizes};
use histoxai_explain::{
    grad_cam, insertion_deletion, integrated_gradients, occlusion_sensitivity, saliency, zero_baseline,
    AttributionMap, AttributionMethod, InsertionDeletionCurves,
};
use histoxai_models::{CheckpointMetadata, ModelCheckpoint, PatchCnn};
use histoxai_train::history::VALID_ACC;
use histoxai_train::{evaluate_binary, Trainer, BEST_MODEL_FILE, DECISION_THRESHOLD};

use config::{ExperimentConfig, CONFIG_FILE};

/// Backend for training and gradient-based attribution.
type TrainBackend = Autodiff<NdArray>;
/// Backend for forward-only work.
type InferBackend = NdArray;

const METADATA_FILE: &str = "best_model.json";
const HISTORY_FILE: &str = "history.json";
const SUMMARY_FILE: &str = "summary.json";

#[derive(Parser)]
#[command(name = "histoxai")]
#[command(author, version)]
#[command(about = "Train a histopathology patch classifier and explain its predictions")]
#[command(long_about = "histoxai: binary tumor classification on image patches with post-hoc attribution.

EXAMPLES:
  # Split an NPZ collection (x: [N,H,W,C] u8, y: [N] labels) into train/valid/test
  histoxai split --input pcam.npz --output data/ --train 8000 --valid 1000 --test 1000

  # Train with early stopping; writes config.json, best_model.mpk, history.json
  histoxai train --data data/ --output runs/baseline --epochs 20

  # Confusion matrix and per-class report on the test split
  histoxai eval --data data/ --run runs/baseline

  # Attribution maps and insertion/deletion curves for one test patch
  histoxai explain --data data/ --run runs/baseline --index 12 --output out/")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stratified train/valid/test split of an NPZ patch collection
    Split(SplitArgs),
    /// Train the patch classifier
    Train(TrainArgs),
    /// Evaluate a trained run on one split
    Eval(EvalArgs),
    /// Compute attribution maps for one patch
    Explain(ExplainArgs),
}

#[derive(Args)]
struct SplitArgs {
    /// NPZ archive with `x` and `y`
    #[arg(long, value_name = "FILE")]
    input: PathBuf,

    /// Directory for train.npz, valid.npz, test.npz and splits.json
    #[arg(long, value_name = "DIR")]
    output: PathBuf,

    /// Training samples
    #[arg(long, default_value = "8000", value_name = "N")]
    train: usize,

    /// Validation samples
    #[arg(long, default_value = "1000", value_name = "N")]
    valid: usize,

    /// Test samples
    #[arg(long, default_value = "1000", value_name = "N")]
    test: usize,

    /// Random seed for the split assignment
    #[arg(long, default_value = "42", value_name = "SEED")]
    seed: u64,
}

#[derive(Args)]
struct TrainArgs {
    /// Directory written by `histoxai split`
    #[arg(long, value_name = "DIR")]
    data: PathBuf,

    /// Run directory for checkpoints and logs
    #[arg(long, default_value = "./runs", value_name = "DIR")]
    output: PathBuf,

    /// Experiment config (JSON); flags override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum number of epochs
    #[arg(long, value_name = "N")]
    epochs: Option<usize>,

    /// Learning rate for Adam
    #[arg(long, value_name = "LR")]
    lr: Option<f64>,

    /// Batch size
    #[arg(long, value_name = "SIZE")]
    batch_size: Option<usize>,

    /// Epochs without validation improvement before stopping (0 disables)
    #[arg(long, value_name = "N")]
    patience: Option<usize>,

    /// Random seed
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,
}

#[derive(Args)]
struct EvalArgs {
    /// Directory written by `histoxai split`
    #[arg(long, value_name = "DIR")]
    data: PathBuf,

    /// Run directory written by `histoxai train`
    #[arg(long, value_name = "DIR")]
    run: PathBuf,

    /// Split to evaluate
    #[arg(long, default_value = "test")]
    split: Split,

    /// Batch size (defaults to the run's)
    #[arg(long, value_name = "SIZE")]
    batch_size: Option<usize>,
}

#[derive(Args)]
struct ExplainArgs {
    /// Directory written by `histoxai split`
    #[arg(long, value_name = "DIR")]
    data: PathBuf,

    /// Run directory written by `histoxai train`
    #[arg(long, value_name = "DIR")]
    run: PathBuf,

    /// Index of the patch inside the split
    #[arg(long, value_name = "I")]
    index: usize,

    /// Split holding the patch
    #[arg(long, default_value = "test")]
    split: Split,

    /// Directory for the .npy maps and summary.json
    #[arg(long, value_name = "DIR")]
    output: PathBuf,

    /// Integrated gradients path steps
    #[arg(long, value_name = "N")]
    steps: Option<usize>,

    /// Occlusion patch size
    #[arg(long, value_name = "PX")]
    patch_size: Option<usize>,

    /// Occlusion stride
    #[arg(long, value_name = "PX")]
    stride: Option<usize>,

    /// Insertion/deletion fraction steps
    #[arg(long, value_name = "N")]
    benchmark_steps: Option<usize>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    match cli.command {
        Commands::Split(args) => handle_split(args),
        Commands::Train(args) => handle_train(args),
        Commands::Eval(args) => handle_eval(args),
        Commands::Explain(args) => handle_explain(args),
    }
}

fn handle_split(args: SplitArgs) -> Result<()> {
    let dataset = read_patches(&args.input).with_context(|| format!("Failed to read {}", args.input.display()))?;
    let [negative, positive] = dataset.class_counts();
    println!("Loaded {} patches of shape {}", dataset.len(), dataset.image_shape());
    println!("  Negative: {}", negative);
    println!("  Positive: {}", positive);
    println!();

    let sizes = SplitSizes::new(args.train, args.valid, args.test);
    let splits = stratified_split(&dataset, sizes, Seed::new(args.seed)).context("Failed to split dataset")?;
    splits
        .save(&args.output)
        .with_context(|| format!("Failed to write splits to {}", args.output.display()))?;

    println!("{:<8} {:>8} {:>10} {:>10}", "Split", "Samples", "Negative", "Positive");
    println!("{}", "-".repeat(39));
    for split in Split::ALL {
        let part = splits.get(split);
        let [negative, positive] = part.class_counts();
        println!("{:<8} {:>8} {:>10} {:>10}", split.to_string(), part.len(), negative, positive);
    }
    println!("\nSaved splits to {:?}", args.output);

    Ok(())
}

fn handle_train(args: TrainArgs) -> Result<()> {
    let mut config = ExperimentConfig::load_or_default(args.config.as_deref())?;
    if let Some(epochs) = args.epochs {
        config.trainer.n_epochs = epochs;
    }
    if let Some(lr) = args.lr {
        config.trainer.lr = lr;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(patience) = args.patience {
        config.trainer.patience = patience;
    }
    if let Some(seed) = args.seed {
        config.seed = Seed::new(seed);
    }
    config.trainer.checkpoint_dir = Some(args.output.clone());

    let splits =
        PatchSplits::load(&args.data).with_context(|| format!("Failed to load splits from {}", args.data.display()))?;
    let shape = splits.train().image_shape();
    config.model.in_channels = shape.channels();

    println!("=== histoxai Training ===\n");
    println!("Configuration:");
    println!("  Patches: {}", shape);
    println!("  Train samples: {}", splits.train().len());
    println!("  Valid samples: {}", splits.valid().len());
    println!("  Epochs: {}", config.trainer.n_epochs);
    println!("  Learning rate: {}", config.trainer.lr);
    println!("  Batch size: {}", config.batch_size);
    println!("  Patience: {}", config.trainer.patience);
    println!("  Seed: {}", config.seed.value());
    println!("  Output: {:?}\n", args.output);

    std::fs::create_dir_all(&args.output)?;
    config.save(args.output.join(CONFIG_FILE))?;

    let ctx = RunContext::<TrainBackend>::new(Default::default(), config.seed);
    ctx.seed_backend();

    let dls = PatchLoaders::builder(splits.train().clone(), splits.valid().clone())
        .batch_size(config.batch_size)
        .seed(ctx.seed())
        .build()
        .context("Failed to create data loaders")?;

    let model = config.model.init::<TrainBackend>(ctx.device());
    tracing::info!(params = model.num_params(), "initialized PatchCnn");

    println!("Model configuration:");
    println!("  Architecture: PatchCnn");
    println!("  Stage channels: {:?}", config.model.channels);
    println!("  Pooled size: {}x{}", config.model.pooled_size, config.model.pooled_size);
    println!("  Hidden units: {}", config.model.hidden);
    println!("  Dropout: {}", config.model.dropout);
    println!("  Parameters: {}\n", model.num_params());

    let trainer = Trainer::<TrainBackend>::new(config.trainer.clone(), ctx.device().clone());

    println!("Starting training...\n");
    let output = trainer
        .fit_with_forward(model, &dls, |m, x| m.forward(x), |m, x| m.forward(x))
        .context("Training failed")?;

    output.history.save(args.output.join(HISTORY_FILE))?;

    let mut metadata = CheckpointMetadata::new(config.model.clone());
    if let Some(epoch) = output.best_epoch {
        metadata = metadata.with_epoch(epoch).with_valid_loss(output.best_valid_loss);
        if let Some(&acc) = output.history.get(VALID_ACC).and_then(|accs| accs.get(epoch)) {
            metadata = metadata.with_valid_acc(acc);
        }
    }
    metadata.save(args.output.join(METADATA_FILE))?;

    println!("\nTraining complete!");
    match output.best_epoch {
        Some(epoch) => println!("  Best epoch: {} (valid loss {:.4})", epoch + 1, output.best_valid_loss),
        None => println!("  No epoch improved the validation loss"),
    }
    if let Some(acc) = metadata.valid_acc {
        println!("  Valid accuracy at best epoch: {:.2}%", acc * 100.0);
    }
    if output.stopped_early {
        println!("  Stopped early after {} epochs", output.history.n_epochs());
    }
    println!("  Training time: {:.1}s", output.training_time_secs);
    println!("\nSaved run to {:?}", args.output);

    Ok(())
}

/// Config of a finished run, or defaults when the run has none.
fn run_config(run: &Path) -> Result<ExperimentConfig> {
    let path = run.join(CONFIG_FILE);
    if path.exists() {
        ExperimentConfig::load(path)
    } else {
        tracing::warn!(run = %run.display(), "run has no config file, using defaults");
        Ok(ExperimentConfig::default())
    }
}

/// Rebuild the best model of a run on backend `B`.
fn load_model<B: Backend>(run: &Path, device: &B::Device) -> Result<PatchCnn<B>> {
    let metadata = CheckpointMetadata::load(run.join(METADATA_FILE))
        .with_context(|| format!("Failed to read model metadata in {}", run.display()))?;
    tracing::info!(arch = %metadata.arch, epoch = ?metadata.epoch, "loading checkpoint");

    metadata
        .config
        .init::<B>(device)
        .load_checkpoint(run.join(BEST_MODEL_FILE), device)
        .with_context(|| format!("Failed to load checkpoint from {}", run.display()))
}

fn handle_eval(args: EvalArgs) -> Result<()> {
    let config = run_config(&args.run)?;
    let splits =
        PatchSplits::load(&args.data).with_context(|| format!("Failed to load splits from {}", args.data.display()))?;

    let device = Default::default();
    let model = load_model::<InferBackend>(&args.run, &device)?;

    let loader = PatchLoader::builder(splits.get(args.split).clone())
        .batch_size(args.batch_size.unwrap_or(config.batch_size))
        .split(args.split)
        .build()
        .context("Failed to create data loader")?;

    println!("Evaluating {:?} on {} split ({} samples)", args.run, args.split, loader.len());
    let result = evaluate_binary::<InferBackend, _, _>(&model, &loader, &device, |m, x| m.predict_proba(x))
        .context("Evaluation failed")?;

    result.print_report();
    match result.roc_auc() {
        Some(auc) => println!("{:<10} {:>44.4}", "ROC AUC", auc),
        None => println!("{:<10} {:>44}", "ROC AUC", "n/a"),
    }

    Ok(())
}

#[derive(Serialize)]
struct MethodSummary {
    method: AttributionMethod,
    file: String,
    insertion_auc: f32,
    deletion_auc: f32,
    curves: InsertionDeletionCurves,
}

#[derive(Serialize)]
struct ExplainSummary {
    split: Split,
    index: usize,
    label: u8,
    probability: f32,
    prediction: u8,
    methods: Vec<MethodSummary>,
}

fn handle_explain(args: ExplainArgs) -> Result<()> {
    let mut config = run_config(&args.run)?;
    if let Some(steps) = args.steps {
        config.integrated_gradients.n_steps = steps;
    }
    if let Some(patch_size) = args.patch_size {
        config.occlusion.patch_size = patch_size;
    }
    if let Some(stride) = args.stride {
        config.occlusion.stride = stride;
    }
    if let Some(steps) = args.benchmark_steps {
        config.benchmark.steps = steps;
    }

    let splits =
        PatchSplits::load(&args.data).with_context(|| format!("Failed to load splits from {}", args.data.display()))?;
    let dataset = splits.get(args.split);
    if args.index >= dataset.len() {
        bail!(
            "Index {} out of range for {} split with {} samples",
            args.index,
            args.split,
            dataset.len()
        );
    }
    let label = dataset.label(args.index)?;

    let device = Default::default();
    let model = load_model::<TrainBackend>(&args.run, &device)?;
    let frozen = model.valid();

    let image = dataset.image_tensor::<TrainBackend>(args.index, &device)?;
    let plain_image = dataset.image_tensor::<InferBackend>(args.index, &device)?;
    let [c, h, w] = plain_image.dims();

    let probability: f32 = frozen
        .predict_proba(plain_image.clone().reshape([1, c, h, w]))
        .into_scalar()
        .elem();
    let prediction = u8::from(probability > DECISION_THRESHOLD);
    println!(
        "Patch {} of {} split: label {}, p(tumor) = {:.4}, predicted {}",
        args.index, args.split, label, probability, prediction
    );

    let maps: Vec<AttributionMap<InferBackend>> = vec![
        grad_cam(&model, image.clone()).context("Grad-CAM failed")?,
        saliency(&model, image.clone()).context("Saliency failed")?,
        occlusion_sensitivity(&frozen, plain_image.clone(), &config.occlusion).context("Occlusion failed")?,
        integrated_gradients(
            &model,
            image,
            zero_baseline::<TrainBackend>([c, h, w], &device),
            &config.integrated_gradients,
        )
        .context("Integrated gradients failed")?,
    ];

    std::fs::create_dir_all(&args.output)?;

    println!("\n{:<22} {:>14} {:>14}", "Method", "Insertion AUC", "Deletion AUC");
    println!("{}", "-".repeat(52));

    let mut methods = Vec::with_capacity(maps.len());
    for map in &maps {
        let file = format!("{}.npy", map.method.name());
        map.save_npy(args.output.join(&file))
            .with_context(|| format!("Failed to write {}", file))?;

        let curves = insertion_deletion(&frozen, plain_image.clone(), map, &config.benchmark)
            .with_context(|| format!("Benchmark failed for {}", map.method))?;
        println!(
            "{:<22} {:>14.4} {:>14.4}",
            map.method.to_string(),
            curves.insertion_auc(),
            curves.deletion_auc()
        );

        methods.push(MethodSummary {
            method: map.method,
            file,
            insertion_auc: curves.insertion_auc(),
            deletion_auc: curves.deletion_auc(),
            curves,
        });
    }

    let summary = ExplainSummary {
        split: args.split,
        index: args.index,
        label,
        probability,
        prediction,
        methods,
    };
    let summary_path = args.output.join(SUMMARY_FILE);
    std::fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)?;
    println!("\nSaved maps and summary to {:?}", args.output);

    Ok(())
}
