//! Mango Leaf Classifier CLI
//!
//! Classifies mango leaf photos, renders saliency heatmaps and manages the
//! local prediction history.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;
use uuid::Uuid;

use mango_classifier::backend::{backend_name, default_device, AnalysisBackend};
use mango_classifier::classes::{is_healthy_class, CLASS_NAMES};
use mango_classifier::config::AppConfig;
use mango_classifier::history::HistoryStore;
use mango_classifier::inference::{decode_data_url, encode_data_url, load_image, Analyzer};
use mango_classifier::model::{ClassifierLoader, LeafClassifier, LeafClassifierConfig, RecordLoader};
use mango_classifier::utils::format_progress_bar;
use mango_classifier::utils::logging::{init_logging, LogConfig};

/// Mango Leaf Disease Classification
///
/// Classifies mango leaf photos into seven diseases or healthy, and shows
/// which regions of the photo drove the prediction.
#[derive(Parser, Debug)]
#[command(name = "mango-classifier")]
#[command(version)]
#[command(about = "Mango leaf disease classification with saliency heatmaps", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false", global = true)]
    verbose: bool,

    /// Path to a JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify a leaf photo
    Predict {
        /// Path to the input image
        #[arg(short, long)]
        image: PathBuf,

        /// Path to the trained model (overrides the config file)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Skip saliency heatmap generation
        #[arg(long, default_value = "false")]
        no_heatmap: bool,

        /// Heatmap overlay opacity (0.0-1.0)
        #[arg(long)]
        alpha: Option<f32>,

        /// Write the heatmap overlay to this PNG file
        #[arg(long)]
        heatmap_out: Option<PathBuf>,

        /// Store the prediction in the history
        #[arg(long, default_value = "false")]
        save: bool,

        /// Print the result as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Manage saved predictions
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// List the classes the model predicts
    Classes,
}

#[derive(Subcommand, Debug)]
enum HistoryAction {
    /// List saved predictions, newest first
    List {
        /// Hide diseases at or below this likelihood
        #[arg(long)]
        min_likelihood: Option<f32>,
    },

    /// Delete a saved prediction
    Delete {
        /// Prediction id
        pred_id: Uuid,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None => AppConfig::default(),
    };

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::from_level_name(&config.log_level)
    };

    let _ = init_logging(&log_config);

    let json_output = matches!(cli.command, Commands::Predict { json: true, .. });
    if !json_output {
        print_banner();
    }

    match cli.command {
        Commands::Predict {
            image,
            model,
            no_heatmap,
            alpha,
            heatmap_out,
            save,
            json,
        } => {
            let mut config = config;
            if let Some(model) = model {
                config.model.path = model;
            }
            if no_heatmap {
                config.heatmap.enabled = false;
            }
            if let Some(alpha) = alpha {
                config.heatmap.alpha = alpha;
            }
            config.validate()?;

            cmd_predict(&config, &image, heatmap_out.as_deref(), save, json)?;
        }

        Commands::History { action } => match action {
            HistoryAction::List { min_likelihood } => {
                let threshold = min_likelihood.unwrap_or(config.history.min_likelihood);
                cmd_history_list(&config.history.path, threshold)?;
            }
            HistoryAction::Delete { pred_id } => {
                cmd_history_delete(&config.history.path, pred_id)?;
            }
        },

        Commands::Classes => cmd_classes(),
    }

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        r#"
 ╔══════════════════════════════════════════════════════════╗
 ║   🥭 Mango Leaf Classifier                               ║
 ║   Disease detection with saliency heatmaps, Burn + Rust  ║
 ╚══════════════════════════════════════════════════════════╝
  "#
        .green()
    );
}

fn cmd_predict(
    config: &AppConfig,
    image_path: &Path,
    heatmap_out: Option<&Path>,
    save: bool,
    json: bool,
) -> Result<()> {
    info!("Running prediction");
    info!("  Image: {:?}", image_path);
    info!("  Model: {:?}", config.model.path);

    if !json {
        println!("{}", "Prediction Configuration:".cyan().bold());
        println!("  📷 Image:   {}", image_path.display());
        println!("  🧠 Model:   {}", config.model.path.display());
        println!("  🖥️  Backend: {}", backend_name());
        println!(
            "  🔥 Heatmap: {}",
            if config.heatmap.enabled {
                format!("on (alpha {:.2})", config.heatmap.alpha)
            } else {
                "off".to_string()
            }
        );
        println!();
    }

    let image = load_image(image_path)?;

    let device = default_device();
    let loader = RecordLoader::new(&config.model.path)
        .with_config(LeafClassifierConfig::mango().with_input_size(config.model.input_size));
    let model: LeafClassifier<AnalysisBackend> =
        ClassifierLoader::<AnalysisBackend>::load(&loader, &device)
            .with_context(|| format!("Failed to load model from {:?}", config.model.path))?;

    let analyzer = Analyzer::new(model, device).with_config(config.analysis_config());
    let result = analyzer.analyze(&image)?;

    if let Some(out) = heatmap_out {
        match &result.heatmap_url {
            Some(url) => {
                decode_data_url(url)?.save(out)?;
                info!("Heatmap written to {:?}", out);
            }
            None if !json => println!(
                "{} No heatmap was produced, nothing written to {}",
                "Note:".yellow(),
                out.display()
            ),
            None => {}
        }
    }

    let saved_id = if save {
        let mut store = HistoryStore::open(&config.history.path)?;
        Some(store.save(&encode_data_url(&image)?, &result.ranked)?)
    } else {
        None
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let verdict = if is_healthy_class(result.predicted_class) {
        result.class_name.green().bold()
    } else {
        result.class_name.red().bold()
    };
    println!("{} {}", "Prediction:".cyan().bold(), verdict);
    println!("  Confidence: {:.2}%", result.confidence * 100.0);
    println!("  Inference:  {:.2} ms", result.inference_time_ms);
    println!();

    println!("{}", "Class Probabilities:".cyan().bold());
    for entry in &result.ranked {
        println!(
            "  {:18} {}",
            entry.class_name,
            format_progress_bar(entry.probability as f64, 30)
        );
    }
    println!();

    if let Some(out) = heatmap_out.filter(|_| result.heatmap_url.is_some()) {
        println!("{} Heatmap saved to {}", "✓".green(), out.display());
    }
    if let Some(id) = saved_id {
        println!("{} Saved to history as {}", "✓".green(), id);
    }

    Ok(())
}

fn cmd_history_list(path: &Path, min_likelihood: f32) -> Result<()> {
    let store = HistoryStore::open(path)?;
    let entries = store.results(min_likelihood);

    if entries.is_empty() {
        println!("{}", "No saved predictions.".yellow());
        return Ok(());
    }

    println!(
        "{} ({} saved, likelihood > {:.2})",
        "Prediction History:".cyan().bold(),
        entries.len(),
        min_likelihood
    );
    println!();

    for entry in &entries {
        println!(
            "  {} {}",
            entry.prediction.pred_id.to_string().bold(),
            entry
                .prediction
                .predicted_at
                .format("%Y-%m-%d %H:%M:%S UTC")
                .to_string()
                .dimmed()
        );
        if entry.diseases.is_empty() {
            println!("    (no class above threshold)");
        }
        for disease in &entry.diseases {
            println!(
                "    {:18} {:>6.2}%",
                disease.disease_name,
                disease.likelihood_score * 100.0
            );
        }
    }

    Ok(())
}

fn cmd_history_delete(path: &Path, pred_id: Uuid) -> Result<()> {
    let mut store = HistoryStore::open(path)?;
    store.delete(pred_id)?;
    println!("{} Deleted prediction {}", "✓".green(), pred_id);
    Ok(())
}

fn cmd_classes() {
    println!("{}", "Classes:".cyan().bold());
    for (idx, name) in CLASS_NAMES.iter().enumerate() {
        println!("  {:>2}  {}", idx, name);
    }
}
