//! # PDF Optimizer - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing` (su stderr)
//! - Caricamento della configurazione e applicazione degli override CLI
//! - Avvio dell'orchestratore e scrittura del documento ottimizzato
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (input, quality, strategy, output, etc.)
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose)
//! 3. Carica la Config (file di default o `--config`) e applica gli override
//! 4. Costruisce la strategia e l'orchestratore
//! 5. Seleziona il documento, ottimizza, scrive l'output
//!
//! ## Esempio di utilizzo:
//! ```bash
//! pdf-optimizer report.pdf --quality aggressive --strategy library --verbose
//! pdf-optimizer scan.pdf --worker gs-worker --worker-arg --threads --worker-arg 2 --json
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

use pdf_optimizer::file_manager::FileManager;
use pdf_optimizer::json_output::JsonMessage;
use pdf_optimizer::optimizer::{self, ProgressReporter, ReportMode};
use pdf_optimizer::{quality, Config, OptimizeError, QualityTier, StrategyChoice, VerificationStatus};

#[derive(Parser)]
#[command(name = "pdf-optimizer")]
#[command(about = "Reduce PDF size with a remote backend, a worker process or a local library")]
struct Args {
    /// PDF document to optimize
    input: PathBuf,

    /// Quality tier (maximum, balanced, aggressive)
    #[arg(short, long)]
    quality: Option<String>,

    /// Compression strategy
    #[arg(short, long, value_enum)]
    strategy: Option<StrategyChoice>,

    /// Output file (default: next to the input, with a suggested name)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Configuration file (default: user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL of the compression backend
    #[arg(long)]
    remote_url: Option<String>,

    /// Worker program to spawn for the worker strategy
    #[arg(long)]
    worker: Option<String>,

    /// Argument passed to the worker program (repeatable)
    #[arg(long = "worker-arg", allow_hyphen_values = true)]
    worker_args: Vec<String>,

    /// Output progress and status as JSON lines
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Save the effective configuration and continue
    #[arg(long)]
    save_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; stdout is reserved for JSON output
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let json = args.json;
    if let Err(e) = run(args).await {
        if json {
            match e.downcast_ref::<OptimizeError>() {
                Some(err) => JsonMessage::from_error(err).emit(),
                None => JsonMessage::error(e.to_string(), e.chain().nth(1).map(|c| c.to_string())).emit(),
            }
        }
        return Err(e);
    }

    Ok(())
}

async fn load_config(args: &Args) -> Result<(Config, Option<PathBuf>)> {
    let path = args.config.clone().or_else(Config::default_path);
    let mut config = match &path {
        Some(path) => Config::from_file(path).await?,
        None => Config::default(),
    };

    if let Some(url) = &args.remote_url {
        config.remote_url = url.clone();
    }
    if let Some(worker) = &args.worker {
        config.worker_program = Some(worker.clone());
        config.worker_args = args.worker_args.clone();
        config.strategy = StrategyChoice::Worker;
    }
    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }
    config.json_output |= args.json;

    config.validate()?;
    Ok((config, path))
}

async fn run(args: Args) -> Result<()> {
    let (config, config_path) = load_config(&args).await?;

    if args.save_config {
        let path = config_path
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No configuration directory available; pass --config"))?;
        config.save_to_file(path).await?;
        info!("💾 Configuration saved to {}", path.display());
    }

    let tier: QualityTier = match &args.quality {
        Some(name) => quality::lookup_or_balanced(name).tier,
        None => config.default_tier(),
    };

    let source = FileManager::read_source(&args.input, config.max_source_bytes).await?;
    let orchestrator = optimizer::build_orchestrator(&config).await?;
    orchestrator.select_artifact(source.bytes, source.name, source.media_type)?;
    let estimate = orchestrator.estimate(tier)?;

    if config.json_output {
        JsonMessage::start(args.input.clone(), estimate, orchestrator.strategy_kind()).emit();
    } else {
        info!(
            "📄 Input: {} ({})",
            args.input.display(),
            FileManager::format_size(estimate.original_bytes)
        );
        info!("🎚️ Quality: {}", quality::describe(tier).label);
        info!(
            "🔮 Expected size: {} - {} ({}-{}% reduction)",
            FileManager::format_size(estimate.low_bytes),
            FileManager::format_size(estimate.high_bytes),
            estimate.min_reduction_percent,
            estimate.max_reduction_percent
        );
    }

    let mode = if config.json_output {
        ReportMode::Json
    } else {
        ReportMode::Bar
    };
    let reporter = ProgressReporter::spawn(orchestrator.subscribe_progress(), mode);

    let result = tokio::select! {
        result = orchestrator.optimize(tier) => result,
        _ = tokio::signal::ctrl_c() => {
            orchestrator.clear();
            Err(OptimizeError::Cancelled)
        }
    };

    let stats = match result {
        Ok(stats) => stats,
        Err(e) => {
            reporter.abandon(&format!("❌ {}", e));
            return Err(e.into());
        }
    };

    let artifact = orchestrator.download_last()?;
    let output = FileManager::output_path(&args.input, args.output.as_deref(), &artifact.file_name);
    FileManager::write_output(&output, &artifact.bytes).await?;
    reporter.finish(&stats.format_summary());

    if config.json_output {
        JsonMessage::complete(output, stats).emit();
    } else {
        info!("✅ Saved {}", output.display());
        info!("📊 {}", stats.format_summary());
        if stats.verification_status == VerificationStatus::Unknown {
            warn!("⚠️ Output was not verified by the {} strategy", stats.strategy);
        }
    }

    Ok(())
}
