use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facematch::storage::{EmbeddingStore, FileStore, IdentityRecord};
use facematch::{config, matcher, Pipeline, VisionError};
use log::{error, info, warn};
use serde_json::json;

#[derive(Parser)]
#[command(name = "facematch")]
#[command(version, about = "Face verification by embedding similarity")]
struct Cli {
    /// Config file (defaults to the installed config)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a face image under a name, replacing any earlier enrollment
    Enroll {
        #[arg(short, long)]
        name: String,
        image: PathBuf,
    },
    /// Check whether an image matches an enrolled identity
    Verify {
        #[arg(short, long)]
        id: u64,
        image: PathBuf,
    },
    /// Find the closest enrolled identity for an image
    Identify { image: PathBuf },
    /// Show an enrolled identity
    Show {
        #[arg(short, long)]
        id: u64,
    },
    /// List enrolled identities
    List,
    /// Remove an enrolled identity
    Purge {
        #[arg(short, long)]
        id: u64,
    },
    /// Load the model and report its state
    Status,
    /// Open config file in editor
    Config,
}

fn main() -> ExitCode {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_target(false)
        .format_timestamp(None)
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            if let Some(vision) = e.downcast_ref::<VisionError>() {
                error!("{} ({}): {:#}", vision.kind(), vision.status_code(), e);
            } else {
                error!("{:#}", e);
            }
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let cfg = config::load_config(cli.config.as_deref())?;
    let store_dir = cfg.store_dir();

    match cli.command {
        Commands::Enroll { name, image } => {
            let pipeline = open_pipeline(&cfg)?;
            let store = FileStore::open(&store_dir)?;
            enroll(&pipeline, &store, &name, &image)
        }
        Commands::Verify { id, image } => {
            let pipeline = open_pipeline(&cfg)?;
            let store = FileStore::open(&store_dir)?;
            verify(&pipeline, &store, cfg.threshold, id, &image)
        }
        Commands::Identify { image } => {
            let pipeline = open_pipeline(&cfg)?;
            let store = FileStore::open(&store_dir)?;
            identify(&pipeline, &store, cfg.threshold, &image)
        }
        Commands::Show { id } => show(&FileStore::open(&store_dir)?, id),
        Commands::List => {
            let store = FileStore::open(&store_dir)?;
            let records: Vec<_> = store.list()?.iter().map(summary).collect();
            println!("{}", serde_json::to_string_pretty(&records)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Purge { id } => {
            let store = FileStore::open(&store_dir)?;
            if store.remove(id)? {
                info!("✓ Identity {} removed", id);
                Ok(ExitCode::SUCCESS)
            } else {
                warn!("Identity {} not found", id);
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Status => {
            let pipeline = Pipeline::new(cfg.session(), cfg.pixel_scale);
            let loaded = pipeline.warm_up();
            println!(
                "{}",
                json!({
                    "model": cfg.model_path,
                    "state": format!("{:?}", pipeline.state()),
                    "ready": pipeline.state().is_ready(),
                    "pixel_scale": pipeline.scale(),
                    "threshold": cfg.threshold,
                })
            );
            loaded?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config => open_config(cli.config.as_deref()),
    }
}

/// Serving without a model is meaningless: load it up front and bail out.
fn open_pipeline(cfg: &config::Config) -> Result<Pipeline> {
    let pipeline = Pipeline::new(cfg.session(), cfg.pixel_scale);
    pipeline
        .warm_up()
        .context("Failed to initialize face recognition model")?;
    Ok(pipeline)
}

fn read_image(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading image {}", path.display()))
}

fn summary(record: &IdentityRecord) -> serde_json::Value {
    json!({
        "user_id": record.id,
        "name": record.name,
        "embedding_length": record.embedding.len(),
        "pixel_scale": record.pixel_scale,
    })
}

fn enroll(pipeline: &Pipeline, store: &FileStore, name: &str, image: &Path) -> Result<ExitCode> {
    info!("Enrolling: {}", name);
    let embedding = pipeline.embed(&read_image(image)?)?;
    if embedding.is_zero() {
        warn!("Embedding for {} is degenerate, it will never match", name);
    }

    let record = store
        .save(name, &embedding, pipeline.scale())
        .context("Failed to save face record")?;

    info!("✓ Face enrolled for {} (id {})", record.name, record.id);
    println!("{}", summary(&record));
    Ok(ExitCode::SUCCESS)
}

fn verify(
    pipeline: &Pipeline,
    store: &FileStore,
    threshold: f32,
    id: u64,
    image: &Path,
) -> Result<ExitCode> {
    let Some(record) = store.fetch_by_id(id)? else {
        warn!("Identity {} not found", id);
        return Ok(ExitCode::FAILURE);
    };

    let query = pipeline.generate_embedding(&read_image(image)?)?;
    let outcome = matcher::compare_record(&record, &query, pipeline.scale(), threshold)?;

    info!(
        "Match score: {:.3} (threshold: {:.3})",
        outcome.similarity, outcome.threshold
    );
    println!(
        "{}",
        json!({
            "user_id": record.id,
            "name": record.name,
            "similarity": outcome.similarity,
            "threshold": outcome.threshold,
            "matched": outcome.matched,
        })
    );

    if outcome.matched {
        info!("✓ Same person");
        Ok(ExitCode::SUCCESS)
    } else {
        info!("✗ Different person");
        Ok(ExitCode::FAILURE)
    }
}

fn identify(
    pipeline: &Pipeline,
    store: &FileStore,
    threshold: f32,
    image: &Path,
) -> Result<ExitCode> {
    let records = store.list().context("Failed to load face records")?;
    if records.is_empty() {
        anyhow::bail!("No enrolled identities. Run 'enroll' first.");
    }
    info!("Comparing against {} enrolled identities", records.len());

    let query = pipeline.generate_embedding(&read_image(image)?)?;
    let best = matcher::best_match(&records, &query, pipeline.scale(), threshold)?;

    match best {
        Some((record, outcome)) if outcome.matched => {
            info!("✓ Identified as {} ({:.3})", record.name, outcome.similarity);
            println!(
                "{}",
                json!({
                    "user_id": record.id,
                    "name": record.name,
                    "similarity": outcome.similarity,
                })
            );
            Ok(ExitCode::SUCCESS)
        }
        Some((_, outcome)) => {
            info!("✗ No identity above threshold (best {:.3})", outcome.similarity);
            Ok(ExitCode::FAILURE)
        }
        None => Ok(ExitCode::FAILURE),
    }
}

fn show(store: &FileStore, id: u64) -> Result<ExitCode> {
    match store.fetch_by_id(id)? {
        Some(record) => {
            println!("{}", summary(&record));
            Ok(ExitCode::SUCCESS)
        }
        None => {
            warn!("Identity {} not found", id);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn open_config(path: Option<&Path>) -> Result<ExitCode> {
    let config_path = path.unwrap_or(&config::CONFIG_PATH);
    if !config_path.exists() {
        config::save_config(&config::Config::default(), Some(config_path))?;
    }
    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

    info!("Opening config file: {:?}", config_path);

    let status = std::process::Command::new(editor)
        .arg(config_path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        anyhow::bail!("Editor exited with non-zero status");
    }

    Ok(ExitCode::SUCCESS)
}
