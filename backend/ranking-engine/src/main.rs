use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use ranking_engine::config::RankingConfig;
use ranking_engine::models::{FeedbackEvent, UserProfile};
use ranking_engine::services::pipeline::parse_pool;
use ranking_engine::services::weights::repository::load_or_default;
use ranking_engine::services::weights::{
    JsonFileWeightRepository, SharedWeightStore, WeightAdjuster, WeightKey, WeightRepository,
};
use ranking_engine::RankingPipeline;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(
    name = "ranking-engine",
    version,
    about = "Personalized content ranking and adaptive weight tuning"
)]
struct Cli {
    /// Weight store file (overrides RANKING_WEIGHTS_PATH)
    #[arg(long, global = true)]
    weights: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Select and rank a candidate pool
    Rank {
        /// JSON array of candidate items
        #[arg(long)]
        pool: PathBuf,
        /// JSON user profile
        #[arg(long)]
        profile: Option<PathBuf>,
    },
    /// Tune weights from a batch of feedback events
    Adjust {
        /// JSON array of feedback events
        #[arg(long)]
        events: PathBuf,
        /// Compute the report without persisting
        #[arg(long)]
        dry_run: bool,
    },
    /// Boost one weight after a confirmed-positive signal
    Reinforce {
        /// Weight key, e.g. source:hn or section:must_read
        #[arg(long)]
        key: String,
        #[arg(long, default_value = "confirmed positive feedback")]
        reason: String,
    },
    /// Restore every weight to its default
    Reset {
        #[arg(long, default_value = "operator reset")]
        reason: String,
    },
    /// Print the weight audit log
    Audit {
        /// Only records for this key
        #[arg(long)]
        key: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = RankingConfig::from_env().context("Failed to load configuration")?;
    init_tracing(config.log_json);
    config.validate();

    if let Some(path) = cli.weights.clone() {
        config.weights_path = path;
    }

    let repository = JsonFileWeightRepository::new(config.weights_path.clone());
    let store = load_or_default(&repository, config.bounds, Utc::now())
        .with_context(|| format!("Failed to load weights from {}", config.weights_path.display()))?;

    info!(
        weights_path = %config.weights_path.display(),
        version = store.version(),
        "Starting ranking-engine"
    );

    let adjuster = WeightAdjuster::with_normalizer(config.adjuster.clone(), config.normalizer());

    match cli.command {
        Commands::Rank { pool, profile } => {
            let raw = fs::read_to_string(&pool)
                .with_context(|| format!("Failed to read pool {}", pool.display()))?;
            let candidates = parse_pool(&raw).context("Invalid candidate pool")?;
            let profile: UserProfile = match profile {
                Some(path) => read_json(&path)?,
                None => UserProfile::default(),
            };

            let pipeline = RankingPipeline::from_config(&config);
            let result = pipeline.run(candidates, &profile, &store);
            print_json(&result)?;
        }
        Commands::Adjust { events, dry_run } => {
            let events: Vec<FeedbackEvent> = read_json(&events)?;
            let now = Utc::now();

            let report = if dry_run {
                adjuster.adjust(&store, &events, now).report
            } else {
                let shared = SharedWeightStore::new(store);
                adjuster
                    .adjust_and_persist(&shared, &repository, &events, now)
                    .context("Failed to persist adjusted weights")?
            };
            print_json(&report)?;
        }
        Commands::Reinforce { key, reason } => {
            let key: WeightKey = key.parse().context("Invalid weight key")?;
            let shared = SharedWeightStore::new(store);
            let value = shared
                .read_modify_write(&repository, |store| {
                    adjuster.reinforce(store, &key, &reason, Utc::now())
                })
                .context("Failed to persist reinforced weight")?;
            print_json(&serde_json::json!({ "key": key, "value": value }))?;
        }
        Commands::Reset { reason } => {
            let mut store = store;
            let changed = store.reset(&reason, Utc::now());
            if changed > 0 {
                repository
                    .save(&store)
                    .context("Failed to persist reset weights")?;
            }
            print_json(&serde_json::json!({ "changed": changed, "version": store.version() }))?;
        }
        Commands::Audit { key } => match key {
            Some(key) => {
                let key: WeightKey = key.parse().context("Invalid weight key")?;
                let records: Vec<_> = store.audit_for(&key).collect();
                print_json(&records)?;
            }
            None => print_json(&store.audit_log())?,
        },
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", out);
    Ok(())
}
