//! # Tech River Clusters
//!
//! Command-line driver: reads a batch of already-fetched articles, groups
//! them into story clusters per region, ranks them, and writes the digest
//! as JSON for the page renderer.
//!
//! ## Usage
//!
//! ```sh
//! tech_river_clusters -i ./fetched.json -j ./json
//! ```
//!
//! ## Oracle
//!
//! Borderline pairs and entity tagging go to an OpenAI-compatible LLM via
//! `awful_aj`. When its config or templates cannot be loaded, or when
//! `--no-oracle` is given, the run continues with the oracle disabled.

use awful_aj::config::AwfulJadeConfig;
use awful_aj::template::ChatTemplate;
use awful_aj::{config, config_dir, template};
use chrono::Utc;
use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use tech_river_clusters::digest::DigestBuilder;
use tech_river_clusters::models::RawArticle;
use tech_river_clusters::oracle::{AskFnWrapper, DisabledOracle, EventOracle, LlmOracle, TimeoutAsk};
use tech_river_clusters::outputs::json;
use tech_river_clusters::settings::Settings;
use tech_river_clusters::utils::ensure_writable_dir;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;

use cli::Cli;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("tech_river_clusters starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // ---- Settings ----
    let mut settings = match &args.settings {
        Some(path) => Settings::load(path).await?,
        None => {
            info!("No settings file given; using defaults");
            Settings::default()
        }
    };
    if let Some(strategy) = args.strategy {
        settings.strategy = strategy;
    }

    // Early check: ensure JSON output dir is writable
    if let Err(e) = ensure_writable_dir(&args.json_output_dir).await {
        error!(
            path = %args.json_output_dir,
            error = %e,
            "JSON output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // ---- Input ----
    let text = tokio::fs::read_to_string(&args.input).await?;
    let raw: Vec<RawArticle> = serde_json::from_str(&text)?;
    info!(path = %args.input, count = raw.len(), "Loaded fetched articles");

    // ---- Oracle ----
    let backend = if args.no_oracle || !settings.oracle.enabled {
        info!("Oracle disabled by configuration");
        None
    } else {
        match load_backend(&args, &settings).await {
            Ok(backend) => Some(backend),
            Err(e) => {
                warn!(error = %e, "Could not load LLM config or templates; continuing with oracle disabled");
                None
            }
        }
    };

    let clusters = match &backend {
        Some((conf, pairwise, entity)) => {
            let limit = settings.oracle.timeout();
            let oracle = LlmOracle::new(
                TimeoutAsk::new(AskFnWrapper { config: conf, template: pairwise }, limit),
                TimeoutAsk::new(AskFnWrapper { config: conf, template: entity }, limit),
            );
            run(raw, &settings, &oracle, &args.json_output_dir).await
        }
        None => run(raw, &settings, &DisabledOracle, &args.json_output_dir).await,
    }?;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        clusters,
        "Execution complete"
    );

    Ok(())
}

/// Load the `awful_aj` config plus the two chat templates the oracle uses.
#[instrument(level = "info", skip_all)]
async fn load_backend(
    args: &Cli,
    settings: &Settings,
) -> Result<(AwfulJadeConfig, ChatTemplate, ChatTemplate), Box<dyn Error>> {
    let conf_file = match &args.config {
        Some(path) => PathBuf::from(path),
        None => config_dir()?.join("config.yaml"),
    };
    let config_path = conf_file
        .to_str()
        .ok_or("Not a valid config filename")?;
    let conf = config::load_config(config_path)?;
    info!(config_path, "Loaded configuration");

    let pairwise = template::load_template(&settings.oracle.pairwise_template).await?;
    info!(template = %settings.oracle.pairwise_template, "Loaded template");
    let entity = template::load_template(&settings.oracle.entity_template).await?;
    info!(template = %settings.oracle.entity_template, "Loaded template");

    Ok((conf, pairwise, entity))
}

/// Build the digest with `oracle` and write it; returns the number of clusters written.
async fn run<O: EventOracle>(
    raw: Vec<RawArticle>,
    settings: &Settings,
    oracle: &O,
    json_output_dir: &str,
) -> Result<usize, Box<dyn Error>> {
    let now = Utc::now().with_timezone(&settings.timezone());
    let digest = DigestBuilder::new(settings).build(raw, oracle, now).await;

    for column in &digest.columns {
        info!(
            column = %column.title,
            articles = column.article_count,
            clusters = column.clusters.len(),
            priority = column.clusters.iter().filter(|c| c.is_priority).count(),
            "Column ready"
        );
    }

    if let Err(e) = json::write_digest(&digest, json_output_dir).await {
        error!(error = %e, "Failed to write JSON digest");
        return Err(e);
    }

    Ok(digest.columns.iter().map(|c| c.clusters.len()).sum())
}
