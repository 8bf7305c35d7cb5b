//! Command-line interface definitions for Tech River Clusters.
//!
//! This module defines the CLI arguments and options using the `clap` crate.

use clap::Parser;
use tech_river_clusters::settings::Strategy;

/// Command-line arguments for the clustering run.
///
/// # Examples
///
/// ```sh
/// # Cluster a fetched batch with the default settings
/// tech_river_clusters -i ./fetched.json -j ./json
///
/// # Entity grouping with custom settings, no LLM calls
/// tech_river_clusters -i ./fetched.json -j ./json -s ./river.yaml --strategy entity --no-oracle
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// JSON file holding the fetched articles (an array of raw articles)
    #[arg(short, long)]
    pub input: String,

    /// Output directory for the JSON digest
    #[arg(short, long)]
    pub json_output_dir: String,

    /// Optional path to the awful_aj config.yaml file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Optional path to the clustering settings YAML
    #[arg(short, long, env = "TECH_RIVER_SETTINGS")]
    pub settings: Option<String>,

    /// Override the grouping strategy from the settings file
    #[arg(long, value_enum)]
    pub strategy: Option<Strategy>,

    /// Never call the LLM; borderline pairs stay apart and no entities are tagged
    #[arg(long)]
    pub no_oracle: bool,
}
