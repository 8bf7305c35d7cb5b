//! JSON output generation for the page renderer.
//!
//! Files are organized by the digest's local date with edition names:
//! ```text
//! json_output_dir/
//! └── 2026-02-21/
//!     ├── morning.json
//!     ├── afternoon.json
//!     └── evening.json
//! ```
//!
//! Both the date and the edition come from `generated_at`, which is already
//! in the reference timezone, so a run just after local midnight lands in
//! the new day's morning edition.

use crate::models::Digest;
use crate::utils::time_of_day;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// Path the digest will be written to: `{json_output_dir}/{date}/{time_of_day}.json`.
pub fn digest_path(digest: &Digest, json_output_dir: &str) -> PathBuf {
    PathBuf::from(json_output_dir)
        .join(digest.generated_at.date_naive().to_string())
        .join(format!("{}.json", time_of_day(&digest.generated_at)))
}

/// Write a [`Digest`] to a JSON file with date-based directory structure.
///
/// # Returns
///
/// The path written, or an error if directory creation or file writing fails.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir))]
pub async fn write_digest(digest: &Digest, json_output_dir: &str) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string(digest)?;
    let path = digest_path(digest, json_output_dir);

    if let Some(dir) = path.parent() {
        info!(dir = %dir.display(), "Ensuring JSON directory exists");
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create JSON dir");
            return Err(e.into());
        }
    }

    fs::write(&path, json).await?;
    info!(path = %path.display(), columns = digest.columns.len(), "Wrote JSON digest");

    Ok(path)
}
