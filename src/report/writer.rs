//! Report persistence.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::info;

use super::generator::render_raw_json;
use crate::models::Dataset;

/// Timestamp format used in artifact file names.
const FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Writes digest artifacts into an output directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Save the markdown digest as `ai_digest_<timestamp>.md`.
    pub fn save_markdown(&self, content: &str, timestamp: DateTime<Utc>) -> Result<PathBuf> {
        let path = self.artifact_path("ai_digest", timestamp, "md");
        self.write(&path, content)?;
        info!("Report saved to: {}", path.display());
        Ok(path)
    }

    /// Save the raw dataset as `raw_data_<timestamp>.json`.
    pub fn save_raw(&self, dataset: &Dataset, timestamp: DateTime<Utc>) -> Result<PathBuf> {
        let content = render_raw_json(dataset)?;
        let path = self.artifact_path("raw_data", timestamp, "json");
        self.write(&path, &content)?;
        info!("Raw data saved to: {}", path.display());
        Ok(path)
    }

    fn artifact_path(&self, prefix: &str, timestamp: DateTime<Utc>, extension: &str) -> PathBuf {
        self.output_dir.join(format!(
            "{}_{}.{}",
            prefix,
            timestamp.format(FILE_TIMESTAMP_FORMAT),
            extension
        ))
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir).with_context(|| {
            format!(
                "Failed to create output directory {}",
                self.output_dir.display()
            )
        })?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}
