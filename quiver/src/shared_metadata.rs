use anyhow::Result;
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Metadata file written for each scored capture
#[derive(Serialize, Deserialize, Default, Debug)]
pub struct QuiverMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<ScoreSections>,
}

/// All sections for the score tool
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ScoreSections {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<InputProcessing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<toml::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<toml::Value>,
}

/// Execution context for a tool invocation
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ExecutionContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiver_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_line: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct InputProcessing {
    pub capture_path: String,
    pub strict_mode: bool,
}

/// Load existing metadata from a file, or create new empty metadata
pub fn load_or_create_metadata(path: &Path) -> Result<QuiverMetadata> {
    if !path.exists() {
        return Ok(QuiverMetadata::default());
    }

    let content = fs::read_to_string(path)?;
    match toml::from_str::<QuiverMetadata>(&content) {
        Ok(metadata) => Ok(metadata),
        Err(e) => {
            warn!(
                "{}Dropping existing metadata from {}:\n{}",
                crate::color_utils::Marker::Skipped.prefix(),
                path.display(),
                e
            );
            Ok(QuiverMetadata::default())
        }
    }
}

pub fn save_metadata(metadata: &QuiverMetadata, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, toml::to_string_pretty(metadata)?)?;
    Ok(())
}
