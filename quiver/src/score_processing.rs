//! Batch scoring of capture files.

use anyhow::Result;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::analysis::{AnalysisResult, Analyzer, LoggingObserver};
use crate::capture::{collect_captures_from_sources, load_capture};
use crate::color_utils::{outcome, Marker};
use crate::config::ScoreRunConfig;
use crate::output_manager::OutputManager;
use crate::shared_metadata::{
    load_or_create_metadata, save_metadata, ExecutionContext, InputProcessing, ScoreSections,
};

/// Counts from one batch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Captures that produced a result file
    pub processed: usize,
    /// Results with status `Failure`
    pub analysis_failures: usize,
    /// Captures skipped because they could not be read (permissive mode only)
    pub unreadable: usize,
}

/// Score every capture named by the config's sources
pub fn run_scoring(config: &ScoreRunConfig) -> Result<RunSummary> {
    let run_start = Instant::now();
    let analyzer = Analyzer::new(config.scoring.clone())?;
    let captures = collect_captures_from_sources(&config.base.sources, config.base.strict)?;
    let mut summary = RunSummary::default();

    if captures.is_empty() {
        log::warn!("{}No captures found to score", Marker::Skipped.prefix());
        return Ok(summary);
    }
    log::info!("Found {} capture(s) to score", captures.len());

    let command_line: Vec<String> = std::env::args().collect();

    for (index, capture_path) in captures.iter().enumerate() {
        match process_single_capture(&analyzer, capture_path, config, &command_line) {
            Ok((result, output_path)) => {
                summary.processed += 1;
                if !result.is_success() {
                    summary.analysis_failures += 1;
                }
                log::info!(
                    "{}{} ({}/{}): {} -> {}",
                    if result.is_success() {
                        Marker::Scored.prefix()
                    } else {
                        Marker::NoScore.prefix()
                    },
                    capture_path.display(),
                    index + 1,
                    captures.len(),
                    outcome(&result.summary(), result.is_success()),
                    output_path.display()
                );
            }
            Err(e) => {
                if config.base.strict {
                    return Err(e);
                }
                summary.unreadable += 1;
                log::warn!(
                    "{}Failed to process {} ({}/{}): {}",
                    Marker::Skipped.prefix(),
                    capture_path.display(),
                    index + 1,
                    captures.len(),
                    e
                );
            }
        }
    }

    let elapsed = run_start.elapsed().as_secs_f64();
    if summary.analysis_failures > 0 || summary.unreadable > 0 {
        log::warn!(
            "{}Scored {} of {} capture(s) in {:.2}s ({} analysis failure(s), {} unreadable)",
            Marker::PartialRun.prefix(),
            summary.processed - summary.analysis_failures,
            captures.len(),
            elapsed,
            summary.analysis_failures,
            summary.unreadable
        );
    } else {
        log::info!(
            "{}Scored {} capture(s) in {:.2}s",
            Marker::Scored.prefix(),
            summary.processed,
            elapsed
        );
    }

    Ok(summary)
}

/// Analyze one capture and write its result file
pub fn process_single_capture(
    analyzer: &Analyzer,
    capture_path: &Path,
    config: &ScoreRunConfig,
    command_line: &[String],
) -> Result<(AnalysisResult, PathBuf)> {
    let start = Instant::now();
    let timestamp = Utc::now();

    let capture = load_capture(capture_path)?;
    let result = analyzer.analyze_with_observer(
        &capture.tensor()?,
        &capture.meta(),
        &mut LoggingObserver::default(),
    );
    let processing_time_ms = start.elapsed().as_secs_f64() * 1000.0;

    let output_path = OutputManager::new(&config.base, capture_path).result_path("score", "toml")?;
    let mut metadata = load_or_create_metadata(&output_path)?;
    metadata.score = Some(ScoreSections {
        execution: Some(ExecutionContext {
            timestamp: Some(timestamp),
            quiver_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            command_line: Some(command_line.to_vec()),
            processing_time_ms: Some(processing_time_ms),
        }),
        input: Some(InputProcessing {
            capture_path: capture_path.display().to_string(),
            strict_mode: config.base.strict,
        }),
        config: Some(toml::Value::try_from(&config.scoring)?),
        result: Some(toml::Value::try_from(&result)?),
    });
    save_metadata(&metadata, &output_path)?;

    Ok((result, output_path))
}
