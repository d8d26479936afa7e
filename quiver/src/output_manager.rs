//! Output path management for result files.
//!
//! Results land next to the capture as `<stem>_score.toml`, or as
//! `<stem>.toml` inside `--output-dir` when one is given.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::config::BaseConfig;

pub struct OutputManager<'a> {
    base: &'a BaseConfig,
    input_path: &'a Path,
}

impl<'a> OutputManager<'a> {
    pub fn new(base: &'a BaseConfig, input_path: &'a Path) -> Self {
        Self { base, input_path }
    }

    /// Get the input file stem (filename without extension)
    fn input_stem(&self) -> &str {
        self.input_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output")
    }

    /// Path of the result file, creating the output directory if needed
    pub fn result_path(&self, suffix: &str, extension: &str) -> Result<PathBuf> {
        let input_stem = self.input_stem();

        let output_path = match &self.base.output_dir {
            Some(output_dir) => {
                let output_dir = Path::new(output_dir);
                std::fs::create_dir_all(output_dir)?;
                output_dir.join(format!("{input_stem}.{extension}"))
            }
            None => self
                .input_path
                .parent()
                .unwrap_or(Path::new("."))
                .join(format!("{input_stem}_{suffix}.{extension}")),
        };

        Ok(output_path)
    }
}
