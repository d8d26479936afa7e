//! Capture files: the detector output for one photo, dumped to JSON.
//!
//! A capture holds exactly what the preprocessing and inference steps hand to
//! the analyzer, so scoring can be run (and re-run) without the model.

use anyhow::{anyhow, Result};
use ndarray::{Array, ArrayView, ArrayViewD, IxDyn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::analysis::InferenceOutput;
use crate::coordinate_mapping::{PreprocessMeta, PreprocessTransform};

/// Raw detector output plus the preprocessing metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capture {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
    pub original_width: u32,
    pub original_height: u32,
    pub transform: PreprocessTransform,
}

impl Capture {
    pub fn meta(&self) -> PreprocessMeta {
        PreprocessMeta::new(self.transform, self.original_width, self.original_height)
    }

    pub fn tensor(&self) -> Result<ArrayViewD<'_, f32>> {
        ArrayView::from_shape(IxDyn(&self.shape), &self.data).map_err(|e| {
            anyhow!(
                "Capture data has {} values, which does not fit shape {:?}: {}",
                self.data.len(),
                self.shape,
                e
            )
        })
    }

    pub fn into_inference_output(self) -> Result<InferenceOutput> {
        let meta = self.meta();
        let tensor = Array::from_shape_vec(IxDyn(&self.shape), self.data)?;
        Ok(InferenceOutput { tensor, meta })
    }
}

pub fn load_capture(path: &Path) -> Result<Capture> {
    let content = fs::read_to_string(path)
        .map_err(|e| anyhow!("Failed to read capture {}: {}", path.display(), e))?;
    let capture: Capture = serde_json::from_str(&content)
        .map_err(|e| anyhow!("Failed to parse capture {}: {}", path.display(), e))?;
    capture.tensor()?;
    Ok(capture)
}

pub fn is_capture_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Find all capture files in a directory (non-recursive)
pub fn find_captures_in_directory(dir_path: &Path) -> Result<Vec<PathBuf>> {
    let mut captures = Vec::new();

    for entry in fs::read_dir(dir_path)? {
        let path = entry?.path();
        if path.is_file() && is_capture_file(&path) {
            captures.push(path);
        }
    }

    // Sort for consistent ordering
    captures.sort();
    Ok(captures)
}

/// Collect capture files from files, directories, or glob patterns
pub fn collect_captures_from_sources(sources: &[String], strict: bool) -> Result<Vec<PathBuf>> {
    let mut all_captures = Vec::new();

    for source in sources {
        let source_path = Path::new(source);

        if source_path.is_file() {
            if is_capture_file(source_path) {
                all_captures.push(source_path.to_path_buf());
            } else if strict {
                return Err(anyhow!(
                    "File is not a capture (.json): {}",
                    source_path.display()
                ));
            }
        } else if source_path.is_dir() {
            all_captures.extend(find_captures_in_directory(source_path)?);
        } else if !source.contains('*') && !source.contains('?') && !source.contains('[') {
            if strict {
                return Err(anyhow!("File does not exist: {}", source));
            }
            log::warn!(
                "{}File does not exist: {}",
                crate::color_utils::Marker::Skipped.prefix(),
                source
            );
        } else {
            let paths =
                glob::glob(source).map_err(|e| anyhow!("Invalid glob pattern {source}: {e}"))?;
            let mut found_any = false;
            for path_result in paths {
                match path_result {
                    Ok(path) if path.is_file() && is_capture_file(&path) => {
                        all_captures.push(path);
                        found_any = true;
                    }
                    Ok(_) => {}
                    Err(e) => log::warn!(
                        "{}Error reading path in glob {source}: {e}",
                        crate::color_utils::Marker::Skipped.prefix()
                    ),
                }
            }
            if !found_any && strict {
                return Err(anyhow!("Glob pattern matched no captures: {}", source));
            }
        }
    }

    Ok(all_captures)
}
