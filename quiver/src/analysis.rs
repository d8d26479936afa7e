//! End-to-end analysis: raw detector tensor in, scored result out.
//!
//! `Analyzer` owns the validated, read-only configuration and runs
//! decode -> suppress -> remap -> score -> assemble as plain function calls.
//! It holds no mutable state and can be shared across threads.

use std::fmt;

use log::{debug, info};
use ndarray::{ArrayD, ArrayViewD};
use serde::Serialize;
use thiserror::Error;

use crate::config::{ConfigError, ScoringConfig};
use crate::coordinate_mapping::{map_candidates, PreprocessMeta};
use crate::detection_obj::{Candidate, Detection};
use crate::scoring::{
    observed_summary, score_detections, select_target, ArrowHit, TargetGeometry, MAX_POINTS,
};
use crate::yolo_postprocessing::{decode_output, nms, CLASS_SCORE_OFFSET};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionStage {
    ConfidenceFilter,
    Suppression,
    /// A detection list handed back for rescoring
    Edited,
}

impl fmt::Display for DetectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DetectionStage::ConfidenceFilter => "confidence filtering",
            DetectionStage::Suppression => "suppression",
            DetectionStage::Edited => "editing",
        };
        f.write_str(name)
    }
}

/// Why an analysis produced no score.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AnalysisError {
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },
    #[error("no detections left after {stage}")]
    NoDetections { stage: DetectionStage },
    #[error("no target face detected; observed: {observed}")]
    TargetNotFound { observed: String },
}

impl AnalysisError {
    fn invalid(reason: impl Into<String>) -> Self {
        AnalysisError::InvalidInput {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Success,
    Failure,
}

/// Outcome of one analysis. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    status: AnalysisStatus,
    total_score: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<AnalysisError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<TargetGeometry>,
    hits: Vec<ArrowHit>,
    detections: Vec<Detection>,
}

impl AnalysisResult {
    pub fn success(
        target: TargetGeometry,
        hits: Vec<ArrowHit>,
        detections: Vec<Detection>,
    ) -> Self {
        let total_score = hits.iter().map(|h| h.points).sum();
        Self {
            status: AnalysisStatus::Success,
            total_score,
            error: None,
            target: Some(target),
            hits,
            detections,
        }
    }

    pub fn failure(error: AnalysisError, detections: Vec<Detection>) -> Self {
        Self {
            status: AnalysisStatus::Failure,
            total_score: 0,
            error: Some(error),
            target: None,
            hits: Vec::new(),
            detections,
        }
    }

    pub fn status(&self) -> AnalysisStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == AnalysisStatus::Success
    }

    pub fn error(&self) -> Option<&AnalysisError> {
        self.error.as_ref()
    }

    pub fn target(&self) -> Option<&TargetGeometry> {
        self.target.as_ref()
    }

    pub fn hits(&self) -> &[ArrowHit] {
        &self.hits
    }

    pub fn total_score(&self) -> u32 {
        self.total_score
    }

    /// Every detection that survived suppression, kept for re-annotation.
    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn into_detections(self) -> Vec<Detection> {
        self.detections
    }

    /// Number of hits per ring; index 0 counts misses, index 10 bullseyes.
    pub fn ring_counts(&self) -> [usize; MAX_POINTS as usize + 1] {
        let mut counts = [0; MAX_POINTS as usize + 1];
        for hit in &self.hits {
            counts[hit.ring as usize] += 1;
        }
        counts
    }

    pub fn summary(&self) -> String {
        match &self.error {
            Some(error) => format!("failed: {error}"),
            None => format!(
                "{} hit(s), total score {}",
                self.hits.len(),
                self.total_score
            ),
        }
    }
}

/// Hooks called at each stage boundary of an analysis.
pub trait PipelineObserver {
    fn on_decoded(&mut self, _candidates: &[Candidate]) {}
    fn on_suppressed(&mut self, _kept: &[Candidate]) {}
    fn on_mapped(&mut self, _detections: &[Detection]) {}
    fn on_scored(&mut self, _target: &TargetGeometry, _hits: &[ArrowHit]) {}
}

pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Forwards stage results to the `log` facade at debug level.
pub struct LoggingObserver {
    /// How many of the strongest predictions to list after decoding
    pub top_n: usize,
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self { top_n: 5 }
    }
}

impl PipelineObserver for LoggingObserver {
    fn on_decoded(&mut self, candidates: &[Candidate]) {
        let mut ranked: Vec<&Candidate> = candidates.iter().collect();
        ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        debug!("Decoded {} candidate(s)", candidates.len());
        for (rank, c) in ranked.iter().take(self.top_n).enumerate() {
            debug!(
                "  #{} class {} conf {:.3} at ({:.1}, {:.1}) {:.1}x{:.1}",
                rank + 1,
                c.class_id,
                c.confidence,
                c.bbox.center_x,
                c.bbox.center_y,
                c.bbox.width,
                c.bbox.height
            );
        }
    }

    fn on_suppressed(&mut self, kept: &[Candidate]) {
        debug!("{} candidate(s) kept after suppression", kept.len());
    }

    fn on_mapped(&mut self, detections: &[Detection]) {
        for d in detections {
            debug!(
                "  {} conf {:.3} at ({:.1}, {:.1}) {:.1}x{:.1}",
                d.label, d.confidence, d.bbox.center_x, d.bbox.center_y, d.bbox.width, d.bbox.height
            );
        }
    }

    fn on_scored(&mut self, target: &TargetGeometry, hits: &[ArrowHit]) {
        debug!(
            "Target at ({:.1}, {:.1}) radius {:.1}, {} hit(s)",
            target.center_x,
            target.center_y,
            target.radius(),
            hits.len()
        );
    }
}

/// Tensor and preprocessing metadata produced for one photo.
#[derive(Debug, Clone)]
pub struct InferenceOutput {
    pub tensor: ArrayD<f32>,
    pub meta: PreprocessMeta,
}

/// The preprocessing and inference collaborators, seen as one step.
pub trait InferenceBackend {
    fn infer(&self, image_bytes: &[u8], input_size: u32) -> anyhow::Result<InferenceOutput>;
}

/// Runs the scoring pipeline with one validated configuration.
#[derive(Debug, Clone)]
pub struct Analyzer {
    config: ScoringConfig,
}

impl Analyzer {
    pub fn new(config: ScoringConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn analyze(&self, tensor: &ArrayViewD<'_, f32>, meta: &PreprocessMeta) -> AnalysisResult {
        self.analyze_with_observer(tensor, meta, &mut NoopObserver)
    }

    pub fn analyze_with_observer(
        &self,
        tensor: &ArrayViewD<'_, f32>,
        meta: &PreprocessMeta,
        observer: &mut dyn PipelineObserver,
    ) -> AnalysisResult {
        if meta.original_width == 0 || meta.original_height == 0 {
            return AnalysisResult::failure(
                AnalysisError::invalid(format!(
                    "original image is {}x{}",
                    meta.original_width, meta.original_height
                )),
                Vec::new(),
            );
        }
        if !meta.transform.is_valid() {
            return AnalysisResult::failure(
                AnalysisError::invalid(format!("unusable transform {:?}", meta.transform)),
                Vec::new(),
            );
        }

        let candidates = match decode_output(tensor, self.config.confidence) {
            Ok(candidates) => candidates,
            Err(e) => {
                return AnalysisResult::failure(AnalysisError::invalid(e.to_string()), Vec::new())
            }
        };
        let num_classes = tensor.shape()[1] - CLASS_SCORE_OFFSET;
        if num_classes > self.config.labels.names.len() {
            return AnalysisResult::failure(
                AnalysisError::invalid(format!(
                    "model emits {num_classes} classes but only {} labels are configured",
                    self.config.labels.names.len()
                )),
                Vec::new(),
            );
        }
        observer.on_decoded(&candidates);
        if candidates.is_empty() {
            return AnalysisResult::failure(
                AnalysisError::NoDetections {
                    stage: DetectionStage::ConfidenceFilter,
                },
                Vec::new(),
            );
        }

        let kept = nms(
            candidates,
            self.config.nms_threshold,
            self.config.suppression,
        );
        observer.on_suppressed(&kept);
        if kept.is_empty() {
            return AnalysisResult::failure(
                AnalysisError::NoDetections {
                    stage: DetectionStage::Suppression,
                },
                Vec::new(),
            );
        }

        let detections = map_candidates(&kept, &meta.transform, &self.config.labels);
        observer.on_mapped(&detections);

        self.score(detections, observer)
    }

    /// Run preprocessing and inference through `backend`, then analyze.
    pub fn analyze_photo<B: InferenceBackend + ?Sized>(
        &self,
        image_bytes: &[u8],
        backend: &B,
    ) -> AnalysisResult {
        if image_bytes.is_empty() {
            return AnalysisResult::failure(
                AnalysisError::invalid("image data is empty"),
                Vec::new(),
            );
        }

        match backend.infer(image_bytes, self.config.input_size) {
            Ok(output) => self.analyze(&output.tensor.view(), &output.meta),
            Err(e) => AnalysisResult::failure(
                AnalysisError::invalid(format!("inference failed: {e}")),
                Vec::new(),
            ),
        }
    }

    /// Score a detection list again, e.g. after the user edited it.
    pub fn rescore(&self, detections: Vec<Detection>) -> AnalysisResult {
        if detections.is_empty() {
            return AnalysisResult::failure(
                AnalysisError::NoDetections {
                    stage: DetectionStage::Edited,
                },
                detections,
            );
        }
        self.score(detections, &mut NoopObserver)
    }

    fn score(
        &self,
        detections: Vec<Detection>,
        observer: &mut dyn PipelineObserver,
    ) -> AnalysisResult {
        let labels = &self.config.labels;
        let Some(face) = select_target(&detections, labels, self.config.target_selection) else {
            let observed = observed_summary(&detections);
            info!("No target face among detections: {observed}");
            return AnalysisResult::failure(AnalysisError::TargetNotFound { observed }, detections);
        };

        let target = TargetGeometry::from_detection(face);
        let hits = score_detections(&detections, &target, labels);
        observer.on_scored(&target, &hits);

        AnalysisResult::success(target, hits, detections)
    }
}
