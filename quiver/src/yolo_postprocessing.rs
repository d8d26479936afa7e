//! Decoding and suppression of raw detector output.
//!
//! The detector emits a `[1, 5 + num_classes, num_predictions]` tensor: rows 0-3
//! hold the box center and size in model-input pixels, row 4 an objectness score,
//! and the remaining rows one score per class.

use std::collections::BTreeMap;

use clap::ValueEnum;
use log::debug;
use ndarray::ArrayViewD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection_obj::{BoundingBox, Candidate};

/// Number of leading rows before the per-class scores (box + objectness).
pub const CLASS_SCORE_OFFSET: usize = 5;
const OBJECTNESS_ROW: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("expected a rank-3 output tensor, got rank {0}")]
    Rank(usize),
    #[error("expected batch size 1, got {0}")]
    Batch(usize),
    #[error("expected at least 5 channels (box, objectness), got {0}")]
    Channels(usize),
}

/// Which detections are allowed to suppress each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuppressionScope {
    /// Any detection may suppress any other, regardless of class.
    #[default]
    Global,
    /// Only detections of the same class compete.
    PerClass,
}

/// Decode the raw output tensor into confidence-filtered candidates.
///
/// Objectness is read but not used: the confidence of a candidate is its best
/// class score alone. Candidates scoring below `confidence_threshold` are dropped.
pub fn decode_output(
    output: &ArrayViewD<'_, f32>,
    confidence_threshold: f32,
) -> Result<Vec<Candidate>, DecodeError> {
    let shape = output.shape();
    if shape.len() != 3 {
        return Err(DecodeError::Rank(shape.len()));
    }
    if shape[0] != 1 {
        return Err(DecodeError::Batch(shape[0]));
    }
    if shape[1] < CLASS_SCORE_OFFSET {
        return Err(DecodeError::Channels(shape[1]));
    }

    let num_classes = shape[1] - CLASS_SCORE_OFFSET;
    let num_predictions = shape[2];
    let mut candidates = Vec::new();

    for i in 0..num_predictions {
        let bbox = BoundingBox::new(
            output[[0, 0, i]],
            output[[0, 1, i]],
            output[[0, 2, i]],
            output[[0, 3, i]],
        );
        if !bbox.is_finite() {
            continue;
        }
        let _objectness = output[[0, OBJECTNESS_ROW, i]];

        let mut best: Option<(u32, f32)> = None;
        for class_idx in 0..num_classes {
            let score = output[[0, CLASS_SCORE_OFFSET + class_idx, i]];
            if score.is_nan() {
                continue;
            }
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((class_idx as u32, score));
            }
        }

        let Some((class_id, score)) = best else {
            continue;
        };
        let confidence = score.clamp(0.0, 1.0);
        if confidence < confidence_threshold {
            continue;
        }

        candidates.push(Candidate {
            class_id,
            confidence,
            bbox,
        });
    }

    debug!(
        "Decoded {} candidate(s) from {} prediction(s) over {} class(es)",
        candidates.len(),
        num_predictions,
        num_classes
    );

    Ok(candidates)
}

/// Greedy non-maximum suppression.
///
/// Candidates are visited in descending confidence order; each kept candidate
/// discards every remaining one whose IoU with it is at least `iou_threshold`.
/// The result is sorted by descending confidence.
pub fn nms(
    candidates: Vec<Candidate>,
    iou_threshold: f32,
    scope: SuppressionScope,
) -> Vec<Candidate> {
    if candidates.is_empty() {
        return candidates;
    }

    let mut kept = match scope {
        SuppressionScope::Global => suppress_group(candidates, iou_threshold),
        SuppressionScope::PerClass => {
            let mut class_groups: BTreeMap<u32, Vec<Candidate>> = BTreeMap::new();
            for candidate in candidates {
                class_groups
                    .entry(candidate.class_id)
                    .or_default()
                    .push(candidate);
            }

            class_groups
                .into_values()
                .flat_map(|group| suppress_group(group, iou_threshold))
                .collect()
        }
    };

    kept.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    kept
}

fn suppress_group(mut group: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    // Stable sort keeps decode order among equal confidences
    group.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<Candidate> = Vec::new();
    let mut suppressed = vec![false; group.len()];

    for i in 0..group.len() {
        if suppressed[i] {
            continue;
        }

        for j in (i + 1)..group.len() {
            if !suppressed[j] && group[i].iou(&group[j]) >= iou_threshold {
                suppressed[j] = true;
            }
        }

        keep.push(group[i].clone());
    }

    keep
}
