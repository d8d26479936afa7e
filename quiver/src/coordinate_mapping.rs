//! Mapping between model-input space and original-image space.
//!
//! The preprocessing collaborator either stretches the photo onto the square
//! model input (plain scale) or resizes it uniformly and pads the short side
//! (letterbox). It reports which one it did so boxes can be mapped back.

use serde::{Deserialize, Serialize};

use crate::config::ClassLabels;
use crate::detection_obj::{BoundingBox, Candidate, Detection};

/// Transform applied to the photo before inference, with its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PreprocessTransform {
    /// Independent axis scales: `original = model * scale`.
    PlainScale { scale_x: f32, scale_y: f32 },
    /// Uniform resize by `ratio` followed by centered padding.
    Letterbox { ratio: f32, pad_x: f32, pad_y: f32 },
}

impl PreprocessTransform {
    pub fn plain_scale(original_width: u32, original_height: u32, input_size: u32) -> Self {
        let input_size = input_size as f32;
        PreprocessTransform::PlainScale {
            scale_x: original_width as f32 / input_size,
            scale_y: original_height as f32 / input_size,
        }
    }

    pub fn letterbox(original_width: u32, original_height: u32, input_size: u32) -> Self {
        let size = input_size as f32;
        let ratio = (size / original_width as f32).min(size / original_height as f32);
        let scaled_w = original_width as f32 * ratio;
        let scaled_h = original_height as f32 * ratio;

        PreprocessTransform::Letterbox {
            ratio,
            pad_x: (size - scaled_w) / 2.0,
            pad_y: (size - scaled_h) / 2.0,
        }
    }

    /// Whether the parameters describe an invertible mapping.
    pub fn is_valid(&self) -> bool {
        match *self {
            PreprocessTransform::PlainScale { scale_x, scale_y } => {
                scale_x.is_finite() && scale_y.is_finite() && scale_x > 0.0 && scale_y > 0.0
            }
            PreprocessTransform::Letterbox {
                ratio,
                pad_x,
                pad_y,
            } => ratio.is_finite() && ratio > 0.0 && pad_x.is_finite() && pad_y.is_finite(),
        }
    }

    /// Map a box from model-input pixels to original-image pixels.
    pub fn to_image_space(&self, bbox: &BoundingBox) -> BoundingBox {
        match *self {
            PreprocessTransform::PlainScale { scale_x, scale_y } => BoundingBox::new(
                bbox.center_x * scale_x,
                bbox.center_y * scale_y,
                bbox.width * scale_x,
                bbox.height * scale_y,
            ),
            PreprocessTransform::Letterbox {
                ratio,
                pad_x,
                pad_y,
            } => BoundingBox::new(
                (bbox.center_x - pad_x) / ratio,
                (bbox.center_y - pad_y) / ratio,
                bbox.width / ratio,
                bbox.height / ratio,
            ),
        }
    }

    /// Map a box from original-image pixels to model-input pixels.
    pub fn to_model_space(&self, bbox: &BoundingBox) -> BoundingBox {
        match *self {
            PreprocessTransform::PlainScale { scale_x, scale_y } => BoundingBox::new(
                bbox.center_x / scale_x,
                bbox.center_y / scale_y,
                bbox.width / scale_x,
                bbox.height / scale_y,
            ),
            PreprocessTransform::Letterbox {
                ratio,
                pad_x,
                pad_y,
            } => BoundingBox::new(
                bbox.center_x * ratio + pad_x,
                bbox.center_y * ratio + pad_y,
                bbox.width * ratio,
                bbox.height * ratio,
            ),
        }
    }
}

/// Preprocessing metadata delivered alongside the raw tensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreprocessMeta {
    pub transform: PreprocessTransform,
    pub original_width: u32,
    pub original_height: u32,
}

impl PreprocessMeta {
    pub fn new(transform: PreprocessTransform, original_width: u32, original_height: u32) -> Self {
        Self {
            transform,
            original_width,
            original_height,
        }
    }

    /// Metadata for a plain-scaled photo of the given size.
    pub fn plain_scale(original_width: u32, original_height: u32, input_size: u32) -> Self {
        Self::new(
            PreprocessTransform::plain_scale(original_width, original_height, input_size),
            original_width,
            original_height,
        )
    }

    /// Metadata for a letterboxed photo of the given size.
    pub fn letterbox(original_width: u32, original_height: u32, input_size: u32) -> Self {
        Self::new(
            PreprocessTransform::letterbox(original_width, original_height, input_size),
            original_width,
            original_height,
        )
    }
}

/// Map suppressed candidates into original-image space, attaching labels.
pub fn map_candidates(
    candidates: &[Candidate],
    transform: &PreprocessTransform,
    labels: &ClassLabels,
) -> Vec<Detection> {
    candidates
        .iter()
        .map(|candidate| Detection {
            class_id: candidate.class_id,
            label: labels.label_for(candidate.class_id).to_string(),
            confidence: candidate.confidence,
            bbox: transform.to_image_space(&candidate.bbox),
        })
        .collect()
}
