//! Target-face selection and ring scoring.
//!
//! The target face is modelled as an axis-aligned ellipse taken from its
//! detection box. Arrow hits are scored on ten equal-width rings: a hit at
//! normalized distance `d` in `[k/10, (k+1)/10)` scores `10 - k`, and anything
//! at or beyond the rim scores 0.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::config::ClassLabels;
use crate::detection_obj::Detection;

pub const MAX_POINTS: u32 = 10;

/// How to choose among several target-face detections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetSelection {
    /// First target-face detection in detection order.
    #[default]
    FirstMatch,
    /// Target-face detection with the highest confidence.
    HighestConfidence,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetGeometry {
    pub center_x: f32,
    pub center_y: f32,
    pub radius_x: f32,
    pub radius_y: f32,
}

impl TargetGeometry {
    pub fn from_detection(detection: &Detection) -> Self {
        Self {
            center_x: detection.bbox.center_x,
            center_y: detection.bbox.center_y,
            radius_x: detection.bbox.width / 2.0,
            radius_y: detection.bbox.height / 2.0,
        }
    }

    /// Single scoring radius, the larger of the two semi-axes.
    pub fn radius(&self) -> f32 {
        self.radius_x.max(self.radius_y)
    }

    pub fn distance_to(&self, x: f32, y: f32) -> f32 {
        (x - self.center_x).hypot(y - self.center_y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrowHit {
    pub x: f32,
    pub y: f32,
    /// Half the larger side of the hit's box
    pub radius: f32,
    pub confidence: f32,
    pub distance_from_center: f32,
    pub ring: u32,
    pub points: u32,
}

/// Ring index for a hit, 10 at the center down to 1 at the rim, 0 outside.
pub fn ring_for_distance(distance: f32, target_radius: f32) -> u32 {
    if !target_radius.is_finite() || target_radius <= 0.0 || !distance.is_finite() {
        return 0;
    }
    let normalized = distance.max(0.0) / target_radius;
    if normalized.is_nan() || normalized >= 1.0 {
        return 0;
    }
    let band = (normalized * 10.0).floor() as i64;
    (MAX_POINTS as i64 - band).clamp(0, MAX_POINTS as i64) as u32
}

/// Points awarded for a hit; each ring is worth its index.
pub fn score_for_distance(distance: f32, target_radius: f32) -> u32 {
    ring_for_distance(distance, target_radius)
}

/// Pick the target-face detection according to `selection`.
pub fn select_target<'a>(
    detections: &'a [Detection],
    labels: &ClassLabels,
    selection: TargetSelection,
) -> Option<&'a Detection> {
    let mut faces = detections.iter().filter(|d| labels.is_target(&d.label));
    match selection {
        TargetSelection::FirstMatch => faces.next(),
        TargetSelection::HighestConfidence => faces.fold(None, |best: Option<&Detection>, d| {
            match best {
                Some(b) if b.confidence >= d.confidence => Some(b),
                _ => Some(d),
            }
        }),
    }
}

/// Human-readable list of every label and confidence seen, in detection order.
pub fn observed_summary(detections: &[Detection]) -> String {
    if detections.is_empty() {
        return "none".to_string();
    }
    detections
        .iter()
        .map(|d| format!("{} ({:.2})", d.label, d.confidence))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Score every detection carrying a configured arrow label.
///
/// Hits are returned in descending confidence order. Hits outside the target
/// are kept with 0 points.
pub fn score_detections(
    detections: &[Detection],
    target: &TargetGeometry,
    labels: &ClassLabels,
) -> Vec<ArrowHit> {
    let radius = target.radius();
    let mut arrows: Vec<&Detection> = detections
        .iter()
        .filter(|d| labels.is_arrow(&d.label))
        .collect();
    arrows.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    arrows
        .into_iter()
        .map(|d| {
            let (x, y) = d.center();
            let distance = target.distance_to(x, y);
            let ring = ring_for_distance(distance, radius);
            ArrowHit {
                x,
                y,
                radius: d.bbox.width.max(d.bbox.height) / 2.0,
                confidence: d.confidence,
                distance_from_center: distance,
                ring,
                points: score_for_distance(distance, radius),
            }
        })
        .collect()
}
