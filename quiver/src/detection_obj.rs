// Box and detection types shared by the decoder, the suppressor and the scorer.
use serde::{Deserialize, Serialize};

/// Axis-aligned box in center + size form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub center_x: f32,
    pub center_y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(center_x: f32, center_y: f32, width: f32, height: f32) -> Self {
        Self {
            center_x,
            center_y,
            width,
            height,
        }
    }

    /// Corner form as `(x1, y1, x2, y2)`.
    pub fn corners(&self) -> (f32, f32, f32, f32) {
        let half_w = self.width / 2.0;
        let half_h = self.height / 2.0;
        (
            self.center_x - half_w,
            self.center_y - half_h,
            self.center_x + half_w,
            self.center_y + half_h,
        )
    }

    pub fn is_finite(&self) -> bool {
        self.center_x.is_finite()
            && self.center_y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn intersection_area(&self, other: &BoundingBox) -> f32 {
        if !self.is_finite() || !other.is_finite() {
            return 0.0;
        }
        let (ax1, ay1, ax2, ay2) = self.corners();
        let (bx1, by1, bx2, by2) = other.corners();

        let overlap_w = (ax2.min(bx2) - ax1.max(bx1)).max(0.0);
        let overlap_h = (ay2.min(by2) - ay1.max(by1)).max(0.0);

        overlap_w * overlap_h
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let intersection = self.intersection_area(other);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 && union.is_finite() {
            intersection / union
        } else {
            0.0
        }
    }
}

/// Decoded prediction in model-input pixel space, before suppression.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub class_id: u32,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Candidate {
    pub fn iou(&self, other: &Candidate) -> f32 {
        self.bbox.iou(&other.bbox)
    }
}

/// Labelled detection in original-image pixel space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: u32,
    pub label: String,
    pub confidence: f32,
    #[serde(flatten)]
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn center(&self) -> (f32, f32) {
        (self.bbox.center_x, self.bbox.center_y)
    }

    pub fn iou(&self, other: &Detection) -> f32 {
        self.bbox.iou(&other.bbox)
    }
}
