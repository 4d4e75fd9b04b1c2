// src/geometry.rs
//
// Box and vector helpers shared by the detector and the classifier.

/// Axis-aligned box in top-left form, destination image pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build from the center form a detector head emits
    pub fn from_center(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self::new(cx - width / 2.0, cy - height / 2.0, width, height)
    }

    pub fn from_corners(corners: [f32; 4]) -> Self {
        let [x1, y1, x2, y2] = corners;
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    /// `[x1, y1, x2, y2]`
    pub fn corners(&self) -> [f32; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection over union. Zero whenever either box has no area.
    pub fn iou(&self, other: &BBox) -> f32 {
        let area_a = self.area();
        let area_b = other.area();
        if area_a <= 0.0 || area_b <= 0.0 {
            return 0.0;
        }

        let [ax1, ay1, ax2, ay2] = self.corners();
        let [bx1, by1, bx2, by2] = other.corners();

        let x1 = ax1.max(bx1);
        let y1 = ay1.max(by1);
        let x2 = ax2.min(bx2);
        let y2 = ay2.min(by2);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = area_a + area_b - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// Euclidean distance over the common prefix of two vectors.
///
/// Extra trailing components of the longer vector are ignored, so vectors
/// recorded under a different feature layout still compare, just imprecisely.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}
