use serde::Serialize;

/// Screen point in pixels.
pub type Point = (i32, i32);

/// Four-corner text box as reported by OCR. Corners are kept in the order the
/// backend produced them; only the per-axis extremes are ever interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub corners: [Point; 4],
}

impl BoundingBox {
    pub fn new(corners: [Point; 4]) -> Self {
        Self { corners }
    }

    /// Axis-aligned box from a top-left origin and a size.
    pub fn from_rect(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self {
            corners: [(x, y), (x + w, y), (x + w, y + h), (x, y + h)],
        }
    }

    /// Truncated average of the four corners, per axis.
    pub fn center(&self) -> Point {
        let sum_x: i32 = self.corners.iter().map(|p| p.0).sum();
        let sum_y: i32 = self.corners.iter().map(|p| p.1).sum();
        (sum_x / 4, sum_y / 4)
    }

    pub fn left(&self) -> i32 {
        self.corners.iter().map(|p| p.0).min().unwrap_or(0)
    }

    pub fn right(&self) -> i32 {
        self.corners.iter().map(|p| p.0).max().unwrap_or(0)
    }

    pub fn top(&self) -> i32 {
        self.corners.iter().map(|p| p.1).min().unwrap_or(0)
    }

    pub fn bottom(&self) -> i32 {
        self.corners.iter().map(|p| p.1).max().unwrap_or(0)
    }

    pub fn width(&self) -> i32 {
        self.right() - self.left()
    }

    /// Row height used for "one entry below" offsets in the editor's lists.
    pub fn height(&self) -> i32 {
        self.bottom() - self.top()
    }

    /// Smallest axis-aligned box covering both.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let left = self.left().min(other.left());
        let top = self.top().min(other.top());
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        BoundingBox::from_rect(left, top, right - left, bottom - top)
    }
}

/// A click target: the point to click plus the box it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedLocation {
    pub x: i32,
    pub y: i32,
    pub bbox: BoundingBox,
}

impl ResolvedLocation {
    pub fn at_center(bbox: BoundingBox) -> Self {
        let (x, y) = bbox.center();
        Self { x, y, bbox }
    }

    /// Same column, `rows` row-heights further down. `None` when the
    /// offset does not fit in screen coordinates.
    pub fn rows_below(&self, rows: i32) -> Option<Self> {
        let y = self
            .bbox
            .height()
            .checked_mul(rows)
            .and_then(|offset| self.y.checked_add(offset))?;
        Some(Self {
            x: self.x,
            y,
            bbox: self.bbox,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_of_axis_aligned_box() {
        let bbox = BoundingBox::new([(0, 0), (0, 10), (20, 0), (20, 10)]);
        assert_eq!(bbox.center(), (10, 5));
    }

    #[test]
    fn center_truncates_per_axis() {
        let bbox = BoundingBox::new([(1, 2), (4, 3), (6, 9), (2, 7)]);
        // (13 / 4, 21 / 4)
        assert_eq!(bbox.center(), (3, 5));
    }

    #[test]
    fn height_spans_top_to_bottom() {
        let bbox = BoundingBox::from_rect(40, 5, 60, 20);
        assert_eq!(bbox.top(), 5);
        assert_eq!(bbox.bottom(), 25);
        assert_eq!(bbox.height(), 20);
    }

    #[test]
    fn rows_below_offsets_by_box_height() {
        let anchor = ResolvedLocation::at_center(BoundingBox::from_rect(10, 90, 50, 20));
        assert_eq!((anchor.x, anchor.y), (35, 100));
        let target = anchor.rows_below(2).unwrap();
        assert_eq!((target.x, target.y), (35, 140));
    }

    #[test]
    fn rows_below_rejects_overflowing_offsets() {
        let anchor = ResolvedLocation::at_center(BoundingBox::from_rect(10, 90, 50, 20));
        assert_eq!(anchor.rows_below(i32::MAX), None);
        assert_eq!(anchor.rows_below(i32::MAX / 20), None);
    }

    #[test]
    fn union_covers_both_boxes() {
        let a = BoundingBox::from_rect(10, 10, 20, 10);
        let b = BoundingBox::from_rect(35, 8, 15, 14);
        let merged = a.union(&b);
        assert_eq!(merged.left(), 10);
        assert_eq!(merged.top(), 8);
        assert_eq!(merged.right(), 50);
        assert_eq!(merged.bottom(), 22);
    }
}
