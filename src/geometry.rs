use imageproc::point::Point;
use imageproc::rect::Rect;

/// A quadrilateral with corners in (top-left, top-right, bottom-right,
/// bottom-left) order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub top_left: Point<f32>,
    pub top_right: Point<f32>,
    pub bottom_right: Point<f32>,
    pub bottom_left: Point<f32>,
}

impl Quad {
    /// Orders four arbitrary corner points. The top-left corner has the
    /// minimal coordinate sum and the bottom-right the maximal; the top-right
    /// has the maximal x−y difference and the bottom-left the minimal.
    pub fn from_unordered(points: [Point<f32>; 4]) -> Self {
        let sum = |p: &Point<f32>| p.x + p.y;
        let diff = |p: &Point<f32>| p.x - p.y;

        let top_left = points
            .iter()
            .min_by(|a, b| sum(a).partial_cmp(&sum(b)).expect("finite coordinates"))
            .copied()
            .expect("four points");
        let bottom_right = points
            .iter()
            .max_by(|a, b| sum(a).partial_cmp(&sum(b)).expect("finite coordinates"))
            .copied()
            .expect("four points");
        let top_right = points
            .iter()
            .max_by(|a, b| diff(a).partial_cmp(&diff(b)).expect("finite coordinates"))
            .copied()
            .expect("four points");
        let bottom_left = points
            .iter()
            .min_by(|a, b| diff(a).partial_cmp(&diff(b)).expect("finite coordinates"))
            .copied()
            .expect("four points");

        Self {
            top_left,
            top_right,
            bottom_right,
            bottom_left,
        }
    }

    /// Size of the axis-aligned rectangle this quadrilateral maps onto:
    /// the longer of each pair of opposing edges, in pixels.
    pub fn target_size(&self) -> (u32, u32) {
        let bottom_width = distance(&self.bottom_right, &self.bottom_left);
        let top_width = distance(&self.top_right, &self.top_left);
        let right_height = distance(&self.top_right, &self.bottom_right);
        let left_height = distance(&self.top_left, &self.bottom_left);

        let width = bottom_width.max(top_width) as u32;
        let height = right_height.max(left_height) as u32;
        (width.max(1), height.max(1))
    }

    /// Corners as control points in (top-left, top-right, bottom-right,
    /// bottom-left) order.
    pub fn control_points(&self) -> [(f32, f32); 4] {
        [
            (self.top_left.x, self.top_left.y),
            (self.top_right.x, self.top_right.y),
            (self.bottom_right.x, self.bottom_right.y),
            (self.bottom_left.x, self.bottom_left.y),
        ]
    }
}

pub fn distance(p1: &Point<f32>, p2: &Point<f32>) -> f32 {
    ((p1.x - p2.x).powf(2.0) + (p1.y - p2.y).powf(2.0)).sqrt()
}

/// Area enclosed by a closed contour, via the shoelace formula.
pub fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let mut doubled_area = 0i64;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        doubled_area += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    doubled_area.unsigned_abs() as f64 / 2.0
}

/// Bounding rectangle of a non-empty set of contour points.
pub fn bounding_rect(points: &[Point<i32>]) -> Rect {
    let mut min_x = i32::MAX;
    let mut min_y = i32::MAX;
    let mut max_x = i32::MIN;
    let mut max_y = i32::MIN;

    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    Rect::at(min_x, min_y).of_size((max_x - min_x + 1) as u32, (max_y - min_y + 1) as u32)
}

pub fn center_of_rect(rect: &Rect) -> Point<f32> {
    Point::new(
        rect.left() as f32 + rect.width() as f32 / 2.0,
        rect.top() as f32 + rect.height() as f32 / 2.0,
    )
}
