use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn translate(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn scale(self, factor: f32) -> Self {
        Self::new(
            (self.x as f32 * factor).round() as i32,
            (self.y as f32 * factor).round() as i32,
        )
    }
}

/// Bounding quadrilateral of a detected symbol, clockwise from top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Corners(pub [Point; 4]);

impl Corners {
    pub fn map(self, f: impl Fn(Point) -> Point) -> Self {
        let [a, b, c, d] = self.0;
        Corners([f(a), f(b), f(c), f(d)])
    }

    pub fn points(&self) -> &[Point; 4] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_map_back_to_source_space() {
        let corners = Corners([
            Point::new(10, 10),
            Point::new(20, 10),
            Point::new(20, 20),
            Point::new(10, 20),
        ]);
        let mapped = corners.map(|p| p.scale(2.0).translate(5, 0));
        assert_eq!(mapped.points()[0], Point::new(25, 20));
        assert_eq!(mapped.points()[2], Point::new(45, 40));
    }
}
