//! Screen geometry — points, regions and template match results.

use serde::{Deserialize, Serialize};

/// A pixel position on screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Shift the point by `(dx, dy)`, saturating at the `i32` bounds.
    #[must_use]
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A rectangular screen area, used to restrict searches and to describe matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    #[must_use]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Centre of the region, rounded towards the top-left.
    #[must_use]
    pub fn center(&self) -> Point {
        let half_w = i32::try_from(self.width / 2).unwrap_or(i32::MAX);
        let half_h = i32::try_from(self.height / 2).unwrap_or(i32::MAX);
        Point::new(self.x, self.y).offset(half_w, half_h)
    }

    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        let right = i64::from(self.x) + i64::from(self.width);
        let bottom = i64::from(self.y) + i64::from(self.height);
        point.x >= self.x
            && point.y >= self.y
            && i64::from(point.x) < right
            && i64::from(point.y) < bottom
    }
}

/// Outcome of a template search. "Not found" is a normal result, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchResult {
    pub found: bool,
    /// Centre of the matched area.
    pub point: Option<Point>,
    pub region: Option<Region>,
    /// Confidence threshold the match was accepted with.
    pub confidence: Option<f32>,
}

impl MatchResult {
    #[must_use]
    pub fn not_found() -> Self {
        Self::default()
    }

    /// A match described by the area it covers; the point is its centre.
    #[must_use]
    pub fn found_in(region: Region, confidence: Option<f32>) -> Self {
        Self {
            found: true,
            point: Some(region.center()),
            region: Some(region),
            confidence,
        }
    }

    /// A match known only by its point.
    #[must_use]
    pub fn found_at(point: Point) -> Self {
        Self {
            found: true,
            point: Some(point),
            region: None,
            confidence: None,
        }
    }

    /// The matched point, only when the search succeeded.
    #[must_use]
    pub fn location(&self) -> Option<Point> {
        if self.found { self.point } else { None }
    }
}
