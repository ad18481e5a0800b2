use glam::DVec2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Unique identifier for a live viewer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// A fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Coordinate axis of a spatial index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub const BOTH: [Axis; 2] = [Axis::X, Axis::Y];

    /// Lowercase name used when building index set names.
    pub fn name(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
        }
    }

    /// Component of `point` along this axis.
    pub fn of(self, point: DVec2) -> f64 {
        match self {
            Axis::X => point.x,
            Axis::Y => point.y,
        }
    }
}

/// Axis-aligned rectangle in world coordinates. The y axis points up, so the
/// top-left corner is `(min.x, max.y)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: DVec2,
    pub max: DVec2,
}

impl Rect {
    /// Rectangle spanned by two opposite corners, in any order.
    pub fn new(a: DVec2, b: DVec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Rectangle of the given size centered on `center`.
    pub fn from_center_size(center: DVec2, size: DVec2) -> Self {
        let half = size.abs() * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Smallest rectangle containing every point, or `None` for no points.
    pub fn bounding(points: impl IntoIterator<Item = DVec2>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        Some(iter.fold(Self::new(first, first), |rect, p| Self {
            min: rect.min.min(p),
            max: rect.max.max(p),
        }))
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Midpoint of the rectangle.
    pub fn center(&self) -> DVec2 {
        (self.min + self.max) * 0.5
    }

    pub fn top_left(&self) -> DVec2 {
        DVec2::new(self.min.x, self.max.y)
    }

    pub fn bottom_right(&self) -> DVec2 {
        DVec2::new(self.max.x, self.min.y)
    }

    /// Whether `point` lies inside or on the border.
    pub fn contains(&self, point: DVec2) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// Grow the rectangle by `margin` on every side.
    pub fn expand(&self, margin: f64) -> Self {
        Self {
            min: self.min - DVec2::splat(margin),
            max: self.max + DVec2::splat(margin),
        }
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Lower and upper bound along one axis.
    pub fn span(&self, axis: Axis) -> (f64, f64) {
        (axis.of(self.min), axis.of(self.max))
    }
}

/// Seconds since the unix epoch. A clock set before the epoch reads as zero.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Milliseconds since the unix epoch.
pub fn unix_now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_uniqueness() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn rect_from_center_size() {
        let r = Rect::from_center_size(DVec2::ZERO, DVec2::new(2.0, 4.0));
        assert_eq!(r.min, DVec2::new(-1.0, -2.0));
        assert_eq!(r.max, DVec2::new(1.0, 2.0));
        assert_eq!(r.top_left(), DVec2::new(-1.0, 2.0));
        assert_eq!(r.bottom_right(), DVec2::new(1.0, -2.0));
    }

    #[test]
    fn rect_contains_border() {
        let r = Rect::new(DVec2::new(1.0, 1.0), DVec2::new(-1.0, -1.0));
        assert!(r.contains(DVec2::new(1.0, 0.0)));
        assert!(r.contains(DVec2::ZERO));
        assert!(!r.contains(DVec2::new(1.5, 0.0)));
    }

    #[test]
    fn rect_bounding_points() {
        assert!(Rect::bounding(Vec::new()).is_none());
        let r = Rect::bounding([DVec2::new(3.0, -1.0), DVec2::new(-2.0, 5.0)]).unwrap();
        assert_eq!(r.min, DVec2::new(-2.0, -1.0));
        assert_eq!(r.max, DVec2::new(3.0, 5.0));
        assert_eq!(r.span(Axis::Y), (-1.0, 5.0));
    }

    #[test]
    fn clock_is_after_epoch() {
        assert!(unix_now() > 0);
        assert!(unix_now_millis() >= unix_now() * 1000);
    }
}
