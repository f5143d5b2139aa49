use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};

// ─────────────────────────────────────────────────────────────────────────────
// Point2
// ─────────────────────────────────────────────────────────────────────────────

/// A position (or offset) in one of the two planar spaces.
///
/// Serializes as a bare `[x, y]` pair to stay compatible with the historical
/// compiled-map documents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    /// The origin (0, 0).
    pub const ZERO: Self = Self::new(0.0, 0.0);

    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Create a Point2 from an array.
    #[must_use]
    pub const fn from_array(arr: [f64; 2]) -> Self {
        Self::new(arr[0], arr[1])
    }

    /// Convert to an array.
    #[must_use]
    pub const fn to_array(self) -> [f64; 2] {
        [self.x, self.y]
    }

    #[must_use]
    pub fn length(self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    #[must_use]
    pub fn distance(self, rhs: Self) -> f64 {
        (self - rhs).length()
    }

    /// Angle of this offset vector measured from the +Y axis, `atan2(x, y)`.
    ///
    /// The sector bookkeeping throughout the crate uses this x-first
    /// convention; it is part of the compiled-state contract and must not be
    /// swapped for the usual `atan2(y, x)`.
    #[must_use]
    pub fn bearing(self) -> f64 {
        self.x.atan2(self.y)
    }

    /// Linear interpolation: `self * (1 - t) + rhs * t`.
    #[must_use]
    pub fn lerp(self, rhs: Self, t: f64) -> Self {
        Self::new(self.x + (rhs.x - self.x) * t, self.y + (rhs.y - self.y) * t)
    }

    /// Replace negative zero components with positive zero.
    ///
    /// Coordinate keys derived from bit patterns must treat `-0.0` and `0.0`
    /// as the same position.
    #[must_use]
    pub fn normalize_zero(self) -> Self {
        let fix = |v: f64| if v == 0.0 { 0.0 } else { v };
        Self::new(fix(self.x), fix(self.y))
    }
}

impl Default for Point2 {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<[f64; 2]> for Point2 {
    fn from(arr: [f64; 2]) -> Self {
        Self::from_array(arr)
    }
}

impl From<Point2> for [f64; 2] {
    fn from(p: Point2) -> Self {
        p.to_array()
    }
}

impl From<Point2> for geo::Coord<f64> {
    fn from(p: Point2) -> Self {
        geo::Coord { x: p.x, y: p.y }
    }
}

impl From<Point2> for geo::Point<f64> {
    fn from(p: Point2) -> Self {
        geo::Point::new(p.x, p.y)
    }
}

impl From<geo::Coord<f64>> for Point2 {
    fn from(c: geo::Coord<f64>) -> Self {
        Self::new(c.x, c.y)
    }
}

impl Add for Point2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point2 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f64> for Point2 {
    type Output = Self;
    fn div(self, rhs: f64) -> Self::Output {
        Self::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Point2 {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PointPair
// ─────────────────────────────────────────────────────────────────────────────

/// A correspondence between an illustration-space coordinate and a
/// geographic-space coordinate.
///
/// Serializes as `[[x, y], [x, y]]` (illustration first), matching the
/// `points` and `edgeNodes` arrays of compiled-map documents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[Point2; 2]", into = "[Point2; 2]")]
pub struct PointPair {
    pub forw: Point2,
    pub bakw: Point2,
}

impl PointPair {
    #[must_use]
    pub const fn new(forw: Point2, bakw: Point2) -> Self {
        Self { forw, bakw }
    }

    /// The coordinate local to `backward`: illustration when `false`,
    /// geographic when `true`.
    #[must_use]
    pub const fn local(self, backward: bool) -> Point2 {
        if backward { self.bakw } else { self.forw }
    }

    /// Swap the two coordinate roles.
    #[must_use]
    pub const fn flipped(self) -> Self {
        Self::new(self.bakw, self.forw)
    }
}

impl From<[Point2; 2]> for PointPair {
    fn from(arr: [Point2; 2]) -> Self {
        Self::new(arr[0], arr[1])
    }
}

impl From<PointPair> for [Point2; 2] {
    fn from(p: PointPair) -> Self {
        [p.forw, p.bakw]
    }
}
