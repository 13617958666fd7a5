// Screen-space geometry. The origin is the bottom-left corner of the screen and
// y grows upward, matching the host UI layer's coordinate space.

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

/// Clamp `v` into `0.0..=1.0`.
#[inline]
pub fn clamp01(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

/// A point or offset in screen pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    /// Horizontal component.
    pub x: f32,
    /// Vertical component.
    pub y: f32,
}

impl Vec2 {
    /// Origin.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };
    /// Unit vector pointing up the screen.
    pub const UP: Self = Self { x: 0.0, y: 1.0 };

    /// Construct a vector.
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Linear interpolation towards `to`; `t` is clamped to `0..=1`.
    #[inline]
    pub fn lerp(self, to: Self, t: f32) -> Self {
        let t = clamp01(t);
        Self::new(self.x + (to.x - self.x) * t, self.y + (to.y - self.y) * t)
    }

    /// Euclidean distance to `other`.
    #[inline]
    pub fn distance(self, other: Self) -> f32 {
        let d = other - self;
        (d.x * d.x + d.y * d.y).sqrt()
    }

    /// Component-wise clamp into `min..=max`.
    #[inline]
    pub fn clamp(self, min: Self, max: Self) -> Self {
        Self::new(self.x.clamp(min.x, max.x), self.y.clamp(min.y, max.y))
    }
}

impl Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

/// Axis-aligned rectangle; `(x, y)` is the bottom-left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: f32,
    /// Bottom edge.
    pub y: f32,
    /// Width.
    pub w: f32,
    /// Height.
    pub h: f32,
}

impl Rect {
    /// Construct a rectangle from its bottom-left corner and size.
    #[inline]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }
    /// Left edge.
    #[inline]
    pub fn left(&self) -> f32 {
        self.x
    }
    /// Right edge.
    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.w
    }
    /// Bottom edge.
    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y
    }
    /// Top edge.
    #[inline]
    pub fn top(&self) -> f32 {
        self.y + self.h
    }
    /// Center point.
    #[inline]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// Whether `p` lies inside (edges inclusive).
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.left() && p.x <= self.right() && p.y >= self.bottom() && p.y <= self.top()
    }

    /// Whether the vertical extent of `other` lies fully inside this rect.
    pub fn contains_vertically(&self, other: &Self) -> bool {
        other.bottom() >= self.bottom() && other.top() <= self.top()
    }

    /// Whether the rectangles overlap.
    pub fn intersects(&self, other: &Self) -> bool {
        self.left() < other.right()
            && other.left() < self.right()
            && self.bottom() < other.top()
            && other.bottom() < self.top()
    }

    /// Same rectangle moved by `offset`.
    pub fn translated(&self, offset: Vec2) -> Self {
        Self::new(self.x + offset.x, self.y + offset.y, self.w, self.h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lerp_clamps_parameter() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(10.0, 20.0);
        assert_eq!(a.lerp(b, 0.5), Vec2::new(5.0, 10.0));
        assert_eq!(a.lerp(b, 2.0), b);
        assert_eq!(a.lerp(b, -1.0), a);
    }

    #[test]
    fn vertical_containment() {
        let viewport = Rect::new(0.0, 100.0, 200.0, 300.0);
        assert!(viewport.contains_vertically(&Rect::new(10.0, 150.0, 50.0, 40.0)));
        assert!(!viewport.contains_vertically(&Rect::new(10.0, 80.0, 50.0, 40.0)));
        assert!(!viewport.contains_vertically(&Rect::new(10.0, 380.0, 50.0, 40.0)));
    }
}
