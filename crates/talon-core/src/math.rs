//! Spatial and common types

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg, Sub};

/// A 2D vector
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };
    pub const ONE: Self = Self { x: 1.0, y: 1.0 };
    pub const RIGHT: Self = Self { x: 1.0, y: 0.0 };
    /// Screen-space down; the playfield uses y-down coordinates
    pub const DOWN: Self = Self { x: 0.0, y: 1.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn from_array(arr: [f32; 2]) -> Self {
        Self {
            x: arr[0],
            y: arr[1],
        }
    }

    pub fn to_array(&self) -> [f32; 2] {
        [self.x, self.y]
    }

    /// Unit vector pointing along `angle` radians from the +x axis
    pub fn from_angle(angle: f32) -> Self {
        Self {
            x: angle.cos(),
            y: angle.sin(),
        }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn normalized(&self) -> Self {
        let len = self.length();
        if len > 0.0 {
            Self {
                x: self.x / len,
                y: self.y / len,
            }
        } else {
            Self::ZERO
        }
    }

    pub fn dot(&self, other: &Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Angle of this vector in radians, measured from the +x axis
    pub fn angle(&self) -> f32 {
        self.y.atan2(self.x)
    }

    /// Signed angle from this position toward `target`, relative to a
    /// current heading of `heading` radians, wrapped to (-PI, PI]
    pub fn bearing_to(&self, target: Vec2, heading: f32) -> f32 {
        wrap_angle((target - *self).angle() - heading)
    }

    pub fn distance_to(&self, other: Vec2) -> f32 {
        (other - *self).length()
    }
}

impl Add for Vec2 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

impl Sub for Vec2 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;
    fn mul(self, scalar: f32) -> Self {
        Self {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }
}

impl Neg for Vec2 {
    type Output = Self;
    fn neg(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

/// Wrap an angle in radians to the (-PI, PI] interval
pub fn wrap_angle(angle: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped == -PI {
        PI
    } else {
        wrapped
    }
}

/// An axis-aligned rectangle, used for view and play areas
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub const fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    pub fn from_center_size(center: Vec2, size: Vec2) -> Self {
        let half = size * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// Grow the rect outward by `margin` on every side
    pub fn expanded(&self, margin: f32) -> Self {
        let m = Vec2::new(margin, margin);
        Self {
            min: self.min - m,
            max: self.max + m,
        }
    }

    /// Clamp a point to lie inside the rect
    pub fn clamp_point(&self, point: Vec2) -> Vec2 {
        Vec2 {
            x: point.x.clamp(self.min.x, self.max.x),
            y: point.y.clamp(self.min.y, self.max.y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_vec2_ops() {
        let a = Vec2::new(1.0, 2.0);
        let b = Vec2::new(3.0, -1.0);
        assert_eq!(a + b, Vec2::new(4.0, 1.0));
        assert_eq!(a - b, Vec2::new(-2.0, 3.0));
        assert_eq!(a * 2.0, Vec2::new(2.0, 4.0));
        assert_eq!(-a, Vec2::new(-1.0, -2.0));
    }

    #[test]
    fn test_normalized_zero_is_zero() {
        assert_eq!(Vec2::ZERO.normalized(), Vec2::ZERO);
        let n = Vec2::new(3.0, 4.0).normalized();
        assert!((n.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_from_angle_round_trip() {
        let v = Vec2::from_angle(FRAC_PI_2);
        assert!((v.x).abs() < 1e-6);
        assert!((v.y - 1.0).abs() < 1e-6);
        assert!((v.angle() - FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle(3.0 * PI) - PI).abs() < 1e-5);
        assert!((wrap_angle(-3.0 * PI) - PI).abs() < 1e-5);
        assert!((wrap_angle(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_bearing_to_shorter_side() {
        let origin = Vec2::ZERO;
        // Target straight up (y-down space: angle PI/2 is +y), heading +x
        let bearing = origin.bearing_to(Vec2::new(0.0, 1.0), 0.0);
        assert!((bearing - FRAC_PI_2).abs() < 1e-6);
        // Already facing the target
        let bearing = origin.bearing_to(Vec2::new(1.0, 0.0), 0.0);
        assert!(bearing.abs() < 1e-6);
    }

    #[test]
    fn test_rect_contains_and_clamp() {
        let r = Rect::from_center_size(Vec2::ZERO, Vec2::new(10.0, 4.0));
        assert!(r.contains(Vec2::new(4.9, 1.9)));
        assert!(!r.contains(Vec2::new(5.1, 0.0)));
        assert_eq!(r.clamp_point(Vec2::new(20.0, -9.0)), Vec2::new(5.0, -2.0));
        assert!(r.expanded(1.0).contains(Vec2::new(5.5, 0.0)));
    }
}
