//! Pure path math - Catmull-Rom curve sampling for scripted movement.
//!
//! A `PathCurve` is parameterized by time: each control-point segment
//! spans one second, so a curve with N points lasts N-1 seconds open or
//! N seconds looping. Entities sample it at consecutive elapsed times
//! and steer along the direction between samples.

use crate::Vec2;
use serde::{Deserialize, Serialize};

/// Catmull-Rom spline interpolation between four points.
pub fn catmull_rom(p0: Vec2, p1: Vec2, p2: Vec2, p3: Vec2, t: f32) -> Vec2 {
    let t2 = t * t;
    let t3 = t2 * t;
    Vec2::new(
        0.5 * ((2.0 * p1.x)
            + (-p0.x + p2.x) * t
            + (2.0 * p0.x - 5.0 * p1.x + 4.0 * p2.x - p3.x) * t2
            + (-p0.x + 3.0 * p1.x - 3.0 * p2.x + p3.x) * t3),
        0.5 * ((2.0 * p1.y)
            + (-p0.y + p2.y) * t
            + (2.0 * p0.y - 5.0 * p1.y + 4.0 * p2.y - p3.y) * t2
            + (-p0.y + 3.0 * p1.y - 3.0 * p2.y + p3.y) * t3),
    )
}

/// A position sampled from a path at a parametric time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathSample {
    pub position: Vec2,
    pub t: f32,
}

/// A Catmull-Rom movement path over 2D control points.
///
/// Open paths get phantom endpoints by reflecting the first and last
/// interior segments outward; looping paths wrap their indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathCurve {
    points: Vec<Vec2>,
    looping: bool,
}

impl PathCurve {
    pub fn new(points: Vec<Vec2>, looping: bool) -> Self {
        Self { points, looping }
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    /// Parametric end time: one second per segment.
    pub fn end_time(&self) -> f32 {
        let n = self.points.len();
        if n < 2 {
            return 0.0;
        }
        if self.looping {
            n as f32
        } else {
            (n - 1) as f32
        }
    }

    /// Sample the curve at parametric time `t` seconds.
    ///
    /// Looping curves wrap `t` across the end; open curves clamp it, so
    /// sampling past the end keeps returning the final point.
    pub fn sample(&self, t: f32) -> PathSample {
        let n = self.points.len();
        if n == 0 {
            return PathSample {
                position: Vec2::ZERO,
                t: 0.0,
            };
        }
        if n == 1 {
            return PathSample {
                position: self.points[0],
                t: 0.0,
            };
        }

        if self.looping {
            let end = n as f32;
            let t = t.rem_euclid(end);
            let seg = (t.floor() as usize) % n;
            let local = t - t.floor();
            let p0 = self.points[(seg + n - 1) % n];
            let p1 = self.points[seg];
            let p2 = self.points[(seg + 1) % n];
            let p3 = self.points[(seg + 2) % n];
            PathSample {
                position: catmull_rom(p0, p1, p2, p3, local),
                t,
            }
        } else {
            let num_segs = n - 1;
            let t = t.clamp(0.0, num_segs as f32);
            let seg = (t.floor() as usize).min(num_segs - 1);
            let local = t - seg as f32;
            let p1 = self.points[seg];
            let p2 = self.points[seg + 1];
            let p0 = if seg == 0 {
                // Phantom start: reflect the first segment
                self.points[0] * 2.0 - self.points[1]
            } else {
                self.points[seg - 1]
            };
            let p3 = if seg + 2 < n {
                self.points[seg + 2]
            } else {
                // Phantom end: reflect the last segment
                self.points[n - 1] * 2.0 - self.points[n - 2]
            };
            PathSample {
                position: catmull_rom(p0, p1, p2, p3, local),
                t,
            }
        }
    }
}
