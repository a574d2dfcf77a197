//! Input state management
//!
//! The host's input layer maps physical devices to normalized strengths
//! and writes them here; player-piloted entities read them during their
//! movement and firing passes. Nothing below strength level (key codes,
//! gamepads, dead zones) reaches the simulation.

use std::collections::HashMap;
use talon_core::Vec2;

/// The five axes a player-piloted entity consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Up,
    Down,
    Left,
    Right,
    Fire,
}

/// Per-device normalized input strengths
#[derive(Debug, Default)]
pub struct InputState {
    strengths: HashMap<(u32, Axis), f32>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one axis strength, clamped to [0, 1]
    pub fn set_axis(&mut self, device: u32, axis: Axis, strength: f32) {
        self.strengths
            .insert((device, axis), strength.clamp(0.0, 1.0));
    }

    /// Read one axis strength; unset axes read as 0
    pub fn axis(&self, device: u32, axis: Axis) -> f32 {
        self.strengths.get(&(device, axis)).copied().unwrap_or(0.0)
    }

    /// Normalized movement direction from the four directional axes
    pub fn move_vector(&self, device: u32) -> Vec2 {
        Vec2::new(
            self.axis(device, Axis::Right) - self.axis(device, Axis::Left),
            self.axis(device, Axis::Down) - self.axis(device, Axis::Up),
        )
        .normalized()
    }

    /// Fire strength; anything above zero counts as held
    pub fn fire(&self, device: u32) -> f32 {
        self.axis(device, Axis::Fire)
    }

    /// Drop all strengths for one device
    pub fn clear_device(&mut self, device: u32) {
        self.strengths.retain(|(d, _), _| *d != device);
    }

    /// Drop all strengths
    pub fn clear(&mut self) {
        self.strengths.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_axes_read_zero() {
        let input = InputState::new();
        assert_eq!(input.axis(0, Axis::Fire), 0.0);
        assert_eq!(input.move_vector(0), Vec2::ZERO);
    }

    #[test]
    fn test_move_vector_normalized() {
        let mut input = InputState::new();
        input.set_axis(0, Axis::Right, 1.0);
        input.set_axis(0, Axis::Down, 1.0);
        let v = input.move_vector(0);
        assert!((v.length() - 1.0).abs() < 1e-6);
        assert!(v.x > 0.0 && v.y > 0.0);
    }

    #[test]
    fn test_strength_clamped() {
        let mut input = InputState::new();
        input.set_axis(1, Axis::Fire, 3.0);
        assert_eq!(input.fire(1), 1.0);
        input.set_axis(1, Axis::Fire, -2.0);
        assert_eq!(input.fire(1), 0.0);
    }

    #[test]
    fn test_devices_independent() {
        let mut input = InputState::new();
        input.set_axis(0, Axis::Left, 1.0);
        input.set_axis(1, Axis::Right, 0.5);
        assert_eq!(input.axis(0, Axis::Left), 1.0);
        assert_eq!(input.axis(1, Axis::Left), 0.0);
        input.clear_device(0);
        assert_eq!(input.axis(0, Axis::Left), 0.0);
        assert_eq!(input.axis(1, Axis::Right), 0.5);
    }
}
