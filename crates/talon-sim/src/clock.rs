//! Simulation clock with fixed-timestep accumulator

/// Tracks simulation time and provides a fixed-timestep accumulator.
///
/// The clock never reads a wall clock: hosts feed frame deltas in and
/// consume whole fixed steps out, so every timer in the simulation runs
/// on accumulated simulation time.
pub struct SimClock {
    /// Total elapsed simulation time in seconds
    pub total_time: f64,
    /// Fixed timestep interval (default: 1/60 second)
    pub fixed_timestep: f64,
    /// Accumulated time for fixed-step consumption
    accumulator: f64,
}

impl Default for SimClock {
    fn default() -> Self {
        Self {
            total_time: 0.0,
            fixed_timestep: 1.0 / 60.0,
            accumulator: 0.0,
        }
    }
}

impl SimClock {
    /// Create a new clock with the default 60Hz fixed timestep
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock with a custom fixed timestep
    pub fn with_fixed_timestep(hz: f64) -> Self {
        Self {
            fixed_timestep: 1.0 / hz,
            ..Self::default()
        }
    }

    /// Feed one frame's delta into the accumulator. Call once per frame.
    pub fn advance(&mut self, frame_delta: f64) {
        // Clamp to avoid spiral of death (max 250ms frame time)
        self.accumulator += frame_delta.max(0.0).min(0.25);
    }

    /// Returns true if there's enough accumulated time for a fixed step
    pub fn should_step(&self) -> bool {
        self.accumulator >= self.fixed_timestep
    }

    /// Consume one fixed timestep, returning its length in seconds
    pub fn consume_step(&mut self) -> f64 {
        self.accumulator -= self.fixed_timestep;
        self.total_time += self.fixed_timestep;
        self.fixed_timestep
    }

    /// Interpolation alpha for rendering between fixed steps
    pub fn interpolation_alpha(&self) -> f64 {
        self.accumulator / self.fixed_timestep
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_defaults() {
        let clock = SimClock::new();
        assert!((clock.fixed_timestep - 1.0 / 60.0).abs() < 1e-10);
        assert_eq!(clock.total_time, 0.0);
        assert!(!clock.should_step());
    }

    #[test]
    fn test_custom_timestep() {
        let clock = SimClock::with_fixed_timestep(30.0);
        assert!((clock.fixed_timestep - 1.0 / 30.0).abs() < 1e-10);
    }

    #[test]
    fn test_accumulator_logic() {
        let mut clock = SimClock::new();
        clock.advance(1.0 / 30.0); // Two fixed steps worth

        assert!(clock.should_step());
        clock.consume_step();
        assert!(clock.should_step());
        clock.consume_step();
        assert!(!clock.should_step());
        assert!((clock.total_time - 1.0 / 30.0).abs() < 1e-10);
    }

    #[test]
    fn test_huge_frame_clamped() {
        let mut clock = SimClock::new();
        clock.advance(10.0);
        let mut steps = 0;
        while clock.should_step() {
            clock.consume_step();
            steps += 1;
        }
        // 250ms cap at 60Hz
        assert_eq!(steps, 15);
    }

    #[test]
    fn test_interpolation_alpha() {
        let mut clock = SimClock::new();
        clock.advance(clock.fixed_timestep * 0.5);
        let alpha = clock.interpolation_alpha();
        assert!((alpha - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_negative_delta_ignored() {
        let mut clock = SimClock::new();
        clock.advance(-1.0);
        assert!(!clock.should_step());
    }
}
