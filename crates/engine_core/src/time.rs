//! Fixed-step clock for the simulation loop.

use std::time::{Duration, Instant};

/// Turns wall-clock frames into a whole number of fixed physics steps.
#[derive(Debug)]
pub struct SimClock {
    /// Time of the last frame.
    last_frame: Instant,
    /// Duration of the last frame.
    delta: Duration,
    /// Simulated time consumed by fixed steps, in seconds.
    sim_time: f64,
    /// Number of fixed steps taken since start.
    step_count: u64,
    /// Fixed timestep for physics (default 60 Hz).
    fixed_timestep: Duration,
    /// Accumulated wall time not yet consumed by fixed steps.
    accumulator: Duration,
    /// Upper bound on steps per frame so a stall cannot snowball.
    max_steps_per_frame: u32,
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SimClock {
    /// Create a new clock running at 60 Hz.
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            delta: Duration::ZERO,
            sim_time: 0.0,
            step_count: 0,
            fixed_timestep: Duration::from_secs_f64(1.0 / 60.0),
            accumulator: Duration::ZERO,
            max_steps_per_frame: 8,
        }
    }

    /// Create a clock with the given step rate in Hz.
    pub fn with_rate(hz: f64) -> Self {
        let mut clock = Self::new();
        clock.set_fixed_rate(hz);
        clock
    }

    /// Sample wall time at the start of a frame and return how many fixed steps to run.
    pub fn advance(&mut self) -> u32 {
        let now = Instant::now();
        let delta = now - self.last_frame;
        self.last_frame = now;
        self.advance_by(delta)
    }

    /// Feed an explicit frame duration (headless runs, tests).
    pub fn advance_by(&mut self, delta: Duration) -> u32 {
        self.delta = delta;
        self.accumulator += delta;

        let mut steps = 0;
        while self.accumulator >= self.fixed_timestep {
            self.accumulator -= self.fixed_timestep;
            steps += 1;
            if steps == self.max_steps_per_frame {
                if self.accumulator >= self.fixed_timestep {
                    log::debug!(
                        "Clock behind by {:.1} ms, dropping backlog",
                        self.accumulator.as_secs_f64() * 1000.0
                    );
                }
                self.accumulator = Duration::ZERO;
                break;
            }
        }

        self.step_count += steps as u64;
        self.sim_time += steps as f64 * self.fixed_timestep.as_secs_f64();
        steps
    }

    /// Duration of the last frame.
    pub fn delta(&self) -> Duration {
        self.delta
    }

    /// Total simulated time in seconds.
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    /// Number of fixed steps taken.
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Get the fixed timestep in seconds.
    pub fn fixed_timestep_seconds(&self) -> f64 {
        self.fixed_timestep.as_secs_f64()
    }

    /// Set the fixed timestep rate in Hz.
    pub fn set_fixed_rate(&mut self, hz: f64) {
        let hz = if hz.is_finite() && hz > 0.0 { hz } else { 60.0 };
        self.fixed_timestep = Duration::from_secs_f64(1.0 / hz);
    }

    /// Cap on fixed steps per frame (minimum 1).
    pub fn set_max_steps_per_frame(&mut self, max: u32) {
        self.max_steps_per_frame = max.max(1);
    }
}
