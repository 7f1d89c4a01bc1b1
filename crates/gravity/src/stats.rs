//! Per-tick timing and the statistics snapshot.

use std::fmt;

use glam::DVec3;

use crate::bubble::StateCounts;
use crate::config::QualityPreset;
use crate::validation::HealthStatus;

/// Rolling tick timing (exponential moving average).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickTiming {
    pub last_ms: f64,
    pub average_ms: f64,
    pub peak_ms: f64,
    samples: u64,
}

impl TickTiming {
    const SMOOTHING: f64 = 0.1;

    pub fn record(&mut self, ms: f64) {
        self.last_ms = ms;
        self.peak_ms = self.peak_ms.max(ms);
        self.average_ms = if self.samples == 0 {
            ms
        } else {
            self.average_ms + (ms - self.average_ms) * Self::SMOOTHING
        };
        self.samples += 1;
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }
}

/// Snapshot of the whole subsystem.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemStatistics {
    pub tick: u64,
    pub sim_time: f64,
    pub body_count: usize,
    pub active_body_count: usize,
    pub force_calculations_per_frame: usize,
    pub timing: TickTiming,
    pub state_counts: StateCounts,
    /// |Σ F_i| after the last tick (N).
    pub net_force: f64,
    pub total_momentum: DVec3,
    pub total_energy: f64,
    pub health: HealthStatus,
    /// Largest relative error from the last validation.
    pub validation_error: f64,
    pub numeric_instabilities: u64,
    pub quality: QualityPreset,
    pub bubble_update_interval: u32,
    pub near_only: bool,
}

impl fmt::Display for SystemStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Gravity @ tick {} (t = {:.2} s) ===", self.tick, self.sim_time)?;
        writeln!(
            f,
            "Bodies: {} ({} active) | Pairs/frame: {}",
            self.body_count, self.active_body_count, self.force_calculations_per_frame
        )?;
        writeln!(
            f,
            "Bubbles: Near {} | Medium {} | Far {} | Out {}",
            self.state_counts.near, self.state_counts.medium, self.state_counts.far, self.state_counts.out_of_bubble
        )?;
        writeln!(
            f,
            "Tick: {:.3} ms (avg {:.3}, peak {:.3}) | Quality: {} | Cadence: {}{}",
            self.timing.last_ms,
            self.timing.average_ms,
            self.timing.peak_ms,
            self.quality.name(),
            self.bubble_update_interval,
            if self.near_only { " | NEAR-ONLY" } else { "" }
        )?;
        writeln!(
            f,
            "Net force: {:.3e} N | Momentum: ({:.3e}, {:.3e}, {:.3e}) | Energy: {:.6e} J",
            self.net_force, self.total_momentum.x, self.total_momentum.y, self.total_momentum.z, self.total_energy
        )?;
        write!(
            f,
            "Health: {} | Validation error: {:.3e} | Dropped pairs: {}",
            self.health.name(),
            self.validation_error,
            self.numeric_instabilities
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_average_tracks_samples() {
        let mut timing = TickTiming::default();
        timing.record(2.0);
        assert_eq!(timing.average_ms, 2.0);
        timing.record(12.0);
        assert!((timing.average_ms - 3.0).abs() < 1e-12);
        assert_eq!(timing.peak_ms, 12.0);
        assert_eq!(timing.samples(), 2);
    }
}
