//! Floating-origin helper: keeps the observer near the coordinate origin.

use glam::DVec3;

/// Decides when the world should be recentered on the observer.
#[derive(Debug, Clone)]
pub struct FloatingOrigin {
    /// Distance from the origin beyond which a recenter is requested (metres).
    pub threshold: f64,
    /// Sum of all offsets applied so far; world = local + total_offset.
    total_offset: DVec3,
}

impl FloatingOrigin {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.abs(),
            total_offset: DVec3::ZERO,
        }
    }

    /// If the observer has drifted past the threshold, return the translation to
    /// apply to every position (the negated observer position) and record it.
    pub fn check(&mut self, observer: DVec3) -> Option<DVec3> {
        if !observer.is_finite() || observer.length() <= self.threshold {
            return None;
        }
        let offset = -observer;
        self.total_offset -= offset;
        log::debug!("Floating origin rebase by {:?}", offset);
        Some(offset)
    }

    /// Accumulated origin shift.
    pub fn total_offset(&self) -> DVec3 {
        self.total_offset
    }

    /// Convert a local position to the absolute frame.
    pub fn to_absolute(&self, local: DVec3) -> DVec3 {
        local + self.total_offset
    }
}
