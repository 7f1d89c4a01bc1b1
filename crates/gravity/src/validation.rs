//! Conservation-law checks used as a correctness and health signal.
//!
//! Three checks run against the post-tick state: the net force over all bodies
//! (Newton's third law), total linear momentum against a baseline, and total
//! energy against a baseline.

use glam::DVec3;

use crate::config::GravityConfig;
use crate::nbody::NBodyGravityComponent;

/// Floor used when normalising drift by a quantity that may be zero.
const NORMALISATION_FLOOR: f64 = 1e-12;

/// Which conservation law a result refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationCheck {
    ForceSumToZero,
    MomentumConservation,
    EnergyConservation,
}

impl ValidationCheck {
    pub fn name(self) -> &'static str {
        match self {
            ValidationCheck::ForceSumToZero => "ForceSumToZero",
            ValidationCheck::MomentumConservation => "MomentumConservation",
            ValidationCheck::EnergyConservation => "EnergyConservation",
        }
    }
}

/// Outcome of one check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckResult {
    pub check: ValidationCheck,
    /// Relative error (dimensionless).
    pub error: f64,
    pub tolerance: f64,
    pub passed: bool,
}

impl CheckResult {
    fn new(check: ValidationCheck, error: f64, tolerance: f64) -> Self {
        Self {
            check,
            error,
            tolerance,
            passed: error.is_finite() && error <= tolerance,
        }
    }
}

/// Reference quantities captured when the interacting set last changed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConservationBaseline {
    pub momentum: DVec3,
    pub energy: f64,
    pub tick: u64,
}

impl ConservationBaseline {
    pub fn capture(nbody: &NBodyGravityComponent, tick: u64) -> Self {
        Self {
            momentum: nbody.total_momentum(),
            energy: nbody.total_energy(),
            tick,
        }
    }
}

/// Result of a full validation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub tick: u64,
    pub results: Vec<CheckResult>,
    /// |Σ F_i| in newtons.
    pub force_residual: f64,
    pub momentum: DVec3,
    pub energy: f64,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    /// Largest relative error across the checks.
    pub fn max_error(&self) -> f64 {
        self.results.iter().map(|r| r.error).fold(0.0, f64::max)
    }

    pub fn result(&self, check: ValidationCheck) -> Option<&CheckResult> {
        self.results.iter().find(|r| r.check == check)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.iter().filter(|r| !r.passed)
    }
}

/// Tolerances for the three checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    pub force: f64,
    pub momentum: f64,
    pub energy: f64,
}

impl Tolerances {
    pub fn from_config(config: &GravityConfig) -> Self {
        Self {
            force: config.force_tolerance,
            momentum: config.momentum_tolerance,
            energy: config.energy_tolerance,
        }
    }
}

/// `|Σ F_i| / Σ |F_i|`; zero when no force acted.
pub fn force_sum_error(nbody: &NBodyGravityComponent) -> (f64, f64) {
    let (sum, magnitude) = nbody.net_force_sum();
    let residual = sum.length();
    let error = if magnitude > NORMALISATION_FLOOR { residual / magnitude } else { 0.0 };
    (residual, error)
}

/// Momentum drift normalised by `max(|p₀|, Σ m|v|)`.
pub fn momentum_drift(baseline: DVec3, current: DVec3, magnitude_sum: f64) -> f64 {
    let scale = baseline.length().max(magnitude_sum);
    let drift = (current - baseline).length();
    if scale > NORMALISATION_FLOOR {
        drift / scale
    } else {
        drift
    }
}

/// Relative energy drift `|E - E₀| / |E₀|`.
pub fn energy_drift(baseline: f64, current: f64) -> f64 {
    if baseline.abs() > NORMALISATION_FLOOR {
        (current - baseline).abs() / baseline.abs()
    } else {
        (current - baseline).abs()
    }
}

/// Run every check against the baseline.
pub fn validate(nbody: &NBodyGravityComponent, baseline: &ConservationBaseline, tolerances: Tolerances, tick: u64) -> ValidationReport {
    let (force_residual, force_error) = force_sum_error(nbody);
    let momentum = nbody.total_momentum();
    let energy = nbody.total_energy();

    let results = vec![
        CheckResult::new(ValidationCheck::ForceSumToZero, force_error, tolerances.force),
        CheckResult::new(
            ValidationCheck::MomentumConservation,
            momentum_drift(baseline.momentum, momentum, nbody.momentum_magnitude_sum()),
            tolerances.momentum,
        ),
        CheckResult::new(
            ValidationCheck::EnergyConservation,
            energy_drift(baseline.energy, energy),
            tolerances.energy,
        ),
    ];

    ValidationReport {
        tick,
        results,
        force_residual,
        momentum,
        energy,
    }
}

/// Overall health, worst last.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HealthStatus {
    #[default]
    Healthy,
    Warning,
    Critical,
    Failed,
}

impl HealthStatus {
    /// One step worse; Failed stays Failed.
    pub fn degraded(self) -> Self {
        match self {
            HealthStatus::Healthy => HealthStatus::Warning,
            HealthStatus::Warning => HealthStatus::Critical,
            HealthStatus::Critical | HealthStatus::Failed => HealthStatus::Failed,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HealthStatus::Healthy => "Healthy",
            HealthStatus::Warning => "Warning",
            HealthStatus::Critical => "Critical",
            HealthStatus::Failed => "Failed",
        }
    }
}

/// Tracks health across validation windows.
#[derive(Debug, Clone, Default)]
pub struct HealthMonitor {
    status: HealthStatus,
    /// Dropped pairs and zeroed net forces since the last window closed.
    window_instabilities: u64,
}

impl HealthMonitor {
    pub fn status(&self) -> HealthStatus {
        self.status
    }

    pub fn record_instabilities(&mut self, count: u64) {
        self.window_instabilities += count;
    }

    /// Close a validation window: one step worse if anything failed, Healthy otherwise.
    pub fn close_window(&mut self, report: &ValidationReport, instability_threshold: u64) -> HealthStatus {
        let unstable = self.window_instabilities > instability_threshold;
        if unstable {
            log::warn!(
                "{} numeric instabilities this window (threshold {})",
                self.window_instabilities,
                instability_threshold
            );
        }
        self.window_instabilities = 0;

        let previous = self.status;
        if report.passed() && !unstable {
            self.status = HealthStatus::Healthy;
            if previous != HealthStatus::Healthy {
                log::info!("Gravity health recovered ({} -> Healthy)", previous.name());
            }
        } else {
            self.status = previous.degraded();
            if self.status == HealthStatus::Failed {
                log::error!("Gravity health Failed at tick {}", report.tick);
            } else if self.status != previous {
                log::warn!("Gravity health {} -> {}", previous.name(), self.status.name());
            }
        }
        self.status
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bubble::BubbleState;
    use crate::registry::{BodyId, CelestialBody};

    fn report(passed: bool) -> ValidationReport {
        ValidationReport {
            tick: 0,
            results: vec![CheckResult::new(
                ValidationCheck::EnergyConservation,
                if passed { 0.0 } else { 1.0 },
                0.1,
            )],
            force_residual: 0.0,
            momentum: DVec3::ZERO,
            energy: 0.0,
        }
    }

    #[test]
    fn health_degrades_one_step_per_window() {
        let mut health = HealthMonitor::default();
        assert_eq!(health.close_window(&report(false), 10), HealthStatus::Warning);
        assert_eq!(health.close_window(&report(false), 10), HealthStatus::Critical);
        assert_eq!(health.close_window(&report(false), 10), HealthStatus::Failed);
        assert_eq!(health.close_window(&report(false), 10), HealthStatus::Failed);
        assert_eq!(health.close_window(&report(true), 10), HealthStatus::Healthy);
    }

    #[test]
    fn sustained_instability_degrades_health() {
        let mut health = HealthMonitor::default();
        health.record_instabilities(11);
        assert_eq!(health.close_window(&report(true), 10), HealthStatus::Warning);
        health.record_instabilities(3);
        assert_eq!(health.close_window(&report(true), 10), HealthStatus::Healthy);
    }

    #[test]
    fn drift_normalisation() {
        assert_eq!(energy_drift(-100.0, -99.0), 0.01);
        assert_eq!(energy_drift(0.0, 0.5), 0.5);
        let d = momentum_drift(DVec3::ZERO, DVec3::new(1.0, 0.0, 0.0), 100.0);
        assert!((d - 0.01).abs() < 1e-15);
    }

    #[test]
    fn isolated_pair_validates_clean() {
        let mut nbody = NBodyGravityComponent::from_config(&GravityConfig::default());
        for (id, x) in [(1u64, 0.0), (2, 500.0)] {
            let body = CelestialBody {
                id: BodyId(id),
                name: id.to_string(),
                mass: 1.0e9,
                radius: 1.0,
                position: DVec3::new(x, 0.0, 0.0),
                scale: 1.0,
                last_distance: 0.0,
            };
            nbody.register_body(&body, DVec3::ZERO);
            nbody.set_state(BodyId(id), BubbleState::Near);
        }
        nbody.tick(1.0 / 60.0);
        let baseline = ConservationBaseline::capture(&nbody, 1);
        for _ in 0..60 {
            nbody.tick(1.0 / 60.0);
        }
        let report = validate(&nbody, &baseline, Tolerances::from_config(&GravityConfig::default()), 61);
        assert!(report.passed(), "{:?}", report);
        assert_eq!(report.results.len(), 3);
    }
}
