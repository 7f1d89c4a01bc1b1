//! Master coordinator: owns one gravity session and runs the per-tick pipeline.
//!
//! Order within a tick is fixed: housekeeping, bubble states, forces, then
//! validation. Force application reads the states set earlier in the same tick
//! and validation reads the post-integration state.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;

use glam::DVec3;

use crate::bubble::{BubbleDistanceManager, BubbleState, BubbleThresholds, BubbleTransition, ListenerId};
use crate::config::{GravityConfig, QualityPreset};
use crate::error::Result;
use crate::nbody::{NBodyGravityComponent, ParticipationPolicy};
use crate::registry::{BodyDescriptor, BodyId, CelestialBodyRegistry};
use crate::replication::{CorrectionRecord, NetworkRole, ReplicationPublisher};
use crate::scaling::ScalingCalculator;
use crate::stats::{SystemStatistics, TickTiming};
use crate::validation::{self, ConservationBaseline, HealthMonitor, HealthStatus, Tolerances, ValidationReport};

#[derive(Debug, Default)]
struct TuningState {
    slow_streak: u32,
    fast_streak: u32,
}

/// One gravity session. Create on world load, drop on unload.
#[derive(Debug)]
pub struct UnifiedGravitySystem {
    config: GravityConfig,
    registry: Arc<CelestialBodyRegistry>,
    nbody: NBodyGravityComponent,
    bubble: BubbleDistanceManager,
    health: HealthMonitor,
    tolerances: Tolerances,
    observer: DVec3,
    tick: u64,
    sim_time: f64,
    baseline: Option<ConservationBaseline>,
    baseline_dirty: bool,
    last_validation: Option<ValidationReport>,
    timing: TickTiming,
    tuning: TuningState,
    role: NetworkRole,
    publisher: ReplicationPublisher,
    outbox: Vec<CorrectionRecord>,
    last_correction: HashMap<BodyId, f64>,
}

impl UnifiedGravitySystem {
    pub fn new(config: GravityConfig) -> Self {
        let config = config.sanitized();
        let scaling = Arc::new(ScalingCalculator::from_config(&config));
        let registry = Arc::new(CelestialBodyRegistry::new(
            scaling,
            config.scale_update_threshold,
            config.scale_smoothing_speed,
        ));
        Self {
            nbody: NBodyGravityComponent::from_config(&config),
            bubble: BubbleDistanceManager::from_config(&config),
            health: HealthMonitor::default(),
            tolerances: Tolerances::from_config(&config),
            observer: DVec3::ZERO,
            tick: 0,
            sim_time: 0.0,
            baseline: None,
            baseline_dirty: true,
            last_validation: None,
            timing: TickTiming::default(),
            tuning: TuningState::default(),
            role: NetworkRole::Standalone,
            publisher: ReplicationPublisher::new(config.replication_interval),
            outbox: Vec::new(),
            last_correction: HashMap::new(),
            registry,
            config,
        }
    }

    pub fn config(&self) -> &GravityConfig {
        &self.config
    }

    /// Shared handle for subsystems that register bodies from other threads.
    pub fn registry(&self) -> &Arc<CelestialBodyRegistry> {
        &self.registry
    }

    pub fn nbody(&self) -> &NBodyGravityComponent {
        &self.nbody
    }

    pub fn bubble(&self) -> &BubbleDistanceManager {
        &self.bubble
    }

    pub fn health(&self) -> HealthStatus {
        self.health.status()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    pub fn last_validation(&self) -> Option<&ValidationReport> {
        self.last_validation.as_ref()
    }

    pub fn observer_position(&self) -> DVec3 {
        self.observer
    }

    pub fn set_observer_position(&mut self, position: DVec3) {
        if position.is_finite() {
            self.observer = position;
        } else {
            log::warn!("Ignoring non-finite observer position");
        }
    }

    pub fn role(&self) -> NetworkRole {
        self.role
    }

    pub fn set_role(&mut self, role: NetworkRole) {
        self.role = role;
    }

    /// Register a body and start simulating it with the given velocity.
    pub fn register_object(&mut self, desc: BodyDescriptor, velocity: DVec3) -> Result<BodyId> {
        let id = self.registry.register(desc)?;
        self.track(id, velocity);
        Ok(id)
    }

    pub(crate) fn track(&mut self, id: BodyId, velocity: DVec3) {
        if let Some(body) = self.registry.get(id) {
            self.nbody.register_body(&body, velocity);
            self.baseline_dirty = true;
        }
    }

    pub fn unregister_object(&mut self, id: BodyId) -> bool {
        let removed = self.registry.unregister(id);
        self.nbody.unregister_body(id);
        self.bubble.forget(id);
        self.last_correction.remove(&id);
        if removed {
            self.baseline_dirty = true;
        }
        removed
    }

    /// Observe every bubble transition (rendering/LOD collaborators).
    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&BubbleTransition) + Send + 'static,
    {
        self.bubble.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.bubble.unsubscribe(id)
    }

    /// Floating-origin recenter: shift every body and the observer.
    pub fn translate_all(&mut self, offset: DVec3) {
        if !offset.is_finite() {
            log::warn!("translate_all: ignoring non-finite offset");
            return;
        }
        self.registry.translate_all(offset);
        self.nbody.translate_all(offset);
        self.observer += offset;
    }

    /// External momentum change; re-baselines conservation checks.
    pub fn apply_impulse(&mut self, id: BodyId, impulse: DVec3) -> Result<()> {
        self.nbody.apply_impulse(id, impulse)?;
        self.baseline_dirty = true;
        Ok(())
    }

    /// Advance the session by one fixed step.
    pub fn update(&mut self, dt: f64) {
        if !dt.is_finite() || dt <= 0.0 {
            log::warn!("Gravity update skipped: invalid dt {}", dt);
            return;
        }
        let started = Instant::now();
        self.tick += 1;
        self.sim_time += dt;

        // Housekeeping: stale owners and membership.
        for id in self.registry.prune_stale() {
            self.bubble.forget(id);
            self.last_correction.remove(&id);
        }
        let bodies = self.registry.get_all();
        if self.nbody.sync_from_registry(&bodies) {
            self.baseline_dirty = true;
        }

        // 1. Bubble states relative to the observer.
        let transitions = self.bubble.update(self.observer, &bodies);
        if !transitions.is_empty() {
            self.baseline_dirty = true;
        }
        for body in &bodies {
            if let Some(state) = self.bubble.state_of(body.id) {
                self.nbody.set_state(body.id, state);
            }
        }
        self.registry.update_all_scales(self.observer, dt);

        // 2. Forces.
        let report = self.nbody.tick(dt);
        self.registry.displace(self.nbody.last_displacements());
        self.health.record_instabilities(report.instabilities());

        // 3. Validation.
        if self.baseline_dirty || self.baseline.is_none() {
            self.baseline = Some(ConservationBaseline::capture(&self.nbody, self.tick));
            self.baseline_dirty = false;
        }
        if self.tick % self.config.validation_frequency == 0 {
            self.run_full_validation();
        }

        if self.role == NetworkRole::Server && self.publisher.advance(dt) {
            let records = self.snapshot_corrections();
            self.outbox.extend(records);
        }

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.auto_tune(elapsed_ms);
    }

    /// Run all conservation checks now and close a health window.
    pub fn run_full_validation(&mut self) -> ValidationReport {
        let baseline = match self.baseline {
            Some(b) if !self.baseline_dirty => b,
            _ => {
                let b = ConservationBaseline::capture(&self.nbody, self.tick);
                self.baseline = Some(b);
                self.baseline_dirty = false;
                b
            }
        };

        let report = validation::validate(&self.nbody, &baseline, self.tolerances, self.tick);
        for failure in report.failures() {
            log::warn!(
                "{} violated at tick {}: error {:.3e} > tolerance {:.3e}",
                failure.check.name(),
                self.tick,
                failure.error,
                failure.tolerance
            );
        }
        self.health.close_window(&report, self.config.numeric_instability_threshold);
        self.last_validation = Some(report.clone());
        report
    }

    /// Switch the quality preset and re-derive the values it controls.
    pub fn set_quality_preset(&mut self, preset: QualityPreset) {
        self.tuning = TuningState::default();
        self.apply_quality(preset);
    }

    fn apply_quality(&mut self, preset: QualityPreset) {
        if preset == self.config.quality {
            return;
        }
        log::info!("Gravity quality {} -> {}", self.config.quality.name(), preset.name());
        self.config.quality = preset;
        self.bubble.set_thresholds(BubbleThresholds::from_config(&self.config));
        let near_only = self.nbody.policy().near_only;
        self.nbody.set_policy(ParticipationPolicy {
            near_only,
            ..ParticipationPolicy::from_config(&self.config)
        });
        self.registry
            .scaling()
            .set_cache_capacity(self.config.quality_settings().scale_cache_size);
        self.baseline_dirty = true;
    }

    fn auto_tune(&mut self, elapsed_ms: f64) {
        self.timing.record(elapsed_ms);
        let warning = self.config.tick_budget_warning_ms;
        let critical = self.config.tick_budget_critical_ms;
        let patience = self.config.tuning_patience;

        if elapsed_ms > critical && !self.nbody.policy().near_only {
            log::warn!(
                "Tick took {:.2} ms (critical {:.2} ms), restricting forces to Near bodies",
                elapsed_ms,
                critical
            );
            self.nbody.set_near_only(true);
            self.baseline_dirty = true;
        }

        if elapsed_ms > warning {
            self.tuning.slow_streak += 1;
            self.tuning.fast_streak = 0;
        } else if elapsed_ms < warning * 0.5 {
            self.tuning.fast_streak += 1;
            self.tuning.slow_streak = 0;
        } else {
            self.tuning.slow_streak = 0;
            self.tuning.fast_streak = 0;
        }

        if self.tuning.slow_streak >= patience {
            self.tuning.slow_streak = 0;
            let interval = self.bubble.update_interval();
            if interval < self.config.max_bubble_update_interval {
                let next = (interval * 2).min(self.config.max_bubble_update_interval);
                log::warn!("Tick over budget ({:.2} ms), bubble cadence {} -> {}", self.timing.average_ms, interval, next);
                self.bubble.set_update_interval(next);
            } else if let Some(lower) = self.config.quality.lower() {
                log::warn!("Tick over budget ({:.2} ms), lowering quality", self.timing.average_ms);
                self.apply_quality(lower);
            }
        }

        if self.tuning.fast_streak >= patience {
            self.tuning.fast_streak = 0;
            if self.nbody.policy().near_only {
                log::info!("Tick back under budget, restoring full participation");
                self.nbody.set_near_only(false);
                self.baseline_dirty = true;
            } else if self.bubble.update_interval() > self.config.bubble_update_interval {
                let next = (self.bubble.update_interval() / 2).max(self.config.bubble_update_interval);
                log::debug!("Relaxing bubble cadence to {}", next);
                self.bubble.set_update_interval(next);
            }
        }
    }

    /// Current authoritative state of every tracked body.
    pub fn snapshot_corrections(&self) -> Vec<CorrectionRecord> {
        self.nbody
            .bodies()
            .iter()
            .map(|b| CorrectionRecord {
                body_id: b.id,
                position: b.position,
                velocity: b.velocity,
                timestamp: self.sim_time,
            })
            .collect()
    }

    /// Hand queued corrections to the transport.
    pub fn drain_corrections(&mut self) -> Vec<CorrectionRecord> {
        std::mem::take(&mut self.outbox)
    }

    /// Snap local prediction to server state. Older-than-applied records are ignored.
    /// Returns how many records were applied.
    pub fn apply_corrections(&mut self, records: &[CorrectionRecord]) -> usize {
        let mut applied = 0;
        for record in records {
            if !record.position.is_finite() || !record.velocity.is_finite() {
                log::warn!("Ignoring non-finite correction for {}", record.body_id);
                continue;
            }
            if self.last_correction.get(&record.body_id).is_some_and(|&t| t > record.timestamp) {
                continue;
            }
            if self.registry.set_position(record.body_id, record.position).is_err() {
                log::debug!("Correction for unknown body {}", record.body_id);
                continue;
            }
            let synced = self
                .nbody
                .set_position(record.body_id, record.position)
                .and_then(|_| self.nbody.set_velocity(record.body_id, record.velocity));
            if synced.is_err() {
                // Registered through the shared handle since the last update.
                match self.registry.get(record.body_id) {
                    Some(body) => {
                        self.nbody.register_body(&body, record.velocity);
                    }
                    None => continue,
                }
            }
            self.last_correction.insert(record.body_id, record.timestamp);
            applied += 1;
        }
        if applied > 0 {
            self.baseline_dirty = true;
        }
        applied
    }

    pub fn get_system_statistics(&self) -> SystemStatistics {
        let report = self.nbody.last_report();
        let (net_force, _) = self.nbody.net_force_sum();
        SystemStatistics {
            tick: self.tick,
            sim_time: self.sim_time,
            body_count: self.registry.len(),
            active_body_count: report.active_bodies,
            force_calculations_per_frame: report.force_calculations,
            timing: self.timing,
            state_counts: self.bubble.counts(),
            net_force: net_force.length(),
            total_momentum: self.nbody.total_momentum(),
            total_energy: self.nbody.total_energy(),
            health: self.health.status(),
            validation_error: self.last_validation.as_ref().map_or(0.0, ValidationReport::max_error),
            numeric_instabilities: self.nbody.numeric_instabilities(),
            quality: self.config.quality,
            bubble_update_interval: self.bubble.update_interval(),
            near_only: self.nbody.policy().near_only,
        }
    }

    /// Multi-line summary for logs and overlays.
    pub fn get_debug_string(&self) -> String {
        let mut out = self.get_system_statistics().to_string();
        if let Some(report) = &self.last_validation {
            let _ = write!(out, "\nLast validation (tick {}):", report.tick);
            for r in &report.results {
                let _ = write!(
                    out,
                    "\n  {:<22} {:>10.3e} / {:.1e} {}",
                    r.check.name(),
                    r.error,
                    r.tolerance,
                    if r.passed { "ok" } else { "FAIL" }
                );
            }
        }
        out
    }

    /// Tier of one body, if it has been classified.
    pub fn bubble_state(&self, id: BodyId) -> Option<BubbleState> {
        self.bubble.state_of(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn system() -> UnifiedGravitySystem {
        UnifiedGravitySystem::new(GravityConfig::default())
    }

    fn desc(name: &str, mass: f64, x: f64) -> BodyDescriptor {
        BodyDescriptor::new(name, mass, 10.0, DVec3::new(x, 0.0, 0.0))
    }

    #[test]
    fn update_moves_registry_positions() {
        let mut sys = system();
        let a = sys.register_object(desc("a", 1.0e12, 0.0), DVec3::ZERO).unwrap();
        let b = sys.register_object(desc("b", 1.0e3, 1000.0), DVec3::new(0.0, 1.0, 0.0)).unwrap();
        sys.update(1.0);
        let body_b = sys.registry().get(b).unwrap();
        assert!(body_b.position.x < 1000.0);
        assert!((body_b.position.y - 1.0).abs() < 1e-9);
        assert_eq!(sys.registry().get(a).unwrap().position, sys.nbody().body(a).unwrap().position);
    }

    #[test]
    fn invalid_registration_is_rejected_without_side_effects() {
        let mut sys = system();
        assert!(sys.register_object(desc("bad", -1.0, 0.0), DVec3::ZERO).is_err());
        sys.register_object(desc("ok", 1.0, 0.0), DVec3::ZERO).unwrap();
        assert!(sys.register_object(desc("ok", 1.0, 5.0), DVec3::ZERO).is_err());
        sys.update(0.1);
        assert_eq!(sys.get_system_statistics().body_count, 1);
        assert_eq!(sys.nbody().len(), 1);
    }

    #[test]
    fn far_bodies_leave_the_force_set() {
        let mut sys = system();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        sys.subscribe(move |t| sink.lock().unwrap().push(*t));

        let id = sys.register_object(desc("probe", 1.0e3, 5_000.0), DVec3::ZERO).unwrap();
        sys.register_object(desc("anchor", 1.0e9, 0.0), DVec3::ZERO).unwrap();
        sys.update(0.1);
        assert_eq!(sys.bubble_state(id), Some(BubbleState::Near));

        sys.set_observer_position(DVec3::new(-500_000.0, 0.0, 0.0));
        sys.update(0.1);
        assert_eq!(sys.bubble_state(id), Some(BubbleState::OutOfBubble));
        assert_eq!(sys.get_system_statistics().active_body_count, 0);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn translate_all_shifts_bodies_and_observer() {
        let mut sys = system();
        let id = sys.register_object(desc("a", 1.0, 100.0), DVec3::ZERO).unwrap();
        sys.set_observer_position(DVec3::new(50.0, 0.0, 0.0));
        sys.translate_all(DVec3::new(-50.0, 0.0, 0.0));
        assert_eq!(sys.observer_position(), DVec3::ZERO);
        assert_eq!(sys.registry().get(id).unwrap().position, DVec3::new(50.0, 0.0, 0.0));
    }

    #[test]
    fn quality_preset_rescales_thresholds() {
        let mut sys = system();
        sys.set_quality_preset(QualityPreset::Low);
        assert_eq!(sys.bubble().thresholds().near, 5_000.0);
        assert_eq!(sys.nbody().policy().max_active_bodies, 64);
        assert_eq!(sys.registry().scaling().cache_stats().capacity, 256);
        assert_eq!(sys.get_system_statistics().quality, QualityPreset::Low);
    }

    #[test]
    fn server_publishes_and_client_applies_corrections() {
        let mut server = system();
        server.set_role(NetworkRole::Server);
        server.register_object(desc("a", 1.0e10, 0.0), DVec3::ZERO).unwrap();
        server.register_object(desc("b", 1.0e3, 300.0), DVec3::new(0.0, 2.0, 0.0)).unwrap();
        server.update(0.05);
        server.update(0.05);
        let records = server.drain_corrections();
        assert_eq!(records.len(), 2);
        assert!(server.drain_corrections().is_empty());

        let mut client = system();
        client.set_role(NetworkRole::Client);
        client.register_object(desc("a", 1.0e10, 0.0), DVec3::ZERO).unwrap();
        client.register_object(desc("b", 1.0e3, 300.0), DVec3::ZERO).unwrap();
        assert_eq!(client.apply_corrections(&records), 2);
        let b = records[1];
        assert_eq!(client.registry().get(b.body_id).unwrap().position, b.position);
        assert_eq!(client.nbody().body(b.body_id).unwrap().velocity, b.velocity);

        let stale = CorrectionRecord {
            timestamp: b.timestamp - 1.0,
            position: DVec3::splat(9.0),
            ..b
        };
        assert_eq!(client.apply_corrections(&[stale]), 0);
    }

    #[test]
    fn correction_reaches_body_registered_elsewhere() {
        let mut client = system();
        client.set_role(NetworkRole::Client);
        let id = client.registry().register(desc("remote", 1.0e3, 100.0)).unwrap();
        let record = CorrectionRecord {
            body_id: id,
            position: DVec3::new(200.0, 0.0, 0.0),
            velocity: DVec3::new(0.0, 7.0, 0.0),
            timestamp: 0.0,
        };
        assert_eq!(client.apply_corrections(&[record]), 1);
        assert_eq!(client.nbody().body(id).unwrap().velocity, record.velocity);

        client.update(0.1);
        let tracked = client.nbody().body(id).unwrap();
        assert_eq!(tracked.velocity, record.velocity);
        assert!((client.registry().get(id).unwrap().position.y - 0.7).abs() < 1e-9);
    }

    #[test]
    fn repeated_overflow_degrades_health() {
        let mut sys = UnifiedGravitySystem::new(GravityConfig {
            validation_frequency: 5,
            numeric_instability_threshold: 3,
            ..GravityConfig::default()
        });
        sys.register_object(desc("h1", 1.0e300, 0.0), DVec3::ZERO).unwrap();
        sys.register_object(desc("h2", 1.0e300, 1.0), DVec3::ZERO).unwrap();
        for _ in 0..5 {
            sys.update(0.01);
        }
        // One dropped pair per tick, five in the window.
        assert_eq!(sys.get_system_statistics().numeric_instabilities, 5);
        assert_eq!(sys.health(), HealthStatus::Warning);
        let report = sys.last_validation().unwrap();
        assert!(report.passed(), "{:?}", report);
        assert!(sys.registry().get_all().iter().all(|b| b.position.is_finite()));
    }

    #[test]
    fn debug_string_reports_validation() {
        let mut sys = system();
        sys.register_object(desc("a", 1.0e9, 0.0), DVec3::ZERO).unwrap();
        sys.register_object(desc("b", 1.0e9, 800.0), DVec3::ZERO).unwrap();
        sys.update(1.0 / 60.0);
        let report = sys.run_full_validation();
        assert!(report.passed());
        let text = sys.get_debug_string();
        assert!(text.contains("Bodies: 2"));
        assert!(text.contains("EnergyConservation"));
        assert!(text.contains("Health: Healthy"));
    }

    #[test]
    fn unregister_removes_everywhere() {
        let mut sys = system();
        let id = sys.register_object(desc("a", 1.0, 0.0), DVec3::ZERO).unwrap();
        sys.update(0.1);
        assert!(sys.unregister_object(id));
        assert!(!sys.unregister_object(id));
        assert!(sys.nbody().body(id).is_none());
        assert!(sys.bubble_state(id).is_none());
    }
}
