//! Direct-summation N-body gravity.
//!
//! Forces are accumulated over unique unordered pairs (i < j); each pair is
//! evaluated once and applied as `+F` to i and `-F` to j. Separations are
//! clamped to `min_distance`, per-body acceleration is capped, and a pair that
//! produces a non-finite force is dropped for the tick, as is a per-body sum
//! that overflows. Bodies are advanced with semi-implicit Euler:
//! `v += a·dt; x += v·dt`.

use std::collections::HashMap;

use glam::DVec3;

use crate::bubble::BubbleState;
use crate::config::GravityConfig;
use crate::error::{GravityError, Result};
use crate::registry::{BodyId, CelestialBody};

/// Gravitational force on body `i` exerted by body `j`.
///
/// Separation is clamped to `min_distance`; coincident bodies exert no force.
/// Returns `None` when the result is not finite.
pub fn pairwise_force(g: f64, m_i: f64, p_i: DVec3, m_j: f64, p_j: DVec3, min_distance: f64) -> Option<DVec3> {
    let delta = p_j - p_i;
    let r = delta.length();
    if !r.is_finite() {
        return None;
    }
    if r == 0.0 {
        return Some(DVec3::ZERO);
    }
    let r_eff = r.max(min_distance);
    let magnitude = g * m_i * m_j / (r_eff * r_eff);
    let force = delta * (magnitude / r);
    force.is_finite().then_some(force)
}

/// Numeric policy for the force pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceSettings {
    pub gravitational_constant: f64,
    pub min_distance: f64,
    /// Acceleration cap in m/s².
    pub max_acceleration: f64,
    /// Host force units per newton.
    pub force_unit_scale: f64,
}

impl ForceSettings {
    pub fn from_config(config: &GravityConfig) -> Self {
        Self {
            gravitational_constant: config.gravitational_constant,
            min_distance: config.min_distance,
            max_acceleration: config.max_acceleration(),
            force_unit_scale: config.force_unit_scale,
        }
    }
}

/// Which bodies take part in a tick and with whom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticipationPolicy {
    /// Medium-tier bodies interact only with this many of the most massive active bodies.
    pub medium_dominant_k: usize,
    /// Far-tier bodies interact only with this many of the most massive active bodies.
    pub far_dominant_k: usize,
    /// Active set cap; extra bodies are kinematic for the tick.
    pub max_active_bodies: usize,
    /// Restrict the active set to Near bodies.
    pub near_only: bool,
}

impl ParticipationPolicy {
    pub fn from_config(config: &GravityConfig) -> Self {
        let q = config.quality_settings();
        Self {
            medium_dominant_k: q.medium_dominant_k,
            far_dominant_k: q.far_dominant_k,
            max_active_bodies: q.max_active_bodies,
            near_only: false,
        }
    }
}

impl Default for ParticipationPolicy {
    fn default() -> Self {
        Self::from_config(&GravityConfig::default())
    }
}

/// Dynamic state of one simulated body.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedBody {
    pub id: BodyId,
    pub mass: f64,
    pub radius: f64,
    pub position: DVec3,
    pub velocity: DVec3,
    pub state: BubbleState,
    /// Net force applied during the last tick (newtons).
    pub net_force: DVec3,
    pub acceleration: DVec3,
    /// Whether the body took part in the last force pass.
    pub active: bool,
}

impl TrackedBody {
    pub fn momentum(&self) -> DVec3 {
        self.velocity * self.mass
    }

    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.mass * self.velocity.length_squared()
    }
}

/// Counters from the last tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub active_bodies: usize,
    /// Pair evaluations that contributed a force.
    pub force_calculations: usize,
    /// Pairs dropped for producing a non-finite force.
    pub dropped_pairs: usize,
    /// Bodies whose acceleration hit the cap.
    pub capped_bodies: usize,
    /// Bodies whose summed force overflowed and was zeroed for the tick.
    pub unstable_bodies: usize,
}

impl TickReport {
    /// Dropped pairs plus zeroed net forces.
    pub fn instabilities(&self) -> u64 {
        (self.dropped_pairs + self.unstable_bodies) as u64
    }
}

const NOT_ACTIVE: usize = usize::MAX;

/// Computes and applies pairwise gravity every physics tick.
#[derive(Debug)]
pub struct NBodyGravityComponent {
    settings: ForceSettings,
    policy: ParticipationPolicy,
    bodies: Vec<TrackedBody>,
    index: HashMap<BodyId, usize>,
    /// Indices into `bodies` taking part in the last force pass.
    active: Vec<usize>,
    /// Mass rank among active bodies (0 = heaviest), `NOT_ACTIVE` otherwise.
    rank: Vec<usize>,
    /// Tick-local force accumulator.
    forces: Vec<DVec3>,
    last_report: TickReport,
    last_displacements: Vec<(BodyId, DVec3)>,
    numeric_instabilities: u64,
}

impl NBodyGravityComponent {
    pub fn new(settings: ForceSettings, policy: ParticipationPolicy) -> Self {
        Self {
            settings,
            policy,
            bodies: Vec::new(),
            index: HashMap::new(),
            active: Vec::new(),
            rank: Vec::new(),
            forces: Vec::new(),
            last_report: TickReport::default(),
            last_displacements: Vec::new(),
            numeric_instabilities: 0,
        }
    }

    pub fn from_config(config: &GravityConfig) -> Self {
        Self::new(ForceSettings::from_config(config), ParticipationPolicy::from_config(config))
    }

    pub fn settings(&self) -> ForceSettings {
        self.settings
    }

    pub fn policy(&self) -> ParticipationPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: ParticipationPolicy) {
        self.policy = policy;
    }

    pub fn set_near_only(&mut self, near_only: bool) {
        self.policy.near_only = near_only;
    }

    fn rebuild_index(&mut self) {
        self.index = self.bodies.iter().enumerate().map(|(i, b)| (b.id, i)).collect();
    }

    /// Start tracking a registered body. Returns false if it is already tracked.
    pub fn register_body(&mut self, body: &CelestialBody, velocity: DVec3) -> bool {
        if self.index.contains_key(&body.id) {
            return false;
        }
        self.index.insert(body.id, self.bodies.len());
        self.bodies.push(TrackedBody {
            id: body.id,
            mass: body.mass,
            radius: body.radius,
            position: body.position,
            velocity: if velocity.is_finite() { velocity } else { DVec3::ZERO },
            state: BubbleState::Near,
            net_force: DVec3::ZERO,
            acceleration: DVec3::ZERO,
            active: false,
        });
        true
    }

    pub fn unregister_body(&mut self, id: BodyId) -> bool {
        match self.index.get(&id) {
            Some(&idx) => {
                self.bodies.remove(idx);
                self.rebuild_index();
                self.active.clear();
                self.rank.clear();
                true
            }
            None => false,
        }
    }

    /// Mirror the registry: track new bodies (at rest), drop removed ones and take
    /// mass, radius and position from the registry copy. Returns true if membership changed.
    pub fn sync_from_registry(&mut self, bodies: &[CelestialBody]) -> bool {
        let before = self.bodies.len();
        let live: HashMap<BodyId, &CelestialBody> = bodies.iter().map(|b| (b.id, b)).collect();
        self.bodies.retain(|b| live.contains_key(&b.id));
        let removed = before != self.bodies.len();
        if removed {
            self.rebuild_index();
            self.active.clear();
            self.rank.clear();
        }

        let mut added = false;
        for body in bodies {
            match self.index.get(&body.id) {
                Some(&idx) => {
                    let tracked = &mut self.bodies[idx];
                    tracked.mass = body.mass;
                    tracked.radius = body.radius;
                    tracked.position = body.position;
                }
                None => added |= self.register_body(body, DVec3::ZERO),
            }
        }
        removed || added
    }

    pub fn body(&self, id: BodyId) -> Option<&TrackedBody> {
        self.index.get(&id).map(|&i| &self.bodies[i])
    }

    pub fn bodies(&self) -> &[TrackedBody] {
        &self.bodies
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn set_state(&mut self, id: BodyId, state: BubbleState) -> bool {
        match self.index.get(&id) {
            Some(&i) => {
                self.bodies[i].state = state;
                true
            }
            None => false,
        }
    }

    pub fn set_velocity(&mut self, id: BodyId, velocity: DVec3) -> Result<()> {
        let &i = self.index.get(&id).ok_or(GravityError::UnknownBody(id))?;
        if velocity.is_finite() {
            self.bodies[i].velocity = velocity;
        }
        Ok(())
    }

    pub fn set_position(&mut self, id: BodyId, position: DVec3) -> Result<()> {
        let &i = self.index.get(&id).ok_or(GravityError::UnknownBody(id))?;
        if position.is_finite() {
            self.bodies[i].position = position;
        }
        Ok(())
    }

    /// Instantaneous momentum change (N·s).
    pub fn apply_impulse(&mut self, id: BodyId, impulse: DVec3) -> Result<()> {
        let &i = self.index.get(&id).ok_or(GravityError::UnknownBody(id))?;
        if !impulse.is_finite() {
            log::warn!("Ignoring non-finite impulse on {}", id);
            return Ok(());
        }
        let body = &mut self.bodies[i];
        body.velocity += impulse / body.mass;
        Ok(())
    }

    /// Shift every tracked position (floating-origin rebase).
    pub fn translate_all(&mut self, offset: DVec3) {
        for body in self.bodies.iter_mut() {
            body.position += offset;
        }
    }

    pub fn last_report(&self) -> TickReport {
        self.last_report
    }

    /// Position deltas produced by the last tick, for writing back to the registry.
    pub fn last_displacements(&self) -> &[(BodyId, DVec3)] {
        &self.last_displacements
    }

    pub fn numeric_instabilities(&self) -> u64 {
        self.numeric_instabilities
    }

    /// Net force of the last tick converted to host units.
    pub fn host_force(&self, id: BodyId) -> Option<DVec3> {
        self.body(id).map(|b| b.net_force * self.settings.force_unit_scale)
    }

    /// Choose the active set and rank it by mass.
    fn refresh_active_set(&mut self) {
        let policy = self.policy;
        let mut active: Vec<usize> = self
            .bodies
            .iter()
            .enumerate()
            .filter(|(_, b)| b.state.is_dynamic() && (!policy.near_only || b.state == BubbleState::Near))
            .map(|(i, _)| i)
            .collect();

        let by_priority = |bodies: &[TrackedBody], a: &usize, b: &usize| {
            let (x, y) = (&bodies[*a], &bodies[*b]);
            x.state
                .cmp(&y.state)
                .then(y.mass.partial_cmp(&x.mass).unwrap_or(std::cmp::Ordering::Equal))
                .then(x.id.cmp(&y.id))
        };
        if active.len() > policy.max_active_bodies {
            active.sort_by(|a, b| by_priority(&self.bodies, a, b));
            active.truncate(policy.max_active_bodies);
        }

        let mut by_mass = active.clone();
        by_mass.sort_by(|a, b| {
            let (x, y) = (&self.bodies[*a], &self.bodies[*b]);
            y.mass
                .partial_cmp(&x.mass)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(x.id.cmp(&y.id))
        });
        self.rank.clear();
        self.rank.resize(self.bodies.len(), NOT_ACTIVE);
        for (r, &i) in by_mass.iter().enumerate() {
            self.rank[i] = r;
        }

        active.sort_unstable();
        for (i, body) in self.bodies.iter_mut().enumerate() {
            body.active = self.rank[i] != NOT_ACTIVE;
        }
        self.active = active;
    }

    /// Whether body `i` pulls on (and is pulled by) `j` under its tier's policy.
    fn accepts(&self, i: usize, j: usize) -> bool {
        let rank_j = self.rank[j];
        match self.bodies[i].state {
            BubbleState::Near => true,
            BubbleState::Medium => rank_j < self.policy.medium_dominant_k,
            BubbleState::Far => rank_j < self.policy.far_dominant_k,
            BubbleState::OutOfBubble => false,
        }
    }

    fn interacts(&self, i: usize, j: usize) -> bool {
        self.rank[i] != NOT_ACTIVE && self.rank[j] != NOT_ACTIVE && self.accepts(i, j) && self.accepts(j, i)
    }

    /// Compute all pairwise forces for the active set and advance every body by `dt`.
    pub fn tick(&mut self, dt: f64) -> TickReport {
        if !dt.is_finite() || dt <= 0.0 {
            log::warn!("NBody tick skipped: invalid dt {}", dt);
            return self.last_report;
        }

        self.refresh_active_set();
        let s = self.settings;
        let mut report = TickReport {
            active_bodies: self.active.len(),
            ..Default::default()
        };

        self.forces.clear();
        self.forces.resize(self.bodies.len(), DVec3::ZERO);

        for a in 0..self.active.len() {
            let i = self.active[a];
            for b in (a + 1)..self.active.len() {
                let j = self.active[b];
                if !self.interacts(i, j) {
                    continue;
                }
                let (bi, bj) = (&self.bodies[i], &self.bodies[j]);
                match pairwise_force(s.gravitational_constant, bi.mass, bi.position, bj.mass, bj.position, s.min_distance) {
                    Some(f) => {
                        self.forces[i] += f;
                        self.forces[j] -= f;
                        report.force_calculations += 1;
                    }
                    None => {
                        log::warn!("Dropping non-finite gravity pair {} <-> {}", bi.id, bj.id);
                        report.dropped_pairs += 1;
                    }
                }
            }
        }

        self.last_displacements.clear();
        for (i, body) in self.bodies.iter_mut().enumerate() {
            if body.active {
                let mut force = self.forces[i];
                if !force.is_finite() {
                    log::warn!("Dropping non-finite net force on {}", body.id);
                    report.unstable_bodies += 1;
                    force = DVec3::ZERO;
                }
                let mut accel = force / body.mass;
                let magnitude = accel.length();
                if magnitude > s.max_acceleration {
                    accel = if magnitude.is_finite() {
                        accel * (s.max_acceleration / magnitude)
                    } else {
                        // |a| overflowed; normalise a pre-scaled copy instead.
                        (force / force.abs().max_element()).normalize_or_zero() * s.max_acceleration
                    };
                    report.capped_bodies += 1;
                }
                body.acceleration = accel;
                body.net_force = accel * body.mass;
                body.velocity += accel * dt;
            } else {
                body.acceleration = DVec3::ZERO;
                body.net_force = DVec3::ZERO;
            }
            let delta = body.velocity * dt;
            body.position += delta;
            self.last_displacements.push((body.id, delta));
        }

        self.numeric_instabilities += report.instabilities();
        if report.capped_bodies > 0 {
            log::debug!("{} bodies hit the acceleration cap", report.capped_bodies);
        }
        self.last_report = report;
        report
    }

    /// Net gravitational force `target` would feel at `position` from every other
    /// dynamic body. Does not mutate state.
    pub fn calculate_total_force(&self, target: BodyId, position: DVec3) -> Option<DVec3> {
        let me = self.body(target)?;
        let s = self.settings;
        let total = self
            .bodies
            .iter()
            .filter(|b| b.id != target && b.state.is_dynamic())
            .filter_map(|b| pairwise_force(s.gravitational_constant, me.mass, position, b.mass, b.position, s.min_distance))
            .fold(DVec3::ZERO, |acc, f| acc + f);
        Some(total)
    }

    /// Force `a` feels from `b` at their current positions.
    pub fn force_between(&self, a: BodyId, b: BodyId) -> Option<DVec3> {
        let (x, y) = (self.body(a)?, self.body(b)?);
        let s = self.settings;
        pairwise_force(s.gravitational_constant, x.mass, x.position, y.mass, y.position, s.min_distance)
    }

    pub fn total_momentum(&self) -> DVec3 {
        self.bodies.iter().map(TrackedBody::momentum).sum()
    }

    /// Σ m|v|, the natural scale for momentum drift.
    pub fn momentum_magnitude_sum(&self) -> f64 {
        self.bodies.iter().map(|b| b.momentum().length()).sum()
    }

    pub fn kinetic_energy(&self) -> f64 {
        self.bodies.iter().map(TrackedBody::kinetic_energy).sum()
    }

    /// Potential energy over the pairs that interacted in the last force pass.
    pub fn potential_energy(&self) -> f64 {
        if self.rank.len() != self.bodies.len() {
            return 0.0;
        }
        let s = self.settings;
        let mut u = 0.0;
        for a in 0..self.active.len() {
            let i = self.active[a];
            for b in (a + 1)..self.active.len() {
                let j = self.active[b];
                if !self.interacts(i, j) {
                    continue;
                }
                let (bi, bj) = (&self.bodies[i], &self.bodies[j]);
                let r = bi.position.distance(bj.position).max(s.min_distance);
                let term = s.gravitational_constant * bi.mass * bj.mass / r;
                // Pairs dropped by the force pass did not interact.
                if term.is_finite() {
                    u -= term;
                }
            }
        }
        u
    }

    pub fn total_energy(&self) -> f64 {
        self.kinetic_energy() + self.potential_energy()
    }

    /// Σ F_i over the last tick, and Σ |F_i| for normalisation.
    pub fn net_force_sum(&self) -> (DVec3, f64) {
        self.bodies.iter().fold((DVec3::ZERO, 0.0), |(sum, mag), b| {
            (sum + b.net_force, mag + b.net_force.length())
        })
    }

    /// Ids of bodies that took part in the last force pass.
    pub fn active_ids(&self) -> Vec<BodyId> {
        self.active.iter().map(|&i| self.bodies[i].id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GRAVITATIONAL_CONSTANT;

    fn celestial(id: u64, mass: f64, position: DVec3) -> CelestialBody {
        CelestialBody {
            id: BodyId(id),
            name: format!("b{}", id),
            mass,
            radius: 1.0,
            position,
            scale: 1.0,
            last_distance: 0.0,
        }
    }

    fn component() -> NBodyGravityComponent {
        NBodyGravityComponent::from_config(&GravityConfig::default())
    }

    #[test]
    fn pair_force_matches_newton() {
        let f = pairwise_force(GRAVITATIONAL_CONSTANT, 1.0e3, DVec3::ZERO, 2.0e3, DVec3::new(10.0, 0.0, 0.0), 1.0).unwrap();
        let expected = GRAVITATIONAL_CONSTANT * 1.0e3 * 2.0e3 / 100.0;
        assert!((f.x - expected).abs() < expected * 1e-12);
        assert_eq!(f.y, 0.0);
    }

    #[test]
    fn pair_force_is_antisymmetric() {
        let (pa, pb) = (DVec3::new(1.0, 2.0, 3.0), DVec3::new(-40.0, 7.5, 120.0));
        let ab = pairwise_force(GRAVITATIONAL_CONSTANT, 5.0e6, pa, 3.0e4, pb, 1.0).unwrap();
        let ba = pairwise_force(GRAVITATIONAL_CONSTANT, 3.0e4, pb, 5.0e6, pa, 1.0).unwrap();
        assert_eq!(ab, -ba);
    }

    #[test]
    fn min_distance_clamps_singularity() {
        let near = pairwise_force(1.0, 1.0, DVec3::ZERO, 1.0, DVec3::new(1e-9, 0.0, 0.0), 1.0).unwrap();
        assert!((near.length() - 1.0).abs() < 1e-12);
        assert_eq!(pairwise_force(1.0, 1.0, DVec3::ZERO, 1.0, DVec3::ZERO, 1.0), Some(DVec3::ZERO));
    }

    #[test]
    fn overflowing_pair_is_rejected() {
        assert!(pairwise_force(1.0, f64::MAX, DVec3::ZERO, f64::MAX, DVec3::X, 1.0).is_none());
    }

    #[test]
    fn forces_sum_to_zero() {
        let mut nbody = component();
        for i in 0..12u64 {
            let p = DVec3::new((i * 37 % 11) as f64 * 300.0, (i * 13 % 7) as f64 * 500.0, i as f64 * 250.0);
            nbody.register_body(&celestial(i, 1.0e6 + i as f64 * 1.0e5, p), DVec3::ZERO);
        }
        let report = nbody.tick(1.0 / 60.0);
        assert_eq!(report.force_calculations, 12 * 11 / 2);
        let (sum, mag) = nbody.net_force_sum();
        assert!(mag > 0.0);
        assert!(sum.length() <= mag * 1e-12, "residual {} of {}", sum.length(), mag);
    }

    #[test]
    fn out_of_bubble_bodies_are_kinematic() {
        let mut nbody = component();
        nbody.register_body(&celestial(1, 1.0e12, DVec3::ZERO), DVec3::ZERO);
        nbody.register_body(&celestial(2, 1.0e3, DVec3::new(100.0, 0.0, 0.0)), DVec3::new(0.0, 5.0, 0.0));
        nbody.set_state(BodyId(2), BubbleState::OutOfBubble);
        let report = nbody.tick(1.0);
        assert_eq!(report.active_bodies, 1);
        assert_eq!(report.force_calculations, 0);
        let b = nbody.body(BodyId(2)).unwrap();
        assert_eq!(b.velocity, DVec3::new(0.0, 5.0, 0.0));
        assert_eq!(b.position, DVec3::new(100.0, 5.0, 0.0));
        assert!(!b.active);
    }

    #[test]
    fn acceleration_is_capped() {
        let mut nbody = component();
        nbody.register_body(&celestial(1, 1.0e20, DVec3::ZERO), DVec3::ZERO);
        nbody.register_body(&celestial(2, 1.0, DVec3::new(10.0, 0.0, 0.0)), DVec3::ZERO);
        let report = nbody.tick(0.01);
        assert_eq!(report.capped_bodies, 1);
        let a = nbody.body(BodyId(2)).unwrap().acceleration.length();
        assert!((a - nbody.settings().max_acceleration).abs() < 1e-9);
    }

    #[test]
    fn medium_bodies_only_feel_dominant_masses() {
        let mut nbody = component();
        nbody.set_policy(ParticipationPolicy {
            medium_dominant_k: 1,
            far_dominant_k: 1,
            max_active_bodies: 16,
            near_only: false,
        });
        nbody.register_body(&celestial(1, 1.0e15, DVec3::ZERO), DVec3::ZERO);
        nbody.register_body(&celestial(2, 1.0e3, DVec3::new(1000.0, 0.0, 0.0)), DVec3::ZERO);
        nbody.register_body(&celestial(3, 1.0e3, DVec3::new(2000.0, 0.0, 0.0)), DVec3::ZERO);
        nbody.set_state(BodyId(2), BubbleState::Medium);
        nbody.set_state(BodyId(3), BubbleState::Medium);
        let report = nbody.tick(1.0);
        // 1-2 and 1-3 interact, the two light Medium bodies ignore each other.
        assert_eq!(report.force_calculations, 2);
        let (sum, mag) = nbody.net_force_sum();
        assert!(sum.length() <= mag * 1e-12);
    }

    #[test]
    fn near_only_and_body_cap_shrink_active_set() {
        let mut nbody = component();
        for i in 0..6u64 {
            nbody.register_body(&celestial(i, 1.0e3 * (i + 1) as f64, DVec3::new(i as f64 * 100.0, 0.0, 0.0)), DVec3::ZERO);
        }
        nbody.set_state(BodyId(0), BubbleState::Far);
        nbody.set_near_only(true);
        assert_eq!(nbody.tick(1.0).active_bodies, 5);

        let mut policy = nbody.policy();
        policy.near_only = false;
        policy.max_active_bodies = 3;
        nbody.set_policy(policy);
        nbody.tick(1.0);
        // Near bodies win over Far, heavier over lighter.
        let mut ids = nbody.active_ids();
        ids.sort();
        assert_eq!(ids, vec![BodyId(3), BodyId(4), BodyId(5)]);
    }

    #[test]
    fn total_force_query_is_pure() {
        let mut nbody = component();
        nbody.register_body(&celestial(1, 1.0e10, DVec3::ZERO), DVec3::ZERO);
        nbody.register_body(&celestial(2, 1.0e3, DVec3::new(50.0, 0.0, 0.0)), DVec3::ZERO);
        let before = nbody.bodies().to_vec();
        let f = nbody.calculate_total_force(BodyId(2), DVec3::new(100.0, 0.0, 0.0)).unwrap();
        assert!(f.x < 0.0);
        assert_eq!(nbody.bodies(), &before[..]);
        assert!(nbody.calculate_total_force(BodyId(99), DVec3::ZERO).is_none());
        let at_zero = nbody.calculate_total_force(BodyId(2), DVec3::ZERO).unwrap();
        assert!(at_zero.is_finite());
    }

    #[test]
    fn sync_tracks_registry_membership() {
        let mut nbody = component();
        let a = celestial(1, 10.0, DVec3::ZERO);
        let b = celestial(2, 20.0, DVec3::X);
        assert!(nbody.sync_from_registry(&[a.clone(), b.clone()]));
        assert!(!nbody.sync_from_registry(&[a.clone(), b]));
        assert!(nbody.sync_from_registry(&[a]));
        assert_eq!(nbody.len(), 1);
        assert!(nbody.body(BodyId(2)).is_none());
    }

    #[test]
    fn overflowing_pair_is_dropped_while_others_apply() {
        let mut nbody = component();
        nbody.register_body(&celestial(1, 1.0e300, DVec3::ZERO), DVec3::ZERO);
        nbody.register_body(&celestial(2, 1.0e300, DVec3::new(1.0, 0.0, 0.0)), DVec3::ZERO);
        nbody.register_body(&celestial(3, 1.0e3, DVec3::new(1000.0, 0.0, 0.0)), DVec3::ZERO);
        let report = nbody.tick(1.0);
        assert_eq!(report.dropped_pairs, 1);
        assert_eq!(report.force_calculations, 2);
        assert_eq!(nbody.numeric_instabilities(), 1);
        let light = nbody.body(BodyId(3)).unwrap();
        assert!(light.velocity.x < 0.0);
        assert!(nbody.bodies().iter().all(|b| b.position.is_finite() && b.velocity.is_finite()));
        assert!(nbody.total_energy().is_finite());
    }

    #[test]
    fn overflowing_net_force_is_zeroed() {
        // Each pair force is finite (~1.1e308) but two of them on body 1 sum past f64::MAX.
        let mut nbody = component();
        let mass = 1.3e159;
        nbody.register_body(&celestial(1, mass, DVec3::ZERO), DVec3::ZERO);
        nbody.register_body(&celestial(2, mass, DVec3::new(1.0, 0.0, 0.0)), DVec3::ZERO);
        nbody.register_body(&celestial(3, mass, DVec3::new(1.0, 0.0, 0.0)), DVec3::ZERO);
        let report = nbody.tick(1.0);
        assert_eq!(report.dropped_pairs, 0);
        assert_eq!(report.unstable_bodies, 1);
        assert_eq!(nbody.numeric_instabilities(), 1);
        assert_eq!(nbody.body(BodyId(1)).unwrap().acceleration, DVec3::ZERO);
        for b in nbody.bodies() {
            assert!(b.position.is_finite() && b.velocity.is_finite(), "{:?}", b);
            assert!(b.acceleration.length() <= nbody.settings().max_acceleration * (1.0 + 1e-12));
        }
        assert!(nbody.last_displacements().iter().all(|(_, d)| d.is_finite()));
    }

    #[test]
    fn impulse_changes_momentum() {
        let mut nbody = component();
        nbody.register_body(&celestial(1, 4.0, DVec3::ZERO), DVec3::ZERO);
        nbody.apply_impulse(BodyId(1), DVec3::new(8.0, 0.0, 0.0)).unwrap();
        assert_eq!(nbody.total_momentum(), DVec3::new(8.0, 0.0, 0.0));
        assert!(nbody.apply_impulse(BodyId(5), DVec3::X).is_err());
    }
}
