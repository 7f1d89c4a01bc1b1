//! Thread-safe catalog of every body in the session: what exists and where.

use std::fmt;
use std::sync::Arc;

use engine_core::{OwnerToken, OwnerWatch};
use glam::DVec3;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{GravityError, Result};
use crate::scaling::ScalingCalculator;

/// Registry-assigned identifier, stable for the lifetime of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BodyId(pub u64);

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Registration request from an owning object.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDescriptor {
    pub name: String,
    pub mass: f64,
    pub radius: f64,
    pub position: DVec3,
}

impl BodyDescriptor {
    pub fn new(name: impl Into<String>, mass: f64, radius: f64, position: DVec3) -> Self {
        Self {
            name: name.into(),
            mass,
            radius,
            position,
        }
    }

    /// Check the invariants every registered body must satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(GravityError::InvalidName);
        }
        if !self.mass.is_finite() || self.mass <= 0.0 {
            return Err(GravityError::InvalidMass {
                name: self.name.clone(),
                mass: self.mass,
            });
        }
        if !self.radius.is_finite() || self.radius < 0.0 {
            return Err(GravityError::InvalidRadius {
                name: self.name.clone(),
                radius: self.radius,
            });
        }
        if !self.position.is_finite() {
            return Err(GravityError::InvalidPosition { name: self.name.clone() });
        }
        Ok(())
    }
}

/// A registered body. Returned by value; the registry keeps the authoritative copy.
#[derive(Debug, Clone, PartialEq)]
pub struct CelestialBody {
    pub id: BodyId,
    pub name: String,
    /// Mass in kilograms.
    pub mass: f64,
    /// Radius in metres.
    pub radius: f64,
    /// World position in metres (current floating-origin frame).
    pub position: DVec3,
    /// Smoothed render scale.
    pub scale: f64,
    /// Observer distance at the last scale recompute.
    pub last_distance: f64,
}

#[derive(Debug)]
struct Entry {
    body: CelestialBody,
    owner: Option<OwnerWatch>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    entries: Vec<Entry>,
    next_id: u64,
}

impl RegistryInner {
    fn index_of(&self, id: BodyId) -> Option<usize> {
        self.entries.iter().position(|e| e.body.id == id)
    }

    fn index_of_name(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.body.name == name)
    }
}

/// Single source of truth for body existence and position.
///
/// Every method takes `&self`; share it as `Arc<CelestialBodyRegistry>` with the
/// subsystems whose lifecycles register and unregister bodies. The body list and
/// the scale cache are guarded by separate locks.
#[derive(Debug)]
pub struct CelestialBodyRegistry {
    inner: Mutex<RegistryInner>,
    scaling: Arc<ScalingCalculator>,
    scale_update_threshold: f64,
    scale_smoothing_speed: f64,
}

impl CelestialBodyRegistry {
    pub fn new(scaling: Arc<ScalingCalculator>, scale_update_threshold: f64, scale_smoothing_speed: f64) -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                entries: Vec::new(),
                next_id: 1,
            }),
            scaling,
            scale_update_threshold,
            scale_smoothing_speed,
        }
    }

    pub fn scaling(&self) -> &Arc<ScalingCalculator> {
        &self.scaling
    }

    /// Register a body that lives until explicitly unregistered.
    pub fn register(&self, desc: BodyDescriptor) -> Result<BodyId> {
        self.insert(desc, None)
    }

    /// Register a body whose entry is pruned once `owner` (and all its clones) drop.
    pub fn register_owned(&self, desc: BodyDescriptor, owner: &OwnerToken) -> Result<BodyId> {
        self.insert(desc, Some(owner.watch()))
    }

    fn insert(&self, desc: BodyDescriptor, owner: Option<OwnerWatch>) -> Result<BodyId> {
        if let Err(e) = desc.validate() {
            log::warn!("Ignoring registration: {}", e);
            return Err(e);
        }

        let mut inner = self.inner.lock();
        if let Some(idx) = inner.index_of_name(&desc.name) {
            let err = GravityError::DuplicateName {
                name: desc.name,
                existing: inner.entries[idx].body.id,
            };
            log::warn!("Ignoring registration: {}", err);
            return Err(err);
        }

        let id = BodyId(inner.next_id);
        inner.next_id += 1;
        log::debug!("Registered body '{}' as {} (mass {:.3e} kg)", desc.name, id, desc.mass);
        inner.entries.push(Entry {
            body: CelestialBody {
                id,
                name: desc.name,
                mass: desc.mass,
                radius: desc.radius,
                position: desc.position,
                scale: 1.0,
                last_distance: f64::NAN,
            },
            owner,
        });
        Ok(id)
    }

    /// Remove a body. Returns false if it was not registered (already removed is fine).
    pub fn unregister(&self, id: BodyId) -> bool {
        let mut inner = self.inner.lock();
        match inner.index_of(id) {
            Some(idx) => {
                let entry = inner.entries.remove(idx);
                log::debug!("Unregistered body '{}' ({})", entry.body.name, id);
                true
            }
            None => false,
        }
    }

    pub fn unregister_by_name(&self, name: &str) -> Option<BodyId> {
        let mut inner = self.inner.lock();
        let idx = inner.index_of_name(name)?;
        let entry = inner.entries.remove(idx);
        log::debug!("Unregistered body '{}' ({})", name, entry.body.id);
        Some(entry.body.id)
    }

    /// Drop entries whose owner token has died. Returns the removed ids.
    pub fn prune_stale(&self) -> Vec<BodyId> {
        let mut inner = self.inner.lock();
        let mut removed = Vec::new();
        inner.entries.retain(|e| {
            let alive = e.owner.as_ref().map_or(true, OwnerWatch::is_alive);
            if !alive {
                removed.push(e.body.id);
            }
            alive
        });
        if !removed.is_empty() {
            log::debug!("Pruned {} stale bodies", removed.len());
        }
        removed
    }

    pub fn find_by_name(&self, name: &str) -> Option<CelestialBody> {
        let inner = self.inner.lock();
        inner.index_of_name(name).map(|idx| inner.entries[idx].body.clone())
    }

    pub fn get(&self, id: BodyId) -> Option<CelestialBody> {
        let inner = self.inner.lock();
        inner.index_of(id).map(|idx| inner.entries[idx].body.clone())
    }

    /// Snapshot of every body, in registration order.
    pub fn get_all(&self) -> Vec<CelestialBody> {
        self.inner.lock().entries.iter().map(|e| e.body.clone()).collect()
    }

    /// Bodies whose centre lies within `radius` of `point` (linear scan).
    pub fn get_in_range(&self, point: DVec3, radius: f64) -> Vec<CelestialBody> {
        if radius.is_nan() || radius < 0.0 {
            log::warn!("get_in_range: {}", GravityError::NegativeDistance(radius));
            return Vec::new();
        }
        let r2 = radius * radius;
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|e| e.body.position.distance_squared(point) <= r2)
            .map(|e| e.body.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shift every body by `offset` under one lock (floating-origin recenter).
    pub fn translate_all(&self, offset: DVec3) {
        if !offset.is_finite() {
            log::warn!("translate_all: ignoring non-finite offset {:?}", offset);
            return;
        }
        let mut inner = self.inner.lock();
        for e in inner.entries.iter_mut() {
            e.body.position += offset;
        }
    }

    /// Teleport one body.
    pub fn set_position(&self, id: BodyId, position: DVec3) -> Result<()> {
        if !position.is_finite() {
            return Err(GravityError::InvalidPosition { name: id.to_string() });
        }
        let mut inner = self.inner.lock();
        let idx = inner.index_of(id).ok_or(GravityError::UnknownBody(id))?;
        inner.entries[idx].body.position = position;
        Ok(())
    }

    /// Apply per-body position deltas. Unknown ids are skipped.
    pub fn displace(&self, deltas: &[(BodyId, DVec3)]) {
        let mut inner = self.inner.lock();
        for &(id, delta) in deltas {
            if let Some(idx) = inner.index_of(id) {
                inner.entries[idx].body.position += delta;
            }
        }
    }

    /// Recompute every body's scale for the observer and step it toward the target.
    pub fn update_all_scales(&self, observer: DVec3, dt: f64) {
        let mut inner = self.inner.lock();
        for e in inner.entries.iter_mut() {
            let body = &mut e.body;
            let distance = body.position.distance(observer);
            if ScalingCalculator::should_update(body.last_distance, distance, self.scale_update_threshold) {
                body.last_distance = distance;
            }
            let target = self.scaling.scale_for(body.last_distance);
            body.scale = ScalingCalculator::smooth_transition(body.scale, target, dt, self.scale_smoothing_speed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> CelestialBodyRegistry {
        let scaling = Arc::new(ScalingCalculator::new(1000.0, 1e-4, 10.0, 1.0, 64));
        CelestialBodyRegistry::new(scaling, 0.01, 5.0)
    }

    fn desc(name: &str, x: f64) -> BodyDescriptor {
        BodyDescriptor::new(name, 1.0e3, 5.0, DVec3::new(x, 0.0, 0.0))
    }

    #[test]
    fn register_then_find() {
        let reg = registry();
        let id = reg.register(desc("alpha", 10.0)).unwrap();
        let found = reg.find_by_name("alpha").unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.position, DVec3::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn unregister_is_idempotent() {
        let reg = registry();
        let id = reg.register(desc("alpha", 0.0)).unwrap();
        assert!(reg.unregister(id));
        assert!(!reg.unregister(id));
        assert!(reg.find_by_name("alpha").is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn invalid_and_duplicate_registrations_are_noops() {
        let reg = registry();
        let id = reg.register(desc("alpha", 0.0)).unwrap();
        assert!(matches!(
            reg.register(desc("alpha", 5.0)),
            Err(GravityError::DuplicateName { existing, .. }) if existing == id
        ));
        assert!(reg.register(BodyDescriptor::new("heavy", 0.0, 1.0, DVec3::ZERO)).is_err());
        assert!(reg.register(BodyDescriptor::new("", 1.0, 1.0, DVec3::ZERO)).is_err());
        assert!(reg.register(BodyDescriptor::new("nan", 1.0, 1.0, DVec3::NAN)).is_err());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn translate_all_shifts_exactly() {
        let reg = registry();
        for i in 0..5 {
            reg.register(desc(&format!("b{}", i), i as f64 * 1234.5)).unwrap();
        }
        let before = reg.get_all();
        let offset = DVec3::new(-1.0e5, 42.25, 7.0);
        reg.translate_all(offset);
        for (old, new) in before.iter().zip(reg.get_all()) {
            assert_eq!(new.position, old.position + offset);
        }
    }

    #[test]
    fn range_query_is_inclusive() {
        let reg = registry();
        reg.register(desc("a", 0.0)).unwrap();
        reg.register(desc("b", 100.0)).unwrap();
        reg.register(desc("c", 100.5)).unwrap();
        let names: Vec<String> = reg.get_in_range(DVec3::ZERO, 100.0).into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(reg.get_in_range(DVec3::ZERO, -1.0).is_empty());
    }

    #[test]
    fn stale_owners_are_pruned() {
        let reg = registry();
        let token = OwnerToken::new();
        let owned = reg.register_owned(desc("owned", 0.0), &token).unwrap();
        let free = reg.register(desc("free", 1.0)).unwrap();
        assert!(reg.prune_stale().is_empty());
        drop(token);
        assert_eq!(reg.prune_stale(), vec![owned]);
        assert!(reg.get(free).is_some());
    }

    #[test]
    fn scales_converge_to_inverse_square() {
        let reg = registry();
        let id = reg.register(desc("far", 2000.0)).unwrap();
        for _ in 0..600 {
            reg.update_all_scales(DVec3::ZERO, 1.0 / 60.0);
        }
        let body = reg.get(id).unwrap();
        assert!((body.scale - 0.25).abs() < 1e-3, "scale {}", body.scale);
    }

    #[test]
    fn concurrent_registration() {
        let reg = Arc::new(registry());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let reg = Arc::clone(&reg);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        reg.register(desc(&format!("t{}-{}", t, i), i as f64)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(reg.len(), 100);
    }
}
