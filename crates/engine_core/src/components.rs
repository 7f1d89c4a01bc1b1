//! Common ECS components shared by the simulation crates.

use std::sync::{Arc, Weak};

use glam::DVec3;

/// Double-precision world position. Kept separate from any render transform so
/// kilometre-scale coordinates never pass through `f32`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WorldPosition(pub DVec3);

impl WorldPosition {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self(DVec3::new(x, y, z))
    }

    /// Translate by a delta (floating-origin rebase, integration step).
    pub fn translate(&mut self, delta: DVec3) {
        self.0 += delta;
    }
}

/// Velocity component for moving entities (m/s).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Velocity {
    pub linear: DVec3,
}

impl Velocity {
    pub fn new(linear: DVec3) -> Self {
        Self { linear }
    }
}

/// Marks an entity as a gravitating body. Name must be unique within a session.
#[derive(Debug, Clone, PartialEq)]
pub struct GravityBody {
    pub name: String,
    /// Mass in kilograms.
    pub mass: f64,
    /// Physical radius in metres.
    pub radius: f64,
}

impl GravityBody {
    pub fn new(name: impl Into<String>, mass: f64, radius: f64) -> Self {
        Self {
            name: name.into(),
            mass,
            radius,
        }
    }
}

/// Net force applied to the entity during the last physics tick, in host units.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AppliedForce(pub DVec3);

/// Render scale factor derived from observer distance (1.0 at the reference distance).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderScale(pub f64);

impl Default for RenderScale {
    fn default() -> Self {
        Self(1.0)
    }
}

/// Liveness token held by whatever owns a registered body.
///
/// Registries keep only a [`Weak`] reference; once every clone of the token is
/// dropped the owner counts as destroyed and its entry becomes stale.
#[derive(Debug, Clone, Default)]
pub struct OwnerToken(Arc<()>);

impl OwnerToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Weak handle for a registry entry.
    pub fn watch(&self) -> OwnerWatch {
        OwnerWatch(Arc::downgrade(&self.0))
    }
}

/// Weak side of an [`OwnerToken`].
#[derive(Debug, Clone)]
pub struct OwnerWatch(Weak<()>);

impl OwnerWatch {
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}
