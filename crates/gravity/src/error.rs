//! Error values returned by the gravity core. None of these are fatal; callers log and carry on.

use thiserror::Error;

use crate::registry::BodyId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GravityError {
    #[error("body name must not be empty")]
    InvalidName,
    #[error("body '{name}' has invalid mass {mass} (must be finite and > 0)")]
    InvalidMass { name: String, mass: f64 },
    #[error("body '{name}' has invalid radius {radius} (must be finite and >= 0)")]
    InvalidRadius { name: String, radius: f64 },
    #[error("body '{name}' has a non-finite position")]
    InvalidPosition { name: String },
    #[error("a body named '{name}' is already registered as {existing}")]
    DuplicateName { name: String, existing: BodyId },
    #[error("no body with id {0}")]
    UnknownBody(BodyId),
    #[error("distance must be non-negative, got {0}")]
    NegativeDistance(f64),
}

pub type Result<T> = std::result::Result<T, GravityError>;
