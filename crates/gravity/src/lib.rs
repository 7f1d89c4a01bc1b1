//! Gravity simulation for large-world games.
//!
//! - Body registry with owner-liveness tracking
//! - Distance-bubble tiers (Near / Medium / Far / OutOfBubble) with hysteresis
//! - Direct-summation N-body forces with tiered participation
//! - Conservation checks and a health state machine
//! - Distance-based visual scaling
//! - ECS bridge and server correction records

pub mod bubble;
pub mod config;
pub mod ecs;
pub mod error;
pub mod nbody;
pub mod registry;
pub mod replication;
pub mod scaling;
pub mod stats;
pub mod unified;
pub mod validation;

pub use bubble::{BubbleDistanceManager, BubbleState, BubbleThresholds, BubbleTransition, ListenerId, StateCounts};
pub use config::{GravityConfig, QualityOverrides, QualityPreset, QualitySettings, GRAVITATIONAL_CONSTANT, STANDARD_GRAVITY};
pub use ecs::GravityLink;
pub use error::{GravityError, Result};
pub use nbody::{pairwise_force, ForceSettings, NBodyGravityComponent, ParticipationPolicy, TickReport, TrackedBody};
pub use registry::{BodyDescriptor, BodyId, CelestialBody, CelestialBodyRegistry};
pub use replication::{decode_records, encode_records, CorrectionRecord, NetworkRole, ReplicationPublisher};
pub use scaling::ScalingCalculator;
pub use stats::{SystemStatistics, TickTiming};
pub use unified::UnifiedGravitySystem;
pub use validation::{HealthMonitor, HealthStatus, ValidationCheck, ValidationReport};
