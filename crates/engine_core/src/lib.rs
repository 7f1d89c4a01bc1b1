//! Core engine types shared by the simulation crates.
//!
//! This crate provides the foundational types used across all systems:
//! - Double-precision spatial components for the ECS
//! - Fixed-step clock
//! - Floating-origin rebasing

pub mod components;
pub mod origin;
pub mod time;

pub use components::*;
pub use origin::*;
pub use time::*;

// Re-export commonly used types
pub use glam::DVec3;
pub use hecs::{Entity, World};
