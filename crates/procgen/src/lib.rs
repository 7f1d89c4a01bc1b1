//! Procedural initial conditions for gravity sessions.

pub mod scenario;
pub mod star_system;

pub use scenario::*;
pub use star_system::*;
