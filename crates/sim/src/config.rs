//! Driver configuration. Loaded from `config.ron` at startup.

use std::path::{Path, PathBuf};

use gravity::GravityConfig;
use serde::{Deserialize, Serialize};

/// Which initial conditions to spawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScenarioKind {
    /// Random bodies at rest in a cube.
    #[default]
    Cluster,
    /// Earth and Moon on a circular orbit.
    EarthMoon,
    /// A generated star with planets. Needs astronomical bubble thresholds.
    StarSystem,
}

/// Persistent driver settings. Missing fields take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub scenario: ScenarioKind,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Cluster body count.
    #[serde(default = "default_body_count")]
    pub body_count: usize,
    /// Cluster half-width in metres.
    #[serde(default = "default_half_extent")]
    pub half_extent: f64,
    /// Cluster mass range in kilograms.
    #[serde(default = "default_mass_range")]
    pub mass_range: (f64, f64),
    /// Fixed physics rate in Hz.
    #[serde(default = "default_tick_rate")]
    pub tick_rate: f64,
    /// Simulated seconds per physics second (600 = ten minutes per second).
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,
    /// Wall-clock seconds to run for; frames are fed headless at `tick_rate`.
    #[serde(default = "default_duration")]
    pub duration: f64,
    /// Log the debug summary every this many ticks (0 disables).
    #[serde(default = "default_report_every")]
    pub report_every: u64,
    /// Observer distance from the origin that triggers a recenter (metres).
    #[serde(default = "default_origin_threshold")]
    pub origin_threshold: f64,
    /// Body the observer rides along with; the heaviest body if unset.
    #[serde(default)]
    pub follow: Option<String>,
    #[serde(default)]
    pub gravity: GravityConfig,
}

fn default_seed() -> u64 {
    42
}
fn default_body_count() -> usize {
    50
}
fn default_half_extent() -> f64 {
    100_000.0
}
fn default_mass_range() -> (f64, f64) {
    (1.0e10, 1.0e14)
}
fn default_tick_rate() -> f64 {
    60.0
}
fn default_time_scale() -> f64 {
    1.0
}
fn default_duration() -> f64 {
    10.0
}
fn default_report_every() -> u64 {
    300
}
fn default_origin_threshold() -> f64 {
    5_000.0
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            scenario: ScenarioKind::default(),
            seed: default_seed(),
            body_count: default_body_count(),
            half_extent: default_half_extent(),
            mass_range: default_mass_range(),
            tick_rate: default_tick_rate(),
            time_scale: default_time_scale(),
            duration: default_duration(),
            report_every: default_report_every(),
            origin_threshold: default_origin_threshold(),
            follow: None,
            gravity: GravityConfig::default(),
        }
    }
}

impl SimConfig {
    /// Load config from `path`. If the file is missing or invalid, returns the default config.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(data) => match ron::from_str(&data) {
                Ok(c) => return c,
                Err(e) => log::warn!("Invalid config at {:?}: {}, using defaults", path, e),
            },
            Err(_) => log::info!("No config at {:?}, using defaults", path),
        }
        Self::default()
    }

    /// Write the config as pretty RON. Logs on error.
    pub fn save(&self, path: &Path) {
        match ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default()) {
            Ok(s) => {
                if let Err(e) = std::fs::write(path, s) {
                    log::warn!("Could not write config to {:?}: {}", path, e);
                }
            }
            Err(e) => log::warn!("Could not serialize config: {}", e),
        }
    }

    /// Simulated seconds advanced by one physics step.
    pub fn step_seconds(&self) -> f64 {
        self.time_scale / self.tick_rate
    }
}

/// `config.ron` in the current directory.
pub fn default_config_path() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join("config.ron")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_defaults() {
        let config: SimConfig = ron::from_str("(scenario: EarthMoon, time_scale: 600.0, gravity: (near_distance: 1e10, medium_distance: 2e10, far_distance: 4e10))").unwrap();
        assert_eq!(config.scenario, ScenarioKind::EarthMoon);
        assert_eq!(config.body_count, 50);
        assert_eq!(config.gravity.near_distance, 1e10);
        assert_eq!(config.gravity.min_distance, 1.0);
        assert!((config.step_seconds() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let config = SimConfig::load(Path::new("/nonexistent/gravsim/config.ron"));
        assert_eq!(config.scenario, ScenarioKind::Cluster);
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn pretty_output_parses_back() {
        let text = ron::ser::to_string_pretty(&SimConfig::default(), ron::ser::PrettyConfig::default()).unwrap();
        let back: SimConfig = ron::from_str(&text).unwrap();
        assert_eq!(back.gravity, GravityConfig::default());
        assert_eq!(back.mass_range, default_mass_range());
    }
}
