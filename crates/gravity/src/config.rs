//! Gravity configuration. Every field has a documented default and may be omitted in RON.

use serde::{Deserialize, Serialize};

/// Standard gravity used to express the acceleration cap in g.
pub const STANDARD_GRAVITY: f64 = 9.80665;

/// Newtonian constant of gravitation (m³ kg⁻¹ s⁻²).
pub const GRAVITATIONAL_CONSTANT: f64 = 6.674_30e-11;

/// Named bundle of values trading fidelity for cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QualityPreset {
    Low,
    Medium,
    #[default]
    High,
    Ultra,
}

impl QualityPreset {
    /// Values this preset applies on top of [`GravityConfig`].
    pub fn settings(self) -> QualitySettings {
        match self {
            QualityPreset::Low => QualitySettings {
                threshold_scale: 0.5,
                scale_cache_size: 256,
                max_active_bodies: 64,
                medium_dominant_k: 2,
                far_dominant_k: 1,
            },
            QualityPreset::Medium => QualitySettings {
                threshold_scale: 0.75,
                scale_cache_size: 512,
                max_active_bodies: 128,
                medium_dominant_k: 4,
                far_dominant_k: 1,
            },
            QualityPreset::High => QualitySettings {
                threshold_scale: 1.0,
                scale_cache_size: 1024,
                max_active_bodies: 256,
                medium_dominant_k: 8,
                far_dominant_k: 2,
            },
            QualityPreset::Ultra => QualitySettings {
                threshold_scale: 1.5,
                scale_cache_size: 4096,
                max_active_bodies: 1024,
                medium_dominant_k: 16,
                far_dominant_k: 4,
            },
        }
    }

    /// Next cheaper preset, if any.
    pub fn lower(self) -> Option<Self> {
        match self {
            QualityPreset::Low => None,
            QualityPreset::Medium => Some(QualityPreset::Low),
            QualityPreset::High => Some(QualityPreset::Medium),
            QualityPreset::Ultra => Some(QualityPreset::High),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            QualityPreset::Low => "Low",
            QualityPreset::Medium => "Medium",
            QualityPreset::High => "High",
            QualityPreset::Ultra => "Ultra",
        }
    }
}

/// Preset-derived values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualitySettings {
    /// Multiplier on the bubble distance thresholds.
    pub threshold_scale: f64,
    pub scale_cache_size: usize,
    /// Bodies beyond this count are kinematic for the tick.
    pub max_active_bodies: usize,
    /// Medium-tier bodies only interact with this many of the most massive bodies.
    pub medium_dominant_k: usize,
    /// Far-tier bodies only interact with this many of the most massive bodies.
    pub far_dominant_k: usize,
}

/// Optional fixed values that win over the preset's.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityOverrides {
    #[serde(default)]
    pub scale_cache_size: Option<usize>,
    #[serde(default)]
    pub max_active_bodies: Option<usize>,
    #[serde(default)]
    pub medium_dominant_k: Option<usize>,
    #[serde(default)]
    pub far_dominant_k: Option<usize>,
}

/// Plain configuration for one gravity session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GravityConfig {
    /// Gravitational constant G (SI).
    #[serde(default = "default_gravitational_constant")]
    pub gravitational_constant: f64,
    /// Pair separations are clamped to at least this many metres.
    #[serde(default = "default_min_distance")]
    pub min_distance: f64,
    /// Per-body acceleration cap in multiples of standard gravity.
    #[serde(default = "default_max_acceleration_g")]
    pub max_acceleration_g: f64,
    /// Host force units per newton (100.0 for centimetre-based hosts).
    #[serde(default = "default_one")]
    pub force_unit_scale: f64,

    /// Distance at which the scale factor is exactly 1.0 (metres).
    #[serde(default = "default_reference_distance")]
    pub scale_reference_distance: f64,
    #[serde(default = "default_min_scale")]
    pub min_scale: f64,
    #[serde(default = "default_max_scale")]
    pub max_scale: f64,
    /// Cache key resolution (metres).
    #[serde(default = "default_scale_quantization")]
    pub scale_quantization: f64,
    /// Relative distance change below which a body's scale is not recomputed.
    #[serde(default = "default_scale_update_threshold")]
    pub scale_update_threshold: f64,
    /// Rate of the damped scale interpolation (1/s).
    #[serde(default = "default_scale_smoothing_speed")]
    pub scale_smoothing_speed: f64,

    /// Upper edge of the Near tier (metres, before the preset multiplier).
    #[serde(default = "default_near_distance")]
    pub near_distance: f64,
    /// Upper edge of the Medium tier.
    #[serde(default = "default_medium_distance")]
    pub medium_distance: f64,
    /// Upper edge of the Far tier; beyond it a body is out of the bubble.
    #[serde(default = "default_far_distance")]
    pub far_distance: f64,
    /// Hysteresis margin as a fraction of each threshold.
    #[serde(default = "default_hysteresis_ratio")]
    pub hysteresis_ratio: f64,
    /// Bubble states are re-evaluated every this many ticks.
    #[serde(default = "default_one_u32")]
    pub bubble_update_interval: u32,
    /// Ceiling for the auto-tuner when it stretches the cadence.
    #[serde(default = "default_max_bubble_update_interval")]
    pub max_bubble_update_interval: u32,

    /// Conservation checks run every this many ticks (300 ≈ 5 s at 60 Hz).
    #[serde(default = "default_validation_frequency")]
    pub validation_frequency: u64,
    #[serde(default = "default_tolerance")]
    pub force_tolerance: f64,
    #[serde(default = "default_tolerance")]
    pub momentum_tolerance: f64,
    #[serde(default = "default_tolerance")]
    pub energy_tolerance: f64,
    /// Dropped pairs and zeroed net forces per validation window tolerated before health degrades.
    #[serde(default = "default_instability_threshold")]
    pub numeric_instability_threshold: u64,

    /// Tick time that starts auto-tuning (milliseconds).
    #[serde(default = "default_warning_budget_ms")]
    pub tick_budget_warning_ms: f64,
    /// Tick time that forces Near-only participation (milliseconds).
    #[serde(default = "default_critical_budget_ms")]
    pub tick_budget_critical_ms: f64,
    /// Consecutive slow (or fast) ticks before the tuner acts.
    #[serde(default = "default_tuning_patience")]
    pub tuning_patience: u32,

    #[serde(default)]
    pub quality: QualityPreset,
    /// Pin individual preset values regardless of the active preset.
    #[serde(default)]
    pub overrides: QualityOverrides,

    /// Seconds between correction broadcasts on a server.
    #[serde(default = "default_replication_interval")]
    pub replication_interval: f64,
}

fn default_gravitational_constant() -> f64 {
    GRAVITATIONAL_CONSTANT
}
fn default_min_distance() -> f64 {
    1.0
}
fn default_max_acceleration_g() -> f64 {
    100.0
}
fn default_one() -> f64 {
    1.0
}
fn default_reference_distance() -> f64 {
    1000.0
}
fn default_min_scale() -> f64 {
    1e-4
}
fn default_max_scale() -> f64 {
    10.0
}
fn default_scale_quantization() -> f64 {
    1.0
}
fn default_scale_update_threshold() -> f64 {
    0.01
}
fn default_scale_smoothing_speed() -> f64 {
    5.0
}
fn default_near_distance() -> f64 {
    10_000.0
}
fn default_medium_distance() -> f64 {
    50_000.0
}
fn default_far_distance() -> f64 {
    100_000.0
}
fn default_hysteresis_ratio() -> f64 {
    0.05
}
fn default_one_u32() -> u32 {
    1
}
fn default_max_bubble_update_interval() -> u32 {
    8
}
fn default_validation_frequency() -> u64 {
    300
}
fn default_tolerance() -> f64 {
    0.1
}
fn default_instability_threshold() -> u64 {
    10
}
fn default_warning_budget_ms() -> f64 {
    4.0
}
fn default_critical_budget_ms() -> f64 {
    12.0
}
fn default_tuning_patience() -> u32 {
    30
}
fn default_replication_interval() -> f64 {
    0.1
}

impl Default for GravityConfig {
    fn default() -> Self {
        Self {
            gravitational_constant: default_gravitational_constant(),
            min_distance: default_min_distance(),
            max_acceleration_g: default_max_acceleration_g(),
            force_unit_scale: default_one(),
            scale_reference_distance: default_reference_distance(),
            min_scale: default_min_scale(),
            max_scale: default_max_scale(),
            scale_quantization: default_scale_quantization(),
            scale_update_threshold: default_scale_update_threshold(),
            scale_smoothing_speed: default_scale_smoothing_speed(),
            near_distance: default_near_distance(),
            medium_distance: default_medium_distance(),
            far_distance: default_far_distance(),
            hysteresis_ratio: default_hysteresis_ratio(),
            bubble_update_interval: default_one_u32(),
            max_bubble_update_interval: default_max_bubble_update_interval(),
            validation_frequency: default_validation_frequency(),
            force_tolerance: default_tolerance(),
            momentum_tolerance: default_tolerance(),
            energy_tolerance: default_tolerance(),
            numeric_instability_threshold: default_instability_threshold(),
            tick_budget_warning_ms: default_warning_budget_ms(),
            tick_budget_critical_ms: default_critical_budget_ms(),
            tuning_patience: default_tuning_patience(),
            quality: QualityPreset::default(),
            overrides: QualityOverrides::default(),
            replication_interval: default_replication_interval(),
        }
    }
}

impl GravityConfig {
    /// Values contributed by the current quality preset, with overrides applied.
    pub fn quality_settings(&self) -> QualitySettings {
        let mut q = self.quality.settings();
        let o = self.overrides;
        q.scale_cache_size = o.scale_cache_size.unwrap_or(q.scale_cache_size).max(1);
        q.max_active_bodies = o.max_active_bodies.unwrap_or(q.max_active_bodies);
        q.medium_dominant_k = o.medium_dominant_k.unwrap_or(q.medium_dominant_k);
        q.far_dominant_k = o.far_dominant_k.unwrap_or(q.far_dominant_k);
        q
    }

    /// Acceleration cap in m/s².
    pub fn max_acceleration(&self) -> f64 {
        self.max_acceleration_g * STANDARD_GRAVITY
    }

    /// Replace nonsensical values with their defaults, logging each fix.
    pub fn sanitized(mut self) -> Self {
        fn fix(name: &str, value: &mut f64, ok: bool, fallback: f64) {
            if !ok {
                log::warn!("Config {} = {} is invalid, using {}", name, value, fallback);
                *value = fallback;
            }
        }

        let g = self.gravitational_constant;
        fix("gravitational_constant", &mut self.gravitational_constant, g.is_finite() && g >= 0.0, default_gravitational_constant());
        let v = self.min_distance;
        fix("min_distance", &mut self.min_distance, v.is_finite() && v > 0.0, default_min_distance());
        let v = self.max_acceleration_g;
        fix("max_acceleration_g", &mut self.max_acceleration_g, v.is_finite() && v > 0.0, default_max_acceleration_g());
        let v = self.force_unit_scale;
        fix("force_unit_scale", &mut self.force_unit_scale, v.is_finite() && v > 0.0, default_one());
        let v = self.scale_reference_distance;
        fix("scale_reference_distance", &mut self.scale_reference_distance, v.is_finite() && v > 0.0, default_reference_distance());
        let v = self.min_scale;
        fix("min_scale", &mut self.min_scale, v.is_finite() && v > 0.0, default_min_scale());
        let (lo, hi) = (self.min_scale, self.max_scale);
        fix("max_scale", &mut self.max_scale, hi.is_finite() && hi >= lo, default_max_scale().max(lo));
        let v = self.scale_quantization;
        fix("scale_quantization", &mut self.scale_quantization, v.is_finite() && v > 0.0, default_scale_quantization());
        let v = self.hysteresis_ratio;
        fix("hysteresis_ratio", &mut self.hysteresis_ratio, (0.0..0.5).contains(&v), default_hysteresis_ratio());

        let ordered = self.near_distance > 0.0
            && self.near_distance < self.medium_distance
            && self.medium_distance < self.far_distance
            && self.far_distance.is_finite();
        if !ordered {
            log::warn!(
                "Bubble thresholds {}/{}/{} are not increasing, using defaults",
                self.near_distance,
                self.medium_distance,
                self.far_distance
            );
            self.near_distance = default_near_distance();
            self.medium_distance = default_medium_distance();
            self.far_distance = default_far_distance();
        }

        self.bubble_update_interval = self.bubble_update_interval.max(1);
        self.max_bubble_update_interval = self.max_bubble_update_interval.max(self.bubble_update_interval);
        self.validation_frequency = self.validation_frequency.max(1);
        self.tuning_patience = self.tuning_patience.max(1);
        if self.tick_budget_critical_ms < self.tick_budget_warning_ms {
            self.tick_budget_critical_ms = self.tick_budget_warning_ms;
        }
        self
    }
}
