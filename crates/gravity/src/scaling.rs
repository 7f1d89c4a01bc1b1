//! Distance → scale factor mapping that follows gravitational falloff.
//!
//! `scale(d) = clamp((d_ref / d)², min_scale, max_scale)`, so an object's visual
//! weight shrinks at the same inverse-square rate as its gravitational pull.
//! Results are cached by quantized distance in a bounded FIFO map.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::config::GravityConfig;

/// Distances are never allowed below this floor (metres).
pub const DISTANCE_EPSILON: f64 = 1e-3;

/// Clamp a distance to the epsilon floor. NaN and negatives map to the floor too.
#[inline]
pub fn clamp_distance(distance: f64) -> f64 {
    if distance.is_nan() || distance < DISTANCE_EPSILON {
        DISTANCE_EPSILON
    } else {
        distance
    }
}

/// Uncached inverse-square scale.
pub fn inverse_square_scale(distance: f64, reference_distance: f64, min_scale: f64, max_scale: f64) -> f64 {
    let d = clamp_distance(distance);
    let d_ref = clamp_distance(reference_distance);
    let ratio = d_ref / d;
    (ratio * ratio).clamp(min_scale, max_scale)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ScaleKey {
    distance: i64,
    reference: u64,
}

/// One cached result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleCacheEntry {
    /// Quantized distance bucket.
    pub key: i64,
    pub scale: f64,
}

#[derive(Debug, Default)]
struct ScaleCache {
    entries: HashMap<ScaleKey, f64>,
    order: VecDeque<ScaleKey>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl ScaleCache {
    fn insert(&mut self, key: ScaleKey, scale: f64) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.insert(key, scale).is_none() {
            self.order.push_back(key);
        }
        self.evict();
    }

    fn evict(&mut self) {
        while self.entries.len() > self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScaleCacheStats {
    pub len: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Converts observer distance into a dimensionless scale factor.
///
/// Safe to share between threads; the cache sits behind its own lock.
#[derive(Debug)]
pub struct ScalingCalculator {
    pub reference_distance: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    quantization: f64,
    cache: Mutex<ScaleCache>,
}

impl ScalingCalculator {
    pub fn new(reference_distance: f64, min_scale: f64, max_scale: f64, quantization: f64, cache_size: usize) -> Self {
        Self {
            reference_distance: clamp_distance(reference_distance),
            min_scale,
            max_scale: max_scale.max(min_scale),
            quantization: if quantization > 0.0 { quantization } else { 1.0 },
            cache: Mutex::new(ScaleCache {
                capacity: cache_size,
                ..Default::default()
            }),
        }
    }

    pub fn from_config(config: &GravityConfig) -> Self {
        Self::new(
            config.scale_reference_distance,
            config.min_scale,
            config.max_scale,
            config.scale_quantization,
            config.quality_settings().scale_cache_size,
        )
    }

    /// Scale at `distance` for the given reference distance, cached by quantized distance.
    pub fn calculate_scale_factor(&self, distance: f64, reference_distance: f64) -> f64 {
        let bucket = (clamp_distance(distance) / self.quantization).round();
        let key = ScaleKey {
            distance: bucket as i64,
            reference: clamp_distance(reference_distance).to_bits(),
        };

        let mut cache = self.cache.lock();
        if let Some(&scale) = cache.entries.get(&key) {
            cache.hits += 1;
            return scale;
        }
        cache.misses += 1;
        let scale = inverse_square_scale(bucket * self.quantization, reference_distance, self.min_scale, self.max_scale);
        cache.insert(key, scale);
        scale
    }

    /// Scale using the calculator's own reference distance.
    pub fn scale_for(&self, distance: f64) -> f64 {
        self.calculate_scale_factor(distance, self.reference_distance)
    }

    /// Damped step from `current` toward `target`. Never overshoots.
    pub fn smooth_transition(current: f64, target: f64, dt: f64, speed: f64) -> f64 {
        if !current.is_finite() {
            return target;
        }
        if dt <= 0.0 || speed <= 0.0 {
            return current;
        }
        let alpha = 1.0 - (-speed * dt).exp();
        current + (target - current) * alpha
    }

    /// True when the distance changed by more than `threshold` relative to the old value.
    pub fn should_update(old_distance: f64, new_distance: f64, threshold: f64) -> bool {
        if !old_distance.is_finite() || old_distance <= DISTANCE_EPSILON {
            return true;
        }
        ((new_distance - old_distance) / old_distance).abs() > threshold
    }

    /// Resize the cache, dropping the oldest entries if it shrinks.
    pub fn set_cache_capacity(&self, capacity: usize) {
        let mut cache = self.cache.lock();
        cache.capacity = capacity;
        cache.evict();
    }

    pub fn clear_cache(&self) {
        let mut cache = self.cache.lock();
        cache.entries.clear();
        cache.order.clear();
    }

    pub fn cache_stats(&self) -> ScaleCacheStats {
        let cache = self.cache.lock();
        ScaleCacheStats {
            len: cache.entries.len(),
            capacity: cache.capacity,
            hits: cache.hits,
            misses: cache.misses,
        }
    }

    /// Cached entries, oldest first.
    pub fn cache_entries(&self) -> Vec<ScaleCacheEntry> {
        let cache = self.cache.lock();
        cache
            .order
            .iter()
            .filter_map(|key| cache.entries.get(key).map(|&scale| ScaleCacheEntry { key: key.distance, scale }))
            .collect()
    }
}
