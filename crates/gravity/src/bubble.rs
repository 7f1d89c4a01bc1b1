//! Distance-driven fidelity tiers ("bubbles") with hysteresis.
//!
//! Each body sits in one of four tiers by its distance from the observer. To
//! leave a tier outward a body must pass `threshold + margin`; to come back in
//! it must pass `threshold - margin`, so a body hovering on a boundary keeps its
//! tier instead of flapping every frame.

use std::collections::HashMap;

use glam::DVec3;

use crate::config::GravityConfig;
use crate::registry::{BodyId, CelestialBody};

/// Fidelity tier, ordered from closest to farthest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BubbleState {
    /// Full participation, full mesh.
    #[default]
    Near,
    /// Interacts with the dominant bodies only.
    Medium,
    /// Interacts with the few most dominant bodies, low-detail mesh.
    Far,
    /// Kinematic only, billboard representation.
    OutOfBubble,
}

impl BubbleState {
    pub const ALL: [BubbleState; 4] = [
        BubbleState::Near,
        BubbleState::Medium,
        BubbleState::Far,
        BubbleState::OutOfBubble,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn outward(self) -> Option<Self> {
        Self::ALL.get(self.index() + 1).copied()
    }

    fn inward(self) -> Option<Self> {
        self.index().checked_sub(1).map(|i| Self::ALL[i])
    }

    /// Whether bodies in this tier take part in force computation at all.
    pub fn is_dynamic(self) -> bool {
        self != BubbleState::OutOfBubble
    }

    pub fn name(self) -> &'static str {
        match self {
            BubbleState::Near => "Near",
            BubbleState::Medium => "Medium",
            BubbleState::Far => "Far",
            BubbleState::OutOfBubble => "OutOfBubble",
        }
    }
}

/// Tier boundaries in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BubbleThresholds {
    pub near: f64,
    pub medium: f64,
    pub far: f64,
    /// Margin as a fraction of each boundary.
    pub hysteresis_ratio: f64,
}

impl Default for BubbleThresholds {
    fn default() -> Self {
        Self {
            near: 10_000.0,
            medium: 50_000.0,
            far: 100_000.0,
            hysteresis_ratio: 0.05,
        }
    }
}

impl BubbleThresholds {
    /// Thresholds from config, scaled by the active quality preset.
    pub fn from_config(config: &GravityConfig) -> Self {
        let scale = config.quality_settings().threshold_scale;
        Self {
            near: config.near_distance * scale,
            medium: config.medium_distance * scale,
            far: config.far_distance * scale,
            hysteresis_ratio: config.hysteresis_ratio,
        }
    }

    /// Outer boundary of a tier (`None` for OutOfBubble).
    fn upper(&self, state: BubbleState) -> Option<f64> {
        match state {
            BubbleState::Near => Some(self.near),
            BubbleState::Medium => Some(self.medium),
            BubbleState::Far => Some(self.far),
            BubbleState::OutOfBubble => None,
        }
    }

    fn margin(&self, boundary: f64) -> f64 {
        boundary * self.hysteresis_ratio
    }

    /// Tier for a distance with no history.
    pub fn classify(&self, distance: f64) -> BubbleState {
        if distance <= self.near {
            BubbleState::Near
        } else if distance <= self.medium {
            BubbleState::Medium
        } else if distance <= self.far {
            BubbleState::Far
        } else {
            BubbleState::OutOfBubble
        }
    }

    /// Tier for a distance given the current tier, honouring the hysteresis band.
    pub fn next_state(&self, current: BubbleState, distance: f64) -> BubbleState {
        let raw = self.classify(distance);
        let mut state = current;
        if raw > current {
            while let (Some(boundary), Some(next)) = (self.upper(state), state.outward()) {
                if distance > boundary + self.margin(boundary) {
                    state = next;
                } else {
                    break;
                }
            }
        } else if raw < current {
            while let Some(prev) = state.inward() {
                let boundary = self.upper(prev).unwrap_or(f64::INFINITY);
                if distance < boundary - self.margin(boundary) {
                    state = prev;
                } else {
                    break;
                }
            }
        }
        state
    }
}

/// Fired whenever a body changes tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BubbleTransition {
    pub body: BodyId,
    pub old_state: BubbleState,
    pub new_state: BubbleState,
}

/// Handle returned by [`BubbleDistanceManager::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&BubbleTransition) + Send>;

/// Number of bodies per tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub near: usize,
    pub medium: usize,
    pub far: usize,
    pub out_of_bubble: usize,
}

impl StateCounts {
    pub fn add(&mut self, state: BubbleState) {
        match state {
            BubbleState::Near => self.near += 1,
            BubbleState::Medium => self.medium += 1,
            BubbleState::Far => self.far += 1,
            BubbleState::OutOfBubble => self.out_of_bubble += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.near + self.medium + self.far + self.out_of_bubble
    }
}

/// Per-body tier state machine.
pub struct BubbleDistanceManager {
    thresholds: BubbleThresholds,
    states: HashMap<BodyId, BubbleState>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
    update_interval: u32,
    ticks_since_update: u32,
    transitions_total: u64,
}

impl std::fmt::Debug for BubbleDistanceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BubbleDistanceManager")
            .field("thresholds", &self.thresholds)
            .field("bodies", &self.states.len())
            .field("listeners", &self.listeners.len())
            .field("update_interval", &self.update_interval)
            .finish()
    }
}

impl BubbleDistanceManager {
    pub fn new(thresholds: BubbleThresholds, update_interval: u32) -> Self {
        Self {
            thresholds,
            states: HashMap::new(),
            listeners: Vec::new(),
            next_listener: 0,
            update_interval: update_interval.max(1),
            ticks_since_update: 0,
            transitions_total: 0,
        }
    }

    pub fn from_config(config: &GravityConfig) -> Self {
        Self::new(BubbleThresholds::from_config(config), config.bubble_update_interval)
    }

    pub fn thresholds(&self) -> BubbleThresholds {
        self.thresholds
    }

    /// Swap thresholds; states settle at the next update through the hysteresis rules.
    pub fn set_thresholds(&mut self, thresholds: BubbleThresholds) {
        self.thresholds = thresholds;
    }

    pub fn update_interval(&self) -> u32 {
        self.update_interval
    }

    pub fn set_update_interval(&mut self, ticks: u32) {
        self.update_interval = ticks.max(1);
    }

    /// Register a callback for every transition. Runs synchronously inside `update`.
    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&BubbleTransition) + Send + 'static,
    {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != before
    }

    pub fn state_of(&self, id: BodyId) -> Option<BubbleState> {
        self.states.get(&id).copied()
    }

    /// Drop history for a removed body.
    pub fn forget(&mut self, id: BodyId) {
        self.states.remove(&id);
    }

    pub fn counts(&self) -> StateCounts {
        let mut counts = StateCounts::default();
        for &state in self.states.values() {
            counts.add(state);
        }
        counts
    }

    pub fn transitions_total(&self) -> u64 {
        self.transitions_total
    }

    /// Classify one body. New bodies take their raw tier silently (no notification);
    /// known bodies go through hysteresis and notify on change.
    pub fn update_body_state(&mut self, id: BodyId, distance: f64) -> Option<BubbleTransition> {
        if distance.is_nan() || distance < 0.0 {
            log::warn!("Ignoring bubble update for {} with distance {}", id, distance);
            return None;
        }

        let old_state = match self.states.get(&id) {
            Some(&state) => state,
            None => {
                let state = self.thresholds.classify(distance);
                self.states.insert(id, state);
                return None;
            }
        };

        let new_state = self.thresholds.next_state(old_state, distance);
        if new_state == old_state {
            return None;
        }
        self.states.insert(id, new_state);
        self.transitions_total += 1;

        let transition = BubbleTransition {
            body: id,
            old_state,
            new_state,
        };
        log::debug!(
            "Body {} {} -> {} at {:.0} m",
            id,
            old_state.name(),
            new_state.name(),
            distance
        );
        for (_, listener) in self.listeners.iter_mut() {
            listener(&transition);
        }
        Some(transition)
    }

    /// Advance the cadence counter and, when due, re-evaluate every body against the observer.
    /// Bodies seen for the first time are always classified, even off-cadence.
    pub fn update(&mut self, observer: DVec3, bodies: &[CelestialBody]) -> Vec<BubbleTransition> {
        self.ticks_since_update += 1;
        let due = self.ticks_since_update >= self.update_interval;
        if due {
            self.ticks_since_update = 0;
        }

        let mut transitions = Vec::new();
        for body in bodies {
            if !due && self.states.contains_key(&body.id) {
                continue;
            }
            let distance = body.position.distance(observer);
            if let Some(t) = self.update_body_state(body.id, distance) {
                transitions.push(t);
            }
        }
        transitions
    }
}
