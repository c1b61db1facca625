//! Per-player encounter roll gating
//!
//! A roll is only allowed once both the time cooldown and the step count
//! since the last roll are satisfied. Granting a roll resets the counters
//! whatever the draw later decides, so standing still on one tile cannot
//! produce a flood of rolls.

use std::collections::HashMap;

use serde::Deserialize;
use tallgrass_protocol::PlayerId;
use tracing::trace;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Minimum time between two rolls
    pub cooldown_ms: u64,
    /// Movement ticks needed between two rolls
    pub steps_required: u32,
    /// A move longer than this (in pixels) counts as a teleport
    pub teleport_distance: Option<f32>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 500,
            steps_required: 3,
            teleport_distance: Some(128.0),
        }
    }
}

/// Roll counters for one player in one zone.
///
/// Reset triggers: entering a different zone, a teleport, an explicit
/// [`EncounterGate::reset`], and every granted roll. A reset stamps the
/// current time as the last roll, so the cooldown also applies to the
/// first roll after it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GateState {
    pub last_roll_ms: Option<u64>,
    pub steps_since_last_roll: u32,
    pub zone: Option<String>,
    pub last_position: Option<(f32, f32)>,
}

impl GateState {
    fn reset(&mut self, now_ms: u64) {
        self.last_roll_ms = Some(now_ms);
        self.steps_since_last_roll = 0;
    }
}

/// Rate limiter deciding when an encounter roll may happen
#[derive(Debug, Clone, Default)]
pub struct EncounterGate {
    config: GateConfig,
    states: HashMap<PlayerId, GateState>,
}

impl EncounterGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            states: HashMap::new(),
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Record one movement tick and answer whether a roll is allowed.
    ///
    /// The step counter advances on every call (clamped at the threshold),
    /// even when the cooldown blocks the roll. A `true` answer is the roll.
    pub fn should_evaluate(&mut self, player: PlayerId, now_ms: u64, x: f32, y: f32) -> bool {
        let config = &self.config;
        let state = self.states.entry(player).or_default();
        track(config, state, player, now_ms, x, y);

        state.steps_since_last_roll = (state.steps_since_last_roll + 1).min(config.steps_required);

        let time_ok = state
            .last_roll_ms
            .is_none_or(|last| now_ms >= last && now_ms - last >= config.cooldown_ms);
        let steps_ok = state.steps_since_last_roll >= config.steps_required;

        if time_ok && steps_ok {
            state.reset(now_ms);
            true
        } else {
            false
        }
    }

    /// Record a movement tick that cannot roll (no encounter tile).
    ///
    /// Only teleport detection sees it; the step counter does not advance.
    pub fn track_position(&mut self, player: PlayerId, now_ms: u64, x: f32, y: f32) {
        let config = &self.config;
        let state = self.states.entry(player).or_default();
        track(config, state, player, now_ms, x, y);
    }

    /// Note the zone the player is in; a change resets the counters
    pub fn enter_zone(&mut self, player: PlayerId, zone: &str, now_ms: u64) {
        let state = self.states.entry(player).or_default();
        if state.zone.as_deref() != Some(zone) {
            state.zone = Some(zone.to_string());
            state.last_position = None;
            state.reset(now_ms);
        }
    }

    /// Force-reset after a teleport or anything else that moves the player
    pub fn reset(&mut self, player: PlayerId, now_ms: u64) {
        let state = self.states.entry(player).or_default();
        state.last_position = None;
        state.reset(now_ms);
    }

    /// Drop all state for a player (disconnect)
    pub fn forget(&mut self, player: PlayerId) {
        self.states.remove(&player);
    }

    pub fn state(&self, player: PlayerId) -> Option<&GateState> {
        self.states.get(&player)
    }
}

fn track(config: &GateConfig, state: &mut GateState, player: PlayerId, now_ms: u64, x: f32, y: f32) {
    if let (Some(limit), Some((px, py))) = (config.teleport_distance, state.last_position) {
        let distance = ((x - px).powi(2) + (y - py).powi(2)).sqrt();
        if distance > limit {
            trace!(player = %player, distance, "Teleport detected, resetting encounter gate");
            state.reset(now_ms);
        }
    }
    state.last_position = Some((x, y));
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: PlayerId = PlayerId(1);

    fn gate() -> EncounterGate {
        EncounterGate::new(GateConfig {
            cooldown_ms: 500,
            steps_required: 3,
            teleport_distance: None,
        })
    }

    #[test]
    fn test_needs_steps_before_first_roll() {
        let mut gate = gate();
        assert!(!gate.should_evaluate(P, 0, 0.0, 0.0));
        assert!(!gate.should_evaluate(P, 10, 1.0, 0.0));
        assert!(gate.should_evaluate(P, 20, 2.0, 0.0));
        assert_eq!(gate.state(P).unwrap().steps_since_last_roll, 0);
        assert_eq!(gate.state(P).unwrap().last_roll_ms, Some(20));
    }

    #[test]
    fn test_cooldown_blocks_even_with_steps() {
        let mut gate = gate();
        for t in 0..3 {
            gate.should_evaluate(P, t, 0.0, 0.0);
        }
        // Rolled at t=2; steps pile up but the cooldown has not elapsed
        for t in 3..10 {
            assert!(!gate.should_evaluate(P, t * 10, 0.0, 0.0));
        }
        assert_eq!(gate.state(P).unwrap().steps_since_last_roll, 3);
        assert!(gate.should_evaluate(P, 502, 0.0, 0.0));
    }

    #[test]
    fn test_step_counter_is_clamped() {
        let mut gate = gate();
        gate.should_evaluate(P, 0, 0.0, 0.0);
        gate.should_evaluate(P, 1, 0.0, 0.0);
        gate.should_evaluate(P, 2, 0.0, 0.0);
        for t in 0..100 {
            gate.should_evaluate(P, 3 + t, 0.0, 0.0);
        }
        assert!(gate.state(P).unwrap().steps_since_last_roll <= 3);
    }

    #[test]
    fn test_never_two_rolls_within_cooldown() {
        let mut gate = gate();
        let mut rolls = Vec::new();
        let mut now = 0u64;
        // Irregular tick spacing, including a burst of zero-length ticks
        for i in 0..2_000u64 {
            now += (i * 7919) % 97;
            if i % 250 == 0 {
                gate.enter_zone(P, if i % 500 == 0 { "a" } else { "b" }, now);
            }
            if gate.should_evaluate(P, now, i as f32, 0.0) {
                rolls.push(now);
            }
        }
        assert!(rolls.len() > 10);
        for pair in rolls.windows(2) {
            assert!(pair[1] - pair[0] >= 500, "rolls at {} and {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_zone_change_resets() {
        let mut gate = gate();
        gate.enter_zone(P, "route1", 0);
        gate.should_evaluate(P, 600, 0.0, 0.0);
        gate.should_evaluate(P, 700, 0.0, 0.0);
        assert_eq!(gate.state(P).unwrap().steps_since_last_roll, 2);

        // Same zone again keeps the counters
        gate.enter_zone(P, "route1", 710);
        assert_eq!(gate.state(P).unwrap().steps_since_last_roll, 2);

        gate.enter_zone(P, "route2", 720);
        let state = gate.state(P).unwrap();
        assert_eq!(state.steps_since_last_roll, 0);
        assert_eq!(state.last_roll_ms, Some(720));
        assert_eq!(state.zone.as_deref(), Some("route2"));
    }

    #[test]
    fn test_teleport_resets() {
        let mut gate = EncounterGate::new(GateConfig {
            teleport_distance: Some(64.0),
            ..GateConfig::default()
        });
        gate.should_evaluate(P, 1000, 0.0, 0.0);
        gate.should_evaluate(P, 1100, 16.0, 0.0);
        assert_eq!(gate.state(P).unwrap().steps_since_last_roll, 2);

        gate.should_evaluate(P, 1200, 900.0, 900.0);
        let state = gate.state(P).unwrap();
        assert_eq!(state.steps_since_last_roll, 1);
        assert_eq!(state.last_roll_ms, Some(1200));
    }

    #[test]
    fn test_players_are_independent() {
        let mut gate = gate();
        let other = PlayerId(2);
        for t in 0..3 {
            gate.should_evaluate(P, t, 0.0, 0.0);
        }
        assert!(!gate.should_evaluate(other, 3, 0.0, 0.0));
        gate.forget(P);
        assert!(gate.state(P).is_none());
        assert!(gate.state(other).is_some());
    }

    #[test]
    fn test_clock_going_backwards_does_not_roll() {
        let mut gate = gate();
        for t in 0..3 {
            gate.should_evaluate(P, 10_000 + t, 0.0, 0.0);
        }
        for _ in 0..5 {
            assert!(!gate.should_evaluate(P, 0, 0.0, 0.0));
        }
    }
}
