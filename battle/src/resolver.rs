//! Turn resolution
//!
//! Orders a sealed action queue and applies it to the session, producing
//! the turn's log. Every action is re-checked right before it is applied:
//! an actor that fainted, was switched out, or whose battle already ended
//! earlier in the same turn does nothing.

use rand::Rng;
use tallgrass_protocol::{BattleAction, BattleEvent, BattleKind, CombatId, ItemKind};
use tracing::{debug, warn};

use crate::session::{sort_queue, BattleSession, QueuedAction};
use crate::types::{
    BattleCombatant, EffectTarget, KnownMove, MoveCategory, MoveEffect, StatStages, Status, Type, Weather,
};

/// How a turn ended the battle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ending {
    Fled,
    Captured,
    Defeated { loser: u8 },
}

/// A move about to be used, either a known move or struggle
#[derive(Debug, Clone)]
struct MoveUse {
    id: String,
    move_type: Option<Type>,
    category: MoveCategory,
    power: u16,
    accuracy: u8,
    effect: MoveEffect,
    recoil: bool,
}

impl MoveUse {
    fn known(mv: &KnownMove) -> Self {
        Self {
            id: mv.id.clone(),
            move_type: Some(mv.move_type),
            category: mv.category,
            power: mv.power,
            accuracy: mv.accuracy,
            effect: mv.effect.clone(),
            recoil: false,
        }
    }

    fn struggle() -> Self {
        Self {
            id: "struggle".to_string(),
            move_type: None,
            category: MoveCategory::Physical,
            power: 50,
            accuracy: 0,
            effect: MoveEffect::None,
            recoil: true,
        }
    }
}

/// Applies one turn to a session
pub(crate) struct TurnResolver<'a, R: Rng + ?Sized> {
    session: &'a mut BattleSession,
    rng: &'a mut R,
    ending: Option<Ending>,
}

impl<'a, R: Rng + ?Sized> TurnResolver<'a, R> {
    pub(crate) fn new(session: &'a mut BattleSession, rng: &'a mut R) -> Self {
        Self {
            session,
            rng,
            ending: None,
        }
    }

    /// Apply the queue in resolution order, then end-of-turn effects
    pub(crate) fn resolve(mut self, mut queue: Vec<QueuedAction>, events: &mut Vec<BattleEvent>) -> Option<Ending> {
        sort_queue(&mut queue);

        for queued in queue {
            if let Some(reason) = self.skip_reason(&queued) {
                debug!(
                    battle_id = %self.session.battle_id(),
                    actor = %queued.actor_id,
                    reason,
                    "Skipping queued action"
                );
                events.push(BattleEvent::Skipped {
                    actor: queued.actor_id,
                    reason: reason.to_string(),
                });
                continue;
            }
            self.apply(&queued, events);
        }

        if self.ending.is_none() {
            self.end_of_turn(events);
        }
        self.ending
    }

    /// Checked immediately before applying, never precomputed
    fn skip_reason(&self, queued: &QueuedAction) -> Option<&'static str> {
        if self.ending.is_some() {
            return Some("battle_over");
        }
        let active = &self.session.sides[queued.side as usize].active;
        if active.combat_id != queued.actor_id {
            return Some("switched_out");
        }
        if active.is_fainted() {
            return Some("fainted");
        }
        None
    }

    fn apply(&mut self, queued: &QueuedAction, events: &mut Vec<BattleEvent>) {
        match &queued.action {
            BattleAction::Attack { move_id } => self.attack(queued, move_id, events),
            BattleAction::Struggle => {
                if self.can_act(queued.side, events) {
                    events.push(BattleEvent::Move {
                        actor: queued.actor_id,
                        move_id: "struggle".to_string(),
                    });
                    self.use_move(queued.side, &MoveUse::struggle(), events);
                }
            }
            BattleAction::Item { item } => self.use_item(queued, *item, events),
            BattleAction::Switch { slot } => self.switch(queued, *slot, events),
            BattleAction::Flee => self.flee(queued, events),
        }
    }

    fn drop_action(&self, actor: CombatId, reason: &str, events: &mut Vec<BattleEvent>) {
        warn!(
            battle_id = %self.session.battle_id(),
            actor = %actor,
            reason,
            "Dropping invalid action"
        );
        events.push(BattleEvent::ActionDropped {
            actor,
            reason: reason.to_string(),
        });
    }

    fn attack(&mut self, queued: &QueuedAction, move_id: &str, events: &mut Vec<BattleEvent>) {
        let actor = &self.session.sides[queued.side as usize].active;
        let mv = match actor.find_move(move_id) {
            Some(mv) if mv.is_usable() => MoveUse::known(mv),
            Some(_) => return self.drop_action(queued.actor_id, "no_pp", events),
            None => return self.drop_action(queued.actor_id, "unknown_move", events),
        };

        if !self.can_act(queued.side, events) {
            return;
        }

        if let Some(known) = self.session.sides[queued.side as usize].active.find_move_mut(move_id) {
            known.pp -= 1;
        }
        events.push(BattleEvent::Move {
            actor: queued.actor_id,
            move_id: mv.id.clone(),
        });
        self.use_move(queued.side, &mv, events);
    }

    /// Sleep, freeze and paralysis may stop the actor this turn
    fn can_act(&mut self, side: u8, events: &mut Vec<BattleEvent>) -> bool {
        let actor = &mut self.session.sides[side as usize].active;
        let id = actor.combat_id;

        match actor.status {
            Some(Status::Sleep) => {
                actor.sleep_turns = actor.sleep_turns.saturating_sub(1);
                if actor.sleep_turns > 0 {
                    events.push(BattleEvent::Cant {
                        actor: id,
                        reason: "slp".to_string(),
                    });
                    return false;
                }
                actor.cure_status();
                events.push(BattleEvent::CureStatus {
                    target: id,
                    status: Status::Sleep.to_protocol().to_string(),
                });
                true
            }
            Some(Status::Freeze) => {
                if self.rng.gen_bool(0.2) {
                    actor.cure_status();
                    events.push(BattleEvent::CureStatus {
                        target: id,
                        status: Status::Freeze.to_protocol().to_string(),
                    });
                    true
                } else {
                    events.push(BattleEvent::Cant {
                        actor: id,
                        reason: "frz".to_string(),
                    });
                    false
                }
            }
            Some(Status::Paralysis) => {
                let stuck = self.rng.gen_bool(0.25);
                if stuck {
                    events.push(BattleEvent::Cant {
                        actor: id,
                        reason: "par".to_string(),
                    });
                }
                !stuck
            }
            _ => true,
        }
    }

    fn use_move(&mut self, side: u8, mv: &MoveUse, events: &mut Vec<BattleEvent>) {
        let [first, second] = &mut self.session.sides;
        let (attacker, defender) = if side == 0 {
            (&mut first.active, &mut second.active)
        } else {
            (&mut second.active, &mut first.active)
        };

        if mv.accuracy > 0 {
            let stage = attacker.stages.accuracy.saturating_sub(defender.stages.evasion);
            let chance = mv.accuracy as f32 * StatStages::accuracy_multiplier(stage);
            let roll = self.rng.gen_range(0..100) as f32;
            if roll >= chance {
                events.push(BattleEvent::Miss {
                    actor: attacker.combat_id,
                    target: defender.combat_id,
                });
                return;
            }
        }

        if mv.category != MoveCategory::Status && mv.power > 0 {
            let effectiveness = mv
                .move_type
                .map(|t| t.effectiveness_multi(&defender.types))
                .unwrap_or(1.0);

            if effectiveness == 0.0 {
                events.push(BattleEvent::Effectiveness {
                    target: defender.combat_id,
                    multiplier: 0.0,
                });
                return;
            }

            let weather = self.session.weather;
            let random = self.rng.gen_range(85..=100) as f32 / 100.0;
            let amount = damage(attacker, defender, mv, effectiveness, weather, random);
            let dealt = defender.apply_damage(amount);

            events.push(BattleEvent::Damage {
                target: defender.combat_id,
                amount: dealt,
                hp: defender.current_hp,
            });
            if effectiveness != 1.0 {
                events.push(BattleEvent::Effectiveness {
                    target: defender.combat_id,
                    multiplier: effectiveness,
                });
            }

            if mv.recoil {
                let recoil = attacker.apply_damage((dealt / 4).max(1));
                events.push(BattleEvent::Recoil {
                    actor: attacker.combat_id,
                    amount: recoil,
                    hp: attacker.current_hp,
                });
            }

            if defender.is_fainted() {
                events.push(BattleEvent::Faint {
                    target: defender.combat_id,
                });
            }
            if attacker.is_fainted() {
                events.push(BattleEvent::Faint {
                    target: attacker.combat_id,
                });
            }
        }

        match &mv.effect {
            MoveEffect::None => {}
            MoveEffect::StatChange { stat, stages, target } => {
                let whom = match target {
                    EffectTarget::User => &mut *attacker,
                    EffectTarget::Target => &mut *defender,
                };
                if whom.is_alive() {
                    let change = whom.stages.boost(*stat, *stages);
                    events.push(BattleEvent::Boost {
                        target: whom.combat_id,
                        stat: *stat,
                        change,
                        stage: whom.stages.get(*stat),
                    });
                }
            }
            MoveEffect::InflictStatus { status, chance } => {
                let frozen_out = *status == Status::Freeze
                    && self.session.weather.is_some_and(|w| w.prevents_freeze());
                if defender.is_alive()
                    && defender.status.is_none()
                    && !status_immune(*status, &defender.types)
                    && !frozen_out
                    && self.rng.gen_range(0..100) < *chance
                {
                    let sleep_turns = self.rng.gen_range(1..=3);
                    if defender.set_status(*status, sleep_turns) {
                        events.push(BattleEvent::Status {
                            target: defender.combat_id,
                            status: status.to_protocol().to_string(),
                        });
                    }
                }
            }
            MoveEffect::SetWeather { weather } => {
                if self.session.weather != Some(*weather) {
                    self.session.weather = Some(*weather);
                    self.session.weather_turns_remaining = Weather::DEFAULT_TURNS;
                    events.push(BattleEvent::WeatherStart {
                        weather: weather.to_protocol().to_string(),
                        turns: Weather::DEFAULT_TURNS,
                    });
                }
            }
        }
    }

    fn use_item(&mut self, queued: &QueuedAction, item: ItemKind, events: &mut Vec<BattleEvent>) {
        if item.is_ball() {
            if self.session.kind() != BattleKind::Wild || queued.side != 0 {
                return self.drop_action(queued.actor_id, "ball_not_allowed", events);
            }
            events.push(BattleEvent::Item {
                actor: queued.actor_id,
                item,
            });
            return self.throw_ball(queued.actor_id, item, events);
        }

        let actor = &mut self.session.sides[queued.side as usize].active;
        events.push(BattleEvent::Item {
            actor: actor.combat_id,
            item,
        });

        if let Some(amount) = item.heal_amount() {
            let healed = actor.heal(amount);
            events.push(BattleEvent::Heal {
                target: actor.combat_id,
                amount: healed,
                hp: actor.current_hp,
            });
        } else if item == ItemKind::FullHeal {
            if let Some(cured) = actor.cure_status() {
                events.push(BattleEvent::CureStatus {
                    target: actor.combat_id,
                    status: cured.to_protocol().to_string(),
                });
            }
        }
    }

    fn throw_ball(&mut self, actor: CombatId, ball: ItemKind, events: &mut Vec<BattleEvent>) {
        let target = &self.session.sides[1].active;
        let bonus = ball.ball_bonus().unwrap_or(1.0);
        let shake_odds = shake_threshold(target, bonus);

        let mut shakes = 0u8;
        while shakes < 4 && self.rng.gen_range(0..65536u32) < shake_odds {
            shakes += 1;
        }
        let success = shakes == 4;

        events.push(BattleEvent::Capture {
            actor,
            target: target.combat_id,
            ball,
            shakes,
            success,
        });
        if success {
            self.ending = Some(Ending::Captured);
        }
    }

    fn switch(&mut self, queued: &QueuedAction, slot: u8, events: &mut Vec<BattleEvent>) {
        match self.session.sides[queued.side as usize].switch_to(slot) {
            Some((from, to)) => events.push(BattleEvent::Switch {
                side: queued.side,
                from,
                to,
            }),
            None => self.drop_action(queued.actor_id, "invalid_switch", events),
        }
    }

    fn flee(&mut self, queued: &QueuedAction, events: &mut Vec<BattleEvent>) {
        match self.session.kind() {
            BattleKind::Trainer => self.drop_action(queued.actor_id, "cannot_flee", events),
            BattleKind::Pvp => {
                events.push(BattleEvent::Forfeit { side: queued.side });
                self.ending = Some(Ending::Defeated { loser: queued.side });
            }
            BattleKind::Wild => {
                let side = queued.side as usize;
                self.session.sides[side].flee_attempts = self.session.sides[side].flee_attempts.saturating_add(1);

                let own = &self.session.sides[side];
                let other = &self.session.sides[1 - side];
                let odds = escape_odds(
                    own.active.computed_stats.speed,
                    other.active.computed_stats.speed,
                    own.flee_attempts,
                );
                let success = odds.map_or(true, |odds| self.rng.gen_range(0..256u32) < odds);

                events.push(BattleEvent::Flee {
                    actor: queued.actor_id,
                    success,
                });
                if success {
                    self.ending = Some(Ending::Fled);
                }
            }
        }
    }

    /// Status over time, weather chip, weather countdown, then faint replacement
    fn end_of_turn(&mut self, events: &mut Vec<BattleEvent>) {
        for side in &mut self.session.sides {
            let c = &mut side.active;
            let Some(status) = c.status.filter(|_| c.is_alive()) else {
                continue;
            };
            if let Some(amount) = status.residual_damage(c.max_hp, c.toxic_counter) {
                let dealt = c.apply_damage(amount);
                if status == Status::BadPoison {
                    c.toxic_counter = c.toxic_counter.saturating_add(1);
                }
                events.push(BattleEvent::StatusDamage {
                    target: c.combat_id,
                    status: status.to_protocol().to_string(),
                    amount: dealt,
                    hp: c.current_hp,
                });
                if c.is_fainted() {
                    events.push(BattleEvent::Faint { target: c.combat_id });
                }
            }
        }

        if let Some(weather) = self.session.weather {
            for side in &mut self.session.sides {
                let c = &mut side.active;
                if c.is_alive() && weather.chips(&c.types) {
                    let dealt = c.apply_damage((c.max_hp / 16).max(1));
                    events.push(BattleEvent::WeatherDamage {
                        target: c.combat_id,
                        weather: weather.to_protocol().to_string(),
                        amount: dealt,
                        hp: c.current_hp,
                    });
                    if c.is_fainted() {
                        events.push(BattleEvent::Faint { target: c.combat_id });
                    }
                }
            }

            self.session.weather_turns_remaining = self.session.weather_turns_remaining.saturating_sub(1);
            if self.session.weather_turns_remaining == 0 {
                self.session.weather = None;
                events.push(BattleEvent::WeatherEnd {
                    weather: weather.to_protocol().to_string(),
                });
            }
        }

        // Side 0 is checked first, so a double knockout is a defeat
        for (index, side) in self.session.sides.iter_mut().enumerate() {
            if side.active.is_alive() {
                continue;
            }
            match side.first_living_reserve() {
                Some(slot) => {
                    if let Some((from, to)) = side.switch_to(slot as u8) {
                        events.push(BattleEvent::Switch {
                            side: index as u8,
                            from,
                            to,
                        });
                    }
                }
                None => {
                    if self.ending.is_none() {
                        self.ending = Some(Ending::Defeated { loser: index as u8 });
                    }
                }
            }
        }
    }
}

/// `((2L/5 + 2) * P * A / D) / 50 + 2`, then the modifiers. At least 1.
fn damage(
    attacker: &BattleCombatant,
    defender: &BattleCombatant,
    mv: &MoveUse,
    effectiveness: f32,
    weather: Option<Weather>,
    random: f32,
) -> u32 {
    let (attack, defense) = match mv.category {
        MoveCategory::Special => (
            attacker.computed_stats.special_attack as f32 * StatStages::multiplier(attacker.stages.special_attack),
            defender.computed_stats.special_defense as f32
                * StatStages::multiplier(defender.stages.special_defense),
        ),
        _ => (
            attacker.computed_stats.attack as f32 * StatStages::multiplier(attacker.stages.attack),
            defender.computed_stats.defense as f32 * StatStages::multiplier(defender.stages.defense),
        ),
    };

    let level = attacker.level as f32;
    let base = ((2.0 * level / 5.0 + 2.0).floor() * mv.power as f32 * attack / defense.max(1.0)).floor() / 50.0 + 2.0;

    let stab = match mv.move_type {
        Some(t) if attacker.has_type(t) => 1.5,
        _ => 1.0,
    };
    let weather = weather.map(|w| w.damage_modifier(mv.move_type)).unwrap_or(1.0);

    ((base * stab * effectiveness * weather * random).floor() as u32).max(1)
}

/// Per-shake pass threshold out of 65536; `a >= 255` always passes
fn shake_threshold(target: &BattleCombatant, ball_bonus: f64) -> u32 {
    let max = target.max_hp.max(1) as f64;
    let hp = target.current_hp as f64;
    let status_bonus = target.status.map(|s| s.capture_bonus()).unwrap_or(1.0);

    let a = (3.0 * max - 2.0 * hp) * target.catch_rate as f64 * ball_bonus / (3.0 * max) * status_bonus;
    if a >= 255.0 {
        return 65536;
    }
    let a = a.max(1.0);
    (1_048_560.0 / (16_711_680.0 / a).sqrt().sqrt()) as u32
}

/// Escape odds out of 256, or None when escape is certain
fn escape_odds(own_speed: u32, other_speed: u32, attempts: u8) -> Option<u32> {
    if own_speed >= other_speed {
        return None;
    }
    Some((own_speed * 128 / other_speed.max(1) + 30 * attempts as u32) % 256)
}

fn status_immune(status: Status, types: &[Type]) -> bool {
    let immune: &[Type] = match status {
        Status::Burn => &[Type::Fire],
        Status::Freeze => &[Type::Ice],
        Status::Paralysis => &[Type::Electric],
        Status::Poison | Status::BadPoison => &[Type::Poison, Type::Steel],
        Status::Sleep => &[],
    };
    types.iter().any(|t| immune.contains(t))
}
