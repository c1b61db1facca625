//! Battle log entries
//!
//! Every effect the turn resolver applies is recorded as one of these, in
//! application order. Clients replay them to animate a turn; the session
//! keeps the full list as its battle log.

use serde::{Deserialize, Serialize};

use super::battle::{CombatId, Stat};
use crate::action::{ActionKind, ItemKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BattleEvent {
    /// A new turn begins
    Turn { turn: u32 },

    /// `actor` used `move_id`
    Move { actor: CombatId, move_id: String },

    /// The move missed `target`
    Miss { actor: CombatId, target: CombatId },

    /// `amount` of damage taken, `hp` left after it
    Damage {
        target: CombatId,
        amount: u32,
        hp: u32,
    },

    /// Type effectiveness other than neutral
    Effectiveness { target: CombatId, multiplier: f32 },

    /// `amount` restored, `hp` after healing
    Heal {
        target: CombatId,
        amount: u32,
        hp: u32,
    },

    /// Stage change; `change` is what was applied after clamping, `stage` the result
    Boost {
        target: CombatId,
        stat: Stat,
        change: i8,
        stage: i8,
    },

    /// `status` inflicted on `target`
    Status { target: CombatId, status: String },

    /// `target` recovered from `status`
    CureStatus { target: CombatId, status: String },

    /// Residual damage from a status condition
    StatusDamage {
        target: CombatId,
        status: String,
        amount: u32,
        hp: u32,
    },

    /// Residual damage from sand or hail
    WeatherDamage {
        target: CombatId,
        weather: String,
        amount: u32,
        hp: u32,
    },

    /// Struggle recoil
    Recoil {
        actor: CombatId,
        amount: u32,
        hp: u32,
    },

    /// `actor` could not move this turn (`reason` is the status code, such as `par`)
    Cant { actor: CombatId, reason: String },

    WeatherStart { weather: String, turns: u8 },

    WeatherEnd { weather: String },

    /// Side `side` brought `to` in for `from`
    Switch {
        side: u8,
        from: CombatId,
        to: CombatId,
    },

    /// `target` reached 0 hp
    Faint { target: CombatId },

    Item { actor: CombatId, item: ItemKind },

    Flee { actor: CombatId, success: bool },

    Capture {
        actor: CombatId,
        target: CombatId,
        ball: ItemKind,
        shakes: u8,
        success: bool,
    },

    /// A side forfeited (disconnect or pvp flee)
    Forfeit { side: u8 },

    /// The turn timer expired and a default was substituted
    Timeout {
        actor: CombatId,
        substituted: ActionKind,
    },

    /// An action failed validation and was treated as a no-op
    ActionDropped { actor: CombatId, reason: String },

    /// An action was not applied because its actor could no longer act
    Skipped { actor: CombatId, reason: String },
}

impl BattleEvent {
    /// The combatant this entry is primarily about
    pub fn subject(&self) -> Option<CombatId> {
        match self {
            BattleEvent::Move { actor, .. }
            | BattleEvent::Miss { actor, .. }
            | BattleEvent::Recoil { actor, .. }
            | BattleEvent::Cant { actor, .. }
            | BattleEvent::Item { actor, .. }
            | BattleEvent::Flee { actor, .. }
            | BattleEvent::Capture { actor, .. }
            | BattleEvent::Timeout { actor, .. }
            | BattleEvent::ActionDropped { actor, .. }
            | BattleEvent::Skipped { actor, .. } => Some(*actor),
            BattleEvent::Damage { target, .. }
            | BattleEvent::Effectiveness { target, .. }
            | BattleEvent::Heal { target, .. }
            | BattleEvent::Boost { target, .. }
            | BattleEvent::Status { target, .. }
            | BattleEvent::CureStatus { target, .. }
            | BattleEvent::StatusDamage { target, .. }
            | BattleEvent::WeatherDamage { target, .. }
            | BattleEvent::Faint { target } => Some(*target),
            BattleEvent::Switch { to, .. } => Some(*to),
            BattleEvent::Turn { .. }
            | BattleEvent::WeatherStart { .. }
            | BattleEvent::WeatherEnd { .. }
            | BattleEvent::Forfeit { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_is_tagged() {
        let event = BattleEvent::Damage {
            target: CombatId(2),
            amount: 7,
            hp: 10,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "damage");
        assert_eq!(json["amount"], 7);
    }

    #[test]
    fn test_cant_fields() {
        let event = BattleEvent::Cant {
            actor: CombatId(1),
            reason: "par".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({"event": "cant", "actor": 1, "reason": "par"})
        );
    }

    #[test]
    fn test_subject() {
        let faint = BattleEvent::Faint {
            target: CombatId(4),
        };
        assert_eq!(faint.subject(), Some(CombatId(4)));
        assert_eq!(BattleEvent::Turn { turn: 2 }.subject(), None);
    }
}
