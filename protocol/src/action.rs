//! Battle actions as submitted by players
//!
//! Payloads arrive as loosely typed JSON next to a `kind` tag. They are
//! turned into a closed [`BattleAction`] here, so nothing past the protocol
//! boundary ever sees an unvalidated payload.

use serde::{Deserialize, Serialize};

use crate::ParseError;

/// The category of a queued action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Attack,
    Item,
    Switch,
    Flee,
    /// Default attack used when a trainer or pvp turn times out
    Struggle,
}

impl ActionKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "attack" => Some(ActionKind::Attack),
            "item" => Some(ActionKind::Item),
            "switch" => Some(ActionKind::Switch),
            "flee" => Some(ActionKind::Flee),
            "struggle" => Some(ActionKind::Struggle),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Attack => "attack",
            ActionKind::Item => "item",
            ActionKind::Switch => "switch",
            ActionKind::Flee => "flee",
            ActionKind::Struggle => "struggle",
        }
    }
}

/// Items usable from the battle menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Potion,
    SuperPotion,
    HyperPotion,
    FullHeal,
    PokeBall,
    GreatBall,
    UltraBall,
}

impl ItemKind {
    pub fn is_ball(&self) -> bool {
        matches!(
            self,
            ItemKind::PokeBall | ItemKind::GreatBall | ItemKind::UltraBall
        )
    }

    /// HP restored by a potion, None for everything else
    pub fn heal_amount(&self) -> Option<u32> {
        match self {
            ItemKind::Potion => Some(20),
            ItemKind::SuperPotion => Some(50),
            ItemKind::HyperPotion => Some(200),
            _ => None,
        }
    }

    /// Catch rate multiplier of a ball, None for non-balls
    pub fn ball_bonus(&self) -> Option<f64> {
        match self {
            ItemKind::PokeBall => Some(1.0),
            ItemKind::GreatBall => Some(1.5),
            ItemKind::UltraBall => Some(2.0),
            _ => None,
        }
    }
}

/// A validated battle action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BattleAction {
    Attack { move_id: String },
    Item { item: ItemKind },
    Switch { slot: u8 },
    Flee,
    Struggle,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AttackPayload {
    #[serde(rename = "move")]
    move_id: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ItemPayload {
    item: ItemKind,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SwitchPayload {
    slot: u8,
}

impl BattleAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            BattleAction::Attack { .. } => ActionKind::Attack,
            BattleAction::Item { .. } => ActionKind::Item,
            BattleAction::Switch { .. } => ActionKind::Switch,
            BattleAction::Flee => ActionKind::Flee,
            BattleAction::Struggle => ActionKind::Struggle,
        }
    }

    /// Validate a `kind` tag and its JSON payload into an action.
    ///
    /// `struggle` is never accepted from the wire; the session substitutes it
    /// on timeout.
    pub fn from_wire(kind: &str, payload: &str) -> Result<Self, ParseError> {
        let invalid = |reason: String| ParseError::InvalidPayload {
            kind: kind.to_string(),
            reason,
        };

        let kind_tag = ActionKind::parse(kind)
            .ok_or_else(|| ParseError::InvalidFormat(format!("unknown action kind '{}'", kind)))?;
        let payload = payload.trim();

        match kind_tag {
            ActionKind::Attack => {
                let p: AttackPayload =
                    serde_json::from_str(payload).map_err(|e| invalid(e.to_string()))?;
                let move_id = p.move_id.trim().to_lowercase();
                if move_id.is_empty() {
                    return Err(invalid("move id cannot be empty".to_string()));
                }
                Ok(BattleAction::Attack { move_id })
            }
            ActionKind::Item => {
                let p: ItemPayload =
                    serde_json::from_str(payload).map_err(|e| invalid(e.to_string()))?;
                Ok(BattleAction::Item { item: p.item })
            }
            ActionKind::Switch => {
                let p: SwitchPayload =
                    serde_json::from_str(payload).map_err(|e| invalid(e.to_string()))?;
                Ok(BattleAction::Switch { slot: p.slot })
            }
            ActionKind::Flee => {
                if payload.is_empty() || payload == "{}" || payload == "null" {
                    Ok(BattleAction::Flee)
                } else {
                    Err(invalid("flee takes no payload".to_string()))
                }
            }
            ActionKind::Struggle => Err(invalid("struggle cannot be chosen".to_string())),
        }
    }

    /// Serialize to the `KIND|PAYLOAD` pair used by `|choose|`
    pub fn to_wire(&self) -> (&'static str, String) {
        let payload = match self {
            BattleAction::Attack { move_id } => serde_json::json!({ "move": move_id }).to_string(),
            BattleAction::Item { item } => serde_json::json!({ "item": item }).to_string(),
            BattleAction::Switch { slot } => serde_json::json!({ "slot": slot }).to_string(),
            BattleAction::Flee | BattleAction::Struggle => "{}".to_string(),
        };
        (self.kind().as_str(), payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attack_payload() {
        let action = BattleAction::from_wire("attack", r#"{"move":"Tackle"}"#).unwrap();
        assert_eq!(
            action,
            BattleAction::Attack {
                move_id: "tackle".to_string()
            }
        );
    }

    #[test]
    fn test_item_payload() {
        let action = BattleAction::from_wire("item", r#"{"item":"great_ball"}"#).unwrap();
        assert_eq!(
            action,
            BattleAction::Item {
                item: ItemKind::GreatBall
            }
        );
    }

    #[test]
    fn test_flee_accepts_empty_payload() {
        assert_eq!(BattleAction::from_wire("flee", "").unwrap(), BattleAction::Flee);
        assert_eq!(BattleAction::from_wire("flee", "{}").unwrap(), BattleAction::Flee);
        assert!(BattleAction::from_wire("flee", r#"{"x":1}"#).is_err());
    }

    #[test]
    fn test_rejects_unknown_kind() {
        let err = BattleAction::from_wire("dance", "{}").unwrap_err();
        assert!(matches!(err, ParseError::InvalidFormat(_)));
    }

    #[test]
    fn test_rejects_malformed_payloads() {
        assert!(BattleAction::from_wire("attack", r#"{"move":""}"#).is_err());
        assert!(BattleAction::from_wire("attack", r#"{"mvoe":"tackle"}"#).is_err());
        assert!(BattleAction::from_wire("item", r#"{"item":"rare_candy"}"#).is_err());
        assert!(BattleAction::from_wire("switch", r#"{"slot":-1}"#).is_err());
        assert!(BattleAction::from_wire("struggle", "{}").is_err());
    }

    #[test]
    fn test_to_wire_is_accepted_back() {
        let action = BattleAction::Switch { slot: 2 };
        let (kind, payload) = action.to_wire();
        assert_eq!(kind, "switch");
        assert_eq!(BattleAction::from_wire(kind, &payload).unwrap(), action);
    }

    #[test]
    fn test_item_helpers() {
        assert!(ItemKind::UltraBall.is_ball());
        assert!(!ItemKind::Potion.is_ball());
        assert_eq!(ItemKind::SuperPotion.heal_amount(), Some(50));
        assert_eq!(ItemKind::FullHeal.heal_amount(), None);
        assert_eq!(ItemKind::GreatBall.ball_bonus(), Some(1.5));
    }
}
