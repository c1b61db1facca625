//! Shared types for encounter and battle messages

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::battle_log::BattleEvent;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map($name)
            }
        }
    };
}

numeric_id!(
    /// A connected player
    PlayerId(u64)
);
numeric_id!(
    /// A battle session, unique per server process
    BattleId(u64)
);
numeric_id!(
    /// A combatant, unique within one battle session
    CombatId(u32)
);

/// Stats that can carry stage modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stat {
    Attack,
    Defense,
    SpecialAttack,
    SpecialDefense,
    Speed,
    Accuracy,
    Evasion,
}

impl Stat {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "atk" | "attack" => Some(Stat::Attack),
            "def" | "defense" => Some(Stat::Defense),
            "spa" | "special_attack" => Some(Stat::SpecialAttack),
            "spd" | "special_defense" => Some(Stat::SpecialDefense),
            "spe" | "speed" => Some(Stat::Speed),
            "accuracy" => Some(Stat::Accuracy),
            "evasion" => Some(Stat::Evasion),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stat::Attack => "atk",
            Stat::Defense => "def",
            Stat::SpecialAttack => "spa",
            Stat::SpecialDefense => "spd",
            Stat::Speed => "spe",
            Stat::Accuracy => "accuracy",
            Stat::Evasion => "evasion",
        }
    }
}

/// Who the player is fighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleKind {
    Wild,
    Trainer,
    Pvp,
}

impl BattleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BattleKind::Wild => "wild",
            BattleKind::Trainer => "trainer",
            BattleKind::Pvp => "pvp",
        }
    }
}

/// Lifecycle phase of a battle session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattlePhase {
    Intro,
    AwaitingActions,
    Resolving,
    Victory,
    Defeat,
    Fled,
    Captured,
    /// Cancelled before the intro completed
    Aborted,
}

impl BattlePhase {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "intro" => Some(BattlePhase::Intro),
            "awaiting_actions" => Some(BattlePhase::AwaitingActions),
            "resolving" => Some(BattlePhase::Resolving),
            "victory" => Some(BattlePhase::Victory),
            "defeat" => Some(BattlePhase::Defeat),
            "fled" => Some(BattlePhase::Fled),
            "captured" => Some(BattlePhase::Captured),
            "aborted" => Some(BattlePhase::Aborted),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BattlePhase::Intro => "intro",
            BattlePhase::AwaitingActions => "awaiting_actions",
            BattlePhase::Resolving => "resolving",
            BattlePhase::Victory => "victory",
            BattlePhase::Defeat => "defeat",
            BattlePhase::Fled => "fled",
            BattlePhase::Captured => "captured",
            BattlePhase::Aborted => "aborted",
        }
    }

    /// Whether the session state machine allows moving from `self` to `next`.
    ///
    /// Phases only move forward; two `awaiting_actions` are always separated
    /// by `resolving`, and only `intro` can be aborted.
    pub fn can_transition_to(&self, next: BattlePhase) -> bool {
        use BattlePhase::*;
        match (self, next) {
            (Intro, AwaitingActions | Aborted) => true,
            (AwaitingActions, Resolving) => true,
            (Resolving, AwaitingActions | Victory | Defeat | Fled | Captured) => true,
            // Forfeit between turns
            (AwaitingActions, Victory | Defeat | Fled) => true,
            _ => false,
        }
    }

    /// Whether the session has reached an outcome
    pub fn is_terminal(&self) -> bool {
        self.outcome().is_some()
    }

    /// The outcome a terminal phase represents
    pub fn outcome(&self) -> Option<BattleOutcome> {
        match self {
            BattlePhase::Victory => Some(BattleOutcome::Victory),
            BattlePhase::Defeat => Some(BattleOutcome::Defeat),
            BattlePhase::Fled => Some(BattleOutcome::Fled),
            BattlePhase::Captured => Some(BattleOutcome::Captured),
            BattlePhase::Aborted => Some(BattleOutcome::Aborted),
            _ => None,
        }
    }
}

/// Final result of a battle, from the perspective of the first side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleOutcome {
    Victory,
    Defeat,
    Fled,
    Captured,
    Aborted,
}

impl BattleOutcome {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "victory" => Some(BattleOutcome::Victory),
            "defeat" => Some(BattleOutcome::Defeat),
            "fled" => Some(BattleOutcome::Fled),
            "captured" => Some(BattleOutcome::Captured),
            "aborted" => Some(BattleOutcome::Aborted),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BattleOutcome::Victory => "victory",
            BattleOutcome::Defeat => "defeat",
            BattleOutcome::Fled => "fled",
            BattleOutcome::Captured => "captured",
            BattleOutcome::Aborted => "aborted",
        }
    }

    /// The terminal phase matching this outcome
    pub fn phase(&self) -> BattlePhase {
        match self {
            BattleOutcome::Victory => BattlePhase::Victory,
            BattleOutcome::Defeat => BattlePhase::Defeat,
            BattleOutcome::Fled => BattlePhase::Fled,
            BattleOutcome::Captured => BattlePhase::Captured,
            BattleOutcome::Aborted => BattlePhase::Aborted,
        }
    }
}

/// How a wild encounter was triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncounterMethod {
    Grass,
    Fishing,
}

impl EncounterMethod {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "grass" => Some(EncounterMethod::Grass),
            "fishing" => Some(EncounterMethod::Fishing),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EncounterMethod::Grass => "grass",
            EncounterMethod::Fishing => "fishing",
        }
    }
}

/// Why the authority turned a proposal down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncounterFailReason {
    Cooldown,
    NoZone,
    NoEncounterTile,
    RateMiss,
    InBattle,
    UnknownPlayer,
    NoCombatant,
}

impl EncounterFailReason {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cooldown" => Some(EncounterFailReason::Cooldown),
            "no_zone" => Some(EncounterFailReason::NoZone),
            "no_encounter_tile" => Some(EncounterFailReason::NoEncounterTile),
            "rate_miss" => Some(EncounterFailReason::RateMiss),
            "in_battle" => Some(EncounterFailReason::InBattle),
            "unknown_player" => Some(EncounterFailReason::UnknownPlayer),
            "no_combatant" => Some(EncounterFailReason::NoCombatant),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EncounterFailReason::Cooldown => "cooldown",
            EncounterFailReason::NoZone => "no_zone",
            EncounterFailReason::NoEncounterTile => "no_encounter_tile",
            EncounterFailReason::RateMiss => "rate_miss",
            EncounterFailReason::InBattle => "in_battle",
            EncounterFailReason::UnknownPlayer => "unknown_player",
            EncounterFailReason::NoCombatant => "no_combatant",
        }
    }
}

impl fmt::Display for EncounterFailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Public view of a combatant as broadcast to peers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatantSummary {
    pub combat_id: CombatId,
    /// Side index (0 = the player who started the battle)
    pub side: u8,
    pub species_id: u32,
    pub level: u8,
    pub current_hp: u32,
    pub max_hp: u32,
    /// Type names ("fire", "water", ...)
    pub types: Vec<String>,
    /// Status in protocol form ("brn", "par", ...)
    #[serde(default)]
    pub status: Option<String>,
    /// Non-zero stat stages only
    #[serde(default)]
    pub stages: BTreeMap<Stat, i8>,
}

impl CombatantSummary {
    pub fn is_fainted(&self) -> bool {
        self.current_hp == 0
    }
}

/// One turn's worth of authoritative state, broadcast to every participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleStateDelta {
    pub battle_id: BattleId,
    pub turn_number: u32,
    pub phase: BattlePhase,
    pub combatants: Vec<CombatantSummary>,
    #[serde(default)]
    pub weather: Option<String>,
    pub log: Vec<BattleEvent>,
}
