//! Combatant state during battle

use tallgrass_protocol::{CombatId, CombatantSummary, Stat};

use super::pokemon_type::Type;
use super::stats::{BaseStats, ComputedStats, StatStages};
use super::status::Status;
use super::weather::Weather;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MoveCategory {
    Physical,
    Special,
    /// No damage, effect only
    Status,
}

/// Who a move's stat change lands on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EffectTarget {
    User,
    Target,
}

/// Secondary effect of a move, applied after any damage
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "effect", rename_all = "snake_case"))]
pub enum MoveEffect {
    #[default]
    None,
    StatChange {
        stat: Stat,
        stages: i8,
        target: EffectTarget,
    },
    InflictStatus {
        status: Status,
        /// Percent chance, 100 = always
        chance: u8,
    },
    SetWeather {
        weather: Weather,
    },
}

/// A move a combatant knows, with its remaining PP
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KnownMove {
    pub id: String,
    pub move_type: Type,
    pub category: MoveCategory,
    pub power: u16,
    /// Percent; 0 never misses
    pub accuracy: u8,
    pub pp: u8,
    pub max_pp: u8,
    #[cfg_attr(feature = "serde", serde(default))]
    pub effect: MoveEffect,
}

impl KnownMove {
    /// A damaging move with no secondary effect
    pub fn attack(
        id: impl Into<String>,
        move_type: Type,
        category: MoveCategory,
        power: u16,
        accuracy: u8,
        pp: u8,
    ) -> Self {
        Self {
            id: id.into(),
            move_type,
            category,
            power,
            accuracy,
            pp,
            max_pp: pp,
            effect: MoveEffect::None,
        }
    }

    /// A non-damaging move
    pub fn status(id: impl Into<String>, move_type: Type, accuracy: u8, pp: u8, effect: MoveEffect) -> Self {
        Self {
            id: id.into(),
            move_type,
            category: MoveCategory::Status,
            power: 0,
            accuracy,
            pp,
            max_pp: pp,
            effect,
        }
    }

    pub fn with_effect(mut self, effect: MoveEffect) -> Self {
        self.effect = effect;
        self
    }

    pub fn is_usable(&self) -> bool {
        self.pp > 0
    }
}

/// One combatant's battle state
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BattleCombatant {
    pub species_id: u32,
    /// Unique within one session
    pub combat_id: CombatId,
    pub level: u8,
    pub current_hp: u32,
    pub max_hp: u32,
    pub types: Vec<Type>,
    pub known_moves: Vec<KnownMove>,
    pub status: Option<Status>,
    pub base_stats: BaseStats,
    /// Derived from base stats, level and status; see [`recompute_stats`](Self::recompute_stats)
    pub computed_stats: ComputedStats,
    pub stages: StatStages,
    /// Species catch rate, 1-255
    pub catch_rate: u8,
    /// Turns of sleep remaining
    pub sleep_turns: u8,
    /// Turns bad poison has ticked
    pub toxic_counter: u8,
}

impl BattleCombatant {
    /// Create a combatant at full HP with freshly computed stats
    pub fn new(
        combat_id: CombatId,
        species_id: u32,
        level: u8,
        types: Vec<Type>,
        base_stats: BaseStats,
        known_moves: Vec<KnownMove>,
    ) -> Self {
        let level = level.clamp(1, 100);
        let max_hp = base_stats.max_hp(level);
        Self {
            species_id,
            combat_id,
            level,
            current_hp: max_hp,
            max_hp,
            types,
            known_moves,
            status: None,
            base_stats,
            computed_stats: ComputedStats::compute(&base_stats, level, None),
            stages: StatStages::new(),
            catch_rate: 45,
            sleep_turns: 0,
            toxic_counter: 0,
        }
    }

    pub fn with_catch_rate(mut self, catch_rate: u8) -> Self {
        self.catch_rate = catch_rate.max(1);
        self
    }

    pub fn is_fainted(&self) -> bool {
        self.current_hp == 0
    }

    pub fn is_alive(&self) -> bool {
        !self.is_fainted()
    }

    pub fn has_type(&self, t: Type) -> bool {
        self.types.contains(&t)
    }

    /// Recompute derived stats after a level or status change
    pub fn recompute_stats(&mut self) {
        self.computed_stats = ComputedStats::compute(&self.base_stats, self.level, self.status);
    }

    /// Change level, keeping the same amount of missing HP
    pub fn set_level(&mut self, level: u8) {
        let missing = self.max_hp.saturating_sub(self.current_hp);
        let alive = self.is_alive();
        self.level = level.clamp(1, 100);
        self.max_hp = self.base_stats.max_hp(self.level);
        self.current_hp = self.max_hp.saturating_sub(missing);
        if alive {
            self.current_hp = self.current_hp.max(1);
        }
        self.recompute_stats();
    }

    /// Give a status if none is present; returns whether it stuck
    pub fn set_status(&mut self, status: Status, sleep_turns: u8) -> bool {
        if self.status.is_some() || self.is_fainted() {
            return false;
        }
        self.status = Some(status);
        self.sleep_turns = if status == Status::Sleep { sleep_turns.max(1) } else { 0 };
        self.toxic_counter = 0;
        self.recompute_stats();
        true
    }

    /// Remove any status, returning what was cured
    pub fn cure_status(&mut self) -> Option<Status> {
        let cured = self.status.take();
        if cured.is_some() {
            self.sleep_turns = 0;
            self.toxic_counter = 0;
            self.recompute_stats();
        }
        cured
    }

    /// Subtract HP, returns damage actually dealt
    pub fn apply_damage(&mut self, amount: u32) -> u32 {
        let dealt = amount.min(self.current_hp);
        self.current_hp -= dealt;
        dealt
    }

    /// Restore HP up to max, returns HP actually restored
    pub fn heal(&mut self, amount: u32) -> u32 {
        let healed = amount.min(self.max_hp.saturating_sub(self.current_hp));
        self.current_hp += healed;
        healed
    }

    /// Speed with the stage multiplier applied
    pub fn effective_speed(&self) -> f32 {
        self.computed_stats.speed as f32 * StatStages::multiplier(self.stages.speed)
    }

    pub fn find_move(&self, move_id: &str) -> Option<&KnownMove> {
        self.known_moves.iter().find(|m| m.id == move_id)
    }

    pub fn find_move_mut(&mut self, move_id: &str) -> Option<&mut KnownMove> {
        self.known_moves.iter_mut().find(|m| m.id == move_id)
    }

    pub fn has_usable_move(&self) -> bool {
        self.known_moves.iter().any(KnownMove::is_usable)
    }

    /// Clear battle-only state when leaving the field
    pub fn on_switch_out(&mut self) {
        self.stages.clear();
        if self.status == Some(Status::BadPoison) {
            self.toxic_counter = 0;
        }
    }

    /// Wire view of this combatant
    pub fn summary(&self, side: u8) -> CombatantSummary {
        CombatantSummary {
            combat_id: self.combat_id,
            side,
            species_id: self.species_id,
            level: self.level,
            current_hp: self.current_hp,
            max_hp: self.max_hp,
            types: self.types.iter().map(|t| t.as_str().to_string()).collect(),
            status: self.status.map(|s| s.to_protocol().to_string()),
            stages: self.stages.nonzero(),
        }
    }
}
