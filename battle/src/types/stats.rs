//! Stat stages, base stats and derived stats

use std::collections::BTreeMap;

use tallgrass_protocol::Stat;

use super::status::Status;

pub const MIN_STAGE: i8 = -6;
pub const MAX_STAGE: i8 = 6;

/// Stat stages (-6 to +6)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatStages {
    pub attack: i8,
    pub defense: i8,
    pub special_attack: i8,
    pub special_defense: i8,
    pub speed: i8,
    pub accuracy: i8,
    pub evasion: i8,
}

impl StatStages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, stat: Stat) -> i8 {
        match stat {
            Stat::Attack => self.attack,
            Stat::Defense => self.defense,
            Stat::SpecialAttack => self.special_attack,
            Stat::SpecialDefense => self.special_defense,
            Stat::Speed => self.speed,
            Stat::Accuracy => self.accuracy,
            Stat::Evasion => self.evasion,
        }
    }

    /// Set stage for a stat (clamped to -6..+6)
    pub fn set(&mut self, stat: Stat, value: i8) {
        let clamped = value.clamp(MIN_STAGE, MAX_STAGE);
        match stat {
            Stat::Attack => self.attack = clamped,
            Stat::Defense => self.defense = clamped,
            Stat::SpecialAttack => self.special_attack = clamped,
            Stat::SpecialDefense => self.special_defense = clamped,
            Stat::Speed => self.speed = clamped,
            Stat::Accuracy => self.accuracy = clamped,
            Stat::Evasion => self.evasion = clamped,
        }
    }

    /// Apply a (possibly negative) boost, returns the change actually applied
    pub fn boost(&mut self, stat: Stat, amount: i8) -> i8 {
        let current = self.get(stat);
        let new_value = current.saturating_add(amount).clamp(MIN_STAGE, MAX_STAGE);
        self.set(stat, new_value);
        new_value - current
    }

    /// Reset all stages to 0
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_clear(&self) -> bool {
        *self == Self::default()
    }

    /// Non-zero stages keyed by stat, for broadcasting
    pub fn nonzero(&self) -> BTreeMap<Stat, i8> {
        [
            Stat::Attack,
            Stat::Defense,
            Stat::SpecialAttack,
            Stat::SpecialDefense,
            Stat::Speed,
            Stat::Accuracy,
            Stat::Evasion,
        ]
        .into_iter()
        .map(|stat| (stat, self.get(stat)))
        .filter(|(_, stage)| *stage != 0)
        .collect()
    }

    /// Get the multiplier for a stat stage (for atk/def/spa/spd/spe)
    /// +1 = 1.5x, +2 = 2x, ..., +6 = 4x
    /// -1 = 0.67x, -2 = 0.5x, ..., -6 = 0.25x
    pub fn multiplier(stage: i8) -> f32 {
        let stage = stage.clamp(MIN_STAGE, MAX_STAGE);
        if stage >= 0 {
            (2 + stage as i32) as f32 / 2.0
        } else {
            2.0 / (2 - stage as i32) as f32
        }
    }

    /// Get the multiplier for accuracy/evasion stages (different formula)
    /// +1 = 1.33x, +2 = 1.67x, ..., +6 = 3x
    /// -1 = 0.75x, -2 = 0.6x, ..., -6 = 0.33x
    pub fn accuracy_multiplier(stage: i8) -> f32 {
        let stage = stage.clamp(MIN_STAGE, MAX_STAGE);
        if stage >= 0 {
            (3 + stage as i32) as f32 / 3.0
        } else {
            3.0 / (3 - stage as i32) as f32
        }
    }
}

/// Species base stats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BaseStats {
    pub hp: u16,
    pub attack: u16,
    pub defense: u16,
    pub special_attack: u16,
    pub special_defense: u16,
    pub speed: u16,
}

impl BaseStats {
    pub fn new(
        hp: u16,
        attack: u16,
        defense: u16,
        special_attack: u16,
        special_defense: u16,
        speed: u16,
    ) -> Self {
        Self {
            hp,
            attack,
            defense,
            special_attack,
            special_defense,
            speed,
        }
    }

    /// Maximum HP at a level
    pub fn max_hp(&self, level: u8) -> u32 {
        2 * self.hp as u32 * level as u32 / 100 + level as u32 + 10
    }
}

/// Stats derived from base stats, level and status.
///
/// Stage modifiers are never folded in here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComputedStats {
    pub attack: u32,
    pub defense: u32,
    pub special_attack: u32,
    pub special_defense: u32,
    pub speed: u32,
}

impl ComputedStats {
    /// Burn halves attack, paralysis halves speed
    pub fn compute(base: &BaseStats, level: u8, status: Option<Status>) -> Self {
        let stat = |b: u16| (2 * b as u32 * level as u32 / 100 + 5).max(1);

        let mut stats = Self {
            attack: stat(base.attack),
            defense: stat(base.defense),
            special_attack: stat(base.special_attack),
            special_defense: stat(base.special_defense),
            speed: stat(base.speed),
        };

        match status {
            Some(Status::Burn) => stats.attack = (stats.attack / 2).max(1),
            Some(Status::Paralysis) => stats.speed = (stats.speed / 2).max(1),
            _ => {}
        }

        stats
    }

    pub fn get(&self, stat: Stat) -> Option<u32> {
        match stat {
            Stat::Attack => Some(self.attack),
            Stat::Defense => Some(self.defense),
            Stat::SpecialAttack => Some(self.special_attack),
            Stat::SpecialDefense => Some(self.special_defense),
            Stat::Speed => Some(self.speed),
            Stat::Accuracy | Stat::Evasion => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stages_are_zero() {
        let stages = StatStages::new();
        assert!(stages.is_clear());
        assert!(stages.nonzero().is_empty());
    }

    #[test]
    fn test_set_clamps_to_bounds() {
        let mut stages = StatStages::new();
        stages.set(Stat::Attack, 10);
        assert_eq!(stages.attack, 6);

        stages.set(Stat::Defense, -10);
        assert_eq!(stages.defense, -6);
    }

    #[test]
    fn test_boost() {
        let mut stages = StatStages::new();

        let change = stages.boost(Stat::Speed, 2);
        assert_eq!(change, 2);
        assert_eq!(stages.speed, 2);

        // Boost that hits cap
        stages.speed = 5;
        let change = stages.boost(Stat::Speed, 3);
        assert_eq!(change, 1);
        assert_eq!(stages.speed, 6);

        let change = stages.boost(Stat::Speed, 1);
        assert_eq!(change, 0);

        let change = stages.boost(Stat::Evasion, -8);
        assert_eq!(change, -6);
        assert_eq!(stages.evasion, -6);
    }

    #[test]
    fn test_boost_never_overflows() {
        let mut stages = StatStages::new();
        stages.boost(Stat::Attack, i8::MAX);
        assert_eq!(stages.attack, 6);
        stages.boost(Stat::Attack, i8::MIN);
        assert_eq!(stages.attack, -6);
    }

    #[test]
    fn test_nonzero() {
        let mut stages = StatStages::new();
        stages.boost(Stat::Speed, 2);
        stages.boost(Stat::Accuracy, -1);
        let map = stages.nonzero();
        assert_eq!(map.len(), 2);
        assert_eq!(map[&Stat::Speed], 2);
        assert_eq!(map[&Stat::Accuracy], -1);
    }

    #[test]
    fn test_stat_multiplier() {
        assert!((StatStages::multiplier(0) - 1.0).abs() < 0.001);
        assert!((StatStages::multiplier(1) - 1.5).abs() < 0.001);
        assert!((StatStages::multiplier(2) - 2.0).abs() < 0.001);
        assert!((StatStages::multiplier(6) - 4.0).abs() < 0.001);

        assert!((StatStages::multiplier(-1) - 2.0 / 3.0).abs() < 0.001);
        assert!((StatStages::multiplier(-2) - 0.5).abs() < 0.001);
        assert!((StatStages::multiplier(-6) - 0.25).abs() < 0.001);
    }

    #[test]
    fn test_accuracy_multiplier() {
        assert!((StatStages::accuracy_multiplier(0) - 1.0).abs() < 0.001);
        assert!((StatStages::accuracy_multiplier(1) - 4.0 / 3.0).abs() < 0.001);
        assert!((StatStages::accuracy_multiplier(6) - 3.0).abs() < 0.001);
        assert!((StatStages::accuracy_multiplier(-1) - 0.75).abs() < 0.001);
        assert!((StatStages::accuracy_multiplier(-6) - 1.0 / 3.0).abs() < 0.001);
    }

    #[test]
    fn test_computed_stats() {
        let base = BaseStats::new(45, 49, 49, 65, 65, 45);
        let stats = ComputedStats::compute(&base, 50, None);
        assert_eq!(stats.attack, 54);
        assert_eq!(stats.speed, 50);
        assert_eq!(base.max_hp(50), 105);
    }

    #[test]
    fn test_status_adjusts_computed_stats() {
        let base = BaseStats::new(45, 49, 49, 65, 65, 45);
        let burned = ComputedStats::compute(&base, 50, Some(Status::Burn));
        assert_eq!(burned.attack, 27);
        assert_eq!(burned.speed, 50);

        let paralyzed = ComputedStats::compute(&base, 50, Some(Status::Paralysis));
        assert_eq!(paralyzed.attack, 54);
        assert_eq!(paralyzed.speed, 25);
    }
}
