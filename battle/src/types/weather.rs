//! In-battle weather

use super::pokemon_type::Type;

/// Weather conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Weather {
    Sun,
    Rain,
    Sand,
    Hail,
}

impl Weather {
    /// Turns a weather lasts when set by a move
    pub const DEFAULT_TURNS: u8 = 5;

    pub fn to_protocol(&self) -> &'static str {
        match self {
            Weather::Sun => "sun",
            Weather::Rain => "rain",
            Weather::Sand => "sand",
            Weather::Hail => "hail",
        }
    }

    /// Damage multiplier for a move of `move_type` under this weather
    pub fn damage_modifier(&self, move_type: Option<Type>) -> f32 {
        match (self, move_type) {
            (Weather::Rain, Some(Type::Water)) | (Weather::Sun, Some(Type::Fire)) => 1.5,
            (Weather::Rain, Some(Type::Fire)) | (Weather::Sun, Some(Type::Water)) => 0.5,
            _ => 1.0,
        }
    }

    /// Whether this weather chips a combatant of these types at end of turn
    pub fn chips(&self, types: &[Type]) -> bool {
        let immune: &[Type] = match self {
            Weather::Sand => &[Type::Rock, Type::Ground, Type::Steel],
            Weather::Hail => &[Type::Ice],
            Weather::Sun | Weather::Rain => return false,
        };
        !types.iter().any(|t| immune.contains(t))
    }

    /// Sun prevents freezing
    pub fn prevents_freeze(&self) -> bool {
        matches!(self, Weather::Sun)
    }
}

impl std::fmt::Display for Weather {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_protocol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_damage_modifier() {
        assert_eq!(Weather::Rain.damage_modifier(Some(Type::Water)), 1.5);
        assert_eq!(Weather::Rain.damage_modifier(Some(Type::Fire)), 0.5);
        assert_eq!(Weather::Sun.damage_modifier(Some(Type::Fire)), 1.5);
        assert_eq!(Weather::Sun.damage_modifier(Some(Type::Water)), 0.5);
        assert_eq!(Weather::Sand.damage_modifier(Some(Type::Rock)), 1.0);
        assert_eq!(Weather::Rain.damage_modifier(None), 1.0);
    }

    #[test]
    fn test_chip_immunity() {
        assert!(Weather::Sand.chips(&[Type::Normal]));
        assert!(!Weather::Sand.chips(&[Type::Water, Type::Ground]));
        assert!(Weather::Hail.chips(&[Type::Rock]));
        assert!(!Weather::Hail.chips(&[Type::Ice]));
        assert!(!Weather::Rain.chips(&[Type::Fire]));
    }
}
