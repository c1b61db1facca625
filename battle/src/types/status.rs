//! Non-volatile status conditions

/// Non-volatile status conditions (persist through switching)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Status {
    Burn,
    Freeze,
    Paralysis,
    Poison,
    BadPoison, // Toxic
    Sleep,
}

impl Status {
    /// Convert to protocol format
    pub fn to_protocol(&self) -> &'static str {
        match self {
            Status::Burn => "brn",
            Status::Freeze => "frz",
            Status::Paralysis => "par",
            Status::Poison => "psn",
            Status::BadPoison => "tox",
            Status::Sleep => "slp",
        }
    }

    /// Get display name
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Burn => "Burn",
            Status::Freeze => "Freeze",
            Status::Paralysis => "Paralysis",
            Status::Poison => "Poison",
            Status::BadPoison => "Toxic",
            Status::Sleep => "Sleep",
        }
    }

    /// End-of-turn damage for a combatant with `max_hp`.
    ///
    /// `toxic_counter` is the number of turns bad poison has already ticked.
    pub fn residual_damage(&self, max_hp: u32, toxic_counter: u8) -> Option<u32> {
        let amount = match self {
            Status::Burn => max_hp / 16,
            Status::Poison => max_hp / 8,
            Status::BadPoison => max_hp * (toxic_counter as u32 + 1).min(15) / 16,
            _ => return None,
        };
        Some(amount.max(1))
    }

    /// Catch rate multiplier while the target has this status
    pub fn capture_bonus(&self) -> f64 {
        match self {
            Status::Sleep | Status::Freeze => 2.0,
            _ => 1.5,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
