//! Elemental types and matchups

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Type {
    Normal,
    Fire,
    Water,
    Electric,
    Grass,
    Ice,
    Fighting,
    Poison,
    Ground,
    Flying,
    Psychic,
    Bug,
    Rock,
    Ghost,
    Dragon,
    Dark,
    Steel,
    Fairy,
}

impl Type {
    pub const ALL: [Type; 18] = [
        Type::Normal,
        Type::Fire,
        Type::Water,
        Type::Electric,
        Type::Grass,
        Type::Ice,
        Type::Fighting,
        Type::Poison,
        Type::Ground,
        Type::Flying,
        Type::Psychic,
        Type::Bug,
        Type::Rock,
        Type::Ghost,
        Type::Dragon,
        Type::Dark,
        Type::Steel,
        Type::Fairy,
    ];

    /// Defending types this type hits for double damage
    fn strong_against(&self) -> &'static [Type] {
        use Type::*;
        match self {
            Normal => &[],
            Fire => &[Grass, Ice, Bug, Steel],
            Water => &[Fire, Ground, Rock],
            Electric => &[Water, Flying],
            Grass => &[Water, Ground, Rock],
            Ice => &[Grass, Ground, Flying, Dragon],
            Fighting => &[Normal, Ice, Rock, Dark, Steel],
            Poison => &[Grass, Fairy],
            Ground => &[Fire, Electric, Poison, Rock, Steel],
            Flying => &[Grass, Fighting, Bug],
            Psychic => &[Fighting, Poison],
            Bug => &[Grass, Psychic, Dark],
            Rock => &[Fire, Ice, Flying, Bug],
            Ghost => &[Psychic, Ghost],
            Dragon => &[Dragon],
            Dark => &[Psychic, Ghost],
            Steel => &[Ice, Rock, Fairy],
            Fairy => &[Fighting, Dragon, Dark],
        }
    }

    /// Defending types that resist this type
    fn weak_against(&self) -> &'static [Type] {
        use Type::*;
        match self {
            Normal => &[Rock, Steel],
            Fire => &[Fire, Water, Rock, Dragon],
            Water => &[Water, Grass, Dragon],
            Electric => &[Electric, Grass, Dragon],
            Grass => &[Fire, Grass, Poison, Flying, Bug, Dragon, Steel],
            Ice => &[Fire, Water, Ice, Steel],
            Fighting => &[Poison, Flying, Psychic, Bug, Fairy],
            Poison => &[Poison, Ground, Rock, Ghost],
            Ground => &[Grass, Bug],
            Flying => &[Electric, Rock, Steel],
            Psychic => &[Psychic, Steel],
            Bug => &[Fire, Fighting, Poison, Flying, Ghost, Steel, Fairy],
            Rock => &[Fighting, Ground, Steel],
            Ghost => &[Dark],
            Dragon => &[Steel],
            Dark => &[Fighting, Dark, Fairy],
            Steel => &[Fire, Water, Electric, Steel],
            Fairy => &[Fire, Poison, Steel],
        }
    }

    /// Defending types immune to this type
    fn no_effect_on(&self) -> &'static [Type] {
        use Type::*;
        match self {
            Normal | Fighting => &[Ghost],
            Electric => &[Ground],
            Poison => &[Steel],
            Ground => &[Flying],
            Psychic => &[Dark],
            Ghost => &[Normal],
            Dragon => &[Fairy],
            _ => &[],
        }
    }

    /// Effectiveness against a single defending type
    pub fn effectiveness(&self, defender: Type) -> f32 {
        if self.no_effect_on().contains(&defender) {
            0.0
        } else if self.strong_against().contains(&defender) {
            2.0
        } else if self.weak_against().contains(&defender) {
            0.5
        } else {
            1.0
        }
    }

    /// Effectiveness against every defending type, multiplied
    pub fn effectiveness_multi(&self, defenders: &[Type]) -> f32 {
        defenders.iter().map(|t| self.effectiveness(*t)).product()
    }

    /// Lowercase protocol name
    pub fn as_str(&self) -> &'static str {
        match self {
            Type::Normal => "normal",
            Type::Fire => "fire",
            Type::Water => "water",
            Type::Electric => "electric",
            Type::Grass => "grass",
            Type::Ice => "ice",
            Type::Fighting => "fighting",
            Type::Poison => "poison",
            Type::Ground => "ground",
            Type::Flying => "flying",
            Type::Psychic => "psychic",
            Type::Bug => "bug",
            Type::Rock => "rock",
            Type::Ghost => "ghost",
            Type::Dragon => "dragon",
            Type::Dark => "dark",
            Type::Steel => "steel",
            Type::Fairy => "fairy",
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_effectiveness_super_effective() {
        assert_eq!(Type::Fire.effectiveness(Type::Grass), 2.0);
        assert_eq!(Type::Water.effectiveness(Type::Fire), 2.0);
        assert_eq!(Type::Electric.effectiveness(Type::Water), 2.0);
        assert_eq!(Type::Fighting.effectiveness(Type::Normal), 2.0);
    }

    #[test]
    fn test_type_effectiveness_not_very_effective() {
        assert_eq!(Type::Fire.effectiveness(Type::Water), 0.5);
        assert_eq!(Type::Grass.effectiveness(Type::Fire), 0.5);
        assert_eq!(Type::Electric.effectiveness(Type::Grass), 0.5);
    }

    #[test]
    fn test_type_effectiveness_immune() {
        assert_eq!(Type::Normal.effectiveness(Type::Ghost), 0.0);
        assert_eq!(Type::Ghost.effectiveness(Type::Normal), 0.0);
        assert_eq!(Type::Electric.effectiveness(Type::Ground), 0.0);
        assert_eq!(Type::Ground.effectiveness(Type::Flying), 0.0);
        assert_eq!(Type::Psychic.effectiveness(Type::Dark), 0.0);
        assert_eq!(Type::Dragon.effectiveness(Type::Fairy), 0.0);
    }

    #[test]
    fn test_type_effectiveness_multi() {
        assert_eq!(Type::Fire.effectiveness_multi(&[Type::Grass, Type::Steel]), 4.0);
        assert_eq!(Type::Fire.effectiveness_multi(&[Type::Water, Type::Rock]), 0.25);
        assert_eq!(Type::Ground.effectiveness_multi(&[Type::Flying, Type::Steel]), 0.0);
        assert_eq!(Type::Normal.effectiveness_multi(&[]), 1.0);
    }

    #[test]
    fn test_no_type_is_both_strong_and_weak() {
        for attacker in Type::ALL {
            for defender in Type::ALL {
                let strong = attacker.strong_against().contains(&defender);
                let weak = attacker.weak_against().contains(&defender);
                let immune = attacker.no_effect_on().contains(&defender);
                assert!(
                    [strong, weak, immune].iter().filter(|b| **b).count() <= 1,
                    "{attacker} vs {defender}"
                );
            }
        }
    }
}
