//! Ability scores, skills and proficiency math.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest legal ability score.
pub const MIN_SCORE: u8 = 1;
/// Highest legal ability score.
pub const MAX_SCORE: u8 = 20;

/// The six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Ability {
    #[serde(alias = "Strength", alias = "STR")]
    Strength,
    #[serde(alias = "Dexterity", alias = "DEX")]
    Dexterity,
    #[serde(alias = "Constitution", alias = "CON")]
    Constitution,
    #[serde(alias = "Intelligence", alias = "INT")]
    Intelligence,
    #[serde(alias = "Wisdom", alias = "WIS")]
    Wisdom,
    #[serde(alias = "Charisma", alias = "CHA")]
    Charisma,
}

impl Ability {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Ability::Strength => "STR",
            Ability::Dexterity => "DEX",
            Ability::Constitution => "CON",
            Ability::Intelligence => "INT",
            Ability::Wisdom => "WIS",
            Ability::Charisma => "CHA",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Ability::Strength => "Strength",
            Ability::Dexterity => "Dexterity",
            Ability::Constitution => "Constitution",
            Ability::Intelligence => "Intelligence",
            Ability::Wisdom => "Wisdom",
            Ability::Charisma => "Charisma",
        }
    }

    pub fn all() -> [Ability; 6] {
        [
            Ability::Strength,
            Ability::Dexterity,
            Ability::Constitution,
            Ability::Intelligence,
            Ability::Wisdom,
            Ability::Charisma,
        ]
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

/// `floor((score - 10) / 2)`.
pub fn ability_modifier(score: u8) -> i8 {
    // Floor division: 9 -> -1, 8 -> -1, 7 -> -2
    (score as i16 - 10).div_euclid(2) as i8
}

/// Proficiency bonus for a character level: +2 at 1-4 up to +6 at 17-20.
pub fn proficiency_bonus(level: u8) -> i8 {
    match level {
        0..=4 => 2,
        5..=8 => 3,
        9..=12 => 4,
        13..=16 => 5,
        _ => 6,
    }
}

/// Clamp a raw (possibly negative or oversized) score into the legal range.
pub fn clamp_score(raw: i32) -> u8 {
    raw.clamp(MIN_SCORE as i32, MAX_SCORE as i32) as u8
}

/// Ability scores container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    #[serde(default = "default_score", alias = "str")]
    pub strength: u8,
    #[serde(default = "default_score", alias = "dex")]
    pub dexterity: u8,
    #[serde(default = "default_score", alias = "con")]
    pub constitution: u8,
    #[serde(default = "default_score", alias = "int")]
    pub intelligence: u8,
    #[serde(default = "default_score", alias = "wis")]
    pub wisdom: u8,
    #[serde(default = "default_score", alias = "cha")]
    pub charisma: u8,
}

fn default_score() -> u8 {
    10
}

impl AbilityScores {
    pub fn new(str: u8, dex: u8, con: u8, int: u8, wis: u8, cha: u8) -> Self {
        Self {
            strength: str,
            dexterity: dex,
            constitution: con,
            intelligence: int,
            wisdom: wis,
            charisma: cha,
        }
    }

    pub fn standard_array() -> Self {
        Self::new(15, 14, 13, 12, 10, 8)
    }

    pub fn get(&self, ability: Ability) -> u8 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    pub fn set(&mut self, ability: Ability, value: u8) {
        match ability {
            Ability::Strength => self.strength = value,
            Ability::Dexterity => self.dexterity = value,
            Ability::Constitution => self.constitution = value,
            Ability::Intelligence => self.intelligence = value,
            Ability::Wisdom => self.wisdom = value,
            Ability::Charisma => self.charisma = value,
        }
    }

    pub fn modifier(&self, ability: Ability) -> i8 {
        ability_modifier(self.get(ability))
    }

    /// Copy with every score clamped into `1..=20`.
    pub fn clamped(&self) -> Self {
        let mut scores = *self;
        for ability in Ability::all() {
            scores.set(ability, clamp_score(self.get(ability) as i32));
        }
        scores
    }
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self::new(10, 10, 10, 10, 10, 10)
    }
}

/// D&D 5e skills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Skill {
    Athletics,
    Acrobatics,
    SleightOfHand,
    Stealth,
    Arcana,
    History,
    Investigation,
    Nature,
    Religion,
    AnimalHandling,
    Insight,
    Medicine,
    Perception,
    Survival,
    Deception,
    Intimidation,
    Performance,
    Persuasion,
}

impl Skill {
    pub fn ability(&self) -> Ability {
        match self {
            Skill::Athletics => Ability::Strength,
            Skill::Acrobatics | Skill::SleightOfHand | Skill::Stealth => Ability::Dexterity,
            Skill::Arcana
            | Skill::History
            | Skill::Investigation
            | Skill::Nature
            | Skill::Religion => Ability::Intelligence,
            Skill::AnimalHandling
            | Skill::Insight
            | Skill::Medicine
            | Skill::Perception
            | Skill::Survival => Ability::Wisdom,
            Skill::Deception | Skill::Intimidation | Skill::Performance | Skill::Persuasion => {
                Ability::Charisma
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Skill::Athletics => "Athletics",
            Skill::Acrobatics => "Acrobatics",
            Skill::SleightOfHand => "Sleight of Hand",
            Skill::Stealth => "Stealth",
            Skill::Arcana => "Arcana",
            Skill::History => "History",
            Skill::Investigation => "Investigation",
            Skill::Nature => "Nature",
            Skill::Religion => "Religion",
            Skill::AnimalHandling => "Animal Handling",
            Skill::Insight => "Insight",
            Skill::Medicine => "Medicine",
            Skill::Perception => "Perception",
            Skill::Survival => "Survival",
            Skill::Deception => "Deception",
            Skill::Intimidation => "Intimidation",
            Skill::Performance => "Performance",
            Skill::Persuasion => "Persuasion",
        }
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ability_modifier_is_floored() {
        for score in 1..=20u8 {
            let expected = ((score as f32 - 10.0) / 2.0).floor() as i8;
            assert_eq!(ability_modifier(score), expected, "score {score}");
        }
        assert_eq!(ability_modifier(1), -5);
        assert_eq!(ability_modifier(9), -1);
        assert_eq!(ability_modifier(10), 0);
        assert_eq!(ability_modifier(20), 5);
    }

    #[test]
    fn test_proficiency_tiers() {
        let expected = [
            (1..=4, 2),
            (5..=8, 3),
            (9..=12, 4),
            (13..=16, 5),
            (17..=20, 6),
        ];
        for (levels, bonus) in expected {
            for level in levels {
                assert_eq!(proficiency_bonus(level), bonus, "level {level}");
            }
        }
    }

    #[test]
    fn test_clamp_score() {
        assert_eq!(clamp_score(-3), 1);
        assert_eq!(clamp_score(0), 1);
        assert_eq!(clamp_score(14), 14);
        assert_eq!(clamp_score(22), 20);
    }

    #[test]
    fn test_scores_modifier() {
        let scores = AbilityScores::new(16, 14, 12, 10, 8, 6);
        assert_eq!(scores.modifier(Ability::Strength), 3);
        assert_eq!(scores.modifier(Ability::Dexterity), 2);
        assert_eq!(scores.modifier(Ability::Constitution), 1);
        assert_eq!(scores.modifier(Ability::Intelligence), 0);
        assert_eq!(scores.modifier(Ability::Wisdom), -1);
        assert_eq!(scores.modifier(Ability::Charisma), -2);
    }

    #[test]
    fn test_scores_deserialize_with_short_names() {
        let scores: AbilityScores = serde_json::from_str(r#"{"str": 15, "dex": 12}"#).unwrap();
        assert_eq!(scores.strength, 15);
        assert_eq!(scores.dexterity, 12);
        assert_eq!(scores.wisdom, 10);
    }

    #[test]
    fn test_skill_abilities() {
        assert_eq!(Skill::Perception.ability(), Ability::Wisdom);
        assert_eq!(Skill::Stealth.ability(), Ability::Dexterity);
        assert_eq!(Skill::Athletics.ability(), Ability::Strength);
    }
}
