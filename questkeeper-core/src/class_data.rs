//! D&D 5e class data.
//!
//! Hit dice, saving throw proficiencies, skill options, spellcasting and
//! spell slot progression for all 12 PHB classes.

use crate::abilities::{Ability, Skill};
use crate::dice::DieType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// D&D character classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CharacterClass {
    Barbarian,
    Bard,
    Cleric,
    Druid,
    Fighter,
    Monk,
    Paladin,
    Ranger,
    Rogue,
    Sorcerer,
    Warlock,
    Wizard,
}

/// How a class gains spell slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasterKind {
    None,
    /// Full slot table from level 1.
    Full,
    /// Full table at half the class level, nothing at level 1.
    Half,
    /// Warlock pact magic: few slots, all of one level.
    Pact,
}

/// Class-specific data for character creation.
pub struct ClassData {
    /// Saving throw proficiencies granted by the class.
    pub saving_throws: [Ability; 2],
    /// Number of skills to choose.
    pub skill_count: usize,
    /// Skills available to choose from.
    pub skill_options: &'static [Skill],
    /// Cantrips a new character starts with.
    pub starting_cantrips: &'static [&'static str],
    /// Leveled spells a new character starts with.
    pub starting_spells: &'static [&'static str],
}

const ALL_SKILLS: &[Skill] = &[
    Skill::Acrobatics,
    Skill::AnimalHandling,
    Skill::Arcana,
    Skill::Athletics,
    Skill::Deception,
    Skill::History,
    Skill::Insight,
    Skill::Intimidation,
    Skill::Investigation,
    Skill::Medicine,
    Skill::Nature,
    Skill::Perception,
    Skill::Performance,
    Skill::Persuasion,
    Skill::Religion,
    Skill::SleightOfHand,
    Skill::Stealth,
    Skill::Survival,
];

impl CharacterClass {
    pub fn hit_die(&self) -> DieType {
        match self {
            CharacterClass::Barbarian => DieType::D12,
            CharacterClass::Fighter | CharacterClass::Paladin | CharacterClass::Ranger => {
                DieType::D10
            }
            CharacterClass::Bard
            | CharacterClass::Cleric
            | CharacterClass::Druid
            | CharacterClass::Monk
            | CharacterClass::Rogue
            | CharacterClass::Warlock => DieType::D8,
            CharacterClass::Sorcerer | CharacterClass::Wizard => DieType::D6,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CharacterClass::Barbarian => "Barbarian",
            CharacterClass::Bard => "Bard",
            CharacterClass::Cleric => "Cleric",
            CharacterClass::Druid => "Druid",
            CharacterClass::Fighter => "Fighter",
            CharacterClass::Monk => "Monk",
            CharacterClass::Paladin => "Paladin",
            CharacterClass::Ranger => "Ranger",
            CharacterClass::Rogue => "Rogue",
            CharacterClass::Sorcerer => "Sorcerer",
            CharacterClass::Warlock => "Warlock",
            CharacterClass::Wizard => "Wizard",
        }
    }

    /// Parse a class name, ignoring case.
    pub fn from_name(name: &str) -> Option<CharacterClass> {
        Self::all()
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn caster_kind(&self) -> CasterKind {
        match self {
            CharacterClass::Bard
            | CharacterClass::Cleric
            | CharacterClass::Druid
            | CharacterClass::Sorcerer
            | CharacterClass::Wizard => CasterKind::Full,
            CharacterClass::Paladin | CharacterClass::Ranger => CasterKind::Half,
            CharacterClass::Warlock => CasterKind::Pact,
            _ => CasterKind::None,
        }
    }

    /// Returns the spellcasting ability for this class, if any.
    pub fn spellcasting_ability(&self) -> Option<Ability> {
        match self {
            CharacterClass::Bard
            | CharacterClass::Sorcerer
            | CharacterClass::Warlock
            | CharacterClass::Paladin => Some(Ability::Charisma),
            CharacterClass::Cleric | CharacterClass::Druid | CharacterClass::Ranger => {
                Some(Ability::Wisdom)
            }
            CharacterClass::Wizard => Some(Ability::Intelligence),
            _ => None,
        }
    }

    /// Spell slots per spell level (index 0 is 1st level) at a class level.
    pub fn spell_slots_at(&self, level: u8) -> [u8; 9] {
        let level = level.clamp(1, 20);
        match self.caster_kind() {
            CasterKind::None => [0; 9],
            CasterKind::Full => full_caster_slots(level),
            CasterKind::Half if level < 2 => [0; 9],
            CasterKind::Half => full_caster_slots(level.div_ceil(2)),
            CasterKind::Pact => pact_slots(level),
        }
    }

    /// Get class data for character creation.
    pub fn data(&self) -> ClassData {
        match self {
            CharacterClass::Barbarian => ClassData {
                saving_throws: [Ability::Strength, Ability::Constitution],
                skill_count: 2,
                skill_options: &[
                    Skill::AnimalHandling,
                    Skill::Athletics,
                    Skill::Intimidation,
                    Skill::Nature,
                    Skill::Perception,
                    Skill::Survival,
                ],
                starting_cantrips: &[],
                starting_spells: &[],
            },
            CharacterClass::Bard => ClassData {
                saving_throws: [Ability::Dexterity, Ability::Charisma],
                skill_count: 3,
                skill_options: ALL_SKILLS,
                starting_cantrips: &[],
                starting_spells: &["Cure Wounds", "Healing Word", "Thunderwave"],
            },
            CharacterClass::Cleric => ClassData {
                saving_throws: [Ability::Wisdom, Ability::Charisma],
                skill_count: 2,
                skill_options: &[
                    Skill::History,
                    Skill::Insight,
                    Skill::Medicine,
                    Skill::Persuasion,
                    Skill::Religion,
                ],
                starting_cantrips: &["Sacred Flame"],
                starting_spells: &["Cure Wounds", "Guiding Bolt", "Healing Word", "Hold Person"],
            },
            CharacterClass::Druid => ClassData {
                saving_throws: [Ability::Intelligence, Ability::Wisdom],
                skill_count: 2,
                skill_options: &[
                    Skill::Arcana,
                    Skill::AnimalHandling,
                    Skill::Insight,
                    Skill::Medicine,
                    Skill::Nature,
                    Skill::Perception,
                    Skill::Religion,
                    Skill::Survival,
                ],
                starting_cantrips: &[],
                starting_spells: &["Cure Wounds", "Healing Word", "Thunderwave"],
            },
            CharacterClass::Fighter => ClassData {
                saving_throws: [Ability::Strength, Ability::Constitution],
                skill_count: 2,
                skill_options: &[
                    Skill::Acrobatics,
                    Skill::AnimalHandling,
                    Skill::Athletics,
                    Skill::History,
                    Skill::Insight,
                    Skill::Intimidation,
                    Skill::Perception,
                    Skill::Survival,
                ],
                starting_cantrips: &[],
                starting_spells: &[],
            },
            CharacterClass::Monk => ClassData {
                saving_throws: [Ability::Strength, Ability::Dexterity],
                skill_count: 2,
                skill_options: &[
                    Skill::Acrobatics,
                    Skill::Athletics,
                    Skill::History,
                    Skill::Insight,
                    Skill::Religion,
                    Skill::Stealth,
                ],
                starting_cantrips: &[],
                starting_spells: &[],
            },
            CharacterClass::Paladin => ClassData {
                saving_throws: [Ability::Wisdom, Ability::Charisma],
                skill_count: 2,
                skill_options: &[
                    Skill::Athletics,
                    Skill::Insight,
                    Skill::Intimidation,
                    Skill::Medicine,
                    Skill::Persuasion,
                    Skill::Religion,
                ],
                starting_cantrips: &[],
                starting_spells: &["Cure Wounds"],
            },
            CharacterClass::Ranger => ClassData {
                saving_throws: [Ability::Strength, Ability::Dexterity],
                skill_count: 3,
                skill_options: &[
                    Skill::AnimalHandling,
                    Skill::Athletics,
                    Skill::Insight,
                    Skill::Investigation,
                    Skill::Nature,
                    Skill::Perception,
                    Skill::Stealth,
                    Skill::Survival,
                ],
                starting_cantrips: &[],
                starting_spells: &["Cure Wounds"],
            },
            CharacterClass::Rogue => ClassData {
                saving_throws: [Ability::Dexterity, Ability::Intelligence],
                skill_count: 4,
                skill_options: &[
                    Skill::Acrobatics,
                    Skill::Athletics,
                    Skill::Deception,
                    Skill::Insight,
                    Skill::Intimidation,
                    Skill::Investigation,
                    Skill::Perception,
                    Skill::Performance,
                    Skill::Persuasion,
                    Skill::SleightOfHand,
                    Skill::Stealth,
                ],
                starting_cantrips: &[],
                starting_spells: &[],
            },
            CharacterClass::Sorcerer => ClassData {
                saving_throws: [Ability::Constitution, Ability::Charisma],
                skill_count: 2,
                skill_options: &[
                    Skill::Arcana,
                    Skill::Deception,
                    Skill::Insight,
                    Skill::Intimidation,
                    Skill::Persuasion,
                    Skill::Religion,
                ],
                starting_cantrips: &["Fire Bolt", "Ray of Frost"],
                starting_spells: &["Magic Missile", "Shield"],
            },
            CharacterClass::Warlock => ClassData {
                saving_throws: [Ability::Wisdom, Ability::Charisma],
                skill_count: 2,
                skill_options: &[
                    Skill::Arcana,
                    Skill::Deception,
                    Skill::History,
                    Skill::Intimidation,
                    Skill::Investigation,
                    Skill::Nature,
                    Skill::Religion,
                ],
                starting_cantrips: &["Eldritch Blast"],
                starting_spells: &["Armor of Agathys"],
            },
            CharacterClass::Wizard => ClassData {
                saving_throws: [Ability::Intelligence, Ability::Wisdom],
                skill_count: 2,
                skill_options: &[
                    Skill::Arcana,
                    Skill::History,
                    Skill::Insight,
                    Skill::Investigation,
                    Skill::Medicine,
                    Skill::Religion,
                ],
                starting_cantrips: &["Fire Bolt", "Ray of Frost"],
                starting_spells: &[
                    "Magic Missile",
                    "Shield",
                    "Burning Hands",
                    "False Life",
                    "Thunderwave",
                ],
            },
        }
    }

    pub fn all() -> &'static [CharacterClass] {
        &[
            CharacterClass::Barbarian,
            CharacterClass::Bard,
            CharacterClass::Cleric,
            CharacterClass::Druid,
            CharacterClass::Fighter,
            CharacterClass::Monk,
            CharacterClass::Paladin,
            CharacterClass::Ranger,
            CharacterClass::Rogue,
            CharacterClass::Sorcerer,
            CharacterClass::Warlock,
            CharacterClass::Wizard,
        ]
    }
}

impl fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// PHB full caster table, by caster level 1-20.
fn full_caster_slots(level: u8) -> [u8; 9] {
    match level {
        1 => [2, 0, 0, 0, 0, 0, 0, 0, 0],
        2 => [3, 0, 0, 0, 0, 0, 0, 0, 0],
        3 => [4, 2, 0, 0, 0, 0, 0, 0, 0],
        4 => [4, 3, 0, 0, 0, 0, 0, 0, 0],
        5 => [4, 3, 2, 0, 0, 0, 0, 0, 0],
        6 => [4, 3, 3, 0, 0, 0, 0, 0, 0],
        7 => [4, 3, 3, 1, 0, 0, 0, 0, 0],
        8 => [4, 3, 3, 2, 0, 0, 0, 0, 0],
        9 => [4, 3, 3, 3, 1, 0, 0, 0, 0],
        10 => [4, 3, 3, 3, 2, 0, 0, 0, 0],
        11 | 12 => [4, 3, 3, 3, 2, 1, 0, 0, 0],
        13 | 14 => [4, 3, 3, 3, 2, 1, 1, 0, 0],
        15 | 16 => [4, 3, 3, 3, 2, 1, 1, 1, 0],
        17 => [4, 3, 3, 3, 2, 1, 1, 1, 1],
        18 => [4, 3, 3, 3, 3, 1, 1, 1, 1],
        19 => [4, 3, 3, 3, 3, 2, 1, 1, 1],
        _ => [4, 3, 3, 3, 3, 2, 2, 1, 1],
    }
}

fn pact_slots(level: u8) -> [u8; 9] {
    let count = match level {
        1 => 1,
        2..=10 => 2,
        11..=16 => 3,
        _ => 4,
    };
    let slot_level = match level {
        1..=2 => 1,
        3..=4 => 2,
        5..=6 => 3,
        7..=8 => 4,
        _ => 5,
    };
    let mut slots = [0; 9];
    slots[slot_level - 1] = count;
    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_classes_have_data() {
        for class in CharacterClass::all() {
            let data = class.data();
            assert_ne!(data.saving_throws[0], data.saving_throws[1]);
            assert!(data.skill_count > 0);
            assert!(data.skill_options.len() >= data.skill_count);
        }
    }

    #[test]
    fn test_fighter_data() {
        let data = CharacterClass::Fighter.data();
        assert_eq!(
            data.saving_throws,
            [Ability::Strength, Ability::Constitution]
        );
        assert_eq!(CharacterClass::Fighter.hit_die(), DieType::D10);
        assert!(CharacterClass::Fighter.spellcasting_ability().is_none());
    }

    #[test]
    fn test_rogue_gets_4_skills() {
        assert_eq!(CharacterClass::Rogue.data().skill_count, 4);
    }

    #[test]
    fn test_full_caster_slots() {
        assert_eq!(CharacterClass::Wizard.spell_slots_at(1)[0], 2);
        let fifth = CharacterClass::Cleric.spell_slots_at(5);
        assert_eq!(&fifth[..3], &[4, 3, 2]);
        assert_eq!(CharacterClass::Wizard.spell_slots_at(20)[8], 1);
    }

    #[test]
    fn test_half_caster_slots() {
        assert_eq!(CharacterClass::Paladin.spell_slots_at(1), [0; 9]);
        assert_eq!(CharacterClass::Paladin.spell_slots_at(2)[0], 2);
        assert_eq!(&CharacterClass::Ranger.spell_slots_at(5)[..2], &[4, 2]);
    }

    #[test]
    fn test_pact_slots() {
        assert_eq!(CharacterClass::Warlock.spell_slots_at(1)[0], 1);
        let fifth = CharacterClass::Warlock.spell_slots_at(5);
        assert_eq!(fifth[2], 2);
        assert_eq!(fifth.iter().map(|s| *s as u32).sum::<u32>(), 2);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(
            CharacterClass::from_name("wizard"),
            Some(CharacterClass::Wizard)
        );
        assert_eq!(CharacterClass::from_name("Knight"), None);
    }
}
