//! Testing utilities for the rules engine.
//!
//! - `ScriptedDice` for deterministic rolls
//! - sample characters and monsters for scenarios

use crate::abilities::{AbilityScores, Skill};
use crate::character::{Character, RaceType};
use crate::class_data::CharacterClass;
use crate::combatant::DamageType;
use crate::dice::DiceRoller;
use crate::items::ItemRegistry;
use crate::monster::{MonsterAttack, MonsterStatBlock};
use std::collections::VecDeque;

/// Dice that return scripted values in order.
///
/// Values are clamped to the die being rolled. Once the script runs out,
/// rolls return the fallback value if one is set, otherwise the rounded-up
/// midpoint of the die.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDice {
    values: VecDeque<u32>,
    fallback: Option<u32>,
    history: Vec<(u32, u32)>,
}

impl ScriptedDice {
    pub fn new(values: impl IntoIterator<Item = u32>) -> Self {
        Self {
            values: values.into_iter().collect(),
            fallback: None,
            history: Vec::new(),
        }
    }

    /// Value used after the script is exhausted.
    pub fn with_fallback(mut self, value: u32) -> Self {
        self.fallback = Some(value);
        self
    }

    pub fn push(&mut self, value: u32) {
        self.values.push_back(value);
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }

    /// Every `(sides, result)` rolled so far.
    pub fn history(&self) -> &[(u32, u32)] {
        &self.history
    }
}

impl DiceRoller for ScriptedDice {
    fn roll(&mut self, sides: u32) -> u32 {
        let sides = sides.max(1);
        let value = self
            .values
            .pop_front()
            .or(self.fallback)
            .unwrap_or(sides.div_ceil(2))
            .clamp(1, sides);
        self.history.push((sides, value));
        value
    }
}

/// Thorin: dwarf fighter, level 1, 13 HP, AC 11, longsword in hand.
///
/// # Panics
///
/// If the standard registry cannot supply and equip a longsword.
pub fn sample_fighter() -> Character {
    let mut fighter = Character::new(
        "Thorin",
        RaceType::Dwarf,
        CharacterClass::Fighter,
        AbilityScores::new(16, 12, 14, 10, 12, 8),
    );
    fighter.skill_proficiencies =
        [Skill::Athletics, Skill::Perception].into_iter().collect();
    let sword = ItemRegistry::standard()
        .instantiate("longsword")
        .expect("standard registry has a longsword");
    fighter
        .equip(sword)
        .expect("a longsword fits an empty hand");
    fighter
}

/// Elara: elf wizard, level 1, 7 HP, INT 16.
pub fn sample_wizard() -> Character {
    let mut wizard = Character::new(
        "Elara",
        RaceType::Elf,
        CharacterClass::Wizard,
        AbilityScores::new(8, 14, 13, 16, 12, 10),
    );
    wizard.skill_proficiencies = [Skill::Arcana, Skill::History].into_iter().collect();
    wizard
}

/// Brother Aldric: human cleric, level 1, 10 HP, WIS 16.
pub fn sample_cleric() -> Character {
    let mut cleric = Character::new(
        "Brother Aldric",
        RaceType::Human,
        CharacterClass::Cleric,
        AbilityScores::new(12, 10, 13, 10, 15, 12),
    );
    cleric.skill_proficiencies = [Skill::Medicine, Skill::Religion].into_iter().collect();
    cleric
}

/// A plain goblin: 7 HP, AC 15, scimitar +4 for 1d6+2.
pub fn goblin_stat_block() -> MonsterStatBlock {
    MonsterStatBlock {
        name: "Goblin".to_string(),
        hit_points: 7,
        armor_class: 15,
        abilities: AbilityScores::new(8, 14, 10, 10, 8, 8),
        attacks: vec![MonsterAttack {
            name: "Scimitar".to_string(),
            attack_bonus: 4,
            damage: "1d6+2".to_string(),
            damage_type: DamageType::Slashing,
            magical: false,
        }],
        xp: 50,
        ..MonsterStatBlock::default()
    }
}
