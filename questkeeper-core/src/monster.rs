//! Monsters built from stat blocks.

use crate::abilities::{ability_modifier, Ability, AbilityScores};
use crate::combatant::{Attack, CasterStats, CombatStatus, Combatant, DamageType, HitPoints};
use crate::config::EngineConfig;
use crate::dice::DiceExpression;
use crate::effects::{Effect, ResistanceEffect, ResistanceLevel};
use crate::error::RulesError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A monster attack as written in a stat block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterAttack {
    pub name: String,
    #[serde(alias = "bonus", alias = "to_hit")]
    pub attack_bonus: i32,
    /// Dice notation, e.g. `"1d6+2"`.
    pub damage: String,
    #[serde(default = "default_damage_type")]
    pub damage_type: DamageType,
    #[serde(default)]
    pub magical: bool,
}

fn default_damage_type() -> DamageType {
    DamageType::Bludgeoning
}

/// Stat block data, as loaded from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonsterStatBlock {
    pub name: String,
    #[serde(alias = "hp")]
    pub hit_points: i32,
    #[serde(alias = "ac")]
    pub armor_class: i32,
    pub abilities: AbilityScores,
    pub attacks: Vec<MonsterAttack>,
    /// Explicit saving throw bonuses; others use the ability modifier.
    pub save_bonuses: BTreeMap<Ability, i8>,
    /// Flat bonus added to saves without an explicit entry.
    pub default_save_bonus: Option<i8>,
    pub resistances: Vec<DamageType>,
    pub immunities: Vec<DamageType>,
    pub vulnerabilities: Vec<DamageType>,
    /// Resistant to nonmagical bludgeoning, piercing and slashing.
    pub resists_nonmagical_physical: bool,
    pub spells: Vec<String>,
    pub spell_save_dc: Option<i32>,
    pub spell_attack_bonus: Option<i32>,
    pub xp: u32,
}

impl Default for MonsterStatBlock {
    fn default() -> Self {
        Self {
            name: "Monster".to_string(),
            hit_points: 1,
            armor_class: 10,
            abilities: AbilityScores::default(),
            attacks: Vec::new(),
            save_bonuses: BTreeMap::new(),
            default_save_bonus: None,
            resistances: Vec::new(),
            immunities: Vec::new(),
            vulnerabilities: Vec::new(),
            resists_nonmagical_physical: false,
            spells: Vec::new(),
            spell_save_dc: None,
            spell_attack_bonus: None,
            xp: 0,
        }
    }
}

/// A monster in play.
#[derive(Debug, Clone)]
pub struct Monster {
    pub id: Uuid,
    pub name: String,
    hit_points: HitPoints,
    armor_class: i32,
    abilities: AbilityScores,
    attacks: Vec<Attack>,
    save_bonuses: BTreeMap<Ability, i8>,
    default_save_bonus: i8,
    spells: Vec<String>,
    caster: Option<CasterStats>,
    pub xp: u32,
    pub effects: Vec<Effect>,
    pub status: CombatStatus,
}

impl Monster {
    /// Validate a stat block and build the monster at full health.
    pub fn from_stat_block(
        block: MonsterStatBlock,
        config: &EngineConfig,
    ) -> Result<Self, RulesError> {
        if block.name.trim().is_empty() {
            return Err(RulesError::invalid_argument("monster name is required"));
        }
        if block.hit_points < 1 {
            return Err(RulesError::invalid_argument(format!(
                "{} needs at least 1 hit point, got {}",
                block.name, block.hit_points
            )));
        }

        let attacks = block
            .attacks
            .iter()
            .map(|a| {
                let damage = DiceExpression::parse(&a.damage).map_err(|e| {
                    RulesError::invalid_argument(format!(
                        "{} attack '{}': {e}",
                        block.name, a.name
                    ))
                })?;
                Ok(Attack {
                    name: a.name.clone(),
                    attack_bonus: a.attack_bonus,
                    damage,
                    damage_type: a.damage_type,
                    magical: a.magical,
                })
            })
            .collect::<Result<Vec<_>, RulesError>>()?;

        let mut effects = Vec::new();
        let innate = [
            (&block.immunities, ResistanceLevel::Immunity, "Immunity"),
            (&block.resistances, ResistanceLevel::Resistance, "Resistance"),
            (&block.vulnerabilities, ResistanceLevel::Vulnerability, "Vulnerability"),
        ];
        for (types, level, label) in innate {
            for damage_type in types {
                effects.push(Effect::passive_resistance(
                    format!("{} {label}", capitalize(damage_type.name())),
                    ResistanceEffect::new(*damage_type, level),
                ));
            }
        }
        if block.resists_nonmagical_physical {
            effects.push(Effect::passive_resistance(
                "Nonmagical Weapon Resistance",
                ResistanceEffect::nonmagical_physical(ResistanceLevel::Resistance),
            ));
        }

        let caster = match (block.spells.is_empty(), block.spell_save_dc) {
            (false, Some(dc)) => {
                let attack = block.spell_attack_bonus.unwrap_or(dc - 8);
                let ability_modifier = block
                    .abilities
                    .modifier(Ability::Intelligence)
                    .max(block.abilities.modifier(Ability::Wisdom))
                    .max(block.abilities.modifier(Ability::Charisma));
                Some(CasterStats {
                    caster_level: 1,
                    ability_modifier,
                    spell_attack_bonus: attack,
                    spell_save_dc: dc,
                })
            }
            (false, None) => {
                return Err(RulesError::invalid_argument(format!(
                    "{} knows spells but has no spell save DC",
                    block.name
                )))
            }
            (true, _) => None,
        };

        Ok(Self {
            id: Uuid::new_v4(),
            name: block.name,
            hit_points: HitPoints::new(block.hit_points),
            armor_class: block.armor_class,
            abilities: block.abilities.clamped(),
            attacks,
            save_bonuses: block.save_bonuses,
            default_save_bonus: block
                .default_save_bonus
                .unwrap_or(config.default_monster_save_bonus),
            spells: block.spells,
            caster,
            xp: block.xp,
            effects,
            status: CombatStatus::default(),
        })
    }

    pub fn abilities(&self) -> AbilityScores {
        self.abilities
    }

    pub fn spells(&self) -> &[String] {
        &self.spells
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl Combatant for Monster {
    fn name(&self) -> &str {
        &self.name
    }

    fn hit_points(&self) -> &HitPoints {
        &self.hit_points
    }

    fn hit_points_mut(&mut self) -> &mut HitPoints {
        &mut self.hit_points
    }

    fn base_armor_class(&self) -> i32 {
        self.armor_class
    }

    fn ability_modifier(&self, ability: Ability) -> i8 {
        ability_modifier(self.abilities.get(ability))
    }

    fn saving_throw_modifier(&self, ability: Ability) -> i8 {
        match self.save_bonuses.get(&ability) {
            Some(bonus) => *bonus,
            None => self.default_save_bonus,
        }
    }

    fn attacks(&self) -> Vec<Attack> {
        self.attacks.clone()
    }

    fn caster_stats(&self) -> Option<CasterStats> {
        self.caster
    }

    fn knows_spell(&self, spell: &str) -> bool {
        self.spells.iter().any(|s| s.eq_ignore_ascii_case(spell))
    }

    /// Monster spells are cast at will.
    fn has_spell_slot(&self, _level: u8) -> bool {
        true
    }

    fn expend_spell_slot(&mut self, _level: u8) -> bool {
        true
    }

    fn status(&self) -> &CombatStatus {
        &self.status
    }

    fn status_mut(&mut self) -> &mut CombatStatus {
        &mut self.status
    }

    fn effects(&self) -> Vec<&Effect> {
        self.effects.iter().collect()
    }

    fn effect_mut(&mut self, name: &str) -> Option<&mut Effect> {
        self.effects
            .iter_mut()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::goblin_stat_block;

    #[test]
    fn test_goblin_from_stat_block() {
        let goblin = Monster::from_stat_block(goblin_stat_block(), &EngineConfig::default())
            .unwrap();
        assert_eq!(goblin.hit_points().maximum, 7);
        assert_eq!(goblin.armor_class(), 15);
        assert_eq!(goblin.initiative_modifier(), 2);
        // No listed saves: the flat default, whatever the ability score.
        assert_eq!(goblin.saving_throw_modifier(Ability::Dexterity), 2);
        assert_eq!(goblin.saving_throw_modifier(Ability::Wisdom), 2);
        assert_eq!(goblin.attacks()[0].damage.to_string(), "1d6+2");
        assert!(goblin.caster_stats().is_none());
    }

    #[test]
    fn test_explicit_save_bonus_wins() {
        let mut block = goblin_stat_block();
        block.save_bonuses.insert(Ability::Wisdom, 5);
        let config = EngineConfig::default().with_default_monster_save_bonus(0);
        let goblin = Monster::from_stat_block(block, &config).unwrap();
        assert_eq!(goblin.saving_throw_modifier(Ability::Wisdom), 5);
        assert_eq!(goblin.saving_throw_modifier(Ability::Strength), 0);
    }

    #[test]
    fn test_invalid_stat_blocks() {
        let config = EngineConfig::default();

        let mut block = goblin_stat_block();
        block.hit_points = 0;
        assert!(matches!(
            Monster::from_stat_block(block, &config),
            Err(RulesError::InvalidArgument(_))
        ));

        let mut block = goblin_stat_block();
        block.attacks[0].damage = "1d7".to_string();
        assert!(matches!(
            Monster::from_stat_block(block, &config),
            Err(RulesError::InvalidArgument(_))
        ));

        let mut block = goblin_stat_block();
        block.spells = vec!["Fire Bolt".to_string()];
        assert!(matches!(
            Monster::from_stat_block(block, &config),
            Err(RulesError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_innate_resistances() {
        let json = r#"{
            "name": "Fire Elemental",
            "hp": 102,
            "ac": 13,
            "abilities": {"str": 10, "dex": 17, "con": 16, "int": 6, "wis": 10, "cha": 7},
            "attacks": [{"name": "Touch", "attack_bonus": 6, "damage": "2d6+3", "damage_type": "fire"}],
            "immunities": ["fire", "poison"],
            "vulnerabilities": ["cold"],
            "resists_nonmagical_physical": true
        }"#;
        let block: MonsterStatBlock = serde_json::from_str(json).unwrap();
        let mut elemental = Monster::from_stat_block(block, &EngineConfig::default()).unwrap();

        elemental.take_typed_damage(20, DamageType::Fire, true);
        assert_eq!(elemental.hit_points().current, 102);

        elemental.take_typed_damage(10, DamageType::Cold, true);
        assert_eq!(elemental.hit_points().current, 82);

        elemental.take_typed_damage(10, DamageType::Slashing, false);
        assert_eq!(elemental.hit_points().current, 77);

        elemental.take_typed_damage(10, DamageType::Slashing, true);
        assert_eq!(elemental.hit_points().current, 67);
    }

    #[test]
    fn test_monster_caster() {
        let mut block = goblin_stat_block();
        block.name = "Goblin Shaman".to_string();
        block.spells = vec!["Fire Bolt".to_string()];
        block.spell_save_dc = Some(12);
        let mut shaman = Monster::from_stat_block(block, &EngineConfig::default()).unwrap();

        let stats = shaman.caster_stats().unwrap();
        assert_eq!(stats.spell_save_dc, 12);
        assert_eq!(stats.spell_attack_bonus, 4);
        assert!(shaman.knows_spell("fire bolt"));
        assert!(shaman.expend_spell_slot(3));
    }
}
