//! Player characters: ability scores, hit points, progression and derived
//! stats.
//!
//! Invariants kept by every mutator:
//! - effective ability scores are `base + racial + Half-Elf bonus`, clamped
//!   to `1..=20`
//! - max HP is re-derived whenever Constitution or level changes, keeping the
//!   damage already taken
//! - level stays in `1..=20`

use crate::abilities::{
    ability_modifier, clamp_score, proficiency_bonus, Ability, AbilityScores, Skill,
};
use crate::class_data::CharacterClass;
use crate::combatant::{Attack, CasterStats, CombatStatus, Combatant, DamageType, HitPoints};
use crate::config::HpGainPolicy;
use crate::dice::{DiceExpression, DiceRoller};
use crate::effects::{
    Effect, EffectKind, ResetTrigger, ResistanceEffect, ResistanceLevel, UsagePolicy,
};
use crate::error::RulesError;
use crate::items::{Equipment, ItemInstance};
use crate::spells;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharacterId(pub Uuid);

impl CharacterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CharacterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub const MAX_LEVEL: u8 = 20;

/// Experience needed to reach each level (index 0 is level 1).
pub const XP_THRESHOLDS: [u32; 20] = [
    0, 300, 900, 2_700, 6_500, 14_000, 23_000, 34_000, 48_000, 64_000, 85_000, 100_000, 120_000,
    140_000, 165_000, 195_000, 225_000, 265_000, 305_000, 355_000,
];

/// Level reached with `experience` points.
pub fn level_for_experience(experience: u32) -> u8 {
    XP_THRESHOLDS
        .iter()
        .rposition(|threshold| experience >= *threshold)
        .map(|i| i as u8 + 1)
        .unwrap_or(1)
}

// ============================================================================
// Races
// ============================================================================

/// D&D 5e playable races.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RaceType {
    Human,
    Elf,
    Dwarf,
    Halfling,
    HalfOrc,
    HalfElf,
    Tiefling,
    Gnome,
    Dragonborn,
}

impl RaceType {
    pub fn name(&self) -> &'static str {
        match self {
            RaceType::Human => "Human",
            RaceType::Elf => "Elf",
            RaceType::Dwarf => "Dwarf",
            RaceType::Halfling => "Halfling",
            RaceType::HalfOrc => "Half-Orc",
            RaceType::HalfElf => "Half-Elf",
            RaceType::Tiefling => "Tiefling",
            RaceType::Gnome => "Gnome",
            RaceType::Dragonborn => "Dragonborn",
        }
    }

    /// Parse a race name, ignoring case and separators.
    pub fn from_name(name: &str) -> Option<RaceType> {
        let wanted: String = name
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        Self::all().iter().copied().find(|r| {
            r.name()
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
                == wanted
        })
    }

    /// Fixed racial bonus to one ability.
    pub fn ability_bonus(&self, ability: Ability) -> i8 {
        use Ability::*;
        match (self, ability) {
            (RaceType::Human, _) => 1,
            (RaceType::Elf, Dexterity) => 2,
            (RaceType::Dwarf, Constitution) => 2,
            (RaceType::Halfling, Dexterity) => 2,
            (RaceType::HalfOrc, Strength) => 2,
            (RaceType::HalfOrc, Constitution) => 1,
            (RaceType::HalfElf, Charisma) => 2,
            (RaceType::Tiefling, Charisma) => 2,
            (RaceType::Tiefling, Intelligence) => 1,
            (RaceType::Gnome, Intelligence) => 2,
            (RaceType::Dragonborn, Strength) => 2,
            (RaceType::Dragonborn, Charisma) => 1,
            _ => 0,
        }
    }

    /// Get ability bonus description for display.
    pub fn ability_bonuses(&self) -> &'static str {
        match self {
            RaceType::Human => "+1 to all abilities",
            RaceType::Elf => "+2 Dexterity",
            RaceType::Dwarf => "+2 Constitution",
            RaceType::Halfling => "+2 Dexterity",
            RaceType::HalfOrc => "+2 Strength, +1 Constitution",
            RaceType::HalfElf => "+2 Charisma, +1 to two others",
            RaceType::Tiefling => "+2 Charisma, +1 Intelligence",
            RaceType::Gnome => "+2 Intelligence",
            RaceType::Dragonborn => "+2 Strength, +1 Charisma",
        }
    }

    pub fn base_speed(&self) -> u32 {
        match self {
            RaceType::Dwarf | RaceType::Halfling | RaceType::Gnome => 25,
            _ => 30,
        }
    }

    pub fn all() -> &'static [RaceType] {
        &[
            RaceType::Human,
            RaceType::Elf,
            RaceType::Dwarf,
            RaceType::Halfling,
            RaceType::HalfOrc,
            RaceType::HalfElf,
            RaceType::Tiefling,
            RaceType::Gnome,
            RaceType::Dragonborn,
        ]
    }
}

impl fmt::Display for RaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// Spell slots
// ============================================================================

/// Spell slot tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellSlots {
    pub slots: [SlotInfo; 9],
}

impl SpellSlots {
    pub fn new() -> Self {
        Self {
            slots: [SlotInfo { total: 0, used: 0 }; 9],
        }
    }

    /// Slots from a class table, all unused.
    pub fn from_totals(totals: [u8; 9]) -> Self {
        let mut slots = Self::new();
        slots.set_totals(totals);
        slots
    }

    /// Change slot totals, keeping what has been spent.
    pub fn set_totals(&mut self, totals: [u8; 9]) {
        for (slot, total) in self.slots.iter_mut().zip(totals) {
            slot.total = total;
            slot.used = slot.used.min(total);
        }
    }

    pub fn available(&self, level: u8) -> u8 {
        if (1..=9).contains(&level) {
            self.slots[level as usize - 1].available()
        } else {
            0
        }
    }

    pub fn use_slot(&mut self, level: u8) -> bool {
        if (1..=9).contains(&level) {
            let slot = &mut self.slots[level as usize - 1];
            if slot.available() > 0 {
                slot.used += 1;
                return true;
            }
        }
        false
    }

    pub fn recover_all(&mut self) {
        for slot in &mut self.slots {
            slot.used = 0;
        }
    }

    /// Highest level with a slot left.
    pub fn highest_available(&self) -> Option<u8> {
        (1..=9u8).rev().find(|level| self.available(*level) > 0)
    }
}

impl Default for SpellSlots {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInfo {
    pub total: u8,
    pub used: u8,
}

impl SlotInfo {
    pub fn available(&self) -> u8 {
        self.total.saturating_sub(self.used)
    }
}

// ============================================================================
// Character
// ============================================================================

/// A player character.
#[derive(Debug, Clone)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,

    pub(crate) race: RaceType,
    pub(crate) class: CharacterClass,
    pub(crate) level: u8,
    pub(crate) experience: u32,

    pub(crate) base_scores: AbilityScores,
    pub(crate) half_elf_bonus: Option<[Ability; 2]>,

    pub(crate) hit_points: HitPoints,
    /// Hit die results for levels 2 and up, before Constitution.
    pub(crate) level_hp_gains: Vec<u32>,

    /// AC bonus from armor supplied by an external inventory.
    pub armor_bonus: i32,
    pub shield_bonus: i32,
    pub equipment: Equipment,

    pub skill_proficiencies: BTreeSet<Skill>,

    pub cantrips_known: Vec<String>,
    pub spells_known: Vec<String>,
    pub spell_slots: SpellSlots,

    /// Class and racial features; rebuilt when race or level changes.
    pub(crate) features: Vec<Effect>,
    /// Effects granted from elsewhere (boons, blessings).
    pub effects: Vec<Effect>,

    pub status: CombatStatus,
}

impl Character {
    /// A level 1 character at full health.
    pub fn new(
        name: impl Into<String>,
        race: RaceType,
        class: CharacterClass,
        base_scores: AbilityScores,
    ) -> Self {
        let data = class.data();
        let mut character = Self {
            id: CharacterId::new(),
            name: name.into(),
            race,
            class,
            level: 1,
            experience: 0,
            base_scores: base_scores.clamped(),
            half_elf_bonus: None,
            hit_points: HitPoints::new(1),
            level_hp_gains: Vec::new(),
            armor_bonus: 0,
            shield_bonus: 0,
            equipment: Equipment::new(),
            skill_proficiencies: BTreeSet::new(),
            cantrips_known: data.starting_cantrips.iter().map(|s| s.to_string()).collect(),
            spells_known: data.starting_spells.iter().map(|s| s.to_string()).collect(),
            spell_slots: SpellSlots::from_totals(class.spell_slots_at(1)),
            features: Vec::new(),
            effects: Vec::new(),
            status: CombatStatus::default(),
        };
        let max = character.compute_max_hp();
        character.hit_points = HitPoints::new(max);
        character.refresh_features();
        character
    }

    pub fn race(&self) -> RaceType {
        self.race
    }

    pub fn class(&self) -> CharacterClass {
        self.class
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn experience(&self) -> u32 {
        self.experience
    }

    pub fn base_scores(&self) -> AbilityScores {
        self.base_scores
    }

    pub fn half_elf_bonus(&self) -> Option<[Ability; 2]> {
        self.half_elf_bonus
    }

    pub fn level_hp_gains(&self) -> &[u32] {
        &self.level_hp_gains
    }

    pub fn features(&self) -> &[Effect] {
        &self.features
    }

    // ------------------------------------------------------------------------
    // Ability scores
    // ------------------------------------------------------------------------

    /// Score after racial and Half-Elf bonuses, clamped to `1..=20`.
    pub fn ability_score(&self, ability: Ability) -> u8 {
        let mut raw = self.base_scores.get(ability) as i32 + self.race.ability_bonus(ability) as i32;
        if let Some(bonus) = self.half_elf_bonus {
            if bonus.contains(&ability) {
                raw += 1;
            }
        }
        clamp_score(raw)
    }

    pub fn ability_scores(&self) -> AbilityScores {
        let mut scores = AbilityScores::default();
        for ability in Ability::all() {
            scores.set(ability, self.ability_score(ability));
        }
        scores
    }

    pub fn modifier(&self, ability: Ability) -> i8 {
        ability_modifier(self.ability_score(ability))
    }

    pub fn set_base_score(&mut self, ability: Ability, value: u8) {
        self.base_scores.set(ability, clamp_score(value as i32));
        if ability == Ability::Constitution {
            self.recalculate_hit_points();
        }
    }

    pub fn set_base_scores(&mut self, scores: AbilityScores) {
        self.base_scores = scores.clamped();
        self.recalculate_hit_points();
    }

    /// Change race. Half-Elf bonuses are dropped when leaving Half-Elf.
    pub fn set_race(&mut self, race: RaceType) {
        self.race = race;
        if race != RaceType::HalfElf {
            self.half_elf_bonus = None;
        }
        self.recalculate_hit_points();
        self.refresh_features();
    }

    /// Choose the two abilities a Half-Elf raises by one.
    pub fn set_half_elf_bonus(&mut self, abilities: [Ability; 2]) -> Result<(), RulesError> {
        if self.race != RaceType::HalfElf {
            return Err(RulesError::illegal_state(format!(
                "{} is a {}, only a Half-Elf chooses bonus abilities",
                self.name, self.race
            )));
        }
        if abilities.contains(&Ability::Charisma) {
            return Err(RulesError::invalid_argument(
                "Charisma already has the Half-Elf racial bonus",
            ));
        }
        if abilities[0] == abilities[1] {
            return Err(RulesError::invalid_argument(format!(
                "bonus abilities must differ, got {} twice",
                abilities[0]
            )));
        }
        self.half_elf_bonus = Some(abilities);
        self.recalculate_hit_points();
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Derived stats
    // ------------------------------------------------------------------------

    pub fn proficiency_bonus(&self) -> i8 {
        proficiency_bonus(self.level)
    }

    pub fn initiative_modifier(&self) -> i8 {
        self.modifier(Ability::Dexterity)
    }

    pub fn is_proficient(&self, skill: Skill) -> bool {
        self.skill_proficiencies.contains(&skill)
    }

    pub fn skill_modifier(&self, skill: Skill) -> i8 {
        let bonus = if self.is_proficient(skill) {
            self.proficiency_bonus()
        } else {
            0
        };
        self.modifier(skill.ability()) + bonus
    }

    /// Saving throw proficiencies are fixed by class.
    pub fn saving_throw_proficiencies(&self) -> [Ability; 2] {
        self.class.data().saving_throws
    }

    pub fn saving_throw_modifier(&self, ability: Ability) -> i8 {
        let ability_mod = self.modifier(ability);
        if self.saving_throw_proficiencies().contains(&ability) {
            ability_mod + self.proficiency_bonus()
        } else {
            ability_mod
        }
    }

    pub fn passive_perception(&self) -> i32 {
        10 + self.skill_modifier(Skill::Perception) as i32
    }

    /// AC from equipped armor when worn, otherwise `10 + DEX + armor bonus`,
    /// plus any shield.
    pub fn armor_class(&self) -> i32 {
        let dex = self.modifier(Ability::Dexterity);
        let base = match self.equipment.armor() {
            Some(armor) => armor.armor_class(dex),
            None => 10 + dex as i32 + self.armor_bonus,
        };
        let shield = self.equipment.shield_bonus().unwrap_or(self.shield_bonus);
        base + shield
    }

    pub fn max_hit_points(&self) -> i32 {
        self.hit_points.maximum
    }

    /// Max HP: the full hit die at level 1, then each level's gain, each
    /// plus CON and never below 1.
    fn compute_max_hp(&self) -> i32 {
        let con = self.modifier(Ability::Constitution) as i32;
        let first = (self.class.hit_die().sides() as i32 + con).max(1);
        let rest: i32 = self
            .level_hp_gains
            .iter()
            .map(|gain| (*gain as i32 + con).max(1))
            .sum();
        first + rest
    }

    fn recalculate_hit_points(&mut self) {
        let new_max = self.compute_max_hp();
        if new_max != self.hit_points.maximum {
            tracing::debug!(
                character = %self.name,
                old_max = self.hit_points.maximum,
                new_max,
                "Max HP recalculated"
            );
            self.hit_points.rebase(new_max);
        }
    }

    // ------------------------------------------------------------------------
    // Progression
    // ------------------------------------------------------------------------

    /// Set the level directly (clamped to 1-20). New levels use average HP.
    pub fn set_level(&mut self, level: u8) {
        let level = level.clamp(1, MAX_LEVEL);
        let average = self.class.hit_die().average_gain();
        self.level_hp_gains.resize(level as usize - 1, average);
        self.level = level;
        self.on_level_changed();
    }

    /// Add experience, levelling up as thresholds are crossed.
    ///
    /// Returns each level reached.
    pub fn add_experience(
        &mut self,
        amount: u32,
        policy: HpGainPolicy,
        dice: &mut dyn DiceRoller,
    ) -> Vec<u8> {
        self.experience = self.experience.saturating_add(amount);
        let target = level_for_experience(self.experience);
        let mut gained = Vec::new();
        while self.level < target {
            let hp_gain = match policy {
                HpGainPolicy::Average => self.class.hit_die().average_gain(),
                HpGainPolicy::Roll => dice.roll(self.class.hit_die().sides()),
            };
            self.level_hp_gains.push(hp_gain);
            self.level += 1;
            gained.push(self.level);
            tracing::info!(character = %self.name, level = self.level, hp_gain, "Level up");
        }
        if !gained.is_empty() {
            self.on_level_changed();
        }
        gained
    }

    pub(crate) fn on_level_changed(&mut self) {
        self.recalculate_hit_points();
        self.spell_slots
            .set_totals(self.class.spell_slots_at(self.level));
        self.refresh_features();
    }

    /// Rebuild class and racial features, keeping spent charges.
    fn refresh_features(&mut self) {
        let mut fresh = class_features(self.class, self.level);
        fresh.extend(racial_features(self.race));
        for feature in &mut fresh {
            if let Some(old) = self.features.iter().find(|f| f.name == feature.name) {
                feature.id = old.id;
                feature.charges = old.charges.min(feature.max_charges);
            }
        }
        self.features = fresh;
    }

    // ------------------------------------------------------------------------
    // Spellcasting
    // ------------------------------------------------------------------------

    pub fn spellcasting_ability(&self) -> Option<Ability> {
        self.class.spellcasting_ability()
    }

    /// `8 + proficiency + spellcasting modifier`.
    pub fn spell_save_dc(&self) -> Option<i32> {
        self.spellcasting_ability()
            .map(|a| 8 + self.proficiency_bonus() as i32 + self.modifier(a) as i32)
    }

    pub fn spell_attack_bonus(&self) -> Option<i32> {
        self.spellcasting_ability()
            .map(|a| self.proficiency_bonus() as i32 + self.modifier(a) as i32)
    }

    /// Learn a spell from the catalog.
    pub fn learn_spell(&mut self, name: &str) -> Result<(), RulesError> {
        if self.spellcasting_ability().is_none() {
            return Err(RulesError::illegal_state(format!(
                "{}s cannot learn spells",
                self.class
            )));
        }
        let spell = spells::get_spell(name)
            .ok_or_else(|| RulesError::invalid_argument(format!("unknown spell '{name}'")))?;
        if !spell.classes().contains(&self.class) {
            return Err(RulesError::invalid_argument(format!(
                "{} is not on the {} spell list",
                spell.name(),
                self.class
            )));
        }
        let list = if spell.is_cantrip() {
            &mut self.cantrips_known
        } else {
            &mut self.spells_known
        };
        if !list.iter().any(|s| s.eq_ignore_ascii_case(spell.name())) {
            list.push(spell.name().to_string());
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Equipment and rests
    // ------------------------------------------------------------------------

    pub fn equip(&mut self, item: ItemInstance) -> Result<Option<ItemInstance>, RulesError> {
        self.equipment.equip(item)
    }

    /// The attack made with the equipped weapon, or an unarmed strike.
    pub fn weapon_attack(&self) -> Attack {
        let str_mod = self.modifier(Ability::Strength);
        let dex_mod = self.modifier(Ability::Dexterity);
        let proficiency = self.proficiency_bonus() as i32;

        match (self.equipment.main_hand.as_ref(), self.equipment.weapon()) {
            (Some(item), Some(weapon)) => {
                // Ranged: DEX only. Finesse: better of STR and DEX. Melee: STR.
                let ability_mod = if weapon.ranged {
                    dex_mod
                } else if weapon.is_finesse() {
                    str_mod.max(dex_mod)
                } else {
                    str_mod
                } as i32;
                Attack {
                    name: item.name.clone(),
                    attack_bonus: ability_mod + proficiency + weapon.magic_bonus,
                    damage: weapon.damage.with_modifier(ability_mod + weapon.magic_bonus),
                    damage_type: weapon.damage_type,
                    magical: item.magical,
                }
            }
            _ => Attack {
                name: "Unarmed Strike".to_string(),
                attack_bonus: str_mod as i32 + proficiency,
                damage: DiceExpression::flat((1 + str_mod as i32).max(1)),
                damage_type: DamageType::Bludgeoning,
                magical: false,
            },
        }
    }

    /// Restore HP and spell slots, refill long-rest effects and clear
    /// combat state.
    pub fn long_rest(&mut self) {
        self.hit_points.restore();
        self.spell_slots.recover_all();
        self.status.clear();
        self.reset_effects(ResetTrigger::LongRest);
        tracing::info!(character = %self.name, "Long rest");
    }

    /// The once-a-day trigger for daily and charged effects.
    pub fn new_day(&mut self) {
        self.reset_effects(ResetTrigger::Daily);
    }

    fn reset_effects(&mut self, trigger: ResetTrigger) {
        for effect in self.features.iter_mut().chain(self.effects.iter_mut()) {
            effect.reset(trigger);
        }
        self.equipment.reset_effects(trigger);
    }
}

fn class_features(class: CharacterClass, level: u8) -> Vec<Effect> {
    match class {
        CharacterClass::Fighter => DiceExpression::parse("1d10")
            .map(|d| {
                vec![Effect::new(
                    "Second Wind",
                    "Regain 1d10 + fighter level hit points.",
                    UsagePolicy::LongRest,
                    1,
                    EffectKind::Healing {
                        dice: d.with_modifier(level as i32),
                    },
                )]
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn racial_features(race: RaceType) -> Vec<Effect> {
    match race {
        RaceType::Dwarf => vec![Effect::passive_resistance(
            "Dwarven Resilience",
            ResistanceEffect::new(DamageType::Poison, ResistanceLevel::Resistance),
        )],
        RaceType::Tiefling => vec![Effect::passive_resistance(
            "Hellish Resistance",
            ResistanceEffect::new(DamageType::Fire, ResistanceLevel::Resistance),
        )],
        _ => Vec::new(),
    }
}

impl Combatant for Character {
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
        self.armor_class()
    }

    fn ability_modifier(&self, ability: Ability) -> i8 {
        self.modifier(ability)
    }

    fn saving_throw_modifier(&self, ability: Ability) -> i8 {
        Character::saving_throw_modifier(self, ability)
    }

    fn initiative_modifier(&self) -> i8 {
        Character::initiative_modifier(self)
    }

    fn attacks(&self) -> Vec<Attack> {
        vec![self.weapon_attack()]
    }

    fn caster_stats(&self) -> Option<CasterStats> {
        let ability = self.spellcasting_ability()?;
        let ability_mod = self.modifier(ability);
        let proficiency = self.proficiency_bonus() as i32;
        Some(CasterStats {
            caster_level: self.level,
            ability_modifier: ability_mod,
            spell_attack_bonus: proficiency + ability_mod as i32,
            spell_save_dc: 8 + proficiency + ability_mod as i32,
        })
    }

    fn knows_spell(&self, spell: &str) -> bool {
        self.cantrips_known
            .iter()
            .chain(self.spells_known.iter())
            .any(|s| s.eq_ignore_ascii_case(spell))
    }

    fn has_spell_slot(&self, level: u8) -> bool {
        level == 0 || self.spell_slots.available(level) > 0
    }

    fn expend_spell_slot(&mut self, level: u8) -> bool {
        level == 0 || self.spell_slots.use_slot(level)
    }

    fn status(&self) -> &CombatStatus {
        &self.status
    }

    fn status_mut(&mut self) -> &mut CombatStatus {
        &mut self.status
    }

    fn effects(&self) -> Vec<&Effect> {
        self.features
            .iter()
            .chain(self.effects.iter())
            .chain(self.equipment.effects())
            .collect()
    }

    fn effect_mut(&mut self, name: &str) -> Option<&mut Effect> {
        if let Some(i) = self
            .features
            .iter()
            .position(|e| e.name.eq_ignore_ascii_case(name))
        {
            return self.features.get_mut(i);
        }
        if let Some(i) = self
            .effects
            .iter()
            .position(|e| e.name.eq_ignore_ascii_case(name))
        {
            return self.effects.get_mut(i);
        }
        self.equipment.effect_mut(name)
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for level 1 characters.
#[derive(Debug, Clone, Default)]
pub struct CharacterBuilder {
    name: Option<String>,
    race: Option<RaceType>,
    class: Option<CharacterClass>,
    ability_scores: Option<AbilityScores>,
    selected_skills: Vec<Skill>,
    /// For Half-Elf: two additional +1 ability bonuses
    half_elf_bonus_abilities: Option<[Ability; 2]>,
    equipment: Vec<ItemInstance>,
}

impl CharacterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn race(mut self, race: RaceType) -> Self {
        self.race = Some(race);
        self
    }

    pub fn class(mut self, class: CharacterClass) -> Self {
        self.class = Some(class);
        self
    }

    /// Base scores, before racial bonuses.
    pub fn ability_scores(mut self, scores: AbilityScores) -> Self {
        self.ability_scores = Some(scores);
        self
    }

    /// Set ability scores from standard array assignment.
    ///
    /// `assignment` maps each standard array value (15, 14, 13, 12, 10, 8) to an ability.
    pub fn standard_array(mut self, assignment: [(u8, Ability); 6]) -> Self {
        let mut scores = AbilityScores::default();
        for (value, ability) in assignment {
            scores.set(ability, value);
        }
        self.ability_scores = Some(scores);
        self
    }

    /// Set the skills selected from class options.
    pub fn skills(mut self, skills: Vec<Skill>) -> Self {
        self.selected_skills = skills;
        self
    }

    /// For Half-Elf: set the two abilities that get +1 bonus.
    pub fn half_elf_bonuses(mut self, abilities: [Ability; 2]) -> Self {
        self.half_elf_bonus_abilities = Some(abilities);
        self
    }

    /// Equip (or carry) an item at creation.
    pub fn item(mut self, item: ItemInstance) -> Self {
        self.equipment.push(item);
        self
    }

    pub fn build(self) -> Result<Character, RulesError> {
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| RulesError::invalid_argument("character name is required"))?;
        let race = self
            .race
            .ok_or_else(|| RulesError::invalid_argument("race selection is required"))?;
        let class = self
            .class
            .ok_or_else(|| RulesError::invalid_argument("class selection is required"))?;
        let scores = self
            .ability_scores
            .ok_or_else(|| RulesError::invalid_argument("ability scores are required"))?;

        let data = class.data();
        if self.selected_skills.len() != data.skill_count {
            return Err(RulesError::invalid_argument(format!(
                "expected {} skills, got {}",
                data.skill_count,
                self.selected_skills.len()
            )));
        }
        for skill in &self.selected_skills {
            if !data.skill_options.contains(skill) {
                return Err(RulesError::invalid_argument(format!(
                    "skill {skill} is not available for {class}"
                )));
            }
        }

        let mut character = Character::new(name, race, class, scores);
        match (race, self.half_elf_bonus_abilities) {
            (_, Some(bonus)) => character.set_half_elf_bonus(bonus)?,
            (RaceType::HalfElf, None) => {
                return Err(RulesError::invalid_argument(
                    "Half-Elf requires two additional ability bonuses",
                ))
            }
            _ => {}
        }
        character.skill_proficiencies = self.selected_skills.into_iter().collect();

        for item in self.equipment {
            let equippable = matches!(
                item.kind,
                crate::items::ItemKind::Weapon(_)
                    | crate::items::ItemKind::Armor(_)
                    | crate::items::ItemKind::Shield { .. }
            );
            if equippable {
                if let Some(previous) = character.equip(item)? {
                    character.equipment.carry(previous);
                }
            } else {
                character.equipment.carry(item);
            }
        }

        Ok(character)
    }
}

/// Roll six ability scores with 4d6, dropping the lowest die. Sorted
/// highest first.
pub fn roll_ability_scores(dice: &mut dyn DiceRoller) -> [u8; 6] {
    let mut scores: [u8; 6] = std::array::from_fn(|_| {
        let mut rolls = dice.roll_many(4, 6);
        rolls.sort_unstable();
        rolls[1..].iter().sum::<u32>() as u8
    });
    scores.sort_by(|a, b| b.cmp(a));
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::ItemRegistry;
    use crate::testing::ScriptedDice;

    fn dwarf_fighter() -> Character {
        Character::new(
            "Thorin",
            RaceType::Dwarf,
            CharacterClass::Fighter,
            AbilityScores::new(16, 12, 14, 10, 12, 8),
        )
    }

    #[test]
    fn test_dwarf_fighter_level_one() {
        let fighter = dwarf_fighter();
        // CON 14 + 2 (dwarf) = 16, HP = 10 + 3
        assert_eq!(fighter.ability_score(Ability::Constitution), 16);
        assert_eq!(fighter.max_hit_points(), 13);
        assert_eq!(fighter.armor_class(), 11);
        assert_eq!(fighter.proficiency_bonus(), 2);
        assert_eq!(fighter.saving_throw_modifier(Ability::Strength), 5);
        assert_eq!(fighter.saving_throw_modifier(Ability::Dexterity), 1);
    }

    #[test]
    fn test_half_elf_bonuses() {
        let mut c = Character::new(
            "Aria",
            RaceType::HalfElf,
            CharacterClass::Bard,
            AbilityScores::default(),
        );
        c.set_half_elf_bonus([Ability::Strength, Ability::Constitution])
            .unwrap();
        let scores = c.ability_scores();
        assert_eq!(scores.strength, 11);
        assert_eq!(scores.constitution, 11);
        assert_eq!(scores.charisma, 12);
        assert_eq!(scores.dexterity, 10);
        assert_eq!(scores.intelligence, 10);
        assert_eq!(scores.wisdom, 10);
    }

    #[test]
    fn test_half_elf_bonus_validation() {
        let mut c = Character::new(
            "Aria",
            RaceType::HalfElf,
            CharacterClass::Bard,
            AbilityScores::default(),
        );
        assert!(matches!(
            c.set_half_elf_bonus([Ability::Charisma, Ability::Strength]),
            Err(RulesError::InvalidArgument(_))
        ));
        assert!(matches!(
            c.set_half_elf_bonus([Ability::Wisdom, Ability::Wisdom]),
            Err(RulesError::InvalidArgument(_))
        ));

        let mut dwarf = dwarf_fighter();
        assert!(matches!(
            dwarf.set_half_elf_bonus([Ability::Strength, Ability::Wisdom]),
            Err(RulesError::IllegalState(_))
        ));
    }

    #[test]
    fn test_scores_are_clamped() {
        let c = Character::new(
            "Brute",
            RaceType::HalfOrc,
            CharacterClass::Barbarian,
            AbilityScores::new(20, 10, 20, 10, 10, 10),
        );
        assert_eq!(c.ability_score(Ability::Strength), 20);
        assert_eq!(c.ability_score(Ability::Constitution), 20);
    }

    #[test]
    fn test_con_change_preserves_damage() {
        let mut fighter = dwarf_fighter();
        fighter.hit_points.take_damage(5);
        assert_eq!(fighter.hit_points.current, 8);

        // CON 16 + 2 = 18 -> +4, max 14
        fighter.set_base_score(Ability::Constitution, 16);
        assert_eq!(fighter.max_hit_points(), 14);
        assert_eq!(fighter.hit_points.current, 9);

        // Back down to CON 10 + 2 = 12 -> +1, max 11
        fighter.set_base_score(Ability::Constitution, 10);
        assert_eq!(fighter.max_hit_points(), 11);
        assert_eq!(fighter.hit_points.current, 6);
    }

    #[test]
    fn test_race_change_recalculates() {
        let mut fighter = dwarf_fighter();
        fighter.set_race(RaceType::Elf);
        // CON back to 14 -> +2
        assert_eq!(fighter.max_hit_points(), 12);
        assert_eq!(fighter.ability_score(Ability::Dexterity), 14);
        assert!(fighter.features().iter().all(|f| f.name != "Dwarven Resilience"));
    }

    #[test]
    fn test_level_clamps_and_scales() {
        let mut fighter = dwarf_fighter();
        fighter.set_level(25);
        assert_eq!(fighter.level(), 20);
        assert_eq!(fighter.proficiency_bonus(), 6);
        // 13 + 19 * (6 + 3)
        assert_eq!(fighter.max_hit_points(), 13 + 19 * 9);

        fighter.set_level(0);
        assert_eq!(fighter.level(), 1);
        assert_eq!(fighter.max_hit_points(), 13);
    }

    #[test]
    fn test_experience_levels_up() {
        let mut fighter = dwarf_fighter();
        fighter.hit_points.take_damage(3);
        let mut dice = ScriptedDice::new([7, 2]);

        let gained = fighter.add_experience(900, HpGainPolicy::Roll, &mut dice);
        assert_eq!(gained, vec![2, 3]);
        assert_eq!(fighter.level_hp_gains(), &[7, 2]);
        // 13 + (7 + 3) + (2 + 3)
        assert_eq!(fighter.max_hit_points(), 28);
        assert_eq!(fighter.hit_points.current, 25);

        assert!(fighter
            .add_experience(100, HpGainPolicy::Average, &mut dice)
            .is_empty());
    }

    #[test]
    fn test_level_for_experience() {
        assert_eq!(level_for_experience(0), 1);
        assert_eq!(level_for_experience(299), 1);
        assert_eq!(level_for_experience(300), 2);
        assert_eq!(level_for_experience(400_000), 20);
    }

    #[test]
    fn test_skill_and_passive_perception() {
        let mut fighter = dwarf_fighter();
        assert_eq!(fighter.passive_perception(), 11);
        fighter.skill_proficiencies.insert(Skill::Perception);
        assert_eq!(fighter.skill_modifier(Skill::Perception), 3);
        assert_eq!(fighter.passive_perception(), 13);
    }

    #[test]
    fn test_armor_class_with_equipment() {
        let registry = ItemRegistry::standard();
        let mut fighter = dwarf_fighter();

        fighter.armor_bonus = 2;
        fighter.shield_bonus = 1;
        assert_eq!(fighter.armor_class(), 14);

        fighter
            .equip(registry.instantiate("chain_mail").unwrap())
            .unwrap();
        fighter.equip(registry.instantiate("shield").unwrap()).unwrap();
        assert_eq!(fighter.armor_class(), 18);
    }

    #[test]
    fn test_weapon_attack_uses_right_ability() {
        let registry = ItemRegistry::standard();
        let mut rogue = Character::new(
            "Vex",
            RaceType::Halfling,
            CharacterClass::Rogue,
            AbilityScores::new(10, 15, 12, 10, 10, 10),
        );
        // Unarmed: 1 + STR
        assert_eq!(rogue.weapon_attack().damage.maximum(), 1);

        rogue.equip(registry.instantiate("rapier").unwrap()).unwrap();
        let attack = rogue.weapon_attack();
        // DEX 17 -> +3, finesse
        assert_eq!(attack.attack_bonus, 5);
        assert_eq!(attack.damage.to_string(), "1d8+3");
    }

    #[test]
    fn test_wizard_spellcasting() {
        let wizard = Character::new(
            "Elara",
            RaceType::Elf,
            CharacterClass::Wizard,
            AbilityScores::new(8, 14, 13, 16, 12, 10),
        );
        assert_eq!(wizard.spell_save_dc(), Some(13));
        assert_eq!(wizard.spell_attack_bonus(), Some(5));
        assert_eq!(wizard.spell_slots.available(1), 2);
        assert!(wizard.knows_spell("fire bolt"));
        assert!(!wizard.knows_spell("Cure Wounds"));
    }

    #[test]
    fn test_learn_spell() {
        let mut wizard = Character::new(
            "Elara",
            RaceType::Elf,
            CharacterClass::Wizard,
            AbilityScores::standard_array(),
        );
        wizard.learn_spell("fireball").unwrap();
        wizard.learn_spell("Fireball").unwrap();
        assert!(wizard.knows_spell("Fireball"));
        assert_eq!(
            wizard.spells_known.iter().filter(|s| *s == "Fireball").count(),
            1
        );
        assert!(matches!(
            wizard.learn_spell("Wish"),
            Err(RulesError::InvalidArgument(_))
        ));
        assert!(matches!(
            wizard.learn_spell("Cure Wounds"),
            Err(RulesError::InvalidArgument(_))
        ));

        let mut fighter = dwarf_fighter();
        assert!(matches!(
            fighter.learn_spell("Fire Bolt"),
            Err(RulesError::IllegalState(_))
        ));
    }

    #[test]
    fn test_long_rest_restores() {
        let mut wizard = Character::new(
            "Elara",
            RaceType::Elf,
            CharacterClass::Wizard,
            AbilityScores::new(8, 14, 13, 16, 12, 10),
        );
        wizard.spell_slots.use_slot(1);
        wizard.hit_points.take_damage(4);
        wizard.hit_points.add_temp_hp(3);

        wizard.long_rest();
        assert!(wizard.hit_points.is_full());
        assert_eq!(wizard.hit_points.temporary, 0);
        assert_eq!(wizard.spell_slots.available(1), 2);
    }

    #[test]
    fn test_builder_validation() {
        let result = CharacterBuilder::new()
            .name("Thorin")
            .race(RaceType::Dwarf)
            .class(CharacterClass::Fighter)
            .ability_scores(AbilityScores::standard_array())
            .skills(vec![Skill::Athletics])
            .build();
        assert!(matches!(result, Err(RulesError::InvalidArgument(_))));

        let result = CharacterBuilder::new()
            .name("Thorin")
            .race(RaceType::Dwarf)
            .class(CharacterClass::Fighter)
            .ability_scores(AbilityScores::standard_array())
            .skills(vec![Skill::Athletics, Skill::Arcana])
            .build();
        assert!(matches!(result, Err(RulesError::InvalidArgument(_))));

        let result = CharacterBuilder::new()
            .name("Aria")
            .race(RaceType::HalfElf)
            .class(CharacterClass::Fighter)
            .ability_scores(AbilityScores::standard_array())
            .skills(vec![Skill::Athletics, Skill::Perception])
            .build();
        assert!(matches!(result, Err(RulesError::InvalidArgument(_))));
    }

    #[test]
    fn test_builder_equips_items() {
        let registry = ItemRegistry::standard();
        let fighter = CharacterBuilder::new()
            .name("Thorin")
            .race(RaceType::Dwarf)
            .class(CharacterClass::Fighter)
            .standard_array([
                (15, Ability::Strength),
                (14, Ability::Constitution),
                (13, Ability::Dexterity),
                (12, Ability::Wisdom),
                (10, Ability::Intelligence),
                (8, Ability::Charisma),
            ])
            .skills(vec![Skill::Athletics, Skill::Perception])
            .item(registry.instantiate("chain_mail").unwrap())
            .item(registry.instantiate("longsword").unwrap())
            .item(registry.instantiate("potion_of_healing").unwrap())
            .build()
            .unwrap();

        assert_eq!(fighter.max_hit_points(), 13);
        assert_eq!(fighter.armor_class(), 16);
        assert_eq!(fighter.weapon_attack().name, "Longsword");
        assert_eq!(fighter.equipment.pack.len(), 1);
        assert!(fighter.is_proficient(Skill::Perception));
    }

    #[test]
    fn test_roll_ability_scores() {
        let mut dice = ScriptedDice::new([
            6, 6, 6, 1, // 18
            5, 5, 5, 5, // 15
            1, 1, 1, 1, // 3
            4, 3, 2, 1, // 9
            6, 5, 4, 3, // 15
            2, 2, 2, 6, // 10
        ]);
        assert_eq!(roll_ability_scores(&mut dice), [18, 15, 15, 10, 9, 3]);
    }

    #[test]
    fn test_second_wind_scales_with_level() {
        let mut fighter = dwarf_fighter();
        fighter.set_level(5);
        let second_wind = fighter
            .features()
            .iter()
            .find(|f| f.name == "Second Wind")
            .unwrap();
        assert!(matches!(
            &second_wind.kind,
            EffectKind::Healing { dice } if dice.to_string() == "1d10+5"
        ));
    }
}
