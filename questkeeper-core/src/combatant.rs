//! The capability shared by everything that can fight.
//!
//! Combat and spell resolution only ever see a `dyn Combatant`. Characters
//! and monsters implement it; [`Creature`] holds either one inside an
//! encounter.

use crate::abilities::Ability;
use crate::character::Character;
use crate::dice::DiceExpression;
use crate::effects::{combined_damage, Effect};
use crate::monster::Monster;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Damage types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageType {
    Slashing,
    Piercing,
    Bludgeoning,
    Fire,
    Cold,
    Lightning,
    Thunder,
    Acid,
    Poison,
    Necrotic,
    Radiant,
    Force,
    Psychic,
}

impl DamageType {
    pub fn name(&self) -> &'static str {
        match self {
            DamageType::Slashing => "slashing",
            DamageType::Piercing => "piercing",
            DamageType::Bludgeoning => "bludgeoning",
            DamageType::Fire => "fire",
            DamageType::Cold => "cold",
            DamageType::Lightning => "lightning",
            DamageType::Thunder => "thunder",
            DamageType::Acid => "acid",
            DamageType::Poison => "poison",
            DamageType::Necrotic => "necrotic",
            DamageType::Radiant => "radiant",
            DamageType::Force => "force",
            DamageType::Psychic => "psychic",
        }
    }

    /// Bludgeoning, piercing or slashing.
    pub fn is_physical(&self) -> bool {
        matches!(
            self,
            DamageType::Bludgeoning | DamageType::Piercing | DamageType::Slashing
        )
    }
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// Conditions
// ============================================================================

/// D&D 5e conditions tracked in combat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    Blinded,
    Charmed,
    Frightened,
    Incapacitated,
    Paralyzed,
    Poisoned,
    Prone,
    Restrained,
    Stunned,
}

impl Condition {
    pub fn name(&self) -> &'static str {
        match self {
            Condition::Blinded => "Blinded",
            Condition::Charmed => "Charmed",
            Condition::Frightened => "Frightened",
            Condition::Incapacitated => "Incapacitated",
            Condition::Paralyzed => "Paralyzed",
            Condition::Poisoned => "Poisoned",
            Condition::Prone => "Prone",
            Condition::Restrained => "Restrained",
            Condition::Stunned => "Stunned",
        }
    }

    /// Whether a creature with this condition loses its turn.
    pub fn is_incapacitating(&self) -> bool {
        matches!(
            self,
            Condition::Incapacitated | Condition::Paralyzed | Condition::Stunned
        )
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A condition applied to a creature with tracking info.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveCondition {
    pub condition: Condition,
    pub source: String,
    /// Rounds left, counted down at the end of the creature's turn.
    pub remaining_rounds: Option<u32>,
}

impl ActiveCondition {
    pub fn new(condition: Condition, source: impl Into<String>) -> Self {
        Self {
            condition,
            source: source.into(),
            remaining_rounds: None,
        }
    }

    pub fn with_duration(mut self, rounds: u32) -> Self {
        self.remaining_rounds = Some(rounds);
        self
    }
}

/// Transient combat state carried by every combatant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CombatStatus {
    pub conditions: Vec<ActiveCondition>,
    /// Bonus from reaction spells like Shield; cleared by the turn loop.
    pub temporary_ac_bonus: i32,
}

impl CombatStatus {
    /// Add a condition, replacing one of the same kind from the same source.
    pub fn add_condition(&mut self, condition: ActiveCondition) {
        self.conditions
            .retain(|c| !(c.condition == condition.condition && c.source == condition.source));
        self.conditions.push(condition);
    }

    pub fn has_condition(&self, condition: Condition) -> bool {
        self.conditions.iter().any(|c| c.condition == condition)
    }

    pub fn remove_condition(&mut self, condition: Condition) -> bool {
        let before = self.conditions.len();
        self.conditions.retain(|c| c.condition != condition);
        self.conditions.len() != before
    }

    /// Remove every condition imposed by `source`, returning what was removed.
    pub fn remove_from_source(&mut self, source: &str) -> Vec<Condition> {
        let (removed, kept): (Vec<_>, Vec<_>) = self
            .conditions
            .drain(..)
            .partition(|c| c.source == source);
        self.conditions = kept;
        removed.into_iter().map(|c| c.condition).collect()
    }

    /// Count down timed conditions, returning the ones that expired.
    pub fn tick_conditions(&mut self) -> Vec<Condition> {
        let mut expired = Vec::new();
        self.conditions.retain_mut(|c| match c.remaining_rounds.as_mut() {
            Some(rounds) => {
                *rounds = rounds.saturating_sub(1);
                if *rounds == 0 {
                    expired.push(c.condition);
                    false
                } else {
                    true
                }
            }
            None => true,
        });
        expired
    }

    pub fn is_incapacitated(&self) -> bool {
        self.conditions
            .iter()
            .any(|c| c.condition.is_incapacitating())
    }

    pub fn clear(&mut self) {
        self.conditions.clear();
        self.temporary_ac_bonus = 0;
    }
}

// ============================================================================
// Hit Points and Health
// ============================================================================

/// Hit points tracking.
///
/// `current` stays in `0..=maximum`. Temporary hit points are a separate
/// pool that absorbs damage first and never stacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPoints {
    pub current: i32,
    pub maximum: i32,
    pub temporary: i32,
}

impl HitPoints {
    pub fn new(maximum: i32) -> Self {
        let maximum = maximum.max(1);
        Self {
            current: maximum,
            maximum,
            temporary: 0,
        }
    }

    pub fn take_damage(&mut self, amount: i32) -> DamageResult {
        let amount = amount.max(0);
        let absorbed = amount.min(self.temporary);
        self.temporary -= absorbed;

        let before = self.current;
        self.current = (self.current - (amount - absorbed)).max(0);

        DamageResult {
            damage_taken: amount,
            absorbed_by_temp: absorbed,
            hp_lost: before - self.current,
            dropped_to_zero: before > 0 && self.current == 0,
        }
    }

    /// Heal up to the maximum, returning the amount actually restored.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let old = self.current;
        self.current = (self.current + amount.max(0)).min(self.maximum);
        self.current - old
    }

    /// Temporary hit points don't stack; the higher value wins.
    pub fn add_temp_hp(&mut self, amount: i32) {
        self.temporary = self.temporary.max(amount);
    }

    pub fn is_unconscious(&self) -> bool {
        self.current == 0
    }

    pub fn is_full(&self) -> bool {
        self.current == self.maximum
    }

    /// Change the maximum while keeping the damage already taken.
    ///
    /// A creature at 0 stays at 0.
    pub fn rebase(&mut self, new_maximum: i32) {
        let new_maximum = new_maximum.max(1);
        if self.current > 0 {
            let damage = self.maximum - self.current;
            self.current = (new_maximum - damage).clamp(0, new_maximum);
        }
        self.maximum = new_maximum;
    }

    pub fn restore(&mut self) {
        self.current = self.maximum;
        self.temporary = 0;
    }

    pub fn ratio(&self) -> f32 {
        (self.current as f32 / self.maximum as f32).max(0.0)
    }
}

/// Result of taking damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DamageResult {
    /// Damage dealt after resistances, before temporary hit points.
    pub damage_taken: i32,
    pub absorbed_by_temp: i32,
    pub hp_lost: i32,
    pub dropped_to_zero: bool,
}

// ============================================================================
// Offense
// ============================================================================

/// A ready-to-roll attack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attack {
    pub name: String,
    pub attack_bonus: i32,
    /// Damage including the flat bonus, e.g. `1d8+3`.
    pub damage: DiceExpression,
    pub damage_type: DamageType,
    pub magical: bool,
}

/// Numbers a spell needs from its caster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CasterStats {
    pub caster_level: u8,
    pub ability_modifier: i8,
    pub spell_attack_bonus: i32,
    pub spell_save_dc: i32,
}

// ============================================================================
// The capability
// ============================================================================

pub trait Combatant {
    fn name(&self) -> &str;
    fn hit_points(&self) -> &HitPoints;
    fn hit_points_mut(&mut self) -> &mut HitPoints;

    /// Armor class without temporary bonuses.
    fn base_armor_class(&self) -> i32;

    fn ability_modifier(&self, ability: Ability) -> i8;
    fn saving_throw_modifier(&self, ability: Ability) -> i8;

    fn initiative_modifier(&self) -> i8 {
        self.ability_modifier(Ability::Dexterity)
    }

    /// Attacks available this turn, best first.
    fn attacks(&self) -> Vec<Attack>;

    /// `None` for creatures that cannot cast spells.
    fn caster_stats(&self) -> Option<CasterStats>;

    fn knows_spell(&self, spell: &str) -> bool;

    /// Whether a slot of exactly `level` is left. Cantrips never need one.
    fn has_spell_slot(&self, level: u8) -> bool;

    /// Spend a slot of exactly `level`. Cantrips never need one.
    fn expend_spell_slot(&mut self, level: u8) -> bool;

    fn status(&self) -> &CombatStatus;
    fn status_mut(&mut self) -> &mut CombatStatus;

    /// Every effect that currently applies, including those from items.
    fn effects(&self) -> Vec<&Effect>;

    fn effect_mut(&mut self, name: &str) -> Option<&mut Effect>;

    fn armor_class(&self) -> i32 {
        self.base_armor_class() + self.status().temporary_ac_bonus
    }

    /// Above 0 hit points.
    fn is_alive(&self) -> bool {
        self.hit_points().current > 0
    }

    fn is_unconscious(&self) -> bool {
        self.hit_points().is_unconscious()
    }

    fn take_damage(&mut self, amount: i32) -> DamageResult {
        self.hit_points_mut().take_damage(amount)
    }

    /// Apply damage after resistances, vulnerabilities and immunities.
    fn take_typed_damage(
        &mut self,
        amount: i32,
        damage_type: DamageType,
        magical: bool,
    ) -> DamageResult {
        let adjusted = {
            let effects = self.effects();
            combined_damage(
                amount,
                damage_type,
                magical,
                effects.iter().filter_map(|e| e.resistance()),
            )
        };
        if adjusted != amount {
            tracing::debug!(
                target_name = %self.name(),
                incoming = amount,
                adjusted,
                damage_type = %damage_type,
                "Damage adjusted by resistances"
            );
        }
        self.take_damage(adjusted)
    }

    fn heal(&mut self, amount: i32) -> i32 {
        self.hit_points_mut().heal(amount)
    }

    fn add_temp_hp(&mut self, amount: i32) {
        self.hit_points_mut().add_temp_hp(amount)
    }

    fn has_condition(&self, condition: Condition) -> bool {
        self.status().has_condition(condition)
    }

    fn add_condition(&mut self, condition: ActiveCondition) {
        self.status_mut().add_condition(condition)
    }

    fn is_incapacitated(&self) -> bool {
        self.status().is_incapacitated()
    }
}

/// A character or monster inside an encounter.
#[derive(Debug, Clone)]
pub enum Creature {
    Character(Box<Character>),
    Monster(Box<Monster>),
}

impl Creature {
    pub fn as_combatant(&self) -> &dyn Combatant {
        match self {
            Creature::Character(c) => c.as_ref(),
            Creature::Monster(m) => m.as_ref(),
        }
    }

    pub fn as_combatant_mut(&mut self) -> &mut dyn Combatant {
        match self {
            Creature::Character(c) => c.as_mut(),
            Creature::Monster(m) => m.as_mut(),
        }
    }

    pub fn as_character(&self) -> Option<&Character> {
        match self {
            Creature::Character(c) => Some(c),
            Creature::Monster(_) => None,
        }
    }

    pub fn as_monster(&self) -> Option<&Monster> {
        match self {
            Creature::Monster(m) => Some(m),
            Creature::Character(_) => None,
        }
    }

    pub fn into_character(self) -> Option<Character> {
        match self {
            Creature::Character(c) => Some(*c),
            Creature::Monster(_) => None,
        }
    }
}

impl From<Character> for Creature {
    fn from(character: Character) -> Self {
        Creature::Character(Box::new(character))
    }
}

impl From<Monster> for Creature {
    fn from(monster: Monster) -> Self {
        Creature::Monster(Box::new(monster))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_hp_absorbs_first() {
        let mut hp = HitPoints::new(20);
        hp.add_temp_hp(5);
        let result = hp.take_damage(8);
        assert_eq!(hp.temporary, 0);
        assert_eq!(hp.current, 17);
        assert_eq!(result.absorbed_by_temp, 5);
        assert_eq!(result.hp_lost, 3);
    }

    #[test]
    fn test_temp_hp_fully_absorbs_small_hits() {
        let mut hp = HitPoints::new(20);
        hp.add_temp_hp(5);
        hp.take_damage(4);
        assert_eq!(hp.temporary, 1);
        assert_eq!(hp.current, 20);
    }

    #[test]
    fn test_temp_hp_keeps_higher() {
        let mut hp = HitPoints::new(20);
        hp.add_temp_hp(8);
        hp.add_temp_hp(3);
        assert_eq!(hp.temporary, 8);
        hp.add_temp_hp(10);
        assert_eq!(hp.temporary, 10);
        assert_eq!(hp.current, 20);
    }

    #[test]
    fn test_heal_is_bounded() {
        let mut hp = HitPoints::new(20);
        hp.take_damage(5);
        assert_eq!(hp.heal(100), 5);
        assert!(hp.is_full());
    }

    #[test]
    fn test_unconscious_exactly_at_zero() {
        let mut hp = HitPoints::new(12);
        hp.take_damage(11);
        assert!(!hp.is_unconscious());
        let result = hp.take_damage(1);
        assert!(hp.is_unconscious());
        assert!(result.dropped_to_zero);

        let mut hp = HitPoints::new(12);
        hp.take_damage(50);
        assert_eq!(hp.current, 0);
    }

    #[test]
    fn test_rebase_preserves_damage() {
        let mut hp = HitPoints::new(13);
        hp.take_damage(4);
        hp.rebase(15);
        assert_eq!(hp.current, 11);
        hp.rebase(10);
        assert_eq!(hp.current, 6);

        let mut down = HitPoints::new(10);
        down.take_damage(10);
        down.rebase(14);
        assert_eq!(down.current, 0);
    }

    #[test]
    fn test_condition_ticking() {
        let mut status = CombatStatus::default();
        status.add_condition(ActiveCondition::new(Condition::Prone, "trip"));
        status.add_condition(
            ActiveCondition::new(Condition::Paralyzed, "Hold Person").with_duration(2),
        );
        assert!(status.is_incapacitated());

        assert!(status.tick_conditions().is_empty());
        assert_eq!(status.tick_conditions(), vec![Condition::Paralyzed]);
        assert!(!status.is_incapacitated());
        assert!(status.has_condition(Condition::Prone));
    }

    #[test]
    fn test_remove_from_source() {
        let mut status = CombatStatus::default();
        status.add_condition(ActiveCondition::new(Condition::Paralyzed, "Hold Person"));
        status.add_condition(ActiveCondition::new(Condition::Poisoned, "dagger"));
        assert_eq!(
            status.remove_from_source("Hold Person"),
            vec![Condition::Paralyzed]
        );
        assert!(status.has_condition(Condition::Poisoned));
    }
}
