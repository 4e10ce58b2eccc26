//! Spell database and spellcasting mechanics.
//!
//! A [`SpellDefinition`] is immutable data checked once at construction.
//! Casting is a pure resolver over two [`Combatant`]s and a [`DiceRoller`];
//! slots, concentration and buff expiry belong to the caller.

use crate::abilities::Ability;
use crate::class_data::CharacterClass;
use crate::combatant::{ActiveCondition, Combatant, Condition, DamageType};
use crate::dice::{DiceExpression, DiceRoller};
use crate::error::RulesError;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Schools of magic in D&D.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpellSchool {
    Abjuration,
    Conjuration,
    Divination,
    Enchantment,
    Evocation,
    Illusion,
    Necromancy,
    Transmutation,
}

impl SpellSchool {
    pub fn name(&self) -> &'static str {
        match self {
            SpellSchool::Abjuration => "Abjuration",
            SpellSchool::Conjuration => "Conjuration",
            SpellSchool::Divination => "Divination",
            SpellSchool::Enchantment => "Enchantment",
            SpellSchool::Evocation => "Evocation",
            SpellSchool::Illusion => "Illusion",
            SpellSchool::Necromancy => "Necromancy",
            SpellSchool::Transmutation => "Transmutation",
        }
    }
}

/// How long it takes to cast a spell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CastingTime {
    Action,
    BonusAction,
    Reaction(String), // Trigger condition
    Minutes(u32),
}

impl CastingTime {
    pub fn description(&self) -> String {
        match self {
            CastingTime::Action => "1 action".to_string(),
            CastingTime::BonusAction => "1 bonus action".to_string(),
            CastingTime::Reaction(trigger) => format!("1 reaction, {}", trigger),
            CastingTime::Minutes(m) => format!("{} minute{}", m, if *m == 1 { "" } else { "s" }),
        }
    }
}

/// Range of a spell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpellRange {
    Self_,
    Touch,
    Feet(u32),
    SelfRadius(u32), // Self with radius (e.g., Thunderwave)
    SelfCone(u32),   // Self with cone (e.g., Burning Hands)
}

impl SpellRange {
    pub fn description(&self) -> String {
        match self {
            SpellRange::Self_ => "Self".to_string(),
            SpellRange::Touch => "Touch".to_string(),
            SpellRange::Feet(f) => format!("{} feet", f),
            SpellRange::SelfRadius(r) => format!("Self ({}-foot radius)", r),
            SpellRange::SelfCone(c) => format!("Self ({}-foot cone)", c),
        }
    }
}

/// Spell components required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Components {
    pub verbal: bool,
    pub somatic: bool,
    pub material: Option<String>,
}

impl Components {
    pub fn v() -> Self {
        Self {
            verbal: true,
            somatic: false,
            material: None,
        }
    }

    pub fn vs() -> Self {
        Self {
            verbal: true,
            somatic: true,
            material: None,
        }
    }

    pub fn vsm(material: &str) -> Self {
        Self {
            verbal: true,
            somatic: true,
            material: Some(material.to_string()),
        }
    }

    pub fn description(&self) -> String {
        let mut parts = Vec::new();
        if self.verbal {
            parts.push("V");
        }
        if self.somatic {
            parts.push("S");
        }
        if self.material.is_some() {
            parts.push("M");
        }
        let base = parts.join(", ");
        if let Some(ref mat) = self.material {
            format!("{} ({})", base, mat)
        } else {
            base
        }
    }
}

/// Duration of a spell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpellDuration {
    Instantaneous,
    Rounds(u32),
    Minutes(u32),
    Hours(u32),
}

impl SpellDuration {
    pub fn description(&self) -> String {
        match self {
            SpellDuration::Instantaneous => "Instantaneous".to_string(),
            SpellDuration::Rounds(r) => format!("{} round{}", r, if *r == 1 { "" } else { "s" }),
            SpellDuration::Minutes(m) => format!("{} minute{}", m, if *m == 1 { "" } else { "s" }),
            SpellDuration::Hours(h) => format!("{} hour{}", h, if *h == 1 { "" } else { "s" }),
        }
    }

    /// Length in combat rounds (6 seconds each).
    pub fn rounds(&self) -> Option<u32> {
        match self {
            SpellDuration::Instantaneous => None,
            SpellDuration::Rounds(r) => Some(*r),
            SpellDuration::Minutes(m) => Some(m * 10),
            SpellDuration::Hours(h) => Some(h * 600),
        }
    }
}

/// Type of spell attack (if any).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpellAttackType {
    Melee,
    Ranged,
}

/// What a successful saving throw does to damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveEffect {
    Half,
    NoDamage,
}

/// How spell damage scales with level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DamageScaling {
    /// No scaling
    None,
    /// Cantrip scaling: more dice at caster levels 5, 11, 17
    CantripTiers,
    /// Extra dice per slot level above the spell's level
    PerSlotLevel(DiceExpression),
}

/// What a spell does once it lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpellKind {
    /// Damage gated by an attack roll or a saving throw.
    Damage {
        dice: DiceExpression,
        damage_type: DamageType,
        scaling: DamageScaling,
    },
    /// Darts that hit automatically, each rolled separately.
    Darts {
        dice: DiceExpression,
        damage_type: DamageType,
        count: u32,
        extra_per_slot: u32,
    },
    /// Restores hit points, adding the caster's spellcasting modifier.
    Healing {
        dice: DiceExpression,
        per_slot: Option<DiceExpression>,
    },
    TemporaryHitPoints {
        dice: DiceExpression,
        per_slot: Option<DiceExpression>,
    },
    /// A bonus to AC until the start of the caster's next turn.
    ArmorClassBonus { bonus: i32 },
    /// A condition imposed on a failed save.
    Condition { condition: Condition },
}

/// Everything needed to define a spell. Checked by [`SpellDefinition::new`].
#[derive(Debug, Clone)]
pub struct SpellConfig {
    pub name: String,
    pub level: u8, // 0 for cantrips
    pub school: SpellSchool,
    pub casting_time: CastingTime,
    pub range: SpellRange,
    pub components: Components,
    pub duration: SpellDuration,
    pub concentration: bool,
    pub ritual: bool,
    pub description: String,
    pub kind: SpellKind,
    pub attack: Option<SpellAttackType>,
    pub save: Option<Ability>,
    pub on_save: SaveEffect,
    pub can_target_self: bool,
    pub can_target_others: bool,
    pub classes: Vec<CharacterClass>,
}

impl SpellConfig {
    /// An instantaneous action spell at 60 feet that targets others.
    pub fn new(name: impl Into<String>, level: u8, school: SpellSchool, kind: SpellKind) -> Self {
        Self {
            name: name.into(),
            level,
            school,
            casting_time: CastingTime::Action,
            range: SpellRange::Feet(60),
            components: Components::vs(),
            duration: SpellDuration::Instantaneous,
            concentration: false,
            ritual: false,
            description: String::new(),
            kind,
            attack: None,
            save: None,
            on_save: SaveEffect::NoDamage,
            can_target_self: false,
            can_target_others: true,
            classes: Vec::new(),
        }
    }
}

/// Complete, validated spell definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpellDefinition {
    id: String,
    name: String,
    level: u8,
    school: SpellSchool,
    casting_time: CastingTime,
    range: SpellRange,
    components: Components,
    duration: SpellDuration,
    concentration: bool,
    ritual: bool,
    description: String,
    kind: SpellKind,
    attack: Option<SpellAttackType>,
    save: Option<Ability>,
    on_save: SaveEffect,
    can_target_self: bool,
    can_target_others: bool,
    classes: Vec<CharacterClass>,
}

impl SpellDefinition {
    pub fn new(config: SpellConfig) -> Result<Self, RulesError> {
        let name = config.name.trim().to_string();
        if name.is_empty() {
            return Err(RulesError::invalid_argument("spell name is required"));
        }
        if config.level > 9 {
            return Err(RulesError::invalid_argument(format!(
                "{name}: spell level {} is above 9",
                config.level
            )));
        }
        if config.attack.is_some() && config.save.is_some() {
            return Err(RulesError::invalid_argument(format!(
                "{name}: a spell uses an attack roll or a saving throw, not both"
            )));
        }
        if !config.can_target_self && !config.can_target_others {
            return Err(RulesError::invalid_argument(format!(
                "{name}: spell has no eligible targets"
            )));
        }
        if config.concentration && config.duration == SpellDuration::Instantaneous {
            return Err(RulesError::invalid_argument(format!(
                "{name}: concentration needs a duration"
            )));
        }
        if config
            .components
            .material
            .as_ref()
            .is_some_and(|m| m.trim().is_empty())
        {
            return Err(RulesError::invalid_argument(format!(
                "{name}: material component needs a description"
            )));
        }
        match &config.kind {
            SpellKind::Damage { scaling, .. } => {
                if config.attack.is_none() && config.save.is_none() {
                    return Err(RulesError::invalid_argument(format!(
                        "{name}: damage needs an attack roll or a saving throw"
                    )));
                }
                if *scaling == DamageScaling::CantripTiers && config.level != 0 {
                    return Err(RulesError::invalid_argument(format!(
                        "{name}: only cantrips scale with caster level"
                    )));
                }
            }
            SpellKind::Condition { .. } if config.save.is_none() => {
                return Err(RulesError::invalid_argument(format!(
                    "{name}: a condition needs a saving throw"
                )));
            }
            SpellKind::ArmorClassBonus { .. } if config.can_target_others => {
                return Err(RulesError::invalid_argument(format!(
                    "{name}: armor class bonuses only target the caster"
                )));
            }
            _ => {}
        }

        Ok(Self {
            id: spell_id(&name),
            name,
            level: config.level,
            school: config.school,
            casting_time: config.casting_time,
            range: config.range,
            components: config.components,
            duration: config.duration,
            concentration: config.concentration,
            ritual: config.ritual,
            description: config.description,
            kind: config.kind,
            attack: config.attack,
            save: config.save,
            on_save: config.on_save,
            can_target_self: config.can_target_self,
            can_target_others: config.can_target_others,
            classes: config.classes,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    /// Check if this is a cantrip.
    pub fn is_cantrip(&self) -> bool {
        self.level == 0
    }

    pub fn school(&self) -> SpellSchool {
        self.school
    }

    pub fn casting_time(&self) -> &CastingTime {
        &self.casting_time
    }

    pub fn range(&self) -> &SpellRange {
        &self.range
    }

    pub fn components(&self) -> &Components {
        &self.components
    }

    pub fn duration(&self) -> &SpellDuration {
        &self.duration
    }

    pub fn concentration(&self) -> bool {
        self.concentration
    }

    pub fn ritual(&self) -> bool {
        self.ritual
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> &SpellKind {
        &self.kind
    }

    pub fn requires_attack_roll(&self) -> bool {
        self.attack.is_some()
    }

    pub fn saving_throw(&self) -> Option<Ability> {
        self.save
    }

    pub fn can_target_self(&self) -> bool {
        self.can_target_self
    }

    pub fn can_target_others(&self) -> bool {
        self.can_target_others
    }

    pub fn classes(&self) -> &[CharacterClass] {
        &self.classes
    }

    /// Source tag for conditions this spell imposes.
    pub fn condition_source(&self, caster_name: &str) -> String {
        format!("{} ({})", self.name, caster_name)
    }

    /// Damage dice for a cast at `caster_level` using a `slot_level` slot.
    pub fn damage_dice(&self, caster_level: u8, slot_level: u8) -> Option<DiceExpression> {
        let SpellKind::Damage { dice, scaling, .. } = &self.kind else {
            return None;
        };
        Some(match scaling {
            DamageScaling::None => dice.clone(),
            DamageScaling::CantripTiers => dice.scaled(cantrip_dice_multiplier(caster_level)),
            DamageScaling::PerSlotLevel(extra) => self.upcast(dice, Some(extra), slot_level),
        })
    }

    fn upcast(
        &self,
        base: &DiceExpression,
        per_slot: Option<&DiceExpression>,
        slot_level: u8,
    ) -> DiceExpression {
        let above = slot_level.saturating_sub(self.level) as u32;
        match per_slot {
            Some(extra) if above > 0 => base.plus(&extra.repeated(above)),
            _ => base.clone(),
        }
    }

    /// Cast at the spell's own level.
    pub fn cast(
        &self,
        caster: &mut dyn Combatant,
        target: Option<&mut dyn Combatant>,
        dice: &mut dyn DiceRoller,
    ) -> SpellResult {
        self.cast_at_level(self.level, caster, target, dice)
    }

    /// Cast using a slot of `slot_level`.
    ///
    /// `target: None` means the caster targets itself. Slots are not spent
    /// here.
    pub fn cast_at_level(
        &self,
        slot_level: u8,
        caster: &mut dyn Combatant,
        target: Option<&mut dyn Combatant>,
        dice: &mut dyn DiceRoller,
    ) -> SpellResult {
        let slot_level = if self.is_cantrip() { 0 } else { slot_level };
        if slot_level > 9 || (!self.is_cantrip() && slot_level < self.level) {
            return SpellResult::error(
                self,
                slot_level,
                format!(
                    "Cannot cast {} using a level {} slot - requires a slot of level {} to 9.",
                    self.name, slot_level, self.level
                ),
            );
        }

        let caster_name = caster.name().to_string();
        let Some(stats) = caster.caster_stats() else {
            return SpellResult::error(
                self,
                slot_level,
                format!("{caster_name} doesn't have spellcasting ability!"),
            );
        };

        let target: &mut dyn Combatant = match target {
            Some(_) if !self.can_target_others => {
                return SpellResult::error(
                    self,
                    slot_level,
                    format!("{} can only target the caster.", self.name),
                );
            }
            Some(t) => t,
            None if self.can_target_self => caster,
            None => {
                return SpellResult::error(
                    self,
                    slot_level,
                    format!("{} requires a target.", self.name),
                );
            }
        };
        if !target.is_alive() {
            return SpellResult::error(
                self,
                slot_level,
                format!("{} is unconscious and cannot be targeted.", target.name()),
            );
        }

        let target_name = target.name().to_string();
        let mut result = SpellResult::new(self, slot_level);
        let mut parts = vec![if slot_level > self.level {
            format!(
                "{caster_name} casts {} at {target_name} (upcast at level {slot_level}).",
                self.name
            )
        } else {
            format!("{caster_name} casts {} at {target_name}.", self.name)
        }];

        match &self.kind {
            SpellKind::Damage { damage_type, .. } => {
                let damage_dice = self
                    .damage_dice(stats.caster_level, slot_level)
                    .unwrap_or_else(|| DiceExpression::flat(0));
                result.damage_type = Some(*damage_type);

                if self.attack.is_some() {
                    let roll = roll_attack(stats.spell_attack_bonus, target.armor_class(), dice);
                    result.attack_roll = Some(roll.total);
                    result.natural_roll = Some(roll.natural);
                    result.critical = roll.critical;
                    parts.push(format!(
                        "Spell attack: {} vs AC {}.",
                        roll.total,
                        target.armor_class()
                    ));

                    if roll.hit {
                        let damage = damage_dice.roll_with(dice);
                        let amount = if roll.critical {
                            damage.critical_total()
                        } else {
                            damage.total
                        };
                        let dealt = target.take_typed_damage(amount.max(0), *damage_type, true);
                        result.outcome = SpellOutcome::Hit;
                        result.damage = dealt.damage_taken;
                        parts.push(format!(
                            "{}Hit! {} {} damage.",
                            if roll.critical { "Critical " } else { "" },
                            dealt.damage_taken,
                            damage_type
                        ));
                    } else {
                        result.outcome = SpellOutcome::Miss;
                        parts.push("Miss!".to_string());
                    }
                } else if let Some(ability) = self.save {
                    let save = roll_saving_throw(&*target, ability, stats.spell_save_dc, dice);
                    result.save_roll = Some(save.total);
                    result.save_dc = Some(stats.spell_save_dc);
                    parts.push(format!(
                        "DC {} {} save: {}.",
                        stats.spell_save_dc,
                        ability.name(),
                        save.total
                    ));

                    let rolled = match (save.success, self.on_save) {
                        (true, SaveEffect::NoDamage) => 0,
                        _ => damage_dice.roll_with(dice).total.max(0),
                    };
                    let amount = if save.success { rolled / 2 } else { rolled };
                    let dealt = if amount > 0 {
                        target.take_typed_damage(amount, *damage_type, true).damage_taken
                    } else {
                        0
                    };
                    result.damage = dealt;
                    if save.success {
                        result.outcome = SpellOutcome::SaveSucceeded;
                        parts.push(format!("Saved! {dealt} {damage_type} damage."));
                    } else {
                        result.outcome = SpellOutcome::SaveFailed;
                        parts.push(format!("Failed! {dealt} {damage_type} damage."));
                    }
                }
            }
            SpellKind::Darts {
                dice: dart,
                damage_type,
                count,
                extra_per_slot,
            } => {
                let darts = count + extra_per_slot * slot_level.saturating_sub(self.level) as u32;
                let mut total = 0;
                for _ in 0..darts {
                    let roll = dart.roll_with(dice);
                    total += target
                        .take_typed_damage(roll.total.max(0), *damage_type, true)
                        .damage_taken;
                }
                result.outcome = SpellOutcome::Hit;
                result.damage = total;
                result.damage_type = Some(*damage_type);
                parts.push(format!("{darts} darts strike for {total} {damage_type} damage."));
            }
            SpellKind::Healing { dice: base, per_slot } => {
                let roll = self
                    .upcast(base, per_slot.as_ref(), slot_level)
                    .with_modifier(stats.ability_modifier as i32)
                    .roll_with(dice);
                let healed = target.heal(roll.total.max(0));
                result.outcome = SpellOutcome::Healing;
                result.healing = healed;
                parts.push(format!("{target_name} regains {healed} hit points."));
            }
            SpellKind::TemporaryHitPoints { dice: base, per_slot } => {
                let amount = self
                    .upcast(base, per_slot.as_ref(), slot_level)
                    .roll_with(dice)
                    .total
                    .max(0);
                target.add_temp_hp(amount);
                result.outcome = SpellOutcome::Buff;
                result.temporary_hp = amount;
                parts.push(format!("{target_name} gains {amount} temporary hit points."));
            }
            SpellKind::ArmorClassBonus { bonus } => {
                let status = target.status_mut();
                status.temporary_ac_bonus = status.temporary_ac_bonus.max(*bonus);
                result.outcome = SpellOutcome::Buff;
                result.ac_bonus = *bonus;
                parts.push(format!(
                    "+{bonus} AC until the start of {caster_name}'s next turn."
                ));
            }
            SpellKind::Condition { condition } => {
                // Validated: conditions always come with a save.
                let ability = self.save.unwrap_or(Ability::Wisdom);
                let save = roll_saving_throw(&*target, ability, stats.spell_save_dc, dice);
                result.save_roll = Some(save.total);
                result.save_dc = Some(stats.spell_save_dc);
                parts.push(format!(
                    "DC {} {} save: {}.",
                    stats.spell_save_dc,
                    ability.name(),
                    save.total
                ));

                if save.success {
                    result.outcome = SpellOutcome::SaveSucceeded;
                    parts.push(format!("{target_name} resists."));
                } else {
                    let mut active =
                        ActiveCondition::new(*condition, self.condition_source(&caster_name));
                    if let Some(rounds) = self.duration.rounds() {
                        active = active.with_duration(rounds);
                    }
                    target.add_condition(active);
                    result.outcome = SpellOutcome::Condition;
                    result.condition = Some(*condition);
                    parts.push(format!("{target_name} is {}!", condition.name().to_lowercase()));
                }
            }
        }

        result.message = parts.join(" ");
        tracing::debug!(
            spell = %self.name,
            caster = %caster_name,
            target = %target_name,
            outcome = ?result.outcome,
            damage = result.damage,
            healing = result.healing,
            "Spell resolved"
        );
        result
    }
}

fn spell_id(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Damage dice multiplier for cantrips at a caster level.
pub fn cantrip_dice_multiplier(caster_level: u8) -> u32 {
    match caster_level {
        0..=4 => 1,
        5..=10 => 2,
        11..=16 => 3,
        _ => 4,
    }
}

// ============================================================================
// Shared resolution
// ============================================================================

/// An attack roll against an armor class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackRoll {
    pub natural: u32,
    pub total: i32,
    pub hit: bool,
    pub critical: bool,
}

/// Natural 1 always misses; natural 20 always hits and is a critical.
pub fn roll_attack(attack_bonus: i32, target_ac: i32, dice: &mut dyn DiceRoller) -> AttackRoll {
    let natural = dice.d20();
    let total = natural as i32 + attack_bonus;
    let (hit, critical) = match natural {
        1 => (false, false),
        20 => (true, true),
        _ => (total >= target_ac, false),
    };
    tracing::debug!(natural, total, target_ac, hit, critical, "Attack roll");
    AttackRoll {
        natural,
        total,
        hit,
        critical,
    }
}

/// A saving throw against a DC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavingThrow {
    pub natural: u32,
    pub total: i32,
    pub success: bool,
}

/// `d20 + save modifier >= dc`.
pub fn roll_saving_throw(
    target: &dyn Combatant,
    ability: Ability,
    dc: i32,
    dice: &mut dyn DiceRoller,
) -> SavingThrow {
    let natural = dice.d20();
    let total = natural as i32 + target.saving_throw_modifier(ability) as i32;
    let success = total >= dc;
    tracing::debug!(
        target_name = %target.name(),
        ability = %ability,
        natural,
        total,
        dc,
        success,
        "Saving throw"
    );
    SavingThrow {
        natural,
        total,
        success,
    }
}

// ============================================================================
// Results
// ============================================================================

/// Tagged outcome of a cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpellOutcome {
    Success,
    Hit,
    Miss,
    SaveFailed,
    SaveSucceeded,
    Healing,
    Buff,
    Condition,
    Error,
}

/// Structured result of a cast, for display and for the combat loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpellResult {
    pub spell: String,
    pub outcome: SpellOutcome,
    pub message: String,
    pub slot_level: u8,
    pub attack_roll: Option<i32>,
    pub natural_roll: Option<u32>,
    pub critical: bool,
    pub save_roll: Option<i32>,
    pub save_dc: Option<i32>,
    pub damage: i32,
    pub damage_type: Option<DamageType>,
    pub healing: i32,
    pub temporary_hp: i32,
    pub ac_bonus: i32,
    pub condition: Option<Condition>,
}

impl SpellResult {
    fn new(spell: &SpellDefinition, slot_level: u8) -> Self {
        Self {
            spell: spell.name.clone(),
            outcome: SpellOutcome::Success,
            message: String::new(),
            slot_level,
            attack_roll: None,
            natural_roll: None,
            critical: false,
            save_roll: None,
            save_dc: None,
            damage: 0,
            damage_type: None,
            healing: 0,
            temporary_hp: 0,
            ac_bonus: 0,
            condition: None,
        }
    }

    fn error(spell: &SpellDefinition, slot_level: u8, message: String) -> Self {
        tracing::warn!(spell = %spell.name, "{message}");
        Self {
            outcome: SpellOutcome::Error,
            message,
            ..Self::new(spell, slot_level)
        }
    }

    pub fn is_error(&self) -> bool {
        self.outcome == SpellOutcome::Error
    }
}

// ============================================================================
// Spell Database
// ============================================================================

/// Global spell database, keyed by lowercase name.
static SPELL_DATABASE: LazyLock<HashMap<String, SpellDefinition>> =
    LazyLock::new(build_spell_database);

/// Look up a spell by name (case-insensitive).
pub fn get_spell(name: &str) -> Option<&'static SpellDefinition> {
    SPELL_DATABASE.get(&name.trim().to_lowercase())
}

/// All spells, ordered by level then name.
pub fn all_spells() -> Vec<&'static SpellDefinition> {
    let mut spells: Vec<_> = SPELL_DATABASE.values().collect();
    spells.sort_by(|a, b| a.level.cmp(&b.level).then_with(|| a.name.cmp(&b.name)));
    spells
}

/// Get all spells of a specific level.
pub fn spells_by_level(level: u8) -> impl Iterator<Item = &'static SpellDefinition> {
    SPELL_DATABASE.values().filter(move |s| s.level == level)
}

/// Get all spells available to a class.
pub fn spells_for_class(class: CharacterClass) -> impl Iterator<Item = &'static SpellDefinition> {
    SPELL_DATABASE
        .values()
        .filter(move |s| s.classes.contains(&class))
}

fn build_spell_database() -> HashMap<String, SpellDefinition> {
    let mut db = HashMap::new();
    for entry in standard_spells() {
        match entry {
            Ok(spell) => {
                db.insert(spell.name.to_lowercase(), spell);
            }
            Err(e) => tracing::error!("Invalid spell definition: {e}"),
        }
    }
    db
}

fn define(
    config: impl FnOnce() -> Result<SpellConfig, RulesError>,
) -> Result<SpellDefinition, RulesError> {
    SpellDefinition::new(config()?)
}

fn standard_spells() -> Vec<Result<SpellDefinition, RulesError>> {
    use CharacterClass::*;
    use DamageType::*;

    vec![
        // ====================================================================
        // CANTRIPS (Level 0)
        // ====================================================================
        define(|| {
            Ok(SpellConfig {
                range: SpellRange::Feet(120),
                attack: Some(SpellAttackType::Ranged),
                description: "You hurl a mote of fire at a creature or object within range. Make a ranged spell attack. On a hit, the target takes 1d10 fire damage.".to_string(),
                classes: vec![Sorcerer, Wizard],
                ..SpellConfig::new(
                    "Fire Bolt",
                    0,
                    SpellSchool::Evocation,
                    SpellKind::Damage {
                        dice: DiceExpression::parse("1d10")?,
                        damage_type: Fire,
                        scaling: DamageScaling::CantripTiers,
                    },
                )
            })
        }),
        define(|| {
            Ok(SpellConfig {
                range: SpellRange::Feet(120),
                attack: Some(SpellAttackType::Ranged),
                description: "A beam of crackling energy streaks toward a creature within range. Make a ranged spell attack. On a hit, the target takes 1d10 force damage.".to_string(),
                classes: vec![Warlock],
                ..SpellConfig::new(
                    "Eldritch Blast",
                    0,
                    SpellSchool::Evocation,
                    SpellKind::Damage {
                        dice: DiceExpression::parse("1d10")?,
                        damage_type: Force,
                        scaling: DamageScaling::CantripTiers,
                    },
                )
            })
        }),
        define(|| {
            Ok(SpellConfig {
                save: Some(Ability::Dexterity),
                on_save: SaveEffect::NoDamage,
                description: "Flame-like radiance descends on a creature that you can see within range. The target must succeed on a Dexterity saving throw or take 1d8 radiant damage.".to_string(),
                classes: vec![Cleric],
                ..SpellConfig::new(
                    "Sacred Flame",
                    0,
                    SpellSchool::Evocation,
                    SpellKind::Damage {
                        dice: DiceExpression::parse("1d8")?,
                        damage_type: Radiant,
                        scaling: DamageScaling::CantripTiers,
                    },
                )
            })
        }),
        define(|| {
            Ok(SpellConfig {
                attack: Some(SpellAttackType::Ranged),
                description: "A frigid beam of blue-white light streaks toward a creature within range. Make a ranged spell attack. On a hit, it takes 1d8 cold damage.".to_string(),
                classes: vec![Sorcerer, Wizard],
                ..SpellConfig::new(
                    "Ray of Frost",
                    0,
                    SpellSchool::Evocation,
                    SpellKind::Damage {
                        dice: DiceExpression::parse("1d8")?,
                        damage_type: Cold,
                        scaling: DamageScaling::CantripTiers,
                    },
                )
            })
        }),
        // ====================================================================
        // 1ST LEVEL
        // ====================================================================
        define(|| {
            Ok(SpellConfig {
                range: SpellRange::Feet(120),
                description: "You create three glowing darts of magical force. Each dart hits a creature of your choice, dealing 1d4+1 force damage. One more dart for each slot level above 1st.".to_string(),
                classes: vec![Sorcerer, Wizard],
                ..SpellConfig::new(
                    "Magic Missile",
                    1,
                    SpellSchool::Evocation,
                    SpellKind::Darts {
                        dice: DiceExpression::parse("1d4+1")?,
                        damage_type: Force,
                        count: 3,
                        extra_per_slot: 1,
                    },
                )
            })
        }),
        define(|| {
            Ok(SpellConfig {
                range: SpellRange::SelfCone(15),
                save: Some(Ability::Dexterity),
                on_save: SaveEffect::Half,
                description: "A thin sheet of flames shoots forth from your outstretched fingertips. Each creature in a 15-foot cone takes 3d6 fire damage on a failed Dexterity save, or half as much on a success.".to_string(),
                classes: vec![Sorcerer, Wizard],
                ..SpellConfig::new(
                    "Burning Hands",
                    1,
                    SpellSchool::Evocation,
                    SpellKind::Damage {
                        dice: DiceExpression::parse("3d6")?,
                        damage_type: Fire,
                        scaling: DamageScaling::PerSlotLevel(DiceExpression::parse("1d6")?),
                    },
                )
            })
        }),
        define(|| {
            Ok(SpellConfig {
                range: SpellRange::Feet(120),
                duration: SpellDuration::Rounds(1),
                attack: Some(SpellAttackType::Ranged),
                description: "A flash of light streaks toward a creature of your choice within range. Make a ranged spell attack. On a hit, the target takes 4d6 radiant damage.".to_string(),
                classes: vec![Cleric],
                ..SpellConfig::new(
                    "Guiding Bolt",
                    1,
                    SpellSchool::Evocation,
                    SpellKind::Damage {
                        dice: DiceExpression::parse("4d6")?,
                        damage_type: Radiant,
                        scaling: DamageScaling::PerSlotLevel(DiceExpression::parse("1d6")?),
                    },
                )
            })
        }),
        define(|| {
            Ok(SpellConfig {
                range: SpellRange::SelfRadius(15),
                save: Some(Ability::Constitution),
                on_save: SaveEffect::Half,
                description: "A wave of thunderous force sweeps out from you. Each creature in a 15-foot cube takes 2d8 thunder damage on a failed Constitution save, or half as much on a success.".to_string(),
                classes: vec![Bard, Druid, Sorcerer, Wizard],
                ..SpellConfig::new(
                    "Thunderwave",
                    1,
                    SpellSchool::Evocation,
                    SpellKind::Damage {
                        dice: DiceExpression::parse("2d8")?,
                        damage_type: Thunder,
                        scaling: DamageScaling::PerSlotLevel(DiceExpression::parse("1d8")?),
                    },
                )
            })
        }),
        define(|| {
            Ok(SpellConfig {
                range: SpellRange::Touch,
                can_target_self: true,
                description: "A creature you touch regains a number of hit points equal to 1d8 + your spellcasting ability modifier.".to_string(),
                classes: vec![Bard, Cleric, Druid, Paladin, Ranger],
                ..SpellConfig::new(
                    "Cure Wounds",
                    1,
                    SpellSchool::Evocation,
                    SpellKind::Healing {
                        dice: DiceExpression::parse("1d8")?,
                        per_slot: Some(DiceExpression::parse("1d8")?),
                    },
                )
            })
        }),
        define(|| {
            Ok(SpellConfig {
                casting_time: CastingTime::BonusAction,
                components: Components::v(),
                can_target_self: true,
                description: "A creature of your choice that you can see within range regains hit points equal to 1d4 + your spellcasting ability modifier.".to_string(),
                classes: vec![Bard, Cleric, Druid],
                ..SpellConfig::new(
                    "Healing Word",
                    1,
                    SpellSchool::Evocation,
                    SpellKind::Healing {
                        dice: DiceExpression::parse("1d4")?,
                        per_slot: Some(DiceExpression::parse("1d4")?),
                    },
                )
            })
        }),
        define(|| {
            Ok(SpellConfig {
                casting_time: CastingTime::Reaction(
                    "which you take when you are hit by an attack".to_string(),
                ),
                range: SpellRange::Self_,
                duration: SpellDuration::Rounds(1),
                can_target_self: true,
                can_target_others: false,
                description: "An invisible barrier of magical force appears and protects you. Until the start of your next turn, you have a +5 bonus to AC.".to_string(),
                classes: vec![Sorcerer, Wizard],
                ..SpellConfig::new(
                    "Shield",
                    1,
                    SpellSchool::Abjuration,
                    SpellKind::ArmorClassBonus { bonus: 5 },
                )
            })
        }),
        define(|| {
            Ok(SpellConfig {
                range: SpellRange::Self_,
                components: Components::vsm("a small amount of alcohol or distilled spirits"),
                duration: SpellDuration::Hours(1),
                can_target_self: true,
                can_target_others: false,
                description: "Bolstering yourself with a necromantic facsimile of life, you gain 1d4 + 4 temporary hit points.".to_string(),
                classes: vec![Sorcerer, Wizard],
                ..SpellConfig::new(
                    "False Life",
                    1,
                    SpellSchool::Necromancy,
                    SpellKind::TemporaryHitPoints {
                        dice: DiceExpression::parse("1d4+4")?,
                        per_slot: Some(DiceExpression::flat(5)),
                    },
                )
            })
        }),
        define(|| {
            Ok(SpellConfig {
                range: SpellRange::Self_,
                components: Components::vsm("a cup of water"),
                duration: SpellDuration::Hours(1),
                can_target_self: true,
                can_target_others: false,
                description: "A protective magical force surrounds you, manifesting as a spectral frost. You gain 5 temporary hit points.".to_string(),
                classes: vec![Warlock],
                ..SpellConfig::new(
                    "Armor of Agathys",
                    1,
                    SpellSchool::Abjuration,
                    SpellKind::TemporaryHitPoints {
                        dice: DiceExpression::flat(5),
                        per_slot: Some(DiceExpression::flat(5)),
                    },
                )
            })
        }),
        // ====================================================================
        // 2ND LEVEL
        // ====================================================================
        define(|| {
            Ok(SpellConfig {
                components: Components::vsm("a small, straight piece of iron"),
                duration: SpellDuration::Minutes(1),
                concentration: true,
                save: Some(Ability::Wisdom),
                description: "Choose a humanoid that you can see within range. The target must succeed on a Wisdom saving throw or be paralyzed for the duration.".to_string(),
                classes: vec![Bard, Cleric, Druid, Sorcerer, Warlock, Wizard],
                ..SpellConfig::new(
                    "Hold Person",
                    2,
                    SpellSchool::Enchantment,
                    SpellKind::Condition {
                        condition: Condition::Paralyzed,
                    },
                )
            })
        }),
        // ====================================================================
        // 3RD LEVEL
        // ====================================================================
        define(|| {
            Ok(SpellConfig {
                range: SpellRange::Feet(150),
                components: Components::vsm("a tiny ball of bat guano and sulfur"),
                save: Some(Ability::Dexterity),
                on_save: SaveEffect::Half,
                description: "A bright streak flashes from your pointing finger and blossoms into an explosion of flame. A target takes 8d6 fire damage on a failed Dexterity save, or half as much on a success.".to_string(),
                classes: vec![Sorcerer, Wizard],
                ..SpellConfig::new(
                    "Fireball",
                    3,
                    SpellSchool::Evocation,
                    SpellKind::Damage {
                        dice: DiceExpression::parse("8d6")?,
                        damage_type: Fire,
                        scaling: DamageScaling::PerSlotLevel(DiceExpression::parse("1d6")?),
                    },
                )
            })
        }),
    ]
}
