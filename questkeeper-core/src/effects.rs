//! Named, chargeable effects carried by characters, monsters and items.
//!
//! An [`Effect`] couples a usage policy with a small [`EffectKind`]. Using an
//! effect is two steps: [`Effect::activate`] runs the shared charge check and
//! hands back an [`EffectActivation`], which is then applied to whoever used
//! it. The split keeps the borrow of the owner's effect list separate from
//! the borrow of the owner.

use crate::combatant::{Combatant, DamageType};
use crate::dice::{DiceExpression, DiceRoller};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Charges value meaning "never runs out".
pub const UNLIMITED_CHARGES: i32 = -1;

/// How often an effect can be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UsagePolicy {
    /// Refilled by the daily (dawn) trigger.
    Daily,
    /// Refilled by a long rest.
    LongRest,
    /// Fixed pool, refilled by the daily trigger or an explicit recharge.
    Charges,
    /// Single use; the item is spent afterwards.
    Consumable,
    Unlimited,
    /// Always on; activation only describes it.
    Passive,
}

impl UsagePolicy {
    /// Whether using the effect spends a charge.
    pub fn consumes_charges(&self) -> bool {
        !matches!(self, UsagePolicy::Unlimited | UsagePolicy::Passive)
    }
}

/// External signals that refill charges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetTrigger {
    LongRest,
    Daily,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EffectError {
    #[error("{0} has no charges left")]
    OutOfCharges(String),

    #[error("no effect named '{0}'")]
    NotFound(String),
}

/// How strongly a creature reacts to a damage type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResistanceLevel {
    Vulnerability,
    Resistance,
    Immunity,
}

impl ResistanceLevel {
    pub fn apply(&self, incoming: i32) -> i32 {
        match self {
            ResistanceLevel::Vulnerability => incoming * 2,
            ResistanceLevel::Resistance => incoming / 2,
            ResistanceLevel::Immunity => 0,
        }
    }
}

/// Which damage a resistance covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResistedDamage {
    Type(DamageType),
    /// Bludgeoning, piercing and slashing from nonmagical sources.
    NonmagicalPhysical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResistanceEffect {
    pub damage: ResistedDamage,
    pub level: ResistanceLevel,
    /// Ignore magical damage entirely.
    #[serde(default)]
    pub only_nonmagical: bool,
}

impl ResistanceEffect {
    pub fn new(damage_type: DamageType, level: ResistanceLevel) -> Self {
        Self {
            damage: ResistedDamage::Type(damage_type),
            level,
            only_nonmagical: false,
        }
    }

    pub fn nonmagical_physical(level: ResistanceLevel) -> Self {
        Self {
            damage: ResistedDamage::NonmagicalPhysical,
            level,
            only_nonmagical: true,
        }
    }

    pub fn applies_to(&self, damage_type: DamageType, magical: bool) -> bool {
        match self.damage {
            ResistedDamage::NonmagicalPhysical => damage_type.is_physical() && !magical,
            ResistedDamage::Type(t) => t == damage_type && !(self.only_nonmagical && magical),
        }
    }

    pub fn calculate_modified_damage(
        &self,
        incoming: i32,
        damage_type: DamageType,
        magical: bool,
    ) -> i32 {
        if self.applies_to(damage_type, magical) {
            self.level.apply(incoming)
        } else {
            incoming
        }
    }
}

/// Damage after every applicable resistance.
///
/// Immunity wins outright. Otherwise resistance halves and vulnerability
/// doubles, each at most once however many effects grant it.
pub fn combined_damage<'a>(
    incoming: i32,
    damage_type: DamageType,
    magical: bool,
    resistances: impl IntoIterator<Item = &'a ResistanceEffect>,
) -> i32 {
    let mut resistant = false;
    let mut vulnerable = false;
    for r in resistances {
        if !r.applies_to(damage_type, magical) {
            continue;
        }
        match r.level {
            ResistanceLevel::Immunity => return 0,
            ResistanceLevel::Resistance => resistant = true,
            ResistanceLevel::Vulnerability => vulnerable = true,
        }
    }

    let mut damage = incoming.max(0);
    if resistant {
        damage = ResistanceLevel::Resistance.apply(damage);
    }
    if vulnerable {
        damage = ResistanceLevel::Vulnerability.apply(damage);
    }
    damage
}

/// What an effect does when used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectKind {
    /// Flavor or a rule the display layer explains.
    DescriptionOnly,
    Resistance(ResistanceEffect),
    /// Moves the user; the world layer decides what the destination means.
    Teleport { destination: String },
    Healing { dice: DiceExpression },
    TemporaryHitPoints { dice: DiceExpression },
}

/// A named effect with a usage policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effect {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub usage: UsagePolicy,
    #[serde(default = "unlimited")]
    pub max_charges: i32,
    /// Remaining uses; [`UNLIMITED_CHARGES`] never runs out.
    #[serde(default = "unlimited")]
    pub charges: i32,
    pub kind: EffectKind,
}

fn unlimited() -> i32 {
    UNLIMITED_CHARGES
}

/// Shared charge check for every effect kind.
///
/// Unlimited and passive effects never spend charges. Everything else spends
/// one, and fails once the pool is empty.
pub fn spend_charge(
    name: &str,
    usage: UsagePolicy,
    charges: &mut i32,
) -> Result<(), EffectError> {
    if !usage.consumes_charges() || *charges == UNLIMITED_CHARGES {
        return Ok(());
    }
    if *charges <= 0 {
        return Err(EffectError::OutOfCharges(name.to_string()));
    }
    *charges -= 1;
    Ok(())
}

impl Effect {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        usage: UsagePolicy,
        charges: i32,
        kind: EffectKind,
    ) -> Self {
        let charges = match usage {
            UsagePolicy::Unlimited | UsagePolicy::Passive => UNLIMITED_CHARGES,
            _ => charges,
        };
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            usage,
            max_charges: charges,
            charges,
            kind,
        }
    }

    /// An always-on resistance, as monsters and armor carry.
    pub fn passive_resistance(name: impl Into<String>, resistance: ResistanceEffect) -> Self {
        let name = name.into();
        Self::new(
            name.clone(),
            name,
            UsagePolicy::Passive,
            UNLIMITED_CHARGES,
            EffectKind::Resistance(resistance),
        )
    }

    pub fn resistance(&self) -> Option<&ResistanceEffect> {
        match &self.kind {
            EffectKind::Resistance(r) => Some(r),
            _ => None,
        }
    }

    pub fn has_charges(&self) -> bool {
        !self.usage.consumes_charges() || self.charges == UNLIMITED_CHARGES || self.charges > 0
    }

    /// Spent consumables can be thrown away.
    pub fn is_spent(&self) -> bool {
        self.usage == UsagePolicy::Consumable && self.charges == 0
    }

    /// Check and spend a charge, returning the effect to apply.
    pub fn activate(&mut self) -> Result<EffectActivation, EffectError> {
        spend_charge(&self.name, self.usage, &mut self.charges)?;
        tracing::debug!(effect = %self.name, charges = self.charges, "Effect activated");
        Ok(EffectActivation {
            name: self.name.clone(),
            description: self.description.clone(),
            kind: self.kind.clone(),
            charges_left: self.charges,
        })
    }

    /// Refill charges if the trigger matches the usage policy.
    pub fn reset(&mut self, trigger: ResetTrigger) -> bool {
        let matches = matches!(
            (self.usage, trigger),
            (UsagePolicy::LongRest, ResetTrigger::LongRest)
                | (UsagePolicy::Daily, ResetTrigger::Daily)
                | (UsagePolicy::Charges, ResetTrigger::Daily)
        );
        if matches && self.charges != self.max_charges {
            self.charges = self.max_charges;
            return true;
        }
        false
    }

    /// Restore up to `amount` charges.
    pub fn recharge(&mut self, amount: i32) {
        if self.charges != UNLIMITED_CHARGES {
            self.charges = (self.charges + amount.max(0)).min(self.max_charges);
        }
    }
}

/// An effect whose charge has been paid, ready to apply to its user.
#[derive(Debug, Clone)]
pub struct EffectActivation {
    pub name: String,
    pub description: String,
    pub kind: EffectKind,
    pub charges_left: i32,
}

/// What applying an effect did.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EffectOutcome {
    pub message: String,
    pub healing: i32,
    pub temporary_hp: i32,
    pub teleport_to: Option<String>,
}

impl EffectActivation {
    pub fn apply(self, user: &mut dyn Combatant, dice: &mut dyn DiceRoller) -> EffectOutcome {
        let user_name = user.name().to_string();
        match self.kind {
            EffectKind::DescriptionOnly => EffectOutcome {
                message: if self.description.is_empty() {
                    format!("{user_name} uses {}.", self.name)
                } else {
                    self.description
                },
                ..Default::default()
            },
            EffectKind::Resistance(r) => {
                let covered = match r.damage {
                    ResistedDamage::Type(t) => t.name().to_string(),
                    ResistedDamage::NonmagicalPhysical => {
                        "nonmagical bludgeoning, piercing and slashing".to_string()
                    }
                };
                let level = match r.level {
                    ResistanceLevel::Vulnerability => "vulnerable",
                    ResistanceLevel::Resistance => "resistant",
                    ResistanceLevel::Immunity => "immune",
                };
                EffectOutcome {
                    message: format!("{user_name} is {level} to {covered} damage."),
                    ..Default::default()
                }
            }
            EffectKind::Teleport { destination } => EffectOutcome {
                message: format!("{user_name} vanishes and reappears at {destination}."),
                teleport_to: Some(destination),
                ..Default::default()
            },
            EffectKind::Healing { dice: expr } => {
                let roll = expr.roll_with(dice);
                let healed = user.heal(roll.total.max(0));
                EffectOutcome {
                    message: format!("{user_name} regains {healed} hit points ({roll})."),
                    healing: healed,
                    ..Default::default()
                }
            }
            EffectKind::TemporaryHitPoints { dice: expr } => {
                let roll = expr.roll_with(dice);
                let amount = roll.total.max(0);
                user.add_temp_hp(amount);
                EffectOutcome {
                    message: format!("{user_name} gains {amount} temporary hit points."),
                    temporary_hp: amount,
                    ..Default::default()
                }
            }
        }
    }
}

/// Find an effect on `user`, spend its charge and apply it.
pub fn use_effect(
    user: &mut dyn Combatant,
    effect_name: &str,
    dice: &mut dyn DiceRoller,
) -> Result<EffectOutcome, EffectError> {
    let activation = user
        .effect_mut(effect_name)
        .ok_or_else(|| EffectError::NotFound(effect_name.to_string()))?
        .activate()?;
    Ok(activation.apply(user, dice))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_fighter, ScriptedDice};

    fn fire(level: ResistanceLevel) -> ResistanceEffect {
        ResistanceEffect::new(DamageType::Fire, level)
    }

    #[test]
    fn test_resistance_multipliers() {
        assert_eq!(
            fire(ResistanceLevel::Resistance).calculate_modified_damage(9, DamageType::Fire, false),
            4
        );
        assert_eq!(
            fire(ResistanceLevel::Vulnerability).calculate_modified_damage(
                9,
                DamageType::Fire,
                false
            ),
            18
        );
        assert_eq!(
            fire(ResistanceLevel::Immunity).calculate_modified_damage(9, DamageType::Fire, true),
            0
        );
        assert_eq!(
            fire(ResistanceLevel::Resistance).calculate_modified_damage(9, DamageType::Cold, false),
            9
        );
    }

    #[test]
    fn test_nonmagical_physical() {
        let r = ResistanceEffect::nonmagical_physical(ResistanceLevel::Resistance);
        assert_eq!(r.calculate_modified_damage(10, DamageType::Slashing, false), 5);
        assert_eq!(r.calculate_modified_damage(10, DamageType::Slashing, true), 10);
        assert_eq!(r.calculate_modified_damage(10, DamageType::Fire, false), 10);
    }

    #[test]
    fn test_only_nonmagical_flag() {
        let mut r = fire(ResistanceLevel::Resistance);
        r.only_nonmagical = true;
        assert_eq!(r.calculate_modified_damage(10, DamageType::Fire, true), 10);
        assert_eq!(r.calculate_modified_damage(10, DamageType::Fire, false), 5);
    }

    #[test]
    fn test_combined_damage() {
        let resist = fire(ResistanceLevel::Resistance);
        let resist_again = fire(ResistanceLevel::Resistance);
        let immune = fire(ResistanceLevel::Immunity);
        let vulnerable = fire(ResistanceLevel::Vulnerability);

        assert_eq!(
            combined_damage(11, DamageType::Fire, false, [&resist, &resist_again]),
            5
        );
        assert_eq!(
            combined_damage(11, DamageType::Fire, false, [&resist, &immune]),
            0
        );
        assert_eq!(
            combined_damage(11, DamageType::Fire, false, [&resist, &vulnerable]),
            10
        );
    }

    #[test]
    fn test_charges_run_out() {
        let mut effect = Effect::new(
            "Wand of Sparks",
            "",
            UsagePolicy::Charges,
            2,
            EffectKind::DescriptionOnly,
        );
        assert!(effect.activate().is_ok());
        assert!(effect.activate().is_ok());
        assert_eq!(
            effect.activate().unwrap_err(),
            EffectError::OutOfCharges("Wand of Sparks".to_string())
        );
        assert_eq!(effect.charges, 0);

        assert!(!effect.reset(ResetTrigger::LongRest));
        assert!(effect.reset(ResetTrigger::Daily));
        assert_eq!(effect.charges, 2);
    }

    #[test]
    fn test_unlimited_and_passive_never_spend() {
        let mut effect = Effect::new("Cantrip Ring", "", UsagePolicy::Unlimited, 3, EffectKind::DescriptionOnly);
        for _ in 0..10 {
            assert!(effect.activate().is_ok());
        }
        assert_eq!(effect.charges, UNLIMITED_CHARGES);

        let mut passive = Effect::new("Keen Eyes", "You see well in dim light.", UsagePolicy::Passive, 0, EffectKind::DescriptionOnly);
        let activation = passive.activate().unwrap();
        assert_eq!(activation.charges_left, UNLIMITED_CHARGES);
    }

    #[test]
    fn test_passive_resistance_describes_itself() {
        let mut cloak = Effect::passive_resistance("Cloak of Embers", fire(ResistanceLevel::Resistance));
        let mut fighter = sample_fighter();
        let outcome = cloak
            .activate()
            .unwrap()
            .apply(&mut fighter, &mut ScriptedDice::new([]));
        assert_eq!(outcome.message, "Thorin is resistant to fire damage.");
        assert_eq!(outcome.healing, 0);
        assert_eq!(cloak.charges, UNLIMITED_CHARGES);
    }

    #[test]
    fn test_reset_matches_policy() {
        let mut rest = Effect::new("Second Wind", "", UsagePolicy::LongRest, 1, EffectKind::DescriptionOnly);
        rest.activate().unwrap();
        assert!(!rest.reset(ResetTrigger::Daily));
        assert!(rest.reset(ResetTrigger::LongRest));

        let mut potion = Effect::new("Potion", "", UsagePolicy::Consumable, 1, EffectKind::DescriptionOnly);
        potion.activate().unwrap();
        assert!(potion.is_spent());
        assert!(!potion.reset(ResetTrigger::LongRest));
        assert!(!potion.reset(ResetTrigger::Daily));
    }

    #[test]
    fn test_use_healing_effect() {
        let mut fighter = sample_fighter();
        fighter.hit_points_mut().take_damage(8);
        let mut dice = ScriptedDice::new([6]);

        let outcome = use_effect(&mut fighter, "Second Wind", &mut dice).unwrap();
        // 1d10 + level
        assert_eq!(outcome.healing, 7);
        assert!(matches!(
            use_effect(&mut fighter, "Second Wind", &mut dice),
            Err(EffectError::OutOfCharges(_))
        ));
        assert!(matches!(
            use_effect(&mut fighter, "Rage", &mut dice),
            Err(EffectError::NotFound(_))
        ));
    }

    #[test]
    fn test_effect_deserializes_with_defaults() {
        let json = r#"{
            "name": "Cloak of Embers",
            "usage": "PASSIVE",
            "kind": {"type": "resistance", "damage": {"type": "fire"}, "level": "resistance"}
        }"#;
        let effect: Effect = serde_json::from_str(json).unwrap();
        assert_eq!(effect.charges, UNLIMITED_CHARGES);
        assert_eq!(
            effect.resistance().map(|r| r.damage),
            Some(ResistedDamage::Type(DamageType::Fire))
        );
    }
}
