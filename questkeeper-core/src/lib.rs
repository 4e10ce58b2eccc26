//! D&D 5e rules engine for QuestKeeper.
//!
//! This crate provides:
//! - Dice notation, rolling and a swappable randomness source
//! - Ability scores, characters with progression, and monsters from stat blocks
//! - Effects with usage policies, charges and damage resistances
//! - A validated spell catalog with attack, save, healing and buff resolution
//! - A turn-based combat state machine
//! - Tolerant character persistence
//!
//! # Quick Start
//!
//! ```ignore
//! use questkeeper_core::{
//!     Action, CombatEncounter, EngineConfig, Monster, RandomDice, Side,
//! };
//!
//! let config = EngineConfig::from_env();
//! let mut dice = RandomDice::from_seed_option(config.dice_seed);
//! let mut combat = CombatEncounter::new(config.clone());
//! let hero = combat.add(questkeeper_core::testing::sample_fighter(), Side::Party)?;
//! let goblin = combat.add(
//!     Monster::from_stat_block(questkeeper_core::testing::goblin_stat_block(), &config)?,
//!     Side::Enemies,
//! )?;
//! combat.start(&mut dice)?;
//! let result = combat.take_action(Action::Attack { target: goblin, attack: None }, &mut dice);
//! println!("{}", result.message);
//! ```

pub mod abilities;
pub mod character;
pub mod class_data;
pub mod combat;
pub mod combatant;
pub mod config;
pub mod dice;
pub mod effects;
pub mod error;
pub mod items;
pub mod monster;
pub mod persist;
pub mod spells;
pub mod testing;

// Primary public API
pub use abilities::{Ability, AbilityScores, Skill};
pub use character::{Character, CharacterBuilder, CharacterId, RaceType, SpellSlots};
pub use class_data::CharacterClass;
pub use combat::{
    Action, ActionOutcome, ActionResult, CombatEncounter, CombatOutcome, CombatState,
    ParticipantId, Side,
};
pub use combatant::{Combatant, Condition, Creature, DamageType, HitPoints};
pub use config::{EngineConfig, HpGainPolicy};
pub use dice::{DiceError, DiceExpression, DiceRoller, RandomDice};
pub use effects::{Effect, EffectError, EffectKind, UsagePolicy};
pub use error::RulesError;
pub use items::{Equipment, ItemInstance, ItemRegistry};
pub use monster::{Monster, MonsterStatBlock};
pub use persist::{CharacterSnapshot, PersistError, SavedParty};
pub use spells::{get_spell, SpellDefinition, SpellKind, SpellOutcome, SpellResult};
pub use testing::ScriptedDice;
