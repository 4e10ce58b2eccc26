//! Headless skirmish: the party against a band of monsters.
//!
//! Every combatant is driven by the same simple policy, and each action's
//! structured result is printed as one line plus its follow-up events.

use anyhow::{bail, Context, Result};
use questkeeper_core::abilities::{Ability, AbilityScores, Skill};
use questkeeper_core::effects::EffectKind;
use questkeeper_core::spells::all_spells;
use questkeeper_core::{
    Action, ActionResult, Character, CharacterBuilder, CharacterClass, CombatEncounter,
    CombatOutcome, Combatant, Creature, DiceRoller, EngineConfig, ItemRegistry, Monster,
    MonsterStatBlock, ParticipantId, RaceType, SavedParty, Side, SpellKind,
};
use std::path::PathBuf;

/// Monsters used when no stat block file is given.
const DEFAULT_MONSTERS: &str = r#"[
    {
        "name": "Goblin",
        "hp": 7,
        "ac": 15,
        "abilities": {"str": 8, "dex": 14, "con": 10, "int": 10, "wis": 8, "cha": 8},
        "attacks": [{"name": "Scimitar", "attack_bonus": 4, "damage": "1d6+2", "damage_type": "slashing"}],
        "xp": 50
    },
    {
        "name": "Goblin",
        "hp": 7,
        "ac": 15,
        "abilities": {"str": 8, "dex": 14, "con": 10, "int": 10, "wis": 8, "cha": 8},
        "attacks": [{"name": "Shortbow", "attack_bonus": 4, "damage": "1d6+2", "damage_type": "piercing"}],
        "xp": 50
    },
    {
        "name": "Kobold Sorcerer",
        "hp": 9,
        "ac": 12,
        "abilities": {"str": 7, "dex": 15, "con": 9, "int": 8, "wis": 7, "cha": 14},
        "attacks": [{"name": "Dagger", "attack_bonus": 4, "damage": "1d4+2", "damage_type": "piercing"}],
        "spells": ["Fire Bolt"],
        "spell_save_dc": 12,
        "xp": 25
    },
    {
        "name": "Bugbear",
        "hp": 27,
        "ac": 16,
        "abilities": {"str": 15, "dex": 14, "con": 13, "int": 8, "wis": 11, "cha": 9},
        "attacks": [{"name": "Morningstar", "attack_bonus": 4, "damage": "2d8+2", "damage_type": "piercing"}],
        "xp": 200
    }
]"#;

/// Hard stop for a runaway fight.
const MAX_ACTIONS: usize = 500;

/// Skirmish options from the command line.
#[derive(Debug, Clone, Default)]
pub struct SkirmishConfig {
    /// Load the party from a save instead of the default adventurers.
    pub party_file: Option<PathBuf>,
    /// JSON array of monster stat blocks.
    pub monsters_file: Option<PathBuf>,
    /// Write the party here afterwards.
    pub save_path: Option<PathBuf>,
}

pub fn parse_config_from_args(args: &[String]) -> SkirmishConfig {
    let mut config = SkirmishConfig::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--party" => {
                if let Some(path) = args.get(i + 1) {
                    config.party_file = Some(PathBuf::from(path));
                    i += 1;
                }
            }
            "--monsters" => {
                if let Some(path) = args.get(i + 1) {
                    config.monsters_file = Some(PathBuf::from(path));
                    i += 1;
                }
            }
            "--save" => {
                if let Some(path) = args.get(i + 1) {
                    config.save_path = Some(PathBuf::from(path));
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }

    config
}

/// Thorin, Elara and Brother Aldric, equipped from the standard registry.
pub fn default_party() -> Result<Vec<Character>> {
    let registry = ItemRegistry::standard();
    let item = |id: &str| {
        registry
            .instantiate(id)
            .with_context(|| format!("standard item '{id}' is missing"))
    };

    let fighter = CharacterBuilder::new()
        .name("Thorin")
        .race(RaceType::Dwarf)
        .class(CharacterClass::Fighter)
        .ability_scores(AbilityScores::new(16, 12, 14, 10, 12, 8))
        .skills(vec![Skill::Athletics, Skill::Perception])
        .item(item("longsword")?)
        .item(item("chain_mail")?)
        .item(item("shield")?)
        .item(item("potion_of_healing")?)
        .build()?;

    let wizard = CharacterBuilder::new()
        .name("Elara")
        .race(RaceType::Elf)
        .class(CharacterClass::Wizard)
        .standard_array([
            (8, Ability::Strength),
            (14, Ability::Dexterity),
            (13, Ability::Constitution),
            (15, Ability::Intelligence),
            (12, Ability::Wisdom),
            (10, Ability::Charisma),
        ])
        .skills(vec![Skill::Arcana, Skill::History])
        .item(item("quarterstaff")?)
        .build()?;

    let cleric = CharacterBuilder::new()
        .name("Brother Aldric")
        .race(RaceType::Human)
        .class(CharacterClass::Cleric)
        .ability_scores(AbilityScores::new(12, 10, 13, 10, 15, 12))
        .skills(vec![Skill::Medicine, Skill::Religion])
        .item(item("mace")?)
        .item(item("scale_mail")?)
        .item(item("shield")?)
        .build()?;

    Ok(vec![fighter, wizard, cleric])
}

pub async fn load_party(config: &SkirmishConfig) -> Result<Vec<Character>> {
    match &config.party_file {
        Some(path) => {
            let saved = SavedParty::load_json(path)
                .await
                .with_context(|| format!("loading party from {}", path.display()))?;
            let party = saved.into_characters();
            if party.is_empty() {
                bail!("{} contains no characters", path.display());
            }
            Ok(party)
        }
        None => default_party(),
    }
}

pub async fn load_monsters(
    config: &SkirmishConfig,
    engine: &EngineConfig,
) -> Result<Vec<Monster>> {
    let json = match &config.monsters_file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?,
        None => DEFAULT_MONSTERS.to_string(),
    };
    let blocks: Vec<MonsterStatBlock> =
        serde_json::from_str(&json).context("parsing monster stat blocks")?;
    if blocks.is_empty() {
        bail!("no monsters to fight");
    }
    blocks
        .into_iter()
        .map(|block| Monster::from_stat_block(block, engine).map_err(Into::into))
        .collect()
}

fn below_half(combatant: &dyn Combatant) -> bool {
    let hp = combatant.hit_points();
    combatant.is_alive() && hp.current * 2 < hp.maximum
}

/// Pick an action for whoever is up.
///
/// In order: drink or use a healing effect when badly hurt, heal a hurt
/// ally, cast the strongest damage spell there is a slot for, then attack.
pub fn choose_action(combat: &CombatEncounter, actor: ParticipantId) -> Action {
    let Some(me) = combat.participant(actor) else {
        return Action::EndTurn;
    };
    let Some(enemy) = combat.active(me.side.opponent()).next().map(|p| p.id) else {
        return Action::EndTurn;
    };
    let combatant = me.combatant();

    if below_half(combatant) {
        let healing = combatant
            .effects()
            .into_iter()
            .find(|e| matches!(e.kind, EffectKind::Healing { .. }) && e.has_charges());
        if let Some(effect) = healing {
            return Action::UseEffect {
                effect: effect.name.clone(),
            };
        }
    }

    let known: Vec<_> = all_spells()
        .into_iter()
        .filter(|s| combatant.knows_spell(s.name()))
        .filter(|s| s.is_cantrip() || combatant.has_spell_slot(s.level()))
        .collect();

    let hurt_ally = combat
        .active(me.side)
        .find(|p| below_half(p.combatant()))
        .map(|p| p.id);
    if let Some(ally) = hurt_ally {
        let heal = known.iter().find(|s| {
            matches!(s.kind(), SpellKind::Healing { .. })
                && if ally == actor {
                    s.can_target_self()
                } else {
                    s.can_target_others()
                }
        });
        if let Some(spell) = heal {
            return Action::CastSpell {
                spell: spell.name().to_string(),
                slot_level: None,
                target: Some(ally),
            };
        }
    }

    let attack_spell = known
        .iter()
        .rev()
        .find(|s| {
            s.can_target_others()
                && matches!(
                    s.kind(),
                    SpellKind::Damage { .. } | SpellKind::Darts { .. }
                )
        });
    if let Some(spell) = attack_spell {
        return Action::CastSpell {
            spell: spell.name().to_string(),
            slot_level: None,
            target: Some(enemy),
        };
    }

    Action::Attack {
        target: enemy,
        attack: None,
    }
}

fn print_result(result: &ActionResult) {
    println!("  {}", result.message);
    for event in &result.events {
        println!("    - {event}");
    }
}

/// Fight until one side is down, printing as it goes.
pub fn run_encounter(combat: &mut CombatEncounter, dice: &mut dyn DiceRoller) -> Result<CombatOutcome> {
    let order = combat.start(dice)?.to_vec();
    println!("=== Initiative ===");
    for id in &order {
        if let Some(p) = combat.participant(*id) {
            println!("  {:>2}  {}", p.initiative, p.name());
        }
    }

    let mut round = 0;
    for _ in 0..MAX_ACTIONS {
        let Some(actor) = combat.current_actor() else {
            break;
        };
        if combat.round() != round {
            round = combat.round();
            println!();
            println!("=== Round {round} ===");
        }

        let action = choose_action(combat, actor);
        let mut result = combat.take_action(action, dice);
        if result.is_rejected() {
            tracing::debug!(reason = %result.message, "Falling back to a plain attack");
            let enemy = combat
                .active(side_of(combat, actor).opponent())
                .next()
                .map(|p| p.id);
            result = match enemy {
                Some(target) => combat.take_action(
                    Action::Attack {
                        target,
                        attack: None,
                    },
                    dice,
                ),
                None => combat.take_action(Action::EndTurn, dice),
            };
            if result.is_rejected() {
                result = combat.take_action(Action::EndTurn, dice);
            }
        }
        print_result(&result);
    }

    if !combat.is_over() {
        tracing::warn!(actions = MAX_ACTIONS, "Skirmish did not finish; aborting");
        combat.abort();
    }
    combat
        .outcome()
        .context("combat ended without an outcome")
}

fn side_of(combat: &CombatEncounter, id: ParticipantId) -> Side {
    combat
        .participant(id)
        .map(|p| p.side)
        .unwrap_or(Side::Party)
}

/// Split experience among the party members still standing.
pub fn award_experience(
    party: &mut [Character],
    xp: u32,
    engine: &EngineConfig,
    dice: &mut dyn DiceRoller,
) {
    let standing = party.iter().filter(|c| c.is_alive()).count() as u32;
    if standing == 0 || xp == 0 {
        return;
    }
    let share = xp / standing;
    for character in party.iter_mut().filter(|c| c.is_alive()) {
        let levels = character.add_experience(share, engine.hp_gain, dice);
        println!("  {} gains {share} XP.", character.name);
        for level in levels {
            println!("    - {} reaches level {level}!", character.name);
        }
    }
}

/// Build the encounter, fight it and hand back the party.
pub async fn run(
    config: SkirmishConfig,
    engine: EngineConfig,
    dice: &mut dyn DiceRoller,
) -> Result<CombatOutcome> {
    let party = load_party(&config).await?;
    let monsters = load_monsters(&config, &engine).await?;

    let mut combat = CombatEncounter::new(engine.clone());
    for character in party {
        combat.add(character, Side::Party)?;
    }
    for monster in monsters {
        combat.add(monster, Side::Enemies)?;
    }

    let outcome = run_encounter(&mut combat, dice)?;
    let xp = combat.experience_earned();

    println!();
    println!("=== {outcome:?} ===");

    let mut party: Vec<Character> = combat
        .into_creatures()
        .into_iter()
        .filter(|(side, _)| *side == Side::Party)
        .filter_map(|(_, creature)| match creature {
            Creature::Character(c) => Some(*c),
            Creature::Monster(_) => None,
        })
        .collect();

    if outcome == CombatOutcome::Victory {
        award_experience(&mut party, xp, &engine, dice);
    }
    for character in &party {
        let hp = character.hit_points();
        println!(
            "  {} (level {} {}): {}/{} HP",
            character.name,
            character.level(),
            character.class(),
            hp.current,
            hp.maximum
        );
    }

    if let Some(path) = &config.save_path {
        SavedParty::new(&party)
            .save_json(path)
            .await
            .with_context(|| format!("saving party to {}", path.display()))?;
        println!("Party saved to {}", path.display());
    }

    Ok(outcome)
}
