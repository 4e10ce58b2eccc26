//! Rules scenarios exercised through the public API.
//!
//! Run with: `cargo test -p questkeeper-core --test rules_scenarios`

use questkeeper_core::abilities::{ability_modifier, proficiency_bonus};
use questkeeper_core::combatant::HitPoints;
use questkeeper_core::testing::{goblin_stat_block, sample_cleric, sample_wizard};
use questkeeper_core::{
    get_spell, Ability, AbilityScores, CharacterBuilder, CharacterClass, Combatant, DiceRoller,
    EngineConfig, Monster, RaceType, RandomDice, ScriptedDice, Skill, SpellOutcome,
};

// =============================================================================
// TEST 1: Ability math
// =============================================================================

#[test]
fn test_modifier_is_floored() {
    for score in 1..=30u8 {
        let expected = ((score as f64 - 10.0) / 2.0).floor() as i8;
        assert_eq!(ability_modifier(score), expected, "score {score}");
    }
}

#[test]
fn test_proficiency_tiers() {
    let expected = [(1, 2), (4, 2), (5, 3), (8, 3), (9, 4), (13, 5), (17, 6), (20, 6)];
    for (level, bonus) in expected {
        assert_eq!(proficiency_bonus(level), bonus, "level {level}");
    }
}

// =============================================================================
// TEST 2: Hit points
// =============================================================================

#[test]
fn test_temporary_hp_absorbs_first() {
    let mut hp = HitPoints::new(20);
    hp.add_temp_hp(5);
    hp.take_damage(8);
    assert_eq!(hp.temporary, 0);
    assert_eq!(hp.current, 17);

    hp.add_temp_hp(10);
    hp.take_damage(4);
    assert_eq!(hp.temporary, 6);
    assert_eq!(hp.current, 17);
}

#[test]
fn test_heal_reports_amount_applied() {
    let mut hp = HitPoints::new(20);
    hp.take_damage(5);
    assert_eq!(hp.heal(100), 5);
    assert_eq!(hp.current, 20);
}

#[test]
fn test_unconscious_exactly_at_zero() {
    let mut hp = HitPoints::new(12);
    hp.take_damage(11);
    assert!(!hp.is_unconscious());
    hp.take_damage(1);
    assert!(hp.is_unconscious());
    assert_eq!(hp.current, 0);
}

// =============================================================================
// TEST 3: Dice
// =============================================================================

#[test]
fn test_random_dice_cover_range() {
    let mut dice = RandomDice::seeded(7);
    for sides in [4u32, 6, 8, 10, 12, 20] {
        let mut seen = vec![false; sides as usize];
        for _ in 0..2000 {
            let value = dice.roll(sides);
            assert!((1..=sides).contains(&value));
            seen[value as usize - 1] = true;
        }
        assert!(seen.iter().all(|s| *s), "d{sides} missed a face");
    }
}

// =============================================================================
// TEST 4: Characters
// =============================================================================

#[test]
fn test_dwarf_fighter_scenario() {
    let fighter = CharacterBuilder::new()
        .name("Thorin")
        .race(RaceType::Dwarf)
        .class(CharacterClass::Fighter)
        .ability_scores(AbilityScores::new(16, 12, 14, 10, 12, 8))
        .skills(vec![Skill::Athletics, Skill::Perception])
        .build()
        .expect("valid fighter");

    assert_eq!(fighter.level(), 1);
    assert_eq!(fighter.max_hit_points(), 13);
    assert_eq!(fighter.armor_class(), 11);
    assert_eq!(fighter.proficiency_bonus(), 2);
    assert_eq!(fighter.saving_throw_modifier(Ability::Strength), 5);
}

#[test]
fn test_half_elf_scenario() {
    let bard = CharacterBuilder::new()
        .name("Lyra")
        .race(RaceType::HalfElf)
        .class(CharacterClass::Bard)
        .ability_scores(AbilityScores::new(10, 10, 10, 10, 10, 10))
        .skills(vec![Skill::Performance, Skill::Persuasion, Skill::Insight])
        .half_elf_bonuses([Ability::Strength, Ability::Constitution])
        .build()
        .expect("valid bard");

    assert_eq!(bard.ability_score(Ability::Strength), 11);
    assert_eq!(bard.ability_score(Ability::Constitution), 11);
    assert_eq!(bard.ability_score(Ability::Charisma), 12);
    for ability in [Ability::Dexterity, Ability::Intelligence, Ability::Wisdom] {
        assert_eq!(bard.ability_score(ability), 10);
    }
}

// =============================================================================
// TEST 5: Spells against monsters
// =============================================================================

fn goblin() -> Monster {
    Monster::from_stat_block(goblin_stat_block(), &EngineConfig::default())
        .expect("goblin stat block is valid")
}

#[test]
fn test_natural_twenty_always_hits() {
    let spell = get_spell("Fire Bolt").unwrap();
    let mut wizard = sample_wizard();
    let mut target = goblin();

    // 20 hits anything; damage dice doubled: 3 * 2
    let mut dice = ScriptedDice::new([20, 3]);
    let result = spell.cast(&mut wizard, Some(&mut target), &mut dice);
    assert_eq!(result.outcome, SpellOutcome::Hit);
    assert!(result.critical);
    assert_eq!(result.damage, 6);
    assert_eq!(target.hit_points().current, 1);
}

#[test]
fn test_natural_one_always_misses() {
    let spell = get_spell("Fire Bolt").unwrap();
    let mut wizard = sample_wizard();
    let mut target = goblin();

    let mut dice = ScriptedDice::new([1]);
    let result = spell.cast(&mut wizard, Some(&mut target), &mut dice);
    assert_eq!(result.outcome, SpellOutcome::Miss);
    assert_eq!(result.damage, 0);
    assert!(target.hit_points().is_full());
}

#[test]
fn test_save_for_half() {
    let spell = get_spell("Burning Hands").unwrap();
    let mut wizard = sample_wizard();

    // Flat +2 save vs DC 13: 15 + 2 succeeds, 3d6 = 4 + 4 + 3 -> 5
    let mut target = goblin();
    let result = spell.cast(&mut wizard, Some(&mut target), &mut ScriptedDice::new([15, 4, 4, 3]));
    assert_eq!(result.outcome, SpellOutcome::SaveSucceeded);
    assert_eq!(result.damage, 5);

    // 2 + 2 fails: full 11
    let mut target = goblin();
    let result = spell.cast(&mut wizard, Some(&mut target), &mut ScriptedDice::new([2, 4, 4, 3]));
    assert_eq!(result.outcome, SpellOutcome::SaveFailed);
    assert_eq!(result.damage, 11);
    assert!(!target.is_alive());
}

#[test]
fn test_save_negates_cantrip() {
    let spell = get_spell("Sacred Flame").unwrap();
    let mut cleric = sample_cleric();
    let mut target = goblin();

    let result = spell.cast(&mut cleric, Some(&mut target), &mut ScriptedDice::new([12]));
    assert_eq!(result.outcome, SpellOutcome::SaveSucceeded);
    assert_eq!(result.damage, 0);
    assert!(target.hit_points().is_full());
}

#[test]
fn test_healing_is_bounded() {
    let spell = get_spell("Cure Wounds").unwrap();
    let mut cleric = sample_cleric();
    cleric.take_damage(3);

    let result = spell.cast(&mut cleric, None, &mut ScriptedDice::new([8]));
    assert_eq!(result.outcome, SpellOutcome::Healing);
    assert_eq!(result.healing, 3);
    assert_eq!(cleric.hit_points().current, cleric.max_hit_points());
}
