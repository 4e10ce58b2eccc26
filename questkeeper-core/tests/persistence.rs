//! Party save files on disk.

use questkeeper_core::persist::party_save_path;
use questkeeper_core::testing::{sample_fighter, sample_wizard};
use questkeeper_core::{
    Combatant, HpGainPolicy, PersistError, RaceType, SavedParty, ScriptedDice,
};
use tempfile::TempDir;

#[tokio::test]
async fn test_progress_survives_a_save() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = party_save_path(temp_dir.path(), "The Company");

    let mut fighter = sample_fighter();
    // 300 XP reaches level 2; rolled hit die 9
    let levels = fighter.add_experience(300, HpGainPolicy::Roll, &mut ScriptedDice::new([9]));
    assert_eq!(levels, vec![2]);
    fighter.take_damage(6);

    let mut wizard = sample_wizard();
    wizard.spell_slots.use_slot(1);

    SavedParty::new([&fighter, &wizard])
        .save_json(&path)
        .await
        .expect("Save should succeed");
    let party = SavedParty::load_json(&path)
        .await
        .expect("Load should succeed")
        .into_characters();

    let loaded = &party[0];
    assert_eq!(loaded.level(), 2);
    assert_eq!(loaded.experience(), 300);
    // 13 + (9 + 3)
    assert_eq!(loaded.max_hit_points(), 25);
    assert_eq!(loaded.hit_points().current, 19);
    assert_eq!(loaded.race(), RaceType::Dwarf);
    assert_eq!(party[1].spell_slots.available(1), 1);
}

#[tokio::test]
async fn test_legacy_file_loads() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("legacy.json");
    tokio::fs::write(
        &path,
        r#"{
            "version": 1,
            "characters": [
                {"name": "Mira", "race": "Elf", "class_name": "Wizard", "hp": 3},
                {}
            ]
        }"#,
    )
    .await
    .expect("Write should succeed");

    let party = SavedParty::load_json(&path)
        .await
        .expect("Load should succeed")
        .into_characters();
    assert_eq!(party.len(), 2);
    assert_eq!(party[0].name, "Mira");
    assert_eq!(party[0].hit_points().current, 3);
    assert_eq!(party[0].cantrips_known, vec!["Fire Bolt", "Ray of Frost"]);
    assert_eq!(party[1].name, "Adventurer");
}

#[tokio::test]
async fn test_missing_file_is_io_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let result = SavedParty::load_json(temp_dir.path().join("nope.json")).await;
    assert!(matches!(result, Err(PersistError::Io(_))));
}
