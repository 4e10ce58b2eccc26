//! Save and load for player characters.
//!
//! A [`CharacterSnapshot`] is the plain-data shape of a character. Loading
//! is tolerant: missing fields fall back to defaults, legacy field names are
//! accepted, and anything out of range is clamped with a warning instead of
//! failing. Max HP is never trusted from the file; it is re-derived.

use crate::abilities::{Ability, AbilityScores, Skill};
use crate::character::{Character, CharacterId, RaceType, MAX_LEVEL};
use crate::class_data::CharacterClass;
use crate::combatant::Combatant;
use crate::effects::{Effect, UNLIMITED_CHARGES};
use crate::items::Equipment;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Current save file version.
const SAVE_VERSION: u32 = 1;

fn default_name() -> String {
    "Adventurer".to_string()
}

fn default_race() -> String {
    RaceType::Human.name().to_string()
}

fn default_class() -> String {
    CharacterClass::Fighter.name().to_string()
}

fn default_level() -> u8 {
    1
}

/// Serializable state of a character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSnapshot {
    #[serde(default)]
    pub id: Option<CharacterId>,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_race")]
    pub race: String,
    #[serde(default = "default_class", alias = "class_name")]
    pub class: String,
    #[serde(default = "default_level")]
    pub level: u8,
    #[serde(default, alias = "xp")]
    pub experience: u32,

    /// Scores before racial bonuses.
    #[serde(default, alias = "stats", alias = "ability_scores")]
    pub base_scores: AbilityScores,
    #[serde(default)]
    pub half_elf_bonus: Option<[Ability; 2]>,

    #[serde(default, alias = "hp")]
    pub current_hit_points: Option<i32>,
    /// Written for readers of the file; ignored on load.
    #[serde(default, alias = "max_hp")]
    pub max_hit_points: Option<i32>,
    #[serde(default, alias = "temp_hp")]
    pub temporary_hit_points: i32,
    #[serde(default)]
    pub level_hp_gains: Vec<u32>,

    #[serde(default)]
    pub armor_bonus: i32,
    #[serde(default)]
    pub shield_bonus: i32,
    #[serde(default)]
    pub equipment: Equipment,
    #[serde(default, alias = "skills")]
    pub skill_proficiencies: BTreeSet<Skill>,

    /// `None` keeps the class's starting spells.
    #[serde(default)]
    pub cantrips_known: Option<Vec<String>>,
    #[serde(default)]
    pub spells_known: Option<Vec<String>>,
    /// Slots used per level, 1 through 9.
    #[serde(default)]
    pub spell_slots_used: Vec<u8>,

    /// Remaining charges of class and racial features, by name.
    #[serde(default)]
    pub feature_charges: BTreeMap<String, i32>,
    #[serde(default)]
    pub effects: Vec<Effect>,
}

impl Character {
    /// Capture everything needed to rebuild this character.
    pub fn to_snapshot(&self) -> CharacterSnapshot {
        let hp = self.hit_points();
        CharacterSnapshot {
            id: Some(self.id),
            name: self.name.clone(),
            race: self.race().name().to_string(),
            class: self.class().name().to_string(),
            level: self.level(),
            experience: self.experience(),
            base_scores: self.base_scores(),
            half_elf_bonus: self.half_elf_bonus(),
            current_hit_points: Some(hp.current),
            max_hit_points: Some(hp.maximum),
            temporary_hit_points: hp.temporary,
            level_hp_gains: self.level_hp_gains().to_vec(),
            armor_bonus: self.armor_bonus,
            shield_bonus: self.shield_bonus,
            equipment: self.equipment.clone(),
            skill_proficiencies: self.skill_proficiencies.clone(),
            cantrips_known: Some(self.cantrips_known.clone()),
            spells_known: Some(self.spells_known.clone()),
            spell_slots_used: self.spell_slots.slots.iter().map(|s| s.used).collect(),
            feature_charges: self
                .features()
                .iter()
                .filter(|f| f.usage.consumes_charges())
                .map(|f| (f.name.clone(), f.charges))
                .collect(),
            effects: self.effects.clone(),
        }
    }

    /// Rebuild a character from a snapshot. Never fails; bad values are
    /// replaced or clamped and logged.
    pub fn from_snapshot(snapshot: CharacterSnapshot) -> Self {
        let race = RaceType::from_name(&snapshot.race).unwrap_or_else(|| {
            tracing::warn!(race = %snapshot.race, "Unknown race in save, using Human");
            RaceType::Human
        });
        let class = CharacterClass::from_name(&snapshot.class).unwrap_or_else(|| {
            tracing::warn!(class = %snapshot.class, "Unknown class in save, using Fighter");
            CharacterClass::Fighter
        });

        let mut character = Character::new(snapshot.name, race, class, snapshot.base_scores);
        if let Some(id) = snapshot.id {
            character.id = id;
        }
        if let Some(bonus) = snapshot.half_elf_bonus {
            if let Err(e) = character.set_half_elf_bonus(bonus) {
                tracing::warn!(character = %character.name, error = %e, "Dropped Half-Elf bonus");
            }
        }

        let level = snapshot.level.clamp(1, MAX_LEVEL);
        if level != snapshot.level {
            tracing::warn!(level = snapshot.level, "Level out of range in save, clamped");
        }
        let die = class.hit_die();
        let mut gains: Vec<u32> = snapshot
            .level_hp_gains
            .into_iter()
            .map(|g| g.clamp(1, die.sides()))
            .collect();
        gains.resize(level as usize - 1, die.average_gain());
        character.level_hp_gains = gains;
        character.level = level;
        character.experience = snapshot.experience;
        character.on_level_changed();

        let max = character.hit_points.maximum;
        if let Some(saved_max) = snapshot.max_hit_points {
            if saved_max != max {
                tracing::debug!(saved_max, derived = max, "Saved max HP differs, using derived");
            }
        }
        character.hit_points.current = snapshot.current_hit_points.unwrap_or(max).clamp(0, max);
        character.hit_points.temporary = snapshot.temporary_hit_points.max(0);

        character.armor_bonus = snapshot.armor_bonus;
        character.shield_bonus = snapshot.shield_bonus;
        character.equipment = snapshot.equipment;
        character.skill_proficiencies = snapshot.skill_proficiencies;
        if let Some(cantrips) = snapshot.cantrips_known {
            character.cantrips_known = cantrips;
        }
        if let Some(spells) = snapshot.spells_known {
            character.spells_known = spells;
        }
        for (slot, used) in character
            .spell_slots
            .slots
            .iter_mut()
            .zip(snapshot.spell_slots_used)
        {
            slot.used = used.min(slot.total);
        }

        for feature in &mut character.features {
            if let Some(charges) = snapshot.feature_charges.get(&feature.name) {
                feature.charges = clamp_charges(*charges, feature.max_charges);
            }
        }
        character.effects = snapshot
            .effects
            .into_iter()
            .map(|mut effect| {
                effect.charges = clamp_charges(effect.charges, effect.max_charges);
                effect
            })
            .collect();

        character
    }
}

fn clamp_charges(charges: i32, max: i32) -> i32 {
    if max == UNLIMITED_CHARGES {
        UNLIMITED_CHARGES
    } else {
        charges.clamp(0, max.max(0))
    }
}

/// A saved party of adventurers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedParty {
    /// Save format version for compatibility checking.
    pub version: u32,

    /// When the save was created, as seconds since the epoch.
    #[serde(default)]
    pub saved_at: String,

    #[serde(default)]
    pub characters: Vec<CharacterSnapshot>,
}

impl SavedParty {
    pub fn new<'a>(characters: impl IntoIterator<Item = &'a Character>) -> Self {
        Self {
            version: SAVE_VERSION,
            saved_at: now_timestamp(),
            characters: characters.into_iter().map(Character::to_snapshot).collect(),
        }
    }

    /// Rebuild every character in the save.
    pub fn into_characters(self) -> Vec<Character> {
        self.characters
            .into_iter()
            .map(Character::from_snapshot)
            .collect()
    }

    /// Save to a JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        tracing::info!(path = %path.display(), characters = self.characters.len(), "Party saved");
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).await?;
        let saved: Self = serde_json::from_str(&content)?;

        if saved.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: saved.version,
            });
        }

        Ok(saved)
    }
}

/// Save file name for a party.
pub fn party_save_path(base_dir: impl AsRef<Path>, party_name: &str) -> PathBuf {
    let sanitized = party_name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>();
    base_dir.as_ref().join(format!("{sanitized}.json"))
}

fn now_timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    now.as_secs().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_cleric, sample_fighter, sample_wizard};

    #[test]
    fn test_snapshot_keeps_state() {
        let mut fighter = sample_fighter();
        fighter.set_level(3);
        fighter.take_damage(5);
        fighter.add_temp_hp(4);
        fighter.features.iter_mut().for_each(|f| f.charges = 0);

        let json = serde_json::to_string(&fighter.to_snapshot()).unwrap();
        let restored = Character::from_snapshot(serde_json::from_str(&json).unwrap());

        assert_eq!(restored.id, fighter.id);
        assert_eq!(restored.level(), 3);
        assert_eq!(restored.hit_points(), fighter.hit_points());
        assert_eq!(restored.equipment, fighter.equipment);
        assert_eq!(restored.skill_proficiencies, fighter.skill_proficiencies);
        let second_wind = restored
            .features()
            .iter()
            .find(|f| f.name == "Second Wind")
            .unwrap();
        assert_eq!(second_wind.charges, 0);
    }

    #[test]
    fn test_spent_slots_survive() {
        let mut wizard = sample_wizard();
        wizard.spell_slots.use_slot(1);
        let restored = Character::from_snapshot(wizard.to_snapshot());
        assert_eq!(restored.spell_slots.available(1), 1);
        assert_eq!(restored.cantrips_known, wizard.cantrips_known);
    }

    #[test]
    fn test_legacy_shape() {
        let json = r#"{
            "name": "Old Timer",
            "race": "half-orc",
            "class_name": "barbarian",
            "level": 2,
            "stats": {"str": 15, "dex": 14, "con": 14, "int": 8, "wis": 10, "cha": 10},
            "hp": 99,
            "max_hp": 99
        }"#;
        let snapshot: CharacterSnapshot = serde_json::from_str(json).unwrap();
        let character = Character::from_snapshot(snapshot);

        assert_eq!(character.race(), RaceType::HalfOrc);
        assert_eq!(character.class(), CharacterClass::Barbarian);
        // Half-Orc CON 15 -> +2: 12 + 2, then 7 + 2
        assert_eq!(character.max_hit_points(), 23);
        assert_eq!(character.hit_points().current, 23);
    }

    #[test]
    fn test_missing_and_bad_fields() {
        let snapshot: CharacterSnapshot =
            serde_json::from_str(r#"{"race": "Gith", "level": 40, "hp": -5}"#).unwrap();
        let character = Character::from_snapshot(snapshot);

        assert_eq!(character.name, "Adventurer");
        assert_eq!(character.race(), RaceType::Human);
        assert_eq!(character.class(), CharacterClass::Fighter);
        assert_eq!(character.level(), 20);
        assert_eq!(character.level_hp_gains().len(), 19);
        assert_eq!(character.hit_points().current, 0);
    }

    #[test]
    fn test_save_path_is_sanitized() {
        let path = party_save_path("/saves", "Bob's Party!");
        assert!(path.to_string_lossy().ends_with("Bob_s_Party_.json"));
    }

    #[tokio::test]
    async fn test_party_save_and_load() {
        use tempfile::TempDir;

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let save_path = temp_dir.path().join("party").join("heroes.json");

        let mut cleric = sample_cleric();
        cleric.take_damage(4);
        let party = [sample_fighter(), cleric];
        SavedParty::new(&party)
            .save_json(&save_path)
            .await
            .expect("Save should succeed");

        let loaded = SavedParty::load_json(&save_path)
            .await
            .expect("Load should succeed");
        assert_eq!(loaded.version, SAVE_VERSION);

        let characters = loaded.into_characters();
        assert_eq!(characters.len(), 2);
        assert_eq!(characters[0].name, "Thorin");
        assert_eq!(characters[1].hit_points().current, 6);
    }

    #[tokio::test]
    async fn test_version_mismatch() {
        use tempfile::TempDir;

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let save_path = temp_dir.path().join("future.json");
        std::fs::write(&save_path, r#"{"version": 99, "characters": []}"#)
            .expect("Write should succeed");

        let result = SavedParty::load_json(&save_path).await;
        assert!(matches!(
            result,
            Err(PersistError::VersionMismatch {
                expected: 1,
                found: 99
            })
        ));
    }
}
