//! Engine configuration.
//!
//! Plain data with sensible defaults. The binary builds one from the
//! environment; tests build one with the `with_*` methods.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How hit points are gained on level up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HpGainPolicy {
    /// Fixed `die / 2 + 1` per level.
    #[default]
    Average,
    /// Roll the class hit die.
    Roll,
}

impl FromStr for HpGainPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "average" | "avg" | "fixed" => Ok(HpGainPolicy::Average),
            "roll" | "rolled" => Ok(HpGainPolicy::Roll),
            other => Err(format!("unknown hp gain policy '{other}'")),
        }
    }
}

/// Tunables for the rules engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Hit point gain policy on level up.
    pub hp_gain: HpGainPolicy,
    /// Save bonus for monsters whose stat block lists none for an ability.
    pub default_monster_save_bonus: i8,
    /// Whether damage forces a Constitution save to keep concentration.
    pub concentration_checks: bool,
    /// Seed for reproducible dice, if any.
    pub dice_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hp_gain: HpGainPolicy::Average,
            default_monster_save_bonus: 2,
            concentration_checks: true,
            dice_seed: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hp_gain(mut self, policy: HpGainPolicy) -> Self {
        self.hp_gain = policy;
        self
    }

    pub fn with_default_monster_save_bonus(mut self, bonus: i8) -> Self {
        self.default_monster_save_bonus = bonus;
        self
    }

    pub fn with_concentration_checks(mut self, enabled: bool) -> Self {
        self.concentration_checks = enabled;
        self
    }

    pub fn with_dice_seed(mut self, seed: u64) -> Self {
        self.dice_seed = Some(seed);
        self
    }

    /// Read overrides from `QUESTKEEPER_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparsable values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(value) = lookup("QUESTKEEPER_HP_GAIN") {
            match value.parse() {
                Ok(policy) => config.hp_gain = policy,
                Err(e) => tracing::warn!("Ignoring QUESTKEEPER_HP_GAIN: {e}"),
            }
        }
        if let Some(value) = lookup("QUESTKEEPER_MONSTER_SAVE_BONUS") {
            match value.trim().parse() {
                Ok(bonus) => config.default_monster_save_bonus = bonus,
                Err(_) => tracing::warn!(value = %value, "Ignoring QUESTKEEPER_MONSTER_SAVE_BONUS"),
            }
        }
        if let Some(value) = lookup("QUESTKEEPER_CONCENTRATION_CHECKS") {
            match value.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => config.concentration_checks = true,
                "0" | "false" | "no" | "off" => config.concentration_checks = false,
                _ => tracing::warn!(value = %value, "Ignoring QUESTKEEPER_CONCENTRATION_CHECKS"),
            }
        }
        if let Some(value) = lookup("QUESTKEEPER_SEED") {
            match value.trim().parse() {
                Ok(seed) => config.dice_seed = Some(seed),
                Err(_) => tracing::warn!(value = %value, "Ignoring QUESTKEEPER_SEED"),
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.hp_gain, HpGainPolicy::Average);
        assert_eq!(config.default_monster_save_bonus, 2);
        assert!(config.concentration_checks);
        assert!(config.dice_seed.is_none());
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("QUESTKEEPER_HP_GAIN", "roll"),
            ("QUESTKEEPER_MONSTER_SAVE_BONUS", "3"),
            ("QUESTKEEPER_CONCENTRATION_CHECKS", "off"),
            ("QUESTKEEPER_SEED", "99"),
        ]
        .into_iter()
        .collect();

        let config = EngineConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.hp_gain, HpGainPolicy::Roll);
        assert_eq!(config.default_monster_save_bonus, 3);
        assert!(!config.concentration_checks);
        assert_eq!(config.dice_seed, Some(99));
    }

    #[test]
    fn test_bad_values_keep_defaults() {
        let config = EngineConfig::from_lookup(|k| match k {
            "QUESTKEEPER_HP_GAIN" => Some("sometimes".to_string()),
            "QUESTKEEPER_SEED" => Some("not a number".to_string()),
            _ => None,
        });
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_json() {
        let config: EngineConfig = serde_json::from_str(r#"{"hp_gain": "Roll"}"#).unwrap();
        assert_eq!(config.hp_gain, HpGainPolicy::Roll);
        assert_eq!(config.default_monster_save_bonus, 2);
    }
}
