//! Dice rolling system.
//!
//! Every random number in the engine comes from a [`DiceRoller`], so the
//! game loop can use a real RNG while tests substitute a scripted source.
//! Standard notation (XdY+Z, keep highest/lowest) is parsed into a
//! [`DiceExpression`] and rolled through any roller.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for dice parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0}")]
    InvalidDieSize(u32),
    #[error("No dice specified")]
    NoDice,
    #[error("Cannot keep {keep} dice when only rolling {count} (in {notation})")]
    InvalidKeepCount {
        keep: u32,
        count: u32,
        notation: String,
    },
    #[error("Cannot roll {count} dice at once (at most {max})")]
    TooManyDice { count: u32, max: u32 },
}

/// Most dice a single notation component may roll.
pub const MAX_DICE: u32 = 100;

/// Source of die results.
///
/// `roll` is the single randomness primitive; everything else is built on
/// repeated calls to it.
pub trait DiceRoller {
    /// Roll one die with `sides` faces, returning a value in `1..=sides`.
    fn roll(&mut self, sides: u32) -> u32;

    /// Roll `count` dice with `sides` faces each.
    fn roll_many(&mut self, count: u32, sides: u32) -> Vec<u32> {
        (0..count).map(|_| self.roll(sides)).collect()
    }

    /// Sum of `count` dice with `sides` faces each.
    fn roll_sum(&mut self, count: u32, sides: u32) -> i32 {
        self.roll_many(count, sides).iter().map(|r| *r as i32).sum()
    }

    fn d20(&mut self) -> u32 {
        self.roll(20)
    }
}

/// A [`DiceRoller`] backed by a `rand` RNG.
#[derive(Debug, Clone)]
pub struct RandomDice<R = StdRng> {
    rng: R,
}

impl RandomDice<StdRng> {
    /// Seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible sequence for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seeded when a seed is given, entropy otherwise.
    pub fn from_seed_option(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }
}

impl<R: Rng> RandomDice<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }
}

impl Default for RandomDice<StdRng> {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl<R: Rng> DiceRoller for RandomDice<R> {
    fn roll(&mut self, sides: u32) -> u32 {
        self.rng.gen_range(1..=sides.max(1))
    }
}

/// Standard D&D die types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DieType {
    D4,
    D6,
    D8,
    D10,
    D12,
    D20,
    D100,
}

impl DieType {
    pub fn sides(&self) -> u32 {
        match self {
            DieType::D4 => 4,
            DieType::D6 => 6,
            DieType::D8 => 8,
            DieType::D10 => 10,
            DieType::D12 => 12,
            DieType::D20 => 20,
            DieType::D100 => 100,
        }
    }

    pub fn from_sides(sides: u32) -> Option<DieType> {
        match sides {
            4 => Some(DieType::D4),
            6 => Some(DieType::D6),
            8 => Some(DieType::D8),
            10 => Some(DieType::D10),
            12 => Some(DieType::D12),
            20 => Some(DieType::D20),
            100 => Some(DieType::D100),
            _ => None,
        }
    }

    /// Fixed per-level hit point gain when not rolling (half the die, rounded up, plus one).
    pub fn average_gain(&self) -> u32 {
        self.sides() / 2 + 1
    }
}

impl fmt::Display for DieType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.sides())
    }
}

/// A single die component of a dice expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceComponent {
    pub count: u32,
    pub die_type: DieType,
    pub keep_highest: Option<u32>,
    pub keep_lowest: Option<u32>,
}

/// A complete dice expression (e.g., 2d6+3).
///
/// Serialized as its notation string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DiceExpression {
    pub components: Vec<DiceComponent>,
    pub modifier: i32,
    pub original: String,
}

impl DiceExpression {
    /// Parse a dice notation string.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let notation = notation.trim().to_lowercase();
        if notation.is_empty() {
            return Err(DiceError::NoDice);
        }

        let mut components = Vec::new();
        let mut modifier: i32 = 0;
        let mut current = String::new();
        let mut sign: i32 = 1;

        for ch in notation.chars() {
            match ch {
                '+' | '-' => {
                    if !current.is_empty() {
                        Self::parse_component(&current, sign, &mut components, &mut modifier)?;
                        current.clear();
                    }
                    sign = if ch == '+' { 1 } else { -1 };
                }
                ' ' => continue,
                _ => current.push(ch),
            }
        }

        if !current.is_empty() {
            Self::parse_component(&current, sign, &mut components, &mut modifier)?;
        }

        if components.is_empty() && modifier == 0 {
            return Err(DiceError::NoDice);
        }

        Ok(DiceExpression {
            components,
            modifier,
            original: notation,
        })
    }

    fn parse_component(
        s: &str,
        sign: i32,
        components: &mut Vec<DiceComponent>,
        modifier: &mut i32,
    ) -> Result<(), DiceError> {
        if let Some(d_pos) = s.find('d') {
            if sign < 0 {
                return Err(DiceError::InvalidNotation(s.to_string()));
            }
            let count_str = &s[..d_pos];
            let rest = &s[d_pos + 1..];

            let count: u32 = if count_str.is_empty() {
                1
            } else {
                count_str
                    .parse()
                    .map_err(|_| DiceError::InvalidNotation(s.to_string()))?
            };
            if count > MAX_DICE {
                return Err(DiceError::TooManyDice {
                    count,
                    max: MAX_DICE,
                });
            }

            let (sides_str, keep_highest, keep_lowest) = if let Some(kh_pos) = rest.find("kh") {
                let sides = &rest[..kh_pos];
                let keep: u32 = rest[kh_pos + 2..]
                    .parse()
                    .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
                (sides, Some(keep), None)
            } else if let Some(kl_pos) = rest.find("kl") {
                let sides = &rest[..kl_pos];
                let keep: u32 = rest[kl_pos + 2..]
                    .parse()
                    .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
                (sides, None, Some(keep))
            } else {
                (rest, None, None)
            };

            let sides: u32 = sides_str
                .parse()
                .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;

            let die_type = DieType::from_sides(sides).ok_or(DiceError::InvalidDieSize(sides))?;

            if let Some(keep) = keep_highest.or(keep_lowest) {
                if keep > count {
                    return Err(DiceError::InvalidKeepCount {
                        keep,
                        count,
                        notation: s.to_string(),
                    });
                }
            }

            components.push(DiceComponent {
                count,
                die_type,
                keep_highest,
                keep_lowest,
            });
        } else {
            let value: i32 = s
                .parse()
                .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
            *modifier = modifier.saturating_add(sign * value);
        }

        Ok(())
    }

    /// Roll the expression through the given roller.
    pub fn roll_with(&self, dice: &mut dyn DiceRoller) -> RollResult {
        let mut component_results = Vec::new();

        for component in &self.components {
            let rolls = dice.roll_many(component.count, component.die_type.sides());

            let mut kept = rolls.clone();
            if let Some(keep) = component.keep_highest {
                kept.sort_by(|a, b| b.cmp(a));
                kept.truncate(keep as usize);
            } else if let Some(keep) = component.keep_lowest {
                kept.sort();
                kept.truncate(keep as usize);
            }

            let subtotal: u32 = kept.iter().sum();
            component_results.push(ComponentResult {
                die_type: component.die_type,
                rolls,
                kept,
                subtotal,
            });
        }

        let dice_total: i32 = component_results.iter().map(|c| c.subtotal as i32).sum();

        // Natural 20/1 only matters for a lone d20 (attack rolls and saves)
        let d20_roll = component_results
            .iter()
            .find(|c| c.die_type == DieType::D20 && c.rolls.len() == 1)
            .and_then(|c| c.rolls.first().copied());

        RollResult {
            expression: self.clone(),
            component_results,
            modifier: self.modifier,
            dice_total,
            total: dice_total + self.modifier,
            natural_20: d20_roll == Some(20),
            natural_1: d20_roll == Some(1),
        }
    }

    /// A constant expression with no dice.
    pub fn flat(value: i32) -> Self {
        Self::from_parts(Vec::new(), value)
    }

    fn from_parts(components: Vec<DiceComponent>, modifier: i32) -> Self {
        let parts: Vec<String> = components
            .iter()
            .map(|c| {
                let keep = match (c.keep_highest, c.keep_lowest) {
                    (Some(k), _) => format!("kh{k}"),
                    (None, Some(k)) => format!("kl{k}"),
                    (None, None) => String::new(),
                };
                format!("{}{}{}", c.count, c.die_type, keep)
            })
            .collect();

        let original = if parts.is_empty() {
            modifier.to_string()
        } else if modifier != 0 {
            format!("{}{modifier:+}", parts.join("+"))
        } else {
            parts.join("+")
        };

        Self {
            components,
            modifier,
            original,
        }
    }

    /// Same dice with `extra` added to the flat modifier.
    pub fn with_modifier(&self, extra: i32) -> Self {
        Self::from_parts(self.components.clone(), self.modifier.saturating_add(extra))
    }

    /// Multiply every die count by `factor`, leaving the modifier alone.
    pub fn scaled(&self, factor: u32) -> Self {
        let components = self
            .components
            .iter()
            .map(|c| DiceComponent {
                count: c.count.saturating_mul(factor),
                ..c.clone()
            })
            .collect();
        Self::from_parts(components, self.modifier)
    }

    /// `times` copies of this expression added together.
    pub fn repeated(&self, times: u32) -> Self {
        Self::from_parts(
            self.scaled(times).components,
            self.modifier.saturating_mul(times as i32),
        )
    }

    /// Sum of two expressions.
    pub fn plus(&self, other: &DiceExpression) -> Self {
        let mut components = self.components.clone();
        components.extend(other.components.iter().cloned());
        Self::from_parts(components, self.modifier + other.modifier)
    }

    /// Lowest possible total.
    pub fn minimum(&self) -> i32 {
        let dice: i32 = self
            .components
            .iter()
            .map(|c| c.keep_highest.or(c.keep_lowest).unwrap_or(c.count) as i32)
            .fold(0i32, i32::saturating_add);
        dice.saturating_add(self.modifier)
    }

    /// Highest possible total.
    pub fn maximum(&self) -> i32 {
        let dice: i32 = self
            .components
            .iter()
            .map(|c| {
                let kept = c.keep_highest.or(c.keep_lowest).unwrap_or(c.count);
                kept.saturating_mul(c.die_type.sides()).min(i32::MAX as u32) as i32
            })
            .fold(0i32, i32::saturating_add);
        dice.saturating_add(self.modifier)
    }
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceExpression::parse(s)
    }
}

impl TryFrom<String> for DiceExpression {
    type Error = DiceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DiceExpression::parse(&value)
    }
}

impl From<DiceExpression> for String {
    fn from(expr: DiceExpression) -> Self {
        expr.original
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

/// Result of rolling a single dice component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentResult {
    pub die_type: DieType,
    pub rolls: Vec<u32>,
    pub kept: Vec<u32>,
    pub subtotal: u32,
}

/// Complete result of a dice roll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollResult {
    pub expression: DiceExpression,
    pub component_results: Vec<ComponentResult>,
    pub modifier: i32,
    /// Sum of the kept dice, without the flat modifier.
    pub dice_total: i32,
    pub total: i32,
    pub natural_20: bool,
    pub natural_1: bool,
}

impl RollResult {
    /// Format the individual dice results for display.
    pub fn dice_display(&self) -> String {
        let dice_parts: Vec<String> = self
            .component_results
            .iter()
            .map(|c| {
                if c.rolls.len() > c.kept.len() {
                    let mut kept_used = vec![false; c.kept.len()];
                    let mut shown = Vec::new();

                    for &roll in &c.rolls {
                        let is_kept = c.kept.iter().enumerate().any(|(i, &k)| {
                            if k == roll && !kept_used[i] {
                                kept_used[i] = true;
                                true
                            } else {
                                false
                            }
                        });

                        if is_kept {
                            shown.push(format!("{roll}"));
                        } else {
                            shown.push(format!("({roll})"));
                        }
                    }
                    format!("[{}]", shown.join(", "))
                } else {
                    format!(
                        "[{}]",
                        c.rolls
                            .iter()
                            .map(|r| r.to_string())
                            .collect::<Vec<_>>()
                            .join(", ")
                    )
                }
            })
            .collect();

        let dice_str = dice_parts.join(" + ");
        if self.modifier > 0 {
            format!("{} + {}", dice_str, self.modifier)
        } else if self.modifier < 0 {
            format!("{} - {}", dice_str, self.modifier.abs())
        } else {
            dice_str
        }
    }

    /// Total with the dice doubled and the flat modifier added once.
    pub fn critical_total(&self) -> i32 {
        self.dice_total * 2 + self.modifier
    }

    /// Check if the roll meets or exceeds a DC.
    pub fn meets_dc(&self, dc: i32) -> bool {
        self.total >= dc
    }
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.dice_display(), self.total)
    }
}

/// Convenience function to roll dice from a notation string.
pub fn roll(notation: &str, dice: &mut dyn DiceRoller) -> Result<RollResult, DiceError> {
    let expr = DiceExpression::parse(notation)?;
    Ok(expr.roll_with(dice))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedDice;

    #[test]
    fn test_parse_simple() {
        let expr = DiceExpression::parse("1d20").unwrap();
        assert_eq!(expr.components.len(), 1);
        assert_eq!(expr.components[0].count, 1);
        assert_eq!(expr.components[0].die_type, DieType::D20);
        assert_eq!(expr.modifier, 0);
    }

    #[test]
    fn test_parse_with_modifier() {
        let expr = DiceExpression::parse("1d20+5").unwrap();
        assert_eq!(expr.modifier, 5);

        let expr = DiceExpression::parse("2d6-2").unwrap();
        assert_eq!(expr.modifier, -2);
    }

    #[test]
    fn test_parse_multiple_dice() {
        let expr = DiceExpression::parse("2d6+1d4+3").unwrap();
        assert_eq!(expr.components.len(), 2);
        assert_eq!(expr.modifier, 3);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(DiceExpression::parse(""), Err(DiceError::NoDice)));
        assert!(matches!(
            DiceExpression::parse("2d7"),
            Err(DiceError::InvalidDieSize(7))
        ));
        assert!(DiceExpression::parse("xd6").is_err());
        assert!(DiceExpression::parse("1d6-1d4").is_err());
    }

    #[test]
    fn test_invalid_keep_count() {
        let result = DiceExpression::parse("4d6kh5");
        assert!(matches!(
            result.unwrap_err(),
            DiceError::InvalidKeepCount {
                keep: 5,
                count: 4,
                ..
            }
        ));

        assert!(DiceExpression::parse("2d20kl3").is_err());
        assert!(DiceExpression::parse("4d6kh4").is_ok());
    }

    #[test]
    fn test_dice_count_is_capped() {
        assert!(matches!(
            DiceExpression::parse("4294967295d6"),
            Err(DiceError::TooManyDice { count: 4294967295, max: MAX_DICE })
        ));
        assert!(matches!(
            DiceExpression::parse("101d6"),
            Err(DiceError::TooManyDice { count: 101, .. })
        ));
        assert_eq!(DiceExpression::parse("100d6").unwrap().maximum(), 600);
        // Counts too large for u32 never parse at all.
        assert!(matches!(
            DiceExpression::parse("99999999999d6"),
            Err(DiceError::InvalidNotation(_))
        ));
    }

    #[test]
    fn test_scaling_saturates() {
        let huge = DiceExpression::parse("100d20+5").unwrap().scaled(u32::MAX);
        assert_eq!(huge.components[0].count, u32::MAX);
        assert_eq!(huge.maximum(), i32::MAX);
    }

    #[test]
    fn test_roll_stays_in_bounds() {
        let mut dice = RandomDice::seeded(7);
        for sides in [2, 4, 6, 8, 10, 12, 20, 100] {
            for _ in 0..500 {
                let value = dice.roll(sides);
                assert!((1..=sides).contains(&value), "d{sides} rolled {value}");
            }
        }
    }

    #[test]
    fn test_every_face_is_reachable() {
        let mut dice = RandomDice::from_entropy();
        let mut seen = [false; 6];
        for _ in 0..2000 {
            seen[dice.roll(6) as usize - 1] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_seeded_dice_repeat() {
        let mut a = RandomDice::seeded(42);
        let mut b = RandomDice::seeded(42);
        let first: Vec<u32> = (0..20).map(|_| a.roll(20)).collect();
        let second: Vec<u32> = (0..20).map(|_| b.roll(20)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_expression_range() {
        let expr = DiceExpression::parse("2d6+3").unwrap();
        assert_eq!(expr.minimum(), 5);
        assert_eq!(expr.maximum(), 15);

        let mut dice = RandomDice::seeded(3);
        for _ in 0..200 {
            let result = expr.roll_with(&mut dice);
            assert!(result.total >= 5 && result.total <= 15);
        }
    }

    #[test]
    fn test_expression_arithmetic() {
        let base = DiceExpression::parse("1d10").unwrap();
        assert_eq!(base.scaled(3).to_string(), "3d10");

        let upcast = DiceExpression::parse("8d6")
            .unwrap()
            .plus(&DiceExpression::parse("2d6").unwrap());
        assert_eq!(upcast.to_string(), "8d6+2d6");
        assert_eq!(upcast.maximum(), 60);

        let weapon = DiceExpression::parse("1d8").unwrap().with_modifier(3);
        assert_eq!(weapon.to_string(), "1d8+3");
        assert_eq!(weapon.with_modifier(-5).to_string(), "1d8-2");
        assert_eq!(DiceExpression::flat(1).maximum(), 1);
        assert_eq!(DiceExpression::parse("1d4+1").unwrap().repeated(2).to_string(), "2d4+2");
    }

    #[test]
    fn test_keep_highest_drops_lowest() {
        let mut dice = ScriptedDice::new([2, 6, 1, 5]);
        let result = roll("4d6kh3", &mut dice).unwrap();
        assert_eq!(result.dice_total, 13);
        assert_eq!(result.dice_display(), "[2, 6, (1), 5]");
    }

    #[test]
    fn test_critical_total_doubles_dice_only() {
        let mut dice = ScriptedDice::new([4, 3]);
        let result = roll("2d6+2", &mut dice).unwrap();
        assert_eq!(result.total, 9);
        assert_eq!(result.critical_total(), 16);
    }

    #[test]
    fn test_natural_flags() {
        let mut dice = ScriptedDice::new([20]);
        let result = roll("1d20+3", &mut dice).unwrap();
        assert!(result.natural_20);
        assert!(!result.natural_1);
        assert_eq!(result.to_string(), "[20] + 3 = 23");
    }
}
