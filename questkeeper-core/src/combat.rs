//! Turn-based combat.
//!
//! State machine: `NotStarted` -> `RoundInProgress` -> `Ended`. Each call to
//! [`CombatEncounter::take_action`] resolves one action for the current
//! actor. Rejected actions change nothing and leave the turn with the same
//! actor.
//!
//! Turn loop invariants:
//! - a combatant at 0 HP keeps its place in the initiative order but is
//!   skipped as an actor and cannot be targeted
//! - a temporary AC bonus lasts until the start of its owner's next turn
//! - conditions tick down at the end of their owner's turn, even a skipped one

use crate::abilities::Ability;
use crate::combatant::{Combatant, Creature};
use crate::config::EngineConfig;
use crate::dice::DiceRoller;
use crate::effects::use_effect;
use crate::error::RulesError;
use crate::spells::{get_spell, roll_attack, roll_saving_throw, AttackRoll, SpellResult};
use std::fmt;

/// Rounds in a row where nobody can act before the encounter gives up.
const MAX_IDLE_ROUNDS: usize = 100;

/// Index of a participant in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticipantId(pub usize);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Party,
    Enemies,
}

impl Side {
    pub fn opponent(&self) -> Side {
        match self {
            Side::Party => Side::Enemies,
            Side::Enemies => Side::Party,
        }
    }
}

/// How an encounter ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombatOutcome {
    Victory,
    Defeat,
    Fled,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombatState {
    NotStarted,
    RoundInProgress { round: u32 },
    Ended(CombatOutcome),
}

/// A concentration spell being maintained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Concentration {
    pub spell: String,
    /// Source tag of the conditions the spell imposed.
    pub source: String,
    pub affected: Vec<ParticipantId>,
}

#[derive(Debug, Clone)]
pub struct Participant {
    pub id: ParticipantId,
    pub creature: Creature,
    pub side: Side,
    pub initiative: i32,
    pub fled: bool,
    pub concentration: Option<Concentration>,
}

impl Participant {
    pub fn combatant(&self) -> &dyn Combatant {
        self.creature.as_combatant()
    }

    pub fn combatant_mut(&mut self) -> &mut dyn Combatant {
        self.creature.as_combatant_mut()
    }

    pub fn name(&self) -> &str {
        self.combatant().name()
    }

    /// Still in the fight: conscious and hasn't fled.
    pub fn is_active(&self) -> bool {
        !self.fled && self.combatant().is_alive()
    }
}

/// One thing a combatant does on its turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Attack with one of the actor's attacks (the first if `None`).
    Attack {
        target: ParticipantId,
        attack: Option<usize>,
    },
    /// Cast a known spell. `slot_level: None` uses the spell's level and
    /// `target: None` targets the caster.
    CastSpell {
        spell: String,
        slot_level: Option<u8>,
        target: Option<ParticipantId>,
    },
    /// Use an effect on the actor: a feature, a potion, a charged item.
    UseEffect { effect: String },
    Flee,
    EndTurn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Resolved,
    Rejected,
}

/// Structured result of an action, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    pub actor: Option<ParticipantId>,
    pub outcome: ActionOutcome,
    pub message: String,
    pub attack: Option<AttackRoll>,
    pub spell: Option<SpellResult>,
    pub damage: i32,
    pub healing: i32,
    /// Follow-ups: concentration, creatures going down, skipped turns.
    pub events: Vec<String>,
    /// Set when this action ended the encounter.
    pub ended: Option<CombatOutcome>,
}

impl ActionResult {
    fn resolved(actor: ParticipantId, message: impl Into<String>) -> Self {
        Self {
            actor: Some(actor),
            outcome: ActionOutcome::Resolved,
            message: message.into(),
            attack: None,
            spell: None,
            damage: 0,
            healing: 0,
            events: Vec::new(),
            ended: None,
        }
    }

    fn rejected(actor: Option<ParticipantId>, message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::warn!(actor = ?actor, "Action rejected: {message}");
        Self {
            actor,
            outcome: ActionOutcome::Rejected,
            ..Self::resolved(ParticipantId(0), message)
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.outcome == ActionOutcome::Rejected
    }
}

/// A single fight between the party and a group of enemies.
#[derive(Debug)]
pub struct CombatEncounter {
    config: EngineConfig,
    participants: Vec<Participant>,
    order: Vec<ParticipantId>,
    turn: usize,
    state: CombatState,
    /// Skips and expiries from turn changes, reported with the next result.
    pending_events: Vec<String>,
}

impl CombatEncounter {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            participants: Vec::new(),
            order: Vec::new(),
            turn: 0,
            state: CombatState::NotStarted,
            pending_events: Vec::new(),
        }
    }

    /// Add a combatant before the fight starts. Monsters sharing a name are
    /// numbered.
    pub fn add(
        &mut self,
        creature: impl Into<Creature>,
        side: Side,
    ) -> Result<ParticipantId, RulesError> {
        if self.state != CombatState::NotStarted {
            return Err(RulesError::illegal_state(
                "combatants can only join before combat starts",
            ));
        }
        let mut creature = creature.into();
        if let Creature::Monster(monster) = &mut creature {
            let base = monster.name.clone();
            let mut n = 1;
            while self.participants.iter().any(|p| p.name() == monster.name) {
                n += 1;
                monster.name = format!("{base} {n}");
            }
        }
        let id = ParticipantId(self.participants.len());
        self.participants.push(Participant {
            id,
            creature,
            side,
            initiative: 0,
            fled: false,
            concentration: None,
        });
        Ok(id)
    }

    pub fn state(&self) -> CombatState {
        self.state
    }

    pub fn round(&self) -> u32 {
        match self.state {
            CombatState::RoundInProgress { round } => round,
            _ => 0,
        }
    }

    pub fn is_over(&self) -> bool {
        matches!(self.state, CombatState::Ended(_))
    }

    pub fn outcome(&self) -> Option<CombatOutcome> {
        match self.state {
            CombatState::Ended(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.get(id.0)
    }

    pub fn participant_mut(&mut self, id: ParticipantId) -> Option<&mut Participant> {
        self.participants.get_mut(id.0)
    }

    /// Find a participant by name, ignoring case.
    pub fn find(&self, name: &str) -> Option<ParticipantId> {
        self.participants
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
            .map(|p| p.id)
    }

    /// Initiative order, highest first. Empty before the fight starts.
    pub fn initiative_order(&self) -> &[ParticipantId] {
        &self.order
    }

    /// Whose turn it is.
    pub fn current_actor(&self) -> Option<ParticipantId> {
        match self.state {
            CombatState::RoundInProgress { .. } => self.order.get(self.turn).copied(),
            _ => None,
        }
    }

    /// Active participants on `side`.
    pub fn active(&self, side: Side) -> impl Iterator<Item = &Participant> {
        self.participants
            .iter()
            .filter(move |p| p.side == side && p.is_active())
    }

    /// XP for enemies brought down so far.
    pub fn experience_earned(&self) -> u32 {
        self.participants
            .iter()
            .filter(|p| p.side == Side::Enemies && !p.combatant().is_alive())
            .filter_map(|p| p.creature.as_monster())
            .map(|m| m.xp)
            .sum()
    }

    /// Roll initiative and begin round 1.
    ///
    /// Ties go to the higher DEX modifier, then to whoever joined first.
    pub fn start(&mut self, dice: &mut dyn DiceRoller) -> Result<&[ParticipantId], RulesError> {
        if self.state != CombatState::NotStarted {
            return Err(RulesError::illegal_state("combat has already started"));
        }
        for side in [Side::Party, Side::Enemies] {
            if self.active(side).next().is_none() {
                return Err(RulesError::invalid_argument(format!(
                    "combat needs at least one conscious combatant on {side:?}"
                )));
            }
        }

        for p in &mut self.participants {
            let modifier = p.combatant().initiative_modifier() as i32;
            p.initiative = dice.d20() as i32 + modifier;
            tracing::debug!(combatant = %p.name(), initiative = p.initiative, "Initiative");
        }

        let mut order: Vec<&Participant> = self.participants.iter().collect();
        order.sort_by(|a, b| {
            b.initiative
                .cmp(&a.initiative)
                .then_with(|| {
                    let dex = |p: &Participant| p.combatant().ability_modifier(Ability::Dexterity);
                    dex(b).cmp(&dex(a))
                })
                .then_with(|| a.id.cmp(&b.id))
        });
        self.order = order.into_iter().map(|p| p.id).collect();
        self.turn = 0;
        self.state = CombatState::RoundInProgress { round: 1 };

        tracing::info!(
            combatants = self.participants.len(),
            first = %self.participants[self.order[0].0].name(),
            "Combat started"
        );
        self.begin_turn();
        Ok(&self.order)
    }

    /// End the encounter early.
    pub fn abort(&mut self) {
        if !self.is_over() {
            self.finish(CombatOutcome::Aborted);
        }
    }

    /// Hand the creatures back with their sides, e.g. to save the party.
    pub fn into_creatures(self) -> Vec<(Side, Creature)> {
        self.participants
            .into_iter()
            .map(|p| (p.side, p.creature))
            .collect()
    }

    /// Resolve one action for the current actor.
    pub fn take_action(&mut self, action: Action, dice: &mut dyn DiceRoller) -> ActionResult {
        let Some(actor) = self.current_actor() else {
            return ActionResult::rejected(None, "Combat is not in progress.");
        };

        let mut result = match action {
            Action::Attack { target, attack } => self.resolve_attack(actor, target, attack, dice),
            Action::CastSpell {
                spell,
                slot_level,
                target,
            } => self.resolve_spell(actor, &spell, slot_level, target, dice),
            Action::UseEffect { effect } => self.resolve_effect(actor, &effect, dice),
            Action::Flee => self.resolve_flee(actor),
            Action::EndTurn => {
                ActionResult::resolved(actor, format!("{} holds.", self.name_of(actor)))
            }
        };
        if result.is_rejected() {
            return result;
        }

        if !self.is_over() {
            if let Some(outcome) = self.check_outcome() {
                self.finish(outcome);
            } else {
                self.end_turn(actor);
            }
        }
        result.events.append(&mut self.pending_events);
        result.ended = self.outcome();
        result
    }

    fn name_of(&self, id: ParticipantId) -> String {
        self.participant(id)
            .map(|p| p.name().to_string())
            .unwrap_or_else(|| id.to_string())
    }

    /// A target that exists, isn't the actor and is still in the fight.
    fn check_target(&self, actor: ParticipantId, target: ParticipantId) -> Result<(), String> {
        let Some(p) = self.participant(target) else {
            return Err(format!("There is no combatant {target}."));
        };
        if target == actor {
            return Err(format!("{} cannot target themselves.", p.name()));
        }
        if p.fled {
            return Err(format!("{} has fled.", p.name()));
        }
        if !p.combatant().is_alive() {
            return Err(format!("{} is already down.", p.name()));
        }
        Ok(())
    }

    /// Mutable access to two different participants.
    fn pair_mut(
        &mut self,
        a: ParticipantId,
        b: ParticipantId,
    ) -> Option<(&mut Participant, &mut Participant)> {
        if a == b || a.0 >= self.participants.len() || b.0 >= self.participants.len() {
            return None;
        }
        if a.0 < b.0 {
            let (left, right) = self.participants.split_at_mut(b.0);
            Some((&mut left[a.0], &mut right[0]))
        } else {
            let (left, right) = self.participants.split_at_mut(a.0);
            Some((&mut right[0], &mut left[b.0]))
        }
    }

    fn resolve_attack(
        &mut self,
        actor: ParticipantId,
        target: ParticipantId,
        attack_index: Option<usize>,
        dice: &mut dyn DiceRoller,
    ) -> ActionResult {
        if let Err(message) = self.check_target(actor, target) {
            return ActionResult::rejected(Some(actor), message);
        }
        let Some((attacker, defender)) = self.pair_mut(actor, target) else {
            return ActionResult::rejected(Some(actor), "Invalid target.");
        };
        let attacks = attacker.combatant().attacks();
        let Some(attack) = attacks.get(attack_index.unwrap_or(0)) else {
            return ActionResult::rejected(
                Some(actor),
                format!("{} has no such attack.", attacker.name()),
            );
        };

        let attacker_name = attacker.name().to_string();
        let defender = defender.combatant_mut();
        let target_ac = defender.armor_class();
        let roll = roll_attack(attack.attack_bonus, target_ac, dice);

        let mut result = ActionResult::resolved(actor, String::new());
        result.attack = Some(roll);
        let header = format!(
            "{attacker_name} attacks {} with {}: {} vs AC {target_ac}.",
            defender.name(),
            attack.name,
            roll.total
        );

        if !roll.hit {
            result.message = format!("{header} Miss!");
            return result;
        }

        let damage = attack.damage.roll_with(dice);
        let amount = if roll.critical {
            damage.critical_total()
        } else {
            damage.total
        };
        let dealt = defender.take_typed_damage(amount.max(0), attack.damage_type, attack.magical);
        result.damage = dealt.damage_taken;
        result.message = format!(
            "{header} {}Hit! {} {} damage.",
            if roll.critical { "Critical " } else { "" },
            dealt.damage_taken,
            attack.damage_type
        );

        self.after_damage(target, dealt.damage_taken, dice, &mut result.events);
        result
    }

    fn resolve_spell(
        &mut self,
        actor: ParticipantId,
        spell_name: &str,
        slot_level: Option<u8>,
        target: Option<ParticipantId>,
        dice: &mut dyn DiceRoller,
    ) -> ActionResult {
        let Some(spell) = get_spell(spell_name) else {
            return ActionResult::rejected(Some(actor), format!("Unknown spell: '{spell_name}'."));
        };
        let caster_name = self.name_of(actor);
        let Some(caster) = self.participant(actor) else {
            return ActionResult::rejected(Some(actor), "Invalid actor.");
        };
        if !caster.combatant().knows_spell(spell.name()) {
            return ActionResult::rejected(
                Some(actor),
                format!("{caster_name} doesn't know {}.", spell.name()),
            );
        }

        let slot = if spell.is_cantrip() {
            0
        } else {
            slot_level.unwrap_or(spell.level())
        };
        if !spell.is_cantrip() && slot < spell.level() {
            return ActionResult::rejected(
                Some(actor),
                format!(
                    "Cannot cast {} using a level {slot} slot - requires at least level {}.",
                    spell.name(),
                    spell.level()
                ),
            );
        }
        if !caster.combatant().has_spell_slot(slot) {
            return ActionResult::rejected(
                Some(actor),
                format!("{caster_name} has no level {slot} spell slots remaining!"),
            );
        }

        // Targeting yourself is the same as no target.
        let target = target.filter(|t| *t != actor);
        if let Some(t) = target {
            if let Err(message) = self.check_target(actor, t) {
                return ActionResult::rejected(Some(actor), message);
            }
        }

        // A new concentration spell replaces the old one before it takes hold,
        // since both share the caster's condition source.
        let dropped = if spell.concentration() {
            self.end_concentration(actor)
        } else {
            None
        };

        let spell_result = match target {
            Some(t) => match self.pair_mut(actor, t) {
                Some((caster, target)) => spell.cast_at_level(
                    slot,
                    caster.combatant_mut(),
                    Some(target.combatant_mut()),
                    dice,
                ),
                None => return ActionResult::rejected(Some(actor), "Invalid target."),
            },
            None => match self.participant_mut(actor) {
                Some(caster) => spell.cast_at_level(slot, caster.combatant_mut(), None, dice),
                None => return ActionResult::rejected(Some(actor), "Invalid actor."),
            },
        };
        if spell_result.is_error() {
            let mut rejected = ActionResult::rejected(Some(actor), spell_result.message);
            rejected.events.extend(dropped);
            return rejected;
        }

        let mut result = ActionResult::resolved(actor, spell_result.message.clone());
        result.damage = spell_result.damage;
        result.healing = spell_result.healing;
        result.events.extend(dropped);

        if let Some(caster) = self.participant_mut(actor) {
            if !caster.combatant_mut().expend_spell_slot(slot) {
                tracing::warn!(caster = %caster_name, slot, "Spell slot vanished mid-cast");
            }
        }

        if spell.concentration() {
            let affected = match (spell_result.condition, target) {
                (Some(_), Some(t)) => vec![t],
                (Some(_), None) => vec![actor],
                _ => Vec::new(),
            };
            if let Some(caster) = self.participant_mut(actor) {
                caster.concentration = Some(Concentration {
                    spell: spell.name().to_string(),
                    source: spell.condition_source(&caster_name),
                    affected,
                });
            }
            tracing::debug!(caster = %caster_name, spell = %spell.name(), "Concentrating");
        }

        if spell_result.damage > 0 {
            let hit = target.unwrap_or(actor);
            self.after_damage(hit, spell_result.damage, dice, &mut result.events);
        }
        result.spell = Some(spell_result);
        result
    }

    fn resolve_effect(
        &mut self,
        actor: ParticipantId,
        effect: &str,
        dice: &mut dyn DiceRoller,
    ) -> ActionResult {
        let Some(p) = self.participant_mut(actor) else {
            return ActionResult::rejected(Some(actor), "Invalid actor.");
        };
        match use_effect(p.combatant_mut(), effect, dice) {
            Ok(outcome) => {
                if let Creature::Character(character) = &mut p.creature {
                    for spent in character.equipment.discard_spent() {
                        tracing::debug!(item = %spent.name, "Used up");
                    }
                }
                let mut result = ActionResult::resolved(actor, outcome.message);
                result.healing = outcome.healing;
                result
            }
            Err(e) => ActionResult::rejected(Some(actor), e.to_string()),
        }
    }

    fn resolve_flee(&mut self, actor: ParticipantId) -> ActionResult {
        let Some(p) = self.participant_mut(actor) else {
            return ActionResult::rejected(Some(actor), "Invalid actor.");
        };
        p.fled = true;
        let name = p.name().to_string();
        let side = p.side;
        let mut result = ActionResult::resolved(actor, format!("{name} flees!"));
        if let Some(message) = self.end_concentration(actor) {
            result.events.push(message);
        }
        if side == Side::Party {
            self.finish(CombatOutcome::Fled);
        }
        result
    }

    /// Concentration and knock-out follow-ups after `target` took damage.
    fn after_damage(
        &mut self,
        target: ParticipantId,
        damage: i32,
        dice: &mut dyn DiceRoller,
        events: &mut Vec<String>,
    ) {
        let Some(p) = self.participant(target) else {
            return;
        };
        let name = p.name().to_string();
        let down = !p.combatant().is_alive();
        let concentrating = p.concentration.is_some();

        if down {
            events.push(match p.creature {
                Creature::Character(_) => format!("{name} falls unconscious!"),
                Creature::Monster(_) => format!("{name} is defeated!"),
            });
            if let Some(message) = self.end_concentration(target) {
                events.push(message);
            }
            return;
        }

        if concentrating && damage > 0 && self.config.concentration_checks {
            let dc = (damage / 2).max(10);
            let save = roll_saving_throw(p.combatant(), Ability::Constitution, dc, dice);
            if save.success {
                events.push(format!(
                    "{name} makes a DC {dc} Constitution save ({}) and keeps concentrating.",
                    save.total
                ));
            } else {
                events.push(format!(
                    "{name} fails a DC {dc} Constitution save ({}).",
                    save.total
                ));
                if let Some(message) = self.end_concentration(target) {
                    events.push(message);
                }
            }
        }
    }

    /// Drop `id`'s concentration and lift the conditions it imposed.
    fn end_concentration(&mut self, id: ParticipantId) -> Option<String> {
        let p = self.participant_mut(id)?;
        let concentration = p.concentration.take()?;
        let name = p.name().to_string();
        for affected in &concentration.affected {
            if let Some(other) = self.participant_mut(*affected) {
                let removed = other
                    .combatant_mut()
                    .status_mut()
                    .remove_from_source(&concentration.source);
                if !removed.is_empty() {
                    tracing::debug!(
                        combatant = %other.name(),
                        removed = removed.len(),
                        "Conditions lifted"
                    );
                }
            }
        }
        tracing::debug!(caster = %name, spell = %concentration.spell, "Concentration ended");
        Some(format!(
            "{name} loses concentration on {}.",
            concentration.spell
        ))
    }

    fn check_outcome(&self) -> Option<CombatOutcome> {
        if self.active(Side::Party).next().is_none() {
            Some(CombatOutcome::Defeat)
        } else if self.active(Side::Enemies).next().is_none() {
            Some(CombatOutcome::Victory)
        } else {
            None
        }
    }

    fn finish(&mut self, outcome: CombatOutcome) {
        self.state = CombatState::Ended(outcome);
        for p in &mut self.participants {
            p.combatant_mut().status_mut().temporary_ac_bonus = 0;
        }
        tracing::info!(outcome = ?outcome, "Combat ended");
    }

    /// Tick the actor's conditions, then move to the next one able to act.
    fn end_turn(&mut self, actor: ParticipantId) {
        self.tick_conditions(actor);
        self.advance();
        self.begin_turn();
    }

    fn tick_conditions(&mut self, id: ParticipantId) {
        if let Some(p) = self.participant_mut(id) {
            let expired = p.combatant_mut().status_mut().tick_conditions();
            if !expired.is_empty() {
                let name = p.name().to_string();
                for condition in expired {
                    self.pending_events
                        .push(format!("{name} is no longer {}.", condition.name().to_lowercase()));
                }
            }
        }
    }

    fn advance(&mut self) {
        self.turn += 1;
        if self.turn >= self.order.len() {
            self.turn = 0;
            if let CombatState::RoundInProgress { round } = &mut self.state {
                *round += 1;
                tracing::info!(round = *round, "New round");
            }
        }
    }

    /// Settle on the next actor, skipping the fallen and the incapacitated.
    fn begin_turn(&mut self) {
        let limit = self.order.len() * MAX_IDLE_ROUNDS;
        for _ in 0..limit {
            let id = self.order[self.turn];
            let Some(p) = self.participant_mut(id) else {
                self.advance();
                continue;
            };
            if !p.is_active() {
                self.advance();
                continue;
            }

            // Buffs that last "until the start of your next turn" end here.
            p.combatant_mut().status_mut().temporary_ac_bonus = 0;

            if p.combatant().is_incapacitated() {
                let name = p.name().to_string();
                tracing::debug!(combatant = %name, "Turn skipped");
                self.pending_events
                    .push(format!("{name} is incapacitated and loses the turn."));
                self.tick_conditions(id);
                self.advance();
                continue;
            }

            let name = p.name().to_string();
            tracing::debug!(combatant = %name, round = self.round(), "Turn start");
            return;
        }
        tracing::warn!("Nobody has been able to act for {MAX_IDLE_ROUNDS} rounds");
        self.finish(CombatOutcome::Aborted);
    }
}
