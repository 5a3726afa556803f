//! Live per-character state.
//!
//! This module provides:
//! - The character phase machine (idle, casting, locked, cooldown)
//! - Skill and burst cooldown counters and the normal attack combo
//! - Serializable status records for the frame log
//! - Elemental resonance from team composition

use emulator_common::{ActionKind, CharacterId, Element, Frame, ResourceError};
use serde::{Deserialize, Serialize};

use crate::config::{CharacterConfig, TalentLevels, TEAM_SIZE};
use crate::effect::{Effect, EffectManager, EffectPayload, EffectSource};
use crate::energy::EnergyPool;
use crate::motion::Kit;
use crate::stats::{talent_scaling, Panel, StatKind, StatLine, StatResolver};

/// Scheduler-visible state of a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterPhase {
    /// Free to act.
    Idle,
    /// Action dispatched, first hit not landed yet.
    Casting,
    /// Inside an action's animation lock.
    AnimationLocked,
    /// Free to act but the skill is cooling down.
    Cooldown,
}

/// Live state of one team member.
#[derive(Debug, Clone)]
pub struct CharacterState {
    id: CharacterId,
    config: CharacterConfig,
    kit: Kit,
    effects: EffectManager,
    current_hp: f64,
    skill_cooldown: Frame,
    burst_cooldown: Frame,
    combo: usize,
    casting_until: Frame,
    locked_until: Frame,
}

impl CharacterState {
    /// Creates a character with full HP and its static buffs applied.
    #[must_use]
    pub fn new(id: CharacterId, config: CharacterConfig, kit: Kit) -> Self {
        let mut effects = EffectManager::new();
        for buff in &config.static_buffs {
            effects.apply(Effect::new(
                buff.name.clone(),
                EffectSource::External,
                EffectPayload::Stats(buff.stats.clone()),
            ));
        }

        let mut state = Self {
            id,
            config,
            kit,
            effects,
            current_hp: 0.0,
            skill_cooldown: 0,
            burst_cooldown: 0,
            combo: 0,
            casting_until: 0,
            locked_until: 0,
        };
        state.current_hp = state.panel().max_hp;
        state
    }

    /// Returns the character ID.
    #[must_use]
    pub const fn id(&self) -> CharacterId {
        self.id
    }

    /// Returns the character name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Returns the character element.
    #[must_use]
    pub const fn element(&self) -> Element {
        self.config.element
    }

    /// Returns the character level.
    #[must_use]
    pub const fn level(&self) -> u32 {
        self.config.level
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &CharacterConfig {
        &self.config
    }

    /// Returns the motion kit.
    #[must_use]
    pub const fn kit(&self) -> &Kit {
        &self.kit
    }

    /// Returns the effect list.
    #[must_use]
    pub const fn effects(&self) -> &EffectManager {
        &self.effects
    }

    /// Returns the effect list mutably.
    pub fn effects_mut(&mut self) -> &mut EffectManager {
        &mut self.effects
    }

    /// Resolves the current stat panel.
    #[must_use]
    pub fn panel(&self) -> Panel {
        StatResolver::resolve(
            &self.config.base,
            &self.config.weapon,
            &self.config.artifacts,
            &self.effects,
        )
    }

    /// Returns the talent scale applied to an action's kit multipliers.
    #[must_use]
    pub fn talent_scale(&self, action: ActionKind) -> f64 {
        talent_scaling(self.config.talents.for_action(action))
    }

    /// Returns particles dropped by one skill cast.
    #[must_use]
    pub fn skill_particles(&self) -> u32 {
        self.config.particles.unwrap_or(self.kit.particles)
    }

    /// Builds the energy pool from the configuration.
    #[must_use]
    pub fn energy_pool(&self) -> EnergyPool {
        EnergyPool::new(
            self.config.name.clone(),
            self.config.initial_energy.unwrap_or(self.config.max_energy),
            self.config.max_energy,
            self.config.post_burst_energy,
        )
    }

    /// Returns current HP.
    #[must_use]
    pub const fn hp(&self) -> f64 {
        self.current_hp
    }

    /// Changes HP, clamped to `[0, max HP]`.
    pub fn adjust_hp(&mut self, delta: f64) {
        let max_hp = self.panel().max_hp;
        self.current_hp = (self.current_hp + delta).clamp(0.0, max_hp);
    }

    /// Returns the phase at `frame`.
    #[must_use]
    pub fn phase(&self, frame: Frame) -> CharacterPhase {
        if frame < self.casting_until {
            CharacterPhase::Casting
        } else if frame < self.locked_until {
            CharacterPhase::AnimationLocked
        } else if self.skill_cooldown > 0 {
            CharacterPhase::Cooldown
        } else {
            CharacterPhase::Idle
        }
    }

    /// Frame at which this character's current lock ends.
    #[must_use]
    pub const fn locked_until(&self) -> Frame {
        self.locked_until
    }

    /// Enters the cast and lock windows of a dispatched action.
    pub fn begin_action(&mut self, frame: Frame, first_hit: Frame, lock: Frame) {
        self.casting_until = frame + first_hit;
        self.locked_until = frame + lock;
    }

    /// Returns the normal attack stage the next normal attack uses.
    #[must_use]
    pub const fn combo(&self) -> usize {
        self.combo
    }

    /// Advances the combo after a normal attack.
    pub fn advance_combo(&mut self) {
        self.combo = (self.combo + 1) % self.kit.normal_attack.len().max(1);
    }

    /// Restarts the normal attack string.
    pub fn reset_combo(&mut self) {
        self.combo = 0;
    }

    /// Remaining skill cooldown.
    #[must_use]
    pub const fn skill_cooldown(&self) -> Frame {
        self.skill_cooldown
    }

    /// Remaining burst cooldown.
    #[must_use]
    pub const fn burst_cooldown(&self) -> Frame {
        self.burst_cooldown
    }

    /// Fails if the skill is cooling down.
    pub fn check_skill(&self) -> Result<(), ResourceError> {
        if self.skill_cooldown > 0 {
            return Err(ResourceError::SkillOnCooldown {
                character: self.config.name.clone(),
                remaining: self.skill_cooldown,
            });
        }
        Ok(())
    }

    /// Fails if the burst is cooling down.
    pub fn check_burst(&self) -> Result<(), ResourceError> {
        if self.burst_cooldown > 0 {
            return Err(ResourceError::BurstOnCooldown {
                character: self.config.name.clone(),
                remaining: self.burst_cooldown,
            });
        }
        Ok(())
    }

    /// Starts the skill cooldown.
    pub fn start_skill_cooldown(&mut self, frames: Frame) {
        self.skill_cooldown = frames;
    }

    /// Starts the burst cooldown.
    pub fn start_burst_cooldown(&mut self, frames: Frame) {
        self.burst_cooldown = frames;
    }

    /// Advances effects and cooldowns one frame. Returns expired effects.
    pub fn tick(&mut self) -> Vec<String> {
        self.skill_cooldown = self.skill_cooldown.saturating_sub(1);
        self.burst_cooldown = self.burst_cooldown.saturating_sub(1);
        self.effects.tick()
    }

    /// Builds the status record for the frame log.
    #[must_use]
    pub fn status(&self, frame: Frame, energy: Option<&EnergyPool>, on_field: bool) -> CharacterStatus {
        let panel = self.panel();
        CharacterStatus {
            slot: self.id.raw(),
            element: self.config.element,
            level: self.config.level,
            constellation: self.config.constellation,
            talents: self.config.talents,
            hp: self.current_hp,
            max_hp: panel.max_hp,
            energy: energy.map_or(0.0, |pool| pool.current),
            max_energy: energy.map_or(self.config.max_energy, |pool| pool.max),
            phase: self.phase(frame),
            on_field,
            skill_cooldown: self.skill_cooldown,
            burst_cooldown: self.burst_cooldown,
            effects: self
                .effects
                .query()
                .iter()
                .map(|effect| EffectStatus {
                    name: effect.name.clone(),
                    remaining: effect.duration,
                })
                .collect(),
            panel,
        }
    }
}

/// Active effect as shown in a status record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectStatus {
    /// Effect name.
    pub name: String,
    /// Frames left (`None` is permanent).
    pub remaining: Option<Frame>,
}

/// Per-frame character record of the `character` domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterStatus {
    /// Team slot.
    pub slot: u8,
    /// Element.
    pub element: Element,
    /// Level.
    pub level: u32,
    /// Constellation.
    pub constellation: u8,
    /// Talent levels.
    pub talents: TalentLevels,
    /// Current HP.
    pub hp: f64,
    /// Maximum HP.
    pub max_hp: f64,
    /// Energy held.
    pub energy: f64,
    /// Burst cost.
    pub max_energy: f64,
    /// Phase.
    pub phase: CharacterPhase,
    /// True for the active character.
    pub on_field: bool,
    /// Skill cooldown left.
    pub skill_cooldown: Frame,
    /// Burst cooldown left.
    pub burst_cooldown: Frame,
    /// Active effects.
    pub effects: Vec<EffectStatus>,
    /// Resolved stats.
    pub panel: Panel,
}

// ============================================================================
// Resonance
// ============================================================================

/// Returns resonance effects for a team's elements.
///
/// Resonance needs a full team; two members of an element grant its bonus.
#[must_use]
pub fn resonance_effects(elements: &[Element]) -> Vec<Effect> {
    if elements.len() < TEAM_SIZE {
        return Vec::new();
    }

    let count = |element: Element| elements.iter().filter(|&&e| e == element).count();
    let table = [
        (Element::Pyro, "Fervent Flames", StatLine::new(StatKind::AtkPercent, 0.25)),
        (Element::Hydro, "Soothing Water", StatLine::new(StatKind::HpPercent, 0.25)),
        (Element::Dendro, "Sprawling Greenery", StatLine::new(StatKind::ElementalMastery, 50.0)),
        (Element::Geo, "Enduring Rock", StatLine::new(StatKind::AllDmgBonus, 0.15)),
    ];

    table
        .into_iter()
        .filter(|(element, _, _)| count(*element) >= 2)
        .map(|(_, name, line)| {
            Effect::new(name, EffectSource::Resonance, EffectPayload::Stats(vec![line]))
        })
        .collect()
}
