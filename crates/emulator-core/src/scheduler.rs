//! The action-queue state machine.
//!
//! [`Emulation`] advances one frame at a time. Each frame it:
//! 1. ticks effects, energy deliveries, aura timers and cooldowns,
//! 2. resolves hits due this frame in dispatch order,
//! 3. dispatches queued actions while the previous animation lock has
//!    elapsed,
//! 4. records the frame's snapshot.
//!
//! Actions always execute in input order. A failed precondition skips the
//! action and the next one is tried in the same frame.

use std::collections::{BTreeMap, VecDeque};
use std::time::Instant;

use emulator_common::{
    seconds_to_frames, ActionError, ActionKind, CharacterId, ConfigError, Element,
    EmulationError, EmulationResult, Frame, ResourceError, TargetId,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::character::{resonance_effects, CharacterState};
use crate::config::{ActionSpec, EmulationInput, SimulationSettings, TeamSlot};
use crate::damage::{CritRoller, DamageCalculator, DamageEvent, DamageType, HitInput};
use crate::effect::{ApplyOutcome, Effect, EffectSource, EffectPayload, StackPolicy, Trigger};
use crate::energy::{EnergyManager, ParticleDrop, ParticleReceiver};
use crate::event_log::EventLog;
use crate::icd::IcdTracker;
use crate::motion::{EffectGrant, GrantTarget, HitElement, IcdTag, KitRegistry};
use crate::progress::ProgressSender;
use crate::reaction::{ApplyResult, ReactionCategory, ReactionEngine, ReactionKind};
use crate::summary::RunSummary;
use crate::target::TargetState;

/// Physical resistance removed by superconduct.
pub const SUPERCONDUCT_SHRED: f64 = 40.0;

/// Superconduct shred duration in seconds.
pub const SUPERCONDUCT_DURATION_S: f64 = 12.0;

/// Why an action was skipped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SkipReason {
    /// Character or ability problem.
    #[error(transparent)]
    Action(#[from] ActionError),
    /// Energy or cooldown problem.
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

/// An action rejected at the frame it reached the queue head.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedAction {
    /// Position in the input sequence.
    pub index: usize,
    /// Frame of the rejection.
    pub frame: Frame,
    /// Character named by the action.
    pub character: String,
    /// Action kind.
    pub action: ActionKind,
    /// Error message.
    pub reason: String,
}

/// Result of a finished run.
#[derive(Debug, Clone)]
pub struct EmulationOutput {
    /// Frame log.
    pub log: EventLog,
    /// Rejected actions.
    pub skipped: Vec<SkippedAction>,
    /// Headline metrics.
    pub summary: RunSummary,
    /// Crit RNG seed.
    pub seed: u64,
    /// Frames simulated.
    pub frames: Frame,
    /// True if the frame bound cut the run short.
    pub truncated: bool,
}

#[derive(Debug, Clone)]
struct PendingHit {
    due: Frame,
    sequence: u64,
    hit_index: usize,
    character: CharacterId,
    damage_type: DamageType,
    element: HitElement,
    element_override: Option<Element>,
    multiplier: f64,
    gauge: f64,
    icd: IcdTag,
    blunt: bool,
    particles: u32,
}

/// One simulation run.
#[derive(Debug)]
pub struct Emulation {
    settings: SimulationSettings,
    team: Vec<Option<CharacterState>>,
    slot_names: BTreeMap<String, Option<CharacterId>>,
    target: TargetState,
    energy: EnergyManager,
    reactions: ReactionEngine,
    icd: IcdTracker,
    calculator: DamageCalculator,
    crit: CritRoller,
    queue: VecDeque<(usize, ActionSpec)>,
    pending: Vec<PendingHit>,
    frame_events: Vec<DamageEvent>,
    log: EventLog,
    skipped: Vec<SkippedAction>,
    frame: Frame,
    next_action_at: Frame,
    active: CharacterId,
    swap_ready_at: Frame,
    last_action: Option<(CharacterId, ActionKind)>,
    sequence: u64,
    finished: bool,
    truncated: bool,
    started: Instant,
    deadline: Option<Instant>,
}

impl Emulation {
    /// Builds a run from validated inputs.
    pub fn new(input: EmulationInput, kits: &KitRegistry) -> Result<Self, ConfigError> {
        input.validate()?;
        let EmulationInput {
            team,
            actions,
            target,
            settings,
        } = input;

        let mut states = Vec::with_capacity(team.len());
        let mut slot_names = BTreeMap::new();
        let mut energy = EnergyManager::new();

        for (slot, entry) in team.into_iter().enumerate() {
            let id = CharacterId::new(u8::try_from(slot).unwrap_or(u8::MAX));
            match entry {
                TeamSlot::Character(config) => {
                    let kit = kits.get(config.kit_name()).cloned().ok_or_else(|| {
                        ConfigError::UnknownKit {
                            character: config.name.clone(),
                            kit: config.kit_name().to_string(),
                        }
                    })?;
                    slot_names.insert(config.name.clone(), Some(id));
                    let state = CharacterState::new(id, *config, kit);
                    energy.insert(id, state.energy_pool());
                    states.push(Some(state));
                }
                TeamSlot::Unconfigured { reason, name } => {
                    debug!("Slot {} unconfigured: {}", slot, reason);
                    if let Some(name) = name {
                        slot_names.entry(name).or_insert(None);
                    }
                    states.push(None);
                }
            }
        }

        let elements: Vec<_> = states.iter().flatten().map(CharacterState::element).collect();
        for effect in resonance_effects(&elements) {
            info!("Resonance active: {}", effect.name);
            for state in states.iter_mut().flatten() {
                state.effects_mut().apply(effect.clone());
            }
        }

        let active = states
            .iter()
            .flatten()
            .map(CharacterState::id)
            .next()
            .ok_or(ConfigError::EmptyTeam)?;

        Ok(Self {
            settings,
            team: states,
            slot_names,
            target: TargetState::new(TargetId::PRIMARY, target),
            energy,
            reactions: ReactionEngine::new(),
            icd: IcdTracker::new(),
            calculator: DamageCalculator::new(settings.resistance_model),
            crit: CritRoller::new(settings.crit_mode, settings.seed),
            queue: actions.into_iter().enumerate().collect(),
            pending: Vec::new(),
            frame_events: Vec::new(),
            log: EventLog::new(),
            skipped: Vec::new(),
            frame: 0,
            next_action_at: 0,
            active,
            swap_ready_at: 0,
            last_action: None,
            sequence: 0,
            finished: false,
            truncated: false,
            started: Instant::now(),
            deadline: None,
        })
    }

    /// Sets a wall-clock deadline after which the run fails with a timeout.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Returns the next frame to simulate.
    #[must_use]
    pub const fn frame(&self) -> Frame {
        self.frame
    }

    /// Returns true once the run has stopped.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns the settings of the run.
    #[must_use]
    pub const fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    /// Returns the log recorded so far.
    #[must_use]
    pub const fn event_log(&self) -> &EventLog {
        &self.log
    }

    /// Returns actions skipped so far.
    #[must_use]
    pub fn skipped(&self) -> &[SkippedAction] {
        &self.skipped
    }

    /// Returns the on-field character.
    #[must_use]
    pub const fn active(&self) -> CharacterId {
        self.active
    }

    /// Looks up a character by name.
    #[must_use]
    pub fn character(&self, name: &str) -> Option<&CharacterState> {
        self.team.iter().flatten().find(|state| state.name() == name)
    }

    /// Returns the energy manager.
    #[must_use]
    pub const fn energy(&self) -> &EnergyManager {
        &self.energy
    }

    /// Returns the enemy.
    #[must_use]
    pub const fn target(&self) -> &TargetState {
        &self.target
    }

    /// Returns the aura state.
    #[must_use]
    pub const fn reactions(&self) -> &ReactionEngine {
        &self.reactions
    }

    /// Applies an effect to a named character.
    pub fn apply_effect(&mut self, name: &str, effect: Effect) -> Result<ApplyOutcome, ActionError> {
        let id = self.resolve_character(name)?;
        self.state_mut(id)
            .map(|state| state.effects_mut().apply(effect))
            .ok_or_else(|| ActionError::UnknownCharacter(name.to_string()))
    }

    // ------------------------------------------------------------------------
    // Driving
    // ------------------------------------------------------------------------

    /// Simulates one frame. Returns false once the run has finished.
    pub fn step(&mut self) -> EmulationResult<bool> {
        if self.finished {
            return Ok(false);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                let elapsed_ms =
                    u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
                return Err(EmulationError::Timeout {
                    frame: self.frame,
                    elapsed_ms,
                });
            }
        }

        let frame = self.frame;
        self.tick(frame);
        self.resolve_due_hits(frame);
        self.dispatch(frame);
        self.record(frame)?;

        let idle = self.queue.is_empty() && self.pending.is_empty() && frame >= self.next_action_at;
        if idle {
            self.finished = true;
            info!("Emulation finished after {} frames", frame + 1);
        } else if frame + 1 >= self.settings.max_frames {
            self.finished = true;
            self.truncated = true;
            warn!(
                "Emulation truncated at frame {} with {} actions left",
                frame,
                self.queue.len()
            );
        }
        self.frame += 1;
        Ok(!self.finished)
    }

    /// Runs to completion.
    pub fn run(self) -> EmulationResult<EmulationOutput> {
        self.run_with_progress(&ProgressSender::disconnected())
    }

    /// Runs to completion, reporting progress every `progress_interval` frames.
    pub fn run_with_progress(mut self, progress: &ProgressSender) -> EmulationResult<EmulationOutput> {
        let length = u64::from(self.settings.max_frames);
        progress.start(length, "Emulation started");

        let result = loop {
            match self.step() {
                Ok(true) => {
                    if self.frame % self.settings.progress_interval == 0 {
                        progress.update(
                            u64::from(self.frame),
                            length,
                            format!("Frame {}", self.frame),
                        );
                    }
                }
                Ok(false) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        progress.done();
        result.map(|()| self.into_output())
    }

    /// Converts a finished run into its output.
    #[must_use]
    pub fn into_output(self) -> EmulationOutput {
        let summary = RunSummary::from_log(&self.log, self.skipped.len(), self.truncated);
        EmulationOutput {
            frames: summary.frames,
            log: self.log,
            skipped: self.skipped,
            summary,
            seed: self.settings.seed,
            truncated: self.truncated,
        }
    }

    // ------------------------------------------------------------------------
    // Frame phases
    // ------------------------------------------------------------------------

    fn tick(&mut self, frame: Frame) {
        for state in self.team.iter_mut().flatten() {
            for name in state.tick() {
                debug!("Frame {}: {} lost {}", frame, state.name(), name);
            }
        }
        for name in self.target.tick() {
            debug!("Frame {}: target lost {}", frame, name);
        }

        let receivers: Vec<ParticleReceiver> = self
            .team
            .iter()
            .flatten()
            .map(|state| ParticleReceiver {
                id: state.id(),
                element: state.element(),
                on_field: state.id() == self.active,
                energy_recharge: state.panel().energy_recharge,
            })
            .collect();
        self.energy.tick(frame, &receivers);

        for (target, aura) in self.reactions.tick() {
            debug!("Frame {}: {:?} aura on {:?} decayed", frame, aura, target);
        }
    }

    fn resolve_due_hits(&mut self, frame: Frame) {
        let (mut due, waiting): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|hit| hit.due <= frame);
        self.pending = waiting;
        due.sort_by_key(|hit| (hit.due, hit.sequence, hit.hit_index));
        for hit in due {
            self.resolve_hit(&hit, frame);
        }
    }

    fn dispatch(&mut self, frame: Frame) {
        while frame >= self.next_action_at {
            let Some((index, spec)) = self.queue.front().cloned() else {
                break;
            };

            let id = match self.check_action(&spec) {
                Ok(id) => id,
                Err(reason) => {
                    self.skip(index, frame, &spec, &reason);
                    self.queue.pop_front();
                    continue;
                }
            };

            if id != self.active {
                if frame < self.swap_ready_at {
                    break;
                }
                debug!("Frame {}: swap {} -> {}", frame, self.active, id);
                self.active = id;
                self.swap_ready_at = frame + self.settings.swap_cooldown;
            }

            if spec.action == ActionKind::Burst {
                if let Err(e) = self.energy.consume_for_burst(id) {
                    self.skip(index, frame, &spec, &SkipReason::Resource(e));
                    self.queue.pop_front();
                    continue;
                }
            }

            self.queue.pop_front();
            self.execute(index, id, &spec, frame);
        }
    }

    fn record(&mut self, frame: Frame) -> EmulationResult<()> {
        let statuses = self
            .team
            .iter()
            .flatten()
            .map(|state| {
                let status = state.status(frame, self.energy.pool(state.id()), state.id() == self.active);
                (state.name().to_string(), status)
            })
            .collect();
        let events = std::mem::take(&mut self.frame_events);
        self.log.record(frame, statuses, events)
    }

    // ------------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------------

    fn resolve_character(&self, name: &str) -> Result<CharacterId, ActionError> {
        match self.slot_names.get(name) {
            Some(Some(id)) => Ok(*id),
            Some(None) => Err(ActionError::UnconfiguredCharacter(name.to_string())),
            None => Err(ActionError::UnknownCharacter(name.to_string())),
        }
    }

    fn state(&self, id: CharacterId) -> Option<&CharacterState> {
        self.team.get(id.slot()).and_then(Option::as_ref)
    }

    fn state_mut(&mut self, id: CharacterId) -> Option<&mut CharacterState> {
        self.team.get_mut(id.slot()).and_then(Option::as_mut)
    }

    fn check_action(&self, spec: &ActionSpec) -> Result<CharacterId, SkipReason> {
        let id = self.resolve_character(&spec.character)?;
        let state = self
            .state(id)
            .ok_or_else(|| ActionError::UnconfiguredCharacter(spec.character.clone()))?;

        if spec.action == ActionKind::Skip {
            return Ok(id);
        }
        if state
            .kit()
            .timing(spec.action, spec.params.hold, state.combo())
            .is_none()
        {
            return Err(ActionError::NotUnlocked {
                character: spec.character.clone(),
                action: spec.action,
            }
            .into());
        }

        match spec.action {
            ActionKind::Skill => state.check_skill()?,
            ActionKind::Burst => {
                state.check_burst()?;
                if let Some(pool) = self.energy.pool(id) {
                    if !pool.is_full() {
                        return Err(ResourceError::InsufficientEnergy {
                            character: spec.character.clone(),
                            current: pool.current,
                            required: pool.max,
                        }
                        .into());
                    }
                }
            }
            _ => {}
        }
        Ok(id)
    }

    fn skip(&mut self, index: usize, frame: Frame, spec: &ActionSpec, reason: &SkipReason) {
        warn!(
            "Frame {}: skipping action #{} ({} {}): {}",
            frame, index, spec.character, spec.action, reason
        );
        self.skipped.push(SkippedAction {
            index,
            frame,
            character: spec.character.clone(),
            action: spec.action,
            reason: reason.to_string(),
        });
    }

    fn execute(&mut self, index: usize, id: CharacterId, spec: &ActionSpec, frame: Frame) {
        let continues_combo = self.last_action == Some((id, ActionKind::NormalAttack));
        self.last_action = Some((id, spec.action));

        if spec.action == ActionKind::Skip {
            let frames = spec.params.frames.unwrap_or(0);
            self.next_action_at = frame + frames;
            debug!("Frame {}: action #{} waits {} frames", frame, index, frames);
            return;
        }

        let Some(state) = self.state_mut(id) else {
            return;
        };
        if spec.action == ActionKind::NormalAttack && !continues_combo {
            state.reset_combo();
        }
        let Some(timing) = state
            .kit()
            .timing(spec.action, spec.params.hold, state.combo())
            .cloned()
        else {
            return;
        };

        let lock = match spec.action {
            ActionKind::Dash | ActionKind::Jump => spec.params.frames.unwrap_or(timing.lock),
            _ => timing.lock,
        };
        state.begin_action(frame, timing.first_hit_frame().min(lock), lock);
        match spec.action {
            ActionKind::NormalAttack => state.advance_combo(),
            ActionKind::Skill => state.start_skill_cooldown(timing.cooldown_frames()),
            ActionKind::Burst => state.start_burst_cooldown(timing.cooldown_frames()),
            _ => {}
        }

        let talent_scale = state.talent_scale(spec.action);
        let particles = if spec.action == ActionKind::Skill {
            state.skill_particles()
        } else {
            0
        };
        debug!(
            "Frame {}: {} {} (lock {}, {} hits)",
            frame,
            state.name(),
            spec.action,
            lock,
            timing.hits.len()
        );

        for grant in &timing.effects {
            self.grant_effect(id, grant);
        }

        self.next_action_at = frame + lock;
        self.sequence += 1;
        let Some(damage_type) = DamageType::from_action(spec.action) else {
            return;
        };

        let mut immediate = Vec::new();
        for (hit_index, hit) in timing.hits.iter().enumerate() {
            let pending = PendingHit {
                due: frame + hit.frame,
                sequence: self.sequence,
                hit_index,
                character: id,
                damage_type,
                element: hit.element,
                element_override: spec.params.element,
                multiplier: spec.params.multiplier.unwrap_or(hit.multiplier * talent_scale),
                gauge: hit.gauge,
                icd: hit.icd.unwrap_or_else(|| IcdTag::for_action(spec.action)),
                blunt: hit.blunt,
                particles: if hit_index == 0 { particles } else { 0 },
            };
            if hit.frame == 0 {
                immediate.push(pending);
            } else {
                self.pending.push(pending);
            }
        }
        for hit in immediate {
            self.resolve_hit(&hit, frame);
        }
    }

    fn grant_effect(&mut self, caster: CharacterId, grant: &EffectGrant) {
        let mut effect = Effect::new(
            grant.name.clone(),
            EffectSource::Character(caster),
            grant.payload.clone(),
        )
        .with_policy(grant.policy);
        if let Some(seconds) = grant.duration_s {
            effect = effect.with_duration(seconds_to_frames(seconds));
        }

        match grant.target {
            GrantTarget::Caster => {
                if let Some(state) = self.state_mut(caster) {
                    state.effects_mut().apply(effect);
                }
            }
            GrantTarget::Team => {
                for state in self.team.iter_mut().flatten() {
                    state.effects_mut().apply(effect.clone());
                }
            }
            GrantTarget::Enemy => self.target.apply_effect(effect),
        }
    }

    // ------------------------------------------------------------------------
    // Hits
    // ------------------------------------------------------------------------

    fn resolve_hit(&mut self, hit: &PendingHit, frame: Frame) {
        let Some(state) = self.state(hit.character) else {
            return;
        };
        let panel = state.panel();
        let level = state.level();
        let name = state.name().to_string();
        let character_element = state.element();
        let element = hit
            .element_override
            .unwrap_or_else(|| hit.element.resolve(character_element, state.effects().infusion()));

        let applies = element.is_elemental() && self.icd.check(hit.character, hit.icd, frame);
        let applied = if applies || hit.blunt {
            let (gauge_element, gauge) = if applies {
                (element, hit.gauge)
            } else {
                (Element::Physical, 0.0)
            };
            self.reactions
                .apply(self.target.id(), gauge_element, gauge, hit.blunt)
        } else {
            ApplyResult::NotApplicable
        };
        let reaction = applied.reaction().copied();

        let crit = self.crit.decide(panel.crit_rate);
        let result = self.calculator.compute(
            &HitInput {
                panel: &panel,
                level,
                ability_multiplier: hit.multiplier,
                element,
                damage_type: hit.damage_type,
                resistance_percent: self.target.resistance(element),
                reaction: reaction.as_ref(),
            },
            crit,
        );

        self.frame_events.push(DamageEvent {
            frame,
            source: hit.character,
            character: name.clone(),
            target: self.target.id(),
            value: result.value,
            element,
            damage_type: hit.damage_type,
            reaction: reaction.is_some(),
            reaction_kind: reaction.map(|r| r.kind),
            crit: result.crit.is_crit(),
            breakdown: result.breakdown,
        });

        if let Some(outcome) = reaction {
            debug!("Frame {}: {} triggered {}", frame, name, outcome.kind);
            if outcome.category == ReactionCategory::Transformative {
                let target = &self.target;
                let (reaction_element, instance) = self.calculator.transformative(
                    &outcome,
                    level,
                    panel.elemental_mastery,
                    |e| target.resistance(e),
                );
                self.frame_events.push(DamageEvent {
                    frame,
                    source: hit.character,
                    character: name,
                    target: self.target.id(),
                    value: instance.value,
                    element: reaction_element,
                    damage_type: DamageType::Reaction,
                    reaction: true,
                    reaction_kind: Some(outcome.kind),
                    crit: false,
                    breakdown: instance.breakdown,
                });
            }
            if outcome.kind == ReactionKind::Superconduct {
                self.target.apply_effect(
                    Effect::new(
                        "Superconduct",
                        EffectSource::Reaction,
                        EffectPayload::Trigger(Trigger::ResistanceShred {
                            element: Element::Physical,
                            amount: SUPERCONDUCT_SHRED,
                        }),
                    )
                    .with_duration(seconds_to_frames(SUPERCONDUCT_DURATION_S))
                    .with_policy(StackPolicy::RefreshOnly),
                );
            }
        }

        if hit.particles > 0 {
            self.energy.schedule_particles(ParticleDrop {
                arrives_at: frame + self.settings.particle_delay,
                element: character_element,
                count: hit.particles,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BaseStats, CharacterConfig, TargetData, WeaponType};
    use crate::config::ActionParams;
    use crate::stats::{StatKind, StatLine};

    fn slot(config: CharacterConfig) -> TeamSlot {
        TeamSlot::Character(Box::new(config))
    }

    fn empty() -> TeamSlot {
        TeamSlot::Unconfigured {
            reason: "empty".into(),
            name: None,
        }
    }

    fn zero_crit(config: CharacterConfig) -> CharacterConfig {
        config.with_base(BaseStats {
            atk: 100.0,
            crit_rate: 0.0,
            ..BaseStats::default()
        })
    }

    fn run(team: Vec<TeamSlot>, actions: Vec<ActionSpec>) -> EmulationOutput {
        let input = EmulationInput::new(
            team,
            actions,
            TargetData::default(),
            SimulationSettings::default(),
        );
        Emulation::new(input, &KitRegistry::with_defaults())
            .expect("valid input")
            .run()
            .expect("run completes")
    }

    #[test]
    fn test_unknown_kit_rejected() {
        let mut config = CharacterConfig::new("Diluc", Element::Pyro, WeaponType::Claymore);
        config.kit = Some("missing".into());
        let input = EmulationInput::new(
            vec![slot(config), empty(), empty(), empty()],
            vec![ActionSpec::new("Diluc", ActionKind::NormalAttack)],
            TargetData::default(),
            SimulationSettings::default(),
        );
        assert!(matches!(
            Emulation::new(input, &KitRegistry::with_defaults()),
            Err(ConfigError::UnknownKit { .. })
        ));
    }

    #[test]
    fn test_normal_attack_lands_on_hit_frame() {
        let config = zero_crit(CharacterConfig::new("Keqing", Element::Electro, WeaponType::Sword));
        let output = run(
            vec![slot(config), empty(), empty(), empty()],
            vec![ActionSpec::new("Keqing", ActionKind::NormalAttack)],
        );

        let events: Vec<_> = output.log.damage_events().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].frame, 12);
        assert_eq!(events[0].element, Element::Physical);
        // 100 ATK * 0.45 * 0.9
        assert_eq!(events[0].value, 41);
        // Lock of the first sword stage is 24 frames; frame 24 is recorded idle.
        assert_eq!(output.frames, 25);
        assert!(!output.truncated);
    }

    #[test]
    fn test_skip_unknown_character_and_continue() {
        let config = zero_crit(CharacterConfig::new("Keqing", Element::Electro, WeaponType::Sword));
        let output = run(
            vec![
                slot(config),
                TeamSlot::Unconfigured {
                    reason: "not built".into(),
                    name: Some("Fischl".into()),
                },
                empty(),
                empty(),
            ],
            vec![
                ActionSpec::new("Nobody", ActionKind::Skill),
                ActionSpec::new("Fischl", ActionKind::Skill),
                ActionSpec::new("Keqing", ActionKind::NormalAttack),
            ],
        );

        assert_eq!(output.skipped.len(), 2);
        assert_eq!(output.skipped[0].frame, 0);
        assert!(output.skipped[0].reason.contains("not on the team"));
        assert!(output.skipped[1].reason.contains("unconfigured"));
        assert_eq!(output.log.damage_events().count(), 1);
    }

    #[test]
    fn test_burst_needs_energy() {
        let config = zero_crit(
            CharacterConfig::new("Xiangling", Element::Pyro, WeaponType::Polearm)
                .with_max_energy(80.0)
                .with_initial_energy(20.0),
        );
        let output = run(
            vec![slot(config), empty(), empty(), empty()],
            vec![ActionSpec::new("Xiangling", ActionKind::Burst)],
        );
        assert_eq!(output.skipped.len(), 1);
        assert!(output.skipped[0].reason.contains("20.0/80.0 energy"));
        assert_eq!(output.log.total_damage(), 0);
    }

    #[test]
    fn test_burst_consumes_energy() {
        let config = zero_crit(CharacterConfig::new("Xiangling", Element::Pyro, WeaponType::Polearm));
        let input = EmulationInput::new(
            vec![slot(config), empty(), empty(), empty()],
            vec![ActionSpec::new("Xiangling", ActionKind::Burst)],
            TargetData::default(),
            SimulationSettings::default(),
        );
        let mut emulation = Emulation::new(input, &KitRegistry::with_defaults()).expect("valid");
        emulation.step().expect("frame 0");
        let pool = emulation.energy().pool(CharacterId::new(0)).expect("pool");
        assert_eq!(pool.current, 0.0);
        let state = emulation.character("Xiangling").expect("state");
        assert!(state.burst_cooldown() > 0);
    }

    #[test]
    fn test_skill_cooldown_skips_second_cast() {
        let config = zero_crit(CharacterConfig::new("Bennett", Element::Pyro, WeaponType::Sword));
        let output = run(
            vec![slot(config), empty(), empty(), empty()],
            vec![
                ActionSpec::new("Bennett", ActionKind::Skill),
                ActionSpec::new("Bennett", ActionKind::Skill),
            ],
        );
        assert_eq!(output.skipped.len(), 1);
        assert!(output.skipped[0].reason.contains("skill on cooldown"));
    }

    #[test]
    fn test_skill_particles_refill_energy() {
        let config = zero_crit(
            CharacterConfig::new("Bennett", Element::Pyro, WeaponType::Sword).with_initial_energy(0.0),
        );
        let output = run(
            vec![slot(config), empty(), empty(), empty()],
            vec![
                ActionSpec::new("Bennett", ActionKind::Skill),
                ActionSpec::new("Bennett", ActionKind::Skip)
                    .with_params(ActionParams {
                        frames: Some(120),
                        ..Default::default()
                    }),
            ],
        );
        let last = output.log.iter().last().expect("frames recorded");
        // 3 same-element particles on field at 100% ER.
        assert_eq!(last.characters["Bennett"].energy, 9.0);
    }

    #[test]
    fn test_swap_waits_for_cooldown() {
        let a = zero_crit(CharacterConfig::new("Keqing", Element::Electro, WeaponType::Sword));
        let b = zero_crit(CharacterConfig::new("Fischl", Element::Electro, WeaponType::Bow));
        let mut settings = SimulationSettings::default();
        settings.swap_cooldown = 60;
        let input = EmulationInput::new(
            vec![slot(a), slot(b), empty(), empty()],
            vec![
                ActionSpec::new("Fischl", ActionKind::Dash),
                ActionSpec::new("Keqing", ActionKind::NormalAttack),
            ],
            TargetData::default(),
            settings,
        );
        let output = Emulation::new(input, &KitRegistry::with_defaults())
            .expect("valid")
            .run()
            .expect("runs");

        // Swap to Fischl at frame 0, dash locks 20 frames, swap back waits to 60.
        let events: Vec<_> = output.log.damage_events().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].frame, 60 + 12);
        assert!(output.skipped.is_empty());
    }

    #[test]
    fn test_max_frames_truncates() {
        let config = zero_crit(CharacterConfig::new("Keqing", Element::Electro, WeaponType::Sword));
        let input = EmulationInput::new(
            vec![slot(config), empty(), empty(), empty()],
            vec![ActionSpec::new("Keqing", ActionKind::Skip).with_params(
                ActionParams {
                    frames: Some(1000),
                    ..Default::default()
                },
            )],
            TargetData::default(),
            SimulationSettings::default().with_max_frames(100),
        );
        let output = Emulation::new(input, &KitRegistry::with_defaults())
            .expect("valid")
            .run()
            .expect("runs");
        assert!(output.truncated);
        assert_eq!(output.frames, 100);
        assert!(output.summary.truncated);
    }

    #[test]
    fn test_deadline_times_out() {
        let config = zero_crit(CharacterConfig::new("Keqing", Element::Electro, WeaponType::Sword));
        let input = EmulationInput::new(
            vec![slot(config), empty(), empty(), empty()],
            vec![ActionSpec::new("Keqing", ActionKind::NormalAttack)],
            TargetData::default(),
            SimulationSettings::default(),
        );
        let result = Emulation::new(input, &KitRegistry::with_defaults())
            .expect("valid")
            .with_deadline(Instant::now())
            .run();
        assert!(matches!(result, Err(EmulationError::Timeout { frame: 0, .. })));
    }

    #[test]
    fn test_apply_effect_changes_damage() {
        let config = zero_crit(CharacterConfig::new("Keqing", Element::Electro, WeaponType::Sword));
        let input = EmulationInput::new(
            vec![slot(config), empty(), empty(), empty()],
            vec![ActionSpec::new("Keqing", ActionKind::NormalAttack)],
            TargetData::default(),
            SimulationSettings::default(),
        );
        let mut emulation = Emulation::new(input, &KitRegistry::with_defaults()).expect("valid");
        let outcome = emulation
            .apply_effect(
                "Keqing",
                Effect::new(
                    "Test Buff",
                    EffectSource::External,
                    EffectPayload::Stats(vec![StatLine::new(StatKind::Atk, 100.0)]),
                ),
            )
            .expect("character exists");
        assert_eq!(outcome, ApplyOutcome::Inserted);
        let timer = Effect::new("x", EffectSource::External, EffectPayload::Timer);
        assert!(emulation.apply_effect("Nobody", timer).is_err());

        let output = emulation.run().expect("runs");
        // 200 ATK * 0.45 * 0.9
        assert_eq!(output.log.total_damage(), 81);
    }
}
