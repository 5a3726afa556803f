//! Buffs, debuffs and their bookkeeping.
//!
//! This module provides:
//! - Effects with a tagged payload (timer, stat modifiers, triggers)
//! - Stacking policies (replace, additive stacks with a cap, refresh-only)
//! - A per-entity effect list ticked once per frame

use emulator_common::{CharacterId, Element, Frame};
use serde::{Deserialize, Serialize};

use crate::stats::StatLine;

// ============================================================================
// Effect Types
// ============================================================================

/// Where an effect came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectSource {
    /// Granted by a team member's action.
    Character(CharacterId),
    /// Elemental resonance.
    Resonance,
    /// Side effect of an elemental reaction.
    Reaction,
    /// Configured or injected from outside the run.
    External,
}

/// How a second application of the same effect is merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackPolicy {
    /// Replace the existing instance and reset its duration.
    #[default]
    ReplaceByName,
    /// Keep independent instances up to `cap`.
    StackAdditive {
        /// Maximum number of instances.
        cap: u32,
    },
    /// Reset the existing instance's duration, keeping its payload.
    RefreshOnly,
}

/// Special behavior carried by an effect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Normal, charged and plunging attacks deal this element.
    Infusion(Element),
    /// Lowers the target's resistance to an element.
    ResistanceShred {
        /// Element shredded.
        element: Element,
        /// Resistance points removed (40.0 = 40%).
        amount: f64,
    },
}

/// What an effect does while active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum EffectPayload {
    /// Pure duration marker.
    Timer,
    /// Stat modifiers.
    Stats(Vec<StatLine>),
    /// Special trigger.
    Trigger(Trigger),
}

/// An active buff or debuff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    /// Effect name.
    pub name: String,
    /// Effect origin.
    pub source: EffectSource,
    /// Frames remaining (`None` is permanent).
    pub duration: Option<Frame>,
    /// Duration the effect was applied with.
    pub max_duration: Option<Frame>,
    /// What the effect does.
    pub payload: EffectPayload,
    /// Merge rule.
    pub policy: StackPolicy,
}

impl Effect {
    /// Creates a permanent effect that replaces by name.
    #[must_use]
    pub fn new(name: impl Into<String>, source: EffectSource, payload: EffectPayload) -> Self {
        Self {
            name: name.into(),
            source,
            duration: None,
            max_duration: None,
            payload,
            policy: StackPolicy::ReplaceByName,
        }
    }

    /// Sets a finite duration in frames.
    #[must_use]
    pub fn with_duration(mut self, frames: Frame) -> Self {
        self.duration = Some(frames);
        self.max_duration = Some(frames);
        self
    }

    /// Sets the stacking policy.
    #[must_use]
    pub fn with_policy(mut self, policy: StackPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns true if the effect never expires.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        self.duration.is_none()
    }

    /// Returns true if `other` is the same effect from the same source.
    #[must_use]
    pub fn same_identity(&self, other: &Self) -> bool {
        self.name == other.name && self.source == other.source
    }

    fn matches(&self, name: &str, source: EffectSource) -> bool {
        self.name == name && self.source == source
    }

    fn reset_duration(&mut self, frames: Option<Frame>) {
        self.duration = frames;
        self.max_duration = frames;
    }

    /// Advances one frame. Returns true when the effect has expired.
    fn tick(&mut self) -> bool {
        match self.duration.as_mut() {
            Some(remaining) => {
                *remaining = remaining.saturating_sub(1);
                *remaining == 0
            }
            None => false,
        }
    }
}

/// What `apply` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A new instance was added.
    Inserted,
    /// An existing instance was replaced.
    Replaced,
    /// An existing instance had its duration reset.
    Refreshed,
    /// A further stack was added.
    Stacked,
    /// Stacks were at cap; the one closest to expiring was replaced.
    ReplacedOldestStack,
    /// The effect had zero duration and was dropped.
    Ignored,
}

// ============================================================================
// Effect Manager
// ============================================================================

/// Ordered effect list of one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectManager {
    effects: Vec<Effect>,
}

impl EffectManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or merges an effect per its stacking policy.
    pub fn apply(&mut self, effect: Effect) -> ApplyOutcome {
        if effect.duration == Some(0) {
            return ApplyOutcome::Ignored;
        }

        match effect.policy {
            StackPolicy::ReplaceByName => {
                if let Some(existing) = self.effects.iter_mut().find(|e| e.same_identity(&effect)) {
                    *existing = effect;
                    ApplyOutcome::Replaced
                } else {
                    self.effects.push(effect);
                    ApplyOutcome::Inserted
                }
            }
            StackPolicy::RefreshOnly => {
                if let Some(existing) = self.effects.iter_mut().find(|e| e.same_identity(&effect)) {
                    existing.reset_duration(effect.max_duration);
                    ApplyOutcome::Refreshed
                } else {
                    self.effects.push(effect);
                    ApplyOutcome::Inserted
                }
            }
            StackPolicy::StackAdditive { cap } => self.apply_stack(effect, cap.max(1)),
        }
    }

    fn apply_stack(&mut self, effect: Effect, cap: u32) -> ApplyOutcome {
        let stacks = self.stacks_of(&effect.name, effect.source);
        if stacks == 0 {
            self.effects.push(effect);
            return ApplyOutcome::Inserted;
        }
        if stacks < cap as usize {
            self.effects.push(effect);
            return ApplyOutcome::Stacked;
        }

        // Permanent instances sort last, so a finite one is replaced first.
        let weakest = self
            .effects
            .iter()
            .enumerate()
            .filter(|(_, e)| e.same_identity(&effect))
            .min_by_key(|(_, e)| e.duration.unwrap_or(Frame::MAX))
            .map(|(index, _)| index);

        match weakest {
            Some(index) => {
                self.effects[index] = effect;
                ApplyOutcome::ReplacedOldestStack
            }
            None => ApplyOutcome::Ignored,
        }
    }

    /// Advances every effect by one frame and removes the expired ones.
    ///
    /// Returns the names of the removed effects.
    pub fn tick(&mut self) -> Vec<String> {
        let mut expired = Vec::new();
        self.effects.retain_mut(|effect| {
            if effect.tick() {
                expired.push(effect.name.clone());
                false
            } else {
                true
            }
        });
        expired
    }

    /// Returns the active effects in application order.
    #[must_use]
    pub fn query(&self) -> &[Effect] {
        &self.effects
    }

    /// Removes every instance of an effect. Returns how many were removed.
    pub fn remove(&mut self, name: &str, source: EffectSource) -> usize {
        let before = self.effects.len();
        self.effects.retain(|e| !e.matches(name, source));
        before - self.effects.len()
    }

    /// Returns true if any effect carries this name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.effects.iter().any(|e| e.name == name)
    }

    /// Returns the number of instances of one effect.
    #[must_use]
    pub fn stacks_of(&self, name: &str, source: EffectSource) -> usize {
        self.effects.iter().filter(|e| e.matches(name, source)).count()
    }

    /// Returns the number of active effects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// Returns true if no effect is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Iterates the stat lines of every stat payload.
    pub fn stat_lines(&self) -> impl Iterator<Item = &StatLine> {
        self.effects.iter().flat_map(|effect| match &effect.payload {
            EffectPayload::Stats(lines) => lines.as_slice(),
            EffectPayload::Timer | EffectPayload::Trigger(_) => &[],
        })
    }

    /// Returns the most recently applied infusion.
    #[must_use]
    pub fn infusion(&self) -> Option<Element> {
        self.effects.iter().rev().find_map(|effect| match effect.payload {
            EffectPayload::Trigger(Trigger::Infusion(element)) => Some(element),
            _ => None,
        })
    }

    /// Returns total resistance shred against an element, in percent points.
    #[must_use]
    pub fn resistance_shred(&self, element: Element) -> f64 {
        self.effects
            .iter()
            .filter_map(|effect| match effect.payload {
                EffectPayload::Trigger(Trigger::ResistanceShred {
                    element: shredded,
                    amount,
                }) if shredded == element => Some(amount),
                _ => None,
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::StatKind;
    use proptest::prelude::*;

    fn buff(name: &str, frames: Frame) -> Effect {
        Effect::new(
            name,
            EffectSource::Character(CharacterId::new(0)),
            EffectPayload::Stats(vec![StatLine::new(StatKind::AtkPercent, 0.2)]),
        )
        .with_duration(frames)
    }

    #[test]
    fn test_apply_and_expire() {
        let mut manager = EffectManager::new();
        assert_eq!(manager.apply(buff("Noblesse", 3)), ApplyOutcome::Inserted);

        assert!(manager.tick().is_empty());
        assert!(manager.tick().is_empty());
        assert_eq!(manager.tick(), vec!["Noblesse".to_string()]);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_permanent_never_expires() {
        let mut manager = EffectManager::new();
        manager.apply(Effect::new(
            "Resonance",
            EffectSource::Resonance,
            EffectPayload::Timer,
        ));
        for _ in 0..10_000 {
            manager.tick();
        }
        assert!(manager.contains("Resonance"));
    }

    #[test]
    fn test_replace_resets_duration() {
        let mut manager = EffectManager::new();
        manager.apply(buff("Noblesse", 10));
        manager.tick();
        manager.tick();
        assert_eq!(manager.query()[0].duration, Some(8));

        assert_eq!(manager.apply(buff("Noblesse", 10)), ApplyOutcome::Replaced);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.query()[0].duration, Some(10));
    }

    #[test]
    fn test_different_source_is_separate() {
        let mut manager = EffectManager::new();
        manager.apply(buff("Noblesse", 10));
        let mut other = buff("Noblesse", 10);
        other.source = EffectSource::Character(CharacterId::new(1));
        assert_eq!(manager.apply(other), ApplyOutcome::Inserted);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_refresh_only_keeps_payload() {
        let mut manager = EffectManager::new();
        let shred = Effect::new(
            "Superconduct",
            EffectSource::Reaction,
            EffectPayload::Trigger(Trigger::ResistanceShred {
                element: Element::Physical,
                amount: 40.0,
            }),
        )
        .with_duration(720)
        .with_policy(StackPolicy::RefreshOnly);

        manager.apply(shred.clone());
        for _ in 0..100 {
            manager.tick();
        }
        assert_eq!(manager.apply(shred), ApplyOutcome::Refreshed);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.query()[0].duration, Some(720));
        assert_eq!(manager.resistance_shred(Element::Physical), 40.0);
        assert_eq!(manager.resistance_shred(Element::Pyro), 0.0);
    }

    #[test]
    fn test_stack_cap_replaces_least_remaining() {
        let mut manager = EffectManager::new();
        let policy = StackPolicy::StackAdditive { cap: 2 };

        assert_eq!(
            manager.apply(buff("Stack", 100).with_policy(policy)),
            ApplyOutcome::Inserted
        );
        manager.tick();
        assert_eq!(
            manager.apply(buff("Stack", 50).with_policy(policy)),
            ApplyOutcome::Stacked
        );
        assert_eq!(
            manager.apply(buff("Stack", 80).with_policy(policy)),
            ApplyOutcome::ReplacedOldestStack
        );

        let mut remaining: Vec<_> = manager.query().iter().filter_map(|e| e.duration).collect();
        remaining.sort_unstable();
        assert_eq!(remaining, vec![80, 99]);
    }

    #[test]
    fn test_remove() {
        let mut manager = EffectManager::new();
        manager.apply(buff("Noblesse", 10));
        assert_eq!(manager.remove("Noblesse", EffectSource::Resonance), 0);
        assert_eq!(
            manager.remove("Noblesse", EffectSource::Character(CharacterId::new(0))),
            1
        );
        assert!(manager.is_empty());
    }

    #[test]
    fn test_zero_duration_ignored() {
        let mut manager = EffectManager::new();
        assert_eq!(manager.apply(buff("Nothing", 0)), ApplyOutcome::Ignored);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_latest_infusion_wins() {
        let mut manager = EffectManager::new();
        let source = EffectSource::External;
        manager.apply(Effect::new(
            "Cryo Infusion",
            source,
            EffectPayload::Trigger(Trigger::Infusion(Element::Cryo)),
        ));
        manager.apply(Effect::new(
            "Pyro Infusion",
            source,
            EffectPayload::Trigger(Trigger::Infusion(Element::Pyro)),
        ));
        assert_eq!(manager.infusion(), Some(Element::Pyro));
    }

    proptest! {
        #[test]
        fn prop_stacks_never_exceed_cap(cap in 1u32..6, applications in 0usize..20) {
            let mut manager = EffectManager::new();
            let policy = StackPolicy::StackAdditive { cap };
            for i in 0..applications {
                manager.apply(buff("Stack", 10 + i as Frame).with_policy(policy));
                manager.tick();
            }
            prop_assert!(manager.len() <= cap as usize);
        }

        #[test]
        fn prop_duration_counts_down(frames in 1u32..500, ticks in 0u32..500) {
            let mut manager = EffectManager::new();
            manager.apply(buff("Timed", frames));
            for _ in 0..ticks {
                manager.tick();
            }
            if ticks >= frames {
                prop_assert!(manager.is_empty());
            } else {
                prop_assert_eq!(manager.query()[0].duration, Some(frames - ticks));
            }
        }
    }
}
