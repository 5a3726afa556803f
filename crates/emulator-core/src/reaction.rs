//! Elemental auras and reactions.
//!
//! This module provides:
//! - Per-target aura state with gauge units and decay timers
//! - The reaction table (existing aura x incoming element)
//! - Reaction multipliers and transformative level scaling
//!
//! A target carries at most one aura. Applying the aura's own element only
//! refreshes its timer; applying another element consults the table.

use std::collections::BTreeMap;

use emulator_common::{seconds_to_frames, Element, Frame, TargetId};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Share of the applied gauge that lingers as an aura.
pub const AURA_TAX: f64 = 0.8;

const GAUGE_EPSILON: f64 = 1e-9;

// ============================================================================
// Aura
// ============================================================================

/// Kind of aura lingering on a target.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AuraKind {
    /// Pyro.
    Pyro,
    /// Hydro.
    Hydro,
    /// Electro.
    Electro,
    /// Cryo.
    Cryo,
    /// Dendro.
    Dendro,
    /// Frozen (from hydro + cryo).
    Frozen,
    /// Quicken (from dendro + electro).
    Quicken,
}

impl AuraKind {
    /// Returns the aura left by an element, if it can attach.
    #[must_use]
    pub const fn from_element(element: Element) -> Option<Self> {
        match element {
            Element::Pyro => Some(Self::Pyro),
            Element::Hydro => Some(Self::Hydro),
            Element::Electro => Some(Self::Electro),
            Element::Cryo => Some(Self::Cryo),
            Element::Dendro => Some(Self::Dendro),
            Element::Physical | Element::Anemo | Element::Geo => None,
        }
    }

    /// Returns the element of a plain elemental aura.
    #[must_use]
    pub const fn element(self) -> Option<Element> {
        match self {
            Self::Pyro => Some(Element::Pyro),
            Self::Hydro => Some(Element::Hydro),
            Self::Electro => Some(Element::Electro),
            Self::Cryo => Some(Element::Cryo),
            Self::Dendro => Some(Element::Dendro),
            Self::Frozen | Self::Quicken => None,
        }
    }
}

/// Aura on one target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aura {
    /// Aura kind.
    pub kind: AuraKind,
    /// Remaining gauge units.
    pub gauge: f64,
    /// Frames until the aura decays.
    pub remaining: Frame,
    /// Timer the aura was attached with.
    pub duration: Frame,
}

impl Aura {
    fn new(kind: AuraKind, gauge: f64, duration: Frame) -> Self {
        Self {
            kind,
            gauge,
            remaining: duration,
            duration,
        }
    }
}

/// Decay timer of an elemental aura: `(2.5 * GU + 7)` seconds.
#[must_use]
pub fn aura_duration(gauge: f64) -> Frame {
    seconds_to_frames(2.5 * gauge + 7.0)
}

/// Duration of frozen: `2 * sqrt(5g + 4) - 4` seconds.
#[must_use]
pub fn frozen_duration(gauge: f64) -> Frame {
    seconds_to_frames(2.0 * (5.0 * gauge + 4.0).sqrt() - 4.0)
}

/// Duration of quicken: `(5g + 6)` seconds.
#[must_use]
pub fn quicken_duration(gauge: f64) -> Frame {
    seconds_to_frames(5.0 * gauge + 6.0)
}

// ============================================================================
// Reaction Table
// ============================================================================

/// Elemental reactions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ReactionKind {
    /// Pyro + hydro.
    Vaporize,
    /// Pyro + cryo.
    Melt,
    /// Quicken + electro.
    Aggravate,
    /// Quicken + dendro.
    Spread,
    /// Pyro + electro.
    Overloaded,
    /// Cryo + electro.
    Superconduct,
    /// Hydro + electro.
    ElectroCharged,
    /// Anemo on an elemental aura.
    Swirl,
    /// Blunt or geo hit on frozen.
    Shattered,
    /// Dendro + pyro.
    Burning,
    /// Dendro + hydro.
    Bloom,
    /// Hydro + cryo.
    Frozen,
    /// Dendro + electro.
    Quicken,
    /// Geo on an elemental aura.
    Crystallize,
}

/// How a reaction affects damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionCategory {
    /// Multiplies the triggering hit.
    Amplifying,
    /// Adds flat base damage to the triggering hit.
    Additive,
    /// Deals its own damage instance.
    Transformative,
    /// Changes target state without dealing damage.
    Status,
}

impl ReactionKind {
    /// Returns the reaction category.
    #[must_use]
    pub const fn category(self) -> ReactionCategory {
        match self {
            Self::Vaporize | Self::Melt => ReactionCategory::Amplifying,
            Self::Aggravate | Self::Spread => ReactionCategory::Additive,
            Self::Overloaded
            | Self::Superconduct
            | Self::ElectroCharged
            | Self::Swirl
            | Self::Shattered
            | Self::Burning
            | Self::Bloom => ReactionCategory::Transformative,
            Self::Frozen | Self::Quicken | Self::Crystallize => ReactionCategory::Status,
        }
    }

    /// Returns the transformative or additive coefficient.
    #[must_use]
    pub const fn coefficient(self) -> f64 {
        match self {
            Self::Overloaded | Self::Bloom => 2.0,
            Self::Superconduct => 0.5,
            Self::ElectroCharged => 1.2,
            Self::Swirl => 0.6,
            Self::Shattered => 1.5,
            Self::Burning => 0.25,
            Self::Aggravate => 1.15,
            Self::Spread => 1.25,
            Self::Vaporize | Self::Melt | Self::Frozen | Self::Quicken | Self::Crystallize => 1.0,
        }
    }

    /// Returns the lowercase display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Vaporize => "vaporize",
            Self::Melt => "melt",
            Self::Aggravate => "aggravate",
            Self::Spread => "spread",
            Self::Overloaded => "overloaded",
            Self::Superconduct => "superconduct",
            Self::ElectroCharged => "electro_charged",
            Self::Swirl => "swirl",
            Self::Shattered => "shattered",
            Self::Burning => "burning",
            Self::Bloom => "bloom",
            Self::Frozen => "frozen",
            Self::Quicken => "quicken",
            Self::Crystallize => "crystallize",
        }
    }
}

impl std::fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What happens to the aura after a reaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AuraChange {
    /// Consume `incoming gauge * coefficient` from the aura.
    Consume(f64),
    /// Leave the aura untouched.
    Keep,
    /// Replace the aura with a status aura.
    Transform(AuraKind),
}

/// One row of the reaction table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReactionRule {
    /// Reaction triggered.
    pub kind: ReactionKind,
    /// Base multiplier (amplifying) or 1.0.
    pub base_multiplier: f64,
    /// Effect on the aura.
    pub aura_change: AuraChange,
}

const fn rule(kind: ReactionKind, base_multiplier: f64, aura_change: AuraChange) -> ReactionRule {
    ReactionRule {
        kind,
        base_multiplier,
        aura_change,
    }
}

const STRONG_AMP: f64 = 2.0;
const WEAK_AMP: f64 = 1.5;
const STRONG_RATIO: f64 = 2.0;
const WEAK_RATIO: f64 = 0.5;

/// Looks up the reaction between an aura and an incoming element.
///
/// `blunt` marks hits able to shatter a frozen target.
#[must_use]
pub fn reaction_rule(existing: AuraKind, incoming: Element, blunt: bool) -> Option<ReactionRule> {
    use AuraChange::{Consume, Keep, Transform};
    use AuraKind as A;
    use Element as E;
    use ReactionKind as R;

    let found = match (existing, incoming) {
        (A::Pyro, E::Hydro) => rule(R::Vaporize, STRONG_AMP, Consume(STRONG_RATIO)),
        (A::Hydro, E::Pyro) => rule(R::Vaporize, WEAK_AMP, Consume(WEAK_RATIO)),
        (A::Cryo | A::Frozen, E::Pyro) => rule(R::Melt, STRONG_AMP, Consume(STRONG_RATIO)),
        (A::Pyro, E::Cryo) => rule(R::Melt, WEAK_AMP, Consume(WEAK_RATIO)),
        (A::Pyro, E::Electro) | (A::Electro, E::Pyro) => rule(R::Overloaded, 1.0, Consume(1.0)),
        (A::Cryo | A::Frozen, E::Electro) | (A::Electro, E::Cryo) => {
            rule(R::Superconduct, 1.0, Consume(1.0))
        }
        (A::Hydro, E::Electro) | (A::Electro, E::Hydro) => {
            rule(R::ElectroCharged, 1.0, Consume(1.0))
        }
        (A::Hydro, E::Cryo) | (A::Cryo, E::Hydro) => {
            rule(R::Frozen, 1.0, Transform(AuraKind::Frozen))
        }
        (A::Dendro, E::Electro) | (A::Electro, E::Dendro) => {
            rule(R::Quicken, 1.0, Transform(AuraKind::Quicken))
        }
        (A::Quicken, E::Electro) => rule(R::Aggravate, 1.0, Keep),
        (A::Quicken, E::Dendro) => rule(R::Spread, 1.0, Keep),
        (A::Dendro | A::Quicken, E::Pyro) | (A::Pyro, E::Dendro) => {
            rule(R::Burning, 1.0, Consume(1.0))
        }
        (A::Dendro | A::Quicken, E::Hydro) | (A::Hydro, E::Dendro) => {
            rule(R::Bloom, 1.0, Consume(1.0))
        }
        (A::Pyro | A::Hydro | A::Electro | A::Cryo | A::Frozen, E::Anemo) => {
            rule(R::Swirl, 1.0, Consume(1.0))
        }
        (A::Frozen, E::Geo) => rule(R::Shattered, 1.0, Consume(1.0)),
        (A::Frozen, _) if blunt => rule(R::Shattered, 1.0, Consume(1.0)),
        (A::Pyro | A::Hydro | A::Electro | A::Cryo, E::Geo) => {
            rule(R::Crystallize, 1.0, Consume(1.0))
        }
        _ => return None,
    };
    Some(found)
}

// ============================================================================
// Multipliers
// ============================================================================

/// Amplifying mastery bonus: `2.78 EM / (EM + 1400)`.
#[must_use]
pub fn amplifying_mastery_bonus(mastery: f64) -> f64 {
    2.78 * mastery / (mastery + 1400.0)
}

/// Transformative mastery bonus: `16 EM / (EM + 2000)`.
#[must_use]
pub fn transformative_mastery_bonus(mastery: f64) -> f64 {
    16.0 * mastery / (mastery + 2000.0)
}

/// Additive mastery bonus: `5 EM / (EM + 1200)`.
#[must_use]
pub fn additive_mastery_bonus(mastery: f64) -> f64 {
    5.0 * mastery / (mastery + 1200.0)
}

/// Returns the multiplier a reaction contributes, given attacker mastery.
///
/// Amplifying: `base * (1 + amplifying bonus)`. Additive and transformative:
/// `coefficient * (1 + bonus)`, to be scaled by [`level_multiplier`].
/// Status reactions and pairs without a reaction return 1.
#[must_use]
pub fn reaction_multiplier(existing: AuraKind, incoming: Element, mastery: f64) -> f64 {
    reaction_rule(existing, incoming, false).map_or(1.0, |rule| rule_multiplier(&rule, mastery))
}

fn rule_multiplier(rule: &ReactionRule, mastery: f64) -> f64 {
    let mastery = mastery.max(0.0);
    match rule.kind.category() {
        ReactionCategory::Amplifying => {
            rule.base_multiplier * (1.0 + amplifying_mastery_bonus(mastery))
        }
        ReactionCategory::Additive => {
            rule.kind.coefficient() * (1.0 + additive_mastery_bonus(mastery))
        }
        ReactionCategory::Transformative => {
            rule.kind.coefficient() * (1.0 + transformative_mastery_bonus(mastery))
        }
        ReactionCategory::Status => 1.0,
    }
}

const LEVEL_ANCHORS: [(u32, f64); 10] = [
    (1, 17.165_606),
    (10, 34.143_085),
    (20, 80.584_775),
    (30, 136.292_91),
    (40, 207.382_042),
    (50, 323.601_597),
    (60, 492.884_89),
    (70, 765.640_231),
    (80, 1_077.443_668),
    (90, 1_446.853_458),
];

/// Character level multiplier of transformative and additive reactions.
///
/// Linear between tabulated levels; clamped outside `1..=90`.
#[must_use]
pub fn level_multiplier(level: u32) -> f64 {
    let (first_level, first_value) = LEVEL_ANCHORS[0];
    if level <= first_level {
        return first_value;
    }
    for pair in LEVEL_ANCHORS.windows(2) {
        let (lo_level, lo_value) = pair[0];
        let (hi_level, hi_value) = pair[1];
        if level <= hi_level {
            let t = f64::from(level - lo_level) / f64::from(hi_level - lo_level);
            return lo_value + (hi_value - lo_value) * t;
        }
    }
    LEVEL_ANCHORS[LEVEL_ANCHORS.len() - 1].1
}

/// Element whose resistance applies to a transformative reaction.
#[must_use]
pub fn transformative_element(kind: ReactionKind, existing: AuraKind) -> Element {
    match kind {
        ReactionKind::Overloaded | ReactionKind::Burning => Element::Pyro,
        ReactionKind::Superconduct => Element::Cryo,
        ReactionKind::ElectroCharged => Element::Electro,
        ReactionKind::Bloom => Element::Dendro,
        ReactionKind::Shattered => Element::Physical,
        ReactionKind::Swirl => existing.element().unwrap_or(Element::Cryo),
        _ => Element::Physical,
    }
}

// ============================================================================
// Engine
// ============================================================================

/// A reaction that happened.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReactionOutcome {
    /// Reaction triggered.
    pub kind: ReactionKind,
    /// Reaction category.
    pub category: ReactionCategory,
    /// Aura that was on the target.
    pub existing: AuraKind,
    /// Element of the triggering hit.
    pub incoming: Element,
    /// Base multiplier of amplifying reactions.
    pub base_multiplier: f64,
    /// Gauge removed from the aura.
    pub gauge_consumed: f64,
}

impl ReactionOutcome {
    /// Returns this reaction's multiplier for a given attacker mastery.
    #[must_use]
    pub fn multiplier(&self, mastery: f64) -> f64 {
        rule_multiplier(
            &rule(self.kind, self.base_multiplier, AuraChange::Keep),
            mastery,
        )
    }
}

/// What an elemental hit did to the target's aura.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ApplyResult {
    /// The element attached as a new aura.
    Attached(AuraKind),
    /// The same element refreshed the aura timer.
    Refreshed,
    /// A reaction was triggered.
    Reacted(ReactionOutcome),
    /// The pair does not react; the aura is unchanged.
    NoReaction,
    /// The element neither attaches nor reacts.
    NotApplicable,
}

impl ApplyResult {
    /// Returns the reaction, if any.
    #[must_use]
    pub fn reaction(&self) -> Option<&ReactionOutcome> {
        match self {
            Self::Reacted(outcome) => Some(outcome),
            _ => None,
        }
    }
}

/// Aura state of every target.
#[derive(Debug, Clone, Default)]
pub struct ReactionEngine {
    auras: BTreeMap<TargetId, Aura>,
}

impl ReactionEngine {
    /// Creates an engine with no auras.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the aura on a target.
    #[must_use]
    pub fn aura(&self, target: TargetId) -> Option<&Aura> {
        self.auras.get(&target)
    }

    /// Applies an element with `gauge` units to a target.
    pub fn apply(
        &mut self,
        target: TargetId,
        element: Element,
        gauge: f64,
        blunt: bool,
    ) -> ApplyResult {
        let Some(existing) = self.auras.get(&target).copied() else {
            return match AuraKind::from_element(element) {
                Some(kind) if gauge > 0.0 => {
                    self.auras
                        .insert(target, Aura::new(kind, AURA_TAX * gauge, aura_duration(gauge)));
                    ApplyResult::Attached(kind)
                }
                _ => ApplyResult::NotApplicable,
            };
        };

        if existing.kind.element() == Some(element) {
            if let Some(aura) = self.auras.get_mut(&target) {
                aura.remaining = aura.duration;
            }
            return ApplyResult::Refreshed;
        }

        let Some(found) = reaction_rule(existing.kind, element, blunt) else {
            return if element.can_attach() || blunt {
                ApplyResult::NoReaction
            } else {
                ApplyResult::NotApplicable
            };
        };

        let gauge_consumed = match found.aura_change {
            AuraChange::Consume(ratio) => {
                let consumed = existing.gauge.min(gauge * ratio);
                let left = existing.gauge - consumed;
                if left <= GAUGE_EPSILON {
                    self.auras.remove(&target);
                } else if let Some(aura) = self.auras.get_mut(&target) {
                    aura.gauge = left;
                }
                consumed
            }
            AuraChange::Keep => 0.0,
            AuraChange::Transform(kind) => {
                let consumed = existing.gauge.min(gauge);
                let (status_gauge, duration) = match kind {
                    AuraKind::Frozen => {
                        let g = 2.0 * consumed;
                        (g, frozen_duration(g))
                    }
                    _ => (consumed, quicken_duration(consumed)),
                };
                self.auras
                    .insert(target, Aura::new(kind, status_gauge, duration));
                consumed
            }
        };

        trace!(
            "{} on {:?} + {} consumed {:.2} GU",
            found.kind,
            existing.kind,
            element,
            gauge_consumed
        );

        ApplyResult::Reacted(ReactionOutcome {
            kind: found.kind,
            category: found.kind.category(),
            existing: existing.kind,
            incoming: element,
            base_multiplier: found.base_multiplier,
            gauge_consumed,
        })
    }

    /// Advances every aura timer by one frame.
    ///
    /// Returns the auras that decayed.
    pub fn tick(&mut self) -> Vec<(TargetId, AuraKind)> {
        let mut decayed = Vec::new();
        self.auras.retain(|target, aura| {
            aura.remaining = aura.remaining.saturating_sub(1);
            if aura.remaining == 0 {
                decayed.push((*target, aura.kind));
                false
            } else {
                true
            }
        });
        decayed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const T: TargetId = TargetId::PRIMARY;

    #[test]
    fn test_attach_on_clean_target() {
        let mut engine = ReactionEngine::new();
        assert_eq!(
            engine.apply(T, Element::Pyro, 1.0, false),
            ApplyResult::Attached(AuraKind::Pyro)
        );
        let aura = engine.aura(T).expect("aura attached");
        assert!((aura.gauge - 0.8).abs() < 1e-12);
        assert_eq!(aura.remaining, 570);
    }

    #[test]
    fn test_non_attaching_elements() {
        let mut engine = ReactionEngine::new();
        for element in [Element::Anemo, Element::Geo, Element::Physical] {
            assert_eq!(engine.apply(T, element, 1.0, false), ApplyResult::NotApplicable);
        }
        assert!(engine.aura(T).is_none());
    }

    #[test]
    fn test_same_element_refreshes_only() {
        let mut engine = ReactionEngine::new();
        engine.apply(T, Element::Hydro, 1.0, false);
        for _ in 0..100 {
            engine.tick();
        }
        let before = *engine.aura(T).expect("aura");

        assert_eq!(engine.apply(T, Element::Hydro, 2.0, false), ApplyResult::Refreshed);
        let after = *engine.aura(T).expect("aura");
        assert_eq!(after.kind, AuraKind::Hydro);
        assert_eq!(after.gauge, before.gauge);
        assert_eq!(after.remaining, after.duration);
    }

    #[test]
    fn test_strong_vaporize_clears_aura() {
        let mut engine = ReactionEngine::new();
        engine.apply(T, Element::Pyro, 1.0, false);
        let result = engine.apply(T, Element::Hydro, 1.0, false);

        let outcome = result.reaction().expect("reaction");
        assert_eq!(outcome.kind, ReactionKind::Vaporize);
        assert_eq!(outcome.category, ReactionCategory::Amplifying);
        assert_eq!(outcome.base_multiplier, 2.0);
        assert!((outcome.gauge_consumed - 0.8).abs() < 1e-12);
        assert!(engine.aura(T).is_none());
    }

    #[test]
    fn test_weak_melt_leaves_gauge() {
        let mut engine = ReactionEngine::new();
        engine.apply(T, Element::Pyro, 2.0, false);
        let outcome = *engine
            .apply(T, Element::Cryo, 1.0, false)
            .reaction()
            .expect("melt");
        assert_eq!(outcome.kind, ReactionKind::Melt);
        assert_eq!(outcome.base_multiplier, 1.5);
        let aura = engine.aura(T).expect("pyro remains");
        assert!((aura.gauge - 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_freeze_and_shatter() {
        let mut engine = ReactionEngine::new();
        engine.apply(T, Element::Hydro, 1.0, false);
        let frozen = engine.apply(T, Element::Cryo, 1.0, false);
        assert_eq!(
            frozen.reaction().map(|r| r.kind),
            Some(ReactionKind::Frozen)
        );
        assert_eq!(engine.aura(T).map(|a| a.kind), Some(AuraKind::Frozen));

        assert_eq!(
            engine.apply(T, Element::Physical, 1.0, false),
            ApplyResult::NotApplicable
        );
        let shattered = engine.apply(T, Element::Physical, 1.0, true);
        assert_eq!(
            shattered.reaction().map(|r| r.kind),
            Some(ReactionKind::Shattered)
        );
    }

    #[test]
    fn test_quicken_then_aggravate_keeps_aura() {
        let mut engine = ReactionEngine::new();
        engine.apply(T, Element::Dendro, 1.0, false);
        engine.apply(T, Element::Electro, 1.0, false);
        assert_eq!(engine.aura(T).map(|a| a.kind), Some(AuraKind::Quicken));

        let outcome = *engine
            .apply(T, Element::Electro, 1.0, false)
            .reaction()
            .expect("aggravate");
        assert_eq!(outcome.kind, ReactionKind::Aggravate);
        assert_eq!(outcome.gauge_consumed, 0.0);
        assert_eq!(engine.aura(T).map(|a| a.kind), Some(AuraKind::Quicken));
    }

    #[test]
    fn test_no_reaction_pair() {
        let mut engine = ReactionEngine::new();
        engine.apply(T, Element::Dendro, 1.0, false);
        assert_eq!(engine.apply(T, Element::Cryo, 1.0, false), ApplyResult::NoReaction);
        assert_eq!(engine.aura(T).map(|a| a.kind), Some(AuraKind::Dendro));
    }

    #[test]
    fn test_aura_decays() {
        let mut engine = ReactionEngine::new();
        engine.apply(T, Element::Electro, 1.0, false);
        let duration = engine.aura(T).expect("aura").duration;
        for _ in 1..duration {
            assert!(engine.tick().is_empty());
        }
        assert_eq!(engine.tick(), vec![(T, AuraKind::Electro)]);
    }

    #[test]
    fn test_multipliers() {
        assert_eq!(reaction_multiplier(AuraKind::Pyro, Element::Hydro, 0.0), 2.0);
        let vape = reaction_multiplier(AuraKind::Pyro, Element::Hydro, 100.0);
        assert!((vape - 2.0 * (1.0 + 278.0 / 1500.0)).abs() < 1e-12);
        assert_eq!(reaction_multiplier(AuraKind::Pyro, Element::Electro, 0.0), 2.0);
        assert_eq!(reaction_multiplier(AuraKind::Dendro, Element::Cryo, 500.0), 1.0);
    }

    #[test]
    fn test_level_multiplier() {
        assert!((level_multiplier(90) - 1446.853458).abs() < 1e-9);
        assert!((level_multiplier(1) - 17.165606).abs() < 1e-9);
        let mid = level_multiplier(85);
        assert!(mid > level_multiplier(80) && mid < level_multiplier(90));
        assert_eq!(level_multiplier(120), level_multiplier(90));
    }

    #[test]
    fn test_swirl_element_follows_aura() {
        assert_eq!(
            transformative_element(ReactionKind::Swirl, AuraKind::Hydro),
            Element::Hydro
        );
        assert_eq!(
            transformative_element(ReactionKind::Overloaded, AuraKind::Electro),
            Element::Pyro
        );
    }

    proptest! {
        #[test]
        fn prop_reaction_multiplier_is_pure(mastery in 0.0f64..3000.0, a in 0usize..7, e in 0usize..8) {
            let auras = [
                AuraKind::Pyro, AuraKind::Hydro, AuraKind::Electro, AuraKind::Cryo,
                AuraKind::Dendro, AuraKind::Frozen, AuraKind::Quicken,
            ];
            let element = Element::all()[e];
            let first = reaction_multiplier(auras[a], element, mastery);
            let second = reaction_multiplier(auras[a], element, mastery);
            prop_assert_eq!(first.to_bits(), second.to_bits());
            prop_assert!(first > 0.0);
        }

        #[test]
        fn prop_same_element_never_changes_aura(gauge in 0.5f64..4.0, ticks in 0u32..400) {
            let mut engine = ReactionEngine::new();
            engine.apply(T, Element::Cryo, gauge, false);
            for _ in 0..ticks {
                engine.tick();
            }
            let before = engine.aura(T).copied();
            engine.apply(T, Element::Cryo, gauge, false);
            let after = engine.aura(T).copied();
            match before {
                Some(before) => {
                    let after = after.expect("aura kept");
                    prop_assert_eq!(after.kind, before.kind);
                    prop_assert_eq!(after.gauge, before.gauge);
                }
                None => prop_assert_eq!(after.map(|a| a.kind), Some(AuraKind::Cryo)),
            }
        }
    }
}
