//! Damage calculation.
//!
//! This module provides:
//! - Damage types and damage events
//! - Resistance models
//! - Crit decisions (expected value or seeded rolls)
//! - The damage formula, with a full breakdown of every factor
//!
//! `final = (ATK * multiplier + additive) * bonus * resistance * crit * reaction`,
//! rounded half-up to an integer.

use emulator_common::{ActionKind, CharacterId, Element, Frame, TargetId};
use serde::{Deserialize, Serialize};

use crate::reaction::{
    level_multiplier, transformative_element, ReactionCategory, ReactionKind, ReactionOutcome,
};
use crate::stats::Panel;

/// Lowest resistance factor the linear model returns.
pub const RESISTANCE_FACTOR_FLOOR: f64 = 0.0;

// ============================================================================
// Damage Types
// ============================================================================

/// What kind of ability dealt the damage.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    /// Normal attack.
    NormalAttack,
    /// Charged attack.
    ChargedAttack,
    /// Plunging attack.
    PlungingAttack,
    /// Elemental skill.
    Skill,
    /// Elemental burst.
    Burst,
    /// Transformative reaction.
    Reaction,
}

impl DamageType {
    /// Returns the ability damage types (everything but reactions).
    #[must_use]
    pub const fn abilities() -> &'static [Self] {
        &[
            Self::NormalAttack,
            Self::ChargedAttack,
            Self::PlungingAttack,
            Self::Skill,
            Self::Burst,
        ]
    }

    /// Returns the damage type of an action, if it deals damage.
    #[must_use]
    pub const fn from_action(action: ActionKind) -> Option<Self> {
        match action {
            ActionKind::NormalAttack => Some(Self::NormalAttack),
            ActionKind::ChargedAttack => Some(Self::ChargedAttack),
            ActionKind::PlungingAttack => Some(Self::PlungingAttack),
            ActionKind::Skill => Some(Self::Skill),
            ActionKind::Burst => Some(Self::Burst),
            ActionKind::Dash | ActionKind::Jump | ActionKind::Skip => None,
        }
    }

    /// Returns the snake_case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NormalAttack => "normal_attack",
            Self::ChargedAttack => "charged_attack",
            Self::PlungingAttack => "plunging_attack",
            Self::Skill => "skill",
            Self::Burst => "burst",
            Self::Reaction => "reaction",
        }
    }
}

// ============================================================================
// Resistance
// ============================================================================

/// Resistance formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResistanceModel {
    /// `max(1 - res/100, floor)`.
    #[default]
    Linear,
    /// Game piecewise curve: negative resistance halved, above 75%
    /// `1 / (4r + 1)`.
    Tiered,
}

/// Returns the damage factor for a resistance percent.
#[must_use]
pub fn resistance_factor(model: ResistanceModel, resistance_percent: f64) -> f64 {
    let r = resistance_percent / 100.0;
    match model {
        ResistanceModel::Linear => (1.0 - r).max(RESISTANCE_FACTOR_FLOOR),
        ResistanceModel::Tiered => {
            if r < 0.0 {
                1.0 - r / 2.0
            } else if r < 0.75 {
                1.0 - r
            } else {
                1.0 / (4.0 * r + 1.0)
            }
        }
    }
}

/// Rounds half-up to a non-negative integer.
#[must_use]
pub fn round_half_up(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        (value + 0.5).floor() as u64
    } else {
        0
    }
}

// ============================================================================
// Crits
// ============================================================================

/// How crits are decided for a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CritMode {
    /// Every hit deals its expected value `1 + rate * damage`.
    #[default]
    Expected,
    /// Each hit rolls against crit rate.
    Stochastic,
}

/// Crit result of one hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CritDecision {
    /// The hit crit.
    Crit,
    /// The hit did not crit.
    NoCrit,
    /// The hit uses the expected crit multiplier.
    Expected,
}

impl CritDecision {
    /// Returns the crit multiplier for a panel.
    #[must_use]
    pub fn multiplier(self, panel: &Panel) -> f64 {
        match self {
            Self::Crit => 1.0 + panel.crit_damage,
            Self::NoCrit => 1.0,
            Self::Expected => 1.0 + panel.effective_crit_rate() * panel.crit_damage,
        }
    }

    /// Returns true for a rolled crit.
    #[must_use]
    pub const fn is_crit(self) -> bool {
        matches!(self, Self::Crit)
    }
}

/// Seeded crit decisions for one run.
#[derive(Debug, Clone)]
pub struct CritRoller {
    mode: CritMode,
    rng: fastrand::Rng,
}

impl CritRoller {
    /// Creates a roller.
    #[must_use]
    pub fn new(mode: CritMode, seed: u64) -> Self {
        Self {
            mode,
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    /// Returns the crit mode.
    #[must_use]
    pub const fn mode(&self) -> CritMode {
        self.mode
    }

    /// Decides one hit. Expected mode never draws from the RNG.
    pub fn decide(&mut self, crit_rate: f64) -> CritDecision {
        match self.mode {
            CritMode::Expected => CritDecision::Expected,
            CritMode::Stochastic => {
                if self.rng.f64() < crit_rate.clamp(0.0, 1.0) {
                    CritDecision::Crit
                } else {
                    CritDecision::NoCrit
                }
            }
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Every factor of a damage instance.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DamageBreakdown {
    /// Effective ATK (level multiplier for transformative reactions).
    pub attack: f64,
    /// Ability multiplier (reaction coefficient for transformative).
    pub ability_multiplier: f64,
    /// Flat base from additive reactions.
    pub additive_base: f64,
    /// `1 + damage bonuses`.
    pub bonus_factor: f64,
    /// Resistance factor.
    pub resistance_factor: f64,
    /// Crit multiplier.
    pub crit_multiplier: f64,
    /// Amplifying reaction multiplier.
    pub reaction_multiplier: f64,
    /// Value before rounding.
    pub unrounded: f64,
}

/// Value and breakdown of one computed instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageResult {
    /// Rounded damage.
    pub value: u64,
    /// Crit decision used.
    pub crit: CritDecision,
    /// Factors.
    pub breakdown: DamageBreakdown,
}

/// One damage instance recorded in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageEvent {
    /// Frame the hit landed.
    pub frame: Frame,
    /// Attacker slot.
    pub source: CharacterId,
    /// Attacker name.
    pub character: String,
    /// Target hit.
    pub target: TargetId,
    /// Rounded damage.
    pub value: u64,
    /// Element dealt.
    pub element: Element,
    /// Ability type.
    pub damage_type: DamageType,
    /// True if a reaction was involved.
    pub reaction: bool,
    /// Reaction involved.
    pub reaction_kind: Option<ReactionKind>,
    /// True for a rolled crit.
    pub crit: bool,
    /// Factors.
    pub breakdown: DamageBreakdown,
}

// ============================================================================
// Calculator
// ============================================================================

/// Inputs of one ability hit.
#[derive(Debug, Clone, Copy)]
pub struct HitInput<'a> {
    /// Attacker panel.
    pub panel: &'a Panel,
    /// Attacker level.
    pub level: u32,
    /// Talent-scaled ability multiplier.
    pub ability_multiplier: f64,
    /// Element dealt.
    pub element: Element,
    /// Ability type.
    pub damage_type: DamageType,
    /// Target resistance percent for `element`, after shred.
    pub resistance_percent: f64,
    /// Reaction triggered by the hit.
    pub reaction: Option<&'a ReactionOutcome>,
}

/// Pure damage formula parameterized by the resistance model.
#[derive(Debug, Clone, Copy, Default)]
pub struct DamageCalculator {
    model: ResistanceModel,
}

impl DamageCalculator {
    /// Creates a calculator.
    #[must_use]
    pub const fn new(model: ResistanceModel) -> Self {
        Self { model }
    }

    /// Computes an ability hit.
    #[must_use]
    pub fn compute(&self, hit: &HitInput<'_>, crit: CritDecision) -> DamageResult {
        let mastery = hit.panel.elemental_mastery;
        let (additive_base, reaction_multiplier) = match hit.reaction {
            Some(outcome) => match outcome.category {
                ReactionCategory::Amplifying => (0.0, outcome.multiplier(mastery)),
                ReactionCategory::Additive => {
                    (level_multiplier(hit.level) * outcome.multiplier(mastery), 1.0)
                }
                ReactionCategory::Transformative | ReactionCategory::Status => (0.0, 1.0),
            },
            None => (0.0, 1.0),
        };

        let attack = hit.panel.atk;
        let bonus_factor = hit.panel.bonus_factor(hit.element, hit.damage_type);
        let resistance = resistance_factor(self.model, hit.resistance_percent);
        let crit_multiplier = crit.multiplier(hit.panel);

        let unrounded = (attack * hit.ability_multiplier + additive_base)
            * bonus_factor
            * resistance
            * crit_multiplier
            * reaction_multiplier;

        DamageResult {
            value: round_half_up(unrounded),
            crit,
            breakdown: DamageBreakdown {
                attack,
                ability_multiplier: hit.ability_multiplier,
                additive_base,
                bonus_factor,
                resistance_factor: resistance,
                crit_multiplier,
                reaction_multiplier,
                unrounded,
            },
        }
    }

    /// Computes the separate instance of a transformative reaction.
    ///
    /// Returns the element dealt with the result. Transformative damage
    /// never crits and ignores damage bonuses.
    #[must_use]
    pub fn transformative(
        &self,
        outcome: &ReactionOutcome,
        level: u32,
        mastery: f64,
        resistance_percent_of: impl Fn(Element) -> f64,
    ) -> (Element, DamageResult) {
        let element = transformative_element(outcome.kind, outcome.existing);
        let attack = level_multiplier(level);
        let multiplier = outcome.multiplier(mastery);
        let resistance = resistance_factor(self.model, resistance_percent_of(element));
        let unrounded = attack * multiplier * resistance;

        let result = DamageResult {
            value: round_half_up(unrounded),
            crit: CritDecision::NoCrit,
            breakdown: DamageBreakdown {
                attack,
                ability_multiplier: multiplier,
                additive_base: 0.0,
                bonus_factor: 1.0,
                resistance_factor: resistance,
                crit_multiplier: 1.0,
                reaction_multiplier: 1.0,
                unrounded,
            },
        };
        (element, result)
    }
}
