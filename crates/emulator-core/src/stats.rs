//! Stat resolution.
//!
//! This module provides:
//! - Stat kinds and stat lines (weapon, artifact, ascension, effect payloads)
//! - The effective stat sheet ("panel") of a character for one frame
//! - Talent level scaling of ability multipliers
//!
//! Resolution order follows the usual sheet formula:
//! `total = base * (1 + percent) + flat`, with every other stat a plain sum.

use std::collections::BTreeMap;

use emulator_common::Element;
use serde::{Deserialize, Serialize};

use crate::config::{ArtifactConfig, BaseStats, WeaponConfig};
use crate::damage::DamageType;
use crate::effect::EffectManager;

// ============================================================================
// Stat Kinds
// ============================================================================

/// A stat that equipment or effects can modify.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    /// Flat HP.
    Hp,
    /// HP percent of base.
    HpPercent,
    /// Flat ATK.
    Atk,
    /// ATK percent of base.
    AtkPercent,
    /// Flat DEF.
    Def,
    /// DEF percent of base.
    DefPercent,
    /// Crit rate (0.05 = 5%).
    CritRate,
    /// Crit damage (0.5 = 50%).
    CritDamage,
    /// Energy recharge (1.0 = 100%).
    EnergyRecharge,
    /// Elemental mastery.
    ElementalMastery,
    /// Physical damage bonus.
    PhysicalDmgBonus,
    /// Pyro damage bonus.
    PyroDmgBonus,
    /// Hydro damage bonus.
    HydroDmgBonus,
    /// Electro damage bonus.
    ElectroDmgBonus,
    /// Cryo damage bonus.
    CryoDmgBonus,
    /// Anemo damage bonus.
    AnemoDmgBonus,
    /// Geo damage bonus.
    GeoDmgBonus,
    /// Dendro damage bonus.
    DendroDmgBonus,
    /// Damage bonus for every element.
    AllDmgBonus,
    /// Normal attack damage bonus.
    NormalAttackDmgBonus,
    /// Charged attack damage bonus.
    ChargedAttackDmgBonus,
    /// Plunging attack damage bonus.
    PlungingAttackDmgBonus,
    /// Elemental skill damage bonus.
    SkillDmgBonus,
    /// Elemental burst damage bonus.
    BurstDmgBonus,
}

impl StatKind {
    /// Returns the damage bonus stat for an element.
    #[must_use]
    pub const fn dmg_bonus_for(element: Element) -> Self {
        match element {
            Element::Physical => Self::PhysicalDmgBonus,
            Element::Pyro => Self::PyroDmgBonus,
            Element::Hydro => Self::HydroDmgBonus,
            Element::Electro => Self::ElectroDmgBonus,
            Element::Cryo => Self::CryoDmgBonus,
            Element::Anemo => Self::AnemoDmgBonus,
            Element::Geo => Self::GeoDmgBonus,
            Element::Dendro => Self::DendroDmgBonus,
        }
    }

    /// Returns the damage bonus stat for an ability type, if it has one.
    #[must_use]
    pub const fn dmg_bonus_for_ability(damage_type: DamageType) -> Option<Self> {
        match damage_type {
            DamageType::NormalAttack => Some(Self::NormalAttackDmgBonus),
            DamageType::ChargedAttack => Some(Self::ChargedAttackDmgBonus),
            DamageType::PlungingAttack => Some(Self::PlungingAttackDmgBonus),
            DamageType::Skill => Some(Self::SkillDmgBonus),
            DamageType::Burst => Some(Self::BurstDmgBonus),
            DamageType::Reaction => None,
        }
    }
}

/// One stat contribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatLine {
    /// Stat being modified.
    pub stat: StatKind,
    /// Amount added (fractions for percent stats, 0.2 = 20%).
    pub value: f64,
}

impl StatLine {
    /// Creates a stat line.
    #[must_use]
    pub const fn new(stat: StatKind, value: f64) -> Self {
        Self { stat, value }
    }
}

// ============================================================================
// Panel
// ============================================================================

/// Fully resolved stat sheet of a character for the current frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    /// Character base HP.
    pub base_hp: f64,
    /// Effective maximum HP.
    pub max_hp: f64,
    /// Character plus weapon base ATK.
    pub base_atk: f64,
    /// Summed ATK percent.
    pub atk_percent: f64,
    /// Summed flat ATK.
    pub flat_atk: f64,
    /// Effective ATK.
    pub atk: f64,
    /// Character base DEF.
    pub base_def: f64,
    /// Effective DEF.
    pub def: f64,
    /// Crit rate, unclamped.
    pub crit_rate: f64,
    /// Crit damage.
    pub crit_damage: f64,
    /// Energy recharge.
    pub energy_recharge: f64,
    /// Elemental mastery.
    pub elemental_mastery: f64,
    /// Damage bonus per element.
    pub dmg_bonus: BTreeMap<Element, f64>,
    /// Damage bonus for every element.
    pub all_dmg_bonus: f64,
    /// Damage bonus per ability type.
    pub ability_dmg_bonus: BTreeMap<DamageType, f64>,
}

impl Panel {
    /// Returns the damage bonus for an element (excluding the all-element term).
    #[must_use]
    pub fn elemental_bonus(&self, element: Element) -> f64 {
        self.dmg_bonus.get(&element).copied().unwrap_or(0.0)
    }

    /// Returns the damage bonus for an ability type.
    #[must_use]
    pub fn ability_bonus(&self, damage_type: DamageType) -> f64 {
        self.ability_dmg_bonus
            .get(&damage_type)
            .copied()
            .unwrap_or(0.0)
    }

    /// Returns `1 + every damage bonus that applies to this hit`.
    #[must_use]
    pub fn bonus_factor(&self, element: Element, damage_type: DamageType) -> f64 {
        1.0 + self.elemental_bonus(element) + self.all_dmg_bonus + self.ability_bonus(damage_type)
    }

    /// Crit rate clamped to `[0, 1]`.
    #[must_use]
    pub fn effective_crit_rate(&self) -> f64 {
        self.crit_rate.clamp(0.0, 1.0)
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Per-stat sums of every contribution.
#[derive(Debug, Clone, Default)]
struct StatTotals {
    sums: BTreeMap<StatKind, f64>,
}

impl StatTotals {
    fn add(&mut self, line: &StatLine) {
        *self.sums.entry(line.stat).or_insert(0.0) += line.value;
    }

    fn extend<'a>(&mut self, lines: impl IntoIterator<Item = &'a StatLine>) {
        for line in lines {
            self.add(line);
        }
    }

    fn get(&self, stat: StatKind) -> f64 {
        self.sums.get(&stat).copied().unwrap_or(0.0)
    }
}

/// Folds base stats, equipment and active effects into a [`Panel`].
///
/// Resolution is pure and recomputed on every call; nothing is cached, so a
/// panel always reflects the effect set it was resolved against.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatResolver;

impl StatResolver {
    /// Resolves the panel of one character.
    #[must_use]
    pub fn resolve(
        base: &BaseStats,
        weapon: &WeaponConfig,
        artifacts: &[ArtifactConfig],
        effects: &EffectManager,
    ) -> Panel {
        let mut totals = StatTotals::default();
        totals.extend(&base.ascension);
        totals.extend(&weapon.stats);
        for artifact in artifacts {
            totals.extend(&artifact.stats);
        }
        totals.extend(effects.stat_lines());

        let base_atk = base.atk + weapon.base_atk;
        let atk_percent = totals.get(StatKind::AtkPercent);
        let flat_atk = totals.get(StatKind::Atk);

        let dmg_bonus = Element::all()
            .iter()
            .map(|&element| (element, totals.get(StatKind::dmg_bonus_for(element))))
            .filter(|(_, bonus)| *bonus != 0.0)
            .collect();

        let ability_dmg_bonus = DamageType::abilities()
            .iter()
            .filter_map(|&kind| {
                StatKind::dmg_bonus_for_ability(kind).map(|stat| (kind, totals.get(stat)))
            })
            .filter(|(_, bonus)| *bonus != 0.0)
            .collect();

        Panel {
            base_hp: base.hp,
            max_hp: scaled(base.hp, totals.get(StatKind::HpPercent), totals.get(StatKind::Hp)),
            base_atk,
            atk_percent,
            flat_atk,
            atk: scaled(base_atk, atk_percent, flat_atk),
            base_def: base.def,
            def: scaled(
                base.def,
                totals.get(StatKind::DefPercent),
                totals.get(StatKind::Def),
            ),
            crit_rate: base.crit_rate + totals.get(StatKind::CritRate),
            crit_damage: base.crit_damage + totals.get(StatKind::CritDamage),
            energy_recharge: base.energy_recharge + totals.get(StatKind::EnergyRecharge),
            elemental_mastery: base.elemental_mastery + totals.get(StatKind::ElementalMastery),
            dmg_bonus,
            all_dmg_bonus: totals.get(StatKind::AllDmgBonus),
            ability_dmg_bonus,
        }
    }
}

fn scaled(base: f64, percent: f64, flat: f64) -> f64 {
    base * (1.0 + percent) + flat
}

// ============================================================================
// Talent Scaling
// ============================================================================

/// Highest talent level reachable with constellation boosts.
pub const MAX_TALENT_LEVEL: u8 = 15;

/// Standard talent multiplier scaling relative to level 1.
const TALENT_SCALING: [f64; MAX_TALENT_LEVEL as usize] = [
    1.0, 1.075, 1.15, 1.25, 1.325, 1.4, 1.5, 1.6, 1.7, 1.8, 1.9, 2.0, 2.125, 2.25, 2.375,
];

/// Returns the ability multiplier scale for a talent level.
///
/// Levels outside `1..=15` are clamped.
#[must_use]
pub fn talent_scaling(level: u8) -> f64 {
    let index = level.clamp(1, MAX_TALENT_LEVEL) as usize - 1;
    TALENT_SCALING[index]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{Effect, EffectPayload, EffectSource};

    fn base() -> BaseStats {
        BaseStats {
            hp: 10_000.0,
            atk: 200.0,
            def: 600.0,
            ..BaseStats::default()
        }
    }

    #[test]
    fn test_resolve_base_only() {
        let panel = StatResolver::resolve(
            &base(),
            &WeaponConfig::default(),
            &[],
            &EffectManager::new(),
        );
        assert_eq!(panel.atk, 200.0);
        assert_eq!(panel.max_hp, 10_000.0);
        assert!((panel.crit_rate - 0.05).abs() < 1e-12);
        assert!((panel.crit_damage - 0.5).abs() < 1e-12);
        assert!(panel.dmg_bonus.is_empty());
    }

    #[test]
    fn test_percent_applies_to_base_only() {
        let weapon = WeaponConfig {
            name: "Prototype".into(),
            base_atk: 300.0,
            stats: vec![StatLine::new(StatKind::AtkPercent, 0.5)],
        };
        let artifacts = vec![ArtifactConfig {
            set: "Gladiator".into(),
            stats: vec![StatLine::new(StatKind::Atk, 311.0)],
        }];
        let panel = StatResolver::resolve(&base(), &weapon, &artifacts, &EffectManager::new());

        // (200 + 300) * 1.5 + 311
        assert!((panel.atk - 1061.0).abs() < 1e-9);
        assert_eq!(panel.base_atk, 500.0);
    }

    #[test]
    fn test_effects_change_panel() {
        let mut effects = EffectManager::new();
        let before = StatResolver::resolve(&base(), &WeaponConfig::default(), &[], &effects);

        effects.apply(
            Effect::new(
                "Bennett Burst",
                EffectSource::External,
                EffectPayload::Stats(vec![StatLine::new(StatKind::Atk, 100.0)]),
            )
            .with_duration(120),
        );
        let after = StatResolver::resolve(&base(), &WeaponConfig::default(), &[], &effects);

        assert_eq!(before.atk, 200.0);
        assert_eq!(after.atk, 300.0);
    }

    #[test]
    fn test_bonus_factor() {
        let artifacts = vec![ArtifactConfig {
            set: "Crimson Witch".into(),
            stats: vec![
                StatLine::new(StatKind::PyroDmgBonus, 0.466),
                StatLine::new(StatKind::AllDmgBonus, 0.1),
                StatLine::new(StatKind::SkillDmgBonus, 0.2),
            ],
        }];
        let panel = StatResolver::resolve(
            &base(),
            &WeaponConfig::default(),
            &artifacts,
            &EffectManager::new(),
        );

        let skill = panel.bonus_factor(Element::Pyro, DamageType::Skill);
        assert!((skill - 1.766).abs() < 1e-9);
        let normal = panel.bonus_factor(Element::Physical, DamageType::NormalAttack);
        assert!((normal - 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_talent_scaling() {
        assert_eq!(talent_scaling(1), 1.0);
        assert_eq!(talent_scaling(10), 1.8);
        assert_eq!(talent_scaling(0), 1.0);
        assert_eq!(talent_scaling(99), 2.375);
    }
}
