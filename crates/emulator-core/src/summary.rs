//! Run summary metrics derived from the event log.

use std::collections::BTreeMap;

use emulator_common::{frames_to_seconds, Frame};
use serde::{Deserialize, Serialize};

use crate::damage::DamageType;
use crate::event_log::EventLog;
use crate::reaction::ReactionKind;

/// Headline numbers of one run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Sum of every damage event.
    pub total_damage: u64,
    /// Frames simulated.
    pub frames: Frame,
    /// Simulated seconds.
    pub duration_s: f64,
    /// Damage per simulated second.
    pub dps: f64,
    /// Ability hits (reaction instances excluded).
    pub hits: u32,
    /// Ability hits that rolled a crit.
    pub crits: u32,
    /// `crits / hits` (0 when crits are not rolled).
    pub crit_ratio: f64,
    /// Damage per character name.
    pub by_character: BTreeMap<String, u64>,
    /// Damage per ability type.
    pub by_damage_type: BTreeMap<DamageType, u64>,
    /// Reaction trigger counts.
    pub reactions: BTreeMap<ReactionKind, u32>,
    /// Actions skipped by validation.
    pub skipped_actions: usize,
    /// True if the run hit the frame bound.
    pub truncated: bool,
}

impl RunSummary {
    /// Summarizes a log.
    #[must_use]
    pub fn from_log(log: &EventLog, skipped_actions: usize, truncated: bool) -> Self {
        let frames = Frame::try_from(log.len()).unwrap_or(Frame::MAX);
        let mut summary = Self {
            frames,
            duration_s: frames_to_seconds(frames),
            skipped_actions,
            truncated,
            ..Self::default()
        };

        for event in log.damage_events() {
            summary.total_damage += event.value;
            *summary
                .by_character
                .entry(event.character.clone())
                .or_insert(0) += event.value;
            *summary.by_damage_type.entry(event.damage_type).or_insert(0) += event.value;

            if event.damage_type == DamageType::Reaction {
                continue;
            }
            summary.hits += 1;
            if event.crit {
                summary.crits += 1;
            }
            if let Some(kind) = event.reaction_kind {
                *summary.reactions.entry(kind).or_insert(0) += 1;
            }
        }

        summary.dps = calculate_dps(summary.total_damage, summary.duration_s);
        summary.crit_ratio = if summary.hits == 0 {
            0.0
        } else {
            f64::from(summary.crits) / f64::from(summary.hits)
        };
        summary
    }
}

/// Damage per second, 0 for an empty duration.
#[must_use]
pub fn calculate_dps(total_damage: u64, duration_s: f64) -> f64 {
    if duration_s <= 0.0 {
        0.0
    } else {
        total_damage as f64 / duration_s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::damage::{DamageBreakdown, DamageEvent};
    use emulator_common::{CharacterId, Element, TargetId};

    fn event(value: u64, damage_type: DamageType, crit: bool) -> DamageEvent {
        DamageEvent {
            frame: 0,
            source: CharacterId::new(0),
            character: "Fischl".into(),
            target: TargetId::PRIMARY,
            value,
            element: Element::Electro,
            damage_type,
            reaction: damage_type == DamageType::Reaction,
            reaction_kind: (damage_type == DamageType::Reaction).then_some(ReactionKind::Overloaded),
            crit,
            breakdown: DamageBreakdown::default(),
        }
    }

    #[test]
    fn test_summary_totals() {
        let mut log = EventLog::new();
        log.record(
            0,
            BTreeMap::new(),
            vec![
                event(100, DamageType::Skill, true),
                event(50, DamageType::NormalAttack, false),
            ],
        )
        .expect("record");
        for frame in 1..60 {
            log.record(frame, BTreeMap::new(), vec![]).expect("record");
        }
        log.record(60, BTreeMap::new(), vec![event(30, DamageType::Reaction, false)])
            .expect("record");

        let summary = RunSummary::from_log(&log, 2, false);
        assert_eq!(summary.total_damage, 180);
        assert_eq!(summary.frames, 61);
        assert_eq!(summary.hits, 2);
        assert_eq!(summary.crits, 1);
        assert_eq!(summary.crit_ratio, 0.5);
        assert_eq!(summary.by_character["Fischl"], 180);
        assert_eq!(summary.by_damage_type[&DamageType::Reaction], 30);
        assert_eq!(summary.skipped_actions, 2);
        assert!((summary.dps - 180.0 / (61.0 / 60.0)).abs() < 1e-9);
    }

    #[test]
    fn test_calculate_dps() {
        assert_eq!(calculate_dps(600, 2.0), 300.0);
        assert_eq!(calculate_dps(600, 0.0), 0.0);
    }
}
