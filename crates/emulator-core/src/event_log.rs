//! Frame-indexed record of a run.
//!
//! One [`FrameSnapshot`] is recorded per simulated frame, in strictly
//! increasing frame order. The log is append-only and serializes to the
//! JSON frame-log artifact with a `character` and a `damage` domain.

use std::collections::BTreeMap;
use std::path::Path;

use emulator_common::{Document, EmulationError, EmulationResult, Frame, SchemaVersion};
use serde::{Deserialize, Serialize};

use crate::character::CharacterStatus;
use crate::damage::DamageEvent;

/// Query domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Character status records.
    Character,
    /// Damage events.
    Damage,
}

/// Damage dealt in one frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DamageFrame {
    /// Sum of every event value.
    pub value: u64,
    /// Events in dispatch order.
    pub damage: Vec<DamageEvent>,
}

impl DamageFrame {
    /// Builds a frame, computing the aggregate from the events.
    #[must_use]
    pub fn new(damage: Vec<DamageEvent>) -> Self {
        Self {
            value: damage.iter().map(|event| event.value).sum(),
            damage,
        }
    }
}

/// Everything recorded for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSnapshot {
    /// Frame index.
    pub frame: Frame,
    /// Character name to status.
    pub characters: BTreeMap<String, CharacterStatus>,
    /// Damage dealt.
    pub damage: DamageFrame,
}

/// Borrowed result of [`EventLog::query`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DomainView<'a> {
    /// Character domain.
    Character(BTreeMap<Frame, &'a BTreeMap<String, CharacterStatus>>),
    /// Damage domain.
    Damage(BTreeMap<Frame, &'a DamageFrame>),
}

impl DomainView<'_> {
    /// Returns the number of frames in the view.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Character(map) => map.len(),
            Self::Damage(map) => map.len(),
        }
    }

    /// Returns true if the view holds no frame.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Serialized frame log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogDocument {
    /// Format version.
    pub version: SchemaVersion,
    /// Character domain.
    pub character: BTreeMap<Frame, BTreeMap<String, CharacterStatus>>,
    /// Damage domain.
    pub damage: BTreeMap<Frame, DamageFrame>,
}

/// Append-only frame log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventLog {
    frames: Vec<FrameSnapshot>,
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a frame.
    ///
    /// Fails if `frame` is not strictly after the last recorded frame.
    pub fn record(
        &mut self,
        frame: Frame,
        characters: BTreeMap<String, CharacterStatus>,
        damage: Vec<DamageEvent>,
    ) -> EmulationResult<()> {
        if let Some(last) = self.last_frame() {
            if frame <= last {
                return Err(EmulationError::OutOfOrderFrame { frame, last });
            }
        }
        self.frames.push(FrameSnapshot {
            frame,
            characters,
            damage: DamageFrame::new(damage),
        });
        Ok(())
    }

    /// Returns the last recorded frame.
    #[must_use]
    pub fn last_frame(&self) -> Option<Frame> {
        self.frames.last().map(|snapshot| snapshot.frame)
    }

    /// Returns the number of recorded frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Returns one frame's snapshot.
    #[must_use]
    pub fn snapshot(&self, frame: Frame) -> Option<&FrameSnapshot> {
        self.frames
            .binary_search_by_key(&frame, |snapshot| snapshot.frame)
            .ok()
            .map(|index| &self.frames[index])
    }

    /// Iterates snapshots in frame order.
    pub fn iter(&self) -> impl Iterator<Item = &FrameSnapshot> {
        self.frames.iter()
    }

    /// Iterates every damage event in frame then dispatch order.
    pub fn damage_events(&self) -> impl Iterator<Item = &DamageEvent> {
        self.frames.iter().flat_map(|snapshot| &snapshot.damage.damage)
    }

    /// Returns total damage over the run.
    #[must_use]
    pub fn total_damage(&self) -> u64 {
        self.frames.iter().map(|snapshot| snapshot.damage.value).sum()
    }

    /// Returns one domain, whole or restricted to a single frame.
    #[must_use]
    pub fn query(&self, domain: Domain, frame: Option<Frame>) -> DomainView<'_> {
        let selected: Vec<&FrameSnapshot> = match frame {
            Some(frame) => self.snapshot(frame).into_iter().collect(),
            None => self.frames.iter().collect(),
        };
        match domain {
            Domain::Character => DomainView::Character(
                selected
                    .into_iter()
                    .map(|snapshot| (snapshot.frame, &snapshot.characters))
                    .collect(),
            ),
            Domain::Damage => DomainView::Damage(
                selected
                    .into_iter()
                    .map(|snapshot| (snapshot.frame, &snapshot.damage))
                    .collect(),
            ),
        }
    }

    /// Builds the serializable document.
    #[must_use]
    pub fn to_document(&self) -> EventLogDocument {
        EventLogDocument {
            version: Document::FrameLog.current(),
            character: self
                .frames
                .iter()
                .map(|snapshot| (snapshot.frame, snapshot.characters.clone()))
                .collect(),
            damage: self
                .frames
                .iter()
                .map(|snapshot| (snapshot.frame, snapshot.damage.clone()))
                .collect(),
        }
    }

    /// Serializes the log as JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.to_document())
    }

    /// Writes the log as pretty JSON.
    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(&self.to_document())?;
        std::fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::damage::{DamageBreakdown, DamageType};
    use emulator_common::{CharacterId, Element, TargetId};

    fn event(frame: Frame, value: u64) -> DamageEvent {
        DamageEvent {
            frame,
            source: CharacterId::new(0),
            character: "Amber".into(),
            target: TargetId::PRIMARY,
            value,
            element: Element::Pyro,
            damage_type: DamageType::NormalAttack,
            reaction: false,
            reaction_kind: None,
            crit: false,
            breakdown: DamageBreakdown::default(),
        }
    }

    #[test]
    fn test_record_in_order() {
        let mut log = EventLog::new();
        assert!(log.record(0, BTreeMap::new(), vec![]).is_ok());
        assert!(log.record(1, BTreeMap::new(), vec![event(1, 5)]).is_ok());
        assert_eq!(
            log.record(1, BTreeMap::new(), vec![]),
            Err(EmulationError::OutOfOrderFrame { frame: 1, last: 1 })
        );
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_aggregate_is_sum() {
        let mut log = EventLog::new();
        log.record(3, BTreeMap::new(), vec![event(3, 10), event(3, 32)])
            .expect("record");
        let snapshot = log.snapshot(3).expect("frame 3");
        assert_eq!(snapshot.damage.value, 42);
        assert_eq!(log.total_damage(), 42);
    }

    #[test]
    fn test_query_domains() {
        let mut log = EventLog::new();
        for frame in 0..5 {
            log.record(frame, BTreeMap::new(), vec![event(frame, 1)])
                .expect("record");
        }

        assert_eq!(log.query(Domain::Damage, None).len(), 5);
        assert_eq!(log.query(Domain::Character, Some(2)).len(), 1);
        assert!(log.query(Domain::Damage, Some(99)).is_empty());

        let DomainView::Damage(slice) = log.query(Domain::Damage, Some(4)) else {
            panic!("damage view expected");
        };
        assert_eq!(slice[&4].damage[0].frame, 4);
    }

    #[test]
    fn test_document_round_trips_through_json() {
        let mut log = EventLog::new();
        log.record(0, BTreeMap::new(), vec![event(0, 90)])
            .expect("record");
        let json = log.to_json().expect("serializes");
        let doc: EventLogDocument = serde_json::from_str(&json).expect("parses");
        assert_eq!(doc.version, Document::FrameLog.current());
        assert_eq!(doc.damage[&0].value, 90);
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("log.json");
        let mut log = EventLog::new();
        log.record(0, BTreeMap::new(), vec![]).expect("record");
        log.write_json(&path).expect("written");
        assert!(path.exists());
    }
}
