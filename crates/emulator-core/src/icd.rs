//! Internal cooldown of elemental application.
//!
//! Within a 2.5 s window that opens on the first hit of a tag, only the
//! 1st, 4th, 7th... hit applies its element. Untagged hits always apply.

use std::collections::BTreeMap;

use emulator_common::{CharacterId, Frame};

use crate::motion::IcdTag;

/// Length of one ICD window.
pub const ICD_WINDOW_FRAMES: Frame = 150;

/// Hits per application cycle inside a window.
pub const ICD_HIT_CYCLE: u32 = 3;

#[derive(Debug, Clone, Copy)]
struct Window {
    opened_at: Frame,
    hits: u32,
}

/// Tracks ICD windows per character and tag.
#[derive(Debug, Clone, Default)]
pub struct IcdTracker {
    windows: BTreeMap<(CharacterId, IcdTag), Window>,
}

impl IcdTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a hit and returns true if it applies its element.
    pub fn check(&mut self, character: CharacterId, tag: IcdTag, frame: Frame) -> bool {
        if tag == IcdTag::None {
            return true;
        }

        let window = self
            .windows
            .entry((character, tag))
            .or_insert(Window {
                opened_at: frame,
                hits: 0,
            });

        if frame.saturating_sub(window.opened_at) >= ICD_WINDOW_FRAMES {
            *window = Window {
                opened_at: frame,
                hits: 0,
            };
        }

        let applies = window.hits % ICD_HIT_CYCLE == 0;
        window.hits += 1;
        applies
    }
}
