//! # Emulator Core
//!
//! Frame-stepped combat emulation.
//!
//! This crate provides the single-run engine:
//! - Run inputs (team, action sequence, target, settings)
//! - Stat resolution from base stats, gear and active effects
//! - Timed effects with stacking policies
//! - Energy pools and particle delivery
//! - Elemental auras, reactions and the internal cooldown
//! - The damage formula with crit and resistance models
//! - Motion kits loaded from TOML
//! - The action scheduler and its frame log
//! - Progress reporting and background runs

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod background;
pub mod character;
pub mod config;
pub mod damage;
pub mod effect;
pub mod energy;
pub mod event_log;
pub mod icd;
pub mod motion;
pub mod progress;
pub mod reaction;
pub mod scheduler;
pub mod stats;
pub mod summary;
pub mod target;


/// Prelude for convenient imports
pub mod prelude {
    pub use crate::background::*;
    pub use crate::character::*;
    pub use crate::config::*;
    pub use crate::damage::*;
    pub use crate::effect::*;
    pub use crate::energy::*;
    pub use crate::event_log::*;
    pub use crate::icd::*;
    pub use crate::motion::*;
    pub use crate::progress::*;
    pub use crate::reaction::*;
    pub use crate::scheduler::*;
    pub use crate::stats::*;
    pub use crate::summary::*;
    pub use crate::target::*;
    pub use emulator_common::{
        ActionError, ConfigError, EmulationError, EmulationResult, ResourceError,
    };
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use emulator_common::{ActionKind, Element};

    #[test]
    fn test_default_kits_cover_every_weapon() {
        let kits = KitRegistry::with_defaults();
        for weapon in [
            WeaponType::Sword,
            WeaponType::Claymore,
            WeaponType::Polearm,
            WeaponType::Catalyst,
            WeaponType::Bow,
        ] {
            assert!(kits.contains(weapon.default_kit()), "{weapon:?}");
        }
    }

    #[test]
    fn test_prelude_runs_a_rotation() {
        let slot = TeamSlot::Character(Box::new(CharacterConfig::new(
            "Lisa",
            Element::Electro,
            WeaponType::Catalyst,
        )));
        let empty = || TeamSlot::Unconfigured {
            reason: "empty".into(),
            name: None,
        };
        let input = EmulationInput::new(
            vec![slot, empty(), empty(), empty()],
            vec![
                ActionSpec::new("Lisa", ActionKind::NormalAttack),
                ActionSpec::new("Lisa", ActionKind::ChargedAttack),
            ],
            TargetData::default(),
            SimulationSettings::default(),
        );
        let output = Emulation::new(input, &KitRegistry::with_defaults())
            .expect("valid")
            .run()
            .expect("runs");
        assert_eq!(output.log.damage_events().count(), 2);
        assert!(output
            .log
            .damage_events()
            .all(|e| e.element == Element::Electro));
    }
}
