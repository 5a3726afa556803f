//! Enemy state.

use emulator_common::{Element, TargetId};

use crate::config::TargetData;
use crate::effect::{Effect, EffectManager};

/// The enemy being attacked, with its debuffs.
#[derive(Debug, Clone)]
pub struct TargetState {
    id: TargetId,
    data: TargetData,
    effects: EffectManager,
}

impl TargetState {
    /// Creates a target from its configuration.
    #[must_use]
    pub fn new(id: TargetId, data: TargetData) -> Self {
        Self {
            id,
            data,
            effects: EffectManager::new(),
        }
    }

    /// Returns the target ID.
    #[must_use]
    pub const fn id(&self) -> TargetId {
        self.id
    }

    /// Returns the enemy level.
    #[must_use]
    pub const fn level(&self) -> u32 {
        self.data.level
    }

    /// Returns the effective resistance percent after shred.
    #[must_use]
    pub fn resistance(&self, element: Element) -> f64 {
        self.data.resist(element) - self.effects.resistance_shred(element)
    }

    /// Returns the debuff list.
    #[must_use]
    pub fn effects(&self) -> &EffectManager {
        &self.effects
    }

    /// Applies a debuff.
    pub fn apply_effect(&mut self, effect: Effect) {
        self.effects.apply(effect);
    }

    /// Advances debuffs one frame. Returns expired names.
    pub fn tick(&mut self) -> Vec<String> {
        self.effects.tick()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{EffectPayload, EffectSource, Trigger};

    #[test]
    fn test_shred_lowers_resistance() {
        let mut target = TargetState::new(
            TargetId::PRIMARY,
            TargetData::default().with_resist(Element::Physical, 30.0),
        );
        assert_eq!(target.resistance(Element::Physical), 30.0);

        target.apply_effect(
            Effect::new(
                "Superconduct",
                EffectSource::Reaction,
                EffectPayload::Trigger(Trigger::ResistanceShred {
                    element: Element::Physical,
                    amount: 40.0,
                }),
            )
            .with_duration(2),
        );
        assert_eq!(target.resistance(Element::Physical), -10.0);
        assert_eq!(target.resistance(Element::Pyro), 10.0);

        target.tick();
        assert_eq!(target.tick(), vec!["Superconduct".to_string()]);
        assert_eq!(target.resistance(Element::Physical), 30.0);
    }
}
