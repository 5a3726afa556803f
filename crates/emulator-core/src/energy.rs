//! Elemental energy.
//!
//! Every configured character has an [`EnergyPool`]. Skill hits drop
//! particles that reach the team after a fixed delay; the burst consumes a
//! full pool.

use std::collections::BTreeMap;

use emulator_common::{CharacterId, Element, Frame, ResourceError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Energy one particle grants a receiver of the same element.
pub const SAME_ELEMENT_PARTICLE_ENERGY: f64 = 3.0;

/// Energy one particle grants a receiver of another element.
pub const OTHER_ELEMENT_PARTICLE_ENERGY: f64 = 1.0;

/// Share of particle energy received by off-field characters.
pub const OFF_FIELD_FACTOR: f64 = 0.6;

/// Energy of one character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyPool {
    /// Owner name, used in error messages.
    pub name: String,
    /// Energy held.
    pub current: f64,
    /// Burst cost.
    pub max: f64,
    /// Energy left after a burst.
    pub post_burst: f64,
}

impl EnergyPool {
    /// Creates a pool.
    #[must_use]
    pub fn new(name: impl Into<String>, current: f64, max: f64, post_burst: f64) -> Self {
        Self {
            name: name.into(),
            current: current.clamp(0.0, max),
            max,
            post_burst: post_burst.clamp(0.0, max),
        }
    }

    /// Returns true if the burst can be cast.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.current >= self.max
    }

    /// Adds energy, clamped to the maximum. Returns the amount gained.
    pub fn gain(&mut self, amount: f64) -> f64 {
        let before = self.current;
        self.current = (self.current + amount.max(0.0)).min(self.max);
        self.current - before
    }

    /// Spends a full pool.
    pub fn consume_for_burst(&mut self) -> Result<(), ResourceError> {
        if !self.is_full() {
            return Err(ResourceError::InsufficientEnergy {
                character: self.name.clone(),
                current: self.current,
                required: self.max,
            });
        }
        self.current = self.post_burst;
        Ok(())
    }
}

/// Particles in flight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticleDrop {
    /// Frame the particles arrive.
    pub arrives_at: Frame,
    /// Particle element.
    pub element: Element,
    /// Number of particles.
    pub count: u32,
}

/// A character able to collect particles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleReceiver {
    /// Receiver.
    pub id: CharacterId,
    /// Receiver element.
    pub element: Element,
    /// True for the active character.
    pub on_field: bool,
    /// Receiver energy recharge.
    pub energy_recharge: f64,
}

/// Energy credited by one particle delivery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyGain {
    /// Receiver.
    pub id: CharacterId,
    /// Energy added after clamping.
    pub amount: f64,
}

/// Returns the energy `count` particles give one receiver.
#[must_use]
pub fn particle_energy(element: Element, count: u32, receiver: &ParticleReceiver) -> f64 {
    let per_particle = if element == receiver.element {
        SAME_ELEMENT_PARTICLE_ENERGY
    } else {
        OTHER_ELEMENT_PARTICLE_ENERGY
    };
    let field = if receiver.on_field {
        1.0
    } else {
        OFF_FIELD_FACTOR
    };
    per_particle * f64::from(count) * field * receiver.energy_recharge
}

/// Owns the energy of the whole team.
#[derive(Debug, Clone, Default)]
pub struct EnergyManager {
    pools: BTreeMap<CharacterId, EnergyPool>,
    in_flight: Vec<ParticleDrop>,
}

impl EnergyManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a character's pool.
    pub fn insert(&mut self, id: CharacterId, pool: EnergyPool) {
        self.pools.insert(id, pool);
    }

    /// Returns a character's pool.
    #[must_use]
    pub fn pool(&self, id: CharacterId) -> Option<&EnergyPool> {
        self.pools.get(&id)
    }

    /// Adds flat energy, clamped. Returns the amount gained.
    pub fn generate(&mut self, id: CharacterId, amount: f64) -> f64 {
        self.pools.get_mut(&id).map_or(0.0, |pool| pool.gain(amount))
    }

    /// Spends a full pool for the burst.
    ///
    /// A character without a pool has no burst to cast, so it reports zero
    /// energy against a required amount of zero.
    pub fn consume_for_burst(&mut self, id: CharacterId) -> Result<(), ResourceError> {
        match self.pools.get_mut(&id) {
            Some(pool) => pool.consume_for_burst(),
            None => Err(ResourceError::InsufficientEnergy {
                character: id.to_string(),
                current: 0.0,
                required: 0.0,
            }),
        }
    }

    /// Queues particles for later delivery.
    pub fn schedule_particles(&mut self, drop: ParticleDrop) {
        if drop.count > 0 {
            self.in_flight.push(drop);
        }
    }

    /// Returns the number of particle drops still in flight.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    /// Delivers every drop due at or before `frame` to the receivers.
    pub fn tick(&mut self, frame: Frame, receivers: &[ParticleReceiver]) -> Vec<EnergyGain> {
        let mut gains = Vec::new();
        let (due, waiting): (Vec<_>, Vec<_>) = self
            .in_flight
            .drain(..)
            .partition(|drop| drop.arrives_at <= frame);
        self.in_flight = waiting;

        for drop in due {
            for receiver in receivers {
                let energy = particle_energy(drop.element, drop.count, receiver);
                let amount = self.generate(receiver.id, energy);
                gains.push(EnergyGain {
                    id: receiver.id,
                    amount,
                });
            }
            debug!(
                "Frame {}: delivered {} {} particle(s)",
                frame, drop.count, drop.element
            );
        }
        gains
    }
}
