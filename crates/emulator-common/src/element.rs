//! Elements and action kinds.

use serde::{Deserialize, Serialize};

/// Damage element of a hit, a character or a resistance entry.
///
/// `Physical` only appears on hits and resistances; characters always carry
/// one of the seven elements.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Element {
    /// Non-elemental damage.
    Physical,
    /// Fire.
    #[serde(alias = "fire")]
    Pyro,
    /// Water.
    #[serde(alias = "water")]
    Hydro,
    /// Lightning.
    #[serde(alias = "lightning", alias = "electric")]
    Electro,
    /// Ice.
    #[serde(alias = "ice")]
    Cryo,
    /// Wind.
    #[serde(alias = "wind")]
    Anemo,
    /// Rock.
    #[serde(alias = "rock")]
    Geo,
    /// Grass.
    #[serde(alias = "grass")]
    Dendro,
}

impl Element {
    /// Returns all elements, physical first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Physical,
            Self::Pyro,
            Self::Hydro,
            Self::Electro,
            Self::Cryo,
            Self::Anemo,
            Self::Geo,
            Self::Dendro,
        ]
    }

    /// Returns true for every element except physical.
    #[must_use]
    pub const fn is_elemental(self) -> bool {
        !matches!(self, Self::Physical)
    }

    /// Returns true if a hit of this element can linger on a target as an aura.
    #[must_use]
    pub const fn can_attach(self) -> bool {
        matches!(
            self,
            Self::Pyro | Self::Hydro | Self::Electro | Self::Cryo | Self::Dendro
        )
    }

    /// Returns the lowercase display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Physical => "physical",
            Self::Pyro => "pyro",
            Self::Hydro => "hydro",
            Self::Electro => "electro",
            Self::Cryo => "cryo",
            Self::Anemo => "anemo",
            Self::Geo => "geo",
            Self::Dendro => "dendro",
        }
    }
}

impl std::fmt::Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind of a scripted action.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    /// Next stage of the normal attack string.
    #[serde(alias = "normal_attack")]
    NormalAttack,
    /// Charged attack.
    #[serde(alias = "charged_attack")]
    ChargedAttack,
    /// Plunging attack.
    #[serde(alias = "plunging_attack")]
    PlungingAttack,
    /// Elemental skill.
    Skill,
    /// Elemental burst.
    Burst,
    /// Dash.
    Dash,
    /// Jump.
    Jump,
    /// Wait a number of frames.
    Skip,
}

impl ActionKind {
    /// Returns true if the action can deal damage.
    #[must_use]
    pub const fn is_offensive(self) -> bool {
        matches!(
            self,
            Self::NormalAttack
                | Self::ChargedAttack
                | Self::PlungingAttack
                | Self::Skill
                | Self::Burst
        )
    }

    /// Returns the camelCase name used in action documents.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NormalAttack => "normalAttack",
            Self::ChargedAttack => "chargedAttack",
            Self::PlungingAttack => "plungingAttack",
            Self::Skill => "skill",
            Self::Burst => "burst",
            Self::Dash => "dash",
            Self::Jump => "jump",
            Self::Skip => "skip",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
