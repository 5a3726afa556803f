//! Run inputs: team, action sequence, target and simulation settings.
//!
//! The three input documents are JSON. They are parsed and validated into an
//! [`EmulationInput`], an immutable value that is cloned into every run.

use std::collections::{BTreeMap, HashSet};

use emulator_common::{
    ActionKind, ConfigError, ConfigResult, Element, Frame, FRAMES_PER_SECOND,
};
use serde::{Deserialize, Serialize};

use crate::damage::{CritMode, ResistanceModel};
use crate::stats::{StatLine, MAX_TALENT_LEVEL};

/// Number of slots in a team.
pub const TEAM_SIZE: usize = 4;

/// Highest character and target level.
pub const MAX_LEVEL: u32 = 90;

/// Highest constellation.
pub const MAX_CONSTELLATION: u8 = 6;

/// Resistance used for elements the target data does not list.
pub const DEFAULT_RESISTANCE_PERCENT: f64 = 10.0;

// ============================================================================
// Team
// ============================================================================

/// One team slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "slot", rename_all = "snake_case")]
pub enum TeamSlot {
    /// A fully configured character.
    Character(Box<CharacterConfig>),
    /// A slot the user has not filled in.
    Unconfigured {
        /// Why the slot is empty (shown back to the user).
        reason: String,
        /// Name the slot would have carried, if known.
        #[serde(default)]
        name: Option<String>,
    },
}

impl TeamSlot {
    /// Returns the character config, if configured.
    #[must_use]
    pub fn character(&self) -> Option<&CharacterConfig> {
        match self {
            Self::Character(config) => Some(config),
            Self::Unconfigured { .. } => None,
        }
    }

    /// Returns the name attached to the slot, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Character(config) => Some(&config.name),
            Self::Unconfigured { name, .. } => name.as_deref(),
        }
    }
}

/// Weapon class of a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeaponType {
    /// One-handed sword.
    Sword,
    /// Two-handed claymore.
    Claymore,
    /// Polearm.
    Polearm,
    /// Catalyst.
    Catalyst,
    /// Bow.
    Bow,
}

impl WeaponType {
    /// Returns the default kit name for this weapon class.
    #[must_use]
    pub const fn default_kit(self) -> &'static str {
        match self {
            Self::Sword => "sword",
            Self::Claymore => "claymore",
            Self::Polearm => "polearm",
            Self::Catalyst => "catalyst",
            Self::Bow => "bow",
        }
    }
}

/// Character base stats at their level, plus ascension stat lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseStats {
    /// Base HP.
    pub hp: f64,
    /// Base ATK (without weapon).
    pub atk: f64,
    /// Base DEF.
    pub def: f64,
    /// Base crit rate.
    pub crit_rate: f64,
    /// Base crit damage.
    pub crit_damage: f64,
    /// Base energy recharge.
    pub energy_recharge: f64,
    /// Base elemental mastery.
    pub elemental_mastery: f64,
    /// Ascension bonus stats.
    pub ascension: Vec<StatLine>,
}

impl Default for BaseStats {
    fn default() -> Self {
        Self {
            hp: 10_000.0,
            atk: 100.0,
            def: 500.0,
            crit_rate: 0.05,
            crit_damage: 0.5,
            energy_recharge: 1.0,
            elemental_mastery: 0.0,
            ascension: Vec::new(),
        }
    }
}

/// Equipped weapon.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponConfig {
    /// Weapon name.
    pub name: String,
    /// Weapon base ATK.
    pub base_atk: f64,
    /// Secondary stat and passive stat lines.
    pub stats: Vec<StatLine>,
}

/// Equipped artifact piece or set bonus.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Set name.
    pub set: String,
    /// Main and sub stat lines.
    pub stats: Vec<StatLine>,
}

/// Talent levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TalentLevels {
    /// Normal attack talent level.
    pub normal_attack: u8,
    /// Elemental skill talent level.
    pub skill: u8,
    /// Elemental burst talent level.
    pub burst: u8,
}

impl Default for TalentLevels {
    fn default() -> Self {
        Self {
            normal_attack: 1,
            skill: 1,
            burst: 1,
        }
    }
}

impl TalentLevels {
    /// Returns the talent level governing an action kind.
    #[must_use]
    pub const fn for_action(&self, action: ActionKind) -> u8 {
        match action {
            ActionKind::Skill => self.skill,
            ActionKind::Burst => self.burst,
            _ => self.normal_attack,
        }
    }
}

/// A permanent buff configured on a character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticBuff {
    /// Buff name.
    pub name: String,
    /// Stat lines granted.
    pub stats: Vec<StatLine>,
}

fn default_level() -> u32 {
    MAX_LEVEL
}

fn default_max_energy() -> f64 {
    60.0
}

/// A configured character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterConfig {
    /// Unique name, referenced by actions.
    pub name: String,
    /// Character element.
    pub element: Element,
    /// Weapon class.
    pub weapon_type: WeaponType,
    /// Character level.
    #[serde(default = "default_level")]
    pub level: u32,
    /// Constellation.
    #[serde(default)]
    pub constellation: u8,
    /// Base stats.
    #[serde(default)]
    pub base: BaseStats,
    /// Equipped weapon.
    #[serde(default)]
    pub weapon: WeaponConfig,
    /// Equipped artifacts.
    #[serde(default)]
    pub artifacts: Vec<ArtifactConfig>,
    /// Talent levels.
    #[serde(default)]
    pub talents: TalentLevels,
    /// Energy needed for the burst.
    #[serde(default = "default_max_energy")]
    pub max_energy: f64,
    /// Energy left after casting the burst.
    #[serde(default)]
    pub post_burst_energy: f64,
    /// Energy at frame 0 (full when absent).
    #[serde(default)]
    pub initial_energy: Option<f64>,
    /// Motion kit name (weapon default when absent).
    #[serde(default)]
    pub kit: Option<String>,
    /// Particles per skill cast, overriding the kit.
    #[serde(default)]
    pub particles: Option<u32>,
    /// Permanent buffs.
    #[serde(default)]
    pub static_buffs: Vec<StaticBuff>,
}

impl CharacterConfig {
    /// Creates a level 90 character with default stats.
    #[must_use]
    pub fn new(name: impl Into<String>, element: Element, weapon_type: WeaponType) -> Self {
        Self {
            name: name.into(),
            element,
            weapon_type,
            level: MAX_LEVEL,
            constellation: 0,
            base: BaseStats::default(),
            weapon: WeaponConfig::default(),
            artifacts: Vec::new(),
            talents: TalentLevels::default(),
            max_energy: default_max_energy(),
            post_burst_energy: 0.0,
            initial_energy: None,
            kit: None,
            particles: None,
            static_buffs: Vec::new(),
        }
    }

    /// Sets base stats.
    #[must_use]
    pub fn with_base(mut self, base: BaseStats) -> Self {
        self.base = base;
        self
    }

    /// Sets the weapon.
    #[must_use]
    pub fn with_weapon(mut self, weapon: WeaponConfig) -> Self {
        self.weapon = weapon;
        self
    }

    /// Sets talent levels.
    #[must_use]
    pub fn with_talents(mut self, talents: TalentLevels) -> Self {
        self.talents = talents;
        self
    }

    /// Sets the burst energy cost.
    #[must_use]
    pub fn with_max_energy(mut self, max_energy: f64) -> Self {
        self.max_energy = max_energy;
        self
    }

    /// Sets energy at frame 0.
    #[must_use]
    pub fn with_initial_energy(mut self, energy: f64) -> Self {
        self.initial_energy = Some(energy);
        self
    }

    /// Returns the kit name, defaulting to the weapon class kit.
    #[must_use]
    pub fn kit_name(&self) -> &str {
        self.kit
            .as_deref()
            .unwrap_or_else(|| self.weapon_type.default_kit())
    }

    fn invalid(&self, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidCharacter {
            name: self.name.clone(),
            reason: reason.into(),
        }
    }

    /// Validates the character record.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(self.invalid("name is empty"));
        }
        if self.element == Element::Physical {
            return Err(self.invalid("characters cannot be physical"));
        }
        if !(1..=MAX_LEVEL).contains(&self.level) {
            return Err(self.invalid(format!("level {} out of range 1-{MAX_LEVEL}", self.level)));
        }
        if self.constellation > MAX_CONSTELLATION {
            return Err(self.invalid(format!(
                "constellation {} above {MAX_CONSTELLATION}",
                self.constellation
            )));
        }
        for (label, level) in [
            ("normal attack", self.talents.normal_attack),
            ("skill", self.talents.skill),
            ("burst", self.talents.burst),
        ] {
            if !(1..=MAX_TALENT_LEVEL).contains(&level) {
                return Err(self.invalid(format!("{label} talent level {level} out of range")));
            }
        }
        if !self.base.hp.is_finite() || self.base.hp <= 0.0 {
            return Err(self.invalid("base hp must be positive"));
        }
        if !self.base.atk.is_finite() || self.base.atk < 0.0 || self.weapon.base_atk < 0.0 {
            return Err(self.invalid("base atk must not be negative"));
        }
        if !self.max_energy.is_finite() || self.max_energy <= 0.0 {
            return Err(self.invalid("max energy must be positive"));
        }
        if !(0.0..=self.max_energy).contains(&self.post_burst_energy) {
            return Err(self.invalid("post-burst energy must be within 0..max energy"));
        }
        if let Some(initial) = self.initial_energy {
            if !(0.0..=self.max_energy).contains(&initial) {
                return Err(self.invalid("initial energy must be within 0..max energy"));
            }
        }
        let lines = self
            .base
            .ascension
            .iter()
            .chain(&self.weapon.stats)
            .chain(self.artifacts.iter().flat_map(|a| &a.stats))
            .chain(self.static_buffs.iter().flat_map(|b| &b.stats));
        for line in lines {
            if !line.value.is_finite() {
                return Err(self.invalid(format!("stat {:?} is not finite", line.stat)));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Typed action parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionParams {
    /// Replaces the kit's ability multiplier for every hit.
    pub multiplier: Option<f64>,
    /// Replaces the element of every hit.
    pub element: Option<Element>,
    /// Use the held variant of the skill.
    pub hold: bool,
    /// Frame count for skip, dash and jump.
    pub frames: Option<Frame>,
}

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    /// Name of the acting character.
    pub character: String,
    /// Action kind.
    pub action: ActionKind,
    /// Parameters.
    #[serde(default)]
    pub params: ActionParams,
}

impl ActionSpec {
    /// Creates an action with default parameters.
    #[must_use]
    pub fn new(character: impl Into<String>, action: ActionKind) -> Self {
        Self {
            character: character.into(),
            action,
            params: ActionParams::default(),
        }
    }

    /// Sets parameters.
    #[must_use]
    pub fn with_params(mut self, params: ActionParams) -> Self {
        self.params = params;
        self
    }

    fn validate(&self, index: usize) -> ConfigResult<()> {
        let invalid = |reason: &str| ConfigError::InvalidAction {
            index,
            reason: reason.to_string(),
        };
        if self.character.trim().is_empty() {
            return Err(invalid("character is empty"));
        }
        if let Some(multiplier) = self.params.multiplier {
            if !multiplier.is_finite() || multiplier < 0.0 {
                return Err(invalid("multiplier must be a non-negative number"));
            }
        }
        if self.action == ActionKind::Skip && self.params.frames.is_none() {
            return Err(invalid("skip requires a frame count"));
        }
        Ok(())
    }
}

// ============================================================================
// Target
// ============================================================================

fn default_target_level() -> u32 {
    MAX_LEVEL
}

/// The enemy being attacked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetData {
    /// Enemy level.
    #[serde(default = "default_target_level")]
    pub level: u32,
    /// Resistance percent per element.
    #[serde(default)]
    pub resists: BTreeMap<Element, f64>,
}

impl Default for TargetData {
    fn default() -> Self {
        Self {
            level: MAX_LEVEL,
            resists: BTreeMap::new(),
        }
    }
}

impl TargetData {
    /// Sets the resistance of one element.
    #[must_use]
    pub fn with_resist(mut self, element: Element, percent: f64) -> Self {
        self.resists.insert(element, percent);
        self
    }

    /// Returns the configured resistance percent of an element.
    #[must_use]
    pub fn resist(&self, element: Element) -> f64 {
        self.resists
            .get(&element)
            .copied()
            .unwrap_or(DEFAULT_RESISTANCE_PERCENT)
    }

    /// Validates the target record.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(1..=100).contains(&self.level) {
            return Err(ConfigError::InvalidTarget(format!(
                "level {} out of range 1-100",
                self.level
            )));
        }
        if let Some((element, _)) = self.resists.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ConfigError::InvalidTarget(format!(
                "{element} resistance is not finite"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Simulation-wide settings, fixed for the run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// How crits are decided.
    pub crit_mode: CritMode,
    /// Seed of the crit RNG.
    pub seed: u64,
    /// Resistance formula.
    pub resistance_model: ResistanceModel,
    /// Frame bound after which the run is truncated.
    pub max_frames: Frame,
    /// Frames between progress updates.
    pub progress_interval: Frame,
    /// Frames between character swaps.
    pub swap_cooldown: Frame,
    /// Frames between a skill hit and its particles arriving.
    pub particle_delay: Frame,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            crit_mode: CritMode::Expected,
            seed: 0,
            resistance_model: ResistanceModel::Linear,
            max_frames: 600 * FRAMES_PER_SECOND,
            progress_interval: FRAMES_PER_SECOND,
            swap_cooldown: FRAMES_PER_SECOND,
            particle_delay: 90,
        }
    }
}

impl SimulationSettings {
    /// Sets the crit mode.
    #[must_use]
    pub fn with_crit_mode(mut self, crit_mode: CritMode) -> Self {
        self.crit_mode = crit_mode;
        self
    }

    /// Sets the RNG seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the frame bound.
    #[must_use]
    pub fn with_max_frames(mut self, max_frames: Frame) -> Self {
        self.max_frames = max_frames;
        self
    }

    /// Validates the settings.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_frames == 0 {
            return Err(ConfigError::InvalidSettings("max_frames must be positive".into()));
        }
        if self.progress_interval == 0 {
            return Err(ConfigError::InvalidSettings(
                "progress_interval must be positive".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Input Bundle
// ============================================================================

/// Everything one run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmulationInput {
    /// Exactly [`TEAM_SIZE`] slots.
    pub team: Vec<TeamSlot>,
    /// Ordered action sequence.
    pub actions: Vec<ActionSpec>,
    /// Enemy.
    pub target: TargetData,
    /// Settings.
    #[serde(default)]
    pub settings: SimulationSettings,
}

impl EmulationInput {
    /// Bundles inputs without validating them.
    #[must_use]
    pub fn new(
        team: Vec<TeamSlot>,
        actions: Vec<ActionSpec>,
        target: TargetData,
        settings: SimulationSettings,
    ) -> Self {
        Self {
            team,
            actions,
            target,
            settings,
        }
    }

    /// Parses and validates the three JSON input documents.
    pub fn from_json_documents(
        team_data: &str,
        action_sequence: &str,
        target_data: &str,
        settings: SimulationSettings,
    ) -> ConfigResult<Self> {
        let team = parse_document("team_data", team_data)?;
        let actions = parse_document("action_sequence", action_sequence)?;
        let target = parse_document("target_data", target_data)?;
        let input = Self::new(team, actions, target, settings);
        input.validate()?;
        Ok(input)
    }

    /// Iterates configured characters with their slot index.
    pub fn characters(&self) -> impl Iterator<Item = (usize, &CharacterConfig)> {
        self.team
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| entry.character().map(|c| (slot, c)))
    }

    /// Validates every part of the input.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.team.len() != TEAM_SIZE {
            return Err(ConfigError::TeamSize {
                expected: TEAM_SIZE,
                actual: self.team.len(),
            });
        }
        if self.characters().next().is_none() {
            return Err(ConfigError::EmptyTeam);
        }
        let mut names = HashSet::new();
        for (_, character) in self.characters() {
            character.validate()?;
            if !names.insert(character.name.as_str()) {
                return Err(ConfigError::DuplicateCharacter(character.name.clone()));
            }
        }
        if self.actions.is_empty() {
            return Err(ConfigError::EmptyActions);
        }
        for (index, action) in self.actions.iter().enumerate() {
            action.validate(index)?;
        }
        self.target.validate()?;
        self.settings.validate()
    }
}

fn parse_document<T: serde::de::DeserializeOwned>(
    document: &'static str,
    text: &str,
) -> ConfigResult<T> {
    serde_json::from_str(text).map_err(|e| ConfigError::Parse {
        document,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amber() -> CharacterConfig {
        CharacterConfig::new("Amber", Element::Pyro, WeaponType::Bow)
    }

    fn unconfigured() -> TeamSlot {
        TeamSlot::Unconfigured {
            reason: "empty".into(),
            name: None,
        }
    }

    fn input() -> EmulationInput {
        EmulationInput::new(
            vec![
                TeamSlot::Character(Box::new(amber())),
                unconfigured(),
                unconfigured(),
                unconfigured(),
            ],
            vec![ActionSpec::new("Amber", ActionKind::NormalAttack)],
            TargetData::default(),
            SimulationSettings::default(),
        )
    }

    #[test]
    fn test_valid_input() {
        assert!(input().validate().is_ok());
    }

    #[test]
    fn test_team_size_enforced() {
        let mut bad = input();
        bad.team.pop();
        assert_eq!(
            bad.validate(),
            Err(ConfigError::TeamSize {
                expected: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn test_empty_team_rejected() {
        let mut bad = input();
        bad.team[0] = unconfigured();
        assert_eq!(bad.validate(), Err(ConfigError::EmptyTeam));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut bad = input();
        bad.team[1] = TeamSlot::Character(Box::new(amber()));
        assert_eq!(
            bad.validate(),
            Err(ConfigError::DuplicateCharacter("Amber".into()))
        );
    }

    #[test]
    fn test_empty_actions_rejected() {
        let mut bad = input();
        bad.actions.clear();
        assert_eq!(bad.validate(), Err(ConfigError::EmptyActions));
    }

    #[test]
    fn test_skip_needs_frames() {
        let mut bad = input();
        bad.actions.push(ActionSpec::new("Amber", ActionKind::Skip));
        assert!(matches!(
            bad.validate(),
            Err(ConfigError::InvalidAction { index: 1, .. })
        ));
    }

    #[test]
    fn test_energy_bounds() {
        let mut bad = input();
        bad.team[0] = TeamSlot::Character(Box::new(amber().with_initial_energy(80.0)));
        assert!(matches!(
            bad.validate(),
            Err(ConfigError::InvalidCharacter { .. })
        ));
    }

    #[test]
    fn test_parse_documents() {
        let team = r#"[
            {"slot": "character", "name": "Xiangling", "element": "pyro",
             "weapon_type": "polearm", "max_energy": 80,
             "base": {"atk": 225, "hp": 10875, "def": 669},
             "weapon": {"name": "The Catch", "base_atk": 510,
                        "stats": [{"stat": "energy_recharge", "value": 0.459}]}},
            {"slot": "unconfigured", "reason": "not owned"},
            {"slot": "unconfigured", "reason": "not owned"},
            {"slot": "unconfigured", "reason": "not owned", "name": "Bennett"}
        ]"#;
        let actions = r#"[
            {"character": "Xiangling", "action": "skill"},
            {"character": "Xiangling", "action": "skip", "params": {"frames": 30}},
            {"character": "Xiangling", "action": "burst"}
        ]"#;
        let target = r#"{"level": 100, "resists": {"pyro": 10, "physical": 70}}"#;

        let input = EmulationInput::from_json_documents(
            team,
            actions,
            target,
            SimulationSettings::default(),
        )
        .expect("documents are valid");

        assert_eq!(input.team.len(), 4);
        assert_eq!(input.team[3].name(), Some("Bennett"));
        let xl = input.team[0].character().expect("configured");
        assert_eq!(xl.kit_name(), "polearm");
        assert_eq!(xl.level, 90);
        assert_eq!(xl.talents, TalentLevels::default());
        assert_eq!(input.actions[1].params.frames, Some(30));
        assert_eq!(input.target.resist(Element::Physical), 70.0);
        assert_eq!(input.target.resist(Element::Cryo), DEFAULT_RESISTANCE_PERCENT);
    }

    #[test]
    fn test_parse_error_names_document() {
        let err = EmulationInput::from_json_documents(
            "[]",
            "not json",
            "{}",
            SimulationSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Parse {
                document: "action_sequence",
                ..
            }
        ));
    }
}
