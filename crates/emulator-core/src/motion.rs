//! Motion data: action timings, hit tables and kit files.
//!
//! This module provides:
//! - Per-action animation locks and hit sub-frames
//! - Built-in kits for every weapon class
//! - Loading kit overrides from `*.toml` files
//! - A kit registry with lookup by name
//!
//! Multipliers in kit data are talent level 1 values; the scheduler scales
//! them by the character's talent level.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use ahash::AHashMap;
use emulator_common::{seconds_to_frames, ActionKind, Document, Element, Frame, SchemaVersion};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::effect::{EffectPayload, StackPolicy};

/// Errors that can occur during kit loading.
#[derive(Debug, Error)]
pub enum MotionLoadError {
    /// File or directory not found.
    #[error("Kit path not found: {0}")]
    NotFound(PathBuf),

    /// Failed to read file.
    #[error("Failed to read kit file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML.
    #[error("Failed to parse kit TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error.
    #[error("Kit validation error: {0}")]
    ValidationError(String),

    /// Same kit defined twice in one file.
    #[error("Duplicate kit name: {0}")]
    DuplicateKit(String),

    /// Kit file written for another schema major version.
    #[error("Kit file version error: {0}")]
    UnsupportedVersion(String),
}

/// Result type for kit loading operations.
pub type MotionLoadResult<T> = Result<T, MotionLoadError>;

// ============================================================================
// Hit Data
// ============================================================================

/// Element a hit deals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitElement {
    /// Physical unless an infusion is active.
    #[default]
    Physical,
    /// The character's own element.
    Character,
    /// A fixed element.
    Fixed(Element),
}

impl HitElement {
    /// Resolves the element for a caster.
    ///
    /// Infusion only converts physical hits.
    #[must_use]
    pub fn resolve(self, character: Element, infusion: Option<Element>) -> Element {
        match self {
            Self::Physical => infusion.unwrap_or(Element::Physical),
            Self::Character => character,
            Self::Fixed(element) => element,
        }
    }
}

/// Internal cooldown group of a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IcdTag {
    /// No internal cooldown; every hit applies its element.
    None,
    /// Normal, charged and plunging attacks.
    NormalAttack,
    /// Elemental skill.
    Skill,
    /// Elemental burst.
    Burst,
}

impl IcdTag {
    /// Returns the tag hits of an action use when the kit does not say.
    #[must_use]
    pub const fn for_action(action: ActionKind) -> Self {
        match action {
            ActionKind::Skill => Self::Skill,
            ActionKind::Burst => Self::Burst,
            ActionKind::NormalAttack | ActionKind::ChargedAttack => Self::NormalAttack,
            _ => Self::None,
        }
    }
}

const fn default_gauge() -> f64 {
    1.0
}

/// One hit of an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitSpec {
    /// Frames after dispatch.
    pub frame: Frame,
    /// Talent level 1 ability multiplier.
    pub multiplier: f64,
    /// Element dealt.
    #[serde(default)]
    pub element: HitElement,
    /// Gauge units applied.
    #[serde(default = "default_gauge")]
    pub gauge: f64,
    /// ICD group (derived from the action when absent).
    #[serde(default)]
    pub icd: Option<IcdTag>,
    /// Blunt hits can shatter frozen targets.
    #[serde(default)]
    pub blunt: bool,
}

impl HitSpec {
    /// Creates a physical 1 GU hit.
    #[must_use]
    pub const fn new(frame: Frame, multiplier: f64) -> Self {
        Self {
            frame,
            multiplier,
            element: HitElement::Physical,
            gauge: 1.0,
            icd: None,
            blunt: false,
        }
    }

    /// Sets the element.
    #[must_use]
    pub const fn with_element(mut self, element: HitElement) -> Self {
        self.element = element;
        self
    }

    /// Sets the gauge.
    #[must_use]
    pub const fn with_gauge(mut self, gauge: f64) -> Self {
        self.gauge = gauge;
        self
    }

    /// Sets the ICD tag.
    #[must_use]
    pub const fn with_icd(mut self, icd: IcdTag) -> Self {
        self.icd = Some(icd);
        self
    }

    /// Marks the hit blunt.
    #[must_use]
    pub const fn blunt(mut self) -> Self {
        self.blunt = true;
        self
    }
}

/// Who receives an effect granted by an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantTarget {
    /// The acting character.
    #[default]
    Caster,
    /// Every configured character.
    Team,
    /// The enemy.
    Enemy,
}

/// An effect applied when the action is dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectGrant {
    /// Effect name.
    pub name: String,
    /// Receiver.
    #[serde(default)]
    pub target: GrantTarget,
    /// Duration in seconds (permanent when absent).
    #[serde(default)]
    pub duration_s: Option<f64>,
    /// What the effect does.
    pub payload: EffectPayload,
    /// Merge rule.
    #[serde(default)]
    pub policy: StackPolicy,
}

/// Timing of one action.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionTiming {
    /// Frames until the next action may start.
    pub lock: Frame,
    /// Hits, by frame offset.
    #[serde(default)]
    pub hits: Vec<HitSpec>,
    /// Cooldown in seconds (skill and burst).
    #[serde(default)]
    pub cooldown_s: f64,
    /// Effects applied on dispatch.
    #[serde(default)]
    pub effects: Vec<EffectGrant>,
}

impl ActionTiming {
    /// Creates a timing with no hits.
    #[must_use]
    pub fn new(lock: Frame) -> Self {
        Self {
            lock,
            ..Self::default()
        }
    }

    /// Adds a hit.
    #[must_use]
    pub fn with_hit(mut self, hit: HitSpec) -> Self {
        self.hits.push(hit);
        self
    }

    /// Sets the cooldown.
    #[must_use]
    pub fn with_cooldown(mut self, seconds: f64) -> Self {
        self.cooldown_s = seconds;
        self
    }

    /// Adds a dispatch effect.
    #[must_use]
    pub fn with_effect(mut self, effect: EffectGrant) -> Self {
        self.effects.push(effect);
        self
    }

    /// Returns the cooldown in frames.
    #[must_use]
    pub fn cooldown_frames(&self) -> Frame {
        seconds_to_frames(self.cooldown_s)
    }

    /// Returns the offset of the first hit, or the lock for hitless actions.
    #[must_use]
    pub fn first_hit_frame(&self) -> Frame {
        self.hits
            .iter()
            .map(|hit| hit.frame)
            .min()
            .unwrap_or(self.lock)
            .min(self.lock)
    }

    fn validate(&self, kit: &str, label: &str) -> MotionLoadResult<()> {
        let invalid = |reason: String| {
            MotionLoadError::ValidationError(format!("kit {kit} {label}: {reason}"))
        };
        if !self.cooldown_s.is_finite() || self.cooldown_s < 0.0 {
            return Err(invalid("cooldown must be non-negative".into()));
        }
        for (index, hit) in self.hits.iter().enumerate() {
            if !hit.multiplier.is_finite() || hit.multiplier < 0.0 {
                return Err(invalid(format!("hit {index} has an invalid multiplier")));
            }
            if !hit.gauge.is_finite() || hit.gauge < 0.0 {
                return Err(invalid(format!("hit {index} has an invalid gauge")));
            }
        }
        for grant in &self.effects {
            if grant.duration_s.is_some_and(|d| !d.is_finite() || d < 0.0) {
                return Err(invalid(format!("effect {} has an invalid duration", grant.name)));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Kits
// ============================================================================

const fn default_particles() -> u32 {
    3
}

/// Motion data of one character archetype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kit {
    /// Kit name.
    pub name: String,
    /// Normal attack string, one entry per stage.
    pub normal_attack: Vec<ActionTiming>,
    /// Charged attack.
    #[serde(default)]
    pub charged: Option<ActionTiming>,
    /// Plunging attack.
    #[serde(default)]
    pub plunging: Option<ActionTiming>,
    /// Tapped elemental skill.
    #[serde(default)]
    pub skill: Option<ActionTiming>,
    /// Held elemental skill (tapped skill is used when absent).
    #[serde(default)]
    pub skill_hold: Option<ActionTiming>,
    /// Elemental burst.
    #[serde(default)]
    pub burst: Option<ActionTiming>,
    /// Dash.
    #[serde(default)]
    pub dash: Option<ActionTiming>,
    /// Jump.
    #[serde(default)]
    pub jump: Option<ActionTiming>,
    /// Particles dropped by one skill cast.
    #[serde(default = "default_particles")]
    pub particles: u32,
}

impl Kit {
    /// Returns the timing of an action, or `None` if the kit lacks it.
    ///
    /// `combo` selects the normal attack stage and wraps around.
    #[must_use]
    pub fn timing(&self, action: ActionKind, hold: bool, combo: usize) -> Option<&ActionTiming> {
        match action {
            ActionKind::NormalAttack => {
                if self.normal_attack.is_empty() {
                    None
                } else {
                    self.normal_attack.get(combo % self.normal_attack.len())
                }
            }
            ActionKind::ChargedAttack => self.charged.as_ref(),
            ActionKind::PlungingAttack => self.plunging.as_ref(),
            ActionKind::Skill if hold => self.skill_hold.as_ref().or(self.skill.as_ref()),
            ActionKind::Skill => self.skill.as_ref(),
            ActionKind::Burst => self.burst.as_ref(),
            ActionKind::Dash => self.dash.as_ref(),
            ActionKind::Jump => self.jump.as_ref(),
            ActionKind::Skip => None,
        }
    }

    /// Validates the kit.
    pub fn validate(&self) -> MotionLoadResult<()> {
        if self.name.trim().is_empty() {
            return Err(MotionLoadError::ValidationError("kit name is empty".into()));
        }
        if self.normal_attack.is_empty() {
            return Err(MotionLoadError::ValidationError(format!(
                "kit {} has no normal attack stages",
                self.name
            )));
        }
        for (index, stage) in self.normal_attack.iter().enumerate() {
            stage.validate(&self.name, &format!("normal attack {}", index + 1))?;
        }
        let optional = [
            ("charged", &self.charged),
            ("plunging", &self.plunging),
            ("skill", &self.skill),
            ("skill_hold", &self.skill_hold),
            ("burst", &self.burst),
            ("dash", &self.dash),
            ("jump", &self.jump),
        ];
        for (label, timing) in optional {
            if let Some(timing) = timing {
                timing.validate(&self.name, label)?;
            }
        }
        Ok(())
    }
}

fn stage(lock: Frame, hit: Frame, multiplier: f64, element: HitElement) -> ActionTiming {
    ActionTiming::new(lock).with_hit(HitSpec::new(hit, multiplier).with_element(element))
}

fn common_actions(kit: Kit) -> Kit {
    Kit {
        plunging: Some(
            ActionTiming::new(46)
                .with_hit(HitSpec::new(37, 1.64).with_icd(IcdTag::None).blunt()),
        ),
        dash: Some(ActionTiming::new(20)),
        jump: Some(ActionTiming::new(30)),
        skill: Some(
            ActionTiming::new(24)
                .with_hit(
                    HitSpec::new(18, 1.92)
                        .with_element(HitElement::Character)
                        .with_gauge(2.0),
                )
                .with_cooldown(6.0),
        ),
        skill_hold: Some(
            ActionTiming::new(52)
                .with_hit(
                    HitSpec::new(44, 2.88)
                        .with_element(HitElement::Character)
                        .with_gauge(2.0),
                )
                .with_cooldown(9.0),
        ),
        burst: Some(
            ActionTiming::new(100)
                .with_hit(
                    HitSpec::new(92, 4.0)
                        .with_element(HitElement::Character)
                        .with_gauge(2.0),
                )
                .with_cooldown(15.0),
        ),
        ..kit
    }
}

fn sword_kit() -> Kit {
    let na = HitElement::Physical;
    common_actions(Kit {
        name: "sword".into(),
        normal_attack: vec![
            stage(24, 12, 0.45, na),
            stage(22, 10, 0.44, na),
            stage(30, 15, 0.58, na),
            stage(34, 18, 0.63, na),
            stage(52, 26, 0.76, na),
        ],
        charged: Some(
            ActionTiming::new(40)
                .with_hit(HitSpec::new(14, 0.55))
                .with_hit(HitSpec::new(22, 0.6)),
        ),
        plunging: None,
        skill: None,
        skill_hold: None,
        burst: None,
        dash: None,
        jump: None,
        particles: default_particles(),
    })
}

fn claymore_kit() -> Kit {
    let blunt = |lock, hit, multiplier| {
        ActionTiming::new(lock).with_hit(HitSpec::new(hit, multiplier).blunt())
    };
    common_actions(Kit {
        name: "claymore".into(),
        normal_attack: vec![
            blunt(46, 30, 0.83),
            blunt(42, 26, 0.77),
            blunt(50, 32, 0.86),
            blunt(70, 44, 1.13),
        ],
        charged: Some(blunt(60, 45, 1.2)),
        plunging: None,
        skill: None,
        skill_hold: None,
        burst: None,
        dash: None,
        jump: None,
        particles: default_particles(),
    })
}

fn polearm_kit() -> Kit {
    let na = HitElement::Physical;
    common_actions(Kit {
        name: "polearm".into(),
        normal_attack: vec![
            stage(20, 10, 0.42, na),
            stage(22, 11, 0.42, na),
            stage(26, 14, 0.26, na),
            stage(30, 16, 0.28, na),
            stage(32, 18, 0.14, na),
            stage(48, 26, 0.71, na),
        ],
        charged: Some(ActionTiming::new(44).with_hit(HitSpec::new(24, 1.22))),
        plunging: None,
        skill: None,
        skill_hold: None,
        burst: None,
        dash: None,
        jump: None,
        particles: 4,
    })
}

fn catalyst_kit() -> Kit {
    let na = HitElement::Character;
    common_actions(Kit {
        name: "catalyst".into(),
        normal_attack: vec![
            stage(28, 16, 0.38, na),
            stage(26, 14, 0.34, na),
            stage(52, 30, 0.48, na),
        ],
        charged: Some(
            ActionTiming::new(64)
                .with_hit(HitSpec::new(50, 1.38).with_element(HitElement::Character)),
        ),
        plunging: None,
        skill: None,
        skill_hold: None,
        burst: None,
        dash: None,
        jump: None,
        particles: default_particles(),
    })
}

fn bow_kit() -> Kit {
    let na = HitElement::Physical;
    common_actions(Kit {
        name: "bow".into(),
        normal_attack: vec![
            stage(18, 15, 0.36, na),
            stage(22, 19, 0.36, na),
            stage(28, 24, 0.46, na),
            stage(34, 30, 0.47, na),
            stage(48, 42, 0.59, na),
        ],
        charged: Some(
            ActionTiming::new(94).with_hit(
                HitSpec::new(86, 1.24)
                    .with_element(HitElement::Character)
                    .with_gauge(1.0)
                    .with_icd(IcdTag::None),
            ),
        ),
        plunging: None,
        skill: None,
        skill_hold: None,
        burst: None,
        dash: None,
        jump: None,
        particles: 2,
    })
}

// ============================================================================
// Registry
// ============================================================================

/// Kit file on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KitFile {
    /// Schema version of the file.
    #[serde(default = "default_version")]
    pub version: String,
    /// Kits in the file.
    #[serde(default)]
    pub kits: Vec<Kit>,
}

fn default_version() -> String {
    Document::KitFile.current().to_string()
}

fn check_version(version: &str) -> MotionLoadResult<()> {
    version
        .parse::<SchemaVersion>()
        .and_then(|found| found.ensure_readable(Document::KitFile))
        .map_err(|e| MotionLoadError::UnsupportedVersion(e.to_string()))
}

/// Registry of kits by name.
#[derive(Debug, Clone)]
pub struct KitRegistry {
    kits: AHashMap<String, Kit>,
}

impl Default for KitRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl KitRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            kits: AHashMap::new(),
        }
    }

    /// Creates a registry holding the built-in weapon class kits.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for kit in [sword_kit(), claymore_kit(), polearm_kit(), catalyst_kit(), bow_kit()] {
            registry.insert(kit);
        }
        registry
    }

    /// Adds a kit, replacing any kit of the same name.
    ///
    /// Returns the replaced kit.
    pub fn insert(&mut self, kit: Kit) -> Option<Kit> {
        self.kits.insert(kit.name.clone(), kit)
    }

    /// Looks up a kit by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Kit> {
        self.kits.get(name)
    }

    /// Returns true if a kit of this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.kits.contains_key(name)
    }

    /// Returns the number of registered kits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.kits.len()
    }

    /// Returns true if no kit is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kits.is_empty()
    }

    /// Returns registered kit names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.kits.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Parses kits from TOML text and registers them.
    pub fn load_str(&mut self, text: &str) -> MotionLoadResult<usize> {
        let file: KitFile = toml::from_str(text)?;
        check_version(&file.version)?;

        let mut seen = HashSet::new();
        for kit in &file.kits {
            kit.validate()?;
            if !seen.insert(kit.name.as_str()) {
                return Err(MotionLoadError::DuplicateKit(kit.name.clone()));
            }
        }

        let count = file.kits.len();
        for kit in file.kits {
            let name = kit.name.clone();
            if self.insert(kit).is_some() {
                debug!("Kit {} overridden", name);
            }
        }
        Ok(count)
    }

    /// Loads one kit file.
    pub fn load_file(&mut self, path: &Path) -> MotionLoadResult<usize> {
        if !path.exists() {
            return Err(MotionLoadError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        self.load_str(&content)
    }

    /// Loads every `*.toml` kit file in a directory.
    ///
    /// Files that fail to load are skipped with a warning.
    pub fn load_dir(&mut self, dir: &Path) -> MotionLoadResult<usize> {
        if !dir.is_dir() {
            return Err(MotionLoadError::NotFound(dir.to_path_buf()));
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        paths.sort();

        let mut count = 0;
        for path in paths {
            match self.load_file(&path) {
                Ok(n) => {
                    count += n;
                    debug!("Loaded {} kits from {:?}", n, path);
                },
                Err(e) => {
                    warn!("Failed to load kit file {:?}: {}", path, e);
                },
            }
        }

        info!("Loaded {} kits total", count);
        Ok(count)
    }
}
