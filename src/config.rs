use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Target for both sides once a set switches to sudden death
pub const SUDDEN_DEATH_TARGET: u16 = 3;

/// Court preset; decides how many players fit on court and on the bench
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModePreset {
    #[serde(rename = "indoor-6v6")]
    Indoor6v6,
    #[serde(rename = "quads-5v5")]
    Quads5v5,
    #[serde(rename = "beach-4v4")]
    Beach4v4,
    #[serde(rename = "triples-3v3")]
    Triples3v3,
    #[serde(rename = "beach-2v2")]
    Beach2v2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourtFamily {
    Indoor,
    Beach,
}

impl ModePreset {
    pub fn capacity(&self) -> Capacity {
        match self {
            ModePreset::Indoor6v6 => Capacity::new(6, 6),
            ModePreset::Quads5v5 => Capacity::new(5, 4),
            ModePreset::Beach4v4 => Capacity::new(4, 3),
            ModePreset::Triples3v3 => Capacity::new(3, 2),
            ModePreset::Beach2v2 => Capacity::new(2, 1),
        }
    }

    pub fn family(&self) -> CourtFamily {
        match self {
            ModePreset::Indoor6v6 | ModePreset::Quads5v5 => CourtFamily::Indoor,
            _ => CourtFamily::Beach,
        }
    }
}

/// Players allowed on court and on the bench per team
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capacity {
    pub court: usize,
    pub bench: usize,
}

impl Capacity {
    pub fn new(court: usize, bench: usize) -> Self {
        Self { court, bench }
    }
}

/// How deuce is resolved
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeuceType {
    /// Play on until one side leads by `min_lead`
    Standard,
    /// At target-1 all, reset to 0-0 and race to 3
    #[serde(rename = "sudden_death_3pt")]
    SuddenDeath3Pt,
}

/// How the incoming team is filled when it is short of players
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationMode {
    #[default]
    Standard,
    Balanced,
}

/// Match rules
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GameConfig {
    pub mode: ModePreset,
    /// 1, 3 or 5
    pub max_sets: u8,
    pub points_per_set: u16,
    /// Whether the deciding set plays to `tie_break_points`
    pub has_tie_break: bool,
    pub tie_break_points: u16,
    pub deuce_type: DeuceType,
    /// Beach presets switch sides every 7 points (5 in the tie-break)
    pub auto_swap_sides: bool,
    pub min_lead: u16,
    pub timeouts_per_set: u8,
    /// Scores never exceed this value
    pub score_ceiling: u16,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            mode: ModePreset::Indoor6v6,
            max_sets: 5,
            points_per_set: 25,
            has_tie_break: true,
            tie_break_points: 15,
            deuce_type: DeuceType::Standard,
            auto_swap_sides: true,
            min_lead: 2,
            timeouts_per_set: 2,
            score_ceiling: 200,
        }
    }
}

impl GameConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.max_sets, 1 | 3 | 5) {
            return Err(ConfigError::Validation {
                field: "maxSets",
                message: format!("must be 1, 3 or 5, got {}", self.max_sets),
            });
        }
        if self.points_per_set == 0 {
            return Err(ConfigError::Validation {
                field: "pointsPerSet",
                message: "must be at least 1".to_string(),
            });
        }
        if self.has_tie_break && self.tie_break_points == 0 {
            return Err(ConfigError::Validation {
                field: "tieBreakPoints",
                message: "must be at least 1".to_string(),
            });
        }
        if self.min_lead == 0 {
            return Err(ConfigError::Validation {
                field: "minLead",
                message: "must be at least 1".to_string(),
            });
        }
        if self.score_ceiling < self.points_per_set.max(self.tie_break_points) {
            return Err(ConfigError::Validation {
                field: "scoreCeiling",
                message: "must not be below the set target".to_string(),
            });
        }
        Ok(())
    }

    pub fn capacity(&self) -> Capacity {
        self.mode.capacity()
    }

    pub fn sets_to_win(&self) -> u8 {
        self.max_sets.div_ceil(2)
    }

    pub fn is_tie_break(&self, set: u8) -> bool {
        self.has_tie_break && self.max_sets > 1 && set == self.max_sets
    }

    pub fn target_for_set(&self, set: u8) -> u16 {
        if self.is_tie_break(set) {
            self.tie_break_points
        } else {
            self.points_per_set
        }
    }

    /// Total points between automatic side switches, if the preset switches at all.
    pub fn side_switch_interval(&self, set: u8) -> Option<u16> {
        if !self.auto_swap_sides || self.mode.family() != CourtFamily::Beach {
            return None;
        }
        Some(if self.is_tie_break(set) { 5 } else { 7 })
    }
}
