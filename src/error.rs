use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{PlayerId, Side, TeamKey, TeamRef};

/// Why an action was refused. A refused action leaves the state untouched.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Rejection {
    #[error("number {number} is already worn by {conflict_name}")]
    NumberConflict {
        number: String,
        conflict_id: PlayerId,
        conflict_name: String,
    },
    #[error("team is full ({capacity} players on court)")]
    RosterFull { capacity: usize },
    #[error("bench is full ({capacity} reserves)")]
    BenchFull { capacity: usize },
    #[error("team {team:?} not found")]
    TeamNotFound { team: TeamRef },
    #[error("player {player} not found")]
    PlayerNotFound { player: PlayerId },
    #[error("player {player} is already on a roster")]
    DuplicatePlayer { player: PlayerId },
    #[error("team {team} is already in the roster")]
    DuplicateTeam { team: TeamKey },
    #[error("match is already decided")]
    MatchOver,
    #[error("score ceiling of {ceiling} reached")]
    ScoreCeiling { ceiling: u16 },
    #[error("score is already zero")]
    ScoreAtZero,
    #[error("side {side:?} has no timeouts left this set")]
    TimeoutsExhausted { side: Side },
    #[error("nothing to undo")]
    NothingToUndo,
    #[error("match is still in progress")]
    MatchInProgress,
    #[error("queue index {index} out of range for {len} teams")]
    QueueIndexOutOfRange { index: usize, len: usize },
    #[error("no deleted players to restore")]
    NoDeletedPlayers,
    #[error("invalid config field `{field}`: {message}")]
    InvalidConfig { field: String, message: String },
    #[error("invalid snapshot: {message}")]
    InvalidSnapshot { message: String },
}

impl Rejection {
    /// Stable machine-readable code, same as the serialized `code` tag.
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::NumberConflict { .. } => "number_conflict",
            Rejection::RosterFull { .. } => "roster_full",
            Rejection::BenchFull { .. } => "bench_full",
            Rejection::TeamNotFound { .. } => "team_not_found",
            Rejection::PlayerNotFound { .. } => "player_not_found",
            Rejection::DuplicatePlayer { .. } => "duplicate_player",
            Rejection::DuplicateTeam { .. } => "duplicate_team",
            Rejection::MatchOver => "match_over",
            Rejection::ScoreCeiling { .. } => "score_ceiling",
            Rejection::ScoreAtZero => "score_at_zero",
            Rejection::TimeoutsExhausted { .. } => "timeouts_exhausted",
            Rejection::NothingToUndo => "nothing_to_undo",
            Rejection::MatchInProgress => "match_in_progress",
            Rejection::QueueIndexOutOfRange { .. } => "queue_index_out_of_range",
            Rejection::NoDeletedPlayers => "no_deleted_players",
            Rejection::InvalidConfig { .. } => "invalid_config",
            Rejection::InvalidSnapshot { .. } => "invalid_snapshot",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value for `{field}`: {message}")]
    Validation { field: &'static str, message: String },
}

impl From<ConfigError> for Rejection {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Parse(e) => Rejection::InvalidConfig {
                field: String::new(),
                message: e.to_string(),
            },
            ConfigError::Validation { field, message } => Rejection::InvalidConfig {
                field: field.to_string(),
                message,
            },
        }
    }
}

/// Result of dispatching an action, as reported to the host
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ActionResult {
    pub fn accepted() -> Self {
        Self {
            ok: true,
            rejection: None,
            message: None,
        }
    }

    pub fn rejected(rejection: Rejection) -> Self {
        Self {
            ok: false,
            message: Some(rejection.to_string()),
            rejection: Some(rejection),
        }
    }
}

impl From<&Result<(), Rejection>> for ActionResult {
    fn from(result: &Result<(), Rejection>) -> Self {
        match result {
            Ok(()) => ActionResult::accepted(),
            Err(rejection) => ActionResult::rejected(rejection.clone()),
        }
    }
}
