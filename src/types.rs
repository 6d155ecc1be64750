use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::error::Rejection;

pub const MIN_SKILL: u8 = 1;
pub const MAX_SKILL: u8 = 10;
pub const DEFAULT_SKILL: u8 = 5;
pub const MAX_NAME_LEN: usize = 30;

/// Stable identity of a roster player
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub Uuid);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Stable identity of a team, independent of its display name
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamKey(pub Uuid);

impl fmt::Display for TeamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity of a persistent player profile
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(pub Uuid);

/// One of the two court positions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

/// A value tracked once per court side
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PerSide<T> {
    pub a: T,
    pub b: T,
}

impl<T> PerSide<T> {
    pub fn new(a: T, b: T) -> Self {
        Self { a, b }
    }

    pub fn get(&self, side: Side) -> &T {
        match side {
            Side::A => &self.a,
            Side::B => &self.b,
        }
    }

    pub fn get_mut(&mut self, side: Side) -> &mut T {
        match side {
            Side::A => &mut self.a,
            Side::B => &mut self.b,
        }
    }
}

impl<T: Copy> PerSide<T> {
    pub fn value(&self, side: Side) -> T {
        *self.get(side)
    }
}

/// On-court specialty, informational only
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerRole {
    Setter,
    Hitter,
    Middle,
    Libero,
    #[default]
    None,
}

/// How a point was won, recorded alongside the scorer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillKind {
    Attack,
    Block,
    Ace,
    OpponentError,
    Generic,
}

/// Direction of a manual tactical rotation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationDirection {
    Clockwise,
    Counter,
}

/// A roster player
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    /// Linked persistent profile, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<ProfileId>,
    pub name: String,
    /// Jersey number; blank numbers are stored as `None`
    #[serde(default)]
    pub number: Option<String>,
    /// Skill level in [1, 10]
    pub skill: u8,
    #[serde(default)]
    pub role: PlayerRole,
    /// Fixed players never leave their team during automatic operations
    #[serde(default)]
    pub is_fixed: bool,
    /// Entry order, used as a stable sort key when redistributing
    pub original_index: usize,
}

impl Player {
    pub fn new(id: PlayerId, name: &str, original_index: usize) -> Self {
        Self {
            id,
            profile_id: None,
            name: sanitize_name(name),
            number: None,
            skill: DEFAULT_SKILL,
            role: PlayerRole::None,
            is_fixed: false,
            original_index,
        }
    }

    pub fn with_skill(mut self, skill: u8) -> Self {
        self.skill = clamp_skill(skill);
        self
    }

    pub fn with_number(mut self, number: Option<&str>) -> Self {
        self.number = normalize_number(number);
        self
    }

    pub fn jersey(&self) -> Option<&str> {
        self.number.as_deref()
    }
}

pub fn clamp_skill(skill: u8) -> u8 {
    skill.clamp(MIN_SKILL, MAX_SKILL)
}

/// Trims a jersey number; blank input means "no number".
pub fn normalize_number(number: Option<&str>) -> Option<String> {
    number
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

const BLOCKED_SCHEMES: [&str; 3] = ["javascript:", "vbscript:", "data:"];

/// Cleans a user-entered display name.
///
/// Markup characters and script URL schemes are stripped, surrounding
/// whitespace is trimmed and the result is capped at `MAX_NAME_LEN` chars.
pub fn sanitize_name(input: &str) -> String {
    let mut cleaned: String = input
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '/' | '"' | '\'' | '`' | '\\'))
        .collect();

    for scheme in BLOCKED_SCHEMES {
        while let Some(pos) = cleaned.to_ascii_lowercase().find(scheme) {
            cleaned.replace_range(pos..pos + scheme.len(), "");
        }
    }

    cleaned.trim().chars().take(MAX_NAME_LEN).collect::<String>().trim_end().to_string()
}

pub fn total_skill(players: &[Player]) -> u32 {
    players.iter().map(|p| p.skill as u32).sum()
}

pub fn average_skill(players: &[Player]) -> f64 {
    if players.is_empty() {
        return 0.0;
    }
    total_skill(players) as f64 / players.len() as f64
}

/// A team: ordered on-court roster plus an optional bench
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: TeamKey,
    pub name: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    /// On-court list, ordered by position
    pub players: Vec<Player>,
    /// Bench
    #[serde(default)]
    pub reserves: Vec<Player>,
    #[serde(default)]
    pub has_active_bench: bool,
    /// Display offset applied by manual rotations; never reorders `players`
    #[serde(default)]
    pub tactical_offset: usize,
}

impl Team {
    pub fn new(id: TeamKey, name: &str, players: Vec<Player>) -> Self {
        Self {
            id,
            name: name.to_string(),
            color: "slate".to_string(),
            logo: None,
            players,
            reserves: Vec::new(),
            has_active_bench: false,
            tactical_offset: 0,
        }
    }

    /// No players on court and none on the bench.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty() && self.reserves.is_empty()
    }

    pub fn members(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().chain(self.reserves.iter())
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.members().any(|p| p.id == id)
    }

    pub fn total_skill(&self) -> u32 {
        total_skill(&self.players)
    }

    pub fn average_skill(&self) -> f64 {
        average_skill(&self.players)
    }

    /// Rejects `number` if another member (other than `except`) already wears it.
    pub fn check_number(&self, number: Option<&str>, except: Option<PlayerId>) -> Result<(), Rejection> {
        let Some(number) = number else {
            return Ok(());
        };
        match self
            .members()
            .find(|p| Some(p.id) != except && p.jersey() == Some(number))
        {
            Some(conflict) => Err(Rejection::NumberConflict {
                number: number.to_string(),
                conflict_id: conflict.id,
                conflict_name: conflict.name.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Clears jersey numbers that collide with an earlier member.
    ///
    /// Automatic redistribution can bring two players with the same number
    /// together; the first one (court before bench) keeps it.
    pub fn resolve_number_conflicts(&mut self) -> Vec<PlayerId> {
        let mut seen: HashMap<String, PlayerId> = HashMap::new();
        let mut cleared = Vec::new();
        for player in self.players.iter_mut().chain(self.reserves.iter_mut()) {
            if let Some(number) = player.number.clone() {
                if seen.contains_key(&number) {
                    player.number = None;
                    cleared.push(player.id);
                } else {
                    seen.insert(number, player.id);
                }
            }
        }
        cleared
    }
}

/// Addresses a team: one of the courts, or a queued team by key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TeamRef {
    A,
    B,
    Queued(TeamKey),
}

impl From<Side> for TeamRef {
    fn from(side: Side) -> Self {
        match side {
            Side::A => TeamRef::A,
            Side::B => TeamRef::B,
        }
    }
}

/// Where a player sits, or where it should go
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Location {
    Court { team: TeamRef },
    Bench { team: TeamRef },
    QueueTail,
}

/// Final score of a completed set
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRecord {
    pub set_number: u8,
    pub scores: PerSide<u16>,
    pub winner: Side,
}

/// Outcome of a winner-stays rotation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationReport {
    pub outgoing: Team,
    pub incoming: Team,
    /// Fixed players that were already on the incoming team
    pub retained: Vec<Player>,
    /// Players pulled from other queued teams to fill the incoming team
    pub stolen: Vec<Player>,
    pub queue_after: Vec<Team>,
    pub logs: Vec<String>,
}

/// A deleted player kept until deletions are committed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedPlayerRecord {
    pub player: Player,
    pub origin: Location,
    pub index: usize,
}

/// Deterministic id generator.
///
/// Every id is derived from the seed and the number of ids issued so far,
/// so replaying the same actions from the same state yields the same ids.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdSource {
    seed: u64,
    issued: u64,
}

impl IdSource {
    pub fn new(seed: u64) -> Self {
        Self { seed, issued: 0 }
    }

    pub fn next_uuid(&mut self) -> Uuid {
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(self.issued));
        self.issued += 1;
        uuid::Builder::from_random_bytes(rng.gen()).into_uuid()
    }

    pub fn player_id(&mut self) -> PlayerId {
        PlayerId(self.next_uuid())
    }

    pub fn team_key(&mut self) -> TeamKey {
        TeamKey(self.next_uuid())
    }

    pub fn issued(&self) -> u64 {
        self.issued
    }
}
