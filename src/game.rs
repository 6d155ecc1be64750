//! Match state and the action reducer.
//!
//! `reduce` is the only way state changes: it takes the current state and
//! one action and returns the next state plus the outcome. A rejected
//! action returns the input state unchanged.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::balance;
use crate::config::{GameConfig, RotationMode};
use crate::error::{ActionResult, Rejection};
use crate::profiles::{InMemoryProfiles, PlayerProfile};
use crate::roster::{parse_roster_line, PlayerUpdate, Roster};
use crate::rotation::handle_rotate;
use crate::scoring;
use crate::types::*;
use crate::undo::{self, LogEntry, RosterSnapshot, UndoLog};

/// Where the match stands
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    InSet,
    /// A set just ended and the next has not seen an action yet
    SetComplete,
    MatchComplete,
}

/// Complete match state, serializable as a snapshot
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub match_id: Uuid,
    pub config: GameConfig,
    pub roster: Roster,
    #[serde(default)]
    pub rotation_mode: RotationMode,
    pub scores: PerSide<u16>,
    pub sets: PerSide<u8>,
    pub timeouts: PerSide<u8>,
    /// 1-based
    pub current_set: u8,
    pub history: Vec<SetRecord>,
    pub serving: Option<Side>,
    #[serde(default)]
    pub last_scorer: Option<Side>,
    pub in_sudden_death: bool,
    #[serde(default)]
    pub pending_side_switch: bool,
    #[serde(default)]
    pub swapped_sides: bool,
    pub match_winner: Option<Side>,
    /// Preview of the rotation the finished set would cause
    #[serde(default)]
    pub rotation_report: Option<RotationReport>,
    #[serde(default)]
    pub deleted_players: Vec<DeletedPlayerRecord>,
    /// Reported by the host timer
    #[serde(default)]
    pub match_duration_seconds: u32,
    #[serde(default)]
    pub timer_running: bool,
    #[serde(default)]
    pub undo: UndoLog,
    pub ids: IdSource,
}

/// Every action the host can dispatch
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Action {
    Point {
        side: Side,
        #[serde(default)]
        scorer: Option<PlayerId>,
        #[serde(default)]
        skill: Option<SkillKind>,
    },
    SubtractPoint {
        side: Side,
    },
    Timeout {
        side: Side,
    },
    SetServer {
        side: Side,
    },
    ToggleSides,
    Undo,
    ResetMatch,
    ApplySettings {
        config: GameConfig,
        #[serde(default)]
        force_reset: bool,
    },
    AdvanceToNextGame,
    ManualRotation {
        side: Side,
        direction: RotationDirection,
    },
    SetMatchDuration {
        seconds: u32,
    },
    ToggleTimer,
    ResetTimer,
    AddPlayer {
        name: String,
        #[serde(default)]
        number: Option<String>,
        #[serde(default)]
        skill: Option<u8>,
        #[serde(default)]
        profile_id: Option<ProfileId>,
        target: Location,
    },
    KnockOutPlayer {
        player: PlayerId,
    },
    DeletePlayer {
        player: PlayerId,
    },
    UndoDelete,
    CommitDeletions,
    MovePlayer {
        player: PlayerId,
        from: Location,
        to: Location,
        #[serde(default)]
        index: Option<usize>,
    },
    Substitute {
        team: TeamRef,
        player_out: PlayerId,
        player_in: PlayerId,
    },
    UpdatePlayer {
        player: PlayerId,
        update: PlayerUpdate,
    },
    ToggleFixed {
        player: PlayerId,
    },
    ToggleBench {
        team: TeamRef,
    },
    SwapPositions {
        team: TeamRef,
        first: usize,
        second: usize,
    },
    RenameTeam {
        team: TeamRef,
        name: String,
    },
    SetTeamColor {
        team: TeamRef,
        color: String,
    },
    SetTeamLogo {
        team: TeamRef,
        #[serde(default)]
        logo: Option<String>,
    },
    SetRotationMode {
        mode: RotationMode,
    },
    Rebalance,
    GenerateTeams {
        lines: Vec<String>,
    },
    ReorderQueue {
        from: usize,
        to: usize,
    },
    DisbandTeam {
        team: TeamKey,
    },
    RestoreTeam {
        team: Team,
        index: usize,
    },
    ResetRosters,
    SyncProfiles {
        profiles: Vec<PlayerProfile>,
    },
    LinkProfile {
        player: PlayerId,
        profile: ProfileId,
    },
    UnlinkProfile {
        profile: ProfileId,
    },
    LoadState {
        state: Box<GameState>,
    },
}

/// Next state and the outcome of the action that produced it
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub state: GameState,
    pub result: Result<(), Rejection>,
}

impl Transition {
    pub fn action_result(&self) -> ActionResult {
        ActionResult::from(&self.result)
    }
}

impl GameState {
    pub fn new(config: GameConfig, seed: u64) -> Self {
        let mut ids = IdSource::new(seed);
        let match_id = ids.next_uuid();
        let court_a = Team::new(ids.team_key(), "Team A", Vec::new());
        let court_b = Team::new(ids.team_key(), "Team B", Vec::new());
        Self {
            match_id,
            config,
            roster: Roster::new(court_a, court_b),
            rotation_mode: RotationMode::default(),
            scores: PerSide::default(),
            sets: PerSide::default(),
            timeouts: PerSide::default(),
            current_set: 1,
            history: Vec::new(),
            serving: None,
            last_scorer: None,
            in_sudden_death: false,
            pending_side_switch: false,
            swapped_sides: false,
            match_winner: None,
            rotation_report: None,
            deleted_players: Vec::new(),
            match_duration_seconds: 0,
            timer_running: false,
            undo: UndoLog::default(),
            ids,
        }
    }

    pub fn phase(&self) -> MatchPhase {
        if self.match_winner.is_some() {
            MatchPhase::MatchComplete
        } else if self.undo.has_boundary() {
            MatchPhase::SetComplete
        } else {
            MatchPhase::InSet
        }
    }

    pub fn is_match_over(&self) -> bool {
        self.match_winner.is_some()
    }

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    /// Checks config, scoreboard and roster invariants of a loaded state,
    /// including the state a pending set-boundary undo would restore.
    pub fn verify(&self) -> Result<(), Rejection> {
        self.config
            .validate()
            .map_err(|e| Rejection::InvalidSnapshot { message: e.to_string() })?;
        self.verify_scoreboard()
            .map_err(|message| Rejection::InvalidSnapshot { message })?;
        self.roster
            .verify(self.config.capacity())
            .map_err(|message| Rejection::InvalidSnapshot { message })?;
        match self.undo.boundary() {
            Some(before) => before.verify(),
            None => Ok(()),
        }
    }

    fn verify_scoreboard(&self) -> Result<(), String> {
        let config = &self.config;
        if self.current_set == 0 || self.current_set > config.max_sets {
            return Err(format!(
                "current set {} outside 1..={}",
                self.current_set, config.max_sets
            ));
        }
        let to_win = config.sets_to_win();
        for side in [Side::A, Side::B] {
            let sets = self.sets.value(side);
            let limit = if self.match_winner == Some(side) { to_win } else { to_win - 1 };
            if sets > limit {
                return Err(format!("{:?} has {} sets (max {})", side, sets, limit));
            }
            if self.scores.value(side) > config.score_ceiling {
                return Err(format!(
                    "{:?} score {} above ceiling {}",
                    side,
                    self.scores.value(side),
                    config.score_ceiling
                ));
            }
            if self.timeouts.value(side) > config.timeouts_per_set {
                return Err(format!(
                    "{:?} used {} timeouts (max {})",
                    side,
                    self.timeouts.value(side),
                    config.timeouts_per_set
                ));
            }
        }
        if let Some(winner) = self.match_winner {
            if self.sets.value(winner) != to_win {
                return Err(format!("winner {:?} has {} sets, needs {}", winner, self.sets.value(winner), to_win));
            }
        }
        Ok(())
    }

    pub fn to_snapshot_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_snapshot_json(json: &str) -> Result<Self, Rejection> {
        let state: GameState = serde_json::from_str(json).map_err(|e| Rejection::InvalidSnapshot {
            message: e.to_string(),
        })?;
        state.verify()?;
        Ok(state)
    }

    fn next_original_index(&self) -> usize {
        self.roster
            .all_players()
            .chain(self.deleted_players.iter().map(|d| &d.player))
            .map(|p| p.original_index + 1)
            .max()
            .unwrap_or(0)
    }

    fn clear_court_offsets(&mut self) {
        self.roster.court_a.tactical_offset = 0;
        self.roster.court_b.tactical_offset = 0;
    }

    /// Scores, sets, history and undo back to a fresh first set.
    fn reset_scoreboard(&mut self) {
        self.scores = PerSide::default();
        self.sets = PerSide::default();
        self.timeouts = PerSide::default();
        self.current_set = 1;
        self.history.clear();
        self.serving = None;
        self.last_scorer = None;
        self.in_sudden_death = false;
        self.pending_side_switch = false;
        self.match_winner = None;
        self.undo.clear();
        self.clear_court_offsets();
    }

    /// A new match: fresh scoreboard, new match id, sides and timer reset.
    fn reset_match(&mut self) {
        self.reset_scoreboard();
        self.match_id = self.ids.next_uuid();
        self.swapped_sides = false;
        self.match_duration_seconds = 0;
        self.timer_running = false;
        self.rotation_report = None;
    }
}

/// Applies one action. On rejection the returned state equals `state`.
pub fn reduce(state: &GameState, action: Action) -> Transition {
    let mut next = state.clone();
    match apply(&mut next, action) {
        Ok(()) => Transition {
            state: next,
            result: Ok(()),
        },
        Err(rejection) => {
            match &rejection {
                Rejection::PlayerNotFound { .. } | Rejection::TeamNotFound { .. } => {
                    warn!("Action ignored: {}", rejection)
                }
                _ => debug!("Action rejected: {}", rejection),
            }
            Transition {
                state: state.clone(),
                result: Err(rejection),
            }
        }
    }
}

fn apply(state: &mut GameState, action: Action) -> Result<(), Rejection> {
    let capacity = state.config.capacity();
    match action {
        Action::Point { side, scorer, skill } => scoring::score_point(state, side, scorer, skill)?,
        Action::SubtractPoint { side } => scoring::subtract_point(state, side)?,
        Action::Timeout { side } => scoring::request_timeout(state, side)?,
        Action::SetServer { side } => scoring::set_server(state, side),
        Action::ToggleSides => scoring::toggle_sides(state),
        Action::Undo => undo::undo(state)?,
        Action::ResetMatch => {
            state.reset_match();
            info!("Match reset");
        }
        Action::ApplySettings { config, force_reset } => apply_settings(state, config, force_reset)?,
        Action::AdvanceToNextGame => advance_to_next_game(state)?,
        Action::ManualRotation { side, direction } => scoring::manual_rotation(state, side, direction),
        Action::SetMatchDuration { seconds } => state.match_duration_seconds = seconds,
        Action::ToggleTimer => state.timer_running = !state.timer_running,
        Action::ResetTimer => {
            state.match_duration_seconds = 0;
            state.timer_running = false;
        }
        Action::AddPlayer {
            name,
            number,
            skill,
            profile_id,
            target,
        } => {
            let index = state.next_original_index();
            let mut player = Player::new(state.ids.player_id(), &name, index)
                .with_number(number.as_deref())
                .with_skill(skill.unwrap_or(DEFAULT_SKILL));
            if player.name.is_empty() {
                player.name = format!("Player {}", index + 1);
            }
            player.profile_id = profile_id;
            state.roster = state.roster.add_player(player, &target, capacity, &mut state.ids)?;
        }
        Action::KnockOutPlayer { player } => {
            state.roster = state.roster.knock_out(player, capacity, &mut state.ids)?;
        }
        Action::DeletePlayer { player } => {
            let (roster, record) = state.roster.delete_player(player)?;
            state.roster = roster;
            state.deleted_players.push(record);
        }
        Action::UndoDelete => {
            let record = state.deleted_players.pop().ok_or(Rejection::NoDeletedPlayers)?;
            state.roster = state.roster.restore_deleted(&record, capacity, &mut state.ids)?;
        }
        Action::CommitDeletions => state.deleted_players.clear(),
        Action::MovePlayer { player, from, to, index } => {
            state.roster = state
                .roster
                .move_player(player, &from, &to, index, capacity, &mut state.ids)?;
        }
        Action::Substitute {
            team,
            player_out,
            player_in,
        } => state.roster = state.roster.substitute(&team, player_out, player_in)?,
        Action::UpdatePlayer { player, update } => state.roster = state.roster.update_player(player, &update)?,
        Action::ToggleFixed { player } => state.roster = state.roster.toggle_fixed(player)?,
        Action::ToggleBench { team } => state.roster = state.roster.toggle_bench(&team)?,
        Action::SwapPositions { team, first, second } => {
            state.roster = state.roster.swap_positions(&team, first, second)?
        }
        Action::RenameTeam { team, name } => state.roster = state.roster.rename_team(&team, &name)?,
        Action::SetTeamColor { team, color } => state.roster = state.roster.set_team_color(&team, &color)?,
        Action::SetTeamLogo { team, logo } => state.roster = state.roster.set_team_logo(&team, logo)?,
        Action::SetRotationMode { mode } => state.rotation_mode = mode,
        Action::Rebalance => rebalance(state),
        Action::GenerateTeams { lines } => generate_teams(state, &lines),
        Action::ReorderQueue { from, to } => state.roster = state.roster.reorder_queue(from, to)?,
        Action::DisbandTeam { team } => {
            let (roster, disbanded, _) = state.roster.disband_team(team)?;
            info!("Disbanded {}", disbanded.name);
            state.roster = roster;
        }
        Action::RestoreTeam { team, index } => state.roster = state.roster.restore_team(team, index, capacity)?,
        Action::ResetRosters => state.roster = state.roster.cleared(),
        Action::SyncProfiles { profiles } => {
            let store: InMemoryProfiles = profiles.into_iter().collect();
            state.roster = state.roster.synced_with(&store);
        }
        Action::LinkProfile { player, profile } => state.roster = state.roster.link_profile(player, profile)?,
        Action::UnlinkProfile { profile } => state.roster = state.roster.unlinked(profile),
        Action::LoadState { state: loaded } => {
            loaded.verify()?;
            *state = *loaded;
        }
    }
    Ok(())
}

/// Replaces the rules. A different court preset redistributes everyone,
/// bench players included, at the new capacity.
fn apply_settings(state: &mut GameState, config: GameConfig, force_reset: bool) -> Result<(), Rejection> {
    config.validate()?;
    let layout_changed = config.mode != state.config.mode;
    state.config = config;
    if force_reset {
        state.reset_scoreboard();
    } else {
        state.verify_scoreboard().map_err(|message| Rejection::InvalidConfig {
            field: "maxSets".to_string(),
            message: format!("current score does not fit the new rules: {}", message),
        })?;
    }
    if layout_changed {
        let capacity = state.config.capacity();
        let pool: Vec<Player> = state.roster.all_players().cloned().collect();
        let empty = state.roster.cleared();
        let dist = balance::distribute_standard(&pool, &empty, capacity.court, &mut state.ids);
        state.roster = dist.roster;
        info!(
            "Court layout changed to {} per side, {} teams formed",
            capacity.court,
            state.roster.queue.len() + 2
        );
    }
    Ok(())
}

fn advance_to_next_game(state: &mut GameState) -> Result<(), Rejection> {
    let winner = state.match_winner.ok_or(Rejection::MatchInProgress)?;
    let capacity = state.config.capacity().court;
    let snapshot = RosterSnapshot {
        roster: state.roster.clone(),
        rotation_report: state.rotation_report.clone(),
    };
    let rotated = if state.roster.queue.is_empty() {
        None
    } else {
        handle_rotate(&state.roster, winner, state.rotation_mode, capacity)
    };

    state.reset_match();
    if let Some((roster, report)) = rotated {
        info!("Next game: {} comes on", report.incoming.name);
        state.roster = roster;
        state.clear_court_offsets();
        state.undo.start_with(LogEntry::Rotation {
            snapshot: Box::new(snapshot),
        });
    }
    Ok(())
}

fn rebalance(state: &mut GameState) {
    let pool = balance::court_pool(&state.roster);
    let capacity = state.config.capacity().court;
    let dist = match state.rotation_mode {
        RotationMode::Balanced => balance::distribute_snake(&pool, &state.roster, capacity, &mut state.ids),
        RotationMode::Standard => balance::distribute_standard(&pool, &state.roster, capacity, &mut state.ids),
    };
    for line in &dist.logs {
        debug!("{}", line);
    }
    state.roster = dist.roster;
}

/// Builds teams from pasted lines. Court players are replaced, court
/// benches stay, and the queue is rebuilt.
fn generate_teams(state: &mut GameState, lines: &[String]) {
    let start = state.next_original_index();
    let pool: Vec<Player> = lines
        .iter()
        .filter_map(|line| parse_roster_line(line))
        .map(|parsed| {
            Player::new(state.ids.player_id(), &parsed.name, 0)
                .with_number(parsed.number.as_deref())
                .with_skill(parsed.skill)
        })
        .filter(|p| !p.name.is_empty())
        .enumerate()
        .map(|(i, mut p)| {
            p.original_index = start + i;
            p
        })
        .collect();

    let mut base = state.roster.clone();
    base.court_a.players.clear();
    base.court_b.players.clear();
    base.queue.clear();
    let capacity = state.config.capacity().court;
    let dist = balance::distribute_standard(&pool, &base, capacity, &mut state.ids);
    info!("Generated {} players into {} teams", pool.len(), dist.roster.queue.len() + 2);
    state.roster = dist.roster;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{DeuceType, ModePreset};
    use crate::roster::tests::player;

    pub(crate) fn create_test_game(config: GameConfig) -> GameState {
        let mut state = GameState::new(config, 42);
        let per_side = state.config.capacity().court;
        for i in 0..per_side {
            let p = player(&mut state.ids, &format!("A{}", i + 1), i, 5);
            state.roster.court_a.players.push(p);
        }
        for i in 0..per_side {
            let p = player(&mut state.ids, &format!("B{}", i + 1), per_side + i, 5);
            state.roster.court_b.players.push(p);
        }
        state
    }

    fn dispatch(state: &GameState, action: Action) -> GameState {
        let transition = reduce(state, action);
        assert_eq!(transition.result, Ok(()));
        transition.state
    }

    fn sorted_ids(state: &GameState) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = state.roster.all_players().map(|p| p.id).collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_rejected_action_leaves_state_untouched() {
        let state = create_test_game(GameConfig::default());
        let transition = reduce(
            &state,
            Action::AddPlayer {
                name: "Extra".into(),
                number: None,
                skill: None,
                profile_id: None,
                target: Location::Court { team: TeamRef::A },
            },
        );
        assert_eq!(transition.result, Err(Rejection::RosterFull { capacity: 6 }));
        assert_eq!(transition.state, state);
        assert!(!transition.action_result().ok);
    }

    #[test]
    fn test_roster_actions_conserve_players() {
        let state = create_test_game(GameConfig::default());
        let ids_before = sorted_ids(&state);
        let a0 = state.roster.court_a.players[0].id;
        let b1 = state.roster.court_b.players[1].id;

        let state = dispatch(&state, Action::KnockOutPlayer { player: a0 });
        let state = dispatch(&state, Action::KnockOutPlayer { player: a0 });
        let queued = state.roster.queue[0].id;
        let state = dispatch(
            &state,
            Action::MovePlayer {
                player: b1,
                from: Location::Court { team: TeamRef::B },
                to: Location::Court { team: TeamRef::Queued(queued) },
                index: Some(0),
            },
        );
        let state = dispatch(&state, Action::Rebalance);
        assert_eq!(sorted_ids(&state), ids_before);
        assert!(state.verify().is_ok());
    }

    #[test]
    fn test_move_from_wrong_location_is_reported() {
        let state = create_test_game(GameConfig::default());
        let a0 = state.roster.court_a.players[0].id;
        let transition = reduce(
            &state,
            Action::MovePlayer {
                player: a0,
                from: Location::Bench { team: TeamRef::A },
                to: Location::QueueTail,
                index: None,
            },
        );
        assert_eq!(transition.result, Err(Rejection::PlayerNotFound { player: a0 }));
        assert_eq!(transition.state, state);
    }

    #[test]
    fn test_delete_and_undo_delete() {
        let state = create_test_game(GameConfig::default());
        let b3 = state.roster.court_b.players[3].id;
        let deleted = dispatch(&state, Action::DeletePlayer { player: b3 });
        assert!(deleted.roster.player(b3).is_none());
        assert_eq!(deleted.deleted_players.len(), 1);

        let restored = dispatch(&deleted, Action::UndoDelete);
        assert_eq!(restored.roster, state.roster);

        let committed = dispatch(&deleted, Action::CommitDeletions);
        assert_eq!(reduce(&committed, Action::UndoDelete).result, Err(Rejection::NoDeletedPlayers));
    }

    #[test]
    fn test_advance_requires_decided_match() {
        let state = create_test_game(GameConfig::default());
        assert_eq!(
            reduce(&state, Action::AdvanceToNextGame).result,
            Err(Rejection::MatchInProgress)
        );
    }

    #[test]
    fn test_advance_rotates_and_undo_restores_roster() {
        let config = GameConfig {
            max_sets: 1,
            points_per_set: 2,
            ..GameConfig::default()
        };
        let mut state = create_test_game(config);
        let waiting: Vec<String> = (0..6).map(|i| format!("Q{}", i)).collect();
        for name in waiting {
            state = dispatch(
                &state,
                Action::AddPlayer {
                    name,
                    number: None,
                    skill: None,
                    profile_id: None,
                    target: Location::QueueTail,
                },
            );
        }
        let state = dispatch(&state, Action::Point { side: Side::A, scorer: None, skill: None });
        let state = dispatch(&state, Action::Point { side: Side::A, scorer: None, skill: None });
        assert_eq!(state.phase(), MatchPhase::MatchComplete);
        let preview = state.rotation_report.clone().unwrap();

        let next = dispatch(&state, Action::AdvanceToNextGame);
        assert_eq!(next.phase(), MatchPhase::InSet);
        assert_eq!(next.scores, PerSide::new(0, 0));
        assert_eq!(next.roster.court_b.id, preview.incoming.id);
        assert_eq!(next.roster.queue[0].id, state.roster.court_b.id);
        assert_ne!(next.match_id, state.match_id);

        let undone = dispatch(&next, Action::Undo);
        assert_eq!(undone.roster, state.roster);
        assert_eq!(undone.rotation_report, state.rotation_report);
    }

    #[test]
    fn test_apply_settings_layout_change_redistributes() {
        let state = create_test_game(GameConfig::default());
        let knocked = state.roster.court_a.players[0].id;
        let state = dispatch(&state, Action::KnockOutPlayer { player: knocked });

        let config = GameConfig {
            mode: ModePreset::Triples3v3,
            ..GameConfig::default()
        };
        let next = dispatch(&state, Action::ApplySettings { config, force_reset: false });
        assert_eq!(next.roster.court_a.players.len(), 3);
        assert_eq!(next.roster.court_b.players.len(), 3);
        assert_eq!(next.roster.queue.len(), 2);
        assert!(next.roster.teams().all(|t| t.reserves.is_empty() && !t.has_active_bench));
        assert_eq!(sorted_ids(&next), sorted_ids(&state));
        assert!(next.verify().is_ok());
    }

    #[test]
    fn test_apply_settings_rejects_invalid_config() {
        let state = create_test_game(GameConfig::default());
        let config = GameConfig {
            max_sets: 2,
            ..GameConfig::default()
        };
        let transition = reduce(&state, Action::ApplySettings { config, force_reset: true });
        assert!(matches!(transition.result, Err(Rejection::InvalidConfig { .. })));
    }

    #[test]
    fn test_apply_settings_force_reset() {
        let state = create_test_game(GameConfig::default());
        let state = dispatch(&state, Action::Point { side: Side::B, scorer: None, skill: None });
        let config = GameConfig {
            deuce_type: DeuceType::SuddenDeath3Pt,
            ..GameConfig::default()
        };
        let next = dispatch(&state, Action::ApplySettings { config, force_reset: true });
        assert_eq!(next.scores, PerSide::new(0, 0));
        assert!(!next.can_undo());
        assert_eq!(next.config.deuce_type, DeuceType::SuddenDeath3Pt);
    }

    #[test]
    fn test_generate_teams() {
        let state = GameState::new(GameConfig::default(), 9);
        let lines: Vec<String> = (1..=14).map(|i| format!("{} Player{} {}", i + 10, i, (i % 10) + 1)).collect();
        let next = dispatch(&state, Action::GenerateTeams { lines });
        assert_eq!(next.roster.court_a.players.len(), 6);
        assert_eq!(next.roster.court_b.players.len(), 6);
        assert_eq!(next.roster.queue.len(), 1);
        assert_eq!(next.roster.court_a.players[0].name, "Player1");
        assert_eq!(next.roster.court_a.players[0].jersey(), Some("11"));
        assert_eq!(next.roster.court_a.players[0].skill, 2);
    }

    #[test]
    fn test_snapshot_round_trip_and_rejects_broken_state() {
        let state = create_test_game(GameConfig::default());
        let state = dispatch(&state, Action::Point { side: Side::A, scorer: None, skill: Some(SkillKind::Ace) });
        let json = state.to_snapshot_json().unwrap();
        let loaded = GameState::from_snapshot_json(&json).unwrap();
        assert_eq!(loaded, state);

        let mut broken = state.clone();
        let dup = broken.roster.court_a.players[0].clone();
        broken.roster.court_b.reserves.push(dup);
        let json = broken.to_snapshot_json().unwrap();
        assert!(matches!(
            GameState::from_snapshot_json(&json),
            Err(Rejection::InvalidSnapshot { .. })
        ));
        assert!(reduce(&state, Action::LoadState { state: Box::new(broken) }).result.is_err());
    }

    #[test]
    fn test_action_json_shape() {
        let action: Action = serde_json::from_str(r#"{"type":"point","side":"A"}"#).unwrap();
        assert_eq!(action, Action::Point { side: Side::A, scorer: None, skill: None });
        let action: Action = serde_json::from_str(r#"{"type":"reorderQueue","from":1,"to":0}"#).unwrap();
        assert_eq!(action, Action::ReorderQueue { from: 1, to: 0 });
    }

    #[test]
    fn test_timer_actions() {
        let state = create_test_game(GameConfig::default());
        let state = dispatch(&state, Action::SetMatchDuration { seconds: 95 });
        let state = dispatch(&state, Action::ToggleTimer);
        assert!(state.timer_running);
        let state = dispatch(&state, Action::ResetTimer);
        assert_eq!(state.match_duration_seconds, 0);
        assert!(!state.timer_running);
    }

    #[test]
    fn test_sync_profiles_action() {
        let state = create_test_game(GameConfig::default());
        let target = state.roster.court_a.players[2].clone();
        let profile = PlayerProfile {
            id: ProfileId(Uuid::nil()),
            name: target.name.clone(),
            skill: 9,
            number: Some("10".into()),
            role: PlayerRole::Libero,
            avatar: None,
        };
        let next = dispatch(&state, Action::SyncProfiles { profiles: vec![profile.clone()] });
        let synced = next.roster.player(target.id).unwrap();
        assert_eq!(synced.profile_id, Some(profile.id));
        assert_eq!(synced.skill, 9);

        let next = dispatch(&next, Action::UnlinkProfile { profile: profile.id });
        assert_eq!(next.roster.player(target.id).unwrap().profile_id, None);
    }

    #[test]
    fn test_snapshot_with_impossible_scoreboard_is_rejected() {
        let state = create_test_game(GameConfig::default());

        let mut runaway_set = state.clone();
        runaway_set.current_set = 255;
        let json = runaway_set.to_snapshot_json().unwrap();
        assert!(matches!(
            GameState::from_snapshot_json(&json),
            Err(Rejection::InvalidSnapshot { .. })
        ));

        let mut too_many_sets = state.clone();
        too_many_sets.sets = PerSide::new(3, 0);
        assert!(too_many_sets.verify().is_err());

        let mut over_ceiling = state.clone();
        over_ceiling.scores = PerSide::new(0, 201);
        assert!(over_ceiling.verify().is_err());

        let mut extra_timeouts = state.clone();
        extra_timeouts.timeouts = PerSide::new(3, 0);
        assert!(extra_timeouts.verify().is_err());

        assert_eq!(
            reduce(&state, Action::LoadState { state: Box::new(runaway_set) }).state,
            state
        );
    }

    #[test]
    fn test_decided_match_snapshot_loads_and_stays_final() {
        let config = GameConfig {
            max_sets: 1,
            points_per_set: 2,
            ..GameConfig::default()
        };
        let state = create_test_game(config);
        let state = dispatch(&state, Action::Point { side: Side::B, scorer: None, skill: None });
        let state = dispatch(&state, Action::Point { side: Side::B, scorer: None, skill: None });
        let loaded = GameState::from_snapshot_json(&state.to_snapshot_json().unwrap()).unwrap();
        assert_eq!(loaded.phase(), MatchPhase::MatchComplete);
        assert_eq!(
            reduce(&loaded, Action::Point { side: Side::A, scorer: None, skill: None }).result,
            Err(Rejection::MatchOver)
        );
    }

    #[test]
    fn test_apply_settings_rejects_rules_the_score_has_outgrown() {
        let mut state = create_test_game(GameConfig::default());
        state.sets = PerSide::new(2, 1);
        state.current_set = 4;
        let config = GameConfig {
            max_sets: 3,
            ..GameConfig::default()
        };
        let transition = reduce(&state, Action::ApplySettings { config: config.clone(), force_reset: false });
        assert!(matches!(transition.result, Err(Rejection::InvalidConfig { .. })));
        assert_eq!(transition.state, state);

        let reset = dispatch(&state, Action::ApplySettings { config, force_reset: true });
        assert_eq!(reset.current_set, 1);
        assert!(reset.verify().is_ok());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Clone, Debug)]
        enum RosterOp {
            Add(u8, Option<u8>),
            Move(usize, u8, usize),
            KnockOut(usize),
            Delete(usize),
            UndoDelete,
            Substitute(bool, usize, usize),
        }

        fn roster_op() -> impl Strategy<Value = RosterOp> {
            prop_oneof![
                (0u8..5, proptest::option::of(1u8..5)).prop_map(|(t, n)| RosterOp::Add(t, n)),
                (any::<usize>(), 0u8..5, 0usize..8).prop_map(|(p, t, i)| RosterOp::Move(p, t, i)),
                any::<usize>().prop_map(RosterOp::KnockOut),
                any::<usize>().prop_map(RosterOp::Delete),
                Just(RosterOp::UndoDelete),
                (any::<bool>(), any::<usize>(), any::<usize>()).prop_map(|(a, o, i)| RosterOp::Substitute(a, o, i)),
            ]
        }

        fn location(state: &GameState, pick: u8) -> Location {
            match pick {
                0 => Location::Court { team: TeamRef::A },
                1 => Location::Court { team: TeamRef::B },
                2 => Location::Bench { team: TeamRef::A },
                3 => match state.roster.queue.front() {
                    Some(team) => Location::Court { team: TeamRef::Queued(team.id) },
                    None => Location::QueueTail,
                },
                _ => Location::QueueTail,
            }
        }

        fn pick_player(state: &GameState, pick: usize) -> Option<PlayerId> {
            let ids: Vec<PlayerId> = state.roster.all_players().map(|p| p.id).collect();
            if ids.is_empty() {
                None
            } else {
                Some(ids[pick % ids.len()])
            }
        }

        fn to_action(state: &GameState, op: RosterOp) -> Option<Action> {
            let action = match op {
                RosterOp::Add(target, number) => Action::AddPlayer {
                    name: "Walk-in".into(),
                    number: number.map(|n| n.to_string()),
                    skill: None,
                    profile_id: None,
                    target: location(state, target),
                },
                RosterOp::Move(pick, target, index) => {
                    let player = pick_player(state, pick)?;
                    let (from, _) = state.roster.find_player(player)?;
                    Action::MovePlayer {
                        player,
                        from,
                        to: location(state, target),
                        index: Some(index),
                    }
                }
                RosterOp::KnockOut(pick) => Action::KnockOutPlayer {
                    player: pick_player(state, pick)?,
                },
                RosterOp::Delete(pick) => Action::DeletePlayer {
                    player: pick_player(state, pick)?,
                },
                RosterOp::UndoDelete => Action::UndoDelete,
                RosterOp::Substitute(on_a, out, incoming) => {
                    let side = if on_a { Side::A } else { Side::B };
                    let team = state.roster.side(side);
                    if team.players.is_empty() || team.reserves.is_empty() {
                        return None;
                    }
                    Action::Substitute {
                        team: side.into(),
                        player_out: team.players[out % team.players.len()].id,
                        player_in: team.reserves[incoming % team.reserves.len()].id,
                    }
                }
            };
            Some(action)
        }

        /// Roster ids plus ids parked in the deleted-player history.
        fn tracked_ids(state: &GameState) -> Vec<PlayerId> {
            let mut ids = sorted_ids(state);
            ids.extend(state.deleted_players.iter().map(|d| d.player.id));
            ids.sort();
            ids
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            /// Property: roster actions never lose or duplicate a player
            #[test]
            fn prop_roster_actions_conserve_players(ops in proptest::collection::vec(roster_op(), 1..40)) {
                let mut state = create_test_game(GameConfig::default());
                for op in ops {
                    let Some(action) = to_action(&state, op) else { continue };
                    let is_add = matches!(action, Action::AddPlayer { .. });
                    let before = tracked_ids(&state);
                    let transition = reduce(&state, action);

                    match &transition.result {
                        Ok(()) => {
                            let after = tracked_ids(&transition.state);
                            if is_add {
                                prop_assert_eq!(after.len(), before.len() + 1);
                                prop_assert!(before.iter().all(|id| after.binary_search(id).is_ok()));
                            } else {
                                prop_assert_eq!(after, before);
                            }
                        }
                        Err(_) => {
                            prop_assert_eq!(&transition.state, &state);
                        }
                    }
                    prop_assert!(transition.state.verify().is_ok());
                    state = transition.state;
                }
            }
        }
    }
}
