//! Set and match scoring: points, deuce and sudden death, side-outs,
//! timeouts and side switches.

use log::{debug, info};

use crate::config::{DeuceType, SUDDEN_DEATH_TARGET};
use crate::error::Rejection;
use crate::game::GameState;
use crate::rotation::handle_rotate;
use crate::types::*;
use crate::undo::LogEntry;

/// Last position moves to the front.
pub fn rotate_clockwise(players: &mut [Player]) {
    if players.len() > 1 {
        players.rotate_right(1);
    }
}

/// First position moves to the back.
pub fn rotate_counter_clockwise(players: &mut [Player]) {
    if players.len() > 1 {
        players.rotate_left(1);
    }
}

/// Moves a display offset one step around a team of `len` players.
pub fn shift_offset(offset: usize, len: usize, direction: RotationDirection) -> usize {
    if len == 0 {
        return 0;
    }
    let offset = offset % len;
    match direction {
        RotationDirection::Clockwise => (offset + 1) % len,
        RotationDirection::Counter => (offset + len - 1) % len,
    }
}

/// Winner of the set at `scores`, if any.
///
/// In sudden death the first side to 3 with any lead wins; otherwise a side
/// needs `target` points and a lead of `min_lead`.
pub fn set_winner(scores: PerSide<u16>, target: u16, min_lead: u16, sudden_death: bool) -> Option<Side> {
    [Side::A, Side::B].into_iter().find(|&side| {
        let own = scores.value(side);
        let other = scores.value(side.opponent());
        if sudden_death {
            own >= SUDDEN_DEATH_TARGET && own > other
        } else {
            own >= target && own >= other.saturating_add(min_lead)
        }
    })
}

pub fn score_point(
    state: &mut GameState,
    side: Side,
    scorer: Option<PlayerId>,
    skill: Option<SkillKind>,
) -> Result<(), Rejection> {
    if state.match_winner.is_some() {
        return Err(Rejection::MatchOver);
    }
    let ceiling = state.config.score_ceiling;
    if state.scores.a >= ceiling || state.scores.b >= ceiling {
        return Err(Rejection::ScoreCeiling { ceiling });
    }

    let before = state.clone();
    let prev_offset = state.roster.side(side).tactical_offset;
    let mut entry = LogEntry::Point {
        side,
        prev_scores: state.scores,
        prev_server: state.serving,
        prev_sudden_death: state.in_sudden_death,
        prev_swapped_sides: state.swapped_sides,
        prev_pending_side_switch: state.pending_side_switch,
        side_out: false,
        prev_offset,
        scorer,
        skill,
    };

    *state.scores.get_mut(side) += 1;
    state.timer_running = true;

    let target = state.config.target_for_set(state.current_set);
    let deuce_at = target.saturating_sub(1);
    if state.config.deuce_type == DeuceType::SuddenDeath3Pt
        && !state.in_sudden_death
        && deuce_at > 0
        && state.scores.a == deuce_at
        && state.scores.b == deuce_at
    {
        info!("Deuce at {}-{}, switching to sudden death", deuce_at, deuce_at);
        state.scores = PerSide::default();
        state.in_sudden_death = true;
    }

    if let Some(winner) = set_winner(state.scores, target, state.config.min_lead, state.in_sudden_death) {
        finish_set(state, before, winner, entry);
        return Ok(());
    }

    let side_out = state.serving.is_some_and(|server| server != side);
    if side_out {
        let team = state.roster.side_mut(side);
        rotate_clockwise(&mut team.players);
        team.tactical_offset = 0;
        debug!("Side-out, {} rotates", team.name);
        if let LogEntry::Point { side_out: flag, .. } = &mut entry {
            *flag = true;
        }
    }
    state.serving = Some(side);

    if let Some(interval) = state.config.side_switch_interval(state.current_set) {
        let total = u32::from(state.scores.a) + u32::from(state.scores.b);
        if total > 0 && total % u32::from(interval) == 0 {
            state.swapped_sides = !state.swapped_sides;
            state.pending_side_switch = true;
            debug!("Side switch at {} total points", total);
        }
    }

    state.undo.record(entry);
    state.last_scorer = Some(side);
    Ok(())
}

/// Records the set, decides the match and previews the rotation. Rosters
/// are not touched here.
fn finish_set(state: &mut GameState, before: GameState, winner: Side, entry: LogEntry) {
    let final_scores = state.scores;
    *state.sets.get_mut(winner) += 1;
    state.history.push(SetRecord {
        set_number: state.current_set,
        scores: final_scores,
        winner,
    });
    let decided = state.sets.value(winner) >= state.config.sets_to_win();
    info!(
        "Set {} to {:?} ({}-{}), sets {}-{}",
        state.current_set, winner, final_scores.a, final_scores.b, state.sets.a, state.sets.b
    );

    state.rotation_report = if state.roster.queue.is_empty() {
        None
    } else {
        let capacity = state.config.capacity().court;
        handle_rotate(&state.roster, winner, state.rotation_mode, capacity).map(|(_, report)| report)
    };

    if decided {
        info!("Match won by {:?}", winner);
        state.match_winner = Some(winner);
        state.timer_running = false;
    } else {
        state.scores = PerSide::default();
        state.current_set += 1;
    }
    state.serving = None;
    state.timeouts = PerSide::default();
    state.in_sudden_death = false;
    state.pending_side_switch = false;
    state.undo.close_set(entry, before);
    state.last_scorer = Some(winner);
}

/// Takes one point back without any win check or rotation. Not undoable.
pub fn subtract_point(state: &mut GameState, side: Side) -> Result<(), Rejection> {
    if state.match_winner.is_some() {
        return Err(Rejection::MatchOver);
    }
    let score = state.scores.get_mut(side);
    if *score == 0 {
        return Err(Rejection::ScoreAtZero);
    }
    *score -= 1;
    state.pending_side_switch = false;
    Ok(())
}

pub fn request_timeout(state: &mut GameState, side: Side) -> Result<(), Rejection> {
    if state.timeouts.value(side) >= state.config.timeouts_per_set {
        return Err(Rejection::TimeoutsExhausted { side });
    }
    let prev_timeouts = state.timeouts;
    *state.timeouts.get_mut(side) += 1;
    state.undo.record(LogEntry::Timeout { side, prev_timeouts });
    Ok(())
}

pub fn set_server(state: &mut GameState, side: Side) {
    state.serving = Some(side);
}

pub fn toggle_sides(state: &mut GameState) {
    state.swapped_sides = !state.swapped_sides;
    state.pending_side_switch = false;
}

/// Turns the displayed rotation of a court team one step; the serve order
/// itself is left alone.
pub fn manual_rotation(state: &mut GameState, side: Side, direction: RotationDirection) {
    let team = state.roster.side_mut(side);
    team.tactical_offset = shift_offset(team.tactical_offset, team.players.len(), direction);
    state.undo.record(LogEntry::ManualRotation { side, direction });
}
