//! Undo history.
//!
//! Routine actions push an inverse delta onto a per-set log. Set and match
//! boundaries instead keep a full copy of the state from just before the
//! set ended, which the next undo restores wholesale.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::mem;

use crate::error::Rejection;
use crate::game::GameState;
use crate::roster::Roster;
use crate::scoring::{rotate_counter_clockwise, shift_offset};
use crate::types::*;

/// Roster and rotation preview as they were before a rotation was applied
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterSnapshot {
    pub roster: Roster,
    pub rotation_report: Option<RotationReport>,
}

/// One reversible action
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum LogEntry {
    Point {
        side: Side,
        prev_scores: PerSide<u16>,
        prev_server: Option<Side>,
        prev_sudden_death: bool,
        prev_swapped_sides: bool,
        prev_pending_side_switch: bool,
        /// The point was a side-out and rotated the scoring team
        side_out: bool,
        /// Tactical offset of the scoring team before a side-out reset it
        prev_offset: usize,
        #[serde(default)]
        scorer: Option<PlayerId>,
        #[serde(default)]
        skill: Option<SkillKind>,
    },
    Timeout {
        side: Side,
        prev_timeouts: PerSide<u8>,
    },
    Rotation {
        snapshot: Box<RosterSnapshot>,
    },
    ManualRotation {
        side: Side,
        direction: RotationDirection,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UndoLog {
    /// Reversible entries of the current set, newest last
    entries: Vec<LogEntry>,
    /// Everything logged this match, for reporting
    match_log: Vec<LogEntry>,
    /// Full state from just before the last set ended
    #[serde(skip_serializing_if = "Option::is_none")]
    boundary: Option<Box<GameState>>,
}

impl UndoLog {
    pub fn record(&mut self, entry: LogEntry) {
        self.boundary = None;
        self.match_log.push(entry.clone());
        self.entries.push(entry);
    }

    /// Closes the current set: entries are dropped and the pre-set-end state
    /// becomes the only thing undo can return to.
    pub fn close_set(&mut self, final_entry: LogEntry, mut before: GameState) {
        before.undo.boundary = None;
        self.entries.clear();
        self.match_log.push(final_entry);
        self.boundary = Some(Box::new(before));
    }

    pub fn clear(&mut self) {
        *self = UndoLog::default();
    }

    /// Starts a fresh match whose only reversible step is `entry`.
    pub fn start_with(&mut self, entry: LogEntry) {
        self.clear();
        self.record(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn match_log(&self) -> &[LogEntry] {
        &self.match_log
    }

    /// State that the next undo would restore wholesale, if any.
    pub fn boundary(&self) -> Option<&GameState> {
        self.boundary.as_deref()
    }

    pub fn has_boundary(&self) -> bool {
        self.boundary.is_some()
    }

    pub fn can_undo(&self) -> bool {
        self.boundary.is_some() || !self.entries.is_empty()
    }

    /// Side that scored the latest point still in the match log.
    pub fn last_scorer(&self) -> Option<Side> {
        self.match_log.iter().rev().find_map(|e| match e {
            LogEntry::Point { side, .. } => Some(*side),
            _ => None,
        })
    }

    fn pop(&mut self) -> Option<LogEntry> {
        let entry = self.entries.pop()?;
        if self
            .match_log
            .last()
            .is_some_and(|last| mem::discriminant(last) == mem::discriminant(&entry))
        {
            self.match_log.pop();
        }
        Some(entry)
    }
}

/// Reverses the most recent undoable action.
pub fn undo(state: &mut GameState) -> Result<(), Rejection> {
    if let Some(before) = state.undo.boundary.take() {
        info!("Undo returns to set {} before it ended", before.current_set);
        *state = *before;
        return Ok(());
    }

    let entry = state.undo.pop().ok_or(Rejection::NothingToUndo)?;
    match entry {
        LogEntry::Point {
            side,
            prev_scores,
            prev_server,
            prev_sudden_death,
            prev_swapped_sides,
            prev_pending_side_switch,
            side_out,
            prev_offset,
            ..
        } => {
            state.scores = prev_scores;
            state.serving = prev_server;
            state.in_sudden_death = prev_sudden_death;
            state.swapped_sides = prev_swapped_sides;
            state.pending_side_switch = prev_pending_side_switch;
            if side_out {
                let team = state.roster.side_mut(side);
                rotate_counter_clockwise(&mut team.players);
                team.tactical_offset = prev_offset;
            }
            debug!("Undo point for {:?}", side);
        }
        LogEntry::Timeout { prev_timeouts, .. } => {
            state.timeouts = prev_timeouts;
        }
        LogEntry::Rotation { snapshot } => {
            let RosterSnapshot { roster, rotation_report } = *snapshot;
            state.roster = roster;
            state.rotation_report = rotation_report;
            debug!("Undo rotation");
        }
        LogEntry::ManualRotation { side, direction } => {
            let team = state.roster.side_mut(side);
            let reverse = match direction {
                RotationDirection::Clockwise => RotationDirection::Counter,
                RotationDirection::Counter => RotationDirection::Clockwise,
            };
            team.tactical_offset = shift_offset(team.tactical_offset, team.players.len(), reverse);
        }
    }
    state.last_scorer = state.undo.last_scorer();
    Ok(())
}
