//! Courts, queue and the player/team operations on them.
//!
//! Every operation takes `&self` and returns a new roster, so a refused
//! operation never leaves a half-applied change behind.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

use crate::config::Capacity;
use crate::error::Rejection;
use crate::types::*;

pub const KNOCKED_OUT_TEAM_NAME: &str = "Knocked Out";

/// The two court teams and the ordered waiting queue
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Roster {
    pub court_a: Team,
    pub court_b: Team,
    pub queue: VecDeque<Team>,
}

/// Field edits for an existing player; `None` leaves a field unchanged
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerUpdate {
    pub name: Option<String>,
    /// `Some("")` clears the number
    pub number: Option<String>,
    pub skill: Option<u8>,
    pub role: Option<PlayerRole>,
    pub is_fixed: Option<bool>,
}

/// One line of a pasted player list
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedLine {
    pub name: String,
    pub number: Option<String>,
    pub skill: u8,
}

/// Parses `"[number] name [skill|number]"`.
///
/// A trailing number up to 10 is read as a skill level, a larger one as a
/// jersey number. Blank lines yield `None`.
pub fn parse_roster_line(line: &str) -> Option<ParsedLine> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }
    let numeric = |t: &str| t.parse::<u32>().ok();

    let mut parsed = ParsedLine {
        name: tokens.join(" "),
        number: None,
        skill: DEFAULT_SKILL,
    };
    if tokens.len() < 2 {
        return Some(parsed);
    }

    let first = numeric(tokens[0]);
    let last = numeric(tokens[tokens.len() - 1]);
    match (first, last) {
        (Some(_), Some(skill)) if tokens.len() > 2 => {
            parsed.number = Some(tokens[0].to_string());
            parsed.skill = clamp_skill(skill.min(u8::MAX as u32) as u8);
            parsed.name = tokens[1..tokens.len() - 1].join(" ");
        }
        (Some(_), _) => {
            parsed.number = Some(tokens[0].to_string());
            parsed.name = tokens[1..].join(" ");
        }
        (None, Some(value)) => {
            if value <= MAX_SKILL as u32 {
                parsed.skill = clamp_skill(value as u8);
            } else {
                parsed.number = Some(tokens[tokens.len() - 1].to_string());
            }
            parsed.name = tokens[..tokens.len() - 1].join(" ");
        }
        (None, None) => {}
    }
    Some(parsed)
}

impl Roster {
    pub fn new(court_a: Team, court_b: Team) -> Self {
        Self {
            court_a,
            court_b,
            queue: VecDeque::new(),
        }
    }

    pub fn side(&self, side: Side) -> &Team {
        match side {
            Side::A => &self.court_a,
            Side::B => &self.court_b,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut Team {
        match side {
            Side::A => &mut self.court_a,
            Side::B => &mut self.court_b,
        }
    }

    /// Court A, court B, then the queue in order.
    pub fn teams(&self) -> impl Iterator<Item = &Team> {
        [&self.court_a, &self.court_b]
            .into_iter()
            .chain(self.queue.iter())
    }

    pub fn teams_mut(&mut self) -> impl Iterator<Item = &mut Team> {
        [&mut self.court_a, &mut self.court_b]
            .into_iter()
            .chain(self.queue.iter_mut())
    }

    pub fn team(&self, team: &TeamRef) -> Option<&Team> {
        match team {
            TeamRef::A => Some(&self.court_a),
            TeamRef::B => Some(&self.court_b),
            TeamRef::Queued(key) => self.teams().find(|t| t.id == *key),
        }
    }

    pub fn team_mut(&mut self, team: &TeamRef) -> Option<&mut Team> {
        match team {
            TeamRef::A => Some(&mut self.court_a),
            TeamRef::B => Some(&mut self.court_b),
            TeamRef::Queued(key) => self.teams_mut().find(|t| t.id == *key),
        }
    }

    fn team_or_reject(&mut self, team: &TeamRef) -> Result<&mut Team, Rejection> {
        self.team_mut(team)
            .ok_or(Rejection::TeamNotFound { team: *team })
    }

    pub fn player_count(&self) -> usize {
        self.teams().map(|t| t.players.len() + t.reserves.len()).sum()
    }

    pub fn all_players(&self) -> impl Iterator<Item = &Player> {
        self.teams().flat_map(|t| t.members())
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.all_players().find(|p| p.id == id)
    }

    /// Finds the list holding `id` and the player's index in it.
    pub fn find_player(&self, id: PlayerId) -> Option<(Location, usize)> {
        let team_refs = [TeamRef::A, TeamRef::B]
            .into_iter()
            .chain(self.queue.iter().map(|t| TeamRef::Queued(t.id)));
        for (team_ref, team) in team_refs.zip(self.teams()) {
            if let Some(i) = team.players.iter().position(|p| p.id == id) {
                return Some((Location::Court { team: team_ref }, i));
            }
            if let Some(i) = team.reserves.iter().position(|p| p.id == id) {
                return Some((Location::Bench { team: team_ref }, i));
            }
        }
        None
    }

    fn list_mut(&mut self, location: &Location) -> Option<&mut Vec<Player>> {
        match location {
            Location::Court { team } => self.team_mut(team).map(|t| &mut t.players),
            Location::Bench { team } => self.team_mut(team).map(|t| &mut t.reserves),
            Location::QueueTail => self.queue.back_mut().map(|t| &mut t.players),
        }
    }

    fn take_player(&mut self, id: PlayerId) -> Option<(Player, Location, usize)> {
        let (location, index) = self.find_player(id)?;
        let player = self.list_mut(&location)?.remove(index);
        Some((player, location, index))
    }

    /// Next free "Team N" name, one past the highest N in use.
    pub fn next_team_name(&self) -> String {
        let highest = self
            .teams()
            .filter_map(|t| {
                let mut words = t.name.split_whitespace();
                match (words.next(), words.next(), words.next()) {
                    (Some(prefix), Some(n), None) if prefix.eq_ignore_ascii_case("team") => {
                        n.parse::<usize>().ok()
                    }
                    _ => None,
                }
            })
            .max()
            .unwrap_or(0);
        format!("Team {}", highest.max(2) + 1)
    }

    /// Appends `player` to the last queued team if it has room, otherwise
    /// opens a new team named `new_team_name` at the tail.
    fn place_at_queue_tail(
        &mut self,
        player: Player,
        court_capacity: usize,
        ids: &mut IdSource,
        new_team_name: &str,
    ) -> TeamKey {
        if let Some(last) = self.queue.back_mut() {
            if last.players.len() < court_capacity && last.check_number(player.jersey(), None).is_ok() {
                last.players.push(player);
                return last.id;
            }
        }
        let team = Team::new(ids.team_key(), new_team_name, vec![player]);
        let key = team.id;
        debug!("Opened queued team {} ({})", team.name, key);
        self.queue.push_back(team);
        key
    }

    /// Adds a new player at `target`.
    ///
    /// A full court list spills onto an active bench with room.
    pub fn add_player(
        &self,
        player: Player,
        target: &Location,
        capacity: Capacity,
        ids: &mut IdSource,
    ) -> Result<Roster, Rejection> {
        if self.player(player.id).is_some() {
            return Err(Rejection::DuplicatePlayer { player: player.id });
        }
        let mut next = self.clone();
        match target {
            Location::Court { team } => {
                let dest = next.team_or_reject(team)?;
                dest.check_number(player.jersey(), None)?;
                if dest.players.len() < capacity.court {
                    dest.players.push(player);
                } else if !dest.has_active_bench {
                    return Err(Rejection::RosterFull { capacity: capacity.court });
                } else if dest.reserves.len() < capacity.bench {
                    dest.reserves.push(player);
                } else {
                    return Err(Rejection::BenchFull { capacity: capacity.bench });
                }
            }
            Location::Bench { team } => {
                let dest = next.team_or_reject(team)?;
                dest.check_number(player.jersey(), None)?;
                if dest.reserves.len() >= capacity.bench {
                    return Err(Rejection::BenchFull { capacity: capacity.bench });
                }
                dest.reserves.push(player);
                dest.has_active_bench = true;
            }
            Location::QueueTail => {
                let name = next.next_team_name();
                next.place_at_queue_tail(player, capacity.court, ids, &name);
            }
        }
        Ok(next)
    }

    /// Takes a player out of play.
    ///
    /// Court players drop to their own bench when it has room (court teams
    /// always, queued teams only with an active bench); anyone else goes to
    /// the back of the queue.
    pub fn knock_out(&self, id: PlayerId, capacity: Capacity, ids: &mut IdSource) -> Result<Roster, Rejection> {
        let mut next = self.clone();
        let (player, origin, _) = next
            .take_player(id)
            .ok_or(Rejection::PlayerNotFound { player: id })?;

        if let Location::Court { team } = &origin {
            if let Some(home) = next.team_mut(team) {
                let eligible = !matches!(team, TeamRef::Queued(_)) || home.has_active_bench;
                if eligible && home.reserves.len() < capacity.bench {
                    home.reserves.push(player);
                    home.has_active_bench = true;
                    return Ok(next);
                }
            }
        }

        next.place_at_queue_tail(player, capacity.court, ids, KNOCKED_OUT_TEAM_NAME);
        Ok(next)
    }

    /// Removes a player, returning the record needed to restore it.
    pub fn delete_player(&self, id: PlayerId) -> Result<(Roster, DeletedPlayerRecord), Rejection> {
        let mut next = self.clone();
        let (player, origin, index) = next
            .take_player(id)
            .ok_or(Rejection::PlayerNotFound { player: id })?;
        Ok((next, DeletedPlayerRecord { player, origin, index }))
    }

    /// Puts a deleted player back where it came from, or at the queue tail
    /// when that spot is gone, full or now holds its number.
    pub fn restore_deleted(
        &self,
        record: &DeletedPlayerRecord,
        capacity: Capacity,
        ids: &mut IdSource,
    ) -> Result<Roster, Rejection> {
        let player = record.player.clone();
        if self.player(player.id).is_some() {
            return Err(Rejection::DuplicatePlayer { player: player.id });
        }
        let mut next = self.clone();

        let (team_ref, on_bench) = match record.origin {
            Location::Court { team } => (Some(team), false),
            Location::Bench { team } => (Some(team), true),
            Location::QueueTail => (None, false),
        };
        let home = match team_ref {
            Some(team) => next.team_mut(&team),
            None => None,
        };
        if let Some(home) = home {
            let room = if on_bench {
                home.reserves.len() < capacity.bench
            } else {
                home.players.len() < capacity.court
            };
            if room && home.check_number(player.jersey(), None).is_ok() {
                let list = if on_bench { &mut home.reserves } else { &mut home.players };
                list.insert(record.index.min(list.len()), player);
                if on_bench {
                    home.has_active_bench = true;
                }
                return Ok(next);
            }
        }

        let name = next.next_team_name();
        next.place_at_queue_tail(player, capacity.court, ids, &name);
        Ok(next)
    }

    /// Moves a player from `from` to `to`, optionally at `index`.
    ///
    /// Moving onto a court list resets that team's tactical offset; moving
    /// onto a bench activates it.
    pub fn move_player(
        &self,
        id: PlayerId,
        from: &Location,
        to: &Location,
        index: Option<usize>,
        capacity: Capacity,
        ids: &mut IdSource,
    ) -> Result<Roster, Rejection> {
        let mut next = self.clone();
        let source = next
            .list_mut(from)
            .ok_or(Rejection::PlayerNotFound { player: id })?;
        let at = source
            .iter()
            .position(|p| p.id == id)
            .ok_or(Rejection::PlayerNotFound { player: id })?;
        let player = source.remove(at);

        match to {
            Location::Court { team } | Location::Bench { team } => {
                let on_bench = matches!(to, Location::Bench { .. });
                let dest = next.team_or_reject(team)?;
                if on_bench && dest.reserves.len() >= capacity.bench {
                    return Err(Rejection::BenchFull { capacity: capacity.bench });
                }
                if !on_bench && dest.players.len() >= capacity.court {
                    return Err(Rejection::RosterFull { capacity: capacity.court });
                }
                dest.check_number(player.jersey(), None)?;
                if on_bench {
                    dest.has_active_bench = true;
                } else {
                    dest.tactical_offset = 0;
                }
                let list = if on_bench { &mut dest.reserves } else { &mut dest.players };
                let index = index.unwrap_or(list.len()).min(list.len());
                list.insert(index, player);
            }
            Location::QueueTail => {
                let name = next.next_team_name();
                next.place_at_queue_tail(player, capacity.court, ids, &name);
            }
        }
        Ok(next)
    }

    /// Swaps an on-court player with a bench player of the same team, in place.
    pub fn substitute(&self, team: &TeamRef, out: PlayerId, incoming: PlayerId) -> Result<Roster, Rejection> {
        let mut next = self.clone();
        let t = next.team_or_reject(team)?;
        let out_at = t
            .players
            .iter()
            .position(|p| p.id == out)
            .ok_or(Rejection::PlayerNotFound { player: out })?;
        let in_at = t
            .reserves
            .iter()
            .position(|p| p.id == incoming)
            .ok_or(Rejection::PlayerNotFound { player: incoming })?;
        std::mem::swap(&mut t.players[out_at], &mut t.reserves[in_at]);
        Ok(next)
    }

    pub fn update_player(&self, id: PlayerId, update: &PlayerUpdate) -> Result<Roster, Rejection> {
        let mut next = self.clone();
        let (location, index) = self
            .find_player(id)
            .ok_or(Rejection::PlayerNotFound { player: id })?;
        let team = match location {
            Location::Court { team } | Location::Bench { team } => team,
            Location::QueueTail => return Err(Rejection::PlayerNotFound { player: id }),
        };

        if let Some(number) = &update.number {
            let number = normalize_number(Some(number));
            next.team_or_reject(&team)?.check_number(number.as_deref(), Some(id))?;
        }

        let player = next
            .list_mut(&location)
            .and_then(|list| list.get_mut(index))
            .ok_or(Rejection::PlayerNotFound { player: id })?;
        if let Some(name) = &update.name {
            let name = sanitize_name(name);
            if !name.is_empty() {
                player.name = name;
            }
        }
        if let Some(number) = &update.number {
            player.number = normalize_number(Some(number));
        }
        if let Some(skill) = update.skill {
            player.skill = clamp_skill(skill);
        }
        if let Some(role) = update.role {
            player.role = role;
        }
        if let Some(is_fixed) = update.is_fixed {
            player.is_fixed = is_fixed;
        }
        Ok(next)
    }

    pub fn toggle_fixed(&self, id: PlayerId) -> Result<Roster, Rejection> {
        let fixed = self
            .player(id)
            .map(|p| p.is_fixed)
            .ok_or(Rejection::PlayerNotFound { player: id })?;
        self.update_player(
            id,
            &PlayerUpdate {
                is_fixed: Some(!fixed),
                ..PlayerUpdate::default()
            },
        )
    }

    pub fn toggle_bench(&self, team: &TeamRef) -> Result<Roster, Rejection> {
        let mut next = self.clone();
        let t = next.team_or_reject(team)?;
        t.has_active_bench = !t.has_active_bench;
        Ok(next)
    }

    /// Swaps two on-court positions of one team.
    pub fn swap_positions(&self, team: &TeamRef, first: usize, second: usize) -> Result<Roster, Rejection> {
        let mut next = self.clone();
        let t = next.team_or_reject(team)?;
        let len = t.players.len();
        if first >= len || second >= len {
            warn!("Position swap {}/{} out of range for {} players", first, second, len);
            return Err(Rejection::QueueIndexOutOfRange {
                index: first.max(second),
                len,
            });
        }
        t.players.swap(first, second);
        t.tactical_offset = 0;
        Ok(next)
    }

    pub fn rename_team(&self, team: &TeamRef, name: &str) -> Result<Roster, Rejection> {
        let mut next = self.clone();
        let t = next.team_or_reject(team)?;
        let name = sanitize_name(name);
        if !name.is_empty() {
            t.name = name;
        }
        Ok(next)
    }

    pub fn set_team_color(&self, team: &TeamRef, color: &str) -> Result<Roster, Rejection> {
        let mut next = self.clone();
        next.team_or_reject(team)?.color = color.trim().to_string();
        Ok(next)
    }

    pub fn set_team_logo(&self, team: &TeamRef, logo: Option<String>) -> Result<Roster, Rejection> {
        let mut next = self.clone();
        next.team_or_reject(team)?.logo = logo.filter(|l| !l.trim().is_empty());
        Ok(next)
    }

    pub fn reorder_queue(&self, from: usize, to: usize) -> Result<Roster, Rejection> {
        let len = self.queue.len();
        if from >= len || to >= len {
            return Err(Rejection::QueueIndexOutOfRange {
                index: from.max(to),
                len,
            });
        }
        let mut next = self.clone();
        if let Some(team) = next.queue.remove(from) {
            next.queue.insert(to, team);
        }
        Ok(next)
    }

    /// Removes a queued team, returning it with its former queue index.
    pub fn disband_team(&self, key: TeamKey) -> Result<(Roster, Team, usize), Rejection> {
        let index = self
            .queue
            .iter()
            .position(|t| t.id == key)
            .ok_or(Rejection::TeamNotFound { team: TeamRef::Queued(key) })?;
        let mut next = self.clone();
        let team = next
            .queue
            .remove(index)
            .ok_or(Rejection::TeamNotFound { team: TeamRef::Queued(key) })?;
        Ok((next, team, index))
    }

    /// Reinserts a disbanded team. Rejected if any of its players is back
    /// on a roster in the meantime, or if the team itself breaks capacity
    /// or number rules.
    pub fn restore_team(&self, team: Team, index: usize, capacity: Capacity) -> Result<Roster, Rejection> {
        if team.players.len() > capacity.court {
            return Err(Rejection::RosterFull { capacity: capacity.court });
        }
        if team.reserves.len() > capacity.bench {
            return Err(Rejection::BenchFull { capacity: capacity.bench });
        }
        let mut worn: HashMap<&str, &Player> = HashMap::new();
        for player in team.members() {
            let Some(number) = player.jersey() else { continue };
            if let Some(first) = worn.insert(number, player) {
                return Err(Rejection::NumberConflict {
                    number: number.to_string(),
                    conflict_id: first.id,
                    conflict_name: first.name.clone(),
                });
            }
        }
        if let Some(dup) = team.members().find(|p| self.player(p.id).is_some()) {
            return Err(Rejection::DuplicatePlayer { player: dup.id });
        }
        if self.teams().any(|t| t.id == team.id) {
            warn!("Team {} is already in the roster", team.id);
            return Err(Rejection::DuplicateTeam { team: team.id });
        }
        let mut next = self.clone();
        let index = index.min(next.queue.len());
        next.queue.insert(index, team);
        Ok(next)
    }

    /// Empties both courts, their benches and the queue, keeping court identities.
    pub fn cleared(&self) -> Roster {
        let mut next = self.clone();
        for side in [Side::A, Side::B] {
            let team = next.side_mut(side);
            team.players.clear();
            team.reserves.clear();
            team.has_active_bench = false;
            team.tactical_offset = 0;
        }
        next.queue.clear();
        next
    }

    /// Checks the roster invariants: unique ids, unique numbers within a
    /// team, and court/bench sizes within `capacity`.
    pub fn verify(&self, capacity: Capacity) -> Result<(), String> {
        let mut seen = HashSet::new();
        for team in self.teams() {
            if team.players.len() > capacity.court {
                return Err(format!(
                    "team {} has {} players on court (max {})",
                    team.name,
                    team.players.len(),
                    capacity.court
                ));
            }
            if team.reserves.len() > capacity.bench {
                return Err(format!(
                    "team {} has {} reserves (max {})",
                    team.name,
                    team.reserves.len(),
                    capacity.bench
                ));
            }
            let mut numbers = HashSet::new();
            for player in team.members() {
                if !seen.insert(player.id) {
                    return Err(format!("player {} appears more than once", player.id));
                }
                if let Some(n) = player.jersey() {
                    if !numbers.insert(n) {
                        return Err(format!("number {} used twice in team {}", n, team.name));
                    }
                }
            }
        }
        Ok(())
    }
}
