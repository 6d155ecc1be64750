//! Winner-stays rotation: the loser joins the back of the queue and the
//! head of the queue comes on, topped up with players from other queued teams.

use log::{debug, info};
use std::collections::VecDeque;

use crate::config::RotationMode;
use crate::roster::Roster;
use crate::types::{average_skill, total_skill, Player, PlayerId, RotationReport, Side, Team};

/// New incoming team and queue after one rotation
#[derive(Clone, Debug, PartialEq)]
pub struct RotationOutcome {
    pub incoming: Team,
    pub queue: VecDeque<Team>,
    pub report: RotationReport,
}

/// Loser to the tail, head comes off. The queue is never empty afterwards
/// because the loser itself is in it.
fn promote(loser: &Team, queue: &VecDeque<Team>) -> (Team, VecDeque<Team>) {
    let mut queue = queue.clone();
    queue.push_back(loser.clone());
    let incoming = queue.pop_front().unwrap_or_else(|| loser.clone());
    (incoming, queue)
}

fn finish(
    loser: &Team,
    base: &Team,
    mut incoming: Team,
    mut queue: VecDeque<Team>,
    stolen: Vec<Player>,
    mut logs: Vec<String>,
) -> RotationOutcome {
    let before = queue.len();
    queue.retain(|t| !t.is_empty());
    if queue.len() < before {
        logs.push(format!("Disbanded {} empty team(s)", before - queue.len()));
    }
    for cleared in incoming.resolve_number_conflicts() {
        debug!("Cleared clashing number of {} on {}", cleared, incoming.name);
    }
    incoming.tactical_offset = 0;

    let report = RotationReport {
        outgoing: loser.clone(),
        incoming: incoming.clone(),
        retained: base.players.iter().filter(|p| p.is_fixed).cloned().collect(),
        stolen,
        queue_after: queue.iter().cloned().collect(),
        logs,
    };
    RotationOutcome { incoming, queue, report }
}

/// Fills the incoming team by taking non-fixed players from the back of each
/// queued team, head of the queue first.
pub fn rotate_standard(loser: &Team, queue: &VecDeque<Team>, capacity: usize) -> RotationOutcome {
    let (base, mut queue) = promote(loser, queue);
    let mut incoming = base.clone();
    let mut logs = vec![format!("{} leaves the court, {} comes on", loser.name, base.name)];
    let mut stolen = Vec::new();

    let mut needed = capacity.saturating_sub(incoming.players.len());
    if needed > 0 {
        logs.push(format!("{} short by {}", incoming.name, needed));
    }
    for donor in queue.iter_mut() {
        let mut i = donor.players.len();
        while needed > 0 && i > 0 {
            i -= 1;
            if donor.players[i].is_fixed {
                continue;
            }
            let player = donor.players.remove(i);
            logs.push(format!("Took {} from {}", player.name, donor.name));
            stolen.push(player.clone());
            incoming.players.push(player);
            needed -= 1;
        }
        if needed == 0 {
            break;
        }
    }
    if needed > 0 {
        logs.push(format!("Queue exhausted, {} still short by {}", incoming.name, needed));
    }

    finish(loser, &base, incoming, queue, stolen, logs)
}

/// Fills the incoming team with the queued players whose arrival keeps the
/// team average closest to the winner's average.
///
/// Candidates are ranked once against the incoming team as it stands before
/// any player is taken; ties keep queue order.
pub fn rotate_balanced(winner: &Team, loser: &Team, queue: &VecDeque<Team>, capacity: usize) -> RotationOutcome {
    let (base, mut queue) = promote(loser, queue);
    let mut incoming = base.clone();
    let target = average_skill(&winner.players);
    let mut logs = vec![
        format!("{} leaves the court, {} comes on", loser.name, base.name),
        format!("Balancing against {} average of {:.2}", winner.name, target),
    ];

    let needed = capacity.saturating_sub(incoming.players.len());
    let base_total = total_skill(&incoming.players) as f64;
    let base_len = incoming.players.len() as f64;

    let mut candidates: Vec<(PlayerId, f64)> = queue
        .iter()
        .flat_map(|t| t.players.iter())
        .filter(|p| !p.is_fixed)
        .map(|p| {
            let projected = (base_total + p.skill as f64) / (base_len + 1.0);
            (p.id, (projected - target).abs())
        })
        .collect();
    candidates.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut stolen = Vec::new();
    for (id, diff) in candidates.into_iter().take(needed) {
        for donor in queue.iter_mut() {
            if let Some(i) = donor.players.iter().position(|p| p.id == id) {
                let player = donor.players.remove(i);
                logs.push(format!("Took {} ({}) from {}, off by {:.2}", player.name, player.skill, donor.name, diff));
                stolen.push(player.clone());
                incoming.players.push(player);
                break;
            }
        }
    }
    if incoming.players.len() < capacity {
        logs.push(format!(
            "Queue exhausted, {} still short by {}",
            incoming.name,
            capacity - incoming.players.len()
        ));
    }

    finish(loser, &base, incoming, queue, stolen, logs)
}

/// Applies a rotation after `winner` took the match.
///
/// Returns `None` when there is nobody to rotate in: the queue is empty and
/// both courts are full.
pub fn handle_rotate(roster: &Roster, winner: Side, mode: RotationMode, capacity: usize) -> Option<(Roster, RotationReport)> {
    if roster.queue.is_empty()
        && roster.court_a.players.len() >= capacity
        && roster.court_b.players.len() >= capacity
    {
        debug!("Rotation skipped: queue empty and both courts full");
        return None;
    }

    let winning_team = roster.side(winner);
    let losing_team = roster.side(winner.opponent());
    let outcome = match mode {
        RotationMode::Standard => rotate_standard(losing_team, &roster.queue, capacity),
        RotationMode::Balanced => rotate_balanced(winning_team, losing_team, &roster.queue, capacity),
    };
    info!(
        "Rotation: {} out, {} in ({} stolen)",
        outcome.report.outgoing.name,
        outcome.incoming.name,
        outcome.report.stolen.len()
    );

    let mut next = roster.clone();
    *next.side_mut(winner.opponent()) = outcome.incoming;
    next.queue = outcome.queue;
    Some((next, outcome.report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::tests::{player, team_of};
    use crate::types::IdSource;

    fn create_test_roster(ids: &mut IdSource) -> Roster {
        let mut winner = team_of(ids, "Winners", 6, 5);
        winner.reserves.push(player(ids, "Sub", 50, 5));
        winner.has_active_bench = true;
        let mut loser = team_of(ids, "Losers", 6, 5);
        loser.players[0].is_fixed = true;
        loser.players[3].is_fixed = true;
        Roster::new(winner, loser)
    }

    #[test]
    fn test_empty_queue_loser_comes_back() {
        let mut ids = IdSource::new(21);
        let roster = create_test_roster(&mut ids);
        let outcome = rotate_standard(&roster.court_b, &roster.queue, 6);
        assert_eq!(outcome.incoming, roster.court_b);
        assert!(outcome.queue.is_empty());
        assert!(outcome.report.stolen.is_empty());
        assert_eq!(outcome.report.retained.len(), 2);
    }

    #[test]
    fn test_full_courts_empty_queue_is_noop() {
        let mut ids = IdSource::new(22);
        let roster = create_test_roster(&mut ids);
        assert!(handle_rotate(&roster, Side::A, RotationMode::Standard, 6).is_none());
    }

    #[test]
    fn test_standard_steals_from_donor_tail() {
        let mut ids = IdSource::new(23);
        let winner = team_of(&mut ids, "Winners", 6, 5);
        let loser = team_of(&mut ids, "Losers", 6, 5);
        let short = team_of(&mut ids, "Short", 4, 5);
        let donor = team_of(&mut ids, "Donor", 6, 5);
        let mut roster = Roster::new(winner, loser);
        roster.queue.push_back(short.clone());
        roster.queue.push_back(donor.clone());

        let (next, report) = handle_rotate(&roster, Side::A, RotationMode::Standard, 6).unwrap();
        assert_eq!(next.court_b.id, short.id);
        assert_eq!(next.court_b.players.len(), 6);
        let stolen: Vec<PlayerId> = report.stolen.iter().map(|p| p.id).collect();
        assert_eq!(stolen, vec![donor.players[5].id, donor.players[4].id]);

        // donor keeps its first four, loser waits behind it
        assert_eq!(next.queue.len(), 2);
        assert_eq!(next.queue[0].players.len(), 4);
        assert_eq!(next.queue[0].players, donor.players[..4].to_vec());
        assert_eq!(next.queue[1].id, roster.court_b.id);
        assert_eq!(next.player_count(), roster.player_count());
        assert_eq!(next.court_a, roster.court_a);
    }

    #[test]
    fn test_standard_skips_fixed_donors() {
        let mut ids = IdSource::new(24);
        let winner = team_of(&mut ids, "Winners", 6, 5);
        let loser = team_of(&mut ids, "Losers", 6, 5);
        let short = team_of(&mut ids, "Short", 5, 5);
        let mut donor = team_of(&mut ids, "Donor", 3, 5);
        donor.players[2].is_fixed = true;
        let mut roster = Roster::new(winner, loser);
        roster.queue.push_back(short);
        roster.queue.push_back(donor.clone());

        let outcome = rotate_standard(&roster.court_b, &roster.queue, 6);
        assert_eq!(outcome.report.stolen[0].id, donor.players[1].id);
    }

    #[test]
    fn test_emptied_donor_is_disbanded() {
        let mut ids = IdSource::new(25);
        let winner = team_of(&mut ids, "Winners", 6, 5);
        let loser = team_of(&mut ids, "Losers", 6, 5);
        let short = team_of(&mut ids, "Short", 4, 5);
        let donor = team_of(&mut ids, "Donor", 2, 5);
        let mut roster = Roster::new(winner, loser);
        roster.queue.push_back(short);
        roster.queue.push_back(donor);

        let (next, report) = handle_rotate(&roster, Side::A, RotationMode::Standard, 6).unwrap();
        assert_eq!(next.queue.len(), 1);
        assert_eq!(next.queue[0].name, "Losers");
        assert_eq!(report.queue_after.len(), 1);
        assert!(report.logs.iter().any(|l| l.starts_with("Disbanded")));
    }

    #[test]
    fn test_balanced_beats_untargeted_pick() {
        let mut ids = IdSource::new(26);
        let winner = team_of(&mut ids, "Winners", 6, 7);
        let loser = team_of(&mut ids, "Losers", 6, 4);
        let short = team_of(&mut ids, "Short", 4, 7);
        let donor = Team::new(
            ids.team_key(),
            "Donor",
            [1, 2, 3, 7, 9, 10]
                .iter()
                .enumerate()
                .map(|(i, &s)| player(&mut ids, &format!("D{}", i), i, s))
                .collect(),
        );
        let mut queue = VecDeque::new();
        queue.push_back(short);
        queue.push_back(donor);

        let balanced = rotate_balanced(&winner, &loser, &queue, 6);
        let standard = rotate_standard(&loser, &queue, 6);
        let target = winner.average_skill();
        let off_balanced = (balanced.incoming.average_skill() - target).abs();
        let off_standard = (standard.incoming.average_skill() - target).abs();

        assert_eq!(balanced.incoming.players.len(), 6);
        assert!(off_balanced <= off_standard);
        let skills: Vec<u8> = balanced.report.stolen.iter().map(|p| p.skill).collect();
        assert_eq!(skills, vec![7, 9]);
    }

    #[test]
    fn test_winner_untouched_and_loser_replaced() {
        let mut ids = IdSource::new(27);
        let mut roster = create_test_roster(&mut ids);
        let waiting = team_of(&mut ids, "Waiting", 6, 5);
        roster.queue.push_back(waiting.clone());

        let (next, report) = handle_rotate(&roster, Side::A, RotationMode::Balanced, 6).unwrap();
        assert_eq!(next.court_a, roster.court_a);
        assert_eq!(next.court_b.id, waiting.id);
        assert_eq!(report.outgoing.id, roster.court_b.id);
        // the loser waits intact, fixed players included
        assert_eq!(next.queue[0], roster.court_b);
    }
}
