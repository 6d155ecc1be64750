//! Partitioning a flat player pool into court and queue teams.

use log::{debug, info};
use std::collections::{HashSet, VecDeque};

use crate::roster::Roster;
use crate::types::{IdSource, Player, PlayerId, Team};

/// A freshly balanced roster plus the human-readable trail of decisions
#[derive(Clone, Debug, PartialEq)]
pub struct Distribution {
    pub roster: Roster,
    pub logs: Vec<String>,
}

/// Number of buckets needed for `players` at `capacity`, never fewer than
/// the two courts or the current number of teams.
fn bucket_count(players: usize, capacity: usize, existing_teams: usize) -> usize {
    players.div_ceil(capacity).max(2).max(existing_teams)
}

/// Pins every fixed pool player to the team whose court list holds it now.
///
/// Returns one bucket per existing team and the pool minus pinned players.
fn pin_fixed(pool: &[Player], current: &Roster) -> (Vec<Vec<Player>>, Vec<Player>) {
    let fixed_in_pool: HashSet<PlayerId> = pool.iter().filter(|p| p.is_fixed).map(|p| p.id).collect();
    let mut pinned = HashSet::new();
    let buckets: Vec<Vec<Player>> = current
        .teams()
        .map(|team| {
            team.players
                .iter()
                .filter(|p| p.is_fixed && fixed_in_pool.contains(&p.id))
                .filter_map(|p| pool.iter().find(|q| q.id == p.id))
                .inspect(|p| {
                    pinned.insert(p.id);
                })
                .cloned()
                .collect()
        })
        .collect();
    let rest = pool.iter().filter(|p| !pinned.contains(&p.id)).cloned().collect();
    (buckets, rest)
}

/// Turns buckets back into teams.
///
/// Buckets 0 and 1 become the court teams. Later buckets keep the identity
/// of the queued team at the same position, or open a new "Team N". Queued
/// teams left without players or reserves are dropped.
fn assemble(buckets: Vec<Vec<Player>>, current: &Roster, ids: &mut IdSource) -> Roster {
    let mut buckets = buckets.into_iter();
    let mut court_a = current.court_a.clone();
    court_a.players = buckets.next().unwrap_or_default();
    court_a.tactical_offset = 0;
    let mut court_b = current.court_b.clone();
    court_b.players = buckets.next().unwrap_or_default();
    court_b.tactical_offset = 0;

    let mut queue = VecDeque::new();
    for (i, bucket) in buckets.enumerate() {
        let team = match current.queue.get(i) {
            Some(existing) => Team {
                players: bucket,
                tactical_offset: 0,
                ..existing.clone()
            },
            None => Team::new(ids.team_key(), &format!("Team {}", i + 3), bucket),
        };
        if !team.is_empty() {
            queue.push_back(team);
        }
    }

    let mut roster = Roster { court_a, court_b, queue };
    for team in roster.teams_mut() {
        for cleared in team.resolve_number_conflicts() {
            debug!("Cleared clashing number of {} in {}", cleared, team.name);
        }
    }
    roster
}

/// Order-preserving distribution ("restore order").
///
/// Fixed players stay with their team; everyone else is sorted by entry
/// order and poured into buckets of `capacity`, spilling into new ones.
pub fn distribute_standard(pool: &[Player], current: &Roster, capacity: usize, ids: &mut IdSource) -> Distribution {
    let capacity = capacity.max(1);
    let (mut buckets, mut rest) = pin_fixed(pool, current);
    let mut logs = vec![format!(
        "Starting standard distribution: {} players, {} per team",
        pool.len(),
        capacity
    )];

    let needed = bucket_count(pool.len(), capacity, buckets.len());
    buckets.resize_with(needed, Vec::new);

    rest.sort_by(|a, b| a.original_index.cmp(&b.original_index).then(a.id.cmp(&b.id)));

    let mut cursor = 0;
    for player in rest {
        while cursor < buckets.len() && buckets[cursor].len() >= capacity {
            cursor += 1;
        }
        if cursor == buckets.len() {
            buckets.push(Vec::new());
        }
        buckets[cursor].push(player);
    }

    logs.push(format!("Filled {} teams", buckets.iter().filter(|b| !b.is_empty()).count()));
    info!("Standard distribution of {} players into {} buckets", pool.len(), buckets.len());
    Distribution {
        roster: assemble(buckets, current, ids),
        logs,
    }
}

/// Skill-weighted ("snake") distribution.
///
/// The first `pool / capacity` buckets are the priority buckets. Players are
/// taken strongest first and each goes to the priority bucket with room and
/// the lowest skill total. Once they are all full, the remainder overflows
/// into the later buckets in order.
pub fn distribute_snake(pool: &[Player], current: &Roster, capacity: usize, ids: &mut IdSource) -> Distribution {
    let capacity = capacity.max(1);
    let (mut buckets, mut rest) = pin_fixed(pool, current);
    let mut logs = vec![format!(
        "Starting snake balance: {} players, {} per team",
        pool.len(),
        capacity
    )];

    let needed = bucket_count(pool.len(), capacity, buckets.len());
    buckets.resize_with(needed, Vec::new);

    let full_teams = pool.len() / capacity;
    let priority = if full_teams == 0 {
        buckets.len()
    } else {
        full_teams.min(buckets.len())
    };
    logs.push(format!("Forming {} balanced teams", priority.min(buckets.len())));

    rest.sort_by(|a, b| b.skill.cmp(&a.skill));

    let mut totals: Vec<u32> = buckets.iter().map(|b| crate::types::total_skill(b)).collect();
    for player in rest {
        let weakest = (0..priority)
            .filter(|&i| buckets[i].len() < capacity)
            .min_by_key(|&i| totals[i]);
        let target = match weakest {
            Some(i) => i,
            None => match (priority..buckets.len()).find(|&i| buckets[i].len() < capacity) {
                Some(i) => i,
                None => {
                    buckets.push(Vec::new());
                    totals.push(0);
                    buckets.len() - 1
                }
            },
        };
        logs.push(format!("{} ({}) -> team {}", player.name, player.skill, target + 1));
        totals[target] += player.skill as u32;
        buckets[target].push(player);
    }

    info!("Snake distribution of {} players into {} buckets", pool.len(), buckets.len());
    Distribution {
        roster: assemble(buckets, current, ids),
        logs,
    }
}

/// Every on-court player of every team, court A first, queue in order.
pub fn court_pool(roster: &Roster) -> Vec<Player> {
    roster.teams().flat_map(|t| t.players.iter().cloned()).collect()
}
