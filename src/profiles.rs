//! Persistent player profiles and how roster players follow them.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Rejection;
use crate::roster::Roster;
use crate::types::*;

fn default_skill() -> u8 {
    DEFAULT_SKILL
}

/// A player identity kept across matches
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfile {
    pub id: ProfileId,
    pub name: String,
    #[serde(default = "default_skill")]
    pub skill: u8,
    /// Preferred jersey number
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub role: PlayerRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Keyed profile storage owned by the host
pub trait ProfileStore {
    fn get(&self, id: &ProfileId) -> Option<&PlayerProfile>;

    /// Inserts or replaces, returning the previous profile.
    fn upsert(&mut self, profile: PlayerProfile) -> Option<PlayerProfile>;

    fn delete(&mut self, id: &ProfileId) -> Option<PlayerProfile>;

    fn all(&self) -> Vec<&PlayerProfile>;

    /// Case-insensitive lookup by name; on duplicates the lowest id wins.
    fn find_by_name(&self, name: &str) -> Option<&PlayerProfile> {
        let wanted = name.trim().to_lowercase();
        self.all()
            .into_iter()
            .filter(|p| p.name.trim().to_lowercase() == wanted)
            .min_by_key(|p| p.id)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct InMemoryProfiles {
    profiles: HashMap<ProfileId, PlayerProfile>,
}

impl InMemoryProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl ProfileStore for InMemoryProfiles {
    fn get(&self, id: &ProfileId) -> Option<&PlayerProfile> {
        self.profiles.get(id)
    }

    fn upsert(&mut self, profile: PlayerProfile) -> Option<PlayerProfile> {
        self.profiles.insert(profile.id, profile)
    }

    fn delete(&mut self, id: &ProfileId) -> Option<PlayerProfile> {
        self.profiles.remove(id)
    }

    fn all(&self) -> Vec<&PlayerProfile> {
        let mut all: Vec<&PlayerProfile> = self.profiles.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        all
    }
}

impl FromIterator<PlayerProfile> for InMemoryProfiles {
    fn from_iter<I: IntoIterator<Item = PlayerProfile>>(iter: I) -> Self {
        Self {
            profiles: iter.into_iter().map(|p| (p.id, p)).collect(),
        }
    }
}

/// Copies profile fields onto a roster player.
///
/// A linked player follows its profile; an unlinked one is matched by name.
/// A player whose profile no longer exists loses the link.
pub fn sync_player(player: &Player, store: &impl ProfileStore) -> Player {
    let linked = match player.profile_id {
        Some(id) => store.get(&id),
        None => store.find_by_name(&player.name),
    };
    let mut synced = player.clone();
    match linked {
        Some(profile) => {
            synced.profile_id = Some(profile.id);
            let name = sanitize_name(&profile.name);
            if !name.is_empty() {
                synced.name = name;
            }
            synced.skill = clamp_skill(profile.skill);
            if let Some(number) = normalize_number(profile.number.as_deref()) {
                synced.number = Some(number);
            }
            synced.role = profile.role;
        }
        None => {
            if synced.profile_id.take().is_some() {
                debug!("Profile of {} is gone, unlinking", synced.name);
            }
        }
    }
    synced
}

/// Builds the profile a roster player would be saved as.
pub fn profile_from_player(player: &Player, existing: Option<&PlayerProfile>) -> PlayerProfile {
    PlayerProfile {
        id: player
            .profile_id
            .or(existing.map(|p| p.id))
            .unwrap_or(ProfileId(player.id.0)),
        name: player.name.clone(),
        skill: player.skill,
        number: player.number.clone(),
        role: player.role,
        avatar: existing.and_then(|p| p.avatar.clone()),
    }
}

impl Roster {
    pub fn synced_with(&self, store: &impl ProfileStore) -> Roster {
        let mut next = self.clone();
        for team in next.teams_mut() {
            for player in team.players.iter_mut().chain(team.reserves.iter_mut()) {
                *player = sync_player(player, store);
            }
            for cleared in team.resolve_number_conflicts() {
                debug!("Profile number clashed in {}, cleared {}", team.name, cleared);
            }
        }
        next
    }

    pub fn link_profile(&self, id: PlayerId, profile: ProfileId) -> Result<Roster, Rejection> {
        let mut next = self.clone();
        let player = next
            .teams_mut()
            .flat_map(|t| t.players.iter_mut().chain(t.reserves.iter_mut()))
            .find(|p| p.id == id)
            .ok_or(Rejection::PlayerNotFound { player: id })?;
        player.profile_id = Some(profile);
        Ok(next)
    }

    /// Drops every link to `profile`; the players keep their current fields.
    pub fn unlinked(&self, profile: ProfileId) -> Roster {
        let mut next = self.clone();
        for team in next.teams_mut() {
            for player in team.players.iter_mut().chain(team.reserves.iter_mut()) {
                if player.profile_id == Some(profile) {
                    player.profile_id = None;
                    player.role = PlayerRole::None;
                }
            }
        }
        next
    }
}
