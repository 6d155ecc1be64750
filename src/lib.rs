pub mod balance;
pub mod config;
pub mod error;
pub mod game;
mod logging;
pub mod profiles;
pub mod roster;
pub mod rotation;
pub mod scoring;
pub mod types;
pub mod undo;

pub use config::{GameConfig, ModePreset, RotationMode};
pub use error::{ActionResult, Rejection};
pub use game::{reduce, Action, GameState, MatchPhase, Transition};
pub use profiles::{InMemoryProfiles, PlayerProfile, ProfileStore};
pub use roster::Roster;

use profiles::profile_from_player;
use types::*;
use uuid::Uuid;
use wasm_bindgen::prelude::*;

/// Initialize panic hook and console logging
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    logging::init();
}

/// WASM-exposed scoreboard wrapper
#[wasm_bindgen]
pub struct ScoreboardEngine {
    state: GameState,
    profiles: InMemoryProfiles,
}

impl ScoreboardEngine {
    fn apply(&mut self, action: Action) -> ActionResult {
        let transition = reduce(&self.state, action);
        let result = transition.action_result();
        self.state = transition.state;
        result
    }

    fn save_profile_for(&mut self, player_id: PlayerId) -> Result<PlayerProfile, Rejection> {
        let player = self
            .state
            .roster
            .player(player_id)
            .cloned()
            .ok_or(Rejection::PlayerNotFound { player: player_id })?;
        let existing = player.profile_id.and_then(|id| self.profiles.get(&id)).cloned();
        let profile = profile_from_player(&player, existing.as_ref());
        let transition = reduce(
            &self.state,
            Action::LinkProfile {
                player: player_id,
                profile: profile.id,
            },
        );
        transition.result.clone()?;
        self.state = transition.state;
        self.profiles.upsert(profile.clone());
        Ok(profile)
    }
}

#[wasm_bindgen]
impl ScoreboardEngine {
    /// Create a new scoreboard with default config
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u64) -> ScoreboardEngine {
        ScoreboardEngine {
            state: GameState::new(GameConfig::default(), seed),
            profiles: InMemoryProfiles::new(),
        }
    }

    /// Create with custom config
    pub fn new_with_config(seed: u64, config_json: &str) -> Result<ScoreboardEngine, JsValue> {
        let config = GameConfig::from_json(config_json)
            .map_err(|e| JsValue::from_str(&format!("Config error: {}", e)))?;
        Ok(ScoreboardEngine {
            state: GameState::new(config, seed),
            profiles: InMemoryProfiles::new(),
        })
    }

    /// Apply one action given as JSON, returning the action result as JSON
    pub fn dispatch(&mut self, action_json: &str) -> Result<String, JsValue> {
        let action: Action = serde_json::from_str(action_json)
            .map_err(|e| JsValue::from_str(&format!("Action parse error: {}", e)))?;
        let result = self.apply(action);
        Ok(serde_json::to_string(&result).unwrap_or_default())
    }

    /// Same as `dispatch`, for a plain JS object
    pub fn dispatch_object(&mut self, action: JsValue) -> Result<String, JsValue> {
        let json: String = js_sys::JSON::stringify(&action)?.into();
        self.dispatch(&json)
    }

    /// Get full state as JSON
    pub fn get_state(&self) -> String {
        self.state.to_snapshot_json().unwrap_or_default()
    }

    /// Get full state as a JS object
    pub fn get_state_object(&self) -> Result<JsValue, JsValue> {
        js_sys::JSON::parse(&self.get_state())
    }

    /// Replace state with a saved snapshot
    pub fn load_state(&mut self, state_json: &str) -> Result<(), JsValue> {
        self.state = GameState::from_snapshot_json(state_json)
            .map_err(|e| JsValue::from_str(&format!("Snapshot error: {}", e)))?;
        Ok(())
    }

    pub fn get_config(&self) -> String {
        serde_json::to_string(&self.state.config).unwrap_or_default()
    }

    /// Get default config as JSON
    pub fn get_default_config() -> String {
        serde_json::to_string(&GameConfig::default()).unwrap_or_default()
    }

    pub fn get_phase(&self) -> String {
        serde_json::to_string(&self.state.phase()).unwrap_or_default()
    }

    /// Scores, sets and timeouts of both sides
    pub fn get_scoreboard(&self) -> String {
        let s = &self.state;
        serde_json::json!({
            "scores": s.scores,
            "sets": s.sets,
            "timeouts": s.timeouts,
            "currentSet": s.current_set,
            "serving": s.serving,
            "inSuddenDeath": s.in_sudden_death,
            "swappedSides": s.swapped_sides,
            "pendingSideSwitch": s.pending_side_switch,
            "matchWinner": s.match_winner,
        })
        .to_string()
    }

    /// Precomputed rotation for the finished set, or null
    pub fn get_rotation_report(&self) -> String {
        serde_json::to_string(&self.state.rotation_report).unwrap_or_default()
    }

    pub fn get_match_log(&self) -> String {
        serde_json::to_string(self.state.undo.match_log()).unwrap_or_default()
    }

    pub fn can_undo(&self) -> bool {
        self.state.can_undo()
    }

    /// Insert or replace a stored profile
    pub fn upsert_profile(&mut self, profile_json: &str) -> Result<(), JsValue> {
        let profile: PlayerProfile = serde_json::from_str(profile_json)
            .map_err(|e| JsValue::from_str(&format!("Profile parse error: {}", e)))?;
        self.profiles.upsert(profile);
        Ok(())
    }

    /// Delete a stored profile and unlink the players that followed it
    pub fn delete_profile(&mut self, profile_id: &str) -> Result<bool, JsValue> {
        let id = Uuid::parse_str(profile_id)
            .map(ProfileId)
            .map_err(|e| JsValue::from_str(&format!("Profile id error: {}", e)))?;
        let removed = self.profiles.delete(&id).is_some();
        if removed {
            self.apply(Action::UnlinkProfile { profile: id });
        }
        Ok(removed)
    }

    pub fn list_profiles(&self) -> String {
        serde_json::to_string(&self.profiles.all()).unwrap_or_default()
    }

    /// Refresh every roster player from the stored profiles
    pub fn sync_profiles(&mut self) -> String {
        let profiles = self.profiles.all().into_iter().cloned().collect();
        let result = self.apply(Action::SyncProfiles { profiles });
        serde_json::to_string(&result).unwrap_or_default()
    }

    /// Save a roster player as a profile and link the two
    pub fn save_player_profile(&mut self, player_id: &str) -> Result<String, JsValue> {
        let id = Uuid::parse_str(player_id)
            .map(PlayerId)
            .map_err(|e| JsValue::from_str(&format!("Player id error: {}", e)))?;
        let profile = self
            .save_profile_for(id)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        serde_json::to_string(&profile).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}

/// Replays a list of actions against a fresh match and reports every outcome
#[wasm_bindgen]
pub fn replay_actions(config_json: &str, actions_json: &str, seed: u64) -> Result<String, JsValue> {
    let config = GameConfig::from_json(config_json)
        .map_err(|e| JsValue::from_str(&format!("Config error: {}", e)))?;
    let actions: Vec<Action> = serde_json::from_str(actions_json)
        .map_err(|e| JsValue::from_str(&format!("Actions parse error: {}", e)))?;

    let (state, results) = replay(GameState::new(config, seed), actions);
    let report = serde_json::json!({
        "state": state,
        "results": results,
    });
    serde_json::to_string(&report).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

fn replay(mut state: GameState, actions: Vec<Action>) -> (GameState, Vec<ActionResult>) {
    let mut results = Vec::with_capacity(actions.len());
    for action in actions {
        let transition = reduce(&state, action);
        results.push(transition.action_result());
        state = transition.state;
    }
    (state, results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_engine() -> ScoreboardEngine {
        let mut engine = ScoreboardEngine::new(3);
        for i in 0..6 {
            let add_a = format!(
                r#"{{"type":"addPlayer","name":"A{}","target":{{"kind":"court","team":"A"}}}}"#,
                i
            );
            let add_b = format!(
                r#"{{"type":"addPlayer","name":"B{}","target":{{"kind":"court","team":"B"}}}}"#,
                i
            );
            engine.dispatch(&add_a).unwrap();
            engine.dispatch(&add_b).unwrap();
        }
        engine
    }

    #[test]
    fn test_engine_dispatch_and_state_json() {
        let mut engine = create_test_engine();
        assert_eq!(engine.state.roster.court_a.players.len(), 6);
        assert_eq!(engine.state.roster.court_b.players.len(), 6);

        let result = engine.dispatch(r#"{"type":"point","side":"B"}"#).unwrap();
        assert_eq!(result, r#"{"ok":true}"#);
        assert!(engine.can_undo());

        let result: serde_json::Value =
            serde_json::from_str(&engine.dispatch(r#"{"type":"subtractPoint","side":"A"}"#).unwrap()).unwrap();
        assert_eq!(result["ok"], false);
        assert_eq!(result["rejection"]["code"], "score_at_zero");

        let snapshot = engine.get_state();
        let mut other = ScoreboardEngine::new(99);
        other.load_state(&snapshot).unwrap();
        assert_eq!(other.state, engine.state);
    }

    #[test]
    fn test_engine_full_court_is_rejected_not_errored() {
        let mut engine = create_test_engine();
        let result: serde_json::Value = serde_json::from_str(
            &engine
                .dispatch(r#"{"type":"addPlayer","name":"Late","target":{"kind":"court","team":"A"}}"#)
                .unwrap(),
        )
        .unwrap();
        assert_eq!(result["rejection"]["code"], "roster_full");
        assert_eq!(result["rejection"]["capacity"], 6);
    }

    #[test]
    fn test_save_profile_links_player() {
        let mut engine = create_test_engine();
        let player = engine.state.roster.court_a.players[0].clone();
        let profile = engine.save_profile_for(player.id).unwrap();
        assert_eq!(engine.profiles.len(), 1);
        assert_eq!(
            engine.state.roster.player(player.id).and_then(|p| p.profile_id),
            Some(profile.id)
        );

        let mut edited = profile.clone();
        edited.skill = 9;
        engine.profiles.upsert(edited);
        engine.sync_profiles();
        assert_eq!(engine.state.roster.player(player.id).map(|p| p.skill), Some(9));
    }

    #[test]
    fn test_replay_reports_each_action() {
        let actions = vec![
            Action::Point { side: Side::A, scorer: None, skill: None },
            Action::Undo,
            Action::Undo,
        ];
        let (state, results) = replay(GameState::new(GameConfig::default(), 1), actions);
        assert_eq!(results.len(), 3);
        assert!(results[0].ok && results[1].ok);
        assert_eq!(results[2].rejection, Some(Rejection::NothingToUndo));
        assert_eq!(state.scores, PerSide::new(0, 0));
    }
}
