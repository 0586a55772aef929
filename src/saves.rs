//! Save files: the active scene plus an override record restored on load.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::TransitionConfig;
use crate::events::{str_field, EventCursor, GameEventBus};
use crate::save_override::{PendingOverride, SaveOverride};
use crate::scene::{SceneLibrary, SceneLoader, SceneServices};
use crate::snapshot::StateSnapshot;
use crate::transition::SceneTransitions;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaveFile {
    pub scene: String,
    #[serde(default)]
    pub data: SaveOverride,
}

impl SaveFile {
    /// Captures the live scene into `snapshot` first so the file reflects
    /// what the player has right now.
    pub fn capture(scene: &str, snapshot: &mut StateSnapshot, services: &SceneServices) -> Self {
        snapshot.capture(services);
        let levels = services.upgrades().map(|u| u.levels()).unwrap_or_default();
        Self {
            scene: scene.to_string(),
            data: SaveOverride::from_snapshot(snapshot, levels),
        }
    }
}

pub fn parse_save(contents: &str) -> Result<SaveFile, String> {
    let save = serde_json::from_str::<SaveFile>(contents).map_err(|e| e.to_string())?;
    if save.scene.trim().is_empty() {
        return Err("save file has no scene".to_string());
    }
    Ok(save)
}

pub fn write_save(path: &str, save: &SaveFile) -> Result<(), String> {
    let json = serde_json::to_string_pretty(save).map_err(|e| e.to_string())?;
    std::fs::write(path, json).map_err(|e| format!("{path}: {e}"))
}

pub fn read_save(path: &str) -> Result<SaveFile, String> {
    let contents = std::fs::read_to_string(path).map_err(|e| format!("{path}: {e}"))?;
    parse_save(&contents)
}

/// Installs a loaded save: its record becomes the pending override and a
/// transition to its scene is requested. Refused while a transition runs.
pub fn begin_load(
    save: SaveFile,
    pending: &mut PendingOverride,
    transitions: &mut SceneTransitions,
) -> Result<(), String> {
    if transitions.is_transitioning() {
        return Err("a scene transition is already running".to_string());
    }
    pending.set(save.data);
    if transitions.request_transition(&save.scene) {
        Ok(())
    } else {
        pending.clear();
        Err(format!("transition to '{}' was refused", save.scene))
    }
}

#[derive(Resource, Default)]
struct SaveEventCursor(EventCursor);

pub struct SavesPlugin;

impl Plugin for SavesPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(SaveEventCursor::default())
            .add_systems(Update, handle_save_requests);
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_save_requests(
    config: Res<TransitionConfig>,
    library: Res<SceneLibrary>,
    services: Res<SceneServices>,
    mut snapshot: ResMut<StateSnapshot>,
    mut pending: ResMut<PendingOverride>,
    mut transitions: ResMut<SceneTransitions>,
    mut cursor: ResMut<SaveEventCursor>,
    mut bus: ResMut<GameEventBus>,
) {
    for ev in bus.read_new(&mut cursor.0) {
        let path = str_field(&ev.data, "path").unwrap_or(config.save_path.as_str()).to_string();
        match ev.name.as_str() {
            "save_game_request" => {
                if transitions.is_transitioning() {
                    warn!("[Scenekeeper saves] Not saving during a scene transition");
                    continue;
                }
                let save = SaveFile::capture(library.active_scene(), &mut snapshot, &services);
                match write_save(&path, &save) {
                    Ok(()) => {
                        info!("[Scenekeeper saves] Saved '{}' to {path}", save.scene);
                        bus.emit("game_saved", serde_json::json!({ "path": path, "scene": save.scene }));
                    }
                    Err(e) => warn!("[Scenekeeper saves] Save failed: {e}"),
                }
            }
            "load_game_request" => {
                let result = read_save(&path).and_then(|save| {
                    let scene = save.scene.clone();
                    begin_load(save, &mut pending, &mut transitions).map(|()| scene)
                });
                match result {
                    Ok(scene) => {
                        info!("[Scenekeeper saves] Loading '{scene}' from {path}");
                        bus.emit("game_loaded", serde_json::json!({ "path": path, "scene": scene }));
                    }
                    Err(e) => warn!("[Scenekeeper saves] Load failed: {e}"),
                }
            }
            _ => {}
        }
    }
}
