use bevy::prelude::*;
use std::collections::HashSet;

use crate::events::GameEventBus;
use crate::fade::input_unblocked;
use crate::game_runtime::{gameplay_systems_enabled, RuntimeState};
use crate::scene::SceneServices;

/// Abstraction layer between raw input and game systems.
/// Both keyboard (windowed) and tests (headless) write to this.
#[derive(Resource, Default, Clone)]
pub struct VirtualInput {
    pub active: HashSet<String>,
    pub just_pressed: HashSet<String>,
    pub just_released: HashSet<String>,
}

impl VirtualInput {
    pub fn just_pressed(&self, action: &str) -> bool {
        self.just_pressed.contains(action)
    }

    #[cfg(test)]
    pub fn press(&mut self, action: &str) {
        self.active.insert(action.to_string());
        self.just_pressed.insert(action.to_string());
    }

    pub fn clear_frame(&mut self) {
        self.just_pressed.clear();
        self.just_released.clear();
    }
}

const KEY_ACTIONS: &[(KeyCode, &str)] = &[
    (KeyCode::KeyQ, "weapon_prev"),
    (KeyCode::KeyE, "weapon_next"),
    (KeyCode::Tab, "skill_next"),
    (KeyCode::Space, "skill_use"),
    (KeyCode::F5, "quick_reload"),
    (KeyCode::F6, "save"),
    (KeyCode::F9, "load"),
    (KeyCode::Escape, "pause"),
];

pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(VirtualInput::default())
            .add_systems(
                PreUpdate,
                keyboard_to_virtual.run_if(resource_exists::<ButtonInput<KeyCode>>),
            )
            .add_systems(
                Update,
                (
                    meta_input_to_events,
                    gameplay_input
                        .run_if(input_unblocked)
                        .run_if(gameplay_systems_enabled),
                ),
            )
            .add_systems(Last, clear_virtual_input);
    }
}

/// Translate keyboard input to VirtualInput action names
fn keyboard_to_virtual(keyboard: Res<ButtonInput<KeyCode>>, mut vinput: ResMut<VirtualInput>) {
    vinput.active.clear();
    vinput.just_pressed.clear();
    vinput.just_released.clear();

    for (key, action) in KEY_ACTIONS {
        if keyboard.pressed(*key) {
            vinput.active.insert((*action).into());
        }
        if keyboard.just_pressed(*key) {
            vinput.just_pressed.insert((*action).into());
        }
        if keyboard.just_released(*key) {
            vinput.just_released.insert((*action).into());
        }
    }
}

/// Shortcuts that work regardless of the overlay: they go through the
/// event bus and the coordinator decides whether they apply.
fn meta_input_to_events(
    vinput: Res<VirtualInput>,
    runtime: Option<Res<RuntimeState>>,
    mut bus: ResMut<GameEventBus>,
) {
    if vinput.just_pressed("quick_reload") {
        bus.emit("scene_quick_reload_request", serde_json::json!({}));
    }
    if vinput.just_pressed("save") {
        bus.emit("save_game_request", serde_json::json!({}));
    }
    if vinput.just_pressed("load") {
        bus.emit("load_game_request", serde_json::json!({}));
    }
    if vinput.just_pressed("pause") {
        let paused = runtime.is_some_and(|r| r.paused);
        let name = if paused { "game_resume" } else { "game_pause" };
        bus.emit(name, serde_json::json!({}));
    }
}

fn gameplay_input(
    vinput: Res<VirtualInput>,
    mut services: ResMut<SceneServices>,
    mut bus: ResMut<GameEventBus>,
) {
    if let Some(loadout) = services.loadout_mut() {
        if vinput.just_pressed("weapon_next") {
            loadout.cycle(true);
        }
        if vinput.just_pressed("weapon_prev") {
            loadout.cycle(false);
        }
    }
    if let Some(skills) = services.skills_mut() {
        if vinput.just_pressed("skill_next") {
            skills.cycle_active();
        }
        if vinput.just_pressed("skill_use") {
            if let Some(skill) = skills.trigger_active() {
                bus.emit("skill_used", serde_json::json!({ "skill": skill }));
            }
        }
    }
}

fn clear_virtual_input(mut vinput: ResMut<VirtualInput>) {
    vinput.clear_frame();
}
