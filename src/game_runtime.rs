use bevy::prelude::*;

use crate::events::{EventCursor, GameEventBus};
use crate::scene::SceneServices;
use crate::transition::SceneTransitions;

#[derive(States, Default, Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum GameFlowState {
    #[default]
    Playing,
    Paused,
    SceneTransition,
}

/// Pause request plus the flow state derived from it and the coordinator.
#[derive(Resource, Clone, Default)]
pub struct RuntimeState {
    pub paused: bool,
    current: GameFlowState,
}

impl RuntimeState {
    pub fn current(&self) -> GameFlowState {
        self.current
    }

    /// A running transition outranks a pause request; the pause takes effect
    /// once the new scene has settled.
    pub fn resolve(&mut self, transitioning: bool) -> GameFlowState {
        let desired = if transitioning {
            GameFlowState::SceneTransition
        } else if self.paused {
            GameFlowState::Paused
        } else {
            GameFlowState::Playing
        };
        if desired != self.current {
            debug!("[Scenekeeper runtime] {:?} -> {:?}", self.current, desired);
            self.current = desired;
        }
        desired
    }
}

pub fn gameplay_systems_enabled(
    state: Option<Res<State<GameFlowState>>>,
    runtime: Option<Res<RuntimeState>>,
) -> bool {
    if let Some(state) = state {
        return *state.get() == GameFlowState::Playing;
    }
    runtime.map(|r| r.current() == GameFlowState::Playing).unwrap_or(false)
}

#[derive(Resource, Default)]
struct RuntimeEventCursor(EventCursor);

fn apply_runtime_events(
    bus: Res<GameEventBus>,
    mut runtime: ResMut<RuntimeState>,
    mut cursor: ResMut<RuntimeEventCursor>,
) {
    for ev in bus.read_new(&mut cursor.0) {
        match ev.name.as_str() {
            "game_pause" => runtime.paused = true,
            "game_resume" => runtime.paused = false,
            _ => {}
        }
    }
}

fn sync_flow_state(
    transitions: Option<Res<SceneTransitions>>,
    mut runtime: ResMut<RuntimeState>,
    state: Res<State<GameFlowState>>,
    mut next_state: ResMut<NextState<GameFlowState>>,
    mut virtual_time: ResMut<Time<Virtual>>,
) {
    let transitioning = transitions.is_some_and(|t| t.is_transitioning());
    let desired = runtime.resolve(transitioning);
    if state.get() != &desired {
        next_state.set(desired);
    }
    // Fades run on real time, so only gameplay freezes.
    let freeze = desired == GameFlowState::Paused;
    if freeze && !virtual_time.is_paused() {
        virtual_time.pause();
    } else if !freeze && virtual_time.is_paused() {
        virtual_time.unpause();
    }
}

/// Cooldowns run on virtual time and stop while paused.
fn tick_skill_cooldowns(time: Res<Time<Virtual>>, mut services: ResMut<SceneServices>) {
    let dt = time.delta_secs();
    if dt <= 0.0 {
        return;
    }
    if let Some(skills) = services.skills_mut() {
        skills.tick_cooldowns(dt);
    }
}

pub struct RuntimeStatePlugin;

impl Plugin for RuntimeStatePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(RuntimeState::default())
            .insert_resource(RuntimeEventCursor::default())
            .init_state::<GameFlowState>()
            .add_systems(
                Update,
                (
                    apply_runtime_events,
                    sync_flow_state,
                    tick_skill_cooldowns.run_if(gameplay_systems_enabled),
                )
                    .chain(),
            );
    }
}
