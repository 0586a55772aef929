//! Scene transition coordinator.
//!
//! A transition walks a fixed sequence, one phase after another, driven
//! once per frame with real-time deltas:
//!
//! `PreDelay → Capture → HubMusicFadeOut → FadeOut → BeginLoad/AwaitLoad →
//! ApplyAmbient → DeferredReapply → ReconcileOverride → FadeIn`
//!
//! Only one transition runs at a time. Requests made while one is in flight
//! are dropped, not queued.

use bevy::prelude::*;
use bevy::time::Real;

use crate::audio::{AudioManager, MusicPlayer};
use crate::config::TransitionConfig;
use crate::events::{str_field, EventCursor, GameEventBus};
use crate::fade::{FadeHandle, FadeOverlay, FadeSet};
use crate::reconcile::apply_pending_override;
use crate::save_override::PendingOverride;
use crate::scene::{LoadProgress, SceneLibrary, SceneLoader, SceneServices};
use crate::skills::{SkillCatalog, SkillResolver};
use crate::snapshot::StateSnapshot;

#[cfg(test)]
mod tests;

/// Everything a transition reads or writes, borrowed for one step.
pub struct TransitionContext<'a> {
    pub config: &'a TransitionConfig,
    pub scenes: &'a mut dyn SceneLoader,
    pub services: &'a mut SceneServices,
    pub overlay: &'a mut FadeOverlay,
    pub snapshot: &'a mut StateSnapshot,
    pub pending: &'a mut PendingOverride,
    pub skills: &'a dyn SkillResolver,
    pub audio: Option<&'a mut dyn MusicPlayer>,
    pub events: &'a mut GameEventBus,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SceneTarget {
    Named(String),
    ReloadCurrent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TransitionMode {
    Faded,
    /// Quick reload: no fades, scene already loaded synchronously.
    Quick,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TransitionPhase {
    PreDelay,
    Capture,
    HubMusicFadeOut,
    AwaitMusicFade { seconds: f32 },
    FadeOut,
    AwaitFadeOut(FadeHandle),
    BeginLoad,
    AwaitLoad,
    ApplyAmbient,
    DeferredReapply,
    ReconcileOverride,
    FadeIn,
    AwaitFadeIn(FadeHandle),
}

enum Step {
    Next(TransitionPhase),
    Wait,
    Finish,
}

struct ActiveTransition {
    target: SceneTarget,
    mode: TransitionMode,
    leaving: String,
    destination: String,
    phase: TransitionPhase,
    phase_elapsed: f32,
    /// Frames the current phase has been resumed in.
    phase_steps: u32,
    resolved_loadout: Option<usize>,
}

impl ActiveTransition {
    fn new(target: SceneTarget, mode: TransitionMode, phase: TransitionPhase) -> Self {
        Self {
            target,
            mode,
            leaving: String::new(),
            destination: String::new(),
            phase,
            phase_elapsed: 0.0,
            phase_steps: 0,
            resolved_loadout: None,
        }
    }

    fn enter(&mut self, phase: TransitionPhase) {
        debug!("[Scenekeeper transitions] {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
        self.phase_elapsed = 0.0;
        self.phase_steps = 0;
    }

    fn after_reconcile(&self) -> Step {
        match self.mode {
            TransitionMode::Faded => Step::Next(TransitionPhase::FadeIn),
            TransitionMode::Quick => Step::Finish,
        }
    }

    fn run_phase(&mut self, cx: &mut TransitionContext) -> Step {
        match self.phase {
            TransitionPhase::PreDelay => {
                if self.phase_elapsed >= cx.config.pre_delay_seconds {
                    Step::Next(TransitionPhase::Capture)
                } else {
                    Step::Wait
                }
            }
            TransitionPhase::Capture => {
                self.leaving = cx.scenes.active_scene().to_string();
                self.destination = match &self.target {
                    SceneTarget::Named(scene) => scene.clone(),
                    SceneTarget::ReloadCurrent => self.leaving.clone(),
                };
                cx.snapshot.capture(cx.services);
                cx.events.emit(
                    "scene_transition_started",
                    serde_json::json!({ "from": self.leaving, "to": self.destination }),
                );
                Step::Next(TransitionPhase::HubMusicFadeOut)
            }
            TransitionPhase::HubMusicFadeOut => {
                if cx.config.is_hub(&self.leaving) {
                    if let Some(audio) = cx.audio.as_mut() {
                        let seconds = cx.config.hub_music_fade_seconds.max(0.0);
                        audio.stop_background_music(seconds);
                        return Step::Next(TransitionPhase::AwaitMusicFade { seconds });
                    }
                }
                Step::Next(TransitionPhase::FadeOut)
            }
            TransitionPhase::AwaitMusicFade { seconds } => {
                if self.phase_elapsed >= seconds {
                    Step::Next(TransitionPhase::FadeOut)
                } else {
                    Step::Wait
                }
            }
            TransitionPhase::FadeOut => {
                let handle = cx.overlay.fade_to(1.0, cx.config.fade_out_seconds);
                Step::Next(TransitionPhase::AwaitFadeOut(handle))
            }
            TransitionPhase::AwaitFadeOut(handle) => {
                if cx.overlay.is_finished(handle) {
                    Step::Next(TransitionPhase::BeginLoad)
                } else {
                    Step::Wait
                }
            }
            TransitionPhase::BeginLoad => {
                cx.services.clear();
                cx.scenes.begin_load(&self.destination);
                Step::Next(TransitionPhase::AwaitLoad)
            }
            TransitionPhase::AwaitLoad => match cx.scenes.poll_load(cx.services) {
                LoadProgress::Loading => Step::Wait,
                LoadProgress::Ready => {
                    cx.events.emit(
                        "scene_loaded",
                        serde_json::json!({ "scene": self.destination, "quick": false }),
                    );
                    Step::Next(TransitionPhase::ApplyAmbient)
                }
            },
            TransitionPhase::ApplyAmbient => {
                self.resolved_loadout = cx.snapshot.apply(cx.services, cx.pending.peek());
                Step::Next(TransitionPhase::DeferredReapply)
            }
            // Scene start-up code may overwrite the loadout on its first
            // frame, so the index is written once more a frame later.
            TransitionPhase::DeferredReapply => {
                if self.phase_steps == 0 {
                    return Step::Wait;
                }
                cx.snapshot.reapply_loadout(cx.services, self.resolved_loadout);
                Step::Next(TransitionPhase::ReconcileOverride)
            }
            TransitionPhase::ReconcileOverride => self.reconcile_override(cx),
            TransitionPhase::FadeIn => {
                let handle = cx.overlay.fade_in_from_black(cx.config.fade_in_seconds);
                Step::Next(TransitionPhase::AwaitFadeIn(handle))
            }
            TransitionPhase::AwaitFadeIn(handle) => {
                if cx.overlay.is_finished(handle) {
                    Step::Finish
                } else {
                    Step::Wait
                }
            }
        }
    }

    /// Polls for a scene-provided applier until the timeout, then falls
    /// back to the built-in reconciliation.
    fn reconcile_override(&mut self, cx: &mut TransitionContext) -> Step {
        if !cx.pending.is_pending() {
            return self.after_reconcile();
        }
        if cx.services.has_save_applier() {
            if let Some(data) = cx.pending.take() {
                cx.services.apply_save_data(&data);
                info!(
                    "[Scenekeeper transitions] Save data handed to scene applier in '{}'",
                    self.destination
                );
                cx.events.emit(
                    "save_override_applied",
                    serde_json::json!({ "scene": self.destination, "applier": "scene" }),
                );
            }
            return self.after_reconcile();
        }
        if self.phase_elapsed < cx.config.override_timeout_seconds {
            return Step::Wait;
        }
        if let Some(report) = apply_pending_override(cx.pending, cx.services, cx.skills) {
            cx.events.emit(
                "save_override_applied",
                serde_json::json!({
                    "scene": self.destination,
                    "applier": "fallback",
                    "loadout": report.loadout_index,
                    "skills": report.skills,
                    "active_skill": report.active_skill_index,
                    "dropped_skills": report.dropped_skills,
                    "upgrades": report.upgrade_format,
                }),
            );
        }
        self.after_reconcile()
    }
}

/// Coordinator resource. Its in-flight transition doubles as the
/// reentrancy guard.
#[derive(Resource, Default)]
pub struct SceneTransitions {
    active: Option<ActiveTransition>,
    completed: u64,
}

impl SceneTransitions {
    pub fn is_transitioning(&self) -> bool {
        self.active.is_some()
    }

    #[cfg(test)]
    pub fn phase(&self) -> Option<TransitionPhase> {
        self.active.as_ref().map(|a| a.phase)
    }

    #[cfg(test)]
    pub fn target(&self) -> Option<&SceneTarget> {
        self.active.as_ref().map(|a| &a.target)
    }

    #[cfg(test)]
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Starts a faded transition to `scene`. Returns false, doing nothing,
    /// while another transition is running.
    pub fn request_transition(&mut self, scene: &str) -> bool {
        self.begin(SceneTarget::Named(scene.to_string()))
    }

    /// Faded reload of the active scene.
    pub fn request_reload(&mut self) -> bool {
        self.begin(SceneTarget::ReloadCurrent)
    }

    fn begin(&mut self, target: SceneTarget) -> bool {
        if let Some(active) = self.active.as_ref() {
            debug!(
                "[Scenekeeper transitions] Ignoring {:?}; already in {:?}",
                target, active.phase
            );
            return false;
        }
        self.active = Some(ActiveTransition::new(
            target,
            TransitionMode::Faded,
            TransitionPhase::PreDelay,
        ));
        true
    }

    /// Instant retry: reloads the active scene synchronously with no fades.
    /// Loadout and skills are restored in the same call; the deferred
    /// reapply and override reconciliation finish on later frames.
    pub fn reload_immediate(&mut self, cx: &mut TransitionContext) -> bool {
        if self.active.is_some() {
            debug!("[Scenekeeper transitions] Quick reload ignored during a transition");
            return false;
        }
        let scene = cx.scenes.active_scene().to_string();
        if !cx.config.quick_reload.allows(&scene) {
            debug!("[Scenekeeper transitions] Quick reload not allowed in '{scene}'");
            return false;
        }

        let mut active = ActiveTransition::new(
            SceneTarget::ReloadCurrent,
            TransitionMode::Quick,
            TransitionPhase::ApplyAmbient,
        );
        active.leaving = scene.clone();
        active.destination = scene.clone();
        self.active = Some(active);

        cx.snapshot.capture(cx.services);
        cx.overlay.force_clear();
        cx.scenes.load_immediate(&scene, cx.services);
        cx.events.emit(
            "scene_transition_started",
            serde_json::json!({ "from": scene, "to": scene, "quick": true }),
        );
        cx.events.emit("scene_loaded", serde_json::json!({ "scene": scene, "quick": true }));
        info!("[Scenekeeper transitions] Quick reload of '{scene}'");

        self.advance(0.0, cx);
        true
    }

    /// Resumes the running transition for one frame of `dt` real seconds.
    pub fn advance(&mut self, dt: f32, cx: &mut TransitionContext) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        active.phase_elapsed += dt.max(0.0);
        active.phase_steps = active.phase_steps.saturating_add(1);
        loop {
            match active.run_phase(cx) {
                Step::Next(phase) => active.enter(phase),
                Step::Wait => return,
                Step::Finish => break,
            }
        }

        if let Some(done) = self.active.take() {
            self.completed = self.completed.saturating_add(1);
            info!(
                "[Scenekeeper transitions] Settled in '{}' (from '{}', transition #{})",
                done.destination, done.leaving, self.completed
            );
            cx.events.emit(
                "scene_transition_finished",
                serde_json::json!({
                    "from": done.leaving,
                    "to": done.destination,
                    "quick": done.mode == TransitionMode::Quick,
                }),
            );
        }
    }
}

#[derive(Resource, Default)]
struct TransitionRequestCursor(EventCursor);

pub struct TransitionPlugin;

impl Plugin for TransitionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TransitionConfig>()
            .init_resource::<SceneLibrary>()
            .init_resource::<SkillCatalog>()
            .init_resource::<SceneServices>()
            .init_resource::<StateSnapshot>()
            .init_resource::<PendingOverride>()
            .insert_resource(SceneTransitions::default())
            .insert_resource(TransitionRequestCursor::default())
            .add_systems(Startup, start_initial_scene)
            .add_systems(Update, drive_scene_transitions.after(FadeSet));
    }
}

fn start_initial_scene(
    config: Res<TransitionConfig>,
    mut library: ResMut<SceneLibrary>,
    mut services: ResMut<SceneServices>,
    mut events: ResMut<GameEventBus>,
) {
    let scene = config.start_scene.clone();
    library.load_immediate(&scene, &mut services);
    info!("[Scenekeeper transitions] Started in '{scene}'");
    events.emit("scene_loaded", serde_json::json!({ "scene": scene, "quick": false }));
}

#[allow(clippy::too_many_arguments)]
fn drive_scene_transitions(
    time: Res<Time<Real>>,
    config: Res<TransitionConfig>,
    mut transitions: ResMut<SceneTransitions>,
    mut cursor: ResMut<TransitionRequestCursor>,
    mut library: ResMut<SceneLibrary>,
    mut services: ResMut<SceneServices>,
    mut overlay: ResMut<FadeOverlay>,
    mut snapshot: ResMut<StateSnapshot>,
    mut pending: ResMut<PendingOverride>,
    catalog: Res<SkillCatalog>,
    mut audio: Option<ResMut<AudioManager>>,
    mut events: ResMut<GameEventBus>,
) {
    let requests = events.read_new(&mut cursor.0);
    let mut cx = TransitionContext {
        config: &*config,
        scenes: &mut *library,
        services: &mut *services,
        overlay: &mut *overlay,
        snapshot: &mut *snapshot,
        pending: &mut *pending,
        skills: &*catalog,
        audio: audio.as_mut().map(|a| &mut **a as &mut dyn MusicPlayer),
        events: &mut *events,
    };

    // Requests are handled after advancing so a transition they start takes
    // its first step next frame.
    transitions.advance(time.delta_secs(), &mut cx);

    for ev in requests {
        match ev.name.as_str() {
            "scene_transition_request" => {
                if let Some(scene) = str_field(&ev.data, "to") {
                    transitions.request_transition(scene);
                }
            }
            "scene_reload_request" => {
                transitions.request_reload();
            }
            "scene_quick_reload_request" => {
                transitions.reload_immediate(&mut cx);
            }
            _ => {}
        }
    }
}
