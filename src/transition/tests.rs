use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bevy::time::TimeUpdateStrategy;

use super::*;
use crate::audio::MusicDefinition;
use crate::components::HeadlessMode;
use crate::events::GameEventsPlugin;
use crate::fade::FadePlugin;
use crate::loadout::WeaponLoadout;
use crate::save_override::SaveOverride;
use crate::skills::{SkillBook, SkillDef};
use crate::test_support::{calls_of, CallLog, RecordingApplier, RecordingUpgrades};

const DT: f32 = 0.1;

fn weapons(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("w{i}")).collect()
}

fn skills(ids: &[&str]) -> Vec<SkillDef> {
    ids.iter().map(|id| SkillDef::new(*id)).collect()
}

struct Harness {
    config: TransitionConfig,
    library: SceneLibrary,
    services: SceneServices,
    overlay: FadeOverlay,
    snapshot: StateSnapshot,
    pending: PendingOverride,
    catalog: SkillCatalog,
    audio: AudioManager,
    use_audio: bool,
    events: GameEventBus,
    transitions: SceneTransitions,
    upgrade_calls: CallLog,
    builds: Arc<AtomicUsize>,
}

impl Harness {
    /// Town (3 weapons), Hub (3 weapons) and Arena (2 weapons), starting in
    /// `start`.
    fn new(start: &str) -> Self {
        let upgrade_calls = CallLog::default();
        let builds = Arc::new(AtomicUsize::new(0));
        let mut library = SceneLibrary::default();
        for (name, slots, load_frames) in [("Town", 3, 1), ("Hub", 3, 1), ("Arena", 2, 2)] {
            let calls = upgrade_calls.clone();
            let builds = builds.clone();
            library.insert_scene(name, load_frames, move |services: &mut SceneServices| {
                builds.fetch_add(1, Ordering::SeqCst);
                services.register_loadout(WeaponLoadout::new(weapons(slots)));
                services.register_skills(SkillBook::default());
                services.register_upgrades(RecordingUpgrades {
                    calls: calls.clone(),
                });
            });
        }

        let mut audio = AudioManager::default();
        audio.music.insert(
            "hub_theme".into(),
            MusicDefinition {
                path: "music/hub.ogg".into(),
                volume: 1.0,
                looping: true,
            },
        );

        let mut harness = Self {
            config: TransitionConfig::default(),
            library,
            services: SceneServices::default(),
            overlay: FadeOverlay::default(),
            snapshot: StateSnapshot::default(),
            pending: PendingOverride::default(),
            catalog: SkillCatalog::new(skills(&["fire", "ice"]), Vec::new()),
            audio,
            use_audio: true,
            events: GameEventBus::default(),
            transitions: SceneTransitions::default(),
            upgrade_calls,
            builds,
        };
        harness.library.load_immediate(start, &mut harness.services);
        harness
    }

    fn parts(&mut self) -> (&mut SceneTransitions, TransitionContext<'_>) {
        let audio: Option<&mut dyn MusicPlayer> = if self.use_audio {
            Some(&mut self.audio)
        } else {
            None
        };
        (
            &mut self.transitions,
            TransitionContext {
                config: &self.config,
                scenes: &mut self.library,
                services: &mut self.services,
                overlay: &mut self.overlay,
                snapshot: &mut self.snapshot,
                pending: &mut self.pending,
                skills: &self.catalog,
                audio,
                events: &mut self.events,
            },
        )
    }

    /// One frame: overlay first, then the coordinator.
    fn step(&mut self) {
        self.overlay.tick(DT);
        let (transitions, mut cx) = self.parts();
        transitions.advance(DT, &mut cx);
    }

    fn reload_immediate(&mut self) -> bool {
        let (transitions, mut cx) = self.parts();
        transitions.reload_immediate(&mut cx)
    }

    fn run_until_idle(&mut self) -> usize {
        let mut steps = 0;
        while self.transitions.is_transitioning() {
            self.step();
            steps += 1;
            assert!(steps < 500, "transition never settled");
        }
        steps
    }

    fn step_until_phase(&mut self, phase: TransitionPhase) {
        let mut steps = 0;
        while self.transitions.phase() != Some(phase) {
            self.step();
            steps += 1;
            assert!(steps < 500, "never reached {phase:?}");
        }
    }

    fn loadout_index(&self) -> Option<usize> {
        self.services.loadout().map(|l| l.current_index())
    }

    fn event_names(&self) -> Vec<String> {
        self.events
            .read_new(&mut EventCursor::default())
            .into_iter()
            .map(|ev| ev.name)
            .collect()
    }
}

#[test]
fn transition_loads_behind_opaque_cover_and_fades_back() {
    let mut h = Harness::new("Town");
    assert!(h.transitions.request_transition("Arena"));

    let mut alpha_when_loaded = None;
    while h.transitions.is_transitioning() {
        h.step();
        if alpha_when_loaded.is_none() && h.library.active_scene() == "Arena" {
            alpha_when_loaded = Some(h.overlay.alpha());
        }
    }

    assert_eq!(alpha_when_loaded, Some(1.0));
    assert_eq!(h.overlay.alpha(), 0.0);
    assert!(!h.overlay.is_blocking());
    assert_eq!(h.transitions.completed(), 1);
    assert_eq!(
        h.event_names(),
        vec!["scene_transition_started", "scene_loaded", "scene_transition_finished"]
    );
}

#[test]
fn requests_during_a_transition_are_dropped() {
    let mut h = Harness::new("Town");
    assert!(h.transitions.request_transition("Arena"));
    h.step();

    assert!(!h.transitions.request_transition("Hub"));
    assert!(!h.transitions.request_reload());
    assert!(!h.reload_immediate());

    h.run_until_idle();
    assert_eq!(h.library.active_scene(), "Arena");
    assert_eq!(h.transitions.completed(), 1);
    let started = h
        .event_names()
        .into_iter()
        .filter(|n| n == "scene_transition_started")
        .count();
    assert_eq!(started, 1);
}

#[test]
fn faded_reload_returns_to_the_same_scene() {
    let mut h = Harness::new("Town");
    let builds_before = h.builds.load(Ordering::SeqCst);
    assert!(h.transitions.request_reload());
    assert_eq!(h.transitions.target(), Some(&SceneTarget::ReloadCurrent));
    h.run_until_idle();
    assert_eq!(h.library.active_scene(), "Town");
    assert_eq!(h.builds.load(Ordering::SeqCst), builds_before + 1);
}

#[test]
fn loadout_and_skills_survive_the_transition() {
    let mut h = Harness::new("Town");
    h.services.select_loadout_silently(2);
    if let Some(book) = h.services.skills_mut() {
        book.initialize_from(skills(&["fire", "ice"]), 1, true);
    }

    h.transitions.request_transition("Hub");
    h.run_until_idle();

    assert_eq!(h.loadout_index(), Some(2));
    let book = h.services.skills().expect("hub has a skill system");
    let ids: Vec<String> = book.owned_skills().into_iter().map(|s| s.id).collect();
    assert_eq!(ids, vec!["fire", "ice"]);
    assert_eq!(book.active_index(), 1);
}

#[test]
fn carried_loadout_is_clamped_to_smaller_scene() {
    let mut h = Harness::new("Town");
    h.services.select_loadout_silently(2);
    h.transitions.request_transition("Arena");
    h.run_until_idle();
    assert_eq!(h.loadout_index(), Some(1));
}

#[test]
fn loadout_is_written_again_after_scene_startup() {
    let mut h = Harness::new("Town");
    h.services.select_loadout_silently(2);
    h.transitions.request_transition("Hub");
    h.step_until_phase(TransitionPhase::DeferredReapply);
    assert_eq!(h.loadout_index(), Some(2));

    // Scene start-up resets its own rack on its first frame.
    if let Some(loadout) = h.services.loadout_mut() {
        loadout.select_index(0, true);
    }
    h.step();

    assert_eq!(h.loadout_index(), Some(2));
    assert!(matches!(h.transitions.phase(), Some(TransitionPhase::AwaitFadeIn(_))));
}

#[test]
fn pending_loadout_wins_and_is_clamped() {
    let mut h = Harness::new("Town");
    h.services.select_loadout_silently(0);
    h.pending.set(SaveOverride {
        recent_loadout_index: 3,
        ..Default::default()
    });
    h.transitions.request_transition("Arena");
    h.run_until_idle();
    assert_eq!(h.loadout_index(), Some(1));
    assert!(!h.pending.is_pending());
}

#[test]
fn late_scene_applier_suppresses_fallback() {
    let mut h = Harness::new("Town");
    h.pending.set(SaveOverride {
        owned_skill_names: vec!["fire".into()],
        upgrade_levels: [("armor".to_string(), 2)].into_iter().collect(),
        ..Default::default()
    });
    h.transitions.request_transition("Hub");
    h.step_until_phase(TransitionPhase::ReconcileOverride);

    for _ in 0..15 {
        h.step();
        assert!(h.pending.is_pending());
    }
    let applier = RecordingApplier::default();
    h.services.register_save_applier(applier.clone());
    h.step();

    assert!(!h.pending.is_pending());
    assert_eq!(applier.received().len(), 1);
    assert!(calls_of(&h.upgrade_calls).is_empty());
    let book = h.services.skills().expect("hub has a skill system");
    assert!(book.owned_skills().is_empty());

    h.run_until_idle();
    assert_eq!(applier.received().len(), 1);
}

#[test]
fn fallback_runs_after_timeout_and_clears_override() {
    let mut h = Harness::new("Town");
    h.pending.set(SaveOverride {
        recent_loadout_index: 1,
        owned_skill_names: vec!["ice".into(), "UNKNOWN".into(), "fire".into()],
        recent_skill_name: "fire".into(),
        upgrade_levels: [("armor".to_string(), 2)].into_iter().collect(),
        ..Default::default()
    });
    h.transitions.request_transition("Hub");
    h.step_until_phase(TransitionPhase::ReconcileOverride);

    let mut waited = 0;
    while h.pending.is_pending() {
        h.step();
        waited += 1;
        assert!(waited < 100, "override never reconciled");
    }
    assert!(waited as f32 * DT >= h.config.override_timeout_seconds - 1e-3);

    assert_eq!(calls_of(&h.upgrade_calls), vec!["load_from_save"]);
    assert_eq!(h.loadout_index(), Some(1));
    let book = h.services.skills().expect("hub has a skill system");
    let ids: Vec<String> = book.owned_skills().into_iter().map(|s| s.id).collect();
    assert_eq!(ids, vec!["ice", "fire"]);
    assert_eq!(book.active_index(), 1);

    h.run_until_idle();
    assert!(h.event_names().iter().any(|n| n == "save_override_applied"));
}

#[test]
fn leaving_hub_fades_music_before_the_screen() {
    let mut h = Harness::new("Hub");
    h.audio.play_background_music("hub_theme", 0.0, true);
    h.transitions.request_transition("Arena");

    h.step();
    let stop = h.audio.last_event().expect("music stop recorded");
    assert_eq!(stop.action, "stop");
    assert_eq!(stop.fade_seconds, Some(1.0));
    assert!(h.audio.current_music.is_none());

    for _ in 0..9 {
        assert!(!h.overlay.is_animating());
        assert_eq!(h.overlay.alpha(), 0.0);
        h.step();
    }
    h.step();
    h.step();
    assert!(h.overlay.is_animating() || h.overlay.alpha() > 0.0);
}

#[test]
fn hub_music_step_skipped_without_audio() {
    let mut h = Harness::new("Hub");
    h.use_audio = false;
    h.transitions.request_transition("Arena");
    h.step();
    assert!(h.overlay.is_animating());
}

#[test]
fn other_scenes_do_not_touch_music() {
    let mut h = Harness::new("Town");
    h.audio.play_background_music("hub_theme", 0.0, true);
    h.transitions.request_transition("Arena");
    h.step();
    assert_eq!(h.audio.current_music.as_deref(), Some("hub_theme"));
    assert!(h.overlay.is_animating());
}

#[test]
fn quick_reload_outside_allow_list_does_nothing() {
    let mut h = Harness::new("Town");
    h.config.quick_reload.scenes = vec!["Arena".to_string()];
    h.services.select_loadout_silently(2);
    h.overlay.set_instant(0.3);
    let builds_before = h.builds.load(Ordering::SeqCst);

    assert!(!h.reload_immediate());

    assert!(!h.transitions.is_transitioning());
    assert_eq!(h.snapshot.loadout_index(), 0);
    assert_eq!(h.overlay.alpha(), 0.3);
    assert_eq!(h.loadout_index(), Some(2));
    assert_eq!(h.builds.load(Ordering::SeqCst), builds_before);
}

#[test]
fn quick_reload_restores_state_without_fading() {
    let mut h = Harness::new("Arena");
    h.config.quick_reload.scenes = vec!["Arena".to_string()];
    h.services.select_loadout_silently(1);
    if let Some(book) = h.services.skills_mut() {
        book.initialize_from(skills(&["fire"]), 0, false);
    }
    h.overlay.fade_to(1.0, 1.0);
    h.overlay.tick(0.3);
    let builds_before = h.builds.load(Ordering::SeqCst);

    assert!(h.reload_immediate());

    assert_eq!(h.builds.load(Ordering::SeqCst), builds_before + 1);
    assert_eq!(h.overlay.alpha(), 0.0);
    assert!(!h.overlay.is_animating());
    assert!(h.transitions.is_transitioning());
    assert_eq!(h.transitions.phase(), Some(TransitionPhase::DeferredReapply));
    assert_eq!(h.loadout_index(), Some(1));
    assert_eq!(h.services.skills().map(|s| s.owned_skills().len()), Some(1));

    if let Some(loadout) = h.services.loadout_mut() {
        loadout.select_index(0, true);
    }
    h.step();

    assert_eq!(h.loadout_index(), Some(1));
    assert!(!h.transitions.is_transitioning());
    assert_eq!(h.overlay.alpha(), 0.0);
    assert_eq!(h.transitions.completed(), 1);
}

#[test]
fn quick_reload_holds_guard_until_override_settles() {
    let mut h = Harness::new("Arena");
    h.pending.set(SaveOverride {
        recent_loadout_index: 0,
        ..Default::default()
    });
    assert!(h.reload_immediate());
    h.step();
    assert_eq!(h.transitions.phase(), Some(TransitionPhase::ReconcileOverride));
    assert!(!h.transitions.request_transition("Town"));

    h.run_until_idle();
    assert!(!h.pending.is_pending());
    assert_eq!(h.library.active_scene(), "Arena");
    assert!(h.transitions.request_transition("Town"));
}

#[test]
fn requests_arrive_through_the_event_bus() {
    let mut library = SceneLibrary::default();
    for (name, slots) in [("Hub", 3), ("Arena", 2)] {
        library.insert_scene(name, 1, move |services: &mut SceneServices| {
            services.register_loadout(WeaponLoadout::new(weapons(slots)));
        });
    }

    let mut app = App::new();
    app.add_plugins(bevy::time::TimePlugin)
        .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_millis(100)))
        .insert_resource(HeadlessMode(true))
        .insert_resource(library)
        .add_plugins((GameEventsPlugin, FadePlugin, TransitionPlugin));
    app.update();
    assert_eq!(app.world().resource::<SceneLibrary>().active_scene(), "Hub");

    {
        let mut bus = app.world_mut().resource_mut::<GameEventBus>();
        bus.emit("scene_transition_request", serde_json::json!({ "to": "Arena" }));
        bus.emit("scene_transition_request", serde_json::json!({ "to": "Hub" }));
    }
    app.update();
    assert!(app.world().resource::<SceneTransitions>().is_transitioning());

    for _ in 0..200 {
        app.update();
        if !app.world().resource::<SceneTransitions>().is_transitioning() {
            break;
        }
    }
    assert_eq!(app.world().resource::<SceneLibrary>().active_scene(), "Arena");
    assert_eq!(app.world().resource::<SceneTransitions>().completed(), 1);
}
