use std::collections::HashMap;
use std::sync::Arc;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::SceneServices;
use crate::loadout::WeaponLoadout;
use crate::skills::SkillBook;
use crate::upgrades::UpgradeTree;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LoadProgress {
    Loading,
    Ready,
}

/// Moves the game between scenes.
pub trait SceneLoader {
    fn active_scene(&self) -> &str;
    /// Starts an asynchronous load; completion is observed via [`Self::poll_load`].
    fn begin_load(&mut self, scene: &str);
    /// Once the load completes the new scene's collaborators are registered
    /// in `services` and `Ready` is returned.
    fn poll_load(&mut self, services: &mut SceneServices) -> LoadProgress;
    fn load_immediate(&mut self, scene: &str, services: &mut SceneServices);
}

fn default_load_frames() -> u32 {
    2
}

fn default_music_fade() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SceneMusicCue {
    pub track: String,
    #[serde(default = "default_music_fade")]
    pub fade_in: f32,
    #[serde(default = "default_true")]
    pub looping: bool,
}

/// Data-driven description of what a scene provides at start-up.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SceneManifest {
    #[serde(default)]
    pub weapon_slots: Vec<String>,
    #[serde(default)]
    pub skill_system: bool,
    #[serde(default)]
    pub upgrades: bool,
    #[serde(default = "default_load_frames")]
    pub load_frames: u32,
    #[serde(default)]
    pub music: Option<SceneMusicCue>,
}

type SceneBuilder = Arc<dyn Fn(&mut SceneServices) + Send + Sync>;

#[derive(Clone)]
struct SceneEntry {
    load_frames: u32,
    music: Option<SceneMusicCue>,
    build: SceneBuilder,
}

struct InFlightLoad {
    scene: String,
    polls_remaining: u32,
}

/// Registry of known scenes and the scene that is currently active.
#[derive(Resource, Default)]
pub struct SceneLibrary {
    scenes: HashMap<String, SceneEntry>,
    active: String,
    loading: Option<InFlightLoad>,
}

impl SceneLibrary {
    pub fn from_manifests(manifests: &HashMap<String, SceneManifest>) -> Self {
        let mut library = Self::default();
        for (name, manifest) in manifests {
            let recipe = manifest.clone();
            let build: SceneBuilder = Arc::new(move |services: &mut SceneServices| {
                if !recipe.weapon_slots.is_empty() {
                    services.register_loadout(WeaponLoadout::new(recipe.weapon_slots.clone()));
                }
                if recipe.skill_system {
                    services.register_skills(SkillBook::default());
                }
                if recipe.upgrades {
                    services.register_upgrades(UpgradeTree::default());
                }
            });
            library.scenes.insert(
                name.clone(),
                SceneEntry {
                    load_frames: manifest.load_frames,
                    music: manifest.music.clone(),
                    build,
                },
            );
        }
        library
    }

    /// Registers a scene whose collaborators are produced by `build`.
    #[cfg(test)]
    pub fn insert_scene(
        &mut self,
        name: impl Into<String>,
        load_frames: u32,
        build: impl Fn(&mut SceneServices) + Send + Sync + 'static,
    ) {
        self.scenes.insert(
            name.into(),
            SceneEntry {
                load_frames,
                music: None,
                build: Arc::new(build),
            },
        );
    }

    pub fn music_for(&self, scene: &str) -> Option<&SceneMusicCue> {
        self.scenes.get(scene).and_then(|e| e.music.as_ref())
    }

    fn start_scene(&mut self, scene: &str, services: &mut SceneServices) {
        services.clear();
        match self.scenes.get(scene) {
            Some(entry) => (entry.build)(services),
            None => warn!("[Scenekeeper scenes] Unknown scene '{scene}', starting it empty"),
        }
        self.active = scene.to_string();
    }
}

impl SceneLoader for SceneLibrary {
    fn active_scene(&self) -> &str {
        &self.active
    }

    fn begin_load(&mut self, scene: &str) {
        let polls_remaining = self.scenes.get(scene).map_or(0, |e| e.load_frames);
        self.loading = Some(InFlightLoad {
            scene: scene.to_string(),
            polls_remaining,
        });
    }

    fn poll_load(&mut self, services: &mut SceneServices) -> LoadProgress {
        let Some(load) = self.loading.as_mut() else {
            return LoadProgress::Ready;
        };
        if load.polls_remaining > 0 {
            load.polls_remaining -= 1;
            return LoadProgress::Loading;
        }
        let scene = load.scene.clone();
        self.loading = None;
        self.start_scene(&scene, services);
        LoadProgress::Ready
    }

    fn load_immediate(&mut self, scene: &str, services: &mut SceneServices) {
        self.loading = None;
        self.start_scene(scene, services);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(slots: &[&str], load_frames: u32) -> SceneManifest {
        SceneManifest {
            weapon_slots: slots.iter().map(|s| s.to_string()).collect(),
            skill_system: true,
            upgrades: false,
            load_frames,
            music: None,
        }
    }

    #[test]
    fn async_load_registers_services_after_load_frames() {
        let mut manifests = HashMap::new();
        manifests.insert("Arena".to_string(), manifest(&["sword", "bow"], 2));
        let mut library = SceneLibrary::from_manifests(&manifests);
        let mut services = SceneServices::default();

        library.begin_load("Arena");
        assert_eq!(library.poll_load(&mut services), LoadProgress::Loading);
        assert_eq!(library.poll_load(&mut services), LoadProgress::Loading);
        assert!(services.loadout().is_none());
        assert_eq!(library.poll_load(&mut services), LoadProgress::Ready);
        assert_eq!(library.active_scene(), "Arena");
        assert_eq!(services.loadout().map(|l| l.slot_count()), Some(2));
        assert!(services.skills().is_some());
        assert!(services.upgrades().is_none());
    }

    #[test]
    fn unknown_scene_starts_without_collaborators() {
        let mut library = SceneLibrary::default();
        let mut services = SceneServices::default();
        services.register_upgrades(UpgradeTree::default());
        library.load_immediate("Nowhere", &mut services);
        assert_eq!(library.active_scene(), "Nowhere");
        assert!(services.upgrades().is_none());
    }
}
