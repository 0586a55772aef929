use std::collections::HashMap;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::audio::{MusicDefinition, SfxDefinition};
use crate::scene::{SceneManifest, SceneMusicCue};
use crate::skills::{SkillCatalog, SkillDef};

/// Quick reload gate: must be enabled, and if `scenes` is non-empty the
/// current scene has to be listed.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct QuickReloadConfig {
    pub enabled: bool,
    pub scenes: Vec<String>,
}

impl Default for QuickReloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scenes: Vec::new(),
        }
    }
}

impl QuickReloadConfig {
    pub fn allows(&self, scene: &str) -> bool {
        self.enabled && (self.scenes.is_empty() || self.scenes.iter().any(|s| s == scene))
    }
}

/// Timing and routing of scene transitions.
#[derive(Resource, Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    pub pre_delay_seconds: f32,
    pub fade_out_seconds: f32,
    pub fade_in_seconds: f32,
    /// Leaving this scene fades its music out before the screen goes dark.
    pub hub_scene: Option<String>,
    pub hub_music_fade_seconds: f32,
    /// How long a pending override waits for a scene-provided applier.
    pub override_timeout_seconds: f32,
    pub quick_reload: QuickReloadConfig,
    pub start_scene: String,
    pub save_path: String,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            pre_delay_seconds: 0.0,
            fade_out_seconds: 0.5,
            fade_in_seconds: 0.5,
            hub_scene: Some("Hub".to_string()),
            hub_music_fade_seconds: 1.0,
            override_timeout_seconds: 2.0,
            quick_reload: QuickReloadConfig::default(),
            start_scene: "Hub".to_string(),
            save_path: "savegame.json".to_string(),
        }
    }
}

impl TransitionConfig {
    pub fn is_hub(&self, scene: &str) -> bool {
        self.hub_scene.as_deref() == Some(scene)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillCatalogConfig {
    pub curated: Vec<SkillDef>,
    pub loadable: Vec<SkillDef>,
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub music: HashMap<String, MusicDefinition>,
    pub sfx: HashMap<String, SfxDefinition>,
}

/// Contents of `game.json`. Every section is optional.
#[derive(Deserialize, Default)]
pub struct StartupConfig {
    pub window_title: Option<String>,
    pub window_width: Option<f32>,
    pub window_height: Option<f32>,
    pub background_color: Option<[f32; 3]>,
    pub assets_dir: Option<String>,
    #[serde(default)]
    pub transitions: TransitionConfig,
    #[serde(default)]
    pub scenes: HashMap<String, SceneManifest>,
    #[serde(default)]
    pub skills: SkillCatalogConfig,
    #[serde(default)]
    pub audio: AudioConfig,
}

impl StartupConfig {
    pub fn skill_catalog(&self) -> SkillCatalog {
        SkillCatalog::new(self.skills.curated.clone(), self.skills.loadable.clone())
    }

    /// Fills the scene table with the built-in demo scenes when the config
    /// file declares none.
    pub fn with_builtin_scenes(mut self) -> Self {
        if self.scenes.is_empty() {
            self.scenes = builtin_scenes();
        }
        if self.skills.curated.is_empty() && self.skills.loadable.is_empty() {
            self.skills.curated = ["fire", "ice", "dash"].into_iter().map(SkillDef::new).collect();
            self.skills.loadable = ["fire", "ice", "dash", "quake"].into_iter().map(SkillDef::new).collect();
        }
        self
    }
}

fn builtin_scenes() -> HashMap<String, SceneManifest> {
    let weapons: Vec<String> = ["sword", "bow", "staff"].into_iter().map(String::from).collect();
    let cue = |track: &str| {
        Some(SceneMusicCue {
            track: track.to_string(),
            fade_in: 1.0,
            looping: true,
        })
    };
    HashMap::from([
        (
            "Hub".to_string(),
            SceneManifest {
                weapon_slots: weapons.clone(),
                skill_system: true,
                upgrades: true,
                load_frames: 2,
                music: cue("hub_theme"),
            },
        ),
        (
            "Arena".to_string(),
            SceneManifest {
                weapon_slots: weapons[..2].to_vec(),
                skill_system: true,
                upgrades: true,
                load_frames: 4,
                music: cue("arena_theme"),
            },
        ),
        (
            "Quiz".to_string(),
            SceneManifest {
                weapon_slots: Vec::new(),
                skill_system: false,
                upgrades: false,
                load_frames: 1,
                music: cue("quiz_theme"),
            },
        ),
    ])
}

pub fn config_path() -> String {
    std::env::var("SCENEKEEPER_GAME_CONFIG")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "game.json".to_string())
}

pub fn parse_startup_config(contents: &str) -> Result<StartupConfig, String> {
    serde_json::from_str::<StartupConfig>(contents).map_err(|e| e.to_string())
}

/// Re-reads only the `transitions` section, for hot reload.
pub fn parse_transition_section(contents: &str) -> Result<TransitionConfig, String> {
    #[derive(Deserialize)]
    struct Section {
        #[serde(default)]
        transitions: TransitionConfig,
    }
    serde_json::from_str::<Section>(contents)
        .map(|s| s.transitions)
        .map_err(|e| e.to_string())
}

pub fn load_startup_config() -> StartupConfig {
    let path = config_path();
    let config = match std::fs::read_to_string(&path) {
        Ok(contents) => match parse_startup_config(&contents) {
            Ok(cfg) => {
                println!("[Scenekeeper] Loaded startup config from {}", path);
                cfg
            }
            Err(e) => {
                eprintln!("[Scenekeeper] Failed to parse {}: {}", path, e);
                StartupConfig::default()
            }
        },
        Err(_) => StartupConfig::default(),
    };
    config.with_builtin_scenes()
}
