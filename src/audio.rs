use std::collections::HashMap;

use bevy::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::events::{str_field, EventCursor, GameEventBus};
use crate::scene::{SceneLibrary, SceneServices};

const MAX_AUDIO_EVENTS: usize = 256;
const EQUIP_SFX: &str = "equip";

fn default_volume() -> f32 {
    1.0
}

fn default_looping() -> bool {
    true
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SfxDefinition {
    pub path: String,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default)]
    pub pitch_variance: f32,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct MusicDefinition {
    pub path: String,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default = "default_looping")]
    pub looping: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AudioEventLog {
    pub frame: u64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub name: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fade_seconds: Option<f32>,
}

/// Background music control used by scene transitions. Fire-and-forget:
/// callers wait out the fade themselves.
pub trait MusicPlayer {
    fn play_background_music(&mut self, track: &str, fade_seconds: f32, looping: bool);
    fn stop_background_music(&mut self, fade_seconds: f32);
}

#[derive(Resource)]
pub struct AudioManager {
    pub sfx: HashMap<String, SfxDefinition>,
    pub music: HashMap<String, MusicDefinition>,
    pub current_music: Option<String>,
    pub master_volume: f32,
    pub sfx_volume: f32,
    pub music_volume: f32,
    pub recent_events: Vec<AudioEventLog>,
    frame: u64,
}

impl Default for AudioManager {
    fn default() -> Self {
        Self {
            sfx: HashMap::new(),
            music: HashMap::new(),
            current_music: None,
            master_volume: 1.0,
            sfx_volume: 1.0,
            music_volume: 1.0,
            recent_events: Vec::new(),
            frame: 0,
        }
    }
}

impl AudioManager {
    pub fn with_definitions(
        music: HashMap<String, MusicDefinition>,
        sfx: HashMap<String, SfxDefinition>,
    ) -> Self {
        Self {
            music,
            sfx,
            ..Default::default()
        }
    }

    pub fn play_sfx(&mut self, name: &str, volume_scale: Option<f32>) -> Result<(), String> {
        let Some(def) = self.sfx.get(name) else {
            return Err(format!("Unknown sfx: {name}"));
        };
        let volume = def.volume * self.sfx_volume * self.master_volume * volume_scale.unwrap_or(1.0);
        let variance = def.pitch_variance.abs();
        let pitch = (variance > 0.0).then(|| 1.0 + rand::thread_rng().gen_range(-variance..=variance));
        self.push_event("sfx", name, "play", Some(volume), pitch, None);
        Ok(())
    }

    #[cfg(test)]
    pub fn last_event(&self) -> Option<&AudioEventLog> {
        self.recent_events.last()
    }

    fn push_event(
        &mut self,
        event_type: &str,
        name: &str,
        action: &str,
        volume: Option<f32>,
        pitch: Option<f32>,
        fade_seconds: Option<f32>,
    ) {
        self.recent_events.push(AudioEventLog {
            frame: self.frame,
            event_type: event_type.to_string(),
            name: name.to_string(),
            action: action.to_string(),
            volume,
            pitch,
            fade_seconds,
        });
        if self.recent_events.len() > MAX_AUDIO_EVENTS {
            let excess = self.recent_events.len() - MAX_AUDIO_EVENTS;
            self.recent_events.drain(0..excess);
        }
    }
}

impl MusicPlayer for AudioManager {
    fn play_background_music(&mut self, track: &str, fade_seconds: f32, looping: bool) {
        if self.current_music.as_deref() == Some(track) {
            return;
        }
        let Some(def) = self.music.get(track) else {
            warn!("[Scenekeeper audio] Unknown music track: {track}");
            return;
        };
        let volume = def.volume * self.music_volume * self.master_volume;
        self.current_music = Some(track.to_string());
        let action = if looping { "loop" } else { "start" };
        self.push_event("music", track, action, Some(volume), None, Some(fade_seconds.max(0.0)));
    }

    fn stop_background_music(&mut self, fade_seconds: f32) {
        if let Some(name) = self.current_music.take() {
            self.push_event("music", &name, "stop", None, None, Some(fade_seconds.max(0.0)));
        }
    }
}

#[derive(Resource, Default)]
struct AudioEventCursor(EventCursor);

pub struct AudioPlugin;

impl Plugin for AudioPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<AudioManager>()
            .insert_resource(AudioEventCursor::default())
            .add_systems(Update, (sync_audio_frame, start_scene_music, play_equip_cues).chain());
    }
}

fn sync_audio_frame(bus: Res<GameEventBus>, mut audio: ResMut<AudioManager>) {
    audio.frame = bus.frame;
}

/// A freshly loaded scene starts its own music.
fn start_scene_music(
    mut audio: ResMut<AudioManager>,
    bus: Res<GameEventBus>,
    library: Option<Res<SceneLibrary>>,
    mut cursor: ResMut<AudioEventCursor>,
) {
    for ev in bus.read_new(&mut cursor.0) {
        if ev.name != "scene_loaded" {
            continue;
        }
        let cue = str_field(&ev.data, "scene")
            .and_then(|scene| library.as_ref().and_then(|l| l.music_for(scene)));
        if let Some(cue) = cue {
            audio.play_background_music(&cue.track, cue.fade_in, cue.looping);
        }
    }
}

/// Equip sounds for player-driven weapon changes.
fn play_equip_cues(mut audio: ResMut<AudioManager>, mut services: ResMut<SceneServices>) {
    let Some(loadout) = services.loadout_mut() else {
        return;
    };
    for _weapon in loadout.take_equip_cues() {
        if let Err(e) = audio.play_sfx(EQUIP_SFX, None) {
            debug!("[Scenekeeper audio] {e}");
        }
    }
}
