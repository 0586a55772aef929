//! Per-scene collaborators and the loader that swaps them.
//!
//! Gameplay subsystems live inside a scene and disappear with it. The core
//! never names their concrete types: it asks [`SceneServices`] for a
//! capability and skips the step when the current scene does not offer it.

mod library;
mod services;

use std::collections::{BTreeSet, HashMap};

use crate::save_override::SaveOverride;
use crate::skills::SkillDef;

pub use library::{LoadProgress, SceneLibrary, SceneLoader, SceneManifest, SceneMusicCue};
pub use services::SceneServices;

/// Weapon/item slots the player can switch between.
pub trait LoadoutSlots: Send + Sync {
    fn slot_count(&self) -> usize;
    fn current_index(&self) -> usize;
    /// `silent` suppresses equip sounds and UI feedback.
    fn select_index(&mut self, index: usize, silent: bool);
    /// Player-driven cycling; always audible.
    fn cycle(&mut self, forward: bool) {
        let count = self.slot_count();
        if count < 2 {
            return;
        }
        let current = self.current_index().min(count - 1);
        let next = if forward {
            (current + 1) % count
        } else {
            (current + count - 1) % count
        };
        self.select_index(next, false);
    }
    /// Feedback cues queued by non-silent selections since the last call.
    fn take_equip_cues(&mut self) -> Vec<String> {
        Vec::new()
    }
}

pub trait SkillSlots: Send + Sync {
    fn owned_skills(&self) -> Vec<SkillDef>;
    fn active_index(&self) -> usize;
    fn initialize_from(&mut self, skills: Vec<SkillDef>, active_index: usize, reset_cooldowns: bool);
    fn cycle_active(&mut self) {}
    fn trigger_active(&mut self) -> Option<String> {
        None
    }
    fn tick_cooldowns(&mut self, _dt: f32) {}
}

pub trait UpgradeLevels: Send + Sync {
    fn load_from_save(&mut self, levels: &HashMap<String, u32>);
    fn load_from_legacy_names(&mut self, names: &BTreeSet<String>);
    fn levels(&self) -> HashMap<String, u32>;
}

/// Scene-provided applier that knows how to restore a whole save record.
/// When present it replaces the built-in reconciliation entirely.
pub trait SaveDataApplier: Send + Sync {
    fn apply_save_data(&mut self, data: &SaveOverride);
}

/// Clamps a loadout index to the available slots; `None` when there are none.
pub fn clamp_loadout_index(index: usize, slot_count: usize) -> Option<usize> {
    if slot_count == 0 {
        None
    } else {
        Some(index.min(slot_count - 1))
    }
}
