use bevy::prelude::*;

use super::{clamp_loadout_index, LoadoutSlots, SaveDataApplier, SkillSlots, UpgradeLevels};
use crate::save_override::SaveOverride;

/// Capabilities offered by the scene that is currently loaded.
///
/// Cleared when a scene is torn down and filled again by the loader as the
/// next scene starts. Every slot is optional.
#[derive(Resource, Default)]
pub struct SceneServices {
    loadout: Option<Box<dyn LoadoutSlots>>,
    skills: Option<Box<dyn SkillSlots>>,
    upgrades: Option<Box<dyn UpgradeLevels>>,
    save_applier: Option<Box<dyn SaveDataApplier>>,
}

impl SceneServices {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn register_loadout(&mut self, loadout: impl LoadoutSlots + 'static) {
        self.loadout = Some(Box::new(loadout));
    }

    pub fn register_skills(&mut self, skills: impl SkillSlots + 'static) {
        self.skills = Some(Box::new(skills));
    }

    pub fn register_upgrades(&mut self, upgrades: impl UpgradeLevels + 'static) {
        self.upgrades = Some(Box::new(upgrades));
    }

    #[cfg(test)]
    pub fn register_save_applier(&mut self, applier: impl SaveDataApplier + 'static) {
        self.save_applier = Some(Box::new(applier));
    }

    pub fn loadout(&self) -> Option<&dyn LoadoutSlots> {
        self.loadout.as_deref()
    }

    pub fn loadout_mut(&mut self) -> Option<&mut (dyn LoadoutSlots + 'static)> {
        self.loadout.as_deref_mut()
    }

    pub fn skills(&self) -> Option<&dyn SkillSlots> {
        self.skills.as_deref()
    }

    pub fn skills_mut(&mut self) -> Option<&mut (dyn SkillSlots + 'static)> {
        self.skills.as_deref_mut()
    }

    pub fn upgrades(&self) -> Option<&dyn UpgradeLevels> {
        self.upgrades.as_deref()
    }

    pub fn upgrades_mut(&mut self) -> Option<&mut (dyn UpgradeLevels + 'static)> {
        self.upgrades.as_deref_mut()
    }

    pub fn has_save_applier(&self) -> bool {
        self.save_applier.is_some()
    }

    /// Hands `data` to the scene's rich applier. Returns false if the scene
    /// has none.
    pub fn apply_save_data(&mut self, data: &SaveOverride) -> bool {
        match self.save_applier.as_mut() {
            Some(applier) => {
                applier.apply_save_data(data);
                true
            }
            None => false,
        }
    }

    /// Silently selects `index`, clamped to the scene's slots. Returns the
    /// index actually applied.
    pub fn select_loadout_silently(&mut self, index: usize) -> Option<usize> {
        let loadout = self.loadout.as_mut()?;
        let clamped = clamp_loadout_index(index, loadout.slot_count())?;
        loadout.select_index(clamped, true);
        Some(clamped)
    }
}
