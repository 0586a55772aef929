use bevy::prelude::*;

use crate::save_override::SaveOverride;
use crate::scene::SceneServices;
use crate::skills::{clamp_active_index, SkillDef};

/// What the player currently has, carried across every scene load.
///
/// `active_skill_index` is kept inside `[0, owned_skills.len() - 1]` (or 0
/// for an empty list) by every mutator.
#[derive(Resource, Clone, Debug, Default, PartialEq)]
pub struct StateSnapshot {
    loadout_index: usize,
    owned_skills: Vec<SkillDef>,
    active_skill_index: usize,
}

impl StateSnapshot {
    pub fn loadout_index(&self) -> usize {
        self.loadout_index
    }

    pub fn owned_skills(&self) -> &[SkillDef] {
        &self.owned_skills
    }

    pub fn active_skill_index(&self) -> usize {
        self.active_skill_index
    }

    #[cfg(test)]
    pub fn set_loadout_index(&mut self, index: usize) {
        self.loadout_index = index;
    }

    pub fn set_skills(&mut self, skills: Vec<SkillDef>, active_index: usize) {
        self.active_skill_index = clamp_active_index(active_index, skills.len());
        self.owned_skills = skills;
    }

    /// Pulls the live scene's loadout and skills into the snapshot. Fields
    /// whose collaborator is missing keep their previous value.
    pub fn capture(&mut self, services: &SceneServices) {
        if let Some(loadout) = services.loadout() {
            self.loadout_index = loadout.current_index();
        }
        if let Some(skills) = services.skills() {
            self.set_skills(skills.owned_skills(), skills.active_index());
        }
    }

    /// The loadout index a freshly loaded scene should receive: the pending
    /// override's choice when it has one, otherwise the captured index.
    pub fn effective_loadout_index(&self, pending: Option<&SaveOverride>) -> usize {
        pending
            .and_then(SaveOverride::loadout_override)
            .unwrap_or(self.loadout_index)
    }

    /// Pushes the snapshot into a freshly loaded scene. The loadout goes in
    /// silently since this is a restore, not a player action.
    ///
    /// Returns the loadout index that was applied so the caller can write it
    /// again one frame later, after the scene's own start-up has run.
    pub fn apply(&self, services: &mut SceneServices, pending: Option<&SaveOverride>) -> Option<usize> {
        let applied = services.select_loadout_silently(self.effective_loadout_index(pending));
        if !self.owned_skills.is_empty() {
            if let Some(skills) = services.skills_mut() {
                skills.initialize_from(self.owned_skills.clone(), self.active_skill_index, true);
            }
        }
        applied
    }

    /// Second write of the resolved loadout index.
    pub fn reapply_loadout(&self, services: &mut SceneServices, index: Option<usize>) {
        if let Some(index) = index {
            services.select_loadout_silently(index);
        }
    }
}
