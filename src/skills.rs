use std::collections::HashMap;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::scene::SkillSlots;

fn default_cooldown() -> f32 {
    1.0
}

/// A skill the player can own and cycle through.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkillDef {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default = "default_cooldown")]
    pub cooldown_seconds: f32,
}

impl SkillDef {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            cooldown_seconds: default_cooldown(),
        }
    }
}

/// Clamps an active-skill index into `[0, len - 1]`, or 0 for an empty list.
pub fn clamp_active_index(index: usize, len: usize) -> usize {
    if len == 0 {
        0
    } else {
        index.min(len - 1)
    }
}

/// Resolves saved skill identifiers back into live skill definitions.
pub trait SkillResolver {
    /// Curated lookup keyed by identifier.
    fn lookup(&self, id: &str) -> Option<SkillDef>;
    /// Every skill that could be loaded, including ones missing from the
    /// curated table.
    fn scan_loadable(&self) -> Vec<SkillDef>;
}

/// Skill database: a curated table plus the wider pool of loadable skills.
#[derive(Resource, Clone, Default)]
pub struct SkillCatalog {
    curated: HashMap<String, SkillDef>,
    loadable: Vec<SkillDef>,
}

impl SkillCatalog {
    pub fn new(curated: Vec<SkillDef>, loadable: Vec<SkillDef>) -> Self {
        Self {
            curated: curated.into_iter().map(|s| (s.id.clone(), s)).collect(),
            loadable,
        }
    }

    pub fn curated_len(&self) -> usize {
        self.curated.len()
    }
}

impl SkillResolver for SkillCatalog {
    fn lookup(&self, id: &str) -> Option<SkillDef> {
        self.curated.get(id).cloned()
    }

    fn scan_loadable(&self) -> Vec<SkillDef> {
        self.loadable.clone()
    }
}

/// Per-scene skill system: the owned skills, which one is active, and their
/// cooldowns.
#[derive(Default)]
pub struct SkillBook {
    skills: Vec<SkillDef>,
    active: usize,
    cooldowns: Vec<f32>,
}

impl SkillBook {
    #[cfg(test)]
    pub fn with_skills(skills: Vec<SkillDef>) -> Self {
        let cooldowns = vec![0.0; skills.len()];
        Self {
            skills,
            active: 0,
            cooldowns,
        }
    }

    pub fn cooldown_of(&self, id: &str) -> Option<f32> {
        self.skills
            .iter()
            .position(|s| s.id == id)
            .and_then(|i| self.cooldowns.get(i).copied())
    }
}

impl SkillSlots for SkillBook {
    fn owned_skills(&self) -> Vec<SkillDef> {
        self.skills.clone()
    }

    fn active_index(&self) -> usize {
        self.active
    }

    fn initialize_from(&mut self, skills: Vec<SkillDef>, active_index: usize, reset_cooldowns: bool) {
        let cooldowns = skills
            .iter()
            .map(|skill| {
                if reset_cooldowns {
                    0.0
                } else {
                    self.cooldown_of(&skill.id).unwrap_or(0.0)
                }
            })
            .collect();
        self.active = clamp_active_index(active_index, skills.len());
        self.skills = skills;
        self.cooldowns = cooldowns;
    }

    fn cycle_active(&mut self) {
        if !self.skills.is_empty() {
            self.active = (self.active + 1) % self.skills.len();
        }
    }

    fn trigger_active(&mut self) -> Option<String> {
        let skill = self.skills.get(self.active)?;
        let cooldown = self.cooldowns.get_mut(self.active)?;
        if *cooldown > 0.0 {
            return None;
        }
        *cooldown = skill.cooldown_seconds.max(0.0);
        Some(skill.id.clone())
    }

    fn tick_cooldowns(&mut self, dt: f32) {
        for cooldown in &mut self.cooldowns {
            *cooldown = (*cooldown - dt).max(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_handles_empty_and_overflow() {
        assert_eq!(clamp_active_index(5, 0), 0);
        assert_eq!(clamp_active_index(0, 1), 0);
        assert_eq!(clamp_active_index(7, 3), 2);
        assert_eq!(clamp_active_index(1, 3), 1);
    }

    #[test]
    fn initialize_resets_cooldowns_and_clamps_index() {
        let mut book = SkillBook::with_skills(vec![SkillDef::new("fire")]);
        assert_eq!(book.trigger_active().as_deref(), Some("fire"));
        assert!(book.cooldown_of("fire").unwrap_or(0.0) > 0.0);

        book.initialize_from(vec![SkillDef::new("fire"), SkillDef::new("ice")], 9, false);
        assert_eq!(book.active_index(), 1);
        assert!(book.cooldown_of("fire").unwrap_or(0.0) > 0.0);

        book.initialize_from(vec![SkillDef::new("fire"), SkillDef::new("ice")], 0, true);
        assert_eq!(book.cooldown_of("fire"), Some(0.0));
    }

    #[test]
    fn triggered_skill_waits_for_cooldown() {
        let mut book = SkillBook::with_skills(vec![SkillDef::new("dash")]);
        assert!(book.trigger_active().is_some());
        assert!(book.trigger_active().is_none());
        book.tick_cooldowns(2.0);
        assert!(book.trigger_active().is_some());
    }

    #[test]
    fn catalog_lookup_only_covers_curated_table() {
        let catalog = SkillCatalog::new(
            vec![SkillDef::new("fire")],
            vec![SkillDef::new("fire"), SkillDef::new("void")],
        );
        assert!(catalog.lookup("fire").is_some());
        assert!(catalog.lookup("void").is_none());
        assert_eq!(catalog.scan_loadable().len(), 2);
    }
}
