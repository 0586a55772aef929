//! Built-in restore of a pending override for scenes that do not provide
//! their own [`SaveDataApplier`](crate::scene::SaveDataApplier).

use std::collections::{HashMap, HashSet};

use bevy::prelude::*;

use crate::save_override::{PendingOverride, SaveOverride, UpgradeRecord};
use crate::scene::{clamp_loadout_index, SceneServices};
use crate::skills::{SkillDef, SkillResolver};

/// What the fallback managed to restore.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReconcileReport {
    pub loadout_index: Option<usize>,
    pub skills: Vec<String>,
    pub active_skill_index: Option<usize>,
    pub dropped_skills: Vec<String>,
    pub upgrade_format: Option<&'static str>,
}

/// Consumes the pending override and fans it out to the loadout, skill and
/// upgrade collaborators of the current scene.
///
/// The override is cleared even when parts of it could not be applied, so a
/// later transition never replays stale data.
pub fn apply_pending_override(
    pending: &mut PendingOverride,
    services: &mut SceneServices,
    resolver: &dyn SkillResolver,
) -> Option<ReconcileReport> {
    let data = pending.take()?;
    let report = reconcile(&data, services, resolver);
    info!(
        "[Scenekeeper reconcile] Restored loadout {:?}, {} skill(s), upgrades {:?}; dropped {:?}",
        report.loadout_index,
        report.skills.len(),
        report.upgrade_format,
        report.dropped_skills
    );
    Some(report)
}

fn reconcile(data: &SaveOverride, services: &mut SceneServices, resolver: &dyn SkillResolver) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    if let Some(record) = data.upgrade_record() {
        if let Some(upgrades) = services.upgrades_mut() {
            match &record {
                UpgradeRecord::Levels(levels) => upgrades.load_from_save(levels),
                UpgradeRecord::LegacyNames(names) => upgrades.load_from_legacy_names(names),
            }
            report.upgrade_format = Some(record.format_name());
        }
    }

    let (skills, dropped) = resolve_skills(&data.owned_skill_names, resolver);
    report.dropped_skills = dropped;
    if !skills.is_empty() {
        if let Some(skill_slots) = services.skills_mut() {
            let active = active_skill_position(&skills, &data.recent_skill_name);
            report.skills = skills.iter().map(|s| s.id.clone()).collect();
            report.active_skill_index = Some(active);
            skill_slots.initialize_from(skills, active, true);
        }
    }

    if let Some(loadout) = services.loadout_mut() {
        let wanted = data
            .loadout_override()
            .unwrap_or_else(|| loadout.current_index());
        if let Some(index) = clamp_loadout_index(wanted, loadout.slot_count()) {
            loadout.select_index(index, true);
            report.loadout_index = Some(index);
        }
    }

    report
}

/// Resolves saved identifiers in their stored order. The curated table is
/// tried first; only if it misses something is the full loadable pool
/// scanned. Duplicates and unknown identifiers are dropped.
pub fn resolve_skills(names: &[String], resolver: &dyn SkillResolver) -> (Vec<SkillDef>, Vec<String>) {
    let mut seen = HashSet::new();
    let unique: Vec<&str> = names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty() && seen.insert(*n))
        .collect();

    let mut slots: Vec<Option<SkillDef>> = unique.iter().map(|id| resolver.lookup(id)).collect();

    if slots.iter().any(Option::is_none) {
        let mut pool: HashMap<String, SkillDef> = HashMap::new();
        for skill in resolver.scan_loadable() {
            pool.entry(skill.id.clone()).or_insert(skill);
        }
        for (slot, id) in slots.iter_mut().zip(&unique) {
            if slot.is_none() {
                *slot = pool.get(*id).cloned();
            }
        }
    }

    let mut resolved = Vec::with_capacity(slots.len());
    let mut dropped = Vec::new();
    for (slot, id) in slots.into_iter().zip(unique) {
        match slot {
            Some(skill) => resolved.push(skill),
            None => dropped.push(id.to_string()),
        }
    }
    (resolved, dropped)
}

fn active_skill_position(skills: &[SkillDef], recent: &str) -> usize {
    let recent = recent.trim();
    if recent.is_empty() {
        return 0;
    }
    skills.iter().position(|s| s.id == recent).unwrap_or(0)
}
