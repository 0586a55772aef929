use std::collections::{BTreeSet, HashMap};

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::snapshot::StateSnapshot;

fn no_loadout() -> i32 {
    -1
}

/// State produced by a save-file load or a quick-reload event that should
/// win over the ambient snapshot on the next scene settle.
///
/// Skills are stored by identifier because the record can be built before
/// the skill database of the target scene exists.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaveOverride {
    /// `-1` means "keep whatever the scene has".
    #[serde(default = "no_loadout")]
    pub recent_loadout_index: i32,
    #[serde(default)]
    pub owned_skill_names: Vec<String>,
    #[serde(default)]
    pub recent_skill_name: String,
    #[serde(default)]
    pub upgrade_levels: HashMap<String, u32>,
    /// Legacy saves only recorded which upgrades were owned.
    #[serde(default)]
    pub owned_upgrade_names: Vec<String>,
}

impl Default for SaveOverride {
    fn default() -> Self {
        Self {
            recent_loadout_index: no_loadout(),
            owned_skill_names: Vec::new(),
            recent_skill_name: String::new(),
            upgrade_levels: HashMap::new(),
            owned_upgrade_names: Vec::new(),
        }
    }
}

/// Upgrade payload resolved from whichever format a save carried.
#[derive(Clone, Debug, PartialEq)]
pub enum UpgradeRecord {
    Levels(HashMap<String, u32>),
    LegacyNames(BTreeSet<String>),
}

impl UpgradeRecord {
    pub fn format_name(&self) -> &'static str {
        match self {
            UpgradeRecord::Levels(_) => "levels",
            UpgradeRecord::LegacyNames(_) => "legacy_names",
        }
    }
}

impl SaveOverride {
    /// Builds an override from the live snapshot and upgrade levels.
    pub fn from_snapshot(snapshot: &StateSnapshot, upgrade_levels: HashMap<String, u32>) -> Self {
        let skills = snapshot.owned_skills();
        Self {
            recent_loadout_index: i32::try_from(snapshot.loadout_index()).unwrap_or(i32::MAX),
            owned_skill_names: skills.iter().map(|s| s.id.clone()).collect(),
            recent_skill_name: skills
                .get(snapshot.active_skill_index())
                .map(|s| s.id.clone())
                .unwrap_or_default(),
            upgrade_levels,
            owned_upgrade_names: Vec::new(),
        }
    }

    /// The loadout index this override asks for, if any.
    pub fn loadout_override(&self) -> Option<usize> {
        usize::try_from(self.recent_loadout_index).ok()
    }

    /// New-format levels win; the legacy name set is only used when no
    /// levels were saved.
    pub fn upgrade_record(&self) -> Option<UpgradeRecord> {
        if !self.upgrade_levels.is_empty() {
            return Some(UpgradeRecord::Levels(self.upgrade_levels.clone()));
        }
        let names: BTreeSet<String> = self
            .owned_upgrade_names
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect();
        if names.is_empty() {
            None
        } else {
            Some(UpgradeRecord::LegacyNames(names))
        }
    }
}

/// The single outstanding override, if one is waiting to be consumed.
#[derive(Resource, Default, Debug)]
pub struct PendingOverride(Option<SaveOverride>);

impl PendingOverride {
    pub fn set(&mut self, data: SaveOverride) {
        if self.0.is_some() {
            debug!("[Scenekeeper saves] Replacing an unconsumed pending override");
        }
        self.0 = Some(data);
    }

    pub fn peek(&self) -> Option<&SaveOverride> {
        self.0.as_ref()
    }

    pub fn take(&mut self) -> Option<SaveOverride> {
        self.0.take()
    }

    pub fn is_pending(&self) -> bool {
        self.0.is_some()
    }

    pub fn clear(&mut self) {
        self.0 = None;
    }
}
