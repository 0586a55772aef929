use std::collections::{BTreeSet, HashMap};

use crate::scene::UpgradeLevels;

/// Upgrade levels owned by the player in the current scene.
#[derive(Clone, Debug, Default)]
pub struct UpgradeTree {
    levels: HashMap<String, u32>,
}

impl UpgradeTree {
    #[cfg(test)]
    pub fn level_of(&self, id: &str) -> u32 {
        self.levels.get(id).copied().unwrap_or(0)
    }
}

impl UpgradeLevels for UpgradeTree {
    fn load_from_save(&mut self, levels: &HashMap<String, u32>) {
        self.levels = levels
            .iter()
            .filter(|(_, level)| **level > 0)
            .map(|(id, level)| (id.clone(), *level))
            .collect();
    }

    /// Legacy saves only know ownership, which maps to level 1.
    fn load_from_legacy_names(&mut self, names: &BTreeSet<String>) {
        self.levels = names.iter().map(|id| (id.clone(), 1)).collect();
    }

    fn levels(&self) -> HashMap<String, u32> {
        self.levels.clone()
    }
}
