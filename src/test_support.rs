//! Recording fakes for scene collaborators.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use crate::save_override::SaveOverride;
use crate::scene::{SaveDataApplier, UpgradeLevels};

pub type CallLog = Arc<Mutex<Vec<String>>>;

fn record(log: &CallLog, entry: &str) {
    if let Ok(mut calls) = log.lock() {
        calls.push(entry.to_string());
    }
}

pub fn calls_of(log: &CallLog) -> Vec<String> {
    log.lock().map(|c| c.clone()).unwrap_or_default()
}

/// Upgrade collaborator that only remembers which loader was used.
#[derive(Default)]
pub struct RecordingUpgrades {
    pub calls: CallLog,
}

impl UpgradeLevels for RecordingUpgrades {
    fn load_from_save(&mut self, _levels: &HashMap<String, u32>) {
        record(&self.calls, "load_from_save");
    }

    fn load_from_legacy_names(&mut self, _names: &BTreeSet<String>) {
        record(&self.calls, "load_from_legacy_names");
    }

    fn levels(&self) -> HashMap<String, u32> {
        HashMap::new()
    }
}

/// Scene-provided applier that stores every record handed to it.
#[derive(Default, Clone)]
pub struct RecordingApplier {
    pub received: Arc<Mutex<Vec<SaveOverride>>>,
}

impl RecordingApplier {
    pub fn received(&self) -> Vec<SaveOverride> {
        self.received.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl SaveDataApplier for RecordingApplier {
    fn apply_save_data(&mut self, data: &SaveOverride) {
        if let Ok(mut received) = self.received.lock() {
            received.push(data.clone());
        }
    }
}
