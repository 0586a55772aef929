use crate::scene::LoadoutSlots;

/// The player's weapon rack for the current scene.
#[derive(Clone, Debug, Default)]
pub struct WeaponLoadout {
    pub slots: Vec<String>,
    current: usize,
    equip_cues: Vec<String>,
}

impl WeaponLoadout {
    pub fn new(slots: Vec<String>) -> Self {
        Self {
            slots,
            current: 0,
            equip_cues: Vec::new(),
        }
    }

    pub fn current_weapon(&self) -> Option<&str> {
        self.slots.get(self.current).map(String::as_str)
    }
}

impl LoadoutSlots for WeaponLoadout {
    fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn current_index(&self) -> usize {
        self.current
    }

    fn select_index(&mut self, index: usize, silent: bool) {
        if self.slots.is_empty() {
            return;
        }
        let index = index.min(self.slots.len() - 1);
        let changed = index != self.current;
        self.current = index;
        if changed && !silent {
            if let Some(weapon) = self.current_weapon().map(str::to_string) {
                self.equip_cues.push(weapon);
            }
        }
    }

    fn take_equip_cues(&mut self) -> Vec<String> {
        std::mem::take(&mut self.equip_cues)
    }
}
