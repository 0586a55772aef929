use std::collections::VecDeque;

use bevy::prelude::*;

const MAX_EVENTS: usize = 500;

#[derive(Clone, Debug)]
pub struct GameEvent {
    pub seq: u64,
    pub name: String,
    pub data: serde_json::Value,
    pub frame: u64,
}

/// Bounded log of game events shared by every subsystem.
///
/// Consumers keep their own [`EventCursor`] so each one sees every event
/// exactly once, including events emitted later in the same frame.
#[derive(Resource, Default)]
pub struct GameEventBus {
    pub recent: VecDeque<GameEvent>,
    pub frame: u64,
    pub dropped_events: u64,
    next_seq: u64,
    last_overflow_log_frame: u64,
}

/// Read position of one consumer in the [`GameEventBus`].
#[derive(Default, Clone, Copy, Debug)]
pub struct EventCursor {
    next_seq: u64,
}

impl GameEventBus {
    pub fn emit(&mut self, name: impl Into<String>, data: serde_json::Value) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        self.recent.push_back(GameEvent {
            seq,
            name: name.into(),
            data,
            frame: self.frame,
        });
        if self.recent.len() > MAX_EVENTS {
            let excess = self.recent.len() - MAX_EVENTS;
            for _ in 0..excess {
                self.recent.pop_front();
            }
            self.dropped_events = self.dropped_events.saturating_add(excess as u64);
            if self.frame.saturating_sub(self.last_overflow_log_frame) >= 60 {
                self.last_overflow_log_frame = self.frame;
                warn!(
                    "[Scenekeeper events] Dropped {} buffered events (total dropped: {})",
                    excess, self.dropped_events
                );
            }
        }
    }

    /// Events emitted since `cursor` last read, advancing it past them.
    pub fn read_new(&self, cursor: &mut EventCursor) -> Vec<GameEvent> {
        let fresh: Vec<GameEvent> = self
            .recent
            .iter()
            .filter(|ev| ev.seq >= cursor.next_seq)
            .cloned()
            .collect();
        cursor.next_seq = self.next_seq;
        fresh
    }

    #[cfg(test)]
    pub fn any_named(&self, name: &str) -> bool {
        self.recent.iter().any(|ev| ev.name == name)
    }
}

/// Reads a trimmed, non-empty string field from an event payload.
pub fn str_field<'a>(data: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    data.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

pub struct GameEventsPlugin;

impl Plugin for GameEventsPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(GameEventBus::default())
            .add_systems(First, tick_event_frame);
    }
}

fn tick_event_frame(mut bus: ResMut<GameEventBus>) {
    bus.frame = bus.frame.saturating_add(1);
}
