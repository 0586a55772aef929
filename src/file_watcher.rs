use bevy::prelude::*;
use crossbeam_channel::Receiver;
use notify::{Event as NotifyEvent, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};

use crate::config::{config_path, parse_transition_section, TransitionConfig};

pub struct FileWatcherPlugin;

pub enum FileWatchEvent {
    ConfigChanged(String),
}

#[derive(Resource)]
pub struct FileWatcherReceiver(pub Receiver<FileWatchEvent>);

impl Plugin for FileWatcherPlugin {
    fn build(&self, app: &mut App) {
        let (tx, rx) = crossbeam_channel::unbounded::<FileWatchEvent>();
        app.insert_resource(FileWatcherReceiver(rx));

        let path = PathBuf::from(config_path());
        std::thread::spawn(move || {
            run_watcher(tx, path);
        });

        app.add_systems(Update, process_file_watch_events);
    }
}

fn run_watcher(tx: crossbeam_channel::Sender<FileWatchEvent>, config_pb: PathBuf) {
    let tx_clone = tx.clone();
    let config_pb_clone = config_pb.clone();

    let mut watcher: RecommendedWatcher =
        match notify::recommended_watcher(move |res: Result<NotifyEvent, notify::Error>| {
            if let Ok(event) = res {
                handle_fs_event(event, &tx_clone, &config_pb_clone);
            }
        }) {
            Ok(w) => w,
            Err(e) => {
                eprintln!("[Scenekeeper FileWatcher] Failed to create watcher: {e}");
                return;
            }
        };

    // notify needs a directory for single files
    let parent = match config_pb.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if !parent.exists() {
        return;
    }
    if let Err(e) = watcher.watch(&parent, RecursiveMode::NonRecursive) {
        eprintln!("[Scenekeeper FileWatcher] Failed to watch config dir: {e}");
        return;
    }
    println!("[Scenekeeper FileWatcher] Watching config: {}", config_pb.display());

    // The watcher is dropped when this thread exits.
    loop {
        std::thread::sleep(std::time::Duration::from_secs(60));
    }
}

fn handle_fs_event(
    event: NotifyEvent,
    tx: &crossbeam_channel::Sender<FileWatchEvent>,
    config_path: &Path,
) {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return;
    }
    for path in &event.paths {
        if path_matches(path, config_path) {
            if let Ok(content) = std::fs::read_to_string(path) {
                let _ = tx.send(FileWatchEvent::ConfigChanged(content));
            }
        }
    }
}

fn path_matches(a: &Path, b: &Path) -> bool {
    let ca = std::fs::canonicalize(a).unwrap_or_else(|_| a.to_path_buf());
    let cb = std::fs::canonicalize(b).unwrap_or_else(|_| b.to_path_buf());
    ca == cb
}

/// Swaps in the new `transitions` section. A running transition reads the
/// config every step, so new timings apply from the next phase on.
pub fn apply_config_change(config: &mut TransitionConfig, content: &str) -> Result<(), String> {
    let updated = parse_transition_section(content)?;
    *config = updated;
    Ok(())
}

fn process_file_watch_events(
    watcher: Option<Res<FileWatcherReceiver>>,
    mut config: ResMut<TransitionConfig>,
) {
    let Some(watcher) = watcher else { return };

    for event in watcher.0.try_iter().take(16) {
        match event {
            FileWatchEvent::ConfigChanged(content) => {
                println!("[Scenekeeper FileWatcher] Reloading transition config...");
                if let Err(e) = apply_config_change(&mut config, &content) {
                    eprintln!("[Scenekeeper FileWatcher] Config parse error: {e}");
                }
            }
        }
    }
}
