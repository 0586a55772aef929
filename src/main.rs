#![cfg_attr(target_arch = "wasm32", allow(dead_code))]

mod audio;
mod components;
mod config;
mod events;
mod fade;
#[cfg(not(target_arch = "wasm32"))]
mod file_watcher;
mod game_runtime;
mod input;
mod loadout;
mod reconcile;
mod save_override;
mod saves;
mod scene;
mod skills;
mod snapshot;
#[cfg(test)]
mod test_support;
mod transition;
mod upgrades;

use bevy::prelude::*;
use components::HeadlessMode;
use config::load_startup_config;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let headless = args.iter().any(|a| a == "--headless");

    let startup_config = load_startup_config();
    let mut app = App::new();

    app.insert_resource(HeadlessMode(headless));

    if headless {
        // Headless mode: no window, no rendering, just ECS
        app.add_plugins(MinimalPlugins);
        app.add_plugins(bevy::state::app::StatesPlugin);
        println!("[Scenekeeper] Starting in HEADLESS mode");
    } else {
        // Env vars override game.json values
        let assets_dir = std::env::var("SCENEKEEPER_ASSETS_DIR")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| startup_config.assets_dir.clone())
            .unwrap_or_else(|| "assets".to_string());
        if assets_dir != "assets" {
            println!("[Scenekeeper] Using game assets dir: {}", assets_dir);
        }

        let window_title = startup_config
            .window_title
            .clone()
            .unwrap_or_else(|| "Scenekeeper".to_string());
        let window_width = startup_config.window_width.unwrap_or(960.0);
        let window_height = startup_config.window_height.unwrap_or(540.0);

        app.add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: window_title,
                        resolution: (window_width, window_height).into(),
                        present_mode: bevy::window::PresentMode::AutoVsync,
                        ..default()
                    }),
                    ..default()
                })
                .set(bevy::asset::AssetPlugin {
                    file_path: assets_dir,
                    ..default()
                }),
        );
        let bg = startup_config.background_color.unwrap_or([0.12, 0.18, 0.1]);
        app.insert_resource(ClearColor(Color::srgb(bg[0], bg[1], bg[2])));
        println!("[Scenekeeper] Starting in WINDOWED mode");
    }

    let catalog = startup_config.skill_catalog();
    println!(
        "[Scenekeeper] {} scene(s), {} curated skill(s), starting in '{}'",
        startup_config.scenes.len(),
        catalog.curated_len(),
        startup_config.transitions.start_scene
    );

    app.insert_resource(startup_config.transitions.clone())
        .insert_resource(scene::SceneLibrary::from_manifests(&startup_config.scenes))
        .insert_resource(catalog)
        .insert_resource(audio::AudioManager::with_definitions(
            startup_config.audio.music.clone(),
            startup_config.audio.sfx.clone(),
        ))
        .add_plugins(events::GameEventsPlugin)
        .add_plugins(input::InputPlugin)
        .add_plugins(fade::FadePlugin)
        .add_plugins(transition::TransitionPlugin)
        .add_plugins(game_runtime::RuntimeStatePlugin)
        .add_plugins(audio::AudioPlugin)
        .add_plugins(saves::SavesPlugin)
        .add_systems(Startup, components::spawn_camera);

    #[cfg(not(target_arch = "wasm32"))]
    app.add_plugins(file_watcher::FileWatcherPlugin);

    app.run();
}
