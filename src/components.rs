use bevy::prelude::*;

/// Running without a window: no camera, no overlay sprite.
#[derive(Resource, Clone, Copy, Default)]
pub struct HeadlessMode(pub bool);

/// Marks the camera the fade overlay follows.
#[derive(Component)]
pub struct MainCamera;

pub fn spawn_camera(mut commands: Commands, headless: Res<HeadlessMode>) {
    if headless.0 {
        return;
    }
    commands.spawn((MainCamera, Camera2d, Transform::from_xyz(0.0, 0.0, 100.0)));
}
