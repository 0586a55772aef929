use bevy::prelude::*;
use bevy::time::Real;

use crate::components::{HeadlessMode, MainCamera};

/// Shortest fade that is still visible; zero or negative durations are
/// treated as this.
pub const MIN_FADE_SECONDS: f32 = 0.1;

pub struct FadePlugin;

impl Plugin for FadePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(FadeOverlay::default())
            .add_systems(
                Update,
                (
                    tick_fade_overlay.in_set(FadeSet),
                    (ensure_overlay_visual, sync_overlay_visual).chain().after(FadeSet),
                ),
            );
    }
}

/// Overlay animation step; transition driving runs after it.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct FadeSet;

/// Waitable id of one fade animation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FadeHandle(u64);

struct FadeAnimation {
    id: u64,
    from: f32,
    to: f32,
    duration: f32,
    elapsed: f32,
    /// Frames to keep the starting alpha before interpolating.
    hold_steps: u32,
}

/// Full-screen cover driven by real time, so it keeps animating while the
/// game is paused or a scene is loading.
#[derive(Resource, Default)]
pub struct FadeOverlay {
    alpha: f32,
    active: Option<FadeAnimation>,
    next_id: u64,
}

impl FadeOverlay {
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Input must not reach the scene while a fade towards a visible cover
    /// is running or the cover is fully opaque.
    pub fn is_blocking(&self) -> bool {
        self.alpha >= 1.0 || self.active.as_ref().is_some_and(|a| a.to > 0.0)
    }

    #[cfg(test)]
    pub fn is_animating(&self) -> bool {
        self.active.is_some()
    }

    /// Sets opacity immediately. An in-flight fade keeps running from here.
    pub fn set_instant(&mut self, alpha: f32) {
        self.alpha = alpha.clamp(0.0, 1.0);
    }

    /// Starts a linear fade to `alpha`, superseding any running fade.
    pub fn fade_to(&mut self, alpha: f32, duration: f32) -> FadeHandle {
        self.start(alpha, duration, 0)
    }

    /// Snaps to black and keeps it for one whole frame before fading out, so
    /// the opaque frame is actually presented.
    pub fn fade_in_from_black(&mut self, duration: f32) -> FadeHandle {
        self.set_instant(1.0);
        self.start(0.0, duration, 1)
    }

    /// Drops any running fade and clears the cover at once.
    pub fn force_clear(&mut self) {
        self.active = None;
        self.set_instant(0.0);
    }

    /// True once the fade behind `handle` reached its target or was
    /// superseded by a newer one.
    pub fn is_finished(&self, handle: FadeHandle) -> bool {
        self.active.as_ref().map_or(true, |a| a.id != handle.0)
    }

    fn start(&mut self, to: f32, duration: f32, hold_steps: u32) -> FadeHandle {
        self.next_id = self.next_id.wrapping_add(1);
        let id = self.next_id;
        self.active = Some(FadeAnimation {
            id,
            from: self.alpha,
            to: to.clamp(0.0, 1.0),
            duration: duration.max(MIN_FADE_SECONDS),
            elapsed: 0.0,
            hold_steps,
        });
        FadeHandle(id)
    }

    /// Advances the running fade by `dt` real seconds.
    pub fn tick(&mut self, dt: f32) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.hold_steps > 0 {
            active.hold_steps -= 1;
            return;
        }
        active.elapsed += dt.max(0.0);
        let t = (active.elapsed / active.duration).clamp(0.0, 1.0);
        self.alpha = active.from + (active.to - active.from) * t;
        if active.elapsed >= active.duration {
            self.alpha = active.to;
            self.active = None;
        }
    }
}

pub fn tick_fade_overlay(time: Res<Time<Real>>, mut overlay: ResMut<FadeOverlay>) {
    overlay.tick(time.delta_secs());
}

/// Gameplay input run condition.
pub fn input_unblocked(overlay: Res<FadeOverlay>) -> bool {
    !overlay.is_blocking()
}

/// Marker for the overlay sprite.
#[derive(Component)]
pub struct FadeOverlayVisual;

fn ensure_overlay_visual(
    mut commands: Commands,
    headless: Res<HeadlessMode>,
    existing: Query<(), With<FadeOverlayVisual>>,
) {
    if headless.0 || !existing.is_empty() {
        return;
    }
    commands.spawn((
        FadeOverlayVisual,
        Sprite::from_color(Color::srgba(0.0, 0.0, 0.0, 0.0), Vec2::new(4096.0, 4096.0)),
        Transform::from_xyz(0.0, 0.0, 300.0),
    ));
}

fn sync_overlay_visual(
    overlay: Res<FadeOverlay>,
    camera_q: Query<&Transform, (With<MainCamera>, Without<FadeOverlayVisual>)>,
    mut overlay_q: Query<(&mut Sprite, &mut Transform), With<FadeOverlayVisual>>,
) {
    let Ok((mut sprite, mut transform)) = overlay_q.get_single_mut() else {
        return;
    };
    if let Ok(cam_transform) = camera_q.get_single() {
        transform.translation.x = cam_transform.translation.x;
        transform.translation.y = cam_transform.translation.y;
    }
    sprite.color = Color::srgba(0.0, 0.0, 0.0, overlay.alpha());
}
