//! Input aggregation: raw keyboard/mouse events become a small set of
//! persistent intents sampled by the camera and movement systems.
//!
//! Look and wheel deltas accumulate across frames and are drained by the
//! consumer (`take_look_delta` / `take_wheel_delta`), so a delta is never
//! observed twice regardless of how the render and fixed schedules interleave.

use bevy::input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::input::ButtonInput;
use bevy::prelude::*;
use tracing::debug;

/// Key and mouse-button assignments for the controller.
#[derive(Resource, Reflect, Clone)]
#[reflect(Resource)]
pub struct InputBindings {
    pub key_forward: KeyCode,
    pub key_back: KeyCode,
    pub key_left: KeyCode,
    pub key_right: KeyCode,
    pub key_run: KeyCode,
    pub key_jump: KeyCode,
    /// Free-look drag: orbits the camera without turning the body.
    pub orbit_button: MouseButton,
    /// Look-follow drag: the body turns with the camera.
    pub follow_button: MouseButton,
    /// Toggles auto-run on press.
    pub auto_run_button: MouseButton,
}

impl Default for InputBindings {
    fn default() -> Self {
        use KeyCode::*;
        Self {
            key_forward: KeyW,
            key_back: KeyS,
            key_left: KeyA,
            key_right: KeyD,
            key_run: ShiftLeft,
            key_jump: Space,
            orbit_button: MouseButton::Left,
            follow_button: MouseButton::Right,
            auto_run_button: MouseButton::Back,
        }
    }
}

/// How the camera drag currently relates to the body.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq, Default, Reflect)]
#[reflect(Resource)]
pub enum ControlMode {
    /// No follow button held: dragging orbits the camera around a
    /// stationary body, turn keys rotate the body in place.
    #[default]
    Free,
    /// Follow button held: the body yaws with the camera and turn keys
    /// strafe instead of turning.
    Follow,
}

/// Movement and look intents for the current tick.
#[derive(Resource, Debug, Clone, Default, Reflect)]
#[reflect(Resource)]
pub struct InputIntent {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub run: bool,
    pub jump: bool,
    pub auto_run: bool,
    /// Free-look button held.
    pub orbit_held: bool,
    /// Look-follow button held.
    pub follow_held: bool,
    /// Pointer motion accumulator. Read through
    /// [`take_look_delta`](Self::take_look_delta) so deltas drain.
    pub look_delta: Vec2,
    /// Wheel notch accumulator, drained by
    /// [`take_wheel_delta`](Self::take_wheel_delta).
    pub wheel_delta: f32,
}

impl InputIntent {
    /// Accumulated pointer motion since the previous call. Draining: the
    /// accumulator resets, the same motion is never returned twice.
    pub fn take_look_delta(&mut self) -> Vec2 {
        core::mem::take(&mut self.look_delta)
    }

    /// Accumulated wheel notches since the previous call, drained like
    /// [`take_look_delta`](Self::take_look_delta).
    pub fn take_wheel_delta(&mut self) -> f32 {
        core::mem::take(&mut self.wheel_delta)
    }

    pub fn accumulate_look(&mut self, delta: Vec2) {
        self.look_delta += delta;
    }

    pub fn accumulate_wheel(&mut self, notches: f32) {
        self.wheel_delta += notches;
    }

    /// Both mouse buttons held doubles as a forward intent.
    pub fn mouse_forward(&self) -> bool {
        self.orbit_held && self.follow_held
    }

    /// Forward/back axis in `{-1, 0, 1}`. Opposite keys cancel.
    pub fn forward_axis(&self) -> f32 {
        let fwd = self.forward || self.mouse_forward() || self.auto_run;
        match (fwd, self.back) {
            (true, false) => 1.0,
            (false, true) => -1.0,
            _ => 0.0,
        }
    }

    /// Left/right axis in `{-1, 0, 1}`, positive to the left. Opposite
    /// keys cancel.
    pub fn turn_axis(&self) -> f32 {
        match (self.left, self.right) {
            (true, false) => 1.0,
            (false, true) => -1.0,
            _ => 0.0,
        }
    }

    pub fn moving_forward(&self) -> bool {
        self.forward_axis() > 0.0
    }

    pub fn moving_backward(&self) -> bool {
        self.forward_axis() < 0.0
    }
}

/// Poll held keys/buttons and drain input message queues into the intent
/// accumulators. Runs every render frame so no motion is lost between
/// fixed ticks. Keys outside the binding set are ignored.
pub fn collect_input(
    bindings: Res<InputBindings>,
    keys: Res<ButtonInput<KeyCode>>,
    buttons: Res<ButtonInput<MouseButton>>,
    mut motion: MessageReader<MouseMotion>,
    mut wheel: MessageReader<MouseWheel>,
    mut intent: ResMut<InputIntent>,
) {
    let was_forward = intent.forward;

    intent.forward = keys.pressed(bindings.key_forward);
    intent.back = keys.pressed(bindings.key_back);
    intent.left = keys.pressed(bindings.key_left);
    intent.right = keys.pressed(bindings.key_right);
    intent.run = keys.pressed(bindings.key_run);
    intent.jump = keys.pressed(bindings.key_jump);
    intent.orbit_held = buttons.pressed(bindings.orbit_button);
    intent.follow_held = buttons.pressed(bindings.follow_button);

    if buttons.just_pressed(bindings.auto_run_button) {
        intent.auto_run = !intent.auto_run;
        debug!(auto_run = intent.auto_run, "auto-run toggled");
    }
    // Manual movement takes over from auto-run.
    if intent.back || (!was_forward && intent.forward) {
        intent.auto_run = false;
    }

    let mut look = Vec2::ZERO;
    for event in motion.read() {
        look += event.delta;
    }
    intent.accumulate_look(look);

    let mut notches = 0.0;
    for event in wheel.read() {
        notches += match event.unit {
            MouseScrollUnit::Line => event.y,
            MouseScrollUnit::Pixel => event.y / 16.0,
        };
    }
    intent.accumulate_wheel(notches);
}

/// Derive the control mode once per fixed tick; downstream systems dispatch
/// on the enum rather than re-checking raw button state.
pub fn derive_control_mode(intent: Res<InputIntent>, mut mode: ResMut<ControlMode>) {
    let next = if intent.follow_held {
        ControlMode::Follow
    } else {
        ControlMode::Free
    };
    if *mode != next {
        *mode = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn look_delta_drains_once() {
        let mut intent = InputIntent::default();
        intent.accumulate_look(Vec2::new(3.0, -2.0));
        intent.accumulate_look(Vec2::new(1.0, 1.0));
        assert_eq!(intent.take_look_delta(), Vec2::new(4.0, -1.0));
        assert_eq!(intent.take_look_delta(), Vec2::ZERO);
    }

    #[test]
    fn wheel_delta_drains_once() {
        let mut intent = InputIntent::default();
        intent.accumulate_wheel(2.0);
        assert!((intent.take_wheel_delta() - 2.0).abs() < 1e-6);
        assert_eq!(intent.take_wheel_delta(), 0.0);
    }

    #[test]
    fn opposite_directions_cancel() {
        let intent = InputIntent {
            forward: true,
            back: true,
            left: true,
            right: true,
            ..default()
        };
        assert_eq!(intent.forward_axis(), 0.0);
        assert_eq!(intent.turn_axis(), 0.0);
    }

    #[test]
    fn both_mouse_buttons_mean_forward() {
        let intent = InputIntent {
            orbit_held: true,
            follow_held: true,
            ..default()
        };
        assert!(intent.mouse_forward());
        assert_eq!(intent.forward_axis(), 1.0);
    }

    #[test]
    fn auto_run_counts_as_forward() {
        let intent = InputIntent {
            auto_run: true,
            ..default()
        };
        assert!(intent.moving_forward());
        // Back key overrides and cancels the axis.
        let intent = InputIntent {
            auto_run: true,
            back: true,
            ..default()
        };
        assert_eq!(intent.forward_axis(), 0.0);
    }
}
