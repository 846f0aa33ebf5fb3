//! Impulse-driven locomotion on the avatar's rigid body.
//!
//! Movement is applied as central impulses so it composes with existing
//! momentum; the hard caps (horizontal speed, terminal fall) are the only
//! place velocity is written directly. Impulses are gated on the grounded
//! flag published by the previous tick's ground query, so there is no air
//! control beyond momentum already in the body.

use avian3d::prelude::*;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::animation::Locomotion;
use crate::grounded::GroundSensor;
use crate::input::{ControlMode, InputIntent};

/// Movement tuning for one avatar.
#[derive(Component, Reflect, Clone, Serialize, Deserialize)]
#[reflect(Component)]
pub struct CharacterMotor {
    /// Forward step magnitude per tick while walking.
    pub walk_impulse: f32,
    /// Forward step magnitude per tick while the run modifier is held.
    pub run_impulse: f32,
    /// Scale applied to the whole impulse vector.
    pub impulse_scale: f32,
    /// Vertical fraction added to the step on a jump tick.
    pub jump_boost: f32,
    /// Extra multiplier on the vertical component only.
    pub jump_scale: f32,
    pub max_walk_speed: f32,
    pub max_run_speed: f32,
    /// Negative. Falling faster than this gets floored.
    pub terminal_fall_speed: f32,
}

impl Default for CharacterMotor {
    fn default() -> Self {
        Self {
            walk_impulse: 0.5,
            run_impulse: 1.0,
            impulse_scale: 2.0,
            jump_boost: 0.1,
            jump_scale: 20.0,
            max_walk_speed: 2.5,
            max_run_speed: 4.5,
            terminal_fall_speed: -10.0,
        }
    }
}

/// Elapsed-time jump gate. Starts cold so a jump held from frame one still
/// waits out a full cooldown.
#[derive(Component, Reflect, Clone, Serialize, Deserialize)]
#[reflect(Component)]
pub struct JumpTimer {
    pub since_last: f32,
    pub cooldown: f32,
}

impl Default for JumpTimer {
    fn default() -> Self {
        Self {
            since_last: 0.0,
            cooldown: 0.5,
        }
    }
}

impl JumpTimer {
    pub fn tick(&mut self, dt: f32) {
        if dt >= 0.0 {
            self.since_last += dt;
        }
    }

    /// Fires once the cooldown has elapsed, resetting the timer.
    pub fn try_fire(&mut self) -> bool {
        if self.since_last > self.cooldown {
            self.since_last = 0.0;
            true
        } else {
            false
        }
    }
}

/// Build the world-space impulse for one movement tick. The step is formed
/// in body-local space (forward along -Z, a small vertical term on jump
/// ticks), rotated out by the body yaw, then the vertical component is
/// boosted and the whole vector scaled.
pub fn movement_impulse(
    motor: &CharacterMotor,
    forward_axis: f32,
    run: bool,
    jumping: bool,
    rotation: Quat,
) -> Vec3 {
    let magnitude = if run {
        motor.run_impulse
    } else {
        motor.walk_impulse
    };
    let vertical = if jumping { motor.jump_boost } else { 0.0 };
    let step = rotation * Vec3::new(0.0, vertical, -forward_axis * magnitude);
    Vec3::new(step.x, step.y * motor.jump_scale, step.z) * motor.impulse_scale
}

/// Rescale the horizontal components proportionally when their speed
/// exceeds the cap. Idempotent; zero horizontal speed passes through
/// untouched.
pub fn clamp_horizontal_speed(velocity: Vec3, max_speed: f32) -> Vec3 {
    let speed = (velocity.x * velocity.x + velocity.z * velocity.z).sqrt();
    if speed > max_speed && speed > 0.0 {
        let ratio = max_speed / speed;
        Vec3::new(velocity.x * ratio, velocity.y, velocity.z * ratio)
    } else {
        velocity
    }
}

/// Floor the vertical component at the terminal fall speed.
pub fn clamp_fall_speed(velocity: Vec3, terminal_fall_speed: f32) -> Vec3 {
    if velocity.y < terminal_fall_speed {
        velocity.with_y(terminal_fall_speed)
    } else {
        velocity
    }
}

/// Turn intent into an impulse on the body. Runs after the facing passes so
/// the body yaw already reflects this tick's steering; the grounded gate
/// reads the previous tick's contact query by design.
pub fn apply_movement(
    time: Res<Time>,
    intent: Res<InputIntent>,
    mode: Res<ControlMode>,
    mut players: Query<(
        &Transform,
        &CharacterMotor,
        &GroundSensor,
        &mut JumpTimer,
        Forces,
    )>,
) {
    let Ok((transform, motor, sensor, mut jump, mut forces)) = players.single_mut() else {
        return;
    };

    // The cooldown is consumed on the key press whether or not the impulse
    // lands; a jump mashed while airborne does not bank for later.
    jump.tick(time.delta_secs());
    let jumping = intent.jump && jump.try_fire();

    if !sensor.grounded {
        return;
    }

    // Strafing without a back intent carries the avatar forward along its
    // offset facing; the facing pass has already yawed the body.
    let strafing = intent.turn_axis() != 0.0 && *mode == ControlMode::Follow;
    let forward = intent.moving_forward() || (strafing && !intent.moving_backward());
    let forward_axis = if forward {
        1.0
    } else if intent.moving_backward() {
        -1.0
    } else {
        0.0
    };
    if forward_axis == 0.0 && !jumping {
        return;
    }

    // The body yaw was steered this tick through the bevy transform; the
    // physics rotation only catches up at the next sync.
    forces.apply_linear_impulse(movement_impulse(
        motor,
        forward_axis,
        intent.run,
        jumping,
        transform.rotation,
    ));
}

/// Hard caps, applied every tick regardless of grounded state, writing
/// velocity directly. The walk cap applies while the current locomotion
/// state is a walk state, the run cap otherwise.
pub fn clamp_velocity(
    mut players: Query<(&CharacterMotor, &Locomotion, &mut LinearVelocity)>,
) {
    for (motor, locomotion, mut velocity) in players.iter_mut() {
        let cap = if locomotion.state.is_walking() {
            motor.max_walk_speed
        } else {
            motor.max_run_speed
        };
        let clamped = clamp_fall_speed(
            clamp_horizontal_speed(velocity.0, cap),
            motor.terminal_fall_speed,
        );
        if clamped != velocity.0 {
            velocity.0 = clamped;
        }
    }
}
