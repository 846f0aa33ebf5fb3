//! Reconciles the body's facing with the camera.
//!
//! Two passes bracket the camera update. The pre-camera pass handles mode
//! transitions (snap to the rig yaw), keyboard turning, and the one-shot
//! strafe offset. The post-camera pass feeds the azimuth delta the camera
//! actually consumed back into the rig yaw, and into the body while
//! look-follow is engaged.

use bevy::prelude::*;
use core::f32::consts::FRAC_PI_2;

use crate::camera::{wrap_pi, OrbitCamera};
use crate::input::{ControlMode, InputIntent};

/// Per-avatar facing memory and tuning.
#[derive(Component, Reflect)]
#[reflect(Component)]
pub struct FacingState {
    /// Yaw rate for keyboard turning, radians per second.
    pub keyboard_turn_rate: f32,
    was_following: bool,
    was_strafing: bool,
    was_forward: bool,
    was_backward: bool,
}

impl Default for FacingState {
    fn default() -> Self {
        Self {
            keyboard_turn_rate: FRAC_PI_2,
            was_following: false,
            was_strafing: false,
            was_forward: false,
            was_backward: false,
        }
    }
}

/// One-shot yaw offset for the first frame of a new strafe state: a quarter
/// turn toward the strafe side, halved when combined with forward/back
/// motion, mirrored when backing up.
pub fn strafe_yaw_offset(left: bool, forward: bool, backward: bool) -> f32 {
    let side = if left { FRAC_PI_2 } else { -FRAC_PI_2 };
    let diagonal = if forward || backward { 0.5 } else { 1.0 };
    let reverse = if backward { -1.0 } else { 1.0 };
    side * diagonal * reverse
}

/// Pre-camera facing pass.
///
/// Known limitation carried over from the tuning this was matched against:
/// flipping rapidly between strafe directions while look-follow is engaged
/// can leave the body at an off orientation until the next mode transition
/// snaps it back.
pub fn steer_player(
    time: Res<Time>,
    intent: Res<InputIntent>,
    mode: Res<ControlMode>,
    mut cameras: Query<&mut OrbitCamera>,
    mut players: Query<(&mut Transform, &mut FacingState), Without<OrbitCamera>>,
) {
    let Ok((mut transform, mut facing)) = players.single_mut() else {
        return;
    };
    let Ok(mut rig) = cameras.single_mut() else {
        return;
    };

    let following = *mode == ControlMode::Follow;
    let turn = intent.turn_axis();
    let strafing = turn != 0.0 && following;
    let forward = intent.moving_forward();
    let backward = intent.moving_backward();

    // Entering follow mode, or dropping out of a strafe, realigns the body
    // with the camera rig before any movement math sees its orientation.
    let just_started_follow = following && !facing.was_following;
    let just_stopped_strafing = !strafing && facing.was_strafing;
    if just_started_follow || just_stopped_strafing {
        transform.rotation = Quat::from_rotation_y(rig.rig_yaw);
    }

    if turn != 0.0 {
        if !following {
            // Turn in place. Reversed while backing up, and mirrored into
            // the camera azimuth unless a free-look drag is in progress.
            let reverse = if backward { -1.0 } else { 1.0 };
            let angle = reverse * turn * facing.keyboard_turn_rate * time.delta_secs();
            if !intent.orbit_held {
                rig.theta_delta += angle;
            }
            transform.rotate_y(angle);
        } else {
            let just_started_strafing = (strafing && !facing.was_strafing)
                || forward != facing.was_forward
                || backward != facing.was_backward;
            if just_started_strafing {
                transform.rotate_y(strafe_yaw_offset(turn > 0.0, forward, backward));
            }
        }
    }

    facing.was_following = following;
    facing.was_strafing = strafing;
    facing.was_forward = forward;
    facing.was_backward = backward;
}

/// Post-camera facing pass: the azimuth delta the camera consumed this tick
/// rotates the rig yaw always, and the body while look-follow is engaged.
pub fn follow_camera_yaw(
    mode: Res<ControlMode>,
    mut cameras: Query<&mut OrbitCamera>,
    mut players: Query<&mut Transform, (With<FacingState>, Without<OrbitCamera>)>,
) {
    let Ok(mut rig) = cameras.single_mut() else {
        return;
    };
    let yaw = core::mem::take(&mut rig.applied_yaw);
    if yaw == 0.0 {
        return;
    }
    rig.rig_yaw = wrap_pi(rig.rig_yaw + yaw);
    if *mode == ControlMode::Follow {
        if let Ok(mut transform) = players.single_mut() {
            transform.rotate_y(yaw);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    #[test]
    fn pure_strafe_is_a_quarter_turn() {
        assert!((strafe_yaw_offset(true, false, false) - FRAC_PI_2).abs() < EPS);
        assert!((strafe_yaw_offset(false, false, false) + FRAC_PI_2).abs() < EPS);
    }

    #[test]
    fn diagonal_strafe_is_halved() {
        assert!((strafe_yaw_offset(true, true, false) - FRAC_PI_2 / 2.0).abs() < EPS);
        assert!((strafe_yaw_offset(false, true, false) + FRAC_PI_2 / 2.0).abs() < EPS);
    }

    #[test]
    fn backward_strafe_is_mirrored() {
        // Backward halves (diagonal) and flips the sign.
        assert!((strafe_yaw_offset(true, false, true) + FRAC_PI_2 / 2.0).abs() < EPS);
        assert!((strafe_yaw_offset(false, false, true) - FRAC_PI_2 / 2.0).abs() < EPS);
    }
}
