//! Spherical orbit camera around a moving pivot.
//!
//! The rig re-derives its spherical coordinates from the live transform every
//! tick (offset to the pivot, rotated into a Y-up frame), applies the
//! accumulated look/zoom deltas, clamps, and converts back. Working from the
//! transform rather than cached angles means external code may reposition the
//! camera freely between ticks without desyncing the rig.

use bevy::prelude::*;
use bevy::window::Window;
use core::f32::consts::{PI, TAU};

use crate::input::InputIntent;

/// Squared-distance / small-angle threshold below which camera motion is not
/// worth announcing downstream.
pub const CHANGE_EPS: f32 = 1e-6;

/// Keeps `phi` strictly inside (0, PI) so the look-at up vector never
/// degenerates at the poles.
const POLE_EPS: f32 = 1e-6;

/// Orbit rig state and tuning. Lives on the camera entity.
#[derive(Component, Reflect)]
#[reflect(Component)]
pub struct OrbitCamera {
    pub enabled: bool,
    /// Entity the camera orbits (the player).
    pub pivot: Entity,
    /// Look input multiplier. A full drag across the viewport height sweeps
    /// `2π · rotate_speed` radians, so feel is resolution independent.
    pub rotate_speed: f32,
    /// Exponent for the per-notch zoom factor `0.95^zoom_speed`.
    pub zoom_speed: f32,
    pub min_radius: f32,
    pub max_radius: f32,
    /// Polar clamp, `0 ≤ min ≤ max ≤ π`.
    pub min_polar: f32,
    pub max_polar: f32,
    /// Optional azimuth clamp `(min, max)` in radians. The range may
    /// straddle ±π; it is resolved by shortest path against the midpoint.
    pub azimuth_limits: Option<(f32, f32)>,
    /// Rotates pivot-local up onto +Y, for pivots whose up axis is not
    /// world Y. Identity in the common case.
    pub alignment: Quat,
    /// Yaw of the invisible camera-facing rig that the body snaps to when
    /// look-follow engages. Tracks every azimuth delta ever applied.
    pub rig_yaw: f32,
    /// Azimuth delta applied this tick, consumed by the facing pass.
    pub applied_yaw: f32,
    /// Accumulated azimuth input, reset after each apply.
    pub theta_delta: f32,
    /// Accumulated polar input, reset after each apply.
    pub phi_delta: f32,
    /// Pending zoom factor, reset to 1 after each apply.
    pub scale: f32,
    last_position: Vec3,
    last_rotation: Quat,
}

impl OrbitCamera {
    pub fn new(pivot: Entity) -> Self {
        Self {
            pivot,
            ..Default::default()
        }
    }

    /// Orbit a pivot whose local up axis is `up` rather than world Y.
    pub fn with_up(pivot: Entity, up: Vec3) -> Self {
        Self {
            pivot,
            alignment: Quat::from_rotation_arc(up.normalize_or(Vec3::Y), Vec3::Y),
            ..Default::default()
        }
    }
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            enabled: true,
            pivot: Entity::PLACEHOLDER,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_radius: 1.0,
            max_radius: 50.0,
            min_polar: 0.0,
            max_polar: PI,
            azimuth_limits: None,
            alignment: Quat::IDENTITY,
            rig_yaw: 0.0,
            applied_yaw: 0.0,
            theta_delta: 0.0,
            phi_delta: 0.0,
            scale: 1.0,
            last_position: Vec3::ZERO,
            last_rotation: Quat::IDENTITY,
        }
    }
}

/// Emitted when the camera has actually moved or rotated beyond
/// [`CHANGE_EPS`], or zoomed. Subscribers can skip recomputing otherwise.
#[derive(Message, Debug, Clone, Copy)]
pub struct OrbitCameraChanged {
    pub camera: Entity,
}

/// Wrap an angle into `[-π, π]`.
pub fn wrap_pi(angle: f32) -> f32 {
    let mut a = angle;
    if a < -PI {
        a += TAU;
    } else if a > PI {
        a -= TAU;
    }
    a
}

/// Clamp an azimuth to `[min, max]` after wrapping the limits into
/// `[-π, π]`. When the wrapped range straddles ±π (`min > max`), the angle
/// is pushed to whichever limit is nearer, judged against the midpoint.
pub fn clamp_azimuth(theta: f32, min: f32, max: f32) -> f32 {
    let min = wrap_pi(min);
    let max = wrap_pi(max);
    if min <= max {
        theta.clamp(min, max)
    } else if theta > (min + max) / 2.0 {
        theta.max(min)
    } else {
        theta.min(max)
    }
}

/// Clamp the polar angle to its limits, then nudge off the exact poles.
pub fn clamp_polar(phi: f32, min: f32, max: f32) -> f32 {
    phi.clamp(min, max).clamp(POLE_EPS, PI - POLE_EPS)
}

/// Per-notch dolly factor.
pub fn zoom_scale(zoom_speed: f32) -> f32 {
    0.95f32.powf(zoom_speed)
}

/// Convert a Y-up offset to spherical `(radius, phi, theta)`.
pub fn to_spherical(offset: Vec3) -> (f32, f32, f32) {
    let radius = offset.length();
    if radius <= f32::EPSILON {
        return (0.0, 0.0, 0.0);
    }
    let theta = offset.x.atan2(offset.z);
    let phi = (offset.y / radius).clamp(-1.0, 1.0).acos();
    (radius, phi, theta)
}

/// Convert spherical `(radius, phi, theta)` back to a Y-up offset.
pub fn from_spherical(radius: f32, phi: f32, theta: f32) -> Vec3 {
    let sin_phi = phi.sin();
    Vec3::new(
        radius * sin_phi * theta.sin(),
        radius * phi.cos(),
        radius * sin_phi * theta.cos(),
    )
}

/// Apply accumulated look/zoom input to the orbit rig and reposition the
/// camera around its pivot. Runs once per fixed tick, after the pre-camera
/// facing pass has finished mirroring keyboard turns into `theta_delta`.
pub fn update_orbit_camera(
    windows: Query<&Window>,
    mut intent: ResMut<InputIntent>,
    mut cameras: Query<(Entity, &mut Transform, &mut OrbitCamera)>,
    pivots: Query<&Transform, Without<OrbitCamera>>,
    mut changed: MessageWriter<OrbitCameraChanged>,
) {
    let Ok((camera_entity, mut transform, mut rig)) = cameras.single_mut() else {
        return;
    };
    if !rig.enabled {
        // Still drain so stale motion does not burst-apply on re-enable.
        intent.take_look_delta();
        intent.take_wheel_delta();
        return;
    }
    let Ok(pivot) = pivots.get(rig.pivot) else {
        return;
    };

    let viewport_height = windows
        .single()
        .map(|w| w.height())
        .unwrap_or(720.0)
        .max(1.0);

    // Drag rotates only while a mouse button is held; the accumulator is
    // drained either way.
    let look = intent.take_look_delta();
    if intent.orbit_held || intent.follow_held {
        rig.theta_delta -= TAU * look.x * rig.rotate_speed / viewport_height;
        rig.phi_delta -= TAU * look.y * rig.rotate_speed / viewport_height;
    }
    let notches = intent.take_wheel_delta();
    if notches != 0.0 {
        let per_notch = zoom_scale(rig.zoom_speed);
        rig.scale *= per_notch.powf(notches);
    }

    let offset = rig.alignment * (transform.translation - pivot.translation);
    let (radius, phi, theta) = to_spherical(offset);
    if radius <= f32::EPSILON {
        rig.theta_delta = 0.0;
        rig.phi_delta = 0.0;
        rig.scale = 1.0;
        return;
    }

    // The raw azimuth input, not the clamped result, is what the body
    // follows; clamping only pins the camera itself.
    let applied_yaw = rig.theta_delta;

    let mut theta = theta + rig.theta_delta;
    let mut phi = phi + rig.phi_delta;
    if let Some((min, max)) = rig.azimuth_limits {
        theta = clamp_azimuth(theta, min, max);
    }
    phi = clamp_polar(phi, rig.min_polar, rig.max_polar);
    let radius = (radius * rig.scale).clamp(rig.min_radius, rig.max_radius);

    let world_offset = rig.alignment.inverse() * from_spherical(radius, phi, theta);
    transform.translation = pivot.translation + world_offset;
    transform.look_at(pivot.translation, Vec3::Y);

    rig.applied_yaw = applied_yaw;
    rig.theta_delta = 0.0;
    rig.phi_delta = 0.0;
    let zoomed = rig.scale != 1.0;
    rig.scale = 1.0;

    // Small-angle rotation test: 8(1 - q·q') ≈ angle² for unit quaternions.
    let moved = rig.last_position.distance_squared(transform.translation) > CHANGE_EPS
        || 8.0 * (1.0 - rig.last_rotation.dot(transform.rotation)) > CHANGE_EPS;
    if zoomed || moved {
        rig.last_position = transform.translation;
        rig.last_rotation = transform.rotation;
        changed.write(OrbitCameraChanged {
            camera: camera_entity,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn polar_clamp_is_exact() {
        for phi in [-1.0, 0.0, 1.5, PI, PI + 0.5, 10.0] {
            let clamped = clamp_polar(phi, 0.2, 2.8);
            assert!((0.2..=2.8).contains(&clamped), "phi {phi} -> {clamped}");
        }
    }

    #[test]
    fn polar_clamp_avoids_poles() {
        let clamped = clamp_polar(PI + 1.0, 0.0, PI);
        assert!(clamped < PI);
        let clamped = clamp_polar(-1.0, 0.0, PI);
        assert!(clamped > 0.0);
    }

    #[test]
    fn azimuth_clamp_plain_range() {
        assert!((clamp_azimuth(0.5, -1.0, 1.0) - 0.5).abs() < EPS);
        assert!((clamp_azimuth(2.0, -1.0, 1.0) - 1.0).abs() < EPS);
        assert!((clamp_azimuth(-2.0, -1.0, 1.0) + 1.0).abs() < EPS);
    }

    #[test]
    fn azimuth_clamp_wrapped_range() {
        // Allowed arc from 170° across ±180° to -170°.
        let min = 170f32.to_radians();
        let max = -170f32.to_radians();
        // Inside the arc on either side of the seam.
        let inside = 175f32.to_radians();
        assert!((clamp_azimuth(inside, min, max) - inside).abs() < EPS);
        let inside = (-175f32).to_radians();
        assert!((clamp_azimuth(inside, min, max) - inside).abs() < EPS);
        // Outside, near the min side: pushed to min.
        let outside = 100f32.to_radians();
        assert!((clamp_azimuth(outside, min, max) - min).abs() < EPS);
        // Outside, near the max side: pushed to max.
        let outside = (-100f32).to_radians();
        assert!((clamp_azimuth(outside, min, max) - max).abs() < EPS);
    }

    #[test]
    fn zoom_scale_per_notch() {
        assert!((zoom_scale(1.0) - 0.95).abs() < EPS);
        assert!((zoom_scale(2.0) - 0.9025).abs() < EPS);
    }

    #[test]
    fn spherical_round_trip() {
        let offset = Vec3::new(1.5, 2.0, -0.5);
        let (radius, phi, theta) = to_spherical(offset);
        let back = from_spherical(radius, phi, theta);
        assert!(offset.distance(back) < 1e-4);
    }

    #[test]
    fn zero_offset_is_degenerate() {
        let (radius, _, _) = to_spherical(Vec3::ZERO);
        assert_eq!(radius, 0.0);
    }

    #[test]
    fn wrap_pi_bounds() {
        assert!((wrap_pi(PI + 0.5) - (-PI + 0.5)).abs() < EPS);
        assert!((wrap_pi(-PI - 0.5) - (PI - 0.5)).abs() < EPS);
        assert!((wrap_pi(0.3) - 0.3).abs() < EPS);
    }
}
