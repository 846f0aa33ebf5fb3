//! Ground contact detection.
//!
//! A downward shape cast of the avatar's own collider against the designated
//! walkable collider, evaluated after the physics step. Contact points are
//! classified as feet contacts by their height in the collider's local
//! frame, which separates standing on ground from brushing a wall with the
//! capsule's side. The published flag is read by the movement system on the
//! following tick, so grounded state is one tick stale by construction.

use avian3d::prelude::*;
use bevy::prelude::*;
use tracing::debug;

/// Ground contact configuration and published state. Lives on the avatar.
#[derive(Component, Reflect)]
#[reflect(Component)]
pub struct GroundSensor {
    /// The collider that counts as walkable ground.
    pub ground: Entity,
    /// Contact points further away than this are not yet touching.
    pub max_contact_distance: f32,
    /// Feet cutoff: a contact qualifies only when its local-frame height is
    /// below this, near the bottom of the capsule.
    pub feet_threshold: f32,
    /// Result of the most recent query.
    pub grounded: bool,
}

impl GroundSensor {
    pub fn new(ground: Entity) -> Self {
        Self {
            ground,
            ..Default::default()
        }
    }
}

impl Default for GroundSensor {
    fn default() -> Self {
        Self {
            ground: Entity::PLACEHOLDER,
            max_contact_distance: 0.2,
            feet_threshold: -0.58,
            grounded: false,
        }
    }
}

/// One contact point from a ground query. Not retained across ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactSample {
    /// Height of the contact point in the avatar collider's local frame.
    pub local_y: f32,
    /// Separation distance along the cast direction.
    pub distance: f32,
}

/// True when any sample is both close enough to touch and low enough on the
/// collider to count as feet rather than a wall graze.
pub fn classify_contacts(
    samples: impl IntoIterator<Item = ContactSample>,
    max_contact_distance: f32,
    feet_threshold: f32,
) -> bool {
    samples
        .into_iter()
        .any(|s| s.distance <= max_contact_distance && s.local_y < feet_threshold)
}

/// Express a world-space contact point in the avatar collider's local frame
/// at the moment of contact. The cast shape has travelled `cast_distance`
/// straight down by then, so the travel is folded into the origin before
/// undoing the rotation.
pub fn local_contact_offset(
    position: Vec3,
    rotation: Quat,
    cast_distance: f32,
    world_point: Vec3,
) -> Vec3 {
    let center_at_contact = position + Vec3::NEG_Y * cast_distance;
    rotation.inverse() * (world_point - center_at_contact)
}

/// Shape-cast for the avatar's contact with its ground collider. Pure with
/// respect to ECS state; the sensor carries all context.
pub fn sample_ground_contact(
    entity: Entity,
    ground: Entity,
    collider: &Collider,
    position: Vec3,
    rotation: Quat,
    max_contact_distance: f32,
    spatial_query: &SpatialQuery,
) -> Option<ContactSample> {
    let filter = SpatialQueryFilter::default().with_excluded_entities([entity]);
    let hit = spatial_query.cast_shape(
        collider,
        position,
        rotation,
        Dir3::NEG_Y,
        &ShapeCastConfig::from_max_distance(max_contact_distance),
        &filter,
    )?;
    if hit.entity != ground {
        return None;
    }
    // point1 is reported in world space; classification wants the height on
    // the avatar's own collider.
    Some(ContactSample {
        local_y: local_contact_offset(position, rotation, hit.distance, hit.point1).y,
        distance: hit.distance,
    })
}

/// Re-evaluate grounded state from the just-stepped world. Scheduled after
/// the physics sync so the contact data reflects this tick's step; a missing
/// contact is the normal airborne case, not an error.
pub fn update_ground_sensors(
    spatial_query: SpatialQuery,
    mut sensors: Query<(Entity, &Position, &Rotation, &Collider, &mut GroundSensor)>,
) {
    for (entity, position, rotation, collider, mut sensor) in sensors.iter_mut() {
        let contact = sample_ground_contact(
            entity,
            sensor.ground,
            collider,
            position.0,
            rotation.0,
            sensor.max_contact_distance,
            &spatial_query,
        );
        let grounded = classify_contacts(
            contact,
            sensor.max_contact_distance,
            sensor.feet_threshold,
        );
        if grounded != sensor.grounded {
            debug!(entity = ?entity, grounded, "ground contact changed");
            sensor.grounded = grounded;
        }
    }
}
