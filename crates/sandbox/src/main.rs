//! Minimal proving ground for the orbit character controller: a flat ground
//! slab, two tilted boundary walls, a capsule avatar, and the orbit camera.
//! The slab is the sensor's single walkable collider; the walls only block.
//! Tuning can be overridden from `sandbox.ron` next to the working
//! directory; missing or malformed files fall back to defaults with a
//! warning.

use anyhow::Context;
use avian3d::prelude::*;
use bevy::prelude::*;
use orbit_controller::prelude::*;
use serde::Deserialize;
use tracing::{info, warn};

const CONFIG_PATH: &str = "sandbox.ron";

/// Below this height the avatar is considered lost and gets respawned.
const KILL_HEIGHT: f32 = -5.0;
const SPAWN_POINT: Vec3 = Vec3::new(0.0, 1.5, 0.0);

#[derive(Deserialize, Default, Clone)]
struct SandboxConfig {
    motor: Option<CharacterMotor>,
    jump: Option<JumpTimer>,
    camera_rotate_speed: Option<f32>,
}

#[derive(Resource, Default)]
struct SandboxTuning {
    config: SandboxConfig,
    load_error: Option<String>,
}

fn load_config(path: &str) -> anyhow::Result<SandboxConfig> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    ron::from_str(&text).with_context(|| format!("parsing {path}"))
}

fn main() {
    let tuning = match load_config(CONFIG_PATH) {
        Ok(config) => SandboxTuning {
            config,
            load_error: None,
        },
        Err(err) => SandboxTuning {
            config: SandboxConfig::default(),
            load_error: Some(format!("{err:#}")),
        },
    };

    App::new()
        .add_plugins(DefaultPlugins)
        .add_plugins(PhysicsPlugins::default())
        .add_plugins(OrbitCharacterControllerPlugin)
        .insert_resource(SubstepCount(10))
        .insert_resource(Gravity(Vec3::new(0.0, -10.0, 0.0)))
        .insert_resource(tuning)
        .add_systems(Startup, setup)
        .add_systems(Update, respawn_fallen)
        .run();
}

fn setup(
    mut commands: Commands,
    tuning: Res<SandboxTuning>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    if let Some(err) = &tuning.load_error {
        warn!("using default tuning: {err}");
    } else {
        info!("loaded tuning from {CONFIG_PATH}");
    }

    let ground_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.2, 0.7, 0.2),
        ..Default::default()
    });

    let ground = commands
        .spawn((
            Name::new("ground"),
            RigidBody::Static,
            Collider::cuboid(40.0, 0.2, 20.0),
            Mesh3d(meshes.add(Cuboid::new(40.0, 0.2, 20.0))),
            MeshMaterial3d(ground_material),
            Transform::from_xyz(0.0, -0.1, 0.0),
        ))
        .id();

    // Two walls flanking the slab, leaned inward 25 degrees. They are not
    // registered with the ground sensor, so they stop the avatar rather
    // than carry it; only the slab counts as walkable.
    let wall_tilt = 25f32.to_radians();
    let wall_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.5, 0.5, 0.55),
        ..Default::default()
    });
    for (name, x, tilt) in [("wall_east", 14.5, wall_tilt), ("wall_west", -14.5, -wall_tilt)] {
        commands.spawn((
            Name::new(name),
            RigidBody::Static,
            Collider::cuboid(0.4, 6.0, 20.0),
            Mesh3d(meshes.add(Cuboid::new(0.4, 6.0, 20.0))),
            MeshMaterial3d(wall_material.clone()),
            Transform::from_xyz(x, 2.5, 0.0).with_rotation(Quat::from_rotation_z(tilt)),
        ));
    }

    let motor = tuning.config.motor.clone().unwrap_or_default();
    let jump = tuning.config.jump.clone().unwrap_or_default();

    let player = commands
        .spawn((
            Name::new("player"),
            RigidBody::Dynamic,
            Collider::capsule(0.3, 0.6),
            LockedAxes::ROTATION_LOCKED,
            Friction::new(0.4),
            LinearVelocity::default(),
            motor,
            jump,
            FacingState::default(),
            Locomotion::default(),
            GroundSensor::new(ground),
            Mesh3d(meshes.add(Capsule3d::new(0.3, 0.6))),
            MeshMaterial3d(materials.add(StandardMaterial {
                base_color: Color::srgb(0.8, 0.1, 0.1),
                ..Default::default()
            })),
            Transform::from_translation(SPAWN_POINT),
        ))
        .id();

    let mut rig = OrbitCamera::new(player);
    if let Some(rotate_speed) = tuning.config.camera_rotate_speed {
        rig.rotate_speed = rotate_speed;
    }
    commands.spawn((
        Name::new("orbit camera"),
        Camera3d::default(),
        rig,
        Transform::from_xyz(0.0, 2.0, -3.0).looking_at(SPAWN_POINT, Vec3::Y),
        AmbientLight {
            color: Color::WHITE,
            brightness: 300.0,
            ..Default::default()
        },
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: 8_000.0,
            shadows_enabled: true,
            ..Default::default()
        },
        Transform::from_xyz(4.0, 4.0, 0.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
    info!("sandbox ready; WASD to move, hold right mouse to steer, wheel to zoom");
}

/// Put the avatar back on the slab after it slides off the world.
fn respawn_fallen(
    mut players: Query<(&mut Position, &mut LinearVelocity), With<GroundSensor>>,
) {
    for (mut position, mut velocity) in players.iter_mut() {
        if position.0.y < KILL_HEIGHT {
            info!("avatar fell out of the world, respawning");
            position.0 = SPAWN_POINT;
            velocity.0 = Vec3::ZERO;
        }
    }
}
