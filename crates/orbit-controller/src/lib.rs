#![deny(unsafe_code)]

//! Third-person orbit camera and physics character controller.
//!
//! The plugin wires six pieces around an Avian rigid body: input
//! aggregation, an orbit camera rig, body/camera facing reconciliation,
//! ground contact detection, impulse-driven locomotion with hard speed
//! caps, and a locomotion animation state machine.
//!
//! Tick order matters and is fixed by the plugin: input is drained before
//! the camera and facing update, impulses land before the physics step, and
//! the ground query plus animation state run after it. The grounded flag
//! consumed by movement is therefore always one tick stale; that staleness
//! is intentional, contact data for the current step does not exist until
//! the step has run.
//!
//! ```no_run
//! use bevy::prelude::*;
//! use avian3d::prelude::*;
//! use orbit_controller::prelude::*;
//!
//! fn setup(mut commands: Commands) {
//!     let ground = commands
//!         .spawn((RigidBody::Static, Collider::cuboid(40.0, 0.1, 20.0)))
//!         .id();
//!     let player = commands
//!         .spawn((
//!             RigidBody::Dynamic,
//!             Collider::capsule(0.3, 0.6),
//!             LockedAxes::ROTATION_LOCKED,
//!             CharacterMotor::default(),
//!             JumpTimer::default(),
//!             FacingState::default(),
//!             Locomotion::default(),
//!             GroundSensor::new(ground),
//!             Transform::from_xyz(0.0, 1.0, 0.0),
//!         ))
//!         .id();
//!     // Attach `OrbitCamera` to the render camera entity.
//!     commands.spawn((
//!         OrbitCamera::new(player),
//!         Transform::from_xyz(0.0, 2.0, 4.0),
//!     ));
//! }
//! ```

pub mod animation;
pub mod camera;
pub mod facing;
pub mod grounded;
pub mod input;
pub mod movement;

pub mod prelude {
    pub use crate::animation::{
        Locomotion, LocomotionChanged, LocomotionClips, LocomotionState,
    };
    pub use crate::camera::{OrbitCamera, OrbitCameraChanged};
    pub use crate::facing::FacingState;
    pub use crate::grounded::GroundSensor;
    pub use crate::input::{ControlMode, InputBindings, InputIntent};
    pub use crate::movement::{CharacterMotor, JumpTimer};
    pub use crate::OrbitCharacterControllerPlugin;
}

use avian3d::prelude::PhysicsSystems;
use bevy::prelude::*;

/// Installs the full controller: input collection in `Update`, camera and
/// movement in `FixedUpdate` ahead of the physics step, ground query and
/// animation state in `FixedPostUpdate` behind it.
#[derive(Default)]
pub struct OrbitCharacterControllerPlugin;

impl Plugin for OrbitCharacterControllerPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<input::InputBindings>()
            .register_type::<input::InputIntent>()
            .register_type::<input::ControlMode>()
            .register_type::<camera::OrbitCamera>()
            .register_type::<facing::FacingState>()
            .register_type::<grounded::GroundSensor>()
            .register_type::<movement::CharacterMotor>()
            .register_type::<movement::JumpTimer>()
            .register_type::<animation::Locomotion>()
            .init_resource::<input::InputIntent>()
            .init_resource::<input::InputBindings>()
            .init_resource::<input::ControlMode>()
            .add_message::<camera::OrbitCameraChanged>()
            .add_message::<animation::LocomotionChanged>()
            .add_systems(Update, input::collect_input)
            .add_systems(
                FixedUpdate,
                (
                    input::derive_control_mode,
                    facing::steer_player,
                    camera::update_orbit_camera,
                    facing::follow_camera_yaw,
                    movement::apply_movement,
                    movement::clamp_velocity,
                )
                    .chain(),
            )
            .add_systems(
                FixedPostUpdate,
                (
                    grounded::update_ground_sensors,
                    animation::update_locomotion,
                    animation::sync_locomotion_clips,
                )
                    .chain()
                    .after(PhysicsSystems::Writeback),
            );
    }
}
