//! Locomotion state machine and clip playback.
//!
//! State is derived from the body's velocity after each physics step by a
//! single transition function with a strict priority: vertical motion wins
//! over ground bands, and airborne coasting keeps the previous state. On a
//! transition the old clip is stopped and the new one played immediately; a
//! hard cut, no crossfade.

use avian3d::prelude::LinearVelocity;
use bevy::animation::graph::AnimationNodeIndex;
use bevy::animation::AnimationPlayer;
use bevy::prelude::*;
use tracing::debug;

use crate::grounded::GroundSensor;
use crate::input::InputIntent;
use crate::movement::CharacterMotor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Reflect)]
pub enum LocomotionState {
    #[default]
    Idle,
    WalkForward,
    RunForward,
    WalkBackward,
    RunBackward,
    Jump,
    Fall,
}

impl LocomotionState {
    /// Walk states keep the lower speed cap; everything else runs at the
    /// run cap.
    pub fn is_walking(&self) -> bool {
        matches!(self, Self::WalkForward | Self::WalkBackward)
    }
}

/// Current locomotion state plus the thresholds that drive transitions.
#[derive(Component, Reflect, Clone)]
#[reflect(Component)]
pub struct Locomotion {
    pub state: LocomotionState,
    /// Rising vertical speed above this reads as a jump.
    pub jump_velocity_threshold: f32,
    /// Negative. Vertical speed below this reads as falling, grounded or
    /// not.
    pub fall_velocity_threshold: f32,
    /// Horizontal speeds at or below this count as standing still.
    pub idle_speed_epsilon: f32,
    /// Direction memory from the last nonzero forward/back intent.
    pub backward: bool,
}

impl Default for Locomotion {
    fn default() -> Self {
        Self {
            state: LocomotionState::Idle,
            jump_velocity_threshold: 0.5,
            fall_velocity_threshold: -1.0,
            idle_speed_epsilon: 0.05,
            backward: false,
        }
    }
}

/// Emitted once per state transition, before the clip swap.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocomotionChanged {
    pub entity: Entity,
    pub from: LocomotionState,
    pub to: LocomotionState,
}

/// The transition function. First match wins; no match keeps the current
/// state (airborne coasting between the jump and fall thresholds). The
/// locomotion component carries the current state, direction memory, and
/// thresholds; only the walk cap comes from outside.
pub fn next_state(
    locomotion: &Locomotion,
    vertical_speed: f32,
    horizontal_speed: f32,
    grounded: bool,
    max_walk_speed: f32,
) -> LocomotionState {
    if vertical_speed > locomotion.jump_velocity_threshold {
        return LocomotionState::Jump;
    }
    if vertical_speed < locomotion.fall_velocity_threshold {
        return LocomotionState::Fall;
    }
    if grounded {
        if horizontal_speed > max_walk_speed {
            if locomotion.backward {
                LocomotionState::RunBackward
            } else {
                LocomotionState::RunForward
            }
        } else if horizontal_speed > locomotion.idle_speed_epsilon {
            if locomotion.backward {
                LocomotionState::WalkBackward
            } else {
                LocomotionState::WalkForward
            }
        } else {
            LocomotionState::Idle
        }
    } else {
        locomotion.state
    }
}

/// Re-derive locomotion state from the just-stepped velocity. Runs after
/// the ground query so this tick's contact result feeds this tick's state.
pub fn update_locomotion(
    intent: Res<InputIntent>,
    mut transitions: MessageWriter<LocomotionChanged>,
    mut players: Query<(
        Entity,
        &LinearVelocity,
        &GroundSensor,
        &CharacterMotor,
        &mut Locomotion,
    )>,
) {
    for (entity, velocity, sensor, motor, mut locomotion) in players.iter_mut() {
        if intent.moving_backward() {
            locomotion.backward = true;
        } else if intent.moving_forward() {
            locomotion.backward = false;
        }

        let horizontal_speed = velocity.0.with_y(0.0).length();
        let next = next_state(
            &locomotion,
            velocity.0.y,
            horizontal_speed,
            sensor.grounded,
            motor.max_walk_speed,
        );
        if next != locomotion.state {
            debug!(from = ?locomotion.state, to = ?next, "locomotion transition");
            transitions.write(LocomotionChanged {
                entity,
                from: locomotion.state,
                to: next,
            });
            locomotion.state = next;
        }
    }
}

/// Clip table for one avatar. States without a node skip playback but the
/// state machine still runs, so a rig with no animations behaves the same.
#[derive(Component)]
pub struct LocomotionClips {
    /// Entity carrying the [`AnimationPlayer`], usually a scene child.
    pub animation_player: Entity,
    pub idle: Option<AnimationNodeIndex>,
    pub walk_forward: Option<AnimationNodeIndex>,
    pub run_forward: Option<AnimationNodeIndex>,
    pub walk_backward: Option<AnimationNodeIndex>,
    pub run_backward: Option<AnimationNodeIndex>,
    pub jump: Option<AnimationNodeIndex>,
    pub fall: Option<AnimationNodeIndex>,
    current: Option<AnimationNodeIndex>,
}

impl LocomotionClips {
    pub fn new(animation_player: Entity) -> Self {
        Self {
            animation_player,
            idle: None,
            walk_forward: None,
            run_forward: None,
            walk_backward: None,
            run_backward: None,
            jump: None,
            fall: None,
            current: None,
        }
    }

    pub fn node_for(&self, state: LocomotionState) -> Option<AnimationNodeIndex> {
        match state {
            LocomotionState::Idle => self.idle,
            LocomotionState::WalkForward => self.walk_forward,
            LocomotionState::RunForward => self.run_forward,
            LocomotionState::WalkBackward => self.walk_backward,
            LocomotionState::RunBackward => self.run_backward,
            LocomotionState::Jump => self.jump,
            LocomotionState::Fall => self.fall,
        }
    }
}

/// Swap clips on locomotion transitions: stop the old node, play the new
/// one from the start.
pub fn sync_locomotion_clips(
    mut transitions: MessageReader<LocomotionChanged>,
    mut clip_tables: Query<&mut LocomotionClips>,
    mut animation_players: Query<&mut AnimationPlayer>,
) {
    for transition in transitions.read() {
        let Ok(mut clips) = clip_tables.get_mut(transition.entity) else {
            continue;
        };
        let Ok(mut player) = animation_players.get_mut(clips.animation_player) else {
            continue;
        };
        if let Some(node) = clips.current.take() {
            player.stop(node);
        }
        if let Some(node) = clips.node_for(transition.to) {
            player.play(node).repeat();
            clips.current = Some(node);
        }
    }
}
