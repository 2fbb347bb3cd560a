//! First-person player movement, camera control and spawning.

use bevy::input::mouse::MouseMotion;
use bevy::prelude::*;
use bevy::window::{CursorGrabMode, PrimaryWindow};
use bevy_rapier3d::prelude::*;
use std::sync::Arc;

use super::components::*;
use crate::ai::Targetable;
use crate::combat::{
    weapon_hit_volume, AttackCooldown, AttackDefinition, AttackRuntime, Health, Resistances, Weapon, WeaponModel,
};
use crate::core::{Pose, SimState};

/// Marker component for the player's camera.
#[derive(Component, Default)]
pub struct PlayerCamera {
    /// Current pitch angle in radians (looking up/down)
    pub pitch: f32,
}

const MAX_PITCH: f32 = 1.4;

/// Set up player movement systems.
pub fn setup_movement_systems(app: &mut App) {
    app.add_systems(OnEnter(SimState::Running), grab_cursor)
        .add_systems(OnEnter(SimState::Paused), release_cursor)
        .add_systems(
            Update,
            (mouse_look, player_movement).run_if(in_state(SimState::Running)),
        );
}

fn set_cursor_grab(windows: &mut Query<&mut Window, With<PrimaryWindow>>, grabbed: bool) {
    if let Ok(mut window) = windows.get_single_mut() {
        window.cursor_options.grab_mode = if grabbed {
            CursorGrabMode::Locked
        } else {
            CursorGrabMode::None
        };
        window.cursor_options.visible = !grabbed;
    }
}

fn grab_cursor(mut windows: Query<&mut Window, With<PrimaryWindow>>) {
    set_cursor_grab(&mut windows, true);
}

fn release_cursor(mut windows: Query<&mut Window, With<PrimaryWindow>>) {
    set_cursor_grab(&mut windows, false);
}

/// Yaw turns the body, pitch tilts only the camera (and the weapon it holds).
pub fn mouse_look(
    mut mouse_motion: EventReader<MouseMotion>,
    config: Res<PlayerConfig>,
    mut bodies: Query<&mut Transform, With<Player>>,
    mut cameras: Query<(&mut Transform, &mut PlayerCamera), Without<Player>>,
) {
    let delta: Vec2 = mouse_motion.read().map(|event| event.delta).sum();
    if delta == Vec2::ZERO {
        return;
    }
    let (Ok(mut body), Ok((mut view, mut camera))) = (bodies.get_single_mut(), cameras.get_single_mut()) else {
        return;
    };

    let pitch_sign = if config.invert_y { -1.0 } else { 1.0 };
    body.rotate_y(-delta.x * config.look_sensitivity);
    camera.pitch = (camera.pitch - delta.y * config.look_sensitivity * pitch_sign).clamp(-MAX_PITCH, MAX_PITCH);
    view.rotation = Quat::from_rotation_x(camera.pitch);
}

/// WASD relative to facing, through the character controller.
pub fn player_movement(
    keyboard: Res<ButtonInput<KeyCode>>,
    time: Res<Time>,
    config: Res<PlayerConfig>,
    rapier_context: Query<&RapierContext>,
    mut players: Query<(Entity, &Transform, &mut Fall, &mut KinematicCharacterController), With<Player>>,
) {
    let Ok((entity, transform, mut fall, mut controller)) = players.get_single_mut() else {
        return;
    };
    let dt = time.delta_secs();

    // Ray just past the capsule bottom (capsule_y(0.5, 0.3))
    fall.grounded = rapier_context.get_single().map_or(true, |context| {
        context
            .cast_ray(
                transform.translation - Vec3::Y * 0.75,
                Vec3::NEG_Y,
                0.15,
                true,
                QueryFilter::default().exclude_collider(entity),
            )
            .is_some()
    });
    fall.speed = if fall.grounded { 0.0 } else { fall.speed - config.gravity * dt };

    let input = [
        (KeyCode::KeyW, Vec3::NEG_Z),
        (KeyCode::KeyS, Vec3::Z),
        (KeyCode::KeyA, Vec3::NEG_X),
        (KeyCode::KeyD, Vec3::X),
    ]
    .into_iter()
    .filter(|(key, _)| keyboard.pressed(*key))
    .map(|(_, direction)| direction)
    .sum::<Vec3>()
    .normalize_or_zero();

    let mut speed = config.walk_speed;
    if keyboard.pressed(KeyCode::ShiftLeft) {
        speed *= config.sprint_multiplier;
    }

    let yaw = transform.rotation.to_euler(EulerRot::YXZ).0;
    let step = Quat::from_rotation_y(yaw) * input * speed * dt;
    controller.translation = Some(step + Vec3::Y * fall.speed * dt);
}

/// Spawn the player with camera, weapon model and hit volume.
pub fn spawn_player(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    config: &PlayerConfig,
    position: Vec3,
    opener: Option<Arc<AttackDefinition>>,
) -> Entity {
    let player = commands
        .spawn((
            Player,
            Targetable,
            Fall::default(),
            Health::new(config.max_health),
            Resistances::default(),
            Weapon {
                name: config.weapon_name.clone(),
                base_damage: config.weapon_damage,
                ..default()
            },
            AttackCooldown::default(),
            Transform::from_translation(position),
            Visibility::default(),
            RigidBody::KinematicPositionBased,
            Collider::capsule_y(0.5, 0.3),
            KinematicCharacterController {
                offset: CharacterLength::Absolute(0.01),
                autostep: Some(CharacterAutostep {
                    max_height: CharacterLength::Absolute(0.4),
                    min_width: CharacterLength::Absolute(0.3),
                    include_dynamic_bodies: false,
                }),
                max_slope_climb_angle: 45_f32.to_radians(),
                min_slope_slide_angle: 30_f32.to_radians(),
                snap_to_ground: Some(CharacterLength::Absolute(0.5)),
                ..default()
            },
        ))
        .id();

    // Eye level
    let camera = commands
        .spawn((Camera3d::default(), PlayerCamera::default(), Transform::from_xyz(0.0, 0.4, 0.0)))
        .set_parent(player)
        .id();

    // Lower right of the view
    let rest = Transform::from_xyz(0.35, -0.3, -0.6);
    let model = commands
        .spawn((
            WeaponModel,
            Mesh3d(meshes.add(Cuboid::new(0.06, 0.06, 0.8))),
            MeshMaterial3d(materials.add(Color::srgb(0.8, 0.8, 0.85))),
            rest,
        ))
        .set_parent(camera)
        .id();
    commands
        .spawn(weapon_hit_volume(player, Vec3::new(0.1, 0.1, 0.4)))
        .set_parent(model);

    commands
        .entity(player)
        .insert(AttackRuntime::new(Some(model), Pose::from_transform(&rest), opener));

    player
}
