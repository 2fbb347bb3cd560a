//! Bolts fired by ranged attack phases.
//!
//! A phase with a projectile makes the timeline raise a launch; the bolt is
//! spawned at the wielder's weapon model, flies straight along the model's
//! facing and deals the wielder's weapon damage to the first thing with
//! health it touches. Walls just eat it.

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;
use std::collections::HashSet;

use super::attack::ProjectileSpec;
use super::components::{DamageEvent, Dead, Element, Health, Weapon};
use super::timeline::AttackRuntime;

/// Raised when a wielder's timeline enters a projectile phase.
#[derive(Event, Debug, Clone)]
pub struct ProjectileLaunchEvent {
    pub owner: Entity,
    pub spec: ProjectileSpec,
}

/// A bolt in flight.
#[derive(Component, Debug, Clone)]
pub struct Projectile {
    pub owner: Entity,
    /// World units per second
    pub velocity: Vec3,
    pub damage: f32,
    pub element: Element,
    /// Owner's attack this bolt belongs to; hits only count toward that one
    pub attack_serial: u32,
    travelled: f32,
    max_range: f32,
}

impl Projectile {
    pub fn new(owner: Entity, direction: Vec3, spec: &ProjectileSpec, weapon: &Weapon) -> Self {
        let direction = direction.try_normalize().unwrap_or(Vec3::NEG_Z);
        Self {
            owner,
            velocity: direction * spec.speed,
            damage: weapon.base_damage * spec.damage_scale,
            element: weapon.element,
            attack_serial: 0,
            travelled: 0.0,
            max_range: spec.max_range,
        }
    }

    /// Displacement for the next `dt` seconds, or `None` once that would
    /// carry the bolt past its range.
    pub fn advance(&mut self, dt: f32) -> Option<Vec3> {
        let step = self.velocity * dt;
        self.travelled += step.length();
        (self.travelled <= self.max_range).then_some(step)
    }

    pub fn travelled(&self) -> f32 {
        self.travelled
    }
}

/// Physics side of a bolt: a kinematic sensor ball that reports touching
/// walls and other kinematic bodies.
fn projectile_body(radius: f32) -> impl Bundle {
    (
        RigidBody::KinematicPositionBased,
        Collider::ball(radius),
        Sensor,
        ActiveEvents::COLLISION_EVENTS,
        ActiveCollisionTypes::default()
            | ActiveCollisionTypes::KINEMATIC_KINEMATIC
            | ActiveCollisionTypes::KINEMATIC_STATIC,
    )
}

/// Spawn a bolt for every launch raised this tick.
pub fn spawn_projectiles(
    mut commands: Commands,
    mut launches: EventReader<ProjectileLaunchEvent>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    wielders: Query<(&GlobalTransform, &Weapon, &AttackRuntime), Without<Dead>>,
    models: Query<&GlobalTransform>,
) {
    for launch in launches.read() {
        let Ok((owner_transform, weapon, runtime)) = wielders.get(launch.owner) else {
            continue;
        };
        let muzzle = runtime
            .model()
            .and_then(|model| models.get(model).ok())
            .unwrap_or(owner_transform);
        let direction = muzzle.forward().as_vec3();
        let origin = muzzle.translation() + direction * 0.5;

        let mut projectile = Projectile::new(launch.owner, direction, &launch.spec, weapon);
        projectile.attack_serial = runtime.attack_serial();
        debug!(
            "{:?} fired a bolt from {} ({:.1} damage)",
            launch.owner, origin, projectile.damage
        );
        commands.spawn((
            projectile,
            projectile_body(launch.spec.radius),
            Mesh3d(meshes.add(Sphere::new(launch.spec.radius))),
            MeshMaterial3d(materials.add(StandardMaterial {
                base_color: Color::srgb(1.0, 0.5, 0.1),
                emissive: LinearRgba::rgb(4.0, 1.5, 0.3),
                ..default()
            })),
            Transform::from_translation(origin),
        ));
    }
}

/// Fly every bolt; drop the ones that ran out of range.
pub fn move_projectiles(
    mut commands: Commands,
    time: Res<Time>,
    mut query: Query<(Entity, &mut Transform, &mut Projectile)>,
) {
    let dt = time.delta_secs();
    for (entity, mut transform, mut projectile) in query.iter_mut() {
        match projectile.advance(dt) {
            Some(step) => transform.translation += step,
            None => commands.entity(entity).despawn(),
        }
    }
}

/// Turn bolt contacts into damage. A bolt is spent on its first contact.
pub fn detect_projectile_hits(
    mut commands: Commands,
    mut collisions: EventReader<CollisionEvent>,
    projectiles: Query<(&Projectile, &GlobalTransform)>,
    targets: Query<(), (With<Health>, Without<Dead>)>,
    mut runtimes: Query<&mut AttackRuntime>,
    mut damage_events: EventWriter<DamageEvent>,
) {
    let mut spent = HashSet::new();

    for collision in collisions.read() {
        let CollisionEvent::Started(a, b, _) = collision else {
            continue;
        };

        for (bolt, other) in [(*a, *b), (*b, *a)] {
            let Ok((projectile, transform)) = projectiles.get(bolt) else {
                continue;
            };
            if other == projectile.owner || spent.contains(&bolt) {
                continue;
            }
            spent.insert(bolt);
            commands.entity(bolt).despawn();

            if targets.get(other).is_err() {
                continue;
            }
            if let Ok(mut runtime) = runtimes.get_mut(projectile.owner) {
                if runtime.attack_serial() == projectile.attack_serial {
                    runtime.register_hit(other);
                }
            }
            damage_events.send(DamageEvent {
                target: other,
                source: projectile.owner,
                amount: projectile.damage,
                element: projectile.element,
                hit_point: transform.translation(),
                knockback: projectile.velocity.normalize_or_zero(),
            });
        }
    }
}
