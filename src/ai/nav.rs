//! Straight-line kinematic navigation inside a rectangular walkable area.
//!
//! Stands in for a navmesh: destinations outside the area are clamped to
//! its edge (and reported as an incomplete path), and positions outside it
//! are not walkable.

use bevy::prelude::*;

use super::facade::Navigator;

/// Walkable rectangle on the XZ plane.
#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct NavArea {
    pub min: Vec2,
    pub max: Vec2,
}

impl Default for NavArea {
    fn default() -> Self {
        Self {
            min: Vec2::splat(-20.0),
            max: Vec2::splat(20.0),
        }
    }
}

impl NavArea {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn contains(&self, point: Vec3) -> bool {
        (self.min.x..=self.max.x).contains(&point.x) && (self.min.y..=self.max.y).contains(&point.z)
    }

    /// Closest point inside the area, height untouched.
    pub fn clamp(&self, point: Vec3) -> Vec3 {
        Vec3::new(
            point.x.clamp(self.min.x, self.max.x),
            point.y,
            point.z.clamp(self.min.y, self.max.y),
        )
    }
}

/// Per-agent movement state.
#[derive(Component, Debug, Clone)]
pub struct NavAgent {
    /// Movement control; off while something else drives the agent
    pub enabled: bool,
    pub speed: f32,
    /// Arrived inside this horizontal distance
    pub stopping_distance: f32,
    position: Vec3,
    destination: Option<Vec3>,
    path_complete: bool,
    area: NavArea,
}

impl NavAgent {
    pub fn new(area: NavArea, speed: f32) -> Self {
        Self {
            enabled: true,
            speed,
            stopping_distance: 0.1,
            position: Vec3::ZERO,
            destination: None,
            path_complete: true,
            area,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn destination(&self) -> Option<Vec3> {
        self.destination
    }

    /// Adopt the entity's transform as the agent position.
    pub fn sync(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Move toward the destination for `dt` seconds. Returns the new position.
    pub fn advance(&mut self, dt: f32) -> Vec3 {
        if !self.enabled {
            return self.position;
        }
        let Some(destination) = self.destination else {
            return self.position;
        };

        let to_destination = (destination - self.position).with_y(0.0);
        let distance = to_destination.length();
        if distance <= self.stopping_distance {
            return self.position;
        }

        let step = (self.speed * dt).min(distance);
        self.position += to_destination / distance * step;
        self.position
    }
}

impl Navigator for NavAgent {
    fn is_ready(&self) -> bool {
        self.enabled && self.area.contains(self.position)
    }

    fn request_move(&mut self, destination: Vec3) -> bool {
        if !self.is_ready() {
            return false;
        }
        let reachable = self.area.clamp(destination);
        self.path_complete = reachable.with_y(0.0).distance(destination.with_y(0.0)) < 1e-3;
        self.destination = Some(reachable.with_y(self.position.y));
        true
    }

    fn cancel_move(&mut self) {
        self.destination = None;
        self.path_complete = true;
    }

    fn remaining_distance(&self) -> f32 {
        self.destination.map_or(0.0, |destination| {
            (destination - self.position).with_y(0.0).length()
        })
    }

    fn is_path_complete(&self) -> bool {
        self.path_complete
    }

    fn warp(&mut self, position: Vec3) -> bool {
        if !self.area.contains(position) {
            return false;
        }
        self.position = position;
        self.destination = None;
        self.path_complete = true;
        true
    }

    fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    fn sample_position(&self, point: Vec3, max_distance: f32) -> Option<Vec3> {
        let walkable = self.area.clamp(point);
        (walkable.distance(point) <= max_distance).then_some(walkable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> NavAgent {
        NavAgent::new(NavArea::new(Vec2::splat(-5.0), Vec2::splat(5.0)), 2.0)
    }

    #[test]
    fn test_moves_at_speed_and_stops_on_arrival() {
        let mut nav = agent();
        assert!(nav.request_move(Vec3::new(3.0, 0.0, 0.0)));
        assert!(nav.is_path_complete());

        let position = nav.advance(0.5);
        assert!((position.x - 1.0).abs() < 1e-5);
        assert!((nav.remaining_distance() - 2.0).abs() < 1e-5);

        for _ in 0..10 {
            nav.advance(0.5);
        }
        assert!((nav.position().x - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_destination_outside_area_is_clamped() {
        let mut nav = agent();
        assert!(nav.request_move(Vec3::new(9.0, 0.0, 1.0)));
        assert!(!nav.is_path_complete());
        assert_eq!(nav.destination(), Some(Vec3::new(5.0, 0.0, 1.0)));

        nav.cancel_move();
        assert_eq!(nav.remaining_distance(), 0.0);
        assert!(nav.is_path_complete());
    }

    #[test]
    fn test_warp_and_sample_respect_area() {
        let mut nav = agent();
        assert!(!nav.warp(Vec3::new(6.0, 0.0, 0.0)));
        assert!(nav.warp(Vec3::new(4.0, 0.0, 4.0)));
        assert_eq!(nav.position(), Vec3::new(4.0, 0.0, 4.0));

        assert_eq!(
            nav.sample_position(Vec3::new(6.0, 0.0, 0.0), 1.5),
            Some(Vec3::new(5.0, 0.0, 0.0))
        );
        assert_eq!(nav.sample_position(Vec3::new(8.0, 0.0, 0.0), 1.5), None);
    }

    #[test]
    fn test_disabled_or_stranded_agent_is_not_ready() {
        let mut nav = agent();
        nav.enabled = false;
        assert!(!nav.is_ready());
        assert!(!nav.request_move(Vec3::X));

        let mut stranded = agent();
        stranded.sync(Vec3::new(7.0, 0.0, 0.0));
        assert!(!stranded.is_ready());
    }
}
