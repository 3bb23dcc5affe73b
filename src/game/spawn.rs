//! Spawn point selection for respawns

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::game::constants::spawn;
use crate::util::vec3::Vec3;

/// Picks where a replacement character appears
pub trait SpawnSelector: Send {
    /// Choose a spawn position given the positions of characters in play.
    /// Returns None when no spawn points exist.
    fn select(&mut self, occupied: &[Vec3]) -> Option<Vec3>;
}

/// Evenly spaced points on a ring around the level origin
pub fn ring_points(count: usize, radius: f32, height: f32) -> Vec<Vec3> {
    (0..count)
        .map(|i| {
            let angle = std::f32::consts::TAU * i as f32 / count as f32;
            Vec3::on_ring(radius, angle, height)
        })
        .collect()
}

pub fn default_points() -> Vec<Vec3> {
    ring_points(spawn::POINT_COUNT, spawn::RING_RADIUS, spawn::HEIGHT)
}

/// Uniformly random spawn point (seeded for reproducible sessions)
pub struct RandomSpawnSelector {
    points: Vec<Vec3>,
    rng: StdRng,
}

impl RandomSpawnSelector {
    pub fn new(points: Vec<Vec3>, seed: u64) -> Self {
        Self {
            points,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl SpawnSelector for RandomSpawnSelector {
    fn select(&mut self, _occupied: &[Vec3]) -> Option<Vec3> {
        if self.points.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..self.points.len());
        Some(self.points[index])
    }
}

/// Spawn point farthest from its nearest occupied position
pub struct LeastContestedSelector {
    points: Vec<Vec3>,
}

impl LeastContestedSelector {
    pub fn new(points: Vec<Vec3>) -> Self {
        Self { points }
    }
}

impl SpawnSelector for LeastContestedSelector {
    fn select(&mut self, occupied: &[Vec3]) -> Option<Vec3> {
        let clearance = |point: &Vec3| {
            occupied
                .iter()
                .map(|o| point.distance_sq_to(*o))
                .fold(f32::INFINITY, f32::min)
        };
        self.points
            .iter()
            .copied()
            .max_by(|a, b| {
                clearance(a)
                    .partial_cmp(&clearance(b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }
}
