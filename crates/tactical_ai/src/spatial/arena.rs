//! ArenaWorld — простой SpatialQuery для тестов и headless demo
//!
//! Плоский пол на `floor_y`, опциональные границы по XZ, статические
//! axis-aligned коробки (стены, укрытия) и сферические тела (акторы).

use bevy::prelude::*;

use super::{RayHit, SpatialQuery, COLLISION_LAYER_ACTORS, COLLISION_LAYER_ENVIRONMENT};

/// Статическое препятствие (AABB)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub min: Vec3,
    pub max: Vec3,
}

impl Obstacle {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Коробка по центру и половинным размерам
    pub fn from_center(center: Vec3, half_extents: Vec3) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    fn footprint_contains(&self, point: Vec3, margin: f32) -> bool {
        point.x > self.min.x - margin
            && point.x < self.max.x + margin
            && point.z > self.min.z - margin
            && point.z < self.max.z + margin
    }
}

/// Сферическое тело (актор, турель) на линии луча
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArenaBody {
    pub entity: Entity,
    pub center: Vec3,
    pub radius: f32,
}

#[derive(Debug, Clone)]
pub struct ArenaWorld {
    pub floor_y: f32,
    /// Границы walkable области (min.xz, max.xz)
    pub bounds: Option<(Vec2, Vec2)>,
    pub obstacles: Vec<Obstacle>,
    pub bodies: Vec<ArenaBody>,
    /// Отступ от стен при snap на walkable поверхность (радиус агента)
    pub agent_radius: f32,
}

impl Default for ArenaWorld {
    fn default() -> Self {
        Self {
            floor_y: 0.0,
            bounds: None,
            obstacles: Vec::new(),
            bodies: Vec::new(),
            agent_radius: 0.4,
        }
    }
}

impl ArenaWorld {
    pub fn open_field() -> Self {
        Self::default()
    }

    pub fn with_bounds(mut self, min: Vec2, max: Vec2) -> Self {
        self.bounds = Some((min.min(max), min.max(max)));
        self
    }

    pub fn with_obstacle(mut self, obstacle: Obstacle) -> Self {
        self.obstacles.push(obstacle);
        self
    }

    pub fn with_body(mut self, entity: Entity, center: Vec3, radius: f32) -> Self {
        self.bodies.push(ArenaBody {
            entity,
            center,
            radius,
        });
        self
    }
}

impl SpatialQuery for ArenaWorld {
    fn raycast(&self, from: Vec3, to: Vec3, ignore: &[Entity], mask: u32) -> Option<RayHit> {
        let delta = to - from;
        let length = delta.length();
        if length <= f32::EPSILON {
            return None;
        }
        let dir = delta / length;

        let mut nearest: Option<RayHit> = None;
        let mut consider = |hit: RayHit| {
            if nearest.is_none_or(|current| hit.distance < current.distance) {
                nearest = Some(hit);
            }
        };

        if mask & COLLISION_LAYER_ENVIRONMENT != 0 {
            for obstacle in &self.obstacles {
                if let Some((distance, normal)) = ray_aabb(from, dir, length, obstacle) {
                    consider(RayHit {
                        point: from + dir * distance,
                        normal,
                        distance,
                        collider: None,
                        layer: COLLISION_LAYER_ENVIRONMENT,
                    });
                }
            }
        }

        if mask & COLLISION_LAYER_ACTORS != 0 {
            for body in &self.bodies {
                if ignore.contains(&body.entity) {
                    continue;
                }
                if let Some(distance) = ray_sphere(from, dir, length, body.center, body.radius) {
                    let point = from + dir * distance;
                    consider(RayHit {
                        point,
                        normal: normal_or(point - body.center, -dir),
                        distance,
                        collider: Some(body.entity),
                        layer: COLLISION_LAYER_ACTORS,
                    });
                }
            }
        }

        nearest
    }

    fn nearest_walkable_point(&self, point: Vec3) -> Vec3 {
        let mut snapped = Vec3::new(point.x, self.floor_y, point.z);

        if let Some((min, max)) = self.bounds {
            snapped.x = snapped.x.clamp(min.x, max.x);
            snapped.z = snapped.z.clamp(min.y, max.y);
        }

        // Выталкиваем из footprint препятствий к ближайшему краю
        for obstacle in &self.obstacles {
            if obstacle.max.y <= self.floor_y || !obstacle.footprint_contains(snapped, self.agent_radius) {
                continue;
            }

            let margin = self.agent_radius;
            let candidates = [
                (snapped.x - (obstacle.min.x - margin), Vec3::new(obstacle.min.x - margin, snapped.y, snapped.z)),
                ((obstacle.max.x + margin) - snapped.x, Vec3::new(obstacle.max.x + margin, snapped.y, snapped.z)),
                (snapped.z - (obstacle.min.z - margin), Vec3::new(snapped.x, snapped.y, obstacle.min.z - margin)),
                ((obstacle.max.z + margin) - snapped.z, Vec3::new(snapped.x, snapped.y, obstacle.max.z + margin)),
            ];

            if let Some((_, exit)) = candidates
                .iter()
                .copied()
                .min_by(|a, b| a.0.total_cmp(&b.0))
            {
                snapped = exit;
            }
        }

        snapped
    }
}

fn normal_or(v: Vec3, fallback: Vec3) -> Vec3 {
    let n = v.normalize_or_zero();
    if n == Vec3::ZERO {
        fallback
    } else {
        n
    }
}

/// Slab test: (distance, нормаль входной грани)
fn ray_aabb(origin: Vec3, dir: Vec3, length: f32, aabb: &Obstacle) -> Option<(f32, Vec3)> {
    let mut t_min = 0.0_f32;
    let mut t_max = length;
    let mut normal = Vec3::ZERO;

    for axis in 0..3 {
        let o = origin[axis];
        let d = dir[axis];

        if d.abs() < 1e-8 {
            if o < aabb.min[axis] || o > aabb.max[axis] {
                return None;
            }
            continue;
        }

        let inv = 1.0 / d;
        let mut t1 = (aabb.min[axis] - o) * inv;
        let mut t2 = (aabb.max[axis] - o) * inv;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }

        if t1 > t_min {
            t_min = t1;
            normal = Vec3::ZERO;
            normal[axis] = -d.signum();
        }
        t_max = t_max.min(t2);

        if t_min > t_max {
            return None;
        }
    }

    if normal == Vec3::ZERO {
        // Начало луча внутри коробки
        return Some((0.0, -dir));
    }

    Some((t_min, normal))
}

fn ray_sphere(origin: Vec3, dir: Vec3, length: f32, center: Vec3, radius: f32) -> Option<f32> {
    let oc = origin - center;
    let b = oc.dot(dir);
    let c = oc.length_squared() - radius * radius;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }

    let sqrt_d = discriminant.sqrt();
    let t = if -b - sqrt_d >= 0.0 { -b - sqrt_d } else { -b + sqrt_d };
    (0.0..=length).contains(&t).then_some(t)
}
