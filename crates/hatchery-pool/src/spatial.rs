//! Small value types shared by components and archetype data.

use hatchery_ecs::component::Component;
use serde::{Deserialize, Serialize};

/// 2D vector in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };
    pub const ONE: Vec2 = Vec2 { x: 1.0, y: 1.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn scaled(self, by: Vec2) -> Vec2 {
        Vec2::new(self.x * by.x, self.y * by.y)
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// Linear RGBA colour, each channel in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };
}

impl Default for Rgba {
    fn default() -> Self {
        Rgba::WHITE
    }
}

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// Placement of an entity in the world.
///
/// Owned by the pooling layer rather than by gameplay components: it is set
/// from spawn options on activation and forced back to [`Transform::NEUTRAL`]
/// on every release, whatever the components did with it meanwhile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec2,
    /// Radians.
    pub rotation: f32,
    pub scale: Vec2,
}

impl Transform {
    pub const NEUTRAL: Transform = Transform {
        position: Vec2::ZERO,
        rotation: 0.0,
        scale: Vec2::ONE,
    };

    pub fn is_neutral(&self) -> bool {
        *self == Transform::NEUTRAL
    }
}

impl Default for Transform {
    fn default() -> Self {
        Transform::NEUTRAL
    }
}

impl Component for Transform {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_transform_has_unit_scale() {
        let t = Transform::default();
        assert!(t.is_neutral());
        assert_eq!(t.scale, Vec2::ONE);
    }

    #[test]
    fn vector_ops() {
        let v = Vec2::new(1.0, 2.0) + Vec2::new(0.5, 0.5);
        assert_eq!(v, Vec2::new(1.5, 2.5));
        assert_eq!(v * 2.0, Vec2::new(3.0, 5.0));
        assert_eq!(Vec2::new(2.0, 3.0).scaled(Vec2::new(0.5, 2.0)), Vec2::new(1.0, 6.0));
    }
}
