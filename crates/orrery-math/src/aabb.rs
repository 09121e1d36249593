use crate::{Vec3I128, WorldPosition};

/// Axis-aligned box in world space.
///
/// Invariant: `min <= max` on every axis; the constructor sorts corners.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Aabb128 {
    pub min: WorldPosition,
    pub max: WorldPosition,
}

impl Aabb128 {
    /// Create an AABB from two corners.
    pub fn new(a: WorldPosition, b: WorldPosition) -> Self {
        Self {
            min: WorldPosition::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: WorldPosition::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Create a cube from its center and half-extent.
    pub fn cube(center: WorldPosition, half_extent: i128) -> Self {
        let h = Vec3I128::splat(half_extent);
        Self {
            min: center - h,
            max: center + h,
        }
    }

    /// Smallest box containing every point, or `None` for an empty set.
    pub fn enclosing(points: impl IntoIterator<Item = WorldPosition>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        Some(iter.fold(Self::new(first, first), |acc, p| acc.expand_to(p)))
    }

    /// Returns true if the point lies inside or on the boundary.
    pub fn contains_point(&self, p: WorldPosition) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Grow the box so it contains `p`.
    pub fn expand_to(self, p: WorldPosition) -> Self {
        Self {
            min: WorldPosition::new(self.min.x.min(p.x), self.min.y.min(p.y), self.min.z.min(p.z)),
            max: WorldPosition::new(self.max.x.max(p.x), self.max.y.max(p.y), self.max.z.max(p.z)),
        }
    }

    pub fn center(&self) -> WorldPosition {
        WorldPosition::new(
            self.min.x + (self.max.x - self.min.x) / 2,
            self.min.y + (self.max.y - self.min.y) / 2,
            self.min.z + (self.max.z - self.min.z) / 2,
        )
    }

    pub fn size(&self) -> Vec3I128 {
        self.max - self.min
    }

    /// Closest point of the box to `p` (p itself when inside).
    pub fn closest_point(&self, p: WorldPosition) -> WorldPosition {
        WorldPosition::new(
            p.x.clamp(self.min.x, self.max.x),
            p.y.clamp(self.min.y, self.max.y),
            p.z.clamp(self.min.z, self.max.z),
        )
    }

    /// Distance from `p` to the box surface in metres, zero when inside.
    pub fn distance_meters(&self, p: WorldPosition) -> f64 {
        (p - self.closest_point(p)).length_meters()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sorts_corners() {
        let b = Aabb128::new(WorldPosition::new(5, -1, 3), WorldPosition::new(-5, 1, -3));
        assert_eq!(b.min, WorldPosition::new(-5, -1, -3));
        assert_eq!(b.max, WorldPosition::new(5, 1, 3));
    }

    #[test]
    fn test_cube_contains_center_and_corners() {
        let c = Aabb128::cube(WorldPosition::new(100, 100, 100), 50);
        assert!(c.contains_point(WorldPosition::new(100, 100, 100)));
        assert!(c.contains_point(WorldPosition::new(150, 50, 150)));
        assert!(!c.contains_point(WorldPosition::new(151, 100, 100)));
        assert_eq!(c.center(), WorldPosition::new(100, 100, 100));
    }

    #[test]
    fn test_distance_zero_inside() {
        let c = Aabb128::cube(WorldPosition::ORIGIN, 1000);
        assert_eq!(c.distance_meters(WorldPosition::new(10, 10, 10)), 0.0);
        let d = c.distance_meters(WorldPosition::new(4000, 0, 0));
        assert!((d - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_enclosing() {
        assert!(Aabb128::enclosing(std::iter::empty()).is_none());
        let b = Aabb128::enclosing([
            WorldPosition::new(1, 2, 3),
            WorldPosition::new(-1, 5, 0),
        ])
        .unwrap();
        assert_eq!(b.min, WorldPosition::new(-1, 2, 0));
        assert_eq!(b.max, WorldPosition::new(1, 5, 3));
    }
}
