use std::fmt;
use std::ops::{Add, AddAssign, Sub};

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::Vec3I128;

/// Absolute position in the shared inertial frame, in millimetres.
///
/// An `i128` per axis covers about 1.8e22 light-years at millimetre
/// resolution, so a single frame holds the whole simulated universe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct WorldPosition {
    pub x: i128,
    pub y: i128,
    pub z: i128,
}

impl WorldPosition {
    pub const ORIGIN: Self = Self { x: 0, y: 0, z: 0 };

    pub fn new(x: i128, y: i128, z: i128) -> Self {
        Self { x, y, z }
    }

    /// Position from metres, rounded to the nearest millimetre.
    pub fn from_meters(v: DVec3) -> Self {
        Self::ORIGIN + Vec3I128::from_meters(v)
    }

    /// Offset of `self` relative to `origin`, in metres.
    pub fn relative_to(self, origin: WorldPosition) -> DVec3 {
        (self - origin).to_meters()
    }

    /// Distance to another position, in metres.
    pub fn distance_meters(self, other: WorldPosition) -> f64 {
        (self - other).length_meters()
    }
}

impl fmt::Display for WorldPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}] mm", self.x, self.y, self.z)
    }
}

impl Sub for WorldPosition {
    type Output = Vec3I128;
    fn sub(self, rhs: Self) -> Vec3I128 {
        Vec3I128::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Add<Vec3I128> for WorldPosition {
    type Output = Self;
    fn add(self, rhs: Vec3I128) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub<Vec3I128> for WorldPosition {
    type Output = Self;
    fn sub(self, rhs: Vec3I128) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl AddAssign<Vec3I128> for WorldPosition {
    fn add_assign(&mut self, rhs: Vec3I128) {
        *self = *self + rhs;
    }
}
