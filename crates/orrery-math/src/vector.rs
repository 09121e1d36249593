use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use glam::DVec3;

use crate::units::{UNITS_PER_METER, meters_to_units, units_to_meters};

/// Exact displacement between two world positions, in millimetres.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Vec3I128 {
    pub x: i128,
    pub y: i128,
    pub z: i128,
}

impl Vec3I128 {
    pub const ZERO: Self = Self { x: 0, y: 0, z: 0 };

    pub fn new(x: i128, y: i128, z: i128) -> Self {
        Self { x, y, z }
    }

    /// Splat the same component on all three axes.
    pub fn splat(v: i128) -> Self {
        Self::new(v, v, v)
    }

    /// Checked addition that returns None on overflow.
    pub fn checked_add(self, rhs: Vec3I128) -> Option<Vec3I128> {
        Some(Vec3I128::new(
            self.x.checked_add(rhs.x)?,
            self.y.checked_add(rhs.y)?,
            self.z.checked_add(rhs.z)?,
        ))
    }

    /// Saturating addition that clamps to i128::MIN/MAX on overflow.
    pub fn saturating_add(self, rhs: Vec3I128) -> Vec3I128 {
        Vec3I128::new(
            self.x.saturating_add(rhs.x),
            self.y.saturating_add(rhs.y),
            self.z.saturating_add(rhs.z),
        )
    }

    /// Largest absolute component (Chebyshev norm).
    pub fn max_abs(self) -> i128 {
        self.x.abs().max(self.y.abs()).max(self.z.abs())
    }

    /// Convert to metres in double precision.
    ///
    /// Integer deltas are exact; the conversion is the only place precision is
    /// lost, and it is relative to the magnitude of the delta, not of the
    /// absolute positions it came from.
    pub fn to_meters(self) -> DVec3 {
        DVec3::new(
            units_to_meters(self.x),
            units_to_meters(self.y),
            units_to_meters(self.z),
        )
    }

    /// Round a metre vector to the nearest millimetre.
    pub fn from_meters(v: DVec3) -> Self {
        Self::new(meters_to_units(v.x), meters_to_units(v.y), meters_to_units(v.z))
    }

    /// Euclidean length in metres.
    pub fn length_meters(self) -> f64 {
        self.to_meters().length()
    }

    /// Euclidean length in millimetres as f64.
    pub fn magnitude_f64(self) -> f64 {
        let (x, y, z) = (self.x as f64, self.y as f64, self.z as f64);
        (x * x + y * y + z * z).sqrt()
    }
}

impl fmt::Display for Vec3I128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.to_meters();
        write!(f, "({:.3}, {:.3}, {:.3}) m", m.x, m.y, m.z)
    }
}

impl Add for Vec3I128 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3I128 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Vec3I128 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<i128> for Vec3I128 {
    type Output = Self;
    fn mul(self, rhs: i128) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Div<i128> for Vec3I128 {
    type Output = Self;
    fn div(self, rhs: i128) -> Self {
        Self::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl AddAssign for Vec3I128 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Vec3I128 {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

// One metre along each axis, handy for building test layouts.
impl Vec3I128 {
    pub const METER_X: Self = Self { x: UNITS_PER_METER, y: 0, z: 0 };
    pub const METER_Y: Self = Self { x: 0, y: UNITS_PER_METER, z: 0 };
    pub const METER_Z: Self = Self { x: 0, y: 0, z: UNITS_PER_METER };
}
