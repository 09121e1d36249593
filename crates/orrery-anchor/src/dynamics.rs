//! Orbit and rotation models evaluated at simulation time.
//!
//! Ephemeris math lives outside the core; these traits are the seam, and the
//! simple models below cover demo scenes and tests.

use std::f64::consts::TAU;
use std::fmt;
use std::ops::Range;

use glam::{DQuat, DVec3};
use orrery_math::Vec3I128;

/// A model could not be evaluated at the requested time.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DynamicsError {
    #[error("time {time} outside validity range {start}..{end}")]
    OutOfRange { time: f64, start: f64, end: f64 },

    #[error("model produced a non-finite value at time {time}")]
    NonFinite { time: f64 },
}

/// Position of an anchor relative to its parent, as a function of time.
pub trait Orbit: Send + Sync + fmt::Debug {
    fn position_at(&self, time: f64) -> Result<Vec3I128, DynamicsError>;
}

/// Orientation of an anchor as a function of time.
pub trait Rotation: Send + Sync + fmt::Debug {
    fn orientation_at(&self, time: f64) -> Result<DQuat, DynamicsError>;
}

/// Circular orbit in the XZ plane, tilted about X by `inclination`.
#[derive(Debug, Clone, PartialEq)]
pub struct CircularOrbit {
    /// Orbit radius, metres.
    pub radius: f64,
    /// Orbital period, seconds.
    pub period: f64,
    /// Mean anomaly at t = 0, radians.
    pub phase: f64,
    pub inclination: f64,
}

impl Orbit for CircularOrbit {
    fn position_at(&self, time: f64) -> Result<Vec3I128, DynamicsError> {
        let angle = self.phase + TAU * time / self.period;
        let flat = DVec3::new(angle.cos(), 0.0, -angle.sin()) * self.radius;
        let p = DQuat::from_rotation_x(self.inclination) * flat;
        if !p.is_finite() {
            return Err(DynamicsError::NonFinite { time });
        }
        Ok(Vec3I128::from_meters(p))
    }
}

/// Rotation at constant angular velocity about a fixed axis.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformRotation {
    pub axis: DVec3,
    /// Sidereal period, seconds.
    pub period: f64,
    pub phase: f64,
}

impl Rotation for UniformRotation {
    fn orientation_at(&self, time: f64) -> Result<DQuat, DynamicsError> {
        let angle = self.phase + TAU * time / self.period;
        let q = DQuat::from_axis_angle(self.axis.normalize(), angle);
        if !q.is_finite() {
            return Err(DynamicsError::NonFinite { time });
        }
        Ok(q)
    }
}

/// Restricts an orbit to the time span its underlying model is valid for.
#[derive(Debug)]
pub struct BoundedOrbit<O> {
    pub inner: O,
    pub validity: Range<f64>,
}

impl<O: Orbit> Orbit for BoundedOrbit<O> {
    fn position_at(&self, time: f64) -> Result<Vec3I128, DynamicsError> {
        if !self.validity.contains(&time) {
            return Err(DynamicsError::OutOfRange {
                time,
                start: self.validity.start,
                end: self.validity.end,
            });
        }
        self.inner.position_at(time)
    }
}
