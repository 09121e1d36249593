//! 128-bit world positions, unit conversions, and photometry for the Orrery core.
//!
//! Absolute positions live in a single inertial frame as `i128` millimetres so that
//! both a planetary surface and interstellar distances are exact. Everything that is
//! observer-relative is computed as an exact integer delta first, then converted to
//! `f64` metres.

mod aabb;
pub mod photometry;
pub mod units;
mod vector;
mod world_position;

pub use aabb::Aabb128;
pub use vector::Vec3I128;
pub use world_position::WorldPosition;
