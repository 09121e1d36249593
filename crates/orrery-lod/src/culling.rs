//! Patch visibility tests.

use glam::{DQuat, DVec3};
use orrery_anchor::Frustum;

use crate::PatchBox;

/// Decides whether a patch can contribute to the image.
///
/// `bb` is in body-local metres; `normal` and `offset` describe the cone of
/// surface normals over the patch (see [`PatchGeometry`](crate::PatchGeometry)).
pub trait CullingFrustum {
    fn is_bb_in_view(&self, bb: &PatchBox, normal: DVec3, offset: f64) -> bool;
}

/// Accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCulling;

impl CullingFrustum for NoCulling {
    fn is_bb_in_view(&self, _bb: &PatchBox, _normal: DVec3, _offset: f64) -> bool {
        true
    }
}

/// Both tests must pass.
impl<A: CullingFrustum, B: CullingFrustum> CullingFrustum for (A, B) {
    fn is_bb_in_view(&self, bb: &PatchBox, normal: DVec3, offset: f64) -> bool {
        self.0.is_bb_in_view(bb, normal, offset) && self.1.is_bb_in_view(bb, normal, offset)
    }
}

/// The camera lens frustum, applied to patches of one body.
#[derive(Debug, Clone)]
pub struct LensCulling {
    frustum: Frustum,
    /// Body center relative to the observer, metres.
    body_offset: DVec3,
    /// Body-local to world rotation.
    body_orientation: DQuat,
}

impl LensCulling {
    pub fn new(frustum: Frustum, body_offset: DVec3, body_orientation: DQuat) -> Self {
        Self {
            frustum,
            body_offset,
            body_orientation,
        }
    }
}

impl CullingFrustum for LensCulling {
    fn is_bb_in_view(&self, bb: &PatchBox, _normal: DVec3, _offset: f64) -> bool {
        let mut world = PatchBox::empty();
        for corner in bb.corners() {
            world.expand(self.body_offset + self.body_orientation * corner);
        }
        self.frustum.is_aabb_visible(world.min, world.max)
    }
}

/// Rejects patches hidden below the horizon of a round body.
///
/// The far distance is the horizon distance `√((2r + h)h)` times `scale`.
/// Coarse patches, whose normals fan out widely, get an extra margin
/// proportional to their size.
#[derive(Clone, Debug)]
pub struct HorizonCulling {
    /// Camera in body-local metres.
    camera: DVec3,
    radius: f64,
    camera_distance: f64,
    cos_horizon: f64,
    far: f64,
}

impl HorizonCulling {
    pub fn new(camera: DVec3, radius: f64, scale: f64) -> Self {
        let camera_distance = camera.length();
        let altitude = (camera_distance - radius).max(0.0);
        let cos_horizon = if camera_distance > radius {
            radius / camera_distance
        } else {
            0.0
        };
        Self {
            camera,
            radius,
            camera_distance,
            cos_horizon,
            far: scale * ((2.0 * radius + altitude) * altitude).sqrt(),
        }
    }

    pub fn far(&self) -> f64 {
        self.far
    }

    /// Cone test of a bounding sphere against the visible cap.
    fn is_above_horizon(&self, center: DVec3, radius: f64) -> bool {
        if self.camera_distance <= self.radius {
            return true;
        }
        let dist = center.length();
        if dist <= radius {
            return true;
        }
        let cos_angle = center.dot(self.camera) / (dist * self.camera_distance);
        let sin_margin = radius / dist;
        let cos_margin = (1.0 - sin_margin * sin_margin).max(0.0).sqrt();
        let sin_horizon = (1.0 - self.cos_horizon * self.cos_horizon).max(0.0).sqrt();
        cos_angle >= self.cos_horizon * cos_margin - sin_horizon * sin_margin
    }
}

impl CullingFrustum for HorizonCulling {
    fn is_bb_in_view(&self, bb: &PatchBox, _normal: DVec3, offset: f64) -> bool {
        let radius = bb.radius();
        let margin = radius * (1.0 - offset).max(0.0);
        if bb.distance_to(self.camera) > self.far + radius + margin {
            return false;
        }
        self.is_above_horizon(bb.center(), radius + margin)
    }
}
