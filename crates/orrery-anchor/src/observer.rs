//! Observer, lens and the camera-relative culling frustum.
//!
//! Everything here is expressed relative to the observer position in `f64`
//! metres, so the frustum never sees absolute coordinates.

use glam::{DMat4, DQuat, DVec3};
use orrery_config::CoreConfig;
use orrery_math::WorldPosition;

/// Perspective lens with a clamped vertical field of view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lens {
    fov_y: f64,
    min_fov: f64,
    max_fov: f64,
    width: u32,
    height: u32,
    /// Near clip distance, metres.
    pub near: f64,
    /// Far clip distance, metres; `None` is an infinite far plane.
    pub far: Option<f64>,
}

impl Lens {
    /// Lens with the given vertical fov in degrees, clamped to `[min_fov, max_fov]`.
    pub fn new(fov_y_deg: f64, min_fov_deg: f64, max_fov_deg: f64, width: u32, height: u32) -> Self {
        let mut lens = Self {
            fov_y: 0.0,
            min_fov: min_fov_deg.to_radians(),
            max_fov: max_fov_deg.to_radians(),
            width: width.max(1),
            height: height.max(1),
            near: 1e-6,
            far: None,
        };
        lens.set_fov_deg(fov_y_deg);
        lens
    }

    /// Lens matching the configured viewport and default fov.
    pub fn from_config(config: &CoreConfig) -> Self {
        let mut lens = Self::new(
            config.default_fov,
            config.min_fov,
            config.max_fov,
            config.viewport_width,
            config.viewport_height,
        );
        lens.near = config.near_plane;
        lens.far = (!config.infinite_far_plane).then_some(config.far_plane);
        lens
    }

    pub fn set_fov_deg(&mut self, deg: f64) {
        self.fov_y = deg.to_radians().clamp(self.min_fov, self.max_fov);
    }

    /// Multiply the focal length by `factor` (zoom in when > 1).
    pub fn zoom(&mut self, factor: f64) {
        if factor > 0.0 {
            let half = ((self.fov_y / 2.0).tan() / factor).atan();
            self.fov_y = (2.0 * half).clamp(self.min_fov, self.max_fov);
        }
    }

    /// Vertical field of view, radians.
    pub fn fov_y(&self) -> f64 {
        self.fov_y
    }

    /// Horizontal field of view, radians.
    pub fn fov_x(&self) -> f64 {
        2.0 * ((self.fov_y / 2.0).tan() * self.aspect()).atan()
    }

    /// Half-angle of the cone through the viewport corners.
    pub fn half_diagonal_fov(&self) -> f64 {
        let tv = (self.fov_y / 2.0).tan();
        let th = tv * self.aspect();
        (tv * tv + th * th).sqrt().atan()
    }

    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    pub fn viewport(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
    }

    /// Angle subtended by one pixel at unit distance.
    pub fn pixel_size(&self) -> f64 {
        2.0 * (self.fov_y / 2.0).tan() / self.height as f64
    }

    /// Copy of this lens clipped at `[near, far]`.
    pub fn with_clip(&self, near: f64, far: Option<f64>) -> Self {
        Self { near, far, ..*self }
    }

    /// Projection matrix; `reverse_z` maps near to 1.0.
    pub fn projection(&self, reverse_z: bool) -> DMat4 {
        let aspect = self.aspect();
        match (self.far, reverse_z) {
            (Some(far), false) => DMat4::perspective_rh(self.fov_y, aspect, self.near, far),
            (Some(far), true) => DMat4::perspective_rh(self.fov_y, aspect, far, self.near),
            (None, false) => DMat4::perspective_infinite_rh(self.fov_y, aspect, self.near),
            (None, true) => DMat4::perspective_infinite_reverse_rh(self.fov_y, aspect, self.near),
        }
    }
}

/// Position, orientation and lens of the viewer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observer {
    pub position: WorldPosition,
    pub orientation: DQuat,
    pub lens: Lens,
}

impl Observer {
    pub fn new(position: WorldPosition, orientation: DQuat, lens: Lens) -> Self {
        Self {
            position,
            orientation,
            lens,
        }
    }

    /// The forward direction vector (-Z in camera space).
    pub fn forward(&self) -> DVec3 {
        self.orientation * DVec3::NEG_Z
    }

    /// The up direction vector (+Y in camera space).
    pub fn up(&self) -> DVec3 {
        self.orientation * DVec3::Y
    }

    /// The right direction vector (+X in camera space).
    pub fn right(&self) -> DVec3 {
        self.orientation * DVec3::X
    }

    /// Orient the observer to look at `target` with +Y as the preferred up.
    pub fn look_at(&mut self, target: WorldPosition) {
        let dir = target.relative_to(self.position).normalize_or_zero();
        if dir == DVec3::ZERO {
            return;
        }
        let up = if dir.cross(DVec3::Y).length_squared() < 1e-12 {
            DVec3::Z
        } else {
            DVec3::Y
        };
        let view = DMat4::look_to_rh(DVec3::ZERO, dir, up);
        self.orientation = DQuat::from_mat4(&view.inverse());
    }

    /// Rotation-only view matrix for camera-relative rendering.
    pub fn view_rotation(&self) -> DMat4 {
        DMat4::from_quat(self.orientation.inverse())
    }

    /// Culling frustum with the lens clip planes.
    pub fn frustum(&self) -> Frustum {
        Frustum::new(self.orientation, &self.lens)
    }
}

/// Plane with an inward unit normal: a point is inside when `n·p + d >= 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Plane {
    normal: DVec3,
    d: f64,
}

impl Plane {
    fn distance(&self, p: DVec3) -> f64 {
        self.normal.dot(p) + self.d
    }
}

/// View frustum in observer-relative metres (observer at the origin).
#[derive(Debug, Clone, PartialEq)]
pub struct Frustum {
    planes: Vec<Plane>,
}

impl Frustum {
    /// Build the side, near and (when finite) far planes for a lens.
    pub fn new(orientation: DQuat, lens: &Lens) -> Self {
        let v = lens.fov_y() / 2.0;
        let h = lens.fov_x() / 2.0;
        let (sh, ch) = h.sin_cos();
        let (sv, cv) = v.sin_cos();

        let mut planes = vec![
            Plane { normal: DVec3::new(ch, 0.0, -sh), d: 0.0 },
            Plane { normal: DVec3::new(-ch, 0.0, -sh), d: 0.0 },
            Plane { normal: DVec3::new(0.0, cv, -sv), d: 0.0 },
            Plane { normal: DVec3::new(0.0, -cv, -sv), d: 0.0 },
            Plane { normal: DVec3::NEG_Z, d: -lens.near },
        ];
        if let Some(far) = lens.far {
            planes.push(Plane { normal: DVec3::Z, d: far });
        }
        for plane in &mut planes {
            plane.normal = orientation * plane.normal;
        }
        Self { planes }
    }

    /// Sphere test; conservative near the frustum corners.
    pub fn is_sphere_visible(&self, center: DVec3, radius: f64) -> bool {
        self.planes.iter().all(|p| p.distance(center) >= -radius)
    }

    /// Box test using the positive vertex along each plane normal.
    pub fn is_aabb_visible(&self, min: DVec3, max: DVec3) -> bool {
        self.planes.iter().all(|plane| {
            let n = plane.normal;
            let p = DVec3::new(
                if n.x >= 0.0 { max.x } else { min.x },
                if n.y >= 0.0 { max.y } else { min.y },
                if n.z >= 0.0 { max.z } else { min.z },
            );
            plane.distance(p) >= 0.0
        })
    }
}
