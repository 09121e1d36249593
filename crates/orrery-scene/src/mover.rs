use glam::DVec3;
use orrery_lod::Surface;
use orrery_patchdata::PatchDataStore;

/// Keeps a body-local position above the terrain of a surface.
///
/// The surface and its data are passed in on every query; the mover only
/// holds the clearance it maintains.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceMover {
    /// Minimum height above the ground, metres.
    pub clearance: f64,
}

impl SurfaceMover {
    pub fn new(clearance: f64) -> Self {
        Self { clearance }
    }

    /// Ground height under `local`, from the finest resident heightmap.
    pub fn ground_height(&self, surface: &Surface, data: &PatchDataStore, local: DVec3) -> f64 {
        surface
            .locate(local)
            .map_or(0.0, |(face, x, y)| data.height_at(face, x, y))
    }

    /// Height of `local` above the terrain.
    pub fn altitude(&self, surface: &Surface, data: &PatchDataStore, local: DVec3) -> f64 {
        surface.altitude(local) - self.ground_height(surface, data, local)
    }

    /// Lift `local` along the surface normal until it clears the terrain.
    pub fn constrain(&self, surface: &Surface, data: &PatchDataStore, local: DVec3) -> DVec3 {
        let altitude = self.altitude(surface, data, local);
        if altitude >= self.clearance {
            return local;
        }
        let up = match surface.locate(local) {
            Some((face, x, y)) => surface.normal(face, x, y),
            None => local.normalize_or(DVec3::Z),
        };
        local + up * (self.clearance - altitude)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use orrery_config::DataConfig;
    use orrery_debug::DiagnosticSink;
    use orrery_patchdata::{LoaderPool, SourceLoader};

    use super::*;

    fn empty_store(surface: Surface) -> PatchDataStore {
        let pool = Arc::new(LoaderPool::new(1, 4, Arc::new(SourceLoader)));
        PatchDataStore::new(surface, pool, &DataConfig::default(), DiagnosticSink::detached())
    }

    #[test]
    fn test_altitude_over_bare_sphere() {
        let surface = Surface::CubeSphere { radius: 1000.0 };
        let data = empty_store(surface);
        let mover = SurfaceMover::new(2.0);
        let p = DVec3::new(0.0, 1010.0, 0.0);
        assert!((mover.altitude(&surface, &data, p) - 10.0).abs() < 1e-9);
        assert_eq!(mover.constrain(&surface, &data, p), p);
    }

    #[test]
    fn test_constrain_lifts_below_clearance() {
        let surface = Surface::CubeSphere { radius: 1000.0 };
        let data = empty_store(surface);
        let mover = SurfaceMover::new(5.0);
        let lifted = mover.constrain(&surface, &data, DVec3::new(0.0, 0.0, 990.0));
        assert!((mover.altitude(&surface, &data, lifted) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_flat_surface_uses_z() {
        let surface = Surface::Flat { size: 100.0 };
        let data = empty_store(surface);
        let mover = SurfaceMover::new(1.0);
        let lifted = mover.constrain(&surface, &data, DVec3::new(10.0, -20.0, -3.0));
        assert_eq!(lifted, DVec3::new(10.0, -20.0, 1.0));
    }
}
