//! Surface parameterizations a patch quadtree can be laid over.

use std::f64::consts::{FRAC_1_SQRT_2, PI};

use glam::DVec3;

use crate::{CubeFace, PatchBox, PatchGeometry, PatchId, Side};

/// Where an edge of a root face continues.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EdgeLink {
    /// Root face across the edge.
    pub face: u8,
    /// The edge of that face which is shared.
    pub side: Side,
    /// The two faces walk the shared edge in opposite directions.
    pub flipped: bool,
}

/// Body-local surface shape. Positions are metres from the body center.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Surface {
    /// Normalized cube projected onto a sphere; six roots.
    CubeSphere { radius: f64 },
    /// A single square tile in the XY plane, heights along +Z.
    Flat { size: f64 },
    /// Equirectangular sphere map split into two roots by longitude; the
    /// east and west edges wrap, the poles have no neighbours.
    Cylindrical { radius: f64 },
}

impl Surface {
    pub fn root_count(&self) -> u8 {
        match self {
            Surface::CubeSphere { .. } => 6,
            Surface::Flat { .. } => 1,
            Surface::Cylindrical { .. } => 2,
        }
    }

    /// Reference radius used for horizon distances.
    pub fn radius(&self) -> f64 {
        match *self {
            Surface::CubeSphere { radius } | Surface::Cylindrical { radius } => radius,
            Surface::Flat { size } => size * FRAC_1_SQRT_2,
        }
    }

    pub fn link(&self, face: u8, side: Side) -> Option<EdgeLink> {
        match self {
            Surface::CubeSphere { .. } => CubeFace::from_index(face).map(|f| f.edge_link(side)),
            Surface::Flat { .. } => None,
            Surface::Cylindrical { .. } => match side {
                Side::East | Side::West => Some(EdgeLink {
                    face: 1 - face.min(1),
                    side: side.opposite(),
                    flipped: false,
                }),
                Side::North | Side::South => None,
            },
        }
    }

    /// Outward unit normal of the undisplaced surface.
    pub fn normal(&self, face: u8, x: f64, y: f64) -> DVec3 {
        match self {
            Surface::CubeSphere { .. } => Self::cube_face(face).cube_point(x, y).normalize(),
            Surface::Flat { .. } => DVec3::Z,
            Surface::Cylindrical { .. } => {
                let (lon, lat) = Self::lon_lat(face, x, y);
                DVec3::new(lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin())
            }
        }
    }

    /// Surface point displaced by `height` metres along the normal.
    pub fn point(&self, face: u8, x: f64, y: f64, height: f64) -> DVec3 {
        match *self {
            Surface::CubeSphere { radius } | Surface::Cylindrical { radius } => {
                self.normal(face, x, y) * (radius + height)
            }
            Surface::Flat { size } => DVec3::new((x - 0.5) * size, (y - 0.5) * size, height),
        }
    }

    /// Root face and face parameters below a body-local point.
    pub fn locate(&self, point: DVec3) -> Option<(u8, f64, f64)> {
        match *self {
            Surface::CubeSphere { .. } => {
                if point.length_squared() == 0.0 {
                    return None;
                }
                let face = CubeFace::from_direction(point);
                let (x, y) = face.params_of(point);
                Some((face as u8, x, y))
            }
            Surface::Flat { size } => {
                let x = point.x / size + 0.5;
                let y = point.y / size + 0.5;
                ((0.0..=1.0).contains(&x) && (0.0..=1.0).contains(&y)).then_some((0, x, y))
            }
            Surface::Cylindrical { .. } => {
                let len = point.length();
                if len == 0.0 {
                    return None;
                }
                let lon = point.y.atan2(point.x).rem_euclid(2.0 * PI);
                let lat = (point.z / len).clamp(-1.0, 1.0).asin();
                let face = if lon < PI { 0 } else { 1 };
                let x = (lon / PI - face as f64).clamp(0.0, 1.0);
                Some((face, x, lat / PI + 0.5))
            }
        }
    }

    /// Height of a body-local point above the undisplaced surface.
    pub fn altitude(&self, point: DVec3) -> f64 {
        match *self {
            Surface::CubeSphere { radius } | Surface::Cylindrical { radius } => {
                point.length() - radius
            }
            Surface::Flat { .. } => point.z,
        }
    }

    /// Geometry of a patch whose heights lie in `[min_height, max_height]`.
    pub fn geometry(&self, id: PatchId, min_height: f64, max_height: f64) -> PatchGeometry {
        let rect = id.rect();
        let mid_x = (rect.x0 + rect.x1) * 0.5;
        let mid_y = (rect.y0 + rect.y1) * 0.5;
        let normal = self.normal(id.face, mid_x, mid_y);

        let mut bbox = PatchBox::empty();
        let mut offset: f64 = 1.0;
        for y in [rect.y0, mid_y, rect.y1] {
            for x in [rect.x0, mid_x, rect.x1] {
                bbox.expand(self.point(id.face, x, y, min_height));
                bbox.expand(self.point(id.face, x, y, max_height));
                offset = offset.min(normal.dot(self.normal(id.face, x, y)));
            }
        }

        let across = self.point(id.face, rect.x1, mid_y, 0.0) - self.point(id.face, rect.x0, mid_y, 0.0);
        let up = self.point(id.face, mid_x, rect.y1, 0.0) - self.point(id.face, mid_x, rect.y0, 0.0);

        PatchGeometry {
            center: self.point(id.face, mid_x, mid_y, 0.0),
            normal,
            length: across.length().max(up.length()),
            offset,
            bbox,
        }
    }

    fn cube_face(face: u8) -> CubeFace {
        CubeFace::from_index(face).unwrap_or(CubeFace::PosX)
    }

    fn lon_lat(face: u8, x: f64, y: f64) -> (f64, f64) {
        ((face as f64 + x) * PI, (y - 0.5) * PI)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cylindrical_wraps_east_west() {
        let s = Surface::Cylindrical { radius: 1.0 };
        let east = s.link(0, Side::East).unwrap();
        assert_eq!((east.face, east.side), (1, Side::West));
        let west = s.link(0, Side::West).unwrap();
        assert_eq!((west.face, west.side), (1, Side::East));
        assert!(s.link(1, Side::North).is_none());

        let a = s.point(0, 1.0, 0.3, 0.0);
        let b = s.point(1, 0.0, 0.3, 0.0);
        assert!((a - b).length() < 1e-12);
        let c = s.point(1, 1.0, 0.3, 0.0);
        let d = s.point(0, 0.0, 0.3, 0.0);
        assert!((c - d).length() < 1e-12);
    }

    #[test]
    fn test_flat_has_no_links() {
        let s = Surface::Flat { size: 10.0 };
        for side in Side::ALL {
            assert!(s.link(0, side).is_none());
        }
        assert_eq!(s.root_count(), 1);
    }

    #[test]
    fn test_locate_inverts_point() {
        for surface in [
            Surface::CubeSphere { radius: 100.0 },
            Surface::Flat { size: 100.0 },
            Surface::Cylindrical { radius: 100.0 },
        ] {
            let face = surface.root_count() - 1;
            let p = surface.point(face, 0.25, 0.6, 3.0);
            let (f, x, y) = surface.locate(p).unwrap();
            assert_eq!(f, face, "{surface:?}");
            assert!((x - 0.25).abs() < 1e-9, "{surface:?}");
            assert!((y - 0.6).abs() < 1e-9, "{surface:?}");
            assert!((surface.altitude(p) - 3.0).abs() < 1e-9, "{surface:?}");
        }
    }

    /// The bounding box holds every displaced sample of the patch.
    #[test]
    fn test_geometry_box_contains_samples() {
        let s = Surface::CubeSphere { radius: 1000.0 };
        let id = PatchId::root(2).child(crate::Quadrant::TopRight);
        let g = s.geometry(id, -5.0, 20.0);
        let rect = id.rect();
        for (x, y) in [(rect.x0, rect.y0), (rect.x1, rect.y1)] {
            for h in [-5.0, 20.0] {
                assert!(g.bbox.contains(s.point(2, x, y, h)));
            }
        }
        assert!(g.offset > 0.0 && g.offset <= 1.0);
        assert!((g.normal.length() - 1.0).abs() < 1e-12);
    }
}
