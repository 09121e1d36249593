//! The six faces of a cube-sphere surface and how their edges meet.

use glam::DVec3;

use crate::{EdgeLink, Side};

/// A cube face, named by the axis its outward normal points along.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum CubeFace {
    PosX = 0,
    NegX = 1,
    PosY = 2,
    NegY = 3,
    PosZ = 4,
    NegZ = 5,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PosX,
        CubeFace::NegX,
        CubeFace::PosY,
        CubeFace::NegY,
        CubeFace::PosZ,
        CubeFace::NegZ,
    ];

    pub fn from_index(index: u8) -> Option<CubeFace> {
        Self::ALL.get(index as usize).copied()
    }

    /// The face whose normal is closest to `dir`.
    pub fn from_direction(dir: DVec3) -> CubeFace {
        let a = dir.abs();
        if a.x >= a.y && a.x >= a.z {
            if dir.x >= 0.0 { CubeFace::PosX } else { CubeFace::NegX }
        } else if a.y >= a.z {
            if dir.y >= 0.0 { CubeFace::PosY } else { CubeFace::NegY }
        } else if dir.z >= 0.0 {
            CubeFace::PosZ
        } else {
            CubeFace::NegZ
        }
    }

    #[must_use]
    pub fn normal(self) -> DVec3 {
        match self {
            CubeFace::PosX => DVec3::X,
            CubeFace::NegX => DVec3::NEG_X,
            CubeFace::PosY => DVec3::Y,
            CubeFace::NegY => DVec3::NEG_Y,
            CubeFace::PosZ => DVec3::Z,
            CubeFace::NegZ => DVec3::NEG_Z,
        }
    }

    /// Direction of increasing `x` on this face.
    #[must_use]
    pub fn tangent(self) -> DVec3 {
        match self {
            CubeFace::PosX => DVec3::NEG_Z,
            CubeFace::NegX => DVec3::Z,
            CubeFace::PosY => DVec3::X,
            CubeFace::NegY => DVec3::X,
            CubeFace::PosZ => DVec3::X,
            CubeFace::NegZ => DVec3::NEG_X,
        }
    }

    /// Direction of increasing `y` on this face.
    #[must_use]
    pub fn bitangent(self) -> DVec3 {
        match self {
            CubeFace::PosX => DVec3::Y,
            CubeFace::NegX => DVec3::Y,
            CubeFace::PosY => DVec3::NEG_Z,
            CubeFace::NegY => DVec3::Z,
            CubeFace::PosZ => DVec3::Y,
            CubeFace::NegZ => DVec3::Y,
        }
    }

    /// Point on the unit cube for face parameters `x, y` in `[0, 1]`.
    pub fn cube_point(self, x: f64, y: f64) -> DVec3 {
        self.normal() + self.tangent() * (2.0 * x - 1.0) + self.bitangent() * (2.0 * y - 1.0)
    }

    /// Face parameters of a direction that projects onto this face.
    pub fn params_of(self, dir: DVec3) -> (f64, f64) {
        let depth = dir.dot(self.normal());
        let p = dir / depth;
        let x = (p.dot(self.tangent()) + 1.0) * 0.5;
        let y = (p.dot(self.bitangent()) + 1.0) * 0.5;
        (x.clamp(0.0, 1.0), y.clamp(0.0, 1.0))
    }

    /// The face across `side` and which of its edges is shared.
    ///
    /// The table is derived from the face bases: crossing the east edge of a
    /// face moves along its tangent onto the face with that normal, whose
    /// shared edge is the one pointing back toward the current face. The edge
    /// is flipped when both faces walk the shared edge in opposite
    /// directions.
    pub fn edge_link(self, side: Side) -> EdgeLink {
        let (dir, along) = match side {
            Side::East => (self.tangent(), self.bitangent()),
            Side::West => (-self.tangent(), self.bitangent()),
            Side::North => (self.bitangent(), self.tangent()),
            Side::South => (-self.bitangent(), self.tangent()),
        };
        let other = CubeFace::from_direction(dir);
        let back = self.normal();
        let (other_side, other_along) = if other.tangent().dot(back) > 0.5 {
            (Side::East, other.bitangent())
        } else if other.tangent().dot(back) < -0.5 {
            (Side::West, other.bitangent())
        } else if other.bitangent().dot(back) > 0.5 {
            (Side::North, other.tangent())
        } else {
            (Side::South, other.tangent())
        };
        EdgeLink {
            face: other as u8,
            side: other_side,
            flipped: along.dot(other_along) < 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tangent_cross_bitangent_equals_normal() {
        for face in CubeFace::ALL {
            let cross = face.tangent().cross(face.bitangent());
            assert!((cross - face.normal()).length() < 1e-12, "{face:?}");
        }
    }

    /// Crossing an edge and crossing back lands on the starting edge.
    #[test]
    fn test_edge_links_are_symmetric() {
        for face in CubeFace::ALL {
            for side in Side::ALL {
                let link = face.edge_link(side);
                assert_ne!(link.face, face as u8);
                let other = CubeFace::from_index(link.face).unwrap();
                let back = other.edge_link(link.side);
                assert_eq!(back.face, face as u8, "{face:?} {side:?}");
                assert_eq!(back.side, side, "{face:?} {side:?}");
                assert_eq!(back.flipped, link.flipped);
            }
        }
    }

    /// Corresponding points on a shared edge coincide on the cube.
    #[test]
    fn test_shared_edges_coincide() {
        let edge_point = |face: CubeFace, side: Side, s: f64| match side {
            Side::North => face.cube_point(s, 1.0),
            Side::South => face.cube_point(s, 0.0),
            Side::East => face.cube_point(1.0, s),
            Side::West => face.cube_point(0.0, s),
        };
        for face in CubeFace::ALL {
            for side in Side::ALL {
                let link = face.edge_link(side);
                let other = CubeFace::from_index(link.face).unwrap();
                for s in [0.0, 0.25, 0.8] {
                    let t = if link.flipped { 1.0 - s } else { s };
                    let a = edge_point(face, side, s);
                    let b = edge_point(other, link.side, t);
                    assert!((a - b).length() < 1e-12, "{face:?} {side:?} at {s}");
                }
            }
        }
    }

    #[test]
    fn test_params_round_trip_through_cube_point() {
        for face in CubeFace::ALL {
            let p = face.cube_point(0.3, 0.9);
            assert_eq!(CubeFace::from_direction(p), face);
            let (x, y) = face.params_of(p.normalize());
            assert!((x - 0.3).abs() < 1e-12 && (y - 0.9).abs() < 1e-12);
        }
    }
}
