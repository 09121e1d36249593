//! Render commands handed to the renderer.

use glam::{DQuat, DVec3};
use orrery_anchor::{AnchorId, Lens};

use crate::PointSprite;

/// Role of a depth region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    /// Empty slice between the minimum near distance and the first body.
    Near,
    /// Slice enclosing one or more overlapping bodies.
    Body,
    /// Empty slice between two body slices.
    Bridge,
    /// Everything beyond the last body, out to infinity.
    Background,
    /// The single pass of the static and dynamic managers.
    Whole,
}

/// Sub-range of the normalized depth buffer. `near` is the depth written at
/// the pass's near plane; with reverse depth it is the larger value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthRange {
    pub near: f64,
    pub far: f64,
}

impl DepthRange {
    pub const FULL: DepthRange = DepthRange { near: 0.0, far: 1.0 };

    /// Slice `index` of `count` equal slices, the nearest slice lowest.
    pub fn slice(index: usize, count: usize, reverse: bool) -> Self {
        let count = count.max(1) as f64;
        let lo = index as f64 / count;
        let hi = (index + 1) as f64 / count;
        if reverse {
            DepthRange {
                near: 1.0 - lo,
                far: 1.0 - hi,
            }
        } else {
            DepthRange { near: lo, far: hi }
        }
    }

    pub fn full(reverse: bool) -> Self {
        Self::slice(0, 1, reverse)
    }

    pub fn min(&self) -> f64 {
        self.near.min(self.far)
    }

    pub fn max(&self) -> f64 {
        self.near.max(self.far)
    }
}

/// A resolved body drawn as geometry, in camera-relative scene units.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub anchor: AnchorId,
    pub position: DVec3,
    pub radius: f64,
    pub orientation: DQuat,
    pub oid_color: Option<[u8; 4]>,
}

/// One pass of the frame: the half-open depth interval `[near, far)` in
/// scene units, its lens, and what it draws.
#[derive(Debug, Clone)]
pub struct RenderPass {
    pub kind: RegionKind,
    pub near: f64,
    pub far: f64,
    pub lens: Lens,
    pub depth_range: DepthRange,
    pub sort_index: u32,
    pub nodes: Vec<SceneNode>,
    pub points: Vec<PointSprite>,
}

impl RenderPass {
    pub fn contains(&self, z: f64) -> bool {
        z >= self.near && z < self.far
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slices_are_contiguous() {
        for reverse in [false, true] {
            let slices: Vec<DepthRange> = (0..4).map(|i| DepthRange::slice(i, 4, reverse)).collect();
            for pair in slices.windows(2) {
                assert_eq!(pair[0].far, pair[1].near);
            }
            assert_eq!(slices[0].min().min(slices[3].min()), 0.0);
            assert_eq!(slices[0].max().max(slices[3].max()), 1.0);
        }
    }

    #[test]
    fn test_reverse_depth_puts_nearest_on_top() {
        assert_eq!(DepthRange::slice(0, 2, false), DepthRange { near: 0.0, far: 0.5 });
        assert_eq!(DepthRange::slice(0, 2, true), DepthRange { near: 1.0, far: 0.5 });
        assert_eq!(DepthRange::full(true), DepthRange { near: 1.0, far: 0.0 });
    }
}
