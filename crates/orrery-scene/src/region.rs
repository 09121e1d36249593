//! Depth-sliced scene building.
//!
//! Distances in an astronomical scene span far more than one depth buffer can
//! resolve. Bodies are grouped into disjoint depth intervals, each drawn in
//! its own pass with its own near and far planes and its own slice of the
//! depth buffer. Empty gaps between them become bridge passes that only carry
//! point sprites, and everything beyond the last body lands in a background
//! pass that reaches to infinity.

use orrery_anchor::AnchorId;
use orrery_config::SceneManagerKind;
use tracing::trace;

use crate::manager::{body_interval, clip_planes};
use crate::{DepthRange, MIN_NEAR, RegionKind, RenderPass, SceneInput, SceneManager};

/// Depth interval of one or more overlapping bodies.
#[derive(Debug, Clone, PartialEq)]
struct Interval {
    near: f64,
    far: f64,
    bodies: Vec<AnchorId>,
}

/// Scene manager producing one pass per depth region.
#[derive(Debug, Default)]
pub struct RegionSceneManager {
    intervals: Vec<Interval>,
}

impl RegionSceneManager {
    /// Sort by near distance and fold overlapping intervals together.
    fn merge_intervals(&mut self) -> Vec<Interval> {
        self.intervals.sort_by(|a, b| a.near.total_cmp(&b.near));
        let mut stack: Vec<Interval> = Vec::with_capacity(self.intervals.len());
        for interval in self.intervals.drain(..) {
            match stack.last_mut() {
                Some(top) if interval.near < top.far => {
                    top.far = top.far.max(interval.far);
                    top.bodies.extend(interval.bodies);
                }
                _ => stack.push(interval),
            }
        }
        stack
    }
}

impl SceneManager for RegionSceneManager {
    fn kind(&self) -> SceneManagerKind {
        SceneManagerKind::Region
    }

    fn build(&mut self, input: &SceneInput<'_>) -> Vec<RenderPass> {
        let observer = input.observer;
        let forward = observer.forward();
        let cos_fov2 = observer.lens.half_diagonal_fov().cos();
        let scale = input.config.world_scale;
        let classified = input.classify();

        self.intervals.clear();
        for &id in &classified.bodies {
            match body_interval(input.tree.get(id), forward, cos_fov2, scale) {
                Some((near, far)) => self.intervals.push(Interval {
                    near,
                    far,
                    bodies: vec![id],
                }),
                None => trace!(anchor = %id, "resolved body behind the camera"),
            }
        }
        let bodies = self.merge_intervals();

        let mut regions: Vec<(RegionKind, f64, f64, Vec<AnchorId>)> = Vec::with_capacity(bodies.len() * 2 + 2);
        let mut cursor = MIN_NEAR;
        for body in bodies {
            if body.near > cursor {
                let kind = if regions.is_empty() { RegionKind::Near } else { RegionKind::Bridge };
                regions.push((kind, cursor, body.near, Vec::new()));
            }
            let near = body.near.max(cursor);
            regions.push((RegionKind::Body, near, body.far, body.bodies));
            cursor = body.far;
        }
        regions.push((RegionKind::Background, cursor, f64::INFINITY, classified.background));

        let count = regions.len();
        let reverse = input.config.use_inverse_z;
        let (_, configured_far) = input.configured_planes();
        let mut passes: Vec<RenderPass> = regions
            .into_iter()
            .enumerate()
            .map(|(i, (kind, near, far, nodes))| {
                let (clip_near, mut clip_far) = clip_planes(near, far);
                if kind == RegionKind::Background && configured_far.is_finite() {
                    clip_far = Some(configured_far.max(clip_near * 1.001));
                }
                RenderPass {
                    kind,
                    near,
                    far,
                    lens: observer.lens.with_clip(clip_near, clip_far),
                    depth_range: DepthRange::slice(i, count, reverse),
                    sort_index: i as u32,
                    nodes: nodes.into_iter().map(|id| input.node(id)).collect(),
                    points: Vec::new(),
                }
            })
            .collect();

        for &id in &classified.points {
            let z = input.tree.get(id).state.z_distance / scale;
            let index = passes.partition_point(|p| p.far <= z).min(count - 1);
            passes[index].points.push(input.sprite(id));
        }

        // Background last, the rest nearest first.
        passes.sort_by_key(|p| (p.kind == RegionKind::Background, p.sort_index));
        for (i, pass) in passes.iter_mut().enumerate() {
            pass.sort_index = i as u32;
        }
        passes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(near: f64, far: f64, id: u32) -> Interval {
        Interval {
            near,
            far,
            bodies: vec![AnchorId(id)],
        }
    }

    #[test]
    fn test_overlapping_intervals_merge() {
        let mut manager = RegionSceneManager::default();
        manager.intervals = vec![
            interval(50.0, 60.0, 3),
            interval(1.0, 5.0, 0),
            interval(4.0, 8.0, 1),
            interval(8.0, 9.0, 2),
        ];
        let merged = manager.merge_intervals();
        assert_eq!(merged.len(), 3);
        assert_eq!((merged[0].near, merged[0].far), (1.0, 8.0));
        assert_eq!(merged[0].bodies, vec![AnchorId(0), AnchorId(1)]);
        // Touching intervals stay separate.
        assert_eq!((merged[1].near, merged[1].far), (8.0, 9.0));
        assert_eq!((merged[2].near, merged[2].far), (50.0, 60.0));
    }

    #[test]
    fn test_nested_interval_is_absorbed() {
        let mut manager = RegionSceneManager::default();
        manager.intervals = vec![interval(1.0, 100.0, 0), interval(10.0, 20.0, 1)];
        let merged = manager.merge_intervals();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].far, 100.0);
    }
}
