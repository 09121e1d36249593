use orrery_math::WorldPosition;
use orrery_math::photometry::{LIGHT_SOURCE_MAGNITUDE, point_radiance, radiance_from_magnitude};

use crate::octree::{NodeId, OctreeId};
use crate::{AnchorId, AnchorTree, ContentFlags, Traverser};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSource {
    pub anchor: AnchorId,
    /// Irradiance at the target, W/m².
    pub radiance: f64,
    pub distance: f64,
}

/// Collects emissive anchors bright enough to light a target.
#[derive(Debug)]
pub struct FindLightSourceTraverser {
    target: WorldPosition,
    exclude: Option<AnchorId>,
    threshold: f64,
    pub lights: Vec<LightSource>,
}

impl FindLightSourceTraverser {
    /// Sources brighter than magnitude -10 as seen from `target`.
    pub fn new(target: WorldPosition, exclude: Option<AnchorId>) -> Self {
        Self {
            target,
            exclude,
            threshold: radiance_from_magnitude(LIGHT_SOURCE_MAGNITUDE),
            lights: Vec::new(),
        }
    }

    /// Lights sorted from brightest to faintest.
    pub fn into_sorted(mut self) -> Vec<LightSource> {
        self.lights.sort_by(|a, b| b.radiance.total_cmp(&a.radiance));
        self.lights
    }
}

impl Traverser for FindLightSourceTraverser {
    fn traverse_anchor(&mut self, tree: &mut AnchorTree, id: AnchorId) {
        let anchor = tree.get(id);
        if Some(id) == self.exclude || !anchor.flags.contains(ContentFlags::EMISSIVE) {
            return;
        }
        let distance = anchor.position.distance_meters(self.target);
        let radiance = point_radiance(anchor.luminosity, distance);
        if radiance >= self.threshold {
            self.lights.push(LightSource {
                anchor: id,
                radiance,
                distance,
            });
        }
    }

    fn enter_system(&mut self, tree: &mut AnchorTree, id: AnchorId) -> bool {
        tree.get(id).flags.contains(ContentFlags::EMISSIVE)
    }

    fn enter_octree_node(&mut self, tree: &mut AnchorTree, octree: OctreeId, node: NodeId) -> bool {
        let node = tree.octree(octree).node(node);
        let distance = node.cube().distance_meters(self.target);
        distance <= 0.0 || point_radiance(node.max_luminosity, distance) >= self.threshold
    }
}
