use glam::DVec3;
use orrery_math::WorldPosition;

use crate::octree::{NodeId, OctreeId};
use crate::{AnchorId, AnchorTree, ContentFlags, Traverser};

/// Shadows covering less than one display step of the light disk are ignored.
const MIN_SHADOW_COVERAGE: f64 = 1.0 / 255.0;

/// Finds bodies that can cast a shadow from `light` onto `target`.
///
/// Angular radii are measured from the target. An occluder qualifies when it
/// lies between target and light, hides at least 1/255 of the light disk, and
/// its penumbra cone reaches the target sphere.
#[derive(Debug)]
pub struct FindShadowCastersTraverser {
    target: AnchorId,
    light: AnchorId,
    target_position: WorldPosition,
    target_radius: f64,
    light_dir: DVec3,
    light_distance: f64,
    light_angular_radius: f64,
    pub occluders: Vec<AnchorId>,
}

impl FindShadowCastersTraverser {
    pub fn new(tree: &AnchorTree, target: AnchorId, light: AnchorId) -> Self {
        let t = tree.get(target);
        let l = tree.get(light);
        let to_light = l.position.relative_to(t.position);
        let light_distance = to_light.length();
        let light_angular_radius = if light_distance > 0.0 {
            (l.radius / light_distance).min(1.0).asin()
        } else {
            0.0
        };
        Self {
            target,
            light,
            target_position: t.position,
            target_radius: t.radius,
            light_dir: to_light.normalize_or_zero(),
            light_distance,
            light_angular_radius,
            occluders: Vec::new(),
        }
    }

    /// Walk the outermost system enclosing the target and return the occluders.
    pub fn find(tree: &mut AnchorTree, target: AnchorId, light: AnchorId) -> Vec<AnchorId> {
        let start = tree
            .ancestors(target)
            .take_while(|a| tree.get(*a).is_system())
            .last();
        let Some(start) = start else {
            return Vec::new();
        };
        let mut traverser = Self::new(tree, target, light);
        tree.traverse(start, &mut traverser);
        traverser.occluders
    }

    /// Shadow test for an occluder sphere.
    pub fn casts_shadow(&self, position: WorldPosition, radius: f64) -> bool {
        if self.light_angular_radius <= 0.0 || radius <= 0.0 {
            return false;
        }
        let rel = position.relative_to(self.target_position);
        let t = self.light_dir.dot(rel);
        if t <= 0.0 || t >= self.light_distance {
            return false;
        }
        let distance = rel.length();
        let occluder_angular_radius = (radius / distance).min(1.0).asin();
        let ratio = occluder_angular_radius / self.light_angular_radius;
        if ratio * ratio <= MIN_SHADOW_COVERAGE {
            return false;
        }
        let separation = (rel - self.light_dir * t).length();
        let penumbra = (1.0 + 1.0 / ratio) * radius;
        separation < penumbra + self.target_radius
    }
}

impl Traverser for FindShadowCastersTraverser {
    fn traverse_anchor(&mut self, tree: &mut AnchorTree, id: AnchorId) {
        if id == self.target || id == self.light {
            return;
        }
        let anchor = tree.get(id);
        if anchor.background || anchor.flags.contains(ContentFlags::VIRTUAL) {
            return;
        }
        if self.casts_shadow(anchor.position, anchor.radius) {
            self.occluders.push(id);
        }
    }

    fn enter_system(&mut self, _tree: &mut AnchorTree, _id: AnchorId) -> bool {
        true
    }

    fn enter_octree_node(&mut self, _tree: &mut AnchorTree, _octree: OctreeId, _node: NodeId) -> bool {
        false
    }
}
