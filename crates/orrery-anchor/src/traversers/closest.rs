use orrery_math::WorldPosition;

use crate::octree::{NodeId, OctreeId};
use crate::{AnchorId, AnchorKind, AnchorTree, Traverser};

/// Finds the top-level system nearest to a position.
///
/// Candidates are the leaves of octrees and the direct children of the root;
/// nested anchors are not considered individually.
#[derive(Debug)]
pub struct FindClosestSystemTraverser {
    target: WorldPosition,
    pub closest: Option<AnchorId>,
    /// Centre distance to `closest`, metres.
    pub distance: f64,
}

impl FindClosestSystemTraverser {
    pub fn new(target: WorldPosition) -> Self {
        Self {
            target,
            closest: None,
            distance: f64::INFINITY,
        }
    }

    fn is_candidate(tree: &AnchorTree, id: AnchorId) -> bool {
        match tree.get(id).parent {
            None => false,
            Some(parent) => {
                parent == tree.root() || matches!(tree.get(parent).kind, AnchorKind::Octree { .. })
            }
        }
    }

    fn consider(&mut self, tree: &AnchorTree, id: AnchorId) {
        let distance = tree.get(id).position.distance_meters(self.target);
        if distance < self.distance {
            self.distance = distance;
            self.closest = Some(id);
        }
    }
}

impl Traverser for FindClosestSystemTraverser {
    fn traverse_anchor(&mut self, tree: &mut AnchorTree, id: AnchorId) {
        if Self::is_candidate(tree, id) {
            self.consider(tree, id);
        }
    }

    fn enter_system(&mut self, tree: &mut AnchorTree, id: AnchorId) -> bool {
        if Self::is_candidate(tree, id) {
            self.consider(tree, id);
            return false;
        }
        true
    }

    fn enter_octree_node(&mut self, tree: &mut AnchorTree, octree: OctreeId, node: NodeId) -> bool {
        let cube = tree.octree(octree).node(node).cube();
        cube.distance_meters(self.target) < self.distance
    }
}
