use orrery_math::photometry::point_radiance;

use crate::octree::{NodeId, OctreeId};
use crate::{AnchorId, AnchorTree, FrameContext, Traverser};

/// Updates every reachable anchor and collects the visible ones.
///
/// Octree nodes are pruned when the observer is outside the cube and either
/// the brightest leaf would be too dim at the cube's nearest point, or the cube
/// is outside the view frustum. Leaves that are both too dim and too small to
/// resolve are skipped without an update.
#[derive(Debug)]
pub struct UpdateTraverser<'a> {
    ctx: &'a FrameContext,
    visible: Vec<AnchorId>,
    visited: usize,
    pruned_nodes: usize,
    skipped_leaves: usize,
}

impl<'a> UpdateTraverser<'a> {
    pub fn new(ctx: &'a FrameContext) -> Self {
        Self {
            ctx,
            visible: Vec::new(),
            visited: 0,
            pruned_nodes: 0,
            skipped_leaves: 0,
        }
    }

    /// Visible anchors in traversal order.
    pub fn visible(&self) -> &[AnchorId] {
        &self.visible
    }

    pub fn visited(&self) -> usize {
        self.visited
    }

    pub fn pruned_nodes(&self) -> usize {
        self.pruned_nodes
    }

    pub fn skipped_leaves(&self) -> usize {
        self.skipped_leaves
    }

    /// Visible anchors sorted by `z_distance`, nearest first.
    pub fn into_sorted(self, tree: &AnchorTree) -> Vec<AnchorId> {
        let mut visible = self.visible;
        visible.sort_by(|a, b| {
            let za = tree.get(*a).state.z_distance;
            let zb = tree.get(*b).state.z_distance;
            za.total_cmp(&zb)
        });
        visible
    }

    fn collect(&mut self, tree: &AnchorTree, id: AnchorId) {
        let anchor = tree.get(id);
        if anchor.state.visible || anchor.visibility_override {
            self.visible.push(id);
        }
    }
}

impl Traverser for UpdateTraverser<'_> {
    fn traverse_anchor(&mut self, tree: &mut AnchorTree, id: AnchorId) {
        tree.update_anchor(id, self.ctx);
        self.visited += 1;
        self.collect(tree, id);
    }

    fn enter_system(&mut self, tree: &mut AnchorTree, id: AnchorId) -> bool {
        tree.update_anchor(id, self.ctx);
        self.visited += 1;
        let system = tree.get(id);
        let enter = (system.state.resolved && system.state.visible) || system.force_update;
        if !enter {
            // Seen from afar the whole system is a single point.
            self.collect(tree, id);
        }
        enter
    }

    fn enter_octree_node(&mut self, tree: &mut AnchorTree, octree: OctreeId, node: NodeId) -> bool {
        let node = tree.octree(octree).node(node);
        let observer = self.ctx.observer.position;
        let cube = node.cube();
        let distance = cube.distance_meters(observer);
        if distance <= 0.0 {
            return true;
        }
        if point_radiance(node.max_luminosity, distance) < self.ctx.min_radiance {
            self.pruned_nodes += 1;
            return false;
        }
        let min = cube.min.relative_to(observer);
        let max = cube.max.relative_to(observer);
        let inside = self.ctx.frustum.is_aabb_visible(min, max);
        if !inside {
            self.pruned_nodes += 1;
        }
        inside
    }

    fn traverse_octree_node(&mut self, tree: &mut AnchorTree, octree: OctreeId, node: NodeId) {
        let observer = self.ctx.observer.position;
        let count = tree.octree(octree).node(node).leaves.len();
        for i in 0..count {
            let leaf = tree.octree(octree).node(node).leaves[i];
            let distance = leaf.position.distance_meters(observer);
            let dim = point_radiance(leaf.luminosity, distance) < self.ctx.min_radiance;
            let small = leaf.radius < distance * self.ctx.pixel_size * self.ctx.min_body_size;
            if dim && small {
                self.skipped_leaves += 1;
                continue;
            }
            tree.traverse(leaf.anchor, self);
        }
        self.traverse_octree_children(tree, octree, node);
    }
}
