use crate::octree::{NodeId, OctreeId};
use crate::{AnchorId, AnchorTree};

/// Visitor over the anchor tree.
///
/// [`AnchorTree::traverse`] calls the entry point matching the anchor kind.
/// The default `traverse_*` methods walk children in order; implementors
/// decide what to do at leaves and which containers to enter.
pub trait Traverser {
    fn traverse_anchor(&mut self, tree: &mut AnchorTree, id: AnchorId);

    /// Return true to descend into the system's children.
    fn enter_system(&mut self, tree: &mut AnchorTree, id: AnchorId) -> bool;

    fn traverse_system(&mut self, tree: &mut AnchorTree, id: AnchorId) {
        let count = tree.children(id).len();
        for i in 0..count {
            let child = tree.children(id)[i];
            tree.traverse(child, self);
        }
    }

    /// Return true to visit the node's leaves and consider its children.
    fn enter_octree_node(&mut self, tree: &mut AnchorTree, octree: OctreeId, node: NodeId)
    -> bool;

    fn traverse_octree_node(&mut self, tree: &mut AnchorTree, octree: OctreeId, node: NodeId) {
        let count = tree.octree(octree).node(node).leaves.len();
        for i in 0..count {
            let leaf = tree.octree(octree).node(node).leaves[i].anchor;
            tree.traverse(leaf, self);
        }
        self.traverse_octree_children(tree, octree, node);
    }

    /// Enter and traverse each child node of `node`.
    fn traverse_octree_children(&mut self, tree: &mut AnchorTree, octree: OctreeId, node: NodeId) {
        let children = tree.octree(octree).node(node).children;
        for child in children.into_iter().flatten() {
            if self.enter_octree_node(tree, octree, child) {
                self.traverse_octree_node(tree, octree, child);
            }
        }
    }
}
