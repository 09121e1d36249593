//! Static spatial index over anchors, keyed on absolute position and luminosity.

use orrery_config::OctreeConfig;
use orrery_math::units::meters_to_units;
use orrery_math::{Aabb128, Vec3I128, WorldPosition};

use crate::AnchorId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OctreeId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OctreeError {
    #[error("anchor {anchor} at {position} lies outside the octree root cube")]
    OutsideRoot {
        anchor: AnchorId,
        position: WorldPosition,
    },
}

/// An anchor stored in a node, with the values the culling tests need.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OctreeLeaf {
    pub anchor: AnchorId,
    pub position: WorldPosition,
    pub luminosity: f64,
    pub radius: f64,
}

#[derive(Clone, Debug)]
pub struct OctreeNode {
    pub center: WorldPosition,
    pub half_extent: i128,
    pub depth: u8,
    pub leaves: Vec<OctreeLeaf>,
    /// Indexed by octant: bit 0 is +x, bit 1 is +y, bit 2 is +z.
    pub children: [Option<NodeId>; 8],
    /// Brightest leaf in this subtree, watts.
    pub max_luminosity: f64,
    split: bool,
}

impl OctreeNode {
    fn new(center: WorldPosition, half_extent: i128, depth: u8) -> Self {
        Self {
            center,
            half_extent,
            depth,
            leaves: Vec::new(),
            children: [None; 8],
            max_luminosity: 0.0,
            split: false,
        }
    }

    pub fn cube(&self) -> Aabb128 {
        Aabb128::cube(self.center, self.half_extent)
    }

    /// Leaves have been moved into children.
    pub fn is_split(&self) -> bool {
        self.split
    }

    fn octant(&self, p: WorldPosition) -> usize {
        (p.x >= self.center.x) as usize
            | ((p.y >= self.center.y) as usize) << 1
            | ((p.z >= self.center.z) as usize) << 2
    }
}

#[derive(Clone, Debug)]
pub struct Octree {
    nodes: Vec<OctreeNode>,
    leaf_threshold: usize,
    min_half_extent: i128,
    len: usize,
}

/// Smallest power of two that is at least `n`.
fn power_of_two_at_least(n: i128) -> i128 {
    let mut half = 1_i128;
    while half < n {
        half *= 2;
    }
    half
}

impl Octree {
    /// The root half-extent is rounded up to a power of two so every child
    /// cube halves exactly and the eight children tile their parent.
    pub fn new(center: WorldPosition, half_extent: i128, config: &OctreeConfig) -> Self {
        Self {
            nodes: vec![OctreeNode::new(center, power_of_two_at_least(half_extent), 0)],
            leaf_threshold: config.leaf_threshold.max(1),
            min_half_extent: meters_to_units(config.min_cube_size / 2.0).max(1),
            len: 0,
        }
    }

    /// Octree whose power-of-two root cube encloses every position.
    pub fn fitting(positions: &[WorldPosition], config: &OctreeConfig) -> Self {
        let Some(bounds) = Aabb128::enclosing(positions.iter().copied()) else {
            return Self::new(WorldPosition::ORIGIN, 1, config);
        };
        Self::new(bounds.center(), bounds.size().max_abs() / 2 + 1, config)
    }

    pub fn root() -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &OctreeNode {
        &self.nodes[id.0 as usize]
    }

    pub fn nodes(&self) -> &[OctreeNode] {
        &self.nodes
    }

    /// Number of stored leaves.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn root_cube(&self) -> Aabb128 {
        self.nodes[0].cube()
    }

    /// Insert into the deepest node containing the leaf, splitting nodes that
    /// exceed the leaf threshold.
    pub fn insert(&mut self, leaf: OctreeLeaf) -> Result<(), OctreeError> {
        if !self.root_cube().contains_point(leaf.position) {
            return Err(OctreeError::OutsideRoot {
                anchor: leaf.anchor,
                position: leaf.position,
            });
        }
        self.insert_into(Self::root(), leaf);
        self.len += 1;
        Ok(())
    }

    fn insert_into(&mut self, start: NodeId, leaf: OctreeLeaf) {
        let mut current = start;
        loop {
            let node = &mut self.nodes[current.0 as usize];
            node.max_luminosity = node.max_luminosity.max(leaf.luminosity);
            if node.split {
                current = self.child_for(current, leaf.position);
                continue;
            }
            node.leaves.push(leaf);
            if node.leaves.len() > self.leaf_threshold
                && node.half_extent / 2 >= self.min_half_extent
            {
                self.split(current);
            }
            return;
        }
    }

    fn split(&mut self, id: NodeId) {
        let node = &mut self.nodes[id.0 as usize];
        node.split = true;
        let leaves = std::mem::take(&mut node.leaves);
        for leaf in leaves {
            let child = self.child_for(id, leaf.position);
            self.insert_into(child, leaf);
        }
    }

    fn child_for(&mut self, id: NodeId, p: WorldPosition) -> NodeId {
        let parent = &self.nodes[id.0 as usize];
        let octant = parent.octant(p);
        if let Some(child) = parent.children[octant] {
            return child;
        }
        let q = parent.half_extent / 2;
        let sign = |bit: usize| if octant & bit != 0 { q } else { -q };
        let center = parent.center + Vec3I128::new(sign(1), sign(2), sign(4));
        let child = OctreeNode::new(center, q, parent.depth + 1);
        let child_id = NodeId(self.nodes.len() as u32);
        self.nodes.push(child);
        self.nodes[id.0 as usize].children[octant] = Some(child_id);
        child_id
    }

    /// Deepest level reached by any node.
    pub fn max_depth(&self) -> u8 {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }
}
