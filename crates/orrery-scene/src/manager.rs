//! Scene managers: turn the visible set into render passes.

use glam::DVec3;
use orrery_anchor::{Anchor, AnchorId, AnchorTree, ContentFlags, Observer};
use orrery_config::{CoreConfig, SceneManagerKind};

use crate::{DepthRange, PointSprite, RegionKind, RegionSceneManager, RenderPass, SceneNode};
use crate::sprite::oid_color;

/// Smallest near distance any pass uses, scene units.
pub const MIN_NEAR: f64 = 1e-6;

/// Minimum relative gap between a lens's near and far planes.
const CLIP_EPSILON: f64 = 1e-3;

/// Everything a manager reads for one frame.
#[derive(Debug, Clone, Copy)]
pub struct SceneInput<'a> {
    pub tree: &'a AnchorTree,
    /// Visible anchors sorted by `z_distance`.
    pub visible: &'a [AnchorId],
    pub observer: &'a Observer,
    pub config: &'a CoreConfig,
}

/// Visible anchors split by how they are drawn.
#[derive(Debug, Default)]
pub(crate) struct Classified {
    pub bodies: Vec<AnchorId>,
    pub background: Vec<AnchorId>,
    pub points: Vec<AnchorId>,
}

impl SceneInput<'_> {
    pub(crate) fn classify(&self) -> Classified {
        let mut out = Classified::default();
        for &id in self.visible {
            let a = self.tree.get(id);
            let geometric = a.state.resolved && !a.is_system() && !a.flags.contains(ContentFlags::VIRTUAL);
            match (geometric, a.background) {
                (true, false) => out.bodies.push(id),
                (true, true) => out.background.push(id),
                (false, _) => out.points.push(id),
            }
        }
        out
    }

    pub(crate) fn node(&self, id: AnchorId) -> SceneNode {
        let a = self.tree.get(id);
        let scale = self.config.world_scale;
        SceneNode {
            anchor: id,
            position: a.state.rel_position / scale,
            radius: a.radius / scale,
            orientation: a.state.orientation,
            oid_color: self.config.color_picking.then(|| oid_color(id)),
        }
    }

    pub(crate) fn sprite(&self, id: AnchorId) -> PointSprite {
        PointSprite::new(self.tree.get(id), self.config)
    }

    /// Configured near and far planes in scene units.
    pub(crate) fn configured_planes(&self) -> (f64, f64) {
        let scale = self.config.world_scale;
        let near = (self.config.near_plane / scale).max(MIN_NEAR);
        let far = if self.config.infinite_far_plane {
            f64::INFINITY
        } else {
            self.config.far_plane / scale
        };
        (near, far)
    }
}

/// Depth interval of a body along the view direction, in scene units.
///
/// `cos_fov2` widens the near side so that a body at the edge of the view
/// still fits. Returns `None` for bodies entirely behind the camera.
pub(crate) fn body_interval(anchor: &Anchor, forward: DVec3, cos_fov2: f64, world_scale: f64) -> Option<(f64, f64)> {
    let d = anchor.state.distance_to_obs;
    let r = anchor.radius;
    if d <= r {
        return Some((MIN_NEAR, ((d + r) / world_scale).max(MIN_NEAR * (1.0 + CLIP_EPSILON))));
    }
    let coef = -anchor.state.vector_to_obs.dot(forward);
    if coef <= 0.0 {
        return None;
    }
    let near = ((d - r) * coef * cos_fov2 / world_scale).max(MIN_NEAR);
    let far = (d + r) * coef / world_scale;
    (far > near).then_some((near, far))
}

/// Lens planes of a pass, padded by 1% and kept apart.
pub(crate) fn clip_planes(near: f64, far: f64) -> (f64, Option<f64>) {
    let clip_near = near * 0.99;
    if !far.is_finite() {
        return (clip_near, None);
    }
    let clip_far = (far * 1.01).max(clip_near * (1.0 + CLIP_EPSILON));
    (clip_near, Some(clip_far))
}

pub(crate) fn single_pass(input: &SceneInput<'_>, near: f64, far: f64) -> RenderPass {
    let classified = input.classify();
    let (clip_near, clip_far) = clip_planes(near, far);
    RenderPass {
        kind: RegionKind::Whole,
        near,
        far,
        lens: input.observer.lens.with_clip(clip_near, clip_far),
        depth_range: DepthRange::full(input.config.use_inverse_z),
        sort_index: 0,
        nodes: classified
            .bodies
            .iter()
            .chain(&classified.background)
            .map(|id| input.node(*id))
            .collect(),
        points: classified.points.iter().map(|id| input.sprite(*id)).collect(),
    }
}

/// Builds the render passes of a frame.
pub trait SceneManager: Send {
    fn kind(&self) -> SceneManagerKind;

    /// Passes sorted by `sort_index`.
    fn build(&mut self, input: &SceneInput<'_>) -> Vec<RenderPass>;
}

/// One pass between the configured planes.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticSceneManager;

impl SceneManager for StaticSceneManager {
    fn kind(&self) -> SceneManagerKind {
        SceneManagerKind::Static
    }

    fn build(&mut self, input: &SceneInput<'_>) -> Vec<RenderPass> {
        let (near, far) = input.configured_planes();
        vec![single_pass(input, near, far)]
    }
}

/// One pass whose near plane follows the closest resolved body and whose far
/// plane, when finite, follows the farthest one.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicSceneManager;

impl SceneManager for DynamicSceneManager {
    fn kind(&self) -> SceneManagerKind {
        SceneManagerKind::Dynamic
    }

    fn build(&mut self, input: &SceneInput<'_>) -> Vec<RenderPass> {
        let (config_near, config_far) = input.configured_planes();
        let forward = input.observer.forward();
        let cos_fov2 = input.observer.lens.half_diagonal_fov().cos();
        let intervals: Vec<(f64, f64)> = input
            .classify()
            .bodies
            .iter()
            .filter_map(|id| body_interval(input.tree.get(*id), forward, cos_fov2, input.config.world_scale))
            .collect();

        let near = intervals
            .iter()
            .map(|(n, _)| *n)
            .reduce(f64::min)
            .map_or(config_near, |n| n.max(config_near));
        let far = if config_far.is_finite() {
            intervals
                .iter()
                .map(|(_, f)| *f)
                .reduce(f64::max)
                .unwrap_or(config_far)
        } else {
            config_far
        };
        vec![single_pass(input, near, far.max(near * (1.0 + CLIP_EPSILON)))]
    }
}

pub fn scene_manager_for(kind: SceneManagerKind) -> Box<dyn SceneManager> {
    match kind {
        SceneManagerKind::Static => Box::new(StaticSceneManager),
        SceneManagerKind::Dynamic => Box::new(DynamicSceneManager),
        SceneManagerKind::Region => Box::new(RegionSceneManager::default()),
    }
}
