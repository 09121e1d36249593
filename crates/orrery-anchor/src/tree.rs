//! Arena of anchors linked by index.

use orrery_config::{CoreConfig, OctreeConfig};
use orrery_debug::{Diagnostic, DiagnosticKind, DiagnosticSink, Subject};
use orrery_math::WorldPosition;
use orrery_math::photometry::{magnitude_from_radiance, point_radiance, radiance_from_magnitude};

use crate::anchor::{AnchorDesc, DescShape};
use crate::octree::{Octree, OctreeId, OctreeLeaf};
use crate::{Anchor, AnchorId, AnchorKind, AnchorState, ContentFlags, Frustum, Observer, Traverser};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TreeError {
    #[error("parent {0} does not exist")]
    UnknownParent(AnchorId),

    #[error("parent {0} is a body and cannot hold children")]
    ParentNotContainer(AnchorId),

    #[error("the root anchor must be a system")]
    RootNotSystem,
}

/// Inputs shared by every anchor update within one frame.
#[derive(Debug, Clone)]
pub struct FrameContext {
    pub time: f64,
    pub frame_id: u64,
    pub observer: Observer,
    pub frustum: Frustum,
    pub pixel_size: f64,
    pub min_body_size: f64,
    /// Irradiance of the faintest point source drawn, W/m².
    pub min_radiance: f64,
}

impl FrameContext {
    pub fn new(time: f64, frame_id: u64, observer: Observer, config: &CoreConfig) -> Self {
        Self {
            time,
            frame_id,
            frustum: observer.frustum(),
            pixel_size: observer.lens.pixel_size(),
            min_body_size: config.min_body_size,
            min_radiance: radiance_from_magnitude(config.lowest_app_magnitude),
            observer,
        }
    }
}

/// All anchors of a session. The root is always [`AnchorTree::root`].
#[derive(Debug)]
pub struct AnchorTree {
    anchors: Vec<Anchor>,
    child_ids: Vec<AnchorId>,
    octrees: Vec<Octree>,
    sink: DiagnosticSink,
}

impl AnchorTree {
    pub fn root(&self) -> AnchorId {
        AnchorId(0)
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn get(&self, id: AnchorId) -> &Anchor {
        &self.anchors[id.index()]
    }

    pub fn get_mut(&mut self, id: AnchorId) -> &mut Anchor {
        &mut self.anchors[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Anchor> {
        self.anchors.iter()
    }

    pub fn find(&self, name: &str) -> Option<AnchorId> {
        self.anchors.iter().find(|a| a.name == name).map(|a| a.id)
    }

    /// Ordered children of a system or octree container.
    pub fn children(&self, id: AnchorId) -> &[AnchorId] {
        match &self.get(id).kind {
            AnchorKind::Body => &[],
            AnchorKind::System { children } | AnchorKind::Octree { children, .. } => {
                &self.child_ids[children.start as usize..children.end as usize]
            }
        }
    }

    pub fn octree(&self, id: OctreeId) -> &Octree {
        &self.octrees[id.0 as usize]
    }

    pub fn diagnostics(&self) -> &DiagnosticSink {
        &self.sink
    }

    /// Ancestors from the parent up to the root.
    pub fn ancestors(&self, id: AnchorId) -> impl Iterator<Item = AnchorId> + '_ {
        std::iter::successors(self.get(id).parent, |p| self.get(*p).parent)
    }

    /// Dispatch to the visitor entry point matching the anchor kind.
    pub fn traverse<T: Traverser + ?Sized>(&mut self, id: AnchorId, visitor: &mut T) {
        let kind = self.get(id).kind.clone();
        match kind {
            AnchorKind::Body => visitor.traverse_anchor(self, id),
            AnchorKind::System { .. } => {
                if visitor.enter_system(self, id) {
                    visitor.traverse_system(self, id);
                }
            }
            AnchorKind::Octree { octree, .. } => {
                let root = Octree::root();
                if visitor.enter_octree_node(self, octree, root) {
                    visitor.traverse_octree_node(self, octree, root);
                }
            }
        }
    }

    /// Recompute dynamics and observer-relative state for `frame_id`.
    ///
    /// Returns false when the anchor was already updated this frame. A failed
    /// orbit or rotation keeps the previous pose and hides the anchor.
    pub fn update_anchor(&mut self, id: AnchorId, ctx: &FrameContext) -> bool {
        if self.get(id).is_fresh(ctx.frame_id) {
            return false;
        }

        let parent_position = self
            .get(id)
            .parent
            .map_or(WorldPosition::ORIGIN, |p| self.get(p).position);

        let anchor = &mut self.anchors[id.index()];
        let mut dynamics_ok = true;
        if let Some(orbit) = &anchor.orbit {
            match orbit.position_at(ctx.time) {
                Ok(local) => anchor.local_position = local,
                Err(err) => {
                    dynamics_ok = false;
                    if anchor.state.dynamics_ok {
                        self.sink.report(Diagnostic::new(
                            DiagnosticKind::DynamicsFailed,
                            Subject::Anchor(id.0),
                            format!("orbit of {}: {err}", anchor.name),
                        ));
                    }
                }
            }
        }
        if let Some(rotation) = &anchor.rotation {
            match rotation.orientation_at(ctx.time) {
                Ok(q) => anchor.state.orientation = q,
                Err(err) => {
                    if dynamics_ok && anchor.state.dynamics_ok {
                        self.sink.report(Diagnostic::new(
                            DiagnosticKind::DynamicsFailed,
                            Subject::Anchor(id.0),
                            format!("rotation of {}: {err}", anchor.name),
                        ));
                    }
                    dynamics_ok = false;
                }
            }
        }
        anchor.position = parent_position + anchor.local_position;
        let luminosity = anchor.effective_luminosity();

        let state = &mut anchor.state;
        state.was_visible = state.visible;
        state.was_resolved = state.resolved;
        state.dynamics_ok = dynamics_ok;

        let rel = anchor.position.relative_to(ctx.observer.position);
        let distance = rel.length();
        state.rel_position = rel;
        state.distance_to_obs = distance;
        state.vector_to_obs = if distance > 0.0 { -rel / distance } else { rel };
        state.z_distance = rel.dot(ctx.observer.forward());
        state.visible_size = if distance > 0.0 {
            anchor.radius / (distance * ctx.pixel_size)
        } else {
            f64::INFINITY
        };
        state.point_radiance = point_radiance(luminosity, distance);
        state.app_magnitude = magnitude_from_radiance(state.point_radiance);
        state.resolved = state.visible_size >= ctx.min_body_size;
        state.in_view = ctx.frustum.is_sphere_visible(rel, anchor.radius);
        state.visible = dynamics_ok
            && state.in_view
            && (state.resolved || state.point_radiance >= ctx.min_radiance);
        state.update_id = ctx.frame_id;
        true
    }
}

/// Collects anchor descriptions, then lays them out as an [`AnchorTree`].
#[derive(Debug)]
pub struct AnchorTreeBuilder {
    descs: Vec<(Option<AnchorId>, AnchorDesc)>,
    children: Vec<Vec<AnchorId>>,
}

impl AnchorTreeBuilder {
    /// Start a tree with the given root system.
    pub fn new(root: AnchorDesc) -> Result<Self, TreeError> {
        if root.shape != DescShape::System {
            return Err(TreeError::RootNotSystem);
        }
        Ok(Self {
            descs: vec![(None, root.force_update())],
            children: vec![Vec::new()],
        })
    }

    pub fn root(&self) -> AnchorId {
        AnchorId(0)
    }

    pub fn add(&mut self, parent: AnchorId, desc: AnchorDesc) -> Result<AnchorId, TreeError> {
        let Some((_, parent_desc)) = self.descs.get(parent.index()) else {
            return Err(TreeError::UnknownParent(parent));
        };
        if parent_desc.shape == DescShape::Body {
            return Err(TreeError::ParentNotContainer(parent));
        }
        let id = AnchorId(self.descs.len() as u32);
        self.descs.push((Some(parent), desc));
        self.children.push(Vec::new());
        self.children[parent.index()].push(id);
        Ok(id)
    }

    /// Flatten children, aggregate luminosity and flags, and build octrees.
    ///
    /// An octree child outside explicit root bounds is an invariant violation:
    /// it asserts in debug builds and is left out of the octree otherwise.
    pub fn build(self, octree_config: &OctreeConfig, sink: DiagnosticSink) -> AnchorTree {
        let Self { descs, children } = self;

        let mut child_ids = Vec::with_capacity(descs.len());
        let mut anchors: Vec<Anchor> = Vec::with_capacity(descs.len());
        let mut octree_bounds = Vec::new();

        for (index, (parent, desc)) in descs.into_iter().enumerate() {
            let start = child_ids.len() as u32;
            child_ids.extend_from_slice(&children[index]);
            let range = start..child_ids.len() as u32;
            let kind = match desc.shape {
                DescShape::Body => AnchorKind::Body,
                DescShape::System => AnchorKind::System { children: range },
                DescShape::Octree { bounds } => {
                    let octree = OctreeId(octree_bounds.len() as u32);
                    octree_bounds.push((AnchorId(index as u32), bounds));
                    AnchorKind::Octree {
                        octree,
                        children: range,
                    }
                }
            };
            // Parents precede children, so the parent position is final.
            let parent_position =
                parent.map_or(WorldPosition::ORIGIN, |p| anchors[p.index()].position);
            let local = desc
                .orbit
                .as_ref()
                .and_then(|o| o.position_at(0.0).ok())
                .unwrap_or(desc.local_position);
            anchors.push(Anchor {
                id: AnchorId(index as u32),
                name: desc.name,
                parent,
                kind,
                flags: desc.flags,
                luminosity: desc.luminosity,
                max_child_luminosity: 0.0,
                radius: desc.radius,
                local_position: local,
                position: parent_position + local,
                orbit: desc.orbit,
                rotation: desc.rotation,
                background: desc.background,
                visibility_override: desc.visibility_override,
                force_update: desc.force_update,
                color: desc.color,
                state: AnchorState::default(),
            });
        }

        // Children have larger ids than their parent: a reverse sweep sees
        // every child before its parent.
        for index in (0..anchors.len()).rev() {
            let Some(parent) = anchors[index].parent else {
                continue;
            };
            let child = &anchors[index];
            let luminosity = child.effective_luminosity();
            let inherited = child.flags & (ContentFlags::EMISSIVE | ContentFlags::REFLECTIVE);
            let extent = child.local_position.length_meters() + child.radius;
            let is_system = matches!(anchors[parent.index()].kind, AnchorKind::System { .. });
            let parent = &mut anchors[parent.index()];
            parent.max_child_luminosity = parent.max_child_luminosity.max(luminosity);
            parent.flags |= inherited;
            if is_system && parent.radius < extent {
                parent.radius = extent;
            }
        }

        let mut octrees = Vec::with_capacity(octree_bounds.len());
        for (owner, bounds) in octree_bounds {
            let members: Vec<OctreeLeaf> = children[owner.index()]
                .iter()
                .map(|&c| {
                    let a = &anchors[c.index()];
                    OctreeLeaf {
                        anchor: c,
                        position: a.position,
                        luminosity: a.effective_luminosity(),
                        radius: a.radius,
                    }
                })
                .collect();
            let mut octree = match bounds {
                Some((center, half)) => Octree::new(center, half, octree_config),
                None => {
                    let positions: Vec<WorldPosition> =
                        members.iter().map(|l| l.position).collect();
                    Octree::fitting(&positions, octree_config)
                }
            };
            for leaf in members {
                let inside = octree.root_cube().contains_point(leaf.position);
                debug_assert!(inside, "anchor {} outside its octree root cube", leaf.anchor);
                if let Err(err) = octree.insert(leaf) {
                    sink.report(Diagnostic::new(
                        DiagnosticKind::LeafOutsideCube,
                        Subject::Anchor(leaf.anchor.0),
                        err.to_string(),
                    ));
                }
            }
            tracing::debug!(
                owner = %owner,
                leaves = octree.len(),
                nodes = octree.nodes().len(),
                depth = octree.max_depth(),
                "built octree"
            );
            octrees.push(octree);
        }

        AnchorTree {
            anchors,
            child_ids,
            octrees,
            sink,
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::{DQuat, DVec3};
    use orrery_debug::diagnostic_channel;
    use orrery_math::Vec3I128;

    use super::*;
    use crate::dynamics::{BoundedOrbit, CircularOrbit};
    use crate::{Lens, Observer};

    fn ctx(frame_id: u64, time: f64) -> FrameContext {
        let config = CoreConfig::default();
        let observer = Observer::new(
            WorldPosition::ORIGIN,
            DQuat::IDENTITY,
            Lens::from_config(&config),
        );
        FrameContext::new(time, frame_id, observer, &config)
    }

    #[test]
    fn test_root_must_be_system() {
        let err = AnchorTreeBuilder::new(AnchorDesc::body("rock")).unwrap_err();
        assert_eq!(err, TreeError::RootNotSystem);
    }

    #[test]
    fn test_add_rejects_bad_parents() {
        let mut b = AnchorTreeBuilder::new(AnchorDesc::system("root")).unwrap();
        let body = b.add(b.root(), AnchorDesc::body("a")).unwrap();
        assert_eq!(
            b.add(AnchorId(42), AnchorDesc::body("b")),
            Err(TreeError::UnknownParent(AnchorId(42)))
        );
        assert_eq!(
            b.add(body, AnchorDesc::body("c")),
            Err(TreeError::ParentNotContainer(body))
        );
    }

    #[test]
    fn test_children_and_positions() {
        let mut b = AnchorTreeBuilder::new(AnchorDesc::system("root")).unwrap();
        let sys = b
            .add(b.root(), AnchorDesc::system("sys").at(Vec3I128::new(1000, 0, 0)))
            .unwrap();
        let p1 = b.add(sys, AnchorDesc::body("p1").at(Vec3I128::new(0, 500, 0))).unwrap();
        let p2 = b.add(sys, AnchorDesc::body("p2").at(Vec3I128::new(0, 0, 7))).unwrap();
        let tree = b.build(&OctreeConfig::default(), DiagnosticSink::detached());

        assert_eq!(tree.children(sys), &[p1, p2]);
        assert_eq!(tree.children(tree.root()), &[sys]);
        assert_eq!(tree.get(p1).position, WorldPosition::new(1000, 500, 0));
        assert_eq!(tree.get(p1).parent, Some(sys));
        assert_eq!(tree.ancestors(p2).collect::<Vec<_>>(), vec![sys, tree.root()]);
        assert_eq!(tree.find("p2"), Some(p2));
    }

    #[test]
    fn test_system_aggregates_children() {
        let mut b = AnchorTreeBuilder::new(AnchorDesc::system("root")).unwrap();
        let sys = b.add(b.root(), AnchorDesc::system("sys")).unwrap();
        b.add(sys, AnchorDesc::body("star").emissive(1e26).radius(7e8)).unwrap();
        b.add(
            sys,
            AnchorDesc::body("planet")
                .radius(6e6)
                .at_meters(DVec3::new(1.5e11, 0.0, 0.0)),
        )
        .unwrap();
        let tree = b.build(&OctreeConfig::default(), DiagnosticSink::detached());

        let s = tree.get(sys);
        assert_eq!(s.max_child_luminosity, 1e26);
        assert_eq!(s.effective_luminosity(), 1e26);
        assert!(s.flags.contains(ContentFlags::EMISSIVE | ContentFlags::SYSTEM));
        assert!((s.radius - (1.5e11 + 6e6)).abs() < 1.0);
        assert!(tree.get(tree.root()).flags.contains(ContentFlags::EMISSIVE));
    }

    #[test]
    fn test_update_derives_observer_state() {
        let mut b = AnchorTreeBuilder::new(AnchorDesc::system("root")).unwrap();
        let id = b
            .add(
                b.root(),
                AnchorDesc::body("moon")
                    .radius(1.7e6)
                    .at_meters(DVec3::new(0.0, 0.0, -3.8e8)),
            )
            .unwrap();
        let mut tree = b.build(&OctreeConfig::default(), DiagnosticSink::detached());
        let c = ctx(1, 0.0);
        assert!(tree.update_anchor(id, &c));

        let s = &tree.get(id).state;
        assert!((s.distance_to_obs - 3.8e8).abs() < 1e-3);
        assert!((s.vector_to_obs - DVec3::Z).length() < 1e-12);
        assert!((s.z_distance - 3.8e8).abs() < 1e-3);
        let expected_size = 1.7e6 / (3.8e8 * c.pixel_size);
        assert!((s.visible_size - expected_size).abs() < 1e-9);
        assert!(s.resolved);
        assert!(s.visible);
        assert_eq!(s.update_id, 1);
    }

    #[test]
    fn test_system_radiance_uses_child_luminosity() {
        let mut b = AnchorTreeBuilder::new(AnchorDesc::system("root")).unwrap();
        let sys = b
            .add(b.root(), AnchorDesc::system("sys").at_meters(DVec3::new(0.0, 0.0, -1.0e17)))
            .unwrap();
        b.add(sys, AnchorDesc::body("star").emissive(1e26).radius(7e8)).unwrap();
        let mut tree = b.build(&OctreeConfig::default(), DiagnosticSink::detached());
        assert!(tree.update_anchor(sys, &ctx(1, 0.0)));

        let s = &tree.get(sys).state;
        let expected = point_radiance(1e26, s.distance_to_obs);
        assert!((s.point_radiance - expected).abs() <= expected * 1e-12);
        assert!(s.point_radiance > 0.0);
    }

    /// A second update in the same frame changes nothing.
    #[test]
    fn test_update_is_idempotent_per_frame() {
        let mut b = AnchorTreeBuilder::new(AnchorDesc::system("root")).unwrap();
        let id = b
            .add(
                b.root(),
                AnchorDesc::body("b").radius(10.0).at_meters(DVec3::new(0.0, 0.0, -100.0)),
            )
            .unwrap();
        let mut tree = b.build(&OctreeConfig::default(), DiagnosticSink::detached());
        assert!(tree.update_anchor(id, &ctx(1, 0.0)));
        let first = tree.get(id).state.clone();
        assert!(!tree.update_anchor(id, &ctx(1, 0.0)));
        assert_eq!(tree.get(id).state, first);
        assert!(tree.update_anchor(id, &ctx(2, 0.0)));
        assert!(tree.get(id).state.was_visible);
    }

    #[test]
    fn test_behind_observer_is_not_visible() {
        let mut b = AnchorTreeBuilder::new(AnchorDesc::system("root")).unwrap();
        let id = b
            .add(
                b.root(),
                AnchorDesc::body("b").radius(10.0).at_meters(DVec3::new(0.0, 0.0, 100.0)),
            )
            .unwrap();
        let mut tree = b.build(&OctreeConfig::default(), DiagnosticSink::detached());
        tree.update_anchor(id, &ctx(1, 0.0));
        let s = &tree.get(id).state;
        assert!(s.z_distance < 0.0);
        assert!(!s.in_view);
        assert!(!s.visible);
    }

    /// A failing orbit keeps the last pose, hides the anchor, and is reported once.
    #[test]
    fn test_orbit_failure_keeps_last_pose() {
        let (sink, rx) = diagnostic_channel(8);
        let mut b = AnchorTreeBuilder::new(AnchorDesc::system("root")).unwrap();
        let id = b
            .add(
                b.root(),
                AnchorDesc::body("probe").radius(1e7).orbit(BoundedOrbit {
                    inner: CircularOrbit {
                        radius: 1e9,
                        period: 400.0,
                        phase: std::f64::consts::FRAC_PI_2,
                        inclination: 0.0,
                    },
                    validity: 0.0..10.0,
                }),
            )
            .unwrap();
        let mut tree = b.build(&OctreeConfig::default(), sink);

        tree.update_anchor(id, &ctx(1, 5.0));
        let pose = tree.get(id).position;
        assert!(tree.get(id).state.visible);

        tree.update_anchor(id, &ctx(2, 20.0));
        tree.update_anchor(id, &ctx(3, 30.0));
        let a = tree.get(id);
        assert_eq!(a.position, pose);
        assert!(!a.state.visible);
        assert!(!a.state.dynamics_ok);
        assert_eq!(rx.len(), 1);
        assert_eq!(rx.try_recv().unwrap().subject, Subject::Anchor(id.0));

        tree.update_anchor(id, &ctx(4, 6.0));
        assert!(tree.get(id).state.visible);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "outside its octree root cube")]
    fn test_leaf_outside_explicit_bounds_asserts() {
        let mut b = AnchorTreeBuilder::new(AnchorDesc::system("root")).unwrap();
        let stars = b
            .add(
                b.root(),
                AnchorDesc::octree("stars").octree_bounds(WorldPosition::ORIGIN, 1_000),
            )
            .unwrap();
        b.add(stars, AnchorDesc::body("stray").at(Vec3I128::new(10_000, 0, 0)))
            .unwrap();
        b.build(&OctreeConfig::default(), DiagnosticSink::detached());
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_leaf_outside_explicit_bounds_is_dropped() {
        let (sink, rx) = diagnostic_channel(8);
        let mut b = AnchorTreeBuilder::new(AnchorDesc::system("root")).unwrap();
        let stars = b
            .add(
                b.root(),
                AnchorDesc::octree("stars").octree_bounds(WorldPosition::ORIGIN, 1_000),
            )
            .unwrap();
        b.add(stars, AnchorDesc::body("stray").at(Vec3I128::new(10_000, 0, 0)))
            .unwrap();
        let tree = b.build(&OctreeConfig::default(), sink);
        assert_eq!(tree.octree(OctreeId(0)).len(), 0);
        assert_eq!(rx.try_recv().unwrap().kind, DiagnosticKind::LeafOutsideCube);
    }
}
