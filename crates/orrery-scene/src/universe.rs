//! The per-frame pipeline.

use orrery_anchor::{AnchorId, AnchorTree, FrameContext, Observer, UpdateTraverser};
use orrery_config::Config;
use orrery_debug::{DiagnosticSink, FrameStats};
use tracing::{debug, info};

use crate::{RenderPass, SceneInput, SceneManager, SurfaceBody, SurfaceDraw, scene_manager_for};

/// Output of one frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Visible anchors, nearest first.
    pub visible: Vec<AnchorId>,
    pub passes: Vec<RenderPass>,
    pub surfaces: Vec<SurfaceDraw>,
    pub stats: FrameStats,
}

/// A session: anchors, surfaces, and the scene manager.
pub struct Universe {
    tree: AnchorTree,
    surfaces: Vec<SurfaceBody>,
    config: Config,
    manager: Box<dyn SceneManager>,
    frame_id: u64,
    sink: DiagnosticSink,
}

impl std::fmt::Debug for Universe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Universe")
            .field("anchors", &self.tree.len())
            .field("surfaces", &self.surfaces.len())
            .field("manager", &self.manager.kind())
            .field("frame_id", &self.frame_id)
            .finish()
    }
}

impl Universe {
    pub fn new(tree: AnchorTree, config: Config, sink: DiagnosticSink) -> Self {
        let manager = scene_manager_for(config.core.scene_manager);
        info!(
            anchors = tree.len(),
            manager = ?config.core.scene_manager,
            "universe ready"
        );
        Self {
            tree,
            surfaces: Vec::new(),
            config,
            manager,
            frame_id: 0,
            sink,
        }
    }

    pub fn add_surface(&mut self, surface: SurfaceBody) {
        self.surfaces.push(surface);
    }

    pub fn tree(&self) -> &AnchorTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut AnchorTree {
        &mut self.tree
    }

    pub fn surfaces(&self) -> &[SurfaceBody] {
        &self.surfaces
    }

    pub fn surface_of(&self, anchor: AnchorId) -> Option<&SurfaceBody> {
        self.surfaces.iter().find(|s| s.anchor() == anchor)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    /// Replace the configuration, switching scene managers if needed.
    pub fn set_config(&mut self, config: Config) {
        if config.core.scene_manager != self.manager.kind() {
            self.manager = scene_manager_for(config.core.scene_manager);
        }
        self.config = config;
    }

    /// Run the whole pipeline for simulation time `time`.
    pub fn frame(&mut self, time: f64, observer: &Observer) -> Frame {
        self.frame_id += 1;
        let ctx = FrameContext::new(time, self.frame_id, *observer, &self.config.core);

        let mut traverser = UpdateTraverser::new(&ctx);
        let root = self.tree.root();
        self.tree.traverse(root, &mut traverser);
        let visible = traverser.into_sorted(&self.tree);

        let mut stats = FrameStats {
            frame_id: self.frame_id,
            sim_time: time,
            visible_anchors: visible.len() as u32,
            ..FrameStats::default()
        };

        let mut active = Vec::with_capacity(self.surfaces.len());
        for (i, surface) in self.surfaces.iter_mut().enumerate() {
            let anchor = self.tree.get(surface.anchor());
            if !(anchor.state.resolved && anchor.state.visible && anchor.is_fresh(self.frame_id)) {
                continue;
            }
            let changes = surface.update(&self.tree, observer);
            stats.patches_split += changes.split.len() as u32;
            stats.patches_merged += changes.merged.len() as u32;
            active.push(i);
        }

        let input = SceneInput {
            tree: &self.tree,
            visible: &visible,
            observer,
            config: &self.config.core,
        };
        let passes = self.manager.build(&input);

        // Loads finished now become visible to the next frame's decisions.
        let mut surfaces = Vec::with_capacity(active.len());
        for surface in &mut self.surfaces {
            surface.drain_loads();
            let data = surface.data_stats();
            stats.loads_submitted += data.submitted;
            stats.loads_completed += data.completed;
            stats.loads_skipped += data.skipped;
            stats.loads_in_flight += data.in_flight;
        }
        for i in active {
            let draw = self.surfaces[i].draw_list();
            stats.patches_shown += draw.patches.len() as u32;
            surfaces.push(draw);
        }

        stats.resolved_anchors = visible
            .iter()
            .filter(|id| self.tree.get(**id).state.resolved)
            .count() as u32;
        stats.point_sprites = passes.iter().map(|p| p.points.len() as u32).sum();
        stats.regions = passes.len() as u32;
        stats.diagnostics = self.sink.reported();

        debug!(
            frame = self.frame_id,
            visible = stats.visible_anchors,
            regions = stats.regions,
            patches = stats.patches_shown,
            in_flight = stats.loads_in_flight,
            "frame built"
        );
        Frame {
            visible,
            passes,
            surfaces,
            stats,
        }
    }
}
