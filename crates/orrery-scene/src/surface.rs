//! Surfaces of approached bodies: quadtree refinement plus streamed data.

use std::sync::Arc;

use glam::DVec3;
use orrery_anchor::{Anchor, AnchorId, AnchorTree, Observer};
use orrery_config::Config;
use orrery_debug::DiagnosticSink;
use orrery_lod::{
    HorizonCulling, LensCulling, LodChanges, LodQuadtree, PatchBox, PatchId, PatchKey, PatchView,
    ScreenSpacePolicy, Surface,
};
use orrery_patchdata::{DataLayer, DataStats, LoaderPool, PatchDataStore, ResolvedTexture, TextureSource};
use tracing::debug;

/// Data sources of a surface's layers.
#[derive(Debug, Clone, Default)]
pub struct SurfaceSources {
    pub height: Option<TextureSource>,
    pub color: Option<TextureSource>,
}

/// One shown patch as the renderer receives it.
#[derive(Debug, Clone)]
pub struct PatchDraw {
    pub patch: PatchId,
    /// Outer tessellation levels, N/E/S/W.
    pub outer: [u32; 4],
    /// Body-local bounding box, metres.
    pub bbox: PatchBox,
    /// Distance to the camera; patches are listed nearest first.
    pub sort_hint: f64,
    /// Slot of the patch's parameter block.
    pub param_slot: u32,
    pub height: ResolvedTexture,
    pub color: Option<ResolvedTexture>,
}

/// Draw list of one surface.
#[derive(Debug, Clone)]
pub struct SurfaceDraw {
    pub anchor: AnchorId,
    pub patches: Vec<PatchDraw>,
    /// Patches whose edge tessellation changed this frame.
    pub refresh: Vec<PatchId>,
}

/// The LOD surface of one body.
#[derive(Debug)]
pub struct SurfaceBody {
    anchor: AnchorId,
    quadtree: LodQuadtree,
    store: PatchDataStore,
    policy: ScreenSpacePolicy,
    horizon_scale: Option<f64>,
    changes: LodChanges,
}

impl SurfaceBody {
    pub fn new(
        anchor: AnchorId,
        surface: Surface,
        sources: SurfaceSources,
        pool: Arc<LoaderPool>,
        config: &Config,
        sink: DiagnosticSink,
    ) -> Self {
        let mut store = PatchDataStore::new(surface, pool, &config.data, sink.clone());
        if let Some(height) = sources.height {
            store.set_source(DataLayer::Heightmap, height);
        }
        if let Some(color) = sources.color {
            store.set_source(DataLayer::Color, color);
        }
        let round = !matches!(surface, Surface::Flat { .. });
        Self {
            anchor,
            quadtree: LodQuadtree::new(surface, &config.lod, sink),
            store,
            policy: ScreenSpacePolicy::from_config(&config.lod),
            horizon_scale: (round && config.lod.horizon_culling).then_some(config.lod.horizon_scale),
            changes: LodChanges::default(),
        }
    }

    pub fn anchor(&self) -> AnchorId {
        self.anchor
    }

    pub fn surface(&self) -> &Surface {
        self.quadtree.surface()
    }

    pub fn quadtree(&self) -> &LodQuadtree {
        &self.quadtree
    }

    pub fn store(&self) -> &PatchDataStore {
        &self.store
    }

    /// Changes made by the last [`update`](Self::update).
    pub fn changes(&self) -> &LodChanges {
        &self.changes
    }

    pub fn data_stats(&self) -> DataStats {
        self.store.stats()
    }

    /// The observer in the body's local frame, metres.
    pub fn local_camera(anchor: &Anchor) -> DVec3 {
        anchor.state.orientation.inverse() * -anchor.state.rel_position
    }

    /// Refine the quadtree for this frame's camera and schedule data loads
    /// for the shown patches.
    pub fn update(&mut self, tree: &AnchorTree, observer: &Observer) -> &LodChanges {
        let anchor = tree.get(self.anchor);
        let orientation = anchor.state.orientation;
        let camera = Self::local_camera(anchor);
        let surface = *self.quadtree.surface();
        let ground = surface
            .locate(camera)
            .map_or(0.0, |(face, x, y)| self.store.height_at(face, x, y));
        let view = PatchView {
            camera,
            altitude: (surface.altitude(camera) - ground).max(0.0),
            pixel_size: observer.lens.pixel_size(),
        };

        self.store.begin_frame();
        let lens = LensCulling::new(observer.frustum(), anchor.state.rel_position, orientation);
        let update = match self.horizon_scale {
            Some(scale) => {
                let horizon = HorizonCulling::new(camera, surface.radius(), scale);
                self.quadtree.update(&view, &(lens, horizon), &self.policy)
            }
            None => self.quadtree.update(&view, &lens, &self.policy),
        };
        let deferred = update.deferred;
        let changes = self.quadtree.apply(update);
        for id in &changes.destroyed {
            self.store.release(*id);
        }
        if !changes.split.is_empty() || !changes.merged.is_empty() {
            debug!(
                anchor = %self.anchor,
                split = changes.split.len(),
                merged = changes.merged.len(),
                forced = changes.forced_splits,
                deferred,
                patches = self.quadtree.len(),
                "surface refined"
            );
        }
        self.changes = changes;

        for (key, id) in self.shown_ids() {
            for layer in DataLayer::ALL {
                self.store.schedule(layer, id);
            }
            self.quadtree.set_instance_ready(key, self.store.is_ready(id));
        }
        &self.changes
    }

    /// Install finished loads and refresh readiness and height bounds of the
    /// shown patches. Returns the number of loads installed.
    pub fn drain_loads(&mut self) -> usize {
        let installed = self.store.poll();
        if installed.is_empty() {
            return 0;
        }
        for (key, id) in self.shown_ids() {
            self.quadtree.set_instance_ready(key, self.store.is_ready(id));
            let (min, max) = self.store.height_range(id);
            if let Some(p) = self.quadtree.get(key)
                && (p.min_height != min || p.max_height != max)
            {
                self.quadtree.set_height_range(key, min, max);
            }
        }
        installed.len()
    }

    /// Shown patches, nearest first, with their parameter blocks published.
    pub fn draw_list(&mut self) -> SurfaceDraw {
        let shown: Vec<(PatchId, [u32; 4], PatchBox, f64)> = self
            .quadtree
            .shown()
            .map(|(_, p)| (p.id, p.outer, p.geometry.bbox, p.distance))
            .collect();
        let mut patches: Vec<PatchDraw> = shown
            .into_iter()
            .map(|(id, outer, bbox, distance)| PatchDraw {
                patch: id,
                outer,
                bbox,
                sort_hint: distance,
                param_slot: self.store.publish_params(id),
                height: self.store.resolve(DataLayer::Heightmap, id),
                color: self
                    .store
                    .has_source(DataLayer::Color)
                    .then(|| self.store.resolve(DataLayer::Color, id)),
            })
            .collect();
        patches.sort_by(|a, b| a.sort_hint.total_cmp(&b.sort_hint));

        let refresh = self
            .changes
            .refresh
            .iter()
            .filter_map(|k| self.quadtree.get(*k).map(|p| p.id))
            .collect();
        SurfaceDraw {
            anchor: self.anchor,
            patches,
            refresh,
        }
    }

    fn shown_ids(&self) -> Vec<(PatchKey, PatchId)> {
        self.quadtree.shown().map(|(k, p)| (k, p.id)).collect()
    }
}
