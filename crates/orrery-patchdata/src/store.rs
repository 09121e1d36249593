//! Resident patch data with ancestor fallback.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, bounded};
use orrery_config::{DataConfig, HeightmapFilter, MAX_PATCH_LOD};
use orrery_debug::{Diagnostic, DiagnosticKind, DiagnosticSink};
use orrery_lod::{PatchId, Surface};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace, warn};

use crate::{
    HeightStats, HeightmapPatchParams, LoadJob, LoadRequest, LoadResult, LoaderPool,
    ParamBlockTable, PatchTexture, TextureSource, sample_height,
};

/// Kinds of per-patch data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataLayer {
    Heightmap = 0,
    Color = 1,
}

impl DataLayer {
    pub const ALL: [DataLayer; 2] = [DataLayer::Heightmap, DataLayer::Color];

    fn index(self) -> usize {
        self as usize
    }
}

/// Which data a [`ResolvedTexture`] actually carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    Own,
    Ancestor(PatchId),
    Default,
}

/// Texture to draw a patch with right now, and the window into it that
/// covers the patch: texture coordinate = `offset + uv * scale`.
#[derive(Debug, Clone)]
pub struct ResolvedTexture {
    pub texture: Arc<PatchTexture>,
    pub scale: f64,
    pub offset: [f64; 2],
    pub fallback: Fallback,
}

impl ResolvedTexture {
    pub fn texture_uv(&self, u: f64, v: f64) -> [f64; 2] {
        [self.offset[0] + u * self.scale, self.offset[1] + v * self.scale]
    }
}

/// Load counters since the last [`PatchDataStore::begin_frame`], plus the
/// current number of loads in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataStats {
    pub submitted: u32,
    pub completed: u32,
    pub failed: u32,
    /// Requests not submitted because the queue was full.
    pub skipped: u32,
    /// Results discarded because their patch was released meanwhile.
    pub dropped: u32,
    pub in_flight: u32,
}

#[derive(Debug)]
struct Entry {
    texture: Arc<PatchTexture>,
    stats: Option<HeightStats>,
}

#[derive(Debug)]
struct Layer {
    source: Option<Arc<TextureSource>>,
    entries: FxHashMap<PatchId, Entry>,
    pending: FxHashSet<PatchId>,
    failed: FxHashSet<PatchId>,
    default: Arc<PatchTexture>,
}

impl Layer {
    fn new(default: PatchTexture) -> Self {
        Self {
            source: None,
            entries: FxHashMap::default(),
            pending: FxHashSet::default(),
            failed: FxHashSet::default(),
            default: Arc::new(default),
        }
    }
}

/// Patch data of one surface.
#[derive(Debug)]
pub struct PatchDataStore {
    surface: Surface,
    layers: [Layer; 2],
    pool: Arc<LoaderPool>,
    reply_tx: Sender<LoadResult>,
    reply_rx: Receiver<LoadResult>,
    params: ParamBlockTable,
    filter: HeightmapFilter,
    height_scale: f32,
    max_lod: u8,
    queue_full: bool,
    stats: DataStats,
    sink: DiagnosticSink,
}

impl PatchDataStore {
    pub fn new(
        surface: Surface,
        pool: Arc<LoaderPool>,
        config: &DataConfig,
        sink: DiagnosticSink,
    ) -> Self {
        let (reply_tx, reply_rx) = bounded(config.queue_capacity.max(1) * 2);
        Self {
            surface,
            layers: [
                Layer::new(PatchTexture::default_height()),
                Layer::new(PatchTexture::default_color()),
            ],
            pool,
            reply_tx,
            reply_rx,
            params: ParamBlockTable::new(),
            filter: config.heightmap_filter,
            height_scale: config.height_scale,
            max_lod: config.max_lod.min(MAX_PATCH_LOD),
            queue_full: false,
            stats: DataStats::default(),
            sink,
        }
    }

    #[must_use]
    pub fn with_source(mut self, layer: DataLayer, source: TextureSource) -> Self {
        self.set_source(layer, source);
        self
    }

    pub fn set_source(&mut self, layer: DataLayer, source: TextureSource) {
        let l = &mut self.layers[layer.index()];
        l.source = Some(Arc::new(source));
        l.entries.clear();
        l.pending.clear();
        l.failed.clear();
    }

    pub fn has_source(&self, layer: DataLayer) -> bool {
        self.layers[layer.index()].source.is_some()
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Start a new frame: the queue may have room again.
    pub fn begin_frame(&mut self) {
        self.queue_full = false;
        self.stats = DataStats {
            in_flight: self.in_flight(),
            ..DataStats::default()
        };
    }

    pub fn stats(&self) -> DataStats {
        DataStats {
            in_flight: self.in_flight(),
            ..self.stats
        }
    }

    fn in_flight(&self) -> u32 {
        self.layers.iter().map(|l| l.pending.len() as u32).sum()
    }

    /// The patch whose data serves `id`: itself, or its ancestor at the
    /// deepest level the source provides.
    pub fn target(&self, layer: DataLayer, id: PatchId) -> Option<PatchId> {
        let source = self.layers[layer.index()].source.as_ref()?;
        Some(id.ancestor(source.max_lod().min(self.max_lod)))
    }

    /// Data to draw `id` with now; schedules a load of its own data.
    pub fn request(&mut self, layer: DataLayer, id: PatchId) -> ResolvedTexture {
        self.schedule(layer, id);
        self.resolve(layer, id)
    }

    /// Submit a load for the target of `id` unless it is resident, pending,
    /// failed, or the queue already refused work this frame.
    pub fn schedule(&mut self, layer: DataLayer, id: PatchId) -> bool {
        let Some(target) = self.target(layer, id) else {
            return false;
        };
        let l = &self.layers[layer.index()];
        if l.entries.contains_key(&target) || l.pending.contains(&target) || l.failed.contains(&target) {
            return false;
        }
        if self.queue_full {
            self.stats.skipped += 1;
            return false;
        }
        let Some(source) = l.source.clone() else {
            return false;
        };
        let job = LoadJob {
            request: LoadRequest {
                source,
                surface: self.surface,
                patch: target,
                layer,
            },
            reply: self.reply_tx.clone(),
        };
        match self.pool.submit(job) {
            Ok(()) => {
                self.layers[layer.index()].pending.insert(target);
                self.stats.submitted += 1;
                true
            }
            Err(_) => {
                trace!(patch = %target, "load queue full, skipping for this frame");
                self.queue_full = true;
                self.stats.skipped += 1;
                false
            }
        }
    }

    /// Own data with `(1, 0)`, else the closest loaded ancestor's with
    /// `scale = 2^-Δlod` and the offset of the patch corner, else a default.
    pub fn resolve(&self, layer: DataLayer, id: PatchId) -> ResolvedTexture {
        let l = &self.layers[layer.index()];
        let mut current = Some(id);
        while let Some(candidate) = current {
            if let Some(entry) = l.entries.get(&candidate) {
                let delta = id.lod - candidate.lod;
                let cells = (1u64 << delta) as f64;
                let scale = 1.0 / cells;
                let ox = (id.x - (candidate.x << delta)) as f64 * scale;
                let oy = (id.y - (candidate.y << delta)) as f64 * scale;
                return ResolvedTexture {
                    texture: Arc::clone(&entry.texture),
                    scale,
                    offset: [ox, oy],
                    fallback: if delta == 0 {
                        Fallback::Own
                    } else {
                        Fallback::Ancestor(candidate)
                    },
                };
            }
            current = candidate.parent();
        }
        ResolvedTexture {
            texture: Arc::clone(&l.default),
            scale: 1.0,
            offset: [0.0, 0.0],
            fallback: Fallback::Default,
        }
    }

    /// True when every sourced layer has settled for `id`, loaded or failed.
    pub fn is_ready(&self, id: PatchId) -> bool {
        DataLayer::ALL.iter().all(|&layer| match self.target(layer, id) {
            None => true,
            Some(target) => {
                let l = &self.layers[layer.index()];
                l.entries.contains_key(&target) || l.failed.contains(&target)
            }
        })
    }

    /// Install finished loads. Returns the patches that received data.
    pub fn poll(&mut self) -> Vec<PatchId> {
        let mut installed = Vec::new();
        while let Ok(result) = self.reply_rx.try_recv() {
            let LoadResult {
                request,
                outcome,
                load_time_us,
            } = result;
            let l = &mut self.layers[request.layer.index()];
            if !l.pending.remove(&request.patch) {
                trace!(patch = %request.patch, "dropping load for released patch");
                self.stats.dropped += 1;
                continue;
            }
            match outcome {
                Ok((texture, stats)) => {
                    trace!(patch = %request.patch, layer = ?request.layer, load_time_us, "patch data loaded");
                    l.entries.insert(
                        request.patch,
                        Entry {
                            texture: Arc::new(texture),
                            stats,
                        },
                    );
                    self.stats.completed += 1;
                    installed.push(request.patch);
                }
                Err(err) => {
                    warn!(patch = %request.patch, layer = ?request.layer, %err, "patch data failed to load, using ancestor data");
                    l.failed.insert(request.patch);
                    self.stats.failed += 1;
                    self.sink.report(Diagnostic::new(
                        DiagnosticKind::LoadFailed,
                        request.patch.subject(),
                        err.to_string(),
                    ));
                }
            }
        }
        if !installed.is_empty() {
            debug!(installed = installed.len(), in_flight = self.in_flight(), "patch data drained");
        }
        installed
    }

    /// Forget everything about a destroyed patch. A load still running for
    /// it completes and is discarded by [`poll`](Self::poll).
    pub fn release(&mut self, id: PatchId) {
        for l in &mut self.layers {
            l.entries.remove(&id);
            l.pending.remove(&id);
            l.failed.remove(&id);
        }
        self.params.release(id);
    }

    /// Height statistics of the data covering `id`, own or inherited.
    pub fn height_stats(&self, id: PatchId) -> Option<HeightStats> {
        let l = &self.layers[DataLayer::Heightmap.index()];
        let mut current = Some(id);
        while let Some(candidate) = current {
            if let Some(entry) = l.entries.get(&candidate) {
                return entry.stats;
            }
            current = candidate.parent();
        }
        None
    }

    /// Height range of `id` in metres, `(0, 0)` while unknown.
    pub fn height_range(&self, id: PatchId) -> (f64, f64) {
        self.height_stats(id).map_or((0.0, 0.0), |s| {
            let k = self.height_scale as f64;
            (s.min as f64 * k, s.max as f64 * k)
        })
    }

    /// Height in metres at face point `(x, y)`, from the finest resident
    /// heightmap covering it.
    pub fn height_at(&self, face: u8, x: f64, y: f64) -> f64 {
        let l = &self.layers[DataLayer::Heightmap.index()];
        let Some(source) = &l.source else { return 0.0 };
        let deepest = source.max_lod().min(self.max_lod);
        for lod in (0..=deepest).rev() {
            let cells = 1u32 << lod;
            let id = PatchId {
                face,
                lod,
                x: ((x * cells as f64) as u32).min(cells - 1),
                y: ((y * cells as f64) as u32).min(cells - 1),
            };
            if let Some(entry) = l.entries.get(&id) {
                let r = id.rect();
                let u = (x - r.x0) / (r.x1 - r.x0);
                let v = (y - r.y0) / (r.y1 - r.y0);
                return sample_height(&entry.texture, u, v, self.filter) as f64 * self.height_scale as f64;
            }
        }
        0.0
    }

    /// Shader parameters of `id` from its current heightmap.
    pub fn params_for(&self, id: PatchId) -> HeightmapPatchParams {
        let resolved = self.resolve(DataLayer::Heightmap, id);
        let tex = &resolved.texture;
        HeightmapPatchParams {
            height_scale: self.height_scale,
            u_scale: (tex.width - 1) as f32 / tex.width as f32,
            v_scale: (tex.height - 1) as f32 / tex.height as f32,
            _pad: 0.0,
            tex_offset: [resolved.offset[0] as f32, resolved.offset[1] as f32],
            tex_scale: [resolved.scale as f32; 2],
        }
    }

    /// Write the parameter block of `id` into the table; returns its slot.
    pub fn publish_params(&mut self, id: PatchId) -> u32 {
        let params = self.params_for(id);
        self.params.write(id, params)
    }

    pub fn param_table(&self) -> &ParamBlockTable {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use crossbeam_channel::{Receiver, Sender};
    use orrery_lod::Quadrant;

    use crate::{DataLoader, LoadError};

    /// Serves 2x2 heightmaps whose samples encode the patch level; fails for
    /// face 5; optionally blocks each load until released.
    struct FakeLoader {
        gate: Option<(Sender<PatchId>, Receiver<()>)>,
    }

    impl DataLoader for FakeLoader {
        fn load_texture(&self, request: &LoadRequest, srgb: bool) -> Result<PatchTexture, LoadError> {
            PatchTexture::rgba8(1, 1, srgb, vec![request.patch.lod, 0, 0, 255])
        }

        fn load_heightmap(&self, request: &LoadRequest) -> Result<PatchTexture, LoadError> {
            if let Some((started, release)) = &self.gate {
                let _ = started.send(request.patch);
                let _ = release.recv();
            }
            if request.patch.face == 5 {
                return Err(LoadError::Unsupported("face 5".into()));
            }
            let lod = request.patch.lod as u16 * 1000;
            PatchTexture::gray16(2, 2, vec![lod, lod + 10, lod + 20, lod + 30])
        }
    }

    fn store_with(loader: FakeLoader, capacity: usize) -> PatchDataStore {
        let config = DataConfig {
            workers: 1,
            queue_capacity: capacity,
            ..DataConfig::default()
        };
        let pool = Arc::new(LoaderPool::new(1, capacity, Arc::new(loader)));
        PatchDataStore::new(Surface::CubeSphere { radius: 1000.0 }, pool, &config, DiagnosticSink::detached())
            .with_source(
                DataLayer::Heightmap,
                TextureSource::Virtual {
                    template: "{lod}".into(),
                    max_lod: 2,
                },
            )
    }

    fn store() -> PatchDataStore {
        store_with(FakeLoader { gate: None }, 16)
    }

    fn wait_ready(store: &mut PatchDataStore, id: PatchId) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !store.is_ready(id) {
            assert!(Instant::now() < deadline, "load of {id} never finished");
            store.poll();
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_missing_data_falls_back_to_default() {
        let store = store();
        let r = store.resolve(DataLayer::Heightmap, PatchId::root(0));
        assert_eq!(r.fallback, Fallback::Default);
        assert_eq!(r.scale, 1.0);
        let c = store.resolve(DataLayer::Color, PatchId::root(0));
        assert_eq!(c.texture.color_texel(0, 0), [255; 4]);
    }

    #[test]
    fn test_own_data_after_load() {
        let mut store = store();
        let root = PatchId::root(1);
        assert_eq!(store.request(DataLayer::Heightmap, root).fallback, Fallback::Default);
        wait_ready(&mut store, root);
        let r = store.request(DataLayer::Heightmap, root);
        assert_eq!(r.fallback, Fallback::Own);
        assert_eq!((r.scale, r.offset), (1.0, [0.0, 0.0]));
        assert_eq!(store.stats().completed, 1);
        let stats = store.height_stats(root).unwrap();
        assert_eq!(stats.min, 0.0);
    }

    #[test]
    fn test_ancestor_window() {
        let mut store = store();
        let root = PatchId::root(2);
        store.request(DataLayer::Heightmap, root);
        wait_ready(&mut store, root);

        let child = root.child(Quadrant::TopRight).child(Quadrant::BottomLeft);
        let r = store.resolve(DataLayer::Heightmap, child);
        assert_eq!(r.fallback, Fallback::Ancestor(root));
        assert_eq!(r.scale, 0.25);
        assert_eq!(r.offset, [0.5, 0.5]);
        assert_eq!(r.texture_uv(1.0, 1.0), [0.75, 0.75]);
    }

    /// Patches deeper than the source share the data of their ancestor at
    /// the source's deepest level.
    #[test]
    fn test_deep_patches_target_max_lod() {
        let mut store = store();
        let deep = PatchId { face: 0, lod: 5, x: 31, y: 2 };
        let target = store.target(DataLayer::Heightmap, deep).unwrap();
        assert_eq!(target, PatchId { face: 0, lod: 2, x: 3, y: 0 });
        store.request(DataLayer::Heightmap, deep);
        wait_ready(&mut store, deep);
        let r = store.resolve(DataLayer::Heightmap, deep);
        assert_eq!(r.fallback, Fallback::Ancestor(target));
        assert_eq!(r.scale, 0.125);
        assert_eq!(r.offset, [0.875, 0.25]);
    }

    #[test]
    fn test_failure_is_reported_once_and_not_retried() {
        let (sink, diagnostics) = orrery_debug::diagnostic_channel(8);
        let mut store = store();
        store.sink = sink;
        let root = PatchId::root(5);
        store.request(DataLayer::Heightmap, root);
        wait_ready(&mut store, root);
        assert!(!store.schedule(DataLayer::Heightmap, root));
        assert_eq!(store.stats().failed, 1);
        let reports: Vec<_> = diagnostics.try_iter().collect();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].kind, DiagnosticKind::LoadFailed);
        assert_eq!(store.resolve(DataLayer::Heightmap, root).fallback, Fallback::Default);
    }

    #[test]
    fn test_released_patch_result_is_dropped() {
        let (started_tx, started_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        let mut store = store_with(
            FakeLoader {
                gate: Some((started_tx, release_rx)),
            },
            4,
        );
        let id = PatchId::root(0).child(Quadrant::BottomLeft);
        store.request(DataLayer::Heightmap, id);
        assert_eq!(started_rx.recv_timeout(Duration::from_secs(5)), Ok(id));
        store.release(id);
        release_tx.send(()).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while store.stats().dropped == 0 {
            assert!(Instant::now() < deadline);
            store.poll();
            std::thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(store.resolve(DataLayer::Heightmap, id).fallback, Fallback::Default);
    }

    /// Once the queue refuses a job, the store stops submitting until the
    /// next frame.
    #[test]
    fn test_full_queue_skips_rest_of_frame() {
        let (started_tx, started_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        let mut store = store_with(
            FakeLoader {
                gate: Some((started_tx, release_rx)),
            },
            1,
        );
        let ids: Vec<PatchId> = Quadrant::ALL.iter().map(|q| PatchId::root(0).child(*q)).collect();

        assert!(store.schedule(DataLayer::Heightmap, ids[0]));
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(store.schedule(DataLayer::Heightmap, ids[1]));
        assert!(!store.schedule(DataLayer::Heightmap, ids[2]));
        assert!(!store.schedule(DataLayer::Heightmap, ids[3]));
        let stats = store.stats();
        assert_eq!((stats.submitted, stats.skipped, stats.in_flight), (2, 2, 2));

        for _ in 0..2 {
            release_tx.send(()).unwrap();
        }
        wait_ready(&mut store, ids[0]);
        wait_ready(&mut store, ids[1]);
        store.begin_frame();
        assert!(store.schedule(DataLayer::Heightmap, ids[2]));
        release_tx.send(()).unwrap();
        wait_ready(&mut store, ids[2]);
    }

    #[test]
    fn test_params_follow_fallback() {
        let mut store = store();
        let root = PatchId::root(3);
        store.request(DataLayer::Heightmap, root);
        wait_ready(&mut store, root);
        let child = root.child(Quadrant::TopLeft);
        let slot = store.publish_params(child);
        let params = store.param_table().get(child).unwrap();
        assert_eq!(store.param_table().slot(child), Some(slot));
        assert_eq!(params.tex_scale, [0.5, 0.5]);
        assert_eq!(params.tex_offset, [0.0, 0.5]);
        assert_eq!(params.u_scale, 0.5);
        store.release(child);
        assert!(store.param_table().is_empty());
    }

    #[test]
    fn test_height_at_uses_finest_entry() {
        let mut store = store();
        let root = PatchId::root(4);
        store.request(DataLayer::Heightmap, root);
        wait_ready(&mut store, root);
        let h = store.height_at(4, 0.0, 0.0);
        assert_eq!(h, 0.0);
        let corner = store.height_at(4, 1.0, 1.0);
        let expected = 30.0 / u16::MAX as f64 * store.height_scale as f64;
        assert!((corner - expected).abs() < 1e-3);
    }
}
