//! Patch data loaded through the real loader: image pyramids on disk and
//! procedural tiles, resolved with ancestor fallback.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::{ImageBuffer, Luma};
use orrery_config::{DataConfig, HeightmapFilter};
use orrery_debug::DiagnosticSink;
use orrery_lod::{PatchId, Quadrant, Surface};
use orrery_patchdata::{
    DataLayer, Fallback, LoaderPool, PatchDataStore, ProceduralParams, SourceLoader, TexelData,
    TextureSource, sample_height,
};

fn store(source: TextureSource) -> PatchDataStore {
    let config = DataConfig {
        workers: 2,
        ..DataConfig::default()
    };
    let pool = Arc::new(LoaderPool::new(config.workers, config.queue_capacity, Arc::new(SourceLoader)));
    PatchDataStore::new(
        Surface::CubeSphere { radius: 6.0e6 },
        pool,
        &config,
        DiagnosticSink::detached(),
    )
    .with_source(DataLayer::Heightmap, source)
}

fn wait_ready(store: &mut PatchDataStore, id: PatchId) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !store.is_ready(id) {
        assert!(Instant::now() < deadline, "load of {id} never finished");
        store.poll();
        std::thread::sleep(Duration::from_millis(2));
    }
}

fn write_tile(dir: &Path, id: PatchId, samples: &[u16], size: u32) {
    let img: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_raw(size, size, samples.to_vec()).unwrap();
    img.save(dir.join(format!("{}_{}_{}_{}.png", id.face, id.lod, id.x, id.y)))
        .unwrap();
}

fn pyramid(dir: &Path, max_lod: u8) -> TextureSource {
    let template = dir.join("{face}_{lod}_{x}_{y}.png");
    TextureSource::from_spec(template.to_str().unwrap(), max_lod).unwrap()
}

#[test]
fn test_sixteen_bit_heightmap_is_bit_exact() {
    let dir = tempfile::tempdir().unwrap();
    let root = PatchId::root(2);
    let samples: Vec<u16> = vec![0, 1, 255, 256, 4095, 12345, 32768, 40000, 50001, 60000, 65534, 65535, 7, 77, 777, 7777];
    write_tile(dir.path(), root, &samples, 4);

    let mut store = store(pyramid(dir.path(), 0));
    store.request(DataLayer::Heightmap, root);
    wait_ready(&mut store, root);

    let resolved = store.resolve(DataLayer::Heightmap, root);
    assert_eq!(resolved.fallback, Fallback::Own);
    match &resolved.texture.data {
        TexelData::Gray16(loaded) => assert_eq!(loaded, &samples),
        TexelData::Rgba8(_) => panic!("heightmap decoded as color"),
    }
    let (min, max) = store.height_range(root);
    assert_eq!(min, 0.0);
    assert!((max - DataConfig::default().height_scale as f64).abs() < 1e-3);
}

/// A missing tile is reported once; the patch keeps drawing its parent's
/// data through the parent's window.
#[test]
fn test_missing_tile_uses_parent_window() {
    let dir = tempfile::tempdir().unwrap();
    let root = PatchId::root(0);
    write_tile(dir.path(), root, &[100, 200, 300, 400], 2);

    let mut store = store(pyramid(dir.path(), 1));
    store.request(DataLayer::Heightmap, root);
    wait_ready(&mut store, root);

    let child = root.child(Quadrant::BottomRight);
    store.request(DataLayer::Heightmap, child);
    wait_ready(&mut store, child);
    assert_eq!(store.stats().failed, 1);
    assert!(!store.schedule(DataLayer::Heightmap, child));

    let resolved = store.resolve(DataLayer::Heightmap, child);
    assert_eq!(resolved.fallback, Fallback::Ancestor(root));
    assert_eq!(resolved.scale, 0.5);
    assert_eq!(resolved.offset, [0.5, 0.0]);
}

/// Patches deeper than the procedural source sample a sub-window of their
/// ancestor's tile, and every sample lands on valid texels.
#[test]
fn test_deep_patch_samples_inside_ancestor() {
    let params = ProceduralParams {
        size: 17,
        max_lod: 1,
        ..ProceduralParams::default()
    };
    let mut store = store(TextureSource::Procedural(params));
    let deep = PatchId { face: 3, lod: 4, x: 13, y: 6 };
    store.request(DataLayer::Heightmap, deep);
    wait_ready(&mut store, deep);

    let ancestor = PatchId { face: 3, lod: 1, x: 1, y: 0 };
    let resolved = store.resolve(DataLayer::Heightmap, deep);
    assert_eq!(resolved.fallback, Fallback::Ancestor(ancestor));
    assert_eq!(resolved.scale, 1.0 / 8.0);
    assert_eq!(resolved.offset, [5.0 / 8.0, 6.0 / 8.0]);

    let stats = resolved.texture.height_stats().unwrap();
    for i in 0..=4 {
        for j in 0..=4 {
            let [u, v] = resolved.texture_uv(i as f64 / 4.0, j as f64 / 4.0);
            assert!((0.0..=1.0).contains(&u) && (0.0..=1.0).contains(&v));
            let h = sample_height(&resolved.texture, u, v, HeightmapFilter::Bilinear);
            assert!(h >= stats.min - 1e-6 && h <= stats.max + 1e-6);
        }
    }

    // The same point sampled through the store agrees with the window.
    let rect = deep.rect();
    let (x, y) = ((rect.x0 + rect.x1) / 2.0, (rect.y0 + rect.y1) / 2.0);
    let [u, v] = resolved.texture_uv(0.5, 0.5);
    let expected = sample_height(&resolved.texture, u, v, HeightmapFilter::Bilinear) as f64
        * DataConfig::default().height_scale as f64;
    assert!((store.height_at(3, x, y) - expected).abs() < 1e-3);
}
