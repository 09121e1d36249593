//! Whole frames over a universe with one procedural planet.

use std::sync::Arc;
use std::time::Duration;

use glam::{DQuat, DVec3};
use orrery_anchor::{AnchorDesc, AnchorId, AnchorTreeBuilder, Lens, Observer};
use orrery_config::{Config, SceneManagerKind};
use orrery_debug::DiagnosticSink;
use orrery_lod::Surface;
use orrery_math::WorldPosition;
use orrery_patchdata::{LoaderPool, ProceduralParams, SourceLoader, TextureSource};
use orrery_scene::{Frame, RegionKind, SurfaceBody, SurfaceSources, Universe};

const RADIUS: f64 = 1.0e6;

fn config() -> Config {
    let mut config = Config::default();
    config.data.workers = 2;
    config.lod.max_lod = 6;
    config
}

fn universe() -> (Universe, AnchorId) {
    let config = config();
    let mut b = AnchorTreeBuilder::new(AnchorDesc::system("universe")).unwrap();
    let root = b.root();
    let planet = b
        .add(root, AnchorDesc::body("planet").radius(RADIUS).at_meters(DVec3::ZERO))
        .unwrap();
    let tree = b.build(&config.octree, DiagnosticSink::detached());

    let pool = Arc::new(LoaderPool::new(config.data.workers, config.data.queue_capacity, Arc::new(SourceLoader)));
    let sources = SurfaceSources {
        height: Some(TextureSource::Procedural(ProceduralParams {
            size: 9,
            max_lod: 3,
            ..ProceduralParams::default()
        })),
        color: None,
    };
    let surface = SurfaceBody::new(
        planet,
        Surface::CubeSphere { radius: RADIUS },
        sources,
        pool,
        &config,
        DiagnosticSink::detached(),
    );
    let mut universe = Universe::new(tree, config, DiagnosticSink::detached());
    universe.add_surface(surface);
    (universe, planet)
}

/// Observer on the +Z axis at `distance` from the planet center, looking at it.
fn observer_at(distance: f64) -> Observer {
    let lens = Lens::from_config(&config().core);
    Observer::new(
        WorldPosition::from_meters(DVec3::new(0.0, 0.0, distance)),
        DQuat::IDENTITY,
        lens,
    )
}

fn run(universe: &mut Universe, observer: &Observer, frames: usize, until: impl Fn(&Frame) -> bool) -> Frame {
    let mut last = universe.frame(0.0, observer);
    for i in 1..frames {
        if until(&last) {
            break;
        }
        std::thread::sleep(Duration::from_millis(2));
        last = universe.frame(i as f64 / 60.0, observer);
    }
    last
}

#[test]
fn test_approach_refines_surface() {
    let (mut universe, planet) = universe();
    let observer = observer_at(3.0 * RADIUS);
    let frame = run(&mut universe, &observer, 2000, |f| {
        f.surfaces.first().is_some_and(|s| s.patches.iter().any(|p| p.patch.lod >= 1))
    });

    let surface = universe.surface_of(planet).unwrap();
    assert!(surface.quadtree().len() > 6, "surface never split");
    assert!(surface.quadtree().check_consistency().is_empty());
    assert_eq!(frame.surfaces.len(), 1);
    let draw = &frame.surfaces[0];
    assert!(draw.patches.iter().any(|p| p.patch.lod >= 1));
    for pair in draw.patches.windows(2) {
        assert!(pair[0].sort_hint <= pair[1].sort_hint);
    }
    for patch in &draw.patches {
        assert!(patch.outer.iter().all(|o| o.is_power_of_two()));
        assert!(patch.height.scale <= 1.0);
    }

    let kinds: Vec<RegionKind> = frame.passes.iter().map(|p| p.kind).collect();
    assert_eq!(kinds, vec![RegionKind::Near, RegionKind::Body, RegionKind::Background]);
    assert_eq!(frame.stats.regions, 3);
    assert_eq!(frame.stats.visible_anchors, 1);
    assert_eq!(frame.stats.resolved_anchors, 1);
    assert_eq!(frame.stats.patches_shown as usize, draw.patches.len());
}

#[test]
fn test_receding_merges_back() {
    let (mut universe, planet) = universe();
    let near = observer_at(1.5 * RADIUS);
    run(&mut universe, &near, 2000, |f| {
        f.surfaces.first().is_some_and(|s| s.patches.iter().any(|p| p.patch.lod >= 2))
    });
    assert!(universe.surface_of(planet).unwrap().quadtree().len() > 6);

    // Still resolved, but every root is now far below the split threshold.
    let far = observer_at(1.0e8);
    let frame = run(&mut universe, &far, 50, |_| false);
    let surface = universe.surface_of(planet).unwrap();
    assert_eq!(surface.quadtree().len(), 6);
    assert!(surface.quadtree().check_consistency().is_empty());
    assert!(frame.surfaces[0].patches.iter().all(|p| p.patch.lod == 0));
}

#[test]
fn test_static_manager_draws_one_pass() {
    let (mut universe, _) = universe();
    let mut config = universe.config().clone();
    config.core.scene_manager = SceneManagerKind::Static;
    universe.set_config(config);
    let frame = universe.frame(0.0, &observer_at(3.0 * RADIUS));
    assert_eq!(frame.passes.len(), 1);
    assert_eq!(frame.passes[0].kind, RegionKind::Whole);
    assert_eq!(frame.passes[0].nodes.len(), 1);
}
