//! A deterministic demo universe: a star field, a sun, and a planet with a
//! streamed surface that the observer approaches.

use std::sync::Arc;

use glam::{DQuat, DVec3};
use orrery_anchor::dynamics::{CircularOrbit, UniformRotation};
use orrery_anchor::{
    AnchorDesc, AnchorId, AnchorTreeBuilder, FindClosestSystemTraverser, FindLightSourceTraverser,
    FindShadowCastersTraverser, Lens, LightSource, Observer,
};
use orrery_config::Config;
use orrery_debug::DiagnosticSink;
use orrery_lod::Surface;
use orrery_math::{Vec3I128, WorldPosition};
use orrery_math::photometry::{SUN_LUMINOSITY, luminosity_from_abs_magnitude};
use orrery_math::units::{AU_M, LIGHT_YEAR_M, SOLAR_RADIUS_M};
use orrery_patchdata::{LoaderPool, ProceduralParams, SourceLoader, TextureSource};
use orrery_scene::{SceneError, SurfaceBody, SurfaceSources, Universe};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

pub const PLANET_RADIUS: f64 = 6.371e6;
const MOON_RADIUS: f64 = 1.737e6;
const DAY: f64 = 86_400.0;

/// Stars are scattered in a cube of this half extent around the sun.
const STAR_FIELD_HALF_EXTENT: f64 = 50.0 * LIGHT_YEAR_M;

#[derive(Debug, Clone)]
pub struct DemoSettings {
    pub seed: u64,
    pub stars: usize,
    /// Heightmap of the planet; procedural noise when unset.
    pub heightmap: Option<TextureSource>,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            seed: 42,
            stars: 2_000,
            heightmap: None,
        }
    }
}

#[derive(Debug)]
pub struct Demo {
    pub universe: Universe,
    pub sun: AnchorId,
    pub planet: AnchorId,
    pub moon: AnchorId,
}

/// Map a temperature-like parameter in `[0, 1]` from red dwarfs to blue giants.
fn star_color(t: f64) -> [f32; 3] {
    let t = t.clamp(0.0, 1.0) as f32;
    [1.0 - 0.4 * t, 0.7 + 0.2 * t, 0.5 + 0.5 * t]
}

impl Demo {
    pub fn build(config: &Config, settings: &DemoSettings, sink: DiagnosticSink) -> Result<Self, SceneError> {
        let mut rng = ChaCha8Rng::seed_from_u64(settings.seed);
        let mut b = AnchorTreeBuilder::new(AnchorDesc::system("universe"))?;
        let root = b.root();

        let stars = b.add(root, AnchorDesc::octree("stars"))?;
        for i in 0..settings.stars {
            let offset = DVec3::new(
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
            ) * STAR_FIELD_HALF_EXTENT;
            // Keep the solar neighbourhood clear.
            if offset.length() < LIGHT_YEAR_M {
                continue;
            }
            let abs_mag = rng.random_range(-1.0..12.0);
            let t = (12.0 - abs_mag) / 13.0;
            b.add(
                stars,
                AnchorDesc::body(format!("star-{i}"))
                    .emissive(luminosity_from_abs_magnitude(abs_mag))
                    .radius(SOLAR_RADIUS_M * rng.random_range(0.2..5.0))
                    .color(star_color(t))
                    .at_meters(offset),
            )?;
        }

        let sol = b.add(root, AnchorDesc::system("sol"))?;
        let sun = b.add(
            sol,
            AnchorDesc::body("sun")
                .emissive(SUN_LUMINOSITY)
                .radius(SOLAR_RADIUS_M)
                .color([1.0, 0.95, 0.85]),
        )?;
        let earth_system = b.add(
            sol,
            AnchorDesc::system("terra-system").orbit(CircularOrbit {
                radius: AU_M,
                period: 365.25 * DAY,
                phase: rng.random_range(0.0..std::f64::consts::TAU),
                inclination: 0.0,
            }),
        )?;
        let planet = b.add(
            earth_system,
            AnchorDesc::body("terra")
                .radius(PLANET_RADIUS)
                .color([0.3, 0.45, 0.8])
                .rotation(UniformRotation {
                    axis: DVec3::new(0.0, 1.0, 0.1),
                    period: 0.997 * DAY,
                    phase: 0.0,
                }),
        )?;
        let moon = b.add(
            earth_system,
            AnchorDesc::body("luna")
                .radius(MOON_RADIUS)
                .color([0.7, 0.7, 0.68])
                .orbit(CircularOrbit {
                    radius: 3.844e8,
                    period: 27.32 * DAY,
                    phase: 0.0,
                    inclination: 0.09,
                }),
        )?;
        b.add(
            root,
            AnchorDesc::body("andromeda")
                .radius(1.1e21)
                .background()
                .color([0.8, 0.8, 1.0])
                .at_meters(DVec3::new(1.5e22, 0.9e22, -1.7e22)),
        )?;

        let tree = b.build(&config.octree, sink.clone());

        let height = match &settings.heightmap {
            Some(source) => source.clone(),
            None => TextureSource::Procedural(ProceduralParams {
                seed: settings.seed as u32,
                size: config.data.texture_size + 1,
                max_lod: config.data.max_lod,
                ..ProceduralParams::default()
            }),
        };
        info!(source = %height.describe(), "planet heightmap");
        let pool = Arc::new(LoaderPool::new(
            config.data.workers,
            config.data.queue_capacity,
            Arc::new(SourceLoader),
        ));
        let surface = SurfaceBody::new(
            planet,
            Surface::CubeSphere { radius: PLANET_RADIUS },
            SurfaceSources {
                height: Some(height),
                color: None,
            },
            pool,
            config,
            sink.clone(),
        );

        let mut universe = Universe::new(tree, config.clone(), sink);
        universe.add_surface(surface);
        Ok(Self {
            universe,
            sun,
            planet,
            moon,
        })
    }

    /// Brightest light reaching the planet and the bodies shadowing it.
    pub fn planet_lighting(&mut self) -> (Option<LightSource>, Vec<AnchorId>) {
        let tree = self.universe.tree_mut();
        let target = tree.get(self.planet).position;
        let mut finder = FindLightSourceTraverser::new(target, Some(self.planet));
        let root = tree.root();
        tree.traverse(root, &mut finder);
        let Some(light) = finder.into_sorted().first().copied() else {
            return (None, Vec::new());
        };
        let casters = FindShadowCastersTraverser::find(tree, self.planet, light.anchor);
        (Some(light), casters)
    }

    /// The top-level system nearest to `position`.
    pub fn closest_system(&mut self, position: WorldPosition) -> Option<AnchorId> {
        let tree = self.universe.tree_mut();
        let mut finder = FindClosestSystemTraverser::new(position);
        let root = tree.root();
        tree.traverse(root, &mut finder);
        finder.closest
    }
}

/// Observer path that falls towards the planet along a fixed direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Flight {
    /// Start and end distances from the planet center, in planet radii.
    pub from: f64,
    pub to: f64,
    /// Simulated seconds for the remaining distance to fall by `e`.
    pub time_constant: f64,
    pub direction: DVec3,
}

impl Default for Flight {
    fn default() -> Self {
        Self {
            from: 60.0,
            to: 1.05,
            time_constant: 1_800.0,
            direction: DVec3::new(0.3, 0.2, 1.0).normalize(),
        }
    }
}

impl Flight {
    /// Distance from the planet center at `time`, metres.
    pub fn distance(&self, time: f64) -> f64 {
        let radii = self.to + (self.from - self.to) * (-time.max(0.0) / self.time_constant).exp();
        radii * PLANET_RADIUS
    }

    /// Observer at `time` looking at the planet centered at `planet`.
    pub fn observer(&self, planet: WorldPosition, lens: Lens, time: f64) -> Observer {
        let position = planet + Vec3I128::from_meters(self.direction * self.distance(time));
        let mut observer = Observer::new(position, DQuat::IDENTITY, lens);
        observer.look_at(planet);
        observer
    }
}
