//! Headless Orrery run: fly towards a planet and hand every frame to a
//! validating renderer.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI
//! flags, e.g. `orrery --frames 300 --scene-manager dynamic`.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use orrery_anchor::Lens;
use orrery_app::demo::{Demo, DemoSettings, Flight};
use orrery_app::frame_loop::{FIXED_DT, FrameLoop};
use orrery_app::headless::HeadlessRenderer;
use orrery_app::platform::{PlatformDirs, exit_status};
use orrery_config::{CliArgs, Config};
use orrery_debug::{FrameStats, diagnostic_channel};
use orrery_patchdata::TextureSource;
use orrery_scene::{Renderer, RendererError, SceneError};
use tracing::{error, info, warn};

const DEFAULT_FRAMES: u64 = 600;

/// Simulated seconds per wall-clock second.
const TIME_SCALE: f64 = 600.0;

/// Frames between checks of `config.ron` for edits.
const RELOAD_INTERVAL: u64 = 120;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let dirs = PlatformDirs::resolve().unwrap_or_else(|e| {
        eprintln!("{e}, using the working directory");
        PlatformDirs::resolve_with_root(std::path::Path::new("."))
    });
    let config_dir = args.config.clone().unwrap_or_else(|| dirs.config_dir.clone());

    // Hot reload compares against the file contents, before CLI overrides.
    let mut file_config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    let mut config = file_config.clone();
    config.apply_cli_overrides(&args);

    orrery_log::init_logging(Some(&dirs.log_dir), cfg!(debug_assertions), Some(&config));

    if let Err(e) = config.validate() {
        warn!("Invalid config: {e}, using defaults");
        config = Config::default();
    }
    if let Err(e) = dirs.create_dirs() {
        warn!("Failed to create platform directories: {e}");
    }

    let heightmap = args.heightmap.as_deref().and_then(|spec| {
        TextureSource::from_spec(spec, config.data.max_lod)
            .inspect_err(|e| warn!("Ignoring heightmap {spec}: {e}"))
            .ok()
    });
    let settings = DemoSettings {
        seed: args.seed.unwrap_or(DemoSettings::default().seed),
        heightmap,
        ..DemoSettings::default()
    };

    let (sink, diagnostics) = diagnostic_channel(256);
    let mut demo = match Demo::build(&config, &settings, sink) {
        Ok(demo) => demo,
        Err(e) => {
            error!("Failed to build universe, nothing to render: {e}");
            return ExitCode::from(exit_status(Some(&e)));
        }
    };

    let mut renderer = HeadlessRenderer::default();
    if let Err(e) = renderer.init(&config.core) {
        error!("Renderer initialization failed: {e}");
        return ExitCode::from(exit_status(Some(&SceneError::from(e))));
    }

    let frames = args.frames.unwrap_or(DEFAULT_FRAMES);
    let flight = Flight::default();
    let mut frame_loop = FrameLoop::new(TIME_SCALE);
    let mut lens = Lens::from_config(&config.core);
    let mut last_stats = FrameStats::default();
    let mut failure: Option<RendererError> = None;
    let mut stopped_on: Option<SceneError> = None;
    let mut diagnostic_count = 0usize;

    info!(frames, seed = settings.seed, "starting flight");
    while frame_loop.frame_count() < frames {
        frame_loop.tick(
            |_, _| {},
            |time| {
                let planet = demo.universe.tree().get(demo.planet).position;
                let observer = flight.observer(planet, lens, time.sim_time);
                let frame = demo.universe.frame(time.sim_time, &observer);
                if let Err(e) = renderer.render(&frame) {
                    failure = Some(e);
                }
                last_stats = frame.stats;
            },
        );
        diagnostic_count += diagnostics.try_iter().count();

        if let Some(e) = failure.take() {
            error!("Renderer failed, stopping: {e}");
            stopped_on = Some(e.into());
            break;
        }

        if frame_loop.frame_count() % RELOAD_INTERVAL == 0 {
            match file_config.reload(&config_dir) {
                Ok(Some(edited)) => {
                    file_config = edited;
                    let mut reloaded = file_config.clone();
                    reloaded.apply_cli_overrides(&args);
                    if let Err(e) = reloaded.validate() {
                        warn!("Ignoring edited config: {e}");
                    } else {
                        info!("Config reloaded");
                        lens = Lens::from_config(&reloaded.core);
                        demo.universe.set_config(reloaded);
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("Failed to reload config: {e}"),
            }
        }

        std::thread::sleep(Duration::from_secs_f64(FIXED_DT));
    }
    renderer.shutdown();

    let (light, casters) = demo.planet_lighting();
    if let Some(light) = light {
        let name = &demo.universe.tree().get(light.anchor).name;
        info!(light = %name, irradiance = light.radiance, shadow_casters = casters.len(), "planet lighting");
    }
    let planet = demo.universe.tree().get(demo.planet).position;
    if let Some(system) = demo.closest_system(planet) {
        info!(system = %demo.universe.tree().get(system).name, "closest system");
    }

    info!(
        frames = renderer.frames(),
        passes = renderer.passes(),
        patches = last_stats.patches_shown,
        diagnostics = diagnostic_count,
        "run complete"
    );

    if demo.universe.config().debug.export_frame_stats {
        let path = dirs.stats_path();
        match last_stats.export(&path) {
            Ok(()) => info!("Frame stats written to {}", path.display()),
            Err(e) => warn!("Failed to export frame stats: {e}"),
        }
    }

    ExitCode::from(exit_status(stopped_on.as_ref()))
}
