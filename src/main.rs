//! Headless runner
//!
//! Plays a seeded autopilot session against the in-memory host and logs
//! how it went. Environment:
//! - `GAPDASH_CONFIG`: JSON config file
//! - `GAPDASH_FRAMES`: frames to run (default 3600)
//! - `GAPDASH_SAVE`: write every checkpoint to this file
//! - `GAPDASH_RESUME`: start from a checkpoint file instead of a fresh run
//! - `GAPDASH_LEVEL`: JSON level chunks to queue

use std::path::{Path, PathBuf};

use gapdash::game::LoopState;
use gapdash::persistence;
use gapdash::platform::ManualHost;
use gapdash::renderer::NullRenderer;
use gapdash::sim::World;
use gapdash::{Game, GameConfig, GameHooks, GameStatus, Snapshot};

const FRAME_MS: f64 = 1000.0 / 60.0;
const DEFAULT_FRAMES: u64 = 3600;
const MAX_CONTINUES: u32 = 3;

struct DiskHooks {
    save_path: Option<PathBuf>,
}

impl GameHooks for DiskHooks {
    fn on_game_over(&mut self, score: u64) {
        log::info!("Game over hook: score {}", score);
    }

    fn on_checkpoint_save(&mut self, snapshot: &Snapshot) {
        if let Some(path) = self.save_path.as_deref()
            && let Err(e) = persistence::save_snapshot(path, snapshot)
        {
            log::warn!("Could not write checkpoint: {}", e);
        }
    }
}

/// Tap when the ball sinks below the next gap's center
fn autopilot_tap(world: &World) -> bool {
    let ball = &world.ball;
    let target = world
        .obstacles
        .iter()
        .find(|o| o.right() > ball.left())
        .map(|o| o.gap_center())
        .unwrap_or(world.spawn.y);
    let falling = ball.vel.y * ball.gravity_scale > -2.0;
    let below = (ball.pos.y - target) * ball.gravity_scale > 10.0;
    falling && below
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key).map(PathBuf::from)
}

fn main() {
    env_logger::init();
    log::info!("Gapdash (headless) starting...");

    let mut config = match env_path("GAPDASH_CONFIG") {
        Some(path) => GameConfig::load(&path),
        None => GameConfig::default(),
    };
    let seed = *config.seed.get_or_insert(1);
    let frames = std::env::var("GAPDASH_FRAMES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_FRAMES);
    log::info!("Running {} frames with seed {}", frames, seed);

    let hooks = DiskHooks {
        save_path: env_path("GAPDASH_SAVE"),
    };
    let mut game = Game::new(config, ManualHost::default(), NullRenderer).with_hooks(Box::new(hooks));

    if let Some(path) = env_path("GAPDASH_LEVEL") {
        match std::fs::read_to_string(&path).map(|json| game.load_level_json(&json)) {
            Ok(Ok(count)) => log::info!("Loaded {} chunks from {}", count, path.display()),
            Ok(Err(e)) => log::warn!("Bad level data in {}: {}", path.display(), e),
            Err(e) => log::warn!("Could not read {}: {}", path.display(), e),
        }
    }

    match env_path("GAPDASH_RESUME").as_deref().map(load_resume) {
        Some(Some(snapshot)) => game.restore_from_checkpoint(&snapshot),
        _ => game.start(),
    }

    let mut continues = 0;
    for _ in 0..frames {
        if game.status() == GameStatus::Playing && autopilot_tap(game.world()) {
            game.host_mut().queue_tap();
        }

        game.pump_frame(FRAME_MS);

        if game.status() == GameStatus::GameOver {
            if continues >= MAX_CONTINUES {
                break;
            }
            continues += 1;
            log::info!("Continue {}/{}", continues, MAX_CONTINUES);
            game.continue_game(None);
        }
        if game.loop_state() == LoopState::Stopped {
            log::error!("Loop stopped");
            break;
        }
    }

    let stats = game.stats();
    log::info!(
        "Finished: status {:?}, score {}, level {}, {} checkpoints, {} frames ({} over budget, {} faults)",
        game.status(),
        game.score(),
        game.world().level,
        game.checkpoints().len(),
        stats.frames,
        stats.overruns,
        stats.recoverable_faults + stats.render_faults
    );
    game.destroy();
}

fn load_resume(path: &Path) -> Option<Snapshot> {
    match persistence::load_snapshot(path) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            log::warn!("Starting fresh, checkpoint unusable: {}", e);
            None
        }
    }
}
