//! Game lifecycle and frame scheduler
//!
//! [`Game`] owns the world and drives it from host frame callbacks:
//! `idle → starting → playing ⇄ paused`, `playing → game over`, and
//! `game over → playing` through a continue. Update runs only while
//! playing; render runs on every frame the loop is armed.
//!
//! Faults from the update phases come back as typed outcomes. Recoverable
//! ones are logged where they happen. A fatal one pauses the game and arms
//! a delayed retry; once the retry budget is spent the loop stops for good.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::checkpoint::{CheckpointStore, Snapshot};
use crate::error::SimFault;
use crate::platform::{Host, ManualHost, TaskHandle};
use crate::renderer::{FrameContext, Renderer, render_frame};
use crate::settings::GameConfig;
use crate::sim::generator::{LevelChunk, fill_lookahead};
use crate::sim::state::{GameEvent, GracePeriod, World};
use crate::sim::tick::{TickInput, normalize_delta, tick};
use crate::theme::ThemeKey;

/// Player-facing lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    Idle,
    Starting,
    Playing,
    Paused,
    GameOver,
}

/// Whether the frame loop is armed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Not armed; a lifecycle call can arm it
    Parked,
    Running,
    /// Destroyed or out of retries; nothing re-arms it
    Stopped,
}

/// Host callbacks for lifecycle milestones
pub trait GameHooks {
    fn on_game_over(&mut self, _score: u64) {}
    fn on_score_update(&mut self, _score: u64) {}
    /// Receives a copy; mutating it can't reach the live world
    fn on_checkpoint_save(&mut self, _snapshot: &Snapshot) {}
}

/// Hooks that ignore everything
#[derive(Debug, Default)]
pub struct NoHooks;

impl GameHooks for NoHooks {}

/// Frame timing diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    pub frames: u64,
    /// Frames whose update+render exceeded the soft budget
    pub overruns: u64,
    pub last_frame_ms: f64,
    pub render_faults: u64,
    pub recoverable_faults: u64,
}

pub struct Game<H: Host, R: Renderer> {
    config: GameConfig,
    world: World,
    status: GameStatus,
    loop_state: LoopState,
    host: H,
    renderer: R,
    hooks: Box<dyn GameHooks>,
    chunks: Vec<LevelChunk>,
    checkpoints: CheckpointStore,

    frame_handle: Option<TaskHandle>,
    idle_handle: Option<TaskHandle>,
    retry_handle: Option<TaskHandle>,
    /// Checkpoint deferred to the next frame (host has no idle callbacks)
    checkpoint_next_frame: bool,
    last_checkpoint_ms: f64,

    last_timestamp: Option<f64>,
    starting_elapsed_ms: f64,
    /// Status a fatal fault interrupted, resumed by the retry
    interrupted: Option<GameStatus>,
    fatal_retries: u32,
    stats: FrameStats,
    shown_theme: Option<ThemeKey>,
    shown_level: u32,
}

impl<H: Host, R: Renderer> Game<H, R> {
    pub fn new(config: GameConfig, host: H, renderer: R) -> Self {
        let world = World::new(&config, seed_for(&config));
        let checkpoints = CheckpointStore::new(config.checkpoint_capacity);
        Self {
            config,
            world,
            status: GameStatus::Idle,
            loop_state: LoopState::Parked,
            host,
            renderer,
            hooks: Box::new(NoHooks),
            chunks: Vec::new(),
            checkpoints,
            frame_handle: None,
            idle_handle: None,
            retry_handle: None,
            checkpoint_next_frame: false,
            last_checkpoint_ms: 0.0,
            last_timestamp: None,
            starting_elapsed_ms: 0.0,
            interrupted: None,
            fatal_retries: 0,
            stats: FrameStats::default(),
            shown_theme: None,
            shown_level: 0,
        }
    }

    pub fn with_hooks(mut self, hooks: Box<dyn GameHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    // === Queries ===

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn score(&self) -> u64 {
        self.world.score
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn loop_state(&self) -> LoopState {
        self.loop_state
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Copies of the retained checkpoints, oldest first
    pub fn checkpoints(&self) -> Vec<Snapshot> {
        self.checkpoints.iter().cloned().collect()
    }

    /// Events since the last drain
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.world.drain_events()
    }

    // === Lifecycle ===

    /// Begin a fresh run with the countdown
    pub fn start(&mut self) {
        if !matches!(self.status, GameStatus::Idle | GameStatus::GameOver)
            || self.loop_state == LoopState::Stopped
        {
            log::debug!("start() ignored in {:?}", self.status);
            return;
        }
        self.world = World::new(&self.config, seed_for(&self.config));
        self.checkpoints.clear();
        self.last_checkpoint_ms = 0.0;
        self.starting_elapsed_ms = 0.0;
        self.fatal_retries = 0;
        self.status = GameStatus::Starting;
        log::info!("Starting ({}ms countdown)", self.config.starting_duration_ms);
        self.arm_loop();
    }

    pub fn pause(&mut self) {
        if !matches!(self.status, GameStatus::Playing | GameStatus::Starting) {
            return;
        }
        log::info!("Paused at score {}", self.world.score);
        self.interrupted = Some(self.status);
        self.status = GameStatus::Paused;
        self.park_loop();
    }

    pub fn resume(&mut self) {
        if self.status != GameStatus::Paused || self.loop_state == LoopState::Stopped {
            return;
        }
        self.status = self.interrupted.take().unwrap_or(GameStatus::Playing);
        log::info!("Resumed ({:?})", self.status);
        self.arm_loop();
    }

    /// Resume after game over, from a snapshot or by clearing the way ahead
    pub fn continue_game(&mut self, snapshot: Option<&Snapshot>) {
        if self.status != GameStatus::GameOver || self.loop_state == LoopState::Stopped {
            log::debug!("continue ignored in {:?}", self.status);
            return;
        }
        match snapshot {
            Some(snapshot) => {
                log::info!("Continuing from checkpoint {}", snapshot.id);
                self.restore_from_checkpoint(snapshot);
            }
            None => {
                log::info!("Continuing in place");
                self.clear_spawn_area();
                self.status = GameStatus::Playing;
                self.last_timestamp = None;
                self.arm_loop();
                self.hooks.on_score_update(self.world.score);
            }
        }
    }

    /// Replace the world with a snapshot's copy and resume play
    pub fn restore_from_checkpoint(&mut self, snapshot: &Snapshot) {
        if self.loop_state == LoopState::Stopped {
            return;
        }
        self.world = snapshot.restore();
        self.last_checkpoint_ms = self.world.time_ms;
        self.last_timestamp = None;
        self.interrupted = None;
        self.status = GameStatus::Playing;
        self.arm_loop();
        // Only once every field above is consistent
        self.hooks.on_score_update(self.world.score);
    }

    /// Snapshot now; returns a copy of what was stored
    pub fn save_checkpoint(&mut self) -> Result<Snapshot, SimFault> {
        let snapshot = self.checkpoints.save(&self.world)?.clone();
        self.last_checkpoint_ms = self.world.time_ms;
        log::info!(
            "Checkpoint {} saved (score {}, t={:.0}ms)",
            snapshot.id,
            snapshot.score(),
            snapshot.timestamp
        );
        self.hooks.on_checkpoint_save(&snapshot);
        Ok(snapshot)
    }

    /// Bank rescue time
    pub fn add_extra_time(&mut self, seconds: f64) {
        if !seconds.is_finite() || seconds <= 0.0 {
            log::warn!("Ignoring extra time of {}s", seconds);
            return;
        }
        self.world.effects.extra_time_ms += seconds * 1000.0;
    }

    /// Append externally supplied chunks to the queue
    pub fn load_level_data(&mut self, chunks: Vec<LevelChunk>) {
        log::info!("Queued {} level chunks", chunks.len());
        self.chunks.extend(chunks);
    }

    /// Parse a JSON array of chunks and append it
    pub fn load_level_json(&mut self, json: &str) -> Result<usize, serde_json::Error> {
        let chunks: Vec<LevelChunk> = serde_json::from_str(json)?;
        let count = chunks.len();
        self.load_level_data(chunks);
        Ok(count)
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        if !(width > 0.0 && height > 0.0) {
            return;
        }
        self.config.canvas_width = width;
        self.config.canvas_height = height;
        self.world.canvas_width = width;
        self.world.canvas_height = height;
        self.world.world_height = self.world.world_height.max(self.config.world_height());
        if let Err(e) = self.renderer.resize(width, height) {
            log::warn!("Renderer resize failed: {}", e);
        }
    }

    /// Cancel everything scheduled and stop the loop for good
    pub fn destroy(&mut self) {
        if self.loop_state == LoopState::Stopped && self.frame_handle.is_none() {
            return;
        }
        self.park_loop();
        if let Some(handle) = self.idle_handle.take() {
            self.host.cancel_idle(handle);
        }
        if let Some(handle) = self.retry_handle.take() {
            self.host.clear_timeout(handle);
        }
        self.checkpoint_next_frame = false;
        self.host.detach_resize_listener();
        self.host.detach();
        self.loop_state = LoopState::Stopped;
        log::info!("Game destroyed");
    }

    // === Host callbacks ===

    /// Frame callback
    pub fn tick(&mut self, timestamp_ms: f64) {
        self.frame_handle = None;
        if self.loop_state != LoopState::Running {
            return;
        }
        let frame_start = Instant::now();

        let delta_ms = match self.last_timestamp {
            Some(prev) => timestamp_ms - prev,
            None => 0.0,
        };
        self.last_timestamp = Some(timestamp_ms);
        let dt = normalize_delta(delta_ms);

        if self.checkpoint_next_frame {
            self.checkpoint_next_frame = false;
            self.save_checkpoint_logged();
        }

        if let Err(fault) = self.update(dt) {
            self.handle_fatal(fault);
            return;
        }
        self.fatal_retries = 0;

        self.render();

        let elapsed = frame_start.elapsed().as_secs_f64() * 1000.0;
        self.stats.frames += 1;
        self.stats.last_frame_ms = elapsed;
        if elapsed > self.config.frame_budget_ms {
            self.stats.overruns += 1;
            log::debug!("Frame took {:.2}ms (budget {:.1}ms)", elapsed, self.config.frame_budget_ms);
        }

        if self.loop_state == LoopState::Running {
            self.frame_handle = Some(self.host.request_frame());
        }
    }

    /// Idle callback for a deferred checkpoint
    pub fn on_idle(&mut self, handle: TaskHandle) {
        if self.idle_handle != Some(handle) {
            return;
        }
        self.idle_handle = None;
        if self.loop_state != LoopState::Stopped {
            self.save_checkpoint_logged();
        }
    }

    /// Timer callback for the fatal-fault retry
    pub fn on_timeout(&mut self, handle: TaskHandle) {
        if self.retry_handle != Some(handle) {
            return;
        }
        self.retry_handle = None;
        if self.loop_state == LoopState::Stopped {
            return;
        }
        if let Some(status) = self.interrupted.take() {
            self.status = status;
        }
        log::info!("Retrying loop ({:?})", self.status);
        self.last_timestamp = None;
        self.arm_loop();
    }

    // === Internals ===

    fn arm_loop(&mut self) {
        if self.loop_state == LoopState::Stopped {
            return;
        }
        self.loop_state = LoopState::Running;
        if self.frame_handle.is_none() {
            self.frame_handle = Some(self.host.request_frame());
        }
    }

    fn park_loop(&mut self) {
        if let Some(handle) = self.frame_handle.take() {
            self.host.cancel_frame(handle);
        }
        if self.loop_state == LoopState::Running {
            self.loop_state = LoopState::Parked;
        }
        self.last_timestamp = None;
    }

    fn update(&mut self, dt: f32) -> Result<(), SimFault> {
        match self.status {
            GameStatus::Starting => {
                // Taps during the countdown are dropped
                let _ = self.host.take_tap();
                self.starting_elapsed_ms += dt as f64 * crate::consts::BASELINE_FRAME_MS;
                if self.starting_elapsed_ms >= self.config.starting_duration_ms {
                    self.begin_play();
                }
                Ok(())
            }
            GameStatus::Playing => self.update_playing(dt),
            GameStatus::Idle | GameStatus::Paused | GameStatus::GameOver => Ok(()),
        }
    }

    fn begin_play(&mut self) {
        if let Err(fault) = fill_lookahead(&mut self.world, &self.chunks, &self.config) {
            log::warn!("Initial generation: {}", fault);
            self.stats.recoverable_faults += 1;
        }
        self.world.grace = GracePeriod::begin(self.world.time_ms);
        self.world.survival_clock_ms = self.world.time_ms;
        self.last_checkpoint_ms = self.world.time_ms;
        self.status = GameStatus::Playing;
        log::info!(
            "Playing: {} obstacles, {} walls",
            self.world.obstacles.len(),
            self.world.walls.len()
        );
    }

    fn update_playing(&mut self, dt: f32) -> Result<(), SimFault> {
        let input = TickInput {
            dt,
            tap: self.host.take_tap(),
            chunks: &self.chunks,
        };
        let report = tick(&mut self.world, &input, &self.config)?;
        self.stats.recoverable_faults += report.faults.len() as u64;

        if report.score_changed {
            self.hooks.on_score_update(self.world.score);
        }
        if report.game_over {
            self.trigger_game_over();
            return Ok(());
        }
        if self.world.time_ms - self.last_checkpoint_ms >= self.config.checkpoint_interval_ms {
            self.schedule_checkpoint();
        }
        Ok(())
    }

    /// Defer a checkpoint to idle time, or to the next frame without idle support
    fn schedule_checkpoint(&mut self) {
        self.last_checkpoint_ms = self.world.time_ms;
        if self.idle_handle.is_some() || self.checkpoint_next_frame {
            return;
        }
        if self.host.supports_idle() {
            self.idle_handle = Some(self.host.request_idle());
        } else {
            self.checkpoint_next_frame = true;
        }
    }

    fn save_checkpoint_logged(&mut self) {
        if let Err(fault) = self.save_checkpoint() {
            log::warn!("{}", fault);
            self.stats.recoverable_faults += 1;
        }
    }

    fn trigger_game_over(&mut self) {
        if self.status == GameStatus::GameOver {
            return;
        }
        self.status = GameStatus::GameOver;
        let score = self.world.score;
        log::info!("Game over at score {}", score);
        self.save_checkpoint_logged();
        self.world.emit(GameEvent::GameOver { score });
        self.hooks.on_game_over(score);
    }

    /// Reset the ball and drop barriers in the stretch right ahead of it
    fn clear_spawn_area(&mut self) {
        let world = &mut self.world;
        world.ball.reset_to(world.spawn);
        world.ball.gravity_scale = world.ball.gravity_scale.abs();
        let clear_to = world.ball.pos.x + self.config.continue_clear_distance;
        world.obstacles.retain(|o| o.left() > clear_to);
        world.walls.retain(|w| w.left() > clear_to);
        world.grace = GracePeriod::begin(world.time_ms);
        world.survival_clock_ms = world.time_ms;
        world.combos.reset_all();
        self.last_timestamp = None;
    }

    fn handle_fatal(&mut self, fault: SimFault) {
        log::error!("Fatal loop fault: {}", fault);
        if matches!(self.status, GameStatus::Playing | GameStatus::Starting) {
            self.interrupted = Some(self.status);
            self.status = GameStatus::Paused;
        }
        self.park_loop();

        if self.fatal_retries >= self.config.max_fatal_retries {
            log::error!("Retry budget spent after {} attempts, stopping loop", self.fatal_retries);
            self.loop_state = LoopState::Stopped;
            return;
        }
        self.fatal_retries += 1;
        log::error!(
            "Re-arming in {}ms (attempt {}/{})",
            self.config.fatal_retry_delay_ms,
            self.fatal_retries,
            self.config.max_fatal_retries
        );
        if let Some(handle) = self.retry_handle.take() {
            self.host.clear_timeout(handle);
        }
        self.retry_handle = Some(self.host.set_timeout(self.config.fatal_retry_delay_ms));
    }

    fn render(&mut self) {
        if self.shown_theme != Some(self.world.theme) {
            match self.renderer.set_theme(self.world.theme) {
                Ok(()) => self.shown_theme = Some(self.world.theme),
                Err(e) => log::warn!("Renderer theme change failed: {}", e),
            }
        }
        if self.shown_level != self.world.level {
            match self.renderer.set_level(self.world.level) {
                Ok(()) => self.shown_level = self.world.level,
                Err(e) => log::warn!("Renderer level change failed: {}", e),
            }
        }

        let ctx = FrameContext {
            status: self.status,
            starting_remaining_ms: (self.config.starting_duration_ms - self.starting_elapsed_ms)
                .max(0.0),
        };
        if let Err(e) = render_frame(&self.world, &ctx, &mut self.renderer) {
            log::warn!("Render fault, frame skipped: {}", e);
            self.stats.render_faults += 1;
        }
    }
}

impl<R: Renderer> Game<ManualHost, R> {
    /// Run one host frame on the in-memory host
    ///
    /// Fires the pending frame, or just lets the clock run while the loop is
    /// parked, then delivers every timer that came due and every idle request.
    pub fn pump_frame(&mut self, frame_ms: f64) {
        let due = match self.host.take_frame(frame_ms) {
            Some(timestamp) => {
                self.tick(timestamp);
                self.host.advance(0.0)
            }
            None => self.host.advance(frame_ms),
        };
        for handle in due {
            self.on_timeout(handle);
        }
        while let Some(handle) = self.host.take_idle() {
            self.on_idle(handle);
        }
    }
}

fn seed_for(config: &GameConfig) -> u64 {
    config.seed.unwrap_or_else(rand::random)
}
