//! Game configuration
//!
//! Every tuning knob the simulation reads. Loaded from JSON with
//! per-field defaults so partial files keep working.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::*;
use crate::theme::ThemeKey;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Simulation and scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    // === Canvas / world ===
    pub canvas_width: f32,
    pub canvas_height: f32,
    /// World height as a multiple of the canvas height
    pub world_height_factor: f32,
    pub theme: ThemeKey,

    // === Ball ===
    pub ball_radius: f32,
    pub ball_spawn_x: f32,
    pub ball_spawn_y: f32,
    /// Downward acceleration in px per frame²
    pub gravity: f32,
    /// Upward velocity set by a tap, px per frame
    pub tap_impulse: f32,
    pub max_fall_speed: f32,

    // === Scrolling / difficulty ===
    /// Scroll speed at difficulty 1, px per frame
    pub base_scroll_speed: f32,
    /// Score needed to raise difficulty by 1.0
    pub difficulty_score_step: f32,
    pub max_difficulty: f32,
    /// How far ahead of the ball the generator keeps the field populated, in viewport widths
    pub lookahead_viewports: f32,

    // === Safety windows ===
    pub grace_duration_ms: f64,
    pub grace_min_distance: f32,
    /// Hit immunity after a shield or extra time absorbs a collision
    pub rescue_invulnerability_ms: f64,
    pub starting_duration_ms: f64,
    /// Clear zone ahead of the ball when continuing without a snapshot
    pub continue_clear_distance: f32,

    // === Checkpoints ===
    pub checkpoint_interval_ms: f64,
    pub checkpoint_capacity: usize,

    // === Random events ===
    /// Level at which random events can start rolling
    pub random_event_min_level: u32,
    /// Chance per second of play that an event starts
    pub random_event_chance: f64,
    pub random_event_duration_ms: f64,

    // === Scheduler ===
    /// Soft per-frame budget, observed only
    pub frame_budget_ms: f64,
    pub fatal_retry_delay_ms: f64,
    pub max_fatal_retries: u32,

    /// Fixed RNG seed; random when absent
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            canvas_width: 800.0,
            canvas_height: 600.0,
            world_height_factor: 2.0,
            theme: ThemeKey::Classic,

            ball_radius: BALL_RADIUS,
            ball_spawn_x: BALL_SPAWN_X,
            ball_spawn_y: BALL_SPAWN_Y,
            gravity: 0.5,
            tap_impulse: 9.0,
            max_fall_speed: 14.0,

            base_scroll_speed: 3.0,
            difficulty_score_step: 400.0,
            max_difficulty: 3.0,
            lookahead_viewports: 2.0,

            grace_duration_ms: 1500.0,
            grace_min_distance: 150.0,
            rescue_invulnerability_ms: 1000.0,
            starting_duration_ms: 3000.0,
            continue_clear_distance: 400.0,

            checkpoint_interval_ms: 5000.0,
            checkpoint_capacity: 5,

            random_event_min_level: 2,
            random_event_chance: 0.04,
            random_event_duration_ms: 6000.0,

            frame_budget_ms: 16.7,
            fatal_retry_delay_ms: 1000.0,
            max_fatal_retries: 3,

            seed: None,
        }
    }
}

impl GameConfig {
    /// Parse a (possibly partial) JSON config
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the simulation cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.canvas_width <= 0.0 || self.canvas_height <= 0.0 {
            return Err(ConfigError::Invalid("canvas size must be positive".into()));
        }
        if self.world_height_factor < 1.0 {
            return Err(ConfigError::Invalid(
                "world_height_factor must be at least 1".into(),
            ));
        }
        if self.ball_radius <= 0.0 {
            return Err(ConfigError::Invalid("ball_radius must be positive".into()));
        }
        if self.checkpoint_capacity == 0 {
            return Err(ConfigError::Invalid(
                "checkpoint_capacity must be at least 1".into(),
            ));
        }
        if self.max_difficulty < 1.0 {
            return Err(ConfigError::Invalid("max_difficulty must be at least 1".into()));
        }
        Ok(())
    }

    /// Load config from a JSON file, falling back to defaults
    pub fn load(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path)
            .map_err(ConfigError::from)
            .and_then(|json| Self::from_json(&json))
        {
            Ok(config) => {
                log::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("Using default config ({})", e);
                Self::default()
            }
        }
    }

    pub fn world_height(&self) -> f32 {
        self.canvas_height * self.world_height_factor
    }
}
