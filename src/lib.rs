//! Gapdash - simulation core of an endless side-scrolling gap runner
//!
//! Core modules:
//! - `sim`: World state, physics, collisions, generation, scoring
//! - `game`: Lifecycle state machine and frame scheduler
//! - `checkpoint`: Snapshots and the bounded checkpoint ring
//! - `renderer`: Drawing interface consumed by the scheduler
//! - `platform`: Host frame source and input abstraction
//! - `persistence`: Versioned on-disk checkpoint envelopes
//! - `tuning`: Data-driven difficulty curve
//! - `theme`: Theme keys and palettes

pub mod checkpoint;
pub mod error;
pub mod game;
pub mod persistence;
pub mod platform;
pub mod renderer;
pub mod settings;
pub mod sim;
pub mod theme;
pub mod tuning;

pub use checkpoint::{CheckpointStore, Snapshot};
pub use error::{PhaseOutcome, Severity, SimFault};
pub use game::{Game, GameHooks, GameStatus};
pub use settings::GameConfig;

/// Game configuration constants
pub mod consts {
    /// Frame duration the physics constants are tuned for (60 fps)
    pub const BASELINE_FRAME_MS: f64 = 1000.0 / 60.0;
    /// Upper clamp on the normalized per-frame delta
    pub const MAX_DELTA_FRAMES: f32 = 5.0;

    /// Ball defaults
    pub const BALL_RADIUS: f32 = 15.0;
    pub const BALL_SPAWN_X: f32 = 100.0;
    pub const BALL_SPAWN_Y: f32 = 300.0;

    /// Walls
    pub const WALL_THICKNESS: f32 = 20.0;
    /// Minimum vertical clearance between walls sharing an X range (on top of thickness)
    pub const MIN_WALL_SPACING: f32 = 300.0;
    /// Walls alive at once
    pub const MAX_WALLS: usize = 12;
    /// How far past the left edge a wall travels before it is dropped
    pub const WALL_CULL_DISTANCE: f32 = 200.0;

    /// Smallest vertical gap before difficulty scaling
    pub const MIN_GAP_HEIGHT: f32 = 120.0;
    /// Gap width floor as a multiple of ball radius
    pub const MIN_GAP_RADIUS_FACTOR: f32 = 2.5;

    /// Pixels from a gap edge that still count as a close call
    pub const CLOSE_CALL_THRESHOLD: f32 = 12.0;
    /// Fraction of the gap half-size that counts as dead center
    pub const PERFECT_FRACTION: f32 = 0.3;

    /// Base score amounts
    pub const OBSTACLE_PASS_SCORE: f64 = 10.0;
    pub const WALL_PASS_SCORE: f64 = 5.0;
    pub const PERFECT_BONUS: f64 = 5.0;
    pub const SHORTCUT_BONUS: f64 = 25.0;
    pub const SURVIVAL_SCORE: f64 = 1.0;
}

/// Minimum navigable gap width for a ball of the given radius
#[inline]
pub fn min_gap_width(ball_radius: f32) -> f32 {
    consts::MIN_GAP_RADIUS_FACTOR * ball_radius
}

/// Linear interpolation between `a` and `b`
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Whether two closed intervals overlap with positive length
#[inline]
pub fn ranges_overlap(a_min: f32, a_max: f32, b_min: f32, b_max: f32) -> bool {
    a_min < b_max && b_min < a_max
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_gap_width() {
        assert_eq!(min_gap_width(10.0), 25.0);
    }

    #[test]
    fn test_ranges_overlap() {
        assert!(ranges_overlap(0.0, 10.0, 5.0, 15.0));
        assert!(!ranges_overlap(0.0, 10.0, 10.0, 20.0));
        assert!(!ranges_overlap(20.0, 30.0, 0.0, 10.0));
    }
}
