//! Simulation module
//!
//! All gameplay logic lives here. Nothing in this module touches the
//! renderer or the host:
//! - Every random draw goes through the world's seeded RNG
//! - Entity lists are kept in a stable order (by X, then ID)
//! - Time only advances through `tick`

pub mod collision;
pub mod events;
pub mod generator;
pub mod powerups;
pub mod state;
pub mod style;
pub mod tick;

pub use collision::{ball_hits_barrier, check_gap_passage, classify_pass, wall_blocks_gap};
pub use events::{RandomEvent, RandomEventKind};
pub use generator::{ChunkWall, GeneratorState, LevelChunk, Zone, ZoneKind, fill_lookahead};
pub use powerups::ActiveEffects;
pub use state::{
    Ball, Barrier, BarrierKind, GameEvent, GapType, GracePeriod, ObstacleStyle, PassQuality,
    PowerUp, PowerUpKind, World,
};
pub use style::{ComboKind, ComboTracker, StyleLevel, StyleMeter};
pub use tick::{TickInput, TickReport, normalize_delta, tick};
