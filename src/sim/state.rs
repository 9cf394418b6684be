//! World state and core simulation types
//!
//! All state that a checkpoint must capture lives here.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::events::RandomEvent;
use super::generator::GeneratorState;
use super::powerups::ActiveEffects;
use super::style::{ComboTracker, StyleMeter};
use crate::settings::GameConfig;
use crate::theme::ThemeKey;

/// The player's ball
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    pub pos: Vec2,
    pub vel: Vec2,
    /// Position at the start of the current tick (for swept passage checks)
    pub prev_pos: Vec2,
    pub radius: f32,
    /// 1.0 normally, -1.0 while gravity is flipped
    pub gravity_scale: f32,
}

impl Ball {
    pub fn new(spawn: Vec2, radius: f32) -> Self {
        Self {
            pos: spawn,
            vel: Vec2::ZERO,
            prev_pos: spawn,
            radius,
            gravity_scale: 1.0,
        }
    }

    /// Put the ball back at `spawn` at rest
    pub fn reset_to(&mut self, spawn: Vec2) {
        self.pos = spawn;
        self.prev_pos = spawn;
        self.vel = Vec2::ZERO;
    }

    pub fn top(&self) -> f32 {
        self.pos.y - self.radius
    }

    pub fn bottom(&self) -> f32 {
        self.pos.y + self.radius
    }

    pub fn left(&self) -> f32 {
        self.pos.x - self.radius
    }

    pub fn right(&self) -> f32 {
        self.pos.x + self.radius
    }

    pub fn is_finite(&self) -> bool {
        self.pos.is_finite() && self.vel.is_finite()
    }
}

/// Visual style tag for barriers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ObstacleStyle {
    #[default]
    Solid,
    Striped,
    Glow,
}

impl ObstacleStyle {
    pub const ALL: [ObstacleStyle; 3] = [
        ObstacleStyle::Solid,
        ObstacleStyle::Striped,
        ObstacleStyle::Glow,
    ];
}

/// What a horizontal wall's gap does when the ball goes through it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GapType {
    #[default]
    None,
    PowerUp,
    Shortcut,
    LevelTransition,
}

/// Power-up types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerUpKind {
    ScoreBonus,
    ExtraTime,
    SlowMotion,
    SpeedBoost,
    Shield,
    Magnet,
    ScoreMultiplier,
    GravityFlip,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 8] = [
        PowerUpKind::ScoreBonus,
        PowerUpKind::ExtraTime,
        PowerUpKind::SlowMotion,
        PowerUpKind::SpeedBoost,
        PowerUpKind::Shield,
        PowerUpKind::Magnet,
        PowerUpKind::ScoreMultiplier,
        PowerUpKind::GravityFlip,
    ];
}

/// A collectible power-up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerUp {
    pub id: u32,
    pub pos: Vec2,
    pub kind: PowerUpKind,
    pub size: f32,
    pub collected: bool,
    /// Rotation angle (radians) for rendering
    pub rotation: f32,
    /// Pulse phase (radians) for rendering
    pub pulse: f32,
}

/// Default power-up diameter
pub const POWER_UP_SIZE: f32 = 24.0;

impl PowerUp {
    pub fn new(id: u32, kind: PowerUpKind, pos: Vec2) -> Self {
        Self {
            id,
            pos,
            kind,
            size: POWER_UP_SIZE,
            collected: false,
            rotation: 0.0,
            pulse: 0.0,
        }
    }

    /// Advance the rotation/pulse animation
    pub fn animate(&mut self, dt: f32) {
        self.rotation = (self.rotation + 0.05 * dt) % std::f32::consts::TAU;
        self.pulse = (self.pulse + 0.1 * dt) % std::f32::consts::TAU;
    }

    /// Circle overlap against the ball
    pub fn touches(&self, ball: &Ball) -> bool {
        self.pos.distance(ball.pos) < self.size / 2.0 + ball.radius
    }
}

/// Orientation-specific barrier data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BarrierKind {
    /// Full-height obstacle with a vertical opening
    Vertical {
        /// Gap center as a 0..1 fraction of the barrier height
        gap_y: f32,
        /// Gap height in pixels
        gap_height: f32,
    },
    /// Canvas-wide wall with a horizontal opening
    Horizontal {
        /// Gap center as a pixel offset from the wall's left edge
        gap_x: f32,
        gap_width: f32,
        gap_type: GapType,
        /// Vertical obstacle this wall was aligned with
        connection: Option<u32>,
    },
}

/// An obstacle (vertical) or wall (horizontal) with a gap carved out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Barrier {
    pub id: u32,
    /// Top-left corner in world coordinates
    pub pos: Vec2,
    pub width: f32,
    pub height: f32,
    pub kind: BarrierKind,
    pub style: ObstacleStyle,
    pub color: u32,
    pub theme: ThemeKey,
    pub passed: bool,
    /// Power-up sitting inside the gap
    pub power_up: Option<PowerUp>,
}

impl Barrier {
    pub fn vertical(id: u32, x: f32, width: f32, height: f32, gap_y: f32, gap_height: f32) -> Self {
        Self {
            id,
            pos: Vec2::new(x, 0.0),
            width,
            height,
            kind: BarrierKind::Vertical { gap_y, gap_height },
            style: ObstacleStyle::Solid,
            color: 0,
            theme: ThemeKey::default(),
            passed: false,
            power_up: None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn horizontal(
        id: u32,
        x: f32,
        y: f32,
        width: f32,
        thickness: f32,
        gap_x: f32,
        gap_width: f32,
        gap_type: GapType,
    ) -> Self {
        Self {
            id,
            pos: Vec2::new(x, y),
            width,
            height: thickness,
            kind: BarrierKind::Horizontal {
                gap_x,
                gap_width,
                gap_type,
                connection: None,
            },
            style: ObstacleStyle::Solid,
            color: 0,
            theme: ThemeKey::default(),
            passed: false,
            power_up: None,
        }
    }

    pub fn is_vertical(&self) -> bool {
        matches!(self.kind, BarrierKind::Vertical { .. })
    }

    pub fn left(&self) -> f32 {
        self.pos.x
    }

    pub fn right(&self) -> f32 {
        self.pos.x + self.width
    }

    pub fn top(&self) -> f32 {
        self.pos.y
    }

    pub fn bottom(&self) -> f32 {
        self.pos.y + self.height
    }

    pub fn center_x(&self) -> f32 {
        self.pos.x + self.width / 2.0
    }

    /// Absolute gap center (Y for vertical barriers, X for horizontal ones)
    pub fn gap_center(&self) -> f32 {
        match self.kind {
            BarrierKind::Vertical { gap_y, .. } => self.pos.y + gap_y * self.height,
            BarrierKind::Horizontal { gap_x, .. } => self.pos.x + gap_x,
        }
    }

    /// Gap extent along its axis
    pub fn gap_size(&self) -> f32 {
        match self.kind {
            BarrierKind::Vertical { gap_height, .. } => gap_height,
            BarrierKind::Horizontal { gap_width, .. } => gap_width,
        }
    }

    /// Absolute (start, end) of the gap along its axis
    pub fn gap_span(&self) -> (f32, f32) {
        let center = self.gap_center();
        let half = self.gap_size() / 2.0;
        (center - half, center + half)
    }

    pub fn gap_type(&self) -> GapType {
        match self.kind {
            BarrierKind::Horizontal { gap_type, .. } => gap_type,
            BarrierKind::Vertical { .. } => GapType::None,
        }
    }

    pub fn connection(&self) -> Option<u32> {
        match self.kind {
            BarrierKind::Horizontal { connection, .. } => connection,
            BarrierKind::Vertical { .. } => None,
        }
    }

    /// Scroll horizontally, dragging any embedded power-up along
    pub fn translate_x(&mut self, dx: f32) {
        self.pos.x += dx;
        if let Some(power_up) = self.power_up.as_mut() {
            power_up.pos.x += dx;
        }
    }
}

/// How cleanly the ball went through a gap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassQuality {
    Perfect,
    CloseCall,
    Plain,
}

/// Things that happened during a tick, for audio/particle collaborators
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Tap,
    ObstaclePassed { quality: PassQuality, points: u64 },
    WallPassed { quality: PassQuality, gap_type: GapType, points: u64 },
    PowerUpCollected(PowerUpKind),
    EffectExpired(PowerUpKind),
    ShieldUsed { remaining: u32 },
    ExtraTimeUsed,
    Collision,
    LevelUp(u32),
    LevelTransitionGap,
    StyleLevelChanged { level: super::style::StyleLevel, rising: bool },
    RandomEventStarted(super::events::RandomEventKind),
    RandomEventEnded(super::events::RandomEventKind),
    GameOver { score: u64 },
}

/// Collision grace window after spawn or continue
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GracePeriod {
    pub started_ms: f64,
    /// Scroll distance accumulated since the grace window opened
    pub travelled: f32,
    pub active: bool,
}

impl GracePeriod {
    pub fn begin(now_ms: f64) -> Self {
        Self {
            started_ms: now_ms,
            travelled: 0.0,
            active: true,
        }
    }

    pub fn inactive() -> Self {
        Self {
            started_ms: 0.0,
            travelled: 0.0,
            active: false,
        }
    }

    /// Accumulate travel and close the window once time or distance is reached
    pub fn advance(&mut self, now_ms: f64, scrolled: f32, duration_ms: f64, min_distance: f32) {
        if !self.active {
            return;
        }
        self.travelled += scrolled.abs();
        if now_ms - self.started_ms >= duration_ms || self.travelled >= min_distance {
            self.active = false;
        }
    }
}

/// Complete simulation world (serializable for checkpoints)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    pub canvas_width: f32,
    pub canvas_height: f32,
    /// Vertical extent of the playfield (camera scrolls within it)
    pub world_height: f32,
    pub spawn: Vec2,
    pub ball: Ball,
    /// Vertical obstacles, ordered by X
    pub obstacles: Vec<Barrier>,
    /// Horizontal walls, ordered by X
    pub walls: Vec<Barrier>,
    /// Free-floating power-ups
    pub power_ups: Vec<PowerUp>,
    pub score: u64,
    pub difficulty: f32,
    pub level: u32,
    pub theme: ThemeKey,
    pub generator: GeneratorState,
    pub effects: ActiveEffects,
    pub random_events: Vec<RandomEvent>,
    pub style: StyleMeter,
    pub combos: ComboTracker,
    /// Camera top edge in world coordinates
    pub camera_y: f32,
    /// Simulation clock in milliseconds (advances only while playing)
    pub time_ms: f64,
    pub grace: GracePeriod,
    /// Last time a survival point was awarded
    pub survival_clock_ms: f64,
    /// Last time a random event was rolled
    pub event_roll_ms: f64,
    /// Last computed scroll speed (pixels per baseline frame)
    pub scroll_speed: f32,
    pub rng: Pcg32,
    /// Events since the last drain (not gameplay-affecting)
    #[serde(skip)]
    pub events: Vec<GameEvent>,
    next_id: u32,
}

impl World {
    pub fn new(config: &GameConfig, seed: u64) -> Self {
        let spawn = Vec2::new(config.ball_spawn_x, config.ball_spawn_y);
        let world_height = config.canvas_height * config.world_height_factor;
        Self {
            canvas_width: config.canvas_width,
            canvas_height: config.canvas_height,
            world_height,
            spawn,
            ball: Ball::new(spawn, config.ball_radius),
            obstacles: Vec::new(),
            walls: Vec::new(),
            power_ups: Vec::new(),
            score: 0,
            difficulty: 1.0,
            level: 1,
            theme: config.theme,
            generator: GeneratorState::new(),
            effects: ActiveEffects::default(),
            random_events: Vec::new(),
            style: StyleMeter::new(),
            combos: ComboTracker::new(),
            camera_y: 0.0,
            time_ms: 0.0,
            grace: GracePeriod::inactive(),
            survival_clock_ms: 0.0,
            event_roll_ms: 0.0,
            scroll_speed: 0.0,
            rng: Pcg32::seed_from_u64(seed),
            events: Vec::new(),
            next_id: 1,
        }
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Emit an event for external collaborators
    pub fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Take all pending events
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Combined score multiplier from power-ups and random events
    pub fn score_multiplier(&self) -> f64 {
        let mut multiplier = self.effects.score_multiplier(self.time_ms);
        for event in &self.random_events {
            multiplier *= event.score_multiplier();
        }
        multiplier
    }

    /// Add a score delta through every active multiplier; returns the points awarded
    pub fn award(&mut self, base: f64) -> u64 {
        let delta = base
            * self.score_multiplier()
            * self.style.multiplier()
            * self.combos.multiplier();
        let points = delta.max(0.0).floor() as u64;
        self.score = self.score.saturating_add(points);
        points
    }

    /// Keep entity lists sorted by X so iteration order is stable
    pub fn normalize_order(&mut self) {
        self.obstacles
            .sort_by(|a, b| a.pos.x.total_cmp(&b.pos.x).then(a.id.cmp(&b.id)));
        self.walls
            .sort_by(|a, b| a.pos.x.total_cmp(&b.pos.x).then(a.id.cmp(&b.id)));
    }

    /// Highest entity id in use, so restored worlds never reuse ids
    pub fn max_entity_id(&self) -> u32 {
        let barrier_ids = self
            .obstacles
            .iter()
            .chain(self.walls.iter())
            .flat_map(|b| std::iter::once(b.id).chain(b.power_up.as_ref().map(|p| p.id)));
        barrier_ids
            .chain(self.power_ups.iter().map(|p| p.id))
            .max()
            .unwrap_or(0)
    }

    /// Make sure future ids are above everything currently in the world
    pub fn reseat_entity_ids(&mut self) {
        self.next_id = self.next_id.max(self.max_entity_id() + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertical_gap_span() {
        let barrier = Barrier::vertical(1, 400.0, 60.0, 1200.0, 0.5, 200.0);
        assert_eq!(barrier.gap_center(), 600.0);
        assert_eq!(barrier.gap_span(), (500.0, 700.0));
        assert!(barrier.is_vertical());
    }

    #[test]
    fn test_horizontal_gap_span() {
        let wall = Barrier::horizontal(2, 100.0, 300.0, 800.0, 20.0, 250.0, 100.0, GapType::Shortcut);
        assert_eq!(wall.gap_center(), 350.0);
        assert_eq!(wall.gap_span(), (300.0, 400.0));
        assert_eq!(wall.gap_type(), GapType::Shortcut);
        assert_eq!(wall.bottom(), 320.0);
    }

    #[test]
    fn test_translate_moves_embedded_power_up() {
        let mut barrier = Barrier::vertical(1, 400.0, 60.0, 1200.0, 0.5, 200.0);
        barrier.power_up = Some(PowerUp::new(9, PowerUpKind::Shield, Vec2::new(430.0, 600.0)));
        barrier.translate_x(-10.0);
        assert_eq!(barrier.pos.x, 390.0);
        assert_eq!(barrier.power_up.as_ref().map(|p| p.pos.x), Some(420.0));
    }

    #[test]
    fn test_grace_period_ends_on_distance() {
        let mut grace = GracePeriod::begin(0.0);
        grace.advance(100.0, 100.0, 1500.0, 150.0);
        assert!(grace.active);
        grace.advance(200.0, 60.0, 1500.0, 150.0);
        assert!(!grace.active);
    }

    #[test]
    fn test_grace_period_ends_on_time() {
        let mut grace = GracePeriod::begin(1000.0);
        grace.advance(2600.0, 0.0, 1500.0, 150.0);
        assert!(!grace.active);
    }

    #[test]
    fn test_entity_ids_reseat() {
        let config = GameConfig::default();
        let mut world = World::new(&config, 1);
        world
            .obstacles
            .push(Barrier::vertical(40, 400.0, 60.0, 1200.0, 0.5, 200.0));
        world.reseat_entity_ids();
        assert_eq!(world.next_entity_id(), 41);
    }
}
