//! Obstacle and wall generation
//!
//! Keeps the field populated a fixed distance ahead of the ball. Vertical
//! obstacles come from the external chunk queue while it lasts, then from
//! the procedural generator. Horizontal walls are laid out in zones
//! (barrier / corridor / maze), each with its own spacing and density.
//!
//! Navigability rules enforced on every placement:
//! - gaps are never narrower than the ball can fit through
//! - walls sharing an X range keep `WALL_THICKNESS + MIN_WALL_SPACING` apart
//! - a wall never seals a vertical obstacle's gap

use glam::Vec2;
use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use serde::{Deserialize, Serialize};

use super::collision::wall_blocks_gap;
use super::state::{
    Barrier, BarrierKind, GameEvent, GapType, ObstacleStyle, PowerUp, PowerUpKind, World,
};
use crate::consts::*;
use crate::error::{PhaseOutcome, SimFault};
use crate::settings::GameConfig;
use crate::theme::{ThemeKey, palette};
use crate::tuning::{DifficultyConfig, difficulty_config};
use crate::{min_gap_width, ranges_overlap};

/// Keep obstacle gaps this far from the top/bottom of the world
const EDGE_MARGIN: f32 = 60.0;
/// Keep walls this far from the top/bottom of the world
const WALL_EDGE_MARGIN: f32 = 40.0;
/// Max shift of the gap center between consecutive obstacles (fraction of height)
const MAX_GAP_SHIFT: f32 = 0.35;
/// Random Y candidates tried before the systematic scan
const RANDOM_Y_ATTEMPTS: usize = 50;
/// Step of the systematic Y scan
const SCAN_STEP: f32 = 20.0;
/// Zone length in viewport widths
const ZONE_VIEWPORTS: f32 = 3.0;
/// Placements allowed per fill pass (guards against runaway loops)
const MAX_PLACEMENTS_PER_FILL: usize = 64;

const POWER_UP_GAP_CHANCE: f32 = 0.15;
const SHORTCUT_GAP_CHANCE: f32 = 0.10;
/// Chance a power-up gap actually carries a power-up
const POWER_UP_GAP_FILL_CHANCE: f32 = 0.5;

/// Zone flavors for horizontal walls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneKind {
    Barrier,
    Corridor,
    Maze,
}

impl ZoneKind {
    pub const ALL: [ZoneKind; 3] = [ZoneKind::Barrier, ZoneKind::Corridor, ZoneKind::Maze];

    /// Scales the difficulty's wall spacing
    pub fn spacing_multiplier(&self) -> f32 {
        match self {
            ZoneKind::Barrier => 1.0,
            ZoneKind::Corridor => 0.75,
            ZoneKind::Maze => 0.5,
        }
    }

    /// Target walls per viewport width
    pub fn density(&self) -> f32 {
        match self {
            ZoneKind::Barrier => 1.0,
            ZoneKind::Corridor => 1.5,
            ZoneKind::Maze => 2.0,
        }
    }

    /// Selection weights for [Barrier, Corridor, Maze]; early levels favor barriers
    pub fn weights_for_level(level: u32) -> [f32; 3] {
        match level {
            0 | 1 => [0.7, 0.2, 0.1],
            2 => [0.5, 0.3, 0.2],
            _ => [0.35, 0.35, 0.3],
        }
    }
}

/// A stretch of walls sharing one layout style
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub kind: ZoneKind,
    pub start_x: f32,
    pub end_x: f32,
    pub walls_placed: u32,
}

impl Zone {
    pub fn target_walls(&self, canvas_width: f32) -> u32 {
        let viewports = (self.end_x - self.start_x) / canvas_width;
        (self.kind.density() * viewports).ceil().max(1.0) as u32
    }
}

/// Generator bookkeeping carried in snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorState {
    /// Last vertical gap center (0..1)
    pub last_gap_y: f32,
    /// Left edge of the newest obstacle
    pub last_obstacle_x: Option<f32>,
    /// Left edge of the newest wall (or the point wall layout has reached)
    pub last_wall_x: Option<f32>,
    pub chunks_consumed: usize,
    pub zone: Option<Zone>,
    /// Next wall gets a level-transition gap
    pub pending_level_transition: bool,
}

impl Default for GeneratorState {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneratorState {
    pub fn new() -> Self {
        Self {
            last_gap_y: 0.5,
            last_obstacle_x: None,
            last_wall_x: None,
            chunks_consumed: 0,
            zone: None,
            pending_level_transition: false,
        }
    }

    /// Shift X bookkeeping along with the scrolled entities
    pub fn scroll(&mut self, dx: f32) {
        if let Some(x) = self.last_obstacle_x.as_mut() {
            *x += dx;
        }
        if let Some(x) = self.last_wall_x.as_mut() {
            *x += dx;
        }
        if let Some(zone) = self.zone.as_mut() {
            zone.start_x += dx;
            zone.end_x += dx;
        }
    }
}

/// Fill in bookkeeping a snapshot didn't carry, from the entities themselves
pub fn recompute_bookkeeping(world: &mut World) {
    if world.generator.last_obstacle_x.is_none() {
        world.generator.last_obstacle_x = world
            .obstacles
            .iter()
            .map(|o| o.left())
            .max_by(f32::total_cmp);
    }
    if world.generator.last_wall_x.is_none() {
        world.generator.last_wall_x = world.walls.iter().map(|w| w.left()).max_by(f32::total_cmp);
    }
    if let Some(last) = world.obstacles.iter().max_by(|a, b| a.left().total_cmp(&b.left()))
        && let BarrierKind::Vertical { gap_y, .. } = last.kind
    {
        world.generator.last_gap_y = gap_y;
    }
}

/// One externally supplied unit of level data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelChunk {
    /// Gap center, fraction of world height
    pub gap_y: f32,
    /// Gap height, fraction of world height
    pub gap_height: f32,
    #[serde(default)]
    pub walls: Vec<ChunkWall>,
    #[serde(default)]
    pub theme: Option<String>,
}

/// Normalized horizontal wall attached to a chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkWall {
    /// Wall top, fraction of world height
    pub y: f32,
    /// Gap center, fraction of wall width
    pub gap_x: f32,
    /// Gap width, fraction of wall width
    pub gap_width: f32,
    #[serde(default)]
    pub gap_type: GapType,
}

fn unit(value: f32) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

impl LevelChunk {
    pub fn validate(&self) -> Result<(), String> {
        if !unit(self.gap_y) {
            return Err(format!("gap_y {} out of range", self.gap_y));
        }
        if !unit(self.gap_height) || self.gap_height == 0.0 {
            return Err(format!("gap_height {} out of range", self.gap_height));
        }
        for (i, wall) in self.walls.iter().enumerate() {
            if !unit(wall.y) || !unit(wall.gap_x) || !unit(wall.gap_width) {
                return Err(format!("wall {} has out-of-range fields", i));
            }
        }
        Ok(())
    }
}

/// Uniform sample that tolerates an empty or inverted range
fn sample_between<R: Rng + ?Sized>(rng: &mut R, lo: f32, hi: f32) -> f32 {
    if hi > lo { rng.random_range(lo..hi) } else { lo }
}

fn weighted_pick<R: Rng + ?Sized>(rng: &mut R, weights: &[f32], what: &str) -> Result<usize, SimFault> {
    let dist = WeightedIndex::new(weights.iter().copied())
        .map_err(|e| SimFault::Generation(format!("{} weights: {}", what, e)))?;
    Ok(dist.sample(rng))
}

/// Top up obstacles and walls so the field reaches the lookahead horizon
pub fn fill_lookahead(world: &mut World, chunks: &[LevelChunk], config: &GameConfig) -> PhaseOutcome {
    let horizon = world.ball.pos.x + config.lookahead_viewports * world.canvas_width;
    let cfg = difficulty_config(world.difficulty);

    let mut placements = 0;
    while world
        .generator
        .last_obstacle_x
        .is_none_or(|x| x < horizon)
        && placements < MAX_PLACEMENTS_PER_FILL
    {
        spawn_obstacle(world, chunks, &cfg)?;
        placements += 1;
    }

    placements = 0;
    while world.generator.last_wall_x.is_none_or(|x| x < horizon)
        && world.walls.len() < MAX_WALLS
        && placements < MAX_PLACEMENTS_PER_FILL
    {
        step_wall_layout(world, &cfg)?;
        placements += 1;
    }

    world.normalize_order();
    Ok(())
}

/// Place the next vertical obstacle, from a chunk if any remain
fn spawn_obstacle(world: &mut World, chunks: &[LevelChunk], cfg: &DifficultyConfig) -> PhaseOutcome {
    let x = match world.generator.last_obstacle_x {
        Some(last) => last + cfg.obstacle_spacing * sample_between(&mut world.rng, 0.9, 1.1),
        None => world.canvas_width,
    };

    if let Some(chunk) = chunks.get(world.generator.chunks_consumed) {
        // Consumed even when invalid so a bad chunk can't wedge the queue
        world.generator.chunks_consumed += 1;
        chunk.validate().map_err(|reason| {
            SimFault::Generation(format!(
                "chunk {} rejected: {}",
                world.generator.chunks_consumed - 1,
                reason
            ))
        })?;
        return spawn_chunk_obstacle(world, chunk, x, cfg);
    }

    spawn_procedural_obstacle(world, x, cfg)
}

fn gap_height_for(world: &World, raw: f32) -> f32 {
    // Shrinks up to 20% as difficulty climbs, never below the floor
    let scale = (1.0 - (world.difficulty - 1.0) * 0.1).clamp(0.8, 1.0);
    (raw * scale)
        .max(MIN_GAP_HEIGHT)
        .max(min_gap_width(world.ball.radius))
}

/// Normalized gap-center bounds keeping the gap off the world edges
fn gap_y_bounds(world_height: f32, gap_height: f32) -> (f32, f32) {
    let margin = (EDGE_MARGIN + gap_height / 2.0) / world_height;
    (margin.min(0.5), (1.0 - margin).max(0.5))
}

fn gap_is_clear(world: &World, candidate: &Barrier) -> bool {
    !world.walls.iter().any(|w| wall_blocks_gap(w, candidate))
}

/// Find a gap center for `barrier` that no existing wall seals
fn settle_gap_y(world: &mut World, barrier: &mut Barrier, preferred: f32) -> PhaseOutcome {
    let BarrierKind::Vertical { gap_height, .. } = barrier.kind else {
        return Ok(());
    };
    let (lo, hi) = gap_y_bounds(barrier.height, gap_height);
    let set = |barrier: &mut Barrier, y: f32| {
        barrier.kind = BarrierKind::Vertical { gap_y: y, gap_height };
    };

    set(barrier, preferred.clamp(lo, hi));
    if gap_is_clear(world, barrier) {
        return Ok(());
    }

    for _ in 0..RANDOM_Y_ATTEMPTS {
        let y = sample_between(&mut world.rng, lo, hi);
        set(barrier, y);
        if gap_is_clear(world, barrier) {
            return Ok(());
        }
    }

    let step = SCAN_STEP / barrier.height;
    let mut y = lo;
    while y <= hi {
        set(barrier, y);
        if gap_is_clear(world, barrier) {
            return Ok(());
        }
        y += step;
    }

    Err(SimFault::Generation(format!(
        "no gap position for obstacle at x={:.0} clears the walls",
        barrier.left()
    )))
}

fn dress_obstacle(world: &mut World, barrier: &mut Barrier, cfg: &DifficultyConfig) -> PhaseOutcome {
    barrier.style = ObstacleStyle::ALL[weighted_pick(&mut world.rng, &cfg.style_weights, "style")?];
    barrier.color = cfg.palette[world.rng.random_range(0..cfg.palette.len())];
    barrier.theme = world.theme;

    if world.rng.random::<f32>() < cfg.power_up_chance {
        let kind = PowerUpKind::ALL[weighted_pick(&mut world.rng, &cfg.power_up_weights, "power-up")?];
        let offset = sample_between(&mut world.rng, -0.25, 0.25) * barrier.gap_size();
        let pos = Vec2::new(barrier.center_x(), barrier.gap_center() + offset);
        let id = world.next_entity_id();
        barrier.power_up = Some(PowerUp::new(id, kind, pos));
    }
    Ok(())
}

fn push_obstacle(world: &mut World, barrier: Barrier) {
    if let BarrierKind::Vertical { gap_y, .. } = barrier.kind {
        world.generator.last_gap_y = gap_y;
    }
    world.generator.last_obstacle_x = Some(barrier.left());
    world.obstacles.push(barrier);
}

fn spawn_procedural_obstacle(world: &mut World, x: f32, cfg: &DifficultyConfig) -> PhaseOutcome {
    let width = sample_between(&mut world.rng, cfg.obstacle_width_min, cfg.obstacle_width_max);
    let raw = sample_between(&mut world.rng, cfg.gap_height_min, cfg.gap_height_max);
    let gap_height = gap_height_for(world, raw);

    let (lo, hi) = gap_y_bounds(world.world_height, gap_height);
    let last = world.generator.last_gap_y;
    let near_lo = (last - MAX_GAP_SHIFT).max(lo);
    let near_hi = (last + MAX_GAP_SHIFT).min(hi);
    let preferred = if near_hi > near_lo {
        sample_between(&mut world.rng, near_lo, near_hi)
    } else {
        sample_between(&mut world.rng, lo, hi)
    };
    if !preferred.is_finite() {
        return Err(SimFault::Generation(format!("bad gap draw {}", preferred)));
    }

    let id = world.next_entity_id();
    let mut barrier = Barrier::vertical(id, x, width, world.world_height, preferred, gap_height);
    settle_gap_y(world, &mut barrier, preferred)?;
    dress_obstacle(world, &mut barrier, cfg)?;
    push_obstacle(world, barrier);
    Ok(())
}

fn spawn_chunk_obstacle(
    world: &mut World,
    chunk: &LevelChunk,
    x: f32,
    cfg: &DifficultyConfig,
) -> PhaseOutcome {
    if let Some(tag) = chunk.theme.as_deref() {
        match ThemeKey::from_tag(tag) {
            Some(theme) => world.theme = theme,
            None => log::debug!("Unknown chunk theme '{}'", tag),
        }
    }

    let width = sample_between(&mut world.rng, cfg.obstacle_width_min, cfg.obstacle_width_max);
    let gap_height = gap_height_for(world, chunk.gap_height * world.world_height);
    let id = world.next_entity_id();
    let mut barrier = Barrier::vertical(id, x, width, world.world_height, chunk.gap_y, gap_height);
    settle_gap_y(world, &mut barrier, chunk.gap_y)?;
    dress_obstacle(world, &mut barrier, cfg)?;
    let obstacle_id = barrier.id;
    push_obstacle(world, barrier);

    for (i, desc) in chunk.walls.iter().enumerate() {
        if world.walls.len() >= MAX_WALLS {
            log::debug!("Wall cap reached, dropping remaining chunk walls");
            break;
        }
        let wall_width = world.canvas_width;
        // Widened gap types can outgrow the wall; cap before centering
        let gap_width = gap_width_for(world, desc.gap_type, desc.gap_width * wall_width).min(wall_width);
        let half = gap_width / 2.0;
        let gap_x = (desc.gap_x * wall_width).clamp(half, wall_width - half);
        let y = desc.y * world.world_height;
        let id = world.next_entity_id();
        let mut wall = Barrier::horizontal(id, x, y, wall_width, WALL_THICKNESS, gap_x, gap_width, desc.gap_type);
        if let BarrierKind::Horizontal { connection, .. } = &mut wall.kind {
            *connection = Some(obstacle_id);
        }
        if !y_fits(world, y) || !wall_fits(world, &wall) {
            log::debug!("Chunk wall {} would break navigability, skipped", i);
            continue;
        }
        if desc.gap_type == GapType::LevelTransition {
            world.emit(GameEvent::LevelTransitionGap);
        }
        dress_wall(world, &mut wall);
        world.generator.last_wall_x = Some(world.generator.last_wall_x.map_or(x, |l| l.max(x)));
        world.walls.push(wall);
    }
    Ok(())
}

fn gap_width_for(world: &World, gap_type: GapType, base: f32) -> f32 {
    let scaled = match gap_type {
        GapType::None => base,
        GapType::PowerUp => base * 0.8,
        GapType::Shortcut => base * 0.65,
        GapType::LevelTransition => base * 1.5,
    };
    scaled.max(min_gap_width(world.ball.radius))
}

fn wall_y_bounds(world: &World) -> (f32, f32) {
    (
        WALL_EDGE_MARGIN,
        world.world_height - WALL_EDGE_MARGIN - WALL_THICKNESS,
    )
}

fn y_fits(world: &World, y: f32) -> bool {
    let (lo, hi) = wall_y_bounds(world);
    y >= lo && y <= hi
}

/// Vertical spacing against every wall sharing an X range
fn spacing_ok(world: &World, wall: &Barrier) -> bool {
    world.walls.iter().all(|other| {
        !ranges_overlap(wall.left(), wall.right(), other.left(), other.right())
            || (wall.top() - other.top()).abs() >= WALL_THICKNESS + MIN_WALL_SPACING
    })
}

fn blocks_any_gap(world: &World, wall: &Barrier) -> bool {
    world.obstacles.iter().any(|o| wall_blocks_gap(wall, o))
}

fn wall_fits(world: &World, wall: &Barrier) -> bool {
    spacing_ok(world, wall) && !blocks_any_gap(world, wall)
}

/// Smallest vertical distance to an overlapping wall (infinite if none)
fn clearance(world: &World, wall: &Barrier) -> f32 {
    world
        .walls
        .iter()
        .filter(|o| ranges_overlap(wall.left(), wall.right(), o.left(), o.right()))
        .map(|o| (wall.top() - o.top()).abs())
        .fold(f32::INFINITY, f32::min)
}

/// Search for a wall Y: preferred, then random tries, then a scan
fn find_wall_y(world: &mut World, wall: &mut Barrier, preferred: Option<f32>) -> Option<f32> {
    if let Some(y) = preferred.filter(|y| y_fits(world, *y)) {
        wall.pos.y = y;
        if wall_fits(world, wall) {
            return Some(y);
        }
    }

    let (lo, hi) = wall_y_bounds(world);
    for _ in 0..RANDOM_Y_ATTEMPTS {
        wall.pos.y = sample_between(&mut world.rng, lo, hi);
        if wall_fits(world, wall) {
            return Some(wall.pos.y);
        }
    }

    scan_wall_y(world, wall)
}

/// Fixed-step scan keeping the fitting Y with the most room to other walls
fn scan_wall_y(world: &World, wall: &mut Barrier) -> Option<f32> {
    let (lo, hi) = wall_y_bounds(world);
    let mut best: Option<(f32, f32)> = None;
    let mut y = lo;
    while y <= hi {
        wall.pos.y = y;
        if wall_fits(world, wall) {
            let score = clearance(world, wall);
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((y, score));
            }
        }
        y += SCAN_STEP;
    }
    best.map(|(y, _)| {
        wall.pos.y = y;
        y
    })
}

/// Advance wall layout by one placement attempt
fn step_wall_layout(world: &mut World, cfg: &DifficultyConfig) -> PhaseOutcome {
    let next_x = match world.generator.last_wall_x {
        Some(last) => {
            let multiplier = world
                .generator
                .zone
                .as_ref()
                .map_or(1.0, |z| z.kind.spacing_multiplier());
            last + cfg.wall_spacing * multiplier * sample_between(&mut world.rng, 0.85, 1.15)
        }
        None => world.canvas_width,
    };

    let zone_done = match world.generator.zone.as_ref() {
        Some(zone) => next_x >= zone.end_x || zone.walls_placed >= zone.target_walls(world.canvas_width),
        None => true,
    };
    if zone_done {
        let start_x = match world.generator.zone.as_ref() {
            Some(zone) if zone.walls_placed >= zone.target_walls(world.canvas_width) => {
                next_x.max(zone.end_x)
            }
            _ => next_x,
        };
        let weights = ZoneKind::weights_for_level(world.level);
        let kind = ZoneKind::ALL[weighted_pick(&mut world.rng, &weights, "zone")?];
        log::debug!("New {:?} zone at x={:.0}", kind, start_x);
        world.generator.zone = Some(Zone {
            kind,
            start_x,
            end_x: start_x + ZONE_VIEWPORTS * world.canvas_width,
            walls_placed: 0,
        });
        if start_x > next_x {
            // Density quota met: jump layout to the new zone
            world.generator.last_wall_x = Some(start_x);
            return Ok(());
        }
    }

    place_zone_wall(world, next_x, cfg)
}

fn roll_gap_type(world: &mut World) -> GapType {
    if world.generator.pending_level_transition {
        world.generator.pending_level_transition = false;
        return GapType::LevelTransition;
    }
    let roll = world.rng.random::<f32>();
    if roll < POWER_UP_GAP_CHANCE {
        GapType::PowerUp
    } else if roll < POWER_UP_GAP_CHANCE + SHORTCUT_GAP_CHANCE {
        GapType::Shortcut
    } else {
        GapType::None
    }
}

fn dress_wall(world: &mut World, wall: &mut Barrier) {
    wall.color = palette(world.theme).wall;
    wall.theme = world.theme;
    if wall.gap_type() == GapType::PowerUp
        && wall.power_up.is_none()
        && world.rng.random::<f32>() < POWER_UP_GAP_FILL_CHANCE
    {
        let kind = PowerUpKind::ALL[world.rng.random_range(0..PowerUpKind::ALL.len())];
        let pos = Vec2::new(wall.gap_center(), wall.top() + wall.height / 2.0);
        let id = world.next_entity_id();
        wall.power_up = Some(PowerUp::new(id, kind, pos));
    }
}

/// Obstacle the wall should try to line up with: the first one under its left half
fn alignment_target(world: &World, wall: &Barrier) -> Option<(u32, f32, f32)> {
    world
        .obstacles
        .iter()
        .filter(|o| o.left() >= wall.left() && o.left() < wall.left() + wall.width / 2.0)
        .min_by(|a, b| a.left().total_cmp(&b.left()))
        .map(|o| {
            let (top, bottom) = o.gap_span();
            (o.id, top, bottom)
        })
}

fn place_zone_wall(world: &mut World, x: f32, cfg: &DifficultyConfig) -> PhaseOutcome {
    let wall_width = world.canvas_width;
    let gap_type = roll_gap_type(world);
    let base = sample_between(&mut world.rng, cfg.wall_gap_min, cfg.wall_gap_max);
    let gap_width = gap_width_for(world, gap_type, base);
    let margin = gap_width / 2.0 + 20.0;
    let gap_x = sample_between(&mut world.rng, margin, wall_width - margin);

    let id = world.next_entity_id();
    let mut wall = Barrier::horizontal(id, x, 0.0, wall_width, WALL_THICKNESS, gap_x, gap_width, gap_type);

    // Seamless connection: sit the wall on the edge of a nearby obstacle's gap
    let mut connection = None;
    let mut preferred = None;
    if let Some((obstacle_id, top, bottom)) = alignment_target(world, &wall) {
        let y = if world.rng.random_bool(0.5) {
            top - WALL_THICKNESS
        } else {
            bottom
        };
        preferred = Some(y);
        connection = Some((obstacle_id, y));
    }

    let placed = match find_wall_y(world, &mut wall, preferred) {
        Some(y) => {
            if let Some((obstacle_id, aligned_y)) = connection
                && aligned_y == y
                && let BarrierKind::Horizontal { connection: link, .. } = &mut wall.kind
            {
                *link = Some(obstacle_id);
            }
            true
        }
        None => {
            let zone_empty = world.generator.zone.as_ref().is_none_or(|z| z.walls_placed == 0);
            zone_empty && place_emergency_wall(world, &mut wall)
        }
    };

    world.generator.last_wall_x = Some(x);
    if !placed {
        log::debug!("No safe Y for wall at x={:.0}, skipped", x);
        if gap_type == GapType::LevelTransition {
            world.generator.pending_level_transition = true;
        }
        return Ok(());
    }

    if gap_type == GapType::LevelTransition {
        world.emit(GameEvent::LevelTransitionGap);
    }
    dress_wall(world, &mut wall);
    if let Some(zone) = world.generator.zone.as_mut() {
        zone.walls_placed += 1;
    }
    world.walls.push(wall);
    Ok(())
}

/// Force a wall into an empty zone, opening its gap over the nearest obstacle
fn place_emergency_wall(world: &mut World, wall: &mut Barrier) -> bool {
    let nearest = world
        .obstacles
        .iter()
        .filter(|o| ranges_overlap(wall.left(), wall.right(), o.left(), o.right()))
        .min_by(|a, b| a.left().total_cmp(&b.left()))
        .map(|o| (o.center_x(), o.width));

    if let Some((center_x, obstacle_width)) = nearest
        && let BarrierKind::Horizontal { gap_x, gap_width, .. } = &mut wall.kind
    {
        *gap_width = gap_width.max(obstacle_width + 4.0 * world.ball.radius);
        *gap_x = center_x - wall.pos.x;
    }

    let (lo, hi) = wall_y_bounds(world);
    let mut best: Option<(f32, f32)> = None;
    let mut y = lo;
    while y <= hi {
        wall.pos.y = y;
        if wall_fits(world, wall) {
            // Prefer the middle of the world when nothing else separates candidates
            let score = clearance(world, wall).min(world.world_height)
                - (y - world.world_height / 2.0).abs() * 0.01;
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((y, score));
            }
        }
        y += SCAN_STEP;
    }

    match best {
        Some((y, _)) => {
            wall.pos.y = y;
            log::info!("Emergency wall placed at x={:.0}, y={:.0}", wall.pos.x, y);
            true
        }
        None => {
            log::warn!("Emergency wall at x={:.0} found no safe position", wall.pos.x);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::World;
    use proptest::prelude::*;

    fn world(seed: u64) -> World {
        World::new(&GameConfig::default(), seed)
    }

    fn check_invariants(world: &World) {
        let min_width = min_gap_width(world.ball.radius);
        for o in &world.obstacles {
            assert!(o.gap_size() >= MIN_GAP_HEIGHT, "gap height {}", o.gap_size());
            assert!(o.gap_size() >= min_width);
        }
        for w in &world.walls {
            assert!(w.gap_size() >= min_width, "gap width {}", w.gap_size());
            for o in &world.obstacles {
                assert!(!wall_blocks_gap(w, o), "wall {} blocks obstacle {}", w.id, o.id);
            }
        }
        for (i, a) in world.walls.iter().enumerate() {
            for b in world.walls.iter().skip(i + 1) {
                if ranges_overlap(a.left(), a.right(), b.left(), b.right()) {
                    assert!(
                        (a.top() - b.top()).abs() >= WALL_THICKNESS + MIN_WALL_SPACING,
                        "walls {} and {} too close",
                        a.id,
                        b.id
                    );
                }
            }
        }
    }

    #[test]
    fn test_fill_reaches_horizon() {
        let config = GameConfig::default();
        let mut world = world(1);
        fill_lookahead(&mut world, &[], &config).unwrap();
        let horizon = world.ball.pos.x + 2.0 * world.canvas_width;
        assert!(world.generator.last_obstacle_x.unwrap() >= horizon);
        assert!(!world.obstacles.is_empty());
        assert!(!world.walls.is_empty());
        assert!(world.obstacles[0].left() >= world.canvas_width);
        check_invariants(&world);
    }

    #[test]
    fn test_chunks_consumed_in_order() {
        let config = GameConfig::default();
        let mut world = world(2);
        let chunks = vec![
            LevelChunk {
                gap_y: 0.3,
                gap_height: 0.2,
                walls: vec![],
                theme: Some("neon".into()),
            },
            LevelChunk {
                gap_y: 0.7,
                gap_height: 0.2,
                walls: vec![],
                theme: None,
            },
        ];
        fill_lookahead(&mut world, &chunks, &config).unwrap();
        assert_eq!(world.generator.chunks_consumed, 2);
        assert_eq!(world.theme, ThemeKey::Neon);
        let first = &world.obstacles[0];
        assert!(matches!(first.kind, BarrierKind::Vertical { gap_y, .. } if gap_y == 0.3));
        let second = &world.obstacles[1];
        assert!(matches!(second.kind, BarrierKind::Vertical { gap_y, .. } if gap_y == 0.7));
        // Supply ran out, the rest is procedural
        assert!(world.obstacles.len() > 2);
    }

    #[test]
    fn test_bad_chunk_is_skipped_and_retried() {
        let config = GameConfig::default();
        let mut world = world(3);
        let chunks = vec![LevelChunk {
            gap_y: f32::NAN,
            gap_height: 0.2,
            walls: vec![],
            theme: None,
        }];
        assert!(fill_lookahead(&mut world, &chunks, &config).is_err());
        assert_eq!(world.generator.chunks_consumed, 1);
        // Next attempt falls back to procedural generation
        assert!(fill_lookahead(&mut world, &chunks, &config).is_ok());
        assert!(!world.obstacles.is_empty());
    }

    #[test]
    fn test_chunk_wall_connects() {
        let config = GameConfig::default();
        let mut world = world(4);
        let chunks = vec![LevelChunk {
            gap_y: 0.5,
            gap_height: 0.15,
            walls: vec![ChunkWall {
                y: 0.1,
                gap_x: 0.5,
                gap_width: 0.2,
                gap_type: GapType::Shortcut,
            }],
            theme: None,
        }];
        fill_lookahead(&mut world, &chunks, &config).unwrap();
        let obstacle_id = world.obstacles[0].id;
        assert!(world
            .walls
            .iter()
            .any(|w| w.connection() == Some(obstacle_id) && w.gap_type() == GapType::Shortcut));
        check_invariants(&world);
    }

    #[test]
    fn test_recompute_bookkeeping() {
        let config = GameConfig::default();
        let mut world = world(5);
        fill_lookahead(&mut world, &[], &config).unwrap();
        let obstacle_x = world.generator.last_obstacle_x;
        let wall_x = world.walls.iter().map(|w| w.left()).max_by(f32::total_cmp);
        world.generator.last_obstacle_x = None;
        world.generator.last_wall_x = None;
        recompute_bookkeeping(&mut world);
        assert_eq!(world.generator.last_obstacle_x, obstacle_x);
        assert_eq!(world.generator.last_wall_x, wall_x);
    }

    #[test]
    fn test_level_transition_gap_is_wide() {
        let config = GameConfig::default();
        let mut world = world(6);
        world.generator.pending_level_transition = true;
        fill_lookahead(&mut world, &[], &config).unwrap();
        let transition = world
            .walls
            .iter()
            .find(|w| w.gap_type() == GapType::LevelTransition);
        if let Some(wall) = transition {
            assert!(wall.gap_size() >= difficulty_config(1.0).wall_gap_min * 1.5);
        } else {
            // Placement skipped; the flag carries over to the next wall
            assert!(world.generator.pending_level_transition);
        }
    }

    #[test]
    fn test_zone_weights_favor_barrier_early() {
        let w = ZoneKind::weights_for_level(1);
        assert!(w[0] > w[1] && w[0] > w[2]);
    }

    #[test]
    fn test_wide_transition_chunk_wall_fits_canvas() {
        let config = GameConfig::default();
        let mut world = world(7);
        let chunks: Vec<LevelChunk> = serde_json::from_str(
            r#"[{"gap_y": 0.5, "gap_height": 0.15,
                 "walls": [{"y": 0.1, "gap_x": 0.5, "gap_width": 0.8, "gap_type": "level-transition"}]}]"#,
        )
        .unwrap();
        assert!(chunks[0].validate().is_ok());
        fill_lookahead(&mut world, &chunks, &config).unwrap();

        let wall = world
            .walls
            .iter()
            .find(|w| w.gap_type() == GapType::LevelTransition)
            .expect("transition wall placed");
        assert_eq!(wall.gap_size(), world.canvas_width);
        let (start, end) = wall.gap_span();
        assert!(start >= wall.left() && end <= wall.right());
        check_invariants(&world);
    }

    fn plain_wall(world: &mut World, x: f32, y: f32, width: f32, gap_x: f32) -> Barrier {
        let id = world.next_entity_id();
        Barrier::horizontal(id, x, y, width, WALL_THICKNESS, gap_x, 60.0, GapType::None)
    }

    #[test]
    fn test_scan_takes_roomiest_fit() {
        let mut world = world(8);
        let x = world.canvas_width;
        // Fits at 40 (320 clear) and across 680..=800; 740 is 380 from both
        let upper = plain_wall(&mut world, x, 360.0, 800.0, 700.0);
        let lower = plain_wall(&mut world, x, 1120.0, 800.0, 700.0);
        // No X overlap, so it doesn't count against spacing
        let far = plain_wall(&mut world, x + 2000.0, 740.0, 800.0, 700.0);
        world.walls.extend([upper, lower, far]);

        let mut wall = plain_wall(&mut world, x, 0.0, 800.0, 400.0);
        assert_eq!(scan_wall_y(&world, &mut wall), Some(740.0));
        assert_eq!(wall.top(), 740.0);
    }

    #[test]
    fn test_wall_search_falls_back_to_scan() {
        let mut world = world(9);
        let x = world.canvas_width;
        // Exactly one legal Y (600) remains between these two
        let upper = plain_wall(&mut world, x, 280.0, 800.0, 700.0);
        let lower = plain_wall(&mut world, x, 920.0, 800.0, 700.0);
        world.walls.extend([upper, lower]);

        let mut wall = plain_wall(&mut world, x, 0.0, 800.0, 400.0);
        assert_eq!(find_wall_y(&mut world, &mut wall, None), Some(600.0));
        world.walls.push(wall);
        check_invariants(&world);
    }

    /// Obstacle whose gap spans the full height, so any wall crossing it
    /// without a matching opening seals it
    fn open_column(world: &mut World, x: f32) {
        let id = world.next_entity_id();
        let height = world.world_height;
        world
            .obstacles
            .push(Barrier::vertical(id, x, 60.0, height, 0.5, height));
    }

    #[test]
    fn test_emergency_wall_opens_over_nearest_obstacle() {
        let mut world = world(10);
        let x = world.canvas_width;
        open_column(&mut world, x + 100.0);

        let mut wall = plain_wall(&mut world, x, 0.0, 800.0, 700.0);
        assert_eq!(find_wall_y(&mut world, &mut wall, None), None);
        assert!(place_emergency_wall(&mut world, &mut wall));

        let obstacle = &world.obstacles[0];
        let (start, end) = wall.gap_span();
        assert!(start <= obstacle.left() && end >= obstacle.right());
        assert!(wall.gap_size() >= obstacle.width + 4.0 * world.ball.radius);
        // Nothing else around: settles mid-world
        assert_eq!(wall.top(), 600.0);
        world.walls.push(wall);
        check_invariants(&world);
    }

    #[test]
    fn test_empty_zone_always_gets_a_wall() {
        let cfg = difficulty_config(1.0);
        let mut world = world(11);
        let x = world.canvas_width;
        open_column(&mut world, x + 100.0);
        world.generator.zone = Some(Zone {
            kind: ZoneKind::Barrier,
            start_x: x,
            end_x: x + ZONE_VIEWPORTS * world.canvas_width,
            walls_placed: 0,
        });

        place_zone_wall(&mut world, x, &cfg).unwrap();
        assert_eq!(world.walls.len(), 1);
        assert_eq!(world.generator.zone.as_ref().unwrap().walls_placed, 1);
        let (start, end) = world.walls[0].gap_span();
        let obstacle = &world.obstacles[0];
        assert!(start <= obstacle.left() && end >= obstacle.right());
        check_invariants(&world);
    }

    #[test]
    fn test_sealed_obstacle_is_not_committed() {
        let cfg = difficulty_config(1.0);
        let mut world = world(12);
        let x = world.canvas_width;
        // Bands every 100 px leave no 120 px stretch for a gap
        for i in 0..12 {
            let wall = plain_wall(&mut world, x - 200.0, i as f32 * 100.0, 1200.0, 1150.0);
            world.walls.push(wall);
        }

        let result = spawn_obstacle(&mut world, &[], &cfg);
        assert!(matches!(result, Err(SimFault::Generation(_))));
        assert!(world.obstacles.is_empty());
        assert_eq!(world.generator.last_obstacle_x, None);

        let chunks = vec![LevelChunk {
            gap_y: 0.5,
            gap_height: 0.2,
            walls: vec![],
            theme: None,
        }];
        assert!(spawn_obstacle(&mut world, &chunks, &cfg).is_err());
        assert!(world.obstacles.is_empty());
        assert_eq!(world.generator.chunks_consumed, 1);
    }

    fn scroll_world(world: &mut World, dx: f32) {
        for o in world.obstacles.iter_mut() {
            o.translate_x(dx);
        }
        for w in world.walls.iter_mut() {
            w.translate_x(dx);
        }
        world.generator.scroll(dx);
        world.obstacles.retain(|o| o.right() >= 0.0);
        world
            .walls
            .retain(|w| w.right() >= -WALL_CULL_DISTANCE);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn prop_generated_field_is_navigable(seed in any::<u64>(), difficulty in 1.0f32..5.0, level in 1u32..5) {
            let config = GameConfig::default();
            let mut world = world(seed);
            world.difficulty = difficulty;
            world.level = level;
            for _ in 0..6 {
                fill_lookahead(&mut world, &[], &config).unwrap();
                check_invariants(&world);
                scroll_world(&mut world, -450.0);
            }
        }
    }
}
