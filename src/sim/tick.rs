//! Per-frame simulation step
//!
//! Runs the update sub-phases in a fixed order: physics, scroll and cull,
//! camera, collisions, passage scoring, power-ups, timers, generation.
//! Each sub-phase reports its own [`PhaseOutcome`]; recoverable faults are
//! logged and collected in the [`TickReport`], fatal ones end the tick.

use super::collision::{ball_hits_barrier, ball_out_of_bounds, check_gap_passage};
use super::events::{event_speed_factor, update_random_events};
use super::generator::{LevelChunk, fill_lookahead};
use super::powerups::{discard_offscreen, in_magnet_range, move_power_ups};
use super::state::{GameEvent, GapType, PassQuality, World};
use super::style::{ComboKind, StyleAward, StyleNotification};
use crate::consts::*;
use crate::error::{PhaseOutcome, SimFault};
use crate::settings::GameConfig;
use crate::theme::random_theme;
use crate::tuning::{difficulty_for_score, level_for_difficulty};

/// Camera easing factor per baseline frame
const CAMERA_EASE: f32 = 0.1;
/// Survival points are paid per this much play time
const SURVIVAL_INTERVAL_MS: f64 = 1000.0;

/// Input for a single tick
#[derive(Debug, Clone, Copy, Default)]
pub struct TickInput<'a> {
    /// Elapsed time in baseline frames, already clamped
    pub dt: f32,
    pub tap: bool,
    /// External chunk queue (the generator tracks how many it consumed)
    pub chunks: &'a [LevelChunk],
}

/// What a tick did, for the scheduler
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// A lethal collision got past every rescue layer
    pub game_over: bool,
    pub score_changed: bool,
    pub level_up: Option<u32>,
    /// Recoverable faults, already logged
    pub faults: Vec<SimFault>,
}

impl TickReport {
    fn record(&mut self, outcome: PhaseOutcome) -> PhaseOutcome {
        match outcome {
            Ok(()) => Ok(()),
            Err(fault) if fault.is_fatal() => Err(fault),
            Err(fault) => {
                log::warn!("{}", fault);
                self.faults.push(fault);
                Ok(())
            }
        }
    }
}

/// Outcome of the collision phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionOutcome {
    Clear,
    Rescued,
    Lethal,
}

/// Convert a raw frame delta into baseline frames, clamped to [0, 5]
pub fn normalize_delta(delta_ms: f64) -> f32 {
    if !delta_ms.is_finite() {
        return 0.0;
    }
    ((delta_ms / BASELINE_FRAME_MS) as f32).clamp(0.0, MAX_DELTA_FRAMES)
}

/// Advance the world by one frame
pub fn tick(world: &mut World, input: &TickInput, config: &GameConfig) -> Result<TickReport, SimFault> {
    let mut report = TickReport::default();
    let dt = input.dt.clamp(0.0, MAX_DELTA_FRAMES);
    let score_before = world.score;
    world.time_ms += dt as f64 * BASELINE_FRAME_MS;

    report.record(integrate_physics(world, input.tap, dt, config))?;
    let scroll_dx = scroll_and_cull(world, dt, config);
    report.record(update_camera(world, dt))?;

    if resolve_collisions(world, config) == CollisionOutcome::Lethal {
        report.game_over = true;
        report.score_changed = world.score != score_before;
        return Ok(report);
    }

    score_passages(world, scroll_dx);
    collect_power_ups(world);

    // Timed effects, style decay, combo timeouts
    world
        .effects
        .expire(&mut world.ball, world.time_ms, &mut world.events);
    if let Some(notification) = world.style.update(world.time_ms) {
        notify_style(world, notification);
    }
    world.combos.update(world.time_ms);
    update_random_events(world, config);
    award_survival(world);
    report.level_up = update_difficulty(world, config);

    report.record(fill_lookahead(world, input.chunks, config))?;

    report.score_changed = world.score != score_before;
    Ok(report)
}

/// Gravity, tap impulse and vertical integration
fn integrate_physics(world: &mut World, tap: bool, dt: f32, config: &GameConfig) -> PhaseOutcome {
    let ball = &mut world.ball;
    ball.prev_pos = ball.pos;

    let up = -ball.gravity_scale.signum();
    if tap {
        // Impulse always opposes gravity
        ball.vel.y = up * config.tap_impulse;
    }
    ball.vel.y += config.gravity * ball.gravity_scale * dt;
    ball.vel.y = ball.vel.y.clamp(-config.max_fall_speed, config.max_fall_speed);
    ball.vel.x = 0.0;
    ball.pos.y += ball.vel.y * dt;

    if tap {
        world.emit(GameEvent::Tap);
    }

    if world.ball.is_finite() {
        return Ok(());
    }
    let bad = world.ball.pos;
    world.ball.reset_to(world.spawn);
    if !world.ball.is_finite() {
        return Err(SimFault::Invariant(format!("spawn point {} is not finite", world.spawn)));
    }
    Err(SimFault::Physics(format!("ball left the number line at {}, reset to spawn", bad)))
}

/// Current scroll speed in px per baseline frame
pub fn scroll_speed(world: &World, config: &GameConfig) -> f32 {
    config.base_scroll_speed
        * world.difficulty
        * world.effects.speed_factor(world.time_ms)
        * event_speed_factor(&world.random_events)
}

/// Move everything left and drop what left the screen; returns the X delta
fn scroll_and_cull(world: &mut World, dt: f32, config: &GameConfig) -> f32 {
    world.scroll_speed = scroll_speed(world, config);
    let dx = -world.scroll_speed * dt;

    for barrier in world.obstacles.iter_mut().chain(world.walls.iter_mut()) {
        barrier.translate_x(dx);
    }
    world.generator.scroll(dx);

    let magnet = world.effects.magnet(world.time_ms);
    move_power_ups(&mut world.power_ups, &world.ball, dx, magnet, dt);
    discard_offscreen(&mut world.power_ups);

    // Single deferred removal pass per collection
    world.obstacles.retain(|o| o.right() >= 0.0);
    world.walls.retain(|w| w.right() >= -WALL_CULL_DISTANCE);
    world.power_ups.retain(|p| !p.collected);

    world.grace.advance(
        world.time_ms,
        dx,
        config.grace_duration_ms,
        config.grace_min_distance,
    );
    dx
}

/// Ease the camera toward the ball, clamped to the world
fn update_camera(world: &mut World, dt: f32) -> PhaseOutcome {
    let max_offset = (world.world_height - world.canvas_height).max(0.0);
    let target = (world.ball.pos.y - world.canvas_height / 2.0).clamp(0.0, max_offset);
    let t = (CAMERA_EASE * dt).min(1.0);
    world.camera_y = crate::lerp(world.camera_y, target, t).clamp(0.0, max_offset);

    if world.camera_y.is_finite() {
        Ok(())
    } else {
        world.camera_y = 0.0;
        Err(SimFault::Camera("camera offset not finite, zeroed".into()))
    }
}

fn clamp_into_world(world: &mut World) {
    let r = world.ball.radius;
    world.ball.pos.y = world.ball.pos.y.clamp(r, world.world_height - r);
    world.ball.vel.y = 0.0;
}

/// Hit tests plus the extra-time / shield rescue layers
pub fn resolve_collisions(world: &mut World, config: &GameConfig) -> CollisionOutcome {
    let out_of_bounds = ball_out_of_bounds(&world.ball, world.world_height);
    if world.grace.active {
        if out_of_bounds {
            clamp_into_world(world);
        }
        return CollisionOutcome::Clear;
    }

    let hit_barrier = !world.effects.invulnerable(world.time_ms)
        && world
            .obstacles
            .iter()
            .chain(world.walls.iter())
            .any(|b| ball_hits_barrier(&world.ball, b));
    if !hit_barrier && !out_of_bounds {
        return CollisionOutcome::Clear;
    }
    if out_of_bounds && !hit_barrier && world.effects.invulnerable(world.time_ms) {
        clamp_into_world(world);
        return CollisionOutcome::Clear;
    }

    world.emit(GameEvent::Collision);
    let now = world.time_ms;

    if world.effects.extra_time_ms > 0.0 {
        log::info!("Collision absorbed by {:.0}ms of extra time", world.effects.extra_time_ms);
        world.effects.extra_time_ms = 0.0;
        world.emit(GameEvent::ExtraTimeUsed);
    } else if world.effects.shields > 0 {
        world.effects.shields -= 1;
        log::info!("Collision absorbed by shield ({} left)", world.effects.shields);
        let remaining = world.effects.shields;
        world.emit(GameEvent::ShieldUsed { remaining });
    } else {
        return CollisionOutcome::Lethal;
    }

    if let Some(notification) = world.style.register_collision(now) {
        notify_style(world, notification);
    }
    world.combos.reset_all();
    world.effects.invulnerable_until = Some(now + config.rescue_invulnerability_ms);
    if out_of_bounds {
        clamp_into_world(world);
    }
    CollisionOutcome::Rescued
}

fn notify_style(world: &mut World, notification: StyleNotification) {
    world.emit(GameEvent::StyleLevelChanged {
        level: notification.level,
        rising: notification.rising,
    });
}

/// Combo channel and style award for a passage grade
fn skill_for(quality: PassQuality) -> (ComboKind, StyleAward) {
    match quality {
        PassQuality::Perfect => (ComboKind::Gap, StyleAward::PerfectGap),
        PassQuality::CloseCall => (ComboKind::CloseCall, StyleAward::CloseCall),
        PassQuality::Plain => (ComboKind::Gap, StyleAward::NoHit),
    }
}

fn register_skill(world: &mut World, quality: PassQuality) {
    let (combo, award) = skill_for(quality);
    let now = world.time_ms;
    world.combos.register(combo, now);
    if let Some(notification) = world.style.award(award, now) {
        notify_style(world, notification);
    }
}

/// Score every barrier whose gap the ball just cleared
fn score_passages(world: &mut World, scroll_dx: f32) {
    for i in 0..world.obstacles.len() {
        let obstacle = &world.obstacles[i];
        if obstacle.passed || world.ball.pos.x <= obstacle.right() {
            continue;
        }
        let quality = check_gap_passage(&world.ball, obstacle, scroll_dx);
        world.obstacles[i].passed = true;
        let Some(quality) = quality else {
            continue;
        };
        register_skill(world, quality);
        let base = OBSTACLE_PASS_SCORE
            + if quality == PassQuality::Perfect {
                PERFECT_BONUS
            } else {
                0.0
            };
        let points = world.award(base);
        world.emit(GameEvent::ObstaclePassed { quality, points });
    }

    for i in 0..world.walls.len() {
        let Some(quality) = check_gap_passage(&world.ball, &world.walls[i], scroll_dx) else {
            continue;
        };
        world.walls[i].passed = true;
        let gap_type = world.walls[i].gap_type();
        register_skill(world, quality);
        let base = WALL_PASS_SCORE
            + match gap_type {
                GapType::Shortcut => SHORTCUT_BONUS,
                _ => 0.0,
            };
        let points = world.award(base);
        world.emit(GameEvent::WallPassed {
            quality,
            gap_type,
            points,
        });
    }
}

/// Pick up touching power-ups; a magnet frees embedded ones first
fn collect_power_ups(world: &mut World) {
    let now = world.time_ms;
    let magnet = world.effects.magnet(now);
    let ball_pos = world.ball.pos;

    let mut loose = Vec::new();
    for barrier in world.obstacles.iter_mut().chain(world.walls.iter_mut()) {
        let take = barrier
            .power_up
            .as_ref()
            .is_some_and(|p| p.touches(&world.ball) || (magnet && in_magnet_range(p, ball_pos)));
        if take && let Some(power_up) = barrier.power_up.take() {
            loose.push(power_up);
        }
    }
    world.power_ups.extend(loose);

    let touched: Vec<usize> = world
        .power_ups
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.collected && p.touches(&world.ball))
        .map(|(i, _)| i)
        .collect();
    for i in touched {
        world.power_ups[i].collected = true;
        let kind = world.power_ups[i].kind;
        if let Some(bonus) = world.effects.apply(kind, &mut world.ball, now) {
            world.award(bonus);
        }
        world.combos.register(ComboKind::PowerUp, now);
        if let Some(notification) = world.style.award(StyleAward::PowerUp, now) {
            notify_style(world, notification);
        }
        log::debug!("Collected {:?}", kind);
        world.emit(GameEvent::PowerUpCollected(kind));
    }
    world.power_ups.retain(|p| !p.collected);
}

/// One survival point per full second of play
fn award_survival(world: &mut World) {
    while world.time_ms - world.survival_clock_ms >= SURVIVAL_INTERVAL_MS {
        world.survival_clock_ms += SURVIVAL_INTERVAL_MS;
        world.award(SURVIVAL_SCORE);
    }
}

/// Recompute difficulty from score; returns the new level on a level-up
fn update_difficulty(world: &mut World, config: &GameConfig) -> Option<u32> {
    world.difficulty = difficulty_for_score(world.score, config.difficulty_score_step, config.max_difficulty);
    let level = level_for_difficulty(world.difficulty);
    if level <= world.level {
        return None;
    }
    world.level = level;
    world.generator.pending_level_transition = true;
    world.theme = random_theme(&mut world.rng, world.theme);
    log::info!(
        "Level {} (difficulty {:.2}, theme {})",
        level,
        world.difficulty,
        world.theme.as_str()
    );
    world.emit(GameEvent::LevelUp(level));
    Some(level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::{Barrier, GracePeriod, PowerUp, PowerUpKind};
    use glam::Vec2;

    fn setup() -> (World, GameConfig) {
        let config = GameConfig::default();
        let world = World::new(&config, 7);
        (world, config)
    }

    fn step(world: &mut World, config: &GameConfig, tap: bool) -> TickReport {
        let input = TickInput {
            dt: 1.0,
            tap,
            chunks: &[],
        };
        tick(world, &input, config).unwrap()
    }

    /// Obstacle sitting on the ball with its gap far below
    fn blocking_obstacle(world: &mut World) {
        let id = world.next_entity_id();
        let height = world.world_height;
        world
            .obstacles
            .insert(0, Barrier::vertical(id, 80.0, 60.0, height, 0.9, 150.0));
    }

    #[test]
    fn test_normalize_delta() {
        assert_eq!(normalize_delta(BASELINE_FRAME_MS), 1.0);
        assert_eq!(normalize_delta(-5.0), 0.0);
        assert_eq!(normalize_delta(10_000.0), MAX_DELTA_FRAMES);
        assert_eq!(normalize_delta(f64::NAN), 0.0);
    }

    #[test]
    fn test_tap_impulse_and_gravity() {
        let (mut world, config) = setup();
        step(&mut world, &config, true);
        assert_eq!(world.ball.vel.y, -config.tap_impulse + config.gravity);
        assert!(world.ball.pos.y < config.ball_spawn_y);

        let (mut world, config) = setup();
        step(&mut world, &config, false);
        assert_eq!(world.ball.vel.y, config.gravity);
        assert!(world
            .drain_events()
            .iter()
            .all(|e| *e != GameEvent::Tap));
    }

    #[test]
    fn test_fall_speed_clamped() {
        let (mut world, config) = setup();
        world.ball.vel.y = 100.0;
        step(&mut world, &config, false);
        assert_eq!(world.ball.vel.y, config.max_fall_speed);
    }

    #[test]
    fn test_non_finite_ball_resets() {
        let (mut world, config) = setup();
        world.ball.vel.y = f32::NAN;
        let report = step(&mut world, &config, false);
        assert_eq!(world.ball.pos, world.spawn);
        assert!(matches!(report.faults.as_slice(), [SimFault::Physics(_)]));
    }

    #[test]
    fn test_scroll_moves_barriers() {
        let (mut world, config) = setup();
        step(&mut world, &config, false);
        let x = world.obstacles[0].pos.x;
        step(&mut world, &config, false);
        assert_eq!(world.obstacles[0].pos.x, x - config.base_scroll_speed);
    }

    #[test]
    fn test_shield_absorbs_collision() {
        let (mut world, config) = setup();
        world.effects.shields = 2;
        blocking_obstacle(&mut world);
        let report = step(&mut world, &config, false);
        assert!(!report.game_over);
        assert_eq!(world.effects.shields, 1);
        // Invulnerable afterwards, the same obstacle doesn't cost another shield
        step(&mut world, &config, false);
        assert_eq!(world.effects.shields, 1);
    }

    #[test]
    fn test_extra_time_consumed_before_shield() {
        let (mut world, config) = setup();
        world.effects.shields = 1;
        world.effects.extra_time_ms = 5000.0;
        blocking_obstacle(&mut world);
        let report = step(&mut world, &config, false);
        assert!(!report.game_over);
        assert_eq!(world.effects.extra_time_ms, 0.0);
        assert_eq!(world.effects.shields, 1);
        assert!(world.drain_events().contains(&GameEvent::ExtraTimeUsed));
    }

    #[test]
    fn test_unprotected_collision_is_lethal() {
        let (mut world, config) = setup();
        blocking_obstacle(&mut world);
        let report = step(&mut world, &config, false);
        assert!(report.game_over);
    }

    #[test]
    fn test_grace_period_suppresses_collision() {
        let (mut world, config) = setup();
        world.grace = GracePeriod::begin(0.0);
        blocking_obstacle(&mut world);
        let report = step(&mut world, &config, false);
        assert!(!report.game_over);
    }

    #[test]
    fn test_out_of_bounds_is_lethal() {
        let (mut world, config) = setup();
        world.ball.pos.y = world.world_height + 50.0;
        assert!(step(&mut world, &config, false).game_over);
    }

    #[test]
    fn test_passage_scores_once() {
        let (mut world, config) = setup();
        let id = world.next_entity_id();
        let height = world.world_height;
        // Trailing edge just behind the ball, gap centered on it
        let gap_y = world.ball.pos.y / height;
        world
            .obstacles
            .insert(0, Barrier::vertical(id, 20.0, 60.0, height, gap_y, 200.0));
        let report = step(&mut world, &config, false);
        assert!(report.score_changed);
        assert!(world.obstacles.iter().find(|o| o.id == id).is_some_and(|o| o.passed));
        let events = world.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::ObstaclePassed {
                quality: PassQuality::Perfect,
                points: 15
            }
        )));

        let score = world.score;
        step(&mut world, &config, false);
        assert!(!world
            .drain_events()
            .iter()
            .any(|e| matches!(e, GameEvent::ObstaclePassed { .. })));
        assert!(world.score >= score);
    }

    #[test]
    fn test_power_up_collected() {
        let (mut world, config) = setup();
        let id = world.next_entity_id();
        world
            .power_ups
            .push(PowerUp::new(id, PowerUpKind::Shield, world.ball.pos + Vec2::new(5.0, 0.0)));
        step(&mut world, &config, false);
        assert_eq!(world.effects.shields, 1);
        assert!(world.power_ups.iter().all(|p| p.id != id));
        assert!(world.combos.channel(ComboKind::PowerUp).active);
    }

    #[test]
    fn test_survival_points() {
        let (mut world, config) = setup();
        for _ in 0..61 {
            let tap = world.ball.vel.y > 3.0;
            step(&mut world, &config, tap);
        }
        assert!(world.time_ms >= 1000.0);
        assert!(world.score >= 1);
    }

    #[test]
    fn test_level_up_marks_transition() {
        let (mut world, config) = setup();
        world.score = config.difficulty_score_step as u64;
        let report = step(&mut world, &config, false);
        assert_eq!(report.level_up, Some(2));
        assert_eq!(world.level, 2);
        assert!(world.drain_events().contains(&GameEvent::LevelUp(2)));
    }

    #[test]
    fn test_camera_follows_ball() {
        let (mut world, config) = setup();
        for _ in 0..100 {
            world.ball.vel.y = 0.0;
            world.ball.pos.y = 1000.0;
            let input = TickInput {
                dt: 1.0,
                tap: false,
                chunks: &[],
            };
            // Drop generated barriers so the ball can't hit anything
            world.obstacles.clear();
            world.walls.clear();
            let _ = tick(&mut world, &input, &config);
        }
        let max_offset = world.world_height - world.canvas_height;
        assert!(world.camera_y > 0.0 && world.camera_y <= max_offset);
    }
}
