//! Power-up effects and their timers
//!
//! Timed effects store an absolute expiry on the world clock; each tick
//! deactivates anything whose expiry has passed and restores what it
//! changed.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::state::{Ball, GameEvent, PowerUp, PowerUpKind};

pub const SLOW_MOTION_MS: f64 = 5000.0;
pub const SPEED_BOOST_MS: f64 = 4000.0;
pub const MAGNET_MS: f64 = 8000.0;
pub const SCORE_MULTIPLIER_MS: f64 = 8000.0;
pub const GRAVITY_FLIP_MS: f64 = 5000.0;
/// Banked rescue time granted by an extra-time pickup
pub const EXTRA_TIME_MS: f64 = 5000.0;
pub const SCORE_BONUS_POINTS: f64 = 50.0;

pub const SLOW_MOTION_FACTOR: f32 = 0.5;
pub const SPEED_BOOST_FACTOR: f32 = 2.0;
pub const SCORE_MULTIPLIER_FACTOR: f64 = 2.0;

pub const MAGNET_RADIUS: f32 = 200.0;
/// Pull speed in px per frame
pub const MAGNET_PULL_SPEED: f32 = 8.0;

/// Active power-up effects
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActiveEffects {
    /// Stackable shield charges
    pub shields: u32,
    /// Banked rescue time in milliseconds
    pub extra_time_ms: f64,
    pub slow_motion_until: Option<f64>,
    pub speed_boost_until: Option<f64>,
    pub magnet_until: Option<f64>,
    pub score_multiplier_until: Option<f64>,
    pub gravity_flip_until: Option<f64>,
    /// Hit immunity after a rescue
    pub invulnerable_until: Option<f64>,
}

fn active(until: Option<f64>, now_ms: f64) -> bool {
    until.is_some_and(|t| now_ms < t)
}

impl ActiveEffects {
    pub fn slow_motion(&self, now_ms: f64) -> bool {
        active(self.slow_motion_until, now_ms)
    }

    pub fn speed_boost(&self, now_ms: f64) -> bool {
        active(self.speed_boost_until, now_ms)
    }

    pub fn magnet(&self, now_ms: f64) -> bool {
        active(self.magnet_until, now_ms)
    }

    pub fn gravity_flipped(&self, now_ms: f64) -> bool {
        active(self.gravity_flip_until, now_ms)
    }

    pub fn invulnerable(&self, now_ms: f64) -> bool {
        active(self.invulnerable_until, now_ms)
    }

    /// Product of the power-up speed modifiers
    pub fn speed_factor(&self, now_ms: f64) -> f32 {
        let mut factor = 1.0;
        if self.slow_motion(now_ms) {
            factor *= SLOW_MOTION_FACTOR;
        }
        if self.speed_boost(now_ms) {
            factor *= SPEED_BOOST_FACTOR;
        }
        factor
    }

    pub fn score_multiplier(&self, now_ms: f64) -> f64 {
        if active(self.score_multiplier_until, now_ms) {
            SCORE_MULTIPLIER_FACTOR
        } else {
            1.0
        }
    }

    /// Apply a collected power-up; returns the immediate score bonus (if any)
    pub fn apply(&mut self, kind: PowerUpKind, ball: &mut Ball, now_ms: f64) -> Option<f64> {
        match kind {
            PowerUpKind::ScoreBonus => return Some(SCORE_BONUS_POINTS),
            PowerUpKind::ExtraTime => self.extra_time_ms += EXTRA_TIME_MS,
            PowerUpKind::SlowMotion => self.slow_motion_until = Some(now_ms + SLOW_MOTION_MS),
            PowerUpKind::SpeedBoost => self.speed_boost_until = Some(now_ms + SPEED_BOOST_MS),
            PowerUpKind::Shield => self.shields += 1,
            PowerUpKind::Magnet => self.magnet_until = Some(now_ms + MAGNET_MS),
            PowerUpKind::ScoreMultiplier => {
                self.score_multiplier_until = Some(now_ms + SCORE_MULTIPLIER_MS)
            }
            PowerUpKind::GravityFlip => {
                if !self.gravity_flipped(now_ms) {
                    ball.gravity_scale = -ball.gravity_scale.abs();
                }
                self.gravity_flip_until = Some(now_ms + GRAVITY_FLIP_MS);
            }
        }
        None
    }

    /// Deactivate expired effects, restoring state they changed
    pub fn expire(&mut self, ball: &mut Ball, now_ms: f64, events: &mut Vec<GameEvent>) {
        let timers: [(&mut Option<f64>, PowerUpKind); 5] = [
            (&mut self.slow_motion_until, PowerUpKind::SlowMotion),
            (&mut self.speed_boost_until, PowerUpKind::SpeedBoost),
            (&mut self.magnet_until, PowerUpKind::Magnet),
            (&mut self.score_multiplier_until, PowerUpKind::ScoreMultiplier),
            (&mut self.gravity_flip_until, PowerUpKind::GravityFlip),
        ];
        for (until, kind) in timers {
            if until.is_some_and(|t| now_ms >= t) {
                *until = None;
                if kind == PowerUpKind::GravityFlip {
                    ball.gravity_scale = ball.gravity_scale.abs();
                }
                events.push(GameEvent::EffectExpired(kind));
            }
        }
        if self.invulnerable_until.is_some_and(|t| now_ms >= t) {
            self.invulnerable_until = None;
        }
    }
}

/// Scroll free power-ups left, or pull them toward the ball under a magnet
pub fn move_power_ups(
    power_ups: &mut [PowerUp],
    ball: &Ball,
    scroll_dx: f32,
    magnet: bool,
    dt: f32,
) {
    for power_up in power_ups.iter_mut().filter(|p| !p.collected) {
        let to_ball = ball.pos - power_up.pos;
        if magnet && to_ball.length() < MAGNET_RADIUS {
            let step = to_ball.normalize_or_zero() * MAGNET_PULL_SPEED * dt;
            power_up.pos += if step.length() > to_ball.length() {
                to_ball
            } else {
                step
            };
        } else {
            power_up.pos.x += scroll_dx;
        }
        power_up.animate(dt);
    }
}

/// Whether an embedded power-up is close enough to be pulled out of its gap
pub fn in_magnet_range(power_up: &PowerUp, ball_pos: Vec2) -> bool {
    power_up.pos.distance(ball_pos) < MAGNET_RADIUS
}

/// Mark power-ups that left the screen as collected so they get dropped
pub fn discard_offscreen(power_ups: &mut [PowerUp]) {
    for power_up in power_ups.iter_mut() {
        if power_up.pos.x + power_up.size < 0.0 {
            power_up.collected = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ball() -> Ball {
        Ball::new(Vec2::new(100.0, 300.0), 15.0)
    }

    #[test]
    fn test_gravity_flip_restores() {
        let mut effects = ActiveEffects::default();
        let mut ball = ball();
        let mut events = Vec::new();
        effects.apply(PowerUpKind::GravityFlip, &mut ball, 0.0);
        assert_eq!(ball.gravity_scale, -1.0);

        // Re-collecting while flipped extends without flipping back
        effects.apply(PowerUpKind::GravityFlip, &mut ball, 1000.0);
        assert_eq!(ball.gravity_scale, -1.0);

        effects.expire(&mut ball, 1000.0 + GRAVITY_FLIP_MS - 1.0, &mut events);
        assert_eq!(ball.gravity_scale, -1.0);
        effects.expire(&mut ball, 1000.0 + GRAVITY_FLIP_MS, &mut events);
        assert_eq!(ball.gravity_scale, 1.0);
        assert_eq!(events, vec![GameEvent::EffectExpired(PowerUpKind::GravityFlip)]);
    }

    #[test]
    fn test_speed_factor_stacks() {
        let mut effects = ActiveEffects::default();
        let mut ball = ball();
        assert_eq!(effects.speed_factor(0.0), 1.0);
        effects.apply(PowerUpKind::SlowMotion, &mut ball, 0.0);
        assert_eq!(effects.speed_factor(10.0), 0.5);
        effects.apply(PowerUpKind::SpeedBoost, &mut ball, 0.0);
        assert_eq!(effects.speed_factor(10.0), 1.0);
        assert_eq!(effects.speed_factor(SLOW_MOTION_MS + 1.0), 1.0);
        assert_eq!(effects.speed_factor(SPEED_BOOST_MS - 1.0), 1.0);
    }

    #[test]
    fn test_stackable_shield_and_bank() {
        let mut effects = ActiveEffects::default();
        let mut ball = ball();
        effects.apply(PowerUpKind::Shield, &mut ball, 0.0);
        effects.apply(PowerUpKind::Shield, &mut ball, 0.0);
        effects.apply(PowerUpKind::ExtraTime, &mut ball, 0.0);
        assert_eq!(effects.shields, 2);
        assert_eq!(effects.extra_time_ms, EXTRA_TIME_MS);
        assert_eq!(
            effects.apply(PowerUpKind::ScoreBonus, &mut ball, 0.0),
            Some(SCORE_BONUS_POINTS)
        );
    }

    #[test]
    fn test_magnet_pulls_instead_of_scrolling() {
        let ball = ball();
        let mut power_ups = vec![
            PowerUp::new(1, PowerUpKind::Shield, Vec2::new(200.0, 300.0)),
            PowerUp::new(2, PowerUpKind::Shield, Vec2::new(700.0, 300.0)),
        ];
        move_power_ups(&mut power_ups, &ball, -3.0, true, 1.0);
        // Near one pulled toward the ball
        assert_eq!(power_ups[0].pos, Vec2::new(192.0, 300.0));
        // Far one scrolls normally
        assert_eq!(power_ups[1].pos, Vec2::new(697.0, 300.0));
    }

    #[test]
    fn test_offscreen_discarded() {
        let mut power_ups = vec![PowerUp::new(1, PowerUpKind::Magnet, Vec2::new(-30.0, 100.0))];
        discard_offscreen(&mut power_ups);
        assert!(power_ups[0].collected);
    }
}
