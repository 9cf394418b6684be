//! Random global events
//!
//! Transient modifiers rolled during play: speed surges, slow drifts,
//! score frenzies and purely visual blackouts. At most one runs at a time.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::state::{GameEvent, World};
use crate::settings::GameConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RandomEventKind {
    /// Scroll 1.5× faster
    SpeedSurge,
    /// Scroll at 0.7×
    SlowDrift,
    /// Score multiplied by 1 + intensity
    ScoreFrenzy,
    /// Visual only
    Blackout,
}

impl RandomEventKind {
    pub const ALL: [RandomEventKind; 4] = [
        RandomEventKind::SpeedSurge,
        RandomEventKind::SlowDrift,
        RandomEventKind::ScoreFrenzy,
        RandomEventKind::Blackout,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomEvent {
    pub kind: RandomEventKind,
    pub start_ms: f64,
    pub end_ms: f64,
    /// 0..1
    pub intensity: f32,
}

impl RandomEvent {
    pub fn speed_factor(&self) -> f32 {
        match self.kind {
            RandomEventKind::SpeedSurge => 1.5,
            RandomEventKind::SlowDrift => 0.7,
            _ => 1.0,
        }
    }

    pub fn score_multiplier(&self) -> f64 {
        match self.kind {
            RandomEventKind::ScoreFrenzy => 1.0 + self.intensity as f64,
            _ => 1.0,
        }
    }
}

/// Roll at most once per second of play
const EVENT_ROLL_INTERVAL_MS: f64 = 1000.0;

/// End expired events and maybe start a new one
pub fn update_random_events(world: &mut World, config: &GameConfig) {
    let now = world.time_ms;

    let (ended, running): (Vec<RandomEvent>, Vec<RandomEvent>) = world
        .random_events
        .drain(..)
        .partition(|e| now >= e.end_ms);
    world.random_events = running;
    for event in ended {
        log::debug!("Random event {:?} ended", event.kind);
        world.emit(GameEvent::RandomEventEnded(event.kind));
    }

    if now - world.event_roll_ms < EVENT_ROLL_INTERVAL_MS {
        return;
    }
    world.event_roll_ms = now;

    if world.level < config.random_event_min_level || !world.random_events.is_empty() {
        return;
    }
    if !world.rng.random_bool(config.random_event_chance.clamp(0.0, 1.0)) {
        return;
    }

    let kind = RandomEventKind::ALL[world.rng.random_range(0..RandomEventKind::ALL.len())];
    let intensity = world.rng.random_range(0.3..1.0);
    log::info!("Random event {:?} (intensity {:.2})", kind, intensity);
    world.random_events.push(RandomEvent {
        kind,
        start_ms: now,
        end_ms: now + config.random_event_duration_ms,
        intensity,
    });
    world.emit(GameEvent::RandomEventStarted(kind));
}

/// Product of all event speed modifiers
pub fn event_speed_factor(events: &[RandomEvent]) -> f32 {
    events.iter().map(RandomEvent::speed_factor).product()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_events_below_min_level() {
        let config = GameConfig {
            random_event_chance: 1.0,
            ..Default::default()
        };
        let mut world = World::new(&config, 3);
        world.level = 1;
        for step in 1..20 {
            world.time_ms = step as f64 * 1000.0;
            update_random_events(&mut world, &config);
        }
        assert!(world.random_events.is_empty());
    }

    #[test]
    fn test_event_starts_and_ends() {
        let config = GameConfig {
            random_event_chance: 1.0,
            random_event_duration_ms: 2000.0,
            ..Default::default()
        };
        let mut world = World::new(&config, 3);
        world.level = 2;
        world.time_ms = 1000.0;
        update_random_events(&mut world, &config);
        assert_eq!(world.random_events.len(), 1);

        // Only one at a time
        world.time_ms = 2000.0;
        update_random_events(&mut world, &config);
        assert_eq!(world.random_events.len(), 1);

        world.time_ms = 3000.0;
        update_random_events(&mut world, &config);
        let events = world.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::RandomEventEnded(_))));
    }

    #[test]
    fn test_modifiers() {
        let surge = RandomEvent {
            kind: RandomEventKind::SpeedSurge,
            start_ms: 0.0,
            end_ms: 1.0,
            intensity: 0.5,
        };
        let frenzy = RandomEvent {
            kind: RandomEventKind::ScoreFrenzy,
            ..surge.clone()
        };
        assert_eq!(event_speed_factor(&[surge.clone(), frenzy.clone()]), 1.5);
        assert_eq!(frenzy.score_multiplier(), 1.5);
        assert_eq!(surge.score_multiplier(), 1.0);
    }
}
