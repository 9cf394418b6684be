//! Style meter and combo channels
//!
//! Both are plain state holders driven by skill events. The style meter
//! turns accumulated points into a letter grade and a score multiplier;
//! the combo tracker runs four independent streak channels and reports the
//! best active multiplier.

use serde::{Deserialize, Serialize};

/// Letter grade, lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StyleLevel {
    D,
    C,
    B,
    A,
    S,
    SS,
    SSS,
}

impl StyleLevel {
    pub const ALL: [StyleLevel; 7] = [
        StyleLevel::D,
        StyleLevel::C,
        StyleLevel::B,
        StyleLevel::A,
        StyleLevel::S,
        StyleLevel::SS,
        StyleLevel::SSS,
    ];

    /// Points needed to reach this level
    pub fn threshold(&self) -> f64 {
        match self {
            StyleLevel::D => 0.0,
            StyleLevel::C => 100.0,
            StyleLevel::B => 250.0,
            StyleLevel::A => 500.0,
            StyleLevel::S => 900.0,
            StyleLevel::SS => 1400.0,
            StyleLevel::SSS => 2000.0,
        }
    }

    pub fn multiplier(&self) -> f64 {
        match self {
            StyleLevel::D => 1.0,
            StyleLevel::C => 1.1,
            StyleLevel::B => 1.2,
            StyleLevel::A => 1.35,
            StyleLevel::S => 1.5,
            StyleLevel::SS => 1.75,
            StyleLevel::SSS => 2.0,
        }
    }

    /// Display color (0xRRGGBB)
    pub fn color(&self) -> u32 {
        match self {
            StyleLevel::D => 0x9E9E9E,
            StyleLevel::C => 0x4FC3F7,
            StyleLevel::B => 0x81C784,
            StyleLevel::A => 0xFFD54F,
            StyleLevel::S => 0xFF8A65,
            StyleLevel::SS => 0xE57373,
            StyleLevel::SSS => 0xBA68C8,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StyleLevel::D => "D",
            StyleLevel::C => "C",
            StyleLevel::B => "B",
            StyleLevel::A => "A",
            StyleLevel::S => "S",
            StyleLevel::SS => "SS",
            StyleLevel::SSS => "SSS",
        }
    }

    /// Highest level whose threshold `points` reaches
    pub fn for_points(points: f64) -> Self {
        StyleLevel::ALL
            .iter()
            .rev()
            .copied()
            .find(|level| points >= level.threshold())
            .unwrap_or(StyleLevel::D)
    }
}

/// What earned style points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleAward {
    PerfectGap,
    CloseCall,
    PowerUp,
    /// Clean passage without a hit
    NoHit,
}

impl StyleAward {
    pub fn points(&self) -> f64 {
        match self {
            StyleAward::PerfectGap => 50.0,
            StyleAward::CloseCall => 30.0,
            StyleAward::PowerUp => 20.0,
            StyleAward::NoHit => 5.0,
        }
    }

    /// Whether the award comes from getting through a gap untouched
    pub fn is_clean_passage(&self) -> bool {
        matches!(self, StyleAward::PerfectGap | StyleAward::CloseCall | StyleAward::NoHit)
    }
}

/// Idle time before points start draining
pub const STYLE_DECAY_IDLE_MS: f64 = 3000.0;
/// Drain rate once idle, points per second
pub const STYLE_DECAY_PER_SEC: f64 = 40.0;
pub const STYLE_COLLISION_PENALTY: f64 = 150.0;
/// Upper bound on accumulated points
pub const STYLE_MAX_POINTS: f64 = 2500.0;
/// How long a level-change banner stays up
pub const STYLE_NOTIFICATION_MS: f64 = 1500.0;

/// Level-change banner for the renderer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StyleNotification {
    pub level: StyleLevel,
    pub rising: bool,
    pub until_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleMeter {
    pub points: f64,
    pub level: StyleLevel,
    pub previous_level: StyleLevel,
    pub no_hit_streak: u32,
    pub last_action_ms: f64,
    /// Decay has been applied up to this time
    pub decayed_to_ms: f64,
    pub notification: Option<StyleNotification>,
}

impl Default for StyleMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleMeter {
    pub fn new() -> Self {
        Self {
            points: 0.0,
            level: StyleLevel::D,
            previous_level: StyleLevel::D,
            no_hit_streak: 0,
            last_action_ms: 0.0,
            decayed_to_ms: 0.0,
            notification: None,
        }
    }

    pub fn level(&self) -> StyleLevel {
        self.level
    }

    pub fn multiplier(&self) -> f64 {
        self.level.multiplier()
    }

    pub fn color(&self) -> u32 {
        self.level.color()
    }

    /// Progress toward the next level (0..1, 1 at SSS)
    pub fn progress(&self) -> f64 {
        let idx = StyleLevel::ALL
            .iter()
            .position(|l| *l == self.level)
            .unwrap_or(0);
        match StyleLevel::ALL.get(idx + 1) {
            Some(next) => {
                let base = self.level.threshold();
                ((self.points - base) / (next.threshold() - base)).clamp(0.0, 1.0)
            }
            None => 1.0,
        }
    }

    /// Add points for a skill event; returns a level change if one happened
    pub fn award(&mut self, award: StyleAward, now_ms: f64) -> Option<StyleNotification> {
        if award.is_clean_passage() {
            self.no_hit_streak += 1;
        }
        self.points = (self.points + award.points()).min(STYLE_MAX_POINTS);
        self.last_action_ms = now_ms;
        self.decayed_to_ms = now_ms;
        self.recompute(now_ms)
    }

    /// Flat penalty and streak reset
    pub fn register_collision(&mut self, now_ms: f64) -> Option<StyleNotification> {
        self.points = (self.points - STYLE_COLLISION_PENALTY).max(0.0);
        self.no_hit_streak = 0;
        self.last_action_ms = now_ms;
        self.decayed_to_ms = now_ms;
        self.recompute(now_ms)
    }

    /// Apply idle decay and expire the banner
    pub fn update(&mut self, now_ms: f64) -> Option<StyleNotification> {
        if let Some(n) = self.notification
            && now_ms >= n.until_ms
        {
            self.notification = None;
        }

        let decay_start = self.last_action_ms + STYLE_DECAY_IDLE_MS;
        if now_ms <= decay_start || self.points <= 0.0 {
            return None;
        }
        let from = self.decayed_to_ms.max(decay_start);
        let elapsed = (now_ms - from).max(0.0);
        self.decayed_to_ms = now_ms;
        self.points = (self.points - elapsed / 1000.0 * STYLE_DECAY_PER_SEC).max(0.0);
        self.recompute(now_ms)
    }

    fn recompute(&mut self, now_ms: f64) -> Option<StyleNotification> {
        let new_level = StyleLevel::for_points(self.points);
        if new_level == self.level {
            return None;
        }
        self.previous_level = self.level;
        self.level = new_level;
        let notification = StyleNotification {
            level: new_level,
            rising: new_level > self.previous_level,
            until_ms: now_ms + STYLE_NOTIFICATION_MS,
        };
        self.notification = Some(notification);
        Some(notification)
    }
}

/// Combo channel kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComboKind {
    Gap,
    CloseCall,
    PowerUp,
    /// Fed by every qualifying event
    Mixed,
}

impl ComboKind {
    pub const ALL: [ComboKind; 4] = [
        ComboKind::Gap,
        ComboKind::CloseCall,
        ComboKind::PowerUp,
        ComboKind::Mixed,
    ];

    /// Multiplier gained per event after the first
    pub fn growth(&self) -> f64 {
        match self {
            ComboKind::Gap => 0.1,
            ComboKind::CloseCall => 0.25,
            ComboKind::PowerUp => 0.2,
            ComboKind::Mixed => 0.15,
        }
    }

    pub fn cap(&self) -> f64 {
        match self {
            ComboKind::Gap => 3.0,
            ComboKind::CloseCall => 4.0,
            ComboKind::PowerUp => 2.5,
            ComboKind::Mixed => 5.0,
        }
    }

    fn index(&self) -> usize {
        match self {
            ComboKind::Gap => 0,
            ComboKind::CloseCall => 1,
            ComboKind::PowerUp => 2,
            ComboKind::Mixed => 3,
        }
    }
}

/// Max gap between events that keeps a channel alive
pub const COMBO_TIMEOUT_MS: f64 = 2500.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComboData {
    pub count: u32,
    pub multiplier: f64,
    pub last_action_ms: f64,
    pub active: bool,
}

impl Default for ComboData {
    fn default() -> Self {
        Self {
            count: 0,
            multiplier: 1.0,
            last_action_ms: 0.0,
            active: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComboTracker {
    channels: [ComboData; 4],
}

impl ComboTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel(&self, kind: ComboKind) -> &ComboData {
        &self.channels[kind.index()]
    }

    /// Record a qualifying event on `kind` and on the mixed channel
    pub fn register(&mut self, kind: ComboKind, now_ms: f64) {
        self.bump(kind, now_ms);
        if kind != ComboKind::Mixed {
            self.bump(ComboKind::Mixed, now_ms);
        }
    }

    fn bump(&mut self, kind: ComboKind, now_ms: f64) {
        let data = &mut self.channels[kind.index()];
        if data.active && now_ms - data.last_action_ms <= COMBO_TIMEOUT_MS {
            data.count += 1;
        } else {
            data.count = 1;
        }
        data.active = true;
        data.last_action_ms = now_ms;
        data.multiplier = (1.0 + kind.growth() * (data.count - 1) as f64).min(kind.cap());
    }

    /// Drop channels whose timeout has elapsed
    pub fn update(&mut self, now_ms: f64) {
        for data in self.channels.iter_mut() {
            if data.active && now_ms - data.last_action_ms > COMBO_TIMEOUT_MS {
                *data = ComboData::default();
            }
        }
    }

    /// Collision wipes every channel
    pub fn reset_all(&mut self) {
        self.channels = Default::default();
    }

    /// Highest multiplier among active channels
    pub fn multiplier(&self) -> f64 {
        self.channels
            .iter()
            .filter(|c| c.active)
            .map(|c| c.multiplier)
            .fold(1.0, f64::max)
    }

    /// Active channel with the longest streak, for the HUD
    pub fn best(&self) -> Option<(ComboKind, ComboData)> {
        ComboKind::ALL
            .iter()
            .map(|k| (*k, self.channels[k.index()]))
            .filter(|(_, c)| c.active && c.count > 1)
            .max_by_key(|(_, c)| c.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_threshold_reaches_level() {
        let mut meter = StyleMeter::new();
        meter.points = StyleLevel::S.threshold() - StyleAward::PerfectGap.points();
        meter.award(StyleAward::PerfectGap, 0.0);
        assert_eq!(meter.points, 900.0);
        assert_eq!(meter.level(), StyleLevel::S);
        assert_eq!(meter.multiplier(), StyleLevel::S.multiplier());
    }

    #[test]
    fn test_idle_decay_drops_level() {
        let mut meter = StyleMeter::new();
        meter.points = 850.0;
        meter.award(StyleAward::PerfectGap, 1000.0);
        assert_eq!(meter.level(), StyleLevel::S);

        // Still inside the idle window
        meter.update(1000.0 + STYLE_DECAY_IDLE_MS);
        assert_eq!(meter.points, 900.0);

        // One second past the idle window
        let change = meter.update(1000.0 + STYLE_DECAY_IDLE_MS + 1000.0);
        assert!(meter.points < 900.0);
        assert_eq!(meter.level(), StyleLevel::A);
        assert!(matches!(change, Some(n) if !n.rising));
    }

    #[test]
    fn test_decay_is_incremental() {
        let mut meter = StyleMeter::new();
        meter.points = 500.0;
        meter.last_action_ms = 0.0;
        meter.update(STYLE_DECAY_IDLE_MS + 500.0);
        meter.update(STYLE_DECAY_IDLE_MS + 1000.0);
        assert!((meter.points - (500.0 - STYLE_DECAY_PER_SEC)).abs() < 1e-9);
    }

    #[test]
    fn test_collision_penalty() {
        let mut meter = StyleMeter::new();
        meter.award(StyleAward::NoHit, 0.0);
        meter.award(StyleAward::NoHit, 10.0);
        assert_eq!(meter.no_hit_streak, 2);
        meter.register_collision(20.0);
        assert_eq!(meter.no_hit_streak, 0);
        assert_eq!(meter.points, 0.0);
    }

    #[test]
    fn test_every_clean_passage_extends_streak() {
        let mut meter = StyleMeter::new();
        meter.award(StyleAward::PerfectGap, 0.0);
        meter.award(StyleAward::CloseCall, 10.0);
        meter.award(StyleAward::NoHit, 20.0);
        assert_eq!(meter.no_hit_streak, 3);
        meter.award(StyleAward::PowerUp, 30.0);
        assert_eq!(meter.no_hit_streak, 3);
    }

    #[test]
    fn test_combo_growth_and_cap() {
        let mut combos = ComboTracker::new();
        for i in 0..30 {
            combos.register(ComboKind::PowerUp, i as f64 * 100.0);
        }
        assert_eq!(combos.channel(ComboKind::PowerUp).count, 30);
        assert_eq!(combos.channel(ComboKind::PowerUp).multiplier, 2.5);
        // Mixed grows slower but caps higher
        assert_eq!(combos.multiplier(), 5.0);
    }

    #[test]
    fn test_combo_timeout() {
        let mut combos = ComboTracker::new();
        combos.register(ComboKind::Gap, 0.0);
        combos.register(ComboKind::Gap, 1000.0);
        assert_eq!(combos.channel(ComboKind::Gap).count, 2);
        combos.update(1000.0 + COMBO_TIMEOUT_MS + 1.0);
        assert!(!combos.channel(ComboKind::Gap).active);
        assert_eq!(combos.multiplier(), 1.0);

        // A late event starts a fresh streak
        combos.register(ComboKind::Gap, 10_000.0);
        assert_eq!(combos.channel(ComboKind::Gap).count, 1);
    }

    #[test]
    fn test_collision_resets_all() {
        let mut combos = ComboTracker::new();
        combos.register(ComboKind::CloseCall, 0.0);
        combos.register(ComboKind::CloseCall, 100.0);
        assert!(combos.multiplier() > 1.0);
        assert!(combos.best().is_some());
        combos.reset_all();
        assert_eq!(combos.multiplier(), 1.0);
        assert!(combos.best().is_none());
    }
}
