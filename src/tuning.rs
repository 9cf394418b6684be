//! Data-driven difficulty curve
//!
//! Maps a scalar difficulty to generator parameters by linear
//! interpolation between fixed breakpoints. Values below the first or
//! above the last breakpoint clamp to that breakpoint.

use crate::lerp;

/// Generator parameters at one difficulty
#[derive(Debug, Clone, PartialEq)]
pub struct DifficultyConfig {
    /// Horizontal distance between vertical obstacles
    pub obstacle_spacing: f32,
    pub obstacle_width_min: f32,
    pub obstacle_width_max: f32,
    pub gap_height_min: f32,
    pub gap_height_max: f32,
    /// Horizontal distance between walls before zone scaling
    pub wall_spacing: f32,
    pub wall_gap_min: f32,
    pub wall_gap_max: f32,
    /// Colors obstacles are drawn from
    pub palette: &'static [u32],
    /// Weights for [Solid, Striped, Glow]
    pub style_weights: [f32; 3],
    /// Chance an obstacle carries a power-up in its gap
    pub power_up_chance: f32,
    /// Weights in `PowerUpKind::ALL` order
    pub power_up_weights: [f32; 8],
}

const PALETTE_CALM: &[u32] = &[0x5EBD3E, 0x4CAF50, 0x66BB6A];
const PALETTE_WARM: &[u32] = &[0xFFA726, 0xFF7043, 0x5EBD3E];
const PALETTE_HOT: &[u32] = &[0xEF5350, 0xAB47BC, 0xFF7043];
const PALETTE_EXTREME: &[u32] = &[0xD500F9, 0xFF1744, 0x651FFF];

/// Breakpoint table, sorted by difficulty
const BREAKPOINTS: [(f32, DifficultyConfig); 4] = [
    (
        1.0,
        DifficultyConfig {
            obstacle_spacing: 360.0,
            obstacle_width_min: 60.0,
            obstacle_width_max: 70.0,
            gap_height_min: 200.0,
            gap_height_max: 240.0,
            wall_spacing: 600.0,
            wall_gap_min: 180.0,
            wall_gap_max: 220.0,
            palette: PALETTE_CALM,
            style_weights: [0.7, 0.2, 0.1],
            power_up_chance: 0.12,
            power_up_weights: [3.0, 2.0, 1.5, 1.0, 2.0, 1.5, 1.5, 0.5],
        },
    ),
    (
        2.0,
        DifficultyConfig {
            obstacle_spacing: 320.0,
            obstacle_width_min: 65.0,
            obstacle_width_max: 80.0,
            gap_height_min: 170.0,
            gap_height_max: 210.0,
            wall_spacing: 500.0,
            wall_gap_min: 160.0,
            wall_gap_max: 200.0,
            palette: PALETTE_WARM,
            style_weights: [0.5, 0.3, 0.2],
            power_up_chance: 0.10,
            power_up_weights: [2.5, 2.0, 1.5, 1.5, 2.0, 1.5, 1.5, 1.0],
        },
    ),
    (
        3.0,
        DifficultyConfig {
            obstacle_spacing: 290.0,
            obstacle_width_min: 70.0,
            obstacle_width_max: 90.0,
            gap_height_min: 150.0,
            gap_height_max: 190.0,
            wall_spacing: 420.0,
            wall_gap_min: 140.0,
            wall_gap_max: 180.0,
            palette: PALETTE_HOT,
            style_weights: [0.4, 0.3, 0.3],
            power_up_chance: 0.08,
            power_up_weights: [2.0, 2.0, 1.5, 2.0, 2.0, 1.5, 1.5, 1.5],
        },
    ),
    (
        5.0,
        DifficultyConfig {
            obstacle_spacing: 260.0,
            obstacle_width_min: 75.0,
            obstacle_width_max: 100.0,
            gap_height_min: 130.0,
            gap_height_max: 170.0,
            wall_spacing: 360.0,
            wall_gap_min: 120.0,
            wall_gap_max: 160.0,
            palette: PALETTE_EXTREME,
            style_weights: [0.3, 0.3, 0.4],
            power_up_chance: 0.06,
            power_up_weights: [1.5, 2.0, 1.5, 2.0, 2.0, 1.5, 2.0, 2.0],
        },
    ),
];

fn lerp_array<const N: usize>(a: &[f32; N], b: &[f32; N], t: f32) -> [f32; N] {
    let mut out = [0.0; N];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = lerp(a[i], b[i], t);
    }
    out
}

fn interpolate(a: &DifficultyConfig, b: &DifficultyConfig, t: f32) -> DifficultyConfig {
    DifficultyConfig {
        obstacle_spacing: lerp(a.obstacle_spacing, b.obstacle_spacing, t),
        obstacle_width_min: lerp(a.obstacle_width_min, b.obstacle_width_min, t),
        obstacle_width_max: lerp(a.obstacle_width_max, b.obstacle_width_max, t),
        gap_height_min: lerp(a.gap_height_min, b.gap_height_min, t),
        gap_height_max: lerp(a.gap_height_max, b.gap_height_max, t),
        wall_spacing: lerp(a.wall_spacing, b.wall_spacing, t),
        wall_gap_min: lerp(a.wall_gap_min, b.wall_gap_min, t),
        wall_gap_max: lerp(a.wall_gap_max, b.wall_gap_max, t),
        // Colors don't blend; the lower breakpoint's palette holds until the next one
        palette: if t < 1.0 { a.palette } else { b.palette },
        style_weights: lerp_array(&a.style_weights, &b.style_weights, t),
        power_up_chance: lerp(a.power_up_chance, b.power_up_chance, t),
        power_up_weights: lerp_array(&a.power_up_weights, &b.power_up_weights, t),
    }
}

/// Generator parameters for a difficulty
pub fn difficulty_config(difficulty: f32) -> DifficultyConfig {
    let difficulty = if difficulty.is_finite() { difficulty } else { 1.0 };

    let (first_d, first) = &BREAKPOINTS[0];
    if difficulty <= *first_d {
        return first.clone();
    }

    for pair in BREAKPOINTS.windows(2) {
        let (lo_d, lo) = &pair[0];
        let (hi_d, hi) = &pair[1];
        if difficulty <= *hi_d {
            let t = (difficulty - lo_d) / (hi_d - lo_d);
            return interpolate(lo, hi, t);
        }
    }

    BREAKPOINTS[BREAKPOINTS.len() - 1].1.clone()
}

/// Difficulty for a score
pub fn difficulty_for_score(score: u64, step: f32, max: f32) -> f32 {
    if step <= 0.0 {
        return 1.0;
    }
    (1.0 + score as f32 / step).min(max).max(1.0)
}

/// Integer level shown to the player
pub fn level_for_difficulty(difficulty: f32) -> u32 {
    difficulty.max(1.0).floor() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolates_halfway() {
        let lo = difficulty_config(1.0);
        let hi = difficulty_config(2.0);
        let mid = difficulty_config(1.5);
        assert_eq!(mid.wall_spacing, (lo.wall_spacing + hi.wall_spacing) / 2.0);
        assert_eq!(mid.wall_spacing, 550.0);
        assert_eq!(mid.obstacle_spacing, 340.0);
    }

    #[test]
    fn test_clamps_outside_breakpoints() {
        assert_eq!(difficulty_config(0.2), difficulty_config(1.0));
        assert_eq!(difficulty_config(9.0), difficulty_config(5.0));
        assert_eq!(difficulty_config(f32::NAN), difficulty_config(1.0));
    }

    #[test]
    fn test_palette_steps() {
        assert_eq!(difficulty_config(1.9).palette, PALETTE_CALM);
        assert_eq!(difficulty_config(2.0).palette, PALETTE_WARM);
    }

    #[test]
    fn test_gap_ranges_shrink() {
        let easy = difficulty_config(1.0);
        let hard = difficulty_config(4.0);
        assert!(hard.gap_height_max < easy.gap_height_max);
        assert!(hard.wall_gap_min < easy.wall_gap_min);
    }

    #[test]
    fn test_difficulty_for_score() {
        assert_eq!(difficulty_for_score(0, 400.0, 3.0), 1.0);
        assert_eq!(difficulty_for_score(200, 400.0, 3.0), 1.5);
        assert_eq!(difficulty_for_score(10_000, 400.0, 3.0), 3.0);
        assert_eq!(level_for_difficulty(2.7), 2);
    }
}
