//! Theme keys and their display palettes

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Named visual theme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThemeKey {
    #[default]
    Classic,
    Neon,
    Sunset,
    Ocean,
    Forest,
}

impl ThemeKey {
    pub const ALL: [ThemeKey; 5] = [
        ThemeKey::Classic,
        ThemeKey::Neon,
        ThemeKey::Sunset,
        ThemeKey::Ocean,
        ThemeKey::Forest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeKey::Classic => "classic",
            ThemeKey::Neon => "neon",
            ThemeKey::Sunset => "sunset",
            ThemeKey::Ocean => "ocean",
            ThemeKey::Forest => "forest",
        }
    }

    /// Lenient lookup used for chunk theme tags
    pub fn from_tag(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "classic" | "default" => Some(ThemeKey::Classic),
            "neon" => Some(ThemeKey::Neon),
            "sunset" => Some(ThemeKey::Sunset),
            "ocean" | "sea" => Some(ThemeKey::Ocean),
            "forest" => Some(ThemeKey::Forest),
            _ => None,
        }
    }
}

/// Display colors for a theme (0xRRGGBB)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: u32,
    pub obstacle: u32,
    pub wall: u32,
    pub ball: u32,
    pub accent: u32,
}

pub fn palette(key: ThemeKey) -> Palette {
    match key {
        ThemeKey::Classic => Palette {
            background: 0x70C5CE,
            obstacle: 0x5EBD3E,
            wall: 0x8B5A2B,
            ball: 0xF7D51D,
            accent: 0xFFFFFF,
        },
        ThemeKey::Neon => Palette {
            background: 0x0B0B1A,
            obstacle: 0xFF2E97,
            wall: 0x00F0FF,
            ball: 0xF9F871,
            accent: 0x9D4EDD,
        },
        ThemeKey::Sunset => Palette {
            background: 0xFF9A5A,
            obstacle: 0x6A2C70,
            wall: 0xB83B5E,
            ball: 0xF9ED69,
            accent: 0xF08A5D,
        },
        ThemeKey::Ocean => Palette {
            background: 0x0F4C75,
            obstacle: 0x3282B8,
            wall: 0x1B262C,
            ball: 0xBBE1FA,
            accent: 0x00B7C2,
        },
        ThemeKey::Forest => Palette {
            background: 0x2D4030,
            obstacle: 0x5C8D4F,
            wall: 0x6B4F2A,
            ball: 0xE9C46A,
            accent: 0xA7C957,
        },
    }
}

/// Pick a theme different from `current`
pub fn random_theme<R: Rng + ?Sized>(rng: &mut R, current: ThemeKey) -> ThemeKey {
    let choices: Vec<ThemeKey> = ThemeKey::ALL
        .iter()
        .copied()
        .filter(|k| *k != current)
        .collect();
    choices[rng.random_range(0..choices.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_random_theme_changes() {
        let mut rng = Pcg32::seed_from_u64(7);
        for _ in 0..20 {
            assert_ne!(random_theme(&mut rng, ThemeKey::Neon), ThemeKey::Neon);
        }
    }

    #[test]
    fn test_from_tag() {
        assert_eq!(ThemeKey::from_tag(" Ocean "), Some(ThemeKey::Ocean));
        assert_eq!(ThemeKey::from_tag("lava"), None);
        for key in ThemeKey::ALL {
            assert_eq!(ThemeKey::from_tag(key.as_str()), Some(key));
        }
    }
}
