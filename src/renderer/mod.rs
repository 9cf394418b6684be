//! Rendering interface
//!
//! The simulation never draws. The scheduler hands the world to
//! [`render_frame`], which walks it in a fixed order and forwards every
//! primitive to a [`Renderer`] implementation supplied by the host.

use thiserror::Error;

use crate::game::GameStatus;
use crate::sim::events::RandomEventKind;
use crate::sim::state::{Ball, Barrier, PowerUp, World};
use crate::sim::style::{ComboData, ComboKind, StyleMeter, StyleNotification};
use crate::theme::ThemeKey;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("drawing surface lost")]
    SurfaceLost,
    #[error("draw call failed: {0}")]
    Draw(String),
}

pub type RenderResult = Result<(), RenderError>;

/// Drawing primitives a host must provide
pub trait Renderer {
    fn resize(&mut self, width: f32, height: f32) -> RenderResult;
    fn set_theme(&mut self, theme: ThemeKey) -> RenderResult;
    fn set_level(&mut self, level: u32) -> RenderResult;
    fn set_camera_offset_y(&mut self, offset: f32) -> RenderResult;
    fn clear(&mut self) -> RenderResult;
    fn draw_ball(&mut self, ball: &Ball) -> RenderResult;
    fn draw_obstacle(&mut self, obstacle: &Barrier) -> RenderResult;
    fn draw_horizontal_walls(&mut self, walls: &[Barrier]) -> RenderResult;
    fn draw_power_up(&mut self, power_up: &PowerUp) -> RenderResult;
    fn draw_wall_connection(&mut self, wall: &Barrier, obstacle: &Barrier) -> RenderResult;
    fn draw_score(&mut self, score: u64) -> RenderResult;
    fn draw_style_meter(&mut self, meter: &StyleMeter) -> RenderResult;
    fn draw_combo_counter(&mut self, kind: ComboKind, combo: &ComboData) -> RenderResult;
    fn draw_style_notification(&mut self, notification: &StyleNotification) -> RenderResult;
    /// Raw text overlay (countdown, pause banner, event labels)
    fn draw_text(&mut self, text: &str, x: f32, y: f32) -> RenderResult;
}

/// What the overlay layer needs to know beyond the world itself
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameContext {
    pub status: GameStatus,
    /// Countdown left while starting
    pub starting_remaining_ms: f64,
}

/// Draw one frame; stops at and returns the first failing call
pub fn render_frame<R: Renderer + ?Sized>(
    world: &World,
    ctx: &FrameContext,
    renderer: &mut R,
) -> RenderResult {
    renderer.set_camera_offset_y(world.camera_y)?;
    renderer.clear()?;

    for obstacle in &world.obstacles {
        renderer.draw_obstacle(obstacle)?;
    }
    renderer.draw_horizontal_walls(&world.walls)?;
    for wall in &world.walls {
        let Some(id) = wall.connection() else {
            continue;
        };
        if let Some(obstacle) = world.obstacles.iter().find(|o| o.id == id) {
            renderer.draw_wall_connection(wall, obstacle)?;
        }
    }

    let embedded = world
        .obstacles
        .iter()
        .chain(world.walls.iter())
        .filter_map(|b| b.power_up.as_ref());
    for power_up in embedded.chain(world.power_ups.iter()) {
        renderer.draw_power_up(power_up)?;
    }
    renderer.draw_ball(&world.ball)?;

    // HUD
    renderer.draw_score(world.score)?;
    renderer.draw_style_meter(&world.style)?;
    if let Some((kind, combo)) = world.combos.best() {
        renderer.draw_combo_counter(kind, &combo)?;
    }
    if let Some(notification) = world.style.notification.as_ref() {
        renderer.draw_style_notification(notification)?;
    }

    let center_x = world.canvas_width / 2.0;
    let center_y = world.canvas_height / 2.0;
    for event in &world.random_events {
        let label = match event.kind {
            RandomEventKind::SpeedSurge => "SPEED SURGE",
            RandomEventKind::SlowDrift => "SLOW DRIFT",
            RandomEventKind::ScoreFrenzy => "SCORE FRENZY",
            RandomEventKind::Blackout => "BLACKOUT",
        };
        renderer.draw_text(label, center_x, 40.0)?;
    }
    match ctx.status {
        GameStatus::Starting => {
            let seconds = (ctx.starting_remaining_ms / 1000.0).ceil().max(1.0);
            renderer.draw_text(&format!("{}", seconds as u32), center_x, center_y)?;
        }
        GameStatus::Paused => renderer.draw_text("PAUSED", center_x, center_y)?,
        GameStatus::GameOver => renderer.draw_text("GAME OVER", center_x, center_y)?,
        GameStatus::Idle | GameStatus::Playing => {}
    }
    Ok(())
}

/// Renderer that draws nothing (headless runs)
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn resize(&mut self, _width: f32, _height: f32) -> RenderResult {
        Ok(())
    }
    fn set_theme(&mut self, _theme: ThemeKey) -> RenderResult {
        Ok(())
    }
    fn set_level(&mut self, _level: u32) -> RenderResult {
        Ok(())
    }
    fn set_camera_offset_y(&mut self, _offset: f32) -> RenderResult {
        Ok(())
    }
    fn clear(&mut self) -> RenderResult {
        Ok(())
    }
    fn draw_ball(&mut self, _ball: &Ball) -> RenderResult {
        Ok(())
    }
    fn draw_obstacle(&mut self, _obstacle: &Barrier) -> RenderResult {
        Ok(())
    }
    fn draw_horizontal_walls(&mut self, _walls: &[Barrier]) -> RenderResult {
        Ok(())
    }
    fn draw_power_up(&mut self, _power_up: &PowerUp) -> RenderResult {
        Ok(())
    }
    fn draw_wall_connection(&mut self, _wall: &Barrier, _obstacle: &Barrier) -> RenderResult {
        Ok(())
    }
    fn draw_score(&mut self, _score: u64) -> RenderResult {
        Ok(())
    }
    fn draw_style_meter(&mut self, _meter: &StyleMeter) -> RenderResult {
        Ok(())
    }
    fn draw_combo_counter(&mut self, _kind: ComboKind, _combo: &ComboData) -> RenderResult {
        Ok(())
    }
    fn draw_style_notification(&mut self, _notification: &StyleNotification) -> RenderResult {
        Ok(())
    }
    fn draw_text(&mut self, _text: &str, _x: f32, _y: f32) -> RenderResult {
        Ok(())
    }
}

/// One recorded renderer call
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCall {
    Resize(f32, f32),
    Theme(ThemeKey),
    Level(u32),
    CameraOffset(f32),
    Clear,
    Ball,
    Obstacle(u32),
    Walls(usize),
    PowerUp(u32),
    Connection { wall: u32, obstacle: u32 },
    Score(u64),
    StyleMeter,
    Combo(ComboKind),
    StyleNotification,
    Text(String),
}

/// Renderer that records every call, optionally failing on clear
#[derive(Debug, Default, Clone)]
pub struct RecordingRenderer {
    pub calls: Vec<DrawCall>,
    /// Make `clear` return an error (simulates a lost surface)
    pub fail_clear: bool,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls since the last `Clear`
    pub fn last_frame(&self) -> &[DrawCall] {
        let start = self
            .calls
            .iter()
            .rposition(|c| *c == DrawCall::Clear)
            .unwrap_or(0);
        &self.calls[start..]
    }

    pub fn count(&self, pred: impl Fn(&DrawCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    fn push(&mut self, call: DrawCall) -> RenderResult {
        self.calls.push(call);
        Ok(())
    }
}

impl Renderer for RecordingRenderer {
    fn resize(&mut self, width: f32, height: f32) -> RenderResult {
        self.push(DrawCall::Resize(width, height))
    }
    fn set_theme(&mut self, theme: ThemeKey) -> RenderResult {
        self.push(DrawCall::Theme(theme))
    }
    fn set_level(&mut self, level: u32) -> RenderResult {
        self.push(DrawCall::Level(level))
    }
    fn set_camera_offset_y(&mut self, offset: f32) -> RenderResult {
        self.push(DrawCall::CameraOffset(offset))
    }
    fn clear(&mut self) -> RenderResult {
        if self.fail_clear {
            return Err(RenderError::SurfaceLost);
        }
        self.push(DrawCall::Clear)
    }
    fn draw_ball(&mut self, _ball: &Ball) -> RenderResult {
        self.push(DrawCall::Ball)
    }
    fn draw_obstacle(&mut self, obstacle: &Barrier) -> RenderResult {
        self.push(DrawCall::Obstacle(obstacle.id))
    }
    fn draw_horizontal_walls(&mut self, walls: &[Barrier]) -> RenderResult {
        self.push(DrawCall::Walls(walls.len()))
    }
    fn draw_power_up(&mut self, power_up: &PowerUp) -> RenderResult {
        self.push(DrawCall::PowerUp(power_up.id))
    }
    fn draw_wall_connection(&mut self, wall: &Barrier, obstacle: &Barrier) -> RenderResult {
        self.push(DrawCall::Connection {
            wall: wall.id,
            obstacle: obstacle.id,
        })
    }
    fn draw_score(&mut self, score: u64) -> RenderResult {
        self.push(DrawCall::Score(score))
    }
    fn draw_style_meter(&mut self, _meter: &StyleMeter) -> RenderResult {
        self.push(DrawCall::StyleMeter)
    }
    fn draw_combo_counter(&mut self, kind: ComboKind, _combo: &ComboData) -> RenderResult {
        self.push(DrawCall::Combo(kind))
    }
    fn draw_style_notification(&mut self, _notification: &StyleNotification) -> RenderResult {
        self.push(DrawCall::StyleNotification)
    }
    fn draw_text(&mut self, text: &str, _x: f32, _y: f32) -> RenderResult {
        self.push(DrawCall::Text(text.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::GameConfig;
    use crate::sim::generator::fill_lookahead;

    fn ctx(status: GameStatus) -> FrameContext {
        FrameContext {
            status,
            starting_remaining_ms: 2500.0,
        }
    }

    #[test]
    fn test_frame_order() {
        let config = GameConfig::default();
        let mut world = World::new(&config, 5);
        fill_lookahead(&mut world, &[], &config).unwrap();
        let mut renderer = RecordingRenderer::new();
        render_frame(&world, &ctx(GameStatus::Playing), &mut renderer).unwrap();

        assert_eq!(renderer.calls[0], DrawCall::CameraOffset(world.camera_y));
        assert_eq!(renderer.calls[1], DrawCall::Clear);
        let ball = renderer.calls.iter().position(|c| *c == DrawCall::Ball).unwrap();
        let walls = renderer
            .calls
            .iter()
            .position(|c| matches!(c, DrawCall::Walls(_)))
            .unwrap();
        assert!(walls < ball);
        assert_eq!(
            renderer.count(|c| matches!(c, DrawCall::Obstacle(_))),
            world.obstacles.len()
        );
        assert!(renderer.calls.contains(&DrawCall::Score(0)));
    }

    #[test]
    fn test_countdown_overlay() {
        let config = GameConfig::default();
        let world = World::new(&config, 5);
        let mut renderer = RecordingRenderer::new();
        render_frame(&world, &ctx(GameStatus::Starting), &mut renderer).unwrap();
        assert!(renderer.calls.contains(&DrawCall::Text("3".into())));
    }

    #[test]
    fn test_first_error_stops_frame() {
        let config = GameConfig::default();
        let world = World::new(&config, 5);
        let mut renderer = RecordingRenderer {
            fail_clear: true,
            ..Default::default()
        };
        assert!(matches!(
            render_frame(&world, &ctx(GameStatus::Playing), &mut renderer),
            Err(RenderError::SurfaceLost)
        ));
        assert!(!renderer.calls.contains(&DrawCall::Ball));
    }
}
