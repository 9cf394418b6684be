//! Collision detection and gap-passage classification
//!
//! The ball is treated as its bounding square. A barrier is its rectangle
//! minus the gap, so a hit means the square overlaps either solid piece.

use super::state::{Ball, Barrier, BarrierKind, PassQuality};
use crate::consts::{CLOSE_CALL_THRESHOLD, PERFECT_FRACTION};
use crate::ranges_overlap;

/// Whether the ball overlaps the solid part of a barrier
pub fn ball_hits_barrier(ball: &Ball, barrier: &Barrier) -> bool {
    let (gap_start, gap_end) = barrier.gap_span();
    match barrier.kind {
        BarrierKind::Vertical { .. } => {
            if !ranges_overlap(ball.left(), ball.right(), barrier.left(), barrier.right()) {
                return false;
            }
            ranges_overlap(ball.top(), ball.bottom(), barrier.top(), gap_start)
                || ranges_overlap(ball.top(), ball.bottom(), gap_end, barrier.bottom())
        }
        BarrierKind::Horizontal { .. } => {
            if !ranges_overlap(ball.top(), ball.bottom(), barrier.top(), barrier.bottom()) {
                return false;
            }
            ranges_overlap(ball.left(), ball.right(), barrier.left(), gap_start)
                || ranges_overlap(ball.left(), ball.right(), gap_end, barrier.right())
        }
    }
}

/// Ball has left the top or bottom of the world
pub fn ball_out_of_bounds(ball: &Ball, world_height: f32) -> bool {
    ball.top() < 0.0 || ball.bottom() > world_height
}

/// Grade a passage by where the ball center sat relative to the gap
///
/// `offset` is the distance from the gap center, `half` the gap half-size.
pub fn classify_pass(offset: f32, half: f32, ball_radius: f32) -> PassQuality {
    let offset = offset.abs();
    if offset <= half * PERFECT_FRACTION {
        return PassQuality::Perfect;
    }
    let edge_clearance = half - offset - ball_radius;
    if edge_clearance <= CLOSE_CALL_THRESHOLD {
        PassQuality::CloseCall
    } else {
        PassQuality::Plain
    }
}

fn within(value: f32, (start, end): (f32, f32)) -> bool {
    value >= start && value <= end
}

/// Check whether the ball just cleared a barrier's gap
///
/// `scroll_dx` is this tick's horizontal scroll (negative when moving
/// left); the previous-tick geometry is reconstructed from it so that
/// large steps can't skip the check. Returns `None` when the barrier was
/// already passed or the crossing hasn't happened yet.
pub fn check_gap_passage(ball: &Ball, barrier: &Barrier, scroll_dx: f32) -> Option<PassQuality> {
    if barrier.passed {
        return None;
    }
    let span = barrier.gap_span();
    let prev_span = match barrier.kind {
        BarrierKind::Vertical { .. } => span,
        BarrierKind::Horizontal { .. } => (span.0 - scroll_dx, span.1 - scroll_dx),
    };
    let half = barrier.gap_size() / 2.0;

    match barrier.kind {
        BarrierKind::Vertical { .. } => {
            // Trailing edge has gone past the ball center
            if ball.pos.x <= barrier.right() {
                return None;
            }
            let probe = if within(ball.pos.y, span) {
                ball.pos.y
            } else if within(ball.prev_pos.y, prev_span) {
                ball.prev_pos.y
            } else {
                return None;
            };
            Some(classify_pass(probe - barrier.gap_center(), half, ball.radius))
        }
        BarrierKind::Horizontal { .. } => {
            // Ball center crossed the wall's center line, in either direction
            let line = barrier.top() + barrier.height / 2.0;
            let crossed = (ball.prev_pos.y < line && ball.pos.y >= line)
                || (ball.prev_pos.y > line && ball.pos.y <= line);
            if !crossed {
                return None;
            }
            let (probe, center) = if within(ball.pos.x, span) {
                (ball.pos.x, barrier.gap_center())
            } else if within(ball.prev_pos.x, prev_span) {
                (ball.prev_pos.x, barrier.gap_center() - scroll_dx)
            } else {
                return None;
            };
            Some(classify_pass(probe - center, half, ball.radius))
        }
    }
}

/// Whether a wall seals off a vertical obstacle's gap
///
/// True when the wall's band cuts through the gap at the obstacle's X
/// range and the wall's own gap doesn't cover the obstacle.
pub fn wall_blocks_gap(wall: &Barrier, obstacle: &Barrier) -> bool {
    if !ranges_overlap(wall.left(), wall.right(), obstacle.left(), obstacle.right()) {
        return false;
    }
    let (gap_top, gap_bottom) = obstacle.gap_span();
    if !ranges_overlap(wall.top(), wall.bottom(), gap_top, gap_bottom) {
        return false;
    }
    let (wall_gap_start, wall_gap_end) = wall.gap_span();
    !(wall_gap_start <= obstacle.left() && wall_gap_end >= obstacle.right())
}
