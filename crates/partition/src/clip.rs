//! Clipping of cell edges against the viewport.

use cluster_common::{DVec2, Rect};
use serde::{Deserialize, Serialize};

/// A straight cell boundary segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub start: DVec2,
    pub end: DVec2,
}

impl Edge {
    pub fn new(start: DVec2, end: DVec2) -> Self {
        Self { start, end }
    }
}

/// Sides of the viewport, in the order crossings are tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Top,
    Bottom,
    Right,
}

impl Side {
    pub const ORDER: [Side; 4] = [Side::Left, Side::Top, Side::Bottom, Side::Right];
}

/// Clip `edge` to `viewport`.
///
/// Edges fully inside are kept, edges with both ends outside are dropped, and
/// an edge with one end outside has that end moved onto the boundary.
pub fn clip_edge(edge: Edge, viewport: Rect) -> Option<Edge> {
    match (viewport.contains(edge.start), viewport.contains(edge.end)) {
        (true, true) => Some(edge),
        (true, false) => boundary_crossing(edge.start, edge.end, viewport).map(|end| Edge {
            start: edge.start,
            end,
        }),
        (false, true) => boundary_crossing(edge.end, edge.start, viewport).map(|start| Edge {
            start,
            end: edge.end,
        }),
        (false, false) => None,
    }
}

/// Where the segment from `inside` to `outside` leaves `viewport`.
///
/// Sides are tried in [`Side::ORDER`]. A side parallel to the segment is
/// skipped. A crossing counts only if it lies on the segment and within the
/// side's extent.
pub fn boundary_crossing(inside: DVec2, outside: DVec2, viewport: Rect) -> Option<DVec2> {
    let delta = outside - inside;
    Side::ORDER.into_iter().find_map(|side| {
        let (vertical, line) = match side {
            Side::Left => (true, viewport.min.x),
            Side::Right => (true, viewport.max.x),
            Side::Top => (false, viewport.max.y),
            Side::Bottom => (false, viewport.min.y),
        };
        let (along, from) = if vertical {
            (delta.x, inside.x)
        } else {
            (delta.y, inside.y)
        };
        if along == 0.0 {
            return None;
        }
        let t = (line - from) / along;
        if !(0.0..=1.0).contains(&t) {
            return None;
        }
        let point = if vertical {
            DVec2::new(line, inside.y + t * delta.y)
        } else {
            DVec2::new(inside.x + t * delta.x, line)
        };
        let within = if vertical {
            (viewport.min.y..=viewport.max.y).contains(&point.y)
        } else {
            (viewport.min.x..=viewport.max.x).contains(&point.x)
        };
        within.then_some(point)
    })
}
