//! Shared types for the cluster world engine: rectangles, axes, session ids, clock.

mod types;

pub use glam::{DVec2, I64Vec2};
pub use types::{Axis, Rect, SessionId, unix_now, unix_now_millis};
