//! The game server core: shared services, login and provisioning, viewer
//! actions and the per-session request loop.
//!
//! # Invariants
//! - Store and registry locks are never held at the same time.
//! - Login and signup failures are reported to the requesting session only.
//! - Action failures are reported to the acting session, which stays open.

mod actions;
mod auth;
mod config;
mod engine;
mod handler;
mod request;

pub use actions::ActionError;
pub use auth::{Login, LoginError, validate_username};
pub use config::{ConfigError, ServerConfig};
pub use engine::{Engine, ServerError};
pub use handler::{SessionEnd, handle_session};
pub use request::{FrameError, Request, parse_frame};
