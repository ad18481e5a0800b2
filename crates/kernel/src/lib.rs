//! World kernel: entities, their keys and record codec, lazy ship accrual and
//! deterministic home-system generation.
//!
//! # Invariants
//! - An entity's key is derived from its kind and identifying fields and is
//!   stable for the entity's lifetime.
//! - Generation is a pure function of the player id and the sun position.

pub mod entity;
pub mod generator;
pub mod key;
pub mod mission;
pub mod planet;
pub mod player;
pub mod sun;

pub use entity::{DecodeError, EncodeError, Entity, Record};
pub use generator::{
    GenerateError, GeneratedSystem, GeneratorConfig, digest_digits, generate_planets,
    generate_system, place_sun,
};
pub use key::{
    EntityKind, KeyError, mission_key, parse_planet_key, parse_player_key, parse_sun_key,
    planet_key, player_key, split_key, sun_key,
};
pub use mission::{Mission, MissionKind, Waypoint, travel_time};
pub use planet::{Planet, accrual_period, accrued};
pub use player::{Player, SetupData, SetupError};
pub use sun::Sun;
