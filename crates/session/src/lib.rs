//! Sessions: the transport seam, the per-player session registry and the
//! responses it delivers.
//!
//! # Invariants
//! - A session is registered only after its player authenticated.
//! - Responses are sanitized per recipient player before encoding.

mod client;
mod memory;
mod registry;
mod response;
mod transport;

pub use client::{Client, OUTBOUND_CAPACITY, SEND_TIMEOUT};
pub use memory::{MemoryPeer, MemorySession};
pub use registry::{DeliveryReport, RegistryError, SessionRegistry};
pub use response::{MissionView, PlanetView, Response, StateChange, SunView};
pub use transport::{Session, TransportError};
