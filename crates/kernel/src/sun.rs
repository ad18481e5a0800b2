use cluster_common::DVec2;
use serde::{Deserialize, Serialize};

use crate::key::sun_key;

/// A star at the centre of a generated system.
///
/// The position lives in the key only; the record body carries the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sun {
    #[serde(skip)]
    pub position: DVec2,
    pub texture: u8,
    /// Player whose signup generated this system.
    pub username: String,
}

impl Sun {
    /// A sun owned by `username` with the default texture.
    pub fn new(position: DVec2, username: impl Into<String>) -> Self {
        Self {
            position,
            texture: 0,
            username: username.into(),
        }
    }

    /// Key carrying the exact position.
    pub fn key(&self) -> String {
        sun_key(self.position)
    }
}
