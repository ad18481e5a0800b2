use cluster_common::DVec2;
use cluster_kernel::{MissionKind, SetupData};
use serde::{Deserialize, Serialize};

/// A message from a viewer, tagged by `command` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Request {
    Login {
        username: String,
        twitter_id: String,
        /// Only read when the player does not exist yet.
        #[serde(default)]
        setup: Option<SetupData>,
    },
    /// Everything inside the viewport.
    ScopeOfView { position: DVec2, resolution: DVec2 },
    /// Send `fleet` percent of the ships of each start planet to the end
    /// planet.
    StartMission {
        #[serde(rename = "type")]
        kind: MissionKind,
        start_planets: Vec<String>,
        end_planet: String,
        fleet: u8,
    },
    VoronoiDiagram { position: DVec2, resolution: DVec2 },
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Not JSON at all. Fatal to the session.
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),
    /// JSON, but not a request we understand.
    #[error("invalid request: {0}")]
    Invalid(#[source] serde_json::Error),
}

/// Decode one inbound frame into a request.
pub fn parse_frame(frame: &[u8]) -> Result<Request, FrameError> {
    let value: serde_json::Value = serde_json::from_slice(frame).map_err(FrameError::Malformed)?;
    serde_json::from_value(value).map_err(FrameError::Invalid)
}
