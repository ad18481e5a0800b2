use cluster_common::{DVec2, I64Vec2};
use serde::{Deserialize, Serialize};

use crate::key::mission_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionKind {
    Attack,
    Supply,
    Spy,
}

/// One end of a mission's flight path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Key of the planet at this end.
    pub planet: String,
    pub position: I64Vec2,
}

/// A fleet in flight between two planets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mission {
    pub kind: MissionKind,
    /// Username of the launching player.
    pub player: String,
    pub ship_count: i64,
    /// Unix milliseconds of launch.
    pub start_time: i64,
    /// Flight duration in milliseconds.
    pub travel_time: i64,
    pub source: Waypoint,
    pub target: Waypoint,
}

impl Mission {
    /// `mission.<start-ms>_X_Y` of the launch time and source planet.
    pub fn key(&self) -> String {
        mission_key(
            self.start_time,
            self.source.position.x,
            self.source.position.y,
        )
    }

    /// Missions are indexed by their launch position.
    pub fn world_position(&self) -> DVec2 {
        self.source.position.as_dvec2()
    }

    /// Launch time plus travel time, in milliseconds.
    pub fn arrival_time(&self) -> i64 {
        self.start_time + self.travel_time
    }
}

/// Flight duration in milliseconds between two points at `speed` world
/// units per second.
pub fn travel_time(from: DVec2, to: DVec2, speed: f64) -> i64 {
    if speed <= 0.0 {
        return 0;
    }
    (from.distance(to) / speed * 1000.0).round() as i64
}
