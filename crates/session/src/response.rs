//! Messages sent to viewers.
//!
//! Every response is sanitized for its recipient before it is encoded: ship
//! counts of planets and missions that belong to someone else are redacted.

use std::collections::BTreeMap;

use cluster_common::{DVec2, I64Vec2};
use cluster_kernel::{Mission, MissionKind, Planet, Sun, Waypoint};
use cluster_partition::Polygon;
use serde::{Deserialize, Serialize};

/// A planet as a viewer sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanetView {
    pub owner: Option<String>,
    pub position: I64Vec2,
    pub size: u8,
    pub texture: u8,
    pub is_home: bool,
    /// `None` when the recipient may not see it.
    pub ship_count: Option<i64>,
}

impl PlanetView {
    /// View of `planet` with ships accrued up to `now`.
    pub fn of(planet: &Planet, now: i64) -> Self {
        Self {
            owner: planet.owner.clone(),
            position: planet.position,
            size: planet.size,
            texture: planet.texture,
            is_home: planet.is_home,
            ship_count: Some(planet.ship_count_at(now)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SunView {
    pub username: String,
    pub position: DVec2,
    pub texture: u8,
}

impl From<&Sun> for SunView {
    fn from(sun: &Sun) -> Self {
        Self {
            username: sun.username.clone(),
            position: sun.position,
            texture: sun.texture,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionView {
    pub kind: MissionKind,
    pub player: String,
    pub ship_count: Option<i64>,
    pub start_time: i64,
    pub travel_time: i64,
    pub source: Waypoint,
    pub target: Waypoint,
}

impl From<&Mission> for MissionView {
    fn from(mission: &Mission) -> Self {
        Self {
            kind: mission.kind,
            player: mission.player.clone(),
            ship_count: Some(mission.ship_count),
            start_time: mission.start_time,
            travel_time: mission.travel_time,
            source: mission.source.clone(),
            target: mission.target.clone(),
        }
    }
}

/// Entities that appeared or changed, keyed by entity key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub planets: BTreeMap<String, PlanetView>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub suns: BTreeMap<String, SunView>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub missions: BTreeMap<String, MissionView>,
}

impl StateChange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a planet as seen at `now`.
    pub fn add_planet(&mut self, planet: &Planet, now: i64) {
        self.planets.insert(planet.key(), PlanetView::of(planet, now));
    }

    pub fn add_sun(&mut self, sun: &Sun) {
        self.suns.insert(sun.key(), sun.into());
    }

    pub fn add_mission(&mut self, mission: &Mission) {
        self.missions.insert(mission.key(), mission.into());
    }

    pub fn with_planet(mut self, planet: &Planet, now: i64) -> Self {
        self.add_planet(planet, now);
        self
    }

    pub fn with_sun(mut self, sun: &Sun) -> Self {
        self.add_sun(sun);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.planets.is_empty() && self.suns.is_empty() && self.missions.is_empty()
    }

    fn redact_for(&mut self, recipient: &str) {
        for planet in self.planets.values_mut() {
            if planet.owner.as_deref() != Some(recipient) {
                planet.ship_count = None;
            }
        }
        for mission in self.missions.values_mut() {
            if mission.player != recipient {
                mission.ship_count = None;
            }
        }
    }
}

/// A message to a viewer, tagged by `command` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Response {
    LoginSuccess {
        username: String,
        race_id: u8,
        home_planet: String,
        /// Home planet position, where the viewer starts.
        position: I64Vec2,
    },
    LoginFailed {
        reason: String,
    },
    StateChange(StateChange),
    VoronoiDiagram {
        polygons: Vec<Polygon>,
    },
    Error {
        message: String,
    },
}

impl Response {
    /// An error reply.
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }

    /// Copy of this response as `recipient` may see it.
    pub fn sanitized_for(&self, recipient: &str) -> Response {
        let mut sanitized = self.clone();
        if let Response::StateChange(change) = &mut sanitized {
            change.redact_for(recipient);
        }
        sanitized
    }

    /// Serialize as one JSON frame.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(frame: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planet(x: i64, owner: Option<&str>) -> Planet {
        let mut planet = Planet::new(I64Vec2::new(x, 0), 1, 0, 10, 0);
        planet.owner = owner.map(String::from);
        planet
    }

    fn mission(player: &str) -> Mission {
        Mission {
            kind: MissionKind::Attack,
            player: player.into(),
            ship_count: 4,
            start_time: 1_000,
            travel_time: 2_000,
            source: Waypoint {
                planet: "planet.0_0".into(),
                position: I64Vec2::ZERO,
            },
            target: Waypoint {
                planet: "planet.9_0".into(),
                position: I64Vec2::new(9, 0),
            },
        }
    }

    #[test]
    fn foreign_ship_counts_are_redacted() {
        let mut change = StateChange::new()
            .with_planet(&planet(1, Some("alice")), 0)
            .with_planet(&planet(2, Some("bob")), 0)
            .with_planet(&planet(3, None), 0);
        change.add_mission(&mission("alice"));
        change.add_mission(&Mission {
            start_time: 5_000,
            ..mission("bob")
        });
        let response = Response::StateChange(change);

        let Response::StateChange(seen) = response.sanitized_for("alice") else {
            panic!("variant changed");
        };
        assert_eq!(seen.planets["planet.1_0"].ship_count, Some(10));
        assert_eq!(seen.planets["planet.2_0"].ship_count, None);
        assert_eq!(seen.planets["planet.3_0"].ship_count, None);
        assert_eq!(seen.missions["mission.1000_0_0"].ship_count, Some(4));
        assert_eq!(seen.missions["mission.5000_0_0"].ship_count, None);

        // the shared message stays unredacted for the next recipient
        let Response::StateChange(seen) = response.sanitized_for("bob") else {
            panic!("variant changed");
        };
        assert_eq!(seen.planets["planet.2_0"].ship_count, Some(10));
        assert_eq!(seen.planets["planet.1_0"].ship_count, None);
    }

    #[test]
    fn wire_form_is_tagged_by_command() {
        let json: serde_json::Value =
            serde_json::from_slice(&Response::error("nope").encode().unwrap()).unwrap();
        assert_eq!(json["command"], "error");
        assert_eq!(json["message"], "nope");

        let change = StateChange::new().with_sun(&Sun::new(DVec2::new(1.0, 2.0), "alice"));
        let json: serde_json::Value =
            serde_json::from_slice(&Response::StateChange(change).encode().unwrap()).unwrap();
        assert_eq!(json["command"], "state_change");
        assert_eq!(json["suns"]["sun.1_2"]["username"], "alice");
        assert!(json.get("planets").is_none());

        let redacted = Response::StateChange(StateChange::new().with_planet(&planet(5, None), 0))
            .sanitized_for("alice")
            .encode()
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&redacted).unwrap();
        assert!(json["planets"]["planet.5_0"]["ship_count"].is_null());
    }

    #[test]
    fn decode_inverts_encode() {
        let response = Response::LoginSuccess {
            username: "alice".into(),
            race_id: 2,
            home_planet: "planet.1_2".into(),
            position: I64Vec2::new(1, 2),
        };
        assert_eq!(Response::decode(&response.encode().unwrap()).unwrap(), response);
    }

    #[test]
    fn planet_view_accrues_to_now() {
        let view = PlanetView::of(&planet(0, Some("alice")), 100);
        assert_eq!(view.ship_count, Some(20));
    }
}
