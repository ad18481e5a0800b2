use cluster_common::{DVec2, Rect, unix_now, unix_now_millis};
use cluster_kernel::{Entity, EntityKind, Mission, MissionKind, Planet, Waypoint, travel_time};
use cluster_partition::PartitionError;
use cluster_persist::StoreError;
use cluster_session::{Response, StateChange};

use crate::engine::Engine;

/// Failures of a viewer action. They are reported to the acting session,
/// which stays connected.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("viewport must be finite and non-negative")]
    InvalidViewport,
    #[error("fleet must be between 1 and 100 percent, got {0}")]
    InvalidFleet(u8),
    #[error("a mission needs at least one start planet")]
    NoStartPlanets,
    #[error("unknown planet {0}")]
    UnknownPlanet(String),
    #[error("planet {0} is not yours")]
    NotOwner(String),
    #[error("planet {0} cannot target itself")]
    SameSource(String),
    #[error("planet {0} is listed more than once")]
    DuplicateSource(String),
    #[error("no ships to send")]
    NoShips,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Partition(#[from] PartitionError),
}

fn viewport(position: DVec2, resolution: DVec2) -> Result<Rect, ActionError> {
    if !position.is_finite() || !resolution.is_finite() || resolution.min_element() < 0.0 {
        return Err(ActionError::InvalidViewport);
    }
    Ok(Rect::from_center_size(position, resolution))
}

impl Engine {
    /// Planets, suns and missions inside the viewport.
    pub fn scope_of_view(
        &self,
        position: DVec2,
        resolution: DVec2,
    ) -> Result<Response, ActionError> {
        let rect = viewport(position, resolution)?;
        let now = unix_now();
        let mut change = StateChange::new();
        for kind in [EntityKind::Planet, EntityKind::Sun, EntityKind::Mission] {
            for entity in self.store.find_in_rect(kind, rect)? {
                match entity {
                    Entity::Planet(planet) => change.add_planet(&planet, now),
                    Entity::Sun(sun) => change.add_sun(&sun),
                    Entity::Mission(mission) => change.add_mission(&mission),
                    Entity::Player(_) => {}
                }
            }
        }
        tracing::debug!(
            planets = change.planets.len(),
            suns = change.suns.len(),
            missions = change.missions.len(),
            "scope of view"
        );
        Ok(Response::StateChange(change))
    }

    /// Territory polygons of the planets around the viewport.
    pub fn voronoi_diagram(
        &self,
        position: DVec2,
        resolution: DVec2,
    ) -> Result<Response, ActionError> {
        viewport(position, resolution)?;
        let polygons = self.partitioner.partition(&self.store, position, resolution)?;
        Ok(Response::VoronoiDiagram { polygons })
    }

    /// Launch `fleet` percent of the ships on each start planet toward
    /// `end_planet`. Every viewer is told about the new missions and the
    /// drained planets.
    pub fn start_mission(
        &self,
        username: &str,
        kind: MissionKind,
        start_planets: &[String],
        end_planet: &str,
        fleet: u8,
    ) -> Result<Vec<Mission>, ActionError> {
        if !(1..=100).contains(&fleet) {
            return Err(ActionError::InvalidFleet(fleet));
        }
        if start_planets.is_empty() {
            return Err(ActionError::NoStartPlanets);
        }
        let target = self.planet(end_planet)?;
        let target_waypoint = Waypoint {
            planet: end_planet.to_string(),
            position: target.position,
        };

        // validate every source before touching any of them
        let mut sources: Vec<Planet> = Vec::with_capacity(start_planets.len());
        for (ix, key) in start_planets.iter().enumerate() {
            if key == end_planet {
                return Err(ActionError::SameSource(key.clone()));
            }
            if start_planets[..ix].contains(key) {
                return Err(ActionError::DuplicateSource(key.clone()));
            }
            let planet = self.planet(key)?;
            if !planet.is_owned_by(username) {
                return Err(ActionError::NotOwner(key.clone()));
            }
            sources.push(planet);
        }

        let now = unix_now();
        let start_time = unix_now_millis();
        let mut change = StateChange::new();
        let mut missions = Vec::new();
        for mut source in sources {
            let available = source.ship_count(now);
            let sent = available * i64::from(fleet) / 100;
            if sent <= 0 {
                continue;
            }
            source.set_ship_count(available - sent, now);
            let mission = Mission {
                kind,
                player: username.to_string(),
                ship_count: sent,
                start_time,
                travel_time: travel_time(
                    source.world_position(),
                    target.world_position(),
                    self.config.mission_speed,
                ),
                source: Waypoint {
                    planet: source.key(),
                    position: source.position,
                },
                target: target_waypoint.clone(),
            };
            self.store.save(&source.clone().into())?;
            self.store.save(&mission.clone().into())?;
            change.add_planet(&source, now);
            change.add_mission(&mission);
            missions.push(mission);
        }
        if missions.is_empty() {
            return Err(ActionError::NoShips);
        }

        tracing::info!(
            username,
            ?kind,
            target = end_planet,
            missions = missions.len(),
            "missions launched"
        );
        self.registry.broadcast(&Response::StateChange(change));
        Ok(missions)
    }

    fn planet(&self, key: &str) -> Result<Planet, ActionError> {
        match self.store.get_as::<Planet>(key) {
            Ok(planet) => Ok(planet),
            Err(e) if e.is_not_found() => Err(ActionError::UnknownPlanet(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use cluster_common::I64Vec2;
    use cluster_persist::{EntityStore, MemoryBackend};
    use cluster_session::{Client, MemorySession};
    use std::sync::Arc;

    fn engine() -> Engine {
        Engine::new(EntityStore::open(MemoryBackend::new()), ServerConfig::default())
    }

    fn seed(engine: &Engine, x: i64, owner: Option<&str>, ships: i64) -> String {
        let mut planet = Planet::new(I64Vec2::new(x, 0), 1, 0, ships, unix_now());
        planet.owner = owner.map(String::from);
        let key = planet.key();
        engine.store().save(&planet.into()).unwrap();
        key
    }

    #[test]
    fn scope_returns_entities_in_view() {
        let engine = engine();
        seed(&engine, 0, None, 10);
        seed(&engine, 300, Some("alice"), 10);
        seed(&engine, 5_000, None, 10);
        let response = engine
            .scope_of_view(DVec2::ZERO, DVec2::new(1000.0, 1000.0))
            .unwrap();
        let Response::StateChange(change) = response else {
            panic!("expected state change");
        };
        assert_eq!(change.planets.len(), 2);
        assert!(change.planets.contains_key("planet.300_0"));
    }

    #[test]
    fn invalid_viewport_is_an_action_error() {
        let err = engine()
            .scope_of_view(DVec2::ZERO, DVec2::new(f64::NAN, 1.0))
            .unwrap_err();
        assert!(matches!(err, ActionError::InvalidViewport));
    }

    #[tokio::test]
    async fn mission_moves_ships_and_is_broadcast() {
        let engine = engine();
        let source = seed(&engine, 0, Some("alice"), 40);
        let target = seed(&engine, 1_000, None, 10);

        let (session, mut peer) = MemorySession::pair();
        let watcher = Arc::new(Client::new("bob", Arc::new(session)));
        engine.registry().add(watcher).unwrap();

        let missions = engine
            .start_mission("alice", MissionKind::Attack, &[source.clone()], &target, 25)
            .unwrap();
        assert_eq!(missions.len(), 1);
        assert_eq!(missions[0].ship_count, 10);
        assert_eq!(missions[0].travel_time, 10_000);
        assert_eq!(missions[0].target.planet, target);

        let drained: Planet = engine.store().get_as(&source).unwrap();
        assert_eq!(drained.cached_ship_count(), 30);
        assert_eq!(engine.store().find_all::<Mission>().unwrap().len(), 1);

        let Some(Response::StateChange(change)) = peer.recv_response().await else {
            panic!("expected a broadcast");
        };
        assert_eq!(change.missions.len(), 1);
        // bob does not own the mission or the planet
        assert!(change.missions.values().all(|m| m.ship_count.is_none()));
        assert_eq!(change.planets[&source].ship_count, None);
    }

    #[test]
    fn mission_from_foreign_planet_is_refused() {
        let engine = engine();
        let source = seed(&engine, 0, Some("bob"), 40);
        let target = seed(&engine, 10, None, 0);
        let err = engine
            .start_mission("alice", MissionKind::Spy, &[source], &target, 50)
            .unwrap_err();
        assert!(matches!(err, ActionError::NotOwner(_)));
    }

    #[test]
    fn mission_argument_checks() {
        let engine = engine();
        let source = seed(&engine, 0, Some("alice"), 1);
        let target = seed(&engine, 10, None, 0);
        let start = std::slice::from_ref(&source);

        let err = engine
            .start_mission("alice", MissionKind::Supply, start, &target, 0)
            .unwrap_err();
        assert!(matches!(err, ActionError::InvalidFleet(0)));
        let err = engine
            .start_mission("alice", MissionKind::Supply, start, "planet.99_99", 50)
            .unwrap_err();
        assert!(matches!(err, ActionError::UnknownPlanet(_)));
        let err = engine
            .start_mission("alice", MissionKind::Supply, start, &source, 50)
            .unwrap_err();
        assert!(matches!(err, ActionError::SameSource(_)));
        // 50% of one ship rounds down to nothing
        let err = engine
            .start_mission("alice", MissionKind::Supply, start, &target, 50)
            .unwrap_err();
        assert!(matches!(err, ActionError::NoShips));
    }

    #[test]
    fn repeated_start_planet_is_refused() {
        let engine = engine();
        let source = seed(&engine, 0, Some("alice"), 40);
        let target = seed(&engine, 10, None, 0);
        let err = engine
            .start_mission(
                "alice",
                MissionKind::Attack,
                &[source.clone(), source.clone()],
                &target,
                50,
            )
            .unwrap_err();
        assert!(matches!(err, ActionError::DuplicateSource(ref key) if *key == source));

        // nothing launched, nothing drained
        assert!(engine.store().find_all::<Mission>().unwrap().is_empty());
        let untouched: Planet = engine.store().get_as(&source).unwrap();
        assert_eq!(untouched.cached_ship_count(), 40);
    }

    #[test]
    fn voronoi_covers_viewport() {
        let engine = engine();
        seed(&engine, -400, Some("alice"), 1);
        seed(&engine, 400, Some("bob"), 1);
        let mut planet = Planet::new(I64Vec2::new(0, 600), 1, 0, 1, 0);
        planet.owner = Some("carol".into());
        engine.store().save(&planet.into()).unwrap();

        let response = engine
            .voronoi_diagram(DVec2::ZERO, DVec2::new(2000.0, 2000.0))
            .unwrap();
        let Response::VoronoiDiagram { polygons } = response else {
            panic!("expected voronoi diagram");
        };
        assert_eq!(polygons.len(), 3);
    }
}
