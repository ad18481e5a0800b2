//! The entity sum type and its record codec.
//!
//! # Invariants
//! - Decoding a record under `key` yields an entity whose `key()` is `key`.
//! - A malformed record produces a [`DecodeError`], never a partial entity.

use cluster_common::DVec2;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::key::{EntityKind, KeyError, parse_player_key, parse_sun_key, split_key};
use crate::mission::Mission;
use crate::planet::Planet;
use crate::player::Player;
use crate::sun::Sun;

/// Errors from decoding a stored record.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error("malformed record for {key}: {source}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("record stored under {key} derives key {derived}")]
    KeyMismatch { key: String, derived: String },
}

/// Failed to serialize an entity.
#[derive(Debug, thiserror::Error)]
#[error("failed to encode {key}: {source}")]
pub struct EncodeError {
    pub key: String,
    #[source]
    pub source: serde_json::Error,
}

/// A variant of [`Entity`] that can be stored on its own.
pub trait Record: Sized + Serialize + DeserializeOwned {
    const KIND: EntityKind;

    fn key(&self) -> String;

    /// Coordinate used by the spatial indices, if the entity has one.
    fn position(&self) -> Option<DVec2>;

    /// Restore fields that are carried by the key instead of the record body.
    fn restore_from_key(&mut self, _key: &str) -> Result<(), KeyError> {
        Ok(())
    }

    fn into_entity(self) -> Entity;

    fn from_entity(entity: Entity) -> Option<Self>;
}

impl Record for Planet {
    const KIND: EntityKind = EntityKind::Planet;

    fn key(&self) -> String {
        Planet::key(self)
    }

    fn position(&self) -> Option<DVec2> {
        Some(self.world_position())
    }

    fn into_entity(self) -> Entity {
        Entity::Planet(self)
    }

    fn from_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::Planet(p) => Some(p),
            _ => None,
        }
    }
}

impl Record for Sun {
    const KIND: EntityKind = EntityKind::Sun;

    fn key(&self) -> String {
        Sun::key(self)
    }

    fn position(&self) -> Option<DVec2> {
        Some(self.position)
    }

    fn restore_from_key(&mut self, key: &str) -> Result<(), KeyError> {
        self.position = parse_sun_key(key)?;
        Ok(())
    }

    fn into_entity(self) -> Entity {
        Entity::Sun(self)
    }

    fn from_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::Sun(s) => Some(s),
            _ => None,
        }
    }
}

impl Record for Player {
    const KIND: EntityKind = EntityKind::Player;

    fn key(&self) -> String {
        Player::key(self)
    }

    fn position(&self) -> Option<DVec2> {
        None
    }

    fn restore_from_key(&mut self, key: &str) -> Result<(), KeyError> {
        self.username = parse_player_key(key)?.to_string();
        Ok(())
    }

    fn into_entity(self) -> Entity {
        Entity::Player(self)
    }

    fn from_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::Player(p) => Some(p),
            _ => None,
        }
    }
}

impl Record for Mission {
    const KIND: EntityKind = EntityKind::Mission;

    fn key(&self) -> String {
        Mission::key(self)
    }

    fn position(&self) -> Option<DVec2> {
        Some(self.world_position())
    }

    fn into_entity(self) -> Entity {
        Entity::Mission(self)
    }

    fn from_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::Mission(m) => Some(m),
            _ => None,
        }
    }
}

/// A persisted, uniquely keyed world object.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Planet(Planet),
    Sun(Sun),
    Player(Player),
    Mission(Mission),
}

impl Entity {
    /// Discriminator of the variant.
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Planet(_) => EntityKind::Planet,
            Entity::Sun(_) => EntityKind::Sun,
            Entity::Player(_) => EntityKind::Player,
            Entity::Mission(_) => EntityKind::Mission,
        }
    }

    /// Storage key of the wrapped record.
    pub fn key(&self) -> String {
        match self {
            Entity::Planet(p) => p.key(),
            Entity::Sun(s) => s.key(),
            Entity::Player(p) => p.key(),
            Entity::Mission(m) => m.key(),
        }
    }

    /// Indexed coordinate, if the variant has one.
    pub fn position(&self) -> Option<DVec2> {
        match self {
            Entity::Planet(p) => Record::position(p),
            Entity::Sun(s) => Record::position(s),
            Entity::Player(p) => Record::position(p),
            Entity::Mission(m) => Record::position(m),
        }
    }

    /// Serialize the record body.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let encoded = match self {
            Entity::Planet(p) => serde_json::to_vec(p),
            Entity::Sun(s) => serde_json::to_vec(s),
            Entity::Player(p) => serde_json::to_vec(p),
            Entity::Mission(m) => serde_json::to_vec(m),
        };
        encoded.map_err(|source| EncodeError {
            key: self.key(),
            source,
        })
    }

    /// Rebuild the entity stored under `key`. The kind token of the key
    /// selects the variant.
    pub fn decode(key: &str, bytes: &[u8]) -> Result<Self, DecodeError> {
        let (kind, _) = split_key(key)?;
        match kind {
            EntityKind::Planet => decode_record::<Planet>(key, bytes).map(Entity::Planet),
            EntityKind::Sun => decode_record::<Sun>(key, bytes).map(Entity::Sun),
            EntityKind::Player => decode_record::<Player>(key, bytes).map(Entity::Player),
            EntityKind::Mission => decode_record::<Mission>(key, bytes).map(Entity::Mission),
        }
    }

    pub fn as_planet(&self) -> Option<&Planet> {
        match self {
            Entity::Planet(p) => Some(p),
            _ => None,
        }
    }
}

fn decode_record<R: Record>(key: &str, bytes: &[u8]) -> Result<R, DecodeError> {
    let mut record: R = serde_json::from_slice(bytes).map_err(|source| DecodeError::Json {
        key: key.to_string(),
        source,
    })?;
    record.restore_from_key(key)?;
    let derived = record.key();
    if derived != key {
        return Err(DecodeError::KeyMismatch {
            key: key.to_string(),
            derived,
        });
    }
    Ok(record)
}

impl From<Planet> for Entity {
    fn from(p: Planet) -> Self {
        Entity::Planet(p)
    }
}

impl From<Sun> for Entity {
    fn from(s: Sun) -> Self {
        Entity::Sun(s)
    }
}

impl From<Player> for Entity {
    fn from(p: Player) -> Self {
        Entity::Player(p)
    }
}

impl From<Mission> for Entity {
    fn from(m: Mission) -> Self {
        Entity::Mission(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission::{MissionKind, Waypoint};
    use cluster_common::I64Vec2;

    fn samples() -> Vec<Entity> {
        let mut planet = Planet::new(I64Vec2::new(-500, 250), 4, 7, 10, 1_000);
        planet.owner = Some("alice".into());
        planet.is_home = true;
        let mut sun = Sun::new(DVec2::new(-1234.0, 0.5), "alice");
        sun.texture = 1;
        let player = Player::new("alice", "tw-1", 2, planet.key(), 1_000);
        let mission = Mission {
            kind: MissionKind::Supply,
            player: "alice".into(),
            ship_count: 3,
            start_time: 1_000_500,
            travel_time: 20_000,
            source: Waypoint {
                planet: planet.key(),
                position: planet.position,
            },
            target: Waypoint {
                planet: "planet.0_0".into(),
                position: I64Vec2::ZERO,
            },
        };
        vec![planet.into(), sun.into(), player.into(), mission.into()]
    }

    #[test]
    fn every_variant_roundtrips_through_its_key() {
        for entity in samples() {
            let key = entity.key();
            let bytes = entity.encode().unwrap();
            let decoded = Entity::decode(&key, &bytes).unwrap();
            assert_eq!(decoded, entity);
            assert_eq!(decoded.key(), key);
        }
    }

    #[test]
    fn key_carried_fields_are_not_in_body() {
        let sun = Sun::new(DVec2::new(77.0, -3.0), "bob");
        let body: serde_json::Value =
            serde_json::from_slice(&Entity::Sun(sun).encode().unwrap()).unwrap();
        assert!(body.get("position").is_none());

        let player = Player::new("bob", "tw", 0, "planet.0_0", 0);
        let body: serde_json::Value =
            serde_json::from_slice(&Entity::Player(player).encode().unwrap()).unwrap();
        assert!(body.get("username").is_none());
    }

    #[test]
    fn planet_under_wrong_key_is_rejected() {
        let planet = Planet::new(I64Vec2::new(1, 2), 1, 0, 0, 0);
        let bytes = Entity::Planet(planet).encode().unwrap();
        let err = Entity::decode("planet.9_9", &bytes).unwrap_err();
        assert!(matches!(err, DecodeError::KeyMismatch { .. }));
    }

    #[test]
    fn malformed_record_is_a_typed_error() {
        let err = Entity::decode("planet.1_2", b"{not json").unwrap_err();
        assert!(matches!(err, DecodeError::Json { .. }));
        let err = Entity::decode("comet.1_2", b"{}").unwrap_err();
        assert!(matches!(err, DecodeError::Key(KeyError::UnknownKind { .. })));
    }

    #[test]
    fn player_has_no_position() {
        let player = Player::new("carol", "tw", 0, "planet.0_0", 0);
        assert!(Entity::Player(player).position().is_none());
    }

    #[test]
    fn record_from_entity_matches_variant() {
        let planet = Planet::new(I64Vec2::ZERO, 1, 0, 0, 0);
        let entity: Entity = planet.clone().into();
        assert_eq!(Planet::from_entity(entity.clone()), Some(planet));
        assert!(Sun::from_entity(entity).is_none());
    }
}
