//! Entity keys: `<kind>.<identifying-fields>`.
//!
//! The kind token before the first `.` selects the record variant. Identifying
//! fields are joined with `_`: `planet.X_Y`, `sun.X_Y`, `player.<username>`,
//! `mission.<start-ms>_X_Y`.

use cluster_common::{Axis, DVec2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separates the kind token from the identifying fields.
pub const KIND_SEPARATOR: char = '.';
/// Separates identifying fields from each other.
pub const FIELD_SEPARATOR: char = '_';

/// Errors from parsing entity keys.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("key {0:?} has no kind separator")]
    MissingSeparator(String),
    #[error("unknown entity kind {token:?} in key {key:?}")]
    UnknownKind { key: String, token: String },
    #[error("key {key:?} is not a {expected} key")]
    WrongKind { key: String, expected: EntityKind },
    #[error("malformed identifying fields in key {0:?}")]
    MalformedFields(String),
}

/// Discriminator of the entity sum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Planet,
    Sun,
    Player,
    Mission,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Planet,
        EntityKind::Sun,
        EntityKind::Player,
        EntityKind::Mission,
    ];

    /// Key prefix naming this kind.
    pub fn token(self) -> &'static str {
        match self {
            EntityKind::Planet => "planet",
            EntityKind::Sun => "sun",
            EntityKind::Player => "player",
            EntityKind::Mission => "mission",
        }
    }

    /// Kind named by a key prefix, if any.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.token() == token)
    }

    /// Kind named by the token preceding the first separator of `key`.
    pub fn of_key(key: &str) -> Result<Self, KeyError> {
        split_key(key).map(|(kind, _)| kind)
    }

    /// Wildcard pattern matching every key of this kind.
    pub fn pattern(self) -> String {
        format!("{}{KIND_SEPARATOR}*", self.token())
    }

    /// Name of the sorted set indexing this kind along `axis`.
    ///
    /// Index names never contain the kind separator, so kind patterns such as
    /// `planet.*` do not match them.
    pub fn index_name(self, axis: Axis) -> String {
        format!("index:{}:{}", self.token(), axis.name())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Split a key into its kind and the identifying fields after the separator.
pub fn split_key(key: &str) -> Result<(EntityKind, &str), KeyError> {
    let (token, fields) = key
        .split_once(KIND_SEPARATOR)
        .ok_or_else(|| KeyError::MissingSeparator(key.to_string()))?;
    let kind = EntityKind::from_token(token).ok_or_else(|| KeyError::UnknownKind {
        key: key.to_string(),
        token: token.to_string(),
    })?;
    Ok((kind, fields))
}

fn fields_of(key: &str, expected: EntityKind) -> Result<&str, KeyError> {
    let (kind, fields) = split_key(key)?;
    if kind != expected {
        return Err(KeyError::WrongKind {
            key: key.to_string(),
            expected,
        });
    }
    if fields.is_empty() {
        return Err(KeyError::MalformedFields(key.to_string()));
    }
    Ok(fields)
}

fn parse_fields<T: FromStr, const N: usize>(key: &str, fields: &str) -> Result<[T; N], KeyError> {
    let parts: Vec<&str> = fields.split(FIELD_SEPARATOR).collect();
    if parts.len() != N {
        return Err(KeyError::MalformedFields(key.to_string()));
    }
    let parsed: Vec<T> = parts
        .iter()
        .map(|p| p.parse::<T>())
        .collect::<Result<_, _>>()
        .map_err(|_| KeyError::MalformedFields(key.to_string()))?;
    parsed
        .try_into()
        .map_err(|_| KeyError::MalformedFields(key.to_string()))
}

/// `planet.X_Y`.
pub fn planet_key(x: i64, y: i64) -> String {
    format!("planet{KIND_SEPARATOR}{x}{FIELD_SEPARATOR}{y}")
}

/// Coordinates of a `planet.X_Y` key.
pub fn parse_planet_key(key: &str) -> Result<(i64, i64), KeyError> {
    let [x, y] = parse_fields::<i64, 2>(key, fields_of(key, EntityKind::Planet)?)?;
    Ok((x, y))
}

/// Sun key. `f64` display is the shortest text that parses back to the same
/// value, so [`parse_sun_key`] recovers the exact position.
pub fn sun_key(position: DVec2) -> String {
    format!(
        "sun{KIND_SEPARATOR}{}{FIELD_SEPARATOR}{}",
        position.x, position.y
    )
}

/// Exact position encoded in a sun key.
pub fn parse_sun_key(key: &str) -> Result<DVec2, KeyError> {
    let [x, y] = parse_fields::<f64, 2>(key, fields_of(key, EntityKind::Sun)?)?;
    if !x.is_finite() || !y.is_finite() {
        return Err(KeyError::MalformedFields(key.to_string()));
    }
    Ok(DVec2::new(x, y))
}

/// `player.<username>`. The username may itself contain separators.
pub fn player_key(username: &str) -> String {
    format!("player{KIND_SEPARATOR}{username}")
}

/// Username of a player key.
pub fn parse_player_key(key: &str) -> Result<&str, KeyError> {
    fields_of(key, EntityKind::Player)
}

/// `mission.<start-ms>_X_Y`, keyed by launch time and source planet.
pub fn mission_key(start_time: i64, x: i64, y: i64) -> String {
    format!("mission{KIND_SEPARATOR}{start_time}{FIELD_SEPARATOR}{x}{FIELD_SEPARATOR}{y}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tokens_roundtrip() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_token(kind.token()), Some(kind));
        }
        assert_eq!(EntityKind::from_token("fleet"), None);
    }

    #[test]
    fn kind_of_key_uses_first_separator() {
        assert_eq!(EntityKind::of_key("sun.1.5_-2").unwrap(), EntityKind::Sun);
        assert_eq!(
            EntityKind::of_key("player.john.doe").unwrap(),
            EntityKind::Player
        );
        assert!(matches!(
            EntityKind::of_key("index:planet:x"),
            Err(KeyError::MissingSeparator(_))
        ));
        assert!(matches!(
            EntityKind::of_key("moon.1_2"),
            Err(KeyError::UnknownKind { .. })
        ));
    }

    #[test]
    fn planet_key_format() {
        assert_eq!(planet_key(-500, 20), "planet.-500_20");
        assert_eq!(parse_planet_key("planet.-500_20").unwrap(), (-500, 20));
        assert!(parse_planet_key("planet.1_2_3").is_err());
        assert!(parse_planet_key("sun.1_2").is_err());
    }

    #[test]
    fn sun_key_recovers_exact_position() {
        let positions = [
            DVec2::new(0.0, 0.0),
            DVec2::new(-12345.0, 678.0),
            DVec2::new(0.1 + 0.2, -1.0 / 3.0),
        ];
        for position in positions {
            let key = sun_key(position);
            assert_eq!(parse_sun_key(&key).unwrap(), position, "key {key}");
        }
    }

    #[test]
    fn player_key_keeps_dots_in_username() {
        let key = player_key("john.doe");
        assert_eq!(parse_player_key(&key).unwrap(), "john.doe");
        assert!(parse_player_key("player.").is_err());
    }

    #[test]
    fn index_names_do_not_match_kind_pattern() {
        let name = EntityKind::Planet.index_name(Axis::X);
        assert_eq!(name, "index:planet:x");
        assert!(!name.starts_with("planet."));
        assert_eq!(EntityKind::Planet.pattern(), "planet.*");
    }

    #[test]
    fn mission_key_format() {
        assert_eq!(mission_key(1_000, 3, -4), "mission.1000_3_-4");
    }
}
