use serde::{Deserialize, Serialize};

use crate::key::player_key;

/// Errors from validating first-contact setup data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SetupError {
    #[error("race index {race} out of range (0..{count})")]
    RaceOutOfRange { race: u8, count: u8 },
    #[error("sun texture index {texture} out of range (0..{count})")]
    SunTextureOutOfRange { texture: u8, count: u8 },
}

/// Choices a new player makes on first contact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupData {
    pub race: u8,
    pub sun_texture: u8,
}

impl SetupData {
    /// Reject a race or sun texture outside the configured ranges.
    pub fn validate(&self, race_count: u8, sun_texture_count: u8) -> Result<(), SetupError> {
        if self.race >= race_count {
            return Err(SetupError::RaceOutOfRange {
                race: self.race,
                count: race_count,
            });
        }
        if self.sun_texture >= sun_texture_count {
            return Err(SetupError::SunTextureOutOfRange {
                texture: self.sun_texture,
                count: sun_texture_count,
            });
        }
        Ok(())
    }
}

/// A registered player. The username is immutable and lives in the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    #[serde(skip)]
    pub username: String,
    /// Token from the external identity provider.
    pub twitter_id: String,
    pub race_id: u8,
    /// Key of the home planet.
    pub home_planet: String,
    /// Unix seconds of the last successful login.
    pub last_seen: i64,
}

impl Player {
    /// A freshly signed-up player, last seen at `now`.
    pub fn new(
        username: impl Into<String>,
        twitter_id: impl Into<String>,
        race_id: u8,
        home_planet: impl Into<String>,
        now: i64,
    ) -> Self {
        Self {
            username: username.into(),
            twitter_id: twitter_id.into(),
            race_id,
            home_planet: home_planet.into(),
            last_seen: now,
        }
    }

    /// `player.<username>`.
    pub fn key(&self) -> String {
        player_key(&self.username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_validation_bounds() {
        assert!(SetupData::default().validate(6, 2).is_ok());
        assert!(SetupData { race: 5, sun_texture: 1 }.validate(6, 2).is_ok());
        assert_eq!(
            SetupData { race: 6, sun_texture: 0 }.validate(6, 2),
            Err(SetupError::RaceOutOfRange { race: 6, count: 6 })
        );
        assert_eq!(
            SetupData { race: 0, sun_texture: 2 }.validate(6, 2),
            Err(SetupError::SunTextureOutOfRange { texture: 2, count: 2 })
        );
    }
}
