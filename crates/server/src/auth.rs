//! Login and first-contact provisioning.
//!
//! # Invariants
//! - A player record exists only once its sun and every planet are stored.
//! - A failed provisioning leaves no entities behind.

use cluster_common::{DVec2, unix_now};
use cluster_kernel::{
    Entity, GenerateError, Player, SetupData, SetupError, Sun, generate_system, place_sun,
    player_key,
};
use cluster_persist::StoreError;
use cluster_session::{Response, StateChange};

use crate::engine::Engine;

const MAX_USERNAME_LEN: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("invalid username {0:?}")]
    InvalidUsername(String),
    #[error("identity token does not match player {0}")]
    IdentityMismatch(String),
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error("cannot create home system: {0}")]
    Generate(#[from] GenerateError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Usernames end up in keys and key patterns, so wildcard characters,
/// whitespace and control characters are refused.
pub fn validate_username(username: &str) -> Result<(), LoginError> {
    let acceptable = !username.is_empty()
        && username.chars().count() <= MAX_USERNAME_LEN
        && !username
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || "*?[]\\".contains(c));
    if acceptable {
        Ok(())
    } else {
        Err(LoginError::InvalidUsername(username.to_string()))
    }
}

/// A successful login.
#[derive(Debug, Clone)]
pub struct Login {
    pub player: Player,
    /// Whether the player was created by this login.
    pub created: bool,
}

impl Engine {
    /// Log `username` in, creating the player and its home system on first
    /// contact.
    pub async fn login(
        &self,
        username: &str,
        twitter_id: &str,
        setup: Option<SetupData>,
    ) -> Result<Login, LoginError> {
        validate_username(username)?;
        if let Some(player) = self.existing_player(username, twitter_id)? {
            return Ok(Login {
                player,
                created: false,
            });
        }

        let _signup = self.signup.lock().await;
        // another session may have provisioned the player while we waited
        if let Some(player) = self.existing_player(username, twitter_id)? {
            return Ok(Login {
                player,
                created: false,
            });
        }
        let player = self.provision(username, twitter_id, setup.unwrap_or_default())?;
        Ok(Login {
            player,
            created: true,
        })
    }

    fn existing_player(
        &self,
        username: &str,
        twitter_id: &str,
    ) -> Result<Option<Player>, LoginError> {
        let mut player: Player = match self.store.get_as(&player_key(username)) {
            Ok(player) => player,
            Err(StoreError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if player.twitter_id != twitter_id {
            tracing::warn!(username, "identity token mismatch");
            return Err(LoginError::IdentityMismatch(username.to_string()));
        }
        player.last_seen = unix_now();
        self.store.save(&player.clone().into())?;
        tracing::info!(username, "player logged in");
        Ok(Some(player))
    }

    fn provision(
        &self,
        username: &str,
        twitter_id: &str,
        setup: SetupData,
    ) -> Result<Player, LoginError> {
        setup.validate(self.config.race_count, self.config.sun_texture_count)?;
        let now = unix_now();
        let existing: Vec<DVec2> = self
            .store
            .find_all::<Sun>()?
            .iter()
            .map(|sun| sun.position)
            .collect();
        let position = place_sun(&existing, &self.config.generator, &mut rand::thread_rng())?;

        let mut system = generate_system(username, position, &self.config.generator, now)?;
        system.sun.texture = setup.sun_texture;
        system
            .home_planet_mut()
            .set_owner(Some(username.to_string()), now);
        let player = Player::new(
            username,
            twitter_id,
            setup.race,
            system.home_planet().key(),
            now,
        );

        let mut saved = Vec::with_capacity(system.planets.len() + 2);
        let result =
            self.persist_system(&system.sun, &system.planets, &player, now, &mut saved);
        if let Err(e) = result {
            tracing::error!(username, error = %e, "provisioning failed, rolling back");
            for key in saved.iter().rev() {
                if let Err(e) = self.store.delete(key) {
                    tracing::error!(%key, error = %e, "rollback delete failed");
                }
            }
            return Err(e.into());
        }

        tracing::info!(
            username,
            sun = %system.sun.key(),
            home = %player.home_planet,
            "player provisioned"
        );
        Ok(player)
    }

    /// Store the sun, then each planet, then the player, announcing each
    /// world object to connected viewers as it lands.
    fn persist_system(
        &self,
        sun: &Sun,
        planets: &[cluster_kernel::Planet],
        player: &Player,
        now: i64,
        saved: &mut Vec<String>,
    ) -> Result<(), StoreError> {
        self.save_tracked(sun.clone().into(), saved)?;
        self.registry
            .broadcast(&Response::StateChange(StateChange::new().with_sun(sun)));

        for planet in planets {
            self.save_tracked(planet.clone().into(), saved)?;
            self.registry
                .broadcast(&Response::StateChange(
                    StateChange::new().with_planet(planet, now),
                ));
        }

        self.save_tracked(player.clone().into(), saved)
    }

    fn save_tracked(&self, entity: Entity, saved: &mut Vec<String>) -> Result<(), StoreError> {
        let key = entity.key();
        let result = self.store.save(&entity);
        // a partial index write still left the primary record behind
        if result.is_ok() || matches!(result, Err(StoreError::PartialIndex { .. })) {
            saved.push(key);
        }
        result
    }
}
