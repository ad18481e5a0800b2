use cluster_common::{DVec2, I64Vec2};
use serde::{Deserialize, Serialize};

use crate::key::planet_key;

/// Base number of seconds needed to build one ship.
pub const ACCRUAL_BASE_SECS: i64 = 10;

/// Seconds needed to build one ship on a planet of the given size class.
pub fn accrual_period(size: u8) -> i64 {
    ACCRUAL_BASE_SECS * (i64::from(size) / 3 + 1)
}

/// Recompute a lazily cached ship count.
///
/// Returns the new count and `now` as the new update time. Time that has not
/// yet produced a whole ship is discarded. A `now` earlier than `last_update`
/// leaves both values untouched.
pub fn accrued(cached: i64, last_update: i64, size: u8, now: i64) -> (i64, i64) {
    let elapsed = now - last_update;
    if elapsed <= 0 {
        return (cached, last_update);
    }
    (cached + elapsed / accrual_period(size), now)
}

/// A planet. Only owned planets build ships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Planet {
    pub owner: Option<String>,
    pub position: I64Vec2,
    pub size: u8,
    pub texture: u8,
    pub is_home: bool,
    ship_count: i64,
    last_ship_count_update: i64,
}

impl Planet {
    /// An unowned, non-home planet whose accrual clock starts at `now`.
    pub fn new(position: I64Vec2, size: u8, texture: u8, ship_count: i64, now: i64) -> Self {
        Self {
            owner: None,
            position,
            size,
            texture,
            is_home: false,
            ship_count,
            last_ship_count_update: now,
        }
    }

    /// `planet.X_Y` of the integer position.
    pub fn key(&self) -> String {
        planet_key(self.position.x, self.position.y)
    }

    pub fn world_position(&self) -> DVec2 {
        self.position.as_dvec2()
    }

    /// Whether any player owns the planet.
    pub fn has_owner(&self) -> bool {
        self.owner.as_deref().is_some_and(|o| !o.is_empty())
    }

    pub fn is_owned_by(&self, username: &str) -> bool {
        self.owner.as_deref() == Some(username)
    }

    /// Cached count as of [`Planet::last_ship_count_update`], without accrual.
    pub fn cached_ship_count(&self) -> i64 {
        self.ship_count
    }

    pub fn last_ship_count_update(&self) -> i64 {
        self.last_ship_count_update
    }

    fn recomputed(&self, now: i64) -> (i64, i64) {
        if self.has_owner() {
            accrued(self.ship_count, self.last_ship_count_update, self.size, now)
        } else {
            (self.ship_count, now.max(self.last_ship_count_update))
        }
    }

    /// Effective ship count at `now`, leaving the cache untouched.
    pub fn ship_count_at(&self, now: i64) -> i64 {
        self.recomputed(now).0
    }

    /// Effective ship count at `now`; the cache is brought up to date.
    pub fn ship_count(&mut self, now: i64) -> i64 {
        self.refresh(now);
        self.ship_count
    }

    /// Overwrite the ship count. Ships accrued up to `now` are settled first
    /// and the accrual clock restarts at `now`.
    pub fn set_ship_count(&mut self, count: i64, now: i64) {
        self.refresh(now);
        self.ship_count = count;
        self.last_ship_count_update = now.max(self.last_ship_count_update);
    }

    /// Change owner, settling ships accrued under the previous owner first.
    pub fn set_owner(&mut self, owner: Option<String>, now: i64) {
        self.refresh(now);
        self.owner = owner;
        self.last_ship_count_update = now.max(self.last_ship_count_update);
    }

    fn refresh(&mut self, now: i64) {
        let (count, at) = self.recomputed(now);
        self.ship_count = count;
        self.last_ship_count_update = at;
    }
}
