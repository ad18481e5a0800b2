//! Deterministic home-system generation.
//!
//! The player id is hashed with SHA-512 and every digest byte is reduced to a
//! decimal digit. Those digits are the only entropy behind the planet layout,
//! so a player id always produces the same system around a given sun.

use cluster_common::{DVec2, I64Vec2};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

use crate::planet::Planet;
use crate::sun::Sun;

/// Digits consumed per planet: ring step, angle, texture, size.
pub const DIGITS_PER_PLANET: usize = 4;

/// Tuning for system generation and sun placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Distance of the innermost ring from the sun, before the first step.
    pub ring_offset: f64,
    /// Fixed distance added between consecutive rings.
    pub planet_radius: f64,
    /// Extra ring distance per unit of the ring digit.
    pub ring_step: f64,
    /// Radians per unit of the angle digit.
    pub angle_multiplier: f64,
    pub planet_count: usize,
    pub initial_ship_count: i64,
    /// Side length of the square zone in which new suns are first tried.
    pub spawn_zone_radius: f64,
    /// Radius reserved around each sun; suns keep twice this apart.
    pub solar_system_radius: f64,
    /// Random attempts per zone size before the zone grows.
    pub placement_attempts: usize,
    /// Number of zone sizes tried before giving up.
    pub placement_batches: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            ring_offset: 300.0,
            planet_radius: 300.0,
            ring_step: 5.0,
            angle_multiplier: 40.0,
            planet_count: 10,
            initial_ship_count: 10,
            spawn_zone_radius: 50_000.0,
            solar_system_radius: 9_000.0,
            placement_attempts: 20,
            placement_batches: 50,
        }
    }
}

impl GeneratorConfig {
    /// Digits needed: four per planet, a spare, then the home selector.
    pub fn required_digits(&self) -> usize {
        self.planet_count * DIGITS_PER_PLANET + 2
    }

    fn home_digit_index(&self) -> usize {
        self.planet_count * DIGITS_PER_PLANET + 1
    }
}

/// Errors from generation and sun placement.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerateError {
    #[error("digest has {actual} digits, generation needs {required}")]
    DigestTooShort { actual: usize, required: usize },
    #[error("a system needs at least one planet")]
    NoPlanets,
    #[error("no room for a new sun after {attempts} placement attempts")]
    NoRoomForSun { attempts: usize },
}

/// A freshly generated home system.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedSystem {
    pub sun: Sun,
    pub planets: Vec<Planet>,
    pub home_index: usize,
}

impl GeneratedSystem {
    /// The planet flagged as home.
    pub fn home_planet(&self) -> &Planet {
        &self.planets[self.home_index]
    }

    pub fn home_planet_mut(&mut self) -> &mut Planet {
        &mut self.planets[self.home_index]
    }
}

/// SHA-512 of `player_id`, each byte reduced modulo ten.
pub fn digest_digits(player_id: &str) -> Vec<u8> {
    let digest = Sha512::digest(player_id.as_bytes());
    digest.iter().map(|b| b % 10).collect()
}

/// Generate the system of `player_id` around a sun at `sun_position`.
pub fn generate_system(
    player_id: &str,
    sun_position: DVec2,
    config: &GeneratorConfig,
    now: i64,
) -> Result<GeneratedSystem, GenerateError> {
    let digits = digest_digits(player_id);
    let (planets, home_index) = generate_planets(&digits, sun_position, config, now)?;
    tracing::debug!(
        player_id,
        planets = planets.len(),
        home_index,
        "generated system"
    );
    Ok(GeneratedSystem {
        sun: Sun::new(sun_position, player_id),
        planets,
        home_index,
    })
}

/// Lay out a ring of planets from a digit sequence.
///
/// Returns the planets and the index of the one flagged as home.
pub fn generate_planets(
    digits: &[u8],
    sun_position: DVec2,
    config: &GeneratorConfig,
    now: i64,
) -> Result<(Vec<Planet>, usize), GenerateError> {
    if config.planet_count == 0 {
        return Err(GenerateError::NoPlanets);
    }
    let required = config.required_digits();
    if digits.len() < required {
        return Err(GenerateError::DigestTooShort {
            actual: digits.len(),
            required,
        });
    }

    let digit = |index: usize| f64::from(digits[index]);
    let mut ring_offset = config.ring_offset;
    let mut planets = Vec::with_capacity(config.planet_count);

    for ix in 0..config.planet_count {
        let base = DIGITS_PER_PLANET * ix;
        ring_offset += config.planet_radius + digit(base) * config.ring_step;
        let angle = digit(base + 1) * config.angle_multiplier;
        let position = I64Vec2::new(
            (sun_position.x + ring_offset * angle.cos()) as i64,
            (sun_position.y + ring_offset * angle.sin()) as i64,
        );
        let texture = digits[base + 2];
        let size = 1 + digits[base + 3];
        planets.push(Planet::new(
            position,
            size,
            texture,
            config.initial_ship_count,
            now,
        ));
    }

    let home_index = usize::from(digits[config.home_digit_index()]) % config.planet_count;
    planets[home_index].is_home = true;
    Ok((planets, home_index))
}

/// Pick a position for a new sun that keeps clear of every existing one.
///
/// Candidates are integer points drawn uniformly from a square zone centred
/// on the origin. After each batch of failed attempts the zone grows by one
/// solar system radius.
pub fn place_sun<R: Rng + ?Sized>(
    existing: &[DVec2],
    config: &GeneratorConfig,
    rng: &mut R,
) -> Result<DVec2, GenerateError> {
    let min_distance = 2.0 * config.solar_system_radius;
    let mut zone = config.spawn_zone_radius.max(1.0);
    let mut attempts = 0;

    for _ in 0..config.placement_batches {
        let half = (zone / 2.0).floor() as i64;
        for _ in 0..config.placement_attempts {
            attempts += 1;
            let candidate = DVec2::new(
                rng.gen_range(-half..=half) as f64,
                rng.gen_range(-half..=half) as f64,
            );
            if existing
                .iter()
                .all(|sun| sun.distance(candidate) >= min_distance)
            {
                return Ok(candidate);
            }
        }
        tracing::debug!(zone, attempts, "sun placement batch exhausted, growing zone");
        zone += config.solar_system_radius;
    }

    Err(GenerateError::NoRoomForSun { attempts })
}
