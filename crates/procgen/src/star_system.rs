//! Star system generation in SI units.
//!
//! A star sits at the barycenter; planets start on circular orbits with speeds
//! from Kepler (v = √(G·M / a)), tilted by a small inclination. Large planets may
//! carry moons on circular orbits around them.

use glam::DVec3;
use rand::prelude::*;

use crate::scenario::{circular_speed, radius_from_mass, to_center_of_momentum, BodySpawn};

pub const SOLAR_MASS: f64 = 1.989e30;
pub const SOLAR_RADIUS: f64 = 6.957e8;
pub const EARTH_MASS: f64 = 5.972e24;
pub const ASTRONOMICAL_UNIT: f64 = 1.495_978_707e11;

const PLANET_DENSITY: f64 = 4_000.0;

/// Types of stars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StarType {
    RedDwarf,
    YellowMain,
    BlueGiant,
    WhiteDwarf,
}

impl StarType {
    /// Number of planets this star type tends to have.
    pub fn planet_range(&self) -> (usize, usize) {
        match self {
            StarType::RedDwarf => (2, 4),
            StarType::YellowMain => (4, 8),
            StarType::BlueGiant => (3, 6),
            StarType::WhiteDwarf => (1, 3),
        }
    }

    /// Semi-major axis range for planets, in AU.
    pub fn orbital_range(&self) -> (f64, f64) {
        match self {
            StarType::RedDwarf => (0.05, 1.5),
            StarType::YellowMain => (0.3, 30.0),
            StarType::BlueGiant => (2.0, 60.0),
            StarType::WhiteDwarf => (0.02, 2.0),
        }
    }

    /// Mass range in solar masses.
    fn mass_range(&self) -> (f64, f64) {
        match self {
            StarType::RedDwarf => (0.1, 0.6),
            StarType::YellowMain => (0.8, 1.2),
            StarType::BlueGiant => (8.0, 16.0),
            StarType::WhiteDwarf => (0.5, 0.7),
        }
    }

    /// Radius range in solar radii.
    fn radius_range(&self) -> (f64, f64) {
        match self {
            StarType::RedDwarf => (0.1, 0.6),
            StarType::YellowMain => (0.85, 1.3),
            StarType::BlueGiant => (5.0, 10.0),
            StarType::WhiteDwarf => (0.008, 0.02),
        }
    }
}

/// The central star.
#[derive(Debug, Clone, PartialEq)]
pub struct Star {
    pub star_type: StarType,
    pub name: String,
    /// Kilograms.
    pub mass: f64,
    /// Metres.
    pub radius: f64,
}

impl Star {
    fn generate(rng: &mut StdRng) -> Self {
        let star_type = match rng.gen_range(0..100) {
            0..=40 => StarType::RedDwarf,
            41..=80 => StarType::YellowMain,
            81..=90 => StarType::BlueGiant,
            _ => StarType::WhiteDwarf,
        };
        let (m_lo, m_hi) = star_type.mass_range();
        let (r_lo, r_hi) = star_type.radius_range();
        Self {
            star_type,
            name: star_name(rng),
            mass: rng.gen_range(m_lo..m_hi) * SOLAR_MASS,
            radius: rng.gen_range(r_lo..r_hi) * SOLAR_RADIUS,
        }
    }
}

fn star_name(rng: &mut StdRng) -> String {
    let syllables = [
        "Sol", "Alp", "Bet", "Gam", "Sig", "Tau", "Rig", "Veg", "Pro", "Arc", "Sir", "Pol", "Den", "Alt", "Cap", "Ald",
    ];
    let suffixes = ["a", "us", "is", "ar", "el", "ix", "on", "ae"];
    format!(
        "{}{}",
        syllables[rng.gen_range(0..syllables.len())],
        suffixes[rng.gen_range(0..suffixes.len())]
    )
}

/// A body on a circular orbit around its parent.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitalBody {
    pub name: String,
    /// Kilograms.
    pub mass: f64,
    /// Metres.
    pub radius: f64,
    /// Orbit radius around the parent (metres).
    pub orbital_radius: f64,
    /// Angle along the orbit at t = 0 (radians).
    pub orbital_phase: f64,
    /// Tilt of the orbit plane around X (radians).
    pub orbital_inclination: f64,
    pub moons: Vec<OrbitalBody>,
}

impl OrbitalBody {
    /// Position and velocity relative to a parent of mass `parent_mass`.
    pub fn relative_state(&self, parent_mass: f64) -> (DVec3, DVec3) {
        let (sin, cos) = self.orbital_phase.sin_cos();
        let (sin_i, cos_i) = self.orbital_inclination.sin_cos();
        let tilt = |v: DVec3| DVec3::new(v.x, v.z * sin_i, v.z * cos_i);

        let speed = circular_speed(parent_mass + self.mass, self.orbital_radius);
        let position = tilt(DVec3::new(cos, 0.0, sin) * self.orbital_radius);
        let velocity = tilt(DVec3::new(-sin, 0.0, cos) * speed);
        (position, velocity)
    }
}

/// A star with its planets.
#[derive(Debug, Clone, PartialEq)]
pub struct StarSystem {
    pub seed: u64,
    pub name: String,
    pub star: Star,
    pub planets: Vec<OrbitalBody>,
}

impl StarSystem {
    /// Generate a complete star system from a seed.
    pub fn generate(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let star = Star::generate(&mut rng);

        let (min_planets, max_planets) = star.star_type.planet_range();
        let count = rng.gen_range(min_planets..=max_planets);
        let (a_min, a_max) = star.star_type.orbital_range();

        // Log-spaced slots, jittered, so orbits never cross.
        let ratio = (a_max / a_min).powf(1.0 / count as f64);
        let mut planets = Vec::with_capacity(count);
        for i in 0..count {
            let a = a_min * ratio.powf(i as f64 + rng.gen_range(0.3..0.7)) * ASTRONOMICAL_UNIT;
            let mass = EARTH_MASS * 10f64.powf(rng.gen_range(-1.5..2.5));
            let radius = radius_from_mass(mass, PLANET_DENSITY);
            let name = format!("{} {}", star.name, ["b", "c", "d", "e", "f", "g", "h", "i"][i.min(7)]);

            let moon_count = if mass > 10.0 * EARTH_MASS { rng.gen_range(0..=2) } else { 0 };
            let moons = (0..moon_count)
                .map(|m| {
                    let moon_mass = mass * rng.gen_range(1e-5..1e-3);
                    OrbitalBody {
                        name: format!("{} {}", name, ["I", "II"][m]),
                        mass: moon_mass,
                        radius: radius_from_mass(moon_mass, PLANET_DENSITY),
                        orbital_radius: radius * (20.0 + 25.0 * m as f64 + rng.gen_range(0.0..10.0)),
                        orbital_phase: rng.gen_range(0.0..std::f64::consts::TAU),
                        orbital_inclination: rng.gen_range(0.0..0.1),
                        moons: Vec::new(),
                    }
                })
                .collect();

            planets.push(OrbitalBody {
                name,
                mass,
                radius,
                orbital_radius: a,
                orbital_phase: rng.gen_range(0.0..std::f64::consts::TAU),
                orbital_inclination: rng.gen_range(0.0..0.05),
                moons,
            });
        }

        log::debug!("Generated {} System (seed {}, {} planets)", star.name, seed, planets.len());
        Self {
            seed,
            name: format!("{} System", star.name),
            star,
            planets,
        }
    }

    /// Every body as a spawn record in the barycentric frame.
    pub fn spawns(&self) -> Vec<BodySpawn> {
        let mut out = vec![BodySpawn::new(
            self.star.name.clone(),
            self.star.mass,
            self.star.radius,
            DVec3::ZERO,
            DVec3::ZERO,
        )];
        for planet in &self.planets {
            let (p, v) = planet.relative_state(self.star.mass);
            out.push(BodySpawn::new(planet.name.clone(), planet.mass, planet.radius, p, v));
            for moon in &planet.moons {
                let (mp, mv) = moon.relative_state(planet.mass);
                out.push(BodySpawn::new(moon.name.clone(), moon.mass, moon.radius, p + mp, v + mv));
            }
        }
        to_center_of_momentum(&mut out);
        out
    }

    pub fn body_count(&self) -> usize {
        1 + self.planets.iter().map(|p| 1 + p.moons.len()).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_seeded() {
        assert_eq!(StarSystem::generate(42), StarSystem::generate(42));
    }

    #[test]
    fn planets_fit_star_profile() {
        for seed in 0..20 {
            let system = StarSystem::generate(seed);
            let (lo, hi) = system.star.star_type.planet_range();
            assert!((lo..=hi).contains(&system.planets.len()));
            let (a_min, a_max) = system.star.star_type.orbital_range();
            let mut last = 0.0;
            for p in &system.planets {
                let a = p.orbital_radius / ASTRONOMICAL_UNIT;
                assert!(a >= a_min && a <= a_max, "seed {} orbit {} AU", seed, a);
                assert!(p.orbital_radius > last);
                last = p.orbital_radius;
            }
        }
    }

    #[test]
    fn spawns_are_unique_and_balanced() {
        let system = StarSystem::generate(3);
        let spawns = system.spawns();
        assert_eq!(spawns.len(), system.body_count());

        let mut names: Vec<_> = spawns.iter().map(|s| s.name.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), spawns.len());

        let p: DVec3 = spawns.iter().map(BodySpawn::momentum).sum();
        let scale: f64 = spawns.iter().map(|s| s.momentum().length()).sum();
        assert!(p.length() <= scale * 1e-9);
    }

    #[test]
    fn circular_orbit_speed() {
        let body = OrbitalBody {
            name: "x".into(),
            mass: EARTH_MASS,
            radius: 6.4e6,
            orbital_radius: ASTRONOMICAL_UNIT,
            orbital_phase: 0.0,
            orbital_inclination: 0.0,
            moons: Vec::new(),
        };
        let (p, v) = body.relative_state(SOLAR_MASS);
        assert!((p.length() - ASTRONOMICAL_UNIT).abs() < 1.0);
        assert!(p.dot(v).abs() < 1e-3 * p.length() * v.length());
        // Earth's orbital speed is close to 29.8 km/s.
        assert!((v.length() - 29_780.0).abs() < 100.0);
    }
}
