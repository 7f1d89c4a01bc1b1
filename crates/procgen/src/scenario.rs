//! Seeded initial conditions for gravity scenarios.
//!
//! Every builder returns plain [`BodySpawn`] records (SI units). The caller decides
//! whether they become ECS entities or direct registrations.

use glam::DVec3;
use rand::prelude::*;

/// Gravitational constant (m³ kg⁻¹ s⁻²).
pub const G: f64 = 6.674_30e-11;

/// Bulk density used to derive a radius from a mass (kg/m³, rocky body).
pub const ROCK_DENSITY: f64 = 2_500.0;

/// One body ready to be spawned.
#[derive(Debug, Clone, PartialEq)]
pub struct BodySpawn {
    pub name: String,
    /// Kilograms.
    pub mass: f64,
    /// Metres.
    pub radius: f64,
    pub position: DVec3,
    /// m/s.
    pub velocity: DVec3,
}

impl BodySpawn {
    pub fn new(name: impl Into<String>, mass: f64, radius: f64, position: DVec3, velocity: DVec3) -> Self {
        Self {
            name: name.into(),
            mass,
            radius,
            position,
            velocity,
        }
    }

    pub fn momentum(&self) -> DVec3 {
        self.velocity * self.mass
    }
}

/// Radius of a uniform sphere of `mass` at `density`.
pub fn radius_from_mass(mass: f64, density: f64) -> f64 {
    (3.0 * mass / (4.0 * std::f64::consts::PI * density)).cbrt()
}

/// Circular orbital speed at distance `r` around a total mass `m`.
pub fn circular_speed(m: f64, r: f64) -> f64 {
    (G * m / r).sqrt()
}

/// `count` bodies at rest, uniformly placed in a cube of half-width `half_extent`
/// around the origin, with masses uniform in `mass_range`.
pub fn random_cluster(seed: u64, count: usize, half_extent: f64, mass_range: (f64, f64)) -> Vec<BodySpawn> {
    let mut rng = StdRng::seed_from_u64(seed);
    let (lo, hi) = if mass_range.0 <= mass_range.1 {
        mass_range
    } else {
        (mass_range.1, mass_range.0)
    };

    (0..count)
        .map(|i| {
            let mass = if hi > lo { rng.gen_range(lo..hi) } else { lo };
            let position = DVec3::new(
                rng.gen_range(-half_extent..=half_extent),
                rng.gen_range(-half_extent..=half_extent),
                rng.gen_range(-half_extent..=half_extent),
            );
            BodySpawn::new(
                format!("rock-{:03}", i),
                mass,
                radius_from_mass(mass, ROCK_DENSITY),
                position,
                DVec3::ZERO,
            )
        })
        .collect()
}

/// Two bodies on circular orbits about their barycenter, which sits at the origin
/// with zero net momentum. The pair is separated along X and orbits in the XZ plane.
pub fn circular_binary(
    primary: (&str, f64, f64),
    secondary: (&str, f64, f64),
    separation: f64,
) -> [BodySpawn; 2] {
    let (name_a, m1, r1) = primary;
    let (name_b, m2, r2) = secondary;
    let total = m1 + m2;
    let v_rel = circular_speed(total, separation);

    let x1 = -separation * m2 / total;
    let x2 = separation * m1 / total;
    let v1 = -v_rel * m2 / total;
    let v2 = v_rel * m1 / total;

    [
        BodySpawn::new(name_a, m1, r1, DVec3::new(x1, 0.0, 0.0), DVec3::new(0.0, 0.0, v1)),
        BodySpawn::new(name_b, m2, r2, DVec3::new(x2, 0.0, 0.0), DVec3::new(0.0, 0.0, v2)),
    ]
}

/// Shift velocities so total momentum is zero.
pub fn to_center_of_momentum(spawns: &mut [BodySpawn]) {
    let mass: f64 = spawns.iter().map(|s| s.mass).sum();
    if mass <= 0.0 {
        return;
    }
    let drift = spawns.iter().map(BodySpawn::momentum).sum::<DVec3>() / mass;
    for s in spawns.iter_mut() {
        s.velocity -= drift;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_is_deterministic_and_bounded() {
        let a = random_cluster(7, 50, 100_000.0, (1.0e10, 1.0e12));
        let b = random_cluster(7, 50, 100_000.0, (1.0e10, 1.0e12));
        assert_eq!(a, b);
        assert_eq!(a.len(), 50);
        for s in &a {
            assert!(s.position.abs().max_element() <= 100_000.0);
            assert!(s.mass >= 1.0e10 && s.mass < 1.0e12);
            assert!(s.radius > 0.0);
        }
        assert_ne!(a, random_cluster(8, 50, 100_000.0, (1.0e10, 1.0e12)));
    }

    #[test]
    fn binary_has_zero_momentum_and_circular_speed() {
        let [a, b] = circular_binary(("earth", 5.97e24, 6.371e6), ("moon", 7.35e22, 1.737e6), 3.844e8);
        let p = a.momentum() + b.momentum();
        assert!(p.length() < 1e-6 * a.momentum().length());
        assert!((b.position.x - a.position.x - 3.844e8).abs() < 1e-3);
        let v_rel = (b.velocity - a.velocity).length();
        assert!((v_rel - circular_speed(5.97e24 + 7.35e22, 3.844e8)).abs() < 1e-9);
    }

    #[test]
    fn center_of_momentum_removes_drift() {
        let mut spawns = vec![
            BodySpawn::new("a", 2.0, 1.0, DVec3::ZERO, DVec3::new(3.0, 0.0, 0.0)),
            BodySpawn::new("b", 1.0, 1.0, DVec3::X, DVec3::new(0.0, 6.0, 0.0)),
        ];
        to_center_of_momentum(&mut spawns);
        let p: DVec3 = spawns.iter().map(BodySpawn::momentum).sum();
        assert!(p.length() < 1e-12);
    }

    #[test]
    fn radius_matches_density() {
        let r = radius_from_mass(4.0 / 3.0 * std::f64::consts::PI * ROCK_DENSITY, ROCK_DENSITY);
        assert!((r - 1.0).abs() < 1e-12);
    }
}
