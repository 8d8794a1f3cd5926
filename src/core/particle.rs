use crate::error::{Error, Result};

/// Fixed spatial dimension (2D).
pub const DIM: usize = 2;

/// A hard disc confined to the two-chamber domain.
///
/// Fields:
/// - `id`: stable identifier, equal to the particle's index in the simulation
/// - `r`: position [x, y]
/// - `v`: velocity [vx, vy]
/// - `radius`: disc radius (> 0)
/// - `mass`: particle mass (> 0)
/// - `collision_count`: incremented each time the particle participates in a
///   realized event; scheduled events capture it as a staleness fingerprint
#[derive(Debug, Clone)]
pub struct Particle {
    /// Stable particle identifier.
    pub id: u32,
    /// Position (x, y).
    pub r: [f64; DIM],
    /// Velocity (vx, vy).
    pub v: [f64; DIM],
    /// Disc radius (> 0).
    pub radius: f64,
    /// Mass (> 0).
    pub mass: f64,
    /// Collision participation counter (for event invalidation).
    pub collision_count: u64,
}

impl Particle {
    /// Create a new particle after validating invariants.
    ///
    /// Errors:
    /// - `Error::InvalidParam` if `radius` or `mass` is non-positive or any component is NaN/inf.
    pub fn new(id: u32, r: [f64; DIM], v: [f64; DIM], radius: f64, mass: f64) -> Result<Self> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(Error::InvalidParam("radius must be finite and > 0".into()));
        }
        if !mass.is_finite() || mass <= 0.0 {
            return Err(Error::InvalidParam("mass must be finite and > 0".into()));
        }
        if !r.iter().all(|x| x.is_finite()) {
            return Err(Error::InvalidParam("position must be finite".into()));
        }
        if !v.iter().all(|x| x.is_finite()) {
            return Err(Error::InvalidParam("velocity must be finite".into()));
        }
        Ok(Self {
            id,
            r,
            v,
            radius,
            mass,
            collision_count: 0,
        })
    }

    /// Drift the particle along its velocity for `dt`.
    ///
    /// `dt` must be non-negative; zero is a no-op.
    #[inline]
    pub fn advance(&mut self, dt: f64) {
        debug_assert!(dt >= 0.0, "advance requires non-negative dt");
        for (rk, vk) in self.r.iter_mut().zip(&self.v) {
            *rk += vk * dt;
        }
    }

    /// Increment the collision counter (used for event invalidation).
    #[inline]
    pub fn bump_collision_count(&mut self) {
        self.collision_count = self.collision_count.saturating_add(1);
    }

    /// Returns the particle's kinetic energy: 1/2 m |v|^2.
    #[inline]
    pub fn kinetic_energy(&self) -> f64 {
        let vsq: f64 = self.v.iter().map(|&c| c * c).sum();
        0.5 * self.mass * vsq
    }
}
