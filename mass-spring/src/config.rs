// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Simulation parameters
//!
//! All tunable constants of the particle system live in [`SimulationConfig`]
//! and are handed to [`ParticleSystem`](crate::ParticleSystem) explicitly, so
//! independent simulations never share mutable global state.
//!
//! # Environment Configuration
//!
//! A handful of parameters can be overridden from the environment, which is
//! convenient when tuning a scene without recompiling:
//!
//! ```bash
//! export MASS_SPRING_GRAVITY_Y=-4.9
//! export MASS_SPRING_STIFFNESS=250
//! export MASS_SPRING_DAMPING=2
//! export MASS_SPRING_RESTITUTION=0.5
//! export MASS_SPRING_ITERATIONS=50
//! ```

use crate::error::SimulationError;
use glam::DVec2;
use std::str::FromStr;

/// Environment variable overriding the vertical gravity component
pub const ENV_GRAVITY_Y: &str = "MASS_SPRING_GRAVITY_Y";
/// Environment variable overriding the default spring stiffness
pub const ENV_STIFFNESS: &str = "MASS_SPRING_STIFFNESS";
/// Environment variable overriding the default spring damping
pub const ENV_DAMPING: &str = "MASS_SPRING_DAMPING";
/// Environment variable overriding the restitution coefficient
pub const ENV_RESTITUTION: &str = "MASS_SPRING_RESTITUTION";
/// Environment variable overriding the solver iteration count
pub const ENV_ITERATIONS: &str = "MASS_SPRING_ITERATIONS";

/// Global parameters of a particle system
///
/// # Example
///
/// ```
/// use mass_spring::SimulationConfig;
/// use glam::DVec2;
///
/// let config = SimulationConfig::default()
///     .with_gravity(DVec2::new(0.0, -4.9))
///     .with_spring_stiffness(250.0)
///     .with_iterations(50);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Gravitational acceleration
    pub gravity: DVec2,
    /// Whether gravity is applied at all
    pub use_gravity: bool,
    /// Stiffness given to newly created springs
    pub spring_stiffness: f64,
    /// Damping given to newly created springs
    pub spring_damping: f64,
    /// Coefficient of the global viscous drag `-c v`
    pub viscous_damping: f64,
    /// Drag coefficient applied to particles resting on a boundary
    pub floor_friction: f64,
    /// Restitution used when a particle bounces off a spring
    pub restitution: f64,
    /// Upper bound on inner solver iterations handed to the integrator
    pub iterations: usize,
    /// Distance under which a slow particle is held in resting contact
    pub contact_distance: f64,
    /// Distance under which a moving particle counts as colliding
    pub collision_distance: f64,
    /// Stiffness of the pull toward the grab target
    pub grab_stiffness: f64,
    /// Damping of the pull toward the grab target
    pub grab_damping: f64,
    /// Strength of the inverse-square particle repulsion (0 disables it)
    pub repulsion_strength: f64,
    /// Cut-off radius of the particle repulsion
    pub repulsion_radius: f64,
    /// Whether particles are swept against springs after each step
    pub spring_collisions: bool,
    /// Whether angular springs also push the third particle of the chain
    pub symmetric_angular_force: bool,
    /// Mass multiplier for particles flagged heavy
    pub heavy_mass_scale: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            gravity: DVec2::new(0.0, -9.8),
            use_gravity: true,
            spring_stiffness: 100.0,
            spring_damping: 1.0,
            viscous_damping: 0.0,
            floor_friction: 0.2,
            restitution: 0.8,
            iterations: 100,
            contact_distance: 0.05,
            collision_distance: 0.0,
            grab_stiffness: 50.0,
            grab_damping: 5.0,
            repulsion_strength: 0.0,
            repulsion_radius: 1.0,
            spring_collisions: false,
            symmetric_angular_force: false,
            heavy_mass_scale: 10.0,
        }
    }
}

impl SimulationConfig {
    /// Set the gravity vector
    pub fn with_gravity(mut self, gravity: DVec2) -> Self {
        self.gravity = gravity;
        self
    }

    /// Enable or disable gravity
    pub fn with_use_gravity(mut self, enabled: bool) -> Self {
        self.use_gravity = enabled;
        self
    }

    /// Set the stiffness of newly created springs
    pub fn with_spring_stiffness(mut self, k: f64) -> Self {
        self.spring_stiffness = k;
        self
    }

    /// Set the damping of newly created springs
    pub fn with_spring_damping(mut self, b: f64) -> Self {
        self.spring_damping = b;
        self
    }

    /// Set the viscous drag coefficient
    pub fn with_viscous_damping(mut self, c: f64) -> Self {
        self.viscous_damping = c;
        self
    }

    /// Set the floor friction coefficient
    pub fn with_floor_friction(mut self, mu: f64) -> Self {
        self.floor_friction = mu;
        self
    }

    /// Set the restitution coefficient
    pub fn with_restitution(mut self, e: f64) -> Self {
        self.restitution = e;
        self
    }

    /// Set the inner iteration bound
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the resting contact distance
    pub fn with_contact_distance(mut self, d: f64) -> Self {
        self.contact_distance = d;
        self
    }

    /// Set the collision distance
    pub fn with_collision_distance(mut self, d: f64) -> Self {
        self.collision_distance = d;
        self
    }

    /// Set the grab spring parameters
    pub fn with_grab(mut self, stiffness: f64, damping: f64) -> Self {
        self.grab_stiffness = stiffness;
        self.grab_damping = damping;
        self
    }

    /// Set the particle repulsion parameters
    pub fn with_repulsion(mut self, strength: f64, radius: f64) -> Self {
        self.repulsion_strength = strength;
        self.repulsion_radius = radius;
        self
    }

    /// Enable or disable the particle-versus-spring sweep test
    pub fn with_spring_collisions(mut self, enabled: bool) -> Self {
        self.spring_collisions = enabled;
        self
    }

    /// Enable or disable the counter force of angular springs
    pub fn with_symmetric_angular_force(mut self, enabled: bool) -> Self {
        self.symmetric_angular_force = enabled;
        self
    }

    /// Set the mass multiplier for heavy particles
    pub fn with_heavy_mass_scale(mut self, scale: f64) -> Self {
        self.heavy_mass_scale = scale;
        self
    }

    /// Apply overrides from `MASS_SPRING_*` environment variables
    ///
    /// Variables that are unset are left alone; values that fail to parse are
    /// ignored with a warning.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(gy) = read_env::<f64>(ENV_GRAVITY_Y) {
            self.gravity.y = gy;
        }
        if let Some(k) = read_env::<f64>(ENV_STIFFNESS) {
            self.spring_stiffness = k;
        }
        if let Some(b) = read_env::<f64>(ENV_DAMPING) {
            self.spring_damping = b;
        }
        if let Some(e) = read_env::<f64>(ENV_RESTITUTION) {
            self.restitution = e;
        }
        if let Some(n) = read_env::<usize>(ENV_ITERATIONS) {
            self.iterations = n;
        }
        self
    }

    /// Check that every parameter is finite and within its valid range
    pub fn validate(&self) -> Result<(), SimulationError> {
        if !self.gravity.is_finite() {
            return Err(SimulationError::InvalidConfig(format!(
                "gravity must be finite, got {:?}",
                self.gravity
            )));
        }

        let non_negative = [
            ("spring_stiffness", self.spring_stiffness),
            ("spring_damping", self.spring_damping),
            ("viscous_damping", self.viscous_damping),
            ("floor_friction", self.floor_friction),
            ("restitution", self.restitution),
            ("contact_distance", self.contact_distance),
            ("collision_distance", self.collision_distance),
            ("grab_stiffness", self.grab_stiffness),
            ("grab_damping", self.grab_damping),
            ("repulsion_strength", self.repulsion_strength),
            ("repulsion_radius", self.repulsion_radius),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(SimulationError::InvalidConfig(format!(
                    "{} must be non-negative and finite, got {}",
                    name, value
                )));
            }
        }

        if !(self.heavy_mass_scale > 0.0 && self.heavy_mass_scale.is_finite()) {
            return Err(SimulationError::InvalidConfig(format!(
                "heavy_mass_scale must be positive and finite, got {}",
                self.heavy_mass_scale
            )));
        }

        Ok(())
    }
}

fn read_env<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring {}={:?}: not a valid value", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.iterations, 100);
        assert!(!config.symmetric_angular_force);
    }

    #[test]
    fn test_builder_chain() {
        let config = SimulationConfig::default()
            .with_spring_stiffness(42.0)
            .with_spring_damping(0.5)
            .with_use_gravity(false)
            .with_repulsion(3.0, 2.0);
        assert_eq!(config.spring_stiffness, 42.0);
        assert_eq!(config.spring_damping, 0.5);
        assert!(!config.use_gravity);
        assert_eq!(config.repulsion_strength, 3.0);
        assert_eq!(config.repulsion_radius, 2.0);
    }

    #[test]
    fn test_validate_rejects_negative_values() {
        let config = SimulationConfig::default().with_spring_stiffness(-1.0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("spring_stiffness"));

        let config = SimulationConfig::default().with_restitution(f64::NAN);
        assert!(config.validate().is_err());

        let config = SimulationConfig::default().with_heavy_mass_scale(0.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_finite_gravity() {
        let config = SimulationConfig::default().with_gravity(DVec2::new(0.0, f64::INFINITY));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var(ENV_ITERATIONS, "17");
        std::env::set_var(ENV_RESTITUTION, "not-a-number");
        let config = SimulationConfig::default().with_env_overrides();
        std::env::remove_var(ENV_ITERATIONS);
        std::env::remove_var(ENV_RESTITUTION);

        assert_eq!(config.iterations, 17);
        assert_eq!(config.restitution, SimulationConfig::default().restitution);
    }
}
