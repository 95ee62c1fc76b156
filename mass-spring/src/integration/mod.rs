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
//! Interface between the particle system and numerical integrators
//!
//! The system owns no integration scheme of its own. Integrators are plugged
//! in through [`IntegratorRegistry`], and each step the active one receives
//! an [`IntegrationContext`] borrowing the parts of the system it may touch:
//!
//! - the particles, mutably (positions, velocities, forces)
//! - the springs and the configuration, read-only
//! - the constraint filters left by the previous boundary pass, read-only
//!
//! Forces are already accumulated when `step` is called. Schemes that need
//! more evaluations (midpoint, RK4) call
//! [`IntegrationContext::accumulate_forces`] after moving the particles, and
//! implicit schemes fetch the spring Jacobians through
//! [`IntegrationContext::assemble_jacobians`].
//!
//! # Choosing a timestep
//!
//! Explicit schemes need `h` well below `sqrt(m / k)` for the stiffest
//! spring. Implicit schemes tolerate much larger steps but should still keep
//! particles from crossing a boundary in less than two steps, which is the
//! look-ahead used for discrete collisions.

use crate::config::SimulationConfig;
use crate::error::SimulationError;
use crate::math::{BlockMatrix, ConstraintSet};
use crate::particle::Particle;
use crate::spring::Spring;
use crate::system::forces::{self, Grab};
use std::any::Any;

mod registry;

pub use registry::IntegratorRegistry;

/// Integrator API version implemented by this crate
///
/// Integrators report the version they were written against through
/// [`Integrator::api_version`]; the registry rejects incompatible ones.
pub const INTEGRATOR_API_VERSION: &str = "0.1.0";

/// A numerical integration scheme
///
/// # Example
///
/// ```
/// use mass_spring::{IntegrationContext, Integrator, Particle, SimulationError};
/// use std::any::Any;
///
/// struct ForwardEuler;
///
/// impl Integrator for ForwardEuler {
///     fn name(&self) -> &str {
///         "forward-euler"
///     }
///
///     fn initialize(&mut self, _particles: &[Particle]) {}
///
///     fn step(
///         &mut self,
///         ctx: &mut IntegrationContext<'_>,
///         _t: f64,
///         h: f64,
///         _iterations: usize,
///     ) -> Result<(), SimulationError> {
///         for i in 0..ctx.len() {
///             let m = ctx.effective_mass(i);
///             let p = &mut ctx.particles_mut()[i];
///             if p.pinned {
///                 continue;
///             }
///             p.p += p.v * h;
///             p.v += p.f / m * h;
///         }
///         Ok(())
///     }
///
///     fn as_any(&self) -> &dyn Any {
///         self
///     }
/// }
/// ```
pub trait Integrator: Send + Sync {
    /// Unique name used for registration and selection
    fn name(&self) -> &str;

    /// Integrator API version this integrator targets
    fn api_version(&self) -> &str {
        INTEGRATOR_API_VERSION
    }

    /// Prepare internal buffers for a new particle set
    ///
    /// Called on registration and whenever the system structure changes.
    fn initialize(&mut self, particles: &[Particle]);

    /// Advance the particles from `t` to `t + h`
    ///
    /// `iterations` bounds the inner iterations of iterative solvers.
    fn step(
        &mut self,
        ctx: &mut IntegrationContext<'_>,
        t: f64,
        h: f64,
        iterations: usize,
    ) -> Result<(), SimulationError>;

    /// Get a reference to this integrator as Any, for downcasting
    fn as_any(&self) -> &dyn Any;
}

/// The slice of a particle system an integrator works on
pub struct IntegrationContext<'a> {
    particles: &'a mut [Particle],
    springs: &'a [Spring],
    config: &'a SimulationConfig,
    constraints: &'a ConstraintSet,
    grab: Grab,
}

impl<'a> IntegrationContext<'a> {
    /// Bundle the borrowed system state
    pub fn new(
        particles: &'a mut [Particle],
        springs: &'a [Spring],
        config: &'a SimulationConfig,
        constraints: &'a ConstraintSet,
        grab: Grab,
    ) -> Self {
        IntegrationContext {
            particles,
            springs,
            config,
            constraints,
            grab,
        }
    }

    /// Number of particles
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Whether there is nothing to integrate
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Particles, read-only
    pub fn particles(&self) -> &[Particle] {
        &*self.particles
    }

    /// Particles, mutable
    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut *self.particles
    }

    /// Springs of the system
    pub fn springs(&self) -> &[Spring] {
        self.springs
    }

    /// Simulation parameters
    pub fn config(&self) -> &SimulationConfig {
        self.config
    }

    /// Filters from the last boundary pass
    ///
    /// The seed is already folded into the velocities by the boundary pass
    /// and reads as zero here.
    pub fn constraints(&self) -> &ConstraintSet {
        self.constraints
    }

    /// Integration mass of particle `i`
    pub fn effective_mass(&self, i: usize) -> f64 {
        self.particles[i].effective_mass(self.config.heavy_mass_scale)
    }

    /// Recompute `Particle::f` at the current positions and velocities
    pub fn accumulate_forces(&mut self) {
        forces::accumulate_forces(self.particles, self.springs, self.config, self.grab);
    }

    /// Spring Jacobians `(K, B)` at the current state
    pub fn assemble_jacobians(&self) -> (BlockMatrix, BlockMatrix) {
        forces::assemble_jacobians(&*self.particles, self.springs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spring::LinearSpring;
    use glam::DVec2;

    #[test]
    fn test_context_reevaluates_forces() {
        let mut particles = vec![
            Particle::new(DVec2::ZERO, DVec2::ZERO),
            Particle::new(DVec2::new(1.0, 0.0), DVec2::ZERO),
        ];
        particles[1].index = 1;
        let springs = vec![Spring::from(LinearSpring::new(0, 1, 10.0, 0.0, &particles))];
        let config = SimulationConfig::default().with_use_gravity(false);
        let constraints = ConstraintSet::new(2);

        let mut ctx = IntegrationContext::new(&mut particles, &springs, &config, &constraints, None);
        ctx.accumulate_forces();
        assert_eq!(ctx.particles()[0].f, DVec2::ZERO);

        ctx.particles_mut()[1].p = DVec2::new(2.0, 0.0);
        ctx.accumulate_forces();
        assert_eq!(ctx.particles()[0].f, DVec2::new(10.0, 0.0));

        let (k, _) = ctx.assemble_jacobians();
        assert_eq!(k.block_count(), 4);
    }

    #[test]
    fn test_context_effective_mass() {
        let mut particles = vec![Particle::new(DVec2::ZERO, DVec2::ZERO).with_mass(2.0)];
        particles[0].heavy = true;
        let config = SimulationConfig::default().with_heavy_mass_scale(3.0);
        let constraints = ConstraintSet::new(1);

        let ctx = IntegrationContext::new(&mut particles, &[], &config, &constraints, None);
        assert_eq!(ctx.effective_mass(0), 6.0);
        assert_eq!(ctx.len(), 1);
    }
}
