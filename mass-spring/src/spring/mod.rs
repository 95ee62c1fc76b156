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
//! Spring force models
//!
//! Springs are stored by the system as a tagged [`Spring`] value. Every
//! variant accumulates forces; only [`LinearSpring`] provides a Jacobian and a
//! swept collision test, and the other variants report
//! [`SimulationError::Unsupported`] for those.

use crate::error::SimulationError;
use crate::math::BlockMatrix;
use crate::particle::{Particle, ParticleId};
use glam::DVec2;

mod angular;
mod linear;

pub use angular::{bend_angle, AngularSpring};
pub use linear::{LinearSpring, SpringJacobian};

/// Per-particle force contributions of one spring
///
/// Unused slots carry a zero force on the spring's first particle.
pub type SpringForce = [(ParticleId, DVec2); 3];

/// A spring of either kind
#[derive(Debug, Clone, PartialEq)]
pub enum Spring {
    /// Two-particle damped spring
    Linear(LinearSpring),
    /// Three-particle bending spring
    Angular(AngularSpring),
}

impl Spring {
    /// Accumulate this spring's force into its particles
    pub fn apply(&self, particles: &mut [Particle]) {
        match self {
            Spring::Linear(s) => s.apply(particles),
            Spring::Angular(s) => s.apply(particles),
        }
    }

    /// Force contributions without touching the particles
    pub fn forces(&self, particles: &[Particle]) -> SpringForce {
        match self {
            Spring::Linear(s) => {
                let f = s.force(particles);
                [(s.p1(), f), (s.p2(), -f), (s.p1(), DVec2::ZERO)]
            }
            Spring::Angular(s) => {
                let chain = s.particles();
                let (first, third) = s.forces(particles);
                [(chain[0], first), (chain[2], third), (chain[1], DVec2::ZERO)]
            }
        }
    }

    /// Jacobian blocks, for springs that have one
    pub fn jacobian(&self, particles: &[Particle]) -> Result<SpringJacobian, SimulationError> {
        match self {
            Spring::Linear(s) => Ok(s.jacobian(particles)),
            Spring::Angular(_) => Err(SimulationError::Unsupported("angular spring gradient")),
        }
    }

    /// Scatter the Jacobian into the stiffness and damping matrices
    pub fn gradient(
        &self,
        particles: &[Particle],
        k: &mut BlockMatrix,
        b: &mut BlockMatrix,
    ) -> Result<(), SimulationError> {
        self.jacobian(particles)?.scatter(k, b);
        Ok(())
    }

    /// Swept collision of `target` against this spring
    pub fn intersect(
        &self,
        particles: &mut [Particle],
        target: ParticleId,
        step: f64,
        restitution: f64,
    ) -> Result<bool, SimulationError> {
        match self {
            Spring::Linear(s) => Ok(s.intersect(particles, target, step, restitution)),
            Spring::Angular(_) => Err(SimulationError::Unsupported("angular spring intersection")),
        }
    }

    /// Stiffness
    pub fn k(&self) -> f64 {
        match self {
            Spring::Linear(s) => s.k(),
            Spring::Angular(s) => s.k(),
        }
    }

    /// Set the stiffness
    pub fn set_k(&mut self, k: f64) {
        match self {
            Spring::Linear(s) => s.set_k(k),
            Spring::Angular(s) => s.set_k(k),
        }
    }

    /// Damping; always zero for bending springs
    pub fn b(&self) -> f64 {
        match self {
            Spring::Linear(s) => s.b(),
            Spring::Angular(_) => 0.0,
        }
    }

    /// Set the damping; ignored by bending springs
    pub fn set_b(&mut self, b: f64) {
        match self {
            Spring::Linear(s) => s.set_b(b),
            Spring::Angular(_) => log::debug!("ignoring damping {} on angular spring", b),
        }
    }

    /// Particles the spring acts on
    pub fn particles(&self) -> &[ParticleId] {
        match self {
            Spring::Linear(s) => s.particles(),
            Spring::Angular(s) => s.particles(),
        }
    }

    /// Whether `id` is one of the spring's particles
    pub fn involves(&self, id: ParticleId) -> bool {
        self.particles().contains(&id)
    }

    /// Recompute the rest configuration from the particles' rest positions
    pub fn compute_rest_length(&mut self, particles: &[Particle]) {
        match self {
            Spring::Linear(s) => s.compute_rest_length(particles),
            Spring::Angular(s) => s.compute_rest_length(particles),
        }
    }

    /// Renumber particle references through `map`
    ///
    /// Returns `false`, leaving the spring untouched, when any referenced
    /// particle has no new index.
    pub(crate) fn remap(&mut self, map: &[Option<ParticleId>]) -> bool {
        let ids = match self {
            Spring::Linear(s) => s.ends_mut(),
            Spring::Angular(s) => s.chain_mut(),
        };
        let mapped: Option<Vec<ParticleId>> =
            ids.iter().map(|&id| map.get(id).copied().flatten()).collect();
        match mapped {
            Some(mapped) => {
                ids.copy_from_slice(&mapped);
                true
            }
            None => false,
        }
    }
}

impl From<LinearSpring> for Spring {
    fn from(spring: LinearSpring) -> Self {
        Spring::Linear(spring)
    }
}

impl From<AngularSpring> for Spring {
    fn from(spring: AngularSpring) -> Self {
        Spring::Angular(spring)
    }
}
