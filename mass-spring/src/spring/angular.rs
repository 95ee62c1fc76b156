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
//! Bending spring over a three-particle chain
//!
//! Force only: there is no Jacobian and no swept collision, so implicit
//! integrators have to treat this force explicitly.

use crate::particle::{Particle, ParticleId};
use glam::DVec2;

/// Restores the angle at `p2` between `p1 -> p2` and `p2 -> p3`
#[derive(Debug, Clone, PartialEq)]
pub struct AngularSpring {
    chain: [ParticleId; 3],
    k: f64,
    theta0: f64,
    symmetric: bool,
}

/// Angle between `p1 -> p2` and `p2 -> p3`, in `[0, π]`
pub fn bend_angle(p1: DVec2, p2: DVec2, p3: DVec2) -> f64 {
    let v1 = p2 - p1;
    let v2 = p3 - p2;
    let cos = v1.dot(v2) / (v1.length() * v2.length());
    cos.clamp(-1.0, 1.0).acos()
}

impl AngularSpring {
    /// Create a bending spring; the target angle comes from the rest positions
    pub fn new(p1: ParticleId, p2: ParticleId, p3: ParticleId, k: f64, particles: &[Particle]) -> Self {
        let mut spring = AngularSpring {
            chain: [p1, p2, p3],
            k,
            theta0: 0.0,
            symmetric: false,
        };
        spring.compute_rest_length(particles);
        spring
    }

    /// Also push the third particle back (off by default)
    pub fn with_symmetric(mut self, symmetric: bool) -> Self {
        self.symmetric = symmetric;
        self
    }

    /// The three particles of the chain
    pub fn particles(&self) -> &[ParticleId] {
        &self.chain
    }

    /// Stiffness
    pub fn k(&self) -> f64 {
        self.k
    }

    /// Set the stiffness
    pub fn set_k(&mut self, k: f64) {
        self.k = k;
    }

    /// Target angle
    pub fn theta0(&self) -> f64 {
        self.theta0
    }

    /// Whether the counter force on `p3` is applied
    pub fn is_symmetric(&self) -> bool {
        self.symmetric
    }

    /// Recompute the target angle from the rest positions
    pub fn compute_rest_length(&mut self, particles: &[Particle]) {
        let [a, b, c] = self.chain;
        self.theta0 = bend_angle(particles[a].p0, particles[b].p0, particles[c].p0);
    }

    /// Current angle
    pub fn angle(&self, particles: &[Particle]) -> f64 {
        let [a, b, c] = self.chain;
        bend_angle(particles[a].p, particles[b].p, particles[c].p)
    }

    /// Forces on `p1` and `p3`; the latter is zero unless symmetric
    pub fn forces(&self, particles: &[Particle]) -> (DVec2, DVec2) {
        let [a, b, c] = self.chain;
        let (p1, p2, p3) = (particles[a].p, particles[b].p, particles[c].p);

        let turn = (p2 - p1).perp_dot(p3 - p2).signum();
        let magnitude = self.k * (self.angle(particles) - self.theta0) * turn;

        let first = (p1 - p2).perp().normalize() * magnitude;
        let third = if self.symmetric {
            (p3 - p2).perp().normalize() * -magnitude
        } else {
            DVec2::ZERO
        };
        (first, third)
    }

    /// Accumulate the bending force
    pub fn apply(&self, particles: &mut [Particle]) {
        let (first, third) = self.forces(particles);
        particles[self.chain[0]].add_force(first);
        if self.symmetric {
            particles[self.chain[2]].add_force(third);
        }
    }

    pub(crate) fn chain_mut(&mut self) -> &mut [ParticleId] {
        &mut self.chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_4;

    fn chain(p1: DVec2, p3: DVec2) -> Vec<Particle> {
        vec![
            Particle::new(p1, DVec2::ZERO),
            Particle::new(DVec2::ZERO, DVec2::ZERO),
            Particle::new(p3, DVec2::ZERO),
        ]
    }

    #[test]
    fn test_straight_chain_at_rest_has_no_force() {
        let particles = chain(DVec2::new(-1.0, 0.0), DVec2::new(1.0, 0.0));
        let spring = AngularSpring::new(0, 1, 2, 10.0, &particles);
        assert_eq!(spring.theta0(), 0.0);
        let (first, third) = spring.forces(&particles);
        assert_eq!(first, DVec2::ZERO);
        assert_eq!(third, DVec2::ZERO);
    }

    #[test]
    fn test_bent_chain_pushes_first_particle_straight() {
        let mut particles = chain(DVec2::new(-1.0, 0.0), DVec2::new(1.0, 0.0));
        let spring = AngularSpring::new(0, 1, 2, 10.0, &particles);
        particles[0].p = DVec2::new(-1.0, 1.0);

        assert!((spring.angle(&particles) - FRAC_PI_4).abs() < 1e-12);
        spring.apply(&mut particles);

        // moves p1 down toward the straight configuration
        assert!(particles[0].f.y < 0.0);
        assert!((particles[0].f.length() - 10.0 * FRAC_PI_4).abs() < 1e-9);
        assert_eq!(particles[2].f, DVec2::ZERO);
    }

    #[test]
    fn test_symmetric_mode_pushes_third_particle() {
        let mut particles = chain(DVec2::new(-1.0, 0.0), DVec2::new(1.0, 0.0));
        let spring = AngularSpring::new(0, 1, 2, 10.0, &particles).with_symmetric(true);
        particles[2].p = DVec2::new(1.0, 1.0);

        spring.apply(&mut particles);
        assert!(particles[2].f.y < 0.0);
        assert!(particles[2].f.abs_diff_eq(DVec2::new(1.0, -1.0).normalize() * 10.0 * FRAC_PI_4, 1e-9));
    }
}
