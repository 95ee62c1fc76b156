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
//! Damped linear spring between two particles

use crate::collision::{are_intersecting, bounce};
use crate::math::{outer, BlockMatrix};
use crate::particle::{Particle, ParticleId};
use glam::{DMat2, DVec2};

/// Force-Jacobian blocks of one linear spring, ready to scatter
///
/// `ks` is `∂f₁/∂x₁` and `bs` is `∂f₁/∂v₁` for the force `f₁` on the first
/// endpoint. The full contribution is `+` on the diagonal blocks and `-` on
/// the off-diagonal ones, so the assembled matrices stay symmetric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringJacobian {
    /// Row/column of the first endpoint
    pub a: usize,
    /// Row/column of the second endpoint
    pub b: usize,
    /// Stiffness block
    pub ks: DMat2,
    /// Damping block
    pub bs: DMat2,
}

impl SpringJacobian {
    /// Add this spring's blocks into the global stiffness and damping matrices
    pub fn scatter(&self, k: &mut BlockMatrix, b: &mut BlockMatrix) {
        let (i, j) = (self.a, self.b);
        k.add_block(i, i, self.ks);
        k.add_block(i, j, -self.ks);
        k.add_block(j, i, -self.ks);
        k.add_block(j, j, self.ks);

        b.add_block(i, i, self.bs);
        b.add_block(i, j, -self.bs);
        b.add_block(j, i, -self.bs);
        b.add_block(j, j, self.bs);
    }
}

/// Hookean spring with viscous damping along its axis
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSpring {
    ends: [ParticleId; 2],
    k: f64,
    b: f64,
    rest_length: f64,
}

impl LinearSpring {
    /// Connect `p1` and `p2`; the rest length is taken from their rest
    /// positions
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range for `particles`.
    pub fn new(p1: ParticleId, p2: ParticleId, k: f64, b: f64, particles: &[Particle]) -> Self {
        let mut spring = LinearSpring {
            ends: [p1, p2],
            k,
            b,
            rest_length: 0.0,
        };
        spring.compute_rest_length(particles);
        spring
    }

    /// First endpoint
    pub fn p1(&self) -> ParticleId {
        self.ends[0]
    }

    /// Second endpoint
    pub fn p2(&self) -> ParticleId {
        self.ends[1]
    }

    /// Both endpoints
    pub fn particles(&self) -> &[ParticleId] {
        &self.ends
    }

    /// Stiffness
    pub fn k(&self) -> f64 {
        self.k
    }

    /// Set the stiffness
    pub fn set_k(&mut self, k: f64) {
        self.k = k;
    }

    /// Damping coefficient
    pub fn b(&self) -> f64 {
        self.b
    }

    /// Set the damping coefficient
    pub fn set_b(&mut self, b: f64) {
        self.b = b;
    }

    /// Rest length `l0`
    pub fn rest_length(&self) -> f64 {
        self.rest_length
    }

    /// Recompute `l0` from the endpoints' rest positions
    pub fn compute_rest_length(&mut self, particles: &[Particle]) {
        let [a, b] = self.ends;
        self.rest_length = (particles[b].p0 - particles[a].p0).length();
    }

    /// Force on the first endpoint; the second receives the negation
    ///
    /// Coincident endpoints give a NaN force.
    pub fn force(&self, particles: &[Particle]) -> DVec2 {
        let (first, second) = (&particles[self.ends[0]], &particles[self.ends[1]]);
        let d = second.p - first.p;
        let l = d.length();
        let dir = d / l;

        let elastic = dir * ((l - self.rest_length) * self.k);
        let damping = dir * (self.b * (second.v - first.v).dot(dir));
        elastic + damping
    }

    /// Accumulate the spring force into both endpoints
    pub fn apply(&self, particles: &mut [Particle]) {
        let f = self.force(particles);
        particles[self.ends[0]].add_force(f);
        particles[self.ends[1]].add_force(-f);
    }

    /// Jacobian blocks at the current state
    ///
    /// ```text
    /// Ks = -k (1 - l0/l) I - k l0 / l³ d dᵀ
    /// Bs = -b / l² d dᵀ
    /// ```
    pub fn jacobian(&self, particles: &[Particle]) -> SpringJacobian {
        let (first, second) = (&particles[self.ends[0]], &particles[self.ends[1]]);
        let d = second.p - first.p;
        let l2 = d.length_squared();
        let l = l2.sqrt();
        let ddt = outer(d, d);

        let ks = DMat2::IDENTITY * (-self.k * (1.0 - self.rest_length / l))
            - ddt * (self.k * self.rest_length / (l2 * l));
        let bs = ddt * (-self.b / l2);

        SpringJacobian {
            a: first.index,
            b: second.index,
            ks,
            bs,
        }
    }

    /// Scatter the Jacobian blocks into `k` and `b`
    pub fn gradient(&self, particles: &[Particle], k: &mut BlockMatrix, b: &mut BlockMatrix) {
        self.jacobian(particles).scatter(k, b);
    }

    /// Swept test of `target` against the spring segment
    ///
    /// The particle's path over the next two steps (`p -> p + 2 step v`) is
    /// tested against the segment between the endpoints. Endpoints of this
    /// spring and particles already in contact are skipped. On a hit all three
    /// particles are flagged `in_contact` and `target` is bounced off the
    /// segment.
    pub fn intersect(
        &self,
        particles: &mut [Particle],
        target: ParticleId,
        step: f64,
        restitution: f64,
    ) -> bool {
        if self.ends.contains(&target) || particles[target].in_contact {
            return false;
        }

        let a = particles[self.ends[0]].p;
        let b = particles[self.ends[1]].p;
        let start = particles[target].p;
        let end = start + particles[target].v * (2.0 * step);
        if !are_intersecting(a, b, start, end) {
            return false;
        }

        for id in [self.ends[0], self.ends[1], target] {
            particles[id].in_contact = true;
        }
        bounce(&mut particles[target], a, b, restitution);
        true
    }

    pub(crate) fn ends_mut(&mut self) -> &mut [ParticleId] {
        &mut self.ends
    }
}
