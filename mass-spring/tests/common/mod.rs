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
//! Shared fixtures for integration tests
//!
//! The crate ships no integrator, so the tests bring their own.

#![allow(dead_code)]

use mass_spring::{IntegrationContext, Integrator, Particle, SimulationError};
use std::any::Any;

/// Semi-implicit Euler with the boundary filters applied to `Δv`
pub struct SemiImplicitEuler;

impl Integrator for SemiImplicitEuler {
    fn name(&self) -> &str {
        "semi-implicit-euler"
    }

    fn initialize(&mut self, _particles: &[Particle]) {}

    fn step(
        &mut self,
        ctx: &mut IntegrationContext<'_>,
        _t: f64,
        h: f64,
        _iterations: usize,
    ) -> Result<(), SimulationError> {
        let filtered = ctx.constraints().len() == ctx.len();
        for i in 0..ctx.len() {
            let m = ctx.effective_mass(i);
            let raw = ctx.particles()[i].f / m * h;
            let dv = if filtered { ctx.constraints().project(i, raw) } else { raw };

            let particle = &mut ctx.particles_mut()[i];
            if particle.pinned {
                continue;
            }
            particle.v += dv;
            particle.p += particle.v * h;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Does nothing but count calls
pub struct CountingIntegrator {
    pub name: String,
    pub initialized: usize,
    pub steps: usize,
    pub last_particle_count: usize,
}

impl CountingIntegrator {
    pub fn new(name: &str) -> Self {
        CountingIntegrator {
            name: name.to_string(),
            initialized: 0,
            steps: 0,
            last_particle_count: 0,
        }
    }
}

impl Integrator for CountingIntegrator {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self, particles: &[Particle]) {
        self.initialized += 1;
        self.last_particle_count = particles.len();
    }

    fn step(
        &mut self,
        _ctx: &mut IntegrationContext<'_>,
        _t: f64,
        _h: f64,
        _iterations: usize,
    ) -> Result<(), SimulationError> {
        self.steps += 1;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Always fails
pub struct FailingIntegrator;

impl Integrator for FailingIntegrator {
    fn name(&self) -> &str {
        "failing"
    }

    fn initialize(&mut self, _particles: &[Particle]) {}

    fn step(
        &mut self,
        _ctx: &mut IntegrationContext<'_>,
        _t: f64,
        _h: f64,
        _iterations: usize,
    ) -> Result<(), SimulationError> {
        Err(SimulationError::Unsupported("failing integrator"))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Deterministic pseudo-random points in `[0, scale)²`
pub fn scatter_points(count: usize, scale: f64, seed: u64) -> Vec<glam::DVec2> {
    let mut state = seed;
    let mut next = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 11) as f64 / (1u64 << 53) as f64
    };
    (0..count)
        .map(|_| glam::DVec2::new(next() * scale, next() * scale))
        .collect()
}
