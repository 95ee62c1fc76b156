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
//! Force accumulation and Jacobian assembly
//!
//! Forces are accumulated into `Particle::f` from scratch on every call:
//!
//! 1. gravity (scaled by the effective mass, so heavy particles fall alike)
//! 2. spring forces
//! 3. viscous drag `-c v`
//! 4. floor friction `-μ m vT` for particles resting on a boundary
//! 5. inverse-square repulsion between nearby particles
//! 6. the grab pull toward the drag target
//!
//! Pinned particles end up with a zero force.
//!
//! ## Parallelism
//!
//! With the `parallel` feature, per-spring contributions are evaluated with
//! Rayon and then added to the particles sequentially in spring order, so the
//! result does not depend on the feature.

use crate::config::SimulationConfig;
use crate::math::BlockMatrix;
use crate::particle::{Particle, ParticleId};
use crate::quadtree::QuadTree;
use crate::spring::{Spring, SpringForce, SpringJacobian};
use glam::DVec2;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Drag target of the grabbed particle
pub type Grab = Option<(ParticleId, DVec2)>;

/// Reset and accumulate every force acting on `particles`
pub fn accumulate_forces(
    particles: &mut [Particle],
    springs: &[Spring],
    config: &SimulationConfig,
    grab: Grab,
) {
    for particle in particles.iter_mut() {
        particle.f = DVec2::ZERO;
        if config.use_gravity {
            let mass = particle.effective_mass(config.heavy_mass_scale);
            particle.add_force(config.gravity * mass);
        }
    }

    for contribution in spring_forces(particles, springs) {
        for (id, force) in contribution {
            particles[id].add_force(force);
        }
    }

    for particle in particles.iter_mut() {
        let drag = particle.v * -config.viscous_damping;
        particle.add_force(drag);

        if particle.in_contact {
            if let Some(contact) = particle.contacts().first() {
                let n = contact.normal;
                let v_t = particle.v - n * particle.v.dot(n);
                let mass = particle.effective_mass(config.heavy_mass_scale);
                let friction = v_t * (-config.floor_friction * mass);
                particle.add_force(friction);
            }
        }
    }

    if config.repulsion_strength > 0.0 && particles.len() > 1 {
        let repulsion = repulsion_forces(particles, config.repulsion_strength, config.repulsion_radius);
        for (particle, force) in particles.iter_mut().zip(repulsion) {
            particle.add_force(force);
        }
    }

    if let Some((id, target)) = grab {
        if let Some(particle) = particles.get_mut(id) {
            let pull = (target - particle.p) * config.grab_stiffness - particle.v * config.grab_damping;
            particle.add_force(pull);
        }
    }

    for particle in particles.iter_mut().filter(|p| p.pinned) {
        particle.f = DVec2::ZERO;
    }
}

#[cfg(feature = "parallel")]
fn spring_forces(particles: &[Particle], springs: &[Spring]) -> Vec<SpringForce> {
    springs.par_iter().map(|s| s.forces(particles)).collect()
}

#[cfg(not(feature = "parallel"))]
fn spring_forces(particles: &[Particle], springs: &[Spring]) -> Vec<SpringForce> {
    springs.iter().map(|s| s.forces(particles)).collect()
}

/// Inverse-square repulsion from every particle within `radius`
///
/// Coincident particles exert nothing on each other.
fn repulsion_forces(particles: &[Particle], strength: f64, radius: f64) -> Vec<DVec2> {
    let tree = QuadTree::build(particles);
    particles
        .iter()
        .enumerate()
        .map(|(i, particle)| {
            tree.neighbors(particle.p.x, particle.p.y, radius)
                .into_iter()
                .filter(|&j| j != i)
                .fold(DVec2::ZERO, |acc, j| {
                    let d = particle.p - particles[j].p;
                    let r2 = d.length_squared();
                    if r2 == 0.0 {
                        acc
                    } else {
                        acc + d / r2.sqrt() * (strength / r2)
                    }
                })
        })
        .collect()
}

/// Stiffness and damping Jacobians `(K, B)` of every spring that has one
pub fn assemble_jacobians(particles: &[Particle], springs: &[Spring]) -> (BlockMatrix, BlockMatrix) {
    let mut k = BlockMatrix::new(particles.len());
    let mut b = BlockMatrix::new(particles.len());
    for jacobian in spring_jacobians(particles, springs) {
        jacobian.scatter(&mut k, &mut b);
    }
    (k, b)
}

#[cfg(feature = "parallel")]
fn spring_jacobians(particles: &[Particle], springs: &[Spring]) -> Vec<SpringJacobian> {
    springs
        .par_iter()
        .filter_map(|s| s.jacobian(particles).ok())
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn spring_jacobians(particles: &[Particle], springs: &[Spring]) -> Vec<SpringJacobian> {
    springs
        .iter()
        .filter_map(|s| s.jacobian(particles).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::BoundaryId;
    use crate::particle::Contact;
    use crate::spring::LinearSpring;

    fn still_config() -> SimulationConfig {
        SimulationConfig::default()
            .with_use_gravity(false)
            .with_floor_friction(0.0)
    }

    #[test]
    fn test_gravity_scales_with_effective_mass() {
        let mut particles = vec![
            Particle::new(DVec2::ZERO, DVec2::ZERO).with_mass(2.0),
            Particle::new(DVec2::X, DVec2::ZERO).with_mass(2.0),
        ];
        particles[1].heavy = true;
        let config = SimulationConfig::default().with_heavy_mass_scale(10.0);

        accumulate_forces(&mut particles, &[], &config, None);
        assert!(particles[0].f.abs_diff_eq(DVec2::new(0.0, -19.6), 1e-12));
        assert!(particles[1].f.abs_diff_eq(DVec2::new(0.0, -196.0), 1e-10));
    }

    #[test]
    fn test_forces_reset_each_call() {
        let mut particles = vec![Particle::new(DVec2::ZERO, DVec2::ZERO)];
        particles[0].f = DVec2::new(100.0, 100.0);
        accumulate_forces(&mut particles, &[], &still_config(), None);
        assert_eq!(particles[0].f, DVec2::ZERO);
    }

    #[test]
    fn test_pinned_particle_has_no_force() {
        let mut particles = vec![
            Particle::new(DVec2::ZERO, DVec2::ZERO).with_pinned(true),
            Particle::new(DVec2::new(10.0, 0.0), DVec2::ZERO),
        ];
        particles[1].index = 1;
        let springs = vec![Spring::from(LinearSpring::new(0, 1, 100.0, 0.0, &particles))];
        particles[1].p = DVec2::new(12.0, 0.0);

        accumulate_forces(&mut particles, &springs, &still_config(), None);
        assert_eq!(particles[0].f, DVec2::ZERO);
        assert_eq!(particles[1].f, DVec2::new(-200.0, 0.0));
    }

    #[test]
    fn test_viscous_drag_and_floor_friction() {
        let mut particles = vec![Particle::new(DVec2::ZERO, DVec2::new(2.0, -1.0))];
        particles[0].record_contact(Contact {
            boundary: BoundaryId(0),
            point: DVec2::ZERO,
            normal: DVec2::Y,
        });
        particles[0].in_contact = true;
        let config = still_config().with_viscous_damping(0.5).with_floor_friction(0.25);

        accumulate_forces(&mut particles, &[], &config, None);
        // drag (-1, 0.5) plus friction on the tangential part (-0.5, 0)
        assert_eq!(particles[0].f, DVec2::new(-1.5, 0.5));
    }

    #[test]
    fn test_floor_friction_uses_effective_mass() {
        let floor_contact = Contact {
            boundary: BoundaryId(0),
            point: DVec2::ZERO,
            normal: DVec2::Y,
        };
        let mut particles = vec![
            Particle::new(DVec2::ZERO, DVec2::new(1.0, 0.0)),
            Particle::new(DVec2::X, DVec2::new(1.0, 0.0)),
        ];
        particles[1].heavy = true;
        for particle in particles.iter_mut() {
            particle.record_contact(floor_contact);
            particle.in_contact = true;
        }
        let config = still_config().with_floor_friction(0.2).with_heavy_mass_scale(10.0);

        accumulate_forces(&mut particles, &[], &config, None);
        assert!(particles[0].f.abs_diff_eq(DVec2::new(-0.2, 0.0), 1e-12));
        assert!(particles[1].f.abs_diff_eq(DVec2::new(-2.0, 0.0), 1e-12));
        // same deceleration for both
        let a0 = particles[0].f / particles[0].effective_mass(10.0);
        let a1 = particles[1].f / particles[1].effective_mass(10.0);
        assert!(a0.abs_diff_eq(a1, 1e-12));
    }

    #[test]
    fn test_repulsion_pushes_apart_and_ignores_coincident() {
        let mut particles = vec![
            Particle::new(DVec2::ZERO, DVec2::ZERO),
            Particle::new(DVec2::new(0.5, 0.0), DVec2::ZERO),
            Particle::new(DVec2::new(5.0, 5.0), DVec2::ZERO),
            Particle::new(DVec2::new(5.0, 5.0), DVec2::ZERO),
        ];
        let config = still_config().with_repulsion(1.0, 1.0);

        accumulate_forces(&mut particles, &[], &config, None);
        assert!(particles[0].f.abs_diff_eq(DVec2::new(-4.0, 0.0), 1e-12));
        assert!(particles[1].f.abs_diff_eq(DVec2::new(4.0, 0.0), 1e-12));
        assert_eq!(particles[2].f, DVec2::ZERO);
        assert_eq!(particles[3].f, DVec2::ZERO);
    }

    #[test]
    fn test_grab_pulls_toward_target() {
        let mut particles = vec![Particle::new(DVec2::ZERO, DVec2::new(1.0, 0.0))];
        let config = still_config().with_grab(10.0, 2.0);

        accumulate_forces(&mut particles, &[], &config, Some((0, DVec2::new(0.0, 3.0))));
        assert_eq!(particles[0].f, DVec2::new(-2.0, 30.0));

        // stale grab ids are ignored
        accumulate_forces(&mut particles, &[], &config, Some((5, DVec2::ZERO)));
        assert_eq!(particles[0].f, DVec2::ZERO);
    }

    #[test]
    fn test_assemble_skips_angular_springs() {
        let mut particles: Vec<Particle> = (0..3)
            .map(|i| Particle::new(DVec2::new(i as f64, (i % 2) as f64), DVec2::ZERO))
            .collect();
        for (i, p) in particles.iter_mut().enumerate() {
            p.index = i;
        }
        let springs = vec![
            Spring::from(LinearSpring::new(0, 1, 10.0, 1.0, &particles)),
            Spring::from(crate::spring::AngularSpring::new(0, 1, 2, 10.0, &particles)),
        ];

        let (k, b) = assemble_jacobians(&particles, &springs);
        assert_eq!(k.dimension(), 3);
        assert_eq!(k.block_count(), 4);
        assert_eq!(b.block_count(), 4);
        assert_eq!(k.block(2, 2), glam::DMat2::ZERO);
    }
}
