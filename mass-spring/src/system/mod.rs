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
//! The particle system
//!
//! [`ParticleSystem`] owns particles, springs and boundaries and drives one
//! simulation step at a time:
//!
//! 1. forces are reset and accumulated
//! 2. the active integrator advances the particles
//! 3. particles that turned non-finite are flagged `illegal`
//! 4. resting contacts and discrete collisions with the boundaries are
//!    resolved, and the resulting velocity changes applied
//! 5. particles are optionally swept against the springs
//! 6. the clock advances
//!
//! Structural edits (adding particles or springs) only mark the system
//! dirty; the rebuild happens lazily before the next step or explicitly
//! through [`ParticleSystem::update_system`]. Removals rebuild immediately
//! since spring references have to be renumbered.

use crate::boundary::{Boundary, BoundaryId, CONTACT_SPEED_THRESHOLD};
use crate::config::SimulationConfig;
use crate::error::SimulationError;
use crate::integration::{IntegrationContext, Integrator, IntegratorRegistry};
use crate::math::{BlockMatrix, ConstraintSet};
use crate::particle::{Particle, ParticleId};
use crate::quadtree::QuadTree;
use crate::spring::{AngularSpring, LinearSpring, Spring};
use glam::DVec2;

pub mod forces;

/// Counters of one boundary pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContactStats {
    /// Discrete collisions resolved
    pub collisions: usize,
    /// Resting contacts enforced
    pub resting: usize,
    /// Particles bounced off a spring
    pub spring_hits: usize,
}

/// A 2D mass-spring system
///
/// # Example
///
/// ```
/// use mass_spring::{Boundary, ParticleSystem, SimulationConfig};
/// use glam::DVec2;
///
/// let mut system = ParticleSystem::new(SimulationConfig::default()).unwrap();
/// let a = system.create_particle(0.0, 1.0, 0.0, 0.0);
/// let b = system.create_particle(1.0, 1.0, 0.0, 0.0);
/// system.create_spring(a, b).unwrap();
/// system.add_boundary(Boundary::new(DVec2::new(-5.0, 0.0), DVec2::new(5.0, 0.0)));
///
/// // stepping requires an integrator
/// assert!(system.step(0.01).is_err());
/// ```
#[derive(Debug)]
pub struct ParticleSystem {
    particles: Vec<Particle>,
    springs: Vec<Spring>,
    boundaries: Vec<Boundary>,
    integrators: IntegratorRegistry,
    config: SimulationConfig,
    time: f64,
    grab: Option<(ParticleId, DVec2)>,
    constraints: ConstraintSet,
    last_stats: ContactStats,
    dirty: bool,
}

impl Default for ParticleSystem {
    fn default() -> Self {
        Self::from_valid_config(SimulationConfig::default())
    }
}

impl ParticleSystem {
    /// Create an empty system
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `config` does not validate.
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: SimulationConfig) -> Self {
        ParticleSystem {
            particles: Vec::new(),
            springs: Vec::new(),
            boundaries: Vec::new(),
            integrators: IntegratorRegistry::new(),
            config,
            time: 0.0,
            grab: None,
            constraints: ConstraintSet::new(0),
            last_stats: ContactStats::default(),
            dirty: false,
        }
    }

    // ----- structure -----

    /// Add a unit-mass particle at `(x, y)` with velocity `(vx, vy)`
    pub fn create_particle(&mut self, x: f64, y: f64, vx: f64, vy: f64) -> ParticleId {
        self.add_particle(Particle::new(DVec2::new(x, y), DVec2::new(vx, vy)))
    }

    /// Add a prepared particle; its contact and spring lists are cleared
    pub fn add_particle(&mut self, mut particle: Particle) -> ParticleId {
        let id = self.particles.len();
        particle.index = id;
        particle.clear_contacts();
        particle.detach_springs();
        self.particles.push(particle);
        self.dirty = true;
        id
    }

    /// Connect two particles with a linear spring using the configured
    /// stiffness and damping; returns the spring index
    pub fn create_spring(&mut self, a: ParticleId, b: ParticleId) -> Result<usize, SimulationError> {
        self.check_particle(a)?;
        self.check_particle(b)?;
        if a == b {
            return Err(SimulationError::DegenerateSpring { a, b });
        }
        let spring = LinearSpring::new(
            a,
            b,
            self.config.spring_stiffness,
            self.config.spring_damping,
            &self.particles,
        );
        Ok(self.push_spring(spring.into()))
    }

    /// Add a bending spring over the chain `p1 - p2 - p3`; returns the spring
    /// index
    pub fn create_angular_spring(
        &mut self,
        p1: ParticleId,
        p2: ParticleId,
        p3: ParticleId,
    ) -> Result<usize, SimulationError> {
        for id in [p1, p2, p3] {
            self.check_particle(id)?;
        }
        for (a, b) in [(p1, p2), (p2, p3), (p1, p3)] {
            if a == b {
                return Err(SimulationError::DegenerateSpring { a, b });
            }
        }
        let spring = AngularSpring::new(p1, p2, p3, self.config.spring_stiffness, &self.particles)
            .with_symmetric(self.config.symmetric_angular_force);
        Ok(self.push_spring(spring.into()))
    }

    fn push_spring(&mut self, spring: Spring) -> usize {
        let index = self.springs.len();
        for &id in spring.particles() {
            self.particles[id].attach_spring(index);
        }
        self.springs.push(spring);
        self.dirty = true;
        index
    }

    /// Add a static wall
    pub fn add_boundary(&mut self, boundary: Boundary) -> BoundaryId {
        self.boundaries.push(boundary);
        BoundaryId(self.boundaries.len() - 1)
    }

    /// Replace every wall; recorded contacts are dropped
    pub fn set_boundaries(&mut self, boundaries: Vec<Boundary>) {
        self.boundaries = boundaries;
        for particle in &mut self.particles {
            particle.clear_contacts();
        }
    }

    /// Remove a particle and every spring attached to it
    ///
    /// Later particles shift down by one index.
    pub fn remove_particle(&mut self, id: ParticleId) -> Result<Particle, SimulationError> {
        self.check_particle(id)?;
        let mut removed = self.retain_particles(|i, _| i != id);
        Ok(removed.remove(0))
    }

    /// Remove every deletable particle and the springs attached to them
    ///
    /// Returns the number of particles removed.
    pub fn clear_particles(&mut self) -> usize {
        self.retain_particles(|_, p| !p.deletable).len()
    }

    fn retain_particles<F>(&mut self, mut keep: F) -> Vec<Particle>
    where
        F: FnMut(usize, &Particle) -> bool,
    {
        let mut map = Vec::with_capacity(self.particles.len());
        let mut kept = Vec::with_capacity(self.particles.len());
        let mut removed = Vec::new();
        for (i, particle) in self.particles.drain(..).enumerate() {
            if keep(i, &particle) {
                map.push(Some(kept.len()));
                kept.push(particle);
            } else {
                map.push(None);
                removed.push(particle);
            }
        }
        self.particles = kept;

        let springs_before = self.springs.len();
        self.springs.retain_mut(|s| s.remap(&map));
        self.grab = self
            .grab
            .and_then(|(id, target)| map.get(id).copied().flatten().map(|new| (new, target)));

        log::debug!(
            "Removed {} particle(s) and {} spring(s)",
            removed.len(),
            springs_before - self.springs.len()
        );
        self.update_system();
        removed
    }

    /// Remove a spring; later springs shift down by one index
    pub fn remove_spring(&mut self, index: usize) -> Result<Spring, SimulationError> {
        if index >= self.springs.len() {
            return Err(SimulationError::SpringOutOfBounds {
                index,
                count: self.springs.len(),
            });
        }
        let spring = self.springs.remove(index);
        self.rebuild_back_references();
        self.dirty = true;
        Ok(spring)
    }

    /// Renumber particles, rebuild spring back-references and re-initialize
    /// every integrator
    pub fn update_system(&mut self) {
        for (i, particle) in self.particles.iter_mut().enumerate() {
            particle.index = i;
        }
        self.rebuild_back_references();
        if self.constraints.len() != self.particles.len() {
            self.constraints = ConstraintSet::new(self.particles.len());
        }
        self.integrators.initialize_all(&self.particles);
        self.dirty = false;
        log::debug!(
            "Rebuilt system: {} particles, {} springs",
            self.particles.len(),
            self.springs.len()
        );
    }

    fn rebuild_back_references(&mut self) {
        for particle in &mut self.particles {
            particle.detach_springs();
        }
        for (index, spring) in self.springs.iter().enumerate() {
            for &id in spring.particles() {
                self.particles[id].attach_spring(index);
            }
        }
    }

    /// Whether a rebuild is pending
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    // ----- integrators -----

    /// Register an integrator; the first one registered becomes active
    pub fn register_integrator(&mut self, integrator: Box<dyn Integrator>) -> Result<(), SimulationError> {
        self.integrators.register(integrator, &self.particles)
    }

    /// Switch the active integrator
    pub fn select_integrator(&mut self, name: &str) -> Result<(), SimulationError> {
        self.integrators.select(name)
    }

    /// Registered integrators
    pub fn integrators(&self) -> &IntegratorRegistry {
        &self.integrators
    }

    // ----- interaction -----

    /// Start dragging particle `id` toward `target`
    pub fn grab(&mut self, id: ParticleId, target: DVec2) -> Result<(), SimulationError> {
        self.check_particle(id)?;
        self.ungrab();
        self.particles[id].grabbed = true;
        self.grab = Some((id, target));
        Ok(())
    }

    /// Move the drag target of the grabbed particle
    pub fn drag_to(&mut self, target: DVec2) {
        if let Some((_, t)) = self.grab.as_mut() {
            *t = target;
        }
    }

    /// Release the grabbed particle, if any
    pub fn ungrab(&mut self) {
        if let Some((id, _)) = self.grab.take() {
            if let Some(particle) = self.particles.get_mut(id) {
                particle.grabbed = false;
            }
        }
    }

    /// Grabbed particle and its drag target
    pub fn grabbed(&self) -> Option<(ParticleId, DVec2)> {
        self.grab
    }

    /// Teleport a particle, making `pos` its new rest position
    ///
    /// Rest lengths of the attached springs are recomputed.
    pub fn move_particle(&mut self, id: ParticleId, pos: DVec2) -> Result<(), SimulationError> {
        self.check_particle(id)?;
        let particle = &mut self.particles[id];
        particle.p = pos;
        particle.p0 = pos;
        let attached = particle.springs().to_vec();
        for index in attached {
            self.springs[index].compute_rest_length(&self.particles);
        }
        Ok(())
    }

    /// Restore every particle to its rest state and rewind the clock
    pub fn reset_particles(&mut self) {
        for particle in &mut self.particles {
            particle.reset();
        }
        self.constraints = ConstraintSet::new(self.particles.len());
        self.time = 0.0;
    }

    // ----- stepping -----

    /// Advance the simulation by `h`
    ///
    /// # Errors
    ///
    /// - `InvalidTimestep` if `h` is not positive and finite
    /// - `NoActiveIntegrator` if no integrator was registered
    /// - any error returned by the integrator
    ///
    /// Non-finite particle states are not errors: the particle is flagged
    /// `illegal` and the step completes.
    pub fn step(&mut self, h: f64) -> Result<(), SimulationError> {
        if !(h > 0.0 && h.is_finite()) {
            return Err(SimulationError::InvalidTimestep(h));
        }
        if self.dirty {
            log::debug!("Structure changed since last step, rebuilding");
            self.update_system();
        }

        let ParticleSystem {
            particles,
            springs,
            integrators,
            config,
            constraints,
            grab,
            time,
            ..
        } = self;
        let integrator = integrators
            .active_mut()
            .ok_or(SimulationError::NoActiveIntegrator)?;

        forces::accumulate_forces(particles, springs, config, *grab);
        let mut ctx = IntegrationContext::new(particles, springs, config, constraints, *grab);
        integrator.step(&mut ctx, *time, h, config.iterations)?;

        self.flag_illegal();
        let mut stats = self.resolve_boundaries(h);
        if self.config.spring_collisions {
            stats.spring_hits = self.sweep_springs(h);
        }
        log::trace!(
            "t = {}: {} collision(s), {} resting contact(s), {} spring hit(s)",
            self.time,
            stats.collisions,
            stats.resting,
            stats.spring_hits
        );
        self.last_stats = stats;
        self.time += h;
        Ok(())
    }

    fn flag_illegal(&mut self) {
        for (i, particle) in self.particles.iter_mut().enumerate() {
            if !particle.illegal && !particle.is_finite() {
                particle.illegal = true;
                log::warn!("Particle {} became non-finite at t = {}", i, self.time);
            }
        }
    }

    /// Resting contacts first, then discrete collisions against every wall
    /// the particle is not resting on. The requested velocity changes are
    /// applied at the end and the filters kept for the next step.
    fn resolve_boundaries(&mut self, h: f64) -> ContactStats {
        let mut stats = ContactStats::default();
        let mut set = ConstraintSet::new(self.particles.len());
        let (filters, seed) = set.parts_mut();
        let boundaries = &self.boundaries;
        let config = &self.config;

        for particle in self.particles.iter_mut().filter(|p| !p.pinned) {
            particle.in_contact = false;

            for slot in (0..particle.contacts().len()).rev() {
                let id = particle.contacts()[slot].boundary;
                let still_touching = boundaries
                    .get(id.0)
                    .map_or(false, |b| b.contact(id, particle, config.contact_distance, slot));
                if !still_touching {
                    particle.remove_contact(slot);
                }
            }
            for (j, boundary) in boundaries.iter().enumerate() {
                let id = BoundaryId(j);
                if particle.contact_slot(id).is_none() {
                    let next = particle.contacts().len();
                    boundary.contact(id, particle, config.contact_distance, next);
                }
            }

            stats.resting += Boundary::apply_contact_constraints(particle, boundaries, filters, seed);

            for (j, boundary) in boundaries.iter().enumerate() {
                let id = BoundaryId(j);
                let resting = particle
                    .contacts()
                    .iter()
                    .any(|c| c.boundary == id && particle.v.dot(c.normal).abs() < CONTACT_SPEED_THRESHOLD);
                if resting {
                    continue;
                }
                if boundary.collide(id, particle, h, config.collision_distance) {
                    Boundary::apply_collision_constraint(particle, id, boundary, filters, seed);
                    stats.collisions += 1;
                }
            }
        }

        let deltas = set.take_seed();
        for particle in &mut self.particles {
            particle.v += deltas[particle.index];
        }
        self.constraints = set;
        stats
    }

    fn sweep_springs(&mut self, h: f64) -> usize {
        let mut hits = 0;
        for spring in &self.springs {
            for target in 0..self.particles.len() {
                if matches!(
                    spring.intersect(&mut self.particles, target, h, self.config.restitution),
                    Ok(true)
                ) {
                    hits += 1;
                }
            }
        }
        hits
    }

    /// Counters of the last step's boundary pass
    pub fn last_stats(&self) -> ContactStats {
        self.last_stats
    }

    // ----- queries -----

    /// Spring Jacobians `(K, B)` at the current state
    pub fn assemble_jacobians(&self) -> (BlockMatrix, BlockMatrix) {
        forces::assemble_jacobians(&self.particles, &self.springs)
    }

    /// Recompute forces without stepping
    pub fn accumulate_forces(&mut self) {
        forces::accumulate_forces(&mut self.particles, &self.springs, &self.config, self.grab);
    }

    /// Quadtree over the current particle positions
    pub fn quadtree(&self) -> QuadTree {
        QuadTree::build(&self.particles)
    }

    /// Total kinetic energy
    pub fn kinetic_energy(&self) -> f64 {
        self.particles.iter().map(Particle::kinetic_energy).sum()
    }

    /// Particles in index order
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Particles, mutable; the set itself cannot change through this
    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    /// One particle
    pub fn particle(&self, id: ParticleId) -> Result<&Particle, SimulationError> {
        self.check_particle(id)?;
        Ok(&self.particles[id])
    }

    /// One particle, mutable
    pub fn particle_mut(&mut self, id: ParticleId) -> Result<&mut Particle, SimulationError> {
        self.check_particle(id)?;
        Ok(&mut self.particles[id])
    }

    /// Springs in index order
    pub fn springs(&self) -> &[Spring] {
        &self.springs
    }

    /// One spring, mutable (stiffness and damping tuning)
    pub fn spring_mut(&mut self, index: usize) -> Result<&mut Spring, SimulationError> {
        let count = self.springs.len();
        self.springs
            .get_mut(index)
            .ok_or(SimulationError::SpringOutOfBounds { index, count })
    }

    /// Walls
    pub fn boundaries(&self) -> &[Boundary] {
        &self.boundaries
    }

    /// Filters of the last boundary pass; the seed has already been applied
    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    /// Simulation clock
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Parameters
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Replace the parameters; existing springs keep their own constants
    pub fn set_config(&mut self, config: SimulationConfig) -> Result<(), SimulationError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    fn check_particle(&self, id: ParticleId) -> Result<(), SimulationError> {
        if id < self.particles.len() {
            Ok(())
        } else {
            Err(SimulationError::ParticleOutOfBounds {
                index: id,
                count: self.particles.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system() -> ParticleSystem {
        ParticleSystem::new(SimulationConfig::default()).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = SimulationConfig::default().with_iterations(10).with_spring_damping(-1.0);
        assert!(ParticleSystem::new(config).is_err());
    }

    #[test]
    fn test_create_spring_validation() {
        let mut sys = system();
        let a = sys.create_particle(0.0, 0.0, 0.0, 0.0);
        let b = sys.create_particle(1.0, 0.0, 0.0, 0.0);

        assert_eq!(
            sys.create_spring(a, a).unwrap_err(),
            SimulationError::DegenerateSpring { a, b: a }
        );
        assert_eq!(
            sys.create_spring(a, 9).unwrap_err(),
            SimulationError::ParticleOutOfBounds { index: 9, count: 2 }
        );

        let s = sys.create_spring(a, b).unwrap();
        assert_eq!(sys.springs()[s].k(), 100.0);
        assert_eq!(sys.springs()[s].b(), 1.0);
        assert_eq!(sys.particles()[a].springs(), &[s]);
        assert_eq!(sys.particles()[b].springs(), &[s]);
    }

    #[test]
    fn test_remove_particle_renumbers() {
        let mut sys = system();
        for i in 0..4 {
            sys.create_particle(i as f64, 0.0, 0.0, 0.0);
        }
        sys.create_spring(0, 1).unwrap();
        sys.create_spring(2, 3).unwrap();
        sys.grab(3, DVec2::ZERO).unwrap();

        let removed = sys.remove_particle(1).unwrap();
        assert_eq!(removed.p, DVec2::new(1.0, 0.0));
        assert_eq!(sys.particles().len(), 3);
        assert_eq!(sys.springs().len(), 1);
        assert_eq!(sys.springs()[0].particles(), &[1, 2]);
        assert_eq!(sys.grabbed().map(|(id, _)| id), Some(2));
        for (i, p) in sys.particles().iter().enumerate() {
            assert_eq!(p.index, i);
        }
        assert!(!sys.is_dirty());
    }

    #[test]
    fn test_clear_particles_keeps_non_deletable() {
        let mut sys = system();
        let keep = sys.create_particle(0.0, 0.0, 0.0, 0.0);
        sys.create_particle(1.0, 0.0, 0.0, 0.0);
        sys.particle_mut(keep).unwrap().deletable = false;

        assert_eq!(sys.clear_particles(), 1);
        assert_eq!(sys.particles().len(), 1);
        assert!(!sys.particles()[0].deletable);
    }

    #[test]
    fn test_move_particle_updates_rest_length() {
        let mut sys = system();
        let a = sys.create_particle(0.0, 0.0, 0.0, 0.0);
        let b = sys.create_particle(1.0, 0.0, 0.0, 0.0);
        let s = sys.create_spring(a, b).unwrap();

        sys.move_particle(b, DVec2::new(3.0, 4.0)).unwrap();
        match &sys.springs()[s] {
            Spring::Linear(spring) => assert_eq!(spring.rest_length(), 5.0),
            Spring::Angular(_) => unreachable!(),
        }
    }

    #[test]
    fn test_step_requires_integrator_and_valid_h() {
        let mut sys = system();
        sys.create_particle(0.0, 0.0, 0.0, 0.0);
        assert_eq!(sys.step(0.0).unwrap_err(), SimulationError::InvalidTimestep(0.0));
        assert_eq!(sys.step(0.01).unwrap_err(), SimulationError::NoActiveIntegrator);
        assert_eq!(sys.time(), 0.0);
    }

    #[test]
    fn test_grab_flags() {
        let mut sys = system();
        let a = sys.create_particle(0.0, 0.0, 0.0, 0.0);
        let b = sys.create_particle(1.0, 0.0, 0.0, 0.0);
        sys.grab(a, DVec2::ONE).unwrap();
        sys.grab(b, DVec2::ONE).unwrap();
        assert!(!sys.particles()[a].grabbed);
        assert!(sys.particles()[b].grabbed);

        sys.drag_to(DVec2::new(2.0, 2.0));
        assert_eq!(sys.grabbed(), Some((b, DVec2::new(2.0, 2.0))));
        sys.ungrab();
        assert!(sys.grabbed().is_none());
        assert!(!sys.particles()[b].grabbed);
    }
}
