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
//! Point masses
//!
//! A [`Particle`] carries its dynamic state (position, velocity, accumulated
//! force), the rest state it returns to on [`Particle::reset`], a set of
//! flags used by the system and its collaborators, and the list of boundary
//! contacts recorded during the current step.

use crate::boundary::BoundaryId;
use glam::DVec2;

/// Index of a particle in its system's ordering
pub type ParticleId = usize;

/// One boundary contact recorded on a particle
///
/// Keeping boundary, point and normal together in a single record means the
/// three always have the same length and share indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Boundary touched
    pub boundary: BoundaryId,
    /// Contact point on the boundary
    pub point: DVec2,
    /// Unit normal pointing from the boundary toward the particle
    pub normal: DVec2,
}

/// A point mass
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// Position
    pub p: DVec2,
    /// Velocity
    pub v: DVec2,
    /// Rest position restored by `reset`
    pub p0: DVec2,
    /// Rest velocity restored by `reset`
    pub v0: DVec2,
    /// Accumulated force for the current step
    pub f: DVec2,
    /// Mass
    pub mass: f64,
    /// Pinned particles are never moved by forces or integration
    pub pinned: bool,
    /// Heavy particles integrate with a scaled mass
    pub heavy: bool,
    /// Set while the particle is the system's grab target
    pub grabbed: bool,
    /// Set while the particle touches a boundary or a spring
    pub in_contact: bool,
    /// Set once the particle state became non-finite
    pub illegal: bool,
    /// Removed by `ParticleSystem::clear_particles`
    pub deletable: bool,
    /// Position in the system ordering, reassigned by `update_system`
    pub index: usize,
    contacts: Vec<Contact>,
    springs: Vec<usize>,
}

impl Particle {
    /// Create a particle of unit mass at rest state `(p, v)`
    pub fn new(p: DVec2, v: DVec2) -> Self {
        Particle {
            p,
            v,
            p0: p,
            v0: v,
            f: DVec2::ZERO,
            mass: 1.0,
            pinned: false,
            heavy: false,
            grabbed: false,
            in_contact: false,
            illegal: false,
            deletable: true,
            index: 0,
            contacts: Vec::new(),
            springs: Vec::new(),
        }
    }

    /// Set the mass
    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    /// Mark the particle pinned
    pub fn with_pinned(mut self, pinned: bool) -> Self {
        self.pinned = pinned;
        self
    }

    /// Restore the rest state and forget every contact
    pub fn reset(&mut self) {
        self.p = self.p0;
        self.v = self.v0;
        self.f = DVec2::ZERO;
        self.in_contact = false;
        self.illegal = false;
        self.contacts.clear();
    }

    /// Add a force to the accumulator
    #[inline]
    pub fn add_force(&mut self, force: DVec2) {
        self.f += force;
    }

    /// Mass used for integration, scaled for heavy particles
    pub fn effective_mass(&self, heavy_scale: f64) -> f64 {
        if self.heavy {
            self.mass * heavy_scale
        } else {
            self.mass
        }
    }

    /// Whether position and velocity are finite
    pub fn is_finite(&self) -> bool {
        self.p.is_finite() && self.v.is_finite()
    }

    /// Kinetic energy `0.5 m |v|²`
    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.mass * self.v.length_squared()
    }

    /// Recorded contacts, in recording order
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    /// Boundaries of the recorded contacts
    pub fn contact_boundaries(&self) -> impl Iterator<Item = BoundaryId> + '_ {
        self.contacts.iter().map(|c| c.boundary)
    }

    /// Points of the recorded contacts
    pub fn contact_points(&self) -> impl Iterator<Item = DVec2> + '_ {
        self.contacts.iter().map(|c| c.point)
    }

    /// Normals of the recorded contacts
    pub fn contact_normals(&self) -> impl Iterator<Item = DVec2> + '_ {
        self.contacts.iter().map(|c| c.normal)
    }

    /// Slot of the contact with `boundary`, if any
    pub fn contact_slot(&self, boundary: BoundaryId) -> Option<usize> {
        self.contacts.iter().position(|c| c.boundary == boundary)
    }

    /// Record a contact unless one with the same boundary exists, in which
    /// case the first point and normal are kept. Returns the slot holding the
    /// boundary's contact.
    pub fn record_contact(&mut self, contact: Contact) -> usize {
        match self.contact_slot(contact.boundary) {
            Some(slot) => slot,
            None => {
                self.contacts.push(contact);
                self.contacts.len() - 1
            }
        }
    }

    /// Overwrite the contact in `slot`
    ///
    /// # Panics
    ///
    /// Panics if `slot` is out of range.
    pub fn update_contact(&mut self, slot: usize, point: DVec2, normal: DVec2) {
        let contact = &mut self.contacts[slot];
        contact.point = point;
        contact.normal = normal;
    }

    /// Drop the contact in `slot`
    pub fn remove_contact(&mut self, slot: usize) -> Contact {
        self.contacts.remove(slot)
    }

    /// Forget every contact
    pub fn clear_contacts(&mut self) {
        self.contacts.clear();
        self.in_contact = false;
    }

    /// Indices of the springs attached to this particle
    pub fn springs(&self) -> &[usize] {
        &self.springs
    }

    pub(crate) fn attach_spring(&mut self, spring: usize) {
        if !self.springs.contains(&spring) {
            self.springs.push(spring);
        }
    }

    pub(crate) fn detach_springs(&mut self) {
        self.springs.clear();
    }
}
