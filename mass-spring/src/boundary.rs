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
//! Static line-segment boundaries and the collision/contact constraints
//!
//! Two detection paths exist side by side:
//!
//! - **Collision** ([`Boundary::collide`]): a moving particle whose velocity
//!   ray crosses the segment within the look-ahead window. The response
//!   reflects the normal velocity and kills the tangential one.
//! - **Contact** ([`Boundary::contact`]): a slow particle lying within a
//!   distance threshold of the segment. The response removes the velocity
//!   and projects further velocity changes onto the wall.
//!
//! A single distance threshold cannot tell "about to tunnel through the wall"
//! from "resting on the wall", hence the split. Both paths write into a
//! [`ConstraintSet`](crate::math::ConstraintSet): per-particle filter
//! matrices `S` and the velocity seed `z` consumed by a filtered solve.
//!
//! Parametric values along a segment are snapped to exactly `0` or `1` when
//! they fall within `epsilon = 1 / length` of an end, which keeps corner
//! contacts from flickering between two adjacent walls.

use crate::math::outer;
use crate::particle::{Contact, Particle};
use glam::{DMat2, DVec2};

/// Speed below which a particle can never register a discrete collision
pub const VELOCITY_EPSILON: f64 = 1e-6;

/// Number of `tmin` intervals ahead in which a crossing counts as a collision
pub const LOOKAHEAD_STEPS: f64 = 2.0;

/// Scale applied to the normal velocity on impact (leaves `-0.5 vN`)
pub const COLLISION_NORMAL_SCALE: f64 = -1.5;

/// Normal speed under which a recorded contact is held as resting
pub const CONTACT_SPEED_THRESHOLD: f64 = 0.5;

/// Index of a boundary in its system's boundary list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoundaryId(pub usize);

/// An immutable wall segment from `p0` to `p1`
#[derive(Debug, Clone, PartialEq)]
pub struct Boundary {
    p0: DVec2,
    p1: DVec2,
    direction: DVec2,
    length_sq: f64,
    tangent: DVec2,
    inward: DVec2,
    outward: DVec2,
    epsilon: f64,
    directional: DMat2,
    normal: DMat2,
}

impl Boundary {
    /// Create a boundary; the inward normal lies to the left of `p0 -> p1`
    pub fn new(p0: DVec2, p1: DVec2) -> Self {
        let direction = p1 - p0;
        let length_sq = direction.length_squared();
        let length = length_sq.sqrt();
        let tangent = direction / length;
        let inward = tangent.perp();
        let outward = -inward;

        Boundary {
            p0,
            p1,
            direction,
            length_sq,
            tangent,
            inward,
            outward,
            epsilon: 1.0 / length,
            directional: DMat2::ZERO - outer(outward, outward),
            normal: outer(tangent, tangent),
        }
    }

    /// Start point
    pub fn p0(&self) -> DVec2 {
        self.p0
    }

    /// End point
    pub fn p1(&self) -> DVec2 {
        self.p1
    }

    /// Unnormalized direction `p1 - p0`
    pub fn direction(&self) -> DVec2 {
        self.direction
    }

    /// Squared length
    pub fn length_squared(&self) -> f64 {
        self.length_sq
    }

    /// Unit tangent
    pub fn tangent(&self) -> DVec2 {
        self.tangent
    }

    /// Unit normal on the left of the direction
    pub fn inward_normal(&self) -> DVec2 {
        self.inward
    }

    /// Unit normal on the right of the direction
    pub fn outward_normal(&self) -> DVec2 {
        self.outward
    }

    /// Parametric snapping tolerance at the segment ends
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Projection of `pos` onto the infinite line through the segment
    pub fn closest_point(&self, pos: DVec2) -> DVec2 {
        let t = (pos - self.p0).dot(self.direction) / self.length_sq;
        self.p0 + self.direction * t
    }

    /// Unit vector from the closest point toward `pos`
    ///
    /// NaN when `pos` lies on the line.
    pub fn collision_normal(&self, pos: DVec2) -> DVec2 {
        (pos - self.closest_point(pos)).normalize()
    }

    /// Parameter of the closest point, snapped at the ends
    pub fn closest_parameter(&self, pos: DVec2) -> f64 {
        self.snap((pos - self.p0).dot(self.direction) / self.length_sq)
    }

    /// Where the ray `pos + k * vel` crosses the line
    ///
    /// Returns the snapped segment parameter `s` and the ray parameter `k`
    /// (the time to reach the line at velocity `vel`), or `None` when the ray
    /// is exactly parallel to the segment.
    pub fn intersection_parameter(&self, pos: DVec2, vel: DVec2) -> Option<(f64, f64)> {
        let denom = self.direction.perp_dot(vel);
        if denom == 0.0 {
            return None;
        }
        let w = pos - self.p0;
        let s = w.perp_dot(vel) / denom;
        let k = w.perp_dot(self.direction) / denom;
        Some((self.snap(s), k))
    }

    /// Point at parameter `s`
    pub fn point_at(&self, s: f64) -> DVec2 {
        self.p0 + self.direction * s
    }

    fn snap(&self, t: f64) -> f64 {
        if t.abs() <= self.epsilon {
            0.0
        } else if (t - 1.0).abs() <= self.epsilon {
            1.0
        } else {
            t
        }
    }

    /// Normal facing the side `pos` is on; on the line itself, the side the
    /// particle is coming from
    fn side_normal(&self, pos: DVec2, vel: DVec2) -> DVec2 {
        let side = self.direction.perp_dot(pos - self.p0);
        if side > 0.0 {
            self.inward
        } else if side < 0.0 {
            self.outward
        } else if self.inward.dot(vel) > 0.0 {
            self.outward
        } else {
            self.inward
        }
    }

    /// Discrete collision test
    ///
    /// Flags a collision when the particle's velocity ray crosses the segment
    /// ahead of it, either no later than `LOOKAHEAD_STEPS * tmin` from now or
    /// at a crossing point closer than `dmin`. Crossings behind a receding
    /// particle never count. A contact `{id, crossing, normal}` is recorded on
    /// the particle unless one with `id` is already there. Particles slower
    /// than [`VELOCITY_EPSILON`] never collide.
    pub fn collide(&self, id: BoundaryId, particle: &mut Particle, tmin: f64, dmin: f64) -> bool {
        if particle.v.length() < VELOCITY_EPSILON {
            return false;
        }

        let (s, k) = match self.intersection_parameter(particle.p, particle.v) {
            Some(hit) => hit,
            None => return false,
        };
        if !(0.0..=1.0).contains(&s) || k < 0.0 {
            return false;
        }

        let crossing = self.point_at(s);
        let within_window = k <= LOOKAHEAD_STEPS * tmin;
        let within_distance = (crossing - particle.p).length() < dmin;
        if !(within_window || within_distance) {
            return false;
        }

        let normal = self.side_normal(particle.p, particle.v);
        particle.record_contact(Contact {
            boundary: id,
            point: crossing,
            normal,
        });
        true
    }

    /// Resting contact test using the closest point only
    ///
    /// When the particle lies within `dmin` of the segment, contact slot
    /// `index` is refreshed in place (or a new contact is recorded when the
    /// slot does not belong to `id`) and `true` is returned.
    pub fn contact(&self, id: BoundaryId, particle: &mut Particle, dmin: f64, index: usize) -> bool {
        let t = self.closest_parameter(particle.p);
        if !(0.0..=1.0).contains(&t) {
            return false;
        }

        let closest = self.closest_point(particle.p);
        if (particle.p - closest).length() >= dmin {
            return false;
        }

        let normal = self.side_normal(particle.p, particle.v);
        let owns_slot = particle
            .contacts()
            .get(index)
            .map_or(false, |c| c.boundary == id);
        if owns_slot {
            particle.update_contact(index, closest, normal);
        } else {
            particle.record_contact(Contact {
                boundary: id,
                point: closest,
                normal,
            });
        }
        true
    }

    /// `-(n nᵀ)` for the outward normal; added to an identity filter it
    /// removes the normal component
    pub fn directional_constraint(&self) -> DMat2 {
        self.directional
    }

    /// `t tᵀ` for the unit tangent; keeps only the tangential component
    pub fn normal_constraint(&self) -> DMat2 {
        self.normal
    }

    /// Constraint steering motion toward `target`
    ///
    /// `-(u uᵀ)` with `u` the unit perpendicular of `target - pos`: added to
    /// an identity filter it keeps only motion along the line to `target`.
    pub fn intersection_constraint(&self, pos: DVec2, target: DVec2) -> DMat2 {
        let u = (target - pos).perp().normalize();
        DMat2::ZERO - outer(u, u)
    }

    /// Impact response for a discrete collision with `boundary`
    ///
    /// The velocity is split along the recorded contact normal (the outward
    /// normal when no contact was recorded). The seed rows of the particle
    /// receive `-1.5 vN - vT`, which leaves half the normal speed reflected
    /// and no tangential speed, and the boundary's directional constraint is
    /// accumulated into the particle's filter.
    pub fn apply_collision_constraint(
        particle: &mut Particle,
        id: BoundaryId,
        boundary: &Boundary,
        filters: &mut [DMat2],
        seed: &mut [f64],
    ) {
        let i = particle.index;
        let n = particle
            .contacts()
            .iter()
            .find(|c| c.boundary == id)
            .map_or(boundary.outward, |c| c.normal);

        let v_n = n * particle.v.dot(n);
        let v_t = particle.v - v_n;
        let delta = v_n * COLLISION_NORMAL_SCALE - v_t;

        filters[i] += boundary.directional;
        seed[2 * i] = delta.x;
        seed[2 * i + 1] = delta.y;
    }

    /// Resting response for every contact recorded on `particle`
    ///
    /// Contacts whose normal speed is below [`CONTACT_SPEED_THRESHOLD`] are
    /// enforced: the seed asks for the whole velocity to be removed, the
    /// particle is flagged `in_contact` and the directional constraint is
    /// accumulated. Faster contacts are separating and contribute nothing.
    /// Returns the number of enforced contacts.
    pub fn apply_contact_constraints(
        particle: &mut Particle,
        boundaries: &[Boundary],
        filters: &mut [DMat2],
        seed: &mut [f64],
    ) -> usize {
        let i = particle.index;
        let v = particle.v;
        let mut enforced = 0;

        for contact in particle.contacts() {
            if v.dot(contact.normal).abs() >= CONTACT_SPEED_THRESHOLD {
                continue;
            }
            filters[i] += boundaries[contact.boundary.0].directional;
            seed[2 * i] = -v.x;
            seed[2 * i + 1] = -v.y;
            enforced += 1;
        }

        if enforced > 0 {
            particle.in_contact = true;
        }
        enforced
    }
}
