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
//! Stateless geometric predicates and impulse response
//!
//! The segment test follows the orientation method: two segments `ab` and
//! `cd` properly intersect iff `c` and `d` lie on opposite sides of `ab` and
//! `a` and `b` lie on opposite sides of `cd`. Touching or collinear
//! configurations do not count as intersections.

use crate::particle::Particle;
use glam::DVec2;

/// Twice the signed area of triangle `abc`
///
/// Positive when `a, b, c` turn counter-clockwise, negative when they turn
/// clockwise, zero when collinear.
#[inline]
pub fn signed_2d_tri_area(a: DVec2, b: DVec2, c: DVec2) -> f64 {
    (a.x - c.x) * (b.y - c.y) - (a.y - c.y) * (b.x - c.x)
}

/// Whether `a, b, c` turn clockwise
#[inline]
pub fn are_clockwise(a: DVec2, b: DVec2, c: DVec2) -> bool {
    signed_2d_tri_area(a, b, c) < 0.0
}

/// Whether segment `ab` properly intersects segment `cd`
pub fn are_intersecting(a: DVec2, b: DVec2, c: DVec2, d: DVec2) -> bool {
    let a1 = signed_2d_tri_area(a, b, d);
    let a2 = signed_2d_tri_area(a, b, c);
    if a1 * a2 >= 0.0 {
        return false;
    }
    let a3 = signed_2d_tri_area(c, d, a);
    let a4 = signed_2d_tri_area(c, d, b);
    a3 * a4 < 0.0
}

/// Reflect a particle off the line through `a` and `b`
///
/// The incidence angle `theta` between the velocity and the line direction
/// gives the normal speed `|v| sin(theta)`; the velocity receives an impulse
/// of `restitution * 2 * |v| * sin(theta)` along the line normal facing
/// against the motion. With `restitution == 1` the normal component is
/// mirrored exactly; the tangential component is never touched.
pub fn bounce(particle: &mut Particle, a: DVec2, b: DVec2, restitution: f64) {
    let direction = b - a;
    let speed = particle.v.length();
    let theta = direction.perp_dot(particle.v).abs().atan2(direction.dot(particle.v));

    let mut normal = direction.perp().normalize();
    if normal.dot(particle.v) > 0.0 {
        normal = -normal;
    }

    particle.v += normal * (restitution * 2.0 * speed * theta.sin());
}
