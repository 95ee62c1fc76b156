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
//! # Mass-Spring
//!
//! A 2D mass-spring particle core: point masses connected by damped springs,
//! advanced by a pluggable integrator and kept out of static walls by a
//! combination of discrete collisions and resting-contact constraints.
//!
//! ## Features
//!
//! - **Spring Forces**: Damped linear springs with analytic Jacobians for
//!   implicit integration, plus force-only bending springs
//! - **Boundaries**: Segment walls producing per-particle constraint filters
//!   and velocity corrections
//! - **Spatial Queries**: Quadtree over particle positions
//! - **Pluggable Integrators**: Versioned integrator interface and registry
//! - **Parallelization**: Optional Rayon evaluation of spring contributions
//!
//! ## Example
//!
//! ```rust
//! use mass_spring::{Boundary, ParticleSystem, SimulationConfig};
//! use glam::DVec2;
//!
//! let mut system = ParticleSystem::new(SimulationConfig::default()).unwrap();
//! let a = system.create_particle(0.0, 2.0, 0.0, 0.0);
//! let b = system.create_particle(1.0, 2.0, 0.0, 0.0);
//! system.create_spring(a, b).unwrap();
//! system.add_boundary(Boundary::new(DVec2::new(-10.0, 0.0), DVec2::new(10.0, 0.0)));
//!
//! let (k, _b) = system.assemble_jacobians();
//! assert_eq!(k.dimension(), 2);
//! ```

#![warn(missing_docs)]

/// Static segment walls and their constraints
pub mod boundary;

/// Geometric predicates and bounce response
pub mod collision;

/// Simulation parameters
pub mod config;

/// Error types
pub mod error;

/// Integrator interface and registry
pub mod integration;

/// Small linear algebra helpers
pub mod math;

/// Point masses
pub mod particle;

/// Spatial index
pub mod quadtree;

/// Spring force models
pub mod spring;

/// The particle system
pub mod system;

pub use boundary::{Boundary, BoundaryId};
pub use config::SimulationConfig;
pub use error::SimulationError;
pub use integration::{IntegrationContext, Integrator, IntegratorRegistry, INTEGRATOR_API_VERSION};
pub use math::{BlockMatrix, ConstraintSet};
pub use particle::{Contact, Particle, ParticleId};
pub use quadtree::{CellId, QuadTree};
pub use spring::{AngularSpring, LinearSpring, Spring};
pub use system::{ContactStats, ParticleSystem};
