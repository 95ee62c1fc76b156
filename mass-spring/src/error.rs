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
//! Error types for structural simulation operations
//!
//! Only misuse of the API (bad indices, invalid timesteps, integrator
//! registration problems) is reported through [`SimulationError`].
//! Numerically degenerate states such as zero-length springs are not errors:
//! they propagate NaN/Inf through the affected particles and the simulation
//! keeps advancing.

use std::fmt;

/// Errors returned by particle system and integrator registry operations
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationError {
    /// A particle index does not refer to a live particle
    ParticleOutOfBounds {
        /// The offending index
        index: usize,
        /// Number of particles in the system
        count: usize,
    },
    /// A spring index does not refer to a live spring
    SpringOutOfBounds {
        /// The offending index
        index: usize,
        /// Number of springs in the system
        count: usize,
    },
    /// A spring was requested between a particle and itself
    DegenerateSpring {
        /// First endpoint
        a: usize,
        /// Second endpoint
        b: usize,
    },
    /// The step size is not positive and finite
    InvalidTimestep(f64),
    /// `step` was called before any integrator was registered
    NoActiveIntegrator,
    /// An integrator with the same name is already registered
    DuplicateIntegrator(String),
    /// No integrator is registered under the requested name
    UnknownIntegrator(String),
    /// The integrator was built against an incompatible API version
    IncompatibleIntegrator {
        /// Integrator name
        name: String,
        /// API version reported by the integrator
        version: String,
    },
    /// The operation is not implemented for this kind of object
    Unsupported(&'static str),
    /// A configuration value is out of range
    InvalidConfig(String),
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::ParticleOutOfBounds { index, count } => {
                write!(f, "particle index {} out of bounds (count: {})", index, count)
            }
            SimulationError::SpringOutOfBounds { index, count } => {
                write!(f, "spring index {} out of bounds (count: {})", index, count)
            }
            SimulationError::DegenerateSpring { a, b } => {
                write!(f, "cannot connect particle {} to particle {}", a, b)
            }
            SimulationError::InvalidTimestep(h) => {
                write!(f, "invalid timestep {}: must be positive and finite", h)
            }
            SimulationError::NoActiveIntegrator => write!(f, "no active integrator"),
            SimulationError::DuplicateIntegrator(name) => {
                write!(f, "integrator '{}' is already registered", name)
            }
            SimulationError::UnknownIntegrator(name) => {
                write!(f, "integrator '{}' is not registered", name)
            }
            SimulationError::IncompatibleIntegrator { name, version } => write!(
                f,
                "integrator '{}' API version {} is incompatible with engine API version {}",
                name,
                version,
                crate::integration::INTEGRATOR_API_VERSION
            ),
            SimulationError::Unsupported(what) => write!(f, "unsupported operation: {}", what),
            SimulationError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for SimulationError {}
