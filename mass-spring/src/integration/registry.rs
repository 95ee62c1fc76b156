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
//! Integrator registry
//!
//! Integrators are registered statically by the application. The first
//! registered integrator becomes active; others stay available as candidates
//! and can be switched to by name between steps.

use super::{Integrator, INTEGRATOR_API_VERSION};
use crate::error::SimulationError;
use crate::particle::Particle;
use semver::Version;

/// Active and candidate integrators of a particle system
#[derive(Default)]
pub struct IntegratorRegistry {
    /// Registered integrators in registration order
    integrators: Vec<Box<dyn Integrator>>,
    /// Index of the active integrator
    active: Option<usize>,
}

impl IntegratorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an integrator
    ///
    /// The integrator is initialized with `particles` right away.
    ///
    /// # Returns
    ///
    /// Ok(()) on success, or an error if:
    /// - An integrator with the same name is already registered
    /// - The integrator API version is incompatible
    pub fn register(
        &mut self,
        mut integrator: Box<dyn Integrator>,
        particles: &[Particle],
    ) -> Result<(), SimulationError> {
        let name = integrator.name().to_string();

        if self.position(&name).is_some() {
            return Err(SimulationError::DuplicateIntegrator(name));
        }

        let version = integrator.api_version();
        if !is_version_compatible(version, INTEGRATOR_API_VERSION) {
            log::warn!(
                "Rejecting integrator '{}': API version {} does not match {}",
                name,
                version,
                INTEGRATOR_API_VERSION
            );
            return Err(SimulationError::IncompatibleIntegrator {
                name,
                version: version.to_string(),
            });
        }

        integrator.initialize(particles);
        self.integrators.push(integrator);
        if self.active.is_none() {
            log::debug!("Integrator '{}' is now active", name);
            self.active = Some(self.integrators.len() - 1);
        }
        Ok(())
    }

    /// Make the integrator called `name` active
    pub fn select(&mut self, name: &str) -> Result<(), SimulationError> {
        let index = self
            .position(name)
            .ok_or_else(|| SimulationError::UnknownIntegrator(name.to_string()))?;
        self.active = Some(index);
        log::debug!("Integrator '{}' is now active", name);
        Ok(())
    }

    /// Name of the active integrator
    pub fn active_name(&self) -> Option<&str> {
        self.active.map(|i| self.integrators[i].name())
    }

    /// The active integrator
    pub fn active_mut(&mut self) -> Option<&mut dyn Integrator> {
        match self.active {
            Some(i) => Some(self.integrators[i].as_mut()),
            None => None,
        }
    }

    /// Look an integrator up by name
    pub fn get(&self, name: &str) -> Option<&dyn Integrator> {
        self.position(name).map(|i| self.integrators[i].as_ref())
    }

    /// Registered names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.integrators.iter().map(|i| i.name()).collect()
    }

    /// Number of registered integrators
    pub fn len(&self) -> usize {
        self.integrators.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.integrators.is_empty()
    }

    /// Re-initialize every integrator for a new particle set
    pub fn initialize_all(&mut self, particles: &[Particle]) {
        for integrator in &mut self.integrators {
            integrator.initialize(particles);
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.integrators.iter().position(|i| i.name() == name)
    }
}

impl std::fmt::Debug for IntegratorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegratorRegistry")
            .field("integrators", &self.names())
            .field("active", &self.active_name())
            .finish()
    }
}

/// Check whether an integrator's API version works with this crate's
///
/// Uses semantic versioning rules: the major version must match; for `0.x`
/// versions the minor version must match as well, otherwise the integrator's
/// minor version must not exceed the crate's.
fn is_version_compatible(integrator_version: &str, engine_version: &str) -> bool {
    let (integrator, engine) = match (Version::parse(integrator_version), Version::parse(engine_version)) {
        (Ok(i), Ok(e)) => (i, e),
        _ => return false,
    };

    if integrator.major != engine.major {
        return false;
    }

    if integrator.major != 0 {
        integrator.minor <= engine.minor
    } else {
        integrator.minor == engine.minor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::IntegrationContext;
    use std::any::Any;

    struct TestIntegrator {
        name: String,
        version: String,
        init_count: usize,
    }

    impl TestIntegrator {
        fn new(name: &str, version: &str) -> Self {
            TestIntegrator {
                name: name.to_string(),
                version: version.to_string(),
                init_count: 0,
            }
        }
    }

    impl Integrator for TestIntegrator {
        fn name(&self) -> &str {
            &self.name
        }

        fn api_version(&self) -> &str {
            &self.version
        }

        fn initialize(&mut self, _particles: &[Particle]) {
            self.init_count += 1;
        }

        fn step(
            &mut self,
            _ctx: &mut IntegrationContext<'_>,
            _t: f64,
            _h: f64,
            _iterations: usize,
        ) -> Result<(), SimulationError> {
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn init_count(registry: &IntegratorRegistry, name: &str) -> usize {
        registry
            .get(name)
            .and_then(|i| i.as_any().downcast_ref::<TestIntegrator>())
            .map(|i| i.init_count)
            .unwrap()
    }

    #[test]
    fn test_first_registered_is_active() {
        let mut registry = IntegratorRegistry::new();
        assert!(registry.active_name().is_none());

        registry.register(Box::new(TestIntegrator::new("euler", "0.1.0")), &[]).unwrap();
        registry.register(Box::new(TestIntegrator::new("rk4", "0.1.3")), &[]).unwrap();
        assert_eq!(registry.active_name(), Some("euler"));
        assert_eq!(registry.names(), vec!["euler", "rk4"]);

        registry.select("rk4").unwrap();
        assert_eq!(registry.active_name(), Some("rk4"));
    }

    #[test]
    fn test_duplicate_and_unknown() {
        let mut registry = IntegratorRegistry::new();
        registry.register(Box::new(TestIntegrator::new("euler", "0.1.0")), &[]).unwrap();

        let err = registry
            .register(Box::new(TestIntegrator::new("euler", "0.1.0")), &[])
            .unwrap_err();
        assert_eq!(err, SimulationError::DuplicateIntegrator("euler".to_string()));

        let err = registry.select("verlet").unwrap_err();
        assert_eq!(err, SimulationError::UnknownIntegrator("verlet".to_string()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_incompatible_version_rejected() {
        let mut registry = IntegratorRegistry::new();
        let err = registry
            .register(Box::new(TestIntegrator::new("future", "0.2.0")), &[])
            .unwrap_err();
        assert!(matches!(err, SimulationError::IncompatibleIntegrator { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_initialize_all() {
        let mut registry = IntegratorRegistry::new();
        registry.register(Box::new(TestIntegrator::new("a", "0.1.0")), &[]).unwrap();
        registry.register(Box::new(TestIntegrator::new("b", "0.1.0")), &[]).unwrap();
        assert_eq!(init_count(&registry, "a"), 1);

        registry.initialize_all(&[]);
        assert_eq!(init_count(&registry, "a"), 2);
        assert_eq!(init_count(&registry, "b"), 2);
    }

    #[test]
    fn test_version_compatibility() {
        assert!(is_version_compatible("0.1.0", "0.1.0"));
        assert!(is_version_compatible("0.1.5", "0.1.0"));
        assert!(!is_version_compatible("0.2.0", "0.1.0"));
        assert!(!is_version_compatible("1.0.0", "0.1.0"));
        assert!(is_version_compatible("1.0.0", "1.2.0"));
        assert!(is_version_compatible("1.2.0", "1.2.0"));
        assert!(!is_version_compatible("1.3.0", "1.2.0"));
        assert!(!is_version_compatible("invalid", "1.0.0"));
    }
}
