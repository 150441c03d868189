// crates/vmharness-core/src/runtime/registry.rs
// ============================================================================
// Module: VM Harness Test Registry
// Description: Catalog of registered test descriptors.
// Purpose: Hold every test before a run starts, keyed by unique name.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The registry is an explicit value built during initialization and then
//! passed by reference to the scheduler and the guest agent. It is
//! append-only; the scheduler only reads it. Iteration is ordered by name.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::DescriptorError;
use crate::core::NativeFunc;
use crate::core::TestDescriptor;
use crate::core::TestDescriptorBuilder;
use crate::core::TestName;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Registration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A test with the same name is already registered.
    #[error("test {0} is already registered")]
    Duplicate(String),
    /// Descriptor failed validation.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Append-only catalog of test descriptors.
#[derive(Debug, Default, Clone)]
pub struct TestRegistry {
    /// Descriptors keyed by test name.
    tests: BTreeMap<TestName, TestDescriptor>,
}

impl TestRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] when the name is already taken.
    pub fn add(&mut self, descriptor: TestDescriptor) -> Result<(), RegistryError> {
        if self.tests.contains_key(descriptor.name()) {
            return Err(RegistryError::Duplicate(descriptor.name().to_string()));
        }
        self.tests.insert(descriptor.name().clone(), descriptor);
        Ok(())
    }

    /// Builds and registers a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the descriptor is invalid or the name is
    /// already taken.
    pub fn register(&mut self, builder: TestDescriptorBuilder) -> Result<(), RegistryError> {
        self.add(builder.build()?)
    }

    /// Looks up a descriptor by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TestDescriptor> {
        TestName::parse(name).ok().and_then(|name| self.tests.get(&name))
    }

    /// Iterates descriptors in name order.
    pub fn iter(&self) -> impl Iterator<Item = &TestDescriptor> {
        self.tests.values()
    }

    /// Returns the number of registered tests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    /// Returns true when no tests are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Looks up a native function by owning test and function name.
    #[must_use]
    pub fn native_function(&self, test: &str, function: &str) -> Option<&NativeFunc> {
        self.get(test).and_then(|descriptor| descriptor.native_func(function))
    }

    /// Lists every `(test, function)` pair in name order.
    #[must_use]
    pub fn native_functions(&self) -> Vec<(&TestName, &str)> {
        self.tests
            .values()
            .flat_map(|descriptor| {
                descriptor.native_funcs().keys().map(move |func| (descriptor.name(), func.as_str()))
            })
            .collect()
    }
}
