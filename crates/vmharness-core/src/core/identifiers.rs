// crates/vmharness-core/src/core/identifiers.rs
// ============================================================================
// Module: VM Harness Identifiers
// Description: Canonical identifiers for tests, platforms, and guest functions.
// Purpose: Provide strongly typed, serializable names with stable string forms.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Identifiers are thin string wrappers that serialize transparently. Context
//! labels (platform, distro, channel, architecture) are opaque. Test names and
//! native function names are validated because both are spliced into guest
//! command lines by the native invocation protocol.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum length of a test name.
pub const MAX_TEST_NAME_LENGTH: usize = 256;
/// Maximum length of a native function name.
pub const MAX_NATIVE_NAME_LENGTH: usize = 128;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Identifier validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// Identifier was empty.
    #[error("{kind} must not be empty")]
    Empty {
        /// Identifier kind label.
        kind: &'static str,
    },
    /// Identifier exceeded its length limit.
    #[error("{kind} exceeds {max} characters")]
    TooLong {
        /// Identifier kind label.
        kind: &'static str,
        /// Maximum allowed length.
        max: usize,
    },
    /// Identifier contained a character outside its alphabet.
    #[error("{kind} contains invalid character {found:?}: {value}")]
    InvalidCharacter {
        /// Identifier kind label.
        kind: &'static str,
        /// Offending character.
        found: char,
        /// Full identifier value.
        value: String,
    },
}

// ============================================================================
// SECTION: Context Labels
// ============================================================================

/// Declares an opaque string label with the standard conversions.
macro_rules! context_label {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new label.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the label as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

context_label! {
    /// Provisioning backend name (for example `qemu`, `aws`, `esx`).
    PlatformName
}

context_label! {
    /// Distribution family tag (for example `cl`, `fcos`).
    DistroTag
}

context_label! {
    /// Release train of the distribution (for example `stable`, `beta`, `alpha`).
    Channel
}

context_label! {
    /// CPU architecture label (for example `amd64`, `arm64`).
    Architecture
}

// ============================================================================
// SECTION: Test Names
// ============================================================================

/// Unique, dotted test identifier (for example `cl.misc.falco`).
///
/// # Invariants
/// - Non-empty, at most [`MAX_TEST_NAME_LENGTH`] characters.
/// - Only ASCII alphanumerics and `.`, `-`, `_`, `+`, `/`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TestName(String);

impl TestName {
    /// Parses and validates a test name.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when the name is empty, too long, or uses
    /// characters outside the test name alphabet.
    pub fn parse(value: impl Into<String>) -> Result<Self, IdentifierError> {
        let value = value.into();
        validate(&value, "test name", MAX_TEST_NAME_LENGTH, |ch| {
            ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_' | '+' | '/')
        })?;
        Ok(Self(value))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TestName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for TestName {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<TestName> for String {
    fn from(value: TestName) -> Self {
        value.0
    }
}

// ============================================================================
// SECTION: Native Function Names
// ============================================================================

/// Symbolic name of a guest-side native function (for example `TLSServe`).
///
/// # Invariants
/// - Non-empty, at most [`MAX_NATIVE_NAME_LENGTH`] characters.
/// - Only ASCII alphanumerics and `_`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NativeFuncName(String);

impl NativeFuncName {
    /// Parses and validates a native function name.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when the name is empty, too long, or is not
    /// an identifier.
    pub fn parse(value: impl Into<String>) -> Result<Self, IdentifierError> {
        let value = value.into();
        validate(&value, "native function name", MAX_NATIVE_NAME_LENGTH, |ch| {
            ch.is_ascii_alphanumeric() || ch == '_'
        })?;
        Ok(Self(value))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NativeFuncName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for NativeFuncName {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<NativeFuncName> for String {
    fn from(value: NativeFuncName) -> Self {
        value.0
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates length and alphabet for a constrained identifier.
fn validate(
    value: &str,
    kind: &'static str,
    max: usize,
    allowed: impl Fn(char) -> bool,
) -> Result<(), IdentifierError> {
    if value.is_empty() {
        return Err(IdentifierError::Empty {
            kind,
        });
    }
    if value.chars().count() > max {
        return Err(IdentifierError::TooLong {
            kind,
            max,
        });
    }
    if let Some(found) = value.chars().find(|ch| !allowed(*ch)) {
        return Err(IdentifierError::InvalidCharacter {
            kind,
            found,
            value: value.to_string(),
        });
    }
    Ok(())
}
