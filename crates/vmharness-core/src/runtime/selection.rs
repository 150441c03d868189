// crates/vmharness-core/src/runtime/selection.rs
// ============================================================================
// Module: VM Harness Test Selection
// Description: Glob-based test name selection for a run.
// Purpose: Restrict a run to tests whose names match operator patterns.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Patterns support `*` (any run of characters, including none) and `?`
//! (exactly one character). An empty pattern list selects every test.
//! Unselected tests are reported as excluded and never provisioned.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Set of glob patterns selecting test names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestSelection {
    /// Patterns; empty selects everything.
    patterns: Vec<String>,
}

impl TestSelection {
    /// Selection matching every test.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    /// Selection from explicit patterns.
    #[must_use]
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the configured patterns.
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Returns true when `name` matches any pattern.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|pattern| glob_match(pattern, name))
    }
}

// ============================================================================
// SECTION: Matching
// ============================================================================

/// Matches `name` against a `*`/`?` glob without backtracking blowup.
#[must_use]
pub fn glob_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();
    let (mut p, mut n) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while n < name.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some((p, n));
                p += 1;
            }
            Some('?') => {
                p += 1;
                n += 1;
            }
            Some(ch) if *ch == name[n] => {
                p += 1;
                n += 1;
            }
            _ => match star {
                Some((star_p, star_n)) => {
                    p = star_p + 1;
                    n = star_n + 1;
                    star = Some((star_p, star_n + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p ..].iter().all(|ch| *ch == '*')
}

// ============================================================================
// SECTION: Tests
// ============================================================================
