// crates/vmharness-core/tests/proptest_filter.rs
// ============================================================================
// Module: Filter and Retry Property-Based Tests
// Description: Property tests for filter determinism and retry bounds.
// Purpose: Detect nondeterminism and attempt-count violations across inputs.
// ============================================================================

//! Property-based tests for filter and retry invariants.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::time::Duration;

use proptest::prelude::*;
use vmharness_core::Decision;
use vmharness_core::ExecutionContext;
use vmharness_core::OsVersion;
use vmharness_core::TestDescriptor;
use vmharness_core::decide;
use vmharness_core::retry;
use vmharness_core::runtime::retry_conditional;

const PLATFORMS: [&str; 4] = ["qemu", "aws", "esx", "gcp"];
const DISTROS: [&str; 2] = ["cl", "fcos"];
const ARCHES: [&str; 2] = ["amd64", "arm64"];

fn subset(all: &'static [&'static str]) -> impl Strategy<Value = Vec<&'static str>> {
    proptest::sample::subsequence(all.to_vec(), 0 ..= all.len())
}

fn version_strategy() -> impl Strategy<Value = OsVersion> {
    (3000_u64 .. 3100, 0_u64 .. 3, 0_u64 .. 3).prop_map(|(a, b, c)| OsVersion::new(a, b, c))
}

fn context_strategy() -> impl Strategy<Value = ExecutionContext> {
    (
        proptest::sample::select(PLATFORMS.to_vec()),
        proptest::sample::select(DISTROS.to_vec()),
        proptest::sample::select(ARCHES.to_vec()),
        version_strategy(),
    )
        .prop_map(|(platform, distro, arch, version)| {
            ExecutionContext::new(platform, distro, "stable", version, arch)
        })
}

fn descriptor_strategy() -> impl Strategy<Value = TestDescriptor> {
    (
        subset(&PLATFORMS),
        subset(&PLATFORMS),
        subset(&DISTROS),
        subset(&ARCHES),
        proptest::option::of(version_strategy()),
        proptest::option::of(version_strategy()),
    )
        .prop_map(|(platforms, excluded, distros, arches, min_version, skip_below)| {
            let mut builder = TestDescriptor::builder("prop.test", |_| Ok(()))
                .platforms(platforms)
                .exclude_platforms(excluded)
                .distros(distros)
                .architectures(arches);
            if let Some(min) = min_version {
                builder = builder.min_version(min);
            }
            if let Some(bound) = skip_below {
                builder = builder.skip_when(move |input| *input.version < bound);
            }
            builder.build().unwrap()
        })
}

proptest! {
    #[test]
    fn filter_is_deterministic(test in descriptor_strategy(), ctx in context_strategy()) {
        prop_assert_eq!(decide(&test, &ctx), decide(&test, &ctx.clone()));
    }

    #[test]
    fn run_decisions_satisfy_every_constraint(test in descriptor_strategy(), ctx in context_strategy()) {
        if decide(&test, &ctx) == Decision::Run {
            prop_assert!(test.platforms().is_empty() || test.platforms().contains(&ctx.platform));
            prop_assert!(!test.exclude_platforms().contains(&ctx.platform));
            prop_assert!(test.distros().is_empty() || test.distros().contains(&ctx.distro));
            prop_assert!(
                test.architectures().is_empty() || test.architectures().contains(&ctx.architecture)
            );
            prop_assert!(test.min_version().is_none_or(|min| ctx.version >= min));
        }
    }

    #[test]
    fn retry_never_exceeds_attempts(attempts in 0_u32 .. 8, succeed_on in 1_u32 .. 10) {
        let mut calls = 0_u32;
        let result = retry(attempts, Duration::ZERO, || {
            calls += 1;
            if calls == succeed_on { Ok(()) } else { Err(calls) }
        });
        prop_assert!(calls <= attempts);
        if attempts == 0 {
            prop_assert_eq!(result, Ok(()));
        } else if succeed_on <= attempts {
            prop_assert_eq!(result, Ok(()));
            prop_assert_eq!(calls, succeed_on);
        } else {
            prop_assert_eq!(result, Err(attempts));
            prop_assert_eq!(calls, attempts);
        }
    }

    #[test]
    fn conditional_retry_stops_at_first_fatal_error(
        attempts in 1_u32 .. 8,
        fatal_on in 1_u32 .. 10,
    ) {
        let mut calls = 0_u32;
        let mut consulted = 0_u32;
        let result = retry_conditional(
            attempts,
            Duration::ZERO,
            || {
                calls += 1;
                Err::<(), u32>(calls)
            },
            |&attempt| {
                consulted += 1;
                attempt != fatal_on
            },
        );
        let stop = fatal_on.min(attempts);
        prop_assert_eq!(result, Err(stop));
        prop_assert_eq!(calls, stop);
        prop_assert!(consulted < attempts);
    }
}
