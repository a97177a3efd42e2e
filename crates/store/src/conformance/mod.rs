//! Conformance test suite for `StorageProvider` implementations.
//!
//! This module provides a backend-agnostic test suite that any
//! `StorageProvider` can run to verify it behaves the way the local store
//! relies on. The suite covers:
//!
//! - **Persistence**: written values load back, tombstones remove keys
//! - **Batch ordering**: later changes in a batch win, batches apply in order
//! - **Store integration**: a store re-initialized over the provider sees
//!   exactly what the previous store left behind
//!
//! # Usage
//!
//! Provider crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty provider for each test:
//!
//! ```ignore
//! use onyx_store::conformance::run_conformance_suite;
//!
//! #[test]
//! fn sqlite_conformance() {
//!     let report = run_conformance_suite(|| create_test_sqlite_provider());
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod batch;
mod persist;

use std::fmt;

use crate::StorageProvider;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "persist", "batch").
    pub category: String,
    /// Test name (e.g. "tombstone_removes_key").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        let (passed, message) = match result {
            Ok(()) => (true, None),
            Err(msg) => (false, Some(msg)),
        };
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed,
            message,
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage provider.
///
/// The `factory` function is called once per test to create a fresh, empty
/// provider, ensuring test isolation.
pub fn run_conformance_suite<P, F>(factory: F) -> ConformanceReport
where
    P: StorageProvider,
    F: Fn() -> P,
{
    let mut results = Vec::new();

    results.extend(persist::run_persist_tests(&factory));
    results.extend(batch::run_batch_tests(&factory));

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

fn expect_eq<T: PartialEq + fmt::Debug>(what: &str, actual: T, expected: T) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("{what}: expected {expected:?}, got {actual:?}"))
    }
}
