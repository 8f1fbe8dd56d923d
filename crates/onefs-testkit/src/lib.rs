//! OneFS Testing Infrastructure
//!
//! In-memory stand-ins for the appliance collaborators plus fixtures shared by
//! the integration tests.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! onefs-testkit = { path = "../onefs-testkit" }
//! ```
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use onefs_reconcile::prelude::*;
//! use onefs_testkit::*;
//!
//! # async fn demo() {
//! let appliance = MockAppliance::new();
//! let engine = Convergence::<SnapshotSchedule, _>::new(Arc::new(appliance.clone()));
//! let result = engine.reconcile(&nightly_schedule("nightly")).await;
//! assert!(result.is_success());
//! # }
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod appliance;
pub mod fixtures;

pub use appliance::{Call, Failure, MockAppliance, Op};
pub use fixtures::*;

use std::sync::Once;

static TRACING: Once = Once::new();

/// Install a test subscriber honouring `RUST_LOG`. Safe to call from every test.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
