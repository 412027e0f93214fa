//! # TDB Testkit
//!
//! Test utilities for the TDB storage layer.
//!
//! This crate provides:
//! - Fixtures for block stores and locations in temporary directories
//! - A conformance suite every [`tdb_storage::BlockAccess`] must pass
//! - Property-based generators for payloads and operation sequences
//! - Simulated processes for exercising location locks
//! - Concurrency stress helpers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tdb_testkit::prelude::*;
//!
//! #[test]
//! fn every_store_round_trips() {
//!     for kind in StoreKind::ALL {
//!         check_round_trip(&TestStore::new(kind, 128));
//!     }
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod conformance;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::conformance::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use conformance::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
