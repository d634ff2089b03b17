//! # ipcwatch Test Suite
//!
//! Cross-crate flows run against the in-memory host with the engine
//! installed through `IpcWatch`.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── installation.rs    # idempotent install, per-context state
//!     ├── contexts.rs        # per-context logs with partitions
//!     ├── correlation.rs     # round trips, worker traffic, removals
//!     ├── self_exclusion.rs  # engine traffic and ignored channels
//!     ├── capacity.rs        # eviction and serial continuity
//!     └── startup.rs         # privileged worker startup race
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p iw-tests
//! cargo test -p iw-tests integration::correlation::
//! ```

#![allow(dead_code)]

pub mod integration;
