//! Common test utilities for integration tests.
//!
//! This module provides the synthetic forest and store fixtures shared
//! across integration test files.

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod forest;

use tempfile::TempDir;

use sublink_core::{StoreConfig, TreeDb};

// Re-export commonly used items
pub use forest::{halo, Forest, HaloSpec, NodeRecord, ID_OFFSET, LAST_SNAPSHOT};

/// Write the standard forest into a fresh directory.
pub fn write_fixture() -> (TempDir, Forest) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let forest = Forest::standard();
    forest.write_store(dir.path(), &StoreConfig::default());
    (dir, forest)
}

/// Write the standard forest and open it.
pub fn open_fixture() -> (TempDir, Forest, TreeDb) {
    let (dir, forest) = write_fixture();
    let db = TreeDb::open(dir.path()).expect("Failed to open store");
    (dir, forest, db)
}
