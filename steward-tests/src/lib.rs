//! Test utilities for the steward workspace
//!
//! This crate provides an in-memory service manager, a registry harness
//! backed by a temporary directory, and helpers for waiting on events and
//! hook side effects.

pub mod helpers;

pub use helpers::fake_manager::FakeManager;
pub use helpers::marker_files::MarkerFileHelper;
pub use helpers::registry_harness::TestRegistryHarness;
pub use helpers::wait_utils::{collect_events, expect_no_event, wait_for_event};
