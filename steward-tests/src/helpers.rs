pub mod fake_manager;
pub mod marker_files;
pub mod registry_harness;
pub mod wait_utils;
