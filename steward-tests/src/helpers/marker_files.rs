//! Marker file utilities for verifying hook execution

use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Helper for creating and checking marker files written by hook commands
#[derive(Clone)]
pub struct MarkerFileHelper {
    base_dir: PathBuf,
}

impl MarkerFileHelper {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
        }
    }

    /// Path of the marker file with the given name
    pub fn marker_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(format!("{}.marker", name))
    }

    pub fn marker_exists(&self, name: &str) -> bool {
        self.marker_path(name).exists()
    }

    /// Hook command that appends one "<service> <event>" line per event
    pub fn append_event_command(&self, name: &str) -> String {
        format!(
            "echo \"$SERVICE $EVENT\" >> {}",
            self.marker_path(name).display()
        )
    }

    /// Like [`Self::append_event_command`], then exit with `code`
    pub fn append_then_exit_command(&self, name: &str, code: i32) -> String {
        format!("{}; exit {}", self.append_event_command(name), code)
    }

    pub fn read_marker(&self, name: &str) -> Option<String> {
        std::fs::read_to_string(self.marker_path(name)).ok()
    }

    /// Lines of a marker file, empty when it does not exist
    pub fn marker_lines(&self, name: &str) -> Vec<String> {
        self.read_marker(name)
            .map(|content| content.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Wait until the marker file has at least `expected` lines
    pub async fn wait_for_marker_lines(
        &self,
        name: &str,
        expected: usize,
        timeout: Duration,
    ) -> bool {
        let start = Instant::now();

        while start.elapsed() < timeout {
            if self.marker_lines(name).len() >= expected {
                return true;
            }
            sleep(Duration::from_millis(50)).await;
        }

        false
    }
}
