//! Test harness that runs a registry against a fake service manager

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use steward_daemon::events::EventReceiver;
use steward_daemon::persistence::{PersistedRegistry, RegistryStore};
use steward_daemon::registry::{Registry, RegistryOptions};
use steward_daemon::unit::NewService;
use tempfile::TempDir;

use super::fake_manager::FakeManager;

/// Capacity used for the harness's raw event channel
pub const HARNESS_EVENT_CAPACITY: usize = 64;

/// A registry with its record, unit directory and work directories under one
/// temporary directory
pub struct TestRegistryHarness {
    pub registry: Registry<FakeManager>,
    pub manager: FakeManager,
    pub store: RegistryStore,
    events: Option<EventReceiver>,
    temp_dir: TempDir,
}

impl TestRegistryHarness {
    /// Harness tracking the given services, with no users and no groups
    pub fn new(services: &[&str]) -> std::io::Result<Self> {
        Self::from_record(PersistedRegistry {
            services: services.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        })
    }

    /// Harness starting from an explicit persisted record
    pub fn from_record(record: PersistedRegistry) -> std::io::Result<Self> {
        Self::with_options(record, RegistryOptions::default())
    }

    pub fn with_options(
        record: PersistedRegistry,
        options: RegistryOptions,
    ) -> std::io::Result<Self> {
        let temp_dir = TempDir::new()?;
        let store = RegistryStore::new(temp_dir.path().join("config.json"));
        store.save(&record).map_err(std::io::Error::other)?;

        let manager = FakeManager::new();
        let options = RegistryOptions {
            unit_dir: Some(temp_dir.path().join("units")),
            event_capacity: HARNESS_EVENT_CAPACITY,
            ..options
        };
        let registry = Registry::open(manager.clone(), store.clone(), options)
            .map_err(std::io::Error::other)?;
        let events = registry.events();

        Ok(Self {
            registry,
            manager,
            store,
            events,
            temp_dir,
        })
    }

    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn unit_dir(&self) -> PathBuf {
        self.temp_dir.path().join("units")
    }

    /// Take the raw event stream. Panics when taken twice.
    pub fn take_events(&mut self) -> EventReceiver {
        self.events.take().expect("event stream already taken")
    }

    /// Create a fresh working directory for a service
    pub fn work_dir(&self, name: &str) -> std::io::Result<PathBuf> {
        let dir = self.temp_dir.path().join("work").join(name);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// A service definition that runs in its own working directory
    pub fn new_service(&self, name: &str, command: &str) -> std::io::Result<NewService> {
        Ok(NewService {
            name: name.to_string(),
            command: command.to_string(),
            working_directory: self.work_dir(name)?,
            environment: BTreeMap::new(),
        })
    }

    /// Read the record back from disk
    pub fn persisted(&self) -> PersistedRegistry {
        self.store.load_or_init().expect("registry record should load")
    }
}
