//! Service registry.
//!
//! The [`Registry`] is the single source of truth for which services and groups
//! exist and who may log in. It is a cheap-to-clone handle; every clone shares
//! the same state behind one read/write lock.
//!
//! Mutations are applied to a draft copy of the state. The draft replaces the
//! live state only after it was saved, so a failed save leaves memory exactly
//! as it was. Events are collected while the lock is held and sent after the
//! guard is dropped; a full event channel makes the caller wait without
//! blocking unrelated registry operations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::errors::{DaemonError, Result};
use crate::events::{
    EVENT_CHANNEL_CAPACITY, EventReceiver, EventSender, EventType, SystemEvent, event_channel,
};
use crate::manager::{
    AllStatuses, FIELD_STATUS, LOG_LIMIT, Operation, Scope, ServiceManager, ServiceStatus,
};
use crate::persistence::{PersistedRegistry, RegistryStore};
use crate::unit::{self, NewService};

mod state;

pub use state::RegistryState;

/// Command run by [`Registry::update`] when none is configured
pub const DEFAULT_UPDATE_COMMAND: &str = "git pull";

/// Tunables for a [`Registry`]
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    /// Shell command run in the service's working directory on update
    pub update_command: String,
    /// Capacity of the raw event channel
    pub event_capacity: usize,
    /// Override for the unit file directory (defaults to the scope's location)
    pub unit_dir: Option<PathBuf>,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            update_command: DEFAULT_UPDATE_COMMAND.to_string(),
            event_capacity: EVENT_CHANNEL_CAPACITY,
            unit_dir: None,
        }
    }
}

/// Read-only view of services and groups
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrySnapshot {
    pub services: Vec<String>,
    pub groups: BTreeMap<String, Vec<String>>,
}

struct RegistryInner<M> {
    state: RwLock<RegistryState>,
    manager: M,
    store: RegistryStore,
    scope: Scope,
    update_command: String,
    unit_dir: Option<PathBuf>,
    events_tx: parking_lot::Mutex<Option<EventSender>>,
    events_rx: parking_lot::Mutex<Option<EventReceiver>>,
}

/// Handle to the shared service registry
pub struct Registry<M: ServiceManager> {
    inner: Arc<RegistryInner<M>>,
}

impl<M: ServiceManager> Clone for Registry<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: ServiceManager> Registry<M> {
    /// Load the registry from `store`, creating the default file when missing
    pub fn open(manager: M, store: RegistryStore, options: RegistryOptions) -> Result<Self> {
        let persisted = store.load_or_init()?;
        Ok(Self::with_state(manager, store, persisted, options))
    }

    /// Build a registry from an already loaded record
    pub fn with_state(
        manager: M,
        store: RegistryStore,
        persisted: PersistedRegistry,
        options: RegistryOptions,
    ) -> Self {
        let state = RegistryState::from(persisted);
        let (events_tx, events_rx) = event_channel(options.event_capacity);
        Self {
            inner: Arc::new(RegistryInner {
                scope: Scope::from_global(state.global),
                state: RwLock::new(state),
                manager,
                store,
                update_command: options.update_command,
                unit_dir: options.unit_dir,
                events_tx: parking_lot::Mutex::new(Some(events_tx)),
                events_rx: parking_lot::Mutex::new(Some(events_rx)),
            }),
        }
    }

    /// Receiving end of the raw event stream. Returns `None` after the first call.
    pub fn events(&self) -> Option<EventReceiver> {
        self.inner.events_rx.lock().take()
    }

    /// Close the raw event stream. Downstream stages drain and shut down in
    /// order; later operations still succeed but emit nothing.
    pub fn close(&self) {
        if self.inner.events_tx.lock().take().is_some() {
            info!("Registry event stream closed");
        }
    }

    async fn emit(&self, event: SystemEvent) {
        let tx = self.inner.events_tx.lock().clone();
        let Some(tx) = tx else {
            debug!("Event stream closed, dropping {}", event);
            return;
        };
        debug!("Emitting {}", event);
        if let Err(e) = tx.send(event).await {
            warn!("Event stream closed, dropping {}", e.0);
        }
    }

    async fn emit_all(&self, events: Vec<SystemEvent>) {
        for event in events {
            self.emit(event).await;
        }
    }

    /// Apply `f` to a draft of the state, persist it, then publish it.
    async fn mutate<T>(&self, f: impl FnOnce(&mut RegistryState) -> Result<T>) -> Result<T> {
        let mut guard = self.inner.state.write().await;
        let mut draft = guard.clone();
        let out = f(&mut draft)?;
        if draft != *guard {
            self.inner.store.save(&draft.to_persisted())?;
            *guard = draft;
        }
        Ok(out)
    }

    async fn control(&self, name: &str, operation: Operation, event_type: EventType) -> Result<()> {
        if let Err(e) = self.inner.manager.execute(name, operation).await {
            warn!("{}", e);
            return Err(e);
        }
        self.emit(SystemEvent::new(event_type, name)).await;
        Ok(())
    }

    pub async fn run(&self, name: &str) -> Result<()> {
        self.control(name, Operation::Start, EventType::Started).await
    }

    pub async fn stop(&self, name: &str) -> Result<()> {
        self.control(name, Operation::Stop, EventType::Stopped).await
    }

    pub async fn restart(&self, name: &str) -> Result<()> {
        self.control(name, Operation::Restart, EventType::Restarted).await
    }

    pub async fn enable(&self, name: &str) -> Result<()> {
        self.control(name, Operation::Enable, EventType::Enabled).await
    }

    pub async fn disable(&self, name: &str) -> Result<()> {
        self.control(name, Operation::Disable, EventType::Disabled).await
    }

    /// Stop the service, run the update command in its working directory and
    /// start it again if it was running before.
    ///
    /// When only the final start fails, `Updated` is still emitted and
    /// [`DaemonError::RestartAfterUpdate`] is returned.
    pub async fn update(&self, name: &str) -> Result<()> {
        let before = self.status(name).await;
        self.stop(name).await?;

        let operation = Operation::Update {
            command: self.inner.update_command.clone(),
        };
        if let Err(e) = self.inner.manager.execute(name, operation).await {
            warn!("{}", e);
            return Err(e);
        }

        let restarted = if before.is_running() {
            self.run(name).await
        } else {
            Ok(())
        };

        self.emit(SystemEvent::new(EventType::Updated, name)).await;
        info!("Updated {}", name);

        restarted.map_err(|e| DaemonError::RestartAfterUpdate {
            service: name.to_string(),
            source: Box::new(e),
        })
    }

    fn unit_dir(&self) -> Result<PathBuf> {
        match &self.inner.unit_dir {
            Some(dir) => Ok(dir.clone()),
            None => unit::unit_dir(self.inner.scope),
        }
    }

    /// Write a unit file for a new service, enable it and start tracking it
    pub async fn create(&self, mut service: NewService) -> Result<()> {
        let mut events = Vec::new();
        let result = self.create_locked(&mut service, &mut events).await;
        self.emit_all(events).await;
        if result.is_ok() {
            info!("Created service {}", service.name);
        }
        result
    }

    async fn create_locked(
        &self,
        service: &mut NewService,
        events: &mut Vec<SystemEvent>,
    ) -> Result<()> {
        unit::validate_name(&service.name)?;
        let mut guard = self.inner.state.write().await;
        if guard.contains(&service.name) {
            return Err(DaemonError::ServiceAlreadyTracked(service.name.clone()));
        }

        let requested = if service.working_directory.as_os_str().is_empty() {
            Path::new(".").to_path_buf()
        } else {
            service.working_directory.clone()
        };
        service.working_directory = unit::resolve_working_dir(&requested)?;

        let unit_file = unit::write_unit(&self.unit_dir()?, service)?;
        debug!("Wrote unit file {:?}", unit_file);

        if let Err(e) = self.inner.manager.execute(&service.name, Operation::Enable).await {
            if let Err(rm) = std::fs::remove_file(&unit_file) {
                warn!("Failed to remove unit file {:?}: {}", unit_file, rm);
            }
            return Err(e);
        }
        events.push(SystemEvent::new(EventType::Enabled, &service.name));

        let mut draft = guard.clone();
        draft.track(&service.name)?;
        self.inner.store.save(&draft.to_persisted())?;
        *guard = draft;

        events.push(SystemEvent::new(EventType::Created, &service.name));
        Ok(())
    }

    /// Track an existing unit without touching its definition
    pub async fn attach(&self, name: &str) -> Result<()> {
        self.mutate(|state| state.track(name)).await?;
        self.emit(SystemEvent::new(EventType::Created, name)).await;
        Ok(())
    }

    /// Stop tracking a service and remove it from every group
    pub async fn forget(&self, name: &str) -> Result<()> {
        self.mutate(|state| state.forget(name)).await?;
        self.emit(SystemEvent::new(EventType::Removed, name)).await;
        Ok(())
    }

    pub async fn group(&self, name: &str) -> Result<()> {
        self.mutate(|state| state.add_group(name)).await
    }

    /// Remove a group. Unknown groups are ignored.
    pub async fn ungroup(&self, name: &str) -> Result<()> {
        self.mutate(|state| {
            state.remove_group(name);
            Ok(())
        })
        .await
    }

    /// Add a tracked service to a group
    pub async fn join(&self, group: &str, service: &str) -> Result<()> {
        if self.mutate(|state| state.join(group, service)).await? {
            self.emit(SystemEvent::new(EventType::Joined, service)).await;
        }
        Ok(())
    }

    pub async fn leave(&self, group: &str, service: &str) -> Result<()> {
        if self.mutate(|state| Ok(state.leave(group, service))).await? {
            self.emit(SystemEvent::new(EventType::Left, service)).await;
        }
        Ok(())
    }

    /// Current sub-state of a service; `unknown` when the query fails
    pub async fn status(&self, name: &str) -> ServiceStatus {
        match self.inner.manager.execute(name, Operation::show(FIELD_STATUS)).await {
            Ok(out) => ServiceStatus::new(name, out.trim()),
            Err(e) => {
                warn!("Status query for {} failed: {}", name, e);
                ServiceStatus::unknown(name)
            }
        }
    }

    /// Status of every tracked service, in registry order
    pub async fn refresh_status(&self) -> AllStatuses {
        let services = self.services().await;
        let mut statuses = Vec::with_capacity(services.len());
        for name in services {
            statuses.push(self.status(&name).await);
        }
        AllStatuses { services: statuses }
    }

    /// Last journal lines of a service
    pub async fn log(&self, name: &str) -> Result<String> {
        self.inner
            .manager
            .execute(name, Operation::Log { limit: LOG_LIMIT })
            .await
    }

    /// Check credentials. An empty user table accepts everyone.
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let state = self.inner.state.read().await;
        if state.users.is_empty() {
            return Ok(());
        }
        let valid = state
            .users
            .get(username)
            .is_some_and(|expected| bool::from(expected.as_bytes().ct_eq(password.as_bytes())));
        if valid {
            Ok(())
        } else {
            Err(DaemonError::InvalidCredentials)
        }
    }

    /// Group names, sorted
    pub async fn groups(&self) -> Vec<String> {
        self.inner.state.read().await.group_names()
    }

    pub async fn members(&self, group: &str) -> Vec<String> {
        self.inner.state.read().await.members(group).to_vec()
    }

    pub async fn services(&self) -> Vec<String> {
        self.inner.state.read().await.services.clone()
    }

    pub async fn snapshot(&self) -> RegistrySnapshot {
        let state = self.inner.state.read().await;
        RegistrySnapshot {
            services: state.services.clone(),
            groups: state.groups.clone(),
        }
    }
}
