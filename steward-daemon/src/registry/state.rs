//! In-memory registry state.
//!
//! All methods here are pure list manipulation; locking, persistence and
//! event emission are handled by [`super::Registry`].

use std::collections::BTreeMap;

use crate::errors::{DaemonError, Result};
use crate::persistence::PersistedRegistry;

/// Tracked services, groups and credentials
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryState {
    pub(crate) services: Vec<String>,
    pub(crate) groups: BTreeMap<String, Vec<String>>,
    pub(crate) users: BTreeMap<String, String>,
    pub(crate) global: bool,
}

impl RegistryState {
    pub fn contains(&self, name: &str) -> bool {
        self.services.iter().any(|s| s == name)
    }

    /// Start tracking a service
    pub fn track(&mut self, name: &str) -> Result<()> {
        if self.contains(name) {
            return Err(DaemonError::ServiceAlreadyTracked(name.to_string()));
        }
        self.services.push(name.to_string());
        Ok(())
    }

    /// Stop tracking a service and remove it from every group
    pub fn forget(&mut self, name: &str) -> Result<()> {
        let index = self
            .services
            .iter()
            .position(|s| s == name)
            .ok_or_else(|| DaemonError::ServiceNotFound(name.to_string()))?;
        self.services.remove(index);
        for members in self.groups.values_mut() {
            members.retain(|m| m != name);
        }
        Ok(())
    }

    /// Stored key of a group, matched case-insensitively
    fn group_key(&self, name: &str) -> Option<&String> {
        let name = name.trim();
        self.groups.keys().find(|g| g.eq_ignore_ascii_case(name))
    }

    /// Create an empty group. Names are compared case-insensitively.
    pub fn add_group(&mut self, name: &str) -> Result<()> {
        let name = name.trim();
        if self.group_key(name).is_some() {
            return Err(DaemonError::GroupExists(name.to_string()));
        }
        self.groups.insert(name.to_string(), Vec::new());
        Ok(())
    }

    pub fn remove_group(&mut self, name: &str) -> bool {
        match self.group_key(name).cloned() {
            Some(key) => self.groups.remove(&key).is_some(),
            None => false,
        }
    }

    /// Add a service to a group, creating the group when needed. An existing
    /// group is matched case-insensitively.
    ///
    /// Returns `false` when the service already was a member.
    pub fn join(&mut self, group: &str, service: &str) -> Result<bool> {
        if self.members(group).iter().any(|m| m == service) {
            return Ok(false);
        }
        if !self.contains(service) {
            return Err(DaemonError::ServiceNotExists(service.to_string()));
        }
        let key = self
            .group_key(group)
            .cloned()
            .unwrap_or_else(|| group.trim().to_string());
        self.groups.entry(key).or_default().push(service.to_string());
        Ok(true)
    }

    /// Remove a service from a group. Returns `false` when it was not a member.
    pub fn leave(&mut self, group: &str, service: &str) -> bool {
        let Some(key) = self.group_key(group).cloned() else {
            return false;
        };
        let Some(members) = self.groups.get_mut(&key) else {
            return false;
        };
        match members.iter().position(|m| m == service) {
            Some(index) => {
                members.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn members(&self, group: &str) -> &[String] {
        self.group_key(group)
            .and_then(|key| self.groups.get(key))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn group_names(&self) -> Vec<String> {
        self.groups.keys().cloned().collect()
    }

    pub fn to_persisted(&self) -> PersistedRegistry {
        PersistedRegistry {
            services: self.services.clone(),
            groups: self.groups.clone(),
            global: self.global,
            users: self.users.clone(),
        }
    }
}

impl From<PersistedRegistry> for RegistryState {
    fn from(persisted: PersistedRegistry) -> Self {
        let mut state = Self {
            services: Vec::with_capacity(persisted.services.len()),
            groups: BTreeMap::new(),
            users: persisted.users,
            global: persisted.global,
        };
        for name in persisted.services {
            if !state.contains(&name) {
                state.services.push(name);
            }
        }
        // Drop dangling members left behind by hand-edited files
        for (group, members) in persisted.groups {
            let kept = members.into_iter().filter(|m| state.contains(m)).collect();
            state.groups.insert(group, kept);
        }
        state
    }
}
