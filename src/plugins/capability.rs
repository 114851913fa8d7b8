//! Capability gate: decides whether a plugin may make a given API call.

use std::collections::BTreeSet;

use tracing::warn;

use crate::error::PluginError;

use super::types::{Permission, PluginManifest};

/// Permission checker scoped to one plugin's manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityGate {
    plugin_id: String,
    granted: BTreeSet<Permission>,
}

impl CapabilityGate {
    pub fn new(manifest: &PluginManifest) -> Self {
        Self {
            plugin_id: manifest.id.clone(),
            granted: manifest.permissions.clone(),
        }
    }

    /// Whether `permission` was granted.
    pub fn allows(&self, permission: Permission) -> bool {
        self.granted.contains(&permission)
    }

    /// `Ok(())` if granted, otherwise a `PermissionDenied` naming the capability.
    pub fn check(&self, permission: Permission) -> Result<(), PluginError> {
        if self.allows(permission) {
            return Ok(());
        }
        warn!(
            plugin = %self.plugin_id,
            permission = %permission,
            "Denied plugin API call"
        );
        Err(PluginError::PermissionDenied {
            plugin: self.plugin_id.clone(),
            permission,
        })
    }

    pub fn granted(&self) -> &BTreeSet<Permission> {
        &self.granted
    }
}
