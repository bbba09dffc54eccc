//! Roles and the permission catalog.

use crate::error::{LedgerError, Result};
use crate::records::Keyed;
use crate::types::{PermissionId, RoleId};
use crate::views::Searchable;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// A single grantable capability.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
    pub description: String,
}

impl Permission {
    pub fn new(
        id: impl Into<PermissionId>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
        }
    }
}

impl Keyed for Permission {
    type Key = PermissionId;

    fn key(&self) -> &PermissionId {
        &self.id
    }
}

/// A named bundle of permissions assigned to API keys.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: String,
    pub permissions: Vec<PermissionId>,
    /// Preselected for new keys.
    #[serde(default)]
    pub is_default: bool,
    /// Built-in; cannot be edited or deleted.
    #[serde(default)]
    pub is_system: bool,
}

impl Role {
    pub fn has_permission(&self, permission: &PermissionId) -> bool {
        self.permissions.contains(permission)
    }
}

impl Keyed for Role {
    type Key = RoleId;

    fn key(&self) -> &RoleId {
        &self.id
    }
}

impl Searchable for Role {
    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Borrowed(self.name.as_str()),
            Cow::Borrowed(self.description.as_str()),
        ]
    }
}

/// `(id, name)` pair offered when picking a role for a key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RoleOption {
    pub id: RoleId,
    pub name: String,
}

impl From<&Role> for RoleOption {
    fn from(role: &Role) -> Self {
        Self {
            id: role.id.clone(),
            name: role.name.clone(),
        }
    }
}

/// Input for creating a role.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NewRole {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub permissions: Vec<PermissionId>,
    #[serde(default)]
    pub is_default: bool,
}

impl NewRole {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_permissions<I, P>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PermissionId>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn into_role(self, id: RoleId) -> Result<Role> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(LedgerError::MissingField("name".into()));
        }

        Ok(Role {
            id,
            name,
            description: self.description.trim().to_string(),
            permissions: dedup(self.permissions),
            is_default: self.is_default,
            is_system: false,
        })
    }
}

/// Partial role update.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RolePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<Vec<PermissionId>>,
    pub is_default: Option<bool>,
}

impl RolePatch {
    pub(crate) fn validate(&self) -> Result<()> {
        if matches!(&self.name, Some(n) if n.trim().is_empty()) {
            return Err(LedgerError::MissingField("name".into()));
        }
        Ok(())
    }

    pub(crate) fn apply(self, role: &mut Role) {
        if let Some(v) = self.name {
            role.name = v.trim().to_string();
        }
        if let Some(v) = self.description {
            role.description = v.trim().to_string();
        }
        if let Some(v) = self.permissions {
            role.permissions = dedup(v);
        }
        if let Some(v) = self.is_default {
            role.is_default = v;
        }
    }
}

/// Drop repeated ids, keeping first occurrence order.
fn dedup(permissions: Vec<PermissionId>) -> Vec<PermissionId> {
    let mut out: Vec<PermissionId> = Vec::with_capacity(permissions.len());
    for p in permissions {
        if !out.contains(&p) {
            out.push(p);
        }
    }
    out
}
