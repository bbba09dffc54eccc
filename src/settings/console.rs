//! Console sign-in configuration. Stored and reported, not enforced.

use crate::error::{LedgerError, Result};
use crate::records::{Collection, Keyed};
use serde::{Deserialize, Serialize};

/// A sign-in method operators can switch on or off.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthMethod {
    pub id: String,
    pub name: String,
    pub description: String,
    pub enabled: bool,
    #[serde(default)]
    pub is_recommended: bool,
}

impl AuthMethod {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        enabled: bool,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            enabled,
            is_recommended: false,
        }
    }

    pub fn recommended(mut self) -> Self {
        self.is_recommended = true;
        self
    }
}

impl Keyed for AuthMethod {
    type Key = String;

    fn key(&self) -> &String {
        &self.id
    }
}

/// Lockout, password and session policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySettings {
    pub lockout_enabled: bool,
    pub maximum_attempts: u32,
    pub lockout_duration_minutes: u32,
    pub password_expiration_days: u32,
    pub require_strong_passwords: bool,
    pub session_timeout_minutes: u32,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            lockout_enabled: true,
            maximum_attempts: 5,
            lockout_duration_minutes: 30,
            password_expiration_days: 90,
            require_strong_passwords: true,
            session_timeout_minutes: 60,
        }
    }
}

impl SecuritySettings {
    /// Counts that gate sign-in must be positive.
    pub fn validate(&self) -> Result<()> {
        if self.maximum_attempts == 0 {
            return Err(LedgerError::InvalidState(
                "maximum_attempts must be at least 1".into(),
            ));
        }
        if self.session_timeout_minutes == 0 {
            return Err(LedgerError::InvalidState(
                "session_timeout_minutes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Auth methods plus security policy.
#[derive(Clone, Debug, Default)]
pub struct ConsoleSettings {
    pub auth_methods: Collection<AuthMethod>,
    pub security: SecuritySettings,
}

impl ConsoleSettings {
    /// Fails with `DuplicateId` if two methods share an id.
    pub fn new(auth_methods: Vec<AuthMethod>, security: SecuritySettings) -> Result<Self> {
        Ok(Self {
            auth_methods: Collection::try_from_iter(auth_methods)?,
            security,
        })
    }

    /// Set a method's flag. Returns the updated method.
    pub fn set_auth_method(&mut self, id: &str, enabled: bool) -> Result<&AuthMethod> {
        self.auth_methods
            .update(&id.to_string(), |m| m.enabled = enabled)
            .ok_or_else(|| LedgerError::AuthMethodNotFound(id.to_string()))
    }

    pub fn enabled_count(&self) -> usize {
        self.auth_methods.iter().filter(|m| m.enabled).count()
    }
}
