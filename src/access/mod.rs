//! Programmatic access: roles, permissions and API keys.

mod api_keys;
mod roles;

pub use api_keys::{generate_secret, mask, ApiKey, ApiKeyRow};
pub use roles::{NewRole, Permission, Role, RoleOption, RolePatch};
