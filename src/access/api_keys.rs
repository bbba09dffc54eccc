//! API keys.

use crate::records::Keyed;
use crate::types::{ApiKeyId, Hash, RoleId, Timestamp};
use crate::views::Searchable;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Characters a generated secret is drawn from.
const SECRET_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Random characters after the prefix.
const SECRET_LENGTH: usize = 26;

/// Characters kept visible at each end of a masked key.
const MASK_HEAD: usize = 6;
const MASK_TAIL: usize = 4;

/// A credential for programmatic access, bound to one role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: ApiKeyId,
    pub name: String,
    /// The secret.
    pub key: String,
    pub role: RoleId,
    pub created_at: Timestamp,
    pub last_used: Option<Timestamp>,
}

impl ApiKey {
    /// `sk_liv...1234` style display form.
    pub fn masked(&self) -> String {
        mask(&self.key)
    }

    /// Hex SHA-256 of the secret, safe to log.
    pub fn fingerprint(&self) -> String {
        Hash::from_bytes(self.key.as_bytes()).to_hex()
    }
}

impl Keyed for ApiKey {
    type Key = ApiKeyId;

    fn key(&self) -> &ApiKeyId {
        &self.id
    }
}

/// A key as listed in the console, with its role resolved to a name.
#[derive(Clone, Copy, Debug)]
pub struct ApiKeyRow<'a> {
    pub key: &'a ApiKey,
    pub role_name: &'a str,
}

impl Searchable for ApiKeyRow<'_> {
    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Borrowed(self.key.name.as_str()),
            Cow::Borrowed(self.role_name),
        ]
    }
}

/// Keep the first six and last four characters of `secret`.
pub fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= MASK_HEAD + MASK_TAIL {
        return "...".to_string();
    }
    let head: String = chars[..MASK_HEAD].iter().collect();
    let tail: String = chars[chars.len() - MASK_TAIL..].iter().collect();
    format!("{head}...{tail}")
}

/// Generate a fresh secret: `prefix` followed by random lowercase
/// alphanumerics.
pub fn generate_secret(prefix: &str) -> String {
    let mut rng = rand::rng();
    let body: String = (0..SECRET_LENGTH)
        .map(|_| SECRET_CHARSET[rng.random_range(0..SECRET_CHARSET.len())] as char)
        .collect();
    format!("{prefix}{body}")
}
