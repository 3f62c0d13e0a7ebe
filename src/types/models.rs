use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An operator account, keyed by the identity the remote platform reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub provider: String,
    pub provider_id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile fields for creating or refreshing a user. Upserts update these in
/// place and never touch id or created_at.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub provider: String,
    pub provider_id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// One encrypted access-token record. Rows are append-only; the most recently
/// appended record per (user_id, provider) is the current token.
#[derive(Debug, Clone)]
pub struct TokenRecord {
    pub id: i64,
    pub user_id: i64,
    pub provider: String,
    pub ciphertext: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTokenRecord {
    pub user_id: i64,
    pub provider: String,
    pub ciphertext: String,
}

/// A registered site: a remote repository plus its local mirror location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,
    pub user_id: i64,
    pub provider: String,
    pub owner: String,
    pub repo: String,
    pub default_branch: String,
    pub local_path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSite {
    pub user_id: i64,
    pub provider: String,
    pub owner: String,
    pub repo: String,
    pub default_branch: String,
    pub local_path: String,
}

/// Service token used to authenticate operators against the API.
/// The raw token is shown once at creation; only the hash is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceToken {
    pub id: String,
    #[serde(skip)]
    pub token_hash: String,
    #[serde(skip)]
    pub token_lookup: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}
