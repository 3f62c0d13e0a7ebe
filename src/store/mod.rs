mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn upsert_user(&self, user: &NewUser) -> Result<User>;
    fn get_user(&self, id: i64) -> Result<Option<User>>;
    fn get_user_by_provider(&self, provider: &str, provider_id: &str) -> Result<Option<User>>;

    // Encrypted token records (append-only, latest wins)
    fn append_token(&self, record: &NewTokenRecord) -> Result<i64>;
    fn latest_token(&self, user_id: i64, provider: &str) -> Result<Option<TokenRecord>>;

    // Site registry
    fn upsert_site(&self, site: &NewSite) -> Result<Site>;
    fn get_site(&self, user_id: i64, provider: &str, owner: &str, repo: &str)
    -> Result<Option<Site>>;
    fn list_sites(&self, user_id: i64) -> Result<Vec<Site>>;

    // Service token operations
    fn create_service_token(&self, token: &ServiceToken) -> Result<()>;
    fn get_service_token_by_lookup(&self, lookup: &str) -> Result<Option<ServiceToken>>;
    fn update_service_token_last_used(&self, id: &str) -> Result<()>;
    fn has_service_token(&self) -> Result<bool>;

    fn close(&self) -> Result<()>;
}
