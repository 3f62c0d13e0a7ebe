use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::Store;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// An in-memory store, used by tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        provider: row.get(1)?,
        provider_id: row.get(2)?,
        username: row.get(3)?,
        display_name: row.get(4)?,
        avatar_url: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

fn site_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Site> {
    Ok(Site {
        id: row.get(0)?,
        user_id: row.get(1)?,
        provider: row.get(2)?,
        owner: row.get(3)?,
        repo: row.get(4)?,
        default_branch: row.get(5)?,
        local_path: row.get(6)?,
        created_at: parse_datetime(&row.get::<_, String>(7)?),
        updated_at: parse_datetime(&row.get::<_, String>(8)?),
    })
}

const USER_COLUMNS: &str =
    "id, provider, provider_id, username, display_name, avatar_url, created_at, updated_at";

const SITE_COLUMNS: &str =
    "id, user_id, provider, owner, repo, default_branch, local_path, created_at, updated_at";

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn upsert_user(&self, user: &NewUser) -> Result<User> {
        {
            let conn = self.conn();
            let existing: Option<i64> = conn
                .query_row(
                    "SELECT id FROM users WHERE provider = ?1 AND provider_id = ?2",
                    params![user.provider, user.provider_id],
                    |row| row.get(0),
                )
                .optional()?;

            match existing {
                Some(id) => {
                    conn.execute(
                        "UPDATE users SET username = ?1, display_name = ?2, avatar_url = ?3,
                         updated_at = ?4 WHERE id = ?5",
                        params![
                            user.username,
                            user.display_name,
                            user.avatar_url,
                            format_datetime(&Utc::now()),
                            id,
                        ],
                    )?;
                }
                None => {
                    conn.execute(
                        "INSERT INTO users (provider, provider_id, username, display_name, avatar_url)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![
                            user.provider,
                            user.provider_id,
                            user.username,
                            user.display_name,
                            user.avatar_url,
                        ],
                    )?;
                }
            }
        }

        self.get_user_by_provider(&user.provider, &user.provider_id)?
            .ok_or(Error::NotFound)
    }

    fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_provider(&self, provider: &str, provider_id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE provider = ?1 AND provider_id = ?2"),
            params![provider, provider_id],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    // Encrypted token records

    fn append_token(&self, record: &NewTokenRecord) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO tokens (user_id, provider, ciphertext) VALUES (?1, ?2, ?3)",
            params![record.user_id, record.provider, record.ciphertext],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn latest_token(&self, user_id: i64, provider: &str) -> Result<Option<TokenRecord>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, user_id, provider, ciphertext, created_at
             FROM tokens WHERE user_id = ?1 AND provider = ?2
             ORDER BY id DESC LIMIT 1",
            params![user_id, provider],
            |row| {
                Ok(TokenRecord {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    provider: row.get(2)?,
                    ciphertext: row.get(3)?,
                    created_at: parse_datetime(&row.get::<_, String>(4)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    // Site registry

    fn upsert_site(&self, site: &NewSite) -> Result<Site> {
        {
            let conn = self.conn();
            let existing: Option<i64> = conn
                .query_row(
                    "SELECT id FROM sites
                     WHERE user_id = ?1 AND provider = ?2 AND owner = ?3 AND repo = ?4",
                    params![site.user_id, site.provider, site.owner, site.repo],
                    |row| row.get(0),
                )
                .optional()?;

            match existing {
                Some(id) => {
                    conn.execute(
                        "UPDATE sites SET default_branch = ?1, local_path = ?2, updated_at = ?3
                         WHERE id = ?4",
                        params![
                            site.default_branch,
                            site.local_path,
                            format_datetime(&Utc::now()),
                            id,
                        ],
                    )?;
                }
                None => {
                    conn.execute(
                        "INSERT INTO sites (user_id, provider, owner, repo, default_branch, local_path)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            site.user_id,
                            site.provider,
                            site.owner,
                            site.repo,
                            site.default_branch,
                            site.local_path,
                        ],
                    )?;
                }
            }
        }

        self.get_site(site.user_id, &site.provider, &site.owner, &site.repo)?
            .ok_or(Error::NotFound)
    }

    fn get_site(
        &self,
        user_id: i64,
        provider: &str,
        owner: &str,
        repo: &str,
    ) -> Result<Option<Site>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {SITE_COLUMNS} FROM sites
                 WHERE user_id = ?1 AND provider = ?2 AND owner = ?3 AND repo = ?4"
            ),
            params![user_id, provider, owner, repo],
            site_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_sites(&self, user_id: i64) -> Result<Vec<Site>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SITE_COLUMNS} FROM sites WHERE user_id = ?1 ORDER BY owner, repo"
        ))?;

        let rows = stmt.query_map(params![user_id], site_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Service token operations

    fn create_service_token(&self, token: &ServiceToken) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO service_tokens (id, token_hash, token_lookup, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                token.id,
                token.token_hash,
                token.token_lookup,
                token.user_id,
                format_datetime(&token.created_at),
                token.expires_at.as_ref().map(format_datetime),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::Conflict("service token lookup collision".to_string()))
            }
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_service_token_by_lookup(&self, lookup: &str) -> Result<Option<ServiceToken>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, token_hash, token_lookup, user_id, created_at, expires_at, last_used_at
             FROM service_tokens WHERE token_lookup = ?1",
            params![lookup],
            |row| {
                Ok(ServiceToken {
                    id: row.get(0)?,
                    token_hash: row.get(1)?,
                    token_lookup: row.get(2)?,
                    user_id: row.get(3)?,
                    created_at: parse_datetime(&row.get::<_, String>(4)?),
                    expires_at: row.get::<_, Option<String>>(5)?.map(|s| parse_datetime(&s)),
                    last_used_at: row.get::<_, Option<String>>(6)?.map(|s| parse_datetime(&s)),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn update_service_token_last_used(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE service_tokens SET last_used_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    fn has_service_token(&self) -> Result<bool> {
        let conn = self.conn();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM service_tokens", [], |row| row.get(0))?;
        Ok(count > 0)
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
