pub const SCHEMA: &str = r#"
-- Operator accounts, keyed by the identity the remote platform reports
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    provider TEXT NOT NULL,
    provider_id TEXT NOT NULL,
    username TEXT NOT NULL,
    display_name TEXT,
    avatar_url TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),

    UNIQUE(provider, provider_id)
);

-- Encrypted access tokens. Append-only: the newest row per
-- (user_id, provider) is the current token.
CREATE TABLE IF NOT EXISTS tokens (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    provider TEXT NOT NULL,
    ciphertext TEXT NOT NULL,      -- base64(nonce || ciphertext+tag), AES-256-GCM
    created_at TEXT DEFAULT (datetime('now'))
);

-- Registered sites: remote repo plus local mirror location
CREATE TABLE IF NOT EXISTS sites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    provider TEXT NOT NULL,
    owner TEXT NOT NULL,
    repo TEXT NOT NULL,
    default_branch TEXT NOT NULL,
    local_path TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),

    UNIQUE(user_id, provider, owner, repo)
);

-- Service tokens are operator auth credentials for the API
CREATE TABLE IF NOT EXISTS service_tokens (
    id TEXT PRIMARY KEY,
    token_hash TEXT NOT NULL,          -- argon2id hash with embedded salt
    token_lookup TEXT NOT NULL,        -- plaintext row index, 8 hex chars
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,

    -- Lifecycle
    created_at TEXT DEFAULT (datetime('now')),
    expires_at TEXT,            -- NULL = never
    last_used_at TEXT
);

-- Create indexes
CREATE INDEX IF NOT EXISTS idx_tokens_user_provider ON tokens(user_id, provider);
CREATE INDEX IF NOT EXISTS idx_sites_user ON sites(user_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_service_tokens_lookup ON service_tokens(token_lookup);
CREATE INDEX IF NOT EXISTS idx_service_tokens_user ON service_tokens(user_id);
"#;
