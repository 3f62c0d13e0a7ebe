use std::net::SocketAddr;
use std::path::PathBuf;

/// Environment variable holding the vault encryption secret.
pub const TOKEN_SECRET_ENV: &str = "SITEMAN_TOKEN_SECRET";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Secret the vault derives its encryption key from. Required before any
    /// token can be stored or read.
    pub token_secret: Option<String>,
    pub github: GithubConfig,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("siteman.db")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            token_secret: std::env::var(TOKEN_SECRET_ENV).ok(),
            github: GithubConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GithubConfig {
    /// API base URL; override for GitHub Enterprise or tests.
    pub api_base: String,
    pub user_agent: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            user_agent: concat!("siteman/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
