use std::fs;
use std::sync::Arc;

use anyhow::bail;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use siteman::auth::TokenGenerator;
use siteman::config::{GithubConfig, ServerConfig, TOKEN_SECRET_ENV};
use siteman::github::GithubRemoteFactory;
use siteman::server::{AppState, create_router};
use siteman::store::{SqliteStore, Store};
use siteman::types::{NewUser, ServiceToken, User};

#[derive(Parser)]
#[command(name = "siteman")]
#[command(about = "A self-hostable admin service for Docusaurus sites on GitHub", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, default_value = "8080")]
        port: u16,

        /// Data directory for database and mirrors
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// GitHub API base URL (override for GitHub Enterprise)
        #[arg(long)]
        github_api_base: Option<String>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the server (create the database, optionally a first user)
    Init {
        /// Data directory for database and mirrors
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Skip interactive prompts
        #[arg(long)]
        non_interactive: bool,
    },

    /// Create or refresh an operator and print a fresh service token
    AddUser {
        /// Data directory for database and mirrors
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Username on the remote platform
        #[arg(long)]
        username: String,

        /// Remote platform (only "github" is currently supported)
        #[arg(long, default_value = "github")]
        provider: String,

        /// Platform account id; defaults to the username
        #[arg(long)]
        provider_id: Option<String>,
    },
}

fn create_user_with_token(
    store: &SqliteStore,
    generator: &TokenGenerator,
    user: &NewUser,
) -> anyhow::Result<(User, String)> {
    let user = store.upsert_user(user)?;

    let (raw_token, lookup, hash) = generator.generate()?;
    let token = ServiceToken {
        id: Uuid::new_v4().to_string(),
        token_hash: hash,
        token_lookup: lookup,
        user_id: user.id,
        created_at: Utc::now(),
        expires_at: None,
        last_used_at: None,
    };
    store.create_service_token(&token)?;

    Ok((user, raw_token))
}

fn print_token_banner(username: &str, raw_token: &str) {
    println!();
    println!("========================================");
    println!("Service token for '{username}' (save this, it won't be shown again):");
    println!();
    println!("  {raw_token}");
    println!();
    println!("========================================");
    println!();
}

fn open_store(data_dir: &str) -> anyhow::Result<SqliteStore> {
    let data_path: std::path::PathBuf = data_dir.into();
    let db_path = data_path.join("siteman.db");

    if !db_path.exists() {
        bail!(
            "Database not found at {}. Run 'siteman admin init' first.",
            db_path.display()
        );
    }

    SqliteStore::new(&db_path).map_err(Into::into)
}

fn run_init(data_dir: String, non_interactive: bool) -> anyhow::Result<()> {
    let data_path: std::path::PathBuf = data_dir.into();
    fs::create_dir_all(&data_path)?;

    let db_path = data_path.join("siteman.db");
    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;

    if store.has_service_token()? {
        bail!("Server already initialized at {}", db_path.display());
    }

    println!("Database created at {}", db_path.display());

    if non_interactive {
        println!("Run 'siteman admin add-user' to create an operator.");
        return Ok(());
    }

    create_first_user_prompt(&store)
}

fn create_first_user_prompt(store: &SqliteStore) -> anyhow::Result<()> {
    let create_user = inquire::Confirm::new("Would you like to create the first operator?")
        .with_default(false)
        .prompt()?;

    if !create_user {
        return Ok(());
    }

    let username = inquire::Text::new("GitHub username:")
        .with_validator(|input: &str| {
            if input.trim().is_empty() {
                Err("Username cannot be empty".into())
            } else if input.contains(char::is_whitespace) {
                Err("Username cannot contain whitespace".into())
            } else {
                Ok(inquire::validator::Validation::Valid)
            }
        })
        .prompt()?;

    let generator = TokenGenerator::new();
    let (user, raw_token) = create_user_with_token(
        store,
        &generator,
        &NewUser {
            provider: "github".to_string(),
            provider_id: username.clone(),
            username,
            display_name: None,
            avatar_url: None,
        },
    )?;

    print_token_banner(&user.username, &raw_token);

    Ok(())
}

fn run_add_user(
    data_dir: String,
    username: String,
    provider: String,
    provider_id: Option<String>,
) -> anyhow::Result<()> {
    if provider != "github" {
        bail!("Unsupported provider '{provider}'; only 'github' is available");
    }

    let store = open_store(&data_dir)?;

    let generator = TokenGenerator::new();
    let (user, raw_token) = create_user_with_token(
        &store,
        &generator,
        &NewUser {
            provider,
            provider_id: provider_id.unwrap_or_else(|| username.clone()),
            username,
            display_name: None,
            avatar_url: None,
        },
    )?;

    print_token_banner(&user.username, &raw_token);

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("siteman=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init {
                data_dir,
                non_interactive,
            } => {
                run_init(data_dir, non_interactive)?;
            }
            AdminCommands::AddUser {
                data_dir,
                username,
                provider,
                provider_id,
            } => {
                run_add_user(data_dir, username, provider, provider_id)?;
            }
        },
        Commands::Serve {
            host,
            port,
            data_dir,
            github_api_base,
        } => {
            let mut github = GithubConfig::default();
            if let Some(api_base) = github_api_base {
                github.api_base = api_base;
            }

            let config = ServerConfig {
                host,
                port,
                data_dir: data_dir.into(),
                token_secret: std::env::var(TOKEN_SECRET_ENV).ok(),
                github,
            };

            if config.token_secret.is_none() {
                bail!("{TOKEN_SECRET_ENV} must be set so stored tokens can be encrypted");
            }

            let db_path = config.db_path();
            if !db_path.exists() {
                bail!(
                    "Server not initialized. Run 'siteman admin init' first to create the database."
                );
            }

            let store = SqliteStore::new(&db_path)?;
            store.initialize()?;

            let remotes = Arc::new(GithubRemoteFactory::new(config.github.clone())?);
            let state = Arc::new(AppState::new(
                Arc::new(store),
                remotes,
                config.data_dir.clone(),
                config.token_secret.clone(),
            ));

            let app = create_router(state);
            let addr = config.socket_addr()?;

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
