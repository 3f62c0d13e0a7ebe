//! # Siteman
//!
//! A self-hostable admin service for Docusaurus sites hosted on GitHub,
//! usable both as a standalone binary and as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! siteman = { version = "0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use siteman::config::GithubConfig;
//! use siteman::github::GithubRemoteFactory;
//! use siteman::server::{AppState, create_router};
//! use siteman::store::{SqliteStore, Store};
//!
//! let store = SqliteStore::new(&PathBuf::from("./data/siteman.db")).unwrap();
//! store.initialize().unwrap();
//!
//! let remotes = Arc::new(GithubRemoteFactory::new(GithubConfig::default()).unwrap());
//! let state = Arc::new(AppState::new(
//!     Arc::new(store),
//!     remotes,
//!     PathBuf::from("./data"),
//!     std::env::var("SITEMAN_TOKEN_SECRET").ok(),
//! ));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes CLI module. Disable with `default-features = false`.

pub mod auth;
pub mod config;
pub mod error;
pub mod github;
pub mod mirror;
pub mod pipeline;
pub mod server;
pub mod store;
pub mod types;
pub mod vault;
