mod server;

pub use server::{GithubConfig, ServerConfig, TOKEN_SECRET_ENV};
