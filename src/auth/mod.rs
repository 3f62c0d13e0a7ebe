mod helpers;
mod middleware;
mod token;

pub use middleware::RequireUser;
pub use token::{TokenGenerator, parse_token};
