pub mod backend;
pub mod cookies;
pub mod error;
pub mod flow;
pub mod guard;
pub mod profile;
pub mod rate_limit;
pub mod session;

mod provider;
pub use provider::{ProviderClient, ProviderTokens, GOOGLE_TOKEN_URL};
