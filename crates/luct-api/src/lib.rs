pub mod auth;
pub mod convert;
pub mod error;
pub mod export;
pub mod extract;
pub mod health;
pub mod middleware;
pub mod reports;
pub mod router;
pub mod token;
pub mod users;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;
pub use router::create_router;
pub use token::TokenIssuer;
