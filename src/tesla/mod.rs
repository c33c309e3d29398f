mod client;
mod models;
mod session;
mod tesla_error;

pub use client::{TeslaApiConfig, TeslaClient};
pub use models::TeslaTokens;
pub use session::{fetch_with_refresh, OrderSource, TokenRefresher};
pub use tesla_error::FetchError;
