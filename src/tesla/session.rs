// src/tesla/session.rs
use tracing::{info, warn};

use crate::auth::token::is_token_valid;
use crate::domain::order::CombinedOrder;
use crate::errors::ServerError;
use crate::tesla::models::TeslaTokens;
use crate::tesla::FetchError;

pub trait OrderSource {
    fn fetch_all_orders(&self, access_token: &str) -> Result<Vec<CombinedOrder>, FetchError>;
}

pub trait TokenRefresher {
    fn refresh(&self, refresh_token: &str) -> Result<TeslaTokens, FetchError>;
}

#[derive(Debug)]
pub struct FetchOutcome {
    pub orders: Vec<CombinedOrder>,
    /// Set when the tokens had to be refreshed along the way.
    pub refreshed: Option<TeslaTokens>,
}

/// Fetch all orders, refreshing the access token at most once.
///
/// A token that is already stale (or not a readable JWT) is refreshed before
/// the first request. A `TokenExpired` from the vendor triggers one refresh
/// and one retry; any other failure is returned unchanged.
pub fn fetch_with_refresh<O, R>(
    source: &O,
    refresher: &R,
    tokens: &TeslaTokens,
    now_secs: i64,
) -> Result<FetchOutcome, ServerError>
where
    O: OrderSource + ?Sized,
    R: TokenRefresher + ?Sized,
{
    let mut refreshed = None;
    let mut access_token = tokens.access_token.clone();

    if tokens.can_refresh() && !is_token_valid(&access_token, now_secs) {
        info!("access token stale, refreshing before fetch");
        let fresh = refresh_or_unauthorized(refresher, tokens)?;
        access_token = fresh.access_token.clone();
        refreshed = Some(fresh);
    }

    match source.fetch_all_orders(&access_token) {
        Ok(orders) => Ok(FetchOutcome { orders, refreshed }),
        Err(FetchError::TokenExpired(msg)) if refreshed.is_none() && tokens.can_refresh() => {
            info!(reason = %msg, "access token expired, refreshing and retrying");
            let fresh = refresh_or_unauthorized(refresher, tokens)?;
            let orders = source.fetch_all_orders(&fresh.access_token)?;
            Ok(FetchOutcome {
                orders,
                refreshed: Some(fresh),
            })
        }
        Err(e) => Err(e.into()),
    }
}

fn refresh_or_unauthorized<R>(refresher: &R, tokens: &TeslaTokens) -> Result<TeslaTokens, ServerError>
where
    R: TokenRefresher + ?Sized,
{
    refresher.refresh(&tokens.refresh_token).map_err(|e| {
        warn!(error = %e, "token refresh failed");
        ServerError::Unauthorized("Your session has expired. Please log in again.".into())
    })
}
