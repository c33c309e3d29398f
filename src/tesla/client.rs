// client.rs
use rand::Rng;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::order::{CombinedOrder, OrderSummary};
use crate::tesla::models::TeslaTokens;
use crate::tesla::session::{OrderSource, TokenRefresher};
use crate::tesla::FetchError;

const USER_AGENT: &str = concat!("tesla_order_tracker/", env!("CARGO_PKG_VERSION"));

/// Placeholder substituted with the order reference number.
pub const ORDER_ID_PLACEHOLDER: &str = "{ORDER_ID}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeslaApiConfig {
    /// Order list endpoint; responds with `{"response": [...]}`.
    pub orders_url: String,
    /// Details endpoint containing `{ORDER_ID}`.
    pub order_details_url: String,
    pub token_url: String,
    pub client_id: String,
    pub scope: String,
    pub timeout_secs: u64,
    /// Attempts per request when the network itself fails.
    pub max_attempts: u32,
}

impl Default for TeslaApiConfig {
    fn default() -> Self {
        Self {
            orders_url: "https://owner-api.teslamotors.com/api/1/users/orders".to_string(),
            order_details_url: "https://akamai-apigateway-vfx.tesla.com/tasks?deviceLanguage=en&deviceCountry=US&referenceNumber={ORDER_ID}&appVersion=9.99.9-9999".to_string(),
            token_url: "https://auth.tesla.com/oauth2/v3/token".to_string(),
            client_id: "ownerapi".to_string(),
            scope: "openid email offline_access".to_string(),
            timeout_secs: 30,
            max_attempts: 3,
        }
    }
}

pub struct TeslaClient {
    client: Client,
    cfg: TeslaApiConfig,
}

impl TeslaClient {
    pub fn new(cfg: TeslaApiConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self { client, cfg })
    }

    pub fn details_url(&self, reference_number: &str) -> Result<Url, FetchError> {
        let encoded: String = url::form_urlencoded::byte_serialize(reference_number.as_bytes()).collect();
        let raw = self.cfg.order_details_url.replace(ORDER_ID_PLACEHOLDER, &encoded);
        Url::parse(&raw).map_err(|e| FetchError::UnexpectedShape(format!("bad details url: {e}")))
    }

    fn get_orders(&self, access_token: &str) -> Result<Vec<OrderSummary>, FetchError> {
        let data = self.get_json(&self.cfg.orders_url, access_token)?;
        parse_order_list(data)
    }

    fn get_order_details(&self, reference_number: &str, access_token: &str) -> Result<Value, FetchError> {
        let url = self.details_url(reference_number)?;
        self.get_json(url.as_str(), access_token)
    }

    /// GET with bearer auth, retrying transport failures with capped backoff.
    fn get_json(&self, url: &str, access_token: &str) -> Result<Value, FetchError> {
        const MAX_BACKOFF_SECS: u64 = 10;
        const JITTER_MAX_MILLIS: u64 = 500;

        let mut last_err = None;

        for attempt in 1..=self.cfg.max_attempts.max(1) {
            let start = Instant::now();

            match self.try_get_json(url, access_token) {
                Ok(value) => {
                    debug!(url, attempt, elapsed = ?start.elapsed(), "vendor request ok");
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < self.cfg.max_attempts => {
                    warn!(url, attempt, elapsed = ?start.elapsed(), error = %e, "vendor request failed, retrying");
                    last_err = Some(e);

                    let base = std::cmp::min(u64::from(attempt), MAX_BACKOFF_SECS);
                    let jitter = rand::thread_rng().gen_range(0..=JITTER_MAX_MILLIS);
                    std::thread::sleep(Duration::from_secs(base) + Duration::from_millis(jitter));
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| FetchError::Network("retry loop exhausted".into())))
    }

    fn try_get_json(&self, url: &str, access_token: &str) -> Result<Value, FetchError> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .send()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        read_json(resp)
    }
}

impl OrderSource for TeslaClient {
    fn fetch_all_orders(&self, access_token: &str) -> Result<Vec<CombinedOrder>, FetchError> {
        let summaries = self.get_orders(access_token)?;
        info!(count = summaries.len(), "fetched order list");

        let mut combined = Vec::with_capacity(summaries.len());
        for order in summaries {
            let details = self.get_order_details(&order.reference_number, access_token)?;
            combined.push(CombinedOrder::new(order, details));
        }
        Ok(combined)
    }
}

impl TokenRefresher for TeslaClient {
    fn refresh(&self, refresh_token: &str) -> Result<TeslaTokens, FetchError> {
        let body = json!({
            "grant_type": "refresh_token",
            "client_id": self.cfg.client_id,
            "refresh_token": refresh_token,
            "scope": self.cfg.scope,
        });

        let resp = self
            .client
            .post(&self.cfg.token_url)
            .json(&body)
            .send()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let data = read_json(resp)?;
        serde_json::from_value(data).map_err(|e| FetchError::JsonParse(e.to_string()))
    }
}

fn read_json(resp: Response) -> Result<Value, FetchError> {
    let status = resp.status();
    let text = resp
        .text()
        .map_err(|e| FetchError::Network(e.to_string()))?;

    if status == StatusCode::UNAUTHORIZED {
        return Err(FetchError::TokenExpired(error_message(&text, "Unauthorized")));
    }
    if !status.is_success() {
        return Err(FetchError::Api {
            status: status.as_u16(),
            message: error_message(&text, status.canonical_reason().unwrap_or("request failed")),
        });
    }

    serde_json::from_str(&text).map_err(|e| FetchError::JsonParse(e.to_string()))
}

/// Prefer the vendor's `error_description`, then `error`, then `fallback`.
fn error_message(body: &str, fallback: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            v.get("error_description")
                .and_then(Value::as_str)
                .or_else(|| v.get("error").and_then(Value::as_str))
        })
        .unwrap_or(fallback)
        .to_string()
}

/// The list endpoint wraps its payload in a `response` array.
pub fn parse_order_list(data: Value) -> Result<Vec<OrderSummary>, FetchError> {
    let list = match data {
        Value::Object(mut map) => map.remove("response"),
        _ => None,
    };

    match list {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(|e| FetchError::JsonParse(e.to_string())))
            .collect(),
        Some(Value::Null) | None => Err(FetchError::UnexpectedShape("orders response missing".into())),
        Some(_) => Err(FetchError::UnexpectedShape("orders response is not a list".into())),
    }
}
