use astra::Request;
use chrono::Utc;
use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::io::Read;
use std::sync::Arc;
use tracing::debug;

use crate::db::SqliteHistoryStore;
use crate::domain::order::CombinedOrder;
use crate::errors::ServerError;
use crate::responses::{json_response, ResultResp};
use crate::tesla::{fetch_with_refresh, OrderSource, TeslaTokens, TokenRefresher};
use crate::tracker::{OrderTimeline, OrderTracker, SyncReport};

/// Request bodies above this size are rejected.
pub(crate) const MAX_BODY_BYTES: u64 = 8 * 1024 * 1024;

/// The vendor side as the router needs it.
pub trait VendorApi: OrderSource + TokenRefresher + Send + Sync {}

impl<T: OrderSource + TokenRefresher + Send + Sync> VendorApi for T {}

pub struct App {
    pub tracker: OrderTracker<SqliteHistoryStore>,
    pub vendor: Arc<dyn VendorApi>,
}

#[derive(Serialize)]
struct SyncResponse {
    report: SyncReport,
    timelines: Vec<OrderTimeline>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tokens: Option<TeslaTokens>,
}

pub fn handle(mut req: Request, app: &App) -> ResultResp {
    let method = req.method().as_str().to_string();
    let path = req.uri().path().to_string();
    debug!(%method, %path, "request");

    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

    match (method.as_str(), segments.as_slice()) {
        ("GET", ["api", "status"]) => json_response(200, &json!({ "message": "API is alive!" })),

        ("POST", ["api", "orders", "sync"]) => {
            let tokens: TeslaTokens = read_json(&mut req)?;
            sync_from_vendor(app, &tokens)
        }

        ("POST", ["api", "orders", "ingest"]) => {
            let orders: Vec<CombinedOrder> = read_json(&mut req)?;
            let report = app.tracker.sync(&orders, now_millis());
            json_response(
                200,
                &SyncResponse {
                    report,
                    timelines: app.tracker.timelines(&orders),
                    tokens: None,
                },
            )
        }

        ("GET", ["api", "orders", rn, "history"]) => {
            let rn = decode_segment(rn)?;
            json_response(200, &app.tracker.change_log(&rn))
        }

        ("GET", ["api", "orders", rn, "timeline"]) => {
            let rn = decode_segment(rn)?;
            let timeline = app.tracker.timeline(&rn).ok_or(ServerError::NotFound)?;
            json_response(200, &timeline)
        }

        _ => Err(ServerError::NotFound),
    }
}

fn sync_from_vendor(app: &App, tokens: &TeslaTokens) -> ResultResp {
    if tokens.access_token.trim().is_empty() {
        return Err(ServerError::BadRequest("access_token is required".into()));
    }

    let vendor = app.vendor.as_ref();
    let outcome = fetch_with_refresh(vendor, vendor, tokens, Utc::now().timestamp())?;
    let report = app.tracker.sync(&outcome.orders, now_millis());

    json_response(
        200,
        &SyncResponse {
            report,
            timelines: app.tracker.timelines(&outcome.orders),
            tokens: outcome.refreshed,
        },
    )
}

fn read_json<T: DeserializeOwned>(req: &mut Request) -> Result<T, ServerError> {
    let mut body = Vec::new();
    req.body_mut()
        .reader()
        .take(MAX_BODY_BYTES + 1)
        .read_to_end(&mut body)
        .map_err(|e| ServerError::BadRequest(format!("failed to read body: {e}")))?;
    if body.len() as u64 > MAX_BODY_BYTES {
        return Err(ServerError::BadRequest("request body too large".into()));
    }

    serde_json::from_slice(&body).map_err(|e| ServerError::BadRequest(format!("invalid JSON: {e}")))
}

/// Percent-decoded path segment, e.g. `RN%201` becomes `RN 1`.
fn decode_segment(raw: &str) -> Result<String, ServerError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| ServerError::BadRequest(format!("invalid path segment: {e}")))
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
