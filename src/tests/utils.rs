use crate::auth::token::make_jwt;
use crate::db::{init_db, Database, SqliteHistoryStore};
use crate::domain::order::{CombinedOrder, OrderSummary};
use crate::domain::rules::DiffRules;
use crate::router::App;
use crate::tesla::{FetchError, OrderSource, TeslaTokens, TokenRefresher};
use crate::tracker::OrderTracker;
use astra::Response;
use serde_json::{json, Value};
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// A fresh on-disk database in its own temp dir. Keep the dir alive for the
/// duration of the test.
pub fn init_test_db() -> (TempDir, Database) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let db = Database::new(dir.path().join("test_db.sqlite3"));
    init_db(&db).unwrap_or_else(|e| panic!("Database initialization failed: {e}"));
    (dir, db)
}

pub fn test_app(vendor: Arc<FakeVendor>) -> (TempDir, App) {
    let (dir, db) = init_test_db();
    let app = App {
        tracker: OrderTracker::new(SqliteHistoryStore::new(db), Arc::new(DiffRules::default())),
        vendor,
    };
    (dir, app)
}

pub fn combined(rn: &str, status: &str, details: Value) -> CombinedOrder {
    CombinedOrder::new(
        OrderSummary::new(rn).with_field("orderStatus", json!(status)),
        details,
    )
}

/// A JWT that stays valid for an hour past now.
pub fn fresh_jwt(name: &str) -> String {
    let exp = chrono::Utc::now().timestamp() + 3600;
    make_jwt(&json!({ "exp": exp, "sub": name }))
}

/// A JWT that expired an hour ago.
pub fn stale_jwt(name: &str) -> String {
    let exp = chrono::Utc::now().timestamp() - 3600;
    make_jwt(&json!({ "exp": exp, "sub": name }))
}

pub fn body_json(resp: Response) -> Value {
    let mut body = String::new();
    resp.into_body()
        .reader()
        .read_to_string(&mut body)
        .unwrap();
    serde_json::from_str(&body).unwrap()
}

/// Stand-in for the vendor API. Only `accepted_token` is honored; anything
/// else is answered with `TokenExpired`.
pub struct FakeVendor {
    pub accepted_token: Mutex<String>,
    pub orders: Mutex<Vec<CombinedOrder>>,
    pub refreshed_tokens: Option<TeslaTokens>,
    pub fetch_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
}

impl FakeVendor {
    pub fn new(accepted_token: &str, orders: Vec<CombinedOrder>) -> Self {
        Self {
            accepted_token: Mutex::new(accepted_token.to_string()),
            orders: Mutex::new(orders),
            refreshed_tokens: None,
            fetch_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_refresh(mut self, tokens: TeslaTokens) -> Self {
        self.refreshed_tokens = Some(tokens);
        self
    }

    pub fn set_orders(&self, orders: Vec<CombinedOrder>) {
        *self.orders.lock().unwrap() = orders;
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

impl OrderSource for FakeVendor {
    fn fetch_all_orders(&self, access_token: &str) -> Result<Vec<CombinedOrder>, FetchError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if *self.accepted_token.lock().unwrap() != access_token {
            return Err(FetchError::TokenExpired("Unauthorized".into()));
        }
        Ok(self.orders.lock().unwrap().clone())
    }
}

impl TokenRefresher for FakeVendor {
    fn refresh(&self, _refresh_token: &str) -> Result<TeslaTokens, FetchError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refreshed_tokens.clone().ok_or(FetchError::Api {
            status: 400,
            message: "invalid_grant".into(),
        })
    }
}
