use crate::errors::ServerError;
use crate::router::{handle, App};
use crate::tesla::TeslaTokens;
use crate::tests::utils::{body_json, combined, fresh_jwt, test_app, FakeVendor};
use astra::Body;
use http::{Method, Request};
use serde_json::{json, Value};
use std::sync::Arc;

fn sync(app: &App, tokens: &TeslaTokens) -> Result<Value, ServerError> {
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/orders/sync")
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(tokens).unwrap()))
        .unwrap();
    handle(req, app).map(body_json)
}

#[test]
fn sync_fetches_and_records_orders() {
    let access = fresh_jwt("user");
    let vendor = Arc::new(FakeVendor::new(
        &access,
        vec![combined("RN1", "BOOKED", json!({"tasks": {}}))],
    ));
    let (_dir, app) = test_app(vendor.clone());

    let out = sync(&app, &TeslaTokens::new(access.clone(), "refresh")).unwrap();
    assert_eq!(out["report"]["baselines"], json!(["RN1"]));
    assert!(out.get("tokens").is_none());

    vendor.set_orders(vec![combined("RN1", "BOOKED", json!({"tasks": {"x": 1}}))]);
    let out = sync(&app, &TeslaTokens::new(access, "refresh")).unwrap();
    assert_eq!(out["report"]["baselines"], json!([]));
    assert_eq!(
        out["report"]["diffs"]["RN1"]["details.tasks.x"],
        json!({"new": 1})
    );
    assert_eq!(vendor.fetches(), 2);
    assert_eq!(vendor.refreshes(), 0);
}

#[test]
fn new_subtree_is_reported_as_one_change() {
    let access = fresh_jwt("user");
    let vendor = Arc::new(FakeVendor::new(
        &access,
        vec![combined("RN1", "BOOKED", json!({}))],
    ));
    let (_dir, app) = test_app(vendor.clone());
    sync(&app, &TeslaTokens::new(access.clone(), "refresh")).unwrap();

    vendor.set_orders(vec![combined("RN1", "BOOKED", json!({"tasks": {"x": 1}}))]);
    let out = sync(&app, &TeslaTokens::new(access, "refresh")).unwrap();

    assert_eq!(
        out["report"]["diffs"]["RN1"],
        json!({"details.tasks": {"new": {"x": 1}}})
    );
}

#[test]
fn sync_returns_refreshed_tokens_after_expiry() {
    let old = fresh_jwt("old");
    let new = fresh_jwt("new");
    let vendor = Arc::new(
        FakeVendor::new(&new, vec![combined("RN1", "BOOKED", json!({}))])
            .with_refresh(TeslaTokens::new(new.clone(), "refresh-2")),
    );
    let (_dir, app) = test_app(vendor.clone());

    let out = sync(&app, &TeslaTokens::new(old, "refresh-1")).unwrap();

    assert_eq!(out["tokens"]["access_token"], json!(new));
    assert_eq!(out["tokens"]["refresh_token"], json!("refresh-2"));
    assert_eq!(vendor.refreshes(), 1);
    assert_eq!(vendor.fetches(), 2);
}

#[test]
fn sync_without_access_token_is_rejected() {
    let (_dir, app) = test_app(Arc::new(FakeVendor::new("t", vec![])));
    assert!(matches!(
        sync(&app, &TeslaTokens::new("", "r")),
        Err(ServerError::BadRequest(_))
    ));
}

#[test]
fn failed_refresh_is_unauthorized() {
    let vendor = Arc::new(FakeVendor::new("never", vec![]));
    let (_dir, app) = test_app(vendor);

    assert!(matches!(
        sync(&app, &TeslaTokens::new(fresh_jwt("user"), "refresh")),
        Err(ServerError::Unauthorized(_))
    ));
}
