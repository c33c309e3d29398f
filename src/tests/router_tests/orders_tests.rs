use crate::domain::order::CombinedOrder;
use crate::errors::ServerError;
use crate::router::{handle, App, MAX_BODY_BYTES};
use crate::tests::utils::{body_json, combined, test_app, FakeVendor};
use astra::Body;
use http::{Method, Request};
use serde_json::{json, Value};
use std::sync::Arc;

fn ingest(app: &App, orders: &[CombinedOrder]) -> Value {
    let body = serde_json::to_vec(orders).unwrap();
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/orders/ingest")
        .header("Content-Type", "application/json")
        .body(Body::from(body))
        .unwrap();

    let resp = handle(req, app).expect("Failed to handle request");
    assert_eq!(resp.status(), 200);
    body_json(resp)
}

fn get(app: &App, uri: &str) -> Result<Value, ServerError> {
    let req = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    handle(req, app).map(body_json)
}

#[test]
fn first_ingest_records_baselines() {
    let (_dir, app) = test_app(Arc::new(FakeVendor::new("t", vec![])));

    let out = ingest(&app, &[combined("RN1", "BOOKED", json!({}))]);

    assert_eq!(out["report"]["baselines"], json!(["RN1"]));
    assert_eq!(out["report"]["appended"], json!(["RN1"]));
    assert_eq!(out["report"]["diffs"], json!({}));
    assert_eq!(out["timelines"][0]["reference_number"], json!("RN1"));
    assert_eq!(out["timelines"][0]["timeline"]["current_stage_index"], json!(0));
}

#[test]
fn history_route_returns_newest_first_change_log() {
    let (_dir, app) = test_app(Arc::new(FakeVendor::new("t", vec![])));

    ingest(&app, &[combined("RN1", "BOOKED", json!({}))]);
    // Only an ignored field changes: no snapshot.
    let out = ingest(&app, &[combined("RN1", "BOOKED", json!({"state": "noise"}))]);
    assert_eq!(out["report"]["appended"], json!([]));

    let out = ingest(&app, &[combined("RN1", "DELIVERED", json!({"state": "noise"}))]);
    assert_eq!(out["report"]["appended"], json!(["RN1"]));
    assert!(out["report"]["diffs"]["RN1"]["order.orderStatus"].is_object());

    let log = get(&app, "/api/orders/RN1/history").unwrap();
    let entries = log.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["kind"], json!("changes"));
    assert_eq!(entries[0]["changes"][0]["label"], json!("Order Status"));
    assert_eq!(entries[0]["changes"][0]["old_display"], json!("BOOKED"));
    assert_eq!(entries[0]["changes"][0]["new_display"], json!("DELIVERED"));
    assert_eq!(entries[1]["kind"], json!("baseline"));
}

#[test]
fn history_of_unknown_order_is_empty() {
    let (_dir, app) = test_app(Arc::new(FakeVendor::new("t", vec![])));
    assert_eq!(get(&app, "/api/orders/RN404/history").unwrap(), json!([]));
}

#[test]
fn timeline_route_uses_latest_snapshot() {
    let (_dir, app) = test_app(Arc::new(FakeVendor::new("t", vec![])));

    assert!(matches!(
        get(&app, "/api/orders/RN1/timeline"),
        Err(ServerError::NotFound)
    ));

    ingest(&app, &[combined("RN1", "BOOKED", json!({}))]);
    ingest(&app, &[combined("RN1", "DELIVERED", json!({}))]);

    let timeline = get(&app, "/api/orders/RN1/timeline").unwrap();
    assert_eq!(timeline["current_stage_index"], json!(4));
    assert_eq!(timeline["stages"][4]["id"], json!("delivered"));
    assert_eq!(timeline["stages"][1]["complete"], json!(false));
}

#[test]
fn malformed_body_is_bad_request() {
    let (_dir, app) = test_app(Arc::new(FakeVendor::new("t", vec![])));

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/orders/ingest")
        .body(Body::from("[{\"order\": {}}]"))
        .unwrap();

    assert!(matches!(handle(req, &app), Err(ServerError::BadRequest(_))));
}

#[test]
fn reference_numbers_in_paths_are_percent_decoded() {
    let (_dir, app) = test_app(Arc::new(FakeVendor::new("t", vec![])));

    ingest(&app, &[combined("RN 1", "BOOKED", json!({}))]);

    let log = get(&app, "/api/orders/RN%201/history").unwrap();
    assert_eq!(log.as_array().map(Vec::len), Some(1));
    assert!(get(&app, "/api/orders/RN%201/timeline").is_ok());
    assert!(matches!(
        get(&app, "/api/orders/RN%FF/history"),
        Err(ServerError::BadRequest(_))
    ));
}

#[test]
fn oversized_body_is_rejected() {
    let (_dir, app) = test_app(Arc::new(FakeVendor::new("t", vec![])));

    let body = vec![b' '; MAX_BODY_BYTES as usize + 1];
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/orders/ingest")
        .body(Body::from(body))
        .unwrap();

    match handle(req, &app) {
        Err(ServerError::BadRequest(msg)) => assert_eq!(msg, "request body too large"),
        other => panic!("expected BadRequest, got {:?}", other.map(|r| r.status())),
    }
}
