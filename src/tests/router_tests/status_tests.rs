use crate::router::handle;
use crate::tests::utils::{body_json, test_app, FakeVendor};
use astra::Body;
use http::{Method, Request};
use serde_json::json;
use std::sync::Arc;

#[test]
fn status_endpoint_is_alive() {
    let (_dir, app) = test_app(Arc::new(FakeVendor::new("t", vec![])));

    let req = Request::builder()
        .method(Method::GET)
        .uri("/api/status")
        .body(Body::empty())
        .unwrap();

    let resp = handle(req, &app).expect("Failed to handle request");
    assert_eq!(resp.status(), 200);
    assert_eq!(body_json(resp), json!({"message": "API is alive!"}));
}

#[test]
fn unknown_route_is_not_found() {
    let (_dir, app) = test_app(Arc::new(FakeVendor::new("t", vec![])));

    for (method, uri) in [
        (Method::GET, "/nope"),
        (Method::DELETE, "/api/status"),
        (Method::GET, "/api/orders/RN1"),
        (Method::GET, "/api/orders/sync"),
    ] {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        assert!(matches!(
            handle(req, &app),
            Err(crate::errors::ServerError::NotFound)
        ));
    }
}

#[test]
fn errors_render_as_json_with_status() {
    use crate::errors::ServerError;
    use crate::responses::error_to_response;

    let resp = error_to_response(ServerError::Unauthorized("expired".into()));
    assert_eq!(resp.status(), 401);
    assert_eq!(body_json(resp), json!({"error": "Unauthorized: expired"}));

    assert_eq!(error_to_response(ServerError::NotFound).status(), 404);
    assert_eq!(error_to_response(ServerError::Upstream("x".into())).status(), 502);
    assert_eq!(error_to_response(ServerError::DbError("x".into())).status(), 500);
}
