//! In-process tests for the HTTP routes.
//!
//! The router is driven with `tower::ServiceExt::oneshot`; no socket is bound.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt; // oneshot
use vehicle_registry::api::{build_router, AppState};
use vehicle_registry::Registry;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_state() -> AppState {
    AppState::new(Registry::open_in_memory().unwrap())
}

async fn call(state: &AppState, req: Request<Body>) -> (StatusCode, Value) {
    let resp = build_router(state.clone()).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

fn send(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn transfer(vehicle: i64, user: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("/api/vehicles/{}/transfer", vehicle))
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header("x-user-email", user);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Two owners, one plate each, a clerk, and one vehicle on the first owner's plate
async fn seeded() -> (AppState, i64, Value) {
    let state = make_state();

    let (_, o1) = call(&state, send("POST", "/api/owners", json!({
        "names": "Owner One", "nationalId": "NID-1", "phone": "0788", "address": "Kigali"
    }))).await;
    let (_, o2) = call(&state, send("POST", "/api/owners", json!({
        "names": "Owner Two", "nationalId": "NID-2", "phone": "0789", "address": "Huye"
    }))).await;
    let o1 = o1["data"]["id"].as_i64().unwrap();
    let o2 = o2["data"]["id"].as_i64().unwrap();

    let (_, p1) = call(&state, send("POST", &format!("/api/owners/{}/plate-numbers", o1), json!({
        "plateNumber": "RAA111A"
    }))).await;
    let (_, p2) = call(&state, send("POST", &format!("/api/owners/{}/plate-numbers", o2), json!({
        "plateNumber": "RAB222B"
    }))).await;

    call(&state, send("POST", "/api/users", json!({
        "names": "Clerk", "email": "clerk@registry.rw", "role": "STAFF"
    }))).await;

    let (status, vehicle) = call(&state, send("POST", "/api/vehicles", json!({
        "chassisNumber": "CH-100",
        "manufactureCompany": "Toyota",
        "manufactureYear": 2020,
        "modelName": "RAV4",
        "price": 20000.0,
        "ownerId": o1,
        "plateNumberId": p1["data"]["id"]
    }))).await;
    assert_eq!(status, StatusCode::CREATED, "{}", vehicle);

    let target = json!({
        "newOwnerId": o2,
        "newPlateNumberId": p2["data"]["id"],
        "transferPrice": 5000.0
    });
    (state, vehicle["data"]["id"].as_i64().unwrap(), target)
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_ok() {
    let (status, body) = call(&make_state(), get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"], "OK");
}

#[tokio::test]
async fn registered_vehicle_is_readable() {
    let (state, vehicle, _) = seeded().await;

    let (status, body) = call(&state, get(&format!("/api/vehicles/{}", vehicle))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["chassisNumber"], "CH-100");
    assert_eq!(body["data"]["currentPlateNumber"]["status"], "IN_USE");
    assert_eq!(body["data"]["currentOwner"]["nationalId"], "NID-1");
}

#[tokio::test]
async fn transfer_requires_acting_user_header() {
    let (state, vehicle, target) = seeded().await;

    let (status, body) = call(&state, transfer(vehicle, None, target)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "INVALID_INPUT");
}

#[tokio::test]
async fn transfer_then_history() {
    let (state, vehicle, target) = seeded().await;

    let (status, body) = call(&state, transfer(vehicle, Some("clerk@registry.rw"), target.clone())).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["currentPlateNumber"]["plateNumber"], "RAB222B");
    assert_eq!(body["data"]["currentPrice"], 5000.0);

    let (status, body) = call(&state, get(&format!("/api/vehicles/{}/ownership-history", vehicle))).await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["transferType"], "OWNERSHIP_AND_PLATE_TRANSFER");
    assert_eq!(entries[0]["previousPlateNumber"], "RAA111A");
    assert_eq!(entries[0]["transferredBy"], "clerk@registry.rw");

    // Same target again: the plate is now IN_USE
    let (status, body) = call(&state, transfer(vehicle, Some("clerk@registry.rw"), target)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "CONFLICT");
}

#[tokio::test]
async fn unknown_records_map_to_404() {
    let (state, vehicle, target) = seeded().await;

    let (status, body) = call(&state, get("/api/vehicles/999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "NOT_FOUND");

    let (status, _) = call(&state, transfer(vehicle, Some("ghost@registry.rw"), target)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_owner_maps_to_409() {
    let (state, _, _) = seeded().await;

    let (status, body) = call(&state, send("POST", "/api/owners", json!({
        "names": "Impostor", "nationalId": "NID-1", "phone": "0700", "address": "Nowhere"
    }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn search_by_each_key() {
    let (state, vehicle, _) = seeded().await;

    for query in ["chassisNumber=CH-100", "plateNumber=RAA111A", "nationalId=NID-1"] {
        let (status, body) = call(&state, get(&format!("/api/vehicles/search?{}", query))).await;
        assert_eq!(status, StatusCode::OK, "{}", query);
        assert_eq!(body["data"][0]["id"], vehicle, "{}", query);
    }

    let (status, body) = call(&state, get("/api/vehicles/search?chassisNumber=NOPE")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());

    let (status, _) = call(&state, get("/api/vehicles/search")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn owner_contact_update_and_plate_listing() {
    let (state, _, _) = seeded().await;

    let (status, body) = call(&state, send("PATCH", "/api/owners/1", json!({ "phone": "0722000000" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["phone"], "0722000000");
    assert_eq!(body["data"]["nationalId"], "NID-1");

    let (status, body) = call(&state, get("/api/owners/1/plate-numbers")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["plateNumber"], "RAA111A");

    let (status, body) = call(&state, get("/api/owners")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn owner_search_by_national_id_or_phone() {
    let (state, _, _) = seeded().await;

    let (status, body) = call(&state, get("/api/owners/search?q=NID-2")).await;
    assert_eq!(status, StatusCode::OK);
    let owners = body["data"].as_array().unwrap();
    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0]["names"], "Owner Two");

    let (_, body) = call(&state, get("/api/owners/search?q=078")).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, body) = call(&state, get("/api/owners/search")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "INVALID_INPUT");
}

#[tokio::test]
async fn integrity_report_is_clean() {
    let (state, _, _) = seeded().await;

    let (status, body) = call(&state, get("/api/integrity")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["vehiclesChecked"], 1);
    assert!(body["data"]["breaches"].as_array().unwrap().is_empty());
}
