use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use ulid::Ulid;

use innkeep::config::Config;
use innkeep::http::{router, AppState};
use innkeep::notify::LogNotifier;
use innkeep::rate_limit::{FixedWindowLimiter, RateLimit};
use innkeep::tenant::TenantManager;

// ── Test infrastructure ──────────────────────────────────────

fn test_app(booking_rate: RateLimit) -> Router {
    let dir = std::env::temp_dir().join(format!("innkeep_http_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    let config = Config {
        data_dir: dir.clone(),
        root_domain: "stays.test".into(),
        booking_rate,
        ..Config::default()
    };
    router(AppState {
        tenants: Arc::new(TenantManager::new(dir, 1000, Arc::new(LogNotifier))),
        limiter: Arc::new(FixedWindowLimiter::new()),
        config: Arc::new(config),
    })
}

fn relaxed() -> RateLimit {
    RateLimit {
        window: Duration::from_secs(3600),
        max: 1000,
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value, Option<String>) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let retry_after = response
        .headers()
        .get(header::RETRY_AFTER)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body, retry_after)
}

fn json_request(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
}

fn post(uri: &str, body: Value) -> Request<Body> {
    json_request("POST", uri)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn admin(method: &str, uri: &str, tenant: &str, role: &str, body: Option<Value>) -> Request<Body> {
    let builder = json_request(method, uri)
        .header("x-tenant", tenant)
        .header("x-admin-role", role);
    match body {
        Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn public_get(uri: &str, host: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::HOST, host)
        .body(Body::empty())
        .unwrap()
}

fn booking(room_id: &str, from: &str, to: &str, ip: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/booking-request")
        .header(header::HOST, "seaside.stays.test")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", ip)
        .body(Body::from(
            json!({
                "checkInDate": from,
                "checkOutDate": to,
                "roomId": room_id,
                "guestName": "Ada Guest",
                "guestEmail": "ada@example.test",
                "guestCount": 2,
            })
            .to_string(),
        ))
        .unwrap()
}

/// Onboard "seaside" and create one room. Returns the room id.
async fn seaside(app: &Router, auto_confirm: bool) -> String {
    let (status, body, _) = send(
        app,
        post(
            "/api/onboarding",
            json!({
                "slug": "Seaside",
                "defaultLocale": "en",
                "contactEmail": "host@seaside.test",
                "autoConfirmBookings": auto_confirm,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["tenant"]["slug"], "seaside");
    assert_eq!(body["tenant"]["autoConfirmBookings"], auto_confirm);

    let (status, body, _) = send(
        app,
        admin(
            "POST",
            "/api/admin/rooms",
            "seaside",
            "ADMIN",
            Some(json!({ "name": "Dune", "description": "Sea view", "maxGuests": 2 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["room"]["isActive"], true);
    body["room"]["id"].as_str().unwrap().to_string()
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn health_needs_no_tenant() {
    let app = test_app(relaxed());
    let (status, body, _) = send(&app, public_get("/health", "stays.test")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn booking_flow_pending_then_confirm() {
    let app = test_app(relaxed());
    let room = seaside(&app, false).await;

    let (status, body, _) = send(&app, booking(&room, "2025-06-01", "2025-06-05", "10.0.0.1")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "PENDING");
    let id = body["id"].as_str().unwrap().to_string();

    let (status, body, _) = send(
        &app,
        admin("POST", &format!("/api/admin/reservations/{id}/confirm"), "seaside", "STAFF", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body, json!({ "id": id, "status": "CONFIRMED" }));

    let (status, body, _) = send(
        &app,
        admin("GET", "/api/admin/reservations?status=confirmed", "seaside", "STAFF", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let listed = body["reservations"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["checkInDate"], "2025-06-01");
    assert_eq!(listed[0]["checkOutDate"], "2025-06-05");
}

#[tokio::test]
async fn overlapping_request_conflicts_touching_succeeds() {
    let app = test_app(relaxed());
    let room = seaside(&app, true).await;

    let (status, body, _) = send(&app, booking(&room, "2025-06-01", "2025-06-05", "10.0.0.1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CONFIRMED");

    let (status, body, _) = send(&app, booking(&room, "2025-06-04", "2025-06-08", "10.0.0.2")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "These dates are no longer available.");

    let (status, _, _) = send(&app, booking(&room, "2025-06-05", "2025-06-08", "10.0.0.3")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn honeypot_and_bad_dates_are_rejected() {
    let app = test_app(relaxed());
    let room = seaside(&app, false).await;

    let req = Request::builder()
        .method("POST")
        .uri("/api/booking-request")
        .header("x-tenant", "seaside")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "checkInDate": "2025-06-01",
                "checkOutDate": "2025-06-05",
                "roomId": room,
                "guestName": "Bot",
                "guestEmail": "bot@example.test",
                "company": "ACME",
            })
            .to_string(),
        ))
        .unwrap();
    let (status, body, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Request blocked.");

    let (status, body, _) = send(&app, booking(&room, "2025-06-05", "2025-06-05", "10.0.0.1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid date range.");

    let (status, _, _) = send(&app, booking(&room, "June 1st", "2025-06-05", "10.0.0.1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_room_is_not_found() {
    let app = test_app(relaxed());
    seaside(&app, false).await;

    let (status, body, _) = send(
        &app,
        booking(&Ulid::new().to_string(), "2025-06-01", "2025-06-05", "10.0.0.1"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Room not found.");

    let (status, _, _) = send(&app, booking("not-a-ulid", "2025-06-01", "2025-06-05", "10.0.0.1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn booking_requests_are_rate_limited_per_ip() {
    let app = test_app(RateLimit {
        window: Duration::from_secs(3600),
        max: 2,
    });
    let room = seaside(&app, false).await;

    for day in ["01", "02"] {
        let (status, _, _) = send(
            &app,
            booking(&room, &format!("2025-06-{day}"), "2025-06-10", "203.0.113.9"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body, retry_after) =
        send(&app, booking(&room, "2025-06-03", "2025-06-10", "203.0.113.9")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["error"].as_str().unwrap().starts_with("Too many requests"));
    let retry_after: u64 = retry_after.unwrap().parse().unwrap();
    assert!((1..=3600).contains(&retry_after));

    // Another client is counted separately.
    let (status, _, _) = send(&app, booking(&room, "2025-06-03", "2025-06-10", "203.0.113.10")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn malformed_guest_details_do_not_use_quota() {
    let app = test_app(RateLimit {
        window: Duration::from_secs(3600),
        max: 2,
    });
    let room = seaside(&app, false).await;

    let bad_guests = [
        json!({ "guestName": "Ada Guest", "guestEmail": "not-an-email" }),
        json!({ "guestName": "   ", "guestEmail": "ada@example.test" }),
        json!({ "guestName": "Ada Guest", "guestEmail": "ada@example.test", "guestCount": 0 }),
        json!({ "guestName": "Ada Guest", "guestEmail": "ada@example.test", "message": "x".repeat(10_000) }),
    ];
    for guest in bad_guests {
        let mut payload = json!({
            "checkInDate": "2025-06-01",
            "checkOutDate": "2025-06-05",
            "roomId": room,
        });
        for (k, v) in guest.as_object().unwrap() {
            payload[k] = v.clone();
        }
        let req = Request::builder()
            .method("POST")
            .uri("/api/booking-request")
            .header(header::HOST, "seaside.stays.test")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", "198.51.100.7")
            .body(Body::from(payload.to_string()))
            .unwrap();
        let (status, body, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    }

    // A stay longer than a year is refused before the limiter too.
    let (status, _, _) = send(&app, booking(&room, "2025-01-01", "2026-06-01", "198.51.100.7")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body, _) = send(&app, booking(&room, "2025-06-01", "2025-06-05", "198.51.100.7")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (status, _, _) = send(&app, booking(&room, "2025-07-01", "2025-07-05", "198.51.100.7")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&app, booking(&room, "2025-08-01", "2025-08-05", "198.51.100.7")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn unresolved_and_unknown_tenants() {
    let app = test_app(relaxed());

    let (status, body, _) = send(&app, public_get("/api/rooms", "stays.test")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Tenant not resolved.");

    let (status, _, _) = send(&app, public_get("/api/rooms", "app.stays.test")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body, _) = send(&app, public_get("/api/rooms", "nowhere.stays.test")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Tenant not found.");
}

#[tokio::test]
async fn admin_requires_role_headers() {
    let app = test_app(relaxed());
    seaside(&app, false).await;

    let req = Request::builder()
        .uri("/api/admin/reservations")
        .header("x-tenant", "seaside")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(
        &app,
        admin("GET", "/api/admin/reservations", "seaside", "GUEST", None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body, _) = send(
        &app,
        admin(
            "POST",
            "/api/admin/booking-settings",
            "seaside",
            "STAFF",
            Some(json!({ "autoConfirmBookings": true })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Insufficient role.");

    let (status, body, _) = send(
        &app,
        admin(
            "POST",
            "/api/admin/booking-settings",
            "seaside",
            "OWNER",
            Some(json!({ "autoConfirmBookings": true })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "autoConfirmBookings": true }));
}

#[tokio::test]
async fn availability_reflects_blocks() {
    let app = test_app(relaxed());
    let dune = seaside(&app, false).await;
    let (_, body, _) = send(
        &app,
        admin(
            "POST",
            "/api/admin/rooms",
            "seaside",
            "ADMIN",
            Some(json!({ "name": "Marram", "description": "Garden side" })),
        ),
    )
    .await;
    let marram = body["room"]["id"].as_str().unwrap().to_string();

    let (status, body, _) = send(
        &app,
        admin(
            "POST",
            "/api/admin/availability/blocks",
            "seaside",
            "STAFF",
            Some(json!({
                "roomId": dune,
                "startDate": "2025-07-10",
                "endDate": "2025-07-12",
                "reason": "painting",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["block"]["roomId"], dune.as_str());

    let host = "seaside.stays.test";
    let (status, body, _) = send(
        &app,
        public_get("/api/availability?from=2025-07-01&to=2025-08-01", host),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["from"], "2025-07-01");
    assert_eq!(body["unavailableDates"], json!([]));

    let (_, body, _) = send(
        &app,
        public_get(&format!("/api/availability?from=2025-07-01&to=2025-08-01&roomId={dune}"), host),
    )
    .await;
    assert_eq!(body["unavailableDates"], json!(["2025-07-10", "2025-07-11"]));

    let (_, body, _) = send(
        &app,
        public_get("/api/rooms/availability?from=2025-07-09&to=2025-07-13", host),
    )
    .await;
    let rooms = body["rooms"].as_array().unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0]["id"], marram.as_str());

    let (status, body, _) = send(&app, public_get("/api/availability?from=2025-07-05&to=2025-07-01", host)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid date range.");
}

#[tokio::test]
async fn cancel_is_idempotent_over_http() {
    let app = test_app(relaxed());
    let room = seaside(&app, false).await;
    let (_, body, _) = send(&app, booking(&room, "2025-06-01", "2025-06-05", "10.0.0.1")).await;
    let id = body["id"].as_str().unwrap().to_string();
    let uri = format!("/api/admin/reservations/{id}/cancel");

    for _ in 0..2 {
        let (status, body, _) = send(&app, admin("POST", &uri, "seaside", "STAFF", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "CANCELLED");
    }

    let (status, _, _) = send(
        &app,
        admin("POST", &format!("/api/admin/reservations/{id}/confirm"), "seaside", "STAFF", None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn last_room_delete_is_refused() {
    let app = test_app(relaxed());
    let room = seaside(&app, false).await;
    let (status, body, _) = send(
        &app,
        admin("DELETE", &format!("/api/admin/rooms/{room}"), "seaside", "ADMIN", None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cannot delete the last room.");
}

#[tokio::test]
async fn slug_cannot_be_taken_twice() {
    let app = test_app(relaxed());
    seaside(&app, false).await;
    let (status, body, _) = send(
        &app,
        post("/api/onboarding", json!({ "slug": "seaside", "defaultLocale": "fr" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Slug is already taken.");
}

#[tokio::test]
async fn malformed_payload_is_bad_request() {
    let app = test_app(relaxed());
    let req = Request::builder()
        .method("POST")
        .uri("/api/onboarding")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request payload.");
}
