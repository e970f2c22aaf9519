use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::FixedOffset;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use crate::appointments::MemoryAppointmentStore;
use crate::blob::testing::FailingBlobStorage;
use crate::blob::{BlobStorage, LocalBlobStorage};
use crate::clock::testing::FixedClock;
use crate::concerns::MemoryConcernStore;
use crate::config::{Config, OfficeConfig};
use crate::identity::{CapturingSender, MemoryIdentityStore};
use crate::models::{AppState, Backends};
use crate::profile::MemoryProfileStore;
use crate::updates::{MemoryUpdateStore, UpdatePost};

struct TestApp {
    app: Router,
    sms: Arc<CapturingSender>,
    updates: Arc<MemoryUpdateStore>,
    upload_dir: PathBuf,
}

fn test_config(upload_dir: PathBuf) -> Config {
    Config {
        database_url: None,
        bind_addr: "127.0.0.1:0".into(),
        session_ttl_hours: 24,
        request_timeout: Duration::from_secs(20),
        otp_ttl_minutes: 5,
        office_offset: FixedOffset::east_opt(8 * 3600).unwrap(),
        default_country_code: "63".into(),
        upload_dir,
        public_base_url: "http://localhost:8080".into(),
        office: OfficeConfig {
            name: "District Office".into(),
            address: "1 Capitol Rd".into(),
            phone: "(02) 555-0100".into(),
        },
    }
}

fn test_app_with_blobs(blobs: Option<Arc<dyn BlobStorage>>) -> TestApp {
    let upload_dir = std::env::temp_dir().join(format!("civic-desk-http-{}", Uuid::new_v4()));
    let cfg = test_config(upload_dir.clone());
    let sms = Arc::new(CapturingSender::default());
    let updates = Arc::new(MemoryUpdateStore::new());
    let blobs = blobs.unwrap_or_else(|| {
        Arc::new(LocalBlobStorage::new(&cfg.upload_dir, &cfg.public_base_url))
    });

    let state = AppState::assemble(
        &cfg,
        Backends {
            identity: Arc::new(MemoryIdentityStore::new()),
            appointments: Arc::new(MemoryAppointmentStore::new()),
            profiles: Arc::new(MemoryProfileStore::new()),
            concerns: Arc::new(MemoryConcernStore::new()),
            updates: updates.clone(),
            blobs,
            sms: sms.clone(),
            // 10:00 local on Mar 1
            clock: Arc::new(FixedClock::at("2025-03-01T02:00:00Z")),
        },
    );

    TestApp {
        app: super::router(state, &cfg.upload_dir),
        sms,
        updates,
        upload_dir,
    }
}

fn test_app() -> TestApp {
    test_app_with_blobs(None)
}

impl TestApp {
    async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header("Authorization", format!("Bearer {t}"));
        }
        let req = match body {
            Some(v) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// OTP round trip; returns the sign-in payload.
    async fn sign_in(&self, phone: &str, device: &str) -> Value {
        let (status, issued) = self
            .call("POST", "/api/v1/auth/otp/request", None, Some(json!({ "phoneNumber": phone })))
            .await;
        assert_eq!(status, StatusCode::OK, "{issued}");
        let challenge = issued["data"]["challengeId"].as_str().unwrap().to_string();

        let (status, signed) = self
            .call(
                "POST",
                "/api/v1/auth/otp/verify",
                None,
                Some(json!({
                    "challengeId": challenge,
                    "code": self.sms.last_code(),
                    "deviceId": device,
                    "deviceName": "Test Phone",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{signed}");
        signed["data"].clone()
    }

    async fn token(&self) -> String {
        self.sign_in("0917 123 4567", "device-1").await["accessToken"]
            .as_str()
            .unwrap()
            .to_string()
    }
}

fn booking(time: &str) -> Value {
    json!({
        "type": "Document Processing",
        "purpose": "Passport renewal",
        "date": "2025-03-02",
        "time": time,
        "isVirtual": false,
    })
}

#[tokio::test]
async fn anonymous_requests_get_auth_required() {
    let t = test_app();
    for (method, uri) in [
        ("GET", "/api/v1/appointments"),
        ("GET", "/api/v1/profile"),
        ("GET", "/api/v1/concerns"),
        ("GET", "/api/v1/home"),
        ("GET", "/api/v1/auth/me"),
    ] {
        let (status, body) = t.call(method, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["error"]["code"], "AUTH_REQUIRED");
    }

    let (status, _) = t.call("GET", "/api/v1/appointments", Some("made-up-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn office_info_and_options_are_public() {
    let t = test_app();
    let (status, body) = t.call("GET", "/api/v1/office", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "District Office");
    assert_eq!(body["data"]["officeHours"][1]["closes"], "4:30 PM");

    let (status, body) = t.call("GET", "/api/v1/appointments/options", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["timeSlots"].as_array().unwrap().len(), 13);
    assert_eq!(body["data"]["types"][1]["label"], "Document Processing");
}

#[tokio::test]
async fn first_sign_in_is_a_new_user_until_the_profile_exists() {
    let t = test_app();
    let signed = t.sign_in("09171234567", "device-1").await;
    assert_eq!(signed["isNewUser"], true);
    assert_eq!(signed["hasPin"], false);
    let token = signed["accessToken"].as_str().unwrap();

    let (status, body) = t
        .call(
            "PUT",
            "/api/v1/profile",
            Some(token),
            Some(json!({
                "firstName": "Ana",
                "lastName": "Reyes",
                "gender": "Female",
                "address": "45 Bonifacio St",
                "barangay": "San Roque",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let again = t.sign_in("09171234567", "device-1").await;
    assert_eq!(again["isNewUser"], false);
    assert_eq!(again["userId"], signed["userId"]);

    let (_, me) = t.call("GET", "/api/v1/auth/me", Some(token), None).await;
    assert_eq!(me["data"]["account"]["phoneNumber"], "+639171234567");
    assert_eq!(me["data"]["profileComplete"], true);
}

#[tokio::test]
async fn profile_validation_reports_the_field() {
    let t = test_app();
    let token = t.token().await;
    let (status, body) = t
        .call(
            "PUT",
            "/api/v1/profile",
            Some(&token),
            Some(json!({
                "firstName": "Ana",
                "lastName": "Reyes",
                "email": "ana@",
                "gender": "Female",
                "address": "45 Bonifacio St",
                "barangay": "San Roque",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["field"], "email");
    assert_eq!(body["error"]["message"], "Please enter a valid email address.");
}

#[tokio::test]
async fn booking_lifecycle_over_http() {
    let t = test_app();
    let token = t.token().await;
    let tok = Some(token.as_str());

    let (status, created) = t.call("POST", "/api/v1/appointments", tok, Some(booking("9:00 AM"))).await;
    assert_eq!(status, StatusCode::OK, "{created}");
    assert_eq!(created["data"]["status"], "Pending");
    assert_eq!(created["data"]["type"], "Document Processing");
    assert_eq!(created["data"]["version"], 1);
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let mut moved = booking("10:00 AM");
    moved["expectedVersion"] = json!(1);
    let (status, resched) = t
        .call("PUT", &format!("/api/v1/appointments/{id}"), tok, Some(moved))
        .await;
    assert_eq!(status, StatusCode::OK, "{resched}");
    assert_eq!(resched["data"]["time"], "10:00 AM");
    assert_eq!(resched["data"]["status"], "Pending");

    let (_, home) = t.call("GET", "/api/v1/home", tok, None).await;
    assert_eq!(home["data"]["upcoming"].as_array().unwrap().len(), 1);
    assert_eq!(home["data"]["displayName"], Value::Null);

    let (status, cancelled) = t
        .call("POST", &format!("/api/v1/appointments/{id}/cancel"), tok, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["data"]["status"], "Cancelled");
    assert!(cancelled["data"]["cancelledAt"].is_string());

    let (status, again) = t
        .call("POST", &format!("/api/v1/appointments/{id}/cancel"), tok, None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(again["error"]["code"], "TERMINAL_STATE");

    let (status, _) = t
        .call("PUT", &format!("/api/v1/appointments/{id}"), tok, Some(booking("11:00 AM")))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, listing) = t.call("GET", "/api/v1/appointments", tok, None).await;
    assert!(listing["data"]["upcoming"].as_array().unwrap().is_empty());
    assert_eq!(listing["data"]["past"][0]["id"], id.as_str());
}

#[tokio::test]
async fn booking_errors_map_to_envelopes() {
    let t = test_app();
    let token = t.token().await;
    let tok = Some(token.as_str());

    let mut no_type = booking("9:00 AM");
    no_type["type"] = Value::Null;
    let (status, body) = t.call("POST", "/api/v1/appointments", tok, Some(no_type)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "type");
    assert_eq!(body["error"]["message"], "Please select an appointment type");

    let mut past = booking("9:00 AM");
    past["date"] = json!("2025-02-28");
    let (_, body) = t.call("POST", "/api/v1/appointments", tok, Some(past)).await;
    assert_eq!(body["error"]["field"], "date");

    let (_, created) = t.call("POST", "/api/v1/appointments", tok, Some(booking("1:00 PM"))).await;
    let id = created["data"]["id"].as_str().unwrap().to_string();
    let (status, body) = t
        .call("POST", &format!("/api/v1/appointments/{id}/cancel?expectedVersion=7"), tok, None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "STALE_VERSION");

    let (status, body) = t
        .call("GET", &format!("/api/v1/appointments/{}", Uuid::new_v4()), tok, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn appointments_are_invisible_to_other_users() {
    let t = test_app();
    let alice = t.sign_in("09171111111", "a").await["accessToken"].as_str().unwrap().to_string();
    let bob = t.sign_in("09172222222", "b").await["accessToken"].as_str().unwrap().to_string();

    let (_, created) = t.call("POST", "/api/v1/appointments", Some(&alice), Some(booking("9:00 AM"))).await;
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = t.call("GET", &format!("/api/v1/appointments/{id}"), Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = t
        .call("POST", &format!("/api/v1/appointments/{id}/cancel"), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, listing) = t.call("GET", "/api/v1/appointments", Some(&bob), None).await;
    assert!(listing["data"]["upcoming"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn pin_login_and_logout() {
    let t = test_app();
    let signed = t.sign_in("09171234567", "device-1").await;
    let token = signed["accessToken"].as_str().unwrap().to_string();

    let (status, body) = t
        .call("POST", "/api/v1/auth/pin", Some(&token), Some(json!({ "pin": "12345", "confirmPin": "12345" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Please enter a valid 6-digit PIN.");

    let (status, _) = t
        .call("POST", "/api/v1/auth/pin", Some(&token), Some(json!({ "pin": "246810", "confirmPin": "246810" })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let login = |device: &'static str| {
        json!({ "phoneNumber": "0917-123-4567", "pin": "246810", "deviceId": device })
    };
    let (status, body) = t.call("POST", "/api/v1/auth/pin/login", None, Some(login("device-2"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "DEVICE_NOT_BOUND");

    let (status, body) = t.call("POST", "/api/v1/auth/pin/login", None, Some(login("device-1"))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["hasPin"], true);
    let pin_token = body["data"]["accessToken"].as_str().unwrap().to_string();

    let (status, _) = t.call("POST", "/api/v1/auth/logout", Some(&pin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = t.call("GET", "/api/v1/auth/me", Some(&pin_token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // the OTP session is independent of the PIN session
    let (status, _) = t.call("GET", "/api/v1/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn concerns_with_evidence() {
    let t = test_app();
    let token = t.token().await;
    let tok = Some(token.as_str());

    let (status, body) = t
        .call(
            "POST",
            "/api/v1/concerns",
            tok,
            Some(json!({
                "title": "Clogged drain",
                "description": "Flooding after light rain",
                "location": "Purok 3",
                "category": "Water",
                "evidence": { "data": "data:image/png;base64,iVBORw0KGgo=", "contentType": "image/png" },
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["concern"]["status"], "Pending");
    assert_eq!(body["data"]["evidenceDropped"], false);
    let url = body["data"]["concern"]["evidenceUrl"].as_str().unwrap().to_string();
    assert!(url.starts_with("http://localhost:8080/uploads/concerns/"));

    // stored file is served back under /uploads
    let path = url.trim_start_matches("http://localhost:8080");
    let response = t
        .app
        .clone()
        .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, body) = t
        .call(
            "POST",
            "/api/v1/concerns",
            tok,
            Some(json!({
                "title": "Broken light",
                "description": "Dark at night",
                "location": "Plaza",
                "evidence": { "data": "%%% not base64 %%%" },
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_IMAGE");

    let (_, list) = t.call("GET", "/api/v1/concerns", tok, None).await;
    assert_eq!(list["data"].as_array().unwrap().len(), 1);

    let _ = tokio::fs::remove_dir_all(&t.upload_dir).await;
}

#[tokio::test]
async fn failed_evidence_upload_can_be_skipped() {
    let t = test_app_with_blobs(Some(Arc::new(FailingBlobStorage)));
    let token = t.token().await;
    let concern = |skip: bool| {
        json!({
            "title": "Uncollected garbage",
            "description": "Three days now",
            "location": "Block 7",
            "category": "Garbage",
            "evidence": { "data": "aGVsbG8=", "contentType": "image/jpeg" },
            "continueWithoutEvidence": skip,
        })
    };

    let (status, body) = t.call("POST", "/api/v1/concerns", Some(&token), Some(concern(false))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "UPLOAD_FAILED");

    let (status, body) = t.call("POST", "/api/v1/concerns", Some(&token), Some(concern(true))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["evidenceDropped"], true);
    assert_eq!(body["data"]["concern"]["evidenceUrl"], Value::Null);
}

async fn save_basic_profile(t: &TestApp, token: &str) {
    let (status, body) = t
        .call(
            "PUT",
            "/api/v1/profile",
            Some(token),
            Some(json!({
                "firstName": "Ana",
                "lastName": "Reyes",
                "gender": "Female",
                "address": "45 Bonifacio St",
                "barangay": "San Roque",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn phone_sized_photos_are_accepted() {
    let t = test_app();
    let token = t.token().await;
    save_basic_profile(&t, &token).await;

    let mut photo = vec![0x5Au8; 3 * 1024 * 1024];
    photo[..3].copy_from_slice(&[0xFF, 0xD8, 0xFF]);
    let upload = json!({ "data": STANDARD.encode(&photo), "contentType": "image/jpeg" });

    let (status, body) = t.call("PUT", "/api/v1/profile/picture", Some(&token), Some(upload.clone())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let url = body["data"]["profilePictureUrl"].as_str().unwrap();
    assert!(url.starts_with("http://localhost:8080/uploads/profile_pictures/"));

    let (status, body) = t
        .call(
            "POST",
            "/api/v1/concerns",
            Some(&token),
            Some(json!({
                "title": "Pothole",
                "description": "Deep enough to break an axle",
                "location": "Rizal Ave",
                "category": "Road",
                "evidence": upload,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["data"]["concern"]["evidenceUrl"].is_string());

    let _ = tokio::fs::remove_dir_all(&t.upload_dir).await;
}

#[tokio::test]
async fn oversized_bodies_get_an_error_envelope() {
    let t = test_app();
    let token = t.token().await;
    save_basic_profile(&t, &token).await;

    let huge = "A".repeat(15 * 1024 * 1024);
    let (status, body) = t
        .call("PUT", "/api/v1/profile/picture", Some(&token), Some(json!({ "data": huge })))
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn malformed_requests_get_an_error_envelope() {
    let t = test_app();
    let token = t.token().await;
    let tok = Some(token.as_str());

    let (status, body) = t.call("GET", "/api/v1/appointments/not-a-uuid", tok, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MALFORMED_REQUEST");
    assert!(body["error"]["message"].is_string());

    let mut bad = booking("9:00 AM");
    bad["isVirtual"] = json!("yes");
    let (status, body) = t.call("POST", "/api/v1/appointments", tok, Some(bad)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "MALFORMED_REQUEST");

    let (_, created) = t.call("POST", "/api/v1/appointments", tok, Some(booking("9:00 AM"))).await;
    let id = created["data"]["id"].as_str().unwrap().to_string();
    let (status, body) = t
        .call("POST", &format!("/api/v1/appointments/{id}/cancel?expectedVersion=one"), tok, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MALFORMED_REQUEST");

    // JSON body without a JSON content type
    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/otp/request")
        .body(Body::from(r#"{"phoneNumber":"09171234567"}"#))
        .unwrap();
    let response = t.app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], "UNSUPPORTED_MEDIA_TYPE");
}

#[tokio::test]
async fn updates_feed_is_public_and_newest_first() {
    let t = test_app();
    let (status, body) = t.call("GET", "/api/v1/updates", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());

    t.updates
        .publish(UpdatePost {
            id: Uuid::new_v4(),
            title: Some("Free vaccination drive".into()),
            description: None,
            published_at: Some("2025-02-20T01:00:00Z".parse().unwrap()),
            date_label: None,
        })
        .await;
    t.updates
        .publish(UpdatePost {
            id: Uuid::new_v4(),
            title: Some("Scholarship applications open".into()),
            description: Some("Bring your report card.".into()),
            published_at: Some("2025-02-28T01:00:00Z".parse().unwrap()),
            date_label: None,
        })
        .await;

    let (status, body) = t.call("GET", "/api/v1/updates", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let feed = body["data"].as_array().unwrap();
    assert_eq!(feed.len(), 2);
    assert_eq!(feed[0]["title"], "Scholarship applications open");
    assert_eq!(feed[0]["date"], "February 28, 2025");
    assert_eq!(feed[1]["description"], "No description");
}
