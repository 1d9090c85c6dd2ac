//! Shared fixtures for the integration tests: a config pointing every vendor
//! at one mock server, and the full router over the in-memory store.
#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::MockServer;

use lendwise_api::config::Config;
use lendwise_api::handlers::AppState;
use lendwise_api::models::{Role, User};
use lendwise_api::router::{api_routes, build_app};
use lendwise_api::storage::{MemoryStorage, Storage};

/// Helper function to create test config
pub fn create_test_config(vendor_base_url: String) -> Config {
    Config {
        port: 8080,
        database_url: None,
        verification_base_url: vendor_base_url.clone(),
        verification_client_id: "test_client".to_string(),
        verification_client_secret: "test_secret".to_string(),
        kyc_client_id: "test_kyc_client".to_string(),
        kyc_client_secret: "test_kyc_secret".to_string(),
        verification_api_version: "2023-12-18".to_string(),
        payment_base_url: vendor_base_url.clone(),
        payment_client_id: "test_pg_client".to_string(),
        payment_client_secret: "test_pg_secret".to_string(),
        payment_api_version: "2023-08-01".to_string(),
        payment_webhook_secret: None,
        bureau_base_url: vendor_base_url,
        bureau_api_key: "test_bureau_key".to_string(),
        backend_url: "https://api.lendwise.test".to_string(),
        referral_bonus_increment: 100,
        referral_once_per_user: true,
        subscription_days: 30,
        session_ttl_hours: 1,
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub vendor: MockServer,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with(tweak: impl FnOnce(&mut Config)) -> TestApp {
    let vendor = MockServer::start().await;
    let mut config = create_test_config(vendor.uri());
    tweak(&mut config);

    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let state = Arc::new(AppState::new(config, storage));
    let router = build_app(state.clone(), api_routes());

    TestApp {
        router,
        state,
        vendor,
    }
}

impl TestApp {
    /// Inserts an account and returns it with a live session token.
    pub async fn signed_in(&self, phone: &str, role: Role) -> (User, String) {
        let code = lendwise_api::referral::unused_code(self.state.storage.as_ref(), uuid::Uuid::new_v4())
            .await
            .unwrap();
        let mut user = User::new(phone, role, code);
        user.is_phone_verified = true;
        self.state.storage.insert_user(&user).await.unwrap();
        let token = self.state.sessions.issue(user.id, role).await;
        (user, token)
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        self.send_with_headers(method, uri, token, body, &[]).await
    }

    pub async fn send_with_headers(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}

pub fn kyc_form(phone: &str) -> Value {
    serde_json::json!({
        "firstName": "Asha",
        "lastName": "Rao",
        "gender": "F",
        "dob": "1990-04-12",
        "state": "KA",
        "pincode": "560001",
        "fatherName": "Ravi Rao",
        "phone": phone,
        "email": "asha@example.com",
        "employmentStatus": "salaried",
        "monthlySalary": 85000,
        "companyName": "Acme Labs",
        "salaryMode": "NEFT",
        "aadharNumber": "123412341234",
        "panNumber": "ABCDE1234F",
        "address": "12 MG Road, Bengaluru"
    })
}

/// User-details payload with NAME, AADHAAR, PAN and BANK_ACCOUNT scopes.
/// The fixture reported against a specific verification id.
pub fn user_details_payload_for(verification_id: &str) -> Value {
    let mut payload = user_details_payload();
    payload["verification_id"] = Value::String(verification_id.to_string());
    payload
}

pub fn user_details_payload() -> Value {
    serde_json::json!({
        "reference_id": 99812,
        "verification_id": "ver-001",
        "scopes": [
            {"scope": "NAME", "status": "FOUND", "records": [{"metadata": {"name": "Asha Rao"}}]},
            {"scope": "AADHAAR", "status": "FOUND", "records": [{"metadata": {
                "name": "ASHA R",
                "aadhaar": "XXXXXXXX1234",
                "care_of": "D/O Ravi Rao",
                "dob": "12-04-1990",
                "gender": "F",
                "address": "12 MG Road, Bengaluru, Karnataka 560001",
                "photo_link": "https://kyc.example/photo/1",
                "split_address": {"dist": "Bengaluru", "state": "Karnataka", "pincode": "560001", "country": "India"}
            }}]},
            {"scope": "PAN", "status": "FOUND", "records": [{"metadata": {
                "pan": "ABCDE1234F",
                "registered_name": "ASHA RAO",
                "type": "Individual",
                "aadhaar_seeding_status": "Y",
                "aadhaar_seeding_status_desc": "Aadhaar is linked to PAN",
                "last_updated_at": "2024-11-02"
            }}]},
            {"scope": "BANK_ACCOUNT", "status": "FOUND", "records": [{"metadata": {
                "bank_account": "001122334455",
                "bank_name": "HDFC Bank",
                "name_at_bank": "ASHA RAO",
                "city": "Bengaluru",
                "branch": "MG Road",
                "micr": "560240002"
            }}]}
        ]
    })
}
