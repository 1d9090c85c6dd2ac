/// End-to-end tests of the HTTP surface
/// Drives the full router over the in-memory store with wiremock standing in for vendors
mod common;

use axum::http::StatusCode;
use common::{kyc_form, spawn_app, spawn_app_with, user_details_payload_for, TestApp};
use lendwise_api::api::handlers::provision_staff;
use lendwise_api::models::{KycStatus, Role};
use lendwise_api::requests::EmployeeDraft;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

const ADMIN_EMAIL: &str = "admin@lendwise.test";
const ADMIN_PASSWORD: &str = "Adm1n@Pass";

async fn mock_otp_verify_ok(app: &TestApp) {
    Mock::given(method("POST"))
        .and(path("/verification/mobile360/otp/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "SUCCESS"})))
        .mount(&app.vendor)
        .await;
}

/// The vendor acknowledges without echoing an id, so the one the API
/// generated comes back in the response.
async fn mock_otp_send_ok(app: &TestApp) {
    Mock::given(method("POST"))
        .and(path("/verification/mobile360/otp/send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "PENDING"})))
        .mount(&app.vendor)
        .await;
}

/// Requests an OTP for `phone` and returns the verification id to echo back.
async fn request_otp(app: &TestApp, phone: &str) -> String {
    let (status, body) = app
        .send("POST", "/api/auth/send-otp", None, Some(json!({"phone": phone})))
        .await;
    assert_eq!(status, StatusCode::OK, "send-otp failed: {}", body);
    body["data"]["verification_id"].as_str().unwrap().to_string()
}

async fn mock_kyc_vendor(app: &TestApp) {
    Mock::given(method("POST"))
        .and(path("/verification/oauth2/session"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"url": "https://kyc.example/flow"})),
        )
        .mount(&app.vendor)
        .await;
    Mock::given(method("POST"))
        .and(path("/verification/oauth2/generate-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok-1"})))
        .mount(&app.vendor)
        .await;
}

/// Starts KYC for the caller and has the vendor report details for the
/// verification id it was given.
async fn start_kyc_with_details(app: &TestApp, token: &str, phone: &str) -> String {
    let (status, body) = app
        .send("POST", "/api/kyc/start", Some(token), Some(json!({"kycData": kyc_form(phone)})))
        .await;
    assert_eq!(status, StatusCode::OK, "kyc start failed: {}", body);
    let verification_id = body["data"]["verificationId"].as_str().unwrap().to_string();
    mock_user_details(app, &verification_id).await;
    verification_id
}

async fn mock_user_details(app: &TestApp, verification_id: &str) {
    Mock::given(method("GET"))
        .and(path("/verification/oauth2/user-details"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(user_details_payload_for(verification_id)),
        )
        .mount(&app.vendor)
        .await;
}

/// Seeds an admin through the provisioning path and logs in over HTTP.
async fn admin_token(app: &TestApp) -> String {
    provision_staff(
        app.state.storage.as_ref(),
        EmployeeDraft {
            full_name: "Root Admin".to_string(),
            employee_id: "ADMIN-001".to_string(),
            phone: "9000000001".to_string(),
            email: ADMIN_EMAIL.to_string(),
            password: ADMIN_PASSWORD.to_string(),
            address: "Head office".to_string(),
        },
        Role::Admin,
    )
    .await
    .unwrap();

    let (status, body) = app
        .send(
            "POST",
            "/api/auth/admin/login",
            None,
            Some(json!({"email": ADMIN_EMAIL, "password": ADMIN_PASSWORD})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "admin login failed: {}", body);
    body["data"]["token"].as_str().unwrap().to_string()
}

fn loan_provider_body(name: &str) -> serde_json::Value {
    json!({
        "loanName": name,
        "bankName": "HDFC Bank",
        "loanType": "personal",
        "interestRate": 10.5,
        "minimumCreditScore": 700,
        "minimumIncome": 25000,
        "maximumLoanAmount": 1500000,
        "minTenure": 12,
        "maxTenure": 60,
        "processingFee": 1.5,
        "prepaymentCharges": 2,
        "websiteLink": "https://hdfc.example/loans",
        "features": ["Instant approval"],
        "EligibilityCriteria": ["Salaried"]
    })
}

#[tokio::test]
async fn health_is_public() {
    let app = spawn_app().await;
    let (status, body) = app.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn invalid_phone_returns_field_errors() {
    let app = spawn_app().await;
    let (status, body) = app
        .send("POST", "/api/auth/send-otp", None, Some(json!({"phone": "12345"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["errors"]["phone"].is_string());
}

#[tokio::test]
async fn verifying_the_same_phone_twice_keeps_one_account() {
    let app = spawn_app().await;
    mock_otp_send_ok(&app).await;
    mock_otp_verify_ok(&app).await;

    let mut grants = Vec::new();
    for _ in 0..2 {
        let verification_id = request_otp(&app, "9876543210").await;
        let (status, body) = app
            .send(
                "POST",
                "/api/auth/verify-otp",
                None,
                Some(json!({"phone": "9876543210", "verification_id": verification_id, "otp": "1234"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "verify-otp failed: {}", body);
        grants.push(body);
    }
    let (first, second) = (&grants[0], &grants[1]);

    assert_eq!(first["message"], "Phone verified successfully");
    assert_eq!(first["data"]["user"]["id"], second["data"]["user"]["id"]);
    assert_ne!(first["data"]["token"], second["data"]["token"]);
    assert!(first["data"]["user"].get("passwordHash").is_none());

    let users = app.state.storage.list_users_by_role(Role::User).await.unwrap();
    assert_eq!(users.len(), 1);
    assert!(users[0].is_phone_verified);
    assert_eq!(users[0].referral_code.len(), 6);
}

#[tokio::test]
async fn verification_id_cannot_be_redeemed_twice() {
    let app = spawn_app().await;
    mock_otp_send_ok(&app).await;
    mock_otp_verify_ok(&app).await;

    let verification_id = request_otp(&app, "9876543210").await;
    let request = json!({"phone": "9876543210", "verification_id": verification_id, "otp": "1234"});
    let (status, _) = app
        .send("POST", "/api/auth/verify-otp", None, Some(request.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send("POST", "/api/auth/verify-otp", None, Some(request))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or expired verification");
}

#[tokio::test]
async fn verification_id_is_bound_to_the_phone_it_was_sent_to() {
    let app = spawn_app().await;
    mock_otp_send_ok(&app).await;
    mock_otp_verify_ok(&app).await;
    let (victim, _) = app.signed_in("9123456789", Role::User).await;

    let own_id = request_otp(&app, "9876543210").await;
    let (status, body) = app
        .send(
            "POST",
            "/api/auth/verify-otp",
            None,
            Some(json!({"phone": victim.phone, "verification_id": own_id, "otp": "1234"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or expired verification");
    assert!(body.get("data").is_none());

    let (status, _) = app
        .send(
            "POST",
            "/api/auth/verify-otp",
            None,
            Some(json!({"phone": "9876543210", "verification_id": "never-issued", "otp": "1234"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn otp_sign_in_never_yields_a_staff_session() {
    let app = spawn_app().await;
    mock_otp_send_ok(&app).await;
    mock_otp_verify_ok(&app).await;
    let (admin, _) = app.signed_in("9000000001", Role::Admin).await;

    let verification_id = request_otp(&app, &admin.phone).await;
    let (status, body) = app
        .send(
            "POST",
            "/api/auth/verify-otp",
            None,
            Some(json!({"phone": admin.phone, "verification_id": verification_id, "otp": "1234"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Forbidden: Access denied");
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn rejected_otp_passes_vendor_status_through() {
    let app = spawn_app().await;
    mock_otp_send_ok(&app).await;
    Mock::given(method("POST"))
        .and(path("/verification/mobile360/otp/verify"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"message": "OTP expired"})))
        .mount(&app.vendor)
        .await;

    let verification_id = request_otp(&app, "9876543210").await;
    let (status, body) = app
        .send(
            "POST",
            "/api/auth/verify-otp",
            None,
            Some(json!({"phone": "9876543210", "verification_id": verification_id, "otp": "1234"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "OTP expired");
    assert!(app.state.storage.find_user_by_phone("9876543210").await.unwrap().is_none());
}

#[tokio::test]
async fn protected_routes_require_a_session() {
    let app = spawn_app().await;

    let (status, body) = app.send("GET", "/api/user/profile", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthorized: Token missing");

    let (status, body) = app.send("GET", "/api/user/profile", Some("bogus"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or expired token");
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let app = spawn_app().await;
    let (_, token) = app.signed_in("9876543210", Role::User).await;

    let (status, _) = app.send("GET", "/api/user/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.send("POST", "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.send("GET", "/api/user/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn kyc_start_with_unknown_referral_code_still_succeeds() {
    let app = spawn_app().await;
    mock_kyc_vendor(&app).await;
    let (user, token) = app.signed_in("9876543210", Role::User).await;

    let (status, body) = app
        .send(
            "POST",
            "/api/kyc/start",
            Some(&token),
            Some(json!({"kycData": kyc_form("9876543210"), "referralCode": "ZZZZZZ"})),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["message"], "KYC session started successfully");
    assert_eq!(body["data"]["referral"]["status"], "invalidCode");
    assert_eq!(body["data"]["session"]["url"], "https://kyc.example/flow");

    let stored = app.state.storage.find_user(user.id).await.unwrap().unwrap();
    let kyc = stored.kyc.unwrap();
    assert_eq!(kyc.status, KycStatus::Pending);
    assert_eq!(kyc.declared.pan_number, "ABCDE1234F");
    assert_eq!(kyc.verification_id, body["data"]["verificationId"].as_str().unwrap());
    assert!(stored.referred_by.is_none());
}

#[tokio::test]
async fn kyc_start_credits_the_referrer_once() {
    let app = spawn_app().await;
    mock_kyc_vendor(&app).await;
    let (referrer, _) = app.signed_in("9000000010", Role::User).await;
    let (referred, token) = app.signed_in("9876543210", Role::User).await;

    let request = json!({
        "kycData": kyc_form("9876543210"),
        "referralCode": referrer.referral_code.to_lowercase()
    });
    let (status, body) = app
        .send("POST", "/api/kyc/start", Some(&token), Some(request.clone()))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["referral"]["status"], "credited");
    assert_eq!(body["data"]["referral"]["newBonus"], 100);

    let (status, body) = app
        .send("POST", "/api/kyc/start", Some(&token), Some(request))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["referral"]["status"], "alreadyCredited");

    let referrer = app.state.storage.find_user(referrer.id).await.unwrap().unwrap();
    assert_eq!(referrer.referral_bonus, 100);
    let referred = app.state.storage.find_user(referred.id).await.unwrap().unwrap();
    assert_eq!(referred.referred_by.as_deref(), Some(referrer.referral_code.as_str()));
}

#[tokio::test]
async fn kyc_start_rejects_invalid_form() {
    let app = spawn_app().await;
    let (_, token) = app.signed_in("9876543210", Role::User).await;

    let mut form = kyc_form("9876543210");
    form["panNumber"] = json!("abcde1234f");
    form["pincode"] = json!("5600");
    let (status, body) = app
        .send("POST", "/api/kyc/start", Some(&token), Some(json!({"kycData": form})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"]["panNumber"], "Invalid PAN number format");
    assert_eq!(body["errors"]["pincode"], "Pincode must be exactly 6 digits");

    let (status, body) = app
        .send("POST", "/api/kyc/start", Some(&token), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Missing KYC data");
}

#[tokio::test]
async fn kyc_callback_stores_the_normalized_profile() {
    let app = spawn_app().await;
    mock_kyc_vendor(&app).await;
    let (user, token) = app.signed_in("9876543210", Role::User).await;
    start_kyc_with_details(&app, &token, "9876543210").await;

    let (status, body) = app
        .send("POST", "/api/kyc/callback/code-1", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["verifiedName"], "Asha Rao");
    assert_eq!(body["data"]["panNumber"], "ABCDE1234F");
    assert_eq!(body["data"]["bankDetails"]["bankName"], "HDFC Bank");

    let (_, profile) = app.send("GET", "/api/user/profile", Some(&token), None).await;
    assert_eq!(profile["data"]["kyc"]["verifiedData"], body["data"]);
    assert_eq!(profile["data"]["kyc"]["status"], "verified");

    let stored = app.state.storage.find_user(user.id).await.unwrap().unwrap();
    assert!(stored.kyc.unwrap().verified_at.is_some());
}

#[tokio::test]
async fn kyc_callback_for_another_verification_is_refused() {
    let app = spawn_app().await;
    mock_kyc_vendor(&app).await;
    mock_user_details(&app, "someone-elses-verification").await;
    let (user, token) = app.signed_in("9876543210", Role::User).await;

    let (status, _) = app
        .send(
            "POST",
            "/api/kyc/start",
            Some(&token),
            Some(json!({"kycData": kyc_form("9876543210")})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send("POST", "/api/kyc/callback/code-1", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Verification does not match the pending KYC session");

    let kyc = app.state.storage.find_user(user.id).await.unwrap().unwrap().kyc.unwrap();
    assert_eq!(kyc.status, KycStatus::Pending);
    assert!(kyc.verified.is_none());
}

#[tokio::test]
async fn kyc_callback_before_start_is_rejected() {
    let app = spawn_app().await;
    let (_, token) = app.signed_in("9876543210", Role::User).await;

    let (status, body) = app
        .send("POST", "/api/kyc/callback/code-1", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "KYC has not been started");
}

#[tokio::test]
async fn restarting_kyc_keeps_the_verified_profile() {
    let app = spawn_app().await;
    mock_kyc_vendor(&app).await;
    let (user, token) = app.signed_in("9876543210", Role::User).await;

    start_kyc_with_details(&app, &token, "9876543210").await;
    let (status, _) = app.send("POST", "/api/kyc/callback/code-1", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .send(
            "POST",
            "/api/kyc/start",
            Some(&token),
            Some(json!({"kycData": kyc_form("9876543210")})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let kyc = app.state.storage.find_user(user.id).await.unwrap().unwrap().kyc.unwrap();
    assert_eq!(kyc.status, KycStatus::Verified);
    assert!(kyc.verified.is_some());
}

#[tokio::test]
async fn cibil_check_requires_verified_kyc_and_stores_the_score() {
    let app = spawn_app().await;
    mock_kyc_vendor(&app).await;
    Mock::given(method("POST"))
        .and(path("/credit-report/score"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"score": 765})))
        .mount(&app.vendor)
        .await;
    let (user, token) = app.signed_in("9876543210", Role::User).await;

    let (status, body) = app.send("GET", "/api/user/cibil-check", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "KYC not completed");

    start_kyc_with_details(&app, &token, "9876543210").await;
    let (status, _) = app.send("POST", "/api/kyc/callback/code-1", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.send("GET", "/api/user/cibil-check", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["creditScore"], 765);

    let stored = app.state.storage.find_user(user.id).await.unwrap().unwrap();
    assert_eq!(stored.credit_score, Some(765));
}

#[tokio::test]
async fn offer_eligibility_uses_the_first_matching_tier() {
    let app = spawn_app().await;
    let admin = admin_token(&app).await;
    let (user, token) = app.signed_in("9876543210", Role::User).await;

    let (status, body) = app.send("GET", "/api/user/offer-eligibility", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Credit score not available");

    app.state.storage.update_credit_score(user.id, 720).await.unwrap();

    let (status, body) = app.send("GET", "/api/user/offer-eligibility", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No offer limit found");

    let (status, body) = app
        .send(
            "POST",
            "/api/admin/offer-limits/create",
            Some(&admin),
            Some(json!({
                "name": "Default",
                "creditScoreMappings": [
                    {"minScore": 300, "maxScore": 699, "loanAmount": 50000},
                    {"minScore": 700, "maxScore": 749, "loanAmount": 200000},
                    {"minScore": 700, "maxScore": 900, "loanAmount": 500000}
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (status, body) = app.send("GET", "/api/user/offer-eligibility", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["creditScore"], 720);
    assert_eq!(body["data"]["offer"]["status"], "eligible");
    assert_eq!(body["data"]["offer"]["loanAmount"], 200000.0);
    assert_eq!(body["data"]["offer"]["tierIndex"], 1);

    app.state.storage.update_credit_score(user.id, 250).await.unwrap();
    let (_, body) = app.send("GET", "/api/user/offer-eligibility", Some(&token), None).await;
    assert_eq!(body["data"]["offer"]["status"], "noEligibleOffer");
}

#[tokio::test]
async fn offer_limit_update_merges_into_the_single_table() {
    let app = spawn_app().await;
    let admin = admin_token(&app).await;

    let (status, body) = app
        .send(
            "PUT",
            "/api/admin/offer-limits/update",
            Some(&admin),
            Some(json!({"name": "Only name"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["creditScoreMappings"].is_string());

    app.send(
        "POST",
        "/api/admin/offer-limits/create",
        Some(&admin),
        Some(json!({
            "name": "Default",
            "creditScoreMappings": [{"minScore": 300, "maxScore": 900, "loanAmount": 10000}]
        })),
    )
    .await;
    let (status, body) = app
        .send(
            "PUT",
            "/api/admin/offer-limits/update",
            Some(&admin),
            Some(json!({"name": "Renamed"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Renamed");
    assert_eq!(body["data"]["creditScoreMappings"][0]["loanAmount"], 10000.0);

    let (status, body) = app
        .send(
            "POST",
            "/api/admin/offer-limits/create",
            Some(&admin),
            Some(json!({
                "name": "Broken",
                "creditScoreMappings": [{"minScore": 800, "maxScore": 700, "loanAmount": 10000}]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["errors"]["creditScoreMappings[0].minScore"],
        "minScore cannot exceed maxScore"
    );

    let (_, body) = app.send("GET", "/api/offer-limits/list", None, None).await;
    assert_eq!(body["data"]["name"], "Renamed");
}

#[tokio::test]
async fn user_subscribe_replaces_the_subscription() {
    let app = spawn_app().await;
    let (user, token) = app.signed_in("9876543210", Role::User).await;

    let (status, body) = app
        .send(
            "POST",
            "/api/user/subscribe",
            Some(&token),
            Some(json!({"plan": "basic", "startDate": "2026-01-01", "endDate": "2025-01-01"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["endDate"].is_string());

    let (status, body) = app
        .send(
            "POST",
            "/api/user/subscribe",
            Some(&token),
            Some(json!({"plan": "basic", "startDate": "2026-01-01", "endDate": "2099-01-01"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["message"], "Subscription created successfully");

    let stored = app.state.storage.find_user(user.id).await.unwrap().unwrap();
    let subscription = stored.subscription.unwrap();
    assert_eq!(subscription.plan, "basic");
    assert!(subscription.is_active);
}

fn webhook_event(customer_id: &str, payment_status: &str) -> serde_json::Value {
    json!({
        "type": "PAYMENT_SUCCESS_WEBHOOK",
        "data": {
            "order": {"order_id": "order_77", "order_amount": 499.0},
            "payment": {"payment_status": payment_status},
            "customer_details": {"customer_id": customer_id}
        }
    })
}

#[tokio::test]
async fn payment_webhook_activates_premium() {
    let app = spawn_app_with(|c| c.payment_webhook_secret = Some("hook-secret".to_string())).await;
    let (user, _) = app.signed_in("9876543210", Role::User).await;
    let event = webhook_event(&user.id.to_string(), "SUCCESS");

    let (status, _) = app
        .send("POST", "/api/payments/callback", None, Some(event.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send_with_headers(
            "POST",
            "/api/payments/callback",
            None,
            Some(event.clone()),
            &[("x-webhook-token", "wrong-secret")],
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send_with_headers(
            "POST",
            "/api/payments/callback",
            None,
            Some(event),
            &[("x-webhook-token", "hook-secret")],
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["activated"], true);
    assert_eq!(body["data"]["orderId"], "order_77");

    let subscription = app
        .state
        .storage
        .find_user(user.id)
        .await
        .unwrap()
        .unwrap()
        .subscription
        .unwrap();
    assert_eq!(subscription.plan, "premium");
    assert!(subscription.is_active);
    assert_eq!(subscription.payment_id.as_deref(), Some("order_77"));
    assert_eq!(subscription.amount, Some(499.0));
    assert_eq!((subscription.end_date - subscription.start_date).num_days(), 30);
}

#[tokio::test]
async fn payment_webhook_ignores_failed_payments_and_unknown_customers() {
    let app = spawn_app().await;
    let (user, _) = app.signed_in("9876543210", Role::User).await;

    let (status, body) = app
        .send(
            "POST",
            "/api/payments/callback",
            None,
            Some(webhook_event(&user.id.to_string(), "FAILED")),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["activated"], false);
    let stored = app.state.storage.find_user(user.id).await.unwrap().unwrap();
    assert!(stored.subscription.is_none());

    let (status, _) = app
        .send(
            "POST",
            "/api/payments/callback",
            None,
            Some(webhook_event(&uuid::Uuid::new_v4().to_string(), "SUCCESS")),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(
            "POST",
            "/api/payments/callback",
            None,
            Some(json!({"data": {"order": {"order_id": "order_1"}}})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_order_uses_the_caller_as_customer() {
    let app = spawn_app().await;
    Mock::given(method("POST"))
        .and(path("/pg/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "order_id": "order_9",
            "payment_session_id": "session_9"
        })))
        .mount(&app.vendor)
        .await;
    let (_, token) = app.signed_in("9876543210", Role::User).await;

    let (status, body) = app
        .send("POST", "/api/payments/create-order", Some(&token), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"]["order_amount"], "Order amount is required");

    let (status, body) = app
        .send(
            "POST",
            "/api/payments/create-order",
            Some(&token),
            Some(json!({"order_amount": "499"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["orderId"], "order_9");
    assert_eq!(body["data"]["paymentSessionId"], "session_9");
}

#[tokio::test]
async fn role_guards_separate_users_employees_and_admins() {
    let app = spawn_app().await;
    let admin = admin_token(&app).await;
    let (_, user_token) = app.signed_in("9876543210", Role::User).await;

    let employee = json!({
        "fullName": "Ravi Kumar",
        "employeeId": "EMP-101",
        "phone": "9111111111",
        "email": "ravi@lendwise.test",
        "password": "Empl0yee@1",
        "address": "Branch 7"
    });

    let (status, _) = app
        .send("POST", "/api/admin/employees/create", Some(&user_token), Some(employee.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send("POST", "/api/admin/employees/create", Some(&admin), Some(employee.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert!(body["data"].get("passwordHash").is_none());

    let (status, body) = app
        .send("POST", "/api/admin/employees/create", Some(&admin), Some(employee))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["message"],
        "Employee with provided email, phone, or employee ID already exists"
    );

    let (status, body) = app
        .send(
            "POST",
            "/api/auth/employee/login",
            None,
            Some(json!({"email": "ravi@lendwise.test", "password": "Empl0yee@1"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let employee_token = body["data"]["token"].as_str().unwrap().to_string();

    // Employees read the back office but cannot write to it
    let (status, body) = app
        .send("GET", "/api/admin/users/list", Some(&employee_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    let (status, _) = app
        .send(
            "POST",
            "/api/admin/loan-providers/create",
            Some(&employee_token),
            Some(loan_provider_body("Quick Cash")),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send("GET", "/api/admin/users/list", Some(&user_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // An employee cannot sign in through the admin door
    let (status, _) = app
        .send(
            "POST",
            "/api/auth/admin/login",
            None,
            Some(json!({"email": "ravi@lendwise.test", "password": "Empl0yee@1"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn loan_provider_catalog_round_trip() {
    let app = spawn_app().await;
    let admin = admin_token(&app).await;

    let (status, body) = app
        .send(
            "POST",
            "/api/admin/loan-providers/create",
            Some(&admin),
            Some(loan_provider_body("Quick Cash")),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["eligibilityCriteria"], json!(["Salaried"]));

    let (status, _) = app
        .send(
            "POST",
            "/api/admin/loan-providers/create",
            Some(&admin),
            Some(loan_provider_body("Quick Cash")),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .send(
            "PUT",
            &format!("/api/admin/loan-providers/update/{}", id),
            Some(&admin),
            Some(json!({"interestRate": 9.25})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["interestRate"], 9.25);
    assert_eq!(body["data"]["loanName"], "Quick Cash");

    let (status, body) = app
        .send(
            "PUT",
            &format!("/api/admin/loan-providers/update/{}", id),
            Some(&admin),
            Some(json!({"minTenure": 120})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["minTenure"].is_string());

    let (status, body) = app.send("GET", &format!("/api/loan-providers/{}", id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["interestRate"], 9.25);

    let (status, _) = app
        .send("DELETE", &format!("/api/admin/loan-providers/delete/{}", id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.send("GET", &format!("/api/loan-providers/{}", id), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Loan provider not found");

    let (_, body) = app.send("GET", "/api/loan-providers/list", None, None).await;
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn admin_user_update_only_touches_contact_fields() {
    let app = spawn_app().await;
    let admin = admin_token(&app).await;
    let (user, _) = app.signed_in("9876543210", Role::User).await;

    let (status, body) = app
        .send(
            "PUT",
            &format!("/api/admin/users/update/{}", user.id),
            Some(&admin),
            Some(json!({"fullName": "Asha Rao", "email": "not-an-email"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"]["email"], "Invalid email format");

    let (status, body) = app
        .send(
            "PUT",
            &format!("/api/admin/users/update/{}", user.id),
            Some(&admin),
            Some(json!({"fullName": "Asha Rao", "creditScore": 900})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["fullName"], "Asha Rao");
    assert!(body["data"]["creditScore"].is_null());
}
