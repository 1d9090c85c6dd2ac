use crate::config::Config;
use crate::errors::AppError;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// Turns a non-success vendor response into `AppError::Upstream`, keeping the
/// vendor status and the most specific message it sent.
async fn vendor_error(vendor: &str, response: Response) -> AppError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    tracing::error!("{} returned error {}: {}", vendor, status, body);

    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or(body);

    AppError::Upstream {
        status: Some(status.as_u16()),
        message,
    }
}

async fn send_json(vendor: &str, request: RequestBuilder) -> Result<Value, AppError> {
    let response = request.send().await.map_err(|e| {
        tracing::error!("{} request failed: {}", vendor, e);
        AppError::from(e)
    })?;

    if !response.status().is_success() {
        return Err(vendor_error(vendor, response).await);
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| AppError::upstream(format!("Failed to parse {} response: {}", vendor, e)))
}

// ============ OTP ============

pub struct OtpService {
    client: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    api_version: String,
}

impl OtpService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.verification_base_url.clone(),
            client_id: config.verification_client_id.clone(),
            client_secret: config.verification_client_secret.clone(),
            api_version: config.verification_api_version.clone(),
        }
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .header("x-client-id", &self.client_id)
            .header("x-client-secret", &self.client_secret)
            .header("x-api-version", &self.api_version)
    }

    /// Sends an SMS OTP under `verification_id`, which the client must echo
    /// back on verify.
    pub async fn send_otp(&self, phone: &str, verification_id: &str) -> Result<Value, AppError> {
        let body = json!({
            "mobile_number": phone,
            "verification_id": verification_id,
            "name": "User",
            "notification_modes": ["SMS"],
            "user_consent": {
                "timestamp": Utc::now().to_rfc3339(),
                "purpose": "Phone number verification",
                "obtained": true,
                "type": "EXPLICIT"
            }
        });

        tracing::info!("Sending OTP to phone ending {}", last_digits(phone));
        send_json("OTP vendor", self.post("/verification/mobile360/otp/send").json(&body)).await
    }

    pub async fn verify_otp(&self, verification_id: &str, otp: &str) -> Result<Value, AppError> {
        let body = json!({
            "verification_id": verification_id,
            "otp": otp,
        });

        tracing::info!("Verifying OTP for verification {}", verification_id);
        send_json("OTP vendor", self.post("/verification/mobile360/otp/verify").json(&body)).await
    }
}

fn last_digits(phone: &str) -> &str {
    let start = phone.len().saturating_sub(4);
    phone.get(start..).unwrap_or("")
}

// ============ KYC ============

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(alias = "accessToken")]
    access_token: Option<String>,
}

pub struct KycVendorService {
    client: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    api_version: String,
}

impl KycVendorService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.verification_base_url.clone(),
            client_id: config.kyc_client_id.clone(),
            client_secret: config.kyc_client_secret.clone(),
            api_version: config.verification_api_version.clone(),
        }
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .header("x-client-id", &self.client_id)
            .header("x-client-secret", &self.client_secret)
            .header("x-api-version", &self.api_version)
    }

    /// Opens a hosted KYC session for the user's mobile number.
    pub async fn start_session(&self, phone: &str, verification_id: &str) -> Result<Value, AppError> {
        let body = json!({
            "user": {
                "identifier_type": "MOBILE",
                "identifier_value": phone,
            },
            "verification_id": verification_id,
        });

        tracing::info!("Starting KYC session {}", verification_id);
        send_json("KYC vendor", self.post("/verification/oauth2/session").json(&body)).await
    }

    /// Exchanges the redirect auth code for an access token.
    pub async fn exchange_code(&self, auth_code: &str) -> Result<String, AppError> {
        let value = send_json(
            "KYC vendor",
            self.post("/verification/oauth2/generate-token")
                .json(&json!({ "auth_code": auth_code })),
        )
        .await?;

        let token: TokenResponse = serde_json::from_value(value)
            .map_err(|e| AppError::upstream(format!("Unexpected token response: {}", e)))?;

        token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::upstream("KYC vendor returned no access token"))
    }

    /// Scoped verification data for the session behind `access_token`.
    pub async fn fetch_user_details(&self, access_token: &str) -> Result<Value, AppError> {
        tracing::debug!("Fetching KYC user details (token [REDACTED])");
        send_json(
            "KYC vendor",
            self.client
                .get(format!("{}/verification/oauth2/user-details", self.base_url))
                .bearer_auth(access_token)
                .header("x-api-version", &self.api_version),
        )
        .await
    }
}

// ============ Payment gateway ============

#[derive(Debug, Serialize)]
pub struct OrderRequest<'a> {
    pub amount: f64,
    pub customer_id: Uuid,
    pub customer_phone: &'a str,
    pub customer_email: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedOrder {
    pub order_id: String,
    pub payment_session_id: String,
}

#[derive(Debug, Deserialize)]
struct GatewayOrder {
    order_id: Option<String>,
    payment_session_id: Option<String>,
}

pub struct PaymentService {
    client: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    api_version: String,
    notify_url: String,
}

impl PaymentService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.payment_base_url.clone(),
            client_id: config.payment_client_id.clone(),
            client_secret: config.payment_client_secret.clone(),
            api_version: config.payment_api_version.clone(),
            notify_url: format!("{}/api/payments/callback", config.backend_url),
        }
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("x-client-id", &self.client_id)
            .header("x-client-secret", &self.client_secret)
            .header("x-api-version", &self.api_version)
    }

    pub async fn create_order(&self, order: &OrderRequest<'_>) -> Result<CreatedOrder, AppError> {
        let body = json!({
            "order_amount": order.amount,
            "order_currency": "INR",
            "customer_details": {
                "customer_id": order.customer_id.to_string(),
                "customer_phone": order.customer_phone,
                "customer_email": order.customer_email.unwrap_or("example@email.com"),
            },
            "order_meta": {
                "notify_url": self.notify_url,
            }
        });

        tracing::info!(
            "Creating payment order of {} INR for user {}",
            order.amount,
            order.customer_id
        );
        let value = send_json(
            "Payment gateway",
            self.request(self.client.post(format!("{}/pg/orders", self.base_url)))
                .json(&body),
        )
        .await?;

        let created: GatewayOrder = serde_json::from_value(value)
            .map_err(|e| AppError::upstream(format!("Unexpected order response: {}", e)))?;

        match (created.order_id, created.payment_session_id) {
            (Some(order_id), Some(payment_session_id)) => Ok(CreatedOrder {
                order_id,
                payment_session_id,
            }),
            _ => Err(AppError::upstream(
                "Payment gateway response is missing the order or session id",
            )),
        }
    }

    pub async fn fetch_order(&self, order_id: &str) -> Result<Value, AppError> {
        let url = reqwest::Url::parse(&format!("{}/pg/orders/", self.base_url))
            .and_then(|base| base.join(order_id))
            .map_err(|e| AppError::BadRequest(format!("Invalid order id: {}", e)))?;

        tracing::info!("Fetching payment order {}", order_id);
        send_json("Payment gateway", self.request(self.client.get(url))).await
    }
}

// ============ Credit bureau ============

#[derive(Debug, Serialize)]
pub struct BureauQuery<'a> {
    pub pan: &'a str,
    pub name: &'a str,
    pub mobile: &'a str,
}

#[derive(Debug, Deserialize)]
struct BureauScore {
    score: Option<Value>,
}

pub struct BureauService {
    client: Client,
    base_url: String,
    api_key: String,
}

impl BureauService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.bureau_base_url.clone(),
            api_key: config.bureau_api_key.clone(),
        }
    }

    /// Numeric credit score for the applicant, or `None` when the bureau has
    /// no file for them.
    pub async fn fetch_score(&self, query: &BureauQuery<'_>) -> Result<Option<i32>, AppError> {
        tracing::info!("Requesting bureau score");
        let value = send_json(
            "Credit bureau",
            self.client
                .post(format!("{}/credit-report/score", self.base_url))
                .header("x-api-key", &self.api_key)
                .json(query),
        )
        .await?;

        let parsed: BureauScore = serde_json::from_value(value)
            .map_err(|e| AppError::upstream(format!("Unexpected bureau response: {}", e)))?;

        Ok(parsed.score.and_then(|s| match s {
            Value::Number(n) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }))
    }
}
