use crate::auth::{constant_time_compare, AuthUser};
use crate::errors::AppError;
use crate::handlers::{ApiJson, AppState};
use crate::models::{ApiResponse, Subscription};
use crate::requests::{amount_value, CreateOrderInput, OrderStatusInput};
use crate::services::{CreatedOrder, OrderRequest};
use crate::validation::Validate;
use axum::{extract::State, http::HeaderMap, Json};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// POST /api/payments/create-order
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiJson(input): ApiJson<CreateOrderInput>,
) -> Result<Json<ApiResponse<CreatedOrder>>, AppError> {
    let amount = input.validate()?;
    let user = state.load_user(auth.session.user_id).await?;

    let order = state
        .payments
        .create_order(&OrderRequest {
            amount,
            customer_id: user.id,
            customer_phone: &user.phone,
            customer_email: user.email.as_deref(),
        })
        .await?;

    tracing::info!("Payment order {} created for user {}", order.order_id, user.id);
    Ok(Json(ApiResponse::with_message(
        "Payment session created successfully",
        order,
    )))
}

/// POST /api/payments/order-status
pub async fn order_status(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    ApiJson(input): ApiJson<OrderStatusInput>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let order_id = input.validate()?;
    let data = state.payments.fetch_order(&order_id).await?;
    Ok(Json(ApiResponse::with_message(
        "Payment status retrieved successfully",
        data,
    )))
}

// ============ Webhook ============

#[derive(Debug, Deserialize)]
pub struct PaymentWebhook {
    pub data: Option<WebhookData>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub order: Option<WebhookOrder>,
    pub customer_details: Option<WebhookCustomer>,
    pub payment: Option<WebhookPayment>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookOrder {
    pub order_id: Option<String>,
    pub order_amount: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookCustomer {
    pub customer_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookPayment {
    pub payment_status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub order_id: String,
    pub customer_id: Uuid,
    pub activated: bool,
}

/// Payment gateway webhook
///
/// Activates the premium subscription of the customer named in the event.
/// Events reporting a non-successful payment are acknowledged without any
/// write. Authentication: `x-webhook-token` must match PAYMENT_WEBHOOK_SECRET
/// when that is configured.
pub async fn payment_callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<PaymentWebhook>,
) -> Result<Json<ApiResponse<WebhookAck>>, AppError> {
    tracing::info!("Received payment webhook");

    // 1. Validate webhook secret (if configured)
    validate_webhook_secret(&state, &headers)?;

    // 2. Pull the identifiers out of the event
    let data = payload
        .data
        .ok_or_else(|| AppError::BadRequest("Missing data in webhook event".to_string()))?;
    let order = data
        .order
        .ok_or_else(|| AppError::BadRequest("Missing order in webhook event".to_string()))?;
    let order_id = order
        .order_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing order_id in webhook event".to_string()))?;
    let customer_id = data
        .customer_details
        .and_then(|c| c.customer_id)
        .ok_or_else(|| AppError::BadRequest("Missing customer_id in webhook event".to_string()))
        .and_then(|raw| {
            Uuid::parse_str(&raw)
                .map_err(|_| AppError::BadRequest(format!("Invalid customer_id '{}'", raw)))
        })?;
    let amount = order.order_amount.as_ref().and_then(amount_value);

    // 3. Only successful payments activate anything
    if let Some(status) = data.payment.and_then(|p| p.payment_status) {
        if !status.eq_ignore_ascii_case("SUCCESS") {
            tracing::info!(
                "Payment for order {} reported status {}, not activating",
                order_id,
                status
            );
            return Ok(Json(ApiResponse::with_message(
                "Webhook processed successfully",
                WebhookAck {
                    order_id,
                    customer_id,
                    activated: false,
                },
            )));
        }
    }

    // 4. Overwrite the subscription wholesale
    let now = Utc::now();
    let subscription = Subscription {
        plan: "premium".to_string(),
        start_date: now,
        end_date: now + Duration::days(state.config.subscription_days),
        payment_id: Some(order_id.clone()),
        amount,
        is_active: true,
    };

    if !state
        .storage
        .update_subscription(customer_id, &subscription)
        .await?
    {
        tracing::warn!("Payment webhook for unknown customer {}", customer_id);
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tracing::info!(
        "Premium subscription activated for user {} (order {})",
        customer_id,
        order_id
    );

    Ok(Json(ApiResponse::with_message(
        "Webhook processed successfully",
        WebhookAck {
            order_id,
            customer_id,
            activated: true,
        },
    )))
}

/// Validate webhook secret from X-Webhook-Token header
fn validate_webhook_secret(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    // No secret configured: the startup warning already covers it
    let Some(ref expected_secret) = state.config.payment_webhook_secret else {
        return Ok(());
    };

    let token = headers
        .get("x-webhook-token")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing X-Webhook-Token header".to_string()))?;

    if !constant_time_compare(token, expected_secret) {
        tracing::warn!("Invalid webhook token received");
        return Err(AppError::Unauthorized("Invalid webhook token".to_string()));
    }

    Ok(())
}
