use crate::auth::AuthUser;
use crate::errors::{AppError, ResultExt};
use crate::handlers::{ApiJson, AppState};
use crate::models::{ApiResponse, KycRecord, KycStatus, VerifiedProfile};
use crate::referral::{self, ReferralOutcome, ReferralPolicy};
use crate::requests::KycStartInput;
use crate::validation::Validate;
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KycSessionStarted {
    pub verification_id: String,
    /// Vendor session payload (hosted-flow URL and friends).
    pub session: Value,
    /// Present only when the request quoted a referral code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral: Option<ReferralOutcome>,
}

/// KYC start
///
/// 1. Validates the declared KYC form
/// 2. Credits the quoted referral code, if any (never fails the request)
/// 3. Stores the declared data under a fresh verification id
/// 4. Opens the vendor's hosted KYC session for the user's phone
///
/// A profile verified earlier is kept; only the declared data is replaced.
pub async fn start_kyc(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiJson(input): ApiJson<KycStartInput>,
) -> Result<Json<ApiResponse<KycSessionStarted>>, AppError> {
    let declared = input
        .kyc_data
        .ok_or_else(|| AppError::BadRequest("Missing KYC data".to_string()))?
        .validate()?;

    let user = state.load_user(auth.session.user_id).await?;

    let referral = match input.referral_code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => {
            let policy = ReferralPolicy {
                increment: state.config.referral_bonus_increment,
                once_per_user: state.config.referral_once_per_user,
            };
            match referral::adjust(state.storage.as_ref(), policy, user.id, code).await {
                Ok(outcome) => {
                    if outcome == ReferralOutcome::InvalidCode {
                        tracing::warn!("User {} quoted an unknown referral code", user.id);
                    }
                    Some(outcome)
                }
                Err(e) => {
                    tracing::error!("Referral adjustment failed for user {}: {}", user.id, e);
                    None
                }
            }
        }
        _ => None,
    };

    let verification_id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let record = match user.kyc {
        Some(existing) if existing.verified.is_some() => KycRecord {
            declared,
            verification_id: verification_id.clone(),
            submitted_at: now,
            ..existing
        },
        _ => KycRecord {
            declared,
            verified: None,
            status: KycStatus::Pending,
            verification_id: verification_id.clone(),
            submitted_at: now,
            verified_at: None,
        },
    };

    state
        .storage
        .update_kyc(user.id, &record)
        .await
        .context("Failed to save declared KYC data")?;

    let session = state
        .kyc_vendor
        .start_session(&user.phone, &verification_id)
        .await?;

    tracing::info!("KYC session {} started for user {}", verification_id, user.id);

    Ok(Json(ApiResponse::with_message(
        "KYC session started successfully",
        KycSessionStarted {
            verification_id,
            session,
            referral,
        },
    )))
}

/// KYC callback
///
/// Exchanges the vendor auth code, fetches the scoped verification data,
/// normalizes it and stores the result as the user's verified profile. Data
/// reported for a different verification than the pending one is refused.
pub async fn kyc_callback(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(auth_code): Path<String>,
) -> Result<Json<ApiResponse<VerifiedProfile>>, AppError> {
    if auth_code.trim().is_empty() {
        return Err(AppError::BadRequest("Auth Code Missing".to_string()));
    }

    let user = state.load_user(auth.session.user_id).await?;
    let mut record = user
        .kyc
        .ok_or_else(|| AppError::BadRequest("KYC has not been started".to_string()))?;

    let access_token = state.kyc_vendor.exchange_code(&auth_code).await?;
    let details = state.kyc_vendor.fetch_user_details(&access_token).await?;
    let profile = state.verification.normalize(&details)?;

    if let Some(reported) = profile.verification_id.as_deref() {
        if reported != record.verification_id {
            tracing::warn!(
                "KYC callback for user {} reported verification {} but {} is pending",
                user.id,
                reported,
                record.verification_id
            );
            return Err(AppError::Conflict(
                "Verification does not match the pending KYC session".to_string(),
            ));
        }
    }

    record.verified = Some(profile.clone());
    record.status = KycStatus::Verified;
    record.verified_at = Some(Utc::now());

    state
        .storage
        .update_kyc(user.id, &record)
        .await
        .context("Failed to save verified KYC profile")?;

    tracing::info!("KYC verified for user {}", user.id);

    Ok(Json(ApiResponse::with_message(
        "KYC verified successfully",
        profile,
    )))
}
