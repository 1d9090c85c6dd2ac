use crate::auth::{hash_password, verify_password, AuthUser, OtpChallenges, SessionStore};
use crate::config::Config;
use crate::errors::AppError;
use crate::models::*;
use crate::normalizer::{ScopedVerificationAdapter, VerificationAdapter};
use crate::offer_matcher::{match_offer, OfferMatch};
use crate::referral;
use crate::requests::{LoginInput, SendOtpInput, SubscriptionInput, VerifyOtpInput};
use crate::services::{BureauQuery, BureauService, KycVendorService, OtpService, PaymentService};
use crate::storage::{Catalog, Storage};
use crate::validation::Validate;
use axum::{
    extract::{FromRequest, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state injected into handlers.
pub struct AppState {
    /// User, catalog and offer-limit persistence.
    pub storage: Arc<dyn Storage>,
    /// Application configuration.
    pub config: Config,
    /// Bearer sessions issued at login.
    pub sessions: SessionStore,
    /// Verification ids handed out by send-otp, bound to their phone.
    pub otp_challenges: OtpChallenges,
    pub otp: OtpService,
    pub kyc_vendor: KycVendorService,
    pub payments: PaymentService,
    pub bureau: BureauService,
    /// Turns KYC vendor payloads into the canonical verified profile.
    pub verification: Arc<dyn VerificationAdapter>,
}

impl AppState {
    pub fn new(config: Config, storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            sessions: SessionStore::new(config.session_ttl_hours),
            otp_challenges: OtpChallenges::new(),
            otp: OtpService::new(&config),
            kyc_vendor: KycVendorService::new(&config),
            payments: PaymentService::new(&config),
            bureau: BureauService::new(&config),
            verification: Arc::new(ScopedVerificationAdapter),
            config,
        }
    }

    pub(crate) async fn load_user(&self, id: Uuid) -> Result<User, AppError> {
        self.storage
            .find_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }
}

/// JSON body extractor whose rejections use the API error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Health check endpoint.
///
/// Returns the service status and version.
pub async fn health() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "lendwise-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

// ============ Auth ============

/// POST /api/auth/send-otp
///
/// Asks the OTP vendor to text a code to the given phone. The vendor's
/// response (including its `verification_id`) is returned unchanged, and the
/// id is remembered as belonging to that phone.
pub async fn send_otp(
    State(state): State<Arc<AppState>>,
    ApiJson(input): ApiJson<SendOtpInput>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let phone = input.validate()?;
    let requested_id = Uuid::new_v4().to_string();
    let mut data = state.otp.send_otp(&phone, &requested_id).await?;

    let verification_id = match data.get("verification_id").and_then(Value::as_str) {
        Some(id) => id.to_string(),
        None => {
            if let Some(body) = data.as_object_mut() {
                body.insert("verification_id".to_string(), json!(requested_id));
            }
            requested_id
        }
    };
    state.otp_challenges.register(&verification_id, &phone).await;

    Ok(Json(ApiResponse::data(data)))
}

/// POST /api/auth/verify-otp
///
/// Checks the code with the vendor, then creates or reuses the account for
/// the phone and issues a session. The verification id must come from a
/// send-otp call for the same phone. Staff accounts sign in with a password
/// and are refused here.
///
/// # Returns
///
/// * `Result<Json<ApiResponse<SessionGrant<User>>>, AppError>` - The session token and account,
///   or the vendor's error status when the code is rejected.
pub async fn verify_otp(
    State(state): State<Arc<AppState>>,
    ApiJson(input): ApiJson<VerifyOtpInput>,
) -> Result<Json<ApiResponse<SessionGrant<User>>>, AppError> {
    let check = input.validate()?;
    state
        .otp_challenges
        .check(&check.verification_id, &check.phone)
        .await?;
    state
        .otp
        .verify_otp(&check.verification_id, &check.otp)
        .await?;
    state.otp_challenges.consume(&check.verification_id).await;

    let user = match state.storage.find_user_by_phone(&check.phone).await? {
        Some(existing) if existing.role.is_staff() => {
            tracing::warn!("OTP sign-in refused for staff account {}", existing.id);
            return Err(AppError::Forbidden("Forbidden: Access denied".to_string()));
        }
        Some(existing) if existing.is_phone_verified => existing,
        _ => {
            let id = Uuid::new_v4();
            let code = referral::unused_code(state.storage.as_ref(), id).await?;
            let mut template = User::new(check.phone.clone(), Role::User, code);
            template.id = id;
            state.storage.upsert_verified_phone(&template).await?
        }
    };

    let token = state.sessions.issue(user.id, user.role).await;
    tracing::info!("Phone verified for user {}", user.id);

    Ok(Json(ApiResponse::with_message(
        "Phone verified successfully",
        SessionGrant { token, user },
    )))
}

async fn staff_login(
    state: &AppState,
    input: LoginInput,
    role: Role,
) -> Result<Json<ApiResponse<SessionGrant<EmployeeView>>>, AppError> {
    let credentials = input.validate()?;
    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

    let user = state
        .storage
        .find_user_by_email(&credentials.email)
        .await?
        .filter(|u| u.role == role)
        .ok_or_else(invalid)?;

    let matches = user
        .password_hash
        .as_deref()
        .map_or(false, |stored| verify_password(&credentials.password, stored));
    if !matches {
        tracing::warn!("Failed {} login for user {}", role, user.id);
        return Err(invalid());
    }

    let token = state.sessions.issue(user.id, user.role).await;
    Ok(Json(ApiResponse::with_message(
        "Login successful",
        SessionGrant {
            token,
            user: EmployeeView::from(&user),
        },
    )))
}

/// POST /api/auth/admin/login
pub async fn admin_login(
    State(state): State<Arc<AppState>>,
    ApiJson(input): ApiJson<LoginInput>,
) -> Result<Json<ApiResponse<SessionGrant<EmployeeView>>>, AppError> {
    staff_login(&state, input, Role::Admin).await
}

/// POST /api/auth/employee/login
pub async fn employee_login(
    State(state): State<Arc<AppState>>,
    ApiJson(input): ApiJson<LoginInput>,
) -> Result<Json<ApiResponse<SessionGrant<EmployeeView>>>, AppError> {
    staff_login(&state, input, Role::Employee).await
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Json<ApiResponse<()>> {
    state.sessions.revoke(&auth.token).await;
    Json(ApiResponse::message("Logged out successfully"))
}

// ============ User ============

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let user = state.load_user(auth.session.user_id).await?;
    Ok(Json(ApiResponse::data(user)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSummary {
    pub plan: String,
    pub start_date: chrono::DateTime<chrono::Utc>,
    pub end_date: chrono::DateTime<chrono::Utc>,
}

/// POST /api/user/subscribe
///
/// Replaces the caller's subscription with the requested plan window.
pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiJson(input): ApiJson<SubscriptionInput>,
) -> Result<Json<ApiResponse<SubscriptionSummary>>, AppError> {
    let request = input.validate()?;
    let subscription = Subscription {
        plan: request.plan.clone(),
        start_date: request.start_date,
        end_date: request.end_date,
        payment_id: None,
        amount: None,
        is_active: request.end_date > chrono::Utc::now(),
    };

    if !state
        .storage
        .update_subscription(auth.session.user_id, &subscription)
        .await?
    {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(Json(ApiResponse::with_message(
        "Subscription created successfully",
        SubscriptionSummary {
            plan: request.plan,
            start_date: request.start_date,
            end_date: request.end_date,
        },
    )))
}

/// GET /api/user/cibil-check
///
/// Looks the caller up at the credit bureau using their KYC identity and
/// stores the returned score. Requires completed KYC.
pub async fn cibil_check(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let user = state.load_user(auth.session.user_id).await?;
    let kyc = user
        .kyc
        .as_ref()
        .filter(|k| k.status == KycStatus::Verified)
        .ok_or_else(|| AppError::BadRequest("KYC not completed".to_string()))?;

    let verified = kyc.verified.as_ref();
    let pan = verified
        .and_then(|v| v.pan_number.clone())
        .unwrap_or_else(|| kyc.declared.pan_number.clone());
    let name = verified
        .and_then(|v| v.verified_name.clone())
        .unwrap_or_else(|| kyc.declared.full_name());

    let score = state
        .bureau
        .fetch_score(&BureauQuery {
            pan: &pan,
            name: &name,
            mobile: &user.phone,
        })
        .await?
        .ok_or_else(|| AppError::BadRequest("Credit score not available from bureau".to_string()))?;

    state.storage.update_credit_score(user.id, score).await?;
    tracing::info!("Stored credit score for user {}", user.id);

    Ok(Json(ApiResponse::with_message(
        "Credit score fetched successfully",
        json!({ "creditScore": score }),
    )))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Eligibility {
    pub credit_score: i32,
    pub offer: OfferMatch,
}

/// GET /api/user/offer-eligibility
pub async fn offer_eligibility(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<Eligibility>>, AppError> {
    let user = state.load_user(auth.session.user_id).await?;
    let credit_score = user
        .credit_score
        .ok_or_else(|| AppError::BadRequest("Credit score not available".to_string()))?;
    let limit = state
        .storage
        .get_offer_limit()
        .await?
        .ok_or_else(|| AppError::NotFound("No offer limit found".to_string()))?;

    let offer = match_offer(credit_score, &limit.tiers);
    tracing::debug!("Offer match for user {}: {:?}", user.id, offer);

    Ok(Json(ApiResponse::data(Eligibility { credit_score, offer })))
}

// ============ Public catalogs ============

pub async fn list_loan_providers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<LoanProvider>>>, AppError> {
    let providers = Catalog::<LoanProvider>::new(state.storage.clone()).list().await?;
    Ok(Json(ApiResponse::data(providers)))
}

pub async fn get_loan_provider(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<LoanProvider>>, AppError> {
    let provider = Catalog::<LoanProvider>::new(state.storage.clone())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Loan provider not found".to_string()))?;
    Ok(Json(ApiResponse::data(provider)))
}

pub async fn list_credit_card_providers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<CreditCardProvider>>>, AppError> {
    let cards = Catalog::<CreditCardProvider>::new(state.storage.clone())
        .list()
        .await?;
    Ok(Json(ApiResponse::data(cards)))
}

pub async fn get_credit_card_provider(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<CreditCardProvider>>, AppError> {
    let card = Catalog::<CreditCardProvider>::new(state.storage.clone())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Credit card provider not found".to_string()))?;
    Ok(Json(ApiResponse::data(card)))
}

/// GET /api/offer-limits/list
pub async fn get_offer_limit(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<OfferLimit>>, AppError> {
    let limit = state
        .storage
        .get_offer_limit()
        .await?
        .ok_or_else(|| AppError::NotFound("No offer limit found".to_string()))?;
    Ok(Json(ApiResponse::data(limit)))
}

/// Creates a staff account with a hashed password. Used by the admin API and
/// the provisioning binary.
pub async fn provision_staff(
    storage: &dyn Storage,
    draft: crate::requests::EmployeeDraft,
    role: Role,
) -> Result<User, AppError> {
    if storage
        .staff_conflict_exists(&draft.email, &draft.phone, &draft.employee_id, None)
        .await?
    {
        return Err(AppError::Conflict(
            "Employee with provided email, phone, or employee ID already exists".to_string(),
        ));
    }

    let id = Uuid::new_v4();
    let code = referral::unused_code(storage, id).await?;
    let mut user = User::new(draft.phone, role, code);
    user.id = id;
    user.full_name = Some(draft.full_name);
    user.email = Some(draft.email);
    user.employee_id = Some(draft.employee_id);
    user.employee_address = Some(draft.address);
    user.password_hash = Some(hash_password(&draft.password)?);
    user.is_phone_verified = true;

    storage.insert_user(&user).await?;
    tracing::info!("Provisioned {} account {}", role, user.id);
    Ok(user)
}
