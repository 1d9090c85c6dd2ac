//! Password hashing, bearer sessions and role guards.
//!
//! Sessions are opaque random tokens held in a TTL cache. A restart signs
//! everybody out, which is acceptable for this service.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::Role;

pub fn constant_time_compare(a: &str, b: &str) -> bool {
    bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

/// Argon2id hash in PHC string form (`$argon2id$v=19$...`).
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::InternalError(format!("Password hashing failed: {}", e)))
}

/// False for any malformed stored hash.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

// ============ Sessions ============

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
    pub role: Role,
}

/// The cache refuses lifetimes beyond a thousand years; sessions cap at one.
const MAX_SESSION_TTL_HOURS: u64 = 24 * 365;

#[derive(Clone)]
pub struct SessionStore {
    cache: Cache<String, Session>,
}

impl SessionStore {
    pub fn new(ttl_hours: u64) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(100_000)
                .time_to_live(Duration::from_secs(
                    ttl_hours.min(MAX_SESSION_TTL_HOURS).saturating_mul(3600),
                ))
                .build(),
        }
    }

    /// Issues a fresh bearer token for `user_id`.
    pub async fn issue(&self, user_id: Uuid, role: Role) -> String {
        let token = format!(
            "{}{}",
            Uuid::new_v4().simple(),
            Uuid::new_v4().simple()
        );
        self.cache.insert(token.clone(), Session { user_id, role }).await;
        tracing::debug!("Session issued for user {} ({})", user_id, role);
        token
    }

    pub async fn resolve(&self, token: &str) -> Option<Session> {
        self.cache.get(token).await
    }

    pub async fn revoke(&self, token: &str) {
        self.cache.invalidate(token).await;
    }
}

// ============ OTP challenges ============

const OTP_CHALLENGE_TTL: Duration = Duration::from_secs(10 * 60);

/// Pending OTP verifications, keyed by verification id. Only the phone the
/// code was sent to may redeem it.
#[derive(Clone)]
pub struct OtpChallenges {
    cache: Cache<String, String>,
}

impl OtpChallenges {
    pub fn new() -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(100_000)
                .time_to_live(OTP_CHALLENGE_TTL)
                .build(),
        }
    }

    pub async fn register(&self, verification_id: &str, phone: &str) {
        self.cache
            .insert(verification_id.to_string(), phone.to_string())
            .await;
    }

    /// Fails unless `verification_id` was issued to `phone` and is still pending.
    pub async fn check(&self, verification_id: &str, phone: &str) -> Result<(), AppError> {
        match self.cache.get(verification_id).await {
            Some(owner) if constant_time_compare(&owner, phone) => Ok(()),
            _ => Err(AppError::Unauthorized(
                "Invalid or expired verification".to_string(),
            )),
        }
    }

    pub async fn consume(&self, verification_id: &str) {
        self.cache.invalidate(verification_id).await;
    }
}

impl Default for OtpChallenges {
    fn default() -> Self {
        Self::new()
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

// ============ Extractors ============

/// Any signed-in account.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub token: String,
    pub session: Session,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("Unauthorized: Token missing".to_string()))?;
        let session = state
            .sessions
            .resolve(token)
            .await
            .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".to_string()))?;
        Ok(AuthUser {
            token: token.to_string(),
            session,
        })
    }
}

/// Admins only.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Session);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        if auth.session.role != Role::Admin {
            return Err(AppError::Forbidden("Forbidden: Access denied".to_string()));
        }
        Ok(AdminUser(auth.session))
    }
}

/// Admins and employees.
#[derive(Debug, Clone)]
pub struct StaffUser(pub Session);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for StaffUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        if !auth.session.role.is_staff() {
            return Err(AppError::Forbidden("Forbidden: Access denied".to_string()));
        }
        Ok(StaffUser(auth.session))
    }
}
