//! Referral codes and the bonus adjuster.
//!
//! Every user gets a short code at creation. When a new user quotes a code
//! during KYC start, the code holder's bonus grows by a fixed increment. A bad
//! code is an outcome, never an error: KYC start must not fail because of it.

use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::errors::AppError;
use crate::storage::Storage;

pub const REFERRAL_CODE_LEN: usize = 6;

/// Derived code for `user_id`. `attempt` varies the digest after a collision.
pub fn derive_code(user_id: Uuid, attempt: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(attempt.to_be_bytes());
    let digest = hex::encode_upper(hasher.finalize());
    digest[..REFERRAL_CODE_LEN].to_string()
}

/// First derived code for `user_id` that no stored user holds yet.
pub async fn unused_code(storage: &dyn Storage, user_id: Uuid) -> Result<String, AppError> {
    for attempt in 0..16 {
        let code = derive_code(user_id, attempt);
        if storage.find_user_by_referral_code(&code).await?.is_none() {
            return Ok(code);
        }
        tracing::debug!("Referral code collision on attempt {}", attempt);
    }
    Err(AppError::InternalError(
        "Could not derive an unused referral code".to_string(),
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ReferralOutcome {
    #[serde(rename_all = "camelCase")]
    Credited { new_bonus: i64 },
    /// No user holds the code, or the caller quoted their own code.
    InvalidCode,
    /// The referred user was already credited once.
    AlreadyCredited,
}

#[derive(Debug, Clone, Copy)]
pub struct ReferralPolicy {
    pub increment: i64,
    pub once_per_user: bool,
}

/// Credits the holder of `code` on behalf of `referred_id`.
///
/// The bonus write is a single storage-level increment, so concurrent
/// referrals of the same holder never lose an update. A claim whose bonus
/// could not be credited is released again.
pub async fn adjust(
    storage: &dyn Storage,
    policy: ReferralPolicy,
    referred_id: Uuid,
    code: &str,
) -> Result<ReferralOutcome, AppError> {
    let code = code.trim().to_uppercase();
    if code.len() != REFERRAL_CODE_LEN {
        return Ok(ReferralOutcome::InvalidCode);
    }

    let holder = match storage.find_user_by_referral_code(&code).await? {
        Some(holder) if holder.id != referred_id => holder,
        _ => return Ok(ReferralOutcome::InvalidCode),
    };

    let previous = storage
        .find_user(referred_id)
        .await?
        .and_then(|referred| referred.referred_by);
    let claimed = storage
        .claim_referral(referred_id, &code, policy.once_per_user)
        .await?;
    if !claimed {
        tracing::info!("User {} already credited a referral, skipping", referred_id);
        return Ok(ReferralOutcome::AlreadyCredited);
    }

    let credited = storage.increment_referral_bonus(&code, policy.increment).await;
    if !matches!(credited, Ok(Some(_))) {
        tracing::warn!(
            "Referral bonus for user {} was not credited, releasing the claim by {}",
            holder.id,
            referred_id
        );
        storage
            .release_referral(referred_id, &code, previous.as_deref())
            .await?;
    }

    match credited? {
        Some(new_bonus) => {
            tracing::info!(
                "Referral bonus +{} credited to user {} (new balance {})",
                policy.increment,
                holder.id,
                new_bonus
            );
            Ok(ReferralOutcome::Credited { new_bonus })
        }
        None => Ok(ReferralOutcome::InvalidCode),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{KycRecord, OfferLimit, Role, Subscription, User};
    use crate::storage::{CatalogKind, MemoryStorage};
    use async_trait::async_trait;
    use serde_json::Value;

    /// Memory store whose bonus increment never lands: the holder is gone by
    /// then, or the write itself fails.
    struct CreditFails {
        inner: MemoryStorage,
        error: bool,
    }

    #[async_trait]
    impl Storage for CreditFails {
        async fn insert_user(&self, user: &User) -> Result<(), AppError> {
            self.inner.insert_user(user).await
        }
        async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
            self.inner.find_user(id).await
        }
        async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, AppError> {
            self.inner.find_user_by_phone(phone).await
        }
        async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
            self.inner.find_user_by_email(email).await
        }
        async fn find_user_by_referral_code(&self, code: &str) -> Result<Option<User>, AppError> {
            self.inner.find_user_by_referral_code(code).await
        }
        async fn staff_conflict_exists(
            &self,
            email: &str,
            phone: &str,
            employee_id: &str,
            except: Option<Uuid>,
        ) -> Result<bool, AppError> {
            self.inner
                .staff_conflict_exists(email, phone, employee_id, except)
                .await
        }
        async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>, AppError> {
            self.inner.list_users_by_role(role).await
        }
        async fn save_user(&self, user: &User) -> Result<bool, AppError> {
            self.inner.save_user(user).await
        }
        async fn delete_user(&self, id: Uuid, role: Role) -> Result<bool, AppError> {
            self.inner.delete_user(id, role).await
        }
        async fn upsert_verified_phone(&self, template: &User) -> Result<User, AppError> {
            self.inner.upsert_verified_phone(template).await
        }
        async fn claim_referral(
            &self,
            referred_id: Uuid,
            code: &str,
            only_if_unset: bool,
        ) -> Result<bool, AppError> {
            self.inner
                .claim_referral(referred_id, code, only_if_unset)
                .await
        }
        async fn release_referral(
            &self,
            referred_id: Uuid,
            code: &str,
            restore: Option<&str>,
        ) -> Result<bool, AppError> {
            self.inner.release_referral(referred_id, code, restore).await
        }
        async fn increment_referral_bonus(&self, _code: &str, _amount: i64) -> Result<Option<i64>, AppError> {
            if self.error {
                Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut))
            } else {
                Ok(None)
            }
        }
        async fn update_kyc(&self, id: Uuid, kyc: &KycRecord) -> Result<bool, AppError> {
            self.inner.update_kyc(id, kyc).await
        }
        async fn update_subscription(&self, id: Uuid, subscription: &Subscription) -> Result<bool, AppError> {
            self.inner.update_subscription(id, subscription).await
        }
        async fn update_credit_score(&self, id: Uuid, score: i32) -> Result<bool, AppError> {
            self.inner.update_credit_score(id, score).await
        }
        async fn insert_catalog(&self, kind: CatalogKind, id: Uuid, name: &str, doc: Value) -> Result<(), AppError> {
            self.inner.insert_catalog(kind, id, name, doc).await
        }
        async fn list_catalog(&self, kind: CatalogKind) -> Result<Vec<Value>, AppError> {
            self.inner.list_catalog(kind).await
        }
        async fn get_catalog(&self, kind: CatalogKind, id: Uuid) -> Result<Option<Value>, AppError> {
            self.inner.get_catalog(kind, id).await
        }
        async fn replace_catalog(&self, kind: CatalogKind, id: Uuid, name: &str, doc: Value) -> Result<bool, AppError> {
            self.inner.replace_catalog(kind, id, name, doc).await
        }
        async fn delete_catalog(&self, kind: CatalogKind, id: Uuid) -> Result<bool, AppError> {
            self.inner.delete_catalog(kind, id).await
        }
        async fn get_offer_limit(&self) -> Result<Option<OfferLimit>, AppError> {
            self.inner.get_offer_limit().await
        }
        async fn upsert_offer_limit(&self, limit: &OfferLimit) -> Result<OfferLimit, AppError> {
            self.inner.upsert_offer_limit(limit).await
        }
    }

    const POLICY: ReferralPolicy = ReferralPolicy {
        increment: 100,
        once_per_user: true,
    };

    async fn seeded() -> (MemoryStorage, User, User) {
        let store = MemoryStorage::new();
        let holder = User::new("9100000001", Role::User, "ABC123".to_string());
        let referred = User::new("9100000002", Role::User, "DEF456".to_string());
        store.insert_user(&holder).await.unwrap();
        store.insert_user(&referred).await.unwrap();
        (store, holder, referred)
    }

    #[test]
    fn derived_codes_are_six_uppercase_hex_chars() {
        let id = Uuid::new_v4();
        let code = derive_code(id, 0);
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        assert_eq!(code, derive_code(id, 0));
        assert_ne!(code, derive_code(id, 1));
    }

    #[tokio::test]
    async fn known_code_is_credited() {
        let (store, holder, referred) = seeded().await;
        let outcome = adjust(&store, POLICY, referred.id, "abc123").await.unwrap();
        assert_eq!(outcome, ReferralOutcome::Credited { new_bonus: 100 });
        let holder = store.find_user(holder.id).await.unwrap().unwrap();
        assert_eq!(holder.referral_bonus, 100);
    }

    #[tokio::test]
    async fn unknown_code_is_not_an_error() {
        let (store, holder, referred) = seeded().await;
        let outcome = adjust(&store, POLICY, referred.id, "ZZZ999").await.unwrap();
        assert_eq!(outcome, ReferralOutcome::InvalidCode);
        let holder = store.find_user(holder.id).await.unwrap().unwrap();
        assert_eq!(holder.referral_bonus, 0);
    }

    #[tokio::test]
    async fn own_code_is_invalid() {
        let (store, _, referred) = seeded().await;
        let outcome = adjust(&store, POLICY, referred.id, "DEF456").await.unwrap();
        assert_eq!(outcome, ReferralOutcome::InvalidCode);
    }

    #[tokio::test]
    async fn uncredited_claim_is_released() {
        for error in [false, true] {
            let (inner, _, referred) = seeded().await;
            let store = CreditFails { inner, error };

            let outcome = adjust(&store, POLICY, referred.id, "ABC123").await;
            match outcome {
                Ok(outcome) => {
                    assert!(!error);
                    assert_eq!(outcome, ReferralOutcome::InvalidCode);
                }
                Err(e) => {
                    assert!(error);
                    assert!(matches!(e, AppError::DatabaseError(_)));
                }
            }

            let stored = store.find_user(referred.id).await.unwrap().unwrap();
            assert_eq!(stored.referred_by, None);
        }
    }

    #[tokio::test]
    async fn repeat_referral_is_guarded_by_policy() {
        let (store, holder, referred) = seeded().await;
        adjust(&store, POLICY, referred.id, "ABC123").await.unwrap();
        let again = adjust(&store, POLICY, referred.id, "ABC123").await.unwrap();
        assert_eq!(again, ReferralOutcome::AlreadyCredited);

        let lenient = ReferralPolicy {
            once_per_user: false,
            ..POLICY
        };
        let third = adjust(&store, lenient, referred.id, "ABC123").await.unwrap();
        assert_eq!(third, ReferralOutcome::Credited { new_bonus: 200 });
        let holder = store.find_user(holder.id).await.unwrap().unwrap();
        assert_eq!(holder.referral_bonus, 200);
    }
}
