//! Persistence seam.
//!
//! Handlers talk to [`Storage`] only. [`MemoryStorage`] backs tests and local
//! runs without `DATABASE_URL`; `db_storage::PgStorage` backs production.
//! Both enforce the same uniqueness rules and the same atomic updates.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{CreditCardProvider, KycRecord, LoanProvider, OfferLimit, Role, Subscription, User};

/// Reference catalogs stored as JSON documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogKind {
    LoanProviders,
    CreditCardProviders,
}

impl CatalogKind {
    pub fn table(&self) -> &'static str {
        match self {
            CatalogKind::LoanProviders => "loan_providers",
            CatalogKind::CreditCardProviders => "credit_card_providers",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CatalogKind::LoanProviders => "Loan provider",
            CatalogKind::CreditCardProviders => "Credit card provider",
        }
    }
}

#[async_trait]
pub trait Storage: Send + Sync {
    // ---- users ----

    /// Fails with `Conflict` when phone, email, employee id or referral code is taken.
    async fn insert_user(&self, user: &User) -> Result<(), AppError>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, AppError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn find_user_by_referral_code(&self, code: &str) -> Result<Option<User>, AppError>;
    /// Any account already using one of these identifiers, other than `except`.
    async fn staff_conflict_exists(
        &self,
        email: &str,
        phone: &str,
        employee_id: &str,
        except: Option<Uuid>,
    ) -> Result<bool, AppError>;
    async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>, AppError>;
    /// Replaces the stored record. Last write wins. `false` when the id is unknown.
    async fn save_user(&self, user: &User) -> Result<bool, AppError>;
    /// Deletes only when the stored role matches.
    async fn delete_user(&self, id: Uuid, role: Role) -> Result<bool, AppError>;
    /// Atomically returns the user holding `template.phone`, marking it
    /// verified, or inserts `template` when no such user exists.
    async fn upsert_verified_phone(&self, template: &User) -> Result<User, AppError>;

    // ---- embedded sub-records ----

    /// Records `code` as the referrer of `referred_id`. With `only_if_unset`
    /// the write happens only when no referrer was recorded yet; the return
    /// value says whether it happened.
    async fn claim_referral(
        &self,
        referred_id: Uuid,
        code: &str,
        only_if_unset: bool,
    ) -> Result<bool, AppError>;
    /// Undoes a claim whose bonus was never credited: when `referred_id` still
    /// records `code`, its referrer goes back to `restore`.
    async fn release_referral(
        &self,
        referred_id: Uuid,
        code: &str,
        restore: Option<&str>,
    ) -> Result<bool, AppError>;
    /// Adds `amount` to the bonus of the code holder in one storage-level
    /// update. Returns the new balance, or `None` for an unknown code.
    async fn increment_referral_bonus(&self, code: &str, amount: i64) -> Result<Option<i64>, AppError>;
    async fn update_kyc(&self, id: Uuid, kyc: &KycRecord) -> Result<bool, AppError>;
    /// Overwrites the whole subscription sub-record.
    async fn update_subscription(&self, id: Uuid, subscription: &Subscription) -> Result<bool, AppError>;
    async fn update_credit_score(&self, id: Uuid, score: i32) -> Result<bool, AppError>;

    // ---- catalogs ----

    /// Fails with `Conflict` when `name` is already used in the catalog.
    async fn insert_catalog(&self, kind: CatalogKind, id: Uuid, name: &str, doc: Value) -> Result<(), AppError>;
    async fn list_catalog(&self, kind: CatalogKind) -> Result<Vec<Value>, AppError>;
    async fn get_catalog(&self, kind: CatalogKind, id: Uuid) -> Result<Option<Value>, AppError>;
    async fn replace_catalog(&self, kind: CatalogKind, id: Uuid, name: &str, doc: Value) -> Result<bool, AppError>;
    async fn delete_catalog(&self, kind: CatalogKind, id: Uuid) -> Result<bool, AppError>;

    // ---- offer limit (singleton) ----

    async fn get_offer_limit(&self) -> Result<Option<OfferLimit>, AppError>;
    async fn upsert_offer_limit(&self, limit: &OfferLimit) -> Result<OfferLimit, AppError>;
}

// ============ Typed catalogs ============

/// A catalog document with a stable id and a unique display name.
pub trait CatalogEntry: Serialize + DeserializeOwned + Send + Sync {
    const KIND: CatalogKind;

    fn id(&self) -> Uuid;
    fn name(&self) -> &str;
}

impl CatalogEntry for LoanProvider {
    const KIND: CatalogKind = CatalogKind::LoanProviders;

    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.loan_name
    }
}

impl CatalogEntry for CreditCardProvider {
    const KIND: CatalogKind = CatalogKind::CreditCardProviders;

    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.card_name
    }
}

/// Typed view over one catalog.
pub struct Catalog<T> {
    storage: Arc<dyn Storage>,
    _entry: PhantomData<fn() -> T>,
}

impl<T: CatalogEntry> Catalog<T> {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            _entry: PhantomData,
        }
    }

    pub async fn create(&self, entry: &T) -> Result<(), AppError> {
        self.storage
            .insert_catalog(T::KIND, entry.id(), entry.name(), to_doc(entry)?)
            .await
    }

    pub async fn list(&self) -> Result<Vec<T>, AppError> {
        self.storage
            .list_catalog(T::KIND)
            .await?
            .into_iter()
            .map(from_doc)
            .collect()
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<T>, AppError> {
        self.storage
            .get_catalog(T::KIND, id)
            .await?
            .map(from_doc)
            .transpose()
    }

    pub async fn replace(&self, entry: &T) -> Result<bool, AppError> {
        self.storage
            .replace_catalog(T::KIND, entry.id(), entry.name(), to_doc(entry)?)
            .await
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        self.storage.delete_catalog(T::KIND, id).await
    }
}

fn to_doc<T: Serialize>(entry: &T) -> Result<Value, AppError> {
    serde_json::to_value(entry)
        .map_err(|e| AppError::InternalError(format!("Failed to encode catalog entry: {}", e)))
}

fn from_doc<T: DeserializeOwned>(doc: Value) -> Result<T, AppError> {
    serde_json::from_value(doc)
        .map_err(|e| AppError::InternalError(format!("Stored catalog entry is unreadable: {}", e)))
}

// ============ In-memory implementation ============

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    /// Insertion order is kept so listings are stable.
    catalogs: HashMap<CatalogKind, Vec<(Uuid, String, Value)>>,
    offer_limit: Option<OfferLimit>,
}

impl MemoryState {
    /// Name of the first unique user field that `user` would duplicate.
    fn user_conflict(&self, user: &User) -> Option<&'static str> {
        self.users.values().filter(|u| u.id != user.id).find_map(|other| {
            if other.phone == user.phone {
                Some("phone")
            } else if user.email.is_some() && other.email == user.email {
                Some("email")
            } else if user.employee_id.is_some() && other.employee_id == user.employee_id {
                Some("employee ID")
            } else if other.referral_code == user.referral_code {
                Some("referral code")
            } else {
                None
            }
        })
    }
}

/// Process-local store guarded by one `RwLock`. Each trait call holds the lock
/// for its whole read-modify-write, which gives the same atomicity as the
/// single-statement updates of the Postgres store.
#[derive(Default, Clone)]
pub struct MemoryStorage {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if let Some(field) = state.user_conflict(user) {
            return Err(AppError::Conflict(format!("A user with this {} already exists", field)));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, AppError> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.phone == phone).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn find_user_by_referral_code(&self, code: &str) -> Result<Option<User>, AppError> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.referral_code == code).cloned())
    }

    async fn staff_conflict_exists(
        &self,
        email: &str,
        phone: &str,
        employee_id: &str,
        except: Option<Uuid>,
    ) -> Result<bool, AppError> {
        let state = self.state.read().await;
        Ok(state.users.values().any(|u| {
            Some(u.id) != except
                && (u.phone == phone
                    || u.email.as_deref() == Some(email)
                    || u.employee_id.as_deref() == Some(employee_id))
        }))
    }

    async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>, AppError> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state.users.values().filter(|u| u.role == role).cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn save_user(&self, user: &User) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&user.id) {
            return Ok(false);
        }
        if let Some(field) = state.user_conflict(user) {
            return Err(AppError::Conflict(format!("A user with this {} already exists", field)));
        }
        let mut stored = user.clone();
        stored.updated_at = chrono::Utc::now();
        state.users.insert(user.id, stored);
        Ok(true)
    }

    async fn delete_user(&self, id: Uuid, role: Role) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        match state.users.get(&id) {
            Some(u) if u.role == role => {
                state.users.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn upsert_verified_phone(&self, template: &User) -> Result<User, AppError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.users.values_mut().find(|u| u.phone == template.phone) {
            existing.is_phone_verified = true;
            existing.updated_at = chrono::Utc::now();
            return Ok(existing.clone());
        }
        if let Some(field) = state.user_conflict(template) {
            return Err(AppError::Conflict(format!("A user with this {} already exists", field)));
        }
        let mut user = template.clone();
        user.is_phone_verified = true;
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn claim_referral(
        &self,
        referred_id: Uuid,
        code: &str,
        only_if_unset: bool,
    ) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        match state.users.get_mut(&referred_id) {
            Some(user) if !only_if_unset || user.referred_by.is_none() => {
                user.referred_by = Some(code.to_string());
                user.updated_at = chrono::Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_referral(
        &self,
        referred_id: Uuid,
        code: &str,
        restore: Option<&str>,
    ) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        match state.users.get_mut(&referred_id) {
            Some(user) if user.referred_by.as_deref() == Some(code) => {
                user.referred_by = restore.map(str::to_string);
                user.updated_at = chrono::Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn increment_referral_bonus(&self, code: &str, amount: i64) -> Result<Option<i64>, AppError> {
        let mut state = self.state.write().await;
        Ok(state
            .users
            .values_mut()
            .find(|u| u.referral_code == code)
            .map(|holder| {
                holder.referral_bonus += amount;
                holder.updated_at = chrono::Utc::now();
                holder.referral_bonus
            }))
    }

    async fn update_kyc(&self, id: Uuid, kyc: &KycRecord) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        Ok(state
            .users
            .get_mut(&id)
            .map(|u| {
                u.kyc = Some(kyc.clone());
                u.updated_at = chrono::Utc::now();
            })
            .is_some())
    }

    async fn update_subscription(&self, id: Uuid, subscription: &Subscription) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        Ok(state
            .users
            .get_mut(&id)
            .map(|u| {
                u.subscription = Some(subscription.clone());
                u.updated_at = chrono::Utc::now();
            })
            .is_some())
    }

    async fn update_credit_score(&self, id: Uuid, score: i32) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        Ok(state
            .users
            .get_mut(&id)
            .map(|u| {
                u.credit_score = Some(score);
                u.updated_at = chrono::Utc::now();
            })
            .is_some())
    }

    async fn insert_catalog(&self, kind: CatalogKind, id: Uuid, name: &str, doc: Value) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        let entries = state.catalogs.entry(kind).or_default();
        if entries.iter().any(|(_, n, _)| n == name) {
            return Err(AppError::Conflict(format!("{} with this name already exists", kind.label())));
        }
        entries.push((id, name.to_string(), doc));
        Ok(())
    }

    async fn list_catalog(&self, kind: CatalogKind) -> Result<Vec<Value>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .catalogs
            .get(&kind)
            .map(|entries| entries.iter().map(|(_, _, doc)| doc.clone()).collect())
            .unwrap_or_default())
    }

    async fn get_catalog(&self, kind: CatalogKind, id: Uuid) -> Result<Option<Value>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .catalogs
            .get(&kind)
            .and_then(|entries| entries.iter().find(|(i, _, _)| *i == id))
            .map(|(_, _, doc)| doc.clone()))
    }

    async fn replace_catalog(&self, kind: CatalogKind, id: Uuid, name: &str, doc: Value) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        let entries = state.catalogs.entry(kind).or_default();
        if entries.iter().any(|(i, n, _)| *i != id && n == name) {
            return Err(AppError::Conflict(format!("{} with this name already exists", kind.label())));
        }
        match entries.iter_mut().find(|(i, _, _)| *i == id) {
            Some(slot) => {
                *slot = (id, name.to_string(), doc);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_catalog(&self, kind: CatalogKind, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        let entries = state.catalogs.entry(kind).or_default();
        let before = entries.len();
        entries.retain(|(i, _, _)| *i != id);
        Ok(entries.len() != before)
    }

    async fn get_offer_limit(&self) -> Result<Option<OfferLimit>, AppError> {
        Ok(self.state.read().await.offer_limit.clone())
    }

    async fn upsert_offer_limit(&self, limit: &OfferLimit) -> Result<OfferLimit, AppError> {
        let mut state = self.state.write().await;
        state.offer_limit = Some(limit.clone());
        Ok(limit.clone())
    }
}
