use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::errors::{AppError, ResultExt};
use crate::models::{KycRecord, OfferLimit, Role, ScoreTier, Subscription, User};
use crate::storage::{CatalogKind, Storage};

const USER_COLUMNS: &str = "id, full_name, email, phone, role, is_phone_verified, password_hash, \
     employee_id, employee_address, kyc, subscription, credit_score, referral_code, \
     referral_bonus, referred_by, created_at, updated_at";

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    full_name: Option<String>,
    email: Option<String>,
    phone: String,
    role: String,
    is_phone_verified: bool,
    password_hash: Option<String>,
    employee_id: Option<String>,
    employee_address: Option<String>,
    kyc: Option<Json<KycRecord>>,
    subscription: Option<Json<Subscription>>,
    credit_score: Option<i32>,
    referral_code: String,
    referral_bonus: i64,
    referred_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<Role>()
            .map_err(|e| AppError::InternalError(format!("User {}: {}", row.id, e)))?;
        Ok(User {
            id: row.id,
            full_name: row.full_name,
            email: row.email,
            phone: row.phone,
            role,
            is_phone_verified: row.is_phone_verified,
            password_hash: row.password_hash,
            employee_id: row.employee_id,
            employee_address: row.employee_address,
            kyc: row.kyc.map(|Json(k)| k),
            subscription: row.subscription.map(|Json(s)| s),
            credit_score: row.credit_score,
            referral_code: row.referral_code,
            referral_bonus: row.referral_bonus,
            referred_by: row.referred_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Maps unique-constraint violations to `Conflict`, everything else to a database error.
fn write_error(err: sqlx::Error, what: &str) -> AppError {
    let unique = err
        .as_database_error()
        .map_or(false, |db| db.is_unique_violation());
    if unique {
        AppError::Conflict(format!("{} already exists", what))
    } else {
        AppError::DatabaseError(err)
    }
}

/// PostgreSQL-backed store
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_user(&self, filter: &str, value: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE {} = $1 LIMIT 1", USER_COLUMNS, filter);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to load user by {}", filter))?
            .map(User::try_from)
            .transpose()
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, full_name, email, phone, role, is_phone_verified, password_hash,
                employee_id, employee_address, kyc, subscription, credit_score,
                referral_code, referral_bonus, referred_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(user.id)
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(user.role.as_str())
        .bind(user.is_phone_verified)
        .bind(&user.password_hash)
        .bind(&user.employee_id)
        .bind(&user.employee_address)
        .bind(user.kyc.as_ref().map(Json))
        .bind(user.subscription.as_ref().map(Json))
        .bind(user.credit_score)
        .bind(&user.referral_code)
        .bind(user.referral_bonus)
        .bind(&user.referred_by)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, "User with this phone, email or employee ID"))?;

        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?
            .map(User::try_from)
            .transpose()
    }

    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, AppError> {
        self.fetch_user("phone", phone).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.fetch_user("email", email).await
    }

    async fn find_user_by_referral_code(&self, code: &str) -> Result<Option<User>, AppError> {
        self.fetch_user("referral_code", code).await
    }

    async fn staff_conflict_exists(
        &self,
        email: &str,
        phone: &str,
        employee_id: &str,
        except: Option<Uuid>,
    ) -> Result<bool, AppError> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM users
                WHERE (email = $1 OR phone = $2 OR employee_id = $3)
                  AND ($4::uuid IS NULL OR id <> $4)
            )
            "#,
        )
        .bind(email)
        .bind(phone)
        .bind(employee_id)
        .bind(except)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(exists)
    }

    async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>, AppError> {
        let sql = format!(
            "SELECT {} FROM users WHERE role = $1 ORDER BY created_at",
            USER_COLUMNS
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(role.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    async fn save_user(&self, user: &User) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET full_name = $2,
                email = $3,
                phone = $4,
                role = $5,
                is_phone_verified = $6,
                password_hash = $7,
                employee_id = $8,
                employee_address = $9,
                kyc = $10,
                subscription = $11,
                credit_score = $12,
                referral_bonus = $13,
                referred_by = $14,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(user.role.as_str())
        .bind(user.is_phone_verified)
        .bind(&user.password_hash)
        .bind(&user.employee_id)
        .bind(&user.employee_address)
        .bind(user.kyc.as_ref().map(Json))
        .bind(user.subscription.as_ref().map(Json))
        .bind(user.credit_score)
        .bind(user.referral_bonus)
        .bind(&user.referred_by)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, "User with this phone, email or employee ID"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_user(&self, id: Uuid, role: Role) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1 AND role = $2")
            .bind(id)
            .bind(role.as_str())
            .execute(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        Ok(result.rows_affected() > 0)
    }

    async fn upsert_verified_phone(&self, template: &User) -> Result<User, AppError> {
        // Single statement: two concurrent verifications of one phone converge on one row.
        let sql = format!(
            r#"
            INSERT INTO users (id, phone, role, is_phone_verified, referral_code, referral_bonus, created_at, updated_at)
            VALUES ($1, $2, $3, TRUE, $4, 0, $5, $5)
            ON CONFLICT (phone) DO UPDATE
            SET is_phone_verified = TRUE,
                updated_at = now()
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(template.id)
            .bind(&template.phone)
            .bind(template.role.as_str())
            .bind(&template.referral_code)
            .bind(template.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| write_error(e, "Referral code"))?;

        User::try_from(row)
    }

    async fn claim_referral(
        &self,
        referred_id: Uuid,
        code: &str,
        only_if_unset: bool,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET referred_by = $2, updated_at = now()
            WHERE id = $1 AND (NOT $3 OR referred_by IS NULL)
            "#,
        )
        .bind(referred_id)
        .bind(code)
        .bind(only_if_unset)
        .execute(&self.pool)
        .await
        .context("Failed to record referral")?;

        Ok(result.rows_affected() > 0)
    }

    async fn release_referral(
        &self,
        referred_id: Uuid,
        code: &str,
        restore: Option<&str>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET referred_by = $3, updated_at = now()
            WHERE id = $1 AND referred_by = $2
            "#,
        )
        .bind(referred_id)
        .bind(code)
        .bind(restore)
        .execute(&self.pool)
        .await
        .context("Failed to release referral")?;

        Ok(result.rows_affected() > 0)
    }

    async fn increment_referral_bonus(&self, code: &str, amount: i64) -> Result<Option<i64>, AppError> {
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            UPDATE users
            SET referral_bonus = referral_bonus + $2, updated_at = now()
            WHERE referral_code = $1
            RETURNING referral_bonus
            "#,
        )
        .bind(code)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to increment referral bonus")?;

        Ok(row.map(|(bonus,)| bonus))
    }

    async fn update_kyc(&self, id: Uuid, kyc: &KycRecord) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE users SET kyc = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(Json(kyc))
            .execute(&self.pool)
            .await
            .context("Failed to store KYC record")?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_subscription(&self, id: Uuid, subscription: &Subscription) -> Result<bool, AppError> {
        let result =
            sqlx::query("UPDATE users SET subscription = $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(Json(subscription))
                .execute(&self.pool)
                .await
                .context("Failed to store subscription")?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_credit_score(&self, id: Uuid, score: i32) -> Result<bool, AppError> {
        let result =
            sqlx::query("UPDATE users SET credit_score = $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(score)
                .execute(&self.pool)
                .await
                .context("Failed to store credit score")?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_catalog(&self, kind: CatalogKind, id: Uuid, name: &str, doc: Value) -> Result<(), AppError> {
        let sql = format!("INSERT INTO {} (id, name, doc) VALUES ($1, $2, $3)", kind.table());
        sqlx::query(&sql)
            .bind(id)
            .bind(name)
            .bind(doc)
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, &format!("{} with this name", kind.label())))?;

        Ok(())
    }

    async fn list_catalog(&self, kind: CatalogKind) -> Result<Vec<Value>, AppError> {
        let sql = format!("SELECT doc FROM {} ORDER BY created_at", kind.table());
        let rows: Vec<(Value,)> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        Ok(rows.into_iter().map(|(doc,)| doc).collect())
    }

    async fn get_catalog(&self, kind: CatalogKind, id: Uuid) -> Result<Option<Value>, AppError> {
        let sql = format!("SELECT doc FROM {} WHERE id = $1", kind.table());
        let row: Option<(Value,)> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        Ok(row.map(|(doc,)| doc))
    }

    async fn replace_catalog(&self, kind: CatalogKind, id: Uuid, name: &str, doc: Value) -> Result<bool, AppError> {
        let sql = format!(
            "UPDATE {} SET name = $2, doc = $3, updated_at = now() WHERE id = $1",
            kind.table()
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(name)
            .bind(doc)
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, &format!("{} with this name", kind.label())))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_catalog(&self, kind: CatalogKind, id: Uuid) -> Result<bool, AppError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", kind.table());
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_offer_limit(&self) -> Result<Option<OfferLimit>, AppError> {
        let row: Option<(String, Json<Vec<ScoreTier>>, DateTime<Utc>)> =
            sqlx::query_as("SELECT name, tiers, updated_at FROM offer_limit WHERE id = 1")
                .fetch_optional(&self.pool)
                .await
                .map_err(AppError::DatabaseError)?;

        Ok(row.map(|(name, Json(tiers), updated_at)| OfferLimit {
            name,
            tiers,
            updated_at,
        }))
    }

    async fn upsert_offer_limit(&self, limit: &OfferLimit) -> Result<OfferLimit, AppError> {
        let (name, Json(tiers), updated_at): (String, Json<Vec<ScoreTier>>, DateTime<Utc>) =
            sqlx::query_as(
                r#"
                INSERT INTO offer_limit (id, name, tiers, updated_at)
                VALUES (1, $1, $2, $3)
                ON CONFLICT (id) DO UPDATE
                SET name = EXCLUDED.name,
                    tiers = EXCLUDED.tiers,
                    updated_at = EXCLUDED.updated_at
                RETURNING name, tiers, updated_at
                "#,
            )
            .bind(&limit.name)
            .bind(Json(&limit.tiers))
            .bind(limit.updated_at)
            .fetch_one(&self.pool)
            .await
            .context("Failed to store offer limit")?;

        Ok(OfferLimit {
            name,
            tiers,
            updated_at,
        })
    }
}
