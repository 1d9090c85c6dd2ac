use std::env;
use std::sync::Arc;
use uuid::Uuid;

use chrono::Utc;
use lendwise_api::db::Database;
use lendwise_api::db_storage::PgStorage;
use lendwise_api::models::{
    DeclaredKyc, EmploymentStatus, KycRecord, KycStatus, OfferLimit, Role, ScoreTier, User,
    VerifiedProfile,
};
use lendwise_api::referral::{self, ReferralOutcome, ReferralPolicy};
use lendwise_api::storage::Storage;

async fn connect() -> anyhow::Result<PgStorage> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;
    let db = Database::new(&db_url).await?;
    Ok(PgStorage::new(db.pool.clone()))
}

/// Unique ten-digit phone so repeated runs never collide.
fn test_phone() -> String {
    format!("7{:09}", Uuid::new_v4().as_u128() % 1_000_000_000)
}

async fn new_user(storage: &PgStorage) -> anyhow::Result<User> {
    let id = Uuid::new_v4();
    let code = referral::unused_code(storage, id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let mut template = User::new(test_phone(), Role::User, code);
    template.id = id;
    storage
        .upsert_verified_phone(&template)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))
}

/// Phone verification against Postgres is idempotent per phone.
/// Marked ignored to avoid running against production by accident; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn verified_phone_upsert_is_idempotent() -> anyhow::Result<()> {
    let storage = connect().await?;
    let first = new_user(&storage).await?;

    let mut again = User::new(first.phone.clone(), Role::User, "000000".to_string());
    again.id = Uuid::new_v4();
    let second = storage
        .upsert_verified_phone(&again)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    assert_eq!(first.id, second.id);
    assert_eq!(first.referral_code, second.referral_code);
    assert!(second.is_phone_verified);
    Ok(())
}

/// The KYC sub-record, verified profile included, reads back unchanged.
#[tokio::test]
#[ignore]
async fn kyc_record_round_trip() -> anyhow::Result<()> {
    let storage = connect().await?;
    let user = new_user(&storage).await?;

    let record = KycRecord {
        declared: DeclaredKyc {
            first_name: "Asha".to_string(),
            last_name: "Rao".to_string(),
            gender: "F".to_string(),
            dob: "1990-04-12".to_string(),
            state: "KA".to_string(),
            pincode: "560001".to_string(),
            father_name: "Ravi Rao".to_string(),
            phone: user.phone.clone(),
            email: "asha@example.com".to_string(),
            employment_status: EmploymentStatus::Salaried,
            monthly_salary: Some(85000.0),
            company_name: None,
            company_address: None,
            company_pin_code: None,
            salary_mode: None,
            aadhar_number: "123412341234".to_string(),
            pan_number: "ABCDE1234F".to_string(),
            address: "12 MG Road".to_string(),
        },
        verified: Some(VerifiedProfile {
            verified_name: Some("Asha Rao".to_string()),
            pan_number: Some("ABCDE1234F".to_string()),
            ..VerifiedProfile::default()
        }),
        status: KycStatus::Verified,
        verification_id: Uuid::new_v4().to_string(),
        submitted_at: Utc::now(),
        verified_at: Some(Utc::now()),
    };

    let updated = storage
        .update_kyc(user.id, &record)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert!(updated);

    let stored = storage
        .find_user(user.id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .ok_or_else(|| anyhow::anyhow!("user vanished"))?;
    let kyc = stored.kyc.ok_or_else(|| anyhow::anyhow!("kyc missing"))?;
    assert_eq!(kyc.declared, record.declared);
    assert_eq!(kyc.verified, record.verified);
    assert_eq!(kyc.status, KycStatus::Verified);
    Ok(())
}

/// Concurrent referrals of one holder all land.
#[tokio::test]
#[ignore]
async fn concurrent_referral_credits_are_not_lost() -> anyhow::Result<()> {
    let storage = Arc::new(connect().await?);
    let holder = new_user(&storage).await?;
    let policy = ReferralPolicy {
        increment: 100,
        once_per_user: true,
    };

    let mut handles = Vec::new();
    for _ in 0..10 {
        let storage = storage.clone();
        let code = holder.referral_code.clone();
        handles.push(tokio::spawn(async move {
            let referred = new_user(&storage).await?;
            referral::adjust(storage.as_ref(), policy, referred.id, &code)
                .await
                .map_err(|e| anyhow::anyhow!(e.to_string()))
        }));
    }
    for handle in handles {
        let outcome = handle.await??;
        assert!(matches!(outcome, ReferralOutcome::Credited { .. }));
    }

    let holder = storage
        .find_user(holder.id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .ok_or_else(|| anyhow::anyhow!("holder vanished"))?;
    assert_eq!(holder.referral_bonus, 1000);
    Ok(())
}

/// Writing the offer limit twice leaves one table holding the last write.
#[tokio::test]
#[ignore]
async fn offer_limit_is_a_singleton() -> anyhow::Result<()> {
    let storage = connect().await?;

    for (name, amount) in [("First", 1000.0), ("Second", 2000.0)] {
        storage
            .upsert_offer_limit(&OfferLimit {
                name: name.to_string(),
                tiers: vec![ScoreTier {
                    min_score: 300,
                    max_score: 900,
                    loan_amount: amount,
                }],
                updated_at: Utc::now(),
            })
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    }

    let limit = storage
        .get_offer_limit()
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .ok_or_else(|| anyhow::anyhow!("offer limit missing"))?;
    assert_eq!(limit.name, "Second");
    assert_eq!(limit.tiers[0].loan_amount, 2000.0);
    Ok(())
}
