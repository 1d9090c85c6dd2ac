//! Script to provision an admin account.
//!
//! Reads ADMIN_NAME, ADMIN_EMAIL, ADMIN_PHONE and ADMIN_PASSWORD (plus optional
//! ADMIN_EMPLOYEE_ID and ADMIN_ADDRESS) and inserts the account into the
//! database named by DATABASE_URL. Password rules match employee accounts.

use dotenvy::dotenv;
use std::env;

use lendwise_api::db::Database;
use lendwise_api::db_storage::PgStorage;
use lendwise_api::handlers::provision_staff;
use lendwise_api::models::Role;
use lendwise_api::requests::EmployeeInput;
use lendwise_api::validation::Validate;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt::init();

    let database_url =
        env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

    let input = EmployeeInput {
        full_name: env::var("ADMIN_NAME").ok(),
        employee_id: Some(env::var("ADMIN_EMPLOYEE_ID").unwrap_or_else(|_| "ADMIN-001".to_string())),
        phone: env::var("ADMIN_PHONE").ok(),
        email: env::var("ADMIN_EMAIL").ok(),
        password: env::var("ADMIN_PASSWORD").ok(),
        address: Some(env::var("ADMIN_ADDRESS").unwrap_or_else(|_| "Head office".to_string())),
    };
    let draft = input
        .validate()
        .map_err(|errors| anyhow::anyhow!("Invalid admin details: {}", errors))?;

    let db = Database::new(&database_url).await?;
    tracing::info!("Connected to database. Creating admin account...");

    let storage = PgStorage::new(db.pool);
    let admin = provision_staff(&storage, draft, Role::Admin)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    tracing::info!("Admin account created: {} ({})", admin.id, admin.email.unwrap_or_default());

    Ok(())
}
