//! Back-office endpoints: provider catalogs, the offer-limit table, staff
//! accounts and end-user maintenance.

use crate::auth::{hash_password, AdminUser, StaffUser};
use crate::errors::AppError;
use crate::handlers::{provision_staff, ApiJson, AppState};
use crate::models::*;
use crate::requests::{
    CreditCardProviderInput, EmployeeInput, LoanProviderInput, OfferLimitInput, UserUpdateInput,
};
use crate::storage::{Catalog, CatalogEntry};
use crate::validation::Validate;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

// ============ Catalogs ============

fn not_found<T: CatalogEntry>() -> AppError {
    AppError::NotFound(format!("{} not found", T::KIND.label()))
}

pub async fn create_loan_provider(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiJson(input): ApiJson<LoanProviderInput>,
) -> Result<(StatusCode, Json<ApiResponse<LoanProvider>>), AppError> {
    let provider = input.validate()?;
    Catalog::<LoanProvider>::new(state.storage.clone())
        .create(&provider)
        .await?;
    tracing::info!("Loan provider {} created", provider.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Loan provider created successfully", provider)),
    ))
}

pub async fn list_loan_providers(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
) -> Result<Json<ApiResponse<Vec<LoanProvider>>>, AppError> {
    let providers = Catalog::<LoanProvider>::new(state.storage.clone()).list().await?;
    Ok(Json(ApiResponse::with_message(
        "Loan providers fetched successfully",
        providers,
    )))
}

/// PUT /api/admin/loan-providers/update/:id
///
/// Partial update: absent fields keep their stored values, present ones are
/// validated with the create rules.
pub async fn update_loan_provider(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    ApiJson(input): ApiJson<LoanProviderInput>,
) -> Result<Json<ApiResponse<LoanProvider>>, AppError> {
    let catalog = Catalog::<LoanProvider>::new(state.storage.clone());
    let mut provider = catalog
        .get(id)
        .await?
        .ok_or_else(not_found::<LoanProvider>)?;
    input.apply_to(&mut provider)?;
    if !catalog.replace(&provider).await? {
        return Err(not_found::<LoanProvider>());
    }
    Ok(Json(ApiResponse::with_message(
        "Loan provider updated successfully",
        provider,
    )))
}

pub async fn delete_loan_provider(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    if !Catalog::<LoanProvider>::new(state.storage.clone())
        .delete(id)
        .await?
    {
        return Err(not_found::<LoanProvider>());
    }
    Ok(Json(ApiResponse::message("Loan provider deleted successfully")))
}

pub async fn create_credit_card_provider(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiJson(input): ApiJson<CreditCardProviderInput>,
) -> Result<(StatusCode, Json<ApiResponse<CreditCardProvider>>), AppError> {
    let card = input.validate()?;
    Catalog::<CreditCardProvider>::new(state.storage.clone())
        .create(&card)
        .await?;
    tracing::info!("Credit card provider {} created", card.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Credit card provider created successfully",
            card,
        )),
    ))
}

pub async fn list_credit_card_providers(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
) -> Result<Json<ApiResponse<Vec<CreditCardProvider>>>, AppError> {
    let cards = Catalog::<CreditCardProvider>::new(state.storage.clone())
        .list()
        .await?;
    Ok(Json(ApiResponse::with_message(
        "Credit card providers fetched successfully",
        cards,
    )))
}

pub async fn update_credit_card_provider(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    ApiJson(input): ApiJson<CreditCardProviderInput>,
) -> Result<Json<ApiResponse<CreditCardProvider>>, AppError> {
    let catalog = Catalog::<CreditCardProvider>::new(state.storage.clone());
    let mut card = catalog
        .get(id)
        .await?
        .ok_or_else(not_found::<CreditCardProvider>)?;
    input.apply_to(&mut card)?;
    if !catalog.replace(&card).await? {
        return Err(not_found::<CreditCardProvider>());
    }
    Ok(Json(ApiResponse::with_message(
        "Credit card provider updated successfully",
        card,
    )))
}

pub async fn delete_credit_card_provider(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    if !Catalog::<CreditCardProvider>::new(state.storage.clone())
        .delete(id)
        .await?
    {
        return Err(not_found::<CreditCardProvider>());
    }
    Ok(Json(ApiResponse::message(
        "Credit card provider deleted successfully",
    )))
}

// ============ Offer limit ============

/// POST /api/admin/offer-limits/create
///
/// Writes the whole table. There is only ever one, so this creates or replaces it.
pub async fn create_offer_limit(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiJson(input): ApiJson<OfferLimitInput>,
) -> Result<Json<ApiResponse<OfferLimit>>, AppError> {
    let change = input.into_change(true)?;
    let limit = OfferLimit {
        name: change.name.unwrap_or_default(),
        tiers: change.tiers.unwrap_or_default(),
        updated_at: Utc::now(),
    };
    let stored = state.storage.upsert_offer_limit(&limit).await?;
    tracing::info!("Offer limit '{}' stored with {} tiers", stored.name, stored.tiers.len());
    Ok(Json(ApiResponse::with_message(
        "Offer limit created/updated successfully",
        stored,
    )))
}

pub async fn get_offer_limit(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
) -> Result<Json<ApiResponse<OfferLimit>>, AppError> {
    let limit = state
        .storage
        .get_offer_limit()
        .await?
        .ok_or_else(|| AppError::NotFound("No offer limit found".to_string()))?;
    Ok(Json(ApiResponse::data(limit)))
}

/// PUT /api/admin/offer-limits/update
///
/// Merges the given fields into the stored table. With no table yet, both
/// name and tiers are required.
pub async fn update_offer_limit(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiJson(input): ApiJson<OfferLimitInput>,
) -> Result<Json<ApiResponse<OfferLimit>>, AppError> {
    let existing = state.storage.get_offer_limit().await?;
    let change = input.into_change(existing.is_none())?;

    let limit = match existing {
        Some(current) => OfferLimit {
            name: change.name.unwrap_or(current.name),
            tiers: change.tiers.unwrap_or(current.tiers),
            updated_at: Utc::now(),
        },
        None => OfferLimit {
            name: change.name.unwrap_or_default(),
            tiers: change.tiers.unwrap_or_default(),
            updated_at: Utc::now(),
        },
    };

    let stored = state.storage.upsert_offer_limit(&limit).await?;
    Ok(Json(ApiResponse::with_message(
        "Offer limit updated successfully",
        stored,
    )))
}

// ============ Employees ============

pub async fn create_employee(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiJson(input): ApiJson<EmployeeInput>,
) -> Result<(StatusCode, Json<ApiResponse<EmployeeView>>), AppError> {
    let draft = input.validate()?;
    let employee = provision_staff(state.storage.as_ref(), draft, Role::Employee).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Employee created successfully",
            EmployeeView::from(&employee),
        )),
    ))
}

pub async fn list_employees(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<ApiResponse<Vec<EmployeeView>>>, AppError> {
    let employees = state.storage.list_users_by_role(Role::Employee).await?;
    Ok(Json(ApiResponse::with_message(
        "Employees fetched successfully",
        employees.iter().map(EmployeeView::from).collect(),
    )))
}

/// PUT /api/admin/employees/update/:id
///
/// Takes the full employee form; the password is re-hashed.
pub async fn update_employee(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    ApiJson(input): ApiJson<EmployeeInput>,
) -> Result<Json<ApiResponse<EmployeeView>>, AppError> {
    let draft = input.validate()?;
    let mut employee = state
        .storage
        .find_user(id)
        .await?
        .filter(|u| u.role == Role::Employee)
        .ok_or_else(|| AppError::NotFound("Employee not found".to_string()))?;

    if state
        .storage
        .staff_conflict_exists(&draft.email, &draft.phone, &draft.employee_id, Some(id))
        .await?
    {
        return Err(AppError::Conflict(
            "Employee with provided email, phone, or employee ID already exists".to_string(),
        ));
    }

    employee.full_name = Some(draft.full_name);
    employee.employee_id = Some(draft.employee_id);
    employee.phone = draft.phone;
    employee.email = Some(draft.email);
    employee.employee_address = Some(draft.address);
    employee.password_hash = Some(hash_password(&draft.password)?);

    if !state.storage.save_user(&employee).await? {
        return Err(AppError::NotFound("Employee not found".to_string()));
    }

    Ok(Json(ApiResponse::with_message(
        "Employee updated successfully",
        EmployeeView::from(&employee),
    )))
}

pub async fn delete_employee(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    if !state.storage.delete_user(id, Role::Employee).await? {
        return Err(AppError::NotFound("Employee not found".to_string()));
    }
    Ok(Json(ApiResponse::message("Employee deleted successfully")))
}

// ============ Users ============

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
) -> Result<Json<ApiResponse<Vec<User>>>, AppError> {
    let users = state.storage.list_users_by_role(Role::User).await?;
    Ok(Json(ApiResponse::with_message(
        "Users fetched successfully",
        users,
    )))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let user = state.load_user(id).await?;
    Ok(Json(ApiResponse::with_message("User fetched successfully", user)))
}

/// PUT /api/admin/users/update/:id
///
/// Only name and email are editable here; KYC, score, subscription and
/// referral fields belong to their own workflows.
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    ApiJson(input): ApiJson<UserUpdateInput>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let update = input.validate()?;
    let mut user = state.load_user(id).await?;

    if let Some(name) = update.full_name {
        user.full_name = Some(name);
    }
    if let Some(email) = update.email {
        user.email = Some(email);
    }

    if !state.storage.save_user(&user).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(Json(ApiResponse::with_message("User updated successfully", user)))
}
