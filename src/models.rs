use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============ Users ============

/// Account role. Ordinary users sign in by OTP; staff sign in by password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Employee,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Employee => "employee",
            Role::Admin => "admin",
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Employee | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "employee" => Ok(Role::Employee),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// The single mutable record kept per person.
///
/// KYC, subscription and score are embedded; every workflow step mutates this
/// record in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub email: Option<String>,
    /// Ten-digit mobile number. Unique across all users.
    pub phone: String,
    pub role: Role,
    pub is_phone_verified: bool,
    /// Salted hash, staff only. Never serialized.
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub employee_id: Option<String>,
    pub employee_address: Option<String>,
    pub kyc: Option<KycRecord>,
    pub subscription: Option<Subscription>,
    pub credit_score: Option<i32>,
    /// Six-character code other users can quote. Unique.
    pub referral_code: String,
    pub referral_bonus: i64,
    /// Code credited on this user's behalf, if any.
    pub referred_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A fresh account with no KYC, subscription or score.
    pub fn new(phone: impl Into<String>, role: Role, referral_code: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            full_name: None,
            email: None,
            phone: phone.into(),
            role,
            is_phone_verified: false,
            password_hash: None,
            employee_id: None,
            employee_address: None,
            kyc: None,
            subscription: None,
            credit_score: None,
            referral_code,
            referral_bonus: 0,
            referred_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Staff listing view: no password, no referral fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeView {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: String,
    pub role: Role,
    pub employee_id: Option<String>,
    pub employee_address: Option<String>,
    pub is_phone_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for EmployeeView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            role: user.role,
            employee_id: user.employee_id.clone(),
            employee_address: user.employee_address.clone(),
            is_phone_verified: user.is_phone_verified,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

// ============ KYC ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KycStatus {
    Pending,
    Verified,
    Rejected,
}

/// KYC sub-record: what the user told us plus what the vendor verified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KycRecord {
    #[serde(rename = "userProvidedData")]
    pub declared: DeclaredKyc,
    /// Vendor-verified canonical profile. Authoritative once set.
    #[serde(rename = "verifiedData")]
    pub verified: Option<VerifiedProfile>,
    pub status: KycStatus,
    /// Identifier sent to the vendor when the session was started.
    pub verification_id: String,
    pub submitted_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmploymentStatus {
    #[serde(rename = "salaried")]
    Salaried,
    #[serde(rename = "non-salaried")]
    NonSalaried,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SalaryMode {
    Neft,
    Imps,
    Cash,
}

/// Self-reported KYC fields, already validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclaredKyc {
    pub first_name: String,
    pub last_name: String,
    pub gender: String,
    pub dob: String,
    pub state: String,
    pub pincode: String,
    pub father_name: String,
    pub phone: String,
    pub email: String,
    pub employment_status: EmploymentStatus,
    pub monthly_salary: Option<f64>,
    pub company_name: Option<String>,
    pub company_address: Option<String>,
    pub company_pin_code: Option<String>,
    pub salary_mode: Option<SalaryMode>,
    pub aadhar_number: String,
    pub pan_number: String,
    pub address: String,
}

impl DeclaredKyc {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Canonical verified-identity profile produced by the normalizer.
///
/// Every field is optional: a field is null when no vendor scope supplied it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedProfile {
    pub verified_name: Option<String>,
    pub verified_email: Option<String>,
    pub verified_mobile: Option<String>,

    pub aadhaar_masked: Option<String>,
    pub aadhaar_care_of: Option<String>,
    pub aadhaar_dob: Option<String>,
    pub aadhaar_gender: Option<String>,
    pub aadhaar_full_address: Option<String>,
    pub aadhaar_photo_link: Option<String>,
    pub aadhaar_split_address: Option<SplitAddress>,

    pub pan_number: Option<String>,
    pub pan_name: Option<String>,
    pub pan_type: Option<String>,
    pub aadhaar_seeding_status: Option<String>,
    pub aadhaar_seeding_status_desc: Option<String>,
    pub pan_last_updated: Option<String>,

    pub dob: Option<String>,
    pub gender: Option<String>,
    pub income_category: Option<String>,
    pub occupation: Option<String>,
    pub full_verified_address: Option<String>,

    pub bank_details: Option<BankDetails>,

    pub reference_id: Option<String>,
    pub verification_id: Option<String>,
}

/// Postal address as split by the identity-document scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitAddress {
    pub country: Option<String>,
    pub dist: Option<String>,
    pub house: Option<String>,
    pub landmark: Option<String>,
    pub pincode: Option<String>,
    pub po: Option<String>,
    pub state: Option<String>,
    pub street: Option<String>,
    pub subdist: Option<String>,
    pub vtc: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankDetails {
    pub bank_account: Option<String>,
    pub name_at_bank: Option<String>,
    pub bank_name: Option<String>,
    pub city: Option<String>,
    pub branch: Option<String>,
    pub micr: Option<String>,
}

// ============ Subscription ============

/// Subscription sub-record. Always replaced wholesale, never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub plan: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub payment_id: Option<String>,
    pub amount: Option<f64>,
    pub is_active: bool,
}

// ============ Catalogs ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanProvider {
    pub id: Uuid,
    pub loan_name: String,
    pub bank_name: String,
    pub loan_type: String,
    pub interest_rate: f64,
    pub minimum_credit_score: i32,
    /// In rupees.
    pub minimum_income: f64,
    pub maximum_loan_amount: f64,
    /// Months.
    pub min_tenure: i32,
    pub max_tenure: i32,
    pub processing_fee: f64,
    pub prepayment_charges: f64,
    pub play_store_link: Option<String>,
    pub website_link: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default, alias = "EligibilityCriteria")]
    pub eligibility_criteria: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditCardProvider {
    pub id: Uuid,
    pub card_name: String,
    pub bank_name: String,
    pub interest_rate: f64,
    pub minimum_credit_score: i32,
    /// In rupees.
    pub minimum_income: f64,
    pub maximum_credit_limit: f64,
    pub annual_fee: f64,
    pub joining_fee: f64,
    pub play_store_link: Option<String>,
    pub website_link: Option<String>,
    pub card_type: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub eligibility_criteria: Vec<String>,
}

// ============ Offer limits ============

/// One score band of the offer-limit table. Bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreTier {
    pub min_score: i32,
    pub max_score: i32,
    pub loan_amount: f64,
}

impl ScoreTier {
    pub fn contains(&self, score: i32) -> bool {
        self.min_score <= score && score <= self.max_score
    }
}

/// The offer-limit table. Exactly one exists; storage owns that invariant.
///
/// Tier order is significant: the first matching tier wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferLimit {
    pub name: String,
    #[serde(rename = "creditScoreMappings")]
    pub tiers: Vec<ScoreTier>,
    pub updated_at: DateTime<Utc>,
}

// ============ API envelope ============

/// Success envelope: `{success: true, message?, data?}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }
}

/// Login result returned by OTP verification and staff login.
#[derive(Debug, Serialize)]
pub struct SessionGrant<T: Serialize> {
    pub token: String,
    pub user: T,
}
