//! Verification-profile normalizer.
//!
//! The KYC vendor answers a user-details request with a list of *scopes*
//! (NAME, AADHAAR, PAN, BANK_ACCOUNT, ...), each carrying zero or more records.
//! Several scopes can supply the same fact, so every canonical field has a
//! fixed priority list of `(scope, key)` sources. The first non-empty value
//! wins; a field nobody supplied stays `None`.
//!
//! Vendor payload shapes stay behind [`VerificationAdapter`]. Swapping the
//! vendor means writing a new adapter, not touching the priority rules.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

use crate::errors::AppError;
use crate::models::{BankDetails, SplitAddress, VerifiedProfile};

/// Turns a raw vendor payload into the canonical profile.
pub trait VerificationAdapter: Send + Sync {
    fn normalize(&self, payload: &Value) -> Result<VerifiedProfile, NormalizeError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// The payload carried no `scopes` collection at all.
    MissingScopes,
    /// The payload was not shaped like a user-details response.
    Malformed(String),
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeError::MissingScopes => {
                write!(f, "verification response has no scopes collection")
            }
            NormalizeError::Malformed(msg) => write!(f, "malformed verification response: {}", msg),
        }
    }
}

impl std::error::Error for NormalizeError {}

impl From<NormalizeError> for AppError {
    fn from(err: NormalizeError) -> Self {
        AppError::upstream(err.to_string())
    }
}

// ============ Vendor input ============

/// User-details response of the scoped verification vendor.
#[derive(Debug, Clone, Deserialize)]
pub struct ScopedUserDetails {
    pub scopes: Option<Vec<ScopeEntry>>,
    #[serde(default)]
    pub reference_id: Option<Value>,
    #[serde(default)]
    pub verification_id: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScopeEntry {
    pub scope: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub records: Vec<ScopeRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScopeRecord {
    #[serde(default)]
    pub metadata: Value,
}

impl ScopeEntry {
    /// Found (status absent or `FOUND`) and carrying at least one record.
    fn is_present(&self) -> bool {
        let found = self
            .status
            .as_deref()
            .map_or(true, |s| s.eq_ignore_ascii_case("FOUND"));
        found && !self.records.is_empty()
    }
}

/// Scope index over one response. The first entry named for a scope decides.
struct Scopes<'a> {
    entries: &'a [ScopeEntry],
}

impl<'a> Scopes<'a> {
    fn metadata(&self, scope: &str) -> Option<&'a Map<String, Value>> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.scope.eq_ignore_ascii_case(scope))?;
        if !entry.is_present() {
            return None;
        }
        entry.records.first()?.metadata.as_object()
    }

    fn text(&self, scope: &str, key: &str) -> Option<String> {
        self.metadata(scope).and_then(|m| m.get(key)).and_then(text_value)
    }

    /// First non-empty value across `sources`, in order.
    fn first(&self, sources: &[(&str, &str)]) -> Option<String> {
        sources
            .iter()
            .find_map(|(scope, key)| self.text(scope, key))
    }
}

/// Non-empty strings pass through; numbers are rendered. Anything else is absent.
fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Field by field, so a numeric pincode does not discard the whole address.
fn parse_split_address(raw: &Map<String, Value>) -> SplitAddress {
    let field = |key: &str| raw.get(key).and_then(text_value);
    SplitAddress {
        country: field("country"),
        dist: field("dist"),
        house: field("house"),
        landmark: field("landmark"),
        pincode: field("pincode"),
        po: field("po"),
        state: field("state"),
        street: field("street"),
        subdist: field("subdist"),
        vtc: field("vtc"),
    }
}

// ============ Adapter ============

/// Adapter for the scope-based user-details response.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopedVerificationAdapter;

impl ScopedVerificationAdapter {
    pub fn parse(&self, payload: &Value) -> Result<ScopedUserDetails, NormalizeError> {
        if !payload.is_object() {
            return Err(NormalizeError::Malformed("expected a JSON object".to_string()));
        }
        serde_json::from_value(payload.clone())
            .map_err(|e| NormalizeError::Malformed(e.to_string()))
    }

    pub fn profile(&self, details: &ScopedUserDetails) -> Result<VerifiedProfile, NormalizeError> {
        let entries = details
            .scopes
            .as_deref()
            .ok_or(NormalizeError::MissingScopes)?;
        let s = Scopes { entries };

        let split_address = s
            .metadata("AADHAAR")
            .and_then(|m| m.get("split_address"))
            .and_then(Value::as_object)
            .map(parse_split_address);

        let bank_details = s.metadata("BANK_ACCOUNT").map(|_| BankDetails {
            bank_account: s.text("BANK_ACCOUNT", "bank_account"),
            name_at_bank: s.text("BANK_ACCOUNT", "name_at_bank"),
            bank_name: s.text("BANK_ACCOUNT", "bank_name"),
            city: s.text("BANK_ACCOUNT", "city"),
            branch: s.text("BANK_ACCOUNT", "branch"),
            micr: s.text("BANK_ACCOUNT", "micr"),
        });

        Ok(VerifiedProfile {
            verified_name: s.first(&[
                ("NAME", "name"),
                ("AADHAAR", "name"),
                ("PAN", "registered_name"),
            ]),
            verified_email: s.first(&[("EMAIL", "email"), ("AADHAAR", "email")]),
            verified_mobile: s.text("MOBILE", "mobile"),

            aadhaar_masked: s.text("AADHAAR", "aadhaar"),
            aadhaar_care_of: s.text("AADHAAR", "care_of"),
            aadhaar_dob: s.text("AADHAAR", "dob"),
            aadhaar_gender: s.text("AADHAAR", "gender"),
            aadhaar_full_address: s.text("AADHAAR", "address"),
            aadhaar_photo_link: s.text("AADHAAR", "photo_link"),
            aadhaar_split_address: split_address,

            pan_number: s.text("PAN", "pan"),
            pan_name: s.first(&[("PAN", "name_pan_card"), ("PAN", "registered_name")]),
            pan_type: s.text("PAN", "type"),
            aadhaar_seeding_status: s.text("PAN", "aadhaar_seeding_status"),
            aadhaar_seeding_status_desc: s.text("PAN", "aadhaar_seeding_status_desc"),
            pan_last_updated: s.text("PAN", "last_updated_at"),

            dob: s.first(&[("DOB", "dob"), ("AADHAAR", "dob")]),
            gender: s.first(&[("GENDER", "gender"), ("AADHAAR", "gender")]),
            income_category: s.text("INCOME", "income"),
            occupation: s.text("OCCUPATION", "occupation"),
            full_verified_address: s.first(&[
                ("ADDRESS", "complete_address"),
                ("AADHAAR", "address"),
            ]),

            bank_details,

            reference_id: details.reference_id.as_ref().and_then(text_value),
            verification_id: details.verification_id.as_ref().and_then(text_value),
        })
    }
}

impl VerificationAdapter for ScopedVerificationAdapter {
    fn normalize(&self, payload: &Value) -> Result<VerifiedProfile, NormalizeError> {
        let details = self.parse(payload)?;
        let profile = self.profile(&details)?;
        tracing::debug!(
            "Normalized verification profile: {} scopes, name present: {}",
            details.scopes.as_ref().map_or(0, Vec::len),
            profile.verified_name.is_some()
        );
        Ok(profile)
    }
}
