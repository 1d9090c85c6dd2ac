//! Inbound request payloads and their validation.
//!
//! Fields are deserialized as `Option` so a missing field becomes a field
//! error in the response body rather than a serde rejection.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{
    CreditCardProvider, DeclaredKyc, EmploymentStatus, LoanProvider, SalaryMode, ScoreTier,
};
use crate::validation::{
    check_max_len, check_range, check_url, is_valid_aadhaar, is_valid_email, is_valid_pan,
    is_valid_phone, is_valid_pincode, parse_timestamp, password_problem, require_text,
    FieldErrors, Validate,
};

const PHONE_FORMAT: &str = "Invalid phone number format. Must be exactly 10 digits.";

fn check_phone(errors: &mut FieldErrors, field: &str, value: &Option<String>) -> Option<String> {
    match value.as_deref().map(str::trim) {
        Some(phone) if is_valid_phone(phone) => Some(phone.to_string()),
        _ => {
            errors.add(field, PHONE_FORMAT);
            None
        }
    }
}

fn check_email(
    errors: &mut FieldErrors,
    field: &str,
    value: &Option<String>,
    message: &str,
) -> Option<String> {
    match value.as_deref().map(str::trim) {
        Some(email) if is_valid_email(email) => Some(email.to_lowercase()),
        _ => {
            errors.add(field, message);
            None
        }
    }
}

/// Whole numbers that fit an `i32`.
fn as_whole(value: f64) -> Option<i32> {
    let fits = value.is_finite()
        && value.fract() == 0.0
        && value >= f64::from(i32::MIN)
        && value <= f64::from(i32::MAX);
    fits.then_some(value as i32)
}

fn check_integer(errors: &mut FieldErrors, field: &str, value: Option<f64>) {
    if let Some(v) = value {
        if v.fract() != 0.0 {
            errors.add(field, "Expected integer, received float");
        } else if as_whole(v).is_none() {
            errors.add(field, "Number is too large");
        }
    }
}

fn require_number(errors: &mut FieldErrors, field: &str, value: Option<f64>) {
    if value.is_none() {
        errors.add(field, "Required");
    }
}

// ============ Auth ============

#[derive(Debug, Deserialize)]
pub struct SendOtpInput {
    pub phone: Option<String>,
}

impl Validate for SendOtpInput {
    type Output = String;

    fn validate(self) -> Result<String, FieldErrors> {
        let mut errors = FieldErrors::new();
        let phone = check_phone(&mut errors, "phone", &self.phone);
        errors.into_result()?;
        Ok(phone.unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpInput {
    pub phone: Option<String>,
    pub verification_id: Option<String>,
    pub otp: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OtpCheck {
    pub phone: String,
    pub verification_id: String,
    pub otp: String,
}

impl Validate for VerifyOtpInput {
    type Output = OtpCheck;

    fn validate(self) -> Result<OtpCheck, FieldErrors> {
        let mut errors = FieldErrors::new();
        let phone = check_phone(&mut errors, "phone", &self.phone);
        let verification_id = require_text(
            &mut errors,
            "verification_id",
            &self.verification_id,
            "Verification ID is required.",
        );
        let otp = match self.otp.as_deref().map(str::trim) {
            Some(otp) if otp.chars().count() >= 4 => Some(otp.to_string()),
            _ => {
                errors.add("otp", "OTP must be at least 4 digits.");
                None
            }
        };
        errors.into_result()?;
        Ok(OtpCheck {
            phone: phone.unwrap_or_default(),
            verification_id: verification_id.unwrap_or_default(),
            otp: otp.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginInput {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Validate for LoginInput {
    type Output = Credentials;

    fn validate(self) -> Result<Credentials, FieldErrors> {
        let mut errors = FieldErrors::new();
        let email = match self.email.as_deref().map(str::trim) {
            None | Some("") => {
                errors.add("email", "Email is required.");
                None
            }
            Some(_) => check_email(&mut errors, "email", &self.email, "Invalid email format."),
        };
        let password = match self.password {
            Some(p) if p.chars().count() >= 6 => Some(p),
            _ => {
                errors.add("password", "Password must be at least 6 characters long.");
                None
            }
        };
        errors.into_result()?;
        Ok(Credentials {
            email: email.unwrap_or_default(),
            password: password.unwrap_or_default(),
        })
    }
}

// ============ User ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInput {
    pub plan: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionRequest {
    pub plan: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl Validate for SubscriptionInput {
    type Output = SubscriptionRequest;

    fn validate(self) -> Result<SubscriptionRequest, FieldErrors> {
        let mut errors = FieldErrors::new();
        let plan = require_text(&mut errors, "plan", &self.plan, "Plan is required");
        let start = self.start_date.as_deref().and_then(parse_timestamp);
        if start.is_none() {
            errors.add("startDate", "Invalid startDate format");
        }
        let end = self.end_date.as_deref().and_then(parse_timestamp);
        if end.is_none() {
            errors.add("endDate", "Invalid endDate format");
        }
        if let (Some(start), Some(end)) = (start, end) {
            if end < start {
                errors.add("endDate", "endDate must not be before startDate");
            }
        }
        errors.into_result()?;
        match (plan, start, end) {
            (Some(plan), Some(start_date), Some(end_date)) => Ok(SubscriptionRequest {
                plan,
                start_date,
                end_date,
            }),
            _ => Err(FieldErrors::new()),
        }
    }
}

// ============ KYC ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KycStartInput {
    pub kyc_data: Option<KycDataInput>,
    pub referral_code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KycDataInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub dob: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    pub father_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub employment_status: Option<String>,
    pub monthly_salary: Option<f64>,
    pub company_name: Option<String>,
    pub company_address: Option<String>,
    pub company_pin_code: Option<String>,
    pub salary_mode: Option<String>,
    pub aadhar_number: Option<String>,
    pub pan_number: Option<String>,
    pub address: Option<String>,
}

impl Validate for KycDataInput {
    type Output = DeclaredKyc;

    fn validate(self) -> Result<DeclaredKyc, FieldErrors> {
        let mut e = FieldErrors::new();

        let first_name = require_text(&mut e, "firstName", &self.first_name, "First name is required");
        let last_name = require_text(&mut e, "lastName", &self.last_name, "Last name is required");
        let gender = match self.gender.as_deref() {
            Some(g @ ("F" | "M" | "T")) => Some(g.to_string()),
            _ => {
                e.add("gender", "Invalid gender");
                None
            }
        };
        let dob = require_text(&mut e, "dob", &self.dob, "Date of birth is required");
        let state = match self.state.as_deref() {
            None => {
                e.add("state", "State is required");
                None
            }
            Some(s) if s.chars().count() == 2 => Some(s.to_string()),
            Some(_) => {
                e.add("state", "State code must be exactly 2 characters");
                None
            }
        };
        let pincode = match self.pincode.as_deref() {
            None => {
                e.add("pincode", "Pincode is required");
                None
            }
            Some(p) if is_valid_pincode(p) => Some(p.to_string()),
            Some(_) => {
                e.add("pincode", "Pincode must be exactly 6 digits");
                None
            }
        };
        let phone = check_phone(&mut e, "phone", &self.phone);
        let email = match self.email {
            None => {
                e.add("email", "Email is required");
                None
            }
            Some(_) => check_email(&mut e, "email", &self.email, "Invalid email format"),
        };
        let employment_status = match self.employment_status.as_deref() {
            Some("salaried") => Some(EmploymentStatus::Salaried),
            Some("non-salaried") => Some(EmploymentStatus::NonSalaried),
            _ => {
                e.add("employmentStatus", "Employment status is required");
                None
            }
        };
        let salary_mode = match self.salary_mode.as_deref() {
            None => None,
            Some("NEFT") => Some(SalaryMode::Neft),
            Some("IMPS") => Some(SalaryMode::Imps),
            Some("CASH") => Some(SalaryMode::Cash),
            Some(_) => {
                e.add("salaryMode", "Invalid enum value. Expected 'NEFT' | 'IMPS' | 'CASH'");
                None
            }
        };
        let aadhar_number = match self.aadhar_number.as_deref() {
            Some(a) if is_valid_aadhaar(a) => Some(a.to_string()),
            None => {
                e.add("aadharNumber", "Aadhar number is required");
                None
            }
            Some(_) => {
                e.add("aadharNumber", "Aadhar number must be exactly 12 digits");
                None
            }
        };
        let pan_number = match self.pan_number.as_deref() {
            Some(p) if is_valid_pan(p) => Some(p.to_string()),
            None => {
                e.add("panNumber", "PAN number is required");
                None
            }
            Some(_) => {
                e.add("panNumber", "Invalid PAN number format");
                None
            }
        };
        let address = require_text(&mut e, "address", &self.address, "Address is required");
        if self.father_name.is_none() {
            e.add("fatherName", "Required");
        }

        e.into_result()?;

        match (
            first_name,
            last_name,
            gender,
            dob,
            state,
            pincode,
            phone,
            email,
            employment_status,
            aadhar_number,
            pan_number,
            address,
        ) {
            (
                Some(first_name),
                Some(last_name),
                Some(gender),
                Some(dob),
                Some(state),
                Some(pincode),
                Some(phone),
                Some(email),
                Some(employment_status),
                Some(aadhar_number),
                Some(pan_number),
                Some(address),
            ) => Ok(DeclaredKyc {
                first_name,
                last_name,
                gender,
                dob,
                state,
                pincode,
                father_name: self.father_name.unwrap_or_default(),
                phone,
                email,
                employment_status,
                monthly_salary: self.monthly_salary,
                company_name: self.company_name,
                company_address: self.company_address,
                company_pin_code: self.company_pin_code,
                salary_mode,
                aadhar_number,
                pan_number,
                address,
            }),
            _ => Err(FieldErrors::new()),
        }
    }
}

// ============ Payments ============

#[derive(Debug, Deserialize)]
pub struct CreateOrderInput {
    pub order_amount: Option<Value>,
}

impl Validate for CreateOrderInput {
    type Output = f64;

    fn validate(self) -> Result<f64, FieldErrors> {
        let mut errors = FieldErrors::new();
        let amount = self.order_amount.as_ref().and_then(amount_value);
        match amount {
            Some(a) if a > 0.0 => return Ok(a),
            Some(_) => errors.add("order_amount", "Order amount must be positive"),
            None => errors.add("order_amount", "Order amount is required"),
        }
        Err(errors)
    }
}

/// Reads an amount sent either as a JSON number or a numeric string.
pub fn amount_value(value: &Value) -> Option<f64> {
    let amount = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    amount.filter(|a| a.is_finite())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusInput {
    pub order_id: Option<String>,
}

impl Validate for OrderStatusInput {
    type Output = String;

    fn validate(self) -> Result<String, FieldErrors> {
        let mut errors = FieldErrors::new();
        let id = require_text(&mut errors, "orderId", &self.order_id, "Payment ID is required");
        errors.into_result()?;
        Ok(id.unwrap_or_default())
    }
}

// ============ Loan providers ============

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanProviderInput {
    pub loan_name: Option<String>,
    pub bank_name: Option<String>,
    pub loan_type: Option<String>,
    pub interest_rate: Option<f64>,
    pub minimum_credit_score: Option<f64>,
    pub minimum_income: Option<f64>,
    pub maximum_loan_amount: Option<f64>,
    pub min_tenure: Option<f64>,
    pub max_tenure: Option<f64>,
    pub processing_fee: Option<f64>,
    pub prepayment_charges: Option<f64>,
    pub play_store_link: Option<String>,
    pub website_link: Option<String>,
    pub features: Option<Vec<String>>,
    #[serde(alias = "EligibilityCriteria")]
    pub eligibility_criteria: Option<Vec<String>>,
}

impl LoanProviderInput {
    /// Field-level checks. With `require_all` every mandatory field must be present.
    fn check(&self, require_all: bool) -> FieldErrors {
        let mut e = FieldErrors::new();
        text_field(&mut e, "loanName", &self.loan_name, 100, require_all, "Loan name is required", "Loan name must be less than 100 characters");
        text_field(&mut e, "bankName", &self.bank_name, 100, require_all, "Bank name is required", "Bank name must be less than 100 characters");
        text_field(&mut e, "loanType", &self.loan_type, 50, require_all, "Loan type is required", "Loan type must be less than 50 characters");
        check_range(&mut e, "interestRate", self.interest_rate, 0.0, Some(100.0), "Interest rate must be a positive number", "Interest rate cannot exceed 100%");
        check_integer(&mut e, "minimumCreditScore", self.minimum_credit_score);
        check_range(&mut e, "minimumCreditScore", self.minimum_credit_score, 300.0, Some(900.0), "Minimum credit score must be at least 300", "Maximum credit score is 900");
        check_range(&mut e, "minimumIncome", self.minimum_income, 0.0, None, "Minimum income must be a positive number", "");
        check_range(&mut e, "maximumLoanAmount", self.maximum_loan_amount, 0.0, None, "Maximum loan amount must be a positive number", "");
        check_integer(&mut e, "minTenure", self.min_tenure);
        check_range(&mut e, "minTenure", self.min_tenure, 1.0, None, "Minimum tenure must be at least 1 month", "");
        check_integer(&mut e, "maxTenure", self.max_tenure);
        check_range(&mut e, "maxTenure", self.max_tenure, 1.0, None, "Maximum tenure must be at least 1 month", "");
        check_range(&mut e, "processingFee", self.processing_fee, 0.0, None, "Processing fee must be a positive number", "");
        check_range(&mut e, "prepaymentCharges", self.prepayment_charges, 0.0, None, "Prepayment charges must be a positive number", "");
        check_url(&mut e, "playStoreLink", &self.play_store_link, "Invalid Play Store link");
        check_url(&mut e, "websiteLink", &self.website_link, "Invalid website link");
        if require_all {
            for (field, value) in [
                ("interestRate", self.interest_rate),
                ("minimumCreditScore", self.minimum_credit_score),
                ("minimumIncome", self.minimum_income),
                ("maximumLoanAmount", self.maximum_loan_amount),
                ("minTenure", self.min_tenure),
                ("maxTenure", self.max_tenure),
                ("processingFee", self.processing_fee),
                ("prepaymentCharges", self.prepayment_charges),
            ] {
                require_number(&mut e, field, value);
            }
        }
        e
    }

    /// Validates a partial update and merges it onto `provider`.
    pub fn apply_to(self, provider: &mut LoanProvider) -> Result<(), FieldErrors> {
        self.check(false).into_result()?;

        if let Some(v) = self.loan_name {
            provider.loan_name = v.trim().to_string();
        }
        if let Some(v) = self.bank_name {
            provider.bank_name = v.trim().to_string();
        }
        if let Some(v) = self.loan_type {
            provider.loan_type = v.trim().to_string();
        }
        if let Some(v) = self.interest_rate {
            provider.interest_rate = v;
        }
        if let Some(v) = self.minimum_credit_score.and_then(as_whole) {
            provider.minimum_credit_score = v;
        }
        if let Some(v) = self.minimum_income {
            provider.minimum_income = v;
        }
        if let Some(v) = self.maximum_loan_amount {
            provider.maximum_loan_amount = v;
        }
        if let Some(v) = self.min_tenure.and_then(as_whole) {
            provider.min_tenure = v;
        }
        if let Some(v) = self.max_tenure.and_then(as_whole) {
            provider.max_tenure = v;
        }
        if let Some(v) = self.processing_fee {
            provider.processing_fee = v;
        }
        if let Some(v) = self.prepayment_charges {
            provider.prepayment_charges = v;
        }
        if self.play_store_link.is_some() {
            provider.play_store_link = self.play_store_link;
        }
        if self.website_link.is_some() {
            provider.website_link = self.website_link;
        }
        if let Some(v) = self.features {
            provider.features = v;
        }
        if let Some(v) = self.eligibility_criteria {
            provider.eligibility_criteria = v;
        }

        tenure_order(provider.min_tenure, provider.max_tenure)
    }
}

impl Validate for LoanProviderInput {
    type Output = LoanProvider;

    fn validate(self) -> Result<LoanProvider, FieldErrors> {
        self.check(true).into_result()?;
        let mut provider = LoanProvider {
            id: Uuid::new_v4(),
            loan_name: String::new(),
            bank_name: String::new(),
            loan_type: String::new(),
            interest_rate: 0.0,
            minimum_credit_score: 0,
            minimum_income: 0.0,
            maximum_loan_amount: 0.0,
            min_tenure: 0,
            max_tenure: 0,
            processing_fee: 0.0,
            prepayment_charges: 0.0,
            play_store_link: None,
            website_link: None,
            features: Vec::new(),
            eligibility_criteria: Vec::new(),
        };
        self.apply_to(&mut provider)?;
        Ok(provider)
    }
}

fn tenure_order(min: i32, max: i32) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    if min > max {
        errors.add("minTenure", "Minimum tenure cannot exceed maximum tenure");
    }
    errors.into_result()
}

#[allow(clippy::too_many_arguments)]
fn text_field(
    errors: &mut FieldErrors,
    field: &str,
    value: &Option<String>,
    max: usize,
    required: bool,
    required_message: &str,
    max_message: &str,
) {
    match value.as_deref().map(str::trim) {
        Some("") => errors.add(field, required_message),
        None if required => errors.add(field, required_message),
        _ => check_max_len(errors, field, value, max, max_message),
    }
}

// ============ Credit-card providers ============

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditCardProviderInput {
    pub card_name: Option<String>,
    pub bank_name: Option<String>,
    pub interest_rate: Option<f64>,
    pub minimum_credit_score: Option<f64>,
    pub minimum_income: Option<f64>,
    pub maximum_credit_limit: Option<f64>,
    pub annual_fee: Option<f64>,
    pub joining_fee: Option<f64>,
    pub play_store_link: Option<String>,
    pub website_link: Option<String>,
    pub card_type: Option<String>,
    pub features: Option<Vec<String>>,
    pub eligibility_criteria: Option<Vec<String>>,
}

impl CreditCardProviderInput {
    fn check(&self, require_all: bool) -> FieldErrors {
        let mut e = FieldErrors::new();
        text_field(&mut e, "cardName", &self.card_name, 100, require_all, "Card name is required", "Card name must be less than 100 characters");
        text_field(&mut e, "bankName", &self.bank_name, 100, require_all, "Bank name is required", "Bank name must be less than 100 characters");
        text_field(&mut e, "cardType", &self.card_type, 50, require_all, "Card type is required", "Card type must be less than 50 characters");
        check_range(&mut e, "interestRate", self.interest_rate, 0.0, Some(100.0), "Interest rate must be a positive number", "Interest rate cannot exceed 100%");
        check_integer(&mut e, "minimumCreditScore", self.minimum_credit_score);
        check_range(&mut e, "minimumCreditScore", self.minimum_credit_score, 300.0, Some(900.0), "Minimum credit score must be at least 300", "Maximum credit score is 900");
        check_range(&mut e, "minimumIncome", self.minimum_income, 0.0, None, "Minimum income must be a positive number", "");
        check_range(&mut e, "maximumCreditLimit", self.maximum_credit_limit, 0.0, None, "Maximum credit limit must be a positive number", "");
        check_range(&mut e, "annualFee", self.annual_fee, 0.0, None, "Annual fee must be a positive number", "");
        check_range(&mut e, "joiningFee", self.joining_fee, 0.0, None, "Joining fee must be a positive number", "");
        check_url(&mut e, "playStoreLink", &self.play_store_link, "Invalid Play Store link");
        check_url(&mut e, "websiteLink", &self.website_link, "Invalid website link");
        if require_all {
            for (field, value) in [
                ("interestRate", self.interest_rate),
                ("minimumCreditScore", self.minimum_credit_score),
                ("minimumIncome", self.minimum_income),
                ("maximumCreditLimit", self.maximum_credit_limit),
                ("annualFee", self.annual_fee),
                ("joiningFee", self.joining_fee),
            ] {
                require_number(&mut e, field, value);
            }
        }
        e
    }

    pub fn apply_to(self, card: &mut CreditCardProvider) -> Result<(), FieldErrors> {
        self.check(false).into_result()?;

        if let Some(v) = self.card_name {
            card.card_name = v.trim().to_string();
        }
        if let Some(v) = self.bank_name {
            card.bank_name = v.trim().to_string();
        }
        if let Some(v) = self.card_type {
            card.card_type = v.trim().to_string();
        }
        if let Some(v) = self.interest_rate {
            card.interest_rate = v;
        }
        if let Some(v) = self.minimum_credit_score.and_then(as_whole) {
            card.minimum_credit_score = v;
        }
        if let Some(v) = self.minimum_income {
            card.minimum_income = v;
        }
        if let Some(v) = self.maximum_credit_limit {
            card.maximum_credit_limit = v;
        }
        if let Some(v) = self.annual_fee {
            card.annual_fee = v;
        }
        if let Some(v) = self.joining_fee {
            card.joining_fee = v;
        }
        if self.play_store_link.is_some() {
            card.play_store_link = self.play_store_link;
        }
        if self.website_link.is_some() {
            card.website_link = self.website_link;
        }
        if let Some(v) = self.features {
            card.features = v;
        }
        if let Some(v) = self.eligibility_criteria {
            card.eligibility_criteria = v;
        }
        Ok(())
    }
}

impl Validate for CreditCardProviderInput {
    type Output = CreditCardProvider;

    fn validate(self) -> Result<CreditCardProvider, FieldErrors> {
        self.check(true).into_result()?;
        let mut card = CreditCardProvider {
            id: Uuid::new_v4(),
            card_name: String::new(),
            bank_name: String::new(),
            interest_rate: 0.0,
            minimum_credit_score: 0,
            minimum_income: 0.0,
            maximum_credit_limit: 0.0,
            annual_fee: 0.0,
            joining_fee: 0.0,
            play_store_link: None,
            website_link: None,
            card_type: String::new(),
            features: Vec::new(),
            eligibility_criteria: Vec::new(),
        };
        self.apply_to(&mut card)?;
        Ok(card)
    }
}

// ============ Offer limit ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreTierInput {
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
    pub loan_amount: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferLimitInput {
    pub name: Option<String>,
    pub credit_score_mappings: Option<Vec<ScoreTierInput>>,
}

/// A validated offer-limit write. `None` fields keep the stored value.
#[derive(Debug, Clone, PartialEq)]
pub struct OfferLimitChange {
    pub name: Option<String>,
    pub tiers: Option<Vec<ScoreTier>>,
}

impl OfferLimitInput {
    /// Validates the fields that are present. Create calls this with `require_all`.
    pub fn into_change(self, require_all: bool) -> Result<OfferLimitChange, FieldErrors> {
        let mut e = FieldErrors::new();
        text_field(&mut e, "name", &self.name, 100, require_all, "Offer limit name is required", "Name must be less than 100 characters");

        let tiers = match self.credit_score_mappings {
            None => {
                if require_all {
                    e.add("creditScoreMappings", "Required");
                }
                None
            }
            Some(mappings) if mappings.is_empty() => {
                e.add("creditScoreMappings", "At least one credit score mapping is required");
                None
            }
            Some(mappings) => {
                let mut tiers = Vec::with_capacity(mappings.len());
                for (i, m) in mappings.iter().enumerate() {
                    let min_key = format!("creditScoreMappings[{}].minScore", i);
                    let max_key = format!("creditScoreMappings[{}].maxScore", i);
                    let amount_key = format!("creditScoreMappings[{}].loanAmount", i);

                    for (key, value) in [(&min_key, m.min_score), (&max_key, m.max_score)] {
                        require_number(&mut e, key, value);
                        check_integer(&mut e, key, value);
                        check_range(&mut e, key, value, 0.0, Some(900.0), "Score must be at least 0", "Score cannot exceed 900");
                    }
                    require_number(&mut e, &amount_key, m.loan_amount);
                    if let Some(amount) = m.loan_amount {
                        if !amount.is_finite() || amount <= 0.0 {
                            e.add(&amount_key, "Loan amount must be a positive number");
                        }
                    }
                    if let (Some(min), Some(max)) = (m.min_score, m.max_score) {
                        if min > max {
                            e.add(&min_key, "minScore cannot exceed maxScore");
                        }
                    }
                    let whole_min = m.min_score.and_then(as_whole);
                    let whole_max = m.max_score.and_then(as_whole);
                    if let (Some(min), Some(max), Some(amount)) = (whole_min, whole_max, m.loan_amount) {
                        tiers.push(ScoreTier {
                            min_score: min,
                            max_score: max,
                            loan_amount: amount,
                        });
                    }
                }
                Some(tiers)
            }
        };

        e.into_result()?;
        Ok(OfferLimitChange {
            name: self.name.map(|n| n.trim().to_string()),
            tiers,
        })
    }
}

// ============ Staff ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeInput {
    pub full_name: Option<String>,
    pub employee_id: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EmployeeDraft {
    pub full_name: String,
    pub employee_id: String,
    pub phone: String,
    pub email: String,
    pub password: String,
    pub address: String,
}

impl Validate for EmployeeInput {
    type Output = EmployeeDraft;

    fn validate(self) -> Result<EmployeeDraft, FieldErrors> {
        let mut e = FieldErrors::new();
        let full_name = require_text(&mut e, "fullName", &self.full_name, "Full name is required");
        let employee_id = require_text(&mut e, "employeeId", &self.employee_id, "Employee ID is required");
        let phone = check_phone(&mut e, "phone", &self.phone);
        let email = check_email(&mut e, "email", &self.email, "Invalid email format");
        let problem = self.password.as_deref().map(password_problem);
        let password = match problem {
            None => {
                e.add("password", "Password must be at least 8 characters long");
                None
            }
            Some(Some(problem)) => {
                e.add("password", problem);
                None
            }
            Some(None) => self.password,
        };
        let address = require_text(&mut e, "address", &self.address, "Address is required");
        e.into_result()?;

        match (full_name, employee_id, phone, email, password, address) {
            (Some(full_name), Some(employee_id), Some(phone), Some(email), Some(password), Some(address)) => {
                Ok(EmployeeDraft {
                    full_name,
                    employee_id,
                    phone,
                    email,
                    password,
                    address,
                })
            }
            _ => Err(FieldErrors::new()),
        }
    }
}

/// Admin edit of an end user. Only contact fields are writable.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdateInput {
    pub full_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
}

impl Validate for UserUpdateInput {
    type Output = UserUpdate;

    fn validate(self) -> Result<UserUpdate, FieldErrors> {
        let mut e = FieldErrors::new();
        if let Some(name) = &self.full_name {
            if name.trim().is_empty() {
                e.add("fullName", "Full name cannot be empty");
            }
        }
        let email = match self.email {
            Some(_) => check_email(&mut e, "email", &self.email, "Invalid email format"),
            None => None,
        };
        e.into_result()?;
        Ok(UserUpdate {
            full_name: self.full_name.map(|n| n.trim().to_string()),
            email,
        })
    }
}
