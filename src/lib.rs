//! Lending Marketplace API Library
//!
//! This library provides the core functionality for the lending marketplace
//! backend: phone-OTP sign-in, KYC orchestration with verified-profile
//! normalization, credit-bureau lookups, score-tiered offer matching,
//! referral bonuses, subscription payments and back-office management.
//!
//! # Modules
//!
//! - `api`: HTTP-facing components.
//! - `core`: Core business logic.
//! - `integrations`: External service integrations.
//! - `admin_handlers`: Back-office HTTP handlers.
//! - `auth`: Password hashing, sessions and role extractors.
//! - `config`: Configuration management.
//! - `db`: Database connection and migrations.
//! - `db_storage`: PostgreSQL storage backend.
//! - `errors`: Error handling types.
//! - `handlers`: Application state, auth, user and public catalog handlers.
//! - `kyc_handler`: KYC start and vendor callback.
//! - `models`: Core data models.
//! - `normalizer`: Verification-profile normalizer.
//! - `offer_matcher`: Credit-score offer tiers.
//! - `payment_handler`: Payment orders and gateway webhook.
//! - `referral`: Referral codes and bonus adjustment.
//! - `requests`: Request payloads and their validation.
//! - `router`: Route table and middleware.
//! - `services`: Vendor clients (OTP, KYC, payment gateway, credit bureau).
//! - `storage`: Storage trait and in-memory backend.
//! - `validation`: Field validation primitives.

pub mod api;
pub mod core;
pub mod integrations;

pub mod admin_handlers;
pub mod auth;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod errors;
pub mod handlers;
pub mod kyc_handler;
pub mod models;
pub mod normalizer;
pub mod offer_matcher;
pub mod payment_handler;
pub mod referral;
pub mod requests;
pub mod router;
pub mod services;
pub mod storage;
pub mod validation;
