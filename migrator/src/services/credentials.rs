//! Store credentials from environment variables
//!
//! Variables are read from the process environment after loading a `.env`
//! file from the current directory or a parent, if one exists. Values
//! already set in the environment win over the file.
//!
//! ## Required
//! - `SOURCE_SHOP`, `SOURCE_ACCESS_TOKEN`
//! - `DESTINATION_SHOP`, `DESTINATION_ACCESS_TOKEN`
//!
//! ## Optional
//! - `SHOPIFY_API_VERSION` (defaults to [`shared::DEFAULT_API_VERSION`])

use tracing::info;

use shared::{DEFAULT_API_VERSION, StoreCredential};

use crate::error::{MigrationError, MigrationResult};
use crate::traits::CredentialSource;
use crate::types::StorePair;

pub const SOURCE_SHOP: &str = "SOURCE_SHOP";
pub const SOURCE_ACCESS_TOKEN: &str = "SOURCE_ACCESS_TOKEN";
pub const DESTINATION_SHOP: &str = "DESTINATION_SHOP";
pub const DESTINATION_ACCESS_TOKEN: &str = "DESTINATION_ACCESS_TOKEN";
pub const API_VERSION: &str = "SHOPIFY_API_VERSION";

/// Credential source backed by the process environment
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvCredentialSource;

impl EnvCredentialSource {
    const REQUIRED_KEYS: &'static [&'static str] =
        &[SOURCE_SHOP, SOURCE_ACCESS_TOKEN, DESTINATION_SHOP, DESTINATION_ACCESS_TOKEN];

    pub fn new() -> Self {
        Self
    }

    /// Build both credentials from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> MigrationResult<StorePair>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let missing: Vec<&str> = Self::REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|&key| value(key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(MigrationError::config(format!(
                "Missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let api_version = value(API_VERSION).unwrap_or_else(|| DEFAULT_API_VERSION.to_string());
        let credential = |shop_key: &str, token_key: &str| -> MigrationResult<StoreCredential> {
            let shop = value(shop_key).unwrap_or_default();
            let token = value(token_key).unwrap_or_default();
            Ok(StoreCredential::for_shop(&shop, &api_version, token)?)
        };

        Ok(StorePair {
            source: credential(SOURCE_SHOP, SOURCE_ACCESS_TOKEN)?,
            destination: credential(DESTINATION_SHOP, DESTINATION_ACCESS_TOKEN)?,
        })
    }
}

impl CredentialSource for EnvCredentialSource {
    fn load(&self) -> MigrationResult<StorePair> {
        // No .env file is fine
        let _ = dotenv::dotenv();

        let stores = Self::from_lookup(|key| std::env::var(key).ok())?;
        info!(
            "🔑 Credentials loaded: source {} -> destination {}",
            stores.source.endpoint(),
            stores.destination.endpoint()
        );
        Ok(stores)
    }
}
