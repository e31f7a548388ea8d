//! Backend configuration.
//!
//! The store is either wired to an endpoint or it is not. `Backend` makes
//! that a value decided once at start-up: a `RentalClient` only exists inside
//! `Configured`, and every store operation asks for it before building a
//! request.

use rental_core::{ApiError, RentalClient};
use tracing::warn;

pub const URL_VAR: &str = "SUPABASE_URL";
pub const KEY_VAR: &str = "SUPABASE_ANON_KEY";

/// Names used by the web front-end's build environment.
const URL_FALLBACK: &str = "REACT_APP_SUPABASE_URL";
const KEY_FALLBACK: &str = "REACT_APP_SUPABASE_ANON_KEY";

#[derive(Debug, Clone)]
pub enum Backend {
    Configured(RentalClient),
    Unconfigured,
}

impl Backend {
    pub fn configured(url: &str, api_key: &str) -> Self {
        Backend::Configured(RentalClient::new(url, api_key))
    }

    /// Read the endpoint and key from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |names: [&str; 2]| {
            names
                .into_iter()
                .filter_map(&lookup)
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        };
        match (read([URL_VAR, URL_FALLBACK]), read([KEY_VAR, KEY_FALLBACK])) {
            (Some(url), Some(key)) => Self::configured(&url, &key),
            (url, key) => {
                warn!(
                    url_set = url.is_some(),
                    key_set = key.is_some(),
                    "{URL_VAR} or {KEY_VAR} is missing; remote store disabled"
                );
                Backend::Unconfigured
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Backend::Configured(_))
    }

    pub fn client(&self) -> Result<&RentalClient, ApiError> {
        match self {
            Backend::Configured(client) => Ok(client),
            Backend::Unconfigured => Err(ApiError::NotConfigured),
        }
    }
}
