//! Tenant scope.
//!
//! A [`SiteScope`] identifies the site whose chatbot and document catalog the
//! console is currently operating on, together with the bearer credential
//! used for every backend call.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The active tenant: site id, bearer credential and display name (Value Object)
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteScope {
    pub site_id: String,
    pub token: String,
    pub name: String,
}

impl SiteScope {
    pub fn new(
        site_id: impl Into<String>,
        token: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            site_id: site_id.into(),
            token: token.into(),
            name: name.into(),
        }
    }

    /// A scope is usable only when site id, token and name are all non-empty.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Validate the scope, naming the first empty field.
    pub fn validate(&self) -> Result<(), DomainError> {
        let fields = [
            ("site_id", &self.site_id),
            ("token", &self.token),
            ("name", &self.name),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(DomainError::InvalidScope(format!("{} is empty", field)));
            }
        }
        Ok(())
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl fmt::Debug for SiteScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteScope")
            .field("site_id", &self.site_id)
            .field("token", &"<redacted>")
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for SiteScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.site_id)
    }
}
