//! Clients and vendors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::validation::{Validate, ValidationError, Validator};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    #[default]
    Company,
    Individual,
    Vendor,
}

impl std::fmt::Display for ClientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientKind::Company => write!(f, "company"),
            ClientKind::Individual => write!(f, "individual"),
            ClientKind::Vendor => write!(f, "vendor"),
        }
    }
}

/// A customer or supplier
///
/// Companies and vendors are identified by `company_name`; individuals by
/// first and last name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Client {
    pub id: String,
    pub kind: ClientKind,
    pub company_name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub tax_id: String,
    pub notes: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl Client {
    pub fn company(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            kind: ClientKind::Company,
            company_name: name.into(),
            email: email.into(),
            ..Default::default()
        }
    }

    pub fn individual(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            kind: ClientKind::Individual,
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            ..Default::default()
        }
    }

    /// Name shown on documents and lists
    pub fn display_name(&self) -> String {
        match self.kind {
            ClientKind::Individual => format!("{} {}", self.first_name.trim(), self.last_name.trim())
                .trim()
                .to_string(),
            ClientKind::Company | ClientKind::Vendor => self.company_name.trim().to_string(),
        }
    }
}

impl Validate for Client {
    fn validate(&self) -> Result<(), ValidationError> {
        let v = match self.kind {
            ClientKind::Individual => Validator::new()
                .require("first_name", &self.first_name)
                .require("last_name", &self.last_name),
            ClientKind::Company | ClientKind::Vendor => {
                Validator::new().require("company_name", &self.company_name)
            }
        };
        v.require("email", &self.email)
            .email("email", &self.email)
            .finish()
    }
}
