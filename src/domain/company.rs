//! Company profile

use serde::{Deserialize, Serialize};

use super::validation::{Validate, ValidationError, Validator};

/// The business running the desk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyData {
    pub id: String,
    pub name: String,
    pub address: String,
    pub email: String,
    pub phone: String,
    pub tax_id: String,
    /// ISO 4217 code used when a document does not set its own
    pub currency: String,
    /// Object path of the logo in the `company-logos` bucket
    pub logo_path: Option<String>,
}

impl CompanyData {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            currency: "USD".to_string(),
            ..Default::default()
        }
    }
}

impl Validate for CompanyData {
    fn validate(&self) -> Result<(), ValidationError> {
        Validator::new()
            .require("name", &self.name)
            .require("email", &self.email)
            .email("email", &self.email)
            .check(
                self.currency.is_empty() || self.currency.len() == 3,
                "currency",
                "must be a three-letter code",
            )
            .finish()
    }
}
