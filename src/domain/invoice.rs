//! Invoices and quotes
//!
//! Both document kinds share one record shape. Totals are derived, never
//! stored: discount applies to the subtotal, tax to the discounted amount.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::round_cents;
use super::validation::{Validate, ValidationError, Validator};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    #[default]
    Invoice,
    Quote,
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentKind::Invoice => write!(f, "Invoice"),
            DocumentKind::Quote => write!(f, "Quote"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
    Accepted,
    Rejected,
}

impl InvoiceStatus {
    /// Whether a document of `kind` may carry this status
    pub fn applies_to(&self, kind: DocumentKind) -> bool {
        match self {
            InvoiceStatus::Draft | InvoiceStatus::Sent | InvoiceStatus::Cancelled => true,
            InvoiceStatus::Paid | InvoiceStatus::Overdue => kind == DocumentKind::Invoice,
            InvoiceStatus::Accepted | InvoiceStatus::Rejected => kind == DocumentKind::Quote,
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
            InvoiceStatus::Accepted => "accepted",
            InvoiceStatus::Rejected => "rejected",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineItem {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
}

impl LineItem {
    pub fn new(description: impl Into<String>, quantity: f64, unit_price: f64) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price,
        }
    }

    pub fn amount(&self) -> f64 {
        round_cents(self.quantity * self.unit_price)
    }
}

impl Validate for LineItem {
    fn validate(&self) -> Result<(), ValidationError> {
        Validator::new()
            .require("description", &self.description)
            .check(self.quantity > 0.0, "quantity", "must be greater than zero")
            .check(self.unit_price >= 0.0, "unit_price", "must not be negative")
            .finish()
    }
}

/// Derived monetary totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct InvoiceTotals {
    pub subtotal: f64,
    pub discount: f64,
    pub tax: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Invoice {
    pub id: String,
    pub kind: DocumentKind,
    pub number: String,
    pub client_id: String,
    pub issue_date: Option<NaiveDate>,
    /// Payment due date for invoices, validity end for quotes
    pub due_date: Option<NaiveDate>,
    pub status: InvoiceStatus,
    pub items: Vec<LineItem>,
    /// Percent, applied after the discount
    pub tax_rate: f64,
    /// Percent of the subtotal
    pub discount_percent: f64,
    pub currency: String,
    pub notes: String,
}

impl Invoice {
    pub fn new(kind: DocumentKind, number: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            kind,
            number: number.into(),
            client_id: client_id.into(),
            currency: "USD".to_string(),
            ..Default::default()
        }
    }

    /// Builder method: add a line item
    pub fn item(mut self, item: LineItem) -> Self {
        self.items.push(item);
        self
    }

    /// Builder method: set issue and due dates
    pub fn dated(mut self, issue: NaiveDate, due: Option<NaiveDate>) -> Self {
        self.issue_date = Some(issue);
        self.due_date = due;
        self
    }

    pub fn totals(&self) -> InvoiceTotals {
        let subtotal = round_cents(self.items.iter().map(|i| i.amount()).sum());
        let discount = round_cents(subtotal * self.discount_percent / 100.0);
        let taxable = subtotal - discount;
        let tax = round_cents(taxable * self.tax_rate / 100.0);

        InvoiceTotals {
            subtotal,
            discount,
            tax,
            total: round_cents(taxable + tax),
        }
    }

    /// A sent invoice past its due date
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.kind == DocumentKind::Invoice
            && matches!(self.status, InvoiceStatus::Sent | InvoiceStatus::Overdue)
            && self.due_date.map(|d| d < today).unwrap_or(false)
    }
}

impl Validate for Invoice {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Validator::new()
            .require("number", &self.number)
            .require("client_id", &self.client_id)
            .require_some("issue_date", &self.issue_date);

        if self.items.is_empty() {
            v = v.require("items", "");
        }
        for (i, item) in self.items.iter().enumerate() {
            v = v.nested(&format!("items[{}]", i), item.validate());
        }

        let dates_ordered = match (self.issue_date, self.due_date) {
            (Some(issue), Some(due)) => due >= issue,
            _ => true,
        };

        v.check(dates_ordered, "due_date", "must not precede issue_date")
            .check(
                (0.0..=100.0).contains(&self.tax_rate),
                "tax_rate",
                "must be between 0 and 100",
            )
            .check(
                (0.0..=100.0).contains(&self.discount_percent),
                "discount_percent",
                "must be between 0 and 100",
            )
            .check(
                self.status.applies_to(self.kind),
                "status",
                format!("{} is not valid for a {}", self.status, self.kind),
            )
            .finish()
    }
}
