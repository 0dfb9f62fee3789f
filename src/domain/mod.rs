//! BizDesk domain records
//!
//! Entity types for every table the desk manages, plus the `Validate` trait
//! that gatekeeps writes. `TableKind` ties a table name to its entity type so
//! untyped JSON rows can be validated before they are stored.

pub mod accounting;
pub mod client;
pub mod company;
pub mod hr;
pub mod inventory;
pub mod invoice;
pub mod validation;

pub use accounting::{BankStatement, StatementTransaction, TransactionKind, TransactionSummary};
pub use client::{Client, ClientKind};
pub use company::CompanyData;
pub use hr::{
    AttendanceRecord, AttendanceStatus, BenefitKind, BenefitPlan, Employee, EmploymentStatus,
    PayrollEntry, PayrollRun, PayrollStatus, PayrollTotals,
};
pub use inventory::{find_by_code, InventoryItem, StockSummary};
pub use invoice::{DocumentKind, Invoice, InvoiceStatus, InvoiceTotals, LineItem};
pub use validation::{FieldIssue, Validate, ValidationError, Validator};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Round a monetary amount to two decimals
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Every table the desk knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    CompanyData,
    Clients,
    Invoices,
    Employees,
    Attendance,
    PayrollRuns,
    BenefitPlans,
    Inventory,
    BankStatements,
    StatementTransactions,
}

impl TableKind {
    pub fn all() -> &'static [TableKind] {
        &[
            TableKind::CompanyData,
            TableKind::Clients,
            TableKind::Invoices,
            TableKind::Employees,
            TableKind::Attendance,
            TableKind::PayrollRuns,
            TableKind::BenefitPlans,
            TableKind::Inventory,
            TableKind::BankStatements,
            TableKind::StatementTransactions,
        ]
    }

    /// Table name as stored and routed
    pub fn name(&self) -> &'static str {
        match self {
            TableKind::CompanyData => "company_data",
            TableKind::Clients => "clients",
            TableKind::Invoices => "invoices",
            TableKind::Employees => "employees",
            TableKind::Attendance => "attendance",
            TableKind::PayrollRuns => "payroll_runs",
            TableKind::BenefitPlans => "benefit_plans",
            TableKind::Inventory => "inventory",
            TableKind::BankStatements => "bank_statements",
            TableKind::StatementTransactions => "statement_transactions",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|t| t.name() == name)
    }

    /// A default row of this table: shows the JSON type of every field
    pub fn template(&self) -> Value {
        match self {
            TableKind::CompanyData => template_of::<CompanyData>(),
            TableKind::Clients => template_of::<Client>(),
            TableKind::Invoices => template_of::<Invoice>(),
            TableKind::Employees => template_of::<Employee>(),
            TableKind::Attendance => template_of::<AttendanceRecord>(),
            TableKind::PayrollRuns => template_of::<PayrollRun>(),
            TableKind::BenefitPlans => template_of::<BenefitPlan>(),
            TableKind::Inventory => template_of::<InventoryItem>(),
            TableKind::BankStatements => template_of::<BankStatement>(),
            TableKind::StatementTransactions => template_of::<StatementTransaction>(),
        }
    }

    /// Decode a JSON row into this table's entity and validate it
    pub fn validate_row(&self, row: &Value) -> Result<(), ValidationError> {
        match self {
            TableKind::CompanyData => check::<CompanyData>(row),
            TableKind::Clients => check::<Client>(row),
            TableKind::Invoices => check::<Invoice>(row),
            TableKind::Employees => check::<Employee>(row),
            TableKind::Attendance => check::<AttendanceRecord>(row),
            TableKind::PayrollRuns => check::<PayrollRun>(row),
            TableKind::BenefitPlans => check::<BenefitPlan>(row),
            TableKind::Inventory => check::<InventoryItem>(row),
            TableKind::BankStatements => check::<BankStatement>(row),
            TableKind::StatementTransactions => check::<StatementTransaction>(row),
        }
    }
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for TableKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("Unknown table: {}", s))
    }
}

/// Decode a row into `T`, reporting shape errors as an invalid `row`
pub fn decode_row<T: DeserializeOwned>(row: &Value) -> Result<T, ValidationError> {
    if !row.is_object() {
        return Err(ValidationError::invalid("row", "must be a JSON object"));
    }
    serde_json::from_value(row.clone()).map_err(|e| ValidationError::invalid("row", e.to_string()))
}

fn template_of<T: Default + Serialize>() -> Value {
    serde_json::to_value(T::default()).unwrap_or(Value::Null)
}

fn check<T: DeserializeOwned + Validate>(row: &Value) -> Result<(), ValidationError> {
    decode_row::<T>(row)?.validate()
}
