//! Bank statements and their transactions

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::round_cents;
use super::validation::{Validate, ValidationError, Validator};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankStatement {
    pub id: String,
    pub account_name: String,
    pub bank_name: String,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub opening_balance: f64,
    pub closing_balance: f64,
    /// Object path of the uploaded statement in `bank-statements`
    pub file_path: Option<String>,
}

impl Validate for BankStatement {
    fn validate(&self) -> Result<(), ValidationError> {
        let ordered = match (self.period_start, self.period_end) {
            (Some(start), Some(end)) => end >= start,
            _ => true,
        };
        Validator::new()
            .require("account_name", &self.account_name)
            .require("bank_name", &self.bank_name)
            .require_some("period_start", &self.period_start)
            .require_some("period_end", &self.period_end)
            .check(ordered, "period_end", "must not precede period_start")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Credit,
    #[default]
    Debit,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKind::Credit => write!(f, "credit"),
            TransactionKind::Debit => write!(f, "debit"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementTransaction {
    pub id: String,
    pub statement_id: String,
    pub date: Option<NaiveDate>,
    pub description: String,
    /// Always positive; direction comes from `kind`
    pub amount: f64,
    pub kind: TransactionKind,
    pub category: String,
    /// Object path in `transaction-receipts`
    pub receipt_path: Option<String>,
    pub reconciled: bool,
}

impl StatementTransaction {
    pub fn credit(description: impl Into<String>, amount: f64, date: NaiveDate) -> Self {
        Self {
            description: description.into(),
            amount,
            kind: TransactionKind::Credit,
            date: Some(date),
            ..Default::default()
        }
    }

    pub fn debit(description: impl Into<String>, amount: f64, date: NaiveDate) -> Self {
        Self {
            kind: TransactionKind::Debit,
            ..Self::credit(description, amount, date)
        }
    }

    /// Positive for credits, negative for debits
    pub fn signed_amount(&self) -> f64 {
        match self.kind {
            TransactionKind::Credit => self.amount,
            TransactionKind::Debit => -self.amount,
        }
    }
}

impl Validate for StatementTransaction {
    fn validate(&self) -> Result<(), ValidationError> {
        Validator::new()
            .require("description", &self.description)
            .require_some("date", &self.date)
            .check(self.amount > 0.0, "amount", "must be greater than zero")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TransactionSummary {
    pub count: usize,
    pub credits: f64,
    pub debits: f64,
    pub net: f64,
}

pub fn summarize(transactions: &[StatementTransaction]) -> TransactionSummary {
    let sum_of = |kind: TransactionKind| {
        round_cents(
            transactions
                .iter()
                .filter(|t| t.kind == kind)
                .map(|t| t.amount)
                .sum(),
        )
    };
    let credits = sum_of(TransactionKind::Credit);
    let debits = sum_of(TransactionKind::Debit);

    TransactionSummary {
        count: transactions.len(),
        credits,
        debits,
        net: round_cents(credits - debits),
    }
}
