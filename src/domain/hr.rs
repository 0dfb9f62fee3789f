//! Human resources: employees, attendance, payroll and benefits

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::round_cents;
use super::validation::{Validate, ValidationError, Validator};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentStatus {
    #[default]
    Active,
    OnLeave,
    Terminated,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Employee {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub position: String,
    pub department: String,
    pub hire_date: Option<NaiveDate>,
    /// Annual base salary
    pub salary: f64,
    pub status: EmploymentStatus,
    /// Object path in the `employee-images` bucket
    pub image_path: Option<String>,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

impl Validate for Employee {
    fn validate(&self) -> Result<(), ValidationError> {
        Validator::new()
            .require("first_name", &self.first_name)
            .require("last_name", &self.last_name)
            .require("email", &self.email)
            .require("position", &self.position)
            .require_some("hire_date", &self.hire_date)
            .email("email", &self.email)
            .check(self.salary >= 0.0, "salary", "must not be negative")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    #[default]
    Present,
    Absent,
    Late,
    Leave,
}

/// One employee-day
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceRecord {
    pub id: String,
    pub employee_id: String,
    pub date: Option<NaiveDate>,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub status: AttendanceStatus,
    pub notes: String,
}

impl AttendanceRecord {
    /// Hours between check-in and check-out, rounded to cents of an hour
    pub fn hours_worked(&self) -> f64 {
        match (self.check_in, self.check_out) {
            (Some(start), Some(end)) if end > start => {
                round_cents((end - start).num_seconds() as f64 / 3600.0)
            }
            _ => 0.0,
        }
    }
}

impl Validate for AttendanceRecord {
    fn validate(&self) -> Result<(), ValidationError> {
        let ordered = match (self.check_in, self.check_out) {
            (Some(start), Some(end)) => end >= start,
            _ => true,
        };
        let absent_without_times = self.status != AttendanceStatus::Absent
            || (self.check_in.is_none() && self.check_out.is_none());

        Validator::new()
            .require("employee_id", &self.employee_id)
            .require_some("date", &self.date)
            .check(ordered, "check_out", "must not precede check_in")
            .check(absent_without_times, "status", "absent records carry no check times")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayrollStatus {
    #[default]
    Draft,
    Processed,
    Paid,
}

/// One employee's line in a payroll run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayrollEntry {
    pub employee_id: String,
    pub employee_name: String,
    pub gross: f64,
    pub deductions: f64,
}

impl PayrollEntry {
    pub fn net(&self) -> f64 {
        round_cents(self.gross - self.deductions)
    }
}

impl Validate for PayrollEntry {
    fn validate(&self) -> Result<(), ValidationError> {
        Validator::new()
            .require("employee_id", &self.employee_id)
            .check(self.gross >= 0.0, "gross", "must not be negative")
            .check(self.deductions >= 0.0, "deductions", "must not be negative")
            .check(
                self.deductions <= self.gross,
                "deductions",
                "must not exceed gross pay",
            )
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PayrollTotals {
    pub gross: f64,
    pub deductions: f64,
    pub net: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayrollRun {
    pub id: String,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub pay_date: Option<NaiveDate>,
    pub status: PayrollStatus,
    pub entries: Vec<PayrollEntry>,
}

impl PayrollRun {
    pub fn totals(&self) -> PayrollTotals {
        let gross = round_cents(self.entries.iter().map(|e| e.gross).sum());
        let deductions = round_cents(self.entries.iter().map(|e| e.deductions).sum());
        PayrollTotals {
            gross,
            deductions,
            net: round_cents(gross - deductions),
        }
    }
}

impl Validate for PayrollRun {
    fn validate(&self) -> Result<(), ValidationError> {
        let ordered = match (self.period_start, self.period_end) {
            (Some(start), Some(end)) => end >= start,
            _ => true,
        };

        let mut v = Validator::new()
            .require_some("period_start", &self.period_start)
            .require_some("period_end", &self.period_end)
            .check(ordered, "period_end", "must not precede period_start");

        for (i, entry) in self.entries.iter().enumerate() {
            v = v.nested(&format!("entries[{}]", i), entry.validate());
        }
        v.finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BenefitKind {
    #[default]
    Health,
    Dental,
    Vision,
    Retirement,
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenefitPlan {
    pub id: String,
    pub name: String,
    pub provider: String,
    pub kind: BenefitKind,
    /// Monthly amounts
    pub employer_contribution: f64,
    pub employee_contribution: f64,
    pub description: String,
}

impl BenefitPlan {
    pub fn monthly_cost(&self) -> f64 {
        round_cents(self.employer_contribution + self.employee_contribution)
    }
}

impl Validate for BenefitPlan {
    fn validate(&self) -> Result<(), ValidationError> {
        Validator::new()
            .require("name", &self.name)
            .require("provider", &self.provider)
            .check(
                self.employer_contribution >= 0.0,
                "employer_contribution",
                "must not be negative",
            )
            .check(
                self.employee_contribution >= 0.0,
                "employee_contribution",
                "must not be negative",
            )
            .finish()
    }
}
