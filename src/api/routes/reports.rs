//! Report Routes
//!
//! Documents rendered on demand as PDF (default), CSV or plain text.
//!
//! - GET /api/v1/reports/invoices/:id - Invoice or quote
//! - GET /api/v1/reports/payroll/:id - Payroll run
//! - GET /api/v1/reports/transactions - Statement transactions (`?statement_id=`)
//! - GET /api/v1/reports/inventory - Stock listing

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::api::dto::ReportParams;
use crate::api::error::{ApiError, ApiResult};
use crate::api::routes::inventory::load_items;
use crate::api::state::AppState;
use crate::domain::{
    decode_row, BankStatement, Client, CompanyData, Invoice, InventoryItem, PayrollRun,
    StatementTransaction, TableKind,
};
use crate::report::{self, Report, ReportFormat};

/// GET /api/v1/reports/invoices/:id
pub async fn invoice(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<ReportParams>,
) -> ApiResult<Response> {
    let format = parse_format(&params)?;
    let invoice: Invoice = load_record(&state, TableKind::Invoices, &id)?;

    let client: Option<Client> = if invoice.client_id.is_empty() {
        None
    } else {
        state
            .tables
            .get(TableKind::Clients.name(), &invoice.client_id)?
            .and_then(|row| decode_row(&row).ok())
    };
    let company = company_profile(&state).await;

    let report = report::invoice_report(&invoice, client.as_ref(), company.as_ref());
    let name = format!(
        "{}-{}",
        invoice.kind.to_string().to_lowercase(),
        slug(&invoice.number, &invoice.id)
    );
    rendered(&report, format, &name)
}

/// GET /api/v1/reports/payroll/:id
pub async fn payroll(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<ReportParams>,
) -> ApiResult<Response> {
    let format = parse_format(&params)?;
    let run: PayrollRun = load_record(&state, TableKind::PayrollRuns, &id)?;

    let report = report::payroll_report(&run);
    rendered(&report, format, &format!("payroll-{}", slug("", &run.id)))
}

/// GET /api/v1/reports/transactions
pub async fn transactions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReportParams>,
) -> ApiResult<Response> {
    let format = parse_format(&params)?;

    let mut rows = state.tables.list(TableKind::StatementTransactions.name())?;
    if let Some(statement_id) = params.statement_id.as_deref() {
        rows.retain(|row| row.get("statement_id").and_then(|v| v.as_str()) == Some(statement_id));
    }
    let mut transactions: Vec<StatementTransaction> =
        rows.iter().filter_map(|row| decode_row(row).ok()).collect();
    transactions.sort_by(|a, b| a.date.cmp(&b.date));

    let title = match params.statement_id.as_deref() {
        Some(id) => match state.tables.get(TableKind::BankStatements.name(), id)? {
            Some(row) => {
                let statement: BankStatement = decode_row(&row)?;
                format!("{} - {}", statement.bank_name, statement.account_name)
            }
            None => return Err(ApiError::NotFound(format!("Bank statement {} not found", id))),
        },
        None => "All transactions".to_string(),
    };

    let report = report::transactions_report(&title, &transactions);
    rendered(&report, format, "transactions")
}

/// GET /api/v1/reports/inventory
pub async fn inventory(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReportParams>,
) -> ApiResult<Response> {
    let format = parse_format(&params)?;
    let mut items: Vec<InventoryItem> = load_items(&state)?.into_iter().map(|(_, item)| item).collect();
    items.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

    let report = report::inventory_report(&items);
    rendered(&report, format, "inventory")
}

fn parse_format(params: &ReportParams) -> ApiResult<ReportFormat> {
    match params.format.as_deref() {
        Some(format) => Ok(format.parse()?),
        None => Ok(ReportFormat::default()),
    }
}

fn load_record<T: DeserializeOwned>(state: &AppState, kind: TableKind, id: &str) -> ApiResult<T> {
    let row = state
        .tables
        .get(kind.name(), id)?
        .ok_or_else(|| ApiError::NotFound(format!("Record {} not found in {}", id, kind)))?;
    Ok(decode_row(&row)?)
}

/// Company details for document headers: the first `company_data` row, else
/// the `company_data` vault key.
async fn company_profile(state: &AppState) -> Option<CompanyData> {
    let from_table = state
        .tables
        .list(TableKind::CompanyData.name())
        .ok()
        .and_then(|rows| rows.into_iter().next())
        .and_then(|row| decode_row(&row).ok());

    match from_table {
        Some(company) => Some(company),
        None => state.vault.get("company_data").await,
    }
}

/// Filesystem-safe name fragment
fn slug(preferred: &str, fallback: &str) -> String {
    let source = if preferred.trim().is_empty() { fallback } else { preferred };
    let cleaned: String = source
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}

fn rendered(report: &Report, format: ReportFormat, name: &str) -> ApiResult<Response> {
    let bytes = report::render(report, format)?;
    let disposition = format!("inline; filename=\"{}.{}\"", name, format.extension());

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
