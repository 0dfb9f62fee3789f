//! Report builders for domain records

use chrono::NaiveDate;

use super::{format_amount, format_quantity, Column, Report};
use crate::domain::accounting::{self, StatementTransaction, TransactionKind};
use crate::domain::inventory::{self, InventoryItem};
use crate::domain::{Client, CompanyData, DocumentKind, Invoice, PayrollRun};

fn date(value: Option<NaiveDate>) -> String {
    value
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn percent(value: f64) -> String {
    let text = format!("{:.2}", value);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Printable invoice or quote
pub fn invoice_report(invoice: &Invoice, client: Option<&Client>, company: Option<&CompanyData>) -> Report {
    let currency = if invoice.currency.is_empty() {
        company.map(|c| c.currency.as_str()).unwrap_or("USD")
    } else {
        invoice.currency.as_str()
    };

    let mut report = Report::new(format!("{} {}", invoice.kind, invoice.number));
    if let Some(company) = company {
        report = report.subtitle(company.name.clone());
    }

    let client_name = client
        .map(|c| c.display_name())
        .unwrap_or_else(|| invoice.client_id.clone());
    let due_label = match invoice.kind {
        DocumentKind::Invoice => "Due date",
        DocumentKind::Quote => "Valid until",
    };

    report = report
        .meta("Client", client_name)
        .meta("Issue date", date(invoice.issue_date))
        .meta(due_label, date(invoice.due_date))
        .meta("Status", invoice.status.to_string())
        .columns(vec![
            Column::left("Description"),
            Column::right("Qty"),
            Column::right("Unit price"),
            Column::right("Amount"),
        ]);

    for item in &invoice.items {
        report = report.row(vec![
            item.description.clone(),
            format_quantity(item.quantity),
            format_amount(item.unit_price),
            format_amount(item.amount()),
        ]);
    }

    let totals = invoice.totals();
    report = report.summary("Subtotal", format_amount(totals.subtotal));
    if invoice.discount_percent > 0.0 {
        report = report.summary(
            format!("Discount ({}%)", percent(invoice.discount_percent)),
            format!("-{}", format_amount(totals.discount)),
        );
    }
    if invoice.tax_rate > 0.0 {
        report = report.summary(
            format!("Tax ({}%)", percent(invoice.tax_rate)),
            format_amount(totals.tax),
        );
    }
    report = report.summary("Total", format!("{} {}", currency, format_amount(totals.total)));

    if !invoice.notes.trim().is_empty() {
        report = report.meta("Notes", invoice.notes.trim().to_string());
    }
    report
}

/// Payroll run register
pub fn payroll_report(run: &PayrollRun) -> Report {
    let mut report = Report::new(format!(
        "Payroll {} to {}",
        date(run.period_start),
        date(run.period_end)
    ))
    .meta("Pay date", date(run.pay_date))
    .meta("Status", format!("{:?}", run.status).to_lowercase())
    .columns(vec![
        Column::left("Employee"),
        Column::right("Gross"),
        Column::right("Deductions"),
        Column::right("Net"),
    ]);

    for entry in &run.entries {
        let name = if entry.employee_name.trim().is_empty() {
            entry.employee_id.clone()
        } else {
            entry.employee_name.clone()
        };
        report = report.row(vec![
            name,
            format_amount(entry.gross),
            format_amount(entry.deductions),
            format_amount(entry.net()),
        ]);
    }

    let totals = run.totals();
    report
        .summary("Employees", run.entries.len().to_string())
        .summary("Gross", format_amount(totals.gross))
        .summary("Deductions", format_amount(totals.deductions))
        .summary("Net pay", format_amount(totals.net))
}

/// Statement transaction listing, ordered by date
pub fn transactions_report(title: &str, transactions: &[StatementTransaction]) -> Report {
    let mut sorted: Vec<&StatementTransaction> = transactions.iter().collect();
    sorted.sort_by_key(|t| t.date);

    let mut report = Report::new(title).columns(vec![
        Column::left("Date"),
        Column::left("Description"),
        Column::left("Category"),
        Column::right("Credit"),
        Column::right("Debit"),
    ]);

    if let (Some(first), Some(last)) = (
        sorted.iter().filter_map(|t| t.date).min(),
        sorted.iter().filter_map(|t| t.date).max(),
    ) {
        report = report.meta("Period", format!("{} to {}", first, last));
    }

    for tx in &sorted {
        let (credit, debit) = match tx.kind {
            TransactionKind::Credit => (format_amount(tx.amount), String::new()),
            TransactionKind::Debit => (String::new(), format_amount(tx.amount)),
        };
        report = report.row(vec![
            date(tx.date),
            tx.description.clone(),
            tx.category.clone(),
            credit,
            debit,
        ]);
    }

    let summary = accounting::summarize(transactions);
    report
        .summary("Transactions", summary.count.to_string())
        .summary("Credits", format_amount(summary.credits))
        .summary("Debits", format_amount(summary.debits))
        .summary("Net", format_amount(summary.net))
}

/// Stock listing with valuation
pub fn inventory_report(items: &[InventoryItem]) -> Report {
    let mut report = Report::new("Inventory").columns(vec![
        Column::left("SKU"),
        Column::left("Name"),
        Column::right("Qty"),
        Column::right("Unit cost"),
        Column::right("Value"),
        Column::left("Reorder"),
    ]);

    for item in items {
        report = report.row(vec![
            item.sku.clone(),
            item.name.clone(),
            item.quantity.to_string(),
            format_amount(item.unit_cost),
            format_amount(item.stock_value()),
            if item.needs_reorder() { "yes".to_string() } else { String::new() },
        ]);
    }

    let summary = inventory::summarize(items);
    report
        .summary("Items", summary.items.to_string())
        .summary("Units", summary.units.to_string())
        .summary("Stock value", format_amount(summary.value))
        .summary("Below reorder level", summary.below_reorder.to_string())
}
