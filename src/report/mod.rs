//! Document and report generation
//!
//! A [`Report`] is a renderer-neutral layout: heading, meta lines, one table,
//! summary lines. Builders in [`builders`] produce reports from domain records;
//! [`render`] turns them into text, CSV or PDF bytes.

pub mod builders;
pub mod pdf;

pub use builders::{inventory_report, invoice_report, payroll_report, transactions_report};

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Unknown report format: {0}")]
    UnknownFormat(String),
}

impl From<csv::Error> for ReportError {
    fn from(err: csv::Error) -> Self {
        ReportError::Csv(err.to_string())
    }
}

pub type ReportResult<T> = Result<T, ReportError>;

/// Widest a text column is allowed to get
const MAX_COLUMN_WIDTH: usize = 40;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub title: String,
    pub align: Align,
}

impl Column {
    pub fn left(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            align: Align::Left,
        }
    }

    pub fn right(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            align: Align::Right,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    pub title: String,
    pub subtitle: Option<String>,
    pub meta: Vec<(String, String)>,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<String>>,
    pub summary: Vec<(String, String)>,
}

impl Report {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Builder method: set the subtitle
    pub fn subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    /// Builder method: add a meta line
    pub fn meta(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.push((label.into(), value.into()));
        self
    }

    /// Builder method: set the table columns
    pub fn columns(mut self, columns: Vec<Column>) -> Self {
        self.columns = columns;
        self
    }

    /// Builder method: add a table row
    pub fn row(mut self, cells: Vec<String>) -> Self {
        self.rows.push(cells);
        self
    }

    /// Builder method: add a summary line
    pub fn summary(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.summary.push((label.into(), value.into()));
        self
    }

    /// Fixed-width text layout, shared by the text and PDF renderers
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![self.title.clone()];
        if let Some(subtitle) = &self.subtitle {
            lines.push(subtitle.clone());
        }
        lines.push(String::new());

        if !self.meta.is_empty() {
            let width = self.meta.iter().map(|(l, _)| l.len()).max().unwrap_or(0);
            for (label, value) in &self.meta {
                lines.push(format!("{:<width$}  {}", format!("{}:", label), value, width = width + 1));
            }
            lines.push(String::new());
        }

        if !self.columns.is_empty() {
            let widths = self.column_widths();
            let header: Vec<Cell> = self
                .columns
                .iter()
                .map(|c| Cell(c.title.as_str(), c.align))
                .collect();
            lines.push(layout_row(&header, &widths));
            lines.push(
                widths
                    .iter()
                    .map(|w| "-".repeat(*w))
                    .collect::<Vec<_>>()
                    .join("  "),
            );

            for row in &self.rows {
                let cells: Vec<Cell> = self
                    .columns
                    .iter()
                    .enumerate()
                    .map(|(i, c)| Cell(row.get(i).map(String::as_str).unwrap_or(""), c.align))
                    .collect();
                lines.push(layout_row(&cells, &widths));
            }
            lines.push(String::new());
        }

        if !self.summary.is_empty() {
            let label_width = self.summary.iter().map(|(l, _)| l.len()).max().unwrap_or(0);
            let value_width = self.summary.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
            for (label, value) in &self.summary {
                lines.push(format!(
                    "{:>lw$}  {:>vw$}",
                    label,
                    value,
                    lw = label_width,
                    vw = value_width
                ));
            }
        }

        while lines.last().map(|l| l.is_empty()).unwrap_or(false) {
            lines.pop();
        }
        lines
    }

    pub fn to_text(&self) -> String {
        let mut text = self.lines().join("\n");
        text.push('\n');
        text
    }

    /// Table rows, then summary lines in the last two columns
    pub fn to_csv(&self) -> ReportResult<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());

        writer.write_record(self.columns.iter().map(|c| c.title.as_str()))?;
        for row in &self.rows {
            writer.write_record(row)?;
        }

        let pad = self.columns.len().saturating_sub(2);
        for (label, value) in &self.summary {
            let mut record = vec![""; pad];
            record.push(label.as_str());
            record.push(value.as_str());
            writer.write_record(&record)?;
        }

        writer
            .into_inner()
            .map_err(|e| ReportError::Csv(e.to_string()))
    }

    pub fn to_pdf(&self) -> Vec<u8> {
        pdf::text_pdf(&self.lines())
    }

    fn column_widths(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let widest_cell = self
                    .rows
                    .iter()
                    .filter_map(|r| r.get(i))
                    .map(|s| s.chars().count())
                    .max()
                    .unwrap_or(0);
                c.title.chars().count().max(widest_cell).min(MAX_COLUMN_WIDTH)
            })
            .collect()
    }
}

struct Cell<'a>(&'a str, Align);

fn layout_row(cells: &[Cell<'_>], widths: &[usize]) -> String {
    let parts: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(Cell(text, align), width)| {
            let text = truncate(text, *width);
            match align {
                Align::Left => format!("{:<width$}", text, width = width),
                Align::Right => format!("{:>width$}", text, width = width),
            }
        })
        .collect();
    parts.join("  ").trim_end().to_string()
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('~');
    cut
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Pdf,
    Csv,
    Text,
}

impl ReportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "application/pdf",
            ReportFormat::Csv => "text/csv; charset=utf-8",
            ReportFormat::Text => "text/plain; charset=utf-8",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Csv => "csv",
            ReportFormat::Text => "txt",
        }
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pdf" => Ok(ReportFormat::Pdf),
            "csv" => Ok(ReportFormat::Csv),
            "text" | "txt" => Ok(ReportFormat::Text),
            other => Err(ReportError::UnknownFormat(other.to_string())),
        }
    }
}

/// Render a report in the requested format
pub fn render(report: &Report, format: ReportFormat) -> ReportResult<Vec<u8>> {
    match format {
        ReportFormat::Pdf => Ok(report.to_pdf()),
        ReportFormat::Csv => report.to_csv(),
        ReportFormat::Text => Ok(report.to_text().into_bytes()),
    }
}

/// `1234567.5` → `1,234,567.50`
pub fn format_amount(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::new();
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, cents)
}

/// Whole quantities without decimals
pub fn format_quantity(quantity: f64) -> String {
    if quantity.fract() == 0.0 {
        format!("{}", quantity as i64)
    } else {
        format!("{:.2}", quantity)
    }
}
