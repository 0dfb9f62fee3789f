//! BizDesk CLI
//!
//! Command-line client for a running BizDesk server:
//! - Browse and edit table records
//! - Read, write and restore vault keys
//! - Upload and download files
//! - Render reports and import CSV files

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use reqwest::{Method, RequestBuilder, Response};
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "bizdesk-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Client for the BizDesk small-business server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL
    #[arg(long, default_value = "http://localhost:8082", global = true)]
    pub api_url: String,

    /// Bearer token (defaults to $BIZDESK_API_TOKEN)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show server status
    Status,

    /// Row counts per table
    Tables,

    /// List rows of a table
    List {
        table: String,
        /// Free-text search
        #[arg(short, long)]
        search: Option<String>,
        /// Sort field
        #[arg(long)]
        sort: Option<String>,
        /// Sort descending
        #[arg(long)]
        desc: bool,
        #[arg(short, long)]
        limit: Option<usize>,
        /// Equality filters in field=value format
        #[arg(short = 'F', long)]
        filter: Vec<String>,
    },

    /// Show one row
    Get { table: String, id: String },

    /// Create a row from JSON (inline or @file)
    Create { table: String, json: String },

    /// Merge JSON (inline or @file) into a row
    Update { table: String, id: String, json: String },

    /// Delete a row
    Delete { table: String, id: String },

    /// Vault key operations
    Vault {
        #[command(subcommand)]
        action: VaultAction,
    },

    /// Upload a file into a bucket
    Upload { bucket: String, path: PathBuf },

    /// Download an object
    Download {
        /// Object path as returned by upload
        object: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render a report
    Report {
        /// invoice, payroll, transactions or inventory
        kind: String,
        /// Invoice or payroll run id
        id: Option<String>,
        /// Restrict a transactions report to one statement
        #[arg(long)]
        statement: Option<String>,
        /// pdf, csv or text
        #[arg(long, default_value = "pdf")]
        as_format: String,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import table rows from CSV
    Import {
        table: String,
        path: PathBuf,
        /// Validate only
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        delimiter: Option<char>,
    },

    /// Look up an inventory item by barcode or SKU
    Barcode { code: String },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum VaultAction {
    /// Keys and tier statistics
    Ls,
    Get { key: String },
    /// Store JSON (inline or @file)
    Set { key: String, json: String },
    Rm { key: String },
    Backups { key: String },
    Restore { key: String },
    /// Back up every critical key now
    Backup,
}

/// Thin wrapper adding the base URL and bearer token to requests
struct Api {
    client: reqwest::Client,
    base: String,
    token: Option<String>,
}

impl Api {
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, format!("{}{}", self.base, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> anyhow::Result<Response> {
        let response = builder
            .send()
            .await
            .with_context(|| format!("cannot reach BizDesk API at {}", self.base))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message = body["error"]["message"].as_str().unwrap_or("request failed");
        match body["error"]["details"]["missing"].as_array() {
            Some(missing) if !missing.is_empty() => {
                let fields: Vec<&str> = missing.iter().filter_map(Value::as_str).collect();
                bail!("{} ({}); missing: {}", message, status, fields.join(", "))
            }
            _ => bail!("{} ({})", message, status),
        }
    }

    async fn json(&self, builder: RequestBuilder) -> anyhow::Result<Value> {
        Ok(self.send(builder).await?.json().await?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let api = Api {
        client: reqwest::Client::new(),
        base: cli.api_url.trim_end_matches('/').to_string(),
        token: cli
            .token
            .clone()
            .or_else(|| std::env::var("BIZDESK_API_TOKEN").ok())
            .filter(|t| !t.is_empty()),
    };
    let as_json = cli.format == "json";

    match cli.command {
        Commands::Status => {
            let health = api.json(api.request(Method::GET, "/health")).await?;
            if as_json {
                return print_json(&health);
            }

            println!("BizDesk v{}", health["version"].as_str().unwrap_or("?"));
            println!();
            println!("API Status: {}", health["status"].as_str().unwrap_or("unknown"));
            println!("Vault:      {}", health["vault"].as_str().unwrap_or("unknown"));
            println!("Tables:     {}", health["tables"].as_str().unwrap_or("unknown"));

            if let Some(tiers) = health["storage"]["tiers"].as_array() {
                println!();
                println!("Storage tiers:");
                for tier in tiers {
                    let name = tier["tier"].as_str().unwrap_or("-");
                    if tier["available"].as_bool().unwrap_or(false) {
                        println!(
                            "  {:<8} {} keys, {} backups",
                            name,
                            tier["keys"].as_u64().unwrap_or(0),
                            tier["backups"].as_u64().unwrap_or(0)
                        );
                    } else {
                        println!("  {:<8} unavailable", name);
                    }
                }
            }

            if let Some(uptime) = health["uptime_seconds"].as_u64() {
                println!();
                println!("Uptime: {}", format_duration(uptime));
            }
        }

        Commands::Tables => {
            let counts = api.json(api.request(Method::GET, "/api/v1/tables")).await?;
            if as_json {
                return print_json(&counts);
            }
            println!("{:<24} {}", "Table", "Rows");
            println!("{}", "-".repeat(32));
            for entry in counts.as_array().into_iter().flatten() {
                println!(
                    "{:<24} {}",
                    entry["table"].as_str().unwrap_or("-"),
                    entry["rows"].as_u64().unwrap_or(0)
                );
            }
        }

        Commands::List {
            table,
            search,
            sort,
            desc,
            limit,
            filter,
        } => {
            let mut query: Vec<(String, String)> = Vec::new();
            if let Some(q) = search {
                query.push(("q".to_string(), q));
            }
            if let Some(field) = sort {
                query.push(("sort".to_string(), field));
                query.push(("dir".to_string(), if desc { "desc" } else { "asc" }.to_string()));
            }
            if let Some(limit) = limit {
                query.push(("limit".to_string(), limit.to_string()));
            }
            for pair in &filter {
                let Some((field, value)) = pair.split_once('=') else {
                    bail!("Invalid filter '{}', expected field=value", pair);
                };
                query.push((field.to_string(), value.to_string()));
            }

            let listing = api
                .json(api.request(Method::GET, &format!("/api/v1/tables/{}", table)).query(&query))
                .await?;
            if as_json {
                return print_json(&listing);
            }
            print_rows(&table, &listing);
        }

        Commands::Get { table, id } => {
            let row = api
                .json(api.request(Method::GET, &format!("/api/v1/tables/{}/{}", table, id)))
                .await?;
            print_json(&row)?;
        }

        Commands::Create { table, json } => {
            let body = read_json_arg(&json)?;
            let row = api
                .json(api.request(Method::POST, &format!("/api/v1/tables/{}", table)).json(&body))
                .await?;
            println!("Created {}/{}", table, row["id"].as_str().unwrap_or("?"));
        }

        Commands::Update { table, id, json } => {
            let body = read_json_arg(&json)?;
            let row = api
                .json(
                    api.request(Method::PUT, &format!("/api/v1/tables/{}/{}", table, id))
                        .json(&body),
                )
                .await?;
            if as_json {
                return print_json(&row);
            }
            println!("Updated {}/{}", table, id);
        }

        Commands::Delete { table, id } => {
            api.send(api.request(Method::DELETE, &format!("/api/v1/tables/{}/{}", table, id)))
                .await?;
            println!("Deleted {}/{}", table, id);
        }

        Commands::Vault { action } => run_vault(&api, action, as_json).await?,

        Commands::Upload { bucket, path } => {
            let bytes = std::fs::read(&path).with_context(|| format!("reading {:?}", path))?;
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "upload".to_string());

            let uploaded = api
                .json(
                    api.request(Method::POST, &format!("/api/v1/buckets/{}", bucket))
                        .query(&[("filename", filename)])
                        .body(bytes),
                )
                .await?;
            println!("{}", uploaded["path"].as_str().unwrap_or("?"));
        }

        Commands::Download { object, output } => {
            let bytes = api
                .send(api.request(Method::GET, &format!("/api/v1/objects/{}", object)))
                .await?
                .bytes()
                .await?;
            write_output(output.as_deref(), &bytes)?;
        }

        Commands::Report {
            kind,
            id,
            statement,
            as_format,
            output,
        } => {
            let path = match (kind.as_str(), id) {
                ("invoice" | "quote", Some(id)) => format!("/api/v1/reports/invoices/{}", id),
                ("payroll", Some(id)) => format!("/api/v1/reports/payroll/{}", id),
                ("invoice" | "quote" | "payroll", None) => bail!("{} report needs an id", kind),
                ("transactions", _) => "/api/v1/reports/transactions".to_string(),
                ("inventory", _) => "/api/v1/reports/inventory".to_string(),
                (other, _) => bail!("Unknown report: {}", other),
            };

            let mut query = vec![("format", as_format)];
            if let Some(statement) = statement {
                query.push(("statement_id", statement));
            }

            let bytes = api
                .send(api.request(Method::GET, &path).query(&query))
                .await?
                .bytes()
                .await?;
            write_output(output.as_deref(), &bytes)?;
        }

        Commands::Import {
            table,
            path,
            dry_run,
            delimiter,
        } => {
            let bytes = std::fs::read(&path).with_context(|| format!("reading {:?}", path))?;

            let mut query = vec![("dry_run", dry_run.to_string())];
            if let Some(delimiter) = delimiter {
                query.push(("delimiter", delimiter.to_string()));
            }

            let result = api
                .json(
                    api.request(Method::POST, &format!("/api/v1/import/{}", table))
                        .query(&query)
                        .body(bytes),
                )
                .await?;
            if as_json {
                return print_json(&result);
            }

            println!("Import results:");
            println!("  Rows processed: {}", result["rows_processed"].as_u64().unwrap_or(0));
            println!("  Rows failed: {}", result["rows_failed"].as_u64().unwrap_or(0));
            println!("  Rows accepted: {}", result["rows"].as_array().map(Vec::len).unwrap_or(0));

            if let Some(errors) = result["errors"].as_array().filter(|e| !e.is_empty()) {
                println!();
                println!("Errors (first 10):");
                for error in errors.iter().take(10) {
                    println!(
                        "  line {}: {}",
                        error["line"].as_u64().unwrap_or(0),
                        error["message"].as_str().unwrap_or("-")
                    );
                }
            }

            if dry_run {
                println!();
                println!("(Dry run - no data was imported)");
            }
        }

        Commands::Barcode { code } => {
            let item = api
                .json(api.request(Method::GET, &format!("/api/v1/inventory/barcode/{}", code)))
                .await?;
            if as_json {
                return print_json(&item);
            }
            println!(
                "{} (SKU {}): {} in stock",
                item["name"].as_str().unwrap_or("-"),
                item["sku"].as_str().unwrap_or("-"),
                item["quantity"].as_i64().unwrap_or(0)
            );
        }

        Commands::Config { output } => {
            let config = bizdesk::config::generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

async fn run_vault(api: &Api, action: VaultAction, as_json: bool) -> anyhow::Result<()> {
    match action {
        VaultAction::Ls => {
            let overview = api.json(api.request(Method::GET, "/api/v1/vault")).await?;
            if as_json {
                return print_json(&overview);
            }
            for key in overview["keys"].as_array().into_iter().flatten() {
                println!("{}", key.as_str().unwrap_or("-"));
            }
        }
        VaultAction::Get { key } => {
            let value = api
                .json(api.request(Method::GET, &format!("/api/v1/vault/{}", key)))
                .await?;
            print_json(&value["value"])?;
        }
        VaultAction::Set { key, json } => {
            let body = read_json_arg(&json)?;
            let saved = api
                .json(api.request(Method::PUT, &format!("/api/v1/vault/{}", key)).json(&body))
                .await?;
            if saved["degraded"].as_bool().unwrap_or(false) {
                eprintln!("Warning: {} is only held in server memory", key);
            }
            println!("Saved {} (stamp {})", key, saved["stamp"].as_u64().unwrap_or(0));
        }
        VaultAction::Rm { key } => {
            let removed = api
                .json(api.request(Method::DELETE, &format!("/api/v1/vault/{}", key)))
                .await?;
            if removed["deleted"].as_bool().unwrap_or(false) {
                println!("Removed {}", key);
            } else {
                println!("{} was not set", key);
            }
        }
        VaultAction::Backups { key } => {
            let listing = api
                .json(api.request(Method::GET, &format!("/api/v1/vault/{}/backups", key)))
                .await?;
            if as_json {
                return print_json(&listing);
            }
            println!("{:<22} {}", "Stamp", "Checksum");
            for backup in listing["backups"].as_array().into_iter().flatten() {
                println!(
                    "{:<22} {:08x}",
                    backup["stamp"].as_u64().unwrap_or(0),
                    backup["checksum"].as_u64().unwrap_or(0)
                );
            }
        }
        VaultAction::Restore { key } => {
            let restored = api
                .json(api.request(Method::POST, &format!("/api/v1/vault/{}/restore", key)))
                .await?;
            println!(
                "Restored {} from backup {}",
                key,
                restored["restored_stamp"].as_u64().unwrap_or(0)
            );
        }
        VaultAction::Backup => {
            let run = api.json(api.request(Method::POST, "/api/v1/vault/backup")).await?;
            println!("Backed up {} critical keys", run["backed_up"].as_u64().unwrap_or(0));
        }
    }
    Ok(())
}

/// Inline JSON, or `@path` to read it from a file
fn read_json_arg(arg: &str) -> anyhow::Result<Value> {
    let text = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&text).context("argument is not valid JSON")
}

fn write_output(output: Option<&Path>, bytes: &[u8]) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, bytes)?;
            println!("Written to {:?}", path);
        }
        None => {
            use std::io::Write;
            std::io::stdout().write_all(bytes)?;
        }
    }
    Ok(())
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Columns shown by `list` for each table
fn columns_for(table: &str) -> &'static [&'static str] {
    match table {
        "clients" => &["company_name", "first_name", "last_name", "email"],
        "invoices" => &["number", "kind", "status", "issue_date"],
        "employees" => &["first_name", "last_name", "position", "status"],
        "inventory" => &["name", "sku", "quantity", "unit_cost"],
        "attendance" => &["employee_id", "date", "status"],
        "payroll_runs" => &["period_start", "period_end", "status"],
        "benefit_plans" => &["name", "provider"],
        "bank_statements" => &["bank_name", "account_name", "period_start"],
        "statement_transactions" => &["date", "description", "kind", "amount"],
        _ => &["name"],
    }
}

fn print_rows(table: &str, listing: &Value) {
    let rows = match listing["rows"].as_array() {
        Some(rows) if !rows.is_empty() => rows,
        _ => {
            println!("No rows");
            return;
        }
    };
    let columns = columns_for(table);

    print!("{:<38}", "id");
    for column in columns {
        print!(" | {:<16}", column);
    }
    println!();
    println!("{}", "-".repeat(38 + columns.len() * 19));

    for row in rows {
        print!("{:<38}", row["id"].as_str().unwrap_or("-"));
        for column in columns {
            let cell = match &row[*column] {
                Value::Null => "-".to_string(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            print!(" | {:<16}", truncate(&cell, 16));
        }
        println!();
    }

    println!();
    println!(
        "{} of {} rows",
        rows.len(),
        listing["total"].as_u64().unwrap_or(rows.len() as u64)
    );
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(width - 1).collect();
        cut.push('~');
        cut
    }
}

fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600)
    }
}
