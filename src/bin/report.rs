//! Command-line client for the analytics API
//!
//! Fetches one report and prints it as JSON or CSV.
//!
//! Run: ./target/release/report /brand-gains/ --param start_date=2023-01-01 \
//!        --param end_date=2023-12-31 --format csv
//!
//! Environment variables:
//!   RENTAL_API_URL - Base URL of the API server (default http://localhost:8000)

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde_json::Value;
use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "report")]
#[command(about = "Fetch a report from the car rental analytics API")]
struct Args {
    /// Report path, e.g. /brand-gains/
    path: String,

    /// Query parameter as key=value; may be repeated
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// Output format
    #[arg(long, value_enum, default_value = "json")]
    format: Format,

    /// API base URL
    #[arg(long, env = "RENTAL_API_URL", default_value = "http://localhost:8000")]
    api_url: String,
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

// ============================================================================
// API Client
// ============================================================================

struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn get(&self, path: &str, params: &[(String, String)]) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("GET {} {:?}", url, params);
        let response = self.client.get(&url).query(params).send().await?;

        if response.status().is_success() {
            let json: Value = response.json().await?;
            Ok(json)
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("API request failed: {} - {}", status, text)
        }
    }
}

// ============================================================================
// Output
// ============================================================================

/// The list of records inside a report payload.
///
/// Reports wrap rows in `data` (the retention series twice); bare arrays
/// and single objects are returned as-is.
fn records(payload: &Value) -> Vec<Value> {
    match payload {
        Value::Array(items) => items.clone(),
        Value::Object(map) => match map.get("data") {
            Some(inner @ (Value::Array(_) | Value::Object(_))) => records(inner),
            _ => vec![payload.clone()],
        },
        other => vec![other.clone()],
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn write_csv<W: io::Write>(payload: &Value, out: W) -> Result<()> {
    let rows = records(payload);
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(out);

    let header: Vec<String> = match rows.first() {
        Some(Value::Object(first)) => first.keys().cloned().collect(),
        Some(_) => vec!["value".to_string()],
        None => return Ok(()),
    };
    writer.write_record(&header)?;

    for row in &rows {
        let record: Vec<String> = match row {
            Value::Object(map) => header.iter().map(|k| cell(map.get(k).unwrap_or(&Value::Null))).collect(),
            other => vec![cell(other)],
        };
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .init();

    let args = Args::parse();
    let client = ApiClient::new(&args.api_url);

    let payload = client
        .get(&args.path, &args.params)
        .await
        .with_context(|| format!("fetching {}", args.path))?;

    match args.format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&payload)?),
        Format::Csv => write_csv(&payload, io::stdout().lock())?,
    }

    Ok(())
}
