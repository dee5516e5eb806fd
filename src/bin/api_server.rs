//! REST API Server for Car Rental Analytics
//!
//! Serves the warehouse reports and trend forecasts over HTTP.
//!
//! Usage:
//!   ./target/release/api_server --database-url postgres://... [--port 8000]
//!
//! Environment variables:
//!   DATABASE_URL             Warehouse connection string
//!   HOST / PORT              Listener address (default 0.0.0.0:8000)
//!   DB_MAX_CONNECTIONS       Pool size (default 10)
//!   DB_ACQUIRE_TIMEOUT_SECS  Wait for a pooled connection (default 30)
//!   RUST_LOG                 Log filter (default info)

use anyhow::Result;
use car_rental_analytics::api::{create_rest_router, AnalyticsService};
use car_rental_analytics::config::{DatabaseArgs, ServerArgs};
use car_rental_analytics::db;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "api_server")]
#[command(about = "Read-only analytics API over the car rental warehouse")]
struct Args {
    #[command(flatten)]
    server: ServerArgs,

    #[command(flatten)]
    database: DatabaseArgs,
}

fn print_banner(server: &ServerArgs, max_connections: u32) {
    println!("============================================================");
    println!("         CAR RENTAL ANALYTICS API SERVER");
    println!("============================================================");
    println!();
    println!("  Listen:   http://{}:{}/", server.host, server.port);
    println!("  Pool:     {} connections", max_connections);
    println!();
    println!("Reports (filters: start_date, end_date, slug, dest_code, ...):");
    println!("  GET /growth_kpi/                     Yearly gain growth");
    println!("  GET /factrequests/gain               Top customers by gain");
    println!("  GET /brand-gains/                    Gain per brand");
    println!("  GET /car_profitability_kpi/          Profitability per car");
    println!("  GET /car_rentation_rate_overtime     Quarterly retention");
    println!("  GET /timeline_kpi/                   Daily requests/revenue");
    println!("  ... and the remaining report endpoints");
    println!();
    println!("Forecasts:");
    println!("  GET /predict_total_price/?future_date=YYYY-MM-DD");
    println!("  GET /optimize_fleet/?future_date=YYYY-MM-DD");
    println!();
    println!("============================================================");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .init();

    let args = Args::parse();
    let addr = args.server.socket_addr()?;

    print_banner(&args.server, args.database.max_connections);

    let pool = db::connect(&args.database).await?;
    tracing::info!("Connected to warehouse");

    let service = Arc::new(AnalyticsService::new(pool));
    let app = create_rest_router(service);

    tracing::info!("Starting REST server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
