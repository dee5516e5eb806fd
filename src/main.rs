use anyhow::Result;
use car_rental_analytics::api::AnalyticsService;
use car_rental_analytics::config::DatabaseArgs;
use car_rental_analytics::db;
use car_rental_analytics::error::ApiError;
use car_rental_analytics::query::ReportFilters;
use clap::Parser;
use tracing::{info, warn};

/// Print a short overview of the warehouse contents.
#[derive(Parser, Debug)]
#[command(name = "car_rental_analytics")]
struct Args {
    #[command(flatten)]
    database: DatabaseArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .init();

    let args = Args::parse();
    let pool = db::connect(&args.database).await?;
    info!("Connected to warehouse");

    let service = AnalyticsService::new(pool);

    info!("=== Warehouse Statistics ===");
    let stats = service.warehouse_stats().await?;
    info!("Requests: {}", stats.total_requests);
    info!("Cars:     {}", stats.total_cars);
    info!("Clients:  {}", stats.total_clients);
    match (stats.first_date, stats.last_date) {
        (Some(first), Some(last)) => info!("Pick-ups from {} to {}", first, last),
        _ => warn!("No pick-up dates recorded"),
    }

    info!("=== Most Requested Types ===");
    match service.most_popular_requests(&ReportFilters::default()).await {
        Ok(rows) => {
            for row in rows {
                info!("  {:<20} {}", row.request_type.trim(), row.request_count);
            }
        }
        Err(ApiError::NotFound(_)) => warn!("No requests in the warehouse"),
        Err(e) => return Err(e.into()),
    }

    info!("=== Gain Growth ===");
    let growth = service.growth_kpi().await?;
    info!("2022: {:.2}", growth.gain_2022);
    info!("2023: {:.2} ({:+.1}%)", growth.gain_2023, growth.growth_2023);
    info!("2024: {:.2} ({:+.1}%)", growth.gain_2024, growth.growth_2024);

    Ok(())
}
