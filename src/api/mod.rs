//! API module for the rental analytics service
//!
//! Exposes the warehouse reports and forecasts as read-only REST endpoints.

pub mod handlers;
pub mod service;

pub use service::AnalyticsService;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn create_rest_router(service: Arc<AnalyticsService>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Operational
        .route("/health", get(handlers::health))
        .route("/stats", get(handlers::get_stats))
        // Gains and growth
        .route("/growth_kpi/", get(handlers::get_growth_kpi))
        .route("/factrequests/gain", get(handlers::get_customer_gains))
        .route("/brand-gains/", get(handlers::get_brand_gains))
        // Cars, owners and clients
        .route("/car_clients_kpi/", get(handlers::get_car_clients))
        .route("/car_owners_kpi/", get(handlers::get_car_owners))
        .route(
            "/clients_percentage_per_car_type_and_request_type/",
            get(handlers::get_clients_percentage),
        )
        .route("/car_profitability_kpi/", get(handlers::get_car_profitability))
        .route("/car_rentation_rate_overtime", get(handlers::get_car_retention))
        .route("/car/image", get(handlers::get_car_image))
        // Requests
        .route(
            "/requests_per_benchmark_by_source_and_region/",
            get(handlers::get_requests_per_benchmark),
        )
        .route("/requests_per_offer/", get(handlers::get_requests_per_offer))
        .route("/most_popular_requests/", get(handlers::get_most_popular_requests))
        .route("/benchmark_performance_by_region/", get(handlers::get_benchmark_performance))
        .route("/top_pickup_places/", get(handlers::get_top_pickup_places))
        .route("/top_dropoff_places/", get(handlers::get_top_dropoff_places))
        // Revenue
        .route("/revenue_by_offer_and_date/", get(handlers::get_revenue_by_offer))
        .route("/charge_kpi/", get(handlers::get_charge_kpi))
        .route("/most_revenue_generating_countries/", get(handlers::get_revenue_by_country))
        .route("/revenue_over_time_per_benchmark/", get(handlers::get_revenue_over_time))
        .route("/timeline_kpi/", get(handlers::get_timeline))
        .route("/quarterly_revenue_per_request_type/", get(handlers::get_quarterly_revenue))
        .route(
            "/total_amount_and_percentage_gain_per_month/",
            get(handlers::get_monthly_gains),
        )
        .route("/profit_total_and_other_charges/", get(handlers::get_profit_and_charges))
        .route("/monthly_revenue_and_gain/", get(handlers::get_monthly_revenue_and_gain))
        .route("/total_price/", get(handlers::get_total_price))
        // Filter options
        .route("/filters/car-types", get(handlers::get_car_types))
        .route("/filters/dates", get(handlers::get_dates))
        .route("/filters/dests", get(handlers::get_destinations))
        // Forecasts
        .route("/predict_total_price/", get(handlers::predict_total_price))
        .route("/optimize_fleet/", get(handlers::optimize_fleet))
        // State and middleware
        .with_state(service)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
