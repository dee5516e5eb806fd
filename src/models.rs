//! Rows read from the warehouse.
//!
//! Aggregates are cast to `float8`/`int8` in SQL so every report decodes
//! into plain `f64`/`i64`. Text columns come back untrimmed; the response
//! layer trims them.

use chrono::NaiveDate;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct CustomerGainRow {
    pub customer_name: String,
    pub total_gain: f64,
}

#[derive(Debug, Clone, FromRow)]
pub struct BrandGainRow {
    pub brand: String,
    pub total_gain: f64,
}

#[derive(Debug, Clone, FromRow)]
pub struct BrandClientsRow {
    pub brand: String,
    pub req_type: String,
    pub client_count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct OwnerCarCountRow {
    pub owner: String,
    pub car_count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct OwnerRequestCountRow {
    pub owner: String,
    pub request_count: i64,
}

/// Request volume per benchmark source and region.
#[derive(Debug, Clone, FromRow)]
pub struct SourceRegionRow {
    pub source: String,
    pub region: String,
    pub request_count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct OfferRequestsRow {
    pub adjustement_type: String,
    pub request_count: i64,
}

/// Distinct clients per car sub-type and request type. Either label may be
/// missing in the source data.
#[derive(Debug, Clone, FromRow)]
pub struct CarTypeClientsRow {
    pub car_type: Option<String>,
    pub request_type: Option<String>,
    pub client_count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct RequestTypeCountRow {
    pub request_type: String,
    pub request_count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct OfferRevenueRow {
    pub offer_code: String,
    pub date: NaiveDate,
    pub revenue: f64,
}

#[derive(Debug, Clone, FromRow)]
pub struct CountryRevenueRow {
    pub country: String,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, FromRow)]
pub struct SourceRevenueRow {
    pub date: NaiveDate,
    pub source: String,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, FromRow)]
pub struct TimelineRow {
    pub date: NaiveDate,
    pub request_count: i64,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, FromRow)]
pub struct QuarterlyRevenueRow {
    pub quarter: String,
    pub request_type: String,
    pub total_revenue: f64,
}

/// Revenue for one calendar month.
#[derive(Debug, Clone, FromRow)]
pub struct MonthlyAmountRow {
    pub year: i32,
    pub month_id: i32,
    pub month: String,
    pub total_amount: f64,
}

#[derive(Debug, Clone, FromRow)]
pub struct CarProfitabilityRow {
    pub car_model: String,
    pub total_revenue: f64,
    pub prix_annuel: f64,
    pub profitability: f64,
}

#[derive(Debug, Clone, FromRow)]
pub struct MonthlyProfitRow {
    pub month: String,
    pub total_revenue: f64,
    pub other_charges: f64,
    pub total_profit: f64,
}

/// One car active in one quarter (quarter given by its first day).
#[derive(Debug, Clone, FromRow)]
pub struct QuarterCarRow {
    pub quarter: NaiveDate,
    pub car_id: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct PlaceCountRow {
    pub place: Option<String>,
    pub request_count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct CarImageRow {
    pub image: Option<String>,
}

/// One historical observation for trend fitting.
#[derive(Debug, Clone, FromRow)]
pub struct DatedValueRow {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, FromRow)]
pub struct WarehouseStats {
    pub total_requests: i64,
    pub total_cars: i64,
    pub total_clients: i64,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}
