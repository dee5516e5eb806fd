//! REST API handlers for the rental analytics service
//!
//! These handlers parse query parameters, call the shared AnalyticsService
//! and shape its rows into the JSON payloads. Strings are trimmed and
//! monetary values rounded here.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::service::AnalyticsService;
use crate::error::{ApiError, ApiResult};
use crate::forecast::{self, FleetPlan};
use crate::kpi::{round_to, ClientShare, GrowthKpi, MonthOverMonth, MonthlyGain, OwnerShare, RetentionPoint};
use crate::models::*;
use crate::query::{ReportFilters, DATE_FORMAT};

fn trimmed(s: String) -> String {
    s.trim().to_string()
}

fn iso_date(date: chrono::NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

// ============================================================================
// Response Types (JSON-serializable versions)
// ============================================================================

/// `{"data": [...]}` envelope used by every list report.
#[derive(Serialize)]
pub struct DataResponse<T> {
    pub data: Vec<T>,
}

impl<T> DataResponse<T> {
    fn from_rows<R>(rows: Vec<R>) -> Json<Self>
    where
        T: From<R>,
    {
        Json(Self {
            data: rows.into_iter().map(T::from).collect(),
        })
    }
}

#[derive(Serialize)]
pub struct GrowthKpiResponse {
    pub gain_2022: f64,
    pub gain_2023: f64,
    pub gain_2024: f64,
    pub growth_2023: f64,
    pub growth_2024: f64,
}

impl From<GrowthKpi> for GrowthKpiResponse {
    fn from(g: GrowthKpi) -> Self {
        Self {
            gain_2022: g.gain_2022,
            gain_2023: g.gain_2023,
            gain_2024: g.gain_2024,
            growth_2023: g.growth_2023,
            growth_2024: g.growth_2024,
        }
    }
}

#[derive(Serialize)]
pub struct CustomerGainResponse {
    pub gain: f64,
    pub customer_name: String,
}

impl From<CustomerGainRow> for CustomerGainResponse {
    fn from(r: CustomerGainRow) -> Self {
        Self {
            gain: round_to(r.total_gain, 3),
            customer_name: trimmed(r.customer_name),
        }
    }
}

#[derive(Serialize)]
pub struct BrandGainResponse {
    pub brand: String,
    pub total_gain: f64,
}

impl From<BrandGainRow> for BrandGainResponse {
    fn from(r: BrandGainRow) -> Self {
        Self {
            brand: trimmed(r.brand),
            total_gain: round_to(r.total_gain, 2),
        }
    }
}

#[derive(Serialize)]
pub struct CarClientsResponse {
    pub brand: String,
    pub req_type: String,
    pub client_count: i64,
}

impl From<BrandClientsRow> for CarClientsResponse {
    fn from(r: BrandClientsRow) -> Self {
        Self {
            brand: trimmed(r.brand),
            req_type: trimmed(r.req_type),
            client_count: r.client_count,
        }
    }
}

#[derive(Serialize)]
pub struct CarOwnerResponse {
    pub owner: String,
    pub car_count: i64,
    pub request_percentage: f64,
}

impl From<OwnerShare> for CarOwnerResponse {
    fn from(o: OwnerShare) -> Self {
        Self {
            owner: o.owner,
            car_count: o.car_count,
            request_percentage: round_to(o.request_percentage, 2),
        }
    }
}

#[derive(Serialize)]
pub struct SourceRegionResponse {
    pub source: String,
    pub region: String,
    pub request_count: i64,
}

impl From<SourceRegionRow> for SourceRegionResponse {
    fn from(r: SourceRegionRow) -> Self {
        Self {
            source: trimmed(r.source),
            region: trimmed(r.region),
            request_count: r.request_count,
        }
    }
}

#[derive(Serialize)]
pub struct OfferRequestsResponse {
    pub adjustement_type: String,
    pub request_count: i64,
}

impl From<OfferRequestsRow> for OfferRequestsResponse {
    fn from(r: OfferRequestsRow) -> Self {
        Self {
            adjustement_type: trimmed(r.adjustement_type),
            request_count: r.request_count,
        }
    }
}

#[derive(Serialize)]
pub struct ClientPercentageResponse {
    pub car_type: String,
    pub request_type: String,
    pub client_percentage: f64,
}

impl From<ClientShare> for ClientPercentageResponse {
    fn from(c: ClientShare) -> Self {
        Self {
            car_type: c.car_type,
            request_type: c.request_type,
            client_percentage: c.client_percentage,
        }
    }
}

#[derive(Serialize)]
pub struct PopularRequestResponse {
    pub request_type: String,
    pub request_count: i64,
}

impl From<RequestTypeCountRow> for PopularRequestResponse {
    fn from(r: RequestTypeCountRow) -> Self {
        Self {
            request_type: trimmed(r.request_type),
            request_count: r.request_count,
        }
    }
}

#[derive(Serialize)]
pub struct OfferRevenueResponse {
    pub offer_code: String,
    pub date: String,
    pub revenue: f64,
}

impl From<OfferRevenueRow> for OfferRevenueResponse {
    fn from(r: OfferRevenueRow) -> Self {
        Self {
            offer_code: trimmed(r.offer_code),
            date: iso_date(r.date),
            revenue: round_to(r.revenue, 2),
        }
    }
}

#[derive(Serialize)]
pub struct ChargeResponse {
    pub total_charge: f64,
}

#[derive(Serialize)]
pub struct CountryRevenueResponse {
    pub country: String,
    pub total_revenue: f64,
}

impl From<CountryRevenueRow> for CountryRevenueResponse {
    fn from(r: CountryRevenueRow) -> Self {
        Self {
            country: trimmed(r.country),
            total_revenue: r.total_revenue,
        }
    }
}

#[derive(Serialize)]
pub struct RevenueOverTimeResponse {
    pub date: String,
    pub source: String,
    pub total_revenue: f64,
}

impl From<SourceRevenueRow> for RevenueOverTimeResponse {
    fn from(r: SourceRevenueRow) -> Self {
        Self {
            date: iso_date(r.date),
            source: trimmed(r.source),
            total_revenue: r.total_revenue,
        }
    }
}

#[derive(Serialize)]
pub struct TimelineResponse {
    pub date: String,
    pub request_count: i64,
    pub total_revenue: f64,
}

impl From<TimelineRow> for TimelineResponse {
    fn from(r: TimelineRow) -> Self {
        Self {
            date: iso_date(r.date),
            request_count: r.request_count,
            total_revenue: r.total_revenue,
        }
    }
}

#[derive(Serialize)]
pub struct QuarterlyRevenueResponse {
    pub quarter: String,
    pub request_type: String,
    pub total_revenue: f64,
}

impl From<QuarterlyRevenueRow> for QuarterlyRevenueResponse {
    fn from(r: QuarterlyRevenueRow) -> Self {
        Self {
            quarter: trimmed(r.quarter),
            request_type: trimmed(r.request_type),
            total_revenue: r.total_revenue,
        }
    }
}

#[derive(Serialize)]
pub struct MonthlyGainResponse {
    pub year: i32,
    pub month: String,
    pub total_amount: f64,
    pub percentage_gain: f64,
}

impl From<MonthlyGain> for MonthlyGainResponse {
    fn from(m: MonthlyGain) -> Self {
        Self {
            year: m.year,
            month: trimmed(m.month),
            total_amount: m.total_amount,
            percentage_gain: m.percentage_gain,
        }
    }
}

#[derive(Serialize)]
pub struct CarProfitabilityResponse {
    pub car_model: String,
    pub total_revenue: f64,
    pub prix_annuel: f64,
    pub profitability: f64,
}

impl From<CarProfitabilityRow> for CarProfitabilityResponse {
    fn from(r: CarProfitabilityRow) -> Self {
        Self {
            car_model: trimmed(r.car_model),
            total_revenue: r.total_revenue,
            prix_annuel: r.prix_annuel,
            profitability: r.profitability,
        }
    }
}

#[derive(Serialize)]
pub struct ProfitChargesResponse {
    pub month: String,
    pub total_revenue: f64,
    pub other_charges: f64,
    pub total_profit: f64,
}

impl From<MonthlyProfitRow> for ProfitChargesResponse {
    fn from(r: MonthlyProfitRow) -> Self {
        Self {
            month: trimmed(r.month),
            total_revenue: r.total_revenue,
            other_charges: r.other_charges,
            total_profit: r.total_profit,
        }
    }
}

#[derive(Serialize)]
pub struct RetentionPointResponse {
    pub quarter: String,
    pub rate: f64,
}

impl From<RetentionPoint> for RetentionPointResponse {
    fn from(p: RetentionPoint) -> Self {
        Self {
            quarter: p.quarter,
            rate: p.rate,
        }
    }
}

/// The retention series is nested one level deeper than other reports.
#[derive(Serialize)]
pub struct RetentionRateResponse {
    pub data: DataResponse<RetentionPointResponse>,
}

#[derive(Serialize)]
pub struct TopPlaceResponse {
    pub place: String,
    pub request_count: i64,
}

impl From<PlaceCountRow> for TopPlaceResponse {
    fn from(r: PlaceCountRow) -> Self {
        let place = r
            .place
            .map(trimmed)
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "Unknown".to_string());
        Self {
            place,
            request_count: r.request_count,
        }
    }
}

#[derive(Serialize)]
pub struct MonthlyRevenueAndGainResponse {
    pub last_month_total_revenue: f64,
    pub percentage_gain: f64,
}

impl From<MonthOverMonth> for MonthlyRevenueAndGainResponse {
    fn from(m: MonthOverMonth) -> Self {
        Self {
            last_month_total_revenue: m.last_month_total_revenue,
            percentage_gain: m.percentage_gain,
        }
    }
}

#[derive(Serialize)]
pub struct ImageResponse {
    pub image_url: String,
}

#[derive(Serialize)]
pub struct TotalPriceResponse {
    pub total_price: f64,
}

#[derive(Serialize)]
pub struct TotalPricePredictionResponse {
    pub predicted_total_price: f64,
}

#[derive(Serialize)]
pub struct FleetOptimizationResponse {
    pub predicted_passenger_count: i64,
    pub recommended_fleet_size: i64,
    pub adjusted_fleet_size: i64,
}

impl From<FleetPlan> for FleetOptimizationResponse {
    fn from(p: FleetPlan) -> Self {
        Self {
            predicted_passenger_count: p.predicted_passenger_count,
            recommended_fleet_size: p.recommended_fleet_size,
            adjusted_fleet_size: p.adjusted_fleet_size,
        }
    }
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub total_requests: i64,
    pub total_cars: i64,
    pub total_clients: i64,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
}

impl From<WarehouseStats> for StatsResponse {
    fn from(s: WarehouseStats) -> Self {
        Self {
            total_requests: s.total_requests,
            total_cars: s.total_cars,
            total_clients: s.total_clients,
            first_date: s.first_date.map(iso_date),
            last_date: s.last_date.map(iso_date),
        }
    }
}

// ============================================================================
// Query Parameters
// ============================================================================

#[derive(Deserialize)]
pub struct PredictQuery {
    pub future_date: Option<String>,
}

impl PredictQuery {
    fn future_date(&self) -> ApiResult<chrono::NaiveDate> {
        match self.future_date.as_deref() {
            Some(raw) => forecast::parse_future_date(raw),
            None => Err(ApiError::BadRequest(
                "Missing future_date. Use YYYY-MM-DD.".to_string(),
            )),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

pub type AppState = Arc<AnalyticsService>;

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// GET /stats
pub async fn get_stats(State(service): State<AppState>) -> ApiResult<Json<StatsResponse>> {
    let stats = service.warehouse_stats().await?;
    Ok(Json(stats.into()))
}

/// GET /growth_kpi/
pub async fn get_growth_kpi(State(service): State<AppState>) -> ApiResult<Json<GrowthKpiResponse>> {
    let growth = service.growth_kpi().await?;
    Ok(Json(growth.into()))
}

/// GET /factrequests/gain
pub async fn get_customer_gains(
    State(service): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<DataResponse<CustomerGainResponse>>> {
    let filters = ReportFilters::from_pairs(pairs)?;
    let rows = service.customer_gains(&filters).await?;
    Ok(DataResponse::from_rows(rows))
}

/// GET /brand-gains/
pub async fn get_brand_gains(
    State(service): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<DataResponse<BrandGainResponse>>> {
    let filters = ReportFilters::from_pairs(pairs)?;
    let rows = service.brand_gains(&filters).await?;
    Ok(DataResponse::from_rows(rows))
}

/// GET /car_clients_kpi/
pub async fn get_car_clients(
    State(service): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<DataResponse<CarClientsResponse>>> {
    let filters = ReportFilters::from_pairs(pairs)?;
    let rows = service.car_clients(&filters).await?;
    Ok(DataResponse::from_rows(rows))
}

/// GET /car_owners_kpi/
pub async fn get_car_owners(
    State(service): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<DataResponse<CarOwnerResponse>>> {
    let filters = ReportFilters::from_pairs(pairs)?;
    let shares = service.car_owners(&filters).await?;
    Ok(DataResponse::from_rows(shares))
}

/// GET /requests_per_benchmark_by_source_and_region/
pub async fn get_requests_per_benchmark(
    State(service): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<DataResponse<SourceRegionResponse>>> {
    let filters = ReportFilters::from_pairs(pairs)?;
    let rows = service.benchmark_sources_by_region(&filters).await?;
    Ok(DataResponse::from_rows(rows))
}

/// GET /requests_per_offer/
pub async fn get_requests_per_offer(
    State(service): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<DataResponse<OfferRequestsResponse>>> {
    let filters = ReportFilters::from_pairs(pairs)?;
    let rows = service.requests_per_offer(&filters).await?;
    Ok(DataResponse::from_rows(rows))
}

/// GET /clients_percentage_per_car_type_and_request_type/
pub async fn get_clients_percentage(
    State(service): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<DataResponse<ClientPercentageResponse>>> {
    let filters = ReportFilters::from_pairs(pairs)?;
    let shares = service.clients_per_car_type(&filters).await?;
    Ok(DataResponse::from_rows(shares))
}

/// GET /most_popular_requests/
pub async fn get_most_popular_requests(
    State(service): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<DataResponse<PopularRequestResponse>>> {
    let filters = ReportFilters::from_pairs(pairs)?;
    let rows = service.most_popular_requests(&filters).await?;
    Ok(DataResponse::from_rows(rows))
}

/// GET /benchmark_performance_by_region/
pub async fn get_benchmark_performance(
    State(service): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<DataResponse<SourceRegionResponse>>> {
    let filters = ReportFilters::from_pairs(pairs)?;
    let rows = service.benchmark_performance(&filters).await?;
    Ok(DataResponse::from_rows(rows))
}

/// GET /revenue_by_offer_and_date/
pub async fn get_revenue_by_offer(
    State(service): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<DataResponse<OfferRevenueResponse>>> {
    let filters = ReportFilters::from_pairs(pairs)?;
    let rows = service.offer_revenue(&filters).await?;
    Ok(DataResponse::from_rows(rows))
}

/// GET /charge_kpi/
pub async fn get_charge_kpi(
    State(service): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<ChargeResponse>> {
    let filters = ReportFilters::from_pairs(pairs)?;
    let total = service.total_charge(&filters).await?;
    Ok(Json(ChargeResponse {
        total_charge: round_to(total, 2),
    }))
}

/// GET /most_revenue_generating_countries/
pub async fn get_revenue_by_country(
    State(service): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<DataResponse<CountryRevenueResponse>>> {
    let filters = ReportFilters::from_pairs(pairs)?;
    let rows = service.country_revenue(&filters).await?;
    Ok(DataResponse::from_rows(rows))
}

/// GET /revenue_over_time_per_benchmark/
pub async fn get_revenue_over_time(
    State(service): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<DataResponse<RevenueOverTimeResponse>>> {
    let filters = ReportFilters::from_pairs(pairs)?;
    let rows = service.revenue_per_benchmark(&filters).await?;
    Ok(DataResponse::from_rows(rows))
}

/// GET /timeline_kpi/
pub async fn get_timeline(
    State(service): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<DataResponse<TimelineResponse>>> {
    let filters = ReportFilters::from_pairs(pairs)?;
    let rows = service.timeline(&filters).await?;
    Ok(DataResponse::from_rows(rows))
}

/// GET /quarterly_revenue_per_request_type/
pub async fn get_quarterly_revenue(
    State(service): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<DataResponse<QuarterlyRevenueResponse>>> {
    let filters = ReportFilters::from_pairs(pairs)?;
    let rows = service.quarterly_revenue(&filters).await?;
    Ok(DataResponse::from_rows(rows))
}

/// GET /total_amount_and_percentage_gain_per_month/
pub async fn get_monthly_gains(
    State(service): State<AppState>,
) -> ApiResult<Json<DataResponse<MonthlyGainResponse>>> {
    let gains = service.monthly_gains().await?;
    Ok(DataResponse::from_rows(gains))
}

/// GET /car_profitability_kpi/
///
/// `slug` may be repeated; every value is matched.
pub async fn get_car_profitability(
    State(service): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<DataResponse<CarProfitabilityResponse>>> {
    let filters = ReportFilters::from_pairs(pairs)?;
    let rows = service.car_profitability(&filters).await?;
    Ok(DataResponse::from_rows(rows))
}

/// GET /profit_total_and_other_charges/
pub async fn get_profit_and_charges(
    State(service): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<DataResponse<ProfitChargesResponse>>> {
    let filters = ReportFilters::from_pairs(pairs)?;
    let rows = service.monthly_profit(&filters).await?;
    Ok(DataResponse::from_rows(rows))
}

/// GET /car_rentation_rate_overtime
pub async fn get_car_retention(State(service): State<AppState>) -> ApiResult<Json<RetentionRateResponse>> {
    let points = service.car_retention().await?;
    let Json(series) = DataResponse::from_rows(points);
    Ok(Json(RetentionRateResponse { data: series }))
}

/// GET /top_pickup_places/
pub async fn get_top_pickup_places(
    State(service): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<DataResponse<TopPlaceResponse>>> {
    let filters = ReportFilters::from_pairs(pairs)?;
    let rows = service.top_pickup_places(&filters).await?;
    Ok(DataResponse::from_rows(rows))
}

/// GET /top_dropoff_places/
pub async fn get_top_dropoff_places(
    State(service): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<DataResponse<TopPlaceResponse>>> {
    let filters = ReportFilters::from_pairs(pairs)?;
    let rows = service.top_dropoff_places(&filters).await?;
    Ok(DataResponse::from_rows(rows))
}

/// GET /monthly_revenue_and_gain/
pub async fn get_monthly_revenue_and_gain(
    State(service): State<AppState>,
) -> ApiResult<Json<MonthlyRevenueAndGainResponse>> {
    let comparison = service.month_over_month().await?;
    Ok(Json(comparison.into()))
}

/// GET /car/image
pub async fn get_car_image(
    State(service): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<ImageResponse>> {
    let filters = ReportFilters::from_pairs(pairs)?;
    let image = service.car_image(&filters).await?;
    Ok(Json(ImageResponse { image_url: image }))
}

/// GET /total_price/
pub async fn get_total_price(
    State(service): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<TotalPriceResponse>> {
    let filters = ReportFilters::from_pairs(pairs)?;
    let total = service.total_price(&filters).await?;
    Ok(Json(TotalPriceResponse {
        total_price: round_to(total, 2),
    }))
}

/// GET /filters/car-types
pub async fn get_car_types(State(service): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(service.car_types().await?))
}

/// GET /filters/dates
pub async fn get_dates(State(service): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    let dates = service.calendar_dates().await?;
    Ok(Json(dates.into_iter().map(iso_date).collect()))
}

/// GET /filters/dests
pub async fn get_destinations(State(service): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(service.destinations().await?))
}

/// GET /predict_total_price/
pub async fn predict_total_price(
    State(service): State<AppState>,
    Query(params): Query<PredictQuery>,
) -> ApiResult<Json<TotalPricePredictionResponse>> {
    let future_date = params.future_date()?;
    let predicted = service.predict_total_price(future_date).await?;
    Ok(Json(TotalPricePredictionResponse {
        predicted_total_price: round_to(predicted, 2),
    }))
}

/// GET /optimize_fleet/
pub async fn optimize_fleet(
    State(service): State<AppState>,
    Query(params): Query<PredictQuery>,
) -> ApiResult<Json<FleetOptimizationResponse>> {
    let future_date = params.future_date()?;
    let plan = service.optimize_fleet(future_date).await?;
    Ok(Json(plan.into()))
}
