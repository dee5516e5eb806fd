//! Report execution against the warehouse.
//!
//! Each report method acquires one pooled connection, runs its queries on
//! it and returns typed rows (or derived metrics). The connection goes back
//! to the pool when it is dropped, on success and on every error path.

use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgConnection};
use tracing::debug;

use crate::db::DbPool;
use crate::error::{ApiError, ApiResult};
use crate::forecast::{self, FleetPlan};
use crate::kpi::{self, ClientShare, GrowthKpi, MonthOverMonth, MonthlyGain, OwnerShare, RetentionPoint};
use crate::models::*;
use crate::query::{DateColumn, Predicate, ReportFilters, ReportQuery};

/// Years compared by the growth KPI.
const GROWTH_YEARS: [i32; 3] = [2022, 2023, 2024];

// ============================================================================
// Report Definitions
// ============================================================================

const CUSTOMER_GAINS: ReportQuery = ReportQuery::new(
    r#"
    SELECT
        cl.customer AS customer_name,
        COALESCE(SUM(f.total_price - f.offer_price), 0)::float8 AS total_gain
    FROM factrequests f
    JOIN dimdates d ON f.date_fk = d.date_pk
    JOIN dimcars c ON f.car_fk = c.car_pk
    JOIN dimclients cl ON f.client_fk = cl.client_pk
    "#,
    &[Predicate::DateRange(DateColumn::Calendar), Predicate::Slug("c.slug")],
    "GROUP BY cl.customer ORDER BY total_gain DESC LIMIT 10",
);

const BRAND_GAINS: ReportQuery = ReportQuery::new(
    r#"
    SELECT
        c.brand AS brand,
        COALESCE(SUM(f.total_price - f.offer_price), 0)::float8 AS total_gain
    FROM factrequests f
    JOIN dimcars c ON f.car_fk = c.car_pk
    "#,
    &[Predicate::Slug("c.slug"), Predicate::DateRange(DateColumn::PickUp)],
    "GROUP BY c.brand",
);

const CAR_CLIENTS: ReportQuery = ReportQuery::new(
    r#"
    SELECT
        c.brand AS brand,
        rt.req_type AS req_type,
        COUNT(cl.client_pk)::int8 AS client_count
    FROM factrequests f
    JOIN dimcars c ON f.car_fk = c.car_pk
    JOIN dimclients cl ON f.client_fk = cl.client_pk
    JOIN dimrequesttypes rt ON f.req_type_fk = rt.req_type_pk
    "#,
    &[Predicate::Slug("c.slug"), Predicate::DateRange(DateColumn::PickUp)],
    "GROUP BY c.brand, rt.req_type",
);

const OWNER_CARS: ReportQuery = ReportQuery::new(
    r#"
    SELECT
        COALESCE(c.owner, 'Unknown') AS owner,
        COUNT(c.car_pk)::int8 AS car_count
    FROM dimcars c
    "#,
    &[Predicate::Slug("c.slug")],
    "GROUP BY COALESCE(c.owner, 'Unknown')",
);

const OWNER_REQUESTS: ReportQuery = ReportQuery::new(
    r#"
    SELECT
        COALESCE(c.owner, 'Unknown') AS owner,
        COUNT(f.req_pk)::int8 AS request_count
    FROM factrequests f
    JOIN dimcars c ON f.car_fk = c.car_pk
    "#,
    &[Predicate::Slug("c.slug")],
    "GROUP BY COALESCE(c.owner, 'Unknown')",
);

const BENCHMARK_SOURCES_BY_REGION: ReportQuery = ReportQuery::new(
    r#"
    SELECT
        b.source AS source,
        r.pays AS region,
        COUNT(f.req_pk)::int8 AS request_count
    FROM factrequests f
    JOIN dimbenchmarks b ON f.bench1_fk = b.benchmark_pk
    JOIN dimregions r ON f.region_fk = r.region_pk
    "#,
    &[Predicate::DateRange(DateColumn::PickUp)],
    "GROUP BY b.source, r.pays ORDER BY request_count DESC LIMIT 10",
);

const REQUESTS_PER_OFFER: ReportQuery = ReportQuery::new(
    r#"
    SELECT
        o.adjustement_type AS adjustement_type,
        COUNT(f.req_pk)::int8 AS request_count
    FROM factrequests f
    JOIN dimoffers o ON f.offer_fk = o.offer_pk
    "#,
    &[Predicate::DateRange(DateColumn::PickUp)],
    "GROUP BY o.adjustement_type",
);

const CLIENTS_PER_CAR_TYPE: ReportQuery = ReportQuery::new(
    r#"
    SELECT
        c.sub_type AS car_type,
        rt.req_type AS request_type,
        COUNT(DISTINCT f.client_fk)::int8 AS client_count
    FROM factrequests f
    JOIN dimcars c ON f.car_fk = c.car_pk
    JOIN dimrequesttypes rt ON f.req_type_fk = rt.req_type_pk
    JOIN dimregions r ON f.region_fk = r.region_pk
    JOIN dimdestinations dd ON r.region_pk = dd.region_fk
    "#,
    &[
        Predicate::Slug("c.slug"),
        Predicate::DateRange(DateColumn::PickUp),
        Predicate::DestCode,
    ],
    "GROUP BY c.sub_type, rt.req_type",
);

const POPULAR_REQUESTS: ReportQuery = ReportQuery::new(
    r#"
    SELECT
        rt.req_type AS request_type,
        COUNT(f.req_pk)::int8 AS request_count
    FROM factrequests f
    JOIN dimrequesttypes rt ON f.req_type_fk = rt.req_type_pk
    JOIN dimregions r ON f.region_fk = r.region_pk
    JOIN dimdestinations dd ON r.region_pk = dd.region_fk
    "#,
    &[Predicate::DateRange(DateColumn::PickUp), Predicate::DestCode],
    "GROUP BY rt.req_type ORDER BY request_count DESC LIMIT 10",
);

const BENCHMARK_PERFORMANCE: ReportQuery = ReportQuery::new(
    r#"
    SELECT
        b.source AS source,
        r.pays AS region,
        COUNT(f.req_pk)::int8 AS request_count
    FROM factrequests f
    JOIN dimbenchmarks b ON f.bench1_fk = b.benchmark_pk
    JOIN dimregions r ON f.region_fk = r.region_pk
    JOIN dimdestinations dd ON r.region_pk = dd.region_fk
    "#,
    &[Predicate::DateRange(DateColumn::PickUp), Predicate::DestCode],
    "GROUP BY b.source, r.pays ORDER BY request_count DESC LIMIT 10",
);

const OFFER_REVENUE: ReportQuery = ReportQuery::new(
    r#"
    SELECT
        o.offer_code AS offer_code,
        d.date AS date,
        COALESCE(SUM(f.total_price), 0)::float8 AS revenue
    FROM factrequests f
    JOIN dimoffers o ON f.offer_fk = o.offer_pk
    JOIN dimdates d ON f.date_fk = d.date_pk
    "#,
    &[Predicate::DateRange(DateColumn::PickUp), Predicate::AdjustementType],
    "GROUP BY o.offer_code, d.date LIMIT 5",
);

const TOTAL_CHARGE: ReportQuery = ReportQuery::new(
    "SELECT SUM(f.prix_annuel)::float8 FROM factrequests f",
    &[Predicate::DateRange(DateColumn::PickUp)],
    "",
);

const COUNTRY_REVENUE: ReportQuery = ReportQuery::new(
    r#"
    SELECT
        r.pays AS country,
        COALESCE(SUM(f.total_price), 0)::float8 AS total_revenue
    FROM factrequests f
    JOIN dimregions r ON f.region_fk = r.region_pk
    JOIN dimdestinations dd ON r.region_pk = dd.region_fk
    "#,
    &[Predicate::DateRange(DateColumn::PickUp), Predicate::DestCode],
    "GROUP BY r.pays ORDER BY total_revenue DESC",
);

const REVENUE_PER_BENCHMARK: ReportQuery = ReportQuery::new(
    r#"
    SELECT
        d.date AS date,
        b.source AS source,
        COALESCE(SUM(f.total_price), 0)::float8 AS total_revenue
    FROM factrequests f
    JOIN dimdates d ON f.date_fk = d.date_pk
    JOIN dimbenchmarks b ON f.bench1_fk = b.benchmark_pk
    "#,
    &[Predicate::DateRange(DateColumn::PickUp)],
    "GROUP BY d.date, b.source ORDER BY total_revenue DESC LIMIT 20",
);

const TIMELINE: ReportQuery = ReportQuery::new(
    r#"
    SELECT
        d.date AS date,
        COUNT(f.req_pk)::int8 AS request_count,
        COALESCE(SUM(f.total_price), 0)::float8 AS total_revenue
    FROM factrequests f
    JOIN dimdates d ON f.date_fk = d.date_pk
    "#,
    &[Predicate::DateRange(DateColumn::PickUp)],
    "GROUP BY d.date ORDER BY d.date",
);

const QUARTERLY_REVENUE: ReportQuery = ReportQuery::new(
    r#"
    SELECT
        CONCAT(d."Annee", ' Q', d.trimestre) AS quarter,
        rt.req_type AS request_type,
        COALESCE(SUM(f.total_price), 0)::float8 AS total_revenue
    FROM factrequests f
    JOIN dimdates d ON f.date_fk = d.date_pk
    JOIN dimrequesttypes rt ON f.req_type_fk = rt.req_type_pk
    "#,
    &[Predicate::DateRange(DateColumn::PickUp), Predicate::ReqType],
    r#"GROUP BY CONCAT(d."Annee", ' Q', d.trimestre), rt.req_type ORDER BY quarter"#,
);

const MONTHLY_AMOUNTS: ReportQuery = ReportQuery::new(
    r#"
    SELECT
        d."Annee"::int4 AS year,
        d.id_mois::int4 AS month_id,
        d.lib_mois AS month,
        COALESCE(SUM(f.total_price), 0)::float8 AS total_amount
    FROM factrequests f
    JOIN dimdates d ON f.date_fk = d.date_pk
    "#,
    &[],
    r#"GROUP BY d."Annee", d.id_mois, d.lib_mois ORDER BY d."Annee", d.id_mois"#,
);

const LATEST_TWO_MONTHS: ReportQuery = ReportQuery::new(
    r#"
    SELECT
        d."Annee"::int4 AS year,
        d.id_mois::int4 AS month_id,
        d.lib_mois AS month,
        COALESCE(SUM(f.total_price), 0)::float8 AS total_amount
    FROM factrequests f
    JOIN dimdates d ON f.date_fk = d.date_pk
    "#,
    &[],
    r#"GROUP BY d."Annee", d.id_mois, d.lib_mois ORDER BY d."Annee" DESC, d.id_mois DESC LIMIT 2"#,
);

const CAR_PROFITABILITY: ReportQuery = ReportQuery::new(
    r#"
    SELECT
        c.brand || ' ' || c.plate_number AS car_model,
        COALESCE(SUM(f.total_price), 0)::float8 AS total_revenue,
        COALESCE(SUM(f.prix_annuel), 0)::float8 AS prix_annuel,
        COALESCE(SUM(f.total_price) - SUM(f.prix_annuel), 0)::float8 AS profitability
    FROM factrequests f
    JOIN dimcars c ON f.car_fk = c.car_pk
    "#,
    &[Predicate::SlugIn("c.slug"), Predicate::DateRange(DateColumn::PickUp)],
    "GROUP BY car_model ORDER BY profitability DESC",
);

const MONTHLY_PROFIT: ReportQuery = ReportQuery::new(
    r#"
    SELECT
        d."Annee" || '-' || d.lib_mois AS month,
        COALESCE(SUM(f.total_price), 0)::float8 AS total_revenue,
        COALESCE(SUM(f.prix_annuel), 0)::float8 AS other_charges,
        COALESCE(SUM(f.total_price) - SUM(f.prix_annuel), 0)::float8 AS total_profit
    FROM factrequests f
    JOIN dimdates d ON f.date_fk = d.date_pk
    "#,
    &[Predicate::DateRange(DateColumn::PickUp)],
    r#"GROUP BY d."Annee", d.lib_mois, d.id_mois ORDER BY d."Annee", d.id_mois"#,
);

const TOP_PICKUP_PLACES: ReportQuery = ReportQuery::new(
    r#"
    SELECT
        TRIM(f.pick_up_place) AS place,
        COUNT(*)::int8 AS request_count
    FROM factrequests f
    JOIN dimregions r ON f.region_fk = r.region_pk
    JOIN dimdestinations dd ON r.region_pk = dd.region_fk
    "#,
    &[Predicate::DestCode, Predicate::DateRange(DateColumn::PickUp)],
    "GROUP BY f.pick_up_place ORDER BY request_count DESC LIMIT 10",
);

const TOP_DROPOFF_PLACES: ReportQuery = ReportQuery::new(
    r#"
    SELECT
        TRIM(f.drop_off_place) AS place,
        COUNT(*)::int8 AS request_count
    FROM factrequests f
    JOIN dimregions r ON f.region_fk = r.region_pk
    JOIN dimdestinations dd ON r.region_pk = dd.region_fk
    "#,
    &[Predicate::DestCode, Predicate::DateRange(DateColumn::PickUp)],
    "GROUP BY f.drop_off_place ORDER BY request_count DESC LIMIT 10",
);

const CAR_IMAGE: ReportQuery = ReportQuery::new(
    r#"
    SELECT c.image AS image
    FROM dimcars c
    JOIN factrequests f ON c.car_pk = f.car_fk
    JOIN dimdates d ON f.date_fk = d.date_pk
    "#,
    &[Predicate::DateRange(DateColumn::Calendar), Predicate::Slug("c.slug")],
    "LIMIT 1",
);

const TOTAL_PRICE: ReportQuery = ReportQuery::new(
    r#"
    SELECT SUM(f.total_price)::float8
    FROM factrequests f
    JOIN dimdates d ON f.date_fk = d.date_pk
    "#,
    &[Predicate::DateRange(DateColumn::Calendar)],
    "",
);

const GAIN_FOR_YEAR: &str = r#"
    SELECT COALESCE(SUM(f.total_price - f.offer_price) - MIN(f.prix_annuel), 0)::float8 AS gain
    FROM factrequests f
    JOIN dimdates d ON f.date_fk = d.date_pk
    WHERE d."Annee" = $1
"#;

const RECENT_QUARTERS: &str = r#"
    SELECT DISTINCT DATE_TRUNC('quarter', f.pick_up_date)::date AS quarter
    FROM factrequests f
    WHERE f.pick_up_date <= CURRENT_DATE
    ORDER BY quarter DESC
    LIMIT $1
"#;

const CARS_IN_QUARTERS: &str = r#"
    SELECT DISTINCT
        DATE_TRUNC('quarter', f.pick_up_date)::date AS quarter,
        f.car_fk::int8 AS car_id
    FROM factrequests f
    WHERE DATE_TRUNC('quarter', f.pick_up_date)::date = ANY($1)
      AND f.car_fk IS NOT NULL
"#;

const PRICE_HISTORY: &str = r#"
    SELECT d.date AS date, f.total_price::float8 AS value
    FROM factrequests f
    JOIN dimdates d ON f.date_fk = d.date_pk
    ORDER BY f.req_pk
"#;

const PASSENGER_HISTORY: &str = r#"
    SELECT d.date AS date, f.passenger_count_client::float8 AS value
    FROM factrequests f
    JOIN dimdates d ON f.date_fk = d.date_pk
    ORDER BY f.req_pk
"#;

const WAREHOUSE_STATS: &str = r#"
    SELECT
        (SELECT COUNT(*) FROM factrequests)::int8 AS total_requests,
        (SELECT COUNT(*) FROM dimcars)::int8 AS total_cars,
        (SELECT COUNT(*) FROM dimclients)::int8 AS total_clients,
        (SELECT MIN(pick_up_date)::date FROM factrequests) AS first_date,
        (SELECT MAX(pick_up_date)::date FROM factrequests) AS last_date
"#;

// ============================================================================
// Analytics Service
// ============================================================================

pub struct AnalyticsService {
    pool: DbPool,
}

impl AnalyticsService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch_all<T>(
        conn: &mut PgConnection,
        report: &'static str,
        query: &ReportQuery,
        filters: &ReportFilters,
    ) -> ApiResult<Vec<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin + 'static,
    {
        let mut qb = query.build(filters);
        let rows = qb.build_query_as::<T>().fetch_all(conn).await?;
        debug!(report, rows = rows.len(), "report executed");
        Ok(rows)
    }

    /// Run a single-query report; no rows is a not-found.
    async fn run_report<T>(&self, report: &'static str, query: &ReportQuery, filters: &ReportFilters) -> ApiResult<Vec<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin + 'static,
    {
        let mut conn = self.pool.acquire().await?;
        let rows = Self::fetch_all(&mut conn, report, query, filters).await?;
        non_empty(rows)
    }

    /// Run a single-value aggregate; SQL NULL (nothing matched) is a not-found.
    async fn scalar(&self, report: &'static str, query: &ReportQuery, filters: &ReportFilters) -> ApiResult<f64> {
        let mut conn = self.pool.acquire().await?;
        let mut qb = query.build(filters);
        let value: Option<f64> = qb.build_query_scalar().fetch_one(&mut *conn).await?;
        debug!(report, ?value, "aggregate executed");
        value.ok_or_else(ApiError::not_found)
    }

    pub async fn growth_kpi(&self) -> ApiResult<GrowthKpi> {
        let mut conn = self.pool.acquire().await?;
        let mut gains = [0.0; GROWTH_YEARS.len()];
        for (gain, year) in gains.iter_mut().zip(GROWTH_YEARS) {
            let value: Option<f64> = sqlx::query_scalar(GAIN_FOR_YEAR)
                .bind(year)
                .fetch_one(&mut *conn)
                .await?;
            *gain = value.ok_or_else(ApiError::not_found)?;
        }
        Ok(GrowthKpi::from_gains(gains[0], gains[1], gains[2]))
    }

    pub async fn customer_gains(&self, filters: &ReportFilters) -> ApiResult<Vec<CustomerGainRow>> {
        self.run_report("customer_gains", &CUSTOMER_GAINS, filters).await
    }

    pub async fn brand_gains(&self, filters: &ReportFilters) -> ApiResult<Vec<BrandGainRow>> {
        self.run_report("brand_gains", &BRAND_GAINS, filters).await
    }

    pub async fn car_clients(&self, filters: &ReportFilters) -> ApiResult<Vec<BrandClientsRow>> {
        self.run_report("car_clients", &CAR_CLIENTS, filters).await
    }

    pub async fn car_owners(&self, filters: &ReportFilters) -> ApiResult<Vec<OwnerShare>> {
        let mut conn = self.pool.acquire().await?;
        let cars: Vec<OwnerCarCountRow> = Self::fetch_all(&mut conn, "owner_cars", &OWNER_CARS, filters).await?;
        let requests: Vec<OwnerRequestCountRow> =
            Self::fetch_all(&mut conn, "owner_requests", &OWNER_REQUESTS, filters).await?;
        let total_requests: i64 = sqlx::query_scalar("SELECT COUNT(*)::int8 FROM factrequests")
            .fetch_one(&mut *conn)
            .await?;

        if cars.is_empty() || requests.is_empty() {
            return Err(ApiError::not_found());
        }
        Ok(kpi::owner_shares(&cars, &requests, total_requests))
    }

    pub async fn benchmark_sources_by_region(&self, filters: &ReportFilters) -> ApiResult<Vec<SourceRegionRow>> {
        self.run_report("benchmark_sources_by_region", &BENCHMARK_SOURCES_BY_REGION, filters).await
    }

    pub async fn requests_per_offer(&self, filters: &ReportFilters) -> ApiResult<Vec<OfferRequestsRow>> {
        self.run_report("requests_per_offer", &REQUESTS_PER_OFFER, filters).await
    }

    pub async fn clients_per_car_type(&self, filters: &ReportFilters) -> ApiResult<Vec<ClientShare>> {
        let rows: Vec<CarTypeClientsRow> = self.run_report("clients_per_car_type", &CLIENTS_PER_CAR_TYPE, filters).await?;
        non_empty(kpi::client_percentages(&rows))
    }

    pub async fn most_popular_requests(&self, filters: &ReportFilters) -> ApiResult<Vec<RequestTypeCountRow>> {
        self.run_report("most_popular_requests", &POPULAR_REQUESTS, filters).await
    }

    pub async fn benchmark_performance(&self, filters: &ReportFilters) -> ApiResult<Vec<SourceRegionRow>> {
        self.run_report("benchmark_performance", &BENCHMARK_PERFORMANCE, filters).await
    }

    pub async fn offer_revenue(&self, filters: &ReportFilters) -> ApiResult<Vec<OfferRevenueRow>> {
        self.run_report("offer_revenue", &OFFER_REVENUE, filters).await
    }

    pub async fn total_charge(&self, filters: &ReportFilters) -> ApiResult<f64> {
        self.scalar("total_charge", &TOTAL_CHARGE, filters).await
    }

    pub async fn country_revenue(&self, filters: &ReportFilters) -> ApiResult<Vec<CountryRevenueRow>> {
        self.run_report("country_revenue", &COUNTRY_REVENUE, filters).await
    }

    pub async fn revenue_per_benchmark(&self, filters: &ReportFilters) -> ApiResult<Vec<SourceRevenueRow>> {
        self.run_report("revenue_per_benchmark", &REVENUE_PER_BENCHMARK, filters).await
    }

    pub async fn timeline(&self, filters: &ReportFilters) -> ApiResult<Vec<TimelineRow>> {
        self.run_report("timeline", &TIMELINE, filters).await
    }

    pub async fn quarterly_revenue(&self, filters: &ReportFilters) -> ApiResult<Vec<QuarterlyRevenueRow>> {
        self.run_report("quarterly_revenue", &QUARTERLY_REVENUE, filters).await
    }

    pub async fn monthly_gains(&self) -> ApiResult<Vec<MonthlyGain>> {
        let rows: Vec<MonthlyAmountRow> =
            self.run_report("monthly_gains", &MONTHLY_AMOUNTS, &ReportFilters::default()).await?;
        Ok(kpi::monthly_gains(&rows))
    }

    pub async fn car_profitability(&self, filters: &ReportFilters) -> ApiResult<Vec<CarProfitabilityRow>> {
        self.run_report("car_profitability", &CAR_PROFITABILITY, filters).await
    }

    pub async fn monthly_profit(&self, filters: &ReportFilters) -> ApiResult<Vec<MonthlyProfitRow>> {
        self.run_report("monthly_profit", &MONTHLY_PROFIT, filters).await
    }

    pub async fn car_retention(&self) -> ApiResult<Vec<RetentionPoint>> {
        let mut conn = self.pool.acquire().await?;
        let selected: Vec<NaiveDate> = sqlx::query_scalar(RECENT_QUARTERS)
            .bind(kpi::RETENTION_QUARTERS as i64)
            .fetch_all(&mut *conn)
            .await?;
        if selected.is_empty() {
            return Err(ApiError::NotFound("No data available".to_string()));
        }

        // The cut-off only picks quarters; cars later in the current quarter still count.
        let rows: Vec<QuarterCarRow> = sqlx::query_as(CARS_IN_QUARTERS)
            .bind(selected.clone())
            .fetch_all(&mut *conn)
            .await?;
        let quarters = kpi::quarter_car_sets(&selected, &rows);
        debug!(quarters = quarters.len(), "computing car retention");

        let rates = kpi::retention_rates(&quarters);
        if rates.is_empty() {
            return Err(ApiError::NotFound(
                "Not enough data to calculate rentation rates".to_string(),
            ));
        }
        Ok(rates)
    }

    pub async fn top_pickup_places(&self, filters: &ReportFilters) -> ApiResult<Vec<PlaceCountRow>> {
        self.run_report("top_pickup_places", &TOP_PICKUP_PLACES, filters).await
    }

    pub async fn top_dropoff_places(&self, filters: &ReportFilters) -> ApiResult<Vec<PlaceCountRow>> {
        self.run_report("top_dropoff_places", &TOP_DROPOFF_PLACES, filters).await
    }

    pub async fn month_over_month(&self) -> ApiResult<MonthOverMonth> {
        let mut conn = self.pool.acquire().await?;
        let rows: Vec<MonthlyAmountRow> =
            Self::fetch_all(&mut conn, "month_over_month", &LATEST_TWO_MONTHS, &ReportFilters::default()).await?;
        kpi::month_over_month(&rows).ok_or_else(|| {
            ApiError::NotFound("Not enough data to calculate the comparison".to_string())
        })
    }

    pub async fn car_image(&self, filters: &ReportFilters) -> ApiResult<String> {
        let mut conn = self.pool.acquire().await?;
        let rows: Vec<CarImageRow> = Self::fetch_all(&mut conn, "car_image", &CAR_IMAGE, filters).await?;
        rows.into_iter()
            .next()
            .and_then(|row| row.image)
            .ok_or_else(|| ApiError::NotFound("Image not found".to_string()))
    }

    pub async fn total_price(&self, filters: &ReportFilters) -> ApiResult<f64> {
        self.scalar("total_price", &TOTAL_PRICE, filters).await
    }

    pub async fn car_types(&self) -> ApiResult<Vec<String>> {
        self.labels("SELECT slug FROM dimcars").await
    }

    pub async fn destinations(&self) -> ApiResult<Vec<String>> {
        self.labels("SELECT dest_code FROM dimdestinations").await
    }

    pub async fn calendar_dates(&self) -> ApiResult<Vec<NaiveDate>> {
        let mut conn = self.pool.acquire().await?;
        let dates = sqlx::query_scalar("SELECT date FROM dimdates")
            .fetch_all(&mut *conn)
            .await?;
        Ok(dates)
    }

    /// Filter option lists: trimmed, NULLs dropped, possibly empty.
    async fn labels(&self, sql: &'static str) -> ApiResult<Vec<String>> {
        let mut conn = self.pool.acquire().await?;
        let values: Vec<Option<String>> = sqlx::query_scalar(sql).fetch_all(&mut *conn).await?;
        Ok(values
            .into_iter()
            .flatten()
            .map(|v| v.trim().to_string())
            .collect())
    }

    pub async fn predict_total_price(&self, future_date: NaiveDate) -> ApiResult<f64> {
        let prediction = self.predict("total_price", PRICE_HISTORY, future_date).await?;
        Ok(prediction)
    }

    pub async fn optimize_fleet(&self, future_date: NaiveDate) -> ApiResult<FleetPlan> {
        let predicted_passengers = self.predict("passenger_count", PASSENGER_HISTORY, future_date).await?;
        Ok(FleetPlan::from_prediction(predicted_passengers))
    }

    /// Fit a trend over the full history and evaluate it at `future_date`.
    async fn predict(&self, metric: &'static str, history_sql: &'static str, future_date: NaiveDate) -> ApiResult<f64> {
        let mut conn = self.pool.acquire().await?;
        let rows: Vec<DatedValueRow> = sqlx::query_as(history_sql).fetch_all(&mut *conn).await?;
        drop(conn);

        let series: Vec<(NaiveDate, f64)> = rows
            .into_iter()
            .filter_map(|row| row.value.map(|v| (row.date, v)))
            .collect();

        let trend = forecast::fit_series(&series)
            .ok_or_else(|| ApiError::NotFound("Not enough data to fit a trend".to_string()))?;
        debug!(metric, observations = series.len(), slope = trend.slope, intercept = trend.intercept, "trend fitted");

        Ok(trend.predict_date(future_date))
    }

    pub async fn warehouse_stats(&self) -> ApiResult<WarehouseStats> {
        let mut conn = self.pool.acquire().await?;
        let stats = sqlx::query_as(WAREHOUSE_STATS).fetch_one(&mut *conn).await?;
        Ok(stats)
    }
}

fn non_empty<T>(rows: Vec<T>) -> ApiResult<Vec<T>> {
    if rows.is_empty() {
        Err(ApiError::not_found())
    } else {
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_non_empty() {
        assert!(matches!(non_empty(Vec::<i32>::new()), Err(ApiError::NotFound(_))));
        assert_eq!(non_empty(vec![1]).unwrap(), vec![1]);
    }

    #[test]
    fn test_report_filters_land_on_declared_columns() {
        let filters = ReportFilters {
            start_date: NaiveDate::from_ymd_opt(2023, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2023, 6, 30),
            slugs: vec!["SUV".to_string()],
            ..Default::default()
        };

        let sql = CUSTOMER_GAINS.build(&filters).into_sql();
        assert!(sql.contains("AND d.date BETWEEN $1 AND $2 AND c.slug = $3 GROUP BY cl.customer"));

        let sql = BRAND_GAINS.build(&filters).into_sql();
        assert!(sql.contains("AND c.slug = $1 AND f.pick_up_date::date BETWEEN $2 AND $3 GROUP BY c.brand"));

        let sql = TOTAL_PRICE.build(&filters).into_sql();
        assert!(sql.ends_with("WHERE 1=1 AND d.date BETWEEN $1 AND $2"));
    }

    #[test]
    fn test_destination_reports_join_destinations() {
        let filters = ReportFilters {
            dest_code: Some("DJE".to_string()),
            ..Default::default()
        };
        for query in [
            &CLIENTS_PER_CAR_TYPE,
            &POPULAR_REQUESTS,
            &BENCHMARK_PERFORMANCE,
            &COUNTRY_REVENUE,
            &TOP_PICKUP_PLACES,
            &TOP_DROPOFF_PLACES,
        ] {
            let sql = query.build(&filters).into_sql();
            assert!(sql.contains("JOIN dimdestinations dd"), "{}", sql);
            assert!(sql.contains("AND dd.dest_code = $1"), "{}", sql);
        }
    }

    #[test]
    fn test_offer_and_request_type_filters() {
        let filters = ReportFilters {
            adjustement_type: Some("markup".to_string()),
            req_type: Some("Transfer".to_string()),
            ..Default::default()
        };
        let sql = OFFER_REVENUE.build(&filters).into_sql();
        assert!(sql.contains("AND o.adjustement_type = $1 GROUP BY o.offer_code, d.date LIMIT 5"));
        assert!(!sql.contains("req_type"));

        let sql = QUARTERLY_REVENUE.build(&filters).into_sql();
        assert!(sql.contains("AND rt.req_type = $1 GROUP BY"));
        assert!(!sql.contains("adjustement_type"));
    }

    #[test]
    fn test_profitability_accepts_many_slugs() {
        let filters = ReportFilters {
            slugs: vec!["SUV".to_string(), "ECO".to_string()],
            ..Default::default()
        };
        let sql = CAR_PROFITABILITY.build(&filters).into_sql();
        assert!(sql.contains("AND c.slug = ANY($1) GROUP BY car_model"));
    }

    #[test]
    fn test_unfiltered_reports_have_no_binds() {
        let filters = ReportFilters::default();
        for query in [&MONTHLY_AMOUNTS, &LATEST_TWO_MONTHS, &OWNER_CARS, &TIMELINE] {
            assert!(!query.build(&filters).into_sql().contains('$'));
        }
    }
}
