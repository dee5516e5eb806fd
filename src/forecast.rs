//! Linear trend forecasting over the request history.
//!
//! The feature is the number of days since 1970-01-01; the target is a
//! per-request metric (total price or passenger count). Fitting is a pure
//! function of the series, so the service only has to load the history.

use chrono::{DateTime, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{ApiError, ApiResult};
use crate::query::DATE_FORMAT;

/// Share of the history held out from fitting.
pub const TEST_FRACTION: f64 = 0.2;
pub const SPLIT_SEED: u64 = 0;

/// Seats per vehicle used to turn passengers into vehicles.
pub const VEHICLE_CAPACITY: f64 = 4.0;
/// Target utilization; the fleet is padded so vehicles run at most this full.
pub const UTILIZATION_TARGET: f64 = 0.85;

pub fn parse_future_date(raw: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| ApiError::BadRequest("Invalid date format. Use YYYY-MM-DD.".to_string()))
}

pub fn day_ordinal(date: NaiveDate) -> i64 {
    (date - DateTime::<Utc>::UNIX_EPOCH.date_naive()).num_days()
}

/// Shuffle with a fixed seed and split off `ceil(n * test_fraction)` items.
///
/// Returns `(train, test)`.
pub fn train_test_split<T: Clone>(items: &[T], test_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let n_test = ((items.len() as f64) * test_fraction).ceil() as usize;
    let n_test = n_test.min(items.len());

    let mut order: Vec<usize> = (0..items.len()).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let test = order[..n_test].iter().map(|&i| items[i].clone()).collect();
    let train = order[n_test..].iter().map(|&i| items[i].clone()).collect();
    (train, test)
}

/// Ordinary least squares line `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearTrend {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearTrend {
    /// Fit over `(x, y)` points. `None` when there are no points.
    ///
    /// A constant feature has no slope; the line is then flat at the mean.
    pub fn fit(points: &[(f64, f64)]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f64;
        let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
        let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;

        // Centered sums keep precision with day ordinals in the tens of thousands.
        let sxx: f64 = points.iter().map(|p| (p.0 - mean_x).powi(2)).sum();
        let sxy: f64 = points.iter().map(|p| (p.0 - mean_x) * (p.1 - mean_y)).sum();

        let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
        Some(Self {
            slope,
            intercept: mean_y - slope * mean_x,
        })
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    pub fn predict_date(&self, date: NaiveDate) -> f64 {
        self.predict(day_ordinal(date) as f64)
    }
}

/// Fit a trend over a dated series after holding out the test partition.
///
/// The held-out rows are never scored.
pub fn fit_series(series: &[(NaiveDate, f64)]) -> Option<LinearTrend> {
    let points: Vec<(f64, f64)> = series
        .iter()
        .map(|(date, value)| (day_ordinal(*date) as f64, *value))
        .collect();
    let (train, _held_out) = train_test_split(&points, TEST_FRACTION, SPLIT_SEED);
    LinearTrend::fit(&train)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FleetPlan {
    pub predicted_passenger_count: i64,
    pub recommended_fleet_size: i64,
    pub adjusted_fleet_size: i64,
}

impl FleetPlan {
    pub fn from_prediction(predicted_passengers: f64) -> Self {
        let passengers = predicted_passengers.ceil();
        let recommended = (passengers / VEHICLE_CAPACITY).ceil();
        let adjusted = (recommended / UTILIZATION_TARGET).ceil();
        Self {
            predicted_passenger_count: passengers as i64,
            recommended_fleet_size: recommended as i64,
            adjusted_fleet_size: adjusted as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn test_day_ordinal() {
        assert_eq!(day_ordinal(date("1970-01-01")), 0);
        assert_eq!(day_ordinal(date("1970-01-02")), 1);
        assert_eq!(day_ordinal(date("2000-01-01")), 10957);
        assert_eq!(day_ordinal(date("1969-12-31")), -1);
    }

    #[test]
    fn test_parse_future_date() {
        assert_eq!(parse_future_date("2030-01-01").unwrap(), date("2030-01-01"));
        assert!(matches!(parse_future_date("2030/01/01"), Err(ApiError::BadRequest(_))));
        assert!(matches!(parse_future_date("2030-02-30"), Err(ApiError::BadRequest(_))));
        assert!(matches!(parse_future_date("tomorrow"), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_fit_recovers_exact_line() {
        let points: Vec<(f64, f64)> = (0..20).map(|x| (x as f64, 2.0 * x as f64 + 1.0)).collect();
        let trend = LinearTrend::fit(&points).unwrap();
        assert!((trend.slope - 2.0).abs() < 1e-9);
        assert!((trend.intercept - 1.0).abs() < 1e-9);
        assert!((trend.predict(100.0) - 201.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_constant_feature_is_flat_mean() {
        let points = vec![(5.0, 10.0), (5.0, 20.0), (5.0, 30.0)];
        let trend = LinearTrend::fit(&points).unwrap();
        assert_eq!(trend.slope, 0.0);
        assert!((trend.predict(1000.0) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_empty_is_none() {
        assert_eq!(LinearTrend::fit(&[]), None);
    }

    #[test]
    fn test_split_sizes() {
        let items: Vec<u32> = (0..10).collect();
        let (train, test) = train_test_split(&items, TEST_FRACTION, SPLIT_SEED);
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);

        let mut all: Vec<u32> = train.iter().chain(test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, items);

        // ceil(0.2 * 11) = 3
        let items: Vec<u32> = (0..11).collect();
        let (train, test) = train_test_split(&items, TEST_FRACTION, SPLIT_SEED);
        assert_eq!((train.len(), test.len()), (8, 3));
    }

    #[test]
    fn test_split_is_deterministic() {
        let items: Vec<u32> = (0..50).collect();
        assert_eq!(
            train_test_split(&items, TEST_FRACTION, SPLIT_SEED),
            train_test_split(&items, TEST_FRACTION, SPLIT_SEED)
        );
    }

    #[test]
    fn test_single_row_leaves_nothing_to_train() {
        let series = vec![(date("2023-01-01"), 100.0)];
        assert_eq!(fit_series(&series), None);
    }

    #[test]
    fn test_fit_series_extrapolates_linear_history() {
        // 3 units per day starting at 2023-01-01
        let start = date("2023-01-01");
        let series: Vec<(NaiveDate, f64)> = (0..30)
            .map(|i| (start + chrono::Duration::days(i), 50.0 + 3.0 * i as f64))
            .collect();
        let trend = fit_series(&series).unwrap();
        let predicted = trend.predict_date(date("2023-03-02"));
        // 2023-03-02 is day 60 after start
        assert!((predicted - 230.0).abs() < 1e-6);
    }

    #[test]
    fn test_fleet_plan() {
        let plan = FleetPlan::from_prediction(10.2);
        assert_eq!(plan.predicted_passenger_count, 11);
        assert_eq!(plan.recommended_fleet_size, 3);
        assert_eq!(plan.adjusted_fleet_size, 4);

        let plan = FleetPlan::from_prediction(16.0);
        assert_eq!(plan.predicted_passenger_count, 16);
        assert_eq!(plan.recommended_fleet_size, 4);
        assert_eq!(plan.adjusted_fleet_size, 5);

        assert_eq!(
            FleetPlan::from_prediction(0.0),
            FleetPlan {
                predicted_passenger_count: 0,
                recommended_fleet_size: 0,
                adjusted_fleet_size: 0,
            }
        );
    }
}
