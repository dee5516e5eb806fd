//! Derived metrics computed after a report query returns.
//!
//! Everything here is a pure function over rows so the arithmetic can be
//! checked without a warehouse. Ratios with a zero denominator are 0.

use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::models::{CarTypeClientsRow, MonthlyAmountRow, OwnerCarCountRow, OwnerRequestCountRow, QuarterCarRow};

/// Quarters considered by the retention report.
pub const RETENTION_QUARTERS: usize = 8;

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// `part / total * 100`, or 0 when `total` is 0.
pub fn percentage(part: f64, total: f64) -> f64 {
    if total == 0.0 {
        0.0
    } else {
        part / total * 100.0
    }
}

/// Relative change from `previous` to `current` in percent.
pub fn growth_percentage(current: f64, previous: f64) -> f64 {
    percentage(current - previous, previous)
}

// ============================================================================
// Yearly gain growth
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthKpi {
    pub gain_2022: f64,
    pub gain_2023: f64,
    pub gain_2024: f64,
    pub growth_2023: f64,
    pub growth_2024: f64,
}

impl GrowthKpi {
    pub fn from_gains(gain_2022: f64, gain_2023: f64, gain_2024: f64) -> Self {
        Self {
            gain_2022,
            gain_2023,
            gain_2024,
            growth_2023: growth_percentage(gain_2023, gain_2022),
            growth_2024: growth_percentage(gain_2024, gain_2023),
        }
    }
}

// ============================================================================
// Client share per car type
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ClientShare {
    pub car_type: String,
    pub request_type: String,
    pub client_percentage: f64,
}

/// Share of each request type within its car type.
///
/// Rows with a missing or blank label still count toward their car type's
/// total but are not reported themselves.
pub fn client_percentages(rows: &[CarTypeClientsRow]) -> Vec<ClientShare> {
    let mut totals: HashMap<Option<&str>, i64> = HashMap::new();
    for row in rows {
        *totals.entry(row.car_type.as_deref()).or_insert(0) += row.client_count;
    }

    rows.iter()
        .filter_map(|row| {
            let car_type = label(row.car_type.as_deref())?;
            let request_type = label(row.request_type.as_deref())?;
            let total = totals.get(&row.car_type.as_deref()).copied().unwrap_or(0);
            Some(ClientShare {
                car_type,
                request_type,
                client_percentage: round_to(percentage(row.client_count as f64, total as f64), 2),
            })
        })
        .collect()
}

fn label(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

// ============================================================================
// Owner shares
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct OwnerShare {
    pub owner: String,
    pub car_count: i64,
    pub request_percentage: f64,
}

/// Cars per owner alongside that owner's share of all requests.
pub fn owner_shares(
    cars: &[OwnerCarCountRow],
    requests: &[OwnerRequestCountRow],
    total_requests: i64,
) -> Vec<OwnerShare> {
    let by_owner: HashMap<&str, i64> = requests
        .iter()
        .map(|r| (r.owner.as_str(), r.request_count))
        .collect();

    cars.iter()
        .map(|row| {
            let owner_requests = by_owner.get(row.owner.as_str()).copied().unwrap_or(0);
            OwnerShare {
                owner: row.owner.trim().to_string(),
                car_count: row.car_count,
                request_percentage: percentage(owner_requests as f64, total_requests as f64),
            }
        })
        .collect()
}

// ============================================================================
// Monthly revenue
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyGain {
    pub year: i32,
    pub month: String,
    pub total_amount: f64,
    pub percentage_gain: f64,
}

/// Per-month amount and its gain over the previous month of the same year,
/// expressed relative to the month's own amount. January (or the first month
/// with data in a year) compares against 0.
pub fn monthly_gains(rows: &[MonthlyAmountRow]) -> Vec<MonthlyGain> {
    let mut ordered: Vec<&MonthlyAmountRow> = rows.iter().collect();
    ordered.sort_by_key(|r| (r.year, r.month_id));

    let mut previous: Option<&MonthlyAmountRow> = None;
    let mut out = Vec::with_capacity(ordered.len());
    for row in ordered {
        let prior_amount = previous
            .filter(|p| p.year == row.year)
            .map(|p| p.total_amount)
            .unwrap_or(0.0);
        out.push(MonthlyGain {
            year: row.year,
            month: row.month.trim().to_string(),
            total_amount: round_to(row.total_amount, 2),
            percentage_gain: round_to(percentage(row.total_amount - prior_amount, row.total_amount), 2),
        });
        previous = Some(row);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthOverMonth {
    pub last_month_total_revenue: f64,
    pub percentage_gain: f64,
}

/// Compare the latest month against the one before it. `None` with fewer
/// than two months.
pub fn month_over_month(rows: &[MonthlyAmountRow]) -> Option<MonthOverMonth> {
    let mut ordered: Vec<&MonthlyAmountRow> = rows.iter().collect();
    ordered.sort_by_key(|r| std::cmp::Reverse((r.year, r.month_id)));

    match ordered.as_slice() {
        [last, previous, ..] => Some(MonthOverMonth {
            last_month_total_revenue: round_to(last.total_amount, 2),
            percentage_gain: round_to(growth_percentage(last.total_amount, previous.total_amount), 2),
        }),
        _ => None,
    }
}

// ============================================================================
// Car retention
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct QuarterCars {
    pub quarter: NaiveDate,
    pub cars: HashSet<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetentionPoint {
    pub quarter: String,
    pub rate: f64,
}

/// Car sets for the selected `quarters`, most recent first.
///
/// Every selected quarter is kept even when no row names a car in it; rows
/// outside the selection are ignored.
pub fn quarter_car_sets(quarters: &[NaiveDate], rows: &[QuarterCarRow]) -> Vec<QuarterCars> {
    let mut by_quarter: BTreeMap<NaiveDate, HashSet<i64>> =
        quarters.iter().map(|q| (*q, HashSet::new())).collect();
    for row in rows {
        if let Some(cars) = by_quarter.get_mut(&row.quarter) {
            cars.insert(row.car_id);
        }
    }
    by_quarter
        .into_iter()
        .rev()
        .map(|(quarter, cars)| QuarterCars { quarter, cars })
        .collect()
}

/// Retention of each quarter against the next older one in `quarters`
/// (ordered most recent first). Pairs whose older quarter has no cars are
/// skipped.
pub fn retention_rates(quarters: &[QuarterCars]) -> Vec<RetentionPoint> {
    quarters
        .windows(2)
        .filter_map(|pair| {
            let (current, previous) = (&pair[0], &pair[1]);
            if previous.cars.is_empty() {
                return None;
            }
            let retained = current.cars.intersection(&previous.cars).count();
            Some(RetentionPoint {
                quarter: quarter_label(current.quarter),
                rate: round_to(retained as f64 / previous.cars.len() as f64, 2),
            })
        })
        .collect()
}

/// `YYYY-Qn` for the quarter containing `date`.
pub fn quarter_label(date: NaiveDate) -> String {
    format!("{}-Q{}", date.year(), (date.month() - 1) / 3 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn month(year: i32, month_id: i32, name: &str, total_amount: f64) -> MonthlyAmountRow {
        MonthlyAmountRow {
            year,
            month_id,
            month: name.to_string(),
            total_amount,
        }
    }

    fn clients(car_type: Option<&str>, request_type: Option<&str>, client_count: i64) -> CarTypeClientsRow {
        CarTypeClientsRow {
            car_type: car_type.map(str::to_string),
            request_type: request_type.map(str::to_string),
            client_count,
        }
    }

    #[test]
    fn test_percentage_zero_denominator() {
        assert_eq!(percentage(5.0, 0.0), 0.0);
        assert_eq!(percentage(0.0, 0.0), 0.0);
        assert_eq!(percentage(1.0, 4.0), 25.0);
        assert_eq!(growth_percentage(150.0, 0.0), 0.0);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(12.3456, 2), 12.35);
        assert_eq!(round_to(12.3454, 3), 12.345);
        assert_eq!(round_to(-1.006, 2), -1.01);
    }

    #[test]
    fn test_growth_kpi() {
        let kpi = GrowthKpi::from_gains(100.0, 150.0, 120.0);
        assert_eq!(kpi.growth_2023, 50.0);
        assert_eq!(kpi.growth_2024, -20.0);

        let kpi = GrowthKpi::from_gains(0.0, 150.0, 0.0);
        assert_eq!(kpi.growth_2023, 0.0);
        assert_eq!(kpi.growth_2024, -100.0);
    }

    #[test]
    fn test_client_percentages_split_within_car_type() {
        let rows = vec![
            clients(Some("Sedan"), Some("Airport"), 3),
            clients(Some("Sedan"), Some("Hourly"), 1),
        ];
        let shares = client_percentages(&rows);
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].client_percentage, 75.0);
        assert_eq!(shares[1].client_percentage, 25.0);
        assert_eq!(shares[0].car_type, "Sedan");
    }

    #[test]
    fn test_client_percentages_unlabelled_rows_count_toward_totals() {
        let rows = vec![
            clients(Some("SUV  "), Some(" Airport "), 1),
            clients(Some("SUV  "), None, 1),
            clients(None, Some("Airport"), 5),
        ];
        let shares = client_percentages(&rows);
        assert_eq!(
            shares,
            vec![ClientShare {
                car_type: "SUV".to_string(),
                request_type: "Airport".to_string(),
                client_percentage: 50.0,
            }]
        );
    }

    #[test]
    fn test_owner_shares() {
        let cars = vec![
            OwnerCarCountRow { owner: "Agency ".to_string(), car_count: 4 },
            OwnerCarCountRow { owner: "Unknown".to_string(), car_count: 1 },
        ];
        let requests = vec![OwnerRequestCountRow { owner: "Agency ".to_string(), request_count: 3 }];

        let shares = owner_shares(&cars, &requests, 12);
        assert_eq!(shares[0].owner, "Agency");
        assert_eq!(shares[0].request_percentage, 25.0);
        assert_eq!(shares[1].request_percentage, 0.0);

        let shares = owner_shares(&cars, &requests, 0);
        assert_eq!(shares[0].request_percentage, 0.0);
    }

    #[test]
    fn test_month_over_month() {
        let rows = vec![month(2024, 1, "Janvier", 100.0), month(2024, 2, "Fevrier", 150.0)];
        let comparison = month_over_month(&rows).unwrap();
        assert_eq!(comparison.last_month_total_revenue, 150.0);
        assert_eq!(comparison.percentage_gain, 50.0);
    }

    #[test]
    fn test_month_over_month_across_years() {
        let rows = vec![month(2024, 1, "Janvier", 90.0), month(2023, 12, "Decembre", 120.0)];
        let comparison = month_over_month(&rows).unwrap();
        assert_eq!(comparison.last_month_total_revenue, 90.0);
        assert_eq!(comparison.percentage_gain, -25.0);
    }

    #[test]
    fn test_month_over_month_needs_two_months() {
        assert_eq!(month_over_month(&[month(2024, 1, "Janvier", 100.0)]), None);
        assert_eq!(month_over_month(&[]), None);

        let rows = vec![month(2024, 1, "Janvier", 0.0), month(2024, 2, "Fevrier", 150.0)];
        assert_eq!(month_over_month(&rows).unwrap().percentage_gain, 0.0);
    }

    #[test]
    fn test_monthly_gains_restart_each_year() {
        let rows = vec![
            month(2024, 1, " Janvier ", 200.0),
            month(2023, 12, "Decembre", 100.0),
            month(2023, 11, "Novembre", 50.0),
            month(2024, 2, "Fevrier", 0.0),
        ];
        let gains = monthly_gains(&rows);
        let summary: Vec<(i32, &str, f64)> = gains
            .iter()
            .map(|g| (g.year, g.month.as_str(), g.percentage_gain))
            .collect();
        assert_eq!(
            summary,
            vec![
                (2023, "Novembre", 100.0),
                (2023, "Decembre", 50.0),
                (2024, "Janvier", 100.0),
                (2024, "Fevrier", 0.0),
            ]
        );
    }

    #[test]
    fn test_quarter_label() {
        assert_eq!(quarter_label(date("2024-01-01")), "2024-Q1");
        assert_eq!(quarter_label(date("2024-07-01")), "2024-Q3");
        assert_eq!(quarter_label(date("2023-12-31")), "2023-Q4");
    }

    #[test]
    fn test_quarter_car_sets_orders_selection() {
        let quarters = vec![date("2024-01-01"), date("2024-07-01"), date("2024-04-01")];
        let rows = vec![
            QuarterCarRow { quarter: date("2024-07-01"), car_id: 1 },
            QuarterCarRow { quarter: date("2024-07-01"), car_id: 2 },
            QuarterCarRow { quarter: date("2024-01-01"), car_id: 1 },
            // outside the selection
            QuarterCarRow { quarter: date("2023-10-01"), car_id: 9 },
        ];
        let sets = quarter_car_sets(&quarters, &rows);
        let order: Vec<NaiveDate> = sets.iter().map(|q| q.quarter).collect();
        assert_eq!(order, vec![date("2024-07-01"), date("2024-04-01"), date("2024-01-01")]);
        assert_eq!(sets[0].cars, HashSet::from([1, 2]));
        assert!(sets[1].cars.is_empty());
        assert_eq!(sets[2].cars, HashSet::from([1]));
    }

    #[test]
    fn test_quarter_without_cars_still_breaks_the_chain() {
        // 2024-Q2 had requests but none with a car attached.
        let quarters = vec![date("2024-07-01"), date("2024-04-01"), date("2024-01-01")];
        let rows = vec![
            QuarterCarRow { quarter: date("2024-07-01"), car_id: 1 },
            QuarterCarRow { quarter: date("2024-01-01"), car_id: 1 },
        ];
        let rates = retention_rates(&quarter_car_sets(&quarters, &rows));
        assert_eq!(
            rates,
            vec![RetentionPoint { quarter: "2024-Q2".to_string(), rate: 0.0 }]
        );
    }

    #[test]
    fn test_retention_rates() {
        let quarters = vec![
            QuarterCars { quarter: date("2024-04-01"), cars: HashSet::from([1, 2, 3]) },
            QuarterCars { quarter: date("2024-01-01"), cars: HashSet::from([1, 2, 4, 5]) },
            QuarterCars { quarter: date("2023-10-01"), cars: HashSet::from([4]) },
        ];
        let rates = retention_rates(&quarters);
        assert_eq!(
            rates,
            vec![
                RetentionPoint { quarter: "2024-Q2".to_string(), rate: 0.5 },
                RetentionPoint { quarter: "2024-Q1".to_string(), rate: 1.0 },
            ]
        );
    }

    #[test]
    fn test_retention_skips_empty_predecessor() {
        let quarters = vec![
            QuarterCars { quarter: date("2024-04-01"), cars: HashSet::from([1]) },
            QuarterCars { quarter: date("2024-01-01"), cars: HashSet::new() },
        ];
        assert!(retention_rates(&quarters).is_empty());
    }

    #[test]
    fn test_retention_single_quarter_has_no_pairs() {
        let quarters = vec![QuarterCars { quarter: date("2024-04-01"), cars: HashSet::from([1]) }];
        assert!(retention_rates(&quarters).is_empty());
    }
}
