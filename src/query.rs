//! Report query composition.
//!
//! Every report is a fixed `SELECT ... FROM factrequests JOIN ...` followed
//! by a set of optional predicates and a fixed `GROUP BY / ORDER BY / LIMIT`
//! tail. A predicate only contributes SQL when its filter value is present,
//! so an absent filter is a no-op rather than an exclusion. All values are
//! sent as bind parameters.

use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};

use crate::error::{ApiError, ApiResult};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// Filters
// ============================================================================

/// Raw filter parameters as they arrive on the query string.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct FilterParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub slug: Option<String>,
    pub dest_code: Option<String>,
    pub adjustement_type: Option<String>,
    pub req_type: Option<String>,
}

/// Normalized filters. Empty strings are treated as absent.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReportFilters {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Car category codes. Single-valued reports use the last entry.
    pub slugs: Vec<String>,
    pub dest_code: Option<String>,
    pub adjustement_type: Option<String>,
    pub req_type: Option<String>,
}

impl ReportFilters {
    pub fn from_params(params: FilterParams) -> ApiResult<Self> {
        Ok(Self {
            start_date: parse_date_param("start_date", params.start_date)?,
            end_date: parse_date_param("end_date", params.end_date)?,
            slugs: present(params.slug).into_iter().collect(),
            dest_code: present(params.dest_code),
            adjustement_type: present(params.adjustement_type),
            req_type: present(params.req_type),
        })
    }

    /// Build filters from raw query pairs, keeping every `slug` occurrence.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> ApiResult<Self> {
        let mut params = FilterParams::default();
        let mut slugs = Vec::new();

        for (key, value) in pairs {
            match key.as_str() {
                "slug" => slugs.extend(present(Some(value))),
                "start_date" => params.start_date = Some(value),
                "end_date" => params.end_date = Some(value),
                "dest_code" => params.dest_code = Some(value),
                "adjustement_type" => params.adjustement_type = Some(value),
                "req_type" => params.req_type = Some(value),
                _ => {}
            }
        }

        let mut filters = Self::from_params(params)?;
        filters.slugs = slugs;
        Ok(filters)
    }

    /// The date range applies only when both ends are supplied.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }

    pub fn slug(&self) -> Option<&str> {
        self.slugs.last().map(String::as_str)
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn parse_date_param(name: &str, value: Option<String>) -> ApiResult<Option<NaiveDate>> {
    match present(value) {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(&raw, DATE_FORMAT)
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("Invalid {}: '{}'. Use YYYY-MM-DD.", name, raw))),
    }
}

// ============================================================================
// Predicates
// ============================================================================

/// Column a report's date range is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateColumn {
    /// `factrequests.pick_up_date`, truncated to a date.
    PickUp,
    /// `dimdates.date`, joined as `d`.
    Calendar,
}

impl DateColumn {
    fn sql(self) -> &'static str {
        match self {
            DateColumn::PickUp => "f.pick_up_date::date",
            DateColumn::Calendar => "d.date",
        }
    }
}

/// An optional `AND` clause keyed by filter presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    DateRange(DateColumn),
    /// Equality on the given slug column.
    Slug(&'static str),
    /// Membership of the given slug column in every supplied slug.
    SlugIn(&'static str),
    /// `dd.dest_code`; the report must join `dimdestinations AS dd`.
    DestCode,
    /// `o.adjustement_type`; the report must join `dimoffers AS o`.
    AdjustementType,
    /// `rt.req_type`; the report must join `dimrequesttypes AS rt`.
    ReqType,
}

impl Predicate {
    fn push(self, qb: &mut QueryBuilder<'static, Postgres>, filters: &ReportFilters) {
        match self {
            Predicate::DateRange(column) => {
                if let Some((start, end)) = filters.date_range() {
                    qb.push(" AND ")
                        .push(column.sql())
                        .push(" BETWEEN ")
                        .push_bind(start)
                        .push(" AND ")
                        .push_bind(end);
                }
            }
            Predicate::Slug(column) => push_equals(qb, column, filters.slug()),
            Predicate::SlugIn(column) => {
                if !filters.slugs.is_empty() {
                    qb.push(" AND ")
                        .push(column)
                        .push(" = ANY(")
                        .push_bind(filters.slugs.clone())
                        .push(")");
                }
            }
            Predicate::DestCode => push_equals(qb, "dd.dest_code", filters.dest_code.as_deref()),
            Predicate::AdjustementType => {
                push_equals(qb, "o.adjustement_type", filters.adjustement_type.as_deref())
            }
            Predicate::ReqType => push_equals(qb, "rt.req_type", filters.req_type.as_deref()),
        }
    }
}

fn push_equals(qb: &mut QueryBuilder<'static, Postgres>, column: &str, value: Option<&str>) {
    if let Some(value) = value {
        qb.push(" AND ")
            .push(column)
            .push(" = ")
            .push_bind(value.to_string());
    }
}

// ============================================================================
// Report Query
// ============================================================================

/// A report's fixed SQL plus the predicates it accepts.
#[derive(Debug, Clone, Copy)]
pub struct ReportQuery {
    select: &'static str,
    predicates: &'static [Predicate],
    tail: &'static str,
}

impl ReportQuery {
    pub const fn new(
        select: &'static str,
        predicates: &'static [Predicate],
        tail: &'static str,
    ) -> Self {
        Self { select, predicates, tail }
    }

    pub fn build(&self, filters: &ReportFilters) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(self.select.trim_end());
        qb.push(" WHERE 1=1");
        for predicate in self.predicates {
            predicate.push(&mut qb, filters);
        }
        let tail = self.tail.trim();
        if !tail.is_empty() {
            qb.push(" ").push(tail);
        }
        qb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAIN_BY_BRAND: ReportQuery = ReportQuery::new(
        "SELECT c.brand, SUM(f.total_price - f.offer_price)::float8 AS total_gain FROM factrequests f JOIN dimcars c ON f.car_fk = c.car_pk",
        &[Predicate::Slug("c.slug"), Predicate::DateRange(DateColumn::PickUp)],
        "GROUP BY c.brand",
    );

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn test_no_filters_is_base_query() {
        let qb = GAIN_BY_BRAND.build(&ReportFilters::default());
        assert!(qb.sql().ends_with("JOIN dimcars c ON f.car_fk = c.car_pk WHERE 1=1 GROUP BY c.brand"));
        assert!(!qb.sql().contains('$'));
    }

    #[test]
    fn test_date_range_requires_both_ends() {
        let none = GAIN_BY_BRAND.build(&ReportFilters::default()).into_sql();

        let start_only = ReportFilters {
            start_date: Some(date("2023-01-01")),
            ..Default::default()
        };
        let end_only = ReportFilters {
            end_date: Some(date("2023-12-31")),
            ..Default::default()
        };
        assert_eq!(GAIN_BY_BRAND.build(&start_only).into_sql(), none);
        assert_eq!(GAIN_BY_BRAND.build(&end_only).into_sql(), none);

        let both = ReportFilters {
            start_date: Some(date("2023-01-01")),
            end_date: Some(date("2023-12-31")),
            ..Default::default()
        };
        let sql = GAIN_BY_BRAND.build(&both).into_sql();
        assert!(sql.contains("AND f.pick_up_date::date BETWEEN $1 AND $2"));
    }

    #[test]
    fn test_placeholders_follow_predicate_order() {
        let filters = ReportFilters {
            start_date: Some(date("2023-01-01")),
            end_date: Some(date("2023-03-31")),
            slugs: vec!["SUV".to_string()],
            ..Default::default()
        };
        let sql = GAIN_BY_BRAND.build(&filters).into_sql();
        assert!(sql.contains("WHERE 1=1 AND c.slug = $1 AND f.pick_up_date::date BETWEEN $2 AND $3 GROUP BY"));
    }

    #[test]
    fn test_calendar_date_column() {
        let query = ReportQuery::new(
            "SELECT SUM(f.total_price)::float8 FROM factrequests f JOIN dimdates d ON f.date_fk = d.date_pk",
            &[Predicate::DateRange(DateColumn::Calendar)],
            "",
        );
        let filters = ReportFilters {
            start_date: Some(date("2023-01-01")),
            end_date: Some(date("2023-03-31")),
            ..Default::default()
        };
        let sql = query.build(&filters).into_sql();
        assert!(sql.ends_with("WHERE 1=1 AND d.date BETWEEN $1 AND $2"));
    }

    #[test]
    fn test_unused_filters_add_nothing() {
        // Filters a report does not declare must not leak into its SQL.
        let filters = ReportFilters {
            dest_code: Some("TUN".to_string()),
            req_type: Some("Transfer".to_string()),
            ..Default::default()
        };
        let sql = GAIN_BY_BRAND.build(&filters).into_sql();
        assert!(!sql.contains("dest_code"));
        assert!(!sql.contains("req_type"));
    }

    #[test]
    fn test_dimension_predicates() {
        let query = ReportQuery::new(
            "SELECT 1 FROM factrequests f",
            &[Predicate::DestCode, Predicate::AdjustementType, Predicate::ReqType],
            "LIMIT 1",
        );
        let filters = ReportFilters {
            dest_code: Some("TUN".to_string()),
            adjustement_type: Some("discount".to_string()),
            req_type: Some("Transfer".to_string()),
            ..Default::default()
        };
        let sql = query.build(&filters).into_sql();
        assert_eq!(
            sql,
            "SELECT 1 FROM factrequests f WHERE 1=1 AND dd.dest_code = $1 AND o.adjustement_type = $2 AND rt.req_type = $3 LIMIT 1"
        );
    }

    #[test]
    fn test_slug_in_binds_single_array() {
        let query = ReportQuery::new("SELECT 1 FROM dimcars c", &[Predicate::SlugIn("c.slug")], "");
        let filters = ReportFilters {
            slugs: vec!["SUV".to_string(), "ECO".to_string()],
            ..Default::default()
        };
        assert_eq!(
            query.build(&filters).into_sql(),
            "SELECT 1 FROM dimcars c WHERE 1=1 AND c.slug = ANY($1)"
        );
        assert_eq!(
            query.build(&ReportFilters::default()).into_sql(),
            "SELECT 1 FROM dimcars c WHERE 1=1"
        );
    }

    #[test]
    fn test_empty_params_are_absent() {
        let filters = ReportFilters::from_params(FilterParams {
            start_date: Some(String::new()),
            end_date: Some(String::new()),
            slug: Some(String::new()),
            dest_code: Some(String::new()),
            adjustement_type: None,
            req_type: Some(String::new()),
        })
        .unwrap();
        assert_eq!(filters, ReportFilters::default());
    }

    #[test]
    fn test_invalid_date_is_bad_request() {
        let err = ReportFilters::from_params(FilterParams {
            start_date: Some("2023/01/01".to_string()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn test_from_pairs_keeps_repeated_slugs() {
        let filters = ReportFilters::from_pairs(vec![
            ("slug".to_string(), "SUV".to_string()),
            ("slug".to_string(), "ECO".to_string()),
            ("slug".to_string(), String::new()),
            ("start_date".to_string(), "2023-01-01".to_string()),
            ("unknown".to_string(), "ignored".to_string()),
        ])
        .unwrap();
        assert_eq!(filters.slugs, vec!["SUV", "ECO"]);
        assert_eq!(filters.start_date, Some(date("2023-01-01")));
        assert_eq!(filters.date_range(), None);
        assert_eq!(filters.slug(), Some("ECO"));
    }
}
