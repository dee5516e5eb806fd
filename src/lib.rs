//! Read-only analytics over the car-rental data warehouse.
//!
//! Reports are composed from a fixed base query plus optional filter
//! predicates (see [`query`]), post-processed by the pure functions in
//! [`kpi`], and served over HTTP by [`api`]. The two prediction endpoints
//! fit a linear trend with [`forecast`].

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod forecast;
pub mod kpi;
pub mod models;
pub mod query;
