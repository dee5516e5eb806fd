use anyhow::Result;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::DatabaseArgs;

pub type DbPool = PgPool;

/// Open a connection pool to the warehouse.
///
/// Reports hold one pooled connection for the lifetime of a request.
pub async fn connect(args: &DatabaseArgs) -> Result<DbPool> {
    let pool = pool_options(args).connect(&args.database_url).await?;
    Ok(pool)
}

/// Build a pool without opening a connection until the first query.
pub fn connect_lazy(args: &DatabaseArgs) -> Result<DbPool> {
    let pool = pool_options(args).connect_lazy(&args.database_url)?;
    Ok(pool)
}

fn pool_options(args: &DatabaseArgs) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(Duration::from_secs(args.acquire_timeout_secs))
}
