#![deny(unused_crate_dependencies)]

use async_trait::async_trait;
use joinery_lib::{
    config::DatabaseConfig,
    utils::{attempt_database_connection, ServiceStatus},
};
use serde_json::Value as JsonValue;
use sqlx::{pool::PoolConnection, postgres::PgConnectOptions, Error as SqlxError};
use std::{cmp::Ordering, str::FromStr};
use thiserror::Error;
use tracing::info;

pub mod postgres;
pub mod statement;

pub use statement::{
    JoinClause, OrderColumn, OrderDirection, SqlStatement, OFFSET_COLUMN,
    PARENT_KEY_COLUMN, TOTAL_COLUMN,
};

/// A single result row, keyed by column name in selection order.
pub type RawRow = serde_json::Map<String, JsonValue>;

#[derive(Debug, Error)]
pub enum JoineryDatabaseError {
    #[error("Invalid connection string: {0:?}")]
    InvalidConnectionString(String),
    #[error("Database backend not supported: {0:?}")]
    BackendNotSupported(String),
    #[error("Error from sqlx: {0:#?}")]
    SqlxError(#[from] SqlxError),
    #[error("Row could not be decoded into a column map: {0}")]
    RowDecodeError(String),
}

/// Executes a composed statement on behalf of a field resolution.
///
/// `C` is the caller-supplied request context, passed through untouched.
/// Implementations return the rows in the order the statement produced them,
/// including the internal `$`-prefixed columns it selects.
#[async_trait]
pub trait DatabaseCallback<C>: Send + Sync
where
    C: Send + Sync,
{
    async fn execute(
        &self,
        statement: &SqlStatement,
        context: &C,
    ) -> Result<Vec<RawRow>, JoineryDatabaseError>;
}

#[derive(Debug)]
pub enum JoineryConnection {
    Postgres(Box<PoolConnection<sqlx::Postgres>>),
}

#[derive(Clone, Debug)]
pub enum JoineryConnectionPool {
    Postgres(sqlx::Pool<sqlx::Postgres>),
}

impl JoineryConnectionPool {
    pub async fn connect(
        database_url: &str,
    ) -> Result<JoineryConnectionPool, JoineryDatabaseError> {
        let url = url::Url::parse(database_url).map_err(|_| {
            JoineryDatabaseError::InvalidConnectionString(database_url.into())
        })?;

        match url.scheme() {
            "postgres" => {
                let options = PgConnectOptions::from_str(database_url)?;
                let pool = attempt_database_connection(|| {
                    sqlx::postgres::PgPoolOptions::new().connect_with(options.clone())
                })
                .await?;
                info!("Connected to Postgres database.");

                Ok(JoineryConnectionPool::Postgres(pool))
            }
            err => Err(JoineryDatabaseError::BackendNotSupported(err.into())),
        }
    }

    pub async fn from_config(
        config: &DatabaseConfig,
    ) -> Result<JoineryConnectionPool, JoineryDatabaseError> {
        Self::connect(&config.to_string()).await
    }

    pub async fn is_connected(&self) -> sqlx::Result<ServiceStatus> {
        match self.acquire().await? {
            JoineryConnection::Postgres(mut conn) => {
                let result =
                    postgres::execute_query(&mut conn, "SELECT true;".to_string())
                        .await?;

                match result.cmp(&1) {
                    Ordering::Equal => Ok(ServiceStatus::OK),
                    _ => Ok(ServiceStatus::NotOk),
                }
            }
        }
    }

    pub async fn acquire(&self) -> sqlx::Result<JoineryConnection> {
        match self {
            JoineryConnectionPool::Postgres(p) => {
                Ok(JoineryConnection::Postgres(Box::new(p.acquire().await?)))
            }
        }
    }
}

/// Convert a JSON object produced by the database into a row.
pub fn into_raw_row(value: JsonValue) -> Result<RawRow, JoineryDatabaseError> {
    match value {
        JsonValue::Object(map) => Ok(map),
        other => Err(JoineryDatabaseError::RowDecodeError(other.to_string())),
    }
}

#[async_trait]
impl<C> DatabaseCallback<C> for JoineryConnectionPool
where
    C: Send + Sync,
{
    async fn execute(
        &self,
        statement: &SqlStatement,
        _context: &C,
    ) -> Result<Vec<RawRow>, JoineryDatabaseError> {
        match self.acquire().await? {
            JoineryConnection::Postgres(mut conn) => {
                postgres::fetch_rows(&mut conn, statement)
                    .await?
                    .into_iter()
                    .map(into_raw_row)
                    .collect()
            }
        }
    }
}
