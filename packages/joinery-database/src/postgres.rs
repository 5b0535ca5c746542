use crate::SqlStatement;
use joinery_lib::utils::format_sql_query;
use sqlx::{pool::PoolConnection, types::JsonValue, Postgres, Row};
use tracing::debug;

pub async fn execute_query(
    conn: &mut PoolConnection<Postgres>,
    query: String,
) -> sqlx::Result<usize> {
    let mut builder = sqlx::QueryBuilder::new(query);
    let query = builder.build();
    let result = query.execute(conn).await?;
    Ok(result.rows_affected() as usize)
}

pub async fn run_query(
    conn: &mut PoolConnection<Postgres>,
    query: String,
) -> sqlx::Result<Vec<JsonValue>> {
    let mut builder = sqlx::QueryBuilder::new(query);
    let query = builder.build();
    Ok(query
        .fetch_all(conn)
        .await?
        .iter()
        .map(|r| r.get::<JsonValue, usize>(0))
        .collect())
}

/// Run a row-producing statement, returning each row as a JSON object keyed
/// by column name.
pub async fn fetch_rows(
    conn: &mut PoolConnection<Postgres>,
    statement: &SqlStatement,
) -> sqlx::Result<Vec<JsonValue>> {
    let query = statement.to_json_rows_sql();
    debug!("Running query: {}", format_sql_query(query.clone()));
    run_query(conn, query).await
}
