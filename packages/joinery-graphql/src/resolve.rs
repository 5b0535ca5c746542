//! The field resolution engine.
//!
//! Every resolution composes exactly one [`SqlStatement`], hands it to the
//! configured [`DatabaseCallback`](crate::DatabaseCallback) and shapes the
//! returned rows: a plain row list for ordinary fields, a [`Connection`] for
//! paginated ones. Nested fields are resolved for a whole [`ParentBatch`] at
//! once and the rows are grouped back under each parent by key.

use crate::{
    arguments::{sql_literal, Arguments, ConnectionArguments, PagingBounds},
    connection::{connection_from_array_slice, ArraySliceMetaInfo, Connection},
    resolver::ResolverConfig,
    GraphqlError, GraphqlResult,
};
use indexmap::IndexMap;
use joinery_database::{
    JoinClause, JoineryDatabaseError, RawRow, SqlStatement, OFFSET_COLUMN,
    PARENT_KEY_COLUMN, TOTAL_COLUMN,
};
use joinery_lib::utils::format_sql_query;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

/// The value of one resolved field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Resolution {
    Rows(Vec<RawRow>),
    Connection(Connection<RawRow>),
}

impl Resolution {
    /// The rows of this resolution, in order.
    pub fn rows(&self) -> Vec<&RawRow> {
        match self {
            Resolution::Rows(rows) => rows.iter().collect(),
            Resolution::Connection(connection) => connection.nodes().collect(),
        }
    }

    pub fn rows_mut(&mut self) -> Vec<&mut RawRow> {
        match self {
            Resolution::Rows(rows) => rows.iter_mut().collect(),
            Resolution::Connection(connection) => connection
                .edges
                .iter_mut()
                .map(|edge| &mut edge.node)
                .collect(),
        }
    }

    pub fn into_rows(self) -> Vec<RawRow> {
        match self {
            Resolution::Rows(rows) => rows,
            Resolution::Connection(connection) => connection.into_nodes(),
        }
    }

    pub fn as_connection(&self) -> Option<&Connection<RawRow>> {
        match self {
            Resolution::Connection(connection) => Some(connection),
            Resolution::Rows(_) => None,
        }
    }
}

impl From<Resolution> for JsonValue {
    fn from(resolution: Resolution) -> Self {
        match resolution {
            Resolution::Rows(rows) => {
                JsonValue::Array(rows.into_iter().map(JsonValue::Object).collect())
            }
            Resolution::Connection(connection) => {
                let edges = connection
                    .edges
                    .into_iter()
                    .map(|edge| {
                        let mut object = serde_json::Map::new();
                        object.insert("node".to_string(), JsonValue::Object(edge.node));
                        object.insert("cursor".to_string(), edge.cursor.to_string().into());
                        JsonValue::Object(object)
                    })
                    .collect();

                let info = connection.page_info;
                let mut page_info = serde_json::Map::new();
                page_info.insert("hasNextPage".to_string(), info.has_next_page.into());
                page_info.insert(
                    "hasPreviousPage".to_string(),
                    info.has_previous_page.into(),
                );
                page_info.insert(
                    "startCursor".to_string(),
                    info.start_cursor.map(String::from).into(),
                );
                page_info.insert(
                    "endCursor".to_string(),
                    info.end_cursor.map(String::from).into(),
                );

                let mut object = serde_json::Map::new();
                object.insert("edges".to_string(), JsonValue::Array(edges));
                object.insert("pageInfo".to_string(), JsonValue::Object(page_info));
                JsonValue::Object(object)
            }
        }
    }
}

/// Parent rows already fetched in this request, with the column that
/// identifies each of them.
#[derive(Debug, Clone, PartialEq)]
pub struct ParentBatch {
    pub table: String,
    pub key_column: String,
    pub rows: Vec<RawRow>,
}

impl ParentBatch {
    pub fn new(
        table: impl Into<String>,
        key_column: impl Into<String>,
        rows: Vec<RawRow>,
    ) -> Self {
        Self {
            table: table.into(),
            key_column: key_column.into(),
            rows,
        }
    }

    pub fn from_resolution(
        table: impl Into<String>,
        key_column: impl Into<String>,
        resolution: &Resolution,
    ) -> Self {
        let rows = resolution.rows().into_iter().cloned().collect();
        Self::new(table, key_column, rows)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Key of one parent row.
    pub fn key_of(&self, row: &RawRow) -> GraphqlResult<String> {
        let value = row.get(&self.key_column).ok_or_else(|| {
            GraphqlError::ResolverCompositionError(format!(
                "parent row of {:?} has no {:?} column",
                self.table, self.key_column
            ))
        })?;
        normalize_key(value)
    }

    /// Distinct keys of the batch, in parent order, with their SQL literals.
    fn distinct_keys(&self) -> GraphqlResult<IndexMap<String, String>> {
        let mut keys = IndexMap::new();
        for row in &self.rows {
            let key = self.key_of(row)?;
            if !keys.contains_key(&key) {
                let literal = row
                    .get(&self.key_column)
                    .map(sql_literal)
                    .transpose()?
                    .unwrap_or_default();
                keys.insert(key, literal);
            }
        }
        Ok(keys)
    }

    /// Alias the parent relation is referred to by, distinct from the
    /// child relation when both are the same table.
    pub fn alias_for(&self, child_table: &str) -> String {
        if self.table == child_table {
            format!("{}_parent", self.table)
        } else {
            self.table.clone()
        }
    }

    /// Store each parent's resolution under `field` in its row.
    pub fn attach(
        &self,
        field: &str,
        groups: &IndexMap<String, Resolution>,
    ) -> GraphqlResult<Vec<RawRow>> {
        self.rows
            .iter()
            .map(|row| {
                let key = self.key_of(row)?;
                let resolution = groups.get(&key).cloned().ok_or_else(|| {
                    GraphqlError::ResolverCompositionError(format!(
                        "no resolution for parent {key:?} of {:?}",
                        self.table
                    ))
                })?;

                let mut row = row.clone();
                row.insert(field.to_string(), resolution.into());
                Ok(row)
            })
            .collect()
    }
}

fn normalize_key(value: &JsonValue) -> GraphqlResult<String> {
    match value {
        JsonValue::String(s) => Ok(s.clone()),
        JsonValue::Number(n) => Ok(n.to_string()),
        JsonValue::Bool(b) => Ok(b.to_string()),
        other => Err(GraphqlError::ResolverCompositionError(format!(
            "unsupported join key value: {other}"
        ))),
    }
}

/// Rows of the logical result set fetched by a paginated statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PageWindow {
    offset: usize,
    limit: Option<usize>,
    /// Requested page size when a probe row is fetched past the page.
    page_size: Option<usize>,
}

impl PageWindow {
    fn new(bounds: &PagingBounds) -> Self {
        let lower = bounds.after.map_or(0, |after| after.saturating_add(1));
        let span = bounds.before.map(|before| before.saturating_sub(lower));

        match (bounds.first, bounds.last, bounds.before) {
            (Some(first), _, _) => {
                let page_size = span.map_or(first, |span| span.min(first));
                Self {
                    offset: lower,
                    limit: Some(page_size.saturating_add(1)),
                    page_size: Some(page_size),
                }
            }
            (None, Some(last), Some(before)) => {
                let offset = lower.max(before.saturating_sub(last));
                Self {
                    offset,
                    limit: Some(before.saturating_sub(offset)),
                    page_size: None,
                }
            }
            _ => Self {
                offset: lower,
                limit: span,
                page_size: None,
            },
        }
    }

    /// Strip the probe row and work out where the rows sit in the logical
    /// result set.
    fn slice(&self, mut rows: Vec<RawRow>) -> GraphqlResult<(Vec<RawRow>, ArraySliceMetaInfo)> {
        let total = rows.first().map(total_of).transpose()?.flatten();
        let fetched = rows.len();

        let mut probed = false;
        if let Some(page_size) = self.page_size {
            if rows.len() > page_size {
                rows.truncate(page_size);
                probed = true;
            }
        }

        let array_length = match (total, self.page_size, self.limit) {
            (Some(total), _, _) => Some(total),
            (None, Some(page_size), _) if probed => {
                Some(self.offset.saturating_add(page_size).saturating_add(1))
            }
            (None, _, Some(limit)) if fetched >= limit => None,
            (None, _, _) => Some(self.offset.saturating_add(fetched)),
        };

        let rows = rows.into_iter().map(strip_internal_columns).collect();
        Ok((rows, ArraySliceMetaInfo::new(array_length, self.offset)))
    }
}

fn total_of(row: &RawRow) -> GraphqlResult<Option<usize>> {
    match row.get(TOTAL_COLUMN) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(|total| Some(total as usize))
            .ok_or_else(|| {
                GraphqlError::DataSourceError(JoineryDatabaseError::RowDecodeError(
                    format!("{TOTAL_COLUMN} is not a row count: {value}"),
                ))
            }),
    }
}

fn strip_internal_columns(mut row: RawRow) -> RawRow {
    row.retain(|column, _| {
        column != TOTAL_COLUMN && column != PARENT_KEY_COLUMN && column != OFFSET_COLUMN
    });
    row
}

/// The statement composed for one field resolution, and how to shape its rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedQuery {
    pub statement: SqlStatement,
    window: Option<PageWindow>,
    arguments: ConnectionArguments,
}

impl ComposedQuery {
    pub fn is_paginated(&self) -> bool {
        self.window.is_some()
    }

    /// Shape the rows returned for this statement.
    pub fn finish(&self, rows: Vec<RawRow>) -> GraphqlResult<Resolution> {
        match &self.window {
            None => Ok(Resolution::Rows(
                rows.into_iter().map(strip_internal_columns).collect(),
            )),
            Some(window) => {
                let (rows, meta) = window.slice(rows)?;
                connection_from_array_slice(rows, &self.arguments, meta)
                    .map(Resolution::Connection)
            }
        }
    }

    fn empty(&self) -> Resolution {
        match self.window {
            None => Resolution::Rows(Vec::new()),
            Some(_) => Resolution::Connection(Connection::empty()),
        }
    }
}

impl<C: Send + Sync> ResolverConfig<C> {
    /// Compose the statement for this field, nested under `parent` when given.
    pub fn compose(
        &self,
        args: &Arguments,
        context: &C,
        parent: Option<&ParentBatch>,
    ) -> GraphqlResult<ComposedQuery> {
        let mut statement = SqlStatement::new(self.table.clone());

        if let Some(parent) = parent {
            let join_clause = self.join_clause.as_ref().ok_or_else(|| {
                GraphqlError::ResolverCompositionError(format!(
                    "nested field on {:?} has no join clause",
                    self.table
                ))
            })?;

            let parent_alias = parent.alias_for(&self.table);
            let condition = join_clause(&parent_alias, &self.table, args, context)?;
            if condition.trim().is_empty() {
                return Err(GraphqlError::ResolverCompositionError(format!(
                    "empty join condition between {:?} and {:?}",
                    parent.table, self.table
                )));
            }

            statement.join = Some(JoinClause {
                parent_table: parent.table.clone(),
                parent_alias,
                parent_key: parent.key_column.clone(),
                condition,
                parent_keys: parent.distinct_keys()?.into_values().collect(),
            });
        }

        if let Some(where_clause) = &self.where_clause {
            if let Some(condition) = where_clause(&self.table, args, context)? {
                if condition.trim().is_empty() {
                    return Err(GraphqlError::ResolverCompositionError(format!(
                        "empty where condition on {:?}",
                        self.table
                    )));
                }
                statement.where_condition = Some(condition);
            }
        }

        statement.order_by = self.order_by.clone();

        let mut arguments = ConnectionArguments::default();
        let mut window = None;
        if self.paginate {
            arguments = ConnectionArguments::from_arguments(args)?;
            let page = PageWindow::new(&arguments.bounds()?);

            statement.limit = page.limit;
            statement.offset = Some(page.offset).filter(|offset| *offset > 0);
            statement.count_total = true;
            window = Some(page);
        }

        Ok(ComposedQuery {
            statement,
            window,
            arguments,
        })
    }

    async fn execute(
        &self,
        statement: &SqlStatement,
        context: &C,
    ) -> GraphqlResult<Vec<RawRow>> {
        debug!(
            "Resolving {}: {}",
            self.table,
            format_sql_query(statement.to_string())
        );

        self.executor
            .execute(statement, context)
            .await
            .map_err(|e| {
                warn!("Data source failed resolving {}: {e}", self.table);
                GraphqlError::from(e)
            })
    }

    /// Resolve a top-level field.
    pub async fn resolve(&self, args: &Arguments, context: &C) -> GraphqlResult<Resolution> {
        let query = self.compose(args, context, None)?;
        let rows = self.execute(&query.statement, context).await?;
        query.finish(rows)
    }

    /// Resolve a nested field for every row of `parents` with one statement,
    /// returning each distinct parent key's resolution in parent order.
    pub async fn resolve_nested(
        &self,
        args: &Arguments,
        context: &C,
        parents: &ParentBatch,
    ) -> GraphqlResult<IndexMap<String, Resolution>> {
        let query = self.compose(args, context, Some(parents))?;

        let mut groups = parents
            .distinct_keys()?
            .into_keys()
            .map(|key| (key, Vec::new()))
            .collect::<IndexMap<String, Vec<RawRow>>>();

        if groups.is_empty() {
            return Ok(IndexMap::new());
        }

        let rows = self.execute(&query.statement, context).await?;
        for row in rows {
            let key = row.get(PARENT_KEY_COLUMN).ok_or_else(|| {
                GraphqlError::ResolverCompositionError(format!(
                    "row of {:?} is missing its {PARENT_KEY_COLUMN} column",
                    self.table
                ))
            })?;
            let key = normalize_key(key)?;

            groups
                .get_mut(&key)
                .ok_or_else(|| {
                    GraphqlError::ResolverCompositionError(format!(
                        "row of {:?} belongs to unknown parent {key:?}",
                        self.table
                    ))
                })?
                .push(row);
        }

        groups
            .into_iter()
            .map(|(key, rows)| {
                let resolution = if rows.is_empty() {
                    query.empty()
                } else {
                    query.finish(rows)?
                };
                Ok((key, resolution))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::cursor::Cursor;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn row(value: JsonValue) -> RawRow {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn bounds(args: &ConnectionArguments) -> PagingBounds {
        args.bounds().unwrap()
    }

    #[test]
    fn test_forward_window_fetches_a_probe_row() {
        let args = ConnectionArguments::forward(3).after(Cursor::encode(5));
        assert_eq!(
            PageWindow::new(&bounds(&args)),
            PageWindow {
                offset: 6,
                limit: Some(4),
                page_size: Some(3),
            }
        );
    }

    #[test]
    fn test_forward_window_is_capped_by_before() {
        let args = ConnectionArguments::forward(10)
            .after(Cursor::encode(1))
            .before(Cursor::encode(5));
        assert_eq!(
            PageWindow::new(&bounds(&args)),
            PageWindow {
                offset: 2,
                limit: Some(4),
                page_size: Some(3),
            }
        );
    }

    #[test]
    fn test_backward_window() {
        let args = ConnectionArguments::backward(2).before(Cursor::encode(8));
        assert_eq!(
            PageWindow::new(&bounds(&args)),
            PageWindow {
                offset: 6,
                limit: Some(2),
                page_size: None,
            }
        );

        let unbounded = ConnectionArguments::backward(2);
        assert_eq!(
            PageWindow::new(&bounds(&unbounded)),
            PageWindow {
                offset: 0,
                limit: None,
                page_size: None,
            }
        );
    }

    #[test]
    fn test_slice_uses_total_column() {
        let window = PageWindow::new(&bounds(&ConnectionArguments::forward(2)));
        let rows = vec![
            row(json!({"id": 1, "$total": 7})),
            row(json!({"id": 2, "$total": 7})),
            row(json!({"id": 3, "$total": 7})),
        ];

        let (rows, meta) = window.slice(rows).unwrap();
        assert_eq!(rows, vec![row(json!({"id": 1})), row(json!({"id": 2}))]);
        assert_eq!(meta, ArraySliceMetaInfo::new(Some(7), 0));
    }

    #[test]
    fn test_slice_infers_length_from_probe() {
        let window = PageWindow::new(&bounds(&ConnectionArguments::forward(2)));

        let probed = vec![
            row(json!({"id": 1})),
            row(json!({"id": 2})),
            row(json!({"id": 3})),
        ];
        let (rows, meta) = window.slice(probed).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(meta.array_length, Some(3));

        let (rows, meta) = window.slice(vec![row(json!({"id": 1}))]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(meta.array_length, Some(1));
    }

    #[test]
    fn test_resolution_to_json() {
        let connection = crate::connection::connection_from_array(
            vec![row(json!({"id": 1}))],
            &ConnectionArguments::forward(1),
        )
        .unwrap();

        let json = JsonValue::from(Resolution::Connection(connection));
        assert_eq!(
            json,
            json!({
                "edges": [{"node": {"id": 1}, "cursor": Cursor::encode(0).to_string()}],
                "pageInfo": {
                    "hasNextPage": false,
                    "hasPreviousPage": false,
                    "startCursor": Cursor::encode(0).to_string(),
                    "endCursor": Cursor::encode(0).to_string(),
                }
            })
        );

        let rows = JsonValue::from(Resolution::Rows(vec![row(json!({"id": 1}))]));
        assert_eq!(rows, json!([{"id": 1}]));
    }

    #[test]
    fn test_parent_batch_keys_and_alias() {
        let batch = ParentBatch::new(
            "user_table",
            "id",
            vec![
                row(json!({"id": 2})),
                row(json!({"id": "o'neil"})),
                row(json!({"id": 2})),
            ],
        );

        let keys = batch.distinct_keys().unwrap();
        assert_eq!(
            keys.into_iter().collect::<Vec<(String, String)>>(),
            vec![
                ("2".to_string(), "2".to_string()),
                ("o'neil".to_string(), "'o''neil'".to_string()),
            ]
        );
        assert_eq!(batch.alias_for("user_table"), "user_table_parent");
        assert_eq!(batch.alias_for("user_address_table"), "user_table");
    }

    #[test]
    fn test_parent_without_key_is_rejected() {
        let batch = ParentBatch::new("user_table", "id", vec![row(json!({"name": "hoge"}))]);
        assert_matches!(
            batch.distinct_keys(),
            Err(GraphqlError::ResolverCompositionError(_))
        );
    }
}
