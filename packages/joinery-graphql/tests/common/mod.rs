#![allow(dead_code)]

use async_trait::async_trait;
use joinery_graphql::{DatabaseCallback, JoineryDatabaseError, RawRow, SqlStatement};
use serde_json::Value as JsonValue;
use std::{collections::HashMap, sync::Mutex};

/// Request-scoped context handed to every resolution.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub tenant_id: i64,
}

/// In-memory tables that answer composed statements and record them.
///
/// Rows are returned in stored order; join and where conditions are not
/// evaluated. Child rows carry their parent's key in a `$parent_key` column,
/// and windows and totals are applied the way the rendered SQL would.
#[derive(Default)]
pub struct Fixture {
    tables: HashMap<String, Vec<RawRow>>,
    without_totals: bool,
    failing: bool,
    statements: Mutex<Vec<SqlStatement>>,
}

pub fn row(value: JsonValue) -> RawRow {
    match value {
        JsonValue::Object(map) => map,
        other => panic!("fixture rows must be objects, got {other}"),
    }
}

impl Fixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, name: &str, rows: Vec<JsonValue>) -> Self {
        self.tables
            .insert(name.to_string(), rows.into_iter().map(row).collect());
        self
    }

    /// Behave like a data source that ignores requests for row counts.
    pub fn without_totals(mut self) -> Self {
        self.without_totals = true;
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn statements(&self) -> Vec<SqlStatement> {
        self.statements.lock().unwrap().clone()
    }

    fn window(&self, rows: Vec<RawRow>, statement: &SqlStatement) -> Vec<RawRow> {
        let total = rows.len();
        let nested = statement.join.is_some();

        rows.into_iter()
            .enumerate()
            .skip(statement.offset.unwrap_or(0))
            .take(statement.limit.unwrap_or(usize::MAX))
            .map(|(offset, mut row)| {
                if statement.count_total && !self.without_totals {
                    row.insert("$total".to_string(), total.into());
                    if nested {
                        row.insert("$offset".to_string(), offset.into());
                    }
                }
                row
            })
            .collect()
    }
}

#[async_trait]
impl<C> DatabaseCallback<C> for Fixture
where
    C: Send + Sync,
{
    async fn execute(
        &self,
        statement: &SqlStatement,
        _context: &C,
    ) -> Result<Vec<RawRow>, JoineryDatabaseError> {
        self.statements.lock().unwrap().push(statement.clone());

        if self.failing {
            return Err(JoineryDatabaseError::InvalidConnectionString(
                "postgres://unreachable".to_string(),
            ));
        }

        let rows = self.tables.get(&statement.table).cloned().unwrap_or_default();

        match &statement.join {
            None => Ok(self.window(rows, statement)),
            Some(join) => Ok(join
                .parent_keys
                .iter()
                .flat_map(|key| {
                    let group = rows
                        .iter()
                        .filter(|row| {
                            row.get("$parent_key").map(|k| k.to_string()).as_ref()
                                == Some(key)
                        })
                        .cloned()
                        .collect();
                    self.window(group, statement)
                })
                .collect()),
        }
    }
}
