//! Structured description of the single statement issued for a field resolution.
//!
//! A `SqlStatement` is what the resolution engine hands to a
//! [`DatabaseCallback`](crate::DatabaseCallback). Callbacks may use the
//! structured parts directly, or render the statement into Postgres SQL
//! text through its `Display` implementation.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Column carrying the size of the logical result set (or of one parent's
/// partition, for nested statements).
pub const TOTAL_COLUMN: &str = "$total";

/// Column carrying the join key of the parent row a child row belongs to.
pub const PARENT_KEY_COLUMN: &str = "$parent_key";

/// Column carrying the offset of a child row within its parent's partition.
pub const OFFSET_COLUMN: &str = "$offset";

/// Ordering direction for a single column.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    #[default]
    #[strum(serialize = "ASC")]
    Asc,
    #[strum(serialize = "DESC")]
    Desc,
}

/// A column of an `ORDER BY` clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderColumn {
    pub column: String,
    #[serde(default)]
    pub direction: OrderDirection,
}

impl OrderColumn {
    /// Order by `column`, ascending.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: OrderDirection::Asc,
        }
    }

    pub fn asc(column: impl Into<String>) -> Self {
        Self::new(column)
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: OrderDirection::Desc,
        }
    }

    /// Render the column against a table, leaving already-qualified
    /// columns untouched.
    pub fn to_sql(&self, table: &str) -> String {
        if self.column.contains('.') {
            format!("{} {}", self.column, self.direction.as_ref())
        } else {
            format!("{table}.{} {}", self.column, self.direction.as_ref())
        }
    }
}

/// Correlation between a child relation and the batch of parent rows it is
/// being fetched for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinClause {
    /// Parent relation.
    pub parent_table: String,

    /// Name the parent relation is referred to by in `condition`.
    pub parent_alias: String,

    /// Parent column identifying a parent row.
    pub parent_key: String,

    /// Boolean condition correlating parent and child.
    pub condition: String,

    /// SQL literals of the parent keys in this batch.
    pub parent_keys: Vec<String>,
}

impl JoinClause {
    fn qualified_key(&self) -> String {
        format!("{}.{}", self.parent_alias, self.parent_key)
    }

    fn from_fragment(&self) -> String {
        if self.parent_alias == self.parent_table {
            format!("INNER JOIN {} ON {}", self.parent_table, self.condition)
        } else {
            format!(
                "INNER JOIN {} AS {} ON {}",
                self.parent_table, self.parent_alias, self.condition
            )
        }
    }
}

/// The composed statement for one field resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlStatement {
    /// Source relation of the field.
    pub table: String,

    /// Present when the field is resolved for a batch of parent rows.
    pub join: Option<JoinClause>,

    /// Filter contributed by the field's where function.
    pub where_condition: Option<String>,

    pub order_by: Vec<OrderColumn>,

    /// Maximum number of rows (per parent, for nested statements).
    pub limit: Option<usize>,

    /// Number of leading rows to skip (per parent, for nested statements).
    pub offset: Option<usize>,

    /// Whether to select the size of the result set alongside each row.
    pub count_total: bool,
}

impl SqlStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            join: None,
            where_condition: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
            count_total: false,
        }
    }

    /// Render the statement so that each row comes back as a single JSON
    /// object, in the statement's order.
    pub fn to_json_rows_sql(&self) -> String {
        let mut sql = format!("SELECT row_to_json(\"$row\")\nFROM (\n{self}\n) AS \"$row\"");
        let ordering = self.result_ordering();
        if !ordering.is_empty() {
            sql.push_str(&format!("\nORDER BY {}", ordering.join(", ")));
        }
        sql
    }

    fn is_windowed(&self) -> bool {
        self.join.is_some()
            && self.count_total
            && (self.limit.is_some() || self.offset.is_some())
    }

    /// Ordering restated over the output columns of the rendered statement.
    /// A subquery's `ORDER BY` does not carry over to the query selecting
    /// from it.
    fn result_ordering(&self) -> Vec<String> {
        let internal = |column: &str| format!("\"$row\".\"{column}\"");

        if self.is_windowed() {
            return vec![internal(PARENT_KEY_COLUMN), internal(OFFSET_COLUMN)];
        }

        let mut ordering = Vec::new();
        if self.join.is_some() {
            ordering.push(internal(PARENT_KEY_COLUMN));
        }
        ordering.extend(self.order_by.iter().map(|o| {
            let column = o.column.rsplit('.').next().unwrap_or(&o.column);
            format!("\"$row\".{column} {}", o.direction.as_ref())
        }));
        ordering
    }

    fn ordering(&self) -> String {
        self.order_by
            .iter()
            .map(|o| o.to_sql(&self.table))
            .collect::<Vec<String>>()
            .join(", ")
    }

    fn top_level_fragments(&self) -> Vec<String> {
        let mut fragments = vec![];

        if self.count_total {
            fragments.push(format!(
                "SELECT {}.*, COUNT(*) OVER () AS \"{TOTAL_COLUMN}\"",
                self.table
            ));
        } else {
            fragments.push(format!("SELECT {}.*", self.table));
        }
        fragments.push(format!("FROM {}", self.table));

        if let Some(condition) = &self.where_condition {
            fragments.push(format!("WHERE {condition}"));
        }
        if !self.order_by.is_empty() {
            fragments.push(format!("ORDER BY {}", self.ordering()));
        }
        if let Some(limit) = self.limit {
            fragments.push(format!("LIMIT {}", bigint(limit)));
        }
        if let Some(offset) = self.offset {
            fragments.push(format!("OFFSET {}", bigint(offset)));
        }

        fragments
    }

    fn nested_fragments(&self, join: &JoinClause) -> Vec<String> {
        let key = join.qualified_key();
        let windowed = self.is_windowed();

        let mut selection = format!(
            "SELECT {}.*, {key} AS \"{PARENT_KEY_COLUMN}\"",
            self.table
        );
        if self.count_total {
            let partition_order = if self.order_by.is_empty() {
                String::new()
            } else {
                format!(" ORDER BY {}", self.ordering())
            };
            selection.push_str(&format!(
                ", COUNT(*) OVER (PARTITION BY {key}) AS \"{TOTAL_COLUMN}\", ROW_NUMBER() OVER (PARTITION BY {key}{partition_order}) - 1 AS \"{OFFSET_COLUMN}\""
            ));
        }

        let mut inner = vec![
            selection,
            format!("FROM {}", self.table),
            join.from_fragment(),
            format!("WHERE {key} IN ({})", join.parent_keys.join(", ")),
        ];
        if let Some(condition) = &self.where_condition {
            inner.push(format!("AND ({condition})"));
        }

        if !windowed {
            if self.order_by.is_empty() {
                inner.push(format!("ORDER BY {key}"));
            } else {
                inner.push(format!("ORDER BY {key}, {}", self.ordering()));
            }
            return inner;
        }

        // Per-parent pagination cannot use LIMIT/OFFSET directly, so the
        // window is applied on each row's offset within its partition.
        let offset = self.offset.unwrap_or(0);
        let mut bounds = format!("WHERE \"{OFFSET_COLUMN}\" >= {}", bigint(offset));
        if let Some(limit) = self.limit {
            bounds.push_str(&format!(
                " AND \"{OFFSET_COLUMN}\" < {}",
                bigint(offset.saturating_add(limit))
            ));
        }

        vec![
            "SELECT * FROM (".to_string(),
            inner.join("\n"),
            ") AS \"$window\"".to_string(),
            bounds,
            format!("ORDER BY \"{PARENT_KEY_COLUMN}\", \"{OFFSET_COLUMN}\""),
        ]
    }
}

/// Row counts are `BIGINT` in Postgres.
fn bigint(count: usize) -> usize {
    count.min(i64::MAX as usize)
}

impl std::fmt::Display for SqlStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fragments = match &self.join {
            Some(join) => self.nested_fragments(join),
            None => self.top_level_fragments(),
        };

        write!(f, "{}", fragments.join("\n"))
    }
}
