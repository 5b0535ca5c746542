use crate::{arguments::Arguments, GraphqlError, GraphqlResult};
use joinery_database::{DatabaseCallback, OrderColumn};
use std::{fmt, sync::Arc};

/// Produces the condition correlating a parent relation with a child
/// relation: `(parent_table, child_table, arguments, context)`.
pub type JoinFn<C> =
    Arc<dyn Fn(&str, &str, &Arguments, &C) -> GraphqlResult<String> + Send + Sync>;

/// Produces an optional filter on a relation: `(table, arguments, context)`.
pub type WhereFn<C> =
    Arc<dyn Fn(&str, &Arguments, &C) -> GraphqlResult<Option<String>> + Send + Sync>;

/// How to resolve one field. Immutable once built and shared freely
/// between concurrent resolutions.
pub struct ResolverConfig<C: Send + Sync> {
    pub(crate) table: String,
    pub(crate) join_clause: Option<JoinFn<C>>,
    pub(crate) where_clause: Option<WhereFn<C>>,
    pub(crate) order_by: Vec<OrderColumn>,
    pub(crate) paginate: bool,
    pub(crate) executor: Arc<dyn DatabaseCallback<C>>,
}

impl<C: Send + Sync> ResolverConfig<C> {
    pub fn builder() -> ResolverConfigBuilder<C> {
        ResolverConfigBuilder::default()
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn order_by(&self) -> &[OrderColumn] {
        &self.order_by
    }

    pub fn paginate(&self) -> bool {
        self.paginate
    }

    pub fn has_join_clause(&self) -> bool {
        self.join_clause.is_some()
    }
}

impl<C: Send + Sync> Clone for ResolverConfig<C> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            join_clause: self.join_clause.clone(),
            where_clause: self.where_clause.clone(),
            order_by: self.order_by.clone(),
            paginate: self.paginate,
            executor: self.executor.clone(),
        }
    }
}

impl<C: Send + Sync> fmt::Debug for ResolverConfig<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverConfig")
            .field("table", &self.table)
            .field("join_clause", &self.join_clause.is_some())
            .field("where_clause", &self.where_clause.is_some())
            .field("order_by", &self.order_by)
            .field("paginate", &self.paginate)
            .finish()
    }
}

pub struct ResolverConfigBuilder<C: Send + Sync> {
    table: Option<String>,
    join_clause: Option<JoinFn<C>>,
    where_clause: Option<WhereFn<C>>,
    order_by: Vec<OrderColumn>,
    paginate: bool,
    executor: Option<Arc<dyn DatabaseCallback<C>>>,
}

impl<C: Send + Sync> Default for ResolverConfigBuilder<C> {
    fn default() -> Self {
        Self {
            table: None,
            join_clause: None,
            where_clause: None,
            order_by: Vec::new(),
            paginate: false,
            executor: None,
        }
    }
}

impl<C: Send + Sync> ResolverConfigBuilder<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn join_clause<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str, &Arguments, &C) -> GraphqlResult<String> + Send + Sync + 'static,
    {
        self.join_clause = Some(Arc::new(f));
        self
    }

    pub fn where_clause<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &Arguments, &C) -> GraphqlResult<Option<String>>
            + Send
            + Sync
            + 'static,
    {
        self.where_clause = Some(Arc::new(f));
        self
    }

    /// Append a column to the ordering.
    pub fn order_by(mut self, column: OrderColumn) -> Self {
        self.order_by.push(column);
        self
    }

    pub fn paginate(mut self, paginate: bool) -> Self {
        self.paginate = paginate;
        self
    }

    pub fn executor(mut self, executor: impl DatabaseCallback<C> + 'static) -> Self {
        self.executor = Some(Arc::new(executor));
        self
    }

    /// Share an executor between several resolver configurations.
    pub fn shared_executor(mut self, executor: Arc<dyn DatabaseCallback<C>>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn build(self) -> GraphqlResult<ResolverConfig<C>> {
        let table = self
            .table
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                GraphqlError::InvalidResolverConfig("table is required".to_string())
            })?;

        if self.paginate && self.order_by.is_empty() {
            return Err(GraphqlError::InvalidResolverConfig(format!(
                "paginated field on {table:?} must be ordered by at least one column"
            )));
        }

        if let Some(column) = self.order_by.iter().find(|o| o.column.trim().is_empty()) {
            return Err(GraphqlError::InvalidResolverConfig(format!(
                "empty order column on {table:?}: {column:?}"
            )));
        }

        let executor = self.executor.ok_or_else(|| {
            GraphqlError::InvalidResolverConfig(format!(
                "field on {table:?} has no executor"
            ))
        })?;

        Ok(ResolverConfig {
            table,
            join_clause: self.join_clause,
            where_clause: self.where_clause,
            order_by: self.order_by,
            paginate: self.paginate,
            executor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use joinery_database::{JoineryDatabaseError, RawRow, SqlStatement};

    struct NoRows;

    #[async_trait::async_trait]
    impl DatabaseCallback<()> for NoRows {
        async fn execute(
            &self,
            _statement: &SqlStatement,
            _context: &(),
        ) -> Result<Vec<RawRow>, JoineryDatabaseError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_build_valid_config() {
        let config = ResolverConfig::<()>::builder()
            .table("user_table")
            .paginate(true)
            .order_by(OrderColumn::new("id"))
            .join_clause(|parent, child, _, _| Ok(format!("{parent}.id = {child}.user_id")))
            .where_clause(|table, args, _| {
                Ok(args.int_value("id")?.map(|id| format!("{table}.id = {id}")))
            })
            .executor(NoRows)
            .build()
            .unwrap();

        assert_eq!(config.table(), "user_table");
        assert!(config.paginate());
        assert!(config.has_join_clause());
        assert_eq!(config.order_by(), &[OrderColumn::new("id")]);
    }

    #[test]
    fn test_build_requires_table() {
        let missing = ResolverConfig::<()>::builder().executor(NoRows).build();
        let blank = ResolverConfig::<()>::builder()
            .table("  ")
            .executor(NoRows)
            .build();

        assert_matches!(missing, Err(GraphqlError::InvalidResolverConfig(_)));
        assert_matches!(blank, Err(GraphqlError::InvalidResolverConfig(_)));
    }

    #[test]
    fn test_build_rejects_unordered_pagination() {
        let config = ResolverConfig::<()>::builder()
            .table("user_table")
            .paginate(true)
            .executor(NoRows)
            .build();

        assert_matches!(config, Err(GraphqlError::InvalidResolverConfig(_)));
    }

    #[test]
    fn test_build_requires_executor() {
        let config = ResolverConfig::<()>::builder().table("user_table").build();

        assert_matches!(config, Err(GraphqlError::InvalidResolverConfig(_)));
    }
}
