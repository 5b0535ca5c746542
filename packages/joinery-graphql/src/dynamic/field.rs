//! Fields resolved through a [`ResolverConfig`], and plain column fields
//! that read their value off the resolved row.
//!
//! A top-level field resolves its rows and then, looking ahead at the
//! selection set, loads every selected nested field for all of those rows
//! with one statement per field. The loaded values are stored on each
//! parent row under `$` followed by the field's response key, where the
//! nested field reads them back.

use super::self_prelude::*;
use crate::{
    arguments::Arguments,
    resolve::{ParentBatch, Resolution},
    resolver::ResolverConfig,
    GraphqlError, GraphqlResult,
};
use async_graphql::{Error, SelectionField, Value};
use indexmap::IndexMap;
use joinery_database::RawRow;
use serde_json::{Map, Value as JsonValue};
use std::{future::Future, pin::Pin, sync::Arc};

/// Marks a nested value whose load failed.
const ERROR_COLUMN: &str = "$error";

/// A resolver together with the nested resolvers selectable under its rows.
pub struct FieldResolver<C: Send + Sync> {
    config: Arc<ResolverConfig<C>>,
    nested: IndexMap<String, NestedResolver<C>>,
}

struct NestedResolver<C: Send + Sync> {
    resolver: FieldResolver<C>,
    key_column: String,
    single: bool,
}

impl<C: Send + Sync + 'static> FieldResolver<C> {
    pub fn new(config: impl Into<Arc<ResolverConfig<C>>>) -> Self {
        Self {
            config: config.into(),
            nested: IndexMap::new(),
        }
    }

    /// Resolve the field `name` of each row through `resolver`, correlated
    /// through the row's `key_column`.
    pub fn nested(
        self,
        name: impl Into<String>,
        key_column: impl Into<String>,
        resolver: FieldResolver<C>,
    ) -> Self {
        self.with_nested(name.into(), key_column.into(), resolver, false)
    }

    /// Like `nested`, resolving to the first matching row only.
    pub fn nested_row(
        self,
        name: impl Into<String>,
        key_column: impl Into<String>,
        resolver: FieldResolver<C>,
    ) -> Self {
        self.with_nested(name.into(), key_column.into(), resolver, true)
    }

    fn with_nested(
        mut self,
        name: String,
        key_column: String,
        resolver: FieldResolver<C>,
        single: bool,
    ) -> Self {
        self.nested.insert(
            name,
            NestedResolver {
                resolver,
                key_column,
                single,
            },
        );
        self
    }

    async fn load(&self, field: SelectionField<'_>, context: &C) -> GraphqlResult<Resolution> {
        let args = selection_arguments(&field)?;
        let mut resolution = self.config.resolve(&args, context).await?;

        let nodes = node_selections(&[field], self.config.paginate());
        self.load_nested(nodes, resolution.rows_mut(), context).await;

        Ok(resolution)
    }

    /// Load the nested fields selected on `nodes` for all of `rows`.
    fn load_nested<'a>(
        &'a self,
        nodes: Vec<SelectionField<'a>>,
        mut rows: Vec<&'a mut RawRow>,
        context: &'a C,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            if rows.is_empty() {
                return;
            }

            for (key, (nested, occurrences)) in self.selected_nested(&nodes) {
                let column = format!("${key}");
                match nested
                    .load(self.config.table(), &occurrences, &rows, context)
                    .await
                {
                    Ok(values) => {
                        for (row, value) in rows.iter_mut().zip(values) {
                            row.insert(column.clone(), value);
                        }
                    }
                    Err(e) => {
                        let marker = error_marker(&e);
                        for row in rows.iter_mut() {
                            row.insert(column.clone(), marker.clone());
                        }
                    }
                }
            }
        })
    }

    /// Nested fields selected on `nodes`, grouped by response key.
    fn selected_nested<'a>(
        &'a self,
        nodes: &[SelectionField<'a>],
    ) -> IndexMap<&'a str, (&'a NestedResolver<C>, Vec<SelectionField<'a>>)> {
        let mut selected = IndexMap::new();
        for field in nodes.iter().flat_map(|node| node.selection_set()) {
            if let Some(nested) = self.nested.get(field.name()) {
                selected
                    .entry(response_key(&field))
                    .or_insert_with(|| (nested, Vec::new()))
                    .1
                    .push(field);
            }
        }
        selected
    }
}

impl<C: Send + Sync + 'static> NestedResolver<C> {
    /// Resolve this field for every parent row at once, returning the value
    /// of each parent in order.
    async fn load(
        &self,
        parent_table: &str,
        occurrences: &[SelectionField<'_>],
        parents: &[&mut RawRow],
        context: &C,
    ) -> GraphqlResult<Vec<JsonValue>> {
        let args = match occurrences.first() {
            Some(field) => selection_arguments(field)?,
            None => return Ok(Vec::new()),
        };

        let batch = ParentBatch::new(
            parent_table,
            &self.key_column,
            parents.iter().map(|row| (**row).clone()).collect(),
        );
        let config = &self.resolver.config;
        let mut groups = config.resolve_nested(&args, context, &batch).await?;

        let nodes = node_selections(occurrences, config.paginate());
        let children = groups
            .values_mut()
            .flat_map(|resolution| resolution.rows_mut())
            .collect();
        self.resolver.load_nested(nodes, children, context).await;

        batch
            .rows
            .iter()
            .map(|row| {
                let value = match groups.get(&batch.key_of(row)?) {
                    Some(resolution) if self.single => resolution
                        .rows()
                        .first()
                        .map_or(JsonValue::Null, |row| JsonValue::Object((*row).clone())),
                    Some(resolution) => resolution.clone().into(),
                    None => JsonValue::Null,
                };
                Ok(value)
            })
            .collect()
    }
}

fn selection_arguments(field: &SelectionField<'_>) -> GraphqlResult<Arguments> {
    let arguments = field
        .arguments()
        .map_err(|e| GraphqlError::ArgumentCoercionError(e.message))?;
    Ok(arguments.into_iter().collect())
}

fn response_key<'a>(field: &SelectionField<'a>) -> &'a str {
    field.alias().unwrap_or_else(|| field.name())
}

/// Selections of the row objects under `fields`: the fields themselves for
/// row lists, `edges { node }` for connections.
fn node_selections<'a>(fields: &[SelectionField<'a>], paginated: bool) -> Vec<SelectionField<'a>> {
    if !paginated {
        return fields.to_vec();
    }

    fields
        .iter()
        .flat_map(|field| field.selection_set())
        .filter(|edges| edges.name() == "edges")
        .flat_map(|edges| edges.selection_set())
        .filter(|node| node.name() == "node")
        .collect()
}

fn error_marker(error: &GraphqlError) -> JsonValue {
    let mut marker = Map::new();
    marker.insert(ERROR_COLUMN.to_string(), error.to_string().into());
    JsonValue::Object(marker)
}

fn is_nullable(ty: &TypeRef) -> bool {
    !ty.to_string().ends_with('!')
}

/// Null out a failed nullable field, recording its error on the response.
/// Non-null fields propagate the error to their parent.
fn isolate<'a>(
    ctx: &ResolverContext<'_>,
    nullable: bool,
    result: async_graphql::Result<Option<FieldValue<'a>>>,
) -> async_graphql::Result<Option<FieldValue<'a>>> {
    match result {
        Err(e) if nullable => {
            ctx.add_error(ctx.set_error_path(e.into_server_error(ctx.item.pos)));
            Ok(None)
        }
        other => other,
    }
}

/// Convert a resolved value into a field value, spreading lists so that
/// object items resolve against their own fields.
pub fn into_field_value(value: Value) -> Option<FieldValue<'static>> {
    match value {
        Value::Null => None,
        Value::List(items) => Some(FieldValue::list(
            items
                .into_iter()
                .map(|item| into_field_value(item).unwrap_or(FieldValue::NULL)),
        )),
        other => Some(FieldValue::value(other)),
    }
}

async fn resolve_root<C: Send + Sync + 'static>(
    ctx: &ResolverContext<'_>,
    resolver: &FieldResolver<C>,
) -> async_graphql::Result<Option<FieldValue<'static>>> {
    let context = ctx.data::<C>()?;
    let resolution = resolver.load(ctx.field(), context).await?;
    let value = Value::from_json(resolution.into())?;
    Ok(into_field_value(value))
}

fn loaded_value(ctx: &ResolverContext<'_>) -> async_graphql::Result<Option<FieldValue<'static>>> {
    let field = ctx.field();
    let key = response_key(&field);
    let value = match ctx.parent_value.as_value() {
        Some(Value::Object(row)) => row.get(format!("${key}").as_str()).cloned(),
        _ => None,
    };

    match value {
        Some(Value::Object(marker)) if marker.contains_key(ERROR_COLUMN) => {
            match marker.get(ERROR_COLUMN) {
                Some(Value::String(message)) => Err(Error::new(message.clone())),
                _ => Err(Error::new(format!("{key:?} failed to load"))),
            }
        }
        Some(value) => Ok(into_field_value(value)),
        None => Err(Error::new(format!(
            "{key:?} was not loaded with its parent row"
        ))),
    }
}

#[extension_trait]
pub impl ResolverField for Field {
    /// A top-level field resolved by `resolver`, along with the nested fields
    /// selected under it.
    fn resolver<C: Send + Sync + 'static>(
        name: impl Into<String>,
        ty: impl Into<TypeRef>,
        resolver: Arc<FieldResolver<C>>,
    ) -> Self {
        let ty = ty.into();
        let nullable = is_nullable(&ty);
        Field::new(name, ty, move |ctx| {
            let resolver = resolver.clone();
            FieldFuture::new(async move {
                let result = resolve_root(&ctx, &resolver).await;
                isolate(&ctx, nullable, result)
            })
        })
    }

    /// A field registered with [`FieldResolver::nested`] or
    /// [`FieldResolver::nested_row`] on the resolver of its parent rows.
    fn nested(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        let ty = ty.into();
        let nullable = is_nullable(&ty);
        Field::new(name, ty, move |ctx| {
            FieldFuture::new(async move {
                let result = loaded_value(&ctx);
                isolate(&ctx, nullable, result)
            })
        })
    }

    /// A field reading the same-named column of its parent row.
    fn column(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        Field::new(name, ty, |ctx| {
            FieldFuture::new(async move {
                let value = match ctx.parent_value.as_value() {
                    Some(Value::Object(object)) => object.get(ctx.field().name()).cloned(),
                    _ => None,
                };
                Ok(value.and_then(into_field_value))
            })
        })
    }
}
