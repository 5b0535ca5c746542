//! Resolve GraphQL fields into SQL statements and reassemble the rows into
//! the requested shape, with Relay cursor pagination.

pub mod arguments;
pub mod connection;
pub mod cursor;
pub mod dynamic;
pub mod resolve;
pub mod resolver;

pub use arguments::{Arguments, ConnectionArguments, PagingBounds};
pub use connection::{
    connection_from_array, connection_from_array_slice, ArraySliceMetaInfo, Connection,
    Edge, PageInfo,
};
pub use cursor::Cursor;
pub use joinery_database::{
    DatabaseCallback, JoineryDatabaseError, OrderColumn, OrderDirection, RawRow,
    SqlStatement,
};
pub use resolve::{ComposedQuery, ParentBatch, Resolution};
pub use resolver::{ResolverConfig, ResolverConfigBuilder};

use thiserror::Error;

pub type GraphqlResult<T> = Result<T, GraphqlError>;

#[derive(Debug, Error)]
pub enum GraphqlError {
    #[error("Invalid resolver configuration: {0}")]
    InvalidResolverConfig(String),
    #[error("Argument coercion failed: {0}")]
    ArgumentCoercionError(String),
    #[error("Could not compose query: {0}")]
    ResolverCompositionError(String),
    #[error("Malformed cursor: {0:?}")]
    MalformedCursor(String),
    #[error("Invalid pagination argument: {0}")]
    InvalidPaginationArgument(String),
    #[error("Data source error: {0}")]
    DataSourceError(#[from] JoineryDatabaseError),
    #[error("Error building dynamic schema: {0:?}")]
    DynamicSchemaBuildError(#[from] async_graphql::dynamic::SchemaError),
}
