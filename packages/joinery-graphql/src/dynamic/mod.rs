//! `async_graphql::dynamic` adapter: fields backed by a [`ResolverConfig`]
//! and the Relay object types their connections resolve into.
//!
//! [`ResolverConfig`]: crate::resolver::ResolverConfig

pub mod connection;
pub mod field;
pub mod paging;

pub(self) mod self_prelude {
    pub use async_graphql::dynamic::*;
    pub use extension_trait::extension_trait;
}

pub use connection::*;
pub use field::*;
pub use paging::*;
