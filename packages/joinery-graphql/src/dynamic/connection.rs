//! `async_graphql::dynamic` extensions for handling GraphQL connections.
//! See: https://relay.dev/graphql/connections.htm#sec-Connection-Types

use super::field::*;
use super::paging::*;
use super::self_prelude::*;

#[extension_trait]
pub impl ConnectionTypeRef for TypeRef {
    fn connection(node_name: impl Into<String>) -> String {
        format!("{}Connection", node_name.into())
    }
    fn connection_edge(node_name: impl Into<String>) -> String {
        format!("{}Edge", node_name.into())
    }
}

#[extension_trait]
pub impl ConnectionObject for Object {
    fn new_connection(node_name: impl Into<String>) -> Self {
        let node_name = node_name.into();
        Self::new(TypeRef::connection(&node_name))
            .field(Field::column(
                "edges",
                TypeRef::named_nn_list_nn(TypeRef::connection_edge(&node_name)),
            ))
            .field(Field::column(
                "pageInfo",
                TypeRef::named_nn(TypeRef::PAGE_INFO),
            ))
    }
}

#[extension_trait]
pub impl ConnectionEdgeObject for Object {
    fn new_connection_edge(node_name: impl Into<String>) -> Self {
        let node_name = node_name.into();
        Self::new(TypeRef::connection_edge(&node_name))
            .field(Field::column("node", TypeRef::named_nn(node_name)))
            .field(Field::column("cursor", TypeRef::named_nn(TypeRef::CURSOR)))
    }
}

#[extension_trait]
pub impl ConnectionField for Field {
    /// Add connection arguments to a field.
    /// See: https://relay.dev/graphql/connections.htm#sec-Arguments
    fn connection_arguments(self) -> Self {
        self.pagination_arguments()
    }
}

#[extension_trait]
pub impl ConnectionSchemaBuilder for SchemaBuilder {
    /// Register the connection and edge types of `node_name`.
    fn register_connection(self, node_name: impl Into<String>) -> Self {
        let node_name = node_name.into();
        self.register(Object::new_connection(&node_name))
            .register(Object::new_connection_edge(&node_name))
    }

    fn register_page_info(self) -> Self {
        self.register(Object::new_page_info())
    }
}
