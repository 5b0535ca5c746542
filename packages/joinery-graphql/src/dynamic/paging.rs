//! Relay paging arguments and the `PageInfo` object.
//! See: https://relay.dev/graphql/connections.htm#sec-Pagination-algorithm

use super::field::*;
use super::self_prelude::*;

#[extension_trait]
pub impl PagingTypeRef for TypeRef {
    const CURSOR: &'static str = "String";
    const PAGE_INFO: &'static str = "PageInfo";
}

fn page_size_argument(name: &str, edge: &str) -> InputValue {
    InputValue::new(name, TypeRef::named(TypeRef::INT))
        .description(format!("Maximum number of edges taken from the {edge}."))
}

fn cursor_argument(name: &str, side: &str) -> InputValue {
    InputValue::new(name, TypeRef::named(TypeRef::CURSOR))
        .description(format!("Only rows {side} this cursor."))
}

#[extension_trait]
pub impl PagingField for Field {
    fn pagination_arguments(self) -> Self {
        self.forward_pagination_arguments()
            .backward_pagination_arguments()
    }

    /// `first` and `after`.
    fn forward_pagination_arguments(self) -> Self {
        self.argument(page_size_argument("first", "start"))
            .argument(cursor_argument("after", "following"))
    }

    /// `last` and `before`.
    fn backward_pagination_arguments(self) -> Self {
        self.argument(page_size_argument("last", "end"))
            .argument(cursor_argument("before", "preceding"))
    }
}

#[extension_trait]
pub impl PageInfoObject for Object {
    /// Page info fields read straight off the resolved connection.
    fn new_page_info() -> Self {
        let flags = ["hasNextPage", "hasPreviousPage"]
            .into_iter()
            .map(|name| Field::column(name, TypeRef::named_nn(TypeRef::BOOLEAN)));
        let cursors = ["startCursor", "endCursor"]
            .into_iter()
            .map(|name| Field::column(name, TypeRef::named(TypeRef::CURSOR)));

        flags
            .chain(cursors)
            .fold(Self::new(TypeRef::PAGE_INFO), |object, field| object.field(field))
    }
}
