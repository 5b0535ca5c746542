//! Relay connections built from a slice of an ordered result set.
//! See: https://relay.dev/graphql/connections.htm

use crate::{arguments::ConnectionArguments, cursor::Cursor, GraphqlResult};
use serde::Serialize;

/// Where a slice of rows sits within the logical result set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArraySliceMetaInfo {
    /// Size of the logical result set, when known.
    pub array_length: Option<usize>,

    /// Offset of the slice's first row within the logical result set.
    pub slice_start: usize,
}

impl ArraySliceMetaInfo {
    pub fn new(array_length: Option<usize>, slice_start: usize) -> Self {
        Self {
            array_length,
            slice_start,
        }
    }

    pub fn with_length(array_length: usize) -> Self {
        Self::new(Some(array_length), 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge<T> {
    pub node: T,
    pub cursor: Cursor,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<Cursor>,
    pub end_cursor: Option<Cursor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<T> {
    pub edges: Vec<Edge<T>>,
    pub page_info: PageInfo,
}

impl<T> Connection<T> {
    pub fn empty() -> Self {
        Self {
            edges: Vec::new(),
            page_info: PageInfo::default(),
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &T> {
        self.edges.iter().map(|edge| &edge.node)
    }

    pub fn into_nodes(self) -> Vec<T> {
        self.edges.into_iter().map(|edge| edge.node).collect()
    }
}

/// Build a connection over `slice`, which occupies the offsets
/// `[slice_start, slice_start + slice.len())` of the logical result set.
///
/// `after`/`before` bound the slice first, then `first` caps it from the
/// front and `last` from the back.
pub fn connection_from_array_slice<T>(
    slice: Vec<T>,
    args: &ConnectionArguments,
    meta: ArraySliceMetaInfo,
) -> GraphqlResult<Connection<T>> {
    let bounds = args.bounds()?;

    let slice_start = meta.slice_start;
    let slice_end = slice_start.saturating_add(slice.len());
    let upper = meta.array_length.unwrap_or(slice_end).max(slice_end);

    let mut start = slice_start.max(bounds.after.map_or(0, |after| after.saturating_add(1)));
    let mut end = slice_end;
    if let Some(before) = bounds.before {
        end = end.min(before);
    }
    if let Some(first) = bounds.first {
        end = end.min(start.saturating_add(first));
    }
    if let Some(last) = bounds.last {
        start = start.max(end.saturating_sub(last));
    }

    let edges = slice
        .into_iter()
        .enumerate()
        .map(|(i, node)| (slice_start + i, node))
        .filter(|(offset, _)| *offset >= start && *offset < end)
        .map(|(offset, node)| Edge {
            node,
            cursor: Cursor::encode(offset),
        })
        .collect::<Vec<Edge<T>>>();

    let page_info = PageInfo {
        has_next_page: end < upper,
        has_previous_page: start > 0 && upper > 0,
        start_cursor: edges.first().map(|edge| edge.cursor.clone()),
        end_cursor: edges.last().map(|edge| edge.cursor.clone()),
    };

    Ok(Connection { edges, page_info })
}

/// Build a connection over a complete result set.
pub fn connection_from_array<T>(
    array: Vec<T>,
    args: &ConnectionArguments,
) -> GraphqlResult<Connection<T>> {
    let meta = ArraySliceMetaInfo::with_length(array.len());
    connection_from_array_slice(array, args, meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::GraphqlError;
    use pretty_assertions::assert_eq;

    fn offsets(connection: &Connection<usize>) -> Vec<usize> {
        connection
            .edges
            .iter()
            .map(|edge| edge.cursor.decode().unwrap())
            .collect()
    }

    #[test]
    fn test_first_smaller_than_slice_has_next_page() {
        let connection =
            connection_from_array((0..5).collect(), &ConnectionArguments::forward(2))
                .unwrap();

        assert_eq!(connection.edges.len(), 2);
        assert_eq!(connection.into_nodes(), vec![0, 1]);
    }

    #[test]
    fn test_untruncated_slice_has_no_neighbouring_pages() {
        let connection = connection_from_array(
            vec!["a", "b", "c"],
            &ConnectionArguments::default(),
        )
        .unwrap();

        assert_eq!(connection.edges.len(), 3);
        assert!(!connection.page_info.has_next_page);
        assert!(!connection.page_info.has_previous_page);
        assert_eq!(connection.page_info.start_cursor, Some(Cursor::encode(0)));
        assert_eq!(connection.page_info.end_cursor, Some(Cursor::encode(2)));
    }

    #[test]
    fn test_after_cursor_with_first() {
        let args = ConnectionArguments::forward(3).after(Cursor::encode(5));
        let connection = connection_from_array((0..10).collect(), &args).unwrap();

        assert_eq!(offsets(&connection), vec![6, 7, 8]);
        assert_eq!(connection.nodes().copied().collect::<Vec<usize>>(), vec![6, 7, 8]);
        assert!(connection.page_info.has_next_page);
        assert!(connection.page_info.has_previous_page);
    }

    #[test]
    fn test_first_larger_than_slice() {
        let meta = ArraySliceMetaInfo::with_length(3);
        let connection = connection_from_array_slice(
            vec!["hoge", "fuga", "piyo"],
            &ConnectionArguments::forward(8),
            meta,
        )
        .unwrap();

        assert_eq!(connection.edges.len(), 3);
        assert!(!connection.page_info.has_next_page);
        assert!(!connection.page_info.has_previous_page);
    }

    #[test]
    fn test_slice_offsets_are_absolute() {
        let meta = ArraySliceMetaInfo::new(Some(20), 10);
        let connection = connection_from_array_slice(
            (10..15).collect(),
            &ConnectionArguments::forward(2),
            meta,
        )
        .unwrap();

        assert_eq!(offsets(&connection), vec![10, 11]);
        assert!(connection.page_info.has_next_page);
        assert!(connection.page_info.has_previous_page);
    }

    #[test]
    fn test_before_and_last() {
        let args = ConnectionArguments::backward(2).before(Cursor::encode(4));
        let connection = connection_from_array((0..10).collect(), &args).unwrap();

        assert_eq!(offsets(&connection), vec![2, 3]);
        assert!(connection.page_info.has_next_page);
        assert!(connection.page_info.has_previous_page);
    }

    #[test]
    fn test_first_then_last() {
        let args = ConnectionArguments {
            first: Some(5),
            last: Some(2),
            ..ConnectionArguments::default()
        };
        let connection = connection_from_array((0..10).collect(), &args).unwrap();

        assert_eq!(offsets(&connection), vec![3, 4]);
    }

    #[test]
    fn test_unknown_length_only_reports_discarded_rows() {
        let meta = ArraySliceMetaInfo::new(None, 0);
        let full = connection_from_array_slice(
            (0..3).collect(),
            &ConnectionArguments::forward(3),
            meta,
        )
        .unwrap();
        assert!(!full.page_info.has_next_page);

        let truncated = connection_from_array_slice(
            (0..3).collect(),
            &ConnectionArguments::forward(2),
            meta,
        )
        .unwrap();
        assert!(truncated.page_info.has_next_page);
    }

    #[test]
    fn test_after_past_the_end_is_empty() {
        let args = ConnectionArguments::default().after(Cursor::encode(20));
        let connection = connection_from_array((0..10).collect(), &args).unwrap();

        assert!(connection.edges.is_empty());
        assert_eq!(connection.page_info.start_cursor, None);
        assert!(!connection.page_info.has_next_page);
    }

    #[test]
    fn test_empty_result_set() {
        let connection =
            connection_from_array(Vec::<usize>::new(), &ConnectionArguments::forward(5))
                .unwrap();

        assert_eq!(connection, Connection::empty());
    }

    #[test]
    fn test_converter_is_idempotent() {
        let args = ConnectionArguments::forward(4).after(Cursor::encode(1));
        let once = connection_from_array((0..10).collect::<Vec<usize>>(), &args).unwrap();
        let twice = connection_from_array((0..10).collect::<Vec<usize>>(), &args).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_bad_arguments_are_rejected() {
        let malformed = ConnectionArguments::default().after(Cursor::from("garbage"));
        assert_matches!(
            connection_from_array(vec![1], &malformed),
            Err(GraphqlError::MalformedCursor(_))
        );

        assert_matches!(
            connection_from_array(vec![1], &ConnectionArguments::forward(-2)),
            Err(GraphqlError::InvalidPaginationArgument(_))
        );
    }
}
