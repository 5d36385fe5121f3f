//! Id-deduplicated page merging for infinite-scroll lists
//!
//! Pages can overlap when rows are inserted between fetches; merging by
//! id keeps the list stable instead of showing duplicates.

/// Anything with a stable identity that can appear in a paged list
pub trait HasId {
    fn id(&self) -> Option<&str>;
}

impl HasId for shared::models::Order {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// Append the rows of `page` that are not already present in `existing`.
///
/// First-seen order wins. Rows without an id are always appended since
/// they cannot collide.
pub fn merge_page<T: HasId>(mut existing: Vec<T>, page: Vec<T>) -> Vec<T> {
    let mut seen: std::collections::HashSet<String> = existing
        .iter()
        .filter_map(|item| item.id().map(|id| id.to_string()))
        .collect();

    for item in page {
        match item.id() {
            Some(id) => {
                if seen.insert(id.to_string()) {
                    existing.push(item);
                }
            }
            None => existing.push(item),
        }
    }

    existing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Row(&'static str);

    impl HasId for Row {
        fn id(&self) -> Option<&str> {
            Some(self.0)
        }
    }

    #[test]
    fn test_overlapping_pages_keep_first_seen_order() {
        let first = vec![Row("a"), Row("b"), Row("c")];
        let second = vec![Row("b"), Row("c"), Row("d")];

        let merged = merge_page(first, second);
        assert_eq!(merged, vec![Row("a"), Row("b"), Row("c"), Row("d")]);
    }

    #[test]
    fn test_remerging_same_page_is_idempotent() {
        let merged = merge_page(vec![Row("a"), Row("b")], vec![Row("a"), Row("b")]);
        assert_eq!(merged, vec![Row("a"), Row("b")]);
    }

    #[test]
    fn test_merge_into_empty() {
        let merged = merge_page(Vec::new(), vec![Row("x")]);
        assert_eq!(merged, vec![Row("x")]);
    }

    #[test]
    fn test_merging_consecutive_order_pages() {
        use shared::models::Order;
        use shared::response::PaginatedResponse;

        fn order(id: &str) -> Order {
            Order {
                id: Some(id.to_string()),
                ..Order::default()
            }
        }

        // A new order pushed to page two between fetches duplicates "o2"
        let first = PaginatedResponse::new(vec![order("o1"), order("o2")], 1, 2, 4);
        let second = PaginatedResponse::new(vec![order("o2"), order("o3")], 2, 2, 4);
        assert_eq!(first.pagination.total_pages, 2);

        let merged = merge_page(first.items, second.items);
        let ids: Vec<_> = merged.iter().filter_map(|o| o.id()).collect();
        assert_eq!(ids, vec!["o1", "o2", "o3"]);
    }
}
