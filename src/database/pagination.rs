use serde::{Deserialize, Serialize};

/// Offset-based page wrapper around a fetched row set. `total_rows` comes from
/// the `COUNT(*) OVER()` window column carried by paginated queries.
#[derive(Serialize, Deserialize, Debug)]
pub struct PageContext<T> {
    pub rows: Vec<T>,
    pub total_rows: i64,
    pub next_offset: i64,
    pub prev_offset: i64,
    pub page_list: Vec<(String, i64)>,
    pub message: Option<String>,
}

impl<T> PageContext<T> {
    pub fn from_rows(rows: Vec<T>, total_rows: i64, page_size: i64, current_offset: i64) -> Self {
        if rows.is_empty() {
            return Self::no_rows();
        }
        let last_offset = ((total_rows - 1) / page_size) * page_size;
        let next_offset = (current_offset + page_size).min(last_offset);
        let prev_offset = (current_offset - page_size).max(0);

        let page_count = (total_rows + page_size - 1) / page_size;
        let current_page = current_offset / page_size;

        let page_list = (0..page_count)
            .map(|n| {
                let label = if n == current_page {
                    String::from("...")
                } else {
                    format!("{}", n + 1)
                };
                (label, n * page_size)
            })
            .collect();

        Self {
            rows,
            total_rows,
            next_offset,
            prev_offset,
            page_list,
            message: Some(format!(
                "{} - {} / {}",
                current_offset,
                (current_offset + page_size).min(total_rows),
                total_rows
            )),
        }
    }

    pub fn no_rows() -> Self {
        Self {
            rows: vec![],
            total_rows: 0,
            next_offset: 0,
            prev_offset: 0,
            page_list: vec![(String::from("1"), 0)],
            message: Some(String::from("No results")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_rows_collapse_to_no_results() {
        let page = PageContext::<i32>::from_rows(vec![], 0, 6, 0);
        assert_eq!(page.total_rows, 0);
        assert_eq!(page.message.as_deref(), Some("No results"));
    }

    #[test]
    fn middle_page_has_both_neighbours() {
        let page = PageContext::from_rows(vec![1, 2, 3, 4, 5, 6], 20, 6, 6);
        assert_eq!(page.prev_offset, 0);
        assert_eq!(page.next_offset, 12);
        assert_eq!(page.page_list.len(), 4);
        assert_eq!(page.page_list[1].0, "...");
        assert_eq!(page.page_list[3], (String::from("4"), 18));
    }

    #[test]
    fn last_page_does_not_advance_past_the_end() {
        let page = PageContext::from_rows(vec![1, 2], 20, 6, 18);
        assert_eq!(page.next_offset, 18);
        assert_eq!(page.prev_offset, 12);
        assert_eq!(page.message.as_deref(), Some("18 - 20 / 20"));
    }

    #[test]
    fn first_page_does_not_rewind_below_zero() {
        let page = PageContext::from_rows(vec![1], 1, 6, 0);
        assert_eq!(page.prev_offset, 0);
        assert_eq!(page.next_offset, 0);
        assert_eq!(page.page_list, vec![(String::from("..."), 0)]);
    }
}
