use std::cmp::Ordering;

/// A conformed candidate tagged with what deduplication needs to see
#[derive(Debug, Clone)]
pub struct Candidate<K, R, T> {
    pub key: K,
    /// Recency timestamp; unknown recency loses to any known one
    pub recency: Option<R>,
    /// First-seen order from the raw extract, used to break recency ties
    pub row_number: u64,
    pub record: T,
}

#[derive(Debug, Clone)]
pub struct Deduplicated<T> {
    /// Survivors in ascending key order
    pub records: Vec<T>,
    pub duplicates_dropped: usize,
}

/// Keep one record per key: the most recent, ties going to the lowest row number.
///
/// Output order depends only on the keys, never on input order.
pub fn latest_per_key<K: Ord, R: Ord, T>(mut candidates: Vec<Candidate<K, R, T>>) -> Deduplicated<T> {
    candidates.sort_by(|a, b| {
        a.key
            .cmp(&b.key)
            .then_with(|| b.recency.cmp(&a.recency))
            .then_with(|| a.row_number.cmp(&b.row_number))
    });

    let total = candidates.len();
    let mut records: Vec<T> = Vec::with_capacity(total);
    let mut last_key: Option<K> = None;
    for candidate in candidates {
        if last_key.as_ref().map(|k| k.cmp(&candidate.key)) == Some(Ordering::Equal) {
            continue;
        }
        last_key = Some(candidate.key);
        records.push(candidate.record);
    }

    Deduplicated {
        duplicates_dropped: total - records.len(),
        records,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn c(key: i64, recency: Option<(i32, u32, u32)>, row: u64, tag: &'static str) -> Candidate<i64, NaiveDate, &'static str> {
        Candidate {
            key,
            recency: recency.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap()),
            row_number: row,
            record: tag,
        }
    }

    #[test]
    fn test_latest_timestamp_wins() {
        let out = latest_per_key(vec![
            c(1, Some((2024, 1, 1)), 1, "older"),
            c(1, Some((2024, 6, 1)), 2, "newer"),
        ]);
        assert_eq!(out.records, vec!["newer"]);
        assert_eq!(out.duplicates_dropped, 1);
    }

    #[test]
    fn test_tie_goes_to_first_seen_row() {
        let out = latest_per_key(vec![
            c(7, Some((2024, 1, 1)), 9, "late row"),
            c(7, Some((2024, 1, 1)), 3, "early row"),
        ]);
        assert_eq!(out.records, vec!["early row"]);
    }

    #[test]
    fn test_unknown_recency_loses() {
        let out = latest_per_key(vec![
            c(2, None, 1, "undated"),
            c(2, Some((2001, 1, 1)), 2, "dated"),
        ]);
        assert_eq!(out.records, vec!["dated"]);
    }

    #[test]
    fn test_output_is_independent_of_input_order() {
        let forward = latest_per_key(vec![
            c(3, Some((2024, 1, 1)), 1, "c"),
            c(1, Some((2024, 1, 1)), 2, "a"),
            c(2, Some((2024, 1, 1)), 3, "b"),
        ]);
        let backward = latest_per_key(vec![
            c(2, Some((2024, 1, 1)), 3, "b"),
            c(1, Some((2024, 1, 1)), 2, "a"),
            c(3, Some((2024, 1, 1)), 1, "c"),
        ]);
        assert_eq!(forward.records, vec!["a", "b", "c"]);
        assert_eq!(forward.records, backward.records);
        assert_eq!(forward.duplicates_dropped, 0);
    }
}
