//! # Review Aggregation
//!
//! Reviews are stored flat, one row per review, each row carrying the page it
//! belongs to and the title/thumbnail of its book. Clients want them grouped
//! by page.
//!
//! ## Grouping
//!
//! - Single pass over the rows in storage order
//! - First time a page shows up, a new bucket is appended
//! - Every row is pushed into the bucket of its page
//! - Bucket order is first-seen order, **not** numeric page order
//!
//! The book summary is taken from the first row. With no rows there is nothing
//! to take it from, so the caller gets [`AggregateError::EmptyResult`] and picks
//! the response shape itself.
use std::collections::HashMap;

use thiserror::Error;

use crate::models::{BookSummary, PageBucket, PageReview, ReviewList, ReviewRow};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AggregateError {
    #[error("No reviews to aggregate")]
    EmptyResult,
}

pub fn aggregate(rows: &[ReviewRow]) -> Result<ReviewList, AggregateError> {
    let first = rows.first().ok_or(AggregateError::EmptyResult)?;

    let book_data = BookSummary {
        title: first.title.clone(),
        thumbnail: first.thumbnail.clone(),
    };

    let mut bucket_index: HashMap<u32, usize> = HashMap::new();
    let mut review_list: Vec<PageBucket> = Vec::new();

    for row in rows {
        let index = *bucket_index.entry(row.page).or_insert_with(|| {
            review_list.push(PageBucket {
                page: row.page,
                reviews: Vec::new(),
            });
            review_list.len() - 1
        });

        review_list[index].reviews.push(PageReview {
            review_id: row.review_id,
            created_at: row.created_at,
            review: row.review.clone(),
        });
    }

    Ok(ReviewList {
        book_data,
        review_list,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::DateTime;
    use proptest::prelude::*;

    use super::*;

    fn row(review_id: i64, page: u32) -> ReviewRow {
        ReviewRow {
            review_id,
            page,
            created_at: DateTime::from_timestamp(1_700_000_000 + review_id, 0).unwrap(),
            review: format!("review {review_id}"),
            title: "T".to_string(),
            thumbnail: Some("th".to_string()),
        }
    }

    fn ids(bucket: &PageBucket) -> Vec<i64> {
        bucket.reviews.iter().map(|r| r.review_id).collect()
    }

    #[test]
    fn test_groups_by_page() {
        let rows = vec![row(1, 1), row(2, 2), row(3, 1)];
        let list = aggregate(&rows).unwrap();

        assert_eq!(
            list.book_data,
            BookSummary {
                title: "T".to_string(),
                thumbnail: Some("th".to_string()),
            }
        );
        assert_eq!(list.review_list.len(), 2);
        assert_eq!(list.review_list[0].page, 1);
        assert_eq!(ids(&list.review_list[0]), vec![1, 3]);
        assert_eq!(list.review_list[1].page, 2);
        assert_eq!(ids(&list.review_list[1]), vec![2]);
        assert_eq!(list.review_list[0].reviews[1].review, "review 3");
    }

    #[test]
    fn test_first_seen_order_not_numeric() {
        let rows = vec![row(1, 40), row(2, 3), row(3, 120), row(4, 3)];
        let list = aggregate(&rows).unwrap();

        let pages: Vec<u32> = list.review_list.iter().map(|b| b.page).collect();
        assert_eq!(pages, vec![40, 3, 120]);
        assert_eq!(ids(&list.review_list[1]), vec![2, 4]);
    }

    #[test]
    fn test_summary_from_first_row() {
        let mut second = row(2, 1);
        second.title = "Other".to_string();
        second.thumbnail = None;

        let list = aggregate(&[row(1, 1), second]).unwrap();
        assert_eq!(list.book_data.title, "T");
        assert_eq!(list.book_data.thumbnail.as_deref(), Some("th"));
    }

    #[test]
    fn test_empty_is_empty_result() {
        assert_eq!(aggregate(&[]), Err(AggregateError::EmptyResult));
    }

    #[test]
    fn test_input_untouched() {
        let rows = vec![row(2, 5), row(1, 4)];
        let before = rows.clone();
        let _ = aggregate(&rows).unwrap();
        assert_eq!(rows, before);
    }

    proptest! {
        #[test]
        fn every_row_lands_in_exactly_one_bucket(pages in prop::collection::vec(1u32..20, 1..60)) {
            let rows: Vec<ReviewRow> = pages
                .iter()
                .enumerate()
                .map(|(i, &page)| row(i as i64, page))
                .collect();

            let list = aggregate(&rows).unwrap();

            let total: usize = list.review_list.iter().map(|b| b.reviews.len()).sum();
            prop_assert_eq!(total, rows.len());

            let mut seen = HashSet::new();
            for bucket in &list.review_list {
                for review in &bucket.reviews {
                    prop_assert!(seen.insert(review.review_id));
                    prop_assert_eq!(rows[review.review_id as usize].page, bucket.page);
                }
            }
        }

        #[test]
        fn buckets_follow_first_appearance(pages in prop::collection::vec(1u32..20, 1..60)) {
            let rows: Vec<ReviewRow> = pages
                .iter()
                .enumerate()
                .map(|(i, &page)| row(i as i64, page))
                .collect();

            let mut expected = Vec::new();
            for &page in &pages {
                if !expected.contains(&page) {
                    expected.push(page);
                }
            }

            let list = aggregate(&rows).unwrap();
            let got: Vec<u32> = list.review_list.iter().map(|b| b.page).collect();
            prop_assert_eq!(got, expected);

            for bucket in &list.review_list {
                let ids: Vec<i64> = bucket.reviews.iter().map(|r| r.review_id).collect();
                let mut sorted = ids.clone();
                sorted.sort_unstable();
                prop_assert_eq!(ids, sorted);
            }
        }
    }
}
