use chrono::{DateTime, Utc};
use serde::Serialize;

/// One stored review joined with its book, as fetched for a single book.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReviewRow {
    pub review_id: i64,
    pub page: u32,
    pub created_at: DateTime<Utc>,
    pub review: String,
    pub title: String,
    pub thumbnail: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PageReview {
    pub review_id: i64,
    pub created_at: DateTime<Utc>,
    pub review: String,
}

/// Reviews sharing one page number, in the order they were read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PageBucket {
    pub page: u32,
    pub reviews: Vec<PageReview>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BookSummary {
    pub title: String,
    pub thumbnail: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReviewList {
    pub book_data: BookSummary,
    pub review_list: Vec<PageBucket>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Book {
    pub book_id: i64,
    pub title: String,
    pub author: Option<String>,
    pub thumbnail: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Book> for BookSummary {
    fn from(book: &Book) -> Self {
        Self {
            title: book.title.clone(),
            thumbnail: book.thumbnail.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub salt: String,
    pub created_at: DateTime<Utc>,
}

/// Envelope shared by every JSON response.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            message: "OK",
            data: Some(data),
        }
    }

    pub fn created(data: T) -> Self {
        Self {
            message: "Created",
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: &'static str) -> Self {
        Self {
            message,
            data: None,
        }
    }
}
