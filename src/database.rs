//! # SQLite
//!
//! Relational store for users, their books and page-keyed reviews.
//!
//! ## Schema
//!
//! - `users`: email (unique), username, salted password hash
//! - `books`: owned by one user, title/author/thumbnail
//! - `reviews`: belong to one book, carry a page number and the review text
//!
//! Every query that touches books or reviews is scoped by the owning user id,
//! so one user can never read or change another user's rows.
//!
//! ## Implementation
//!
//! - One connection behind a mutex, shared through `Arc`
//! - rusqlite is blocking, so each call runs on `spawn_blocking`
//! - Schema is created on open if missing
use std::{
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::Utc;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use thiserror::Error;
use tokio::task::{JoinError, spawn_blocking};
use tracing::{info, warn};

use crate::models::{Book, ReviewRow, User};

const SCHEMA: &str = r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        username TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        salt TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS books (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        author TEXT,
        thumbnail TEXT,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_books_user ON books(user_id);

    CREATE TABLE IF NOT EXISTS reviews (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        book_id INTEGER NOT NULL REFERENCES books(id) ON DELETE CASCADE,
        page INTEGER NOT NULL,
        review TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_reviews_book ON reviews(book_id);
"#;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Duplicate entry")]
    Duplicate,

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Connection lock poisoned")]
    Poisoned,

    #[error("Blocking task failed: {0}")]
    Join(#[from] JoinError),
}

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        info!("Opening database at {}", path.display());

        let conn = Connection::open(path)?;
        let journal_mode: String =
            conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        if !journal_mode.eq_ignore_ascii_case("wal") {
            warn!("SQLite kept journal_mode={journal_mode}");
        }
        conn.busy_timeout(Duration::from_millis(5000))?;

        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, DatabaseError> {
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<T, F>(&self, f: F) -> Result<T, DatabaseError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, DatabaseError> + Send + 'static,
    {
        let conn = self.conn.clone();

        spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| DatabaseError::Poisoned)?;
            f(&conn)
        })
        .await?
    }

    pub async fn create_user(
        &self,
        email: String,
        username: String,
        password_hash: String,
        salt: String,
    ) -> Result<i64, DatabaseError> {
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO users (email, username, password_hash, salt, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![email, username, password_hash, salt, Utc::now()],
            )
            .map_err(|e| match e.sqlite_error_code() {
                Some(ErrorCode::ConstraintViolation) => DatabaseError::Duplicate,
                _ => DatabaseError::Sqlite(e),
            })?;

            Ok(conn.last_insert_rowid())
        })
        .await
    }

    pub async fn find_user_by_email(&self, email: String) -> Result<Option<User>, DatabaseError> {
        self.run(move |conn| {
            let user = conn
                .query_row(
                    "SELECT id, email, username, password_hash, salt, created_at
                     FROM users WHERE email = ?1",
                    params![email],
                    |row| {
                        Ok(User {
                            id: row.get(0)?,
                            email: row.get(1)?,
                            username: row.get(2)?,
                            password_hash: row.get(3)?,
                            salt: row.get(4)?,
                            created_at: row.get(5)?,
                        })
                    },
                )
                .optional()?;

            Ok(user)
        })
        .await
    }

    pub async fn list_books(&self, user_id: i64) -> Result<Vec<Book>, DatabaseError> {
        self.run(move |conn| {
            let mut statement = conn.prepare(
                "SELECT id, title, author, thumbnail, created_at
                 FROM books WHERE user_id = ?1 ORDER BY id",
            )?;

            let books = statement
                .query_map(params![user_id], book_from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(books)
        })
        .await
    }

    pub async fn find_book(&self, user_id: i64, book_id: i64) -> Result<Option<Book>, DatabaseError> {
        self.run(move |conn| {
            let book = conn
                .query_row(
                    "SELECT id, title, author, thumbnail, created_at
                     FROM books WHERE user_id = ?1 AND id = ?2",
                    params![user_id, book_id],
                    book_from_row,
                )
                .optional()?;

            Ok(book)
        })
        .await
    }

    pub async fn create_book(
        &self,
        user_id: i64,
        title: String,
        author: Option<String>,
        thumbnail: Option<String>,
    ) -> Result<i64, DatabaseError> {
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO books (user_id, title, author, thumbnail, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![user_id, title, author, thumbnail, Utc::now()],
            )?;

            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Flat review rows of one of the user's books, in insertion order.
    pub async fn fetch_review_rows(
        &self,
        user_id: i64,
        book_id: i64,
    ) -> Result<Vec<ReviewRow>, DatabaseError> {
        self.run(move |conn| {
            let mut statement = conn.prepare(
                "SELECT r.id, r.page, r.created_at, r.review, b.title, b.thumbnail
                 FROM reviews r
                 JOIN books b ON b.id = r.book_id
                 WHERE b.user_id = ?1 AND b.id = ?2
                 ORDER BY r.id",
            )?;

            let rows = statement
                .query_map(params![user_id, book_id], |row| {
                    Ok(ReviewRow {
                        review_id: row.get(0)?,
                        page: row.get(1)?,
                        created_at: row.get(2)?,
                        review: row.get(3)?,
                        title: row.get(4)?,
                        thumbnail: row.get(5)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
        .await
    }

    /// Returns `None` when the book does not belong to the user.
    pub async fn create_review(
        &self,
        user_id: i64,
        book_id: i64,
        page: u32,
        review: String,
    ) -> Result<Option<i64>, DatabaseError> {
        self.run(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO reviews (book_id, page, review, created_at)
                 SELECT id, ?3, ?4, ?5 FROM books WHERE user_id = ?1 AND id = ?2",
                params![user_id, book_id, page, review, Utc::now()],
            )?;

            Ok((inserted == 1).then(|| conn.last_insert_rowid()))
        })
        .await
    }

    pub async fn update_review(
        &self,
        user_id: i64,
        review_id: i64,
        review: String,
    ) -> Result<bool, DatabaseError> {
        self.run(move |conn| {
            let updated = conn.execute(
                "UPDATE reviews SET review = ?3
                 WHERE id = ?2
                   AND book_id IN (SELECT id FROM books WHERE user_id = ?1)",
                params![user_id, review_id, review],
            )?;

            Ok(updated == 1)
        })
        .await
    }

    pub async fn delete_review(&self, user_id: i64, review_id: i64) -> Result<bool, DatabaseError> {
        self.run(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM reviews
                 WHERE id = ?2
                   AND book_id IN (SELECT id FROM books WHERE user_id = ?1)",
                params![user_id, review_id],
            )?;

            Ok(deleted == 1)
        })
        .await
    }

    #[cfg(test)]
    pub(crate) async fn drop_reviews(&self) -> Result<(), DatabaseError> {
        self.run(|conn| Ok(conn.execute_batch("DROP TABLE reviews")?))
            .await
    }
}

fn book_from_row(row: &Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        book_id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        thumbnail: row.get(3)?,
        created_at: row.get(4)?,
    })
}
