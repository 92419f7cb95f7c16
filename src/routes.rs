use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    auth::{Identity, issue},
    database::DatabaseError,
    error::AppError,
    google::{Callback, authorize_url, fetch_profile, verify_state},
    models::{ApiResponse, Book, BookSummary, ReviewList, User},
    reviews::{AggregateError, aggregate},
    state::AppState,
    user::{Login, Signup, check_password, hash_password, new_salt},
};

#[derive(Serialize)]
pub struct SignupData {
    pub id: i64,
    pub username: String,
}

#[derive(Serialize)]
pub struct LoginData {
    pub username: String,
    pub access_token: String,
}

#[derive(Serialize)]
pub struct MeData {
    pub id: i64,
    pub username: String,
    pub email: String,
}

#[derive(Serialize)]
pub struct BookListData {
    pub book_list: Vec<Book>,
}

#[derive(Serialize)]
pub struct BookCreated {
    pub book_id: i64,
}

#[derive(Serialize)]
pub struct ReviewCreated {
    pub review_id: i64,
}

#[derive(Deserialize)]
pub struct NewBook {
    pub title: String,
    pub author: Option<String>,
    pub thumbnail: Option<String>,
}

#[derive(Deserialize)]
pub struct NewReview {
    pub page: u32,
    pub review: String,
}

#[derive(Deserialize)]
pub struct EditReview {
    pub review: String,
}

pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Signup>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(signup) = payload?;
    signup.validate()?;

    let email = signup.email.trim().to_string();
    let username = signup.username.trim().to_string();
    let salt = new_salt();
    let password_hash = hash_password(&salt, &signup.password);

    let id = state
        .database
        .create_user(email, username.clone(), password_hash, salt)
        .await
        .map_err(|e| match e {
            DatabaseError::Duplicate => AppError::Conflict("Email already registered"),
            e => AppError::Upstream(e),
        })?;

    info!("Registered user {id}");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::created(SignupData { id, username })),
    ))
}

pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Login>, JsonRejection>,
) -> Result<Json<ApiResponse<LoginData>>, AppError> {
    let Json(login) = payload?;
    login.validate()?;

    let user = state
        .database
        .find_user_by_email(login.email.trim().to_string())
        .await?
        .filter(|user| check_password(user, &login.password))
        .ok_or(AppError::InvalidCredentials)?;

    let access_token = issue(&user, &state.config.access_secret, state.config.token_ttl)
        .map_err(anyhow::Error::from)?;

    Ok(Json(ApiResponse::ok(LoginData {
        username: user.username,
        access_token,
    })))
}

pub async fn google_login_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<String>>, AppError> {
    let google = state.config.google.as_ref().ok_or(AppError::NotFound)?;
    let url = authorize_url(google, &state.config.access_secret, Utc::now().timestamp())?;

    Ok(Json(ApiResponse::ok(url)))
}

pub async fn google_callback_handler(
    State(state): State<Arc<AppState>>,
    Query(callback): Query<Callback>,
) -> Result<Json<ApiResponse<LoginData>>, AppError> {
    let google = state.config.google.as_ref().ok_or(AppError::NotFound)?;

    if let Some(error) = &callback.error {
        warn!("Google sign-in declined: {error}");
    }
    let code = callback
        .code
        .filter(|code| !code.is_empty() && callback.error.is_none())
        .ok_or(AppError::Validation("Missing authorization code"))?;

    let state_ok = callback.state.as_deref().is_some_and(|s| {
        verify_state(s, &state.config.access_secret, Utc::now().timestamp())
    });
    if !state_ok {
        return Err(AppError::Unauthorized);
    }

    let profile = fetch_profile(&state.http, google, &code).await?;
    if !profile.email_verified {
        return Err(AppError::Unauthorized);
    }

    let email = profile.email.trim().to_string();
    let user = match state.database.find_user_by_email(email.clone()).await? {
        Some(user) => user,
        None => google_signup(&state, email, profile.username()).await?,
    };

    let access_token = issue(&user, &state.config.access_secret, state.config.token_ttl)
        .map_err(anyhow::Error::from)?;

    Ok(Json(ApiResponse::ok(LoginData {
        username: user.username,
        access_token,
    })))
}

async fn google_signup(state: &AppState, email: String, username: String) -> Result<User, AppError> {
    let salt = new_salt();
    let password_hash = hash_password(&salt, &new_salt());

    match state
        .database
        .create_user(email.clone(), username, password_hash, salt)
        .await
    {
        Ok(id) => info!("Registered user {id} through Google"),
        Err(DatabaseError::Duplicate) => {}
        Err(e) => return Err(e.into()),
    }

    // concurrent first logins race on the unique email
    state
        .database
        .find_user_by_email(email)
        .await?
        .ok_or(AppError::Unauthorized)
}

pub async fn me_handler(identity: Identity) -> Json<ApiResponse<MeData>> {
    Json(ApiResponse::ok(MeData {
        id: identity.id,
        username: identity.username,
        email: identity.email,
    }))
}

pub async fn list_books_handler(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<ApiResponse<BookListData>>, AppError> {
    let book_list = state.database.list_books(identity.id).await?;

    Ok(Json(ApiResponse::ok(BookListData { book_list })))
}

pub async fn create_book_handler(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    payload: Result<Json<NewBook>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(book) = payload?;

    let title = book.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::Validation("Title is required"));
    }

    let book_id = state
        .database
        .create_book(identity.id, title, non_empty(book.author), non_empty(book.thumbnail))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::created(BookCreated { book_id })),
    ))
}

pub async fn reviews_handler(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<ApiResponse<ReviewList>>, AppError> {
    let Path(book_id) = path?;

    let rows = state
        .database
        .fetch_review_rows(identity.id, book_id)
        .await?;

    let list = match aggregate(&rows) {
        Ok(list) => list,
        Err(AggregateError::EmptyResult) => {
            let book = state
                .database
                .find_book(identity.id, book_id)
                .await?
                .ok_or(AppError::NotFound)?;

            ReviewList {
                book_data: BookSummary::from(&book),
                review_list: Vec::new(),
            }
        }
    };

    Ok(Json(ApiResponse::ok(list)))
}

pub async fn create_review_handler(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<NewReview>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(book_id) = path?;
    let Json(review) = payload?;

    if review.page == 0 {
        return Err(AppError::Validation("Page must be at least 1"));
    }
    let text = review_text(review.review)?;

    let review_id = state
        .database
        .create_review(identity.id, book_id, review.page, text)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::created(ReviewCreated { review_id })),
    ))
}

pub async fn update_review_handler(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<EditReview>, JsonRejection>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let Path(review_id) = path?;
    let Json(edit) = payload?;
    let text = review_text(edit.review)?;

    if !state
        .database
        .update_review(identity.id, review_id, text)
        .await?
    {
        return Err(AppError::NotFound);
    }

    Ok(Json(ApiResponse::message("OK")))
}

pub async fn delete_review_handler(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let Path(review_id) = path?;

    if !state.database.delete_review(identity.id, review_id).await? {
        return Err(AppError::NotFound);
    }

    Ok(Json(ApiResponse::message("OK")))
}

fn review_text(review: String) -> Result<String, AppError> {
    let review = review.trim().to_string();
    if review.is_empty() {
        return Err(AppError::Validation("Review is required"));
    }

    Ok(review)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
