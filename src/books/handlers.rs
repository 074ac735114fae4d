use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::access::{require_role, DEFAULT_ALLOWED_ROLES};
use crate::auth::guard::AccessToken;
use crate::books::dto::{CreateBookRequest, Pagination, UpdateBookRequest};
use crate::books::repo::Book;
use crate::error::ApiError;
use crate::state::AppState;

/// Roles allowed on the book routes.
const ALLOWED_ROLES: &[&str] = &["admin", "user"];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/books", get(list_books).post(create_book))
        .route(
            "/books/:id",
            get(get_book).patch(update_book).delete(delete_book),
        )
        .route("/books/user/:user_id", get(list_user_books))
}

#[instrument(skip(state, token))]
pub async fn list_books(
    State(state): State<AppState>,
    token: AccessToken,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<Book>>, ApiError> {
    require_role(&state, &token.0, ALLOWED_ROLES).await?;
    let books = Book::list(&state.db, p.limit, p.offset).await?;
    Ok(Json(books))
}

/// Browsing another user's catalogue is an admin capability; users see their
/// own books through `/auth/me`.
#[instrument(skip(state, token))]
pub async fn list_user_books(
    State(state): State<AppState>,
    token: AccessToken,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<Book>>, ApiError> {
    require_role(&state, &token.0, DEFAULT_ALLOWED_ROLES).await?;
    let books = Book::list_by_user(&state.db, user_id).await?;
    Ok(Json(books))
}

#[instrument(skip(state, token))]
pub async fn get_book(
    State(state): State<AppState>,
    token: AccessToken,
    Path(id): Path<Uuid>,
) -> Result<Json<Book>, ApiError> {
    require_role(&state, &token.0, ALLOWED_ROLES).await?;
    let book = Book::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::BookNotFound)?;
    Ok(Json(book))
}

#[instrument(skip(state, token, payload))]
pub async fn create_book(
    State(state): State<AppState>,
    token: AccessToken,
    Json(payload): Json<CreateBookRequest>,
) -> Result<(StatusCode, Json<Book>), ApiError> {
    let user = require_role(&state, &token.0, ALLOWED_ROLES).await?;
    let book = Book::create(
        &state.db,
        user.id,
        &payload.title,
        &payload.author,
        &payload.publisher,
        payload.page_count,
        &payload.language,
    )
    .await?;
    info!(book_id = %book.id, user_id = %user.id, "book created");
    Ok((StatusCode::CREATED, Json(book)))
}

#[instrument(skip(state, token, payload))]
pub async fn update_book(
    State(state): State<AppState>,
    token: AccessToken,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateBookRequest>,
) -> Result<Json<Book>, ApiError> {
    require_role(&state, &token.0, ALLOWED_ROLES).await?;

    let updated = Book::update(
        &state.db,
        id,
        payload.title.as_deref(),
        payload.author.as_deref(),
        payload.publisher.as_deref(),
        payload.page_count,
        payload.language.as_deref(),
    )
    .await?
    .ok_or(ApiError::BookNotFound)?;

    Ok(Json(updated))
}

#[instrument(skip(state, token))]
pub async fn delete_book(
    State(state): State<AppState>,
    token: AccessToken,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    require_role(&state, &token.0, ALLOWED_ROLES).await?;
    if !Book::delete(&state.db, id).await? {
        return Err(ApiError::BookNotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}
