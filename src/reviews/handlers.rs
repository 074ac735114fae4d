use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::access::require_role;
use crate::auth::guard::AccessToken;
use crate::books::repo::Book;
use crate::error::ApiError;
use crate::reviews::dto::CreateReviewRequest;
use crate::reviews::repo::Review;
use crate::state::AppState;

const ALLOWED_ROLES: &[&str] = &["admin", "user"];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/books/:book_id/reviews",
            get(list_reviews).post(create_review),
        )
        .route("/reviews/:id", delete(delete_review))
}

#[instrument(skip(state, token))]
pub async fn list_reviews(
    State(state): State<AppState>,
    token: AccessToken,
    Path(book_id): Path<Uuid>,
) -> Result<Json<Vec<Review>>, ApiError> {
    require_role(&state, &token.0, ALLOWED_ROLES).await?;
    Book::find_by_id(&state.db, book_id)
        .await?
        .ok_or(ApiError::BookNotFound)?;
    let reviews = Review::list_for_book(&state.db, book_id).await?;
    Ok(Json(reviews))
}

#[instrument(skip(state, token, payload))]
pub async fn create_review(
    State(state): State<AppState>,
    token: AccessToken,
    Path(book_id): Path<Uuid>,
    Json(payload): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<Review>), ApiError> {
    let user = require_role(&state, &token.0, ALLOWED_ROLES).await?;

    if !(1..=5).contains(&payload.rating) {
        return Err(ApiError::Validation("Rating must be between 1 and 5".into()));
    }

    Book::find_by_id(&state.db, book_id)
        .await?
        .ok_or(ApiError::BookNotFound)?;

    let review = Review::create(
        &state.db,
        user.id,
        book_id,
        payload.rating,
        &payload.review_text,
    )
    .await?;
    info!(review_id = %review.id, %book_id, user_id = %user.id, "review created");
    Ok((StatusCode::CREATED, Json(review)))
}

#[instrument(skip(state, token))]
pub async fn delete_review(
    State(state): State<AppState>,
    token: AccessToken,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let user = require_role(&state, &token.0, ALLOWED_ROLES).await?;

    let review = Review::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::ReviewNotFound)?;

    // Authors may remove their own reviews; admins may remove any.
    if review.user_id != user.id && user.role != "admin" {
        return Err(ApiError::InsufficientPermission);
    }

    if !Review::delete(&state.db, id).await? {
        return Err(ApiError::ReviewNotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}
