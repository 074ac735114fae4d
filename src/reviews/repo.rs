use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Review record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Review {
    pub id: Uuid,
    pub rating: i32,
    pub review_text: String,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

const REVIEW_COLUMNS: &str =
    "id, rating, review_text, user_id, book_id, created_at, updated_at";

impl Review {
    pub async fn list_for_book(db: &PgPool, book_id: Uuid) -> sqlx::Result<Vec<Review>> {
        let query = format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE book_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Review>(&query)
            .bind(book_id)
            .fetch_all(db)
            .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Review>> {
        let query = format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = $1");
        sqlx::query_as::<_, Review>(&query)
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn create(
        db: &PgPool,
        user_id: Uuid,
        book_id: Uuid,
        rating: i32,
        review_text: &str,
    ) -> sqlx::Result<Review> {
        let query = format!(
            "INSERT INTO reviews (rating, review_text, user_id, book_id) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {REVIEW_COLUMNS}"
        );
        sqlx::query_as::<_, Review>(&query)
            .bind(rating)
            .bind(review_text)
            .bind(user_id)
            .bind(book_id)
            .fetch_one(db)
            .await
    }

    /// Returns true when a row was deleted.
    pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<bool> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
