use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Book record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub publisher: String,
    pub page_count: i32,
    pub language: String,
    pub user_id: Uuid,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

const BOOK_COLUMNS: &str =
    "id, title, author, publisher, page_count, language, user_id, created_at, updated_at";

impl Book {
    pub async fn list(db: &PgPool, limit: i64, offset: i64) -> sqlx::Result<Vec<Book>> {
        let query = format!(
            "SELECT {BOOK_COLUMNS} FROM books ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        );
        sqlx::query_as::<_, Book>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(db)
            .await
    }

    pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> sqlx::Result<Vec<Book>> {
        let query = format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE user_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Book>(&query)
            .bind(user_id)
            .fetch_all(db)
            .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Book>> {
        let query = format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = $1");
        sqlx::query_as::<_, Book>(&query)
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn create(
        db: &PgPool,
        user_id: Uuid,
        title: &str,
        author: &str,
        publisher: &str,
        page_count: i32,
        language: &str,
    ) -> sqlx::Result<Book> {
        let query = format!(
            "INSERT INTO books (title, author, publisher, page_count, language, user_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {BOOK_COLUMNS}"
        );
        sqlx::query_as::<_, Book>(&query)
            .bind(title)
            .bind(author)
            .bind(publisher)
            .bind(page_count)
            .bind(language)
            .bind(user_id)
            .fetch_one(db)
            .await
    }

    /// Partial update in one statement; absent fields keep their value, so
    /// concurrent patches cannot overwrite each other's fields.
    pub async fn update(
        db: &PgPool,
        id: Uuid,
        title: Option<&str>,
        author: Option<&str>,
        publisher: Option<&str>,
        page_count: Option<i32>,
        language: Option<&str>,
    ) -> sqlx::Result<Option<Book>> {
        let query = format!(
            "UPDATE books \
             SET title = COALESCE($2, title), \
                 author = COALESCE($3, author), \
                 publisher = COALESCE($4, publisher), \
                 page_count = COALESCE($5, page_count), \
                 language = COALESCE($6, language), \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {BOOK_COLUMNS}"
        );
        sqlx::query_as::<_, Book>(&query)
            .bind(id)
            .bind(title)
            .bind(author)
            .bind(publisher)
            .bind(page_count)
            .bind(language)
            .fetch_optional(db)
            .await
    }

    /// Returns true when a row was deleted.
    pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<bool> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
