use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub rating: i32,
    pub review_text: String,
}
