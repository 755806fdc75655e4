use futures::TryStreamExt as _;
use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Executor, Pool, QueryBuilder};
use time::PrimitiveDateTime;
use tracing::debug;

use crate::{error::Result, Batch, ChosenDB, Error, ListingParams};

pub const DUPLICATE_REVIEW: &str = "You have already reviewed this title";

const SELECT_REVIEW: &str = "SELECT r.id, r.text, u.username AS author, r.score, r.pub_date, \
r.title_id, r.author_id FROM review r JOIN users u ON u.id = r.author_id";

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Review {
    pub id: i64,
    pub text: String,
    /// Username of author
    pub author: String,
    pub score: i64,
    pub pub_date: PrimitiveDateTime,
    #[serde(skip)]
    pub title_id: i64,
    #[serde(skip)]
    pub author_id: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateReview {
    #[garde(length(min = 1, max = 256))]
    pub text: String,
    #[garde(range(min = 1, max = 10))]
    pub score: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
pub struct UpdateReview {
    #[garde(length(min = 1, max = 256))]
    pub text: Option<String>,
    #[garde(inner(range(min = 1, max = 10)))]
    pub score: Option<i64>,
}

fn duplicate_review() -> Error {
    Error::already_exists("non_field_errors", DUPLICATE_REVIEW)
}

pub type ReviewRepository = ReviewRepositoryImpl<Pool<ChosenDB>>;

pub struct ReviewRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> ReviewRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(
        &self,
        title_id: i64,
        author_id: i64,
        payload: CreateReview,
    ) -> Result<Review> {
        let title = sqlx::query_scalar::<_, i64>("SELECT id FROM title WHERE id = ?")
            .bind(title_id)
            .fetch_optional(&self.executor)
            .await?;
        if title.is_none() {
            return Err(Error::RecordNotFound("Title".to_string()));
        }

        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM review WHERE title_id = ? AND author_id = ?",
        )
        .bind(title_id)
        .bind(author_id)
        .fetch_optional(&self.executor)
        .await?;
        if existing.is_some() {
            return Err(duplicate_review());
        }

        // Concurrent insert can still slip through the check above
        let result = sqlx::query(
            "INSERT INTO review (text, score, title_id, author_id, pub_date) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&payload.text)
        .bind(payload.score)
        .bind(title_id)
        .bind(author_id)
        .bind(crate::now())
        .execute(&self.executor)
        .await
        .map_err(|e| Error::on_unique_violation(e, |_| ("non_field_errors", DUPLICATE_REVIEW.to_string())))?;

        let id = result.last_insert_rowid();
        debug!("Created review {id} on title {title_id}");
        self.get(title_id, id).await
    }

    pub async fn get(&self, title_id: i64, id: i64) -> Result<Review> {
        let mut query: QueryBuilder<ChosenDB> = QueryBuilder::new(SELECT_REVIEW);
        query
            .push(" WHERE r.id = ")
            .push_bind(id)
            .push(" AND r.title_id = ")
            .push_bind(title_id);
        query
            .build_query_as::<Review>()
            .fetch_optional(&self.executor)
            .await?
            .ok_or_else(|| Error::RecordNotFound("Review".to_string()))
    }

    pub async fn list(&self, title_id: i64, params: ListingParams) -> Result<Batch<Review>> {
        let order = params.ordering_or(
            &[("id", "r.id"), ("score", "r.score"), ("pub_date", "r.pub_date")],
            "r.id",
        )?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM review WHERE title_id = ?")
            .bind(title_id)
            .fetch_one(&self.executor)
            .await?;

        let mut query: QueryBuilder<ChosenDB> = QueryBuilder::new(SELECT_REVIEW);
        query
            .push(" WHERE r.title_id = ")
            .push_bind(title_id)
            .push(" ORDER BY ")
            .push(order)
            .push(" LIMIT ")
            .push_bind(params.limit)
            .push(" OFFSET ")
            .push_bind(params.offset);
        let rows = query
            .build_query_as::<Review>()
            .fetch(&self.executor)
            .try_collect::<Vec<_>>()
            .await?;

        Ok(Batch {
            offset: params.offset,
            limit: params.limit,
            total: total as u64,
            rows,
        })
    }

    pub async fn update(&self, title_id: i64, id: i64, payload: UpdateReview) -> Result<Review> {
        if payload.text.is_some() || payload.score.is_some() {
            let mut query: QueryBuilder<ChosenDB> = QueryBuilder::new("UPDATE review SET ");
            let mut fields = query.separated(", ");
            if let Some(text) = payload.text {
                fields.push("text = ").push_bind_unseparated(text);
            }
            if let Some(score) = payload.score {
                fields.push("score = ").push_bind_unseparated(score);
            }
            query
                .push(" WHERE id = ")
                .push_bind(id)
                .push(" AND title_id = ")
                .push_bind(title_id);
            let res = query.build().execute(&self.executor).await?;
            if res.rows_affected() == 0 {
                return Err(Error::RecordNotFound("Review".to_string()));
            }
        }
        self.get(title_id, id).await
    }

    pub async fn delete(&self, title_id: i64, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM review WHERE id = ? AND title_id = ?")
            .bind(id)
            .bind(title_id)
            .execute(&self.executor)
            .await?;

        if res.rows_affected() == 0 {
            Err(Error::RecordNotFound("Review".to_string()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_range() {
        for score in [1, 5, 10] {
            let review = CreateReview {
                text: "Fine".to_string(),
                score,
            };
            assert!(review.validate().is_ok(), "score {score} should be valid");
        }
        for score in [-1, 0, 11, 100] {
            let review = CreateReview {
                text: "Fine".to_string(),
                score,
            };
            assert!(review.validate().is_err(), "score {score} should be invalid");
        }
    }

    #[test]
    fn test_update_validation() {
        assert!(UpdateReview::default().validate().is_ok());
        let update = UpdateReview {
            text: Some(String::new()),
            score: None,
        };
        assert!(update.validate().is_err());
        let update = UpdateReview {
            text: None,
            score: Some(0),
        };
        assert!(update.validate().is_err());
    }
}
