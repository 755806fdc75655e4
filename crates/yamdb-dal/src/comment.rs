use futures::TryStreamExt as _;
use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Executor, Pool, QueryBuilder};
use time::PrimitiveDateTime;
use tracing::debug;

use crate::{error::Result, Batch, ChosenDB, Error, ListingParams};

const SELECT_COMMENT: &str = "SELECT c.id, c.text, u.username AS author, c.pub_date, \
c.review_id, c.author_id FROM comment c JOIN users u ON u.id = c.author_id";

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub text: String,
    pub author: String,
    pub pub_date: PrimitiveDateTime,
    /// Comments outlive their review, then it is `None`
    #[serde(skip)]
    pub review_id: Option<i64>,
    #[serde(skip)]
    pub author_id: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateComment {
    #[garde(length(min = 1, max = 256))]
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
pub struct UpdateComment {
    #[garde(length(min = 1, max = 256))]
    pub text: Option<String>,
}

pub type CommentRepository = CommentRepositoryImpl<Pool<ChosenDB>>;

pub struct CommentRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> CommentRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(
        &self,
        review_id: i64,
        author_id: i64,
        payload: CreateComment,
    ) -> Result<Comment> {
        let review = sqlx::query_scalar::<_, i64>("SELECT id FROM review WHERE id = ?")
            .bind(review_id)
            .fetch_optional(&self.executor)
            .await?;
        if review.is_none() {
            return Err(Error::RecordNotFound("Review".to_string()));
        }

        let result = sqlx::query(
            "INSERT INTO comment (text, review_id, author_id, pub_date) VALUES (?, ?, ?, ?)",
        )
        .bind(&payload.text)
        .bind(review_id)
        .bind(author_id)
        .bind(crate::now())
        .execute(&self.executor)
        .await?;

        let id = result.last_insert_rowid();
        debug!("Created comment {id} on review {review_id}");
        self.get(review_id, id).await
    }

    pub async fn get(&self, review_id: i64, id: i64) -> Result<Comment> {
        let mut query: QueryBuilder<ChosenDB> = QueryBuilder::new(SELECT_COMMENT);
        query
            .push(" WHERE c.id = ")
            .push_bind(id)
            .push(" AND c.review_id = ")
            .push_bind(review_id);
        query
            .build_query_as::<Comment>()
            .fetch_optional(&self.executor)
            .await?
            .ok_or_else(|| Error::RecordNotFound("Comment".to_string()))
    }

    pub async fn list(&self, review_id: i64, params: ListingParams) -> Result<Batch<Comment>> {
        let order = params.ordering_or(&[("id", "c.id"), ("pub_date", "c.pub_date")], "c.id")?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comment WHERE review_id = ?")
            .bind(review_id)
            .fetch_one(&self.executor)
            .await?;

        let mut query: QueryBuilder<ChosenDB> = QueryBuilder::new(SELECT_COMMENT);
        query
            .push(" WHERE c.review_id = ")
            .push_bind(review_id)
            .push(" ORDER BY ")
            .push(order)
            .push(" LIMIT ")
            .push_bind(params.limit)
            .push(" OFFSET ")
            .push_bind(params.offset);
        let rows = query
            .build_query_as::<Comment>()
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

    pub async fn update(&self, review_id: i64, id: i64, payload: UpdateComment) -> Result<Comment> {
        if let Some(text) = payload.text {
            let res = sqlx::query("UPDATE comment SET text = ? WHERE id = ? AND review_id = ?")
                .bind(text)
                .bind(id)
                .bind(review_id)
                .execute(&self.executor)
                .await?;
            if res.rows_affected() == 0 {
                return Err(Error::RecordNotFound("Comment".to_string()));
            }
        }
        self.get(review_id, id).await
    }

    pub async fn delete(&self, review_id: i64, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM comment WHERE id = ? AND review_id = ?")
            .bind(id)
            .bind(review_id)
            .execute(&self.executor)
            .await?;

        if res.rows_affected() == 0 {
            Err(Error::RecordNotFound("Comment".to_string()))
        } else {
            Ok(())
        }
    }
}
