use std::collections::HashMap;

use futures::TryStreamExt as _;
use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Acquire, Executor, Pool, QueryBuilder, Row, SqliteConnection};
use tracing::debug;

use crate::{
    category::Category, error::Result, genre::Genre, Batch, ChosenDB, ChosenRow, Error,
    ListingParams,
};

const VALID_ORDER_FIELDS: &[(&str, &str)] = &[
    ("id", "t.id"),
    ("name", "t.name"),
    ("year", "t.year"),
    ("rating", "rating"),
];

const SELECT_TITLE: &str = r#"
SELECT t.id, t.name, t.year, t.description, t.category_id,
c.name AS category_name, c.slug AS category_slug,
CAST(COALESCE((SELECT AVG(r.score) FROM review r WHERE r.title_id = t.id), 0) AS REAL) AS rating
FROM title t
LEFT JOIN category c ON t.category_id = c.id
"#;

const COUNT_TITLE: &str = r#"
SELECT COUNT(*)
FROM title t
LEFT JOIN category c ON t.category_id = c.id
"#;

fn current_year() -> i32 {
    time::OffsetDateTime::now_utc().year()
}

fn not_in_future(year: &i32, _ctx: &()) -> garde::Result {
    if *year > current_year() {
        Err(garde::Error::new("year cannot be in future"))
    } else {
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateTitle {
    #[garde(length(min = 1, max = 256))]
    pub name: String,
    #[garde(custom(not_in_future))]
    pub year: i32,
    #[garde(skip)]
    pub description: Option<String>,
    /// Slugs of genres
    #[garde(length(min = 1), inner(length(min = 1, max = 50)))]
    pub genre: Vec<String>,
    /// Slug of category
    #[garde(length(min = 1, max = 50))]
    pub category: String,
}

/// Partial update, only present fields are changed
#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
pub struct UpdateTitle {
    #[garde(length(min = 1, max = 256))]
    pub name: Option<String>,
    #[garde(inner(custom(not_in_future)))]
    pub year: Option<i32>,
    #[garde(skip)]
    pub description: Option<String>,
    #[garde(length(min = 1), inner(inner(length(min = 1, max = 50))))]
    pub genre: Option<Vec<String>>,
    #[garde(length(min = 1, max = 50))]
    pub category: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct TitleFilter {
    /// Part of name, case insensitive
    pub name: Option<String>,
    pub year: Option<i32>,
    /// Genre slug
    pub genre: Option<String>,
    /// Category slug
    pub category: Option<String>,
}

impl TitleFilter {
    fn push_conditions(&self, query: &mut QueryBuilder<'_, ChosenDB>) {
        let mut separator = " WHERE ";
        if let Some(name) = &self.name {
            query
                .push(separator)
                .push("t.name LIKE ")
                .push_bind(crate::like_pattern(name))
                .push(" ESCAPE '\\'");
            separator = " AND ";
        }
        if let Some(year) = self.year {
            query.push(separator).push("t.year = ").push_bind(year);
            separator = " AND ";
        }
        if let Some(genre) = &self.genre {
            query
                .push(separator)
                .push(
                    "EXISTS (SELECT 1 FROM title_genre tg JOIN genre g ON g.id = tg.genre_id \
                     WHERE tg.title_id = t.id AND g.slug = ",
                )
                .push_bind(genre.clone())
                .push(")");
            separator = " AND ";
        }
        if let Some(category) = &self.category {
            query
                .push(separator)
                .push("c.slug = ")
                .push_bind(category.clone());
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Title {
    pub id: i64,
    pub name: String,
    pub year: i32,
    /// Average score of reviews, 0 if there are none
    pub rating: f64,
    pub description: Option<String>,
    pub genre: Vec<Genre>,
    pub category: Option<Category>,
}

impl sqlx::FromRow<'_, ChosenRow> for Title {
    fn from_row(row: &ChosenRow) -> Result<Self, sqlx::Error> {
        let category = match row.try_get::<Option<i64>, _>("category_id")? {
            Some(id) => Some(Category {
                id,
                name: row.try_get("category_name")?,
                slug: row.try_get("category_slug")?,
            }),
            None => None,
        };
        Ok(Title {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            year: row.try_get("year")?,
            rating: row.try_get("rating")?,
            description: row.try_get("description")?,
            genre: Vec::new(),
            category,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TitleGenre {
    title_id: i64,
    id: i64,
    name: String,
    slug: String,
}

async fn resolve_slug(
    conn: &mut SqliteConnection,
    table: &'static str,
    field: &'static str,
    slug: &str,
) -> Result<i64> {
    let sql = format!("SELECT id FROM {table} WHERE slug = ?");
    sqlx::query_scalar::<_, i64>(&sql)
        .bind(slug)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::InvalidReference {
            field,
            value: slug.to_string(),
        })
}

async fn link_genres(conn: &mut SqliteConnection, title_id: i64, genres: &[String]) -> Result<()> {
    for slug in genres {
        let genre_id = resolve_slug(conn, "genre", "genre", slug).await?;
        sqlx::query("INSERT OR IGNORE INTO title_genre (title_id, genre_id) VALUES (?, ?)")
            .bind(title_id)
            .bind(genre_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub type TitleRepository = TitleRepositoryImpl<Pool<ChosenDB>>;

pub struct TitleRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> TitleRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB> + Acquire<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, payload: CreateTitle) -> Result<Title> {
        let mut tx = self.executor.begin().await?;

        let category_id = resolve_slug(&mut tx, "category", "category", &payload.category).await?;
        let result = sqlx::query(
            "INSERT INTO title (name, year, description, category_id) VALUES (?, ?, ?, ?)",
        )
        .bind(&payload.name)
        .bind(payload.year)
        .bind(&payload.description)
        .bind(category_id)
        .execute(&mut *tx)
        .await?;
        let id = result.last_insert_rowid();
        link_genres(&mut tx, id, &payload.genre).await?;

        tx.commit().await?;
        debug!("Created title {id}");
        self.get(id).await
    }

    pub async fn update(&self, id: i64, payload: UpdateTitle) -> Result<Title> {
        let mut tx = self.executor.begin().await?;

        let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM title WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(Error::RecordNotFound("Title".to_string()));
        }

        let category_id = match &payload.category {
            Some(slug) => Some(resolve_slug(&mut tx, "category", "category", slug).await?),
            None => None,
        };

        let mut query: QueryBuilder<ChosenDB> = QueryBuilder::new("UPDATE title SET ");
        let mut fields = query.separated(", ");
        let mut changed = false;
        if let Some(name) = payload.name {
            fields.push("name = ").push_bind_unseparated(name);
            changed = true;
        }
        if let Some(year) = payload.year {
            fields.push("year = ").push_bind_unseparated(year);
            changed = true;
        }
        if let Some(description) = payload.description {
            fields
                .push("description = ")
                .push_bind_unseparated(description);
            changed = true;
        }
        if let Some(category_id) = category_id {
            fields
                .push("category_id = ")
                .push_bind_unseparated(category_id);
            changed = true;
        }
        if changed {
            query.push(" WHERE id = ").push_bind(id);
            query.build().execute(&mut *tx).await?;
        }

        if let Some(genres) = payload.genre {
            sqlx::query("DELETE FROM title_genre WHERE title_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            link_genres(&mut tx, id, &genres).await?;
        }

        tx.commit().await?;
        self.get(id).await
    }

    pub async fn get(&self, id: i64) -> Result<Title> {
        let mut query: QueryBuilder<ChosenDB> = QueryBuilder::new(SELECT_TITLE);
        query.push(" WHERE t.id = ").push_bind(id);
        let mut title = query
            .build_query_as::<Title>()
            .fetch_optional(&self.executor)
            .await?
            .ok_or_else(|| Error::RecordNotFound("Title".to_string()))?;

        let mut genres = self.genres_for(&[id]).await?;
        title.genre = genres.remove(&id).unwrap_or_default();
        Ok(title)
    }

    pub async fn exists(&self, id: i64) -> Result<bool> {
        let found = sqlx::query_scalar::<_, i64>("SELECT id FROM title WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.executor)
            .await?;
        Ok(found.is_some())
    }

    pub async fn list(&self, params: ListingParams, filter: TitleFilter) -> Result<Batch<Title>> {
        let order = params.ordering_or(VALID_ORDER_FIELDS, "t.id")?;

        let mut count_query: QueryBuilder<ChosenDB> = QueryBuilder::new(COUNT_TITLE);
        filter.push_conditions(&mut count_query);
        let total: i64 = count_query
            .build_query_scalar::<i64>()
            .fetch_one(&self.executor)
            .await?;

        let mut query: QueryBuilder<ChosenDB> = QueryBuilder::new(SELECT_TITLE);
        filter.push_conditions(&mut query);
        query
            .push(" ORDER BY ")
            .push(order)
            .push(" LIMIT ")
            .push_bind(params.limit)
            .push(" OFFSET ")
            .push_bind(params.offset);
        let mut rows = query
            .build_query_as::<Title>()
            .fetch(&self.executor)
            .try_collect::<Vec<_>>()
            .await?;

        let ids: Vec<i64> = rows.iter().map(|t| t.id).collect();
        let mut genres = self.genres_for(&ids).await?;
        for title in rows.iter_mut() {
            title.genre = genres.remove(&title.id).unwrap_or_default();
        }

        Ok(Batch {
            offset: params.offset,
            limit: params.limit,
            total: total as u64,
            rows,
        })
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM title WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;

        if res.rows_affected() == 0 {
            Err(Error::RecordNotFound("Title".to_string()))
        } else {
            Ok(())
        }
    }

    async fn genres_for(&self, title_ids: &[i64]) -> Result<HashMap<i64, Vec<Genre>>> {
        let mut genres: HashMap<i64, Vec<Genre>> = HashMap::new();
        if title_ids.is_empty() {
            return Ok(genres);
        }
        let mut query: QueryBuilder<ChosenDB> = QueryBuilder::new(
            "SELECT tg.title_id, g.id, g.name, g.slug FROM title_genre tg \
             JOIN genre g ON g.id = tg.genre_id WHERE tg.title_id IN (",
        );
        let mut ids = query.separated(", ");
        for id in title_ids {
            ids.push_bind(*id);
        }
        query.push(") ORDER BY g.slug");

        let rows = query
            .build_query_as::<TitleGenre>()
            .fetch_all(&self.executor)
            .await?;
        for row in rows {
            genres.entry(row.title_id).or_default().push(Genre {
                id: row.id,
                name: row.name,
                slug: row.slug,
            });
        }
        Ok(genres)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_title() -> CreateTitle {
        CreateTitle {
            name: "Dune".to_string(),
            year: 1965,
            description: None,
            genre: vec!["sci-fi".to_string()],
            category: "books".to_string(),
        }
    }

    #[test]
    fn test_title_validation() {
        assert!(valid_title().validate().is_ok());

        let future = CreateTitle {
            year: current_year() + 1,
            ..valid_title()
        };
        assert!(future.validate().is_err());

        let no_genre = CreateTitle {
            genre: vec![],
            ..valid_title()
        };
        assert!(no_genre.validate().is_err());
    }

    #[test]
    fn test_partial_update_validation() {
        assert!(UpdateTitle::default().validate().is_ok());
        let update = UpdateTitle {
            year: Some(current_year() + 10),
            ..Default::default()
        };
        assert!(update.validate().is_err());
        let update = UpdateTitle {
            genre: Some(vec![]),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }
}
