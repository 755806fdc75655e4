/// Generates entity, create payload and repository for a simple `name` + unique `slug` table
/// (categories and genres are identical in shape).
macro_rules! slugged_entity {
    ($entity:ident, $create:ident, $repo_impl:ident, $repo:ident, $table:literal) => {
        use futures::TryStreamExt as _;
        use garde::Validate;
        use serde::{Deserialize, Serialize};
        use sqlx::{Pool, QueryBuilder};
        use tracing::debug;

        use crate::{error::Result, Batch, ChosenDB, Error, ListingParams};

        #[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, sqlx::FromRow)]
        pub struct $entity {
            #[serde(skip_serializing, default)]
            pub id: i64,
            pub name: String,
            pub slug: String,
        }

        #[derive(Debug, Serialize, Deserialize, Clone, Validate)]
        pub struct $create {
            #[garde(length(min = 1, max = 256))]
            pub name: String,
            #[garde(length(min = 1, max = 50), pattern(r"^[-a-zA-Z0-9_]+$"))]
            pub slug: String,
        }

        pub type $repo = $repo_impl<Pool<ChosenDB>>;

        pub struct $repo_impl<E> {
            executor: E,
        }

        impl<'c, E> $repo_impl<E>
        where
            for<'a> &'a E: sqlx::Executor<'c, Database = ChosenDB>,
        {
            const VALID_ORDER_FIELDS: &'static [(&'static str, &'static str)] =
                &[("id", "id"), ("name", "name"), ("slug", "slug")];

            pub fn new(executor: E) -> Self {
                Self { executor }
            }

            pub async fn create(&self, payload: $create) -> Result<$entity> {
                let result = sqlx::query(concat!("INSERT INTO ", $table, " (name, slug) VALUES (?, ?)"))
                    .bind(&payload.name)
                    .bind(&payload.slug)
                    .execute(&self.executor)
                    .await
                    .map_err(|e| {
                        Error::on_unique_violation(e, |_| {
                            (
                                "slug",
                                format!("{} with slug {} already exists", $table, payload.slug),
                            )
                        })
                    })?;

                let id = result.last_insert_rowid();
                debug!("Created {} {}", $table, id);
                Ok($entity {
                    id,
                    name: payload.name,
                    slug: payload.slug,
                })
            }

            /// Lists records, optionally only those with `search` contained in name
            pub async fn list(
                &self,
                params: ListingParams,
                search: Option<&str>,
            ) -> Result<Batch<$entity>> {
                let order = params.ordering_or(Self::VALID_ORDER_FIELDS, "name")?;
                let pattern = search.map(crate::like_pattern);

                let mut count_query: QueryBuilder<ChosenDB> =
                    QueryBuilder::new(concat!("SELECT COUNT(*) FROM ", $table));
                let mut query: QueryBuilder<ChosenDB> =
                    QueryBuilder::new(concat!("SELECT id, name, slug FROM ", $table));
                if let Some(pattern) = pattern {
                    count_query
                        .push(" WHERE name LIKE ")
                        .push_bind(pattern.clone())
                        .push(" ESCAPE '\\'");
                    query
                        .push(" WHERE name LIKE ")
                        .push_bind(pattern)
                        .push(" ESCAPE '\\'");
                }
                query
                    .push(" ORDER BY ")
                    .push(order)
                    .push(" LIMIT ")
                    .push_bind(params.limit)
                    .push(" OFFSET ")
                    .push_bind(params.offset);

                let total: i64 = count_query
                    .build_query_scalar::<i64>()
                    .fetch_one(&self.executor)
                    .await?;
                let rows = query
                    .build_query_as::<$entity>()
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

            pub async fn get_by_slug(&self, slug: &str) -> Result<$entity> {
                sqlx::query_as::<_, $entity>(concat!(
                    "SELECT id, name, slug FROM ",
                    $table,
                    " WHERE slug = ?"
                ))
                .bind(slug)
                .fetch_optional(&self.executor)
                .await?
                .ok_or_else(|| Error::RecordNotFound(stringify!($entity).to_string()))
            }

            pub async fn delete_by_slug(&self, slug: &str) -> Result<()> {
                let res = sqlx::query(concat!("DELETE FROM ", $table, " WHERE slug = ?"))
                    .bind(slug)
                    .execute(&self.executor)
                    .await?;

                if res.rows_affected() == 0 {
                    Err(Error::RecordNotFound(stringify!($entity).to_string()))
                } else {
                    Ok(())
                }
            }
        }
    };
}
