#[macro_use]
mod slugged;

pub mod category;
pub mod comment;
pub mod error;
pub mod genre;
pub mod review;
pub mod title;
pub mod user;

use std::str::FromStr;

pub use error::Error;
pub use sqlx::Error as SqlxError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::Result;

pub type ChosenDB = sqlx::Sqlite;
pub type ChosenRow = sqlx::sqlite::SqliteRow;
pub type Pool = sqlx::Pool<ChosenDB>;

pub const MAX_LIMIT: usize = 10_000;

pub async fn new_pool(database_url: &str) -> Result<Pool, Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(50)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Applies pending schema migrations
pub async fn migrate(pool: &Pool) -> Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

pub(crate) fn now() -> time::PrimitiveDateTime {
    let now = time::OffsetDateTime::now_utc();
    time::PrimitiveDateTime::new(now.date(), now.time())
}

/// Escapes LIKE wildcards, use with `ESCAPE '\'`
pub(crate) fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[derive(Debug, Clone)]
pub enum Order {
    Asc(String),
    Desc(String),
}

impl AsRef<str> for Order {
    fn as_ref(&self) -> &str {
        match self {
            Order::Asc(s) => s.as_str(),
            Order::Desc(s) => s.as_str(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListingParams {
    pub offset: i64,
    pub limit: i64,
    pub order: Option<Vec<Order>>,
}

impl Default for ListingParams {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: MAX_LIMIT as i64,
            order: None,
        }
    }
}

impl ListingParams {
    pub fn new(offset: i64, limit: i64) -> Self {
        Self {
            offset,
            limit,
            order: None,
        }
    }
    pub fn with_order(mut self, order: Vec<Order>) -> Self {
        self.order = Some(order);
        self
    }

    /// `ORDER BY` clause, `valid_fields` maps API field name to SQL column
    pub fn ordering(&self, valid_fields: &[(&str, &str)]) -> Result<String> {
        let ordering = self
            .order
            .as_ref()
            .map(|o| {
                o.iter()
                    .map(|o| {
                        let column = valid_fields
                            .iter()
                            .find(|(name, _)| *name == o.as_ref())
                            .map(|(_, column)| *column)
                            .ok_or_else(|| Error::InvalidOrderByField(o.as_ref().to_string()))?;
                        Ok(match o {
                            Order::Asc(_) => column.to_string(),
                            Order::Desc(_) => format!("{column} DESC"),
                        })
                    })
                    .collect::<Result<Vec<String>>>()
                    .map(|o| o.join(", "))
            })
            .transpose()?
            .unwrap_or_default();
        Ok(ordering)
    }

    /// Ordering or `default` when none requested
    pub(crate) fn ordering_or(
        &self,
        valid_fields: &[(&str, &str)],
        default: &str,
    ) -> Result<String> {
        let ordering = self.ordering(valid_fields)?;
        if ordering.is_empty() {
            Ok(default.to_string())
        } else {
            Ok(ordering)
        }
    }
}

/// One slice of a listing together with total count of matching records
#[derive(Debug, Clone)]
pub struct Batch<T> {
    pub offset: i64,
    pub limit: i64,
    pub total: u64,
    pub rows: Vec<T>,
}

impl<T> Batch<T> {
    pub fn map<U, F>(self, f: F) -> Batch<U>
    where
        F: FnMut(T) -> U,
    {
        Batch {
            offset: self.offset,
            limit: self.limit,
            total: self.total,
            rows: self.rows.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        let params = ListingParams::default().with_order(vec![
            Order::Desc("year".to_string()),
            Order::Asc("name".to_string()),
        ]);
        let ordering = params
            .ordering(&[("name", "t.name"), ("year", "t.year")])
            .unwrap();
        assert_eq!("t.year DESC, t.name", ordering);

        let err = params.ordering(&[("name", "t.name")]).unwrap_err();
        assert!(matches!(err, Error::InvalidOrderByField(f) if f == "year"));

        let params = ListingParams::new(0, 10);
        assert_eq!("id", params.ordering_or(&[("name", "name")], "id").unwrap());
    }

    #[test]
    fn test_like_pattern() {
        assert_eq!("%dune%", like_pattern("dune"));
        assert_eq!("%100\\%\\_%", like_pattern("100%_"));
    }
}
