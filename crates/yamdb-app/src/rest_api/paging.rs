use crate::error::{ApiError, ApiResult};
use garde::Validate;
use serde::Serialize;
use yamdb_dal::{Batch, ListingParams, Order};

/// Common query parameters of list endpoints
#[derive(Debug, Clone, Default, Validate, serde::Deserialize)]
pub struct Paging {
    #[garde(range(min = 1, max = 1000))]
    pub limit: Option<i64>,
    #[garde(range(min = 0))]
    pub offset: Option<i64>,
    /// Comma separated fields, `-` prefix for descending
    #[garde(length(max = 255))]
    pub ordering: Option<String>,
    #[garde(length(max = 255))]
    pub search: Option<String>,
}

fn parse_ordering(orderings: &str) -> ApiResult<Vec<Order>> {
    orderings
        .split(',')
        .map(|name| {
            let (field_name, descending) = match name.trim() {
                "" => {
                    return Err(ApiError::InvalidQuery(
                        "Empty ordering name".to_string(),
                    ))
                }
                name if name.len() > 100 => {
                    return Err(ApiError::InvalidQuery(
                        "Ordering name too long".to_string(),
                    ))
                }
                name if name.starts_with('+') => (&name[1..], false),
                name if name.starts_with('-') => (&name[1..], true),
                name => (name, false),
            };

            let order = if descending {
                Order::Desc(field_name.to_string())
            } else {
                Order::Asc(field_name.to_string())
            };

            Ok(order)
        })
        .collect()
}

impl Paging {
    pub fn into_listing_params(self, default_page_size: u32) -> ApiResult<ListingParams> {
        let limit = self.limit.unwrap_or(default_page_size.into());
        let offset = self.offset.unwrap_or_default();
        let order = self.ordering.as_deref().map(parse_ordering).transpose()?;

        let params = ListingParams::new(offset, limit);
        Ok(match order {
            Some(order) => params.with_order(order),
            None => params,
        })
    }

    /// For listings which have no text search
    pub fn reject_search(&self) -> ApiResult<()> {
        match self.search {
            Some(_) => Err(ApiError::InvalidQuery(
                "search is not supported for this resource".to_string(),
            )),
            None => Ok(()),
        }
    }
}

/// Paginated response, `next` and `previous` are offsets of neighbouring pages
#[derive(Debug, Serialize)]
pub struct Page<T> {
    count: u64,
    next: Option<i64>,
    previous: Option<i64>,
    results: Vec<T>,
}

impl<T> Page<T>
where
    T: Serialize,
{
    pub fn from_batch(batch: Batch<T>) -> Self {
        let next = batch
            .offset
            .checked_add(batch.limit)
            .filter(|next| (*next as u64) < batch.total);
        let previous = if batch.offset > 0 {
            Some(batch.offset.saturating_sub(batch.limit).max(0))
        } else {
            None
        };
        Self {
            count: batch.total,
            next,
            previous,
            results: batch.rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(offset: i64, limit: i64, total: u64) -> Batch<i64> {
        Batch {
            offset,
            limit,
            total,
            rows: vec![],
        }
    }

    #[test]
    fn test_page_links() {
        let page = Page::from_batch(batch(0, 10, 25));
        assert_eq!(Some(10), page.next);
        assert_eq!(None, page.previous);

        let page = Page::from_batch(batch(10, 10, 25));
        assert_eq!(Some(20), page.next);
        assert_eq!(Some(0), page.previous);

        let page = Page::from_batch(batch(20, 10, 25));
        assert_eq!(None, page.next);
        assert_eq!(Some(10), page.previous);

        let page = Page::from_batch(batch(5, 10, 8));
        assert_eq!(None, page.next);
        assert_eq!(Some(0), page.previous);
    }

    #[test]
    fn test_huge_offset() {
        let paging = Paging {
            offset: Some(i64::MAX),
            ..Default::default()
        };
        assert!(paging.validate().is_ok());
        let params = paging.into_listing_params(10).unwrap();
        let page = Page::from_batch(batch(params.offset, params.limit, 3));
        assert_eq!(None, page.next);
        assert_eq!(Some(i64::MAX - 10), page.previous);
    }

    #[test]
    fn test_reject_search() {
        let paging = Paging {
            search: Some("dune".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            paging.reject_search(),
            Err(ApiError::InvalidQuery(_))
        ));
        assert!(Paging::default().reject_search().is_ok());
    }

    #[test]
    fn test_listing_params() {
        let paging = Paging {
            limit: None,
            offset: Some(5),
            ordering: Some("-year, name".to_string()),
            search: None,
        };
        let params = paging.into_listing_params(20).unwrap();
        assert_eq!(20, params.limit);
        assert_eq!(5, params.offset);
        assert_eq!(
            "t.year DESC, t.name",
            params
                .ordering(&[("year", "t.year"), ("name", "t.name")])
                .unwrap()
        );

        let paging = Paging {
            ordering: Some("name,,year".to_string()),
            ..Default::default()
        };
        assert!(paging.into_listing_params(20).is_err());

        let paging = Paging {
            limit: Some(0),
            ..Default::default()
        };
        assert!(paging.validate().is_err());
    }
}
