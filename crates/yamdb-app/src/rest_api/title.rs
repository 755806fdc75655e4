use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json,
};
use garde::Validate;
use http::StatusCode;
use serde::Deserialize;
use yamdb_dal::title::{CreateTitle, TitleFilter, TitleRepository, UpdateTitle};

use super::paging::{Page, Paging};
use crate::{
    auth::permission::RequiredAccessLayer, error::ApiResult, repository_from_request,
    state::AppState, validate::Garde,
};

repository_from_request!(TitleRepository);

#[derive(Debug, Deserialize, Validate)]
pub struct TitleQuery {
    #[garde(length(max = 256))]
    pub name: Option<String>,
    #[garde(skip)]
    pub year: Option<i32>,
    #[garde(length(max = 50))]
    pub genre: Option<String>,
    #[garde(length(max = 50))]
    pub category: Option<String>,
}

impl From<TitleQuery> for TitleFilter {
    fn from(value: TitleQuery) -> Self {
        TitleFilter {
            name: value.name,
            year: value.year,
            genre: value.genre,
            category: value.category,
        }
    }
}

pub async fn create(
    repository: TitleRepository,
    Garde(Json(payload)): Garde<Json<CreateTitle>>,
) -> ApiResult<impl IntoResponse> {
    let record = repository.create(payload).await?;

    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list(
    State(state): State<AppState>,
    repository: TitleRepository,
    Garde(Query(paging)): Garde<Query<Paging>>,
    Garde(Query(filter)): Garde<Query<TitleQuery>>,
) -> ApiResult<impl IntoResponse> {
    paging.reject_search()?;
    let params = paging.into_listing_params(state.get_app_config().default_page_size)?;
    let batch = repository.list(params, filter.into()).await?;
    Ok((StatusCode::OK, Json(Page::from_batch(batch))))
}

pub async fn get_title(
    Path(id): Path<i64>,
    repository: TitleRepository,
) -> ApiResult<impl IntoResponse> {
    let record = repository.get(id).await?;

    Ok((StatusCode::OK, Json(record)))
}

pub async fn update(
    Path(id): Path<i64>,
    repository: TitleRepository,
    Garde(Json(payload)): Garde<Json<UpdateTitle>>,
) -> ApiResult<impl IntoResponse> {
    let record = repository.update(id, payload).await?;

    Ok((StatusCode::OK, Json(record)))
}

pub async fn delete(
    Path(id): Path<i64>,
    repository: TitleRepository,
) -> ApiResult<impl IntoResponse> {
    repository.delete(id).await?;

    Ok((StatusCode::NO_CONTENT, ()))
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", get(list).post(create))
        .route("/{title_id}", get(get_title).patch(update).delete(delete))
        .layer(RequiredAccessLayer::admin_or_read_only())
        .nest("/{title_id}/reviews", super::review::router())
}
