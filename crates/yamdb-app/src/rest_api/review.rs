use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json,
};
use http::StatusCode;
use tracing::debug;
use yamdb_dal::{
    review::{CreateReview, ReviewRepository, UpdateReview},
    title::TitleRepository,
};

use super::paging::{Page, Paging};
use crate::{
    auth::{permission::RequiredAccessLayer, CurrentUser},
    error::{ApiError, ApiResult},
    repository_from_request,
    state::AppState,
    validate::Garde,
};

repository_from_request!(ReviewRepository);

pub async fn create(
    Path(title_id): Path<i64>,
    user: CurrentUser,
    repository: ReviewRepository,
    Garde(Json(payload)): Garde<Json<CreateReview>>,
) -> ApiResult<impl IntoResponse> {
    let record = repository.create(title_id, user.0.id, payload).await?;

    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list(
    Path(title_id): Path<i64>,
    State(state): State<AppState>,
    titles: TitleRepository,
    repository: ReviewRepository,
    Garde(Query(paging)): Garde<Query<Paging>>,
) -> ApiResult<impl IntoResponse> {
    if !titles.exists(title_id).await? {
        return Err(ApiError::ResourceNotFound("Title".to_string()));
    }
    paging.reject_search()?;
    let params = paging.into_listing_params(state.get_app_config().default_page_size)?;
    let batch = repository.list(title_id, params).await?;
    Ok((StatusCode::OK, Json(Page::from_batch(batch))))
}

pub async fn get_review(
    Path((title_id, id)): Path<(i64, i64)>,
    repository: ReviewRepository,
) -> ApiResult<impl IntoResponse> {
    let record = repository.get(title_id, id).await?;

    Ok((StatusCode::OK, Json(record)))
}

pub async fn update(
    Path((title_id, id)): Path<(i64, i64)>,
    user: CurrentUser,
    repository: ReviewRepository,
    Garde(Json(payload)): Garde<Json<UpdateReview>>,
) -> ApiResult<impl IntoResponse> {
    let existing = repository.get(title_id, id).await?;
    if !user.can_modify(existing.author_id) {
        debug!("User {} cannot modify review {id}", user.0.username);
        return Err(ApiError::Forbidden);
    }
    let record = repository.update(title_id, id, payload).await?;

    Ok((StatusCode::OK, Json(record)))
}

pub async fn delete(
    Path((title_id, id)): Path<(i64, i64)>,
    user: CurrentUser,
    repository: ReviewRepository,
) -> ApiResult<impl IntoResponse> {
    let existing = repository.get(title_id, id).await?;
    if !user.can_modify(existing.author_id) {
        debug!("User {} cannot delete review {id}", user.0.username);
        return Err(ApiError::Forbidden);
    }
    repository.delete(title_id, id).await?;

    Ok((StatusCode::NO_CONTENT, ()))
}

/// Reviews of one title, nested under `/titles/{title_id}/reviews`
pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", get(list).post(create))
        .route("/{review_id}", get(get_review).patch(update).delete(delete))
        .layer(RequiredAccessLayer::authenticated_or_read_only())
        .nest("/{review_id}/comments", super::comment::router())
}
