use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json,
};
use http::StatusCode;
use tracing::debug;
use yamdb_dal::{
    comment::{CommentRepository, CreateComment, UpdateComment},
    review::ReviewRepository,
};

use super::paging::{Page, Paging};
use crate::{
    auth::{permission::RequiredAccessLayer, CurrentUser},
    error::{ApiError, ApiResult},
    repository_from_request,
    state::AppState,
    validate::Garde,
};

repository_from_request!(CommentRepository);

pub async fn create(
    Path((title_id, review_id)): Path<(i64, i64)>,
    user: CurrentUser,
    reviews: ReviewRepository,
    repository: CommentRepository,
    Garde(Json(payload)): Garde<Json<CreateComment>>,
) -> ApiResult<impl IntoResponse> {
    reviews.get(title_id, review_id).await?;
    let record = repository.create(review_id, user.0.id, payload).await?;

    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list(
    Path((title_id, review_id)): Path<(i64, i64)>,
    State(state): State<AppState>,
    reviews: ReviewRepository,
    repository: CommentRepository,
    Garde(Query(paging)): Garde<Query<Paging>>,
) -> ApiResult<impl IntoResponse> {
    reviews.get(title_id, review_id).await?;
    paging.reject_search()?;
    let params = paging.into_listing_params(state.get_app_config().default_page_size)?;
    let batch = repository.list(review_id, params).await?;
    Ok((StatusCode::OK, Json(Page::from_batch(batch))))
}

pub async fn get_comment(
    Path((title_id, review_id, id)): Path<(i64, i64, i64)>,
    reviews: ReviewRepository,
    repository: CommentRepository,
) -> ApiResult<impl IntoResponse> {
    reviews.get(title_id, review_id).await?;
    let record = repository.get(review_id, id).await?;

    Ok((StatusCode::OK, Json(record)))
}

pub async fn update(
    Path((title_id, review_id, id)): Path<(i64, i64, i64)>,
    user: CurrentUser,
    reviews: ReviewRepository,
    repository: CommentRepository,
    Garde(Json(payload)): Garde<Json<UpdateComment>>,
) -> ApiResult<impl IntoResponse> {
    reviews.get(title_id, review_id).await?;
    let existing = repository.get(review_id, id).await?;
    if !user.can_modify(existing.author_id) {
        debug!("User {} cannot modify comment {id}", user.0.username);
        return Err(ApiError::Forbidden);
    }
    let record = repository.update(review_id, id, payload).await?;

    Ok((StatusCode::OK, Json(record)))
}

pub async fn delete(
    Path((title_id, review_id, id)): Path<(i64, i64, i64)>,
    user: CurrentUser,
    reviews: ReviewRepository,
    repository: CommentRepository,
) -> ApiResult<impl IntoResponse> {
    reviews.get(title_id, review_id).await?;
    let existing = repository.get(review_id, id).await?;
    if !user.can_modify(existing.author_id) {
        debug!("User {} cannot delete comment {id}", user.0.username);
        return Err(ApiError::Forbidden);
    }
    repository.delete(review_id, id).await?;

    Ok((StatusCode::NO_CONTENT, ()))
}

/// Comments of one review, nested under `/titles/{title_id}/reviews/{review_id}/comments`
pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", get(list).post(create))
        .route("/{comment_id}", get(get_comment).patch(update).delete(delete))
        .layer(RequiredAccessLayer::authenticated_or_read_only())
}
