use crate::{
    auth::{permission::RequiredAccessLayer, CurrentUser},
    error::ApiResult,
    rest_api::paging::{Page, Paging},
    validate::Garde,
};
use yamdb_dal::user::{CreateUser, UpdateUser, UserRepository};

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json,
};
use http::StatusCode;

use crate::state::AppState;

pub async fn create_user(
    user_registry: UserRepository,
    Garde(Json(payload)): Garde<Json<CreateUser>>,
) -> ApiResult<impl IntoResponse> {
    let user = user_registry.create(payload).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

async fn list_users(
    State(state): State<AppState>,
    user_registry: UserRepository,
    Garde(Query(paging)): Garde<Query<Paging>>,
) -> ApiResult<impl IntoResponse> {
    let search = paging.search.clone();
    let params = paging.into_listing_params(state.get_app_config().default_page_size)?;
    let users = user_registry.list(params, search.as_deref()).await?;
    Ok((StatusCode::OK, Json(Page::from_batch(users))))
}

async fn get_user(
    Path(username): Path<String>,
    user_registry: UserRepository,
) -> ApiResult<impl IntoResponse> {
    let user = user_registry.get_by_username(&username).await?;
    Ok((StatusCode::OK, Json(user)))
}

async fn update_user(
    Path(username): Path<String>,
    user_registry: UserRepository,
    Garde(Json(payload)): Garde<Json<UpdateUser>>,
) -> ApiResult<impl IntoResponse> {
    let user = user_registry.update(&username, payload).await?;
    Ok((StatusCode::OK, Json(user)))
}

async fn delete_user(
    Path(username): Path<String>,
    user_registry: UserRepository,
) -> ApiResult<impl IntoResponse> {
    user_registry.delete(&username).await?;

    Ok((StatusCode::NO_CONTENT, ()))
}

async fn me(user: CurrentUser) -> ApiResult<impl IntoResponse> {
    Ok((StatusCode::OK, Json(user.0.as_ref().clone())))
}

async fn update_me(
    user: CurrentUser,
    user_registry: UserRepository,
    Garde(Json(mut payload)): Garde<Json<UpdateUser>>,
) -> ApiResult<impl IntoResponse> {
    // role is read only here
    payload.role = None;
    let user = user_registry.update(&user.0.username, payload).await?;
    Ok((StatusCode::OK, Json(user)))
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", get(list_users).post(create_user))
        .route(
            "/{username}",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .layer(RequiredAccessLayer::admin())
        .route(
            "/me",
            get(me)
                .patch(update_me)
                .layer(RequiredAccessLayer::authenticated()),
        )
}
