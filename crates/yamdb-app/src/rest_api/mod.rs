pub mod category;
pub mod comment;
pub mod genre;
pub mod paging;
pub mod review;
pub mod title;

use crate::state::AppState;

/// Handlers and router for categories-like resources: list, create and delete by slug
#[macro_export]
macro_rules! slug_api {
    ($repository:ty, $create_type:ty) => {
        $crate::repository_from_request!($repository);
        pub mod slug_api {
            use super::*;
            use $crate::error::ApiResult;
            use $crate::rest_api::paging::{Page, Paging};
            use $crate::state::AppState;
            use $crate::validate::Garde;
            use axum::{
                extract::{Path, Query, State},
                response::IntoResponse,
                Json,
            };
            use http::StatusCode;

            pub async fn create(
                repository: $repository,
                Garde(Json(payload)): Garde<Json<$create_type>>,
            ) -> ApiResult<impl IntoResponse> {
                let record = repository.create(payload).await?;

                Ok((StatusCode::CREATED, Json(record)))
            }

            pub async fn list(
                State(state): State<AppState>,
                repository: $repository,
                Garde(Query(paging)): Garde<Query<Paging>>,
            ) -> ApiResult<impl IntoResponse> {
                let search = paging.search.clone();
                let params =
                    paging.into_listing_params(state.get_app_config().default_page_size)?;
                let batch = repository.list(params, search.as_deref()).await?;
                Ok((StatusCode::OK, Json(Page::from_batch(batch))))
            }

            pub async fn delete(
                Path(slug): Path<String>,
                repository: $repository,
            ) -> ApiResult<impl IntoResponse> {
                repository.delete_by_slug(&slug).await?;

                Ok((StatusCode::NO_CONTENT, ()))
            }
        }

        pub fn router() -> axum::Router<$crate::state::AppState> {
            use axum::routing::{delete, get};
            axum::Router::new()
                .route("/", get(slug_api::list).post(slug_api::create))
                .route("/{slug}", delete(slug_api::delete))
                .layer($crate::auth::permission::RequiredAccessLayer::admin_or_read_only())
        }
    };
}

/// All resources of API, to be nested under version prefix
pub fn api_router() -> axum::Router<AppState> {
    axum::Router::new()
        .nest("/categories", category::router())
        .nest("/genres", genre::router())
        .nest("/titles", title::router())
        .nest("/users", crate::user::router())
        .nest("/auth", crate::auth::auth_router())
}
