use std::{
    convert::Infallible,
    task::{Context, Poll},
};

use axum::{
    extract::{FromRequestParts, Request},
    response::{IntoResponse, Response},
};
use axum_extra::TypedHeader;
use futures::future::BoxFuture;
use headers::{authorization::Bearer, Authorization};
use http::request::Parts;
use tower::{Layer, Service};
use tracing::debug;
use yamdb_dal::user::UserRepository;
use yamdb_types::claim::ApiClaim;

use super::Actor;
use crate::{error::ApiError, state::AppState};

/// Resolves request's bearer token to [`Actor`], stored in request extensions.
///
/// Request without `Authorization` header is anonymous, bad or expired token,
/// or token of deleted user is rejected with 401.
#[derive(Clone)]
pub struct TokenLayer {
    state: AppState,
}

impl TokenLayer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl<S> Layer<S> for TokenLayer {
    type Service = TokenService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TokenService {
            inner,
            state: self.state.clone(),
        }
    }
}

#[derive(Clone)]
pub struct TokenService<S> {
    inner: S,
    state: AppState,
}

async fn authenticate(parts: &mut Parts, state: &AppState) -> Result<Actor, ApiError> {
    let header = match TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state).await
    {
        Ok(TypedHeader(header)) => header,
        Err(e) if e.is_missing() => return Ok(Actor::Anonymous),
        Err(e) => return Err(ApiError::Unauthorized(e.to_string())),
    };

    let claim = state
        .tokens()
        .validate::<ApiClaim>(header.token())
        .map_err(|e| ApiError::Unauthorized(format!("Failed to validate token: {e}")))?;
    let user_id = claim
        .user_id()
        .ok_or_else(|| ApiError::Unauthorized(format!("Invalid subject {}", claim.sub)))?;

    // Always fresh user, so role change or deletion applies immediately
    let user = UserRepository::new(state.pool().clone())
        .get(user_id)
        .await
        .map_err(|e| match e {
            yamdb_dal::Error::RecordNotFound(_) => {
                ApiError::Unauthorized(format!("User {user_id} not found"))
            }
            other => other.into(),
        })?;
    debug!("Request by {} ({})", user.username, user.role);
    Ok(Actor::User(user.into()))
}

impl<S> Service<Request> for TokenService<S>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let state = self.state.clone();
        // ready inner service goes into the future, clone stays for next call
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let (mut parts, body) = req.into_parts();
            match authenticate(&mut parts, &state).await {
                Ok(actor) => {
                    parts.extensions.insert(actor);
                    inner.call(Request::from_parts(parts, body)).await
                }
                Err(e) => Ok(e.into_response()),
            }
        })
    }
}
