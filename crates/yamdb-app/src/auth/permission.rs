use std::{
    convert::Infallible,
    task::{Context, Poll},
};

use axum::{
    extract::Request,
    response::{IntoResponse, Response},
};
use futures::future::{BoxFuture, FutureExt as _};
use http::Method;
use tower::{Layer, Service};
use tracing::debug;
use yamdb_types::claim::Authorization as _;

use super::Actor;
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Anyone can read, only admin can change
    AdminOrReadOnly,
    Admin,
    /// Anyone can read, any logged in user can change (object ownership is checked in handler)
    AuthenticatedOrReadOnly,
    Authenticated,
}

fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

impl Access {
    pub fn allows(&self, method: &Method, actor: &Actor) -> bool {
        let user = actor.user();
        match self {
            Access::AdminOrReadOnly => is_safe(method) || user.is_some_and(|u| u.is_admin()),
            Access::Admin => user.is_some_and(|u| u.is_admin()),
            Access::AuthenticatedOrReadOnly => is_safe(method) || user.is_some(),
            Access::Authenticated => user.is_some(),
        }
    }
}

/// Coarse, per router, access check, denied request gets 403
#[derive(Debug, Clone, Copy)]
pub struct RequiredAccessLayer {
    access: Access,
}

impl RequiredAccessLayer {
    pub fn new(access: Access) -> Self {
        Self { access }
    }

    pub fn admin_or_read_only() -> Self {
        Self::new(Access::AdminOrReadOnly)
    }

    pub fn admin() -> Self {
        Self::new(Access::Admin)
    }

    pub fn authenticated_or_read_only() -> Self {
        Self::new(Access::AuthenticatedOrReadOnly)
    }

    pub fn authenticated() -> Self {
        Self::new(Access::Authenticated)
    }
}

impl<S> Layer<S> for RequiredAccessLayer {
    type Service = RequiredAccess<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequiredAccess {
            inner,
            access: self.access,
        }
    }
}

#[derive(Clone)]
pub struct RequiredAccess<S> {
    inner: S,
    access: Access,
}

impl<S> Service<Request> for RequiredAccess<S>
where
    S: Service<Request, Response = Response, Error = Infallible> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let actor = req
            .extensions()
            .get::<Actor>()
            .cloned()
            .unwrap_or_default();
        if self.access.allows(req.method(), &actor) {
            self.inner.call(req).boxed()
        } else {
            debug!(
                "{} {} denied for {:?} with {:?}",
                req.method(),
                req.uri(),
                actor.username(),
                self.access
            );
            futures::future::ready(Ok(ApiError::Forbidden.into_response())).boxed()
        }
    }
}
