use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{FromRequestParts, State},
    response::IntoResponse,
    routing::post,
    Json,
};
use garde::Validate;
use http::request::Parts;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info};
use yamdb_auth::confirmation::CodeSubject;
use yamdb_dal::user::{User, UserRepository};
use yamdb_types::{
    claim::{ApiClaim, Authorization},
    general::{ValidEmail, ValidUsername},
};

use crate::{
    error::{ApiError, ApiResult},
    repository_from_request,
    state::AppState,
    validate::Garde,
};

pub mod permission;
pub mod token;

repository_from_request!(UserRepository);

/// Who is making the request, as resolved by [`token::TokenLayer`]
#[derive(Debug, Clone, Default)]
pub enum Actor {
    #[default]
    Anonymous,
    User(Arc<User>),
}

impl Actor {
    pub fn user(&self) -> Option<&User> {
        match self {
            Actor::Anonymous => None,
            Actor::User(user) => Some(user),
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.user().map(|u| u.username.as_str())
    }
}

impl FromRequestParts<AppState> for Actor {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Actor>().cloned().unwrap_or_default())
    }
}

/// Logged in user, anonymous request is rejected with 403
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Arc<User>);

impl CurrentUser {
    /// Owner of content, moderator or admin
    pub fn can_modify(&self, owner_id: i64) -> bool {
        self.0.can_moderate(self.0.id, owner_id)
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Actor>() {
            Some(Actor::User(user)) => Ok(CurrentUser(user.clone())),
            _ => Err(ApiError::Forbidden),
        }
    }
}

pub(crate) fn code_subject(user: &User) -> CodeSubject<'_> {
    CodeSubject {
        user_id: user.id,
        email: &user.email,
        last_login: user
            .last_login
            .map(|t| t.assume_utc().unix_timestamp_nanos()),
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SignUp {
    #[garde(dive)]
    pub username: ValidUsername,
    #[garde(dive)]
    pub email: ValidEmail,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TokenRequest {
    #[garde(length(min = 1, max = 150))]
    pub username: String,
    #[garde(length(min = 1, max = 250))]
    pub confirmation_code: String,
}

async fn send_confirmation_code(state: &AppState, user: &User, code: &str) -> ApiResult<()> {
    let token_url = state
        .build_url("v1/auth/token/")
        .map_err(|e| ApiError::InternalError(format!("Cannot build token URL: {e}")))?;
    let body = format!(
        "Hello {},\n\nyour confirmation code is:\n\n{code}\n\nExchange it for access token at:\n{token_url}\n",
        user.username
    );
    state
        .mailer()
        .send(
            &state.get_app_config().mail_from,
            &user.email,
            "Confirmation code",
            body,
        )
        .await?;
    Ok(())
}

pub async fn signup(
    State(state): State<AppState>,
    users: UserRepository,
    Garde(Json(payload)): Garde<Json<SignUp>>,
) -> ApiResult<impl IntoResponse> {
    let user = users.signup(&payload.username, &payload.email).await?;
    let code = state.codes().make(&code_subject(&user))?;
    // User stays registered, repeated sign-up with same username and email sends new code
    if let Err(e) = send_confirmation_code(&state, &user, &code).await {
        error!(
            "Confirmation code for registered user {} was not delivered: {e}",
            user.username
        );
        return Err(e);
    }
    info!("Confirmation code sent to user {}", user.username);

    Ok(Json(payload))
}

pub async fn token(
    State(state): State<AppState>,
    users: UserRepository,
    Garde(Json(payload)): Garde<Json<TokenRequest>>,
) -> ApiResult<impl IntoResponse> {
    let user = users.get_by_username(&payload.username).await?;
    if let Err(e) = state
        .codes()
        .check(&code_subject(&user), &payload.confirmation_code)
    {
        debug!("Confirmation code of {} rejected: {e}", user.username);
        return Err(ApiError::field(
            "confirmation_code",
            "Invalid confirmation code",
        ));
    }

    // Moves last login, so this code cannot be used again
    users.record_login(user.id).await?;
    let claim = ApiClaim::new_expired(user.id.to_string(), user.username.clone(), user.role);
    let token = state.tokens().issue(claim)?;
    info!("Issued token for user {}", user.username);

    Ok(Json(json!({ "token": token })))
}

/// Builds authentication router - must be nested on /auth path!
pub fn auth_router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/signup", post(signup))
        .route("/token", post(token))
}
