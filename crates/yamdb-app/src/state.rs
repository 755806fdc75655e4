use std::sync::Arc;

use url::Url;
use yamdb_auth::{confirmation::ConfirmationCodes, token::TokenManager};
use yamdb_dal::Pool;

use crate::mail::Mailer;

#[derive(Clone)]
pub struct AppState {
    state: Arc<AppStateInner>,
}

impl AppState {
    pub fn new(
        app_config: AppConfig,
        pool: Pool,
        tokens: TokenManager,
        codes: ConfirmationCodes,
        mailer: Mailer,
    ) -> Self {
        AppState {
            state: Arc::new(AppStateInner {
                app_config,
                pool,
                tokens,
                codes,
                mailer,
            }),
        }
    }

    pub fn get_app_config(&self) -> &AppConfig {
        &self.state.app_config
    }

    pub fn build_url(&self, relative_url: &str) -> Result<Url, url::ParseError> {
        self.get_app_config().base_url.join(relative_url)
    }

    pub fn pool(&self) -> &Pool {
        &self.state.pool
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.state.tokens
    }

    pub fn codes(&self) -> &ConfirmationCodes {
        &self.state.codes
    }

    pub fn mailer(&self) -> &Mailer {
        &self.state.mailer
    }
}

struct AppStateInner {
    pool: Pool,
    app_config: AppConfig,
    tokens: TokenManager,
    codes: ConfirmationCodes,
    mailer: Mailer,
}

pub struct AppConfig {
    pub base_url: Url,
    /// Page size used when request does not give `limit`
    pub default_page_size: u32,
    /// Sender of confirmation mails
    pub mail_from: String,
}
