use std::path::Path;

use crate::config::ServerConfig;
use crate::error::Result;
use anyhow::{bail, Context as _};
use axum::http::StatusCode;
use axum::{extract::Request, response::IntoResponse, routing::get, Router, ServiceExt};
use futures::FutureExt;
use tokio::{fs, io::AsyncWriteExt as _};
use tower::Layer as _;
use tower_http::normalize_path::NormalizePathLayer;
use tracing::{debug, info, warn};
use yamdb_app::{
    auth::token::TokenLayer,
    mail::Mailer,
    rest_api::api_router,
    state::{AppConfig, AppState},
};
use yamdb_auth::{confirmation::ConfirmationCodes, token::TokenManager};

const SECRET_LENGTH: usize = 64;

pub async fn run(args: ServerConfig) -> Result<()> {
    let state = build_state(&args).await?;
    run_with_state(args, state).await
}

pub async fn run_with_state(args: ServerConfig, state: AppState) -> Result<()> {
    let shutdown = tokio::signal::ctrl_c().map(|_| ());
    run_graceful_with_state(args, state, shutdown).await
}

pub async fn run_graceful_with_state<S>(
    args: ServerConfig,
    state: AppState,
    shutdown_signal: S,
) -> Result<()>
where
    S: std::future::Future<Output = ()> + Send + 'static,
{
    let mut app = main_router(state);

    if args.cors {
        app = app.layer(tower_http::cors::CorsLayer::very_permissive());
    }

    // Trailing slash must be removed before routing
    let app = NormalizePathLayer::trim_trailing_slash().layer(app);

    let ip: std::net::IpAddr = args.listen_address.parse()?;
    let addr = std::net::SocketAddr::from((ip, args.port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server stopped");
    Ok(())
}

pub fn main_router(state: AppState) -> Router<()> {
    Router::new()
        .nest(
            "/v1",
            api_router().layer(TokenLayer::new(state.clone())),
        )
        .with_state(state)
        .route("/health", get(health))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

fn build_mailer(config: &ServerConfig) -> Result<Mailer> {
    if let Some(url) = &config.smtp_url {
        info!("Mail will be sent by SMTP");
        Ok(Mailer::smtp(url)?)
    } else if let Some(dir) = &config.mail_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create mail directory {}", dir.display()))?;
        info!("Mail will be stored in {}", dir.display());
        Ok(Mailer::dir(dir))
    } else {
        warn!("No mail transport configured, mail will be only logged");
        Ok(Mailer::Log)
    }
}

pub async fn build_state(config: &ServerConfig) -> Result<AppState> {
    let data_dir = config.data_dir();
    if !data_dir.is_dir() {
        fs::create_dir_all(&data_dir).await?;
        info!("Created data directory {}", data_dir.display());
    }

    let pool = yamdb_dal::new_pool(&config.database_url()).await?;
    yamdb_dal::migrate(&pool).await?;
    debug!("Database {} migrated", config.database_url());

    let secret = read_secret(&data_dir).await?;
    if secret.len() != SECRET_LENGTH {
        bail!("Secret file must contain {SECRET_LENGTH} bytes, delete it to get new one");
    }
    let tokens = TokenManager::new(&secret[0..32], config.token_validity);
    let codes = ConfirmationCodes::new(&secret[32..], config.confirmation_code_validity);

    let app_config = AppConfig {
        base_url: config.base_url.clone(),
        default_page_size: config.default_page_size,
        mail_from: config.mail_from.clone(),
    };

    Ok(AppState::new(
        app_config,
        pool,
        tokens,
        codes,
        build_mailer(config)?,
    ))
}

async fn read_secret(data_dir: &Path) -> Result<Vec<u8>, std::io::Error> {
    let secret_file = data_dir.join("secret");

    let secret = if fs::try_exists(&secret_file).await? {
        fs::read(&secret_file).await?
    } else {
        let random_bytes = rand::random::<[u8; SECRET_LENGTH]>();
        #[cfg(unix)]
        let mut file = {
            use std::fs::OpenOptions;
            use std::os::unix::fs::OpenOptionsExt;
            {
                // Make sure the file is only accessible by the current user
                let _f = OpenOptions::new()
                    .mode(0o600)
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(&secret_file)?;
            }
            fs::File::options().write(true).open(&secret_file).await?
        };
        #[cfg(not(unix))]
        let mut file = fs::File::create(&secret_file).await?;

        file.write_all(&random_bytes).await?;
        random_bytes.as_ref().to_vec()
    };
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_secret_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let first = read_secret(dir.path()).await.unwrap();
        assert_eq!(SECRET_LENGTH, first.len());
        let second = read_secret(dir.path()).await.unwrap();
        assert_eq!(first, second);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let meta = std::fs::metadata(dir.path().join("secret")).unwrap();
            assert_eq!(0o600, meta.permissions().mode() & 0o777);
        }
    }
}
