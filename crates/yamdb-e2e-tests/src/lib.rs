use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context as _, Result};
use rand::Rng as _;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::json;
use tempfile::TempDir;
use tracing::{error, info};
use url::Url;
use yamdb_app::state::AppState;
use yamdb_dal::user::{CreateUser, User, UserRepository};
use yamdb_server::{
    build_state,
    config::{Parser, ServerConfig},
    run::run_graceful_with_state,
};
use yamdb_types::claim::Role;

pub mod rest;

fn random_port() -> Result<u16> {
    let mut rng = rand::rng();

    let mut retries = 3;
    while retries > 0 {
        let port: u16 = rng.random_range(3030..4030);
        let addr: std::net::SocketAddr = format!("127.0.0.1:{}", port).parse()?;
        match std::net::TcpStream::connect_timeout(&addr, std::time::Duration::from_millis(100)) {
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => return Ok(port),
            Err(_) => retries -= 1,
            Ok(_) => retries -= 1,
        }
    }

    Err(anyhow!("Could not find a free port"))
}

pub struct ConfigGuard {
    #[allow(dead_code)]
    data_dir: TempDir,
}

pub fn test_config(test_name: &str, base_dir: &Path) -> Result<(ServerConfig, ConfigGuard)> {
    let tmp_data_dir = TempDir::with_prefix_in(format!("{}_", test_name), base_dir)?;
    let data_dir = tmp_data_dir.path().to_string_lossy().to_string();
    let mail_dir = tmp_data_dir.path().join("mail").to_string_lossy().to_string();
    let port = random_port()?;
    let port = port.to_string();
    let base_url = format!("http://localhost:{}/", port);
    let args = &[
        "yamdb-e2e-tests",
        "--data-dir",
        &data_dir,
        "--port",
        &port,
        "--base-url",
        &base_url,
        "--mail-dir",
        &mail_dir,
    ];
    let config = ServerConfig::try_parse_from(args)?;
    Ok((
        config,
        ConfigGuard {
            data_dir: tmp_data_dir,
        },
    ))
}

/// Config in fresh temporary data directory with migrated database
pub async fn prepare_env(test_name: &str) -> Result<(ServerConfig, ConfigGuard)> {
    let base_dir = std::env::temp_dir();
    let (args, guard) = test_config(test_name, &base_dir)?;
    let pool = yamdb_dal::new_pool(&args.database_url()).await?;
    yamdb_dal::migrate(&pool).await?;
    pool.close().await;
    Ok((args, guard))
}

async fn wait_for_port(port: u16) -> Result<()> {
    for _ in 0..100 {
        if tokio::net::TcpStream::connect(("127.0.0.1", port))
            .await
            .is_ok()
        {
            return Ok(());
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    Err(anyhow!("Server did not start listening on port {port}"))
}

/// Runs server in background task until the test runtime ends
pub async fn spawn_server(args: ServerConfig) -> Result<AppState> {
    let state = build_state(&args).await?;
    let port = args.port;
    let server_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) =
            run_graceful_with_state(args, server_state, std::future::pending::<()>()).await
        {
            error!("Server failed: {e}");
        }
    });
    wait_for_port(port).await?;
    Ok(state)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestUser {
    Admin,
    Moderator,
    User,
    Anonymous,
}

impl TestUser {
    fn identity(&self) -> Option<(&'static str, Role)> {
        match self {
            TestUser::Admin => Some(("admin", Role::Admin)),
            TestUser::Moderator => Some(("moderator", Role::Moderator)),
            TestUser::User => Some(("user", Role::User)),
            TestUser::Anonymous => None,
        }
    }
}

/// Running server and what tests need to talk to it
#[derive(Clone)]
pub struct TestEnv {
    pub base_url: Url,
    pub mail_dir: PathBuf,
    pub state: AppState,
}

impl TestEnv {
    /// URL of API resource, path is relative to version prefix
    pub fn api(&self, path: &str) -> Url {
        self.base_url
            .join("v1/")
            .and_then(|u| u.join(path))
            .expect("valid API path")
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.state.pool().clone())
    }

    /// Creates user directly in database
    pub async fn create_user(&self, username: &str, role: Role) -> Result<User> {
        let new_user = CreateUser {
            role: Some(role),
            ..CreateUser::new(username.parse()?, email_for(username).parse()?)
        };
        Ok(self.users().create(new_user).await?)
    }

    /// Goes through sign-up and token exchange, as real client would
    pub async fn obtain_token(&self, username: &str) -> Result<String> {
        let client = reqwest::Client::new();
        let response = client
            .post(self.api("auth/signup"))
            .json(&json!({"username": username, "email": email_for(username)}))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(anyhow!("Signup failed: {}", response.status()));
        }

        let code = take_confirmation_code(&self.mail_dir, username)?;
        let response = client
            .post(self.api("auth/token"))
            .json(&json!({"username": username, "confirmation_code": code}))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(anyhow!("Token request failed: {}", response.status()));
        }
        let body: serde_json::Value = response.json().await?;
        body["token"]
            .as_str()
            .map(|t| t.to_string())
            .ok_or_else(|| anyhow!("Token missing in response"))
    }

    /// Client of existing user or of a new one with given role
    pub async fn client_for(&self, username: &str, role: Role) -> Result<reqwest::Client> {
        if self.users().find_by_username(username).await?.is_none() {
            self.create_user(username, role).await?;
        }
        let token = self.obtain_token(username).await?;
        bearer_client(&token)
    }
}

pub fn email_for(username: &str) -> String {
    format!("{username}@example.com")
}

pub fn bearer_client(token: &str) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}"))?,
    );
    Ok(reqwest::Client::builder()
        .default_headers(headers)
        .build()?)
}

/// Reads confirmation code from stored mail for the user and removes the mail file
pub fn take_confirmation_code(mail_dir: &Path, username: &str) -> Result<String> {
    let greeting = format!("Hello {username},");
    for entry in std::fs::read_dir(mail_dir)
        .with_context(|| format!("Cannot read mail dir {}", mail_dir.display()))?
    {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("eml") {
            continue;
        }
        let content = std::fs::read_to_string(&path)?;
        if !content.contains(&greeting) {
            continue;
        }
        let code = content
            .lines()
            .map(str::trim)
            .skip_while(|l| *l != "your confirmation code is:")
            .skip(1)
            .find(|l| !l.is_empty())
            .map(|l| l.to_string())
            .ok_or_else(|| anyhow!("No code in mail {}", path.display()))?;
        std::fs::remove_file(&path)?;
        return Ok(code);
    }
    Err(anyhow!("No mail for user {username}"))
}

/// Starts server, client is authorized as given test user (or anonymous)
pub async fn launch_env(args: ServerConfig, user: TestUser) -> Result<(reqwest::Client, TestEnv)> {
    let base_url = args.base_url.clone();
    let mail_dir = args
        .mail_dir
        .clone()
        .ok_or_else(|| anyhow!("Mail dir is required for tests"))?;
    let state = spawn_server(args).await?;
    let env = TestEnv {
        base_url,
        mail_dir,
        state,
    };

    let client = match user.identity() {
        Some((username, role)) => env.client_for(username, role).await?,
        None => reqwest::Client::new(),
    };
    info!("Test environment ready for {user:?}");
    Ok((client, env))
}

pub fn extend_url(url: &Url, segment: impl ToString) -> Url {
    let mut url = url.clone();
    url.path_segments_mut()
        .expect("base URL")
        .push(&segment.to_string());
    url
}
