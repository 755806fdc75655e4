use clap::Parser;
use tracing::info;
use yamdb_dal::user::CreateUser;
use yamdb_types::{
    claim::Role,
    config::BackendConfig,
    general::{ValidEmail, ValidUsername},
};

use crate::commands::{create_user_repository, Executor};

#[derive(Parser, Debug)]
pub struct CreateUserCmd {
    #[command(flatten)]
    backend: BackendConfig,
    #[arg(short, long, help = "Username, used for login")]
    pub username: ValidUsername,
    #[arg(short, long, help = "User email, confirmation codes are sent there")]
    pub email: ValidEmail,
    #[arg(short, long, help = "Role of the user: user, moderator or admin")]
    pub role: Option<Role>,
    #[arg(long, help = "Superuser has all admin rights whatever the role is")]
    pub superuser: bool,
}

impl Executor for CreateUserCmd {
    async fn run(self) -> anyhow::Result<()> {
        let repository = create_user_repository(&self.backend.database_url()).await?;
        let new_user = CreateUser {
            role: self.role,
            is_superuser: self.superuser,
            ..CreateUser::new(self.username, self.email)
        };
        let user = repository.create(new_user).await?;
        info!("Created user {} with role {}", user.username, user.role);
        println!("{}", serde_json::to_string_pretty(&user)?);

        Ok(())
    }
}
