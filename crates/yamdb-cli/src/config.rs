use clap::{Parser, Subcommand};

use crate::commands::{create_user::CreateUserCmd, set_role::SetRoleCmd};

#[derive(Parser)]
#[command(
    version,
    about,
    long_about = "CLI for yamdb - administrative commands working directly on server database."
)]
pub struct CliConfig {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    CreateUser(CreateUserCmd),
    SetRole(SetRoleCmd),
}

impl crate::commands::Executor for Command {
    async fn run(self) -> anyhow::Result<()> {
        match self {
            Command::CreateUser(cmd) => cmd.run().await,
            Command::SetRole(cmd) => cmd.run().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yamdb_types::claim::Role;

    #[test]
    fn test_parse_create_user() {
        let config = CliConfig::try_parse_from([
            "yamdb-cli",
            "create-user",
            "--data-dir",
            "/tmp/yamdb",
            "--username",
            "boss",
            "--email",
            "boss@example.com",
            "--role",
            "admin",
            "--superuser",
        ])
        .unwrap();
        match config.command {
            Command::CreateUser(cmd) => {
                assert_eq!("boss", cmd.username.as_ref());
                assert_eq!(Some(Role::Admin), cmd.role);
                assert!(cmd.superuser);
            }
            _ => panic!("Expected create-user"),
        }
    }

    #[test]
    fn test_reject_invalid_input() {
        let res = CliConfig::try_parse_from([
            "yamdb-cli",
            "set-role",
            "--username",
            "boss",
            "--role",
            "emperor",
        ]);
        assert!(res.is_err());

        let res = CliConfig::try_parse_from([
            "yamdb-cli",
            "create-user",
            "--username",
            "me",
            "--email",
            "me@example.com",
        ]);
        assert!(res.is_err());
    }
}
