use yamdb_dal::user::UserRepository;

pub mod create_user;
pub mod set_role;

#[allow(async_fn_in_trait)]
pub trait Executor {
    async fn run(self) -> anyhow::Result<()>;
}

/// Opens database with schema brought up to date, so commands work also before first server start
pub(crate) async fn create_user_repository(database_url: &str) -> anyhow::Result<UserRepository> {
    let pool = yamdb_dal::new_pool(database_url).await?;
    yamdb_dal::migrate(&pool).await?;
    Ok(UserRepository::new(pool))
}
