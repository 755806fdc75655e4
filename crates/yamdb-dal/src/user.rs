use futures::TryStreamExt as _;
use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, QueryBuilder};
use time::PrimitiveDateTime;
use tracing::{debug, warn};
use yamdb_types::{
    claim::{Authorization, Role},
    general::{ValidEmail, ValidUsername},
};

use crate::{error::Result, Batch, ChosenDB, Error, ListingParams};

const VALID_ORDER_FIELDS: &[(&str, &str)] = &[
    ("id", "id"),
    ("username", "username"),
    ("email", "email"),
    ("role", "role"),
    ("date_joined", "date_joined"),
];
const SELECT_USER: &str = "SELECT id, username, email, first_name, last_name, bio, role, \
is_superuser, last_login FROM users";

fn username_taken() -> Error {
    Error::already_exists("username", "A user with that username already exists")
}

fn email_taken() -> Error {
    Error::already_exists("email", "A user with that email already exists")
}

fn unique_field(db_message: &str) -> (&'static str, String) {
    if db_message.contains("users.email") {
        ("email", "A user with that email already exists".to_string())
    } else {
        (
            "username",
            "A user with that username already exists".to_string(),
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateUser {
    #[garde(dive)]
    pub username: ValidUsername,
    #[garde(dive)]
    pub email: ValidEmail,
    #[serde(default)]
    #[garde(length(max = 150))]
    pub first_name: String,
    #[serde(default)]
    #[garde(length(max = 150))]
    pub last_name: String,
    #[serde(default)]
    #[garde(skip)]
    pub bio: String,
    #[garde(skip)]
    pub role: Option<Role>,
    /// Only settable from command line
    #[serde(default, skip_deserializing)]
    #[garde(skip)]
    pub is_superuser: bool,
}

impl CreateUser {
    pub fn new(username: ValidUsername, email: ValidEmail) -> Self {
        CreateUser {
            username,
            email,
            first_name: String::new(),
            last_name: String::new(),
            bio: String::new(),
            role: None,
            is_superuser: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
pub struct UpdateUser {
    #[garde(dive)]
    pub username: Option<ValidUsername>,
    #[garde(dive)]
    pub email: Option<ValidEmail>,
    #[garde(length(max = 150))]
    pub first_name: Option<String>,
    #[garde(length(max = 150))]
    pub last_name: Option<String>,
    #[garde(skip)]
    pub bio: Option<String>,
    #[garde(skip)]
    pub role: Option<Role>,
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    first_name: String,
    last_name: String,
    bio: String,
    role: String,
    is_superuser: bool,
    last_login: Option<PrimitiveDateTime>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    #[serde(skip)]
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub role: Role,
    #[serde(skip)]
    pub is_superuser: bool,
    #[serde(skip)]
    pub last_login: Option<PrimitiveDateTime>,
}

impl From<UserRow> for User {
    fn from(value: UserRow) -> Self {
        let role = value.role.parse().unwrap_or_else(|_| {
            warn!("Unknown role {} of user {}", value.role, value.username);
            Role::default()
        });
        Self {
            id: value.id,
            username: value.username,
            email: value.email,
            first_name: value.first_name,
            last_name: value.last_name,
            bio: value.bio,
            role,
            is_superuser: value.is_superuser,
            last_login: value.last_login,
        }
    }
}

impl Authorization for User {
    fn role(&self) -> Role {
        self.role
    }

    fn is_superuser(&self) -> bool {
        self.is_superuser
    }
}

pub type UserRepository = UserRepositoryImpl<Pool<ChosenDB>>;

pub struct UserRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> UserRepositoryImpl<E>
where
    for<'a> &'a E: sqlx::Executor<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, payload: CreateUser) -> Result<User> {
        let role = payload.role.unwrap_or_default();
        let result = sqlx::query(
            "INSERT INTO users (username, email, first_name, last_name, bio, role, is_superuser) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(payload.username.as_ref())
        .bind(payload.email.as_ref())
        .bind(&payload.first_name)
        .bind(&payload.last_name)
        .bind(&payload.bio)
        .bind(role.as_str())
        .bind(payload.is_superuser)
        .execute(&self.executor)
        .await
        .map_err(|e| Error::on_unique_violation(e, unique_field))?;

        let id = result.last_insert_rowid();
        debug!("Created user {} with id {id}", payload.username);
        self.get(id).await
    }

    /// Returns existing user with exactly this username and email or creates new one.
    /// Username or email used by another account is an error.
    pub async fn signup(&self, username: &ValidUsername, email: &ValidEmail) -> Result<User> {
        if let Some(user) = self.find_by_username(username.as_ref()).await? {
            return if user.email == email.as_ref() {
                Ok(user)
            } else {
                Err(username_taken())
            };
        }

        let by_email = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE email = ?")
            .bind(email.as_ref())
            .fetch_optional(&self.executor)
            .await?;
        if by_email.is_some() {
            return Err(email_taken());
        }

        self.create(CreateUser::new(username.clone(), email.clone()))
            .await
    }

    pub async fn get(&self, id: i64) -> Result<User> {
        let mut query: QueryBuilder<ChosenDB> = QueryBuilder::new(SELECT_USER);
        query.push(" WHERE id = ").push_bind(id);
        query
            .build_query_as::<UserRow>()
            .fetch_optional(&self.executor)
            .await?
            .map(User::from)
            .ok_or_else(|| Error::RecordNotFound("User".to_string()))
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let mut query: QueryBuilder<ChosenDB> = QueryBuilder::new(SELECT_USER);
        query.push(" WHERE username = ").push_bind(username);
        let user = query
            .build_query_as::<UserRow>()
            .fetch_optional(&self.executor)
            .await?;
        Ok(user.map(User::from))
    }

    pub async fn get_by_username(&self, username: &str) -> Result<User> {
        self.find_by_username(username)
            .await?
            .ok_or_else(|| Error::RecordNotFound("User".to_string()))
    }

    /// Lists users, optionally only those with `search` contained in username
    pub async fn list(&self, params: ListingParams, search: Option<&str>) -> Result<Batch<User>> {
        let order = params.ordering_or(VALID_ORDER_FIELDS, "username")?;
        let pattern = search.map(crate::like_pattern);

        let mut count_query: QueryBuilder<ChosenDB> =
            QueryBuilder::new("SELECT COUNT(*) FROM users");
        let mut query: QueryBuilder<ChosenDB> = QueryBuilder::new(SELECT_USER);
        if let Some(pattern) = pattern {
            count_query
                .push(" WHERE username LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\'");
            query
                .push(" WHERE username LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\'");
        }
        query
            .push(" ORDER BY ")
            .push(order)
            .push(" LIMIT ")
            .push_bind(params.limit)
            .push(" OFFSET ")
            .push_bind(params.offset);

        let total: i64 = count_query
            .build_query_scalar::<i64>()
            .fetch_one(&self.executor)
            .await?;
        let rows = query
            .build_query_as::<UserRow>()
            .fetch(&self.executor)
            .map_ok(User::from)
            .try_collect::<Vec<_>>()
            .await?;

        Ok(Batch {
            offset: params.offset,
            limit: params.limit,
            total: total as u64,
            rows,
        })
    }

    pub async fn update(&self, username: &str, payload: UpdateUser) -> Result<User> {
        let user = self.get_by_username(username).await?;

        let mut query: QueryBuilder<ChosenDB> = QueryBuilder::new("UPDATE users SET ");
        let mut fields = query.separated(", ");
        let mut changed = false;
        if let Some(username) = payload.username {
            fields
                .push("username = ")
                .push_bind_unseparated(username.as_ref().to_string());
            changed = true;
        }
        if let Some(email) = payload.email {
            fields
                .push("email = ")
                .push_bind_unseparated(email.as_ref().to_string());
            changed = true;
        }
        if let Some(first_name) = payload.first_name {
            fields.push("first_name = ").push_bind_unseparated(first_name);
            changed = true;
        }
        if let Some(last_name) = payload.last_name {
            fields.push("last_name = ").push_bind_unseparated(last_name);
            changed = true;
        }
        if let Some(bio) = payload.bio {
            fields.push("bio = ").push_bind_unseparated(bio);
            changed = true;
        }
        if let Some(role) = payload.role {
            fields.push("role = ").push_bind_unseparated(role.as_str());
            changed = true;
        }
        if !changed {
            return Ok(user);
        }
        query.push(" WHERE id = ").push_bind(user.id);
        query
            .build()
            .execute(&self.executor)
            .await
            .map_err(|e| Error::on_unique_violation(e, unique_field))?;

        self.get(user.id).await
    }

    pub async fn set_role(&self, username: &str, role: Role) -> Result<User> {
        self.update(
            username,
            UpdateUser {
                role: Some(role),
                ..Default::default()
            },
        )
        .await
    }

    /// Stores time of login, which also invalidates confirmation codes issued before
    pub async fn record_login(&self, id: i64) -> Result<PrimitiveDateTime> {
        let now = crate::now();
        let res = sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(&self.executor)
            .await?;
        if res.rows_affected() == 0 {
            return Err(Error::RecordNotFound("User".to_string()));
        }
        Ok(now)
    }

    pub async fn delete(&self, username: &str) -> Result<()> {
        let res = sqlx::query("DELETE FROM users WHERE username = ?")
            .bind(username)
            .execute(&self.executor)
            .await?;

        if res.rows_affected() == 0 {
            Err(Error::RecordNotFound("User".to_string()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_user_payload() {
        let payload: CreateUser = serde_json::from_value(serde_json::json!({
            "username": "reviewer",
            "email": "reviewer@example.com",
            "role": "moderator",
            "is_superuser": true
        }))
        .unwrap();
        assert!(payload.validate().is_ok());
        assert_eq!(Some(Role::Moderator), payload.role);
        assert!(!payload.is_superuser);
        assert_eq!("", payload.bio);

        let payload: CreateUser = serde_json::from_value(serde_json::json!({
            "username": "me",
            "email": "me@example.com"
        }))
        .unwrap();
        assert!(payload.validate().is_err());
    }

    #[test]
    fn test_unique_field() {
        assert_eq!("email", unique_field("UNIQUE constraint failed: users.email").0);
        assert_eq!(
            "username",
            unique_field("UNIQUE constraint failed: users.username").0
        );
    }
}
