use crate::sqlx_repo::SQLxRepo;
use crate::user_repo::{NewUser, User, UserId, UserRepo, UserRepoError};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{query, query_as, Executor, MySql};
use tracing::instrument;

const USER_COLUMNS: &str = "user_id, email, google_id, first_name, last_name, phone_number, \
                            sms_enabled, created_at, last_login";

#[derive(sqlx::FromRow)]
struct UserEntry {
    user_id: i32,
    email: String,
    google_id: String,
    first_name: Option<String>,
    last_name: Option<String>,
    phone_number: Option<String>,
    sms_enabled: bool,
    created_at: DateTime<Utc>,
    last_login: Option<DateTime<Utc>>,
}

impl From<UserEntry> for User {
    fn from(u: UserEntry) -> Self {
        User {
            id: u.user_id,
            email: u.email,
            google_id: u.google_id,
            first_name: u.first_name,
            last_name: u.last_name,
            phone_number: u.phone_number,
            sms_enabled: u.sms_enabled,
            created_at: u.created_at,
            last_login: u.last_login,
        }
    }
}

impl SQLxRepo {
    async fn get_user_entry<'e, E>(
        db_executor: E,
        user_id: UserId,
    ) -> Result<Option<UserEntry>, UserRepoError>
    where
        E: Executor<'e, Database = MySql>,
    {
        let user_entry = query_as::<_, UserEntry>(&format!(
            "SELECT {} FROM users WHERE user_id = ?",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(db_executor)
        .await
        .with_context(|| format!("Unable to get user {}", user_id))?;
        Ok(user_entry)
    }

    async fn get_user_entry_by_google_id<'e, E>(
        db_executor: E,
        google_id: &str,
    ) -> Result<Option<UserEntry>, UserRepoError>
    where
        E: Executor<'e, Database = MySql>,
    {
        let user_entry = query_as::<_, UserEntry>(&format!(
            "SELECT {} FROM users WHERE google_id = ?",
            USER_COLUMNS
        ))
        .bind(google_id)
        .fetch_optional(db_executor)
        .await
        .with_context(|| format!("Unable to get user with google id {}", google_id))?;
        Ok(user_entry)
    }

    async fn insert_user_entry<'e, E>(
        db_executor: E,
        new_user: &NewUser,
        last_login: Option<DateTime<Utc>>,
    ) -> Result<UserId, UserRepoError>
    where
        E: Executor<'e, Database = MySql>,
    {
        let result = query(
            "INSERT INTO users (email, google_id, first_name, last_name, phone_number, sms_enabled, last_login) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(new_user.email.as_str())
        .bind(new_user.google_id.as_str())
        .bind(new_user.first_name.as_deref())
        .bind(new_user.last_name.as_deref())
        .bind(new_user.phone_number.as_deref())
        .bind(new_user.sms_enabled)
        .bind(last_login)
        .execute(db_executor)
        .await;

        match result {
            Ok(result) => {
                let id = UserId::try_from(result.last_insert_id())
                    .context("User id out of range")?;
                Ok(id)
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(UserRepoError::UserAlreadyExists(new_user.email.clone()))
            }
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("Unable to create user {}", new_user.email))
                .into()),
        }
    }
}

#[async_trait]
impl UserRepo for SQLxRepo {
    #[instrument(skip(self))]
    async fn get_user(&self, user_id: UserId) -> Result<User, UserRepoError> {
        Self::get_user_entry(&self.pool, user_id)
            .await?
            .map(|u| u.into())
            .ok_or(UserRepoError::UserNotFound(user_id))
    }

    #[instrument(skip(self))]
    async fn get_user_by_google_id(&self, google_id: &str) -> Result<Option<User>, UserRepoError> {
        let user_entry = Self::get_user_entry_by_google_id(&self.pool, google_id).await?;
        Ok(user_entry.map(|u| u.into()))
    }

    #[instrument(skip(self, new_user), fields(email = %new_user.email))]
    async fn create_user(&self, new_user: NewUser) -> Result<User, UserRepoError> {
        let user_id = Self::insert_user_entry(&self.pool, &new_user, None).await?;
        self.get_user(user_id).await
    }

    #[instrument(skip(self, new_user), fields(google_id = %new_user.google_id))]
    async fn sign_in(&self, new_user: NewUser) -> Result<User, UserRepoError> {
        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Unable to start transaction")?;

        let existing = Self::get_user_entry_by_google_id(&mut *tx, &new_user.google_id).await?;
        let user_id = match existing {
            Some(user_entry) => {
                query("UPDATE users SET last_login = ? WHERE user_id = ?")
                    .bind(now)
                    .bind(user_entry.user_id)
                    .execute(&mut *tx)
                    .await
                    .with_context(|| format!("Unable to record login for {}", user_entry.user_id))?;
                user_entry.user_id
            }
            None => Self::insert_user_entry(&mut *tx, &new_user, Some(now)).await?,
        };

        let user_entry = Self::get_user_entry(&mut *tx, user_id)
            .await?
            .ok_or(UserRepoError::UserNotFound(user_id))?;
        tx.commit().await.context("Unable to commit sign-in")?;

        Ok(user_entry.into())
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, user_id: UserId) -> Result<(), UserRepoError> {
        let result = query("DELETE FROM users WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Unable to delete user {}", user_id))?;
        if result.rows_affected() == 1 {
            Ok(())
        } else {
            Err(UserRepoError::UserNotFound(user_id))
        }
    }
}
