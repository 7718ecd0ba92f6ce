use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type UserId = i32;

#[async_trait]
pub trait UserRepo: Sync + Send {
    async fn get_user(&self, user_id: UserId) -> Result<User, UserRepoError>;
    async fn get_user_by_google_id(&self, google_id: &str) -> Result<Option<User>, UserRepoError>;
    async fn create_user(&self, new_user: NewUser) -> Result<User, UserRepoError>;
    /// Returns the account linked to `new_user.google_id`, creating it on the
    /// first sign-in. Either way the last login time is set to now.
    async fn sign_in(&self, new_user: NewUser) -> Result<User, UserRepoError>;
    /// Deletes the user together with all of their transactions.
    async fn delete_user(&self, user_id: UserId) -> Result<(), UserRepoError>;
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub google_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub sms_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NewUser {
    pub email: String,
    pub google_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub sms_enabled: bool,
}

impl NewUser {
    pub fn new(email: String, google_id: String) -> NewUser {
        NewUser {
            email,
            google_id,
            first_name: None,
            last_name: None,
            phone_number: None,
            sms_enabled: false,
        }
    }

    pub fn with_name(mut self, first_name: &str, last_name: &str) -> NewUser {
        self.first_name = Some(first_name.to_owned());
        self.last_name = Some(last_name.to_owned());
        self
    }

    pub fn with_phone(mut self, phone_number: &str, sms_enabled: bool) -> NewUser {
        self.phone_number = Some(phone_number.to_owned());
        self.sms_enabled = sms_enabled;
        self
    }

    pub fn to_user(self, id: UserId, created_at: DateTime<Utc>) -> User {
        User {
            id,
            email: self.email,
            google_id: self.google_id,
            first_name: self.first_name,
            last_name: self.last_name,
            phone_number: self.phone_number,
            sms_enabled: self.sms_enabled,
            created_at,
            last_login: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum UserRepoError {
    #[error("User {0} not found")]
    UserNotFound(UserId),
    #[error("User {0} already exists")]
    UserAlreadyExists(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
