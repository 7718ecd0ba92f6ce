use super::{FinanceState, SharedState};
use crate::user_repo::UserRepoError::{UserAlreadyExists, UserNotFound};
use crate::user_repo::{NewUser, User, UserId, UserRepo, UserRepoError};
use async_trait::async_trait;
use chrono::Utc;

pub struct MemUserRepo {
    state: SharedState,
}

impl MemUserRepo {
    pub(super) fn new(state: SharedState) -> MemUserRepo {
        MemUserRepo { state }
    }
}

fn insert_user(state: &mut FinanceState, new_user: NewUser) -> Result<User, UserRepoError> {
    let duplicate = state
        .users
        .values()
        .any(|u| u.email == new_user.email || u.google_id == new_user.google_id);
    if duplicate {
        return Err(UserAlreadyExists(new_user.email));
    }

    let id = state.allocate_user_id();
    let user = new_user.to_user(id, Utc::now());
    state.users.insert(id, user.clone());
    Ok(user)
}

#[async_trait]
impl UserRepo for MemUserRepo {
    async fn get_user(&self, user_id: UserId) -> Result<User, UserRepoError> {
        let read_guard = self.state.read_lock()?;

        read_guard
            .users
            .get(&user_id)
            .cloned()
            .ok_or(UserNotFound(user_id))
    }

    async fn get_user_by_google_id(&self, google_id: &str) -> Result<Option<User>, UserRepoError> {
        let read_guard = self.state.read_lock()?;

        Ok(read_guard
            .users
            .values()
            .find(|u| u.google_id == google_id)
            .cloned())
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, UserRepoError> {
        let mut write_guard = self.state.write_lock()?;
        insert_user(&mut write_guard, new_user)
    }

    async fn sign_in(&self, new_user: NewUser) -> Result<User, UserRepoError> {
        let mut write_guard = self.state.write_lock()?;

        let existing = write_guard
            .users
            .values_mut()
            .find(|u| u.google_id == new_user.google_id);
        let user = match existing {
            Some(user) => {
                user.last_login = Some(Utc::now());
                user.clone()
            }
            None => {
                let mut user = insert_user(&mut write_guard, new_user)?;
                user.last_login = Some(Utc::now());
                write_guard.users.insert(user.id, user.clone());
                user
            }
        };
        Ok(user)
    }

    async fn delete_user(&self, user_id: UserId) -> Result<(), UserRepoError> {
        let mut write_guard = self.state.write_lock()?;

        if write_guard.users.remove(&user_id).is_none() {
            return Err(UserNotFound(user_id));
        }
        write_guard
            .transactions
            .retain(|_, transaction| transaction.user_id != user_id);
        Ok(())
    }
}
