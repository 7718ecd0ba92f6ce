use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use watcard_repo::user_repo::{NewUser, UserId, UserRepo};

pub struct TestUser {
    pub id: UserId,
    repo: Arc<dyn UserRepo>,
}

impl TestUser {
    pub async fn new(user_repo: &Arc<dyn UserRepo>) -> TestUser {
        let user = user_repo.create_user(new_test_user()).await.unwrap();
        info!(user_id = user.id, "Created user");
        TestUser {
            id: user.id,
            repo: user_repo.clone(),
        }
    }

    pub async fn delete(&self) {
        self.repo.delete_user(self.id).await.unwrap()
    }
}

/// A user whose email and google id are unique to this call.
pub fn new_test_user() -> NewUser {
    let unique = Uuid::new_v4().to_string();
    NewUser::new(
        format!("test-user-{}@uwaterloo.ca", unique),
        format!("google-{}", unique),
    )
}

/// A to-do owner id unique to this call.
pub fn test_task_owner() -> String {
    "test-user-".to_owned() + &Uuid::new_v4().to_string()
}
