mod task_repo;
mod transaction_repo;
mod user_repo;

use crate::connection::DbConnection;
use crate::task_repo::TaskRepo;
use crate::transaction_repo::TransactionRepo;
use crate::user_repo::UserRepo;
use sqlx::{MySql, Pool};
use std::sync::Arc;

pub struct SQLxRepo {
    pool: Pool<MySql>,
}

impl SQLxRepo {
    pub fn new(connection: &DbConnection) -> SQLxRepo {
        SQLxRepo {
            pool: connection.pool().clone(),
        }
    }
}

/// Builds every repository on top of one shared connection.
pub fn create_repos(
    connection: &DbConnection,
) -> (Arc<dyn UserRepo>, Arc<dyn TransactionRepo>, Arc<dyn TaskRepo>) {
    let repo = Arc::new(SQLxRepo::new(connection));
    let user_repo: Arc<dyn UserRepo> = repo.clone();
    let transaction_repo: Arc<dyn TransactionRepo> = repo.clone();
    let task_repo: Arc<dyn TaskRepo> = repo;
    (user_repo, transaction_repo, task_repo)
}
