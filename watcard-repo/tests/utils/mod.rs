#![allow(dead_code)]

pub mod generator;
pub mod test_user;

use serde::Deserialize;
use std::fs;
use std::sync::Arc;
use watcard_repo::connection::{self, ConnectOptions, DbConnection};
use watcard_repo::migration;
use watcard_repo::task_repo::TaskRepo;
use watcard_repo::transaction_repo::TransactionRepo;
use watcard_repo::user_repo::UserRepo;

#[derive(Deserialize)]
struct TestConfig {
    database: TestDatabase,
}

#[derive(Deserialize)]
struct TestDatabase {
    host: String,
    port: Option<u16>,
    user: String,
    database: String,
    password: Option<String>,
}

#[derive(Debug)]
pub enum RepoType {
    SQLx,
    Mem,
}

pub struct Repos {
    pub user_repo: Arc<dyn UserRepo>,
    pub transaction_repo: Arc<dyn TransactionRepo>,
    pub task_repo: Arc<dyn TaskRepo>,
}

/// Connection settings for the MySQL test database, if one is configured.
pub fn test_connect_options() -> Option<ConnectOptions> {
    let config = fs::read_to_string("config_test.toml").ok()?;
    let config: TestConfig = toml::from_str(config.as_str()).unwrap();
    let db = config.database;
    Some(ConnectOptions {
        host: db.host,
        port: db.port,
        user: db.user,
        database: db.database,
        password: db.password,
    })
}

pub async fn test_connection() -> Option<DbConnection> {
    let options = test_connect_options()?;
    let connection = connection::connect(&options)
        .await
        .expect("config_test.toml is present but the database is unreachable");
    migration::create_watcard_tables(&connection).await.unwrap();
    migration::create_todo_table(&connection).await.unwrap();
    Some(connection)
}

/// Returns `None` when the requested backend is not available, in which case
/// the calling test is skipped.
pub async fn build_repos(repo_type: RepoType) -> Option<Repos> {
    let (user_repo, transaction_repo, task_repo) = match repo_type {
        RepoType::SQLx => {
            let Some(connection) = test_connection().await else {
                eprintln!("config_test.toml not found, skipping MySQL test");
                return None;
            };
            watcard_repo::sqlx_repo::create_repos(&connection)
        }
        RepoType::Mem => watcard_repo::mem_repo::create_repos(),
    };

    Some(Repos {
        user_repo,
        transaction_repo,
        task_repo,
    })
}
