//! Opening and closing the single database connection the stores share.

use crate::HealthCheck;
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::{MySql, Pool};
use std::fmt::{Debug, Formatter};
use tracing::{error, info, instrument};

/// Credentials and location of the MySQL database.
#[derive(Clone, Default)]
pub struct ConnectOptions {
    pub host: String,
    pub port: Option<u16>,
    pub user: String,
    pub database: String,
    pub password: Option<String>,
}

impl Debug for ConnectOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("database", &self.database)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ConnectOptions {
    fn to_mysql_options(&self) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(&self.host)
            .username(&self.user)
            .database(&self.database);
        if let Some(port) = self.port {
            options = options.port(port);
        }
        if let Some(password) = &self.password {
            options = options.password(password);
        }
        options
    }
}

/// Handle to one live database connection.
///
/// Internally this is a pool capped at a single connection, so every
/// statement issued through a clone of the handle runs on the same session,
/// one at a time. Clones are cheap and share that connection.
#[derive(Clone, Debug)]
pub struct DbConnection {
    pool: Pool<MySql>,
}

impl DbConnection {
    pub(crate) fn pool(&self) -> &Pool<MySql> {
        &self.pool
    }

    /// Builds a handle without contacting the server. The connection is only
    /// established when the first statement runs.
    pub fn lazy(options: &ConnectOptions) -> DbConnection {
        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .connect_lazy_with(options.to_mysql_options());
        DbConnection { pool }
    }

    pub async fn close(self) {
        self.pool.close().await;
        info!("Database connection closed");
    }
}

/// Opens a connection to the database described by `options`.
///
/// Connection failures are logged and reported as `None`; this never returns
/// an error to the caller.
#[instrument]
pub async fn connect(options: &ConnectOptions) -> Option<DbConnection> {
    let result = MySqlPoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .connect_with(options.to_mysql_options())
        .await;

    match result {
        Ok(pool) => {
            info!(database = %options.database, "Connected to database");
            Some(DbConnection { pool })
        }
        Err(err) => {
            error!(%err, "Database connection error");
            None
        }
    }
}

#[async_trait]
impl HealthCheck for DbConnection {
    async fn check(&self) -> bool {
        match sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
        {
            Ok(v) => v == 1,
            Err(err) => {
                error!(%err, "Health check failed");
                false
            }
        }
    }
}
