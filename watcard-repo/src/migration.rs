//! Applying SQL scripts statement by statement.
//!
//! Scripts are split on `;` outside of quoted literals and comments. `#`,
//! `-- ` and `/* */` comments follow MySQL rules: `--` must be followed by
//! whitespace. Line comments on their own line are dropped, the rest are sent
//! to the server untouched, and segments holding only comments are skipped.
//! `DELIMITER` blocks and stored-procedure bodies are not supported.

use crate::connection::DbConnection;
use anyhow::Context;
use sqlx::Executor;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, instrument};

pub const TODO_SCHEMA: &str = include_str!("../migrations/todo/001_create_todo_data.sql");
pub const WATCARD_SCHEMA: &str =
    include_str!("../migrations/watcard/001_create_users_and_transactions.sql");

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Migration file {} could not be read", path.display())]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Statement {index} of migration {name} failed")]
    StatementFailed {
        name: String,
        index: usize,
        #[source]
        source: sqlx::Error,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Clone, Copy, PartialEq)]
enum Scan {
    Code,
    Quoted(char),
    LineComment { keep: bool },
    BlockComment,
}

/// `--` only opens a comment when followed by whitespace or the end of input.
fn dash_comment_at(chars: &[char], i: usize) -> bool {
    chars[i] == '-'
        && chars.get(i + 1) == Some(&'-')
        && chars.get(i + 2).map_or(true, |c| c.is_whitespace())
}

/// Splits a script into the statements that should be executed, in order.
pub fn split_statements(sql: &str) -> Vec<String> {
    let chars: Vec<char> = sql.chars().collect();
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut has_code = false;
    let mut line_blank = true;
    let mut scan = Scan::Code;

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match scan {
            Scan::Quoted(q) => {
                current.push(c);
                if c == '\\' && q != '`' {
                    if let Some(&escaped) = chars.get(i + 1) {
                        current.push(escaped);
                        i += 1;
                    }
                } else if c == q {
                    scan = Scan::Code;
                }
            }
            Scan::LineComment { keep } => {
                if c == '\n' {
                    current.push(c);
                    line_blank = true;
                    scan = Scan::Code;
                } else if keep {
                    current.push(c);
                }
            }
            Scan::BlockComment => {
                current.push(c);
                if c == '*' && chars.get(i + 1) == Some(&'/') {
                    current.push('/');
                    i += 1;
                    scan = Scan::Code;
                }
            }
            Scan::Code if c == '#' || dash_comment_at(&chars, i) => {
                // comments on their own line are dropped, trailing ones kept
                let keep = !line_blank;
                if keep {
                    current.push(c);
                }
                scan = Scan::LineComment { keep };
            }
            Scan::Code if c == '/' && chars.get(i + 1) == Some(&'*') => {
                // `/*! ... */` and optimizer hints are executed by the server
                if matches!(chars.get(i + 2), Some(&'!') | Some(&'+')) {
                    has_code = true;
                }
                current.push_str("/*");
                i += 1;
                line_blank = false;
                scan = Scan::BlockComment;
            }
            Scan::Code => match c {
                ';' => {
                    finish_statement(&mut statements, &mut current, has_code);
                    has_code = false;
                    line_blank = false;
                }
                '\n' => {
                    current.push(c);
                    line_blank = true;
                }
                _ if c.is_whitespace() => current.push(c),
                _ => {
                    if matches!(c, '\'' | '"' | '`') {
                        scan = Scan::Quoted(c);
                    }
                    current.push(c);
                    has_code = true;
                    line_blank = false;
                }
            },
        }
        i += 1;
    }
    finish_statement(&mut statements, &mut current, has_code);

    statements
}

fn finish_statement(statements: &mut Vec<String>, current: &mut String, has_code: bool) {
    if has_code {
        statements.push(current.trim().to_owned());
    }
    current.clear();
}

/// Reads the script at `path` and applies it with [`run_migration_script`].
///
/// An unreadable file is reported before the connection is used.
#[instrument(skip(connection))]
pub async fn run_migration(
    connection: &DbConnection,
    path: &Path,
) -> Result<usize, MigrationError> {
    let owned_path = path.to_owned();
    let sql = actix_rt::task::spawn_blocking(move || std::fs::read_to_string(owned_path))
        .await
        .context("Migration file reader panicked")?
        .map_err(|source| {
            error!(path = %path.display(), %source, "Migration file not found");
            MigrationError::FileUnreadable {
                path: path.to_owned(),
                source,
            }
        })?;

    run_migration_script(connection, &path.display().to_string(), &sql).await
}

/// Executes every statement of `sql` inside one transaction and returns how
/// many statements ran.
///
/// The first failing statement rolls the transaction back. MySQL commits DDL
/// implicitly, so tables created before the failure are not removed.
#[instrument(skip(connection, sql))]
pub async fn run_migration_script(
    connection: &DbConnection,
    name: &str,
    sql: &str,
) -> Result<usize, MigrationError> {
    let statements = split_statements(sql);

    let mut tx = connection
        .pool()
        .begin()
        .await
        .with_context(|| format!("Unable to start migration {}", name))?;

    for (index, statement) in statements.iter().enumerate() {
        debug!(index, %statement, "Executing statement");
        if let Err(source) = (&mut *tx).execute(statement.as_str()).await {
            error!(index, %source, "Error running migration");
            tx.rollback()
                .await
                .with_context(|| format!("Unable to roll back migration {}", name))?;
            return Err(MigrationError::StatementFailed {
                name: name.to_owned(),
                index: index + 1,
                source,
            });
        }
    }

    tx.commit()
        .await
        .with_context(|| format!("Unable to commit migration {}", name))?;
    info!(statements = statements.len(), "Migration executed successfully");

    Ok(statements.len())
}

pub async fn create_todo_table(connection: &DbConnection) -> Result<usize, MigrationError> {
    run_migration_script(connection, "todo schema", TODO_SCHEMA).await
}

pub async fn create_watcard_tables(connection: &DbConnection) -> Result<usize, MigrationError> {
    run_migration_script(connection, "watcard schema", WATCARD_SCHEMA).await
}
