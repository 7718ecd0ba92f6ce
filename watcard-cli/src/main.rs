#[macro_use]
extern crate tracing;

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use serde::Serialize;

use watcard_lib::config::{Config, DatabaseConfig};
use watcard_lib::spending;
use watcard_repo::connection::{self, DbConnection};
use watcard_repo::migration;
use watcard_repo::task_repo::{NewTask, TaskChanges, TaskRepo};
use watcard_repo::transaction_repo::{Category, Filter};
use watcard_repo::user_repo::UserId;
use watcard_repo::HealthCheck;

#[derive(Parser, Debug)]
#[command(name = "watcard")]
#[command(about = "WatCard Dashboard and To-Do store backed by MySQL")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CONFIG_FILE")]
    config: Option<PathBuf>,

    #[arg(short = 'H', long)]
    hostname: Option<String>,

    #[arg(short, long)]
    database: Option<String>,

    #[arg(short, long)]
    username: Option<String>,

    /// Password. Pass `-p` without a value to be prompted for it
    #[arg(short, long, num_args = 0..=1, require_equals = true)]
    password: Option<Option<String>>,

    /// Log level override
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Test the database connection
    Check,
    /// Create the to-do table
    Init {
        /// Also create the WatCard users and transactions tables
        #[arg(long)]
        finance: bool,
    },
    /// Run a SQL migration script
    Migrate { file: PathBuf },
    /// Manage to-do items
    #[command(subcommand)]
    Todo(TodoCommand),
    /// Show a user's spending per category
    Spending {
        user_id: UserId,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        until: Option<NaiveDate>,
        #[arg(long, value_parser = parse_category)]
        category: Option<Category>,
    },
}

#[derive(Subcommand, Debug)]
enum TodoCommand {
    Add {
        user: String,
        item: String,
        #[arg(long = "type")]
        task_type: Option<String>,
        #[arg(long, value_parser = parse_datetime)]
        started: Option<NaiveDateTime>,
        #[arg(long, value_parser = parse_datetime)]
        due: Option<NaiveDateTime>,
    },
    Update {
        user: String,
        item: String,
        #[arg(long = "type")]
        task_type: Option<String>,
        #[arg(long, value_parser = parse_datetime)]
        started: Option<NaiveDateTime>,
        #[arg(long, value_parser = parse_datetime)]
        due: Option<NaiveDateTime>,
        #[arg(long, value_parser = parse_datetime)]
        done: Option<NaiveDateTime>,
    },
    Delete {
        user: String,
        item: String,
    },
    Get {
        user: String,
        item: String,
    },
    /// Show the task due soonest
    Next { user: String },
    /// List tasks due today
    Today { user: String },
    /// List tasks due tomorrow
    Tomorrow { user: String },
}

/// Accepts `YYYY-MM-DD HH:MM[:SS]`, the same with a `T` separator, or a bare
/// date meaning midnight.
fn parse_datetime(value: &str) -> Result<NaiveDateTime, String> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ];
    for format in FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(datetime);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| format!("Invalid date/time: {}", value))
}

fn parse_category(value: &str) -> Result<Category, String> {
    value.parse().map_err(|e| format!("{}", e))
}

#[actix_rt::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let (mut config, config_source) = match load_config(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            return ExitCode::FAILURE;
        }
    };
    if let Some(log_level) = &cli.log_level {
        config.log.level = log_level.clone();
    }

    let _tracing_guard = match watcard_lib::tracing::init_tracing(&config.log) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            return ExitCode::FAILURE;
        }
    };
    info!(source = config_source, "Configuration loaded");

    match run(cli, config.database).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

/// Reads the config file if one is given or `config.toml` exists, otherwise
/// the environment. Unset `DB_*` variables take their default values.
fn load_config(path: Option<&Path>) -> Result<(Config, &'static str), anyhow::Error> {
    if let Some(path) = path {
        return Ok((Config::from_file(path)?, "file"));
    }
    let config_current_dir = PathBuf::from("config.toml");
    if config_current_dir.exists() {
        return Ok((Config::from_file(&config_current_dir)?, "file"));
    }
    Ok((Config::from_env()?, "environment"))
}

/// Applies the `-H/-d/-u/-p` flags. A bare `-p` asks `read_password` with
/// the prompt text.
fn apply_overrides<F>(
    cli: &Cli,
    config: &mut DatabaseConfig,
    read_password: F,
) -> Result<(), anyhow::Error>
where
    F: FnOnce(&str) -> io::Result<String>,
{
    if let Some(hostname) = &cli.hostname {
        config.host = hostname.clone();
    }
    if let Some(database) = &cli.database {
        config.database = database.clone();
    }
    if let Some(username) = &cli.username {
        config.user = username.clone();
    }
    match &cli.password {
        None => {}
        Some(Some(password)) => config.password = Some(password.clone()),
        Some(None) => {
            let prompt = format!(
                "Enter MySQL password for user '{}' on host '{}': ",
                config.user, config.host
            );
            let password = read_password(&prompt).context("Unable to read password")?;
            config.password = Some(password);
        }
    }
    Ok(())
}

async fn run(cli: Cli, mut database: DatabaseConfig) -> Result<(), anyhow::Error> {
    // no echo while typing
    apply_overrides(&cli, &mut database, |prompt| rpassword::prompt_password(prompt))?;

    let options = database.connect_options();
    let connection = connection::connect(&options)
        .await
        .ok_or_else(|| anyhow!("Unable to connect to database {}", options.database))?;

    let result = execute(cli.command, &connection).await;
    connection.close().await;
    result
}

async fn execute(command: Command, connection: &DbConnection) -> Result<(), anyhow::Error> {
    match command {
        Command::Check => {
            if !connection.check().await {
                bail!("Database health check failed");
            }
            println!("Successfully connected to MySQL database");
        }
        Command::Init { finance } => {
            println!("Successfully connected to MySQL database");
            migration::create_todo_table(connection)
                .await
                .context("Failed to create ToDoData table")?;
            println!("ToDoData table is ready");
            if finance {
                migration::create_watcard_tables(connection)
                    .await
                    .context("Failed to create WatCard tables")?;
                println!("WatCard users and transactions tables are ready");
            }
        }
        Command::Migrate { file } => {
            let statements = migration::run_migration(connection, &file).await?;
            println!(
                "Migration {} executed successfully ({} statements)",
                file.display(),
                statements
            );
        }
        Command::Todo(todo_command) => {
            let (_, _, task_repo) = watcard_repo::sqlx_repo::create_repos(connection);
            run_todo(task_repo.as_ref(), todo_command).await?;
        }
        Command::Spending {
            user_id,
            from,
            until,
            category,
        } => {
            let (_, transaction_repo, _) = watcard_repo::sqlx_repo::create_repos(connection);
            let filter = Filter {
                from,
                until,
                category,
            };
            let summary = spending::summarize(transaction_repo.as_ref(), user_id, filter).await?;
            print_json(&summary)?;
        }
    }
    Ok(())
}

async fn run_todo(task_repo: &dyn TaskRepo, command: TodoCommand) -> Result<(), anyhow::Error> {
    match command {
        TodoCommand::Add {
            user,
            item,
            task_type,
            started,
            due,
        } => {
            let task = task_repo
                .add(&user, NewTask::new(item, task_type, started, due))
                .await?;
            println!("Added task '{}'", task.item);
            print_json(&task)?;
        }
        TodoCommand::Update {
            user,
            item,
            task_type,
            started,
            due,
            done,
        } => {
            let changes = TaskChanges {
                task_type,
                started,
                due,
                done,
            };
            let task = task_repo.update(&user, &item, changes).await?;
            println!("Updated task '{}'", task.item);
            print_json(&task)?;
        }
        TodoCommand::Delete { user, item } => {
            let task = task_repo.delete(&user, &item).await?;
            println!("Deleted task '{}'", task.item);
        }
        TodoCommand::Get { user, item } => {
            let task = task_repo.get_task(&user, &item).await?;
            print_json(&task)?;
        }
        TodoCommand::Next { user } => match task_repo.next(&user).await? {
            Some(task) => print_json(&task)?,
            None => println!("No upcoming tasks for {}", user),
        },
        TodoCommand::Today { user } => print_json(&task_repo.today(&user).await?)?,
        TodoCommand::Tomorrow { user } => print_json(&task_repo.tomorrow(&user).await?)?,
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), anyhow::Error> {
    let json = serde_json::to_string_pretty(value).context("Unable to serialize output")?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_password_flag_prompts() {
        let cli = Cli::try_parse_from(["watcard", "-u", "student", "-p", "check"]).unwrap();
        assert_eq!(cli.password, Some(None));
        assert!(matches!(cli.command, Command::Check));

        let cli = Cli::try_parse_from(["watcard", "--password=secret", "check"]).unwrap();
        assert_eq!(cli.password, Some(Some("secret".to_string())));

        let cli = Cli::try_parse_from(["watcard", "check"]).unwrap();
        assert_eq!(cli.password, None);
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "watcard",
            "-H",
            "localhost",
            "-d",
            "todo",
            "-p=secret",
            "check",
        ])
        .unwrap();
        let mut database = DatabaseConfig::default();
        apply_overrides(&cli, &mut database, |_| panic!("Password was given")).unwrap();
        assert_eq!(database.host, "localhost");
        assert_eq!(database.database, "todo");
        assert_eq!(database.user, "");
        assert_eq!(database.password.as_deref(), Some("secret"));
    }

    #[test]
    fn bare_password_flag_reads_hidden_input() {
        let cli = Cli::try_parse_from(["watcard", "-H", "db", "-u", "student", "-p", "check"]).unwrap();
        let mut database = DatabaseConfig::default();
        let mut shown_prompt = String::new();
        apply_overrides(&cli, &mut database, |prompt| {
            shown_prompt = prompt.to_string();
            Ok("hunter2".to_string())
        })
        .unwrap();
        assert_eq!(
            shown_prompt,
            "Enter MySQL password for user 'student' on host 'db': "
        );
        assert_eq!(database.password.as_deref(), Some("hunter2"));

        let mut database = DatabaseConfig::default();
        let result = apply_overrides(&cli, &mut database, |_| {
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no terminal"))
        });
        assert!(result.is_err());
        assert_eq!(database.password, None);
    }

    #[test]
    fn parse_todo_add() {
        let cli = Cli::try_parse_from([
            "watcard",
            "todo",
            "add",
            "u1",
            "Buy milk",
            "--type",
            "errand",
            "--due",
            "2025-11-05 17:00",
        ])
        .unwrap();
        match cli.command {
            Command::Todo(TodoCommand::Add {
                user,
                item,
                task_type,
                due,
                started,
            }) => {
                assert_eq!(user, "u1");
                assert_eq!(item, "Buy milk");
                assert_eq!(task_type.as_deref(), Some("errand"));
                assert_eq!(due, parse_datetime("2025-11-05T17:00:00").ok());
                assert_eq!(started, None);
            }
            other => panic!("Unexpected command {:?}", other),
        }
    }

    #[test]
    fn datetime_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 11, 5)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        assert_eq!(parse_datetime("2025-11-05 09:30"), Ok(expected));
        assert_eq!(parse_datetime("2025-11-05T09:30:00"), Ok(expected));
        assert_eq!(
            parse_datetime("2025-11-05"),
            Ok(expected.date().and_hms_opt(0, 0, 0).unwrap())
        );
        assert!(parse_datetime("next tuesday").is_err());
    }

    #[test]
    fn spending_category_names() {
        let cli =
            Cli::try_parse_from(["watcard", "spending", "7", "--category", "W Store"]).unwrap();
        match cli.command {
            Command::Spending {
                user_id, category, ..
            } => {
                assert_eq!(user_id, 7);
                assert_eq!(category, Some(Category::WStore));
            }
            other => panic!("Unexpected command {:?}", other),
        }
    }
}
