use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{Days, Local, NaiveDate, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-user to-do items, keyed by `(user, item)`.
#[async_trait]
pub trait TaskRepo: Sync + Send {
    async fn get_task(&self, user: &str, item: &str) -> Result<Task, TaskRepoError>;

    async fn add(&self, user: &str, new_task: NewTask) -> Result<Task, TaskRepoError>;

    /// Applies the supplied fields to an existing task. Existence is checked
    /// before the change set, so a missing task is reported as
    /// [`TaskRepoError::TaskNotFound`] even when `changes` is empty.
    async fn update(
        &self,
        user: &str,
        item: &str,
        changes: TaskChanges,
    ) -> Result<Task, TaskRepoError>;

    async fn delete(&self, user: &str, item: &str) -> Result<Task, TaskRepoError>;

    /// The task with the earliest due time. Ties are broken by item.
    async fn next(&self, user: &str) -> Result<Option<Task>, TaskRepoError>;

    /// Tasks whose due date (ignoring the time of day) is `date`, earliest
    /// first.
    async fn due_on(&self, user: &str, date: NaiveDate) -> Result<Vec<Task>, TaskRepoError>;

    async fn today(&self, user: &str) -> Result<Vec<Task>, TaskRepoError> {
        self.due_on(user, current_date()).await
    }

    async fn tomorrow(&self, user: &str) -> Result<Vec<Task>, TaskRepoError> {
        let tomorrow = current_date()
            .checked_add_days(Days::new(1))
            .ok_or_else(|| anyhow!("Date out of range"))?;
        self.due_on(user, tomorrow).await
    }
}

pub fn current_date() -> NaiveDate {
    Local::now().date_naive()
}

#[derive(Error, Debug)]
pub enum TaskRepoError {
    #[error("Task '{item}' already exists for user {user}")]
    TaskAlreadyExists { user: String, item: String },
    #[error("Task '{item}' not found for user {user}")]
    TaskNotFound { user: String, item: String },
    #[error("No fields supplied to update task '{0}'")]
    NoFieldsSupplied(String),
    #[error("{0} must not be empty")]
    EmptyKey(&'static str),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskRepoError {
    pub(crate) fn not_found(user: &str, item: &str) -> TaskRepoError {
        TaskRepoError::TaskNotFound {
            user: user.to_owned(),
            item: item.to_owned(),
        }
    }

    pub(crate) fn already_exists(user: &str, item: &str) -> TaskRepoError {
        TaskRepoError::TaskAlreadyExists {
            user: user.to_owned(),
            item: item.to_owned(),
        }
    }
}

/// `DATETIME` columns keep whole seconds, so both stores drop the fraction
/// before a timestamp is stored or compared.
fn whole_seconds(timestamp: Option<NaiveDateTime>) -> Option<NaiveDateTime> {
    timestamp.map(|t| t.trunc_subsecs(0))
}

pub(crate) fn validate_key(user: &str, item: &str) -> Result<(), TaskRepoError> {
    if user.trim().is_empty() {
        return Err(TaskRepoError::EmptyKey("userid"));
    }
    if item.trim().is_empty() {
        return Err(TaskRepoError::EmptyKey("item"));
    }
    Ok(())
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Task {
    pub user_id: String,
    pub item: String,
    #[serde(rename = "type")]
    pub task_type: Option<String>,
    pub started: Option<NaiveDateTime>,
    pub due: Option<NaiveDateTime>,
    pub done: Option<NaiveDateTime>,
}

impl Task {
    pub fn apply(&mut self, changes: TaskChanges) {
        if let Some(task_type) = changes.task_type {
            self.task_type = Some(task_type);
        }
        if let Some(started) = changes.started {
            self.started = Some(started);
        }
        if let Some(due) = changes.due {
            self.due = Some(due);
        }
        if let Some(done) = changes.done {
            self.done = Some(done);
        }
    }
}

/// A task as submitted by a user. It is never created already done.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NewTask {
    pub item: String,
    #[serde(rename = "type")]
    pub task_type: Option<String>,
    pub started: Option<NaiveDateTime>,
    pub due: Option<NaiveDateTime>,
}

impl NewTask {
    pub const fn new(
        item: String,
        task_type: Option<String>,
        started: Option<NaiveDateTime>,
        due: Option<NaiveDateTime>,
    ) -> NewTask {
        NewTask {
            item,
            task_type,
            started,
            due,
        }
    }

    /// Drops sub-second precision from the timestamps.
    pub fn truncated(self) -> NewTask {
        NewTask {
            started: whole_seconds(self.started),
            due: whole_seconds(self.due),
            ..self
        }
    }

    pub fn to_task(self, user: &str) -> Task {
        Task {
            user_id: user.to_owned(),
            item: self.item,
            task_type: self.task_type,
            started: self.started,
            due: self.due,
            done: None,
        }
    }
}

/// Fields to overwrite on update. `None` leaves the stored value alone.
#[derive(Serialize, Deserialize, Clone, Default, Debug)]
pub struct TaskChanges {
    #[serde(rename = "type")]
    pub task_type: Option<String>,
    pub started: Option<NaiveDateTime>,
    pub due: Option<NaiveDateTime>,
    pub done: Option<NaiveDateTime>,
}

impl TaskChanges {
    pub fn is_empty(&self) -> bool {
        self.task_type.is_none() && self.started.is_none() && self.due.is_none() && self.done.is_none()
    }

    pub fn truncated(self) -> TaskChanges {
        TaskChanges {
            started: whole_seconds(self.started),
            due: whole_seconds(self.due),
            done: whole_seconds(self.done),
            ..self
        }
    }
}
