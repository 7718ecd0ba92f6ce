use crate::sqlx_repo::SQLxRepo;
use crate::task_repo::{validate_key, NewTask, Task, TaskChanges, TaskRepo, TaskRepoError};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{query, query_as, query_scalar, Executor, MySql, QueryBuilder};
use tracing::{error, info, instrument};

#[derive(sqlx::FromRow)]
struct TaskEntry {
    userid: String,
    item: String,
    #[sqlx(rename = "type")]
    task_type: Option<String>,
    started: Option<NaiveDateTime>,
    due: Option<NaiveDateTime>,
    done: Option<NaiveDateTime>,
}

impl From<TaskEntry> for Task {
    fn from(value: TaskEntry) -> Self {
        Task {
            user_id: value.userid,
            item: value.item,
            task_type: value.task_type,
            started: value.started,
            due: value.due,
            done: value.done,
        }
    }
}

impl SQLxRepo {
    #[instrument(skip(db_executor))]
    async fn get_task_entry<'e, E>(
        db_executor: E,
        user: &str,
        item: &str,
    ) -> Result<Option<TaskEntry>, TaskRepoError>
    where
        E: Executor<'e, Database = MySql>,
    {
        let task_entry = query_as::<_, TaskEntry>(
            "SELECT userid, item, type, started, due, done FROM ToDoData WHERE userid = ? AND item = ?",
        )
        .bind(user)
        .bind(item)
        .fetch_optional(db_executor)
        .await
        .with_context(|| format!("Unable to get task '{}'", item))?;
        Ok(task_entry)
    }

    #[instrument(skip(db_executor))]
    async fn task_exists<'e, E>(db_executor: E, user: &str, item: &str) -> Result<bool, TaskRepoError>
    where
        E: Executor<'e, Database = MySql>,
    {
        let count: i64 =
            query_scalar("SELECT COUNT(*) FROM ToDoData WHERE userid = ? AND item = ?")
                .bind(user)
                .bind(item)
                .fetch_one(db_executor)
                .await
                .with_context(|| format!("Unable to look up task '{}'", item))?;
        Ok(count > 0)
    }
}

#[async_trait]
impl TaskRepo for SQLxRepo {
    #[instrument(skip(self))]
    async fn get_task(&self, user: &str, item: &str) -> Result<Task, TaskRepoError> {
        Self::get_task_entry(&self.pool, user, item)
            .await?
            .ok_or_else(|| TaskRepoError::not_found(user, item))
            .map(|t| t.into())
    }

    #[instrument(skip(self, new_task), fields(item = %new_task.item))]
    async fn add(&self, user: &str, new_task: NewTask) -> Result<Task, TaskRepoError> {
        validate_key(user, &new_task.item)?;
        let new_task = new_task.truncated();

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Unable to start transaction")?;

        let result = query(
            "INSERT INTO ToDoData (userid, item, type, started, due, done) VALUES (?, ?, ?, ?, ?, NULL)",
        )
        .bind(user)
        .bind(new_task.item.as_str())
        .bind(new_task.task_type.as_deref())
        .bind(new_task.started)
        .bind(new_task.due)
        .execute(&mut *tx)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                info!("Task already exists");
                return Err(TaskRepoError::already_exists(user, &new_task.item));
            }
            Err(e) => {
                error!(%e, "Unable to add task");
                return Err(anyhow::Error::new(e)
                    .context(format!("Unable to add task '{}'", new_task.item))
                    .into());
            }
        }

        let task_entry = Self::get_task_entry(&mut *tx, user, &new_task.item)
            .await?
            .ok_or_else(|| TaskRepoError::not_found(user, &new_task.item))?;
        tx.commit()
            .await
            .with_context(|| format!("Unable to commit task '{}'", new_task.item))?;

        Ok(task_entry.into())
    }

    #[instrument(skip(self, changes))]
    async fn update(
        &self,
        user: &str,
        item: &str,
        changes: TaskChanges,
    ) -> Result<Task, TaskRepoError> {
        let changes = changes.truncated();
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Unable to start transaction")?;

        if !Self::task_exists(&mut *tx, user, item).await? {
            return Err(TaskRepoError::not_found(user, item));
        }
        if changes.is_empty() {
            return Err(TaskRepoError::NoFieldsSupplied(item.to_owned()));
        }

        let mut query_builder: QueryBuilder<MySql> = QueryBuilder::new("UPDATE ToDoData SET ");
        {
            let mut fields = query_builder.separated(", ");
            if let Some(task_type) = changes.task_type {
                fields.push("type = ").push_bind_unseparated(task_type);
            }
            if let Some(started) = changes.started {
                fields.push("started = ").push_bind_unseparated(started);
            }
            if let Some(due) = changes.due {
                fields.push("due = ").push_bind_unseparated(due);
            }
            if let Some(done) = changes.done {
                fields.push("done = ").push_bind_unseparated(done);
            }
        }
        query_builder
            .push(" WHERE userid = ")
            .push_bind(user)
            .push(" AND item = ")
            .push_bind(item);
        query_builder
            .build()
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Unable to update task '{}'", item))?;

        let task_entry = Self::get_task_entry(&mut *tx, user, item)
            .await?
            .ok_or_else(|| TaskRepoError::not_found(user, item))?;
        tx.commit()
            .await
            .with_context(|| format!("Unable to commit update of task '{}'", item))?;

        Ok(task_entry.into())
    }

    #[instrument(skip(self))]
    async fn delete(&self, user: &str, item: &str) -> Result<Task, TaskRepoError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Unable to start transaction")?;

        let task_entry = Self::get_task_entry(&mut *tx, user, item)
            .await?
            .ok_or_else(|| TaskRepoError::not_found(user, item))?;
        query("DELETE FROM ToDoData WHERE userid = ? AND item = ?")
            .bind(user)
            .bind(item)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Unable to delete task '{}'", item))?;
        tx.commit()
            .await
            .with_context(|| format!("Unable to commit delete of task '{}'", item))?;

        Ok(task_entry.into())
    }

    #[instrument(skip(self))]
    async fn next(&self, user: &str) -> Result<Option<Task>, TaskRepoError> {
        let task_entry = query_as::<_, TaskEntry>(
            "SELECT userid, item, type, started, due, done FROM ToDoData \
             WHERE userid = ? AND due IS NOT NULL ORDER BY due ASC, item ASC LIMIT 1",
        )
        .bind(user)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Unable to get next task for user {}", user))?;
        Ok(task_entry.map(|t| t.into()))
    }

    #[instrument(skip(self))]
    async fn due_on(&self, user: &str, date: NaiveDate) -> Result<Vec<Task>, TaskRepoError> {
        let tasks = query_as::<_, TaskEntry>(
            "SELECT userid, item, type, started, due, done FROM ToDoData \
             WHERE userid = ? AND DATE(due) = ? ORDER BY due ASC, item ASC",
        )
        .bind(user)
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Unable to get tasks due on {} for user {}", date, user))?
        .into_iter()
        .map(|t| t.into())
        .collect();
        Ok(tasks)
    }
}
