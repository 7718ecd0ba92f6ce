use crate::task_repo::{validate_key, NewTask, Task, TaskChanges, TaskRepo, TaskRepoError};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type UserTasks = BTreeMap<String, Task>;

pub struct MemTaskRepo {
    tasks: RwLock<HashMap<String, UserTasks>>,
}

impl MemTaskRepo {
    pub fn new() -> MemTaskRepo {
        MemTaskRepo {
            tasks: RwLock::new(HashMap::new()),
        }
    }

    fn read_lock(&self) -> Result<RwLockReadGuard<HashMap<String, UserTasks>>, anyhow::Error> {
        self.tasks
            .read()
            .map_err(|_| anyhow!("Unable to acquire lock"))
    }

    fn write_lock(&self) -> Result<RwLockWriteGuard<HashMap<String, UserTasks>>, anyhow::Error> {
        self.tasks
            .write()
            .map_err(|_| anyhow!("Unable to acquire lock"))
    }
}

#[async_trait]
impl TaskRepo for MemTaskRepo {
    async fn get_task(&self, user: &str, item: &str) -> Result<Task, TaskRepoError> {
        let read_guard = self.read_lock()?;

        read_guard
            .get(user)
            .and_then(|tasks| tasks.get(item))
            .cloned()
            .ok_or_else(|| TaskRepoError::not_found(user, item))
    }

    async fn add(&self, user: &str, new_task: NewTask) -> Result<Task, TaskRepoError> {
        validate_key(user, &new_task.item)?;
        let new_task = new_task.truncated();
        let mut write_guard = self.write_lock()?;

        let tasks = write_guard.entry(user.to_owned()).or_default();
        match tasks.entry(new_task.item.clone()) {
            Entry::Occupied(_) => Err(TaskRepoError::already_exists(user, &new_task.item)),
            Entry::Vacant(e) => {
                let task = new_task.to_task(user);
                e.insert(task.clone());
                Ok(task)
            }
        }
    }

    async fn update(
        &self,
        user: &str,
        item: &str,
        changes: TaskChanges,
    ) -> Result<Task, TaskRepoError> {
        let mut write_guard = self.write_lock()?;

        let Some(task) = write_guard
            .get_mut(user)
            .and_then(|tasks| tasks.get_mut(item))
        else {
            return Err(TaskRepoError::not_found(user, item));
        };
        if changes.is_empty() {
            return Err(TaskRepoError::NoFieldsSupplied(item.to_owned()));
        }

        task.apply(changes.truncated());
        Ok(task.clone())
    }

    async fn delete(&self, user: &str, item: &str) -> Result<Task, TaskRepoError> {
        let mut write_guard = self.write_lock()?;

        write_guard
            .get_mut(user)
            .and_then(|tasks| tasks.remove(item))
            .ok_or_else(|| TaskRepoError::not_found(user, item))
    }

    async fn next(&self, user: &str) -> Result<Option<Task>, TaskRepoError> {
        let read_guard = self.read_lock()?;

        let Some(tasks) = read_guard.get(user) else {
            return Ok(None);
        };
        let next = tasks
            .values()
            .filter(|t| t.due.is_some())
            .min_by(|a, b| a.due.cmp(&b.due).then_with(|| a.item.cmp(&b.item)))
            .cloned();
        Ok(next)
    }

    async fn due_on(&self, user: &str, date: NaiveDate) -> Result<Vec<Task>, TaskRepoError> {
        let read_guard = self.read_lock()?;

        let Some(tasks) = read_guard.get(user) else {
            return Ok(Vec::new());
        };
        let mut due: Vec<Task> = tasks
            .values()
            .filter(|t| t.due.map(|d| d.date()) == Some(date))
            .cloned()
            .collect();
        due.sort_by(|a, b| a.due.cmp(&b.due).then_with(|| a.item.cmp(&b.item)));
        Ok(due)
    }
}
