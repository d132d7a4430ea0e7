//! Resolution of a task's related records against the store.
//!
//! A [`TaskView`] wraps one snapshot and loads each association on first
//! use. A successful load is cached for the lifetime of the view; a failed
//! one is returned to the caller and retried on the next call.

use crate::db::Database;
use crate::types::{Folder, List, Member, Task};
use anyhow::Result;
use std::sync::OnceLock;

fn cached<'s, T>(cell: &'s OnceLock<T>, load: impl FnOnce() -> Result<T>) -> Result<&'s T> {
    if let Some(value) = cell.get() {
        return Ok(value);
    }
    let value = load()?;
    Ok(cell.get_or_init(|| value))
}

pub struct TaskView<'a> {
    db: &'a Database,
    task: Task,
    assignees: OnceLock<Vec<Member>>,
    subtasks: OnceLock<Vec<Task>>,
    linked_tasks: OnceLock<Vec<Task>>,
    list: OnceLock<Option<List>>,
    folder: OnceLock<Option<Folder>>,
}

impl<'a> TaskView<'a> {
    pub fn new(db: &'a Database, task: Task) -> Self {
        Self {
            db,
            task,
            assignees: OnceLock::new(),
            subtasks: OnceLock::new(),
            linked_tasks: OnceLock::new(),
            list: OnceLock::new(),
            folder: OnceLock::new(),
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Stored members among the task's assignees.
    pub fn assignees(&self) -> Result<&[Member]> {
        cached(&self.assignees, || {
            self.db.members_by_ids(&self.task.assignee_ids)
        })
        .map(Vec::as_slice)
    }

    /// Lower-cased emails of the stored assignees.
    pub fn assignee_emails(&self) -> Result<Vec<String>> {
        Ok(self
            .assignees()?
            .iter()
            .map(|m| m.email.to_lowercase())
            .collect())
    }

    pub fn subtasks(&self) -> Result<&[Task]> {
        cached(&self.subtasks, || self.db.subtasks_of(&self.task.id)).map(Vec::as_slice)
    }

    pub fn linked_tasks(&self) -> Result<&[Task]> {
        cached(&self.linked_tasks, || self.db.tasks_by_ids(&self.task.linked_task_ids))
            .map(Vec::as_slice)
    }

    pub fn list(&self) -> Result<Option<&List>> {
        cached(&self.list, || self.db.get_list(&self.task.list_id)).map(Option::as_ref)
    }

    pub fn folder(&self) -> Result<Option<&Folder>> {
        cached(&self.folder, || self.db.get_folder(&self.task.folder_id)).map(Option::as_ref)
    }

    /// Name of the containing list, empty when the list is not stored.
    pub fn list_name(&self) -> Result<String> {
        Ok(self.list()?.map(|l| l.name.clone()).unwrap_or_default())
    }

    pub fn folder_name(&self) -> Result<String> {
        Ok(self.folder()?.map(|f| f.name.clone()).unwrap_or_default())
    }

    /// Own estimate plus the estimates of all stored subtasks, in ms.
    pub fn total_estimate(&self) -> Result<i64> {
        let own = self.task.time_estimate_ms.unwrap_or(0);
        let subtasks: i64 = self
            .subtasks()?
            .iter()
            .filter_map(|t| t.time_estimate_ms)
            .sum();
        Ok(own + subtasks)
    }

    pub fn mirror_task_name(&self) -> Result<String> {
        Ok(self.task.mirror_task_name(&self.list_name()?))
    }
}
