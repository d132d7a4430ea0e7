//! Task snapshots.

use super::{Database, collections::TASKS};
use crate::types::Task;
use anyhow::Result;

impl Database {
    pub fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        self.get_document(TASKS, task_id)
    }

    /// Whole-record overwrite keyed by task id.
    pub fn upsert_task(&self, task: &Task) -> Result<()> {
        self.upsert_document(TASKS, &task.id, task)
    }

    pub fn delete_task(&self, task_id: &str) -> Result<bool> {
        self.delete_document(TASKS, task_id)
    }

    /// Stored tasks whose parent is `task_id`.
    pub fn subtasks_of(&self, task_id: &str) -> Result<Vec<Task>> {
        self.query_documents_where_equals(TASKS, "parent_task_id", task_id)
    }

    /// Every stored task of the team, deleted ones included.
    pub fn all_team_tasks(&self, team_id: &str) -> Result<Vec<Task>> {
        self.query_documents_where_equals(TASKS, "team_id", team_id)
    }

    /// Stored tasks for the given ids; absent ids are skipped.
    pub fn tasks_by_ids(&self, ids: &[String]) -> Result<Vec<Task>> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(task) = self.get_task(id)? {
                found.push(task);
            }
        }
        Ok(found)
    }
}
