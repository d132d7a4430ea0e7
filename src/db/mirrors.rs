//! Source -> mirror relation records.

use super::{Database, collections::MIRROR_TASKS};
use crate::types::MirrorTask;
use anyhow::Result;

impl Database {
    /// Look up a relation by its `src:{source}:dst:{mirror}` key.
    pub fn get_mirror_task(&self, key: &str) -> Result<Option<MirrorTask>> {
        self.get_document(MIRROR_TASKS, key)
    }

    pub fn upsert_mirror_task(&self, relation: &MirrorTask) -> Result<()> {
        self.upsert_document(MIRROR_TASKS, &relation.key(), relation)
    }

    /// Relations where `task_id` is the source, destroyed ones included.
    pub fn mirror_tasks_by_source(&self, task_id: &str) -> Result<Vec<MirrorTask>> {
        self.query_documents_where_equals(MIRROR_TASKS, "source_task_id", task_id)
    }

    /// Relations where `task_id` is the mirror, destroyed ones included.
    pub fn mirror_tasks_by_mirror(&self, task_id: &str) -> Result<Vec<MirrorTask>> {
        self.query_documents_where_equals(MIRROR_TASKS, "mirror_task_id", task_id)
    }
}
