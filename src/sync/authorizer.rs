//! Task authorizer: classifies an incoming snapshot against the stored one.

use crate::db::Database;
use crate::logging::Logger;
use crate::types::Task;
use anyhow::Result;
use serde_json::json;

#[derive(Debug, Clone, PartialEq)]
pub struct Authorization {
    /// Stored snapshot before this call; `None` for a first sighting.
    pub baseline: Option<Task>,
    pub changed: bool,
}

#[derive(Clone)]
pub struct TaskAuthorizer {
    db: Database,
    log: Logger,
}

impl TaskAuthorizer {
    pub fn new(db: Database, log: &Logger) -> Self {
        Self {
            db,
            log: log.named("authorize"),
        }
    }

    /// New and changed snapshots are stored whole; unchanged ones are not
    /// written.
    pub fn authorize(&self, incoming: &Task) -> Result<Authorization> {
        let Some(baseline) = self.db.get_task(&incoming.id)? else {
            self.log.debug_with(
                "Task not found, storing it",
                json!({"task_id": incoming.id, "task_updated_at": incoming.updated_at}),
            );
            self.db.upsert_task(incoming)?;
            return Ok(Authorization {
                baseline: None,
                changed: true,
            });
        };

        if baseline.updated_at == incoming.updated_at {
            self.log.debug_with(
                "Task has no changes",
                json!({"task_id": incoming.id, "task_updated_at": incoming.updated_at}),
            );
            return Ok(Authorization {
                baseline: Some(baseline),
                changed: false,
            });
        }

        self.log.debug_with(
            "Task has changes, storing it",
            json!({
                "task_id": incoming.id,
                "old_task_updated_at": baseline.updated_at,
                "task_updated_at": incoming.updated_at,
            }),
        );
        self.db.upsert_task(incoming)?;
        Ok(Authorization {
            baseline: Some(baseline),
            changed: true,
        })
    }

    /// Put back the snapshot that `authorize` replaced. Without a baseline
    /// the stored copy is removed, so the next sighting is a first one.
    pub fn restore(&self, task_id: &str, baseline: Option<&Task>) -> Result<()> {
        match baseline {
            Some(baseline) => self.db.upsert_task(baseline),
            None => self.db.delete_task(task_id).map(|_| ()),
        }
    }

    /// Hold the snapshot stored by `authorize` until the sync that follows
    /// it succeeds. Dropping the guard uncommitted restores the baseline.
    pub fn pending<'a>(&'a self, task_id: &str, auth: &Authorization) -> PendingSnapshot<'a> {
        PendingSnapshot {
            authorizer: self,
            task_id: task_id.to_string(),
            baseline: auth.baseline.clone(),
            armed: auth.changed,
        }
    }
}

/// A stored snapshot whose sync has not finished yet.
#[must_use]
pub struct PendingSnapshot<'a> {
    authorizer: &'a TaskAuthorizer,
    task_id: String,
    baseline: Option<Task>,
    armed: bool,
}

impl PendingSnapshot<'_> {
    pub fn commit(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingSnapshot<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.authorizer.log.debug_with(
            "Sync did not finish, restoring the previous snapshot",
            json!({"task_id": self.task_id}),
        );
        let restored = self
            .authorizer
            .restore(&self.task_id, self.baseline.as_ref());
        self.authorizer.log.warn_error_if(
            restored,
            "Failed to restore the previous task snapshot",
            json!({"task_id": self.task_id}),
        );
    }
}
