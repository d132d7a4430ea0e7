//! Change poller.
//!
//! Walks a team's recently updated tasks page by page, loads the list
//! dependencies each task needs, reconciles every snapshot and hands it to
//! the mirror engine. The team cursor is written once, after the pass.

use super::authorizer::TaskAuthorizer;
use super::mirror::{MirrorTaskSyncer, SyncOutcome};
use crate::api::{PAGE_SIZE, SearchTasksRequest, TaskService};
use crate::config::SyncRules;
use crate::db::Database;
use crate::logging::Logger;
use crate::types::{Folder, List, Member, Task, Team, TeamCursor};
use anyhow::Result;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Order key for team searches.
pub const ORDER_BY_UPDATED: &str = "updated";

/// How one team pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    Completed(PassSummary),
    /// A page could not be fetched; the cursor was left untouched.
    Aborted { reason: String },
    /// Cancelled before the pass finished; the cursor was left untouched.
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub pages: u32,
    pub processed: usize,
    pub failed: usize,
    /// The cursor value written at the end of the pass, if any.
    pub cursor: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForceSyncSummary {
    pub checked: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// High-water mark of one pass.
///
/// The next cursor is the newest processed update strictly older than the
/// oldest failed one, so a failed task is fetched again on the next pass.
#[derive(Debug, Clone, Default)]
pub struct CursorTracker {
    previous: Option<i64>,
    processed: Vec<i64>,
    min_failed: Option<i64>,
}

impl CursorTracker {
    pub fn new(previous: Option<i64>) -> Self {
        Self {
            previous,
            ..Default::default()
        }
    }

    /// Value for `date_updated_gt`; fixed for the whole pass.
    pub fn previous(&self) -> Option<i64> {
        self.previous.filter(|v| *v > 0)
    }

    pub fn processed(&mut self, updated_at: i64) {
        self.processed.push(updated_at);
    }

    pub fn failed(&mut self, updated_at: i64) {
        self.min_failed = Some(match self.min_failed {
            Some(min) => min.min(updated_at),
            None => updated_at,
        });
    }

    /// The value to persist, or `None` when the cursor must not move.
    pub fn next_value(&self) -> Option<i64> {
        let candidate = self
            .processed
            .iter()
            .copied()
            .filter(|ts| self.min_failed.is_none_or(|failed| *ts < failed))
            .max()?;
        match self.previous {
            Some(previous) if candidate <= previous => None,
            _ => Some(candidate),
        }
    }
}

pub struct ChangeManager {
    api: Arc<dyn TaskService>,
    db: Database,
    authorizer: TaskAuthorizer,
    syncer: MirrorTaskSyncer,
    log: Logger,
}

impl ChangeManager {
    pub fn new(api: Arc<dyn TaskService>, db: Database, log: &Logger) -> Self {
        let log = log.named("changes");
        Self {
            authorizer: TaskAuthorizer::new(db.clone(), &log),
            syncer: MirrorTaskSyncer::new(api.clone(), db.clone(), &log),
            api,
            db,
            log,
        }
    }

    pub fn syncer(&self) -> &MirrorTaskSyncer {
        &self.syncer
    }

    /// One incremental pass over the team's changed tasks.
    pub async fn poll_team(
        &self,
        rules: &SyncRules,
        team_id: &str,
        cancel: &CancellationToken,
    ) -> Result<PassOutcome> {
        let log = self.log.named("handle_latest_changes");

        let previous = self.db.get_team_cursor(team_id)?;
        if self.db.get_team(team_id)?.is_none() {
            self.db.upsert_team(&Team {
                id: team_id.to_string(),
                name: String::new(),
            })?;
        }

        let mut tracker = CursorTracker::new(previous.map(|c| c.last_task_updated_at));
        let mut loaded_lists: HashSet<String> = HashSet::new();
        let mut summary = PassSummary::default();
        let mut page = 0u32;

        log.debug_with(
            "Loading the latest changed tasks for team",
            json!({"team_id": team_id, "cursor": tracker.previous()}),
        );

        loop {
            let request = SearchTasksRequest {
                team_id: team_id.to_string(),
                order_by: Some(ORDER_BY_UPDATED.to_string()),
                date_updated_gt: tracker.previous(),
                page,
                include_closed: true,
                include_subtasks: true,
            };

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(PassOutcome::Cancelled),
                result = self.api.search_tasks_in_team(&request) => result,
            };
            let tasks = match result {
                Ok(tasks) => tasks,
                Err(err) => {
                    log.warning_with(
                        "Failed getting a task list from the service",
                        json!({"team_id": team_id, "page": page, "error": err.to_string()}),
                    );
                    return Ok(PassOutcome::Aborted {
                        reason: err.to_string(),
                    });
                }
            };
            summary.pages += 1;
            log.debug_with(
                "Got team tasks",
                json!({"team_id": team_id, "page": page, "num_tasks": tasks.len()}),
            );

            for api_task in &tasks {
                if loaded_lists.insert(api_task.list.id.clone()) {
                    let loaded = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Ok(PassOutcome::Cancelled),
                        loaded = self.fetch_list_dependencies(&api_task.list.id) => loaded,
                    };
                    log.warn_error_if(
                        loaded,
                        "Failed to load list dependencies",
                        json!({"list_id": api_task.list.id}),
                    );
                }

                let task = Task::from_api(api_task);
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Ok(PassOutcome::Cancelled),
                    result = self.process_task(rules, &task) => result,
                };
                match result {
                    Ok(_) => {
                        tracker.processed(task.updated_at);
                        summary.processed += 1;
                    }
                    Err(err) => {
                        log.warning_with(
                            "Failed to process task",
                            json!({"task_id": task.id, "error": format!("{err:#}")}),
                        );
                        tracker.failed(task.updated_at);
                        summary.failed += 1;
                    }
                }
            }

            if tasks.len() < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        if let Some(value) = tracker.next_value() {
            self.db.upsert_team_cursor(&TeamCursor {
                team_id: team_id.to_string(),
                last_task_updated_at: value,
            })?;
            summary.cursor = Some(value);
        }

        log.info_with(
            "Finished team pass",
            json!({
                "team_id": team_id,
                "pages": summary.pages,
                "processed": summary.processed,
                "failed": summary.failed,
                "cursor": summary.cursor,
            }),
        );
        Ok(PassOutcome::Completed(summary))
    }

    /// Reconcile one snapshot and run the mirror engine on it.
    pub async fn process_task(&self, rules: &SyncRules, task: &Task) -> Result<SyncOutcome> {
        let auth = self.authorizer.authorize(task)?;
        // Dropped on error or cancellation, which puts the baseline back and
        // lets the next pass see the task as changed again.
        let pending = self.authorizer.pending(&task.id, &auth);
        let outcome = self
            .syncer
            .sync(rules, auth.baseline.as_ref(), task, auth.changed)
            .await?;
        pending.commit();
        Ok(outcome)
    }

    /// Refetch every stored, non-deleted task of the team by id. A task the
    /// service no longer knows is marked deleted and synced, which unlinks
    /// its relations.
    pub async fn force_sync_all(
        &self,
        rules: &SyncRules,
        team_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ForceSyncSummary> {
        let log = self.log.named("force_sync");
        let mut summary = ForceSyncSummary::default();

        for stored in self.db.all_team_tasks(team_id)? {
            if stored.deleted {
                continue;
            }
            if cancel.is_cancelled() {
                break;
            }
            summary.checked += 1;

            let result = match self.api.task_by_id(&stored.id).await {
                Ok(api_task) => self.process_task(rules, &Task::from_api(&api_task)).await,
                Err(err) if err.is_not_found() => {
                    let deleted = Task {
                        deleted: true,
                        ..stored.clone()
                    };
                    summary.deleted += 1;
                    log.info_with("Task was deleted", json!({"task_id": stored.id}));
                    match self.db.upsert_task(&deleted) {
                        Ok(()) => self.syncer.sync(rules, Some(&stored), &deleted, true).await,
                        Err(err) => Err(err),
                    }
                }
                Err(err) => {
                    log.warning_with(
                        "Failed to get task data from the service",
                        json!({"task_id": stored.id, "error": err.to_string()}),
                    );
                    continue;
                }
            };

            if let Err(err) = result {
                summary.failed += 1;
                log.warning_with(
                    "Failed to sync task",
                    json!({"task_id": stored.id, "error": format!("{err:#}")}),
                );
            }
        }

        Ok(summary)
    }

    /// Re-run mirroring over the stored snapshots of a team, using each
    /// snapshot as its own baseline. Returns the number of tasks synced.
    pub async fn resync_stored(&self, rules: &SyncRules, team_id: &str) -> Result<usize> {
        let mut synced = 0;
        for task in self.db.all_team_tasks(team_id)? {
            match self.syncer.sync(rules, Some(&task), &task, true).await {
                Ok(_) => synced += 1,
                Err(err) => self.log.warning_with(
                    "Failed to resync stored task",
                    json!({"task_id": task.id, "error": format!("{err:#}")}),
                ),
            }
        }
        Ok(synced)
    }

    /// Stores the list, its members and its folder when they are not known
    /// yet. Service failures are logged; store failures are returned.
    pub async fn fetch_list_dependencies(&self, list_id: &str) -> Result<()> {
        let log = self.log.named("list_dependencies");

        let list = match self.db.get_list(list_id)? {
            Some(list) => Some(list),
            None => match self.api.list_by_id(list_id).await {
                Ok(api_list) => {
                    let list = List::from(&api_list);
                    self.db.insert_list_if_not_exists(&list)?;
                    Some(list)
                }
                Err(err) => {
                    log.warning_with(
                        "No list from the service",
                        json!({"list_id": list_id, "error": err.to_string()}),
                    );
                    None
                }
            },
        };

        match self.api.list_members_of_list(list_id).await {
            Ok(members) => {
                for api_member in &members {
                    if self.db.get_member(&api_member.id)?.is_none() {
                        self.db.upsert_member(&Member::from(api_member))?;
                    }
                }
            }
            Err(err) => log.warning_with(
                "No members of list from the service",
                json!({"list_id": list_id, "error": err.to_string()}),
            ),
        }

        let Some(list) = list else {
            return Ok(());
        };
        let Some(folder_id) = list.folder_id.as_deref().filter(|id| !id.is_empty()) else {
            log.warning_with("Got an empty folder for the list", json!({"list_id": list_id}));
            return Ok(());
        };
        if self.db.get_folder(folder_id)?.is_some() {
            return Ok(());
        }
        match self.api.folder_by_id(folder_id).await {
            Ok(api_folder) => {
                self.db.insert_folder_if_not_exists(&Folder::from(&api_folder))?;
            }
            Err(err) => log.warning_with(
                "No folder from the service",
                json!({"folder_id": folder_id, "list_id": list_id, "error": err.to_string()}),
            ),
        }
        Ok(())
    }
}
