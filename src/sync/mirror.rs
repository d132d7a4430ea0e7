//! Mirror sync engine.
//!
//! For each changed task: load its relations, match rules, then propagate
//! along live relations and create missing mirrors. Remote failures are
//! logged and left for the next event on either side; store failures are
//! returned to the caller.

use super::diff::{MirrorChange, SourceChange, plan_mirror_update, plan_original_update};
use super::matcher::match_rules;
use super::registry::{MirrorRegistry, TaskRelations};
use crate::api::{AddCommentRequest, CreateTaskRequest, TaskService, UpdateTaskRequest};
use crate::config::{MirrorRule, SyncRules};
use crate::db::Database;
use crate::logging::Logger;
use crate::resolve::TaskView;
use crate::types::{MIRROR_TAG, MirrorTask, Task};
use anyhow::Result;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

pub const REASON_MIRROR_HIDDEN: &str = "mirror archived/hidden";
pub const REASON_ORIGINAL_HIDDEN: &str = "original archived/hidden";

const UNLINK_MIRROR_HIDDEN: &str = "UNLINK MIRROR TASK: the mirror task has been DELETED or HIDDEN";
const UNLINK_CHANGED_HIDDEN_MIRROR: &str =
    "FYI changes have been made to a mirror task that is DELETED or HIDDEN - nothing will be updated in original tasks and UNLINK MIRROR TASK";
const UNLINK_ORIGINAL_HIDDEN: &str =
    "UNLINK MIRROR TASK: the original task has been DELETED or HIDDEN";

/// What [`MirrorTaskSyncer::sync`] did with one task event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Unchanged,
    /// Hidden on first sighting with nothing linked to it.
    HiddenWithoutRelations,
    /// Mirror and source at once; nothing was touched.
    Crossed,
    Processed(SyncCounts),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounts {
    pub propagated_as_source: usize,
    pub propagated_as_mirror: usize,
    pub unlinked: usize,
    pub created: usize,
}

/// Result of one propagation along one relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Propagation {
    Applied,
    Unlinked,
    Skipped,
}

pub struct MirrorTaskSyncer {
    api: Arc<dyn TaskService>,
    db: Database,
    registry: MirrorRegistry,
    log: Logger,
}

impl MirrorTaskSyncer {
    pub fn new(api: Arc<dyn TaskService>, db: Database, log: &Logger) -> Self {
        let log = log.named("sync_mirror_task");
        Self {
            api,
            registry: MirrorRegistry::new(db.clone(), &log),
            db,
            log,
        }
    }

    pub fn registry(&self) -> &MirrorRegistry {
        &self.registry
    }

    pub async fn sync(
        &self,
        rules: &SyncRules,
        baseline: Option<&Task>,
        task: &Task,
        changed: bool,
    ) -> Result<SyncOutcome> {
        if !changed {
            self.log
                .debug_with("Skip the unchanged task", json!({"task_id": task.id}));
            return Ok(SyncOutcome::Unchanged);
        }

        let relations = self.registry.relations_for(&task.id)?;
        if relations.is_crossed() {
            self.log.warning_with(
                "Task is both a mirror and a source, multi-sync is not supported",
                json!({
                    "task_id": task.id,
                    "as_mirror": relations.as_mirror.len(),
                    "as_source": relations.as_source.len(),
                }),
            );
            return Ok(SyncOutcome::Crossed);
        }

        if baseline.is_none() && relations.is_empty() && task.is_deleted_or_hidden() {
            self.log.debug_with(
                "Received an archived or closed task, nothing to do",
                json!({"task_id": task.id}),
            );
            return Ok(SyncOutcome::HiddenWithoutRelations);
        }

        for relation in &relations.destroyed {
            self.log.debug_with(
                "Skipped the destroyed mirror task",
                json!({"key": relation.key()}),
            );
        }

        let view = TaskView::new(&self.db, task.clone());
        let emails = view.assignee_emails()?;
        let matched = match_rules(rules, task, &emails);
        self.log.debug_with(
            "Matched rules",
            json!({
                "task_id": task.id,
                "num_added_rules": matched.add.len(),
                "num_changed_rules": matched.track.len(),
                "num_synced_rules": matched.mirror_side.len(),
            }),
        );

        let mut counts = SyncCounts::default();
        if matched.is_empty() && relations.is_empty() {
            self.log
                .debug_with("No rule applies to the task", json!({"task_id": task.id}));
            return Ok(SyncOutcome::Processed(counts));
        }

        let mut mirrored_lists = self
            .propagate_relations(
                &relations,
                &matched.track,
                &matched.mirror_side,
                baseline,
                &view,
                &mut counts,
            )
            .await?;

        if !task.is_deleted_or_hidden() {
            for rule in &matched.add {
                let Some(list_id) = rule.target_list_id() else {
                    continue;
                };
                if mirrored_lists.contains(list_id) {
                    continue;
                }
                if self.add_mirror_task(rule, &view).await?.is_some() {
                    counts.created += 1;
                    mirrored_lists.insert(list_id.to_string());
                }
            }
        }

        Ok(SyncOutcome::Processed(counts))
    }

    /// Runs propagation along every live relation and returns the lists the
    /// task is already mirrored into.
    async fn propagate_relations(
        &self,
        relations: &TaskRelations,
        track: &[&MirrorRule],
        mirror_side: &[&MirrorRule],
        baseline: Option<&Task>,
        view: &TaskView<'_>,
        counts: &mut SyncCounts,
    ) -> Result<HashSet<String>> {
        let mut mirrored_lists = HashSet::new();

        for relation in &relations.as_source {
            // A live relation occupies its list even when the mirror is unreachable.
            let recorded_list = relation
                .mirror_list_id
                .as_deref()
                .filter(|list_id| !list_id.is_empty());
            if let Some(list_id) = recorded_list {
                mirrored_lists.insert(list_id.to_string());
            }

            let Some(mirror) = self.counterpart(&relation.mirror_task_id).await? else {
                continue;
            };
            if recorded_list.is_none() {
                mirrored_lists.insert(mirror.list_id.clone());
            }

            let mirror = TaskView::new(&self.db, mirror);
            for rule in track {
                match self
                    .propagate_as_source(relation, rule, baseline, view, &mirror)
                    .await?
                {
                    Propagation::Applied => counts.propagated_as_source += 1,
                    Propagation::Unlinked => {
                        counts.unlinked += 1;
                        break;
                    }
                    Propagation::Skipped => {}
                }
            }
        }

        for relation in &relations.as_mirror {
            for rule in mirror_side {
                match self.propagate_as_mirror(relation, rule, view).await? {
                    Propagation::Applied => counts.propagated_as_mirror += 1,
                    Propagation::Unlinked => {
                        counts.unlinked += 1;
                        break;
                    }
                    Propagation::Skipped => {}
                }
            }
        }

        Ok(mirrored_lists)
    }

    /// Original -> mirror.
    async fn propagate_as_source(
        &self,
        relation: &MirrorTask,
        rule: &MirrorRule,
        baseline: Option<&Task>,
        source: &TaskView<'_>,
        mirror: &TaskView<'_>,
    ) -> Result<Propagation> {
        let Some(baseline) = baseline else {
            self.log.error_with(
                "Source task has relations but no stored baseline",
                json!({"task_id": source.task().id, "key": relation.key()}),
            );
            return Ok(Propagation::Skipped);
        };

        if mirror.task().is_deleted_or_hidden() {
            self.send_comment(
                &relation.mirror_task_id,
                UNLINK_MIRROR_HIDDEN,
                rule.unlink_assignee(),
            )
            .await;
            self.registry.destroy(relation, REASON_MIRROR_HIDDEN)?;
            return Ok(Propagation::Unlinked);
        }

        let mirror_name = source.mirror_task_name()?;
        let folder_name = source.folder_name()?;
        let list_name = source.list_name()?;
        let plan = plan_mirror_update(&SourceChange {
            baseline,
            source: source.task(),
            source_total_estimate: source.total_estimate()?,
            mirror: mirror.task(),
            mirror_total_estimate: mirror.total_estimate()?,
            mirror_name: &mirror_name,
            folder_name: &folder_name,
            list_name: &list_name,
        });

        if !plan.update.is_empty() {
            self.apply_update(&plan.update, "mirror").await?;
        }
        if let Some(text) = plan.comment_text() {
            self.send_comment(&relation.mirror_task_id, &text, rule.diff_assignee())
                .await;
        }
        Ok(Propagation::Applied)
    }

    /// Mirror -> original.
    async fn propagate_as_mirror(
        &self,
        relation: &MirrorTask,
        rule: &MirrorRule,
        mirror: &TaskView<'_>,
    ) -> Result<Propagation> {
        if mirror.task().is_deleted_or_hidden() {
            self.send_comment(
                &mirror.task().id,
                UNLINK_CHANGED_HIDDEN_MIRROR,
                rule.unlink_assignee(),
            )
            .await;
            self.registry.destroy(relation, REASON_MIRROR_HIDDEN)?;
            return Ok(Propagation::Unlinked);
        }

        let Some(original) = self.counterpart(&relation.source_task_id).await? else {
            self.log.warning_with(
                "Mirror task without a loadable original",
                json!({
                    "orig_task_id": relation.source_task_id,
                    "mirror_task_id": relation.mirror_task_id,
                }),
            );
            return Ok(Propagation::Skipped);
        };

        if original.is_deleted_or_hidden() {
            self.send_comment(&mirror.task().id, UNLINK_ORIGINAL_HIDDEN, rule.unlink_assignee())
                .await;
            self.registry.destroy(relation, REASON_ORIGINAL_HIDDEN)?;
            return Ok(Propagation::Unlinked);
        }

        let original = TaskView::new(&self.db, original);
        let expected_mirror_name = original.mirror_task_name()?;
        let plan = plan_original_update(&MirrorChange {
            mirror: mirror.task(),
            mirror_total_estimate: mirror.total_estimate()?,
            original: original.task(),
            expected_mirror_name: &expected_mirror_name,
        });

        if !plan.mirror_update.is_empty() {
            self.apply_update(&plan.mirror_update, "mirror").await?;
        }
        if !plan.original_update.is_empty() {
            self.apply_update(&plan.original_update, "original").await?;
        }
        if let Some(text) = plan.comment_text() {
            self.send_comment(&relation.mirror_task_id, &text, rule.diff_assignee())
                .await;
        }
        Ok(Propagation::Applied)
    }

    /// Creates a mirror of `source` in the rule's target list. Returns the
    /// new relation, or `None` when nothing was created.
    pub async fn add_mirror_task(
        &self,
        rule: &MirrorRule,
        source: &TaskView<'_>,
    ) -> Result<Option<MirrorTask>> {
        let task = source.task();
        let log = self.log.named("add_mirror_task");

        if task.is_deleted_or_hidden() {
            log.debug_with(
                "Aborted, task was deleted or hidden",
                json!({"task_id": task.id}),
            );
            return Ok(None);
        }
        let Some(target) = rule.target.as_ref() else {
            return Ok(None);
        };
        let Some(list_id) = target.list_id.as_deref() else {
            log.warning_with(
                "Rule has no readable target list",
                json!({"task_id": task.id, "rule": rule.name}),
            );
            return Ok(None);
        };

        let mut request = CreateTaskRequest {
            list_id: list_id.to_string(),
            name: source.mirror_task_name()?,
            markdown_description: task.mirror_task_description(),
            status: target.status_name.clone(),
            tags: vec![MIRROR_TAG.to_string()],
            links_to: Some(task.id.clone()),
            assignees: Vec::new(),
        };

        let mut comment = vec![format!("The mirror task from {}", task.url)];
        if let Some(email) = target.assignee_email.as_deref() {
            match self.member_id_by_email(email) {
                Some(member_id) => request.assignees.push(member_id),
                None => {
                    log.warning_with(
                        "Failed to find member by email",
                        json!({"task_id": task.id, "email": email}),
                    );
                    comment.push(format!("Must be assigned to {email}"));
                }
            }
        }

        let mirror_task_id = match self.api.create_task(&request).await {
            Ok(id) if !id.is_empty() => id,
            Ok(_) => {
                log.error_with(
                    "Aborted creation of a mirror task, no id returned",
                    json!({"task_id": task.id, "list_id": list_id}),
                );
                return Ok(None);
            }
            Err(err) => {
                log.error_with(
                    "Failed to create a mirror task",
                    json!({"task_id": task.id, "list_id": list_id, "error": err.to_string()}),
                );
                return Ok(None);
            }
        };

        let relation = match self.registry.link(&task.id, &mirror_task_id, Some(list_id)) {
            Ok(relation) => relation,
            Err(err) => {
                log.error_with(
                    "Failed to store the mirror relation",
                    json!({
                        "task_id": task.id,
                        "mirror_task_id": mirror_task_id,
                        "error": err.to_string(),
                    }),
                );
                return Ok(None);
            }
        };

        comment.extend(
            [
                "A ready go.",
                "",
                "NOTES:",
                "- description without markdown formatting",
                "- estimates set in subtasks do not initiate a push into the original task",
                "- the due date is not always pushed into the original task",
            ]
            .map(String::from),
        );
        let mut text = comment.join("\n");
        text.push('\n');
        self.send_comment(&mirror_task_id, &text, None).await;

        Ok(Some(relation))
    }

    /// Stored snapshot of `task_id`, fetched and stored when missing.
    async fn counterpart(&self, task_id: &str) -> Result<Option<Task>> {
        if let Some(task) = self.db.get_task(task_id)? {
            return Ok(Some(task));
        }
        match self.api.task_by_id(task_id).await {
            Ok(api_task) => {
                let task = Task::from_api(&api_task);
                self.db.upsert_task(&task)?;
                Ok(Some(task))
            }
            Err(err) => {
                self.log.warning_with(
                    "Linked task is not available, skipping the relation",
                    json!({"task_id": task_id, "error": err.to_string()}),
                );
                Ok(None)
            }
        }
    }

    /// Sends the update; on success stores the task as the service returns it.
    async fn apply_update(&self, request: &UpdateTaskRequest, side: &str) -> Result<()> {
        match self.api.update_task(request).await {
            Ok(updated) => {
                self.db.upsert_task(&Task::from_api(&updated))?;
                self.log.debug_with(
                    "Updated task",
                    json!({"task_id": request.task_id, "side": side}),
                );
            }
            Err(err) => self.log.warning_with(
                "Failed to update task",
                json!({"task_id": request.task_id, "side": side, "error": err.to_string()}),
            ),
        }
        Ok(())
    }

    fn member_id_by_email(&self, email: &str) -> Option<String> {
        match self.db.members_by_email(email) {
            Ok(members) => {
                if members.len() > 1 {
                    self.log.warning_with(
                        "More than one member with the same email, using the first",
                        json!({"email": email, "found_num_members": members.len()}),
                    );
                }
                members.into_iter().next().map(|m| m.id)
            }
            Err(err) => {
                self.log.warning_with(
                    "Failed to look up member by email",
                    json!({"email": email, "error": err.to_string()}),
                );
                None
            }
        }
    }

    /// Best effort; failures are logged.
    async fn send_comment(&self, task_id: &str, text: &str, assign_to_email: Option<&str>) {
        let assignee = assign_to_email.and_then(|email| {
            let id = self.member_id_by_email(email);
            if id.is_none() {
                self.log.warning_with(
                    "Comment sending - member not found by email",
                    json!({"email": email, "task_id": task_id}),
                );
            }
            id
        });
        let request = AddCommentRequest {
            task_id: task_id.to_string(),
            comment_text: text.to_string(),
            assignee,
        };
        self.log.warn_error_if(
            self.api.add_comment(&request).await,
            "Failed to send comment",
            json!({"task_id": task_id}),
        );
    }
}
