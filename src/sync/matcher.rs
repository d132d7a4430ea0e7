//! Rule matching.

use crate::config::rules::{Condition, MirrorRule, SyncRules};
use crate::types::Task;

/// Rules that apply to one task, split by role.
#[derive(Debug, Default)]
pub struct MatchedRules<'r> {
    /// The task may get a new mirror from these.
    pub add: Vec<&'r MirrorRule>,
    /// The task is a source whose changes these track.
    pub track: Vec<&'r MirrorRule>,
    /// The task sits in these rules' target list, so it may be a mirror.
    pub mirror_side: Vec<&'r MirrorRule>,
}

impl MatchedRules<'_> {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.track.is_empty() && self.mirror_side.is_empty()
    }
}

fn eq_fold(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

fn open_or_contains(allowed: &[String], value: &str) -> bool {
    allowed.is_empty() || allowed.iter().any(|id| id == value)
}

impl Condition {
    /// All constraints must pass; an empty constraint always passes.
    /// `assignee_emails` are the task's assignees, lower-cased.
    pub fn passes(&self, task: &Task, assignee_emails: &[String]) -> bool {
        open_or_contains(&self.folder_ids, &task.folder_id)
            && open_or_contains(&self.list_ids, &task.list_id)
            && (self.status_names.is_empty()
                || self.status_names.iter().any(|s| eq_fold(s, &task.status_name)))
            && match &self.assignee_email {
                None => true,
                Some(email) => assignee_emails.iter().any(|e| eq_fold(e, email)),
            }
    }
}

/// Sort the rules that apply to `task` into add, track and mirror-side sets.
pub fn match_rules<'r>(
    rules: &'r SyncRules,
    task: &Task,
    assignee_emails: &[String],
) -> MatchedRules<'r> {
    let mut matched = MatchedRules::default();

    for rule in &rules.rules {
        if !rule.applies_to_team(&task.team_id) {
            continue;
        }
        if rule.add.as_ref().is_some_and(|c| c.passes(task, assignee_emails)) {
            matched.add.push(rule);
        }
        if rule
            .track_changes
            .as_ref()
            .is_some_and(|c| c.passes(task, assignee_emails))
        {
            matched.track.push(rule);
        }
        if rule.target_list_id().is_some_and(|list| list == task.list_id) {
            matched.mirror_side.push(rule);
        }
    }

    matched
}
