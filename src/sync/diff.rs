//! Field differ.
//!
//! Pure functions from a pair of snapshots to the update to apply and the
//! lines to narrate. Name, description and priority flow from the source to
//! the mirror. Estimate and dates flow from the mirror to the source. All
//! other divergences are narrated only.
//!
//! Dates compare at whole-second resolution; estimates compare as the sum of
//! a task's own estimate and its subtasks'.

use crate::api::{Patch, UpdateTaskRequest};
use crate::format::{ms_human, rfc3339, unix_secs};
use crate::types::Task;

pub const SOURCE_CHANGED_HEADER: &str =
    "The original task has changed or differs from the mirror task:";
pub const MIRROR_CHANGED_HEADER: &str =
    "The mirror task has changed or differs from the original task (by main fields - estimate, due date, start date):";

/// Comment text from a header and bullet lines; `None` when there is
/// nothing to say.
pub fn comment_text(header: &str, lines: &[String]) -> Option<String> {
    if lines.is_empty() {
        return None;
    }
    let mut text = String::from(header);
    text.push('\n');
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    Some(text)
}

/// How one optional value on one side relates to the other side's value.
enum Divergence<T> {
    Same,
    /// Present here, absent there.
    Removed(T),
    Changed { ours: T, theirs: T },
    /// Absent here, present there.
    Added(T),
}

fn diverge<T: Copy>(
    ours: Option<T>,
    theirs: Option<T>,
    same: impl Fn(T, T) -> bool,
) -> Divergence<T> {
    match (ours, theirs) {
        (Some(ours), None) => Divergence::Removed(ours),
        (Some(ours), Some(theirs)) if !same(ours, theirs) => Divergence::Changed { ours, theirs },
        (None, Some(theirs)) => Divergence::Added(theirs),
        _ => Divergence::Same,
    }
}

fn same_second(a: i64, b: i64) -> bool {
    unix_secs(a) == unix_secs(b)
}

fn positive(v: i64) -> Option<i64> {
    (v > 0).then_some(v)
}

/// Inputs for original -> mirror propagation.
#[derive(Debug, Clone, Copy)]
pub struct SourceChange<'a> {
    /// Source snapshot before this event.
    pub baseline: &'a Task,
    pub source: &'a Task,
    pub source_total_estimate: i64,
    pub mirror: &'a Task,
    pub mirror_total_estimate: i64,
    /// Mirror name derived from the current source.
    pub mirror_name: &'a str,
    /// Current names of the source's containing folder and list.
    pub folder_name: &'a str,
    pub list_name: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MirrorPlan {
    /// Applied to the mirror when not empty.
    pub update: UpdateTaskRequest,
    /// Narrated on the mirror.
    pub comment: Vec<String>,
}

impl MirrorPlan {
    pub fn comment_text(&self) -> Option<String> {
        comment_text(SOURCE_CHANGED_HEADER, &self.comment)
    }
}

pub fn plan_mirror_update(change: &SourceChange<'_>) -> MirrorPlan {
    let SourceChange {
        baseline,
        source,
        mirror,
        ..
    } = *change;
    let mut update = UpdateTaskRequest::for_task(&mirror.id);
    let mut lines = Vec::new();

    if baseline.name != source.name {
        update.name = Some(change.mirror_name.to_string());
    }
    if baseline.description != source.description {
        update.description = Some(source.mirror_task_description());
    }
    match (source.priority_id, mirror.priority_id) {
        (Some(ours), theirs) if theirs != Some(ours) => update.priority = Some(Patch::Set(ours)),
        // A `null` priority clears it on the service.
        (None, Some(_)) => update.priority = Some(Patch::Clear),
        _ => {}
    }

    if baseline.status_name != source.status_name {
        lines.push(format!(
            "- changed task status name from {:?} to {:?}",
            baseline.status_name, source.status_name
        ));
    }
    if baseline.closed_at.is_none() && source.closed_at.is_some() {
        lines.push("- closed".to_string());
    }
    if !baseline.archived && source.archived {
        lines.push("- archived".to_string());
    }
    if !baseline.deleted && source.deleted {
        lines.push("- deleted".to_string());
    }
    if baseline.folder_id != source.folder_id {
        lines.push(format!("- moved to the folder {:?}", change.folder_name));
    }
    if baseline.list_id != source.list_id {
        lines.push(format!("- moved to the list {:?}", change.list_name));
    }

    let estimate = diverge(
        positive(change.mirror_total_estimate),
        positive(change.source_total_estimate),
        |a, b| a == b,
    );
    match estimate {
        Divergence::Same => {}
        Divergence::Removed(mirror_total) => lines.push(format!(
            "- different time estimate - should be equal to {:?} but nil",
            ms_human(mirror_total)
        )),
        Divergence::Changed {
            ours: mirror_total,
            theirs: source_total,
        } => lines.push(format!(
            "- different time estimate - equals {} but should be equal to {}",
            ms_human(source_total),
            ms_human(mirror_total)
        )),
        Divergence::Added(source_total) => lines.push(format!(
            "- different time estimate - should be nil but equals to {:?}",
            ms_human(source_total)
        )),
    }

    for (label, ours, theirs) in [
        ("due date", source.due_date, mirror.due_date),
        ("start date", source.start_date, mirror.start_date),
    ] {
        match diverge(ours, theirs, same_second) {
            Divergence::Same => {}
            Divergence::Removed(_) => lines.push(format!("- different {label} - should be nil")),
            Divergence::Changed { ours, theirs } => lines.push(format!(
                "- different {label} - equals {} but should be equal to {}",
                rfc3339(ours),
                rfc3339(theirs)
            )),
            Divergence::Added(theirs) => lines.push(format!(
                "- different {label} - should be equal to {}",
                rfc3339(theirs)
            )),
        }
    }

    MirrorPlan {
        update,
        comment: lines,
    }
}

/// Inputs for mirror -> original propagation.
#[derive(Debug, Clone, Copy)]
pub struct MirrorChange<'a> {
    pub mirror: &'a Task,
    pub mirror_total_estimate: i64,
    pub original: &'a Task,
    /// Mirror name derived from the current original.
    pub expected_mirror_name: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OriginalPlan {
    /// Renames the mirror when not empty.
    pub mirror_update: UpdateTaskRequest,
    /// Applied to the original when not empty.
    pub original_update: UpdateTaskRequest,
    /// Narrated on the mirror.
    pub comment: Vec<String>,
}

impl OriginalPlan {
    pub fn comment_text(&self) -> Option<String> {
        comment_text(MIRROR_CHANGED_HEADER, &self.comment)
    }
}

pub fn plan_original_update(change: &MirrorChange<'_>) -> OriginalPlan {
    let MirrorChange {
        mirror, original, ..
    } = *change;
    let mut mirror_update = UpdateTaskRequest::for_task(&mirror.id);
    let mut original_update = UpdateTaskRequest::for_task(&original.id);
    let mut lines = Vec::new();

    if mirror.name != change.expected_mirror_name {
        mirror_update.name = Some(change.expected_mirror_name.to_string());
    }

    match diverge(
        original.time_estimate_ms.and_then(positive),
        positive(change.mirror_total_estimate),
        |a, b| a == b,
    ) {
        Divergence::Same => {}
        Divergence::Removed(_) => {
            original_update.time_estimate = Some(Patch::Clear);
            lines.push("- orig task will be updated - time estimate will be removed".to_string());
        }
        Divergence::Changed { theirs, .. } | Divergence::Added(theirs) => {
            original_update.time_estimate = Some(Patch::Set(theirs));
            lines.push(format!(
                "- orig task will be updated - time estimate will be set to {}",
                ms_human(theirs)
            ));
        }
    }

    let dates = [
        ("due date", original.due_date, mirror.due_date, &mut original_update.due_date),
        ("start date", original.start_date, mirror.start_date, &mut original_update.start_date),
    ];
    for (label, ours, theirs, field) in dates {
        match diverge(ours, theirs, same_second) {
            Divergence::Same => {}
            Divergence::Removed(_) => {
                *field = Some(Patch::Clear);
                lines.push(format!("- orig task will be updated - {label} will be removed"));
            }
            Divergence::Changed { theirs, .. } | Divergence::Added(theirs) => {
                *field = Some(Patch::Set(unix_secs(theirs) * 1000));
                lines.push(format!(
                    "- orig task will be updated - {label} will be set to {}",
                    rfc3339(theirs)
                ));
            }
        }
    }

    OriginalPlan {
        mirror_update,
        original_update,
        comment: lines,
    }
}
