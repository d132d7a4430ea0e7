//! Core types for the mirror sync engine.

use crate::api::{ApiFolder, ApiList, ApiMember, ApiTask};
use crate::error::RelationKeyError;
use serde::{Deserialize, Serialize};

/// Tag put on every created mirror task.
pub const MIRROR_TAG: &str = "mirror";

/// Snapshot of a remote task as last fetched.
///
/// Timestamps are milliseconds since the epoch. Related records (list,
/// folder, team, members, other tasks) are referenced by id only and
/// resolved against the store on demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub custom_id: Option<String>,
    pub description: String,
    pub text_content: String,
    pub status_name: String,
    pub status_type: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub closed_at: Option<i64>,
    pub due_date: Option<i64>,
    pub start_date: Option<i64>,
    pub time_estimate_ms: Option<i64>,
    pub archived: bool,
    /// Set locally once the service reports the task as gone.
    pub deleted: bool,
    pub creator_id: Option<String>,
    pub assignee_ids: Vec<String>,
    pub url: String,
    pub parent_task_id: Option<String>,
    pub priority_id: Option<i64>,
    pub tags: Vec<String>,
    pub linked_task_ids: Vec<String>,
    pub team_id: String,
    pub list_id: String,
    pub folder_id: String,
}

impl Task {
    pub fn from_api(api: &ApiTask) -> Self {
        Self {
            id: api.id.clone(),
            name: api.name.clone(),
            custom_id: api.custom_id.clone().filter(|id| !id.is_empty()),
            description: api.description.clone().unwrap_or_default(),
            text_content: api.text_content.clone().unwrap_or_default(),
            status_name: api.status.status.clone(),
            status_type: api.status.kind.clone(),
            created_at: api.date_created,
            updated_at: api.date_updated,
            closed_at: api.date_closed,
            due_date: api.due_date,
            start_date: api.start_date,
            time_estimate_ms: api.time_estimate,
            archived: api.archived,
            deleted: false,
            creator_id: api
                .creator
                .as_ref()
                .map(|c| c.id.clone())
                .filter(|id| !id.is_empty()),
            assignee_ids: api.assignees.iter().map(|m| m.id.clone()).collect(),
            url: api.url.clone(),
            parent_task_id: api.parent.clone().filter(|id| !id.is_empty()),
            priority_id: api.priority.as_ref().map(|p| p.id),
            tags: api.tags.iter().map(|t| t.name.clone()).collect(),
            linked_task_ids: api.linked_tasks.iter().map(|l| l.task_id.clone()).collect(),
            team_id: api.team_id.clone(),
            list_id: api.list.id.clone(),
            folder_id: api.folder.id.clone(),
        }
    }

    /// Deleted, archived or closed.
    pub fn is_deleted_or_hidden(&self) -> bool {
        self.deleted || self.archived || self.closed_at.is_some()
    }

    /// `{list}[/{custom id}]: [!{priority} ]{name}`
    pub fn mirror_task_name(&self, list_name: &str) -> String {
        let mut name = list_name.to_string();
        if let Some(custom_id) = &self.custom_id {
            name.push('/');
            name.push_str(custom_id);
        }
        name.push_str(": ");
        if let Some(priority) = self.priority_id {
            name.push_str(&format!("!{priority} "));
        }
        name.push_str(&self.name);
        name
    }

    pub fn mirror_task_description(&self) -> String {
        format!(
            "Mirror task from {}\n\
             NOTE: description does not auto-update. Need keep description up to date manually.\n\
             * * *\n\
             {}",
            self.url, self.description
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct List {
    pub id: String,
    pub name: String,
    pub archived: bool,
    pub folder_id: Option<String>,
}

impl From<&ApiList> for List {
    fn from(api: &ApiList) -> Self {
        Self {
            id: api.id.clone(),
            name: api.name.clone(),
            archived: api.archived,
            folder_id: Some(api.folder.id.clone()).filter(|id| !id.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Folder {
    pub id: String,
    pub name: String,
    pub archived: bool,
}

impl From<&ApiFolder> for Folder {
    fn from(api: &ApiFolder) -> Self {
        Self {
            id: api.id.clone(),
            name: api.name.clone(),
            archived: api.archived,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Team {
    pub id: String,
    pub name: String,
}

/// A workspace member. Email is stored lower-cased.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Member {
    pub id: String,
    pub username: String,
    pub email: String,
    pub initials: String,
}

impl From<&ApiMember> for Member {
    fn from(api: &ApiMember) -> Self {
        Self {
            id: api.id.clone(),
            username: api.username.clone(),
            email: api.email.to_lowercase(),
            initials: api.initials.clone(),
        }
    }
}

/// Directed source -> mirror relation. Destroyed relations stay in the
/// store with the reason.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorTask {
    pub source_task_id: String,
    pub mirror_task_id: String,
    /// List the mirror was created in.
    pub mirror_list_id: Option<String>,
    pub created_at: i64,
    pub destroyed: bool,
    pub destroyed_at: Option<i64>,
    pub destroyed_reason: Option<String>,
}

impl MirrorTask {
    pub fn new(source_task_id: impl Into<String>, mirror_task_id: impl Into<String>) -> Self {
        Self {
            source_task_id: source_task_id.into(),
            mirror_task_id: mirror_task_id.into(),
            ..Default::default()
        }
    }

    /// `src:{source}:dst:{mirror}`
    pub fn key(&self) -> String {
        format!("src:{}:dst:{}", self.source_task_id, self.mirror_task_id)
    }

    /// Splits a relation key into `(source, mirror)`.
    pub fn parse_key(key: &str) -> Result<(String, String), RelationKeyError> {
        match key.split(':').collect::<Vec<_>>().as_slice() {
            ["src", source, "dst", mirror] if !source.is_empty() && !mirror.is_empty() => {
                Ok((source.to_string(), mirror.to_string()))
            }
            _ => Err(RelationKeyError(key.to_string())),
        }
    }
}

/// Per-team incremental fetch position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamCursor {
    pub team_id: String,
    pub last_task_updated_at: i64,
}

impl TeamCursor {
    pub fn key_for(team_id: &str) -> String {
        format!("team:{team_id}")
    }

    pub fn key(&self) -> String {
        Self::key_for(&self.team_id)
    }
}
