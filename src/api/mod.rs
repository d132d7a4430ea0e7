//! Task-service boundary.
//!
//! [`TaskService`] is the only way the engine talks to the remote service.
//! [`HttpTaskService`] implements it over the ClickUp v2 REST API; tests
//! substitute an in-process fake.

mod http;
pub mod wire;

pub use http::{DEFAULT_BASE_URL, HttpTaskService};
pub use wire::{ApiFolder, ApiList, ApiMember, ApiTask};

use crate::error::ApiResult;
use async_trait::async_trait;
use serde_json::{Map, Value, json};

/// Page size used by the service for team task searches.
pub const PAGE_SIZE: usize = 100;

/// A field change in an update request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Patch<T> {
    Set(T),
    /// Remove the value; sent as JSON `null`. This is also how a priority
    /// is cleared, in place of a zero priority id.
    Clear,
}

impl Patch<i64> {
    fn to_json(self) -> Value {
        match self {
            Patch::Set(v) => json!(v),
            Patch::Clear => Value::Null,
        }
    }
}

/// Filter for `GET /team/{team_id}/task`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchTasksRequest {
    pub team_id: String,
    pub order_by: Option<String>,
    /// Only tasks updated strictly after this millisecond timestamp.
    pub date_updated_gt: Option<i64>,
    pub page: u32,
    pub include_closed: bool,
    pub include_subtasks: bool,
}

impl SearchTasksRequest {
    /// Query string pairs in the order the service documents them.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut q = Vec::new();
        if let Some(order_by) = &self.order_by {
            q.push(("order_by", order_by.clone()));
        }
        if let Some(ts) = self.date_updated_gt.filter(|ts| *ts > 0) {
            q.push(("date_updated_gt", ts.to_string()));
        }
        if self.page > 0 {
            q.push(("page", self.page.to_string()));
        }
        if self.include_closed {
            q.push(("include_closed", "true".to_string()));
        }
        if self.include_subtasks {
            q.push(("subtasks", "true".to_string()));
        }
        q
    }
}

/// Partial update for `PUT /task/{task_id}`. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateTaskRequest {
    pub task_id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<Patch<i64>>,
    pub time_estimate: Option<Patch<i64>>,
    pub due_date: Option<Patch<i64>>,
    pub start_date: Option<Patch<i64>>,
}

impl UpdateTaskRequest {
    pub fn for_task(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            ..Default::default()
        }
    }

    /// True when the request would not change anything.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.time_estimate.is_none()
            && self.due_date.is_none()
            && self.start_date.is_none()
    }

    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        if let Some(name) = &self.name {
            body.insert("name".into(), json!(name));
        }
        if let Some(description) = &self.description {
            body.insert("description".into(), json!(description));
        }
        if let Some(status) = &self.status {
            body.insert("status".into(), json!(status));
        }
        if let Some(priority) = self.priority {
            body.insert("priority".into(), priority.to_json());
        }
        if let Some(estimate) = self.time_estimate {
            body.insert("time_estimate".into(), estimate.to_json());
        }
        if let Some(due) = self.due_date {
            body.insert("due_date".into(), due.to_json());
        }
        if let Some(start) = self.start_date {
            body.insert("start_date".into(), start.to_json());
        }
        Value::Object(body)
    }
}

/// Body for `POST /list/{list_id}/task`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateTaskRequest {
    pub list_id: String,
    pub name: String,
    pub markdown_description: String,
    pub status: Option<String>,
    pub tags: Vec<String>,
    /// Task the new one links back to.
    pub links_to: Option<String>,
    pub assignees: Vec<String>,
}

impl CreateTaskRequest {
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("name".into(), json!(self.name));
        body.insert(
            "markdown_description".into(),
            json!(self.markdown_description),
        );
        if !self.tags.is_empty() {
            body.insert("tags".into(), json!(self.tags));
        }
        if let Some(links_to) = &self.links_to {
            body.insert("links_to".into(), json!(links_to));
        }
        if let Some(status) = &self.status {
            body.insert("status".into(), json!(status));
        }
        if !self.assignees.is_empty() {
            // Member ids are numeric on this endpoint.
            let ids: Vec<Value> = self
                .assignees
                .iter()
                .map(|id| id.parse::<i64>().map(Value::from).unwrap_or_else(|_| json!(id)))
                .collect();
            body.insert("assignees".into(), Value::Array(ids));
        }
        Value::Object(body)
    }
}

/// Body for `POST /task/{task_id}/comment`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddCommentRequest {
    pub task_id: String,
    pub comment_text: String,
    pub assignee: Option<String>,
}

impl AddCommentRequest {
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("comment_text".into(), json!(self.comment_text));
        if let Some(assignee) = &self.assignee {
            body.insert("assignee".into(), json!(assignee));
        }
        Value::Object(body)
    }
}

/// Operations the engine consumes from the remote task service.
#[async_trait]
pub trait TaskService: Send + Sync {
    /// One page of team tasks matching `req`.
    async fn search_tasks_in_team(&self, req: &SearchTasksRequest) -> ApiResult<Vec<ApiTask>>;

    async fn task_by_id(&self, task_id: &str) -> ApiResult<ApiTask>;

    /// Applies `req` and returns the task as stored by the service afterwards.
    async fn update_task(&self, req: &UpdateTaskRequest) -> ApiResult<ApiTask>;

    /// Creates a task and returns its identifier.
    async fn create_task(&self, req: &CreateTaskRequest) -> ApiResult<String>;

    async fn add_comment(&self, req: &AddCommentRequest) -> ApiResult<()>;

    async fn list_members_of_list(&self, list_id: &str) -> ApiResult<Vec<ApiMember>>;

    async fn list_by_id(&self, list_id: &str) -> ApiResult<ApiList>;

    async fn folder_by_id(&self, folder_id: &str) -> ApiResult<ApiFolder>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_query_skips_unset_filters() {
        let req = SearchTasksRequest {
            team_id: "1".into(),
            ..Default::default()
        };
        assert!(req.query_pairs().is_empty());

        let req = SearchTasksRequest {
            team_id: "1".into(),
            order_by: Some("updated".into()),
            date_updated_gt: Some(1_700_000_000_000),
            page: 2,
            include_closed: true,
            include_subtasks: true,
        };
        assert_eq!(
            req.query_pairs(),
            vec![
                ("order_by", "updated".to_string()),
                ("date_updated_gt", "1700000000000".to_string()),
                ("page", "2".to_string()),
                ("include_closed", "true".to_string()),
                ("subtasks", "true".to_string()),
            ]
        );
    }

    #[test]
    fn test_update_body_maps_clear_to_null() {
        let mut req = UpdateTaskRequest::for_task("t1");
        assert!(req.is_empty());

        req.time_estimate = Some(Patch::Clear);
        req.start_date = Some(Patch::Clear);
        req.due_date = Some(Patch::Set(1_700_000_000_000));
        assert!(!req.is_empty());

        assert_eq!(
            req.to_body(),
            json!({
                "time_estimate": null,
                "start_date": null,
                "due_date": 1_700_000_000_000i64,
            })
        );
    }

    #[test]
    fn test_create_body() {
        let req = CreateTaskRequest {
            list_id: "L".into(),
            name: "Board: task".into(),
            markdown_description: "desc".into(),
            status: None,
            tags: vec!["mirror".into()],
            links_to: Some("src".into()),
            assignees: vec!["42".into()],
        };
        assert_eq!(
            req.to_body(),
            json!({
                "name": "Board: task",
                "markdown_description": "desc",
                "tags": ["mirror"],
                "links_to": "src",
                "assignees": [42],
            })
        );
    }
}
