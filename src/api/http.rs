//! ClickUp v2 REST implementation of [`TaskService`].

use super::wire::{CreateTaskResponse, ListMembersResponse, SearchTasksResponse};
use super::{
    AddCommentRequest, ApiFolder, ApiList, ApiMember, ApiTask, CreateTaskRequest,
    SearchTasksRequest, TaskService, UpdateTaskRequest,
};
use crate::error::{ApiError, ApiResult};
use crate::logging::Logger;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode, header};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.clickup.com/api/v2";

/// HTTP client for the task service. Cloning shares the connection pool.
#[derive(Clone)]
pub struct HttpTaskService {
    client: Client,
    base_url: String,
    token: String,
    log: Logger,
}

impl HttpTaskService {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
        log: Logger,
    ) -> ApiResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            log: log.named("api"),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header(header::AUTHORIZATION, &self.token)
    }

    /// Sends the request and classifies the response.
    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> ApiResult<T> {
        let res = req.send().await?;
        let status = res.status();
        let uri = res.url().to_string();
        let content_type = res
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = res.bytes().await?;

        self.log.debug_with(
            "API request",
            json!({"uri": uri, "status": status.as_u16()}),
        );

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }
        if status != StatusCode::OK {
            let body = String::from_utf8_lossy(&body).into_owned();
            self.log.debug_with(
                "Unsuccessful response",
                json!({"uri": uri, "status": status.as_u16(), "body_raw": body}),
            );
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        if !content_type.starts_with("application/json") {
            self.log.warning_with(
                "Received not json",
                json!({"uri": uri, "content_type": content_type}),
            );
            return Err(ApiError::ContentType(content_type));
        }

        serde_json::from_slice(&body).map_err(|err| {
            self.log.warning_with(
                "Failed to decode json response",
                json!({"uri": uri, "error": err.to_string()}),
            );
            ApiError::Decode(err)
        })
    }
}

/// Comment endpoint answers with an object we do not use.
#[derive(serde::Deserialize)]
struct Ignored {}

#[async_trait]
impl TaskService for HttpTaskService {
    async fn search_tasks_in_team(&self, req: &SearchTasksRequest) -> ApiResult<Vec<ApiTask>> {
        let builder = self
            .request(Method::GET, &format!("/team/{}/task", req.team_id))
            .query(&req.query_pairs());
        let res: SearchTasksResponse = self.send(builder).await?;
        Ok(res.tasks)
    }

    async fn task_by_id(&self, task_id: &str) -> ApiResult<ApiTask> {
        self.send(self.request(Method::GET, &format!("/task/{task_id}")))
            .await
    }

    async fn update_task(&self, req: &UpdateTaskRequest) -> ApiResult<ApiTask> {
        let builder = self
            .request(Method::PUT, &format!("/task/{}", req.task_id))
            .json(&req.to_body());
        self.send(builder).await
    }

    async fn create_task(&self, req: &CreateTaskRequest) -> ApiResult<String> {
        let builder = self
            .request(Method::POST, &format!("/list/{}/task", req.list_id))
            .json(&req.to_body());
        let res: CreateTaskResponse = self.send(builder).await?;
        Ok(res.id)
    }

    async fn add_comment(&self, req: &AddCommentRequest) -> ApiResult<()> {
        let builder = self
            .request(Method::POST, &format!("/task/{}/comment", req.task_id))
            .json(&req.to_body());
        let _: Ignored = self.send(builder).await?;
        Ok(())
    }

    async fn list_members_of_list(&self, list_id: &str) -> ApiResult<Vec<ApiMember>> {
        let res: ListMembersResponse = self
            .send(self.request(Method::GET, &format!("/list/{list_id}/member")))
            .await?;
        Ok(res.members)
    }

    async fn list_by_id(&self, list_id: &str) -> ApiResult<ApiList> {
        self.send(self.request(Method::GET, &format!("/list/{list_id}")))
            .await
    }

    async fn folder_by_id(&self, folder_id: &str) -> ApiResult<ApiFolder> {
        self.send(self.request(Method::GET, &format!("/folder/{folder_id}")))
            .await
    }
}
