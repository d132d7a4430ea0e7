//! In-process task service and fixtures shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use mirror_sync::api::wire::{ApiPriority, ApiRef, ApiStatus, ApiTag};
use mirror_sync::api::{
    AddCommentRequest, ApiFolder, ApiList, ApiMember, ApiTask, CreateTaskRequest, PAGE_SIZE, Patch,
    SearchTasksRequest, TaskService, UpdateTaskRequest,
};
use mirror_sync::config::{SyncPreferences, SyncRules};
use mirror_sync::db::Database;
use mirror_sync::error::{ApiError, ApiResult};
use mirror_sync::logging::Logger;
use mirror_sync::types::{Folder, List, Member};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const TEAM: &str = "1";
pub const SOURCE_FOLDER: &str = "5";
pub const SOURCE_LIST: &str = "10";
pub const MIRROR_FOLDER: &str = "6";
pub const MIRROR_LIST: &str = "20";
pub const ANN: &str = "ann@example.com";

pub const RULES_YAML: &str = r#"
mirror_task_rules:
  - name: backlog-to-board
    cond_add:
      if_in_lists: ["https://app.clickup.com/1/v/li/10"]
      eq_any_task_status_names: ["ready"]
    cond_track_changes:
      if_in_lists: ["https://app.clickup.com/1/v/li/10"]
    spec_add:
      add_to_list: "https://app.clickup.com/1/v/li/20"
      set_status_name: "to do"
      assign_to_member_email: "ann@example.com"
"#;

pub fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

pub fn rules() -> SyncRules {
    SyncPreferences::from_yaml(RULES_YAML)
        .expect("rules parse")
        .compile(&Logger::new())
}

/// Store the lists, folders and member that [`FakeTaskService::with_workspace`]
/// serves, as a completed dependency load would.
pub fn seed_workspace(db: &Database) {
    for (list, folder, list_name, folder_name) in [
        (SOURCE_LIST, SOURCE_FOLDER, "Backlog", "Product"),
        (MIRROR_LIST, MIRROR_FOLDER, "Board", "Delivery"),
    ] {
        db.upsert_list(&List {
            id: list.to_string(),
            name: list_name.to_string(),
            archived: false,
            folder_id: Some(folder.to_string()),
        })
        .unwrap();
        db.upsert_folder(&Folder {
            id: folder.to_string(),
            name: folder_name.to_string(),
            archived: false,
        })
        .unwrap();
    }
    db.upsert_member(&Member {
        id: "77".to_string(),
        username: "ann".to_string(),
        email: ANN.to_string(),
        initials: "A".to_string(),
    })
    .unwrap();
}

/// Service-side task in the given list.
pub fn api_task(id: &str, list_id: &str, updated_at: i64) -> ApiTask {
    let folder_id = if list_id == MIRROR_LIST {
        MIRROR_FOLDER
    } else {
        SOURCE_FOLDER
    };
    ApiTask {
        id: id.to_string(),
        name: "Write docs".to_string(),
        description: Some("Some text".to_string()),
        status: ApiStatus {
            status: "ready".to_string(),
            kind: "custom".to_string(),
        },
        date_created: 1,
        date_updated: updated_at,
        team_id: TEAM.to_string(),
        url: format!("https://app.clickup.com/t/{id}"),
        list: ApiRef {
            id: list_id.to_string(),
            name: String::new(),
        },
        folder: ApiRef {
            id: folder_id.to_string(),
            name: String::new(),
        },
        ..Default::default()
    }
}

#[derive(Default)]
pub struct FakeState {
    /// Tasks known to the service, by id.
    pub tasks: HashMap<String, ApiTask>,
    /// Search results by page index.
    pub pages: Vec<Vec<ApiTask>>,
    pub fail_search_on_page: Option<u32>,
    pub fail_create: bool,
    pub fail_update: bool,
    /// `task_by_id` answers with a server error.
    pub fail_fetch: bool,
    /// `create_task` never returns.
    pub stall_create: bool,
    pub lists: HashMap<String, ApiList>,
    pub folders: HashMap<String, ApiFolder>,
    pub members: HashMap<String, Vec<ApiMember>>,

    pub searches: Vec<SearchTasksRequest>,
    pub updates: Vec<UpdateTaskRequest>,
    pub creates: Vec<CreateTaskRequest>,
    pub comments: Vec<AddCommentRequest>,
    pub list_fetches: Vec<String>,
    pub member_fetches: Vec<String>,
    pub folder_fetches: Vec<String>,
    next_id: u32,
}

impl FakeState {
    /// Number of calls that change something on the service.
    pub fn write_calls(&self) -> usize {
        self.updates.len() + self.creates.len() + self.comments.len()
    }
}

#[derive(Default)]
pub struct FakeTaskService {
    state: Mutex<FakeState>,
}

impl FakeTaskService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }

    pub fn put_task(&self, task: ApiTask) {
        self.with(|s| s.tasks.insert(task.id.clone(), task));
    }

    /// Page layout: the given tasks split into pages of `PAGE_SIZE`.
    pub fn set_results(&self, tasks: Vec<ApiTask>) {
        self.with(|s| {
            s.pages = tasks.chunks(PAGE_SIZE).map(<[ApiTask]>::to_vec).collect();
            if s.pages.last().is_none_or(|p| p.len() == PAGE_SIZE) {
                s.pages.push(Vec::new());
            }
        });
    }

    /// Standard source and mirror lists, their folders and one member.
    pub fn with_workspace(&self) {
        self.with(|s| {
            for (list, folder, list_name, folder_name) in [
                (SOURCE_LIST, SOURCE_FOLDER, "Backlog", "Product"),
                (MIRROR_LIST, MIRROR_FOLDER, "Board", "Delivery"),
            ] {
                s.lists.insert(
                    list.to_string(),
                    ApiList {
                        id: list.to_string(),
                        name: list_name.to_string(),
                        archived: false,
                        folder: ApiRef {
                            id: folder.to_string(),
                            name: folder_name.to_string(),
                        },
                    },
                );
                s.folders.insert(
                    folder.to_string(),
                    ApiFolder {
                        id: folder.to_string(),
                        name: folder_name.to_string(),
                        archived: false,
                    },
                );
                s.members.insert(
                    list.to_string(),
                    vec![ApiMember {
                        id: "77".to_string(),
                        username: "ann".to_string(),
                        email: "Ann@Example.com".to_string(),
                        initials: "A".to_string(),
                    }],
                );
            }
        });
    }
}

fn server_error() -> ApiError {
    ApiError::Status {
        status: 500,
        body: "boom".to_string(),
    }
}

fn apply_patch(field: &mut Option<i64>, patch: Option<Patch<i64>>) {
    match patch {
        Some(Patch::Set(v)) => *field = Some(v),
        Some(Patch::Clear) => *field = None,
        None => {}
    }
}

#[async_trait]
impl TaskService for FakeTaskService {
    async fn search_tasks_in_team(&self, req: &SearchTasksRequest) -> ApiResult<Vec<ApiTask>> {
        self.with(|s| {
            s.searches.push(req.clone());
            if s.fail_search_on_page == Some(req.page) {
                return Err(server_error());
            }
            Ok(s.pages.get(req.page as usize).cloned().unwrap_or_default())
        })
    }

    async fn task_by_id(&self, task_id: &str) -> ApiResult<ApiTask> {
        self.with(|s| {
            if s.fail_fetch {
                return Err(server_error());
            }
            s.tasks.get(task_id).cloned().ok_or(ApiError::NotFound)
        })
    }

    async fn update_task(&self, req: &UpdateTaskRequest) -> ApiResult<ApiTask> {
        self.with(|s| {
            s.updates.push(req.clone());
            if s.fail_update {
                return Err(server_error());
            }
            let task = s.tasks.get_mut(&req.task_id).ok_or(ApiError::NotFound)?;
            if let Some(name) = &req.name {
                task.name = name.clone();
            }
            if let Some(description) = &req.description {
                task.description = Some(description.clone());
            }
            if let Some(status) = &req.status {
                task.status.status = status.clone();
            }
            match req.priority {
                Some(Patch::Set(id)) => {
                    task.priority = Some(ApiPriority {
                        id,
                        priority: String::new(),
                    })
                }
                Some(Patch::Clear) => task.priority = None,
                None => {}
            }
            apply_patch(&mut task.time_estimate, req.time_estimate);
            apply_patch(&mut task.due_date, req.due_date);
            apply_patch(&mut task.start_date, req.start_date);
            task.date_updated += 1;
            Ok(task.clone())
        })
    }

    async fn create_task(&self, req: &CreateTaskRequest) -> ApiResult<String> {
        if self.with(|s| s.stall_create) {
            std::future::pending::<()>().await;
        }
        self.with(|s| {
            s.creates.push(req.clone());
            if s.fail_create {
                return Err(server_error());
            }
            s.next_id += 1;
            let id = format!("mirror-{}", s.next_id);
            let mut task = api_task(&id, &req.list_id, 1);
            task.name = req.name.clone();
            task.description = Some(req.markdown_description.clone());
            task.status.status = req.status.clone().unwrap_or_default();
            task.tags = req
                .tags
                .iter()
                .map(|name| ApiTag { name: name.clone() })
                .collect();
            s.tasks.insert(id.clone(), task);
            Ok(id)
        })
    }

    async fn add_comment(&self, req: &AddCommentRequest) -> ApiResult<()> {
        self.with(|s| s.comments.push(req.clone()));
        Ok(())
    }

    async fn list_members_of_list(&self, list_id: &str) -> ApiResult<Vec<ApiMember>> {
        self.with(|s| {
            s.member_fetches.push(list_id.to_string());
            s.members.get(list_id).cloned().ok_or(ApiError::NotFound)
        })
    }

    async fn list_by_id(&self, list_id: &str) -> ApiResult<ApiList> {
        self.with(|s| {
            s.list_fetches.push(list_id.to_string());
            s.lists.get(list_id).cloned().ok_or(ApiError::NotFound)
        })
    }

    async fn folder_by_id(&self, folder_id: &str) -> ApiResult<ApiFolder> {
        self.with(|s| {
            s.folder_fetches.push(folder_id.to_string());
            s.folders.get(folder_id).cloned().ok_or(ApiError::NotFound)
        })
    }
}
