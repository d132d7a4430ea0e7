//! JSON shapes returned by the task service.
//!
//! The service encodes millisecond timestamps and priority ids as strings,
//! and member ids as numbers. The helpers below accept either encoding so a
//! field changing representation between endpoints does not break decoding.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Deserialize)]
#[serde(untagged)]
enum StrOrInt {
    Str(String),
    Int(i64),
}

fn parse_str_or_int<E: serde::de::Error>(v: StrOrInt) -> Result<i64, E> {
    match v {
        StrOrInt::Int(n) => Ok(n),
        StrOrInt::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| E::custom(format!("expected an integer, got {s:?}"))),
    }
}

/// Integer encoded either as a JSON number or a numeric string.
pub fn de_i64<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    parse_str_or_int(StrOrInt::deserialize(d)?)
}

/// Optional integer; `null`, a missing field and `""` all decode to `None`.
pub fn de_opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    match Option::<StrOrInt>::deserialize(d)? {
        None => Ok(None),
        Some(StrOrInt::Str(s)) if s.trim().is_empty() => Ok(None),
        Some(v) => parse_str_or_int(v).map(Some),
    }
}

/// Identifier that may come as a number or a string.
pub fn de_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match StrOrInt::deserialize(d)? {
        StrOrInt::Str(s) => s,
        StrOrInt::Int(n) => n.to_string(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiStatus {
    pub status: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// `{id, name}` reference to a list, folder or space.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiRef {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiMember {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub username: String,
    pub email: String,
    pub initials: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiTag {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiLinkedTask {
    pub task_id: String,
    pub link_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiPriority {
    #[serde(deserialize_with = "de_i64")]
    pub id: i64,
    #[serde(default)]
    pub priority: String,
}

/// Task as returned by search, get and update endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiTask {
    pub id: String,
    pub custom_id: Option<String>,
    pub name: String,
    pub text_content: Option<String>,
    pub description: Option<String>,
    pub status: ApiStatus,
    #[serde(deserialize_with = "de_i64")]
    pub date_created: i64,
    #[serde(deserialize_with = "de_i64")]
    pub date_updated: i64,
    #[serde(deserialize_with = "de_opt_i64")]
    pub date_closed: Option<i64>,
    #[serde(deserialize_with = "de_opt_i64")]
    pub time_estimate: Option<i64>,
    #[serde(deserialize_with = "de_opt_i64")]
    pub due_date: Option<i64>,
    #[serde(deserialize_with = "de_opt_i64")]
    pub start_date: Option<i64>,
    pub parent: Option<String>,
    pub archived: bool,
    pub creator: Option<ApiMember>,
    pub assignees: Vec<ApiMember>,
    pub tags: Vec<ApiTag>,
    pub linked_tasks: Vec<ApiLinkedTask>,
    pub team_id: String,
    pub url: String,
    pub list: ApiRef,
    pub folder: ApiRef,
    pub priority: Option<ApiPriority>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchTasksResponse {
    pub tasks: Vec<ApiTask>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateTaskResponse {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListMembersResponse {
    pub members: Vec<ApiMember>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiList {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
    pub archived: bool,
    pub folder: ApiRef,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiFolder {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
    pub archived: bool,
}
