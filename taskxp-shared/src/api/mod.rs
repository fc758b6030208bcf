use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::auth::Role;
use crate::domain::TaskStatus;

pub mod endpoints;

pub const API_PREFIX: &str = "/api";

/// Name of the HTTP-only cookie carrying the session token.
pub const SESSION_COOKIE: &str = "token";

// Auth
//
// Request fields are optional so that a missing field surfaces as a
// validation error with a message rather than a deserialization failure.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SignupReq {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    #[serde(alias = "userType")]
    pub user_type: Option<Role>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignupResp {
    pub message: String,
    pub id: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AuthReq {
    pub phone: Option<String>,
    pub password: Option<String>,
    #[serde(alias = "userType")]
    pub user_type: Option<Role>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResp {
    pub message: String,
    pub id: String,
    pub name: String,
    pub user_type: Role,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResp {
    pub message: String,
}

// Tasks
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreateTaskReq {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "dueDate", default, deserialize_with = "blank_as_none")]
    pub due_date: Option<NaiveDate>,
    pub xp: Option<i32>,
    /// Defaults to the authenticated parent. When present it must match.
    pub parent_id: Option<String>,
}

/// Dashboard forms send `""` when no date was picked.
fn blank_as_none<'de, D>(de: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(de)? {
        Some(s) if !s.trim().is_empty() => s
            .trim()
            .parse::<NaiveDate>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTaskResp {
    pub message: String,
    pub task_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDto {
    pub id: String,
    pub name: String,
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub xp: i32,
    pub status: TaskStatus,
    pub parent_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskListResp {
    pub tasks: Vec<TaskDto>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CompleteTaskReq {
    #[serde(alias = "childId")]
    pub child_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompleteTaskResp {
    pub message: String,
    pub task: TaskDto,
    /// Child's balance after the credit.
    pub xp_point: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewTaskResp {
    pub message: String,
    pub task: TaskDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteTaskResp {
    pub message: String,
    /// False when no task with that id existed.
    pub deleted: bool,
}

// XP
#[derive(Debug, Serialize, Deserialize)]
pub struct XpAwardDto {
    pub task_id: String,
    pub task_name: String,
    pub xp: i32,
    pub time: String, // RFC3339 UTC
}

#[derive(Debug, Serialize, Deserialize)]
pub struct XpSummaryDto {
    pub child_id: String,
    pub xp_point: i32,
    pub history: Vec<XpAwardDto>,
}
