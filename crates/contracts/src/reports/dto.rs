use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::task::TaskStatus;
use crate::domain::user::{User, UserRole};

/// One bucket of a status breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: TaskStatus,
    pub count: u64,
}

/// Overdue tasks per project; `project` is `None` for tasks not attached to
/// any project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverdueProjectCount {
    pub project: Option<Uuid>,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberContribution {
    pub username: String,
    pub completed_tasks: u64,
}

/// Combined per-project report: status breakdown plus completed-task
/// contributions per member. The two halves are independent snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTaskSummary {
    pub task_summary: Vec<StatusCount>,
    pub member_contributions: Vec<MemberContribution>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectWithTaskCounts {
    pub name: String,
    pub members: Vec<User>,
    pub task_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTaskCount {
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub task_count: u64,
}

/// Pagination block attached to list responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: u64,
    pub current_page: u64,
    pub total_pages: u64,
}
