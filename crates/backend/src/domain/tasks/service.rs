use chrono::Utc;
use contracts::domain::task::{CreateTaskDto, Task};
use contracts::reports::envelope::{FailureKind, ResponseEnvelope};
use uuid::Uuid;

use super::repository;
use crate::domain::storage_failure;
use crate::storage::sql::SqlRepository;
use crate::storage::{Collection, Repository};

/// Create a task. References are validated here, before the record is ever
/// stored — the reporting engine assumes they resolve.
pub async fn create(repo: &SqlRepository, dto: CreateTaskDto) -> ResponseEnvelope<Task> {
    if let Some(project_id) = dto.project {
        match repo.exists(Collection::Projects, project_id).await {
            Ok(true) => {}
            Ok(false) => {
                return ResponseEnvelope::failure(FailureKind::Validation, "Invalid project ID")
            }
            Err(err) => return storage_failure("tasks.create", err),
        }
    }

    if let Some(user_id) = dto.assigned_to {
        match repo.exists(Collection::Users, user_id).await {
            Ok(true) => {}
            Ok(false) => {
                return ResponseEnvelope::failure(FailureKind::Validation, "Invalid user ID")
            }
            Err(err) => return storage_failure("tasks.create", err),
        }
    }

    let task = Task {
        id: Uuid::new_v4(),
        title: dto.title,
        status: dto.status,
        due_date: dto.due_date.unwrap_or_else(Utc::now),
        project: dto.project,
        assigned_to: dto.assigned_to,
    };

    match repository::insert(repo.connection(), &task).await {
        Ok(()) => ResponseEnvelope::ok("Task Created Successfully", task),
        Err(err) => storage_failure("tasks.create", err),
    }
}
