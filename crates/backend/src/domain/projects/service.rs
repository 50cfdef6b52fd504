use contracts::domain::project::{CreateProjectDto, Project};
use contracts::reports::envelope::{FailureKind, ResponseEnvelope};
use uuid::Uuid;

use super::repository;
use crate::domain::{storage_failure, tasks, users};
use crate::storage::sql::SqlRepository;
use crate::storage::{Collection, Repository};

/// Create a project, resolving members by username and the forward task list
/// by title. The task list is written once here and never synced by later
/// task writes; reports count tasks through their own project reference.
pub async fn create(repo: &SqlRepository, dto: CreateProjectDto) -> ResponseEnvelope<Project> {
    let members = match users::repository::find_by_usernames(repo.connection(), &dto.members).await
    {
        Ok(members) => members,
        Err(err) => return storage_failure("projects.create", err),
    };
    if members.is_empty() {
        return ResponseEnvelope::failure(
            FailureKind::Validation,
            "No Member Found With The Specified Usernames",
        );
    }

    let task_ids = match tasks::repository::find_ids_by_titles(repo.connection(), &dto.tasks).await
    {
        Ok(ids) => ids,
        Err(err) => return storage_failure("projects.create", err),
    };
    if task_ids.is_empty() {
        return ResponseEnvelope::failure(
            FailureKind::Validation,
            "No Tasks Found With The Specified Titles",
        );
    }

    let project = Project {
        id: Uuid::new_v4(),
        name: dto.name,
        tasks: task_ids,
        members: members.iter().map(|member| member.id).collect(),
    };

    match repository::insert(repo.connection(), &project).await {
        Ok(()) => ResponseEnvelope::ok("Project Created Successfully", project),
        Err(err) => storage_failure("projects.create", err),
    }
}

/// Get project by ID
pub async fn find_one(repo: &SqlRepository, id: &str) -> ResponseEnvelope<Project> {
    let project_id = match Uuid::parse_str(id) {
        Ok(id) => id,
        Err(_) => return ResponseEnvelope::failure(FailureKind::Validation, "Invalid project ID"),
    };

    match repo.find_by_id(Collection::Projects, project_id).await {
        Ok(Some(value)) => match serde_json::from_value::<Project>(value) {
            Ok(project) => ResponseEnvelope::ok("Project Found Successfully", project),
            Err(err) => storage_failure("projects.find_one", err),
        },
        Ok(None) => ResponseEnvelope::failure(FailureKind::NotFound, "Project Not Found"),
        Err(err) => storage_failure("projects.find_one", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::users::service as users_service;
    use crate::shared::data::db::connect;
    use chrono::Utc;
    use contracts::domain::task::{Task, TaskStatus};
    use contracts::domain::user::{CreateUserDto, UserRole};

    async fn test_repo() -> (tempfile::TempDir, SqlRepository) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");
        let conn = connect(path.to_str().unwrap()).await.unwrap();
        (dir, SqlRepository::new(conn))
    }

    async fn seed_user(repo: &SqlRepository, username: &str) {
        let envelope = users_service::create(
            repo,
            CreateUserDto {
                username: username.to_string(),
                password: String::from("hunter2hunter2"),
                email: format!("{}@example.com", username),
                role: UserRole::Member,
            },
        )
        .await;
        assert!(envelope.is_success());
    }

    async fn seed_task(repo: &SqlRepository, title: &str) {
        let task = Task {
            id: Uuid::new_v4(),
            title: title.to_string(),
            status: TaskStatus::ToDo,
            due_date: Utc::now(),
            project: None,
            assigned_to: None,
        };
        tasks::repository::insert(repo.connection(), &task)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn create_resolves_usernames_and_titles() {
        let (_dir, repo) = test_repo().await;
        seed_user(&repo, "alice").await;
        seed_task(&repo, "bootstrap").await;

        let envelope = create(
            &repo,
            CreateProjectDto {
                name: String::from("Apollo"),
                members: vec![String::from("alice"), String::from("ghost")],
                tasks: vec![String::from("bootstrap")],
            },
        )
        .await;
        assert!(envelope.is_success());
        let project = envelope.data.unwrap();
        assert_eq!(project.members.len(), 1);
        assert_eq!(project.tasks.len(), 1);

        let found = find_one(&repo, &project.id.to_string()).await;
        assert!(found.is_success());
        assert_eq!(found.data.unwrap().name, "Apollo");
    }

    #[tokio::test]
    async fn create_without_known_members_fails() {
        let (_dir, repo) = test_repo().await;
        seed_task(&repo, "bootstrap").await;

        let envelope = create(
            &repo,
            CreateProjectDto {
                name: String::from("Apollo"),
                members: vec![String::from("ghost")],
                tasks: vec![String::from("bootstrap")],
            },
        )
        .await;
        assert_eq!(envelope.http_status, 400);
        assert_eq!(envelope.message, "No Member Found With The Specified Usernames");
    }

    #[tokio::test]
    async fn create_without_known_tasks_fails() {
        let (_dir, repo) = test_repo().await;
        seed_user(&repo, "alice").await;

        let envelope = create(
            &repo,
            CreateProjectDto {
                name: String::from("Apollo"),
                members: vec![String::from("alice")],
                tasks: vec![String::from("missing")],
            },
        )
        .await;
        assert_eq!(envelope.http_status, 400);
        assert_eq!(envelope.message, "No Tasks Found With The Specified Titles");
    }
}
