use std::sync::Arc;
use std::time::Duration;

use contracts::domain::project::Project;
use contracts::domain::task::Task;
use contracts::reports::dto::{
    OverdueProjectCount, ProjectTaskSummary, ProjectWithTaskCounts, StatusCount, UserTaskCount,
};
use contracts::reports::envelope::{FailureKind, ResponseEnvelope};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::engine::ReportEngine;
use crate::shared::cache::ReportCache;
use crate::shared::pagination::PageRequest;
use crate::storage::{Collection, Field, ListFilter, Repository};

/// Cache key for the users-with-task-counts report.
pub const TASK_COUNTS_CACHE_KEY: &str = "taskCounts";

/// Binds engine, cache and pagination into the report operations exposed to
/// the transport collaborator. Every operation returns an envelope; no fault
/// propagates past this boundary.
pub struct ReportingService {
    repo: Arc<dyn Repository>,
    engine: Arc<dyn ReportEngine>,
    cache: Arc<ReportCache>,
    cache_ttl: Duration,
}

impl ReportingService {
    pub fn new(
        repo: Arc<dyn Repository>,
        engine: Arc<dyn ReportEngine>,
        cache: Arc<ReportCache>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            repo,
            engine,
            cache,
            cache_ttl,
        }
    }

    fn storage_failure<T>(
        &self,
        operation: &str,
        err: impl std::fmt::Display,
    ) -> ResponseEnvelope<T> {
        // Detail is logged only; the caller gets a generic message.
        tracing::error!(operation, error = %err, "report operation failed");
        ResponseEnvelope::failure(FailureKind::Storage, "Error retrieving report data")
    }

    pub async fn task_completion_summary(&self) -> ResponseEnvelope<Vec<StatusCount>> {
        match self.engine.task_completion_summary().await {
            Ok(data) => ResponseEnvelope::ok("Task Completion Summary Found", data),
            Err(err) => self.storage_failure("task_completion_summary", err),
        }
    }

    pub async fn user_performance_report(
        &self,
        assigned_to: &str,
    ) -> ResponseEnvelope<Vec<StatusCount>> {
        let user_id = match Uuid::parse_str(assigned_to) {
            Ok(id) => id,
            Err(_) => return ResponseEnvelope::failure(FailureKind::Validation, "Invalid user ID"),
        };
        match self.engine.user_performance(user_id).await {
            Ok(data) if data.is_empty() => ResponseEnvelope::failure_with(
                FailureKind::NotFound,
                "User Performance Report Not Found",
                Vec::new(),
            ),
            Ok(data) => ResponseEnvelope::ok("User Performance Report Found", data),
            Err(err) => self.storage_failure("user_performance_report", err),
        }
    }

    pub async fn overdue_tasks_summary(&self) -> ResponseEnvelope<Vec<OverdueProjectCount>> {
        match self.engine.overdue_tasks_summary().await {
            Ok(data) if data.is_empty() => ResponseEnvelope::failure_with(
                FailureKind::NotFound,
                "Overdue Task Summary Not Found",
                Vec::new(),
            ),
            Ok(data) => ResponseEnvelope::ok("Overdue Task Summary Found", data),
            Err(err) => self.storage_failure("overdue_tasks_summary", err),
        }
    }

    pub async fn project_task_summary_with_members(
        &self,
        project_id: &str,
    ) -> ResponseEnvelope<ProjectTaskSummary> {
        let project_id = match Uuid::parse_str(project_id) {
            Ok(id) => id,
            Err(_) => {
                return ResponseEnvelope::failure(FailureKind::Validation, "Invalid project ID")
            }
        };
        match self.engine.project_task_summary(project_id).await {
            Ok(Some(summary)) => ResponseEnvelope::ok("Project Task Summary Found", summary),
            Ok(None) => ResponseEnvelope::failure(FailureKind::NotFound, "Project not found"),
            Err(err) => self.storage_failure("project_task_summary_with_members", err),
        }
    }

    pub async fn projects_with_user_task_counts(
        &self,
    ) -> ResponseEnvelope<Vec<ProjectWithTaskCounts>> {
        match self.engine.projects_with_user_task_counts().await {
            Ok(data) => ResponseEnvelope::ok("Projects With User Task Counts Found", data),
            Err(err) => self.storage_failure("projects_with_user_task_counts", err),
        }
    }

    /// Read-through cached report. No write invalidates the entry, so the
    /// payload may be stale for up to the configured TTL; racing misses both
    /// recompute and the last `set` wins.
    pub async fn users_with_task_counts(&self) -> ResponseEnvelope<Vec<UserTaskCount>> {
        if let Some(value) = self.cache.get(TASK_COUNTS_CACHE_KEY) {
            match serde_json::from_value::<Vec<UserTaskCount>>(value) {
                Ok(data) => return ResponseEnvelope::ok("Users With Task Counts Found", data),
                Err(err) => tracing::warn!(error = %err, "discarding undecodable cache entry"),
            }
        }
        match self.engine.users_with_task_counts().await {
            Ok(data) => {
                match serde_json::to_value(&data) {
                    Ok(value) => self.cache.set(TASK_COUNTS_CACHE_KEY, value, self.cache_ttl),
                    Err(err) => tracing::warn!(error = %err, "failed to serialize report for cache"),
                }
                ResponseEnvelope::ok("Users With Task Counts Found", data)
            }
            Err(err) => self.storage_failure("users_with_task_counts", err),
        }
    }

    pub async fn list_tasks(
        &self,
        page: Option<u64>,
        limit: Option<u64>,
        filter: Option<String>,
    ) -> ResponseEnvelope<Vec<Task>> {
        self.list(
            Collection::Tasks,
            Field::Title,
            page,
            limit,
            filter,
            "Tasks Retrieved Successfully",
        )
        .await
    }

    pub async fn list_projects(
        &self,
        page: Option<u64>,
        limit: Option<u64>,
        filter: Option<String>,
    ) -> ResponseEnvelope<Vec<Project>> {
        self.list(
            Collection::Projects,
            Field::Name,
            page,
            limit,
            filter,
            "Projects Found Successfully",
        )
        .await
    }

    /// Shared list plumbing: validated paging window plus case-insensitive
    /// substring filter over the collection's display field. A page past the
    /// available data succeeds with an empty window and correct totals.
    async fn list<T: DeserializeOwned>(
        &self,
        collection: Collection,
        filter_field: Field,
        page: Option<u64>,
        limit: Option<u64>,
        filter: Option<String>,
        message: &str,
    ) -> ResponseEnvelope<Vec<T>> {
        let request = match PageRequest::new(page.unwrap_or(1), limit.unwrap_or(10), filter) {
            Ok(request) => request,
            Err(err) => {
                return ResponseEnvelope::failure(FailureKind::Validation, err.to_string())
            }
        };
        let list_filter = match &request.filter {
            Some(needle) => ListFilter::Contains {
                field: filter_field,
                needle: needle.clone(),
            },
            None => ListFilter::All,
        };
        match self
            .repo
            .find_many(collection, &list_filter, request.skip(), request.limit)
            .await
        {
            Ok((values, total)) => {
                let mut items = Vec::with_capacity(values.len());
                for value in values {
                    match serde_json::from_value(value) {
                        Ok(item) => items.push(item),
                        Err(err) => return self.storage_failure("list", err),
                    }
                }
                ResponseEnvelope::ok_with_meta(message, items, request.meta(total))
            }
            Err(err) => self.storage_failure("list", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{projects, tasks, users};
    use crate::reports::engine::PipelineEngine;
    use crate::shared::data::db::connect;
    use crate::storage::sql::SqlRepository;
    use crate::storage::{StorageError, StorageResult};
    use async_trait::async_trait;
    use chrono::Utc;
    use contracts::domain::task::TaskStatus;
    use contracts::domain::user::{User, UserRole};
    use contracts::reports::envelope::ResponseStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Engine stub that counts invocations of the cached report.
    struct StubEngine {
        calls: AtomicUsize,
        fail: bool,
    }

    impl StubEngine {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }

        fn payload() -> Vec<UserTaskCount> {
            vec![UserTaskCount {
                username: String::from("alice"),
                email: String::from("alice@example.com"),
                role: UserRole::Member,
                task_count: 2,
            }]
        }
    }

    #[async_trait]
    impl ReportEngine for StubEngine {
        async fn task_completion_summary(&self) -> StorageResult<Vec<StatusCount>> {
            Ok(Vec::new())
        }

        async fn user_performance(&self, _user_id: Uuid) -> StorageResult<Vec<StatusCount>> {
            Ok(Vec::new())
        }

        async fn overdue_tasks_summary(&self) -> StorageResult<Vec<OverdueProjectCount>> {
            Ok(Vec::new())
        }

        async fn project_task_summary(
            &self,
            _project_id: Uuid,
        ) -> StorageResult<Option<ProjectTaskSummary>> {
            Ok(None)
        }

        async fn projects_with_user_task_counts(
            &self,
        ) -> StorageResult<Vec<ProjectWithTaskCounts>> {
            Ok(Vec::new())
        }

        async fn users_with_task_counts(&self) -> StorageResult<Vec<UserTaskCount>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StorageError::Unavailable(sea_orm::DbErr::Custom(
                    String::from("connection refused"),
                )));
            }
            Ok(Self::payload())
        }
    }

    async fn sql_backed_service() -> (tempfile::TempDir, Arc<SqlRepository>, ReportingService) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");
        let conn = connect(path.to_str().unwrap()).await.unwrap();
        let repo = Arc::new(SqlRepository::new(conn));
        let engine = Arc::new(PipelineEngine::new(repo.clone(), Duration::from_secs(5)));
        let service = ReportingService::new(
            repo.clone(),
            engine,
            Arc::new(ReportCache::new()),
            Duration::from_secs(600),
        );
        (dir, repo, service)
    }

    /// Repository stand-in for tests that only exercise the engine/cache path.
    struct StubRepo;

    #[async_trait]
    impl crate::storage::Repository for StubRepo {
        async fn find_by_id(
            &self,
            _collection: Collection,
            _id: Uuid,
        ) -> StorageResult<Option<serde_json::Value>> {
            Ok(None)
        }

        async fn find_many(
            &self,
            _collection: Collection,
            _filter: &ListFilter,
            _skip: u64,
            _limit: u64,
        ) -> StorageResult<(Vec<serde_json::Value>, u64)> {
            Ok((Vec::new(), 0))
        }

        async fn count_matching(
            &self,
            _collection: Collection,
            _filter: &ListFilter,
        ) -> StorageResult<u64> {
            Ok(0)
        }

        async fn exists(&self, _collection: Collection, _id: Uuid) -> StorageResult<bool> {
            Ok(false)
        }

        async fn run_pipeline(
            &self,
            _collection: Collection,
            _stages: &[crate::storage::pipeline::PipelineStage],
        ) -> StorageResult<Vec<serde_json::Value>> {
            Ok(Vec::new())
        }
    }

    fn stub_service(engine: Arc<StubEngine>, ttl: Duration) -> (Arc<StubEngine>, ReportingService) {
        let service = ReportingService::new(
            Arc::new(StubRepo),
            engine.clone(),
            Arc::new(ReportCache::new()),
            ttl,
        );
        (engine, service)
    }

    #[tokio::test]
    async fn cached_report_computes_once_within_ttl() {
        let engine = Arc::new(StubEngine::new());
        let (engine, service) = stub_service(engine, Duration::from_secs(600));

        let first = service.users_with_task_counts().await;
        let second = service.users_with_task_counts().await;
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
        assert!(first.is_success() && second.is_success());
        assert_eq!(
            serde_json::to_value(&first.data).unwrap(),
            serde_json::to_value(&second.data).unwrap()
        );
    }

    #[tokio::test]
    async fn expired_cache_recomputes_exactly_once_per_call() {
        let engine = Arc::new(StubEngine::new());
        let (engine, service) = stub_service(engine, Duration::from_secs(0));

        service.users_with_task_counts().await;
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
        service.users_with_task_counts().await;
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn engine_failure_maps_to_generic_storage_envelope() {
        let engine = Arc::new(StubEngine::failing());
        let (_engine, service) = stub_service(engine, Duration::from_secs(600));

        let envelope = service.users_with_task_counts().await;
        assert_eq!(envelope.status, ResponseStatus::Failure);
        assert_eq!(envelope.http_status, 500);
        // No internal detail leaks into the message.
        assert!(!envelope.message.contains("connection refused"));
    }

    #[tokio::test]
    async fn malformed_ids_are_validation_failures() {
        let (_dir, _repo, service) = sql_backed_service().await;

        let performance = service.user_performance_report("not-a-uuid").await;
        assert_eq!(performance.http_status, 400);
        let summary = service.project_task_summary_with_members("also-bad").await;
        assert_eq!(summary.http_status, 400);
    }

    #[tokio::test]
    async fn task_less_user_gets_404_with_empty_data() {
        let (_dir, repo, service) = sql_backed_service().await;
        let user = User {
            id: Uuid::new_v4(),
            username: String::from("idle"),
            email: String::from("idle@example.com"),
            role: UserRole::Member,
        };
        users::repository::create_with_password(repo.connection(), &user, "hash")
            .await
            .unwrap();

        let envelope = service.user_performance_report(&user.id.to_string()).await;
        assert_eq!(envelope.status, ResponseStatus::Failure);
        assert_eq!(envelope.http_status, 404);
        assert_eq!(envelope.data, Some(Vec::new()));
    }

    #[tokio::test]
    async fn missing_project_summary_is_404_with_null_data() {
        let (_dir, _repo, service) = sql_backed_service().await;
        let envelope = service
            .project_task_summary_with_members(&Uuid::new_v4().to_string())
            .await;
        assert_eq!(envelope.http_status, 404);
        assert!(envelope.data.is_none());
    }

    #[tokio::test]
    async fn empty_overdue_summary_is_404() {
        let (_dir, _repo, service) = sql_backed_service().await;
        let envelope = service.overdue_tasks_summary().await;
        assert_eq!(envelope.http_status, 404);
        assert_eq!(envelope.data, Some(Vec::new()));
    }

    async fn seed_tasks(repo: &SqlRepository, count: usize) {
        for i in 0..count {
            let task = contracts::domain::task::Task {
                id: Uuid::new_v4(),
                title: format!("task {:02}", i),
                status: TaskStatus::ToDo,
                due_date: Utc::now(),
                project: None,
                assigned_to: None,
            };
            tasks::repository::insert(repo.connection(), &task)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn list_tasks_paginates_with_meta() {
        let (_dir, repo, service) = sql_backed_service().await;
        seed_tasks(&repo, 25).await;

        let envelope = service.list_tasks(Some(3), Some(10), None).await;
        assert!(envelope.is_success());
        let expected = crate::shared::pagination::window_size(25, 10, 3) as usize;
        assert_eq!(envelope.data.as_ref().unwrap().len(), expected);
        assert_eq!(expected, 5);
        let meta = envelope.meta.unwrap();
        assert_eq!(meta.total, 25);
        assert_eq!(meta.current_page, 3);
        assert_eq!(meta.total_pages, 3);
    }

    #[tokio::test]
    async fn list_page_past_the_data_is_empty_success() {
        let (_dir, repo, service) = sql_backed_service().await;
        seed_tasks(&repo, 5).await;

        let envelope = service.list_tasks(Some(4), Some(2), None).await;
        assert!(envelope.is_success());
        assert!(envelope.data.as_ref().unwrap().is_empty());
        let meta = envelope.meta.unwrap();
        assert_eq!(meta.total, 5);
        assert_eq!(meta.total_pages, 3);
    }

    #[tokio::test]
    async fn list_rejects_zero_limit() {
        let (_dir, _repo, service) = sql_backed_service().await;
        let envelope = service.list_tasks(Some(1), Some(0), None).await;
        assert_eq!(envelope.http_status, 400);
    }

    #[tokio::test]
    async fn list_projects_filters_by_name() {
        let (_dir, repo, service) = sql_backed_service().await;
        for name in ["Apollo", "Gemini", "apollo station"] {
            let project = contracts::domain::project::Project {
                id: Uuid::new_v4(),
                name: name.to_string(),
                tasks: Vec::new(),
                members: Vec::new(),
            };
            projects::repository::insert(repo.connection(), &project)
                .await
                .unwrap();
        }

        let envelope = service
            .list_projects(None, None, Some(String::from("apollo")))
            .await;
        assert!(envelope.is_success());
        let names: Vec<String> = envelope
            .data
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Apollo", "apollo station"]);
    }
}
