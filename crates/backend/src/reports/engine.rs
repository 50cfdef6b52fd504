use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use contracts::domain::task::TaskStatus;
use contracts::domain::user::User;
use contracts::reports::dto::{
    MemberContribution, OverdueProjectCount, ProjectTaskSummary, ProjectWithTaskCounts,
    StatusCount, UserTaskCount,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::storage::pipeline::{
    PipelineStage, Predicate, Projection, ProjectionSource, Reducer, ScalarValue,
};
use crate::storage::sql::{parse_role, parse_status, parse_uuid};
use crate::storage::{Collection, Field, Repository, StorageError, StorageResult};

/// The six derived report computations, behind a trait so callers can be
/// exercised against a counting or stubbed engine.
#[async_trait]
pub trait ReportEngine: Send + Sync {
    async fn task_completion_summary(&self) -> StorageResult<Vec<StatusCount>>;
    async fn user_performance(&self, user_id: Uuid) -> StorageResult<Vec<StatusCount>>;
    async fn overdue_tasks_summary(&self) -> StorageResult<Vec<OverdueProjectCount>>;
    async fn project_task_summary(
        &self,
        project_id: Uuid,
    ) -> StorageResult<Option<ProjectTaskSummary>>;
    async fn projects_with_user_task_counts(&self) -> StorageResult<Vec<ProjectWithTaskCounts>>;
    async fn users_with_task_counts(&self) -> StorageResult<Vec<UserTaskCount>>;
}

/// Pipeline-backed engine. Each report is a pure function of storage state at
/// the moment its pipelines execute; reports built from several pipelines may
/// observe different points in time (read-committed, no snapshot isolation).
pub struct PipelineEngine {
    repo: Arc<dyn Repository>,
    deadline: Duration,
}

#[derive(Debug, Deserialize)]
struct GroupRow {
    key: Option<String>,
    count: u64,
}

#[derive(Debug, Deserialize)]
struct ContributionRow {
    username: String,
    completed_tasks: u64,
}

#[derive(Debug, Deserialize)]
struct ProjectMemberRow {
    name: String,
    id: String,
    member_id: Option<String>,
    username: Option<String>,
    email: Option<String>,
    role: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserTaskCountRow {
    username: String,
    email: String,
    role: String,
    task_count: u64,
}

impl PipelineEngine {
    pub fn new(repo: Arc<dyn Repository>, deadline: Duration) -> Self {
        Self { repo, deadline }
    }

    /// Run one pipeline under the engine's execution deadline.
    async fn run(
        &self,
        collection: Collection,
        stages: Vec<PipelineStage>,
    ) -> StorageResult<Vec<Value>> {
        match tokio::time::timeout(self.deadline, self.repo.run_pipeline(collection, &stages)).await
        {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout(self.deadline)),
        }
    }

    async fn run_rows<T: DeserializeOwned>(
        &self,
        collection: Collection,
        stages: Vec<PipelineStage>,
    ) -> StorageResult<Vec<T>> {
        let rows = self.run(collection, stages).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| StorageError::Decode(e.to_string())))
            .collect()
    }

    /// Task counts grouped by status, optionally pre-filtered.
    async fn status_breakdown(
        &self,
        predicates: Vec<Predicate>,
    ) -> StorageResult<Vec<StatusCount>> {
        let mut stages = Vec::new();
        if !predicates.is_empty() {
            stages.push(PipelineStage::Match(predicates));
        }
        stages.push(PipelineStage::Group {
            key: Field::Status,
            reducer: Reducer::Count,
        });
        let rows: Vec<GroupRow> = self.run_rows(Collection::Tasks, stages).await?;
        rows.into_iter()
            .map(|row| {
                let key = row
                    .key
                    .ok_or_else(|| StorageError::Decode(String::from("status bucket without a key")))?;
                Ok(StatusCount {
                    status: parse_status(&key)?,
                    count: row.count,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ReportEngine for PipelineEngine {
    async fn task_completion_summary(&self) -> StorageResult<Vec<StatusCount>> {
        self.status_breakdown(Vec::new()).await
    }

    async fn user_performance(&self, user_id: Uuid) -> StorageResult<Vec<StatusCount>> {
        self.status_breakdown(vec![Predicate::Eq(
            Field::AssignedTo,
            ScalarValue::uuid(user_id),
        )])
        .await
    }

    async fn overdue_tasks_summary(&self) -> StorageResult<Vec<OverdueProjectCount>> {
        let stages = vec![
            PipelineStage::Match(vec![
                Predicate::Lt(Field::DueDate, ScalarValue::timestamp(Utc::now())),
                Predicate::Ne(
                    Field::Status,
                    ScalarValue::text(TaskStatus::Completed.as_str()),
                ),
            ]),
            PipelineStage::Group {
                key: Field::Project,
                reducer: Reducer::Count,
            },
        ];
        let rows: Vec<GroupRow> = self.run_rows(Collection::Tasks, stages).await?;
        rows.into_iter()
            .map(|row| {
                Ok(OverdueProjectCount {
                    project: row.key.as_deref().map(parse_uuid).transpose()?,
                    count: row.count,
                })
            })
            .collect()
    }

    async fn project_task_summary(
        &self,
        project_id: Uuid,
    ) -> StorageResult<Option<ProjectTaskSummary>> {
        if !self.repo.exists(Collection::Projects, project_id).await? {
            return Ok(None);
        }

        // Two independent snapshots of the same project id.
        let task_summary = self
            .status_breakdown(vec![Predicate::Eq(
                Field::Project,
                ScalarValue::uuid(project_id),
            )])
            .await?;

        let stages = vec![
            PipelineStage::Match(vec![
                Predicate::Eq(Field::Project, ScalarValue::uuid(project_id)),
                Predicate::Eq(
                    Field::Status,
                    ScalarValue::text(TaskStatus::Completed.as_str()),
                ),
            ]),
            PipelineStage::Group {
                key: Field::AssignedTo,
                reducer: Reducer::Count,
            },
            PipelineStage::Lookup {
                from: Collection::Users,
                local: Field::AssignedTo,
                foreign: Field::Id,
                alias: "assignee",
            },
            PipelineStage::Unwind("assignee"),
            PipelineStage::Project(vec![
                Projection::new(
                    "username",
                    ProjectionSource::Joined("assignee", Field::Username),
                ),
                Projection::new("completed_tasks", ProjectionSource::GroupCount),
            ]),
        ];
        let rows: Vec<ContributionRow> = self.run_rows(Collection::Tasks, stages).await?;
        let member_contributions = rows
            .into_iter()
            .map(|row| MemberContribution {
                username: row.username,
                completed_tasks: row.completed_tasks,
            })
            .collect();

        Ok(Some(ProjectTaskSummary {
            task_summary,
            member_contributions,
        }))
    }

    async fn projects_with_user_task_counts(&self) -> StorageResult<Vec<ProjectWithTaskCounts>> {
        let member_stages = vec![
            PipelineStage::Lookup {
                from: Collection::Users,
                local: Field::Members,
                foreign: Field::Id,
                alias: "member",
            },
            // Column order doubles as the deterministic sort: projects by
            // (name, id), members within a project by username.
            PipelineStage::Project(vec![
                Projection::new("name", ProjectionSource::Field(Field::Name)),
                Projection::new("id", ProjectionSource::Field(Field::Id)),
                Projection::new("username", ProjectionSource::Joined("member", Field::Username)),
                Projection::new("email", ProjectionSource::Joined("member", Field::Email)),
                Projection::new("role", ProjectionSource::Joined("member", Field::Role)),
                Projection::new("member_id", ProjectionSource::Joined("member", Field::Id)),
            ]),
        ];
        let rows: Vec<ProjectMemberRow> = self.run_rows(Collection::Projects, member_stages).await?;

        // Task counts come from the task back-reference, in a second snapshot.
        let count_rows: Vec<GroupRow> = self
            .run_rows(
                Collection::Tasks,
                vec![PipelineStage::Group {
                    key: Field::Project,
                    reducer: Reducer::Count,
                }],
            )
            .await?;
        let mut counts: HashMap<String, u64> = HashMap::new();
        for row in count_rows {
            if let Some(key) = row.key {
                counts.insert(key, row.count);
            }
        }

        // Rows arrive ordered by (name, id, member), one per project/member pair.
        let mut reports: Vec<ProjectWithTaskCounts> = Vec::new();
        let mut last_id: Option<String> = None;
        for row in rows {
            if last_id.as_deref() != Some(row.id.as_str()) {
                reports.push(ProjectWithTaskCounts {
                    name: row.name.clone(),
                    members: Vec::new(),
                    task_count: counts.get(&row.id).copied().unwrap_or(0),
                });
                last_id = Some(row.id.clone());
            }
            if let (Some(member_id), Some(username), Some(email), Some(role)) =
                (row.member_id, row.username, row.email, row.role)
            {
                if let Some(report) = reports.last_mut() {
                    report.members.push(User {
                        id: parse_uuid(&member_id)?,
                        username,
                        email,
                        role: parse_role(&role)?,
                    });
                }
            }
        }
        Ok(reports)
    }

    async fn users_with_task_counts(&self) -> StorageResult<Vec<UserTaskCount>> {
        let stages = vec![
            PipelineStage::Lookup {
                from: Collection::Tasks,
                local: Field::Id,
                foreign: Field::AssignedTo,
                alias: "task",
            },
            PipelineStage::Project(vec![
                Projection::new("username", ProjectionSource::Field(Field::Username)),
                Projection::new("email", ProjectionSource::Field(Field::Email)),
                Projection::new("role", ProjectionSource::Field(Field::Role)),
                Projection::new("task_count", ProjectionSource::CountOf("task")),
            ]),
        ];
        let rows: Vec<UserTaskCountRow> = self.run_rows(Collection::Users, stages).await?;
        rows.into_iter()
            .map(|row| {
                Ok(UserTaskCount {
                    username: row.username,
                    email: row.email,
                    role: parse_role(&row.role)?,
                    task_count: row.task_count,
                })
            })
            .collect()
    }
}
