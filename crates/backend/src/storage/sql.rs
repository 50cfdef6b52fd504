use async_trait::async_trait;
use chrono::{DateTime, Utc};
use contracts::domain::project::Project;
use contracts::domain::task::{Task, TaskStatus};
use contracts::domain::user::{User, UserRole};
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, QueryResult, Statement};
use serde_json::{Map, Value};
use std::str::FromStr;
use uuid::Uuid;

use super::pipeline::{PipelineStage, Predicate, ProjectionSource, Reducer};
use super::{Collection, Field, ListFilter, Repository, StorageError, StorageResult};

/// Scalar column backing a logical field.
struct FieldColumn {
    column: &'static str,
    nullable: bool,
}

fn column_of(collection: Collection, field: Field) -> StorageResult<FieldColumn> {
    let (column, nullable) = match (collection, field) {
        (Collection::Users, Field::Id) => ("id", false),
        (Collection::Users, Field::Username) => ("username", false),
        (Collection::Users, Field::Email) => ("email", false),
        (Collection::Users, Field::Role) => ("role", false),
        (Collection::Projects, Field::Id) => ("id", false),
        (Collection::Projects, Field::Name) => ("name", false),
        (Collection::Tasks, Field::Id) => ("id", false),
        (Collection::Tasks, Field::Title) => ("title", false),
        (Collection::Tasks, Field::Status) => ("status", false),
        (Collection::Tasks, Field::DueDate) => ("due_date", false),
        (Collection::Tasks, Field::Project) => ("project_id", true),
        (Collection::Tasks, Field::AssignedTo) => ("assigned_to", true),
        (collection, field) => {
            return Err(StorageError::UnsupportedPipeline(format!(
                "field {:?} is not a scalar column of {:?}",
                field, collection
            )))
        }
    };
    Ok(FieldColumn { column, nullable })
}

/// Link table backing an array-valued field.
struct LinkTable {
    table: &'static str,
    owner_column: &'static str,
    value_column: &'static str,
}

fn link_of(collection: Collection, field: Field) -> Option<LinkTable> {
    match (collection, field) {
        (Collection::Projects, Field::Members) => Some(LinkTable {
            table: "project_members",
            owner_column: "project_id",
            value_column: "user_id",
        }),
        _ => None,
    }
}

fn order_columns(collection: Collection) -> &'static str {
    match collection {
        Collection::Users => "username, id",
        Collection::Projects => "name, id",
        Collection::Tasks => "due_date, id",
    }
}

fn entity_columns(collection: Collection) -> &'static str {
    match collection {
        // password_hash stays inside the storage layer
        Collection::Users => "id, username, email, role",
        Collection::Projects => "id, name",
        Collection::Tasks => "id, title, status, due_date, project_id, assigned_to",
    }
}

pub(crate) fn parse_uuid(s: &str) -> StorageResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| StorageError::Decode(format!("invalid uuid {:?}: {}", s, e)))
}

pub(crate) fn parse_role(s: &str) -> StorageResult<UserRole> {
    UserRole::from_str(s).map_err(StorageError::Decode)
}

pub(crate) fn parse_status(s: &str) -> StorageResult<TaskStatus> {
    TaskStatus::from_str(s).map_err(StorageError::Decode)
}

pub(crate) fn parse_timestamp(s: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Decode(format!("invalid timestamp {:?}: {}", s, e)))
}

fn escape_like(needle: &str) -> String {
    needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn filter_clause(
    collection: Collection,
    filter: &ListFilter,
) -> StorageResult<(String, Vec<sea_orm::Value>)> {
    match filter {
        ListFilter::All => Ok((String::new(), Vec::new())),
        ListFilter::Contains { field, needle } => {
            let column = column_of(collection, *field)?.column;
            let pattern = format!("%{}%", escape_like(needle));
            Ok((
                format!(" WHERE {} LIKE ? ESCAPE '\\'", column),
                vec![pattern.into()],
            ))
        }
    }
}

/// sqlite-backed repository. Reads go through the [`Repository`] trait; the
/// entity write surface lives in the domain repositories and reaches the
/// connection via [`SqlRepository::connection`].
pub struct SqlRepository {
    conn: DatabaseConnection,
}

impl SqlRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    fn user_from_row(row: &QueryResult) -> StorageResult<User> {
        Ok(User {
            id: parse_uuid(&row.try_get::<String>("", "id")?)?,
            username: row.try_get("", "username")?,
            email: row.try_get("", "email")?,
            role: parse_role(&row.try_get::<String>("", "role")?)?,
        })
    }

    fn task_from_row(row: &QueryResult) -> StorageResult<Task> {
        let project = row.try_get::<Option<String>>("", "project_id")?;
        let assigned_to = row.try_get::<Option<String>>("", "assigned_to")?;
        Ok(Task {
            id: parse_uuid(&row.try_get::<String>("", "id")?)?,
            title: row.try_get("", "title")?,
            status: parse_status(&row.try_get::<String>("", "status")?)?,
            due_date: parse_timestamp(&row.try_get::<String>("", "due_date")?)?,
            project: project.as_deref().map(parse_uuid).transpose()?,
            assigned_to: assigned_to.as_deref().map(parse_uuid).transpose()?,
        })
    }

    async fn project_from_row(&self, row: &QueryResult) -> StorageResult<Project> {
        let id = parse_uuid(&row.try_get::<String>("", "id")?)?;
        Ok(Project {
            id,
            name: row.try_get("", "name")?,
            tasks: self.link_values("project_tasks", "task_id", id).await?,
            members: self.link_values("project_members", "user_id", id).await?,
        })
    }

    async fn link_values(
        &self,
        table: &str,
        value_column: &str,
        project_id: Uuid,
    ) -> StorageResult<Vec<Uuid>> {
        let rows = self
            .conn
            .query_all(Statement::from_sql_and_values(
                DatabaseBackend::Sqlite,
                &format!(
                    "SELECT {value} FROM {table} WHERE project_id = ? ORDER BY {value}",
                    value = value_column,
                    table = table
                ),
                [project_id.to_string().into()],
            ))
            .await?;
        rows.iter()
            .map(|row| parse_uuid(&row.try_get::<String>("", value_column)?))
            .collect()
    }

    async fn entity_to_json(&self, collection: Collection, row: &QueryResult) -> StorageResult<Value> {
        let value = match collection {
            Collection::Users => serde_json::to_value(Self::user_from_row(row)?),
            Collection::Projects => serde_json::to_value(self.project_from_row(row).await?),
            Collection::Tasks => serde_json::to_value(Self::task_from_row(row)?),
        };
        value.map_err(|e| StorageError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Repository for SqlRepository {
    async fn find_by_id(&self, collection: Collection, id: Uuid) -> StorageResult<Option<Value>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?",
            entity_columns(collection),
            collection.table()
        );
        let row = self
            .conn
            .query_one(Statement::from_sql_and_values(
                DatabaseBackend::Sqlite,
                &sql,
                [id.to_string().into()],
            ))
            .await?;
        match row {
            Some(row) => Ok(Some(self.entity_to_json(collection, &row).await?)),
            None => Ok(None),
        }
    }

    async fn find_many(
        &self,
        collection: Collection,
        filter: &ListFilter,
        skip: u64,
        limit: u64,
    ) -> StorageResult<(Vec<Value>, u64)> {
        let total = self.count_matching(collection, filter).await?;

        let (where_sql, mut params) = filter_clause(collection, filter)?;
        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY {} LIMIT ? OFFSET ?",
            entity_columns(collection),
            collection.table(),
            where_sql,
            order_columns(collection)
        );
        params.push((limit as i64).into());
        params.push((skip as i64).into());

        let rows = self
            .conn
            .query_all(Statement::from_sql_and_values(
                DatabaseBackend::Sqlite,
                &sql,
                params,
            ))
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            items.push(self.entity_to_json(collection, row).await?);
        }
        Ok((items, total))
    }

    async fn count_matching(
        &self,
        collection: Collection,
        filter: &ListFilter,
    ) -> StorageResult<u64> {
        let (where_sql, params) = filter_clause(collection, filter)?;
        let sql = format!(
            "SELECT COUNT(*) AS count FROM {}{}",
            collection.table(),
            where_sql
        );
        let row = self
            .conn
            .query_one(Statement::from_sql_and_values(
                DatabaseBackend::Sqlite,
                &sql,
                params,
            ))
            .await?;
        match row {
            Some(row) => Ok(row.try_get::<i64>("", "count")? as u64),
            None => Ok(0),
        }
    }

    async fn exists(&self, collection: Collection, id: Uuid) -> StorageResult<bool> {
        let sql = format!("SELECT 1 AS one FROM {} WHERE id = ? LIMIT 1", collection.table());
        let row = self
            .conn
            .query_one(Statement::from_sql_and_values(
                DatabaseBackend::Sqlite,
                &sql,
                [id.to_string().into()],
            ))
            .await?;
        Ok(row.is_some())
    }

    async fn run_pipeline(
        &self,
        collection: Collection,
        stages: &[PipelineStage],
    ) -> StorageResult<Vec<Value>> {
        let compiled = compile_pipeline(collection, stages)?;
        tracing::debug!(sql = %compiled.sql, "running report pipeline");

        let rows = self
            .conn
            .query_all(Statement::from_sql_and_values(
                DatabaseBackend::Sqlite,
                &compiled.sql,
                compiled.params,
            ))
            .await?;

        rows.iter()
            .map(|row| row_to_json(row, &compiled.outputs))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutKind {
    Text,
    OptText,
    Count,
}

struct OutputColumn {
    name: &'static str,
    kind: OutKind,
}

struct CompiledPipeline {
    sql: String,
    params: Vec<sea_orm::Value>,
    outputs: Vec<OutputColumn>,
}

#[derive(Debug, Clone, Copy)]
enum SelectItem {
    Base(Field),
    Joined { alias: &'static str, field: Field },
    GroupKey,
    GroupCount,
    CountOf(&'static str),
}

struct PlanJoin {
    alias: &'static str,
    from: Collection,
    link: Option<LinkTable>,
    on: String,
    inner: bool,
}

fn unsupported(message: impl Into<String>) -> StorageError {
    StorageError::UnsupportedPipeline(message.into())
}

/// Compile a stage sequence into one SQL statement, accumulating
/// SELECT/JOIN/WHERE/GROUP BY/ORDER BY parts plus bound parameters.
///
/// Every compiled statement carries an ORDER BY: the group key for grouped
/// pipelines (sqlite sorts the NULL bucket first), otherwise the projected
/// text columns in listed order — results are reproducible.
fn compile_pipeline(base: Collection, stages: &[PipelineStage]) -> StorageResult<CompiledPipeline> {
    let table = base.table();

    let mut select: Vec<(&'static str, SelectItem)> = Vec::new();
    let mut joins: Vec<PlanJoin> = Vec::new();
    let mut wheres: Vec<String> = Vec::new();
    let mut params: Vec<sea_orm::Value> = Vec::new();
    let mut group_key: Option<Field> = None;

    for stage in stages {
        match stage {
            PipelineStage::Match(predicates) => {
                if group_key.is_some() {
                    return Err(unsupported("Match after Group"));
                }
                for predicate in predicates {
                    let (field, op, value) = match predicate {
                        Predicate::Eq(f, v) => (f, "=", v),
                        Predicate::Ne(f, v) => (f, "<>", v),
                        Predicate::Lt(f, v) => (f, "<", v),
                    };
                    let column = column_of(base, *field)?.column;
                    wheres.push(format!("{}.{} {} ?", table, column, op));
                    params.push(value.clone().into());
                }
            }
            PipelineStage::Group {
                key,
                reducer: Reducer::Count,
            } => {
                if group_key.is_some() {
                    return Err(unsupported("more than one Group stage"));
                }
                column_of(base, *key)?;
                group_key = Some(*key);
                select = vec![("key", SelectItem::GroupKey), ("count", SelectItem::GroupCount)];
            }
            PipelineStage::Lookup {
                from,
                local,
                foreign,
                alias,
            } => {
                if joins.iter().any(|join| join.alias == *alias) {
                    return Err(unsupported(format!("duplicate lookup alias {:?}", alias)));
                }
                let foreign_column = column_of(*from, *foreign)?.column;
                if let Some(link) = link_of(base, *local) {
                    if group_key.is_some() {
                        return Err(unsupported("array-field lookup after Group"));
                    }
                    let on = format!(
                        "{}.{} = {}.{}",
                        alias, foreign_column, link.table, link.value_column
                    );
                    joins.push(PlanJoin {
                        alias: *alias,
                        from: *from,
                        link: Some(link),
                        on,
                        inner: false,
                    });
                } else {
                    let local_column = column_of(base, *local)?.column;
                    if let Some(key) = group_key {
                        if key != *local {
                            return Err(unsupported("lookup after Group must join on the group key"));
                        }
                    }
                    let on = format!("{}.{} = {}.{}", alias, foreign_column, table, local_column);
                    joins.push(PlanJoin {
                        alias: *alias,
                        from: *from,
                        link: None,
                        on,
                        inner: false,
                    });
                }
            }
            PipelineStage::Unwind(alias) => {
                let join = joins
                    .iter_mut()
                    .find(|join| join.alias == *alias)
                    .ok_or_else(|| unsupported(format!("Unwind without Lookup {:?}", alias)))?;
                join.inner = true;
            }
            PipelineStage::Project(columns) => {
                select = columns
                    .iter()
                    .map(|projection| {
                        let item = match &projection.source {
                            ProjectionSource::Field(field) => SelectItem::Base(*field),
                            ProjectionSource::Joined(alias, field) => SelectItem::Joined {
                                alias: *alias,
                                field: *field,
                            },
                            ProjectionSource::GroupCount => SelectItem::GroupCount,
                            ProjectionSource::CountOf(alias) => SelectItem::CountOf(*alias),
                        };
                        (projection.name, item)
                    })
                    .collect();
            }
        }
    }

    if select.is_empty() {
        return Err(unsupported("pipeline produces no output columns"));
    }

    fn find_join<'a>(joins: &'a [PlanJoin], alias: &str) -> StorageResult<&'a PlanJoin> {
        joins
            .iter()
            .find(|join| join.alias == alias)
            .ok_or_else(|| unsupported(format!("projection references unknown alias {:?}", alias)))
    }

    let has_count_of = select
        .iter()
        .any(|(_, item)| matches!(item, SelectItem::CountOf(_)));
    if has_count_of && group_key.is_some() {
        return Err(unsupported("CountOf cannot follow a Group stage"));
    }

    let mut select_sql: Vec<String> = Vec::new();
    let mut outputs: Vec<OutputColumn> = Vec::new();
    // Non-aggregated columns double as GROUP BY / ORDER BY sources.
    let mut plain_columns: Vec<String> = Vec::new();

    for (name, item) in select.iter().copied() {
        match item {
            SelectItem::GroupKey => {
                let key = group_key.ok_or_else(|| unsupported("group key outside Group"))?;
                let fc = column_of(base, key)?;
                let column = format!("{}.{}", table, fc.column);
                select_sql.push(format!("{} AS \"{}\"", column, name));
                outputs.push(OutputColumn {
                    name,
                    kind: if fc.nullable { OutKind::OptText } else { OutKind::Text },
                });
                plain_columns.push(column);
            }
            SelectItem::GroupCount => {
                if group_key.is_none() {
                    return Err(unsupported("GroupCount without a Group stage"));
                }
                select_sql.push(format!("COUNT(*) AS \"{}\"", name));
                outputs.push(OutputColumn {
                    name,
                    kind: OutKind::Count,
                });
            }
            SelectItem::Base(field) => {
                if let Some(key) = group_key {
                    if key != field {
                        return Err(unsupported(
                            "only the group key survives past a Group stage",
                        ));
                    }
                }
                let fc = column_of(base, field)?;
                let column = format!("{}.{}", table, fc.column);
                select_sql.push(format!("{} AS \"{}\"", column, name));
                outputs.push(OutputColumn {
                    name,
                    kind: if fc.nullable { OutKind::OptText } else { OutKind::Text },
                });
                plain_columns.push(column);
            }
            SelectItem::Joined { alias, field } => {
                let join = find_join(&joins, alias)?;
                let fc = column_of(join.from, field)?;
                let column = format!("{}.{}", alias, fc.column);
                select_sql.push(format!("{} AS \"{}\"", column, name));
                outputs.push(OutputColumn {
                    name,
                    // A LEFT-joined column can be NULL even for a NOT NULL field.
                    kind: if join.inner && !fc.nullable { OutKind::Text } else { OutKind::OptText },
                });
                plain_columns.push(column);
            }
            SelectItem::CountOf(alias) => {
                let join = find_join(&joins, alias)?;
                let pk = column_of(join.from, Field::Id)?.column;
                select_sql.push(format!("COUNT({}.{}) AS \"{}\"", alias, pk, name));
                outputs.push(OutputColumn {
                    name,
                    kind: OutKind::Count,
                });
            }
        }
    }

    // The group key always anchors GROUP BY, even when a Project stage has
    // reshaped the output and no longer selects it.
    let mut group_by: Vec<String> = Vec::new();
    if let Some(key) = group_key {
        group_by.push(format!("{}.{}", table, column_of(base, key)?.column));
    } else if has_count_of {
        group_by.push(format!("{}.id", table));
    }
    if group_key.is_some() || has_count_of {
        for column in &plain_columns {
            if !group_by.contains(column) {
                group_by.push(column.clone());
            }
        }
    }

    let mut order_by: Vec<String> = Vec::new();
    for column in &plain_columns {
        if !order_by.contains(column) {
            order_by.push(column.clone());
        }
    }
    let tiebreak = if let Some(key) = group_key {
        format!("{}.{}", table, column_of(base, key)?.column)
    } else {
        format!("{}.id", table)
    };
    if !order_by.contains(&tiebreak) {
        order_by.push(tiebreak);
    }

    let mut sql = format!("SELECT {} FROM {}", select_sql.join(", "), table);
    for join in &joins {
        let keyword = if join.inner { "INNER JOIN" } else { "LEFT JOIN" };
        if let Some(link) = &join.link {
            sql.push_str(&format!(
                " {} {} ON {}.{} = {}.id",
                keyword, link.table, link.table, link.owner_column, table
            ));
        }
        sql.push_str(&format!(
            " {} {} AS {} ON {}",
            keyword,
            join.from.table(),
            join.alias,
            join.on
        ));
    }
    if !wheres.is_empty() {
        sql.push_str(&format!(" WHERE {}", wheres.join(" AND ")));
    }
    if !group_by.is_empty() {
        sql.push_str(&format!(" GROUP BY {}", group_by.join(", ")));
    }
    if !order_by.is_empty() {
        sql.push_str(&format!(" ORDER BY {}", order_by.join(", ")));
    }

    Ok(CompiledPipeline {
        sql,
        params,
        outputs,
    })
}

fn row_to_json(row: &QueryResult, outputs: &[OutputColumn]) -> StorageResult<Value> {
    let mut map = Map::new();
    for output in outputs {
        let value = match output.kind {
            OutKind::Count => Value::from(row.try_get::<i64>("", output.name)?),
            OutKind::Text => Value::from(row.try_get::<String>("", output.name)?),
            OutKind::OptText => match row.try_get::<Option<String>>("", output.name)? {
                Some(text) => Value::from(text),
                None => Value::Null,
            },
        };
        map.insert(output.name.to_string(), value);
    }
    Ok(Value::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::data::db::connect;
    use crate::storage::pipeline::{Projection, ScalarValue};

    fn status_breakdown() -> Vec<PipelineStage> {
        vec![PipelineStage::Group {
            key: Field::Status,
            reducer: Reducer::Count,
        }]
    }

    #[test]
    fn compiles_group_by_status() {
        let compiled = compile_pipeline(Collection::Tasks, &status_breakdown()).unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT tasks.status AS \"key\", COUNT(*) AS \"count\" FROM tasks \
             GROUP BY tasks.status ORDER BY tasks.status"
        );
    }

    #[test]
    fn compiles_match_into_where_clauses() {
        let stages = vec![
            PipelineStage::Match(vec![
                Predicate::Lt(Field::DueDate, ScalarValue::timestamp(Utc::now())),
                Predicate::Ne(Field::Status, ScalarValue::text("Completed")),
            ]),
            PipelineStage::Group {
                key: Field::Project,
                reducer: Reducer::Count,
            },
        ];
        let compiled = compile_pipeline(Collection::Tasks, &stages).unwrap();
        assert!(compiled
            .sql
            .contains("WHERE tasks.due_date < ? AND tasks.status <> ?"));
        assert!(compiled.sql.contains("GROUP BY tasks.project_id"));
        assert_eq!(compiled.params.len(), 2);
    }

    #[test]
    fn compiles_grouped_lookup_with_unwind() {
        let stages = vec![
            PipelineStage::Match(vec![Predicate::Eq(
                Field::Project,
                ScalarValue::uuid(Uuid::nil()),
            )]),
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
                Projection::new("username", ProjectionSource::Joined("assignee", Field::Username)),
                Projection::new("completed_tasks", ProjectionSource::GroupCount),
            ]),
        ];
        let compiled = compile_pipeline(Collection::Tasks, &stages).unwrap();
        assert!(compiled
            .sql
            .contains("INNER JOIN users AS assignee ON assignee.id = tasks.assigned_to"));
        assert!(compiled
            .sql
            .contains("GROUP BY tasks.assigned_to, assignee.username"));
        assert!(compiled.sql.contains("COUNT(*) AS \"completed_tasks\""));
        assert!(compiled.sql.contains("ORDER BY assignee.username, tasks.assigned_to"));
    }

    #[test]
    fn compiles_count_of_joined_rows() {
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
        let compiled = compile_pipeline(Collection::Users, &stages).unwrap();
        assert!(compiled
            .sql
            .contains("LEFT JOIN tasks AS task ON task.assigned_to = users.id"));
        assert!(compiled.sql.contains("COUNT(task.id) AS \"task_count\""));
        assert!(compiled
            .sql
            .contains("GROUP BY users.id, users.username, users.email, users.role"));
    }

    #[test]
    fn compiles_array_field_lookup_through_link_table() {
        let stages = vec![
            PipelineStage::Lookup {
                from: Collection::Users,
                local: Field::Members,
                foreign: Field::Id,
                alias: "member",
            },
            PipelineStage::Project(vec![
                Projection::new("name", ProjectionSource::Field(Field::Name)),
                Projection::new("id", ProjectionSource::Field(Field::Id)),
                Projection::new("username", ProjectionSource::Joined("member", Field::Username)),
            ]),
        ];
        let compiled = compile_pipeline(Collection::Projects, &stages).unwrap();
        assert!(compiled
            .sql
            .contains("LEFT JOIN project_members ON project_members.project_id = projects.id"));
        assert!(compiled
            .sql
            .contains("LEFT JOIN users AS member ON member.id = project_members.user_id"));
    }

    #[test]
    fn rejects_malformed_pipelines() {
        let double_group = vec![
            PipelineStage::Group {
                key: Field::Status,
                reducer: Reducer::Count,
            },
            PipelineStage::Group {
                key: Field::Project,
                reducer: Reducer::Count,
            },
        ];
        assert!(compile_pipeline(Collection::Tasks, &double_group).is_err());

        let dangling_unwind = vec![PipelineStage::Unwind("nobody")];
        assert!(compile_pipeline(Collection::Tasks, &dangling_unwind).is_err());

        assert!(compile_pipeline(Collection::Tasks, &[]).is_err());
    }

    async fn test_repository() -> (tempfile::TempDir, SqlRepository) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");
        let conn = connect(path.to_str().unwrap()).await.unwrap();
        (dir, SqlRepository::new(conn))
    }

    async fn seed_task(repo: &SqlRepository, title: &str, status: &str) -> Uuid {
        let id = Uuid::new_v4();
        repo.connection()
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Sqlite,
                "INSERT INTO tasks (id, title, status, due_date, project_id, assigned_to) \
                 VALUES (?, ?, ?, ?, NULL, NULL)",
                [
                    id.to_string().into(),
                    title.to_string().into(),
                    status.to_string().into(),
                    Utc::now().to_rfc3339().into(),
                ],
            ))
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn find_many_filters_case_insensitively() {
        let (_dir, repo) = test_repository().await;
        seed_task(&repo, "Write Report", "To Do").await;
        seed_task(&repo, "review report draft", "To Do").await;
        seed_task(&repo, "Ship release", "To Do").await;

        let filter = ListFilter::Contains {
            field: Field::Title,
            needle: String::from("REPORT"),
        };
        let (items, total) = repo.find_many(Collection::Tasks, &filter, 0, 10).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(items.len(), 2);

        let (all, total_all) = repo
            .find_many(Collection::Tasks, &ListFilter::All, 0, 10)
            .await
            .unwrap();
        assert_eq!(total_all, 3);
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn find_many_windows_and_counts() {
        let (_dir, repo) = test_repository().await;
        for i in 0..5 {
            seed_task(&repo, &format!("task {}", i), "To Do").await;
        }

        let (page, total) = repo
            .find_many(Collection::Tasks, &ListFilter::All, 4, 2)
            .await
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 1);

        let (beyond, total) = repo
            .find_many(Collection::Tasks, &ListFilter::All, 10, 2)
            .await
            .unwrap();
        assert_eq!(total, 5);
        assert!(beyond.is_empty());
    }

    #[tokio::test]
    async fn like_wildcards_in_needle_match_literally() {
        let (_dir, repo) = test_repository().await;
        seed_task(&repo, "100% done", "To Do").await;
        seed_task(&repo, "100 percent done", "To Do").await;

        let filter = ListFilter::Contains {
            field: Field::Title,
            needle: String::from("100%"),
        };
        let count = repo.count_matching(Collection::Tasks, &filter).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn exists_distinguishes_present_and_absent() {
        let (_dir, repo) = test_repository().await;
        let id = seed_task(&repo, "present", "To Do").await;
        assert!(repo.exists(Collection::Tasks, id).await.unwrap());
        assert!(!repo.exists(Collection::Tasks, Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn pipeline_groups_rows_deterministically() {
        let (_dir, repo) = test_repository().await;
        seed_task(&repo, "a", "Completed").await;
        seed_task(&repo, "b", "Completed").await;
        seed_task(&repo, "c", "To Do").await;

        let rows = repo
            .run_pipeline(Collection::Tasks, &status_breakdown())
            .await
            .unwrap();
        // Ascending by group key: "Completed" < "To Do".
        assert_eq!(
            rows,
            vec![
                serde_json::json!({"key": "Completed", "count": 2}),
                serde_json::json!({"key": "To Do", "count": 1}),
            ]
        );
    }
}
