use anyhow::{Context, Result};
use contracts::domain::task::Task;
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement};
use uuid::Uuid;

use crate::storage::sql::parse_uuid;

/// Insert a task
pub async fn insert(conn: &DatabaseConnection, task: &Task) -> Result<()> {
    conn.execute(Statement::from_sql_and_values(
        DatabaseBackend::Sqlite,
        "INSERT INTO tasks (id, title, status, due_date, project_id, assigned_to) \
         VALUES (?, ?, ?, ?, ?, ?)",
        [
            task.id.to_string().into(),
            task.title.clone().into(),
            task.status.as_str().into(),
            task.due_date.to_rfc3339().into(),
            task.project.map(|id| id.to_string()).into(),
            task.assigned_to.map(|id| id.to_string()).into(),
        ],
    ))
    .await
    .context("Failed to insert task")?;

    Ok(())
}

/// Resolve task ids for a set of titles (project forward-list resolution)
pub async fn find_ids_by_titles(conn: &DatabaseConnection, titles: &[String]) -> Result<Vec<Uuid>> {
    if titles.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; titles.len()].join(", ");
    let sql = format!(
        "SELECT id FROM tasks WHERE title IN ({}) ORDER BY title",
        placeholders
    );
    let values: Vec<sea_orm::Value> = titles.iter().map(|title| title.clone().into()).collect();
    let rows = conn
        .query_all(Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            &sql,
            values,
        ))
        .await?;

    rows.iter()
        .map(|row| Ok(parse_uuid(&row.try_get::<String>("", "id")?)?))
        .collect()
}
