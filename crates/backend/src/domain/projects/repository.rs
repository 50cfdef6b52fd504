use anyhow::{Context, Result};
use contracts::domain::project::Project;
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement};

/// Insert a project together with its member links and the forward task list
pub async fn insert(conn: &DatabaseConnection, project: &Project) -> Result<()> {
    conn.execute(Statement::from_sql_and_values(
        DatabaseBackend::Sqlite,
        "INSERT INTO projects (id, name) VALUES (?, ?)",
        [project.id.to_string().into(), project.name.clone().into()],
    ))
    .await
    .context("Failed to insert project")?;

    for task_id in &project.tasks {
        conn.execute(Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            "INSERT INTO project_tasks (project_id, task_id) VALUES (?, ?)",
            [project.id.to_string().into(), task_id.to_string().into()],
        ))
        .await
        .context("Failed to insert project task link")?;
    }

    for user_id in &project.members {
        conn.execute(Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            "INSERT INTO project_members (project_id, user_id) VALUES (?, ?)",
            [project.id.to_string().into(), user_id.to_string().into()],
        ))
        .await
        .context("Failed to insert project member link")?;
    }

    Ok(())
}
