use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, Statement};

const TABLES: &[(&str, &str)] = &[
    (
        "users",
        r#"
        CREATE TABLE users (
            id TEXT PRIMARY KEY NOT NULL,
            username TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            email TEXT NOT NULL,
            role TEXT NOT NULL
        );
    "#,
    ),
    (
        "projects",
        r#"
        CREATE TABLE projects (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL
        );
    "#,
    ),
    (
        "tasks",
        r#"
        CREATE TABLE tasks (
            id TEXT PRIMARY KEY NOT NULL,
            title TEXT NOT NULL,
            status TEXT NOT NULL,
            due_date TEXT NOT NULL,
            project_id TEXT,
            assigned_to TEXT
        );
    "#,
    ),
    (
        "project_members",
        r#"
        CREATE TABLE project_members (
            project_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            PRIMARY KEY (project_id, user_id)
        );
    "#,
    ),
    (
        "project_tasks",
        r#"
        CREATE TABLE project_tasks (
            project_id TEXT NOT NULL,
            task_id TEXT NOT NULL,
            PRIMARY KEY (project_id, task_id)
        );
    "#,
    ),
];

/// Open (creating if necessary) the sqlite database at `db_path` and make
/// sure the schema exists. The connection is handed back to the caller;
/// nothing is stored globally.
pub async fn connect(db_path: &str) -> anyhow::Result<DatabaseConnection> {
    if let Some(parent) = std::path::Path::new(db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let absolute_path = if std::path::Path::new(db_path).is_absolute() {
        std::path::PathBuf::from(db_path)
    } else {
        std::env::current_dir()?.join(db_path)
    };
    // Normalize path separators and ensure proper URL form on Windows
    let normalized = absolute_path.to_string_lossy().replace('\\', "/");
    let needs_leading_slash = !normalized.starts_with('/') && normalized.contains(':');
    let prefix = if needs_leading_slash { "/" } else { "" };
    let db_url = format!("sqlite://{}{}?mode=rwc", prefix, normalized);
    let conn = Database::connect(&db_url).await?;

    ensure_schema(&conn).await?;

    Ok(conn)
}

/// Minimal schema bootstrap: create each missing table, leave existing ones
/// untouched.
async fn ensure_schema(conn: &DatabaseConnection) -> anyhow::Result<()> {
    for (name, ddl) in TABLES {
        let check = format!(
            "SELECT name FROM sqlite_master WHERE type='table' AND name='{}';",
            name
        );
        let existing = conn
            .query_all(Statement::from_string(DatabaseBackend::Sqlite, check))
            .await?;

        if existing.is_empty() {
            tracing::info!("Creating {} table", name);
            conn.execute(Statement::from_string(
                DatabaseBackend::Sqlite,
                ddl.to_string(),
            ))
            .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_bootstraps_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");
        let conn = connect(path.to_str().unwrap()).await.unwrap();

        let rows = conn
            .query_all(Statement::from_string(
                DatabaseBackend::Sqlite,
                "SELECT name FROM sqlite_master WHERE type='table' ORDER BY name".to_string(),
            ))
            .await
            .unwrap();
        let names: Vec<String> = rows
            .iter()
            .map(|row| row.try_get("", "name").unwrap())
            .collect();
        for expected in ["users", "projects", "tasks", "project_members", "project_tasks"] {
            assert!(names.iter().any(|n| n == expected), "missing {}", expected);
        }
    }

    #[tokio::test]
    async fn connect_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");
        connect(path.to_str().unwrap()).await.unwrap();
        // Second open against the same file must not fail on existing tables.
        connect(path.to_str().unwrap()).await.unwrap();
    }
}
