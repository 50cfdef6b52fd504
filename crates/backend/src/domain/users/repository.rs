use anyhow::{Context, Result};
use contracts::domain::user::User;
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, QueryResult, Statement};
use uuid::Uuid;

use crate::storage::sql::{parse_role, parse_uuid};

fn user_from_row(row: &QueryResult) -> Result<User> {
    Ok(User {
        id: parse_uuid(&row.try_get::<String>("", "id")?)?,
        username: row.try_get("", "username")?,
        email: row.try_get("", "email")?,
        role: parse_role(&row.try_get::<String>("", "role")?)?,
    })
}

/// Create user with password hash
pub async fn create_with_password(
    conn: &DatabaseConnection,
    user: &User,
    password_hash: &str,
) -> Result<()> {
    conn.execute(Statement::from_sql_and_values(
        DatabaseBackend::Sqlite,
        "INSERT INTO users (id, username, password_hash, email, role) VALUES (?, ?, ?, ?, ?)",
        [
            user.id.to_string().into(),
            user.username.clone().into(),
            password_hash.to_string().into(),
            user.email.clone().into(),
            user.role.as_str().into(),
        ],
    ))
    .await
    .context("Failed to insert user")?;

    Ok(())
}

/// Get user by username
pub async fn get_by_username(conn: &DatabaseConnection, username: &str) -> Result<Option<User>> {
    let result = conn
        .query_one(Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            "SELECT id, username, email, role FROM users WHERE username = ?",
            [username.into()],
        ))
        .await?;

    result.as_ref().map(user_from_row).transpose()
}

/// Get user by email
pub async fn get_by_email(conn: &DatabaseConnection, email: &str) -> Result<Option<User>> {
    let result = conn
        .query_one(Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            "SELECT id, username, email, role FROM users WHERE email = ?",
            [email.into()],
        ))
        .await?;

    result.as_ref().map(user_from_row).transpose()
}

/// Fetch users for a set of usernames (project membership resolution)
pub async fn find_by_usernames(conn: &DatabaseConnection, usernames: &[String]) -> Result<Vec<User>> {
    if usernames.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; usernames.len()].join(", ");
    let sql = format!(
        "SELECT id, username, email, role FROM users WHERE username IN ({}) ORDER BY username",
        placeholders
    );
    let values: Vec<sea_orm::Value> = usernames.iter().map(|name| name.clone().into()).collect();
    let rows = conn
        .query_all(Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            &sql,
            values,
        ))
        .await?;

    rows.iter().map(user_from_row).collect()
}

/// Update user fields (credential changes go through `update_password`)
pub async fn update(conn: &DatabaseConnection, user: &User) -> Result<()> {
    conn.execute(Statement::from_sql_and_values(
        DatabaseBackend::Sqlite,
        "UPDATE users SET username = ?, email = ?, role = ? WHERE id = ?",
        [
            user.username.clone().into(),
            user.email.clone().into(),
            user.role.as_str().into(),
            user.id.to_string().into(),
        ],
    ))
    .await
    .context("Failed to update user")?;

    Ok(())
}

/// Replace the stored credential
pub async fn update_password(
    conn: &DatabaseConnection,
    id: Uuid,
    password_hash: &str,
) -> Result<()> {
    conn.execute(Statement::from_sql_and_values(
        DatabaseBackend::Sqlite,
        "UPDATE users SET password_hash = ? WHERE id = ?",
        [password_hash.to_string().into(), id.to_string().into()],
    ))
    .await
    .context("Failed to update password")?;

    Ok(())
}
