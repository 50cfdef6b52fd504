use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Project aggregate. `tasks` is the denormalized forward list captured at
/// creation time; per-project reporting counts tasks through their own
/// `project` back-reference instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub tasks: Vec<Uuid>,
    pub members: Vec<Uuid>,
}

/// Creation payload: members are referenced by username and the forward task
/// list by title, both resolved against storage when the project is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProjectDto {
    pub name: String,
    pub members: Vec<String>,
    pub tasks: Vec<String>,
}
