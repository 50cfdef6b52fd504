use contracts::domain::user::{CreateUserDto, UpdateUserDto, User};
use contracts::reports::envelope::{FailureKind, ResponseEnvelope};
use uuid::Uuid;

use super::repository;
use crate::domain::storage_failure;
use crate::shared::password;
use crate::storage::sql::SqlRepository;
use crate::storage::{Collection, Repository};

/// Create a new user
pub async fn create(repo: &SqlRepository, dto: CreateUserDto) -> ResponseEnvelope<User> {
    if dto.username.trim().is_empty() {
        return ResponseEnvelope::failure(FailureKind::Validation, "Username cannot be empty");
    }

    match repository::get_by_email(repo.connection(), &dto.email).await {
        Ok(Some(_)) => {
            return ResponseEnvelope::failure(FailureKind::Validation, "User Email Already Exists")
        }
        Ok(None) => {}
        Err(err) => return storage_failure("users.create", err),
    }

    let password_hash = match password::hash_password(&dto.password) {
        Ok(hash) => hash,
        Err(err) => return storage_failure("users.create", err),
    };

    let user = User {
        id: Uuid::new_v4(),
        username: dto.username,
        email: dto.email,
        role: dto.role,
    };

    match repository::create_with_password(repo.connection(), &user, &password_hash).await {
        Ok(()) => ResponseEnvelope::ok("User Created Successfully", user),
        Err(err) => storage_failure("users.create", err),
    }
}

/// Update user
pub async fn update(repo: &SqlRepository, id: &str, dto: UpdateUserDto) -> ResponseEnvelope<User> {
    let user_id = match Uuid::parse_str(id) {
        Ok(id) => id,
        Err(_) => return ResponseEnvelope::failure(FailureKind::Validation, "Invalid user ID"),
    };

    match repo.find_by_id(Collection::Users, user_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return ResponseEnvelope::failure(FailureKind::NotFound, "User ID does not exist")
        }
        Err(err) => return storage_failure("users.update", err),
    }

    match repository::get_by_username(repo.connection(), &dto.username).await {
        Ok(Some(existing)) if existing.id != user_id => {
            return ResponseEnvelope::failure(FailureKind::Validation, "Username already exists")
        }
        Ok(_) => {}
        Err(err) => return storage_failure("users.update", err),
    }

    match repository::get_by_email(repo.connection(), &dto.email).await {
        Ok(Some(existing)) if existing.id != user_id => {
            return ResponseEnvelope::failure(FailureKind::Validation, "Email already exists")
        }
        Ok(_) => {}
        Err(err) => return storage_failure("users.update", err),
    }

    let user = User {
        id: user_id,
        username: dto.username,
        email: dto.email,
        role: dto.role,
    };

    if let Err(err) = repository::update(repo.connection(), &user).await {
        return storage_failure("users.update", err);
    }

    if let Some(new_password) = dto.password {
        let hash = match password::hash_password(&new_password) {
            Ok(hash) => hash,
            Err(err) => return storage_failure("users.update", err),
        };
        if let Err(err) = repository::update_password(repo.connection(), user_id, &hash).await {
            return storage_failure("users.update", err);
        }
    }

    ResponseEnvelope::ok("User Updated Successfully", user)
}

/// Get user by ID
pub async fn find_one(repo: &SqlRepository, id: &str) -> ResponseEnvelope<User> {
    let user_id = match Uuid::parse_str(id) {
        Ok(id) => id,
        Err(_) => return ResponseEnvelope::failure(FailureKind::Validation, "Invalid user ID"),
    };

    match repo.find_by_id(Collection::Users, user_id).await {
        Ok(Some(value)) => match serde_json::from_value::<User>(value) {
            Ok(user) => ResponseEnvelope::ok("User Found Successfully", user),
            Err(err) => storage_failure("users.find_one", err),
        },
        Ok(None) => ResponseEnvelope::failure(FailureKind::NotFound, "User Not Found"),
        Err(err) => storage_failure("users.find_one", err),
    }
}
