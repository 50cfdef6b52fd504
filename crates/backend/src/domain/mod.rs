pub mod projects;
pub mod tasks;
pub mod users;

use contracts::reports::envelope::{FailureKind, ResponseEnvelope};

/// Uniform mapping of a data-access failure to a FAILURE envelope. Detail is
/// logged only; callers get a generic message.
pub(crate) fn storage_failure<T>(
    operation: &str,
    err: impl std::fmt::Display,
) -> ResponseEnvelope<T> {
    tracing::error!(operation, error = %err, "write operation failed");
    ResponseEnvelope::failure(FailureKind::Storage, "Error processing request")
}
