use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{Collection, Field};

/// One declarative step of a report pipeline. The repository compiles a
/// stage sequence into a single SQL statement, so the whole computation is
/// pushed down to the data layer.
#[derive(Debug, Clone)]
pub enum PipelineStage {
    /// Keep rows satisfying every predicate.
    Match(Vec<Predicate>),
    /// Bucket rows by `key` and reduce each bucket; emits `{key, count}`
    /// rows unless a later `Project` stage reshapes the output.
    Group { key: Field, reducer: Reducer },
    /// Join rows of `from` whose `foreign` field equals the local field.
    /// Array-valued local fields resolve through their link table; after a
    /// `Group` stage the local field must be the group key.
    Lookup {
        from: Collection,
        local: Field,
        foreign: Field,
        alias: &'static str,
    },
    /// Drop rows with no match under the named lookup alias (inner-join
    /// semantics).
    Unwind(&'static str),
    /// Reshape the output to exactly the listed columns.
    Project(Vec<Projection>),
}

#[derive(Debug, Clone)]
pub enum Predicate {
    Eq(Field, ScalarValue),
    Ne(Field, ScalarValue),
    Lt(Field, ScalarValue),
}

#[derive(Debug, Clone, Copy)]
pub enum Reducer {
    Count,
}

#[derive(Debug, Clone)]
pub struct Projection {
    pub name: &'static str,
    pub source: ProjectionSource,
}

impl Projection {
    pub fn new(name: &'static str, source: ProjectionSource) -> Self {
        Self { name, source }
    }
}

#[derive(Debug, Clone)]
pub enum ProjectionSource {
    /// A field of the base collection.
    Field(Field),
    /// A field of a joined collection, by lookup alias.
    Joined(&'static str, Field),
    /// The reducer output of the preceding `Group` stage.
    GroupCount,
    /// Number of joined rows per base row, by lookup alias.
    CountOf(&'static str),
}

/// Bindable scalar; ids and timestamps are carried in their canonical text
/// forms, matching how they are stored.
#[derive(Debug, Clone)]
pub enum ScalarValue {
    Text(String),
    Integer(i64),
}

impl ScalarValue {
    pub fn text(value: impl Into<String>) -> Self {
        ScalarValue::Text(value.into())
    }

    pub fn uuid(value: Uuid) -> Self {
        ScalarValue::Text(value.to_string())
    }

    pub fn timestamp(value: DateTime<Utc>) -> Self {
        ScalarValue::Text(value.to_rfc3339())
    }
}

impl From<ScalarValue> for sea_orm::Value {
    fn from(value: ScalarValue) -> Self {
        match value {
            ScalarValue::Text(s) => s.into(),
            ScalarValue::Integer(i) => i.into(),
        }
    }
}
