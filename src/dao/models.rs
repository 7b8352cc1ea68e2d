use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::{
    OffsetDateTime, UtcOffset,
    format_description::{BorrowedFormatItem, well_known::Rfc3339},
    macros::format_description,
};

use crate::dao::storage::{StorageError, StorageResult};

/// Collection holding one presence record per member.
pub const BOCK_COLLECTION: &str = "bock";
/// Collection holding the externally-owned member documents.
pub const USERS_COLLECTION: &str = "users";
/// Field of a member document carrying the ready-to-play timestamp.
pub const READY_TO_PLAY_FIELD: &str = "readyToPlayAt";

/// Raw document body as stored remotely.
pub type Document = Map<String, Value>;

/// Ordered set of fields submitted in a single write.
pub type Fields = IndexMap<String, FieldValue>;

/// Location of a single document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    /// Name of the collection the document lives in.
    pub collection: String,
    /// Identifier of the document inside its collection.
    pub id: String,
}

impl DocumentPath {
    /// Build a path from a collection name and a document id.
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Value written into a document field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Concrete JSON value written as-is.
    Value(Value),
    /// Sentinel replaced by the store's own clock when the write commits.
    ServerTimestamp,
}

impl FieldValue {
    /// Substitute the sentinel with the commit timestamp chosen by the store.
    pub fn resolve(self, commit_time: &str) -> Value {
        match self {
            FieldValue::Value(value) => value,
            FieldValue::ServerTimestamp => Value::String(commit_time.to_owned()),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Value(value)
    }
}

/// How a write combines with the document already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// The written fields become the whole document.
    Replace,
    /// The written fields are merged into the existing top-level fields.
    Merge,
}

/// Compute the document body resulting from a write.
pub fn apply_write(
    existing: Option<Document>,
    fields: Fields,
    mode: WriteMode,
    commit_time: &str,
) -> Document {
    let mut document = match mode {
        WriteMode::Replace => Document::new(),
        WriteMode::Merge => existing.unwrap_or_default(),
    };
    for (name, value) in fields {
        document.insert(name, value.resolve(commit_time));
    }
    document
}

/// State of one document at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    /// Identifier of the observed document.
    pub id: String,
    /// Document body, `None` when the document does not exist.
    pub data: Option<Document>,
}

impl DocumentSnapshot {
    /// Read a single top-level field, if the document and the field exist.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|data| data.get(name))
    }
}

/// Full state of a collection at a point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionSnapshot {
    documents: Vec<(String, Document)>,
}

impl CollectionSnapshot {
    /// Wrap the `(id, body)` pairs of every document in the collection.
    pub fn new(documents: Vec<(String, Document)>) -> Self {
        Self { documents }
    }

    /// Iterate over the `(id, body)` pairs of the snapshot.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Document)> {
        self.documents
            .iter()
            .map(|(id, document)| (id.as_str(), document))
    }

    /// Number of documents in the snapshot.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the collection was empty.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Presence record stored in [`BOCK_COLLECTION`] under the member's uid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    /// Whether the member currently has bock.
    pub active: bool,
    /// Client-clock time of the last write, RFC 3339.
    pub updated_at: String,
}

impl PresenceRecord {
    /// Build a record stamped with the local clock.
    pub fn stamped(active: bool) -> Self {
        Self {
            active,
            updated_at: now_rfc3339(),
        }
    }

    /// Whether a stored body counts as active. Only a strict boolean `true` does.
    pub fn is_active(document: &Document) -> bool {
        matches!(document.get("active"), Some(Value::Bool(true)))
    }

    /// Encode the record as the field set of a full-replace write.
    pub fn into_fields(self, path: &DocumentPath) -> StorageResult<Fields> {
        let encoded = serde_json::to_value(self).map_err(|source| StorageError::Encode {
            path: path.to_string(),
            source,
        })?;
        let Value::Object(map) = encoded else {
            return Ok(Fields::new());
        };
        Ok(map
            .into_iter()
            .map(|(name, value)| (name, FieldValue::Value(value)))
            .collect())
    }
}

/// Extract the ready-to-play timestamp from a member document.
///
/// Absent, `null` and unparseable values all read as "not ready".
pub fn ready_to_play_at(snapshot: &DocumentSnapshot) -> Option<OffsetDateTime> {
    match snapshot.field(READY_TO_PLAY_FIELD)? {
        Value::String(raw) => OffsetDateTime::parse(raw, &Rfc3339).ok(),
        _ => None,
    }
}

/// RFC 3339 in UTC with exactly three fractional digits, so string order is time order.
const UTC_MILLIS: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
);

/// Format `instant` as a fixed-width UTC timestamp.
pub fn format_utc(instant: OffsetDateTime) -> String {
    instant
        .to_offset(UtcOffset::UTC)
        .format(UTC_MILLIS)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

/// Current UTC time formatted as RFC 3339 with millisecond precision.
pub fn now_rfc3339() -> String {
    format_utc(OffsetDateTime::now_utc())
}
