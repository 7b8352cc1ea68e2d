use serde::Deserialize;
use serde_json::Value;

use crate::dao::models::{Document, DocumentPath};

/// Separator between the collection name and the document id inside a CouchDB `_id`.
pub const ID_SEPARATOR: char = ':';
/// Upper bound suffix used to scan every id sharing a prefix.
pub const END_SUFFIX: &str = "\u{fff0}";

/// CouchDB `_id` of the document at `path`.
pub fn doc_id(path: &DocumentPath) -> String {
    format!("{}{}{}", path.collection, ID_SEPARATOR, path.id)
}

/// Prefix shared by the `_id` of every document of `collection`.
pub fn collection_prefix(collection: &str) -> String {
    format!("{collection}{ID_SEPARATOR}")
}

/// Render a `last_seq` value as a `since` query parameter.
///
/// CouchDB 1.x reports numeric sequences, later releases opaque strings.
pub fn seq_param(seq: &Value) -> String {
    match seq {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

/// Document body split from the CouchDB bookkeeping fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredDocument {
    pub rev: Option<String>,
    pub body: Document,
}

impl StoredDocument {
    /// Separate `_rev` and drop every other reserved `_` field.
    pub fn from_raw(mut raw: Document) -> Self {
        let rev = match raw.remove("_rev") {
            Some(Value::String(rev)) => Some(rev),
            _ => None,
        };
        raw.retain(|name, _| !name.starts_with('_'));
        Self { rev, body: raw }
    }

    /// Rebuild the payload of a PUT request.
    pub fn into_raw(self, doc_id: &str) -> Document {
        let mut raw = Document::new();
        raw.insert("_id".into(), Value::String(doc_id.to_owned()));
        if let Some(rev) = self.rev {
            raw.insert("_rev".into(), Value::String(rev));
        }
        raw.extend(self.body);
        raw
    }
}

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    pub id: String,
    #[serde(default)]
    pub doc: Option<Document>,
}

#[derive(Debug, Deserialize)]
pub struct ChangesResponse {
    #[serde(default)]
    pub results: Vec<ChangeRow>,
    pub last_seq: Value,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRow {
    pub id: String,
}
