//! Loads a product-review corpus into [`Document`]s.
//!
//! Accepted layouts:
//! - `.json`: an array of objects
//! - `.jsonl`: one object per line
//!
//! The text comes from the first of `page_content`, `text` or `review`; every
//! other field is kept as metadata (e.g. `product_title`, `rating`).

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use super::document::Document;
use crate::core::errors::RagError;

const TEXT_KEYS: [&str; 3] = ["page_content", "text", "review"];

pub fn load_documents(path: &Path) -> Result<Vec<Document>, RagError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| RagError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

    let is_jsonl = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("jsonl"))
        .unwrap_or(false);

    let records = if is_jsonl {
        parse_jsonl(&contents, path)?
    } else {
        match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Array(items)) => items,
            Ok(_) => {
                return Err(RagError::Config(format!(
                    "{} must contain a JSON array of records",
                    path.display()
                )))
            }
            Err(e) => {
                return Err(RagError::Config(format!("Failed to parse {}: {}", path.display(), e)))
            }
        }
    };

    let total = records.len();
    let documents: Vec<Document> = records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| match record_to_document(record) {
            Some(doc) => Some(doc),
            None => {
                tracing::warn!("Skipping record {} in {}: no text field", index, path.display());
                None
            }
        })
        .collect();

    tracing::info!("Loaded {} of {} records from {}", documents.len(), total, path.display());
    Ok(documents)
}

fn parse_jsonl(contents: &str, path: &Path) -> Result<Vec<Value>, RagError> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            serde_json::from_str::<Value>(line).map_err(|e| {
                RagError::Config(format!("{}:{}: {}", path.display(), number + 1, e))
            })
        })
        .collect()
}

fn record_to_document(record: Value) -> Option<Document> {
    let Value::Object(mut fields) = record else {
        return None;
    };

    let text = TEXT_KEYS.iter().find_map(|key| {
        fields
            .get(*key)
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(|s| (*key, s))
    });
    let (key, text) = text?;
    fields.remove(key);

    let metadata = match fields.remove("metadata") {
        Some(Value::Object(nested)) => {
            let mut merged: Map<String, Value> = nested;
            merged.extend(fields);
            merged
        }
        Some(other) => {
            fields.insert("metadata".to_string(), other);
            fields
        }
        None => fields,
    };

    Some(Document {
        page_content: text,
        metadata,
    })
}
