//! Merging chunk results
//!
//! Backend payloads are opaque JSON. Text is pulled from the fields the
//! known backends use and concatenated in chunk index order, regardless of
//! the order in which chunks completed.

use serde_json::{json, Value};

use super::chunks::Chunk;

const TEXT_FIELDS: [&str; 3] = ["content", "text", "X-TIKA:content"];

/// Best-effort textual content of a backend payload
pub fn extract_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        // Tika's recursive metadata answers with one object per embedded doc
        Value::Array(items) => items
            .iter()
            .map(extract_text)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(map) => {
            for field in TEXT_FIELDS {
                if let Some(Value::String(s)) = map.get(field) {
                    return s.clone();
                }
            }

            if let Some(Value::Array(pages)) = map.get("pagesText") {
                return pages
                    .iter()
                    .filter_map(|p| p.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("\n");
            }

            // Unstructured groups elements by category
            if let Some(Value::Object(groups)) = map.get("elements") {
                return groups
                    .values()
                    .filter_map(Value::as_array)
                    .flatten()
                    .filter_map(|e| e.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("\n");
            }

            String::new()
        }
        _ => String::new(),
    }
}

/// Merge completed chunks into one payload.
///
/// `parts` may arrive in any order; they are sorted by chunk index first.
pub fn merge_chunks(mut parts: Vec<(Chunk, Value)>) -> Value {
    parts.sort_by_key(|(chunk, _)| chunk.index);

    let content: String = parts.iter().map(|(_, value)| extract_text(value)).collect();
    let chunks: Vec<Value> = parts
        .into_iter()
        .map(|(chunk, data)| {
            json!({
                "index": chunk.index,
                "pages": chunk.pages,
                "data": data,
            })
        })
        .collect();

    json!({
        "content": content,
        "chunkCount": chunks.len(),
        "chunks": chunks,
    })
}
