use bloomgen_core::{BloomError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").expect("valid fence regex")
});

/// Pull every top-level JSON value out of a model response.
///
/// Tries, in order: the whole text, the fenced code blocks, then a scan
/// for top-level `[...]` and `{...}` values in the prose. The first step
/// that yields anything wins.
pub fn extract_json(text: &str) -> Result<Vec<Value>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(BloomError::Generation("the model returned an empty response".to_string()));
    }

    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(vec![value]);
    }

    let fenced: Vec<Value> = FENCED_BLOCK
        .captures_iter(trimmed)
        .filter_map(|captures| captures.get(1))
        .flat_map(|body| match serde_json::from_str(body.as_str().trim()) {
            Ok(value) => vec![value],
            Err(_) => scan_values(body.as_str()),
        })
        .collect();
    if !fenced.is_empty() {
        return Ok(fenced);
    }

    let scanned = scan_values(trimmed);
    if !scanned.is_empty() {
        return Ok(scanned);
    }

    let preview: String = trimmed.chars().take(120).collect();
    Err(BloomError::Generation(format!(
        "no JSON document found in model response (starts with {preview:?})"
    )))
}

/// Documents contained in a response: each object is one, each array is many
pub fn extract_documents(text: &str) -> Result<Vec<Value>> {
    let mut documents = Vec::new();
    for value in extract_json(text)? {
        match value {
            Value::Array(items) => documents.extend(items),
            object @ Value::Object(_) => documents.push(object),
            other => {
                return Err(BloomError::Generation(format!(
                    "expected a JSON object or array of perspectives, got {}",
                    json_kind(&other)
                )))
            }
        }
    }
    Ok(documents)
}

/// Top-level objects and arrays embedded in `text`, in order.
///
/// A bracketed run that is not valid JSON is skipped as a whole, so the
/// inner objects of a broken document are never picked up. Scanning stops
/// at an opener that is never closed.
fn scan_values(text: &str) -> Vec<Value> {
    let mut values = Vec::new();
    let mut pos = 0;

    while let Some(offset) = text[pos..].find(|c: char| c == '{' || c == '[') {
        let start = pos + offset;
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) => {
                values.push(value);
                pos = start + stream.byte_offset();
            }
            _ => match closing_offset(&text[start..]) {
                Some(len) => pos = start + len,
                None => break,
            },
        }
    }
    values
}

/// Byte length of the bracketed run opening `text`, string literals respected
fn closing_offset(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(idx + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_array() {
        let docs = extract_documents(r#"[{"name": "A"}, {"name": "B"}]"#).unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn test_single_object_is_one_document() {
        let docs = extract_documents(r#"{"name": "Solo"}"#).unwrap();
        assert_eq!(docs, vec![json!({"name": "Solo"})]);
    }

    #[test]
    fn test_fenced_block_with_prose() {
        let text = "Here are your perspectives:\n```json\n[{\"name\": \"Sales\"}]\n```\nEnjoy!";
        let docs = extract_documents(text).unwrap();
        assert_eq!(docs[0]["name"], "Sales");
    }

    #[test]
    fn test_unlabelled_fence() {
        let text = "```\n{\"name\": \"Ops\"}\n```";
        assert_eq!(extract_json(text).unwrap()[0]["name"], "Ops");
    }

    #[test]
    fn test_array_inside_prose() {
        let text = "Sure! [{\"name\": \"Risk\", \"templates\": [{\"text\": \"x\"}]}] Let me know.";
        let docs = extract_documents(text).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["name"], "Risk");
    }

    #[test]
    fn test_bracketed_prose_is_skipped() {
        let text = "Note [draft] follows: {\"name\": \"Audit\"}";
        assert_eq!(extract_json(text).unwrap()[0]["name"], "Audit");
    }

    #[test]
    fn test_every_fenced_block_is_kept() {
        let text = "First:\n```json\n{\"name\":\"A\"}\n```\nSecond:\n```json\n{\"name\":\"B\"}\n```";
        let docs = extract_documents(text).unwrap();
        assert_eq!(docs, vec![json!({"name": "A"}), json!({"name": "B"})]);
    }

    #[test]
    fn test_consecutive_bare_objects() {
        let docs = extract_documents("{\"name\":\"A\"}\n{\"name\":\"B\"}").unwrap();
        assert_eq!(docs, vec![json!({"name": "A"}), json!({"name": "B"})]);
    }

    #[test]
    fn test_objects_separated_by_prose() {
        let text = "Perspective one: {\"name\": \"A\"} and two: {\"name\": \"B\", \"note\": \"} {\"}";
        let names: Vec<_> = extract_documents(text)
            .unwrap()
            .into_iter()
            .map(|doc| doc["name"].clone())
            .collect();
        assert_eq!(names, vec![json!("A"), json!("B")]);
    }

    #[test]
    fn test_broken_document_does_not_leak_inner_objects() {
        let text = "{\"name\": \"A\", \"labels\": {\"X\": []}, oops} then {\"name\": \"B\"}";
        let docs = extract_documents(text).unwrap();
        assert_eq!(docs, vec![json!({"name": "B"})]);
    }

    #[test]
    fn test_unparseable_text_is_generation_error() {
        let err = extract_documents("I cannot help with that.").unwrap_err();
        assert!(matches!(err, BloomError::Generation(_)));
        assert!(matches!(extract_documents("   "), Err(BloomError::Generation(_))));
    }

    #[test]
    fn test_scalar_is_generation_error() {
        assert!(matches!(extract_documents("42"), Err(BloomError::Generation(_))));
    }
}
