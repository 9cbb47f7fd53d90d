use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

static FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").expect("valid fence regex")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no JSON object found in reply")]
    NotFound,
    #[error("malformed JSON object: {0}")]
    Malformed(String),
}

/// Pulls the JSON object a model embedded in its reply. Accepts a bare
/// object, a fenced ```json block, or an object surrounded by prose.
pub fn extract_json_object(text: &str) -> Result<Map<String, Value>, ExtractError> {
    let body = FENCE_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|inner| inner.contains('{'))
        .unwrap_or(text);
    let candidate = balanced_object(body)?;
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ExtractError::Malformed("not an object".to_string())),
        Err(err) => Err(ExtractError::Malformed(err.to_string())),
    }
}

/// Slice from the first `{` to its matching `}`; braces inside string
/// literals are ignored.
fn balanced_object(text: &str) -> Result<&str, ExtractError> {
    let start = text.find('{').ok_or(ExtractError::NotFound)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    Err(ExtractError::Malformed("unterminated object".to_string()))
}
