use std::fs;
use std::path::Path;

use indexmap::IndexSet;
use regex::Regex;

use danki_llm::LlmProvider;

use crate::error::{DankiError, Result};

pub const OPENAI_KEY_PATTERN: &str = r"sk-proj-[A-Za-z0-9_-]+";
pub const GEMINI_KEY_PATTERN: &str = r"AIza[0-9A-Za-z_-]{35}";

pub fn default_pattern(provider: LlmProvider) -> &'static str {
    match provider {
        LlmProvider::OpenAi => OPENAI_KEY_PATTERN,
        LlmProvider::Gemini => GEMINI_KEY_PATTERN,
    }
}

/// All distinct matches of `pattern` in `text`, first occurrence order.
pub fn scan_keys(text: &str, pattern: &str) -> Result<Vec<String>> {
    let re = Regex::new(pattern)
        .map_err(|err| DankiError::Config(format!("bad key pattern {pattern:?}: {err}")))?;
    let keys: IndexSet<&str> = re.find_iter(text).map(|m| m.as_str()).collect();
    Ok(keys.into_iter().map(str::to_string).collect())
}

/// Reads a key file (plain text, RTF, anything) and fails when it holds no
/// key at all.
pub fn load_keys(path: &Path, pattern: &str) -> Result<Vec<String>> {
    let text = fs::read_to_string(path).map_err(|source| DankiError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let keys = scan_keys(&text, pattern)?;
    if keys.is_empty() {
        return Err(DankiError::NoCredentials(path.to_path_buf()));
    }
    Ok(keys)
}
