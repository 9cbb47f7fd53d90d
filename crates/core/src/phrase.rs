use serde_json::{Map, Value};

use crate::error::{DankiError, Result};
use crate::extract::extract_json_object;

/// A sentence the model corrected (or translated into German) with its
/// English rendering and an optional grammar note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phrase {
    pub german: String,
    pub english: String,
    pub note: Option<String>,
}

pub fn build_phrase_prompt(sentence: &str, context: Option<&str>) -> String {
    let context = context
        .map(str::trim)
        .filter(|context| !context.is_empty())
        .unwrap_or("General");
    format!(
        r#"Return ONLY a JSON object with the following fields.
- german: the corrected or original German sentence (translate it if the input is English)
- english: English translation of the sentence
- note: (optional) a short grammar or usage note
- error: (optional) only include if the input is not a usable sentence

Context: {context}
Sentence: {sentence}

Example:
{{"german": "Ich gehe jeden Tag zur Arbeit.", "english": "I go to work every day.", "note": "'zur' is a contraction of 'zu der'."}}"#
    )
}

/// Reads the model's reply for one sentence. An `error` field, or a reply
/// without both sides of the translation, is a failure.
pub fn parse_phrase(reply: &str) -> Result<Phrase> {
    let object = extract_json_object(reply)?;
    match object.get("error") {
        None | Some(Value::Null) => {}
        Some(Value::String(message)) if message.trim().is_empty() => {}
        Some(Value::String(message)) => {
            return Err(DankiError::Parse(format!("model rejected the sentence: {message}")));
        }
        Some(other) => {
            return Err(DankiError::Parse(format!("model rejected the sentence: {other}")));
        }
    }
    let german = text_field(&object, "german");
    let english = text_field(&object, "english");
    match (german, english) {
        (Some(german), Some(english)) => Ok(Phrase {
            german,
            english,
            note: text_field(&object, "note"),
        }),
        _ => Err(DankiError::Parse(format!(
            "reply lacks german or english (keys: {})",
            object.keys().cloned().collect::<Vec<_>>().join(", ")
        ))),
    }
}

fn text_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_defaults_to_general_context() {
        let prompt = build_phrase_prompt("I go to work", None);
        assert!(prompt.contains("Context: General"));
        assert!(prompt.contains("Sentence: I go to work"));
        let prompt = build_phrase_prompt("Bank", Some(" finance "));
        assert!(prompt.contains("Context: finance"));
    }

    #[test]
    fn fenced_reply_with_note() {
        let reply = "```json\n{\"german\": \"Ich gehe zur Arbeit.\", \"english\": \"I go to work.\", \"note\": \"zur = zu der\"}\n```";
        let phrase = parse_phrase(reply).unwrap();
        assert_eq!(phrase.german, "Ich gehe zur Arbeit.");
        assert_eq!(phrase.english, "I go to work.");
        assert_eq!(phrase.note.as_deref(), Some("zur = zu der"));
    }

    #[test]
    fn blank_note_is_none() {
        let phrase = parse_phrase(r#"{"german": "Hallo.", "english": "Hello.", "note": " "}"#).unwrap();
        assert!(phrase.note.is_none());
    }

    #[test]
    fn error_field_and_missing_sides_fail() {
        assert!(matches!(
            parse_phrase(r#"{"error": "not a sentence"}"#),
            Err(DankiError::Parse(message)) if message.contains("not a sentence")
        ));
        assert!(matches!(
            parse_phrase(r#"{"german": "Hallo."}"#),
            Err(DankiError::Parse(_))
        ));
        assert!(matches!(parse_phrase("no json here"), Err(DankiError::Extract(_))));
    }
}
