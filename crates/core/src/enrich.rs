use serde_json::Value;
use tokio::runtime::Runtime;

use danki_llm::{LlmClient, LlmRequest};

use crate::error::{DankiError, Result};
use crate::extract::extract_json_object;
use crate::model::{Enrichment, Variant};
use crate::phrase::{build_phrase_prompt, parse_phrase, Phrase};

const SYSTEM_PROMPT: &str =
    "You are a German language expert. Always respond with valid JSON only.";

pub fn build_prompt(word: &str) -> String {
    format!(
        r#"You are a German language expert. Analyze the word: '{word}'

FIRST: decide whether this is a valid German word.
- Proper name (person, place, brand): return {{"skip": true, "reason": "proper name"}}
- English or other foreign word not used in German: return {{"skip": true, "reason": "foreign word"}}
- Nonsense: return {{"skip": true, "reason": "not a word"}}

SECOND: if the word is a conjugated verb form (e.g. 'sagte', 'macht'), analyze its infinitive instead and put the infinitive in the "word" field.

If the meaning changes with capitalization (e.g. 'essen' the verb and 'Essen' the noun), return one variant per capitalization.

Reply with {{"skip": false, "variants": [...]}} where each variant has:
word, translation, gender ("masculine", "feminine", "neuter" or null; nouns only),
verb_forms (object with present_ich, present_du, present_er, past_ich, past_du, past_er, perfect; null if not a verb),
example1, example1_translation, example2, example2_translation, example3, example3_translation (later examples may be empty strings).

Return only valid JSON, no other text."#
    )
}

/// Turns the raw reply text into an [`Enrichment`]. A reply without a
/// usable object is an error, never a skip.
pub fn parse_enrichment(word: &str, reply: &str) -> Result<Enrichment> {
    let object = extract_json_object(reply)?;
    let skip = match object.get("skip") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(other) => {
            return Err(DankiError::Parse(format!("skip flag is not a boolean: {other}")));
        }
    };
    if skip {
        let reason = object
            .get("reason")
            .and_then(Value::as_str)
            .filter(|reason| !reason.trim().is_empty())
            .unwrap_or("unknown")
            .to_string();
        return Ok(Enrichment::Skipped { reason });
    }
    let variants = match object.get("variants") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| parse_variant(word, item))
            .collect::<Result<Vec<_>>>()?,
        Some(other) => {
            return Err(DankiError::Parse(format!("variants is not a list: {other}")));
        }
    };
    Ok(Enrichment::Accepted { variants })
}

fn parse_variant(word: &str, item: &Value) -> Result<Variant> {
    if !item.is_object() {
        return Err(DankiError::Parse(format!("variant is not an object: {item}")));
    }
    let mut variant: Variant = serde_json::from_value(item.clone())?;
    if variant.word.is_empty() {
        variant.word = word.to_string();
    }
    Ok(variant)
}

/// Enrichment backed by a remote model. Calls are driven to completion on a
/// private runtime so the worker loop stays synchronous.
pub struct LlmEnricher {
    client: LlmClient,
    runtime: Runtime,
}

impl LlmEnricher {
    pub fn new(client: LlmClient) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self { client, runtime })
    }

    pub fn enrich(&self, word: &str) -> Result<Enrichment> {
        let reply = self.ask(word, build_prompt(word))?;
        parse_enrichment(word, &reply)
    }

    /// Corrects or translates one sentence for a phrase card.
    pub fn phrase(&self, sentence: &str, context: Option<&str>) -> Result<Phrase> {
        let reply = self.ask(sentence, build_phrase_prompt(sentence, context))?;
        parse_phrase(&reply)
    }

    fn ask(&self, subject: &str, user: String) -> Result<String> {
        let request = LlmRequest {
            system: Some(SYSTEM_PROMPT.to_string()),
            user,
        };
        let response = self.runtime.block_on(self.client.chat(&request))?;
        tracing::debug!(
            subject,
            tokens = response.total_tokens(),
            model = self.client.model(),
            "model replied"
        );
        Ok(response.content)
    }
}
