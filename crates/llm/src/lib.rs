use anyhow::{anyhow, Context, Result};
use reqwest::{header::HeaderValue, Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::{sleep, Duration};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const MAX_RETRIES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    Gemini,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "openai",
            LlmProvider::Gemini => "gemini",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "openai" => Some(LlmProvider::OpenAi),
            "gemini" => Some(LlmProvider::Gemini),
            _ => None,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "gpt-4o-mini",
            LlmProvider::Gemini => "gemini-2.0-flash",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub system: Option<String>,
    pub user: String,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl LlmResponse {
    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

/// Per-client request settings. `json_output` asks the provider for a
/// JSON-only reply where the API has a switch for it.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub temperature: Option<f32>,
    pub json_output: bool,
    pub base_url: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            temperature: None,
            json_output: false,
            base_url: None,
        }
    }
}

#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    provider: LlmProvider,
    model: String,
    api_key: String,
    options: ClientOptions,
}

impl LlmClient {
    pub fn new(
        provider: LlmProvider,
        model: impl Into<String>,
        api_key: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self> {
        let api_key = api_key.into();
        validate_api_key(provider, &api_key)?;
        let http = Client::builder()
            .timeout(options.timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            provider,
            model: model.into(),
            api_key,
            options,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn chat(&self, req: &LlmRequest) -> Result<LlmResponse> {
        match self.provider {
            LlmProvider::OpenAi => self.chat_openai(req).await,
            LlmProvider::Gemini => self.chat_gemini(req).await,
        }
    }

    async fn chat_openai(&self, req: &LlmRequest) -> Result<LlmResponse> {
        let base = self.options.base_url.as_deref().unwrap_or(OPENAI_BASE_URL);
        let url = format!("{}/chat/completions", base.trim_end_matches('/'));
        let mut messages = Vec::new();
        if let Some(system) = &req.system {
            messages.push(json!({"role": "system", "content": system }));
        }
        messages.push(json!({"role": "user", "content": req.user }));
        let mut payload = json!({
            "model": self.model,
            "messages": messages,
        });
        if let Some(temperature) = self.options.temperature {
            payload["temperature"] = json!(temperature);
        }
        if self.options.json_output {
            payload["response_format"] = json!({"type": "json_object"});
        }
        let response = send_with_backoff("openai", || {
            self.http.post(&url).bearer_auth(&self.api_key).json(&payload)
        })
        .await?;
        let value = decode_body("openai", response).await?;
        let content = extract_openai_text(&value)
            .ok_or_else(|| anyhow!("missing text in OpenAI response"))?;
        let usage: OpenAiUsage = value
            .get("usage")
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default();
        Ok(LlmResponse {
            content,
            prompt_tokens: usage.prompt_tokens.unwrap_or(0),
            completion_tokens: usage.completion_tokens.unwrap_or(0),
        })
    }

    async fn chat_gemini(&self, req: &LlmRequest) -> Result<LlmResponse> {
        let mut prompt = String::new();
        if let Some(system) = &req.system {
            prompt.push_str("[SYSTEM]\n");
            prompt.push_str(system.trim());
            prompt.push_str("\n\n");
        }
        prompt.push_str(&req.user);
        let mut payload = json!({
            "contents": [
                {
                    "parts": [
                        {
                            "text": prompt
                        }
                    ]
                }
            ]
        });
        let mut generation = serde_json::Map::new();
        if let Some(temperature) = self.options.temperature {
            generation.insert("temperature".into(), json!(temperature));
        }
        if self.options.json_output {
            generation.insert("responseMimeType".into(), json!("application/json"));
        }
        if !generation.is_empty() {
            payload["generationConfig"] = Value::Object(generation);
        }
        let base = self.options.base_url.as_deref().unwrap_or(GEMINI_BASE_URL);
        let url = format!(
            "{}/models/{}:generateContent",
            base.trim_end_matches('/'),
            self.model
        );
        let response = send_with_backoff("gemini", || {
            self.http
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&payload)
        })
        .await?;
        let value = decode_body("gemini", response).await?;
        let response: GeminiResponse =
            serde_json::from_value(value).context("failed to decode gemini response")?;
        let text = extract_gemini_text(response.candidates)
            .ok_or_else(|| anyhow!("missing text in Gemini response"))?;
        let usage = response.usage.unwrap_or_default();
        Ok(LlmResponse {
            content: text,
            prompt_tokens: usage.prompt_tokens.unwrap_or(0),
            completion_tokens: usage.completion_tokens.unwrap_or(0),
        })
    }
}

async fn send_with_backoff<F>(label: &str, build: F) -> Result<Response>
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        // Transport errors carry the request url; keep it out of logs.
        let response = build()
            .send()
            .await
            .map_err(|err| err.without_url())
            .with_context(|| format!("{label} request failed"))?;
        if response.status() != StatusCode::TOO_MANY_REQUESTS {
            return Ok(response);
        }
        if attempt > MAX_RETRIES {
            return Err(anyhow!("{label} rate limited after {MAX_RETRIES} retries"));
        }
        let wait = backoff_delay(attempt, response.headers().get("retry-after"));
        tracing::debug!(provider = label, attempt, ?wait, "rate limited, backing off");
        sleep(wait).await;
    }
}

fn backoff_delay(attempt: usize, retry_after: Option<&HeaderValue>) -> Duration {
    if let Some(value) = retry_after {
        if let Ok(text) = value.to_str() {
            if let Ok(secs) = text.parse::<u64>() {
                return Duration::from_secs(secs.max(1));
            }
        }
    }
    let capped = attempt.min(6) as u32;
    Duration::from_secs(1u64 << capped)
}

async fn decode_body(label: &str, response: Response) -> Result<Value> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(anyhow!(format!(
            "{label} returned error (status {}): {}",
            status, body
        )));
    }
    serde_json::from_str(&body).with_context(|| format!("failed to decode {label} response"))
}

fn validate_api_key(provider: LlmProvider, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{} api key is empty", provider.as_str()));
    }
    match provider {
        LlmProvider::OpenAi if !value.starts_with("sk-") => Err(anyhow!(
            "OpenAI api key must start with 'sk-' (see https://platform.openai.com/)"
        )),
        LlmProvider::Gemini if !value.starts_with("AI") => Err(anyhow!(
            "Gemini api key must be a valid Gemini API key (starts with 'AI...')"
        )),
        _ => Ok(()),
    }
}

fn extract_openai_text(value: &Value) -> Option<String> {
    let choice = value.get("choices")?.as_array()?.first()?;
    if let Some(text) = choice.get("text").and_then(|t| t.as_str()) {
        return Some(text.to_string());
    }
    let content = choice.get("message")?.get("content")?;
    if let Some(text) = content.as_str() {
        return Some(text.to_string());
    }
    content
        .as_array()?
        .iter()
        .find_map(|part| part.get("text").and_then(|t| t.as_str()))
        .map(|text| text.to_string())
}

fn extract_gemini_text(candidates: Option<Vec<GeminiCandidate>>) -> Option<String> {
    candidates?.into_iter().next().and_then(|candidate| {
        candidate
            .content?
            .parts
            .into_iter()
            .find_map(|part| part.text)
    })
}

#[derive(Default, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    #[serde(rename = "usageMetadata")]
    usage: Option<GeminiUsage>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Default, Deserialize)]
struct GeminiUsage {
    #[serde(rename = "promptTokenCount")]
    prompt_tokens: Option<u32>,
    #[serde(rename = "candidatesTokenCount")]
    completion_tokens: Option<u32>,
}
