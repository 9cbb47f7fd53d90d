use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use danki_core::{default_pattern, DEFAULT_CHECKPOINT_INTERVAL};
use danki_llm::{ClientOptions, LlmProvider};
use serde::Deserialize;

pub const DEFAULT_DELAY_MS: u64 = 2_000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Everything the commands need, read once at startup and passed down.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DankiConfig {
    pub provider: String,
    pub model: Option<String>,
    pub word_list: PathBuf,
    pub start: usize,
    /// Words to take from the list; 0 takes all of them.
    pub count: usize,
    pub workdir: PathBuf,
    pub keys_file: PathBuf,
    pub key_pattern: Option<String>,
    pub output_prefix: String,
    pub delay_ms: u64,
    pub checkpoint_interval: usize,
    pub request_timeout_secs: u64,
    pub anki: AnkiConfig,
}

impl Default for DankiConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            word_list: PathBuf::from("de_50k.txt"),
            start: 0,
            count: 10_000,
            workdir: PathBuf::from("."),
            keys_file: PathBuf::from("apikeys.txt"),
            key_pattern: None,
            output_prefix: "german_english_dict_10k".to_string(),
            delay_ms: DEFAULT_DELAY_MS,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            anki: AnkiConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnkiConfig {
    pub url: String,
    pub deck: Option<String>,
    pub note_type: String,
    pub phrase_note_type: String,
    pub allow_duplicates: bool,
    /// Send the model's grammar note with phrase cards.
    pub include_notes: bool,
    pub dictionary: Option<PathBuf>,
    /// TTS program and arguments; `{text}` and `{output}` are substituted.
    /// Empty means notes go out without audio.
    pub tts_command: Vec<String>,
}

impl Default for AnkiConfig {
    fn default() -> Self {
        Self {
            url: danki_anki::DEFAULT_URL.to_string(),
            deck: None,
            note_type: danki_anki::DEFAULT_NOTE_TYPE.to_string(),
            phrase_note_type: danki_anki::PHRASE_NOTE_TYPE.to_string(),
            allow_duplicates: true,
            include_notes: true,
            dictionary: None,
            tts_command: Vec::new(),
        }
    }
}

impl DankiConfig {
    /// Reads `path` when it exists (defaults otherwise), then applies
    /// `DANKI_*` environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut cfg = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            parse(&raw)?
        } else {
            DankiConfig::default()
        };
        cfg.apply_env(|name| env::var(name).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(provider) = lookup("DANKI_PROVIDER") {
            self.provider = provider;
        }
        if let Some(model) = lookup("DANKI_MODEL") {
            self.model = Some(model);
        }
        if let Some(delay) = lookup("DANKI_DELAY_MS") {
            self.delay_ms = delay
                .trim()
                .parse()
                .map_err(|_| anyhow!("DANKI_DELAY_MS must be a number of milliseconds"))?;
        }
        if let Some(workdir) = lookup("DANKI_WORKDIR") {
            self.workdir = PathBuf::from(workdir);
        }
        if let Some(url) = lookup("DANKI_ANKI_URL") {
            self.anki.url = url;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.provider()?;
        if self.checkpoint_interval == 0 {
            return Err(anyhow!("checkpoint_interval must be at least 1"));
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("request_timeout_secs must be at least 1"));
        }
        Ok(())
    }

    pub fn provider(&self) -> Result<LlmProvider> {
        LlmProvider::from_str(&self.provider)
            .ok_or_else(|| anyhow!(format!("unknown provider {}", self.provider)))
    }

    pub fn model(&self) -> Result<String> {
        Ok(match &self.model {
            Some(model) => model.clone(),
            None => self.provider()?.default_model().to_string(),
        })
    }

    pub fn key_pattern(&self) -> Result<String> {
        Ok(match &self.key_pattern {
            Some(pattern) => pattern.clone(),
            None => default_pattern(self.provider()?).to_string(),
        })
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            timeout: Duration::from_secs(self.request_timeout_secs),
            temperature: Some(DEFAULT_TEMPERATURE),
            json_output: true,
            base_url: None,
        }
    }

    pub fn word_limit(&self) -> Option<usize> {
        (self.count > 0).then_some(self.count)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn part_path(&self, worker_id: usize) -> PathBuf {
        self.workdir
            .join(format!("{}_part_{worker_id}.json", self.output_prefix))
    }

    pub fn log_path(&self, worker_id: usize) -> PathBuf {
        self.workdir
            .join(format!("{}_worker_{worker_id}.log", self.output_prefix))
    }

    pub fn error_log_path(&self, worker_id: usize) -> PathBuf {
        self.workdir
            .join(format!("{}_worker_{worker_id}_errors.log", self.output_prefix))
    }

    pub fn merged_path(&self) -> PathBuf {
        self.workdir.join(format!("{}.json", self.output_prefix))
    }

    /// Dictionary used for lookups: the configured one, or the merged output.
    pub fn lookup_dictionary(&self) -> PathBuf {
        self.anki
            .dictionary
            .clone()
            .unwrap_or_else(|| self.merged_path())
    }
}

fn parse(raw: &str) -> Result<DankiConfig> {
    toml::from_str(raw).map_err(|e| anyhow!("invalid config: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg.delay_ms, 2_000);
        assert_eq!(cfg.checkpoint_interval, 50);
        assert_eq!(cfg.provider().unwrap(), LlmProvider::OpenAi);
        assert_eq!(cfg.model().unwrap(), "gpt-4o-mini");
        assert_eq!(cfg.anki.note_type, "German Auto");
    }

    #[test]
    fn file_values_and_paths() {
        let cfg = parse(
            r#"
provider = "gemini"
workdir = "/data/dict"
output_prefix = "dict"
delay_ms = 500

[anki]
deck = "Deutsch::Wörter"
allow_duplicates = false
include_notes = false
tts_command = ["edge-tts", "--voice", "de-DE-KatjaNeural", "--text", "{text}", "--write-media", "{output}"]
"#,
        )
        .unwrap();
        assert_eq!(cfg.provider().unwrap(), LlmProvider::Gemini);
        assert_eq!(cfg.model().unwrap(), "gemini-2.0-flash");
        assert!(cfg.key_pattern().unwrap().starts_with("AIza"));
        assert_eq!(cfg.part_path(3), PathBuf::from("/data/dict/dict_part_3.json"));
        assert_eq!(cfg.log_path(3), PathBuf::from("/data/dict/dict_worker_3.log"));
        assert_eq!(cfg.merged_path(), PathBuf::from("/data/dict/dict.json"));
        assert_eq!(cfg.lookup_dictionary(), cfg.merged_path());
        assert_eq!(cfg.anki.deck.as_deref(), Some("Deutsch::Wörter"));
        assert!(!cfg.anki.allow_duplicates);
        assert!(!cfg.anki.include_notes);
        assert_eq!(cfg.anki.phrase_note_type, "Phrase Auto");
        assert_eq!(cfg.anki.tts_command[0], "edge-tts");
        assert_eq!(cfg.delay(), Duration::from_millis(500));
    }

    #[test]
    fn env_overrides_file() {
        let mut cfg = DankiConfig::default();
        let vars: HashMap<&str, &str> = [("DANKI_DELAY_MS", "0"), ("DANKI_MODEL", "gpt-4.1-mini")]
            .into_iter()
            .collect();
        cfg.apply_env(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(cfg.delay_ms, 0);
        assert_eq!(cfg.model().unwrap(), "gpt-4.1-mini");

        let bad: HashMap<&str, &str> = [("DANKI_DELAY_MS", "soon")].into_iter().collect();
        assert!(cfg
            .apply_env(|name| bad.get(name).map(|v| v.to_string()))
            .is_err());
    }

    #[test]
    fn zero_count_reads_the_whole_list() {
        assert_eq!(parse("").unwrap().word_limit(), Some(10_000));
        assert_eq!(parse("count = 500").unwrap().word_limit(), Some(500));
        assert_eq!(parse("count = 0").unwrap().word_limit(), None);
    }

    #[test]
    fn validation_rejects_nonsense() {
        let mut cfg = DankiConfig::default();
        cfg.provider = "deepseek".into();
        assert!(cfg.validate().is_err());
        let mut cfg = DankiConfig::default();
        cfg.checkpoint_interval = 0;
        assert!(cfg.validate().is_err());
        assert!(parse("delay_ms = \"fast\"").is_err());
    }
}
