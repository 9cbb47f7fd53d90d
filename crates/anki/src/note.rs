use serde::Serialize;

use danki_core::{DankiError, Phrase, Result, Variant};

use crate::audio::{speak, AudioAttachment, Speech};

pub const DEFAULT_NOTE_TYPE: &str = "German Auto";
pub const PHRASE_NOTE_TYPE: &str = "Phrase Auto";
const DEFAULT_TAG: &str = "auto-added";

/// Field values of one "German Auto" note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NoteFields {
    pub base_d: String,
    pub base_e: String,
    pub artikel_d: String,
    pub plural_d: String,
    pub full_d: String,
    pub audio_text_d: String,
    pub s1: String,
    pub s1e: String,
    pub s2: String,
    pub s2e: String,
    pub s3: String,
    pub s3e: String,
}

impl NoteFields {
    pub fn from_variant(variant: &Variant) -> Self {
        let artikel = variant
            .gender
            .map(|gender| gender.article().to_string())
            .unwrap_or_default();
        let word = variant.word.trim().to_string();
        let full_d = match (&variant.verb_forms, artikel.is_empty()) {
            (Some(forms), _) if !forms.principal_parts().is_empty() => forms.principal_parts(),
            (_, false) => format!("{artikel} {word}"),
            _ => word.clone(),
        };
        let example = |idx: usize| {
            variant
                .example(idx)
                .map(|pair| (pair.sentence.trim().to_string(), pair.translation.trim().to_string()))
                .unwrap_or_default()
        };
        let (s1, s1e) = example(0);
        let (s2, s2e) = example(1);
        let (s3, s3e) = example(2);
        Self {
            base_d: word,
            base_e: variant.translation.trim().to_string(),
            artikel_d: artikel,
            plural_d: String::new(),
            audio_text_d: full_d.clone(),
            full_d,
            s1,
            s1e,
            s2,
            s2e,
            s3,
            s3e,
        }
    }

    /// A card needs at least the word, its translation and one sentence.
    pub fn check_complete(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("base_d", &self.base_d),
            ("base_e", &self.base_e),
            ("s1", &self.s1),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(DankiError::IncompleteNote(format!(
                "required fields missing: {}",
                missing.join(", ")
            )))
        }
    }

    fn spoken_word(&self) -> String {
        if self.artikel_d.is_empty() {
            self.base_d.clone()
        } else {
            format!("{} {}", self.artikel_d, self.base_d)
        }
    }
}

/// Field values of one "Phrase Auto" note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhraseFields {
    #[serde(rename = "Phrase(German)")]
    pub phrase: String,
    #[serde(rename = "Translation")]
    pub translation: String,
    pub audio_text_d: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl PhraseFields {
    /// `include_notes` controls whether the `note` field is sent at all.
    pub fn from_phrase(phrase: &Phrase, include_notes: bool) -> Self {
        let german = phrase.german.trim().to_string();
        Self {
            audio_text_d: german.clone(),
            phrase: german,
            translation: phrase.english.trim().to_string(),
            note: include_notes.then(|| phrase.note.clone().unwrap_or_default()),
        }
    }

    pub fn check_complete(&self) -> Result<()> {
        if self.phrase.is_empty() || self.translation.is_empty() {
            return Err(DankiError::IncompleteNote(
                "phrase needs both a German sentence and a translation".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteOptions {
    pub deck: String,
    pub note_type: String,
    pub allow_duplicates: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnkiNote<F> {
    pub deck_name: String,
    pub model_name: String,
    pub fields: F,
    pub options: AddOptions,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub audio: Vec<AudioAttachment>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOptions {
    pub allow_duplicate: bool,
}

impl<F> AnkiNote<F> {
    fn with_fields(fields: F, options: &NoteOptions) -> Self {
        Self {
            deck_name: options.deck.clone(),
            model_name: options.note_type.clone(),
            fields,
            options: AddOptions {
                allow_duplicate: options.allow_duplicates,
            },
            tags: vec![DEFAULT_TAG.to_string()],
            audio: Vec::new(),
        }
    }
}

impl AnkiNote<NoteFields> {
    pub fn from_variant(variant: &Variant, options: &NoteOptions) -> Result<Self> {
        let fields = NoteFields::from_variant(variant);
        fields.check_complete()?;
        Ok(Self::with_fields(fields, options))
    }

    /// Spoken word into `base_a`, each example sentence into `s1a`..`s3a`.
    pub fn attach_audio(&mut self, speech: &dyn Speech) {
        let clips = [
            (self.fields.spoken_word(), "base_a"),
            (self.fields.s1.clone(), "s1a"),
            (self.fields.s2.clone(), "s2a"),
            (self.fields.s3.clone(), "s3a"),
        ];
        self.audio.extend(
            clips
                .iter()
                .filter_map(|(text, field)| speak(speech, text, field)),
        );
    }
}

impl AnkiNote<PhraseFields> {
    pub fn from_phrase(phrase: &Phrase, options: &NoteOptions, include_notes: bool) -> Result<Self> {
        let fields = PhraseFields::from_phrase(phrase, include_notes);
        fields.check_complete()?;
        Ok(Self::with_fields(fields, options))
    }

    pub fn attach_audio(&mut self, speech: &dyn Speech) {
        let phrase = self.fields.phrase.clone();
        self.audio.extend(speak(speech, &phrase, "audio_d"));
    }
}
