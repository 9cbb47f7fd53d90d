use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{DankiError, Result};

pub const MAX_EXAMPLES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Masculine,
    Feminine,
    Neuter,
}

impl Gender {
    /// Lenient parse of what a model writes into the `gender` field.
    /// Anything that is not one of the three genders means "no gender".
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "masculine" | "m" | "der" => Some(Gender::Masculine),
            "feminine" | "f" | "die" => Some(Gender::Feminine),
            "neuter" | "n" | "das" => Some(Gender::Neuter),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Masculine => "masculine",
            Gender::Feminine => "feminine",
            Gender::Neuter => "neuter",
        }
    }

    pub fn article(&self) -> &'static str {
        match self {
            Gender::Masculine => "der",
            Gender::Feminine => "die",
            Gender::Neuter => "das",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerbForms {
    #[serde(default, deserialize_with = "lenient_string")]
    pub present_ich: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub present_du: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub present_er: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub past_ich: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub past_du: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub past_er: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub perfect: String,
}

impl VerbForms {
    /// "läuft, lief, ist gelaufen" style summary, empty parts dropped.
    pub fn principal_parts(&self) -> String {
        [&self.present_er, &self.past_er, &self.perfect]
            .iter()
            .map(|form| form.trim())
            .filter(|form| !form.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExamplePair {
    pub sentence: String,
    pub translation: String,
}

impl ExamplePair {
    pub fn is_empty(&self) -> bool {
        self.sentence.trim().is_empty() && self.translation.trim().is_empty()
    }
}

/// One capitalization-distinguished sense of a word.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawVariant", into = "RawVariant")]
pub struct Variant {
    pub word: String,
    pub translation: String,
    pub gender: Option<Gender>,
    pub verb_forms: Option<VerbForms>,
    pub examples: Vec<ExamplePair>,
}

impl Variant {
    pub fn new(word: impl Into<String>, translation: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            translation: translation.into(),
            ..Self::default()
        }
    }

    pub fn with_example(mut self, sentence: &str, translation: &str) -> Self {
        if self.examples.len() < MAX_EXAMPLES {
            self.examples.push(ExamplePair {
                sentence: sentence.to_string(),
                translation: translation.to_string(),
            });
        }
        self
    }

    pub fn example(&self, idx: usize) -> Option<&ExamplePair> {
        self.examples.get(idx)
    }
}

/// On-disk layout of a variant: flat `exampleN` / `exampleN_translation`
/// fields as the model returns them.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RawVariant {
    #[serde(default)]
    word: String,
    #[serde(default, deserialize_with = "lenient_string")]
    translation: String,
    #[serde(default, deserialize_with = "lenient_optional_string")]
    gender: Option<String>,
    #[serde(default, deserialize_with = "lenient_verb_forms")]
    verb_forms: Option<VerbForms>,
    #[serde(default, deserialize_with = "lenient_string")]
    example1: String,
    #[serde(default, deserialize_with = "lenient_string")]
    example1_translation: String,
    #[serde(default, deserialize_with = "lenient_string")]
    example2: String,
    #[serde(default, deserialize_with = "lenient_string")]
    example2_translation: String,
    #[serde(default, deserialize_with = "lenient_string")]
    example3: String,
    #[serde(default, deserialize_with = "lenient_string")]
    example3_translation: String,
}

impl From<RawVariant> for Variant {
    fn from(raw: RawVariant) -> Self {
        // Slots keep their position; only trailing empty pairs are dropped.
        let mut examples: Vec<ExamplePair> = [
            (raw.example1, raw.example1_translation),
            (raw.example2, raw.example2_translation),
            (raw.example3, raw.example3_translation),
        ]
        .into_iter()
        .map(|(sentence, translation)| ExamplePair {
            sentence,
            translation,
        })
        .collect();
        while examples.last().is_some_and(ExamplePair::is_empty) {
            examples.pop();
        }
        Self {
            word: raw.word.trim().to_string(),
            translation: raw.translation,
            gender: raw.gender.as_deref().and_then(Gender::parse),
            verb_forms: raw.verb_forms,
            examples,
        }
    }
}

impl From<Variant> for RawVariant {
    fn from(variant: Variant) -> Self {
        let mut examples = variant.examples.into_iter();
        let mut next = || examples.next().unwrap_or_default();
        let (e1, e2, e3) = (next(), next(), next());
        Self {
            word: variant.word,
            translation: variant.translation,
            gender: variant.gender.map(|g| g.as_str().to_string()),
            verb_forms: variant.verb_forms,
            example1: e1.sentence,
            example1_translation: e1.translation,
            example2: e2.sentence,
            example2_translation: e2.translation,
            example3: e3.sentence,
            example3_translation: e3.translation,
        }
    }
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(lenient_optional_string(deserializer)?.unwrap_or_default())
}

fn lenient_optional_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde_json::Value;
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| item.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        ),
        other => Some(other.to_string()),
    })
}

fn lenient_verb_forms<'de, D>(deserializer: D) -> std::result::Result<Option<VerbForms>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde_json::Value;
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Object(_) => Ok(serde_json::from_value(value).ok()),
        _ => Ok(None),
    }
}

/// Outcome of asking the model about one source word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enrichment {
    Skipped { reason: String },
    Accepted { variants: Vec<Variant> },
}

/// Surface form to variant, in insertion order. A later upsert for the
/// same key replaces the earlier entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dictionary {
    entries: IndexMap<String, Variant>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the replaced entry when the key was already present.
    pub fn upsert(&mut self, variant: Variant) -> Option<Variant> {
        self.entries.insert(variant.word.clone(), variant)
    }

    /// Inserts under an explicit key, which may differ from `variant.word`
    /// in files edited by hand.
    pub fn insert(&mut self, key: String, variant: Variant) -> Option<Variant> {
        self.entries.insert(key, variant)
    }

    pub fn get(&self, word: &str) -> Option<&Variant> {
        self.entries.get(word)
    }

    pub fn contains(&self, word: &str) -> bool {
        self.entries.contains_key(word)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Variant)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(DictionaryFile::load(path)?.dictionary)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        DictionaryFile::write(path, self)
    }
}

impl IntoIterator for Dictionary {
    type Item = (String, Variant);
    type IntoIter = indexmap::map::IntoIter<String, Variant>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// `{ "dictionary": { word: Variant, ... } }`, the shape shared by worker
/// outputs and the merged file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DictionaryFile {
    #[serde(default)]
    pub dictionary: Dictionary,
}

impl DictionaryFile {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| DankiError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn write(path: &Path, dictionary: &Dictionary) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        #[derive(Serialize)]
        struct Borrowed<'a> {
            dictionary: &'a Dictionary,
        }
        serde_json::to_writer_pretty(&mut writer, &Borrowed { dictionary })?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn variant_reads_flat_example_fields() {
        let variant: Variant = serde_json::from_value(json!({
            "word": "essen",
            "translation": "to eat",
            "gender": null,
            "verb_forms": {"present_ich": "esse", "present_er": "isst", "past_er": "aß", "perfect": "hat gegessen"},
            "example1": "Ich esse gern Pizza.",
            "example1_translation": "I like to eat pizza.",
            "example2": "",
            "example2_translation": ""
        }))
        .unwrap();
        assert_eq!(variant.word, "essen");
        assert_eq!(variant.gender, None);
        assert_eq!(variant.examples.len(), 1);
        assert_eq!(
            variant.verb_forms.as_ref().unwrap().principal_parts(),
            "isst, aß, hat gegessen"
        );
    }

    #[test]
    fn variant_tolerates_loose_model_output() {
        let variant: Variant = serde_json::from_value(json!({
            "word": " Essen ",
            "translation": ["food", "meal"],
            "gender": "None",
            "verb_forms": "n/a"
        }))
        .unwrap();
        assert_eq!(variant.word, "Essen");
        assert_eq!(variant.translation, "food, meal");
        assert_eq!(variant.gender, None);
        assert!(variant.verb_forms.is_none());
        assert!(variant.examples.is_empty());
    }

    #[test]
    fn variant_writes_original_field_names() {
        let mut variant = Variant::new("Essen", "food")
            .with_example("Das Essen ist lecker.", "The food is delicious.");
        variant.gender = Some(Gender::Neuter);
        let value = serde_json::to_value(&variant).unwrap();
        assert_eq!(value["gender"], "neuter");
        assert_eq!(value["example1"], "Das Essen ist lecker.");
        assert_eq!(value["example3_translation"], "");
        assert!(value["verb_forms"].is_null());
        let back: Variant = serde_json::from_value(value).unwrap();
        assert_eq!(back, variant);
    }

    #[test]
    fn example_slots_survive_a_save_load_cycle() {
        let variant: Variant = serde_json::from_value(json!({
            "word": "Haus",
            "translation": "house",
            "example1": "",
            "example1_translation": "",
            "example2": "Das Haus ist alt.",
            "example2_translation": "The house is old."
        }))
        .unwrap();
        assert_eq!(variant.examples.len(), 2);
        assert!(variant.examples[0].is_empty());
        let value = serde_json::to_value(&variant).unwrap();
        assert_eq!(value["example1"], "");
        assert_eq!(value["example2"], "Das Haus ist alt.");
        assert_eq!(value["example3"], "");
        let back: Variant = serde_json::from_value(value).unwrap();
        assert_eq!(back, variant);
    }

    #[test]
    fn dictionary_upsert_is_last_writer_wins() {
        let mut dict = Dictionary::new();
        assert!(dict.upsert(Variant::new("Essen", "food")).is_none());
        let previous = dict.upsert(Variant::new("Essen", "meal")).unwrap();
        assert_eq!(previous.translation, "food");
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.get("Essen").unwrap().translation, "meal");
        assert!(dict.get("essen").is_none());
    }

    #[test]
    fn dictionary_file_keeps_wrapper_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/part.json");
        let mut dict = Dictionary::new();
        dict.upsert(Variant::new("gehen", "to go"));
        dict.upsert(Variant::new("Haus", "house"));
        dict.save(&path).unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["dictionary"]["gehen"]["translation"], "to go");
        let loaded = Dictionary::load(&path).unwrap();
        assert_eq!(loaded.keys().collect::<Vec<_>>(), vec!["gehen", "Haus"]);
    }
}
