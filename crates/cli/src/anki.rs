use anyhow::{anyhow, bail, Result};
use danki_anki::{AnkiClient, AnkiNote, CommandSpeech, NoteOptions, Speech};
use danki_core::{load_keys, lookup, Dictionary, Enrichment, LlmEnricher, Phrase, Variant};
use danki_llm::LlmClient;
use serde::Serialize;

use crate::config::DankiConfig;
use crate::logging;

/// The parts of an Anki collection the add commands touch.
trait Collection {
    fn is_duplicate(&self, note_type: &str, word: &str) -> danki_core::Result<bool>;
    fn add_note<F: Serialize>(&self, note: &AnkiNote<F>) -> danki_core::Result<u64>;
}

impl Collection for AnkiClient {
    fn is_duplicate(&self, note_type: &str, word: &str) -> danki_core::Result<bool> {
        AnkiClient::is_duplicate(self, note_type, word)
    }

    fn add_note<F: Serialize>(&self, note: &AnkiNote<F>) -> danki_core::Result<u64> {
        AnkiClient::add_note(self, note)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Tally {
    added: usize,
    skipped: usize,
    failed: usize,
}

pub fn decks(cfg: &DankiConfig, phrases: bool) -> Result<()> {
    let note_type = if phrases {
        &cfg.anki.phrase_note_type
    } else {
        &cfg.anki.note_type
    };
    let client = AnkiClient::new(cfg.anki.url.clone())?;
    let decks = client.decks_for(note_type)?;
    if decks.is_empty() {
        println!("No deck can take {note_type} notes yet.");
    }
    for deck in decks {
        println!("{deck}");
    }
    Ok(())
}

pub struct AddRequest {
    pub words: Vec<String>,
    pub deck: Option<String>,
    pub allow_duplicates: bool,
    pub online: bool,
    pub audio: bool,
    pub api_key: Option<String>,
}

pub fn add(cfg: &DankiConfig, request: AddRequest) -> Result<()> {
    let dictionary_path = cfg.lookup_dictionary();
    let dictionary = if dictionary_path.exists() {
        Dictionary::load(&dictionary_path)?
    } else {
        tracing::warn!(path = %dictionary_path.display(), "offline dictionary not found");
        Dictionary::new()
    };
    let enricher = if request.online {
        Some(online_enricher(cfg, request.api_key.as_deref())?)
    } else {
        None
    };

    let client = AnkiClient::new(cfg.anki.url.clone())?;
    let deck = match request.deck.or_else(|| cfg.anki.deck.clone()) {
        Some(deck) => deck,
        None => pick_deck(&client.decks_for(&cfg.anki.note_type)?)?,
    };
    let options = NoteOptions {
        deck,
        note_type: cfg.anki.note_type.clone(),
        allow_duplicates: request.allow_duplicates || cfg.anki.allow_duplicates,
    };
    let speech = speech_backend(cfg, request.audio);

    let tally = add_words(
        &client,
        &dictionary,
        &request.words,
        &options,
        speech.as_ref().map(|backend| backend as &dyn Speech),
        |word| match &enricher {
            Some(enricher) => enricher.enrich(word).map(Some),
            None => Ok(None),
        },
    );
    report(tally, request.words.len(), &options.deck);
    Ok(())
}

pub struct PhraseRequest {
    pub sentences: Vec<String>,
    pub context: Option<String>,
    pub deck: Option<String>,
    pub allow_duplicates: bool,
    pub include_notes: bool,
    pub audio: bool,
    pub api_key: Option<String>,
}

pub fn phrase(cfg: &DankiConfig, request: PhraseRequest) -> Result<()> {
    let enricher = online_enricher(cfg, request.api_key.as_deref())?;
    let client = AnkiClient::new(cfg.anki.url.clone())?;
    let deck = match request.deck {
        Some(deck) => deck,
        None => pick_deck(&client.decks_for(&cfg.anki.phrase_note_type)?)?,
    };
    let options = NoteOptions {
        deck,
        note_type: cfg.anki.phrase_note_type.clone(),
        allow_duplicates: request.allow_duplicates || cfg.anki.allow_duplicates,
    };
    let speech = speech_backend(cfg, request.audio);
    let context = request.context.as_deref();

    let tally = add_phrases(
        &client,
        &request.sentences,
        &options,
        request.include_notes,
        speech.as_ref().map(|backend| backend as &dyn Speech),
        |sentence| enricher.phrase(sentence, context),
    );
    report(tally, request.sentences.len(), &options.deck);
    Ok(())
}

fn report(tally: Tally, requested: usize, deck: &str) {
    println!(
        "Added {} of {requested} notes to {deck} ({} skipped, {} failed)",
        tally.added, tally.skipped, tally.failed
    );
}

fn speech_backend(cfg: &DankiConfig, enabled: bool) -> Option<CommandSpeech> {
    if !enabled {
        return None;
    }
    CommandSpeech::from_argv(&cfg.anki.tts_command)
}

fn online_enricher(cfg: &DankiConfig, api_key: Option<&str>) -> Result<LlmEnricher> {
    let key = match api_key {
        Some(key) => key.to_string(),
        None => load_keys(&cfg.keys_file, &cfg.key_pattern()?)?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no api key available for online lookups"))?,
    };
    let client = LlmClient::new(cfg.provider()?, cfg.model()?, &key, cfg.client_options())?;
    Ok(LlmEnricher::new(client)?)
}

fn pick_deck(decks: &[String]) -> Result<String> {
    match decks {
        [only] => Ok(only.clone()),
        [] => bail!("no suitable deck found; pass --deck"),
        many => bail!("several decks fit ({}); pass --deck", many.join(", ")),
    }
}

/// Every word gets its own outcome; one rejected note never ends the batch.
fn add_words<C, A>(
    collection: &C,
    dictionary: &Dictionary,
    words: &[String],
    options: &NoteOptions,
    speech: Option<&dyn Speech>,
    mut ask: A,
) -> Tally
where
    C: Collection,
    A: FnMut(&str) -> danki_core::Result<Option<Enrichment>>,
{
    let mut tally = Tally::default();
    for word in words {
        let variant = match resolve(dictionary, word, &mut ask) {
            Ok(Some(variant)) => variant,
            Ok(None) => {
                logging::stage("anki", format!("{word}: no entry found, skipped"));
                tally.skipped += 1;
                continue;
            }
            Err(err) => {
                logging::stage("anki", format!("{word}: {err:#}"));
                tally.failed += 1;
                continue;
            }
        };
        if !options.allow_duplicates {
            match collection.is_duplicate(&options.note_type, &variant.word) {
                Ok(false) => {}
                Ok(true) => {
                    logging::stage("anki", format!("{}: already in the collection", variant.word));
                    tally.skipped += 1;
                    continue;
                }
                Err(err) => {
                    logging::stage("anki", format!("{}: {err}", variant.word));
                    tally.failed += 1;
                    continue;
                }
            }
        }
        let mut note = match AnkiNote::from_variant(&variant, options) {
            Ok(note) => note,
            Err(err) => {
                logging::stage("anki", format!("{}: {err}", variant.word));
                tally.failed += 1;
                continue;
            }
        };
        if let Some(speech) = speech {
            note.attach_audio(speech);
        }
        submit(collection, &note, &variant.word, &mut tally);
    }
    tally
}

fn add_phrases<C, A>(
    collection: &C,
    sentences: &[String],
    options: &NoteOptions,
    include_notes: bool,
    speech: Option<&dyn Speech>,
    mut ask: A,
) -> Tally
where
    C: Collection,
    A: FnMut(&str) -> danki_core::Result<Phrase>,
{
    let mut tally = Tally::default();
    for sentence in sentences.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let phrase = match ask(sentence) {
            Ok(phrase) => phrase,
            Err(err) => {
                logging::stage("anki", format!("{sentence}: {err}"));
                tally.failed += 1;
                continue;
            }
        };
        logging::stage("anki", format!("ENG: {} / DEU: {}", phrase.english, phrase.german));
        let mut note = match AnkiNote::from_phrase(&phrase, options, include_notes) {
            Ok(note) => note,
            Err(err) => {
                logging::stage("anki", format!("{sentence}: {err}"));
                tally.failed += 1;
                continue;
            }
        };
        if let Some(speech) = speech {
            note.attach_audio(speech);
        }
        submit(collection, &note, &phrase.german, &mut tally);
    }
    tally
}

fn submit<C: Collection, F: Serialize>(
    collection: &C,
    note: &AnkiNote<F>,
    label: &str,
    tally: &mut Tally,
) {
    match collection.add_note(note) {
        Ok(_) => {
            logging::stage("anki", format!("added: {label}"));
            tally.added += 1;
        }
        Err(err) => {
            logging::stage("anki", format!("{label}: {err}"));
            tally.failed += 1;
        }
    }
}

/// Offline dictionary first; the model is asked only for misses. Among the
/// returned variants the one spelled like the query wins.
fn resolve<F>(dictionary: &Dictionary, word: &str, mut ask: F) -> Result<Option<Variant>>
where
    F: FnMut(&str) -> danki_core::Result<Option<Enrichment>>,
{
    if let Some(variant) = lookup(dictionary, word) {
        return Ok(Some(variant.clone()));
    }
    match ask(word.trim())? {
        None => Ok(None),
        Some(Enrichment::Skipped { reason }) => {
            tracing::info!(word, reason = %reason, "model declined the word");
            Ok(None)
        }
        Some(Enrichment::Accepted { mut variants }) => {
            let exact = variants.iter().position(|v| v.word == word.trim());
            Ok(match exact {
                Some(idx) => Some(variants.swap_remove(idx)),
                None => variants.into_iter().next(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    use danki_core::DankiError;
    use serde_json::Value;

    #[derive(Default)]
    struct FakeCollection {
        existing: Vec<String>,
        rejected: Vec<String>,
        lookups_down: bool,
        attempts: Cell<usize>,
        stored: RefCell<Vec<Value>>,
    }

    impl Collection for FakeCollection {
        fn is_duplicate(&self, _note_type: &str, word: &str) -> danki_core::Result<bool> {
            if self.lookups_down {
                return Err(DankiError::Anki("findNotes: connection refused".into()));
            }
            Ok(self.existing.iter().any(|known| known == word))
        }

        fn add_note<F: Serialize>(&self, note: &AnkiNote<F>) -> danki_core::Result<u64> {
            self.attempts.set(self.attempts.get() + 1);
            let value = serde_json::to_value(note)?;
            let refused = value["fields"]
                .as_object()
                .map(|fields| {
                    fields
                        .values()
                        .any(|field| self.rejected.iter().any(|r| field.as_str() == Some(r)))
                })
                .unwrap_or(false);
            if refused {
                return Err(DankiError::Anki(
                    "addNote: cannot create note because it is a duplicate".into(),
                ));
            }
            self.stored.borrow_mut().push(value);
            Ok(self.attempts.get() as u64)
        }
    }

    struct Echo;

    impl Speech for Echo {
        fn synthesize(&self, text: &str) -> danki_core::Result<Vec<u8>> {
            Ok(text.as_bytes().to_vec())
        }
    }

    fn offline() -> Dictionary {
        let mut dict = Dictionary::new();
        dict.upsert(Variant::new("Haus", "house").with_example("Das Haus ist alt.", "The house is old."));
        dict.upsert(Variant::new("gehen", "to go").with_example("Wir gehen.", "We go."));
        dict
    }

    fn options(allow_duplicates: bool) -> NoteOptions {
        NoteOptions {
            deck: "Deutsch".to_string(),
            note_type: "German Auto".to_string(),
            allow_duplicates,
        }
    }

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn rejected_note_does_not_stop_the_batch() {
        let anki = FakeCollection {
            rejected: vec!["Haus".to_string()],
            ..FakeCollection::default()
        };
        let tally = add_words(
            &anki,
            &offline(),
            &words(&["Haus", "gehen"]),
            &options(true),
            None,
            |_| Ok(None),
        );
        assert_eq!(anki.attempts.get(), 2);
        assert_eq!(
            tally,
            Tally {
                added: 1,
                skipped: 0,
                failed: 1
            }
        );
        assert_eq!(anki.stored.borrow()[0]["fields"]["base_d"], "gehen");
    }

    #[test]
    fn duplicates_are_skipped_and_lookup_errors_counted() {
        let anki = FakeCollection {
            existing: vec!["Haus".to_string()],
            ..FakeCollection::default()
        };
        let tally = add_words(
            &anki,
            &offline(),
            &words(&["Haus", "gehen", "Zxqvy"]),
            &options(false),
            None,
            |_| Ok(None),
        );
        assert_eq!(
            tally,
            Tally {
                added: 1,
                skipped: 2,
                failed: 0
            }
        );

        let down = FakeCollection {
            lookups_down: true,
            ..FakeCollection::default()
        };
        let tally = add_words(
            &down,
            &offline(),
            &words(&["Haus", "gehen"]),
            &options(false),
            None,
            |_| Ok(None),
        );
        assert_eq!(tally.failed, 2);
        assert_eq!(down.attempts.get(), 0);
    }

    #[test]
    fn word_notes_carry_audio_when_speech_is_available() {
        let anki = FakeCollection::default();
        add_words(
            &anki,
            &offline(),
            &words(&["gehen"]),
            &options(true),
            Some(&Echo),
            |_| Ok(None),
        );
        let stored = anki.stored.borrow();
        assert_eq!(stored[0]["audio"][0]["fields"][0], "base_a");
        assert_eq!(stored[0]["audio"][1]["fields"][0], "s1a");
    }

    #[test]
    fn phrases_continue_past_model_errors() {
        let anki = FakeCollection::default();
        let phrase_options = NoteOptions {
            note_type: "Phrase Auto".to_string(),
            ..options(true)
        };
        let tally = add_phrases(
            &anki,
            &words(&["I go to work", "asdf", "  "]),
            &phrase_options,
            true,
            Some(&Echo),
            |sentence| match sentence {
                "asdf" => Err(DankiError::Parse("model rejected the sentence".into())),
                _ => Ok(Phrase {
                    german: "Ich gehe zur Arbeit.".into(),
                    english: "I go to work.".into(),
                    note: None,
                }),
            },
        );
        assert_eq!(
            tally,
            Tally {
                added: 1,
                skipped: 0,
                failed: 1
            }
        );
        let stored = anki.stored.borrow();
        assert_eq!(stored[0]["modelName"], "Phrase Auto");
        assert_eq!(stored[0]["fields"]["Phrase(German)"], "Ich gehe zur Arbeit.");
        assert_eq!(stored[0]["fields"]["note"], "");
        assert_eq!(stored[0]["audio"][0]["fields"][0], "audio_d");
    }

    #[test]
    fn offline_hit_never_asks_the_model() {
        let found = resolve(&offline(), "das Haus", |_| panic!("asked")).unwrap();
        assert_eq!(found.unwrap().translation, "house");
    }

    #[test]
    fn miss_prefers_the_exact_spelling() {
        let found = resolve(&offline(), "essen", |_| {
            Ok(Some(Enrichment::Accepted {
                variants: vec![Variant::new("Essen", "food"), Variant::new("essen", "to eat")],
            }))
        })
        .unwrap();
        assert_eq!(found.unwrap().translation, "to eat");
    }

    #[test]
    fn skipped_and_offline_misses_resolve_to_nothing() {
        let skipped = resolve(&offline(), "Zxqvy", |_| {
            Ok(Some(Enrichment::Skipped {
                reason: "not a word".into(),
            }))
        })
        .unwrap();
        assert!(skipped.is_none());
        assert!(resolve(&offline(), "laufen", |_| Ok(None)).unwrap().is_none());
        assert!(resolve(&offline(), "laufen", |_| Err(DankiError::Llm("down".into()))).is_err());
    }

    #[test]
    fn single_deck_is_chosen_automatically() {
        assert_eq!(pick_deck(&["Deutsch".to_string()]).unwrap(), "Deutsch");
        assert!(pick_deck(&[]).is_err());
        assert!(pick_deck(&["A".to_string(), "B".to_string()]).is_err());
    }
}
