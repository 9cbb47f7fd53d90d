//! Notes for the "German Auto" and "Phrase Auto" note types, spoken audio
//! for them, and a small AnkiConnect client.

mod audio;
mod client;
mod note;

pub use audio::{AudioAttachment, CommandSpeech, Speech};
pub use client::{AnkiClient, ANKI_CONNECT_VERSION, DEFAULT_URL};
pub use note::{
    AddOptions, AnkiNote, NoteFields, NoteOptions, PhraseFields, DEFAULT_NOTE_TYPE,
    PHRASE_NOTE_TYPE,
};
