use std::fs;
use std::process::{Command, Stdio};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;

use danki_core::{DankiError, Result};

/// Text-to-speech backend producing one encoded clip per call.
pub trait Speech {
    fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// An `audio` entry of an AnkiConnect `addNote` call: the clip travels inline
/// as base64 and is stored into `fields`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioAttachment {
    pub url: Option<String>,
    pub filename: String,
    pub data: String,
    pub fields: Vec<String>,
}

impl AudioAttachment {
    pub fn from_bytes(text: &str, bytes: &[u8], field: &str) -> Self {
        let digest = blake3::hash(text.as_bytes()).to_hex();
        Self {
            url: None,
            filename: format!("danki-{}.mp3", &digest.as_str()[..16]),
            data: STANDARD.encode(bytes),
            fields: vec![field.to_string()],
        }
    }
}

/// A failed or empty synthesis only costs the clip, never the note.
pub(crate) fn speak(speech: &dyn Speech, text: &str, field: &str) -> Option<AudioAttachment> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    match speech.synthesize(text) {
        Ok(bytes) if !bytes.is_empty() => Some(AudioAttachment::from_bytes(text, &bytes, field)),
        Ok(_) => {
            tracing::warn!(field, "speech backend produced no audio");
            None
        }
        Err(err) => {
            tracing::warn!(field, error = %err, "speech synthesis failed");
            None
        }
    }
}

/// Runs an external TTS program. `{text}` and `{output}` in the arguments are
/// replaced by the text to speak and a temporary file the program writes to,
/// e.g. `edge-tts --voice de-DE-KatjaNeural --text {text} --write-media {output}`.
#[derive(Debug, Clone)]
pub struct CommandSpeech {
    program: String,
    args: Vec<String>,
}

impl CommandSpeech {
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        if program.trim().is_empty() {
            return None;
        }
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl Speech for CommandSpeech {
    fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let clip = tempfile::Builder::new()
            .prefix("danki-tts-")
            .suffix(".mp3")
            .tempfile()?;
        let output = clip.path().to_string_lossy().into_owned();
        let args = self
            .args
            .iter()
            .map(|arg| arg.replace("{text}", text).replace("{output}", &output));
        let result = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|err| DankiError::Audio(format!("cannot run {}: {err}", self.program)))?;
        if !result.status.success() {
            return Err(DankiError::Audio(format!(
                "{} exited with {}: {}",
                self.program,
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }
        Ok(fs::read(clip.path())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_is_base64_with_stable_name() {
        let first = AudioAttachment::from_bytes("das Haus", b"ID3", "base_a");
        let again = AudioAttachment::from_bytes("das Haus", b"ID3", "base_a");
        assert_eq!(first.data, "SUQz");
        assert_eq!(first.filename, again.filename);
        assert!(first.filename.starts_with("danki-"));
        assert_ne!(
            first.filename,
            AudioAttachment::from_bytes("die Katze", b"ID3", "base_a").filename
        );
    }

    struct Broken;

    impl Speech for Broken {
        fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
            Err(DankiError::Audio("offline".into()))
        }
    }

    #[test]
    fn failed_synthesis_skips_the_clip() {
        assert!(speak(&Broken, "Hallo", "s1a").is_none());
    }

    #[test]
    fn empty_argv_is_no_backend() {
        assert!(CommandSpeech::from_argv(&[]).is_none());
        assert!(CommandSpeech::from_argv(&[" ".to_string()]).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn command_backend_reads_what_the_program_wrote() {
        let argv: Vec<String> = ["sh", "-c", "printf %s \"$1\" > \"$2\"", "sh", "{text}", "{output}"]
            .iter()
            .map(|arg| arg.to_string())
            .collect();
        let speech = CommandSpeech::from_argv(&argv).unwrap();
        assert_eq!(speech.synthesize("Guten Tag").unwrap(), b"Guten Tag");

        let failing = CommandSpeech::from_argv(&["false".to_string()]).unwrap();
        assert!(matches!(failing.synthesize("x"), Err(DankiError::Audio(_))));
    }
}
