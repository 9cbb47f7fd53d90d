use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::PathBuf;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{DankiError, Result};
use crate::model::Dictionary;

/// Resumption state of one worker. `processed` also holds skipped words and
/// source words whose variants were stored under a different key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default)]
    pub processed: IndexSet<String>,
    #[serde(default)]
    pub dictionary: Dictionary,
}

impl Checkpoint {
    pub fn is_processed(&self, word: &str) -> bool {
        self.processed.contains(word)
    }

    pub fn mark_processed(&mut self, word: &str) {
        if !self.processed.contains(word) {
            self.processed.insert(word.to_string());
        }
    }
}

/// One `checkpoint_worker_{id}.json` per worker inside a directory.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, worker_id: usize) -> PathBuf {
        self.dir.join(format!("checkpoint_worker_{worker_id}.json"))
    }

    pub fn load(&self, worker_id: usize) -> Result<Checkpoint> {
        let path = self.path(worker_id);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Checkpoint::default()),
            Err(source) => return Err(DankiError::Read { path, source }),
        };
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Replaces the whole checkpoint; a reader sees either the previous or
    /// the new file, never a partial write.
    pub fn save(&self, worker_id: usize, checkpoint: &Checkpoint) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let temp_file = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(temp_file.as_file());
            serde_json::to_writer(&mut writer, checkpoint)?;
            writer.flush()?;
        }
        temp_file
            .persist(self.path(worker_id))
            .map_err(|err| DankiError::Io(err.error))?;
        Ok(())
    }

    pub fn remove(&self, worker_id: usize) -> Result<()> {
        match fs::remove_file(self.path(worker_id)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn exists(&self, worker_id: usize) -> bool {
        self.path(worker_id).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Variant;
    use tempfile::tempdir;

    #[test]
    fn missing_checkpoint_loads_empty() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        assert_eq!(store.load(3).unwrap(), Checkpoint::default());
        assert!(!store.exists(3));
    }

    #[test]
    fn save_overwrites_whole_state() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let mut checkpoint = Checkpoint::default();
        checkpoint.mark_processed("gehen");
        checkpoint.dictionary.upsert(Variant::new("gehen", "to go"));
        store.save(1, &checkpoint).unwrap();

        checkpoint.mark_processed("Zxqvy");
        store.save(1, &checkpoint).unwrap();

        let loaded = store.load(1).unwrap();
        assert_eq!(loaded, checkpoint);
        assert!(loaded.is_processed("Zxqvy"));
        assert_eq!(loaded.dictionary.len(), 1);
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn on_disk_shape_has_processed_and_dictionary() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let mut checkpoint = Checkpoint::default();
        checkpoint.mark_processed("laufen");
        store.save(2, &checkpoint).unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path(2)).unwrap()).unwrap();
        assert_eq!(raw["processed"], serde_json::json!(["laufen"]));
        assert!(raw["dictionary"].is_object());
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        store.save(4, &Checkpoint::default()).unwrap();
        store.remove(4).unwrap();
        store.remove(4).unwrap();
        assert!(!store.exists(4));
    }

    #[test]
    fn corrupt_checkpoint_is_an_error() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        fs::write(store.path(5), "{not json").unwrap();
        assert!(matches!(store.load(5), Err(DankiError::Json(_))));
    }
}
