use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{DankiError, Result};
use crate::model::{Dictionary, DictionaryFile};

/// A key present in more than one worker output. `winner` and `loser` are
/// 1-based positions in the merge order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub key: String,
    pub winner: usize,
    pub loser: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Merged {
    pub dictionary: Dictionary,
    pub per_part: Vec<usize>,
    pub collisions: Vec<Collision>,
}

impl Merged {
    pub fn total(&self) -> usize {
        self.dictionary.len()
    }

    pub fn average_per_part(&self) -> f64 {
        if self.per_part.is_empty() {
            return 0.0;
        }
        self.per_part.iter().sum::<usize>() as f64 / self.per_part.len() as f64
    }
}

/// Unions worker outputs in order; a later part overrides an earlier one on
/// the same key. Every part must exist before anything is merged.
pub fn merge_parts(paths: &[PathBuf]) -> Result<Merged> {
    if let Some(missing) = paths.iter().find(|path| !path.exists()) {
        return Err(DankiError::MissingPart(missing.clone()));
    }
    let mut parts = Vec::with_capacity(paths.len());
    for path in paths {
        parts.push(DictionaryFile::load(path)?.dictionary);
    }
    Ok(merge_dictionaries(parts))
}

pub fn merge_dictionaries(parts: impl IntoIterator<Item = Dictionary>) -> Merged {
    let mut merged = Merged::default();
    let mut owner: HashMap<String, usize> = HashMap::new();
    for (idx, part) in parts.into_iter().enumerate() {
        let part_no = idx + 1;
        merged.per_part.push(part.len());
        for (key, variant) in part {
            if let Some(previous) = owner.insert(key.clone(), part_no) {
                if previous != part_no {
                    merged.collisions.push(Collision {
                        key: key.clone(),
                        winner: part_no,
                        loser: previous,
                    });
                }
            }
            merged.dictionary.insert(key, variant);
        }
    }
    merged
}

pub fn write_merged(path: &Path, merged: &Merged) -> Result<()> {
    DictionaryFile::write(path, &merged.dictionary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Variant;
    use tempfile::tempdir;

    fn dict(entries: &[(&str, &str)]) -> Dictionary {
        let mut dict = Dictionary::new();
        for (word, translation) in entries {
            dict.upsert(Variant::new(*word, *translation));
        }
        dict
    }

    #[test]
    fn later_part_wins_and_collision_is_reported() {
        let merged = merge_dictionaries(vec![
            dict(&[("Essen", "food"), ("gehen", "to go")]),
            dict(&[("Haus", "house")]),
            dict(&[("Essen", "meal")]),
        ]);
        assert_eq!(merged.total(), 3);
        assert_eq!(merged.dictionary.get("Essen").unwrap().translation, "meal");
        assert_eq!(merged.per_part, vec![2, 1, 1]);
        assert_eq!(
            merged.collisions,
            vec![Collision {
                key: "Essen".into(),
                winner: 3,
                loser: 1
            }]
        );
        assert!((merged.average_per_part() - 4.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn missing_part_aborts_merge() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("part_1.json");
        dict(&[("gehen", "to go")]).save(&first).unwrap();
        let second = dir.path().join("part_2.json");
        let err = merge_parts(&[first, second.clone()]).unwrap_err();
        match err {
            DankiError::MissingPart(path) => assert_eq!(path, second),
            other => panic!("unexpected error {other}"),
        }
    }
}
