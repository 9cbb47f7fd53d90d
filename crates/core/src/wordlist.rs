use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{DankiError, Result};

/// Reads the first whitespace-delimited token of each line of a frequency
/// list. The first `start` lines are skipped and reading stops once `count`
/// words were collected. Lines without a token are ignored.
pub fn read_words(path: &Path, start: usize, count: Option<usize>) -> Result<Vec<String>> {
    let file = File::open(path).map_err(|source| DankiError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    collect_words(BufReader::new(file), start, count)
}

pub fn collect_words<R: BufRead>(
    reader: R,
    start: usize,
    count: Option<usize>,
) -> Result<Vec<String>> {
    let mut words = Vec::new();
    if count == Some(0) {
        return Ok(words);
    }
    for line in reader.lines().skip(start) {
        let line = line?;
        let Some(word) = line.split_whitespace().next() else {
            continue;
        };
        words.push(word.to_string());
        if count.is_some_and(|limit| words.len() >= limit) {
            break;
        }
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const FREQ: &str = "ich 1200\nsein 900\n\n   \ngehen 400\nHaus 380 extra\nlaufen\n";

    #[test]
    fn takes_first_token_and_skips_blank_lines() {
        let words = collect_words(Cursor::new(FREQ), 0, None).unwrap();
        assert_eq!(words, vec!["ich", "sein", "gehen", "Haus", "laufen"]);
    }

    #[test]
    fn start_counts_lines_and_count_limits_words() {
        let words = collect_words(Cursor::new(FREQ), 1, Some(2)).unwrap();
        assert_eq!(words, vec!["sein", "gehen"]);
        let past_end = collect_words(Cursor::new(FREQ), 100, Some(5)).unwrap();
        assert!(past_end.is_empty());
        assert!(collect_words(Cursor::new(FREQ), 0, Some(0)).unwrap().is_empty());
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = read_words(Path::new("/nonexistent/de_50k.txt"), 0, None).unwrap_err();
        assert!(err.to_string().contains("de_50k.txt"));
    }
}
