use crate::model::{Dictionary, Variant};

const ARTICLES: [&str; 3] = ["der ", "die ", "das "];

/// Finds `query` in an offline dictionary: exact surface form first, then
/// lowercase, then with a capitalized first letter. A leading article is
/// ignored ("das Haus" finds "Haus").
pub fn lookup<'a>(dict: &'a Dictionary, query: &str) -> Option<&'a Variant> {
    let trimmed = query.trim();
    let word = ARTICLES
        .iter()
        .find_map(|article| {
            trimmed
                .get(..article.len())
                .filter(|prefix| prefix.eq_ignore_ascii_case(article))
                .map(|_| trimmed[article.len()..].trim())
        })
        .unwrap_or(trimmed);
    if word.is_empty() {
        return None;
    }
    dict.get(word)
        .or_else(|| dict.get(&word.to_lowercase()))
        .or_else(|| dict.get(&capitalize(word)))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
