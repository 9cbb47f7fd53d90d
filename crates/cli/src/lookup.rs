use std::path::Path;

use anyhow::{Context, Result};
use danki_core::{lookup, Dictionary, Variant};

pub fn run(dictionary: &Path, word: &str) -> Result<()> {
    let dict = Dictionary::load(dictionary)
        .with_context(|| format!("cannot open dictionary {}", dictionary.display()))?;
    tracing::debug!(entries = dict.len(), path = %dictionary.display(), "dictionary loaded");
    match lookup(&dict, word) {
        Some(variant) => print!("{}", render(variant)),
        None => println!("{word}: not in the offline dictionary"),
    }
    Ok(())
}

fn render(variant: &Variant) -> String {
    let mut out = String::new();
    let heading = match variant.gender {
        Some(gender) => format!("{} {}", gender.article(), variant.word),
        None => variant.word.clone(),
    };
    out.push_str(&format!("{heading}: {}\n", variant.translation));
    if let Some(forms) = &variant.verb_forms {
        let parts = forms.principal_parts();
        if !parts.is_empty() {
            out.push_str(&format!("  forms: {parts}\n"));
        }
    }
    for pair in variant.examples.iter().filter(|pair| !pair.is_empty()) {
        out.push_str(&format!("  - {}\n    {}\n", pair.sentence, pair.translation));
    }
    out
}
