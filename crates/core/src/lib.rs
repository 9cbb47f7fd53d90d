mod checkpoint;
mod enrich;
mod error;
mod extract;
mod keys;
mod lookup;
mod merge;
mod model;
mod partition;
mod phrase;
mod progress;
mod wordlist;
mod worker;

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use enrich::{build_prompt, parse_enrichment, LlmEnricher};
pub use error::{DankiError, Result};
pub use extract::{extract_json_object, ExtractError};
pub use keys::{default_pattern, load_keys, scan_keys, GEMINI_KEY_PATTERN, OPENAI_KEY_PATTERN};
pub use lookup::lookup;
pub use merge::{merge_dictionaries, merge_parts, write_merged, Collision, Merged};
pub use model::{
    Dictionary, DictionaryFile, Enrichment, ExamplePair, Gender, Variant, VerbForms, MAX_EXAMPLES,
};
pub use partition::{partition, worker_range};
pub use phrase::{build_phrase_prompt, parse_phrase, Phrase};
pub use progress::{ProgressLog, Throughput, WordStatus};
pub use wordlist::{collect_words, read_words};
pub use worker::{
    Worker, WorkerReport, WorkerSettings, DEFAULT_CHECKPOINT_INTERVAL,
};
