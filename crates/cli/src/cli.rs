use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "danki",
    version,
    about = "German dictionary builder and Anki card helper"
)]
pub struct Cli {
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,
    #[arg(long, global = true, default_value = "danki.toml")]
    pub config: PathBuf,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the offline dictionary with parallel workers.
    Build {
        #[command(subcommand)]
        step: BuildCommand,
    },
    /// Look a word up in the offline dictionary.
    Lookup {
        word: String,
        #[arg(long)]
        dictionary: Option<PathBuf>,
    },
    Anki {
        #[command(subcommand)]
        action: AnkiCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum BuildCommand {
    /// Start one worker process per api key.
    Launch {
        #[arg(long, short = 'y', default_value_t = false)]
        yes: bool,
        #[arg(long, default_value_t = false)]
        wait: bool,
    },
    /// Process one slice of the word list (normally started by `launch`).
    Worker {
        #[arg(long)]
        worker_id: usize,
        #[arg(long)]
        workers: usize,
        #[arg(long, env = "DANKI_API_KEY", hide_env_values = true)]
        api_key: String,
    },
    /// Merge finished worker outputs into one dictionary.
    Merge {
        /// Number of worker outputs to expect; defaults to the number of api keys.
        #[arg(long)]
        workers: Option<usize>,
    },
}

#[derive(Subcommand, Debug)]
pub enum AnkiCommand {
    /// List decks that can take word notes (or phrase notes with --phrases).
    Decks {
        #[arg(long, default_value_t = false)]
        phrases: bool,
    },
    /// Turn words into notes and add them to Anki.
    Add {
        #[arg(required = true)]
        words: Vec<String>,
        #[arg(long)]
        deck: Option<String>,
        #[arg(long, default_value_t = false)]
        allow_duplicates: bool,
        /// Ask the model for words missing from the offline dictionary.
        #[arg(long, default_value_t = false)]
        online: bool,
        #[arg(long, default_value_t = false)]
        no_audio: bool,
        #[arg(long, env = "DANKI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },
    /// Correct or translate sentences and add them as phrase notes.
    Phrase {
        #[arg(required = true)]
        sentences: Vec<String>,
        /// Topic that disambiguates the sentences, e.g. "banking".
        #[arg(long)]
        context: Option<String>,
        #[arg(long)]
        deck: Option<String>,
        #[arg(long, default_value_t = false)]
        allow_duplicates: bool,
        /// Leave out the grammar note even if the config includes it.
        #[arg(long, default_value_t = false)]
        no_notes: bool,
        #[arg(long, default_value_t = false)]
        no_audio: bool,
        #[arg(long, env = "DANKI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },
}
