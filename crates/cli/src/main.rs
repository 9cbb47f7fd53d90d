mod anki;
mod cli;
mod config;
mod dictionary;
mod logging;
mod lookup;

use anyhow::Result;
use clap::Parser;

use crate::cli::{AnkiCommand, BuildCommand, Cli, Command};
use crate::config::DankiConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = if cli.verbose {
        true
    } else {
        logging::env_flag()
    };
    logging::init(verbose);
    let cfg = DankiConfig::load(&cli.config)?;
    match cli.command {
        Command::Build { step } => match step {
            BuildCommand::Launch { yes, wait } => dictionary::launch(&cfg, &cli.config, yes, wait),
            BuildCommand::Worker {
                worker_id,
                workers,
                api_key,
            } => dictionary::run_worker(&cfg, worker_id, workers, &api_key),
            BuildCommand::Merge { workers } => dictionary::merge(&cfg, workers),
        },
        Command::Lookup { word, dictionary } => {
            let path = dictionary.unwrap_or_else(|| cfg.lookup_dictionary());
            lookup::run(&path, &word)
        }
        Command::Anki { action } => match action {
            AnkiCommand::Decks { phrases } => anki::decks(&cfg, phrases),
            AnkiCommand::Add {
                words,
                deck,
                allow_duplicates,
                online,
                no_audio,
                api_key,
            } => anki::add(
                &cfg,
                anki::AddRequest {
                    words,
                    deck,
                    allow_duplicates,
                    online,
                    audio: !no_audio,
                    api_key,
                },
            ),
            AnkiCommand::Phrase {
                sentences,
                context,
                deck,
                allow_duplicates,
                no_notes,
                no_audio,
                api_key,
            } => anki::phrase(
                &cfg,
                anki::PhraseRequest {
                    sentences,
                    context,
                    deck,
                    allow_duplicates,
                    include_notes: cfg.anki.include_notes && !no_notes,
                    audio: !no_audio,
                    api_key,
                },
            ),
        },
    }
}
