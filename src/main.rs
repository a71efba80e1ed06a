//! Application entry point — Shohayok terminal assistant.
//!
//! # Startup sequence
//!
//! 1. Parse the command line.
//! 2. Initialise logging.
//! 3. Load [`AppConfig`] (defaults on first run) and apply overrides.
//! 4. Create the [`tokio`] runtime.
//! 5. Build the preference store, language model and voice adapter.
//! 6. Create the [`TurnController`] and print the loaded history.
//! 7. Spawn the render task that prints every snapshot.
//! 8. Read commands from stdin until `/quit` or end of input.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use shohayok::{
    config::{AppConfig, API_KEY_ENV},
    console::{apply_setting, describe_preferences, ConsoleCommand, ConsoleView, HELP},
    llm,
    store::{FileBackend, KvPreferenceStore},
    turn::TurnController,
    voice::{CommandVoice, NullVoice, VoiceIo},
};

#[derive(Parser)]
#[command(name = "shohayok")]
#[command(about = "Shohayok - tactical AI assistant for the terminal", long_about = None)]
struct Cli {
    /// Load settings from this file instead of the platform config directory
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Keep preferences and history in this directory
    #[arg(long, value_name = "PATH")]
    data_dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Shohayok starting up");

    // 2. Configuration
    let loaded = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    let mut config = loaded.unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    config.llm = config.llm.with_api_key_override(std::env::var(API_KEY_ENV).ok());
    if let Some(dir) = cli.data_dir {
        config.storage.data_dir = Some(dir);
    }

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.block_on(run(config))
}

async fn run(config: AppConfig) -> Result<()> {
    // 4. Collaborators
    let data_dir = config.data_dir();
    log::info!("Storing preferences and history in {}", data_dir.display());
    let store = Arc::new(KvPreferenceStore::with_history_limit(
        FileBackend::new(data_dir),
        config.turn.history_limit,
    ));

    let voice: Arc<dyn VoiceIo> =
        if config.voice.tts_program.is_some() || config.voice.stt_program.is_some() {
            Arc::new(CommandVoice::new(config.voice.clone()))
        } else {
            log::info!("voice: no TTS or STT program configured, voice I/O disabled");
            Arc::new(NullVoice)
        };

    let controller = TurnController::new(store, llm::from_config(&config), voice, config.turn.clone());

    // 5. Render sink
    let mut view = ConsoleView::new();
    for line in view.replay(&controller.snapshot()) {
        println!("{line}");
    }
    let mut updates = controller.subscribe();
    let render = tokio::spawn(async move {
        while let Some(snapshot) = updates.recv().await {
            for line in view.render(&snapshot) {
                println!("{line}");
            }
        }
    });

    // 6. Input loop
    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        match ConsoleCommand::parse(&line) {
            Ok(ConsoleCommand::Nothing) => {}
            Ok(ConsoleCommand::Submit(text)) => {
                let controller = controller.clone();
                tokio::spawn(async move { controller.submit_text(&text).await });
            }
            Ok(ConsoleCommand::Listen) => controller.toggle_listening(),
            Ok(ConsoleCommand::Clear) => controller.clear_history(),
            Ok(ConsoleCommand::ShowPreferences) => {
                println!("{}", describe_preferences(&controller.preferences()));
            }
            Ok(ConsoleCommand::Set { field, value }) => {
                match apply_setting(&controller.preferences(), &field, &value) {
                    Ok(prefs) => controller.update_preferences(prefs),
                    Err(e) => eprintln!("{e}"),
                }
            }
            Ok(ConsoleCommand::Help) => println!("{HELP}"),
            Ok(ConsoleCommand::Quit) => break,
            Err(e) => eprintln!("{e}\n{HELP}"),
        }
    }

    render.abort();
    log::info!("Shohayok shutting down");
    Ok(())
}
