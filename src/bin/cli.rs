//! CLI binary for timewalk.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use timewalk::console::{ConsoleFrontend, ConsoleSpeech, LoggingBody};
use timewalk::{
    ApiLanguageModel, Collaborators, Credentials, SessionConfig, SessionEvent, TopicSource,
    TurnController,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Time-travel storyteller for a social robot.
#[derive(Parser)]
#[command(name = "timewalk", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Also write logs to a daily-rolling file in this directory.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Run a storytelling session in the terminal.
    Chat,

    /// List the eras in the dataset, or show the prompt for one.
    Topics {
        /// Era id to show in full.
        era: Option<String>,
    },

    /// Write the default configuration file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.log_dir.as_deref());

    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("no .env file loaded: {e}");
    }

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(SessionConfig::default_config_path);
    let config = load_config(&config_path, cli.config.is_some())?;

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => run_chat(config).await,
        Command::Topics { era } => show_topics(&config, era.as_deref()),
        Command::InitConfig { force } => init_config(&config_path, force),
    }
}

/// Stderr logging plus an optional rolling file. The returned guard must
/// live until exit so buffered file logs are flushed.
fn init_logging(log_dir: Option<&Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("timewalk=info,reqwest=warn,hyper=warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "timewalk.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    guard
}

/// An explicit `--config` must exist; the default location is optional.
fn load_config(path: &Path, explicit: bool) -> anyhow::Result<SessionConfig> {
    if path.exists() {
        info!("loading config from {}", path.display());
        Ok(SessionConfig::from_file(path)?)
    } else if explicit {
        anyhow::bail!("config file not found: {}", path.display())
    } else {
        Ok(SessionConfig::default())
    }
}

async fn run_chat(config: SessionConfig) -> anyhow::Result<()> {
    let credentials = Credentials::from_env()?;
    println!("timewalk v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "robot at {} is not driven in console mode",
        credentials.robot_address
    );

    let llm = ApiLanguageModel::new(&config.llm, credentials.api_key.as_str())?;
    let topics = TopicSource::load(&config.topics.dataset_path);
    let frontend = ConsoleFrontend::spawn();

    let io = Collaborators {
        face: frontend.face,
        speech_in: frontend.input,
        speech_out: Arc::new(ConsoleSpeech::with_pace(Duration::from_millis(150))),
        body: Arc::new(LoggingBody::default()),
        llm: Arc::new(llm),
        touch: Some(frontend.touch),
        media: None,
    };

    let (event_tx, mut event_rx) = tokio::sync::broadcast::channel(64);
    let mut controller = TurnController::new(config, io, topics).with_runtime_events(event_tx);

    tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(SessionEvent::TopicSwitch { reason }) => {
                    info!("topic switch requested: {reason:?}");
                }
                Ok(SessionEvent::SpeechCut { skipped }) => {
                    info!("cut {skipped} sentence(s) short");
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!("event log lagged by {n}");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
            }
        }
    });

    let cancel = controller.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, shutting down...");
            cancel.cancel();
        }
    });

    println!("\nPress Enter to step in front of the robot. Type `!` to touch its head.\n");

    let summary = controller.run().await;
    println!(
        "\nSession {} finished: {} turn(s), {} topic switch(es), eras {}",
        summary.session_id,
        summary.turns,
        summary.switches,
        summary.topics.join(", ")
    );
    Ok(())
}

fn show_topics(config: &SessionConfig, era: Option<&str>) -> anyhow::Result<()> {
    let mut topics = TopicSource::load(&config.topics.dataset_path);
    match era {
        Some(id) => {
            let topic = topics.topic_for_id(id)?;
            println!("{}\n", TopicSource::introduction_line(topic));
            println!("{}", TopicSource::format_prompt(Some(topic)));
        }
        None => {
            if topics.is_empty() {
                println!("No eras found in {}", config.topics.dataset_path.display());
            }
            for id in topics.ids() {
                println!("  - {id}");
            }
        }
    }
    Ok(())
}

fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    SessionConfig::default().save_to_file(path)?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}
