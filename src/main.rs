//! PageLens - reading assistant for web pages
//!
//! `serve` runs the coordinator and content script behind the IPC socket.
//! The other subcommands talk to a running daemon.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pagelens::capability::{Capabilities, OllamaCapabilities};
use pagelens::config::Config;
use pagelens::content::ContentScript;
use pagelens::coordinator::Coordinator;
use pagelens::ipc::{self, IpcClient, IpcServer, Relay, Request, Response};
use pagelens::popup::Popup;
use pagelens::selection::PageEvent;
use pagelens::store::{KeyValueStore, SqliteStore};
use pagelens::tts::{self, Narrator};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Config file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// IPC socket path
    #[arg(long)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the coordinator daemon
    Serve,
    /// Check that the daemon is reachable
    Ping,
    /// Report a text selection on a page
    SelectText {
        text: String,
        #[arg(long)]
        url: String,
        #[arg(long, default_value = "p")]
        tag: String,
        #[arg(long, default_value = "")]
        before: String,
        #[arg(long, default_value = "")]
        after: String,
    },
    /// Report a right-click on an image
    SelectImage {
        src: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        alt: Option<String>,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
    },
    /// Report that the selection collapsed
    Clear,
    /// Report navigation to another page
    Navigate { url: String },
    /// Print the current selection
    Selection,
    /// Read or change settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
    /// List or delete saved items
    Saved {
        #[command(subcommand)]
        command: SavedCommand,
    },
    /// Run a popup action on the current selection
    Run {
        action: RunAction,
        /// Target language for translate
        #[arg(long)]
        lang: Option<String>,
        /// Read the result aloud
        #[arg(long)]
        speak: bool,
        /// Save the result
        #[arg(long)]
        save: bool,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
    Get { key: String },
    /// Set a setting; the value is parsed as JSON, falling back to a string
    Set { key: String, value: String },
}

#[derive(Subcommand, Debug)]
enum SavedCommand {
    List,
    Delete { id: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RunAction {
    Summarize,
    Simplify,
    Describe,
    Translate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // Setup logging
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_lowercase()))
    };
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let socket = args.socket.clone().unwrap_or_else(ipc::socket_path);

    match args.command {
        Command::Serve => serve(config, socket).await,
        Command::Ping => {
            let client = IpcClient::new(socket);
            if client.is_daemon_running().await {
                println!("ready");
                Ok(())
            } else {
                anyhow::bail!("PageLens daemon is not running at {:?}", client.path())
            }
        }
        Command::SelectText {
            text,
            url,
            tag,
            before,
            after,
        } => {
            send_event(
                socket,
                PageEvent::TextSelected {
                    text,
                    context_before: before,
                    context_after: after,
                    element_tag: tag,
                    page_url: url,
                },
            )
            .await
        }
        Command::SelectImage {
            src,
            url,
            alt,
            width,
            height,
        } => {
            send_event(
                socket,
                PageEvent::ImageContextMenu {
                    src,
                    alt,
                    natural_width: width,
                    natural_height: height,
                    rendered_width: width,
                    rendered_height: height,
                    visible: true,
                    element_tag: "img".to_string(),
                    page_url: url,
                },
            )
            .await
        }
        Command::Clear => send_event(socket, PageEvent::SelectionCleared).await,
        Command::Navigate { url } => send_event(socket, PageEvent::Navigated { page_url: url }).await,
        Command::Selection => {
            match IpcClient::new(socket).send(Request::GetSelectedContent).await? {
                Response::Selection {
                    selection: Some(selection),
                } => println!("{}", serde_json::to_string_pretty(&selection)?),
                Response::Selection { selection: None } => println!("No selection"),
                other => warn!("Unexpected response: {:?}", other),
            }
            Ok(())
        }
        Command::Settings { command } => {
            let client = IpcClient::new(socket);
            let request = match command {
                SettingsCommand::Get { key } => Request::GetSetting { key },
                SettingsCommand::Set { key, value } => Request::SetSetting {
                    key,
                    value: serde_json::from_str(&value)
                        .unwrap_or(serde_json::Value::String(value)),
                },
            };
            print_response(client.send(request).await?)
        }
        Command::Saved { command } => {
            let client = IpcClient::new(socket);
            let request = match command {
                SavedCommand::List => Request::GetSavedItems,
                SavedCommand::Delete { id } => Request::DeleteSavedItem { id },
            };
            print_response(client.send(request).await?)
        }
        Command::Run {
            action,
            lang,
            speak,
            save,
        } => run(config, socket, action, lang, speak, save).await,
    }
}

async fn serve(config: Config, socket: PathBuf) -> Result<()> {
    info!("🔎 PageLens v{} starting...", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn KeyValueStore> = Arc::new(
        SqliteStore::new(&config.store_path, Some(config.storage_quota_bytes))
            .context("opening store")?,
    );

    let (notify_tx, notify_rx) = mpsc::unbounded_channel();
    let (content, content_task) = ContentScript::new(config.selection.clone(), notify_tx).spawn();
    let coordinator = Arc::new(Coordinator::new(content.clone(), store));
    let notifications = tokio::spawn(coordinator.clone().run_notifications(notify_rx));

    let mut server = IpcServer::new(socket);
    server.start(coordinator)?;
    info!("✅ PageLens ready");

    tokio::signal::ctrl_c().await?;
    info!("🛑 Shutting down");

    server.stop().await;
    match content.shutdown().await {
        Ok(detached) => info!("Detached {} page handlers", detached),
        Err(e) => warn!("⚠️ Content script already stopped: {}", e),
    }
    let _ = content_task.await;
    let _ = notifications.await;
    Ok(())
}

async fn send_event(socket: PathBuf, event: PageEvent) -> Result<()> {
    let response = IpcClient::new(socket)
        .send(Request::PageEvent { event })
        .await?;
    print_response(response)
}

fn print_response(response: Response) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn run(
    config: Config,
    socket: PathBuf,
    action: RunAction,
    lang: Option<String>,
    speak: bool,
    save: bool,
) -> Result<()> {
    let store: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::new(
        &config.store_path,
        Some(config.storage_quota_bytes),
    )?);
    let ollama = Arc::new(OllamaCapabilities::new(&config));
    ollama.ensure_available().await?;
    let capabilities = Capabilities::from_backend(ollama);
    let narrator = Narrator::new(tts::create_engine(&config));
    let popup = Popup::new(
        Arc::new(IpcClient::new(socket)),
        capabilities,
        store,
        narrator,
    );

    let outcome = async {
        popup.open().await?;
        match action {
            RunAction::Summarize => popup.summarize().await?,
            RunAction::Simplify => popup.simplify().await?,
            RunAction::Describe => popup.describe().await?,
            RunAction::Translate => popup.translate(lang.as_deref()).await?,
        };
        if save {
            popup.save().await?;
        }
        if speak {
            popup.speak().await?;
        }
        Ok::<_, pagelens::error::LensError>(())
    }
    .await;

    println!("{}", popup.view()?.render());
    outcome?;

    // The utterance is killed with the process
    if speak {
        println!("Press Ctrl+C to stop reading");
        tokio::signal::ctrl_c().await?;
        popup.stop().await?;
    }
    Ok(())
}
