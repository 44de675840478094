//! Terminal host for the AI helper chat widget.
//!
//! Reads commands from stdin and mirrors the widget's view events to stdout.

use std::io::Write;
use std::sync::Arc;

use ai_helper::ChatWidget;
use ai_helper::client::HttpAssistantClient;
use ai_helper::config::AppConfig;
use ai_helper::storage::FileStore;
use ai_helper::transcript::Message;
use ai_helper::view::{Elements, Mode, NoticeKind, ViewEvent};
use ai_helper::widget::SubmitOutcome;
use anyhow::Context;
use dotenvy::dotenv;
use mimalloc::MiMalloc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const HELP: &str = "\
Commands:
  /key <token>   save the API key
  /clear         clear the chat history
  /forget        remove the stored key and history
  /help          show this help
  /quit          exit
Anything else is sent to the assistant.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present)
    let _ = dotenv();

    let config = AppConfig::load().context("Configuration error")?;
    init_tracing(config.logging.json);

    info!(
        name: "config.loaded",
        endpoint = %config.endpoint.base_url,
        storage = %config.storage.path.display(),
        "Configuration loaded"
    );

    let client = HttpAssistantClient::from_config(&config.endpoint)
        .context("Invalid assistant endpoint")?;
    let store = FileStore::open(&config.storage.path);
    let widget = ChatWidget::new(
        Arc::new(store),
        Arc::new(client),
        Elements::default(),
        config.timing,
    );

    let printer = tokio::spawn(print_events(widget.subscribe()));

    match widget.init() {
        Mode::Chat => println!("Chat ready. Type /help for commands."),
        _ => println!("No API key stored. Use /key <token> to save one."),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim_end();
        match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit", _) => break,
            ("/help", _) => println!("{HELP}"),
            ("/key", key) => {
                widget.type_key(key);
                widget.save_key();
            }
            ("/clear", _) => {
                if confirm(&mut lines, "Clear the whole chat history?").await? {
                    widget.clear_transcript();
                }
            }
            ("/forget", _) => {
                if confirm(&mut lines, "Delete the saved API key?").await? {
                    widget.clear_credential();
                }
            }
            _ => {
                widget.type_text(line.replace("\\n", "\n"));
                if widget.submit_message().await == SubmitOutcome::Ignored {
                    println!("(chat is not open)");
                }
            }
        }
    }

    widget.dispose();
    printer.abort();
    Ok(())
}

/// Ask a y/N question on stdout and read the answer from `lines`.
async fn confirm<R>(lines: &mut Lines<R>, question: &str) -> std::io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    print!("{question} [y/N] ");
    std::io::stdout().flush()?;
    Ok(lines.next_line().await?.is_some_and(|answer| is_yes(&answer)))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

async fn print_events(mut events: tokio::sync::broadcast::Receiver<ViewEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => print_event(&event),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "View events dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn print_event(event: &ViewEvent) {
    match event {
        ViewEvent::ModeChanged(Mode::Chat) => println!("-- chat --"),
        ViewEvent::ModeChanged(Mode::KeyEntry) => {
            println!("-- enter your API key (/key <token>) --");
        }
        ViewEvent::MessageAppended(message) => print_message(message),
        ViewEvent::MessagesReplayed(messages) => messages.iter().for_each(print_message),
        ViewEvent::MessagesCleared => println!("-- history cleared --"),
        ViewEvent::NoticeShown(notice) => match notice.kind {
            NoticeKind::Success => println!("{}", notice.text),
            NoticeKind::Error => eprintln!("{}", notice.text),
        },
        ViewEvent::Busy(true) => println!("Thinking..."),
        _ => {}
    }
}

fn print_message(message: &Message) {
    println!("[{}] {}", message.role.avatar(), message.content);
}
