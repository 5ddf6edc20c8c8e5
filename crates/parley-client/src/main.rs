//! Terminal chat client.
//!
//! Connects to the configured server over WebSocket, prints incoming chat
//! messages and sends each line typed on stdin as a chat event.
//!
//! Commands: `/quit`, `/connect`, `/disconnect`, `/status`.
//! Run with `cargo run -p parley-client -- --url ws://host:7777 --name ana`.

use std::path::PathBuf;

use clap::Parser;
use parley_config::{CliArgs, Config, ConfigError};
use parley_net::{NetError, SyncClient, WsConnector, events};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Net(#[from] NetError),
    #[error("stdin: {0}")]
    Io(#[from] std::io::Error),
}

/// One line of user input.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Quit,
    Connect,
    Disconnect,
    Status,
    Say(&'a str),
    Blank,
}

fn parse_input(line: &str) -> Input<'_> {
    match line.trim() {
        "" => Input::Blank,
        "/quit" | "/exit" => Input::Quit,
        "/connect" => Input::Connect,
        "/disconnect" => Input::Disconnect,
        "/status" => Input::Status,
        text => Input::Say(text),
    }
}

fn print_message(data: &Value) {
    let sender = data["sender"].as_str().unwrap_or("?");
    let content = data["content"].as_str().unwrap_or_default();
    println!("<{sender}> {content}");
}

fn subscribe_lifecycle(client: &SyncClient) {
    client
        .on(events::CONNECT, |data: &Value| {
            println!("* connected to {}", data["endpoint"].as_str().unwrap_or("?"));
        })
        .detach();
    client
        .on(events::DISCONNECT, |data: &Value| {
            println!("* disconnected ({})", data["reason"].as_str().unwrap_or("?"));
        })
        .detach();
    client
        .on(events::RECONNECTING, |data: &Value| {
            println!(
                "* reconnecting in {} ms (attempt {})",
                data["delay_ms"], data["attempt"]
            );
        })
        .detach();
    client
        .on(events::RECONNECT_EXHAUSTED, |data: &Value| {
            println!(
                "* gave up after {} attempts; type /connect to retry",
                data["attempts"]
            );
        })
        .detach();
    client
        .on(events::ERROR, |data: &Value| {
            warn!(code = %data["code"], "{}", data["message"].as_str().unwrap_or_default());
        })
        .detach();
}

async fn run(config: Config) -> Result<(), ClientError> {
    let sync = config.sync_config()?;
    let chat_event = sync
        .message_events
        .first()
        .cloned()
        .unwrap_or_else(|| "message".to_string());
    let name = config.client.display_name.clone();

    let client = SyncClient::with_defaults(sync.clone(), WsConnector)?;
    let _chat: Vec<_> = sync
        .message_events
        .iter()
        .map(|event| client.on(event, print_message))
        .collect();
    subscribe_lifecycle(&client);

    if let Err(e) = client.connect().await {
        warn!(error = %e, "Initial connection failed, retrying in the background");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Input::Blank => {}
            Input::Quit => break,
            Input::Connect => {
                if let Err(e) = client.connect().await {
                    println!("* connect failed: {e}");
                }
            }
            Input::Disconnect => client.disconnect().await,
            Input::Status => {
                let stats = client.stats();
                println!(
                    "* {:?}: {} in, {} out, {} duplicates dropped",
                    client.state(),
                    stats.frames_in,
                    stats.frames_out,
                    stats.duplicates_dropped
                );
            }
            Input::Say(text) => {
                match client.send(&chat_event, json!({ "sender": name, "content": text })) {
                    // The server echo is suppressed, so show our own line here.
                    Ok(()) => println!("<{name}> {text}"),
                    Err(NetError::SendWhileDisconnected { .. }) => {
                        println!("* not connected, message not sent");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }

    client.disconnect().await;
    info!("Client exiting");
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    let config_dir = args
        .config
        .clone()
        .or_else(parley_config::default_config_dir)
        .unwrap_or_else(|| PathBuf::from(".parley"));

    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    parley_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    if let Err(e) = run(config).await {
        eprintln!("parley: {e}");
        std::process::exit(1);
    }
}
