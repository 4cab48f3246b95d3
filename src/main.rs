//! OmniOne chat client binary
//!
//! Terminal front end for the chat dock engine: connects the WebSocket
//! session, drives the dock from its event stream, and maps commands typed
//! on stdin onto dock operations.

use clap::Parser;
use directories::BaseDirs;
use log::LevelFilter;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;

use omnione_chat_client::cli::{self, Command};
use omnione_chat_client::models::{CurrentUser, Role};
use omnione_chat_client::services::ConnectionManager;
use omnione_chat_client::{ChatDock, ServerClient, SessionStore};

#[derive(Parser, Debug)]
#[command(name = "omnione-chat")]
#[command(about = "OmniOne coaching platform chat client", long_about = None)]
struct Args {
    /// Server base URL
    #[arg(short, long, default_value = "http://localhost:8080")]
    server: String,

    /// Bearer token for authentication
    #[arg(short, long)]
    token: String,

    /// Authenticated user id
    #[arg(short, long)]
    user_id: String,

    /// Account role: coach or client
    #[arg(short, long, default_value = "client")]
    role: String,

    /// Data directory (defaults to ~/.omnione)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn data_dir(args: &Args) -> anyhow::Result<PathBuf> {
    if let Some(dir) = &args.data_dir {
        return Ok(dir.clone());
    }
    let base = BaseDirs::new().ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    Ok(base.home_dir().join(".omnione"))
}

fn parse_role(raw: &str) -> anyhow::Result<Role> {
    match raw.to_uppercase().as_str() {
        "COACH" => Ok(Role::Coach),
        "CLIENT" => Ok(Role::Client),
        other => anyhow::bail!("Unknown role '{}' (expected coach or client)", other),
    }
}

fn print_chats(dock: &ChatDock) {
    let chats = dock.sorted_conversations();
    if chats.is_empty() {
        println!("No conversations yet.");
        return;
    }
    for (index, chat) in chats.iter().enumerate() {
        println!(
            "{}",
            cli::render_chat_row(index, chat, dock.is_unread(&chat.conversation_id))
        );
    }
}

fn print_thread(dock: &ChatDock, user_id: &str) {
    for line in cli::render_thread(dock.active_messages(), user_id) {
        println!("{}", line);
    }
    if dock.has_new_messages_indicator() {
        println!("  (new messages below - /read to jump)");
    }
}

/// Resolve `/open` input: a 1-based index into the sorted list, or a raw id.
fn resolve_open_arg(dock: &ChatDock, arg: &str) -> Option<String> {
    let chats = dock.sorted_conversations();
    if let Ok(index) = arg.parse::<usize>() {
        if index >= 1 {
            return chats.get(index - 1).map(|chat| chat.conversation_id.clone());
        }
    }
    chats
        .iter()
        .find(|chat| chat.conversation_id == arg)
        .map(|chat| chat.conversation_id.clone())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(if args.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .format_timestamp_millis()
        .init();

    let dir = data_dir(&args)?;
    std::fs::create_dir_all(&dir)?;
    let session = SessionStore::new(dir.join("session.db"))?;

    let user = CurrentUser {
        id: args.user_id.clone(),
        role: parse_role(&args.role)?,
    };
    let server = Arc::new(ServerClient::new(args.server.clone(), args.token.clone()));

    let ws_url = ConnectionManager::websocket_url(&args.server)?;
    let (connection, mut events) = ConnectionManager::new(ws_url, args.token.clone());
    connection.start();

    let mut dock = ChatDock::new(user, server, connection, session);
    dock.set_open(true);
    dock.refresh_conversations().await;
    if dock.active_conversation_id().is_some() {
        dock.load_active_conversation().await;
    }

    println!("OmniOne chat. Commands: /chats /open <n> /new <userId> /older /read /quit");
    print_chats(&dock);

    let mut stdin = BufReader::new(tokio::io::stdin());

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                dock.handle_event(event).await;
                if dock.active_conversation_id().is_some() {
                    print_thread(&dock, &args.user_id);
                } else if dock.has_unread() {
                    println!("(unread messages - /chats to list)");
                }
                print!("> ");
                std::io::stdout().flush()?;
            }
            line = cli::read_line_async(&mut stdin) => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let command = match Command::parse(&line) {
                    Ok(command) => command,
                    Err(message) => {
                        println!("{}", message);
                        continue;
                    }
                };
                match command {
                    Command::Quit => break,
                    Command::Chats => {
                        dock.refresh_conversations().await;
                        print_chats(&dock);
                    }
                    Command::Open(arg) => {
                        match resolve_open_arg(&dock, &arg) {
                            Some(conversation_id) => {
                                dock.select_conversation(&conversation_id).await;
                                println!("-- {} --", dock.active_target_name());
                                print_thread(&dock, &args.user_id);
                            }
                            None => println!("No such conversation: {}", arg),
                        }
                    }
                    Command::New(target_id) => {
                        dock.open_with_target(&target_id, None).await;
                        match dock.chat_error() {
                            Some(error) => println!("{}", error),
                            None => {
                                println!("-- {} --", dock.active_target_name());
                                print_thread(&dock, &args.user_id);
                            }
                        }
                    }
                    Command::Older => {
                        if dock.load_older().await {
                            print_thread(&dock, &args.user_id);
                        } else if let Some(error) = dock.message_error() {
                            println!("{}", error);
                        } else {
                            println!("No older messages.");
                        }
                    }
                    Command::Read => {
                        dock.dismiss_new_messages().await;
                        print_thread(&dock, &args.user_id);
                    }
                    Command::Message(content) => {
                        dock.send(&content).await;
                        if dock.active_conversation_id().is_none() {
                            println!("No conversation open. /open <n> first.");
                        } else {
                            print_thread(&dock, &args.user_id);
                        }
                    }
                }
            }
        }
    }

    println!("Bye.");
    Ok(())
}
