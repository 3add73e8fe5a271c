//! `parley-client`: connects to a chat server and chats from the terminal.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use parley::prelude::*;
use parley_console::{CONSOLE_READ_ERROR, ClientConsole, init_tracing, stdin_lines};

/// Chat client. Type a message to send it, or a command (#quit, #logoff,
/// #login, #sethost <h>, #setport <n>, #gethost, #getport).
#[derive(Parser, Debug)]
#[command(name = "parley-client", version, about, long_about = None)]
struct Args {
    /// Login id to announce to the server
    login_id: String,

    /// Server host [default: localhost]
    host: Option<String>,

    /// Server port [default: 5555]
    port: Option<u16>,

    /// JSON config file; command-line values take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Connect over WebSocket instead of plain TCP
    #[arg(long)]
    websocket: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match ClientConfig::from_json_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => ClientConfig::default(),
    };
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.websocket {
        config.transport = TransportKind::WebSocket;
    }

    match config.transport {
        TransportKind::Tcp => run(config, TcpDialer, &args.login_id).await,
        TransportKind::WebSocket => run(config, WebSocketDialer, &args.login_id).await,
    }
}

async fn run<D: Dialer>(config: ClientConfig, dialer: D, login_id: &str) -> ExitCode {
    let client = ChatClient::new(config, dialer, Arc::new(ClientConsole));

    if let Err(e) = client.set_login_id(login_id).await {
        ClientConsole.display(&e.to_string());
        return ExitCode::FAILURE;
    }
    if let Err(e) = client.connect().await {
        tracing::error!(error = %e, "initial connection failed");
        println!("Error: Can't setup connection! Terminating client.");
        return ExitCode::FAILURE;
    }

    let mut lines = stdin_lines();
    loop {
        tokio::select! {
            _ = client.terminated() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if client.on_user_input(&line).await == Flow::Quit {
                        break;
                    }
                }
                Ok(None) => {
                    client.quit().await;
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "stdin read failed");
                    ClientConsole.display(&format!("{CONSOLE_READ_ERROR} {e}"));
                    client.quit().await;
                    break;
                }
            },
        }
    }
    ExitCode::SUCCESS
}
