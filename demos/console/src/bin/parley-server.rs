//! `parley-server`: runs a chat server driven from the terminal.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use parley::prelude::*;
use parley_console::{CONSOLE_READ_ERROR, ServerConsole, init_tracing, stdin_lines};

/// Multi-client chat server. Type a message to send it to every client, or
/// an operator command (#quit, #stop, #close, #setport <n>, #start, #getport).
#[derive(Parser, Debug)]
#[command(name = "parley-server", version, about, long_about = None)]
struct Args {
    /// Port to listen on [default: 5555]
    port: Option<u16>,

    /// JSON config file; command-line values take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Accept WebSocket connections instead of plain TCP
    #[arg(long)]
    websocket: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match ServerConfig::from_json_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => ServerConfig::default(),
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.websocket {
        config.transport = TransportKind::WebSocket;
    }

    match config.transport {
        TransportKind::Tcp => run::<TcpTransport>(config).await,
        TransportKind::WebSocket => run::<WebSocketTransport>(config).await,
    }
}

async fn run<T: Transport>(config: ServerConfig) -> ExitCode {
    tracing::info!(port = config.port, transport = ?config.transport, "starting server");
    let server = ChatServerBuilder::from_config(config).build::<T>(Arc::new(ServerConsole));

    // A failed listen is reported, not fatal: the operator can
    // #setport and #start.
    if let Err(e) = server.start().await {
        ServerConsole.display(&e.to_string());
    }

    let mut lines = stdin_lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if server.handle_message_from_server_ui(&line).await == Flow::Quit {
                    break;
                }
            }
            Ok(None) => {
                server.shutdown().await;
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                ServerConsole.display(&format!("{CONSOLE_READ_ERROR} {e}"));
                server.shutdown().await;
                break;
            }
        }
    }
    ExitCode::SUCCESS
}
