//! Interactive terminal chat against a `/chat` endpoint.
//!
//! # Usage
//!
//! ```bash
//! # Talk to a server on http://localhost:8000
//! parley-chat
//!
//! # Point at another server and give up on replies after three minutes
//! parley-chat --api-url https://chat.example.com --timeout 180
//!
//! # Disable colors (useful for piping output)
//! parley-chat --no-color
//! ```
//!
//! Set `RUST_LOG=parley=debug` to see exchange diagnostics on stderr.
//!
//! # Commands
//!
//! - `/clear` - Clear conversation history
//! - `/session` - Show the session id
//! - `/stats` - Show session statistics
//! - `/help` - Show available commands
//! - `/quit` - Exit the application

use std::sync::Arc;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tracing_subscriber::EnvFilter;

use parley::Notification;
use parley::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatSession, PlainTextRenderer, Renderer, SessionStats,
    help_text, parse_command,
};

/// Main entry point for the parley-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("parley-chat [OPTIONS]");
    let config = ChatConfig::from(args);

    let client = config.client()?;
    tracing::info!(endpoint = %client.endpoint(), "starting chat");
    let (notifier, mut notices) = unbounded_channel::<Notification>();
    let session = ChatSession::new(client).with_notifier(Arc::new(notifier));
    let mut renderer = PlainTextRenderer::with_color(config.use_color);
    let mut rl = DefaultEditor::new()?;

    renderer.print_header(session.session_id());
    renderer.print_empty_state();

    // Index of the first message not yet printed.
    let mut shown = 0;

    loop {
        match rl.readline("> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Clear => {
                            session.clear_messages();
                            shown = 0;
                            drain_notices(&mut notices, &mut renderer);
                            renderer.print_empty_state();
                        }
                        ChatCommand::Session => {
                            renderer.print_info(&format!("Session id: {}", session.session_id()));
                        }
                        ChatCommand::Stats => {
                            print_stats(&session.stats());
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {}", line);
                            }
                        }
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                renderer.start_typing();
                tokio::select! {
                    _ = session.send_message(line) => {}
                    _ = tokio::signal::ctrl_c() => {
                        renderer.print_info("[interrupted]");
                    }
                }
                renderer.finish_typing();

                for message in session.messages_since(shown) {
                    renderer.print_message(&message);
                }
                shown = session.message_count();
                drain_notices(&mut notices, &mut renderer);
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}

fn drain_notices(notices: &mut UnboundedReceiver<Notification>, renderer: &mut dyn Renderer) {
    while let Ok(notification) = notices.try_recv() {
        renderer.print_notification(&notification);
    }
}

fn print_stats(stats: &SessionStats) {
    println!("    Session Statistics:");
    println!("      Session id: {}", stats.session_id);
    println!("      Messages: {}", stats.message_count);
    println!(
        "      Exchanges: {} ({} failed)",
        stats.total_exchanges, stats.failed_exchanges
    );
}
