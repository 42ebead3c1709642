use anyhow::{Context, Result};
use clap::Parser;
use nutriscan::app::{Action, App, IncomingMessage, SHOW_SUMMARY_ACTION};
use nutriscan::models::Config;
use nutriscan::session::Session;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "Commands:
  /image <path> [question]  analyse a photo of a food product
  /keep                     record the last analysed product as consumed
  /summary                  show today's consumed products and totals
  /help                     show this help
  /quit                     end the session
Anything else is sent as a question about the last product.";

#[derive(Debug, Parser)]
#[command(name = "nutriscan")]
#[command(about = "Chat about food products from their photos")]
struct CliArgs {
    /// JSON schema describing the data to extract (defaults to the built-in product schema).
    #[arg(long, value_name = "PATH")]
    schema: Option<PathBuf>,

    /// Bedrock model ID or inference profile to invoke.
    #[arg(long, value_name = "ID")]
    model_id: Option<String>,
}

#[derive(Debug, PartialEq)]
enum Command {
    Message { text: String, image: Option<PathBuf> },
    Keep,
    Summary,
    Help,
    Quit,
}

fn parse_command(line: &str) -> std::result::Result<Command, String> {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    match head {
        "/image" => {
            let (path, question) = match rest.split_once(char::is_whitespace) {
                Some((path, question)) => (path, question.trim()),
                None => (rest, ""),
            };
            if path.is_empty() {
                return Err("Usage: /image <path> [question]".to_string());
            }
            Ok(Command::Message {
                text: question.to_string(),
                image: Some(PathBuf::from(path)),
            })
        }
        "/keep" => Ok(Command::Keep),
        "/summary" => Ok(Command::Summary),
        "/help" => Ok(Command::Help),
        "/quit" | "/exit" => Ok(Command::Quit),
        cmd if cmd.starts_with('/') => Err(format!("Unknown command '{}'. Try /help.", cmd)),
        _ => Ok(Command::Message {
            text: line.to_string(),
            image: None,
        }),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nutriscan=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();

    let mut config = Config::from_env()?;
    if let Some(schema) = args.schema {
        config.schema_path = Some(schema);
    }
    if let Some(model_id) = args.model_id {
        config.model_id = model_id;
    }

    let app = match App::new(&config).await {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    let mut session = Session::start();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{}\n", HELP);

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("{}\n", message);
                continue;
            }
        };

        let reply = match command {
            Command::Quit => break,
            Command::Help => {
                println!("{}\n", HELP);
                continue;
            }
            Command::Keep => app.keep_current(&mut session),
            Command::Summary => app.handle_action(
                &mut session,
                &Action {
                    name: SHOW_SUMMARY_ACTION.to_string(),
                    label: "Summary".to_string(),
                    payload: serde_json::Value::Null,
                },
            ),
            Command::Message { text, image } => {
                let mut message = IncomingMessage::text(text);
                if let Some(path) = image {
                    match tokio::fs::read(&path).await {
                        Ok(bytes) => message = message.with_image(bytes),
                        Err(e) => {
                            println!("Could not read {}: {}\n", path.display(), e);
                            continue;
                        }
                    }
                }
                app.handle_message(&mut session, message).await
            }
        };

        println!("{}", reply.display_text);
        for action in &reply.actions {
            println!("[/keep] {}", action.label);
        }
        println!();
    }

    session.end();
    info!("Goodbye");
    Ok(())
}
