//! `answer-stream`: ask the Q&A backend from a terminal, or parse raw answer
//! text from stdin.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Parse CLI args
//!   3. Load config
//!   4. Init logger once (CLI `-v` flags > RUST_LOG > config level)
//!   5. Run the selected command

use std::io::{Read, Write};

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use answer_stream::chat::client::ChatClient;
use answer_stream::chat::Conversation;
use answer_stream::config::{self, Config};
use answer_stream::console::TranscriptPrinter;
use answer_stream::error::AppError;
use answer_stream::logger;
use answer_stream::ParsedAnswer;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // .env is optional.
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();

    let config = config::load(args.config_path.as_deref())?;

    let log_filter = logger::init(&config.log_level, args.verbosity, config.log_file.as_deref())?;

    info!(
        api = %config.api.base_url,
        separator = %config.parser.separator(),
        history_window = config.answer.history_window,
        log_filter = %log_filter,
        "config loaded"
    );

    match args.command {
        Command::Parse { streaming } => parse_stdin(&config, streaming),
        Command::Ask { question } => ask_once(&config, &question).await,
        Command::Chat => chat_console(&config).await,
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn parse_stdin(config: &Config, streaming: bool) -> Result<(), AppError> {
    let mut text = String::new();
    std::io::stdin().read_to_string(&mut text)?;
    debug!(input_len = text.len(), streaming, "parsing stdin");

    let parsed = config.parser.parse(&text, streaming);
    let json = serde_json::to_string_pretty(&parsed)
        .map_err(|e| AppError::Io(std::io::Error::other(e)))?;
    println!("{json}");
    Ok(())
}

async fn ask_once(config: &Config, question: &str) -> Result<(), AppError> {
    let client = ChatClient::from_config(config)?;
    let mut conversation = Conversation::new(config.answer.history_window);
    let mut printer = TranscriptPrinter::new(client.parser());

    let parsed = stream_answer(&client, &mut conversation, &mut printer, question).await?;
    printer.finish(&parsed, &mut std::io::stdout())?;
    Ok(())
}

async fn chat_console(config: &Config) -> Result<(), AppError> {
    let client = ChatClient::from_config(config)?;
    let mut conversation = Conversation::new(config.answer.history_window);
    let mut printer = TranscriptPrinter::new(client.parser());
    let mut followups: Vec<String> = Vec::new();

    info!(endpoint = %client.endpoint(), "chat console started");
    println!("─────────────────────────────────");
    println!(" Ask a question  (/quit or Ctrl-C to exit)");
    println!("─────────────────────────────────");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                info!("interrupted at prompt");
                break;
            }
        };
        let input = match line {
            Some(line) => line.trim().to_string(),
            None => {
                info!("stdin closed");
                break;
            }
        };
        if input.is_empty() {
            continue;
        }

        let question = match input.as_str() {
            "/quit" | "/exit" => break,
            "/clear" => {
                conversation.clear();
                followups.clear();
                println!("[history cleared]");
                continue;
            }
            cmd if cmd.starts_with('/') => match pick_followup(&followups, &cmd[1..]) {
                Some(q) => {
                    println!("> {q}");
                    q.to_string()
                }
                None => {
                    println!("[unknown command: {cmd}]");
                    continue;
                }
            },
            _ => input.clone(),
        };

        let ask = stream_answer(&client, &mut conversation, &mut printer, &question);
        tokio::select! {
            result = ask => match result {
                Ok(parsed) => {
                    printer.finish(&parsed, &mut std::io::stdout())?;
                    followups = parsed.followup_questions;
                }
                Err(e) => {
                    warn!(error = %e, "question failed");
                    printer.reset();
                    followups.clear();
                    println!("\n[error: {e}]");
                }
            },
            _ = tokio::signal::ctrl_c() => {
                // Dropping the request future aborts the stream.
                printer.reset();
                followups.clear();
                println!("\n[aborted]");
            }
        }
    }

    Ok(())
}

async fn stream_answer(
    client: &ChatClient,
    conversation: &mut Conversation,
    printer: &mut TranscriptPrinter,
    question: &str,
) -> Result<ParsedAnswer, AppError> {
    let mut stdout = std::io::stdout();
    let parsed = client
        .ask(conversation, question, |partial| {
            if let Err(e) = printer.update(partial, &mut stdout) {
                debug!(error = %e, "stdout write failed");
            }
        })
        .await?;
    Ok(parsed)
}

/// `/N` selects follow-up question N (1-based) of the last answer.
fn pick_followup<'a>(followups: &'a [String], arg: &str) -> Option<&'a str> {
    let n: usize = arg.parse().ok()?;
    followups.get(n.checked_sub(1)?).map(String::as_str)
}

// ── CLI args ──────────────────────────────────────────────────────────────────

enum Command {
    Parse { streaming: bool },
    Ask { question: String },
    Chat,
}

struct CliArgs {
    verbosity: u8,
    config_path: Option<String>,
    command: Command,
}

fn print_help() {
    println!("Usage: answer-stream [OPTIONS] <COMMAND>");
    println!();
    println!("Commands:");
    println!("  chat                       Interactive console (default)");
    println!("  ask <question...>          Ask one question and print the streamed answer");
    println!("  parse [--streaming]        Parse raw answer text from stdin, print JSON");
    println!();
    println!("Options:");
    println!("  -h, --help                 Print help");
    println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
    println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
    println!();
    println!("In chat: /N asks follow-up N, /clear forgets history, /quit, Ctrl-C or EOF exits.");
    println!("Ctrl-C while an answer streams aborts that answer only.");
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut config_path = None;
    let mut streaming = false;
    let mut positional: Vec<String> = Vec::new();

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            positional.extend(iter.by_ref());
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(path);
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--streaming" => streaming = true,
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            a if a.starts_with('-') && a.len() > 1 => {
                eprintln!("error: unknown option '{a}'");
                std::process::exit(1);
            }
            _ => positional.push(arg.clone()),
        }
    }

    let mut positional = positional.into_iter();
    let command = match positional.next().as_deref() {
        None | Some("chat") => Command::Chat,
        Some("parse") => Command::Parse { streaming },
        Some("ask") => {
            let question = positional.collect::<Vec<_>>().join(" ");
            if question.trim().is_empty() {
                eprintln!("error: ask requires a question");
                std::process::exit(1);
            }
            Command::Ask { question }
        }
        Some(other) => {
            eprintln!("error: unknown command '{other}' (try --help)");
            std::process::exit(1);
        }
    };

    CliArgs { verbosity, config_path, command }
}
