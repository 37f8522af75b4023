mod cli;
mod logging;

use anyhow::{Context, Result};
use cli::{Args, Command};
use code_companion::companion::Companion;
use code_companion::config::{self, Settings};
use code_companion::crop::{self, CropParams};
use code_companion::format::{split_message_content, MessagePart};
use code_companion::highlight::HighlightClient;
use code_companion::llm::{ChatClient, CompanionError};
use code_companion::persistence::{JsonFileStore, Stats};
use code_companion::server;
use code_companion::session::{HighlightRange, SessionCallback, SessionEvent};
use rustyline::error::ReadlineError;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Log the full error, hand the user the short message
fn user_facing(error: CompanionError) -> anyhow::Error {
    warn!("{}", error);
    anyhow::anyhow!(error.user_message())
}

fn print_fragments() -> SessionCallback {
    Box::new(|event: &SessionEvent| {
        if let SessionEvent::Fragment(text) = event {
            print!("{text}");
            let _ = std::io::stdout().flush();
        }
    })
}

fn open_companion(settings: &Settings) -> Result<Companion> {
    let store = JsonFileStore::new(config::state_path()?);
    Companion::new(
        Box::new(ChatClient::new(settings.chat_endpoint.clone())),
        Box::new(store),
    )
}

fn snippet(code: &str, range: &HighlightRange) -> String {
    code.chars()
        .skip(range.start)
        .take(range.end - range.start)
        .collect()
}

async fn run_analyze(settings: &Settings, file: PathBuf, language: &str, apply: bool) -> Result<()> {
    let code = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let mut companion = open_companion(settings)?;

    let callback = print_fragments();
    let report = companion
        .analyze(&code, language, Some(&callback))
        .await
        .map_err(user_facing)?;
    println!();

    if !report.highlights.is_empty() {
        println!("\nHighlighted ranges:");
        for range in &report.highlights {
            println!(
                "  {}..{}: {:?}",
                range.start,
                range.end,
                snippet(&code, range)
            );
        }
    }

    if apply {
        match companion.apply_fix() {
            Some(fixed) => {
                std::fs::write(&file, format!("{fixed}\n"))
                    .with_context(|| format!("Failed to write {}", file.display()))?;
                println!("\nApplied corrected code to {}", file.display());
            }
            None => println!("\nNo corrected code to apply."),
        }
    }
    Ok(())
}

async fn run_execute(settings: &Settings, file: PathBuf, language: &str) -> Result<()> {
    let code = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let mut companion = open_companion(settings)?;

    let callback = print_fragments();
    companion
        .execute(&code, language, Some(&callback))
        .await
        .map_err(user_facing)?;
    println!();
    Ok(())
}

fn render_reply(reply: &str) {
    for part in split_message_content(reply) {
        match part {
            MessagePart::Text(text) => print!("{text}"),
            MessagePart::Code { language, content } => {
                println!("\n--- {language} ---");
                println!("{content}");
                println!("---");
            }
        }
    }
    println!();
}

async fn run_chat(settings: &Settings) -> Result<()> {
    let mut companion = open_companion(settings)?;
    if let Some(greeting) = companion.conversation().last() {
        println!("{}\n", greeting.content);
    }

    let mut editor = rustyline::DefaultEditor::new()?;
    loop {
        let line = match editor.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        if line.trim().is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(line.as_str());

        match companion.send_chat(&line, None).await {
            Ok(reply) => render_reply(&reply),
            Err(e) => {
                warn!("{}", e);
                println!(
                    "Sorry, I encountered an error: {}. Please try again! 🔄\n",
                    e.user_message()
                );
            }
        }
    }
    debug!(
        "Chat ended after {} turn(s)",
        companion.conversation().len()
    );
    Ok(())
}

async fn run_highlight(settings: &Settings, file: PathBuf, language: &str) -> Result<()> {
    let code = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let client = HighlightClient::new(
        settings.highlight_url.clone(),
        settings.highlight_host.clone(),
        settings.rapid_api_key.clone(),
    );
    let result = client
        .highlight(&code, language)
        .await
        .map_err(user_facing)?;
    println!("{}", result.html);
    Ok(())
}

fn run_stats() -> Result<()> {
    let store = JsonFileStore::new(config::state_path()?);
    let stats = Stats::load(&store)?;
    println!("Total analyses:    {}", stats.total_analyses);
    println!("Total corrections: {}", stats.total_corrections);
    println!("Accuracy:          {}%", stats.accuracy());
    match stats.last_used {
        Some(last_used) => println!("Last used:         {}", last_used.to_rfc2822()),
        None => println!("Last used:         never"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    logging::setup_logging(args.verbose);

    let mut settings = Settings::load()?;
    if let Some(endpoint) = args.endpoint {
        settings.chat_endpoint = endpoint;
    }

    match args.command {
        Command::Serve { port } => {
            let port = port.unwrap_or(settings.port);
            server::serve(&settings, port).await
        }
        Command::Analyze {
            file,
            language,
            apply,
        } => run_analyze(&settings, file, &language, apply).await,
        Command::Execute { file, language } => run_execute(&settings, file, &language).await,
        Command::Chat => run_chat(&settings).await,
        Command::Predict {
            nitrogen,
            phosphorus,
            potassium,
            temperature,
            humidity,
            ph,
            rainfall,
        } => {
            let params = CropParams {
                nitrogen,
                phosphorus,
                potassium,
                temperature,
                humidity,
                ph,
                rainfall,
            };
            let crop = crop::predict(&params).map_err(user_facing)?;
            println!("{crop}");
            Ok(())
        }
        Command::Highlight { file, language } => run_highlight(&settings, file, &language).await,
        Command::Stats => run_stats(),
    }
}
