//! `ronnyx chat` — Interactive or single-message chat mode.

use ronnyx_config::AppConfig;
use ronnyx_core::event::EventBus;
use ronnyx_gateway::ChatService;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(
    message: Option<String>,
    session: String,
    events: Arc<EventBus>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() && !ronnyx_providers::router::is_local(&config.llm.provider) {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OPENAI_API_KEY=sk-...");
        eprintln!("    RONNYX_API_KEY=sk-...");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let service = ChatService::from_config(&config, events).await?;

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let turn = service.chat(&session, msg).await;
        eprint!("\r              \r");
        println!("{}", turn?.reply);
        return Ok(());
    }

    println!();
    println!("  Ronnyx — Interactive Mode");
    println!();
    println!("  Model:     {}", config.llm.model);
    println!("  Session:   {session}");
    println!("  Tools:     {}", service.tool_definitions().len());
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        eprint!("  ...");
        match service.chat(&session, line).await {
            Ok(turn) => {
                eprint!("\r     \r");
                println!();
                for reply_line in turn.reply.lines() {
                    println!("  Ronnyx > {reply_line}");
                }
                println!();
            }
            Err(e) => {
                eprint!("\r     \r");
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}
