//! `unitypilot chat` - Interactive query loop.
//!
//! One tool session and one continued conversation serve the whole loop.
//! The session is released however the loop ends: `quit`, end of input,
//! Ctrl+C or an I/O error.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::error;
use unitypilot_agent::Orchestrator;
use unitypilot_config::AppConfig;
use unitypilot_core::message::Conversation;

pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut orchestrator = super::build_orchestrator(&config)?;
    orchestrator.initialize().await?;

    println!();
    println!("  UnityPilot - Interactive Mode");
    println!();
    println!("  Model:  {}", config.model.vendor);
    if let Some(catalog) = orchestrator.catalog() {
        println!("  Tools:  {}", catalog.len());
    }
    println!("  Type your queries or 'quit' to exit.");

    let mut stdout = tokio::io::stdout();
    let result = tokio::select! {
        r = chat_loop(&orchestrator, BufReader::new(tokio::io::stdin()), &mut stdout) => r,
        _ = tokio::signal::ctrl_c() => Ok(()),
    };

    orchestrator.cleanup().await;
    println!();
    result?;
    Ok(())
}

/// Read queries line by line and answer them until `quit` or end of input.
///
/// A failed query is reported and the loop continues; the conversation
/// only keeps turns from queries that succeeded.
pub async fn chat_loop<R, W>(orchestrator: &Orchestrator, input: R, output: &mut W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut conversation = Conversation::new();

    loop {
        output.write_all(b"\nQuery: ").await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if query.eq_ignore_ascii_case("quit") {
            break;
        }
        if query.is_empty() {
            continue;
        }

        let mut working = conversation.clone();
        let reply = match orchestrator
            .continue_query(&mut working, query, orchestrator.system_prompt(), orchestrator.max_turns())
            .await
        {
            Ok(outcome) => {
                conversation = working;
                format!("\n{}\n", outcome.answer)
            }
            Err(e) => {
                error!(error = %e, "Query failed");
                format!("\nError: {e}\n")
            }
        };
        output.write_all(reply.as_bytes()).await?;
    }

    output.flush().await
}
