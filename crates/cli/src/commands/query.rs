//! `unitypilot query` - Answer one query and exit.

use unitypilot_agent::QueryService;
use unitypilot_config::AppConfig;

pub async fn run(config: AppConfig, text: &str) -> Result<(), Box<dyn std::error::Error>> {
    let service = QueryService::from_config(&config)?;

    eprint!("  Thinking...");
    let outcome = service.run(None, text).await;
    eprint!("\r              \r");

    let outcome = outcome?;
    println!("{}", outcome.answer);
    if outcome.budget_exhausted {
        eprintln!("  (turn budget of {} reached)", config.agent.max_turns);
    }
    Ok(())
}
