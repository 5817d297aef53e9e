//! `unitypilot tools` - List the Unity MCP tool catalog.

use unitypilot_config::AppConfig;

pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut orchestrator = super::build_orchestrator(&config)?;
    orchestrator.initialize().await?;

    if let Some(catalog) = orchestrator.catalog() {
        println!("{} tools available:", catalog.len());
        for tool in catalog.definitions() {
            if tool.description.is_empty() {
                println!("  {}", tool.name);
            } else {
                println!("  {:<24} {}", tool.name, first_line(&tool.description));
            }
        }
    }

    orchestrator.cleanup().await;
    Ok(())
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default().trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptions_are_cut_to_one_line() {
        assert_eq!(first_line("Manage scenes.\n\nArgs:\n  action"), "Manage scenes.");
        assert_eq!(first_line(""), "");
    }
}
