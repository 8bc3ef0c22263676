//! Ask command implementation.

use super::require;
use crate::cli::preflight::Operation;
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Pipeline;
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(question: &str, json: bool, settings: Settings) -> Result<()> {
    require(Operation::Query)?;

    let pipeline = Pipeline::from_settings(settings).await?;
    let agent = pipeline.create_agent()?;

    let spinner = Output::spinner("Thinking...");
    let result = agent.run(question).await;
    spinner.finish_and_clear();

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            Output::error(&format!("Failed to answer: {}", e));
            return Err(e.into());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("\n{}\n", response.answer);

    if !response.tool_calls.is_empty() {
        Output::header("Tool calls");
        for call in &response.tool_calls {
            Output::kv(&call.name, &call.arguments);
        }
        println!();
        Output::kv("Model calls", &response.iterations.to_string());
    }

    Ok(())
}
