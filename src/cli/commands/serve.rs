//! HTTP API server for the chat frontend.

use super::require;
use crate::cli::preflight::Operation;
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Pipeline;
use crate::server::{router, AppState};
use std::sync::Arc;
use tracing::error;

/// Run the HTTP API server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    require(Operation::Query)?;

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);

    let pipeline = Pipeline::from_settings(settings).await?;

    // The API stays up without an agent; /chat answers 503 until restart.
    let agent = match pipeline.create_agent() {
        Ok(agent) => Some(agent),
        Err(e) => {
            error!("Failed to initialize agent: {}", e);
            Output::warning(&format!("Agent not initialized: {}", e));
            None
        }
    };
    let web_enabled = agent.as_ref().is_some_and(|a| a.web_enabled());
    let frontend_host = pipeline.settings().frontend_host();

    let app = router(Arc::new(AppState { pipeline, agent }));

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("finrag API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    Output::kv("Frontend", &format!("https://{}", frontend_host));
    Output::kv("Web search", if web_enabled { "enabled" } else { "disabled" });
    println!();
    println!("Endpoints:");
    Output::kv("Status", "GET    /");
    Output::kv("Health", "GET    /health");
    Output::kv("Upload", "POST   /upload?pages_to_process=N");
    Output::kv("Chat", "POST   /chat");
    Output::kv("Documents", "GET    /documents");
    Output::kv("Document", "GET    /documents/{source}");
    Output::kv("Delete", "DELETE /documents/{source}");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
