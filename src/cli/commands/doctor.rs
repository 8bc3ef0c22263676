//! Doctor command - verify system requirements and configuration.

use crate::cli::Output;
use crate::config::{Settings, VectorStoreProvider};
use crate::gemini::API_KEY_ENV;
use crate::vector_store::create_vector_store;
use console::style;
use std::path::PathBuf;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub async fn run_doctor(settings: &Settings, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    Output::header("finrag Doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let mut checks = Vec::new();

    println!("{}", style("External Tools").bold());
    let tool_check = check_pdftoppm();
    tool_check.print();
    checks.push(tool_check);

    println!();

    println!("{}", style("API Configuration").bold());
    for check in [check_google_api_key(), check_tavily_api_key(settings)] {
        check.print();
        checks.push(check);
    }

    println!();

    println!("{}", style("Vector Store").bold());
    let store_check = check_vector_store(settings).await;
    store_check.print();
    checks.push(store_check);

    println!();

    println!("{}", style("Directories").bold());
    let dir_checks = check_directories(settings);
    for check in &dir_checks {
        check.print();
    }
    checks.extend(dir_checks);

    println!();

    println!("{}", style("Configuration").bold());
    let config_check = check_config_file(config_path.unwrap_or_else(Settings::default_config_path));
    config_check.print();
    checks.push(config_check);

    println!();

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using finrag.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!(
            "All checks passed with {} warning(s).",
            warnings
        ));
    } else {
        Output::success("All checks passed! finrag is ready to use.");
    }

    Ok(())
}

/// Check that poppler's `pdftoppm` is installed.
fn check_pdftoppm() -> CheckResult {
    // pdftoppm prints its version to stderr
    match Command::new("pdftoppm").arg("-v").output() {
        Ok(output) => {
            let version = String::from_utf8_lossy(&output.stderr)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .to_string();
            CheckResult::ok("pdftoppm", &version)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error("pdftoppm", "not found", install_hint_poppler())
        }
        Err(e) => CheckResult::error("pdftoppm", &format!("error: {}", e), install_hint_poppler()),
    }
}

/// Check that the Google API key is configured.
fn check_google_api_key() -> CheckResult {
    match std::env::var(API_KEY_ENV) {
        Ok(key) if key.trim().is_empty() => CheckResult::error(
            API_KEY_ENV,
            "empty",
            "Set it in .env or with: export GOOGLE_API_KEY='...'",
        ),
        Ok(key) => CheckResult::ok(API_KEY_ENV, &format!("configured ({})", mask_key(&key))),
        Err(_) => CheckResult::error(
            API_KEY_ENV,
            "not set",
            "Set it in .env or with: export GOOGLE_API_KEY='...'",
        ),
    }
}

/// Web search is optional, so a missing key is only a warning.
fn check_tavily_api_key(settings: &Settings) -> CheckResult {
    if !settings.web_search.enabled {
        return CheckResult::ok("TAVILY_API_KEY", "web search disabled in config");
    }
    match settings.tavily_api_key() {
        Some(key) => CheckResult::ok("TAVILY_API_KEY", &format!("configured ({})", mask_key(&key))),
        None => CheckResult::warning(
            "TAVILY_API_KEY",
            "not set, the agent will answer from documents only",
            "Set TAVILY_API_KEY to enable web search",
        ),
    }
}

/// Check that the configured vector store can be opened.
async fn check_vector_store(settings: &Settings) -> CheckResult {
    let provider = settings.vector_store.provider;
    let name = format!("Vector store ({})", provider);
    let target = match provider {
        VectorStoreProvider::Qdrant => settings.qdrant_url(),
        VectorStoreProvider::Sqlite => settings.sqlite_path().display().to_string(),
        VectorStoreProvider::Memory => {
            return CheckResult::warning(
                &name,
                "in-memory, documents are lost on restart",
                "Use provider = \"qdrant\" or \"sqlite\" to persist the index",
            );
        }
    };

    match create_vector_store(settings, settings.embedding.dimensions as usize).await {
        Ok(store) => match store.document_count().await {
            Ok(count) => CheckResult::ok(&name, &format!("{} ({} chunks)", target, count)),
            Err(e) => CheckResult::error(&name, &format!("{}: {}", target, e), store_hint(provider)),
        },
        Err(e) => CheckResult::error(&name, &format!("{}: {}", target, e), store_hint(provider)),
    }
}

fn store_hint(provider: VectorStoreProvider) -> &'static str {
    match provider {
        VectorStoreProvider::Qdrant => "Check QDRANT_URL and QDRANT_API_KEY",
        _ => "Check vector_store.sqlite_path in the config file",
    }
}

/// Check data directories.
fn check_directories(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    for (name, dir) in [("Data directory", settings.data_dir()), ("Temp directory", settings.temp_dir())] {
        if dir.exists() {
            results.push(CheckResult::ok(name, &format!("{}", dir.display())));
        } else {
            results.push(CheckResult::warning(
                name,
                &format!("{} (will be created)", dir.display()),
                "Directory will be created on first use",
            ));
        }
    }

    if settings.vector_store.provider == VectorStoreProvider::Sqlite {
        let db_path = settings.sqlite_path();
        if db_path.exists() {
            let size = std::fs::metadata(&db_path)
                .map(|m| format_size(m.len()))
                .unwrap_or_else(|_| "unknown size".to_string());
            results.push(CheckResult::ok(
                "Database",
                &format!("{} ({})", db_path.display(), size),
            ));
        }
    }

    results
}

/// Check if config file exists.
fn check_config_file(config_path: PathBuf) -> CheckResult {
    if config_path.exists() {
        match Settings::load_from(Some(&config_path)) {
            Ok(_) => CheckResult::ok("Config file", &format!("{}", config_path.display())),
            Err(e) => CheckResult::error(
                "Config file",
                &format!("{}: {}", config_path.display(), e),
                "Fix the file with: finrag config edit",
            ),
        }
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: finrag config edit",
        )
    }
}

/// Show only the ends of a secret.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Platform-specific install hint for poppler.
fn install_hint_poppler() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install poppler"
    } else if cfg!(target_os = "linux") {
        "Install with: sudo apt install poppler-utils (or your package manager)"
    } else {
        "Install from: https://poppler.freedesktop.org"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_ok() {
        let result = CheckResult::ok("test", "passed");
        assert_eq!(result.status, CheckStatus::Ok);
        assert!(result.hint.is_none());
    }

    #[test]
    fn test_check_result_error() {
        let result = CheckResult::error("test", "failed", "fix it");
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.hint, Some("fix it".to_string()));
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("short"), "****");
        assert_eq!(mask_key("AIzaSyA-1234567890abcd"), "AIza...abcd");
    }

    #[test]
    fn test_missing_config_file_is_warning() {
        let dir = tempfile::tempdir().unwrap();
        let check = check_config_file(dir.path().join("config.toml"));
        assert_eq!(check.status, CheckStatus::Warning);
    }

    #[test]
    fn test_invalid_config_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();
        assert_eq!(check_config_file(path).status, CheckStatus::Error);
    }

    #[tokio::test]
    async fn test_memory_store_is_warning() {
        let mut settings = Settings::default();
        settings.vector_store.provider = VectorStoreProvider::Memory;
        assert_eq!(check_vector_store(&settings).await.status, CheckStatus::Warning);
    }

    #[tokio::test]
    async fn test_sqlite_store_reports_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.vector_store.provider = VectorStoreProvider::Sqlite;
        settings.vector_store.sqlite_path = dir.path().join("index.db").display().to_string();
        let check = check_vector_store(&settings).await;
        assert_eq!(check.status, CheckStatus::Ok);
        assert!(check.message.contains("(0 chunks)"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.0 GB");
    }
}
