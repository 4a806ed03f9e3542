//! # Command line
//!
//! `testrunner-debug` runs requests against the execution backend and keeps
//! each run in a debug tab, so the session survives between invocations.
//!
//! ```text
//! testrunner-debug quick request.json --project 1 --env 2
//! testrunner-debug debug 42 --overrides patch.json
//! testrunner-debug tabs list
//! ```

use std::fmt::Write as _;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::DEFAULT_API_URL;
use crate::http::response::{DebugResult, DebugStatus};
use crate::tabs::TabStore;

#[derive(Parser, Debug)]
#[command(name = "testrunner-debug")]
#[command(author, version, about = "Debug API interfaces against a TestRunner backend", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Base URL of the backend API
    #[arg(long, env = "TESTRUNNER_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub api_url: String,

    /// Bearer token sent with every call
    #[arg(long, env = "TESTRUNNER_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Directory holding the saved session
    #[arg(long, env = "TESTRUNNER_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Session storage backend
    #[arg(long, value_enum, default_value_t = StoreBackend::Json, global = true)]
    pub store: StoreBackend,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,

    /// Request timeout in seconds
    #[arg(long, default_value = "30", global = true)]
    pub timeout: u64,

    /// Retries after a failed connection
    #[arg(long, default_value = "0", global = true)]
    pub retries: u32,

    /// Maximum number of open tabs
    #[arg(long, default_value = "10", global = true)]
    pub max_tabs: usize,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run an unsaved request definition read from a JSON file
    Quick {
        file: PathBuf,
        /// Project the request runs under
        #[arg(long)]
        project: i64,
        /// Environment used to resolve relative URLs and variables
        #[arg(long)]
        env: Option<i64>,
    },
    /// Run a saved interface, optionally overriding some of its fields
    Debug {
        interface_id: i64,
        /// JSON file with the fields to override
        #[arg(long)]
        overrides: Option<PathBuf>,
        #[arg(long)]
        env: Option<i64>,
    },
    /// Inspect or edit the saved tabs
    #[command(subcommand)]
    Tabs(TabsCommand),
}

#[derive(Subcommand, Debug)]
pub enum TabsCommand {
    List,
    /// Open a saved interface in a tab, or activate the tab already showing it
    Open { interface_id: i64 },
    Close { tab_id: String },
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum StoreBackend {
    #[default]
    Json,
    Sqlite,
}

/// Human-readable or JSON rendering of a debug result.
pub fn render_result(result: &DebugResult, format: OutputFormat) -> Result<String, serde_json::Error> {
    if format == OutputFormat::Json {
        return serde_json::to_string_pretty(result);
    }

    let mut out = String::new();
    let status = match result.status {
        DebugStatus::Success => "SUCCESS",
        DebugStatus::Failure => "FAILURE",
        DebugStatus::Error => "ERROR",
    };
    let _ = writeln!(out, "{status} in {:.0} ms", result.elapsed);
    if !result.request.url.is_empty() {
        let _ = writeln!(out, "{} {}", result.request.method, result.request.url);
    }
    if let Some(error) = &result.error {
        let _ = writeln!(out, "error: {error}");
    }
    if let Some(response) = &result.response {
        let _ = writeln!(out, "HTTP {}", response.status_code);
    }
    for outcome in &result.validation_results {
        let mark = if outcome.result { "pass" } else { "FAIL" };
        let _ = writeln!(
            out,
            "  [{mark}] {} {}: expected {}, got {}",
            outcome.comparator, outcome.check, outcome.expect, outcome.actual
        );
    }
    for (name, value) in &result.extracted_variables {
        let _ = writeln!(out, "  {name} = {value}");
    }
    Ok(out)
}

/// Tab listing, active tab marked with `*`.
pub fn render_tabs(store: &TabStore, format: OutputFormat) -> Result<String, serde_json::Error> {
    if format == OutputFormat::Json {
        return serde_json::to_string_pretty(&serde_json::json!({
            "tabs": store.tabs(),
            "activeTabId": store.active_tab_id(),
        }));
    }

    if store.is_empty() {
        return Ok("no open tabs\n".to_string());
    }
    let mut out = String::new();
    for tab in store.tabs() {
        let marker = if store.active_tab_id() == Some(&tab.id) { '*' } else { ' ' };
        let interface = tab
            .interface_id
            .map(|id| format!("#{id}"))
            .unwrap_or_else(|| "-".to_string());
        let last = match &tab.result {
            Some(result) => format!("{:?}", result.status).to_lowercase(),
            None => "not run".to_string(),
        };
        let _ = writeln!(
            out,
            "{marker} {} {:<6} {:<24} {} {} ({last})",
            tab.id, tab.request.method, tab.name, interface, tab.request.url
        );
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::http::response::ValidationOutcome;
    use crate::storage::MemoryStorage;
    use crate::tabs::TabSeed;
    use serde_json::json;

    #[test]
    fn parses_subcommands_with_globals() {
        let cli = Cli::try_parse_from([
            "testrunner-debug",
            "--api-url",
            "http://backend/api",
            "quick",
            "req.json",
            "--project",
            "3",
            "--env",
            "2",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.global.api_url, "http://backend/api");
        assert_eq!(cli.global.format, OutputFormat::Json);
        assert!(matches!(
            cli.command,
            Command::Quick { project: 3, env: Some(2), .. }
        ));

        let cli = Cli::try_parse_from(["testrunner-debug", "tabs", "close", "tab_1"]).unwrap();
        assert!(matches!(cli.command, Command::Tabs(TabsCommand::Close { tab_id }) if tab_id == "tab_1"));
    }

    #[test]
    fn quick_requires_project() {
        assert!(Cli::try_parse_from(["testrunner-debug", "quick", "req.json"]).is_err());
    }

    #[test]
    fn text_result_lists_validators() {
        let result = DebugResult {
            status: DebugStatus::Failure,
            elapsed: 12.0,
            validation_results: vec![ValidationOutcome {
                comparator: "eq".into(),
                check: "status_code".into(),
                expect: json!(200),
                actual: json!(500),
                result: false,
            }],
            ..Default::default()
        };
        let text = render_result(&result, OutputFormat::Text).unwrap();
        assert!(text.starts_with("FAILURE in 12 ms"));
        assert!(text.contains("[FAIL] eq status_code: expected 200, got 500"));
    }

    #[test]
    fn tab_listing_marks_active() {
        let mut store = TabStore::open(MemoryStorage::new(), SessionConfig::default());
        assert_eq!(render_tabs(&store, OutputFormat::Text).unwrap(), "no open tabs\n");

        store.create_tab(TabSeed::named("first"));
        let active = store.create_tab(TabSeed::named("second"));
        let text = render_tabs(&store, OutputFormat::Text).unwrap();
        let active_line = text.lines().find(|line| line.starts_with('*')).unwrap();
        assert!(active_line.contains(active.as_str()));
        assert!(active_line.contains("second"));

        let value: serde_json::Value =
            serde_json::from_str(&render_tabs(&store, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(value["activeTabId"], active.as_str());
        assert_eq!(value["tabs"].as_array().unwrap().len(), 2);
    }
}
