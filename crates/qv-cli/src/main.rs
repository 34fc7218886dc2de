//! QuietView CLI
//!
//! Developer tooling: probe the classifier the way the early-inject path
//! runs it, match single patterns, inspect cache payloads, and query the
//! coordinator protocol end to end against in-memory fakes.

use std::fs;

use clap::{Parser, Subcommand};

use qv_core::cache::{
    apply_refresh, CacheRefresh, MemoryStore, SettingsPayload, SitesPayload, REFRESH_WINDOW_MS,
    TRUST_WINDOW_MS,
};
use qv_core::classify::{self, ScopeReason};
use qv_core::clock::{Clock, SystemClock};
use qv_core::pattern;
use qv_core::protection::{Decision, ProtectionController};
use qv_coordinator::{Coordinator, FakeHost, MemorySettingsStore, Request, SettingsStore};

#[derive(Parser)]
#[command(name = "qv-cli")]
#[command(about = "QuietView classification and cache tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate the synchronous page-load decision for a URL
    Check {
        /// URL to classify
        #[arg(short, long)]
        url: String,

        /// File with one pattern per line (mirrors the user pattern list)
        #[arg(short, long)]
        patterns: Option<String>,

        /// Simulate the kill switch being off
        #[arg(long)]
        disabled: bool,
    },

    /// Probe a single pattern against a URL
    Match {
        #[arg(short, long)]
        url: String,

        #[arg(short, long)]
        pattern: String,
    },

    /// Inspect a cache payload JSON file and report freshness
    Inspect {
        /// Payload file to inspect
        #[arg(short, long)]
        input: String,
    },

    /// Ask the coordinator protocol whether a URL is protected
    Query {
        #[arg(short, long)]
        url: String,

        /// File with one pattern per line, seeded into the settings store
        #[arg(short, long)]
        patterns: Option<String>,

        /// Seed the kill switch as off
        #[arg(long)]
        disabled: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { url, patterns, disabled } => cmd_check(&url, patterns.as_deref(), disabled),
        Commands::Match { url, pattern } => cmd_match(&url, &pattern),
        Commands::Inspect { input } => cmd_inspect(&input),
        Commands::Query { url, patterns, disabled } => cmd_query(&url, patterns.as_deref(), disabled),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_patterns(path: Option<&str>) -> Result<Vec<String>, String> {
    let path = match path {
        Some(path) => path,
        None => return Ok(Vec::new()),
    };
    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn describe_reason(reason: ScopeReason, sites: &[String]) -> String {
    match reason {
        ScopeReason::Lms => "built-in LMS rule".to_string(),
        ScopeReason::Collab => "built-in collaboration-doc rule".to_string(),
        ScopeReason::UserPattern(idx) => match sites.get(idx) {
            Some(p) => format!("user pattern '{}'", p),
            None => format!("user pattern #{}", idx),
        },
    }
}

fn cmd_check(url: &str, patterns: Option<&str>, disabled: bool) -> Result<(), String> {
    let sites = load_patterns(patterns)?;
    let now = SystemClock.now_ms();

    // Seed a page cache exactly the way a coordinator push would, then run
    // the same decision the early-inject runs.
    let store = MemoryStore::new();
    apply_refresh(
        &store,
        &CacheRefresh { sites: sites.clone(), extension_enabled: !disabled },
        now,
    );

    let controller = ProtectionController::decide(url, &store, &SystemClock);
    match controller.decision() {
        Decision::Protected => {
            let reason = classify::classification(url, true, &sites)
                .map(|r| describe_reason(r, &sites))
                .unwrap_or_else(|| "unknown".to_string());
            println!("PROTECTED  {}", url);
            println!("  Reason:  {}", reason);
        }
        Decision::Unprotected => {
            println!("UNPROTECTED  {}", url);
            if disabled {
                println!("  Reason:  extension disabled");
            }
        }
    }
    Ok(())
}

fn cmd_match(url: &str, pattern: &str) -> Result<(), String> {
    if pattern::matches(url, pattern) {
        println!("MATCH      '{}' ~ {}", pattern, url);
    } else {
        println!("NO MATCH   '{}' ~ {}", pattern, url);
    }
    Ok(())
}

fn cmd_inspect(input: &str) -> Result<(), String> {
    let content =
        fs::read_to_string(input).map_err(|e| format!("Failed to read '{}': {}", input, e))?;
    let now = SystemClock.now_ms();

    let timestamp = if let Ok(payload) = serde_json::from_str::<SitesPayload>(&content) {
        println!("Sites payload: {} pattern(s)", payload.sites.len());
        for site in &payload.sites {
            println!("  {}", site);
        }
        payload.timestamp
    } else if let Ok(payload) = serde_json::from_str::<SettingsPayload>(&content) {
        println!(
            "Settings payload: extension {}",
            if payload.extension_enabled { "enabled" } else { "disabled" }
        );
        payload.timestamp
    } else {
        return Err(format!("'{}' is not a recognizable cache payload", input));
    };

    let age = now.saturating_sub(timestamp);
    println!("  Written:   {} ms ago", age);
    println!(
        "  Refresh:   {}",
        if age <= REFRESH_WINDOW_MS { "fresh (coordinator would skip)" } else { "stale" }
    );
    println!(
        "  Trust:     {}",
        if age <= TRUST_WINDOW_MS { "trusted by page decisions" } else { "expired" }
    );
    Ok(())
}

fn cmd_query(url: &str, patterns: Option<&str>, disabled: bool) -> Result<(), String> {
    let sites = load_patterns(patterns)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start runtime: {}", e))?;

    runtime.block_on(async {
        let coordinator = Coordinator::new(MemorySettingsStore::new(), FakeHost::new(Vec::new()));

        let patch = std::collections::HashMap::from([
            (
                qv_core::settings::KEY_CUSTOM_SITES.to_string(),
                serde_json::json!(sites),
            ),
            (
                qv_core::settings::KEY_ENABLED.to_string(),
                serde_json::json!(!disabled),
            ),
        ]);
        coordinator
            .store()
            .set(patch)
            .await
            .map_err(|e| format!("Failed to seed settings: {}", e))?;

        let status = match coordinator
            .handle(Request::CheckIfProtected { url: url.to_string() })
            .await
        {
            Some(status) => status,
            None => return Err("query request returned no response".to_string()),
        };

        println!(
            "{}  {}",
            if status.is_protected { "PROTECTED" } else { "UNPROTECTED" },
            url
        );
        Ok(())
    })
}
